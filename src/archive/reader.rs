//! Element graph deserialization.

use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::sync::Arc;

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use half::f16;
use tracing::{debug, trace, warn};

use super::format::{ELEMENT_ABSENT, ELEMENT_PRESENT, MAX_DEPTH};
use crate::reflect::{ElementPtr, FieldDescriptor, PostLoadContext, Registry, Value, ValueKind};
use crate::stream::Stream;
use crate::util::{Error, Result, Uid};

/// Reads element blobs from a body stream.
///
/// Every element created is indexed by uid (repeated uids share one
/// element) and queued children-first for the post-load pass.
pub(crate) struct ArchiveReader<'a, C: Read> {
    registry: &'a Registry,
    stream: &'a mut Stream<C>,
    loaded: HashMap<Uid, ElementPtr>,
    post_order: Vec<ElementPtr>,
    active: HashSet<Uid>,
    depth: usize,
}

impl<'a, C: Read> ArchiveReader<'a, C> {
    pub fn new(registry: &'a Registry, stream: &'a mut Stream<C>) -> Self {
        Self {
            registry,
            stream,
            loaded: HashMap::new(),
            post_order: Vec::new(),
            active: HashSet::new(),
            depth: 0,
        }
    }

    pub fn read_root_count(&mut self) -> Result<usize> {
        Ok(self.stream.read::<u32>()? as usize)
    }

    /// Read one element blob.
    ///
    /// Returns `None` for elements whose type is unknown to the registry;
    /// their data is consumed and dropped.
    pub fn read_element(&mut self) -> Result<Option<ElementPtr>> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::invalid(format!("elements nested deeper than {MAX_DEPTH}")));
        }
        self.depth += 1;
        let result = self.read_element_body();
        self.depth -= 1;
        result
    }

    fn read_element_body(&mut self) -> Result<Option<ElementPtr>> {
        let type_name = self.stream.read_string()?;
        let uid = Uid::from_raw(self.stream.read::<u64>()?);
        let count = self.stream.read::<i32>()?;
        if count < 0 {
            return Err(Error::invalid(format!("negative field count for {type_name}")));
        }

        if self.active.contains(&uid) {
            return Err(Error::OwnershipCycle(format!("{type_name} {uid}")));
        }

        if let Some(existing) = self.loaded.get(&uid).cloned() {
            trace!("Element {} {} already loaded, sharing it", type_name, uid);
            self.skip_fields(count)?;
            return Ok(Some(existing));
        }

        let class = match self.registry.find_class(&type_name) {
            Some(class) if !class.is_abstract() => Arc::clone(class),
            Some(_) => {
                warn!("Skipping element {} of abstract type {}", uid, type_name);
                self.skip_fields(count)?;
                return Ok(None);
            }
            None => {
                debug!("Skipping element {} of unknown type {}", uid, type_name);
                self.skip_fields(count)?;
                return Ok(None);
            }
        };

        let element = self.registry.instantiate(&class, uid)?;
        self.loaded.insert(uid, element.clone());
        self.active.insert(uid);

        for _ in 0..count {
            let name = self.stream.read_string()?;
            let tag = self.read_tag()?;
            let Some(value) = self.read_value(tag)? else {
                debug!("Field {}::{} held a skipped element, keeping the default", type_name, name);
                continue;
            };
            match class.find_field(&name) {
                Some(field) => apply_field(&element, field, value)?,
                None => apply_unknown(&element, &name, value),
            }
        }

        self.active.remove(&uid);
        self.post_order.push(element.clone());
        Ok(Some(element))
    }

    fn skip_fields(&mut self, count: i32) -> Result<()> {
        for _ in 0..count {
            self.stream.read_string()?;
            let tag = self.read_tag()?;
            self.read_value(tag)?;
        }
        Ok(())
    }

    fn read_tag(&mut self) -> Result<ValueKind> {
        let raw = self.stream.read::<u8>()?;
        match ValueKind::from_u8(raw) {
            ValueKind::Unknown => Err(Error::invalid(format!("unknown value tag {raw}"))),
            kind => Ok(kind),
        }
    }

    /// Read one payload of `kind`.
    ///
    /// `None` means the value was an element of a skipped type. Collections
    /// drop such items instead.
    fn read_value(&mut self, kind: ValueKind) -> Result<Option<Value>> {
        let stream = &mut *self.stream;
        let value = match kind {
            ValueKind::Bool => Value::Bool(stream.read::<u8>()? != 0),
            ValueKind::U8 => Value::U8(stream.read()?),
            ValueKind::I8 => Value::I8(stream.read()?),
            ValueKind::U16 => Value::U16(stream.read()?),
            ValueKind::I16 => Value::I16(stream.read()?),
            ValueKind::U32 => Value::U32(stream.read()?),
            ValueKind::I32 => Value::I32(stream.read()?),
            ValueKind::U64 => Value::U64(stream.read()?),
            ValueKind::I64 => Value::I64(stream.read()?),
            ValueKind::F16 => Value::F16(stream.read::<f16>()?),
            ValueKind::F32 => Value::F32(stream.read()?),
            ValueKind::F64 => Value::F64(stream.read()?),
            ValueKind::String => Value::String(stream.read_string()?),
            ValueKind::Vec2 => Value::Vec2(Vec2::from_slice(&stream.read_array::<f32>(2)?)),
            ValueKind::Vec3 => Value::Vec3(Vec3::from_slice(&stream.read_array::<f32>(3)?)),
            ValueKind::Vec4 => Value::Vec4(Vec4::from_slice(&stream.read_array::<f32>(4)?)),
            ValueKind::Quat => Value::Quat(Quat::from_slice(&stream.read_array::<f32>(4)?)),
            ValueKind::Mat4 => Value::Mat4(Mat4::from_cols_slice(&stream.read_array::<f32>(16)?)),
            ValueKind::Enum => Value::Symbol(stream.read_string()?),
            ValueKind::Reference => Value::Reference(Uid::from_raw(stream.read()?)),
            ValueKind::Element => match stream.read::<u8>()? {
                ELEMENT_ABSENT => Value::Element(None),
                ELEMENT_PRESENT => match self.read_element()? {
                    Some(element) => Value::Element(Some(element)),
                    None => return Ok(None),
                },
                marker => return Err(Error::invalid(format!("bad element marker {marker}"))),
            },
            ValueKind::Array => {
                let item = self.read_tag()?;
                let count = self.stream.read::<u32>()?;
                let mut items = Vec::new();
                for _ in 0..count {
                    items.extend(self.read_value(item)?);
                }
                Value::Array(item, items)
            }
            ValueKind::Map => {
                let key = self.read_tag()?;
                let val = self.read_tag()?;
                let count = self.stream.read::<u32>()?;
                let mut pairs = Vec::new();
                for _ in 0..count {
                    let k = self.read_value(key)?;
                    let v = self.read_value(val)?;
                    if let (Some(k), Some(v)) = (k, v) {
                        pairs.push((k, v));
                    }
                }
                Value::Map(key, val, pairs)
            }
            ValueKind::Unknown => return Err(Error::invalid("unknown value kind")),
        };
        Ok(Some(value))
    }

    /// Run `post_load` on every element read, children first, and return
    /// the elements synthesized by the hooks.
    pub fn finish(self) -> Result<Vec<ElementPtr>> {
        run_post_load(self.registry, &self.loaded, &self.post_order)
    }
}

/// Run `post_load` over `order` and return the synthesized elements.
pub(crate) fn run_post_load(
    registry: &Registry,
    loaded: &HashMap<Uid, ElementPtr>,
    order: &[ElementPtr],
) -> Result<Vec<ElementPtr>> {
    let mut ctx = PostLoadContext::new(registry, loaded);
    for element in order {
        ctx.set_current(element.uid());
        let mut data = element.data_mut();
        element.class().run_post_load(&mut **data, &mut ctx)?;
    }
    let created = ctx.into_created();
    debug!("Post-load complete: {} elements, {} synthesized", order.len(), created.len());
    Ok(created)
}

/// Offer a field the type does not declare to its `process_component` hooks.
pub(crate) fn apply_unknown(element: &ElementPtr, name: &str, value: Value) {
    let mut data = element.data_mut();
    if !element.class().offer_component(&mut **data, name, &value) {
        debug!(
            "Dropping unknown field {}::{} ({})",
            element.type_name(),
            name,
            value.kind()
        );
    }
}

/// Store a value read for `field`, converting, validating or handing it to
/// `process_component` as needed.
pub(crate) fn apply_field(element: &ElementPtr, field: &FieldDescriptor, value: Value) -> Result<()> {
    let value = match conform(field, value) {
        Ok(value) => value,
        Err(value) => {
            let mut data = element.data_mut();
            if element.class().offer_component(&mut **data, field.name(), &value) {
                return Ok(());
            }
            return Err(Error::mismatch(field.name(), field.kind(), value.kind()));
        }
    };

    if let (Some(enumeration), Value::Symbol(symbol)) = (field.enumeration(), &value) {
        if enumeration.decode(symbol).is_none() {
            warn!(
                "Unknown {} symbol '{}' for {}::{}, keeping the default",
                enumeration.name(),
                symbol,
                element.type_name(),
                field.name()
            );
            return Ok(());
        }
    }

    if let Some(constraint) = field.element_type() {
        let mut nested = Vec::new();
        collect_elements(&value, &mut nested);
        if let Some(bad) = nested.iter().find(|e| !e.class().has_type(constraint.type_id)) {
            return Err(Error::mismatch(field.name(), constraint.rust_name, bad.type_name()));
        }
    }

    let mut data = element.data_mut();
    let result = element.class().write_field(&mut **data, field, value);
    if let (Some(enumeration), Err(Error::ValueConversion { actual, .. })) = (field.enumeration(), &result) {
        warn!(
            "{} value {} for {}::{} has no variant, keeping the default",
            enumeration.name(),
            actual,
            element.type_name(),
            field.name()
        );
        return Ok(());
    }
    result.map_err(|e| match e {
        Error::ValueConversion { expected, actual } => Error::SchemaMismatch {
            field: field.name().to_owned(),
            expected,
            actual,
        },
        other => other,
    })
}

// Bring a stored value to the declared kind, or hand it back unchanged.
fn conform(field: &FieldDescriptor, value: Value) -> std::result::Result<Value, Value> {
    let kind = field.kind();
    if value.kind() == kind {
        return match (&value, field.default_value()) {
            (Value::Array(item, _), Some(Value::Array(expected, _))) if item != expected => {
                cast_items(value, *expected)
            }
            _ => Ok(value),
        };
    }
    if kind.is_numeric() || kind == ValueKind::Bool {
        if let Some(cast) = value.cast(kind) {
            return Ok(cast);
        }
    }
    Err(value)
}

fn cast_items(value: Value, kind: ValueKind) -> std::result::Result<Value, Value> {
    let Value::Array(_, items) = &value else {
        return Err(value);
    };
    match items.iter().map(|v| v.cast(kind)).collect::<Option<Vec<_>>>() {
        Some(cast) => Ok(Value::Array(kind, cast)),
        None => Err(value),
    }
}

fn collect_elements<'v>(value: &'v Value, out: &mut Vec<&'v ElementPtr>) {
    match value {
        Value::Element(Some(e)) => out.push(e),
        Value::Array(_, items) => items.iter().for_each(|v| collect_elements(v, out)),
        Value::Map(_, _, pairs) => pairs.iter().for_each(|(_, v)| collect_elements(v, out)),
        _ => {}
    }
}

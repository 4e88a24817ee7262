//! Element graph serialization.

use std::collections::HashSet;
use std::io::Write;

use tracing::{trace, warn};

use super::format::{ELEMENT_ABSENT, ELEMENT_PRESENT};
use crate::reflect::{ElementPtr, Enumeration, FieldFlags, Value, ValueKind};
use crate::stream::Stream;
use crate::util::{Error, Result, Uid};

/// Writes element blobs to a body stream.
pub(crate) struct ArchiveWriter<'s, C: Write> {
    stream: &'s mut Stream<C>,
    active: HashSet<Uid>,
    elements: usize,
}

impl<'s, C: Write> ArchiveWriter<'s, C> {
    pub fn new(stream: &'s mut Stream<C>) -> Self {
        Self {
            stream,
            active: HashSet::new(),
            elements: 0,
        }
    }

    /// Elements written so far, nested ones included.
    pub fn element_count(&self) -> usize {
        self.elements
    }

    pub fn write_root_count(&mut self, count: usize) -> Result<()> {
        let count = u32::try_from(count).map_err(|_| Error::invalid("too many root elements"))?;
        self.stream.write(count)
    }

    /// Write one element blob and everything it owns.
    pub fn write_element(&mut self, element: &ElementPtr) -> Result<()> {
        let uid = element.uid();
        if !self.active.insert(uid) {
            return Err(Error::OwnershipCycle(format!("{} {}", element.type_name(), uid)));
        }

        let class = element.class();
        let fields: Vec<_> = element
            .values()
            .into_iter()
            .filter(|(field, value)| {
                !field.flags().contains(FieldFlags::DISCARD)
                    && !class.is_default(field, value)
                    && !value.is_empty_container()
            })
            .collect();

        trace!("Writing {} {} ({} fields)", element.type_name(), uid, fields.len());
        self.stream.write_string(element.type_name())?;
        self.stream.write(uid.raw())?;
        self.stream.write(fields.len() as i32)?;

        for (field, value) in &fields {
            self.stream.write_string(field.name())?;
            self.stream.write(value.kind() as u8)?;
            self.write_payload(value, field.enumeration().map(|e| e.as_ref()))?;
        }

        self.active.remove(&uid);
        self.elements += 1;
        Ok(())
    }

    fn write_payload(&mut self, value: &Value, enumeration: Option<&Enumeration>) -> Result<()> {
        let stream = &mut *self.stream;
        match value {
            Value::Bool(v) => stream.write(u8::from(*v)),
            Value::U8(v) => stream.write(*v),
            Value::I8(v) => stream.write(*v),
            Value::U16(v) => stream.write(*v),
            Value::I16(v) => stream.write(*v),
            Value::U32(v) => stream.write(*v),
            Value::I32(v) => stream.write(*v),
            Value::U64(v) => stream.write(*v),
            Value::I64(v) => stream.write(*v),
            Value::F16(v) => stream.write(*v),
            Value::F32(v) => stream.write(*v),
            Value::F64(v) => stream.write(*v),
            Value::String(s) => stream.write_string(s),
            Value::Vec2(v) => stream.write_array(&v.to_array()),
            Value::Vec3(v) => stream.write_array(&v.to_array()),
            Value::Vec4(v) => stream.write_array(&v.to_array()),
            Value::Quat(q) => stream.write_array(&q.to_array()),
            Value::Mat4(m) => stream.write_array(&m.to_cols_array()),
            Value::Enum(v) => {
                let symbol = enumeration.and_then(|e| e.encode(*v)).unwrap_or_else(|| {
                    warn!("Enumeration value {} has no name, writing it numerically", v);
                    v.to_string()
                });
                stream.write_string(&symbol)
            }
            Value::Symbol(s) => stream.write_string(s),
            Value::Reference(uid) => stream.write(uid.raw()),
            Value::Element(None) => stream.write(ELEMENT_ABSENT),
            Value::Element(Some(element)) => {
                stream.write(ELEMENT_PRESENT)?;
                self.write_element(element)
            }
            Value::Array(kind, items) => {
                stream.write(*kind as u8)?;
                stream.write(items.len() as u32)?;
                for item in items {
                    self.write_item(*kind, item, enumeration)?;
                }
                Ok(())
            }
            Value::Map(key, val, pairs) => {
                stream.write(*key as u8)?;
                stream.write(*val as u8)?;
                stream.write(pairs.len() as u32)?;
                for (k, v) in pairs {
                    self.write_item(*key, k, None)?;
                    self.write_item(*val, v, enumeration)?;
                }
                Ok(())
            }
        }
    }

    // Collection items are untagged, so they must match the declared kind.
    fn write_item(&mut self, kind: ValueKind, item: &Value, enumeration: Option<&Enumeration>) -> Result<()> {
        if item.kind() != kind {
            return Err(Error::invalid(format!(
                "collection of {} holds a {} item",
                kind,
                item.kind()
            )));
        }
        self.write_payload(item, enumeration)
    }
}

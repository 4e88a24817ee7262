//! Human-readable JSON archives of element graphs.
//!
//! [`to_json`] dumps an element for debugging and diffing; [`from_json`]
//! loads a dump back through a registry. Hidden fields are not dumped, so
//! they load with their defaults.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use serde_json::{json, Map, Value as Json};
use tracing::debug;

use super::format::MAX_DEPTH;
use super::reader::{apply_field, apply_unknown, run_post_load};
use crate::reflect::{ElementPtr, Enumeration, FieldDescriptor, FieldFlags, Registry, Value, ValueKind};
use crate::util::{Error, Result, Uid};

/// Convert an element and everything it owns to JSON.
///
/// Hidden fields are omitted; enumerations print by name.
pub fn to_json(element: &ElementPtr) -> Json {
    let mut fields = Map::new();
    for (field, value) in element.values() {
        if field.flags().contains(FieldFlags::HIDE) {
            continue;
        }
        let enumeration = field.enumeration().map(|e| e.as_ref());
        fields.insert(field.name().to_owned(), value_to_json(&value, enumeration));
    }
    json!({
        "type": element.type_name(),
        "uid": element.uid().to_string(),
        "fields": fields,
    })
}

/// Pretty-printed [`to_json`] of several elements.
pub fn to_json_string(elements: &[ElementPtr]) -> Result<String> {
    let dump: Vec<Json> = elements.iter().map(to_json).collect();
    Ok(serde_json::to_string_pretty(&dump)?)
}

fn value_to_json(value: &Value, enumeration: Option<&Enumeration>) -> Json {
    match value {
        Value::Bool(v) => json!(v),
        Value::U8(v) => json!(v),
        Value::I8(v) => json!(v),
        Value::U16(v) => json!(v),
        Value::I16(v) => json!(v),
        Value::U32(v) => json!(v),
        Value::I32(v) => json!(v),
        Value::U64(v) => json!(v),
        Value::I64(v) => json!(v),
        Value::F16(v) => json!(v.to_f32()),
        Value::F32(v) => json!(v),
        Value::F64(v) => json!(v),
        Value::String(s) | Value::Symbol(s) => json!(s),
        Value::Vec2(v) => json!(v.to_array()),
        Value::Vec3(v) => json!(v.to_array()),
        Value::Vec4(v) => json!(v.to_array()),
        Value::Quat(q) => json!(q.to_array()),
        Value::Mat4(m) => json!(m.to_cols_array()),
        Value::Enum(v) => match enumeration.and_then(|e| e.encode(*v)) {
            Some(symbol) => json!(symbol),
            None => json!(v),
        },
        Value::Element(Some(e)) => to_json(e),
        Value::Element(None) => Json::Null,
        Value::Reference(uid) => json!({ "ref": uid.to_string() }),
        Value::Array(_, items) => Json::Array(items.iter().map(|v| value_to_json(v, enumeration)).collect()),
        Value::Map(_, _, pairs) => {
            if pairs.iter().all(|(k, _)| k.as_str().is_some()) {
                let object: Map<String, Json> = pairs
                    .iter()
                    .filter_map(|(k, v)| Some((k.as_str()?.to_owned(), value_to_json(v, enumeration))))
                    .collect();
                Json::Object(object)
            } else {
                Json::Array(
                    pairs
                        .iter()
                        .map(|(k, v)| json!([value_to_json(k, None), value_to_json(v, enumeration)]))
                        .collect(),
                )
            }
        }
    }
}

/// Load one element dumped by [`to_json`].
///
/// Fails with [`Error::UnknownType`] when the type is not registered.
/// Elements synthesized by `post_load` are dropped; use
/// [`from_json_str`] to keep them.
pub fn from_json(registry: &Registry, json: &Json) -> Result<ElementPtr> {
    let mut loader = JsonLoader::new(registry);
    let element = match loader.element(json)? {
        Some(element) => element,
        None => {
            let type_name = json.get("type").and_then(Json::as_str).unwrap_or_default();
            return Err(Error::UnknownType(type_name.to_owned()));
        }
    };
    loader.finish()?;
    Ok(element)
}

/// Load a [`to_json_string`] dump: every root whose type is registered,
/// followed by elements synthesized during post-load.
pub fn from_json_str(registry: &Registry, text: &str) -> Result<Vec<ElementPtr>> {
    let json: Json = serde_json::from_str(text)?;
    let roots = match &json {
        Json::Array(items) => items.as_slice(),
        single => std::slice::from_ref(single),
    };
    let mut loader = JsonLoader::new(registry);
    let mut elements = Vec::with_capacity(roots.len());
    for root in roots {
        elements.extend(loader.element(root)?);
    }
    elements.extend(loader.finish()?);
    Ok(elements)
}

struct JsonLoader<'a> {
    registry: &'a Registry,
    loaded: HashMap<Uid, ElementPtr>,
    post_order: Vec<ElementPtr>,
    active: HashSet<Uid>,
}

impl<'a> JsonLoader<'a> {
    fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            loaded: HashMap::new(),
            post_order: Vec::new(),
            active: HashSet::new(),
        }
    }

    fn element(&mut self, json: &Json) -> Result<Option<ElementPtr>> {
        if self.active.len() >= MAX_DEPTH {
            return Err(Error::invalid(format!("elements nested deeper than {MAX_DEPTH}")));
        }
        let type_name = json
            .get("type")
            .and_then(Json::as_str)
            .ok_or_else(|| Error::invalid("element without a type"))?;
        let uid = match json.get("uid").and_then(Json::as_str) {
            Some(text) => text.parse::<Uid>()?,
            None => Uid::generate(),
        };

        if self.active.contains(&uid) {
            return Err(Error::OwnershipCycle(format!("{type_name} {uid}")));
        }
        if let Some(existing) = self.loaded.get(&uid) {
            return Ok(Some(existing.clone()));
        }

        let class = match self.registry.find_class(type_name) {
            Some(class) if !class.is_abstract() => Arc::clone(class),
            _ => {
                debug!("Skipping element {} of unregistered or abstract type {}", uid, type_name);
                return Ok(None);
            }
        };
        let element = self.registry.instantiate(&class, uid)?;
        self.loaded.insert(uid, element.clone());

        self.active.insert(uid);
        let result = self.fields(&element, json.get("fields"));
        self.active.remove(&uid);
        result?;

        self.post_order.push(element.clone());
        Ok(Some(element))
    }

    fn fields(&mut self, element: &ElementPtr, fields: Option<&Json>) -> Result<()> {
        let Some(Json::Object(fields)) = fields else {
            return Ok(());
        };
        let class = Arc::clone(element.class());
        for (name, json) in fields {
            match class.find_field(name) {
                Some(field) => {
                    if let Some(value) = self.field_value(field, json)? {
                        apply_field(element, field, value)?;
                    }
                }
                None => match infer(json) {
                    Some(value) => apply_unknown(element, name, value),
                    None => debug!("Dropping unknown field {}::{}", class.name(), name),
                },
            }
        }
        Ok(())
    }

    fn field_value(&mut self, field: &FieldDescriptor, json: &Json) -> Result<Option<Value>> {
        let value = match (field.kind(), field.default_value()) {
            (ValueKind::Array, Some(Value::Array(kind, _))) => {
                let items = json
                    .as_array()
                    .ok_or_else(|| Error::mismatch(field.name(), ValueKind::Array, json_kind(json)))?;
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.extend(self.item(field, *kind, item)?);
                }
                Value::Array(*kind, values)
            }
            (ValueKind::Map, Some(Value::Map(key, val, _))) => {
                let mut pairs = Vec::new();
                match json {
                    Json::Object(object) => {
                        for (k, v) in object {
                            let k = self.item(field, *key, &Json::String(k.clone()))?;
                            let v = self.item(field, *val, v)?;
                            if let (Some(k), Some(v)) = (k, v) {
                                pairs.push((k, v));
                            }
                        }
                    }
                    Json::Array(entries) => {
                        for entry in entries {
                            let (Some(k), Some(v)) = (entry.get(0), entry.get(1)) else {
                                return Err(Error::mismatch(field.name(), "[key, value]", json_kind(entry)));
                            };
                            let k = self.item(field, *key, k)?;
                            let v = self.item(field, *val, v)?;
                            if let (Some(k), Some(v)) = (k, v) {
                                pairs.push((k, v));
                            }
                        }
                    }
                    other => return Err(Error::mismatch(field.name(), ValueKind::Map, json_kind(other))),
                }
                Value::Map(*key, *val, pairs)
            }
            (kind, _) => return self.item(field, kind, json),
        };
        Ok(Some(value))
    }

    // One non-collection value; `None` for an element of a skipped type.
    fn item(&mut self, field: &FieldDescriptor, kind: ValueKind, json: &Json) -> Result<Option<Value>> {
        match (kind, json) {
            (ValueKind::Element, Json::Null) => Ok(Some(Value::Element(None))),
            (ValueKind::Element, _) => Ok(self.element(json)?.map(|e| Value::Element(Some(e)))),
            _ => scalar(kind, json)
                .map(Some)
                .ok_or_else(|| Error::mismatch(field.name(), kind, json_kind(json))),
        }
    }

    fn finish(self) -> Result<Vec<ElementPtr>> {
        run_post_load(self.registry, &self.loaded, &self.post_order)
    }
}

fn scalar(kind: ValueKind, json: &Json) -> Option<Value> {
    let value = match kind {
        k if k.is_numeric() || k == ValueKind::Bool => return infer(json)?.cast(k),
        ValueKind::String => Value::String(json.as_str()?.to_owned()),
        ValueKind::Vec2 => Value::Vec2(Vec2::from_slice(&floats(json, 2)?)),
        ValueKind::Vec3 => Value::Vec3(Vec3::from_slice(&floats(json, 3)?)),
        ValueKind::Vec4 => Value::Vec4(Vec4::from_slice(&floats(json, 4)?)),
        ValueKind::Quat => Value::Quat(Quat::from_slice(&floats(json, 4)?)),
        ValueKind::Mat4 => Value::Mat4(Mat4::from_cols_slice(&floats(json, 16)?)),
        ValueKind::Enum => match json {
            Json::String(symbol) => Value::Symbol(symbol.clone()),
            other => Value::Enum(i32::try_from(other.as_i64()?).ok()?),
        },
        ValueKind::Reference => match json {
            Json::Null => Value::Reference(Uid::NULL),
            other => Value::Reference(other.get("ref")?.as_str()?.parse().ok()?),
        },
        _ => return None,
    };
    Some(value)
}

// Best-effort value for a field the type does not declare.
fn infer(json: &Json) -> Option<Value> {
    match json {
        Json::Bool(b) => Some(Value::Bool(*b)),
        Json::Number(n) => n
            .as_i64()
            .map(Value::I64)
            .or_else(|| n.as_u64().map(Value::U64))
            .or_else(|| n.as_f64().map(Value::F64)),
        Json::String(s) => Some(Value::String(s.clone())),
        _ => None,
    }
}

fn floats(json: &Json, count: usize) -> Option<Vec<f32>> {
    let items = json.as_array().filter(|a| a.len() == count)?;
    items.iter().map(|v| v.as_f64().map(|f| f as f32)).collect()
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

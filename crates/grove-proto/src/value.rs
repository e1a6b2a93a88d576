// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Result values and GraphSON decoding.
//!
//! The service answers with plain JSON or GraphSON v2 (`{"@type", "@value"}`
//! wrappers). Both decode into [`Value`]. Graph elements keep their
//! multi-valued properties as [`Value::Multi`] so a caller can tell a property
//! holding a list apart from a property holding several values.

use grove_query::{PartitionValue, ResultShape};
use serde::Serialize;
use serde_json::Value as Json;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A structured value returned by the service.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// JSON `null`.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// String.
    String(String),
    /// Ordered list.
    List(Vec<Value>),
    /// Keyed map (keys sorted).
    Map(BTreeMap<String, Value>),
    /// The values of one multi-valued property.
    Multi(Vec<Value>),
}

impl Value {
    /// Borrow a map entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Integer payload (floats with no fraction count too).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            #[allow(clippy::cast_possible_truncation)]
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// String payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// For a multi-valued property, its first value; otherwise `self`.
    pub fn first_value(&self) -> &Value {
        match self {
            Value::Multi(values) => values.first().unwrap_or(&Value::Null),
            other => other,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
            Value::List(_) => 4,
            Value::Multi(_) => 5,
            Value::Map(_) => 6,
        }
    }

    /// Decode a plain-JSON or GraphSON v2 value.
    pub fn from_json(json: &Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => n
                .as_i64()
                .map_or_else(|| Value::Float(n.as_f64().unwrap_or(f64::NAN)), Value::Int),
            Json::String(s) => Value::String(s.clone()),
            Json::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            Json::Object(obj) => {
                if let (Some(Json::String(ty)), Some(inner)) = (obj.get("@type"), obj.get("@value")) {
                    return from_typed(ty, inner);
                }
                let map: BTreeMap<String, Value> = obj
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect();
                element_properties(map)
            }
        }
    }
}

/// GraphSON v2 typed value.
fn from_typed(ty: &str, inner: &Json) -> Value {
    match ty {
        "g:Int32" | "g:Int64" | "g:Date" | "g:Timestamp" => inner
            .as_i64()
            .map_or_else(|| Value::from_json(inner), Value::Int),
        "g:Float" | "g:Double" => inner
            .as_f64()
            .map_or_else(|| Value::from_json(inner), Value::Float),
        "g:List" | "g:Set" => match inner {
            Json::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            other => Value::from_json(other),
        },
        "g:Map" => match inner {
            // flat [k1, v1, k2, v2, ...]
            Json::Array(items) => Value::Map(
                items
                    .chunks(2)
                    .filter_map(|pair| match pair {
                        [k, v] => Some((map_key(&Value::from_json(k)), Value::from_json(v))),
                        _ => None,
                    })
                    .collect(),
            ),
            other => Value::from_json(other),
        },
        "janusgraph:RelationIdentifier" => match inner {
            Json::Object(obj) => obj
                .get("relationId")
                .or_else(|| obj.get("value"))
                .map_or_else(|| Value::from_json(inner), Value::from_json),
            other => Value::from_json(other),
        },
        "g:Vertex" | "g:Edge" => {
            let mut decoded = Value::from_json(inner);
            if let Value::Map(map) = &mut decoded {
                let kind = if ty == "g:Vertex" { "vertex" } else { "edge" };
                map.entry("type".to_string())
                    .or_insert_with(|| Value::String(kind.to_string()));
                decoded = element_properties(std::mem::take(map));
            }
            decoded
        }
        _ => Value::from_json(inner),
    }
}

fn map_key(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Collapse element property arrays (`[{id, value}, ...]`) into [`Value::Multi`].
fn element_properties(mut map: BTreeMap<String, Value>) -> Value {
    let is_element = matches!(
        map.get("type").and_then(Value::as_str),
        Some("vertex" | "edge")
    );
    if is_element {
        if let Some(Value::Map(props)) = map.get_mut("properties") {
            for prop in props.values_mut() {
                if let Value::List(items) = prop {
                    let values = items
                        .iter()
                        .map(|item| item.get("value").cloned().unwrap_or_else(|| item.clone()))
                        .collect();
                    *prop = Value::Multi(values);
                }
            }
        }
    }
    Value::Map(map)
}

/// Decode one record of a response batch, applying the shape the query produces.
pub fn decode_record(json: &Json, shape: ResultShape) -> Value {
    let value = Value::from_json(json);
    match (shape, value) {
        (ResultShape::PropertyMap, Value::Map(map)) => Value::Map(
            map.into_iter()
                .map(|(k, v)| match v {
                    Value::List(items) if k != "id" && k != "label" => (k, Value::Multi(items)),
                    other => (k, other),
                })
                .collect(),
        ),
        (_, value) => value,
    }
}

impl From<&PartitionValue> for Value {
    fn from(value: &PartitionValue) -> Self {
        match value {
            PartitionValue::Bool(b) => Value::Bool(*b),
            PartitionValue::Int(n) => Value::Int(*n),
            PartitionValue::String(s) => Value::String(s.clone()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

#[allow(clippy::cast_precision_loss)]
fn cmp_numbers(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Int(x), Value::Float(y)) => (*x as f64).total_cmp(y),
        (Value::Float(x), Value::Int(y)) => x.total_cmp(&(*y as f64)),
        (Value::Float(x), Value::Float(y)) => x.total_cmp(y),
        _ => Ordering::Equal,
    }
}

impl Ord for Value {
    /// Total order: type rank first (null < bool < number < string < list <
    /// multi < map), then by value.
    fn cmp(&self, other: &Self) -> Ordering {
        match self.rank().cmp(&other.rank()) {
            Ordering::Equal => {}
            unequal => return unequal,
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) | (Value::Multi(a), Value::Multi(b)) => a.cmp(b),
            (Value::Map(a), Value::Map(b)) => a.iter().cmp(b.iter()),
            (a, b) => cmp_numbers(a, b),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

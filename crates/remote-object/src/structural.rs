//! Case-insensitive structural decoding.
//!
//! Page scripts rarely agree with Rust on field casing (`Width`, `width`,
//! `WIDTH`). Before handing an object to serde we ask the target type for
//! its field names and rename top-level keys that match ignoring ASCII case.

use std::fmt;

use serde::de::{self, DeserializeOwned, Deserializer, Visitor};
use serde::forward_to_deserialize_any;
use serde_json::{Map, Value};

use crate::error::CoercionError;

/// Deserialize `value` into `T`, matching top-level object keys to `T`'s
/// field names without regard to ASCII case. Exact matches win over
/// case-insensitive ones.
pub fn from_json_case_insensitive<T: DeserializeOwned>(value: Value) -> Result<T, CoercionError> {
    let value = match value {
        Value::Object(map) => match struct_fields::<T>() {
            Some(fields) => Value::Object(rename_keys(map, fields)),
            None => Value::Object(map),
        },
        other => other,
    };
    serde_json::from_value(value).map_err(|err| CoercionError::Deserialize(err.to_string()))
}

/// Field names `T` declares when it deserializes as a struct.
pub fn struct_fields<T: DeserializeOwned>() -> Option<&'static [&'static str]> {
    let mut fields = None;
    let _ = T::deserialize(FieldCollector {
        fields: &mut fields,
    });
    fields
}

fn rename_keys(map: Map<String, Value>, fields: &'static [&'static str]) -> Map<String, Value> {
    let mut out = Map::with_capacity(map.len());
    let mut pending = Vec::new();

    for (key, value) in map {
        if fields.iter().any(|field| *field == key) {
            out.insert(key, value);
        } else {
            pending.push((key, value));
        }
    }

    for (key, value) in pending {
        match fields.iter().find(|field| field.eq_ignore_ascii_case(&key)) {
            Some(field) if !out.contains_key(*field) => {
                out.insert((*field).to_string(), value);
            }
            Some(_) => {}
            None => {
                out.insert(key, value);
            }
        }
    }
    out
}

/// A deserializer that only records the field list handed to
/// `deserialize_struct`, then bails out.
struct FieldCollector<'a> {
    fields: &'a mut Option<&'static [&'static str]>,
}

#[derive(Debug)]
struct FieldsCollected;

impl fmt::Display for FieldsCollected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("field names collected")
    }
}

impl std::error::Error for FieldsCollected {}

impl de::Error for FieldsCollected {
    fn custom<M: fmt::Display>(_msg: M) -> Self {
        FieldsCollected
    }
}

impl<'de, 'a> Deserializer<'de> for FieldCollector<'a> {
    type Error = FieldsCollected;

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        Err(FieldsCollected)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        *self.fields = Some(fields);
        Err(FieldsCollected)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map enum identifier ignored_any
    }
}

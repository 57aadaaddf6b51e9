//! Forgiving field decoders.
//!
//! Documents are schema-less, so every field is decoded through one of
//! these: wrong or missing shapes become the field's default instead of
//! failing the whole record.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::edit::{parse_float_prefix, parse_int_prefix, split_list};

pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

/// Numbers, numeric strings (`"1200.50"`), anything else is 0
pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => parse_float_prefix(&s).unwrap_or(0.0),
        _ => 0.0,
    })
}

pub fn integer<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => parse_int_prefix(&s).unwrap_or(0),
        _ => 0,
    })
}

/// Array of names, or a comma separated string
pub fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s),
                _ => None,
            })
            .collect(),
        Value::String(s) => split_list(&s),
        _ => Vec::new(),
    })
}

/// Decode `T`, falling back to its default
pub fn or_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(d)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Array of `T`; elements that fail to decode are dropped
pub fn list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    log::warn!("Skipping malformed nested item: {}", e);
                    None
                }
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// Like [`list`], but `None` when the field is absent or not an array
pub fn optional_list<'de, D, T>(d: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(d)? {
        value @ Value::Array(_) => list(value).map(Some).map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

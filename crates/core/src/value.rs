//! Portable value type for Strata.
//!
//! `JsonValue` is the JSON-like container every bound, range and expression
//! snapshot is serialized into. It carries a total order (`compare_values`)
//! shared by all bound-strength and disjointness decisions, and structural
//! equality used to detect identical constraints.

use crate::error::{Error, Result};
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A JSON value.
#[derive(Clone, Debug, Default)]
pub enum JsonValue {
    /// JSON null
    #[default]
    Null,
    /// JSON boolean
    Bool(bool),
    /// JSON number (stored as f64)
    Number(f64),
    /// JSON string
    String(String),
    /// JSON array
    Array(Vec<JsonValue>),
    /// JSON object with sorted keys
    Object(JsonObject),
}

/// Members of a JSON object.
///
/// Keys are unique and iterate in byte order, which is the order
/// `compare_values` walks objects in and the order the text form writes them,
/// so two objects with the same members always serialize identically
/// regardless of how they were built.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JsonObject {
    members: BTreeMap<String, JsonValue>,
}

impl JsonObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of members.
    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.members.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.members.contains_key(key)
    }

    /// Sets a member. A later write to the same key wins, which is also how
    /// duplicate keys in parsed text resolve.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.members.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<JsonValue> {
        self.members.remove(key)
    }

    /// Chained form of `insert`, used to spell out serialized shapes:
    ///
    /// ```
    /// use strata_core::JsonObject;
    ///
    /// let bound = JsonObject::new().with("include", true).with("bound", 3);
    /// assert_eq!(bound.keys().collect::<Vec<_>>(), ["bound", "include"]);
    /// ```
    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    /// Members in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &JsonValue)> {
        self.members.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<JsonValue>> FromIterator<(K, V)> for JsonObject {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            members: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl JsonValue {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, JsonValue::Null)
    }

    #[inline]
    pub fn is_object(&self) -> bool {
        matches!(self, JsonValue::Object(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            JsonValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            JsonValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsonValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<JsonValue>> {
        match self {
            JsonValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&JsonObject> {
        match self {
            JsonValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Gets a value by key if this is an Object.
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.as_object().and_then(|obj| obj.get(key))
    }

    /// Reads a required boolean member of an object.
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.get(key)
            .and_then(JsonValue::as_bool)
            .ok_or_else(|| Error::malformed(format!("expected boolean attribute '{}'", key)))
    }

    /// Reads a required string member of an object.
    pub fn get_str(&self, key: &str) -> Result<&str> {
        self.get(key)
            .and_then(JsonValue::as_str)
            .ok_or_else(|| Error::malformed(format!("expected string attribute '{}'", key)))
    }

    /// Reads a required array member of an object.
    pub fn get_array(&self, key: &str) -> Result<&Vec<JsonValue>> {
        self.get(key)
            .and_then(JsonValue::as_array)
            .ok_or_else(|| Error::malformed(format!("expected array attribute '{}'", key)))
    }

    /// Serializes to canonical JSON text.
    ///
    /// JSON has no spelling for NaN or the infinities, so a value holding a
    /// non-finite number is rejected with `MalformedData` instead of being
    /// written as `null`.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::malformed(e.to_string()))
    }

    /// Returns true if no number anywhere in the value is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        match self {
            JsonValue::Number(n) => n.is_finite(),
            JsonValue::Array(arr) => arr.iter().all(JsonValue::is_finite),
            JsonValue::Object(obj) => obj.iter().all(|(_, v)| v.is_finite()),
            JsonValue::Null | JsonValue::Bool(_) | JsonValue::String(_) => true,
        }
    }

    /// Parses JSON text.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::malformed(e.to_string()))
    }

    fn type_order(&self) -> u8 {
        match self {
            JsonValue::Null => 0,
            JsonValue::Bool(_) => 1,
            JsonValue::Number(_) => 2,
            JsonValue::String(_) => 3,
            JsonValue::Array(_) => 4,
            JsonValue::Object(_) => 5,
        }
    }
}

/// Three-way comparison under the total order shared by the whole engine:
/// `null < bool < number < string < array < object`.
///
/// NaN sorts above every other number and equal to itself.
pub fn compare_values(lhs: &JsonValue, rhs: &JsonValue) -> Ordering {
    match (lhs, rhs) {
        (JsonValue::Null, JsonValue::Null) => Ordering::Equal,
        (JsonValue::Bool(a), JsonValue::Bool(b)) => a.cmp(b),
        (JsonValue::Number(a), JsonValue::Number(b)) => match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        },
        (JsonValue::String(a), JsonValue::String(b)) => a.as_bytes().cmp(b.as_bytes()),
        (JsonValue::Array(a), JsonValue::Array(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                let cmp = compare_values(x, y);
                if cmp != Ordering::Equal {
                    return cmp;
                }
            }
            a.len().cmp(&b.len())
        }
        (JsonValue::Object(a), JsonValue::Object(b)) => {
            for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                let cmp = ka.as_bytes().cmp(kb.as_bytes());
                if cmp != Ordering::Equal {
                    return cmp;
                }
                let cmp = compare_values(va, vb);
                if cmp != Ordering::Equal {
                    return cmp;
                }
            }
            a.len().cmp(&b.len())
        }
        _ => lhs.type_order().cmp(&rhs.type_order()),
    }
}

impl PartialEq for JsonValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (JsonValue::Null, JsonValue::Null) => true,
            (JsonValue::Bool(a), JsonValue::Bool(b)) => a == b,
            (JsonValue::Number(a), JsonValue::Number(b)) => {
                (a.is_nan() && b.is_nan()) || a == b
            }
            (JsonValue::String(a), JsonValue::String(b)) => a == b,
            (JsonValue::Array(a), JsonValue::Array(b)) => a == b,
            (JsonValue::Object(a), JsonValue::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for JsonValue {}

impl PartialOrd for JsonValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for JsonValue {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_values(self, other)
    }
}

impl fmt::Display for JsonValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_json_string() {
            Ok(text) => f.write_str(&text),
            // Not valid JSON, but keeps NaN and the infinities visible.
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

// Integral numbers within the exactly representable range are written
// without a fraction so `18` stays `18` across a round trip.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

impl Serialize for JsonValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        match self {
            JsonValue::Null => serializer.serialize_unit(),
            JsonValue::Bool(b) => serializer.serialize_bool(*b),
            JsonValue::Number(n) if !n.is_finite() => {
                Err(<S::Error as serde::ser::Error>::custom(format!(
                    "non-finite number {} has no JSON text form",
                    n
                )))
            }
            JsonValue::Number(n) => {
                if (-MAX_EXACT_INTEGER..=MAX_EXACT_INTEGER).contains(n) && *n == (*n as i64) as f64 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            JsonValue::String(s) => serializer.serialize_str(s),
            JsonValue::Array(arr) => {
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for item in arr {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            JsonValue::Object(obj) => {
                let mut map = serializer.serialize_map(Some(obj.len()))?;
                for (k, v) in obj.iter() {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

struct JsonValueVisitor;

impl<'de> Visitor<'de> for JsonValueVisitor {
    type Value = JsonValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_unit<E: de::Error>(self) -> core::result::Result<JsonValue, E> {
        Ok(JsonValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> core::result::Result<JsonValue, E> {
        Ok(JsonValue::Null)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> core::result::Result<JsonValue, E> {
        Ok(JsonValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> core::result::Result<JsonValue, E> {
        Ok(JsonValue::Number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> core::result::Result<JsonValue, E> {
        Ok(JsonValue::Number(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> core::result::Result<JsonValue, E> {
        Ok(JsonValue::Number(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> core::result::Result<JsonValue, E> {
        Ok(JsonValue::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> core::result::Result<JsonValue, E> {
        Ok(JsonValue::String(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> core::result::Result<JsonValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(JsonValue::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> core::result::Result<JsonValue, A::Error> {
        let mut obj = JsonObject::new();
        while let Some((key, value)) = map.next_entry::<String, JsonValue>()? {
            obj.insert(key, value);
        }
        Ok(JsonValue::Object(obj))
    }
}

impl<'de> Deserialize<'de> for JsonValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        deserializer.deserialize_any(JsonValueVisitor)
    }
}

impl From<bool> for JsonValue {
    fn from(v: bool) -> Self {
        JsonValue::Bool(v)
    }
}

impl From<i32> for JsonValue {
    fn from(v: i32) -> Self {
        JsonValue::Number(v as f64)
    }
}

impl From<i64> for JsonValue {
    fn from(v: i64) -> Self {
        JsonValue::Number(v as f64)
    }
}

impl From<f64> for JsonValue {
    fn from(v: f64) -> Self {
        JsonValue::Number(v)
    }
}

impl From<String> for JsonValue {
    fn from(v: String) -> Self {
        JsonValue::String(v)
    }
}

impl From<&str> for JsonValue {
    fn from(v: &str) -> Self {
        JsonValue::String(v.to_string())
    }
}

impl From<Vec<JsonValue>> for JsonValue {
    fn from(v: Vec<JsonValue>) -> Self {
        JsonValue::Array(v)
    }
}

impl From<JsonObject> for JsonValue {
    fn from(v: JsonObject) -> Self {
        JsonValue::Object(v)
    }
}

impl<T> From<Option<T>> for JsonValue
where
    T: Into<JsonValue>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => JsonValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_object_sorted_keys() {
        let mut obj = JsonObject::new();
        obj.insert("z", 1);
        obj.insert("a", 2);
        obj.insert("m", 3);

        let keys: Vec<_> = obj.keys().collect();
        assert_eq!(keys, vec!["a", "m", "z"]);
        assert_eq!(obj.get("a"), Some(&JsonValue::Number(2.0)));
    }

    #[test]
    fn test_object_remove() {
        let mut obj = JsonObject::new().with("key", 42);
        assert!(obj.contains_key("key"));
        assert_eq!(obj.remove("key"), Some(JsonValue::Number(42.0)));
        assert!(obj.is_empty());
    }

    #[test]
    fn test_type_order() {
        let ordered = vec![
            JsonValue::Null,
            JsonValue::Bool(false),
            JsonValue::Bool(true),
            JsonValue::Number(-1.0),
            JsonValue::Number(f64::NAN),
            JsonValue::from(""),
            JsonValue::from("a"),
            JsonValue::Array(vec![]),
            JsonValue::Array(vec![JsonValue::Null]),
            JsonValue::Object(JsonObject::new()),
        ];
        for pair in ordered.windows(2) {
            assert_eq!(compare_values(&pair[0], &pair[1]), Ordering::Less, "{:?}", pair);
        }
    }

    #[test]
    fn test_array_ordering() {
        let short = JsonValue::from(vec![JsonValue::from(1)]);
        let long = JsonValue::from(vec![JsonValue::from(1), JsonValue::from(0)]);
        let bigger = JsonValue::from(vec![JsonValue::from(2)]);
        assert!(short < long);
        assert!(long < bigger);
    }

    #[test]
    fn test_nan_equality() {
        assert_eq!(JsonValue::Number(f64::NAN), JsonValue::Number(f64::NAN));
        assert_eq!(
            compare_values(&JsonValue::Number(f64::NAN), &JsonValue::Number(f64::NAN)),
            Ordering::Equal
        );
    }

    #[test]
    fn test_text_round_trip() {
        let value = JsonValue::Object(
            JsonObject::new()
                .with("bound", 18)
                .with("include", true)
                .with("name", "x")
                .with("ratio", 0.5),
        );
        let text = value.to_json_string().unwrap();
        assert_eq!(text, r#"{"bound":18,"include":true,"name":"x","ratio":0.5}"#);
        let parsed = JsonValue::parse(&text).unwrap();
        assert_eq!(parsed, value);
        assert_eq!(parsed.to_json_string().unwrap(), text);
    }

    #[test]
    fn test_non_finite_has_no_text_form() {
        for n in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let bound = JsonValue::Object(
                JsonObject::new()
                    .with("bound", n)
                    .with("include", true)
                    .with("isConstant", true),
            );
            assert!(!bound.is_finite());
            assert!(matches!(
                bound.to_json_string(),
                Err(Error::MalformedData { .. })
            ));
            assert!(bound.to_string().contains("Number("));
        }
        let nested = JsonValue::from(vec![JsonValue::from(1), JsonValue::Number(f64::NAN)]);
        assert!(nested.to_json_string().is_err());
        assert!(JsonValue::from(vec![JsonValue::from(1.5)]).is_finite());
    }

    #[test]
    fn test_object_from_iter_last_write_wins() {
        let obj: JsonObject = [("b", 1), ("a", 2), ("b", 3)].into_iter().collect();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(obj.get("b"), Some(&JsonValue::from(3)));

        let parsed = JsonValue::parse(r#"{"k":1,"k":2}"#).unwrap();
        assert_eq!(parsed.get("k"), Some(&JsonValue::from(2)));
    }

    #[test]
    fn test_required_members() {
        let value = JsonValue::Object(JsonObject::new().with("include", true));
        assert!(value.get_bool("include").unwrap());
        assert!(matches!(
            value.get_bool("isConstant"),
            Err(Error::MalformedData { .. })
        ));
        assert!(value.get_str("include").is_err());
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            JsonValue::parse("{\"a\":"),
            Err(Error::MalformedData { .. })
        ));
    }
}

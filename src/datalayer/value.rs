//! Value types for host-page data and flat tracking parameters

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A zero-argument producer evaluated lazily by the flattener.
pub type LazyFn = Arc<dyn Fn() -> DataValue + Send + Sync>;

/// Arbitrary host-page data, e.g. a tag manager's data layer.
///
/// Objects keep their insertion order so that key collisions during
/// flattening resolve the same way the host declared them.
#[derive(Clone, Default)]
pub enum DataValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<DataValue>),
    Object(Vec<(String, DataValue)>),
    Lazy(LazyFn),
}

impl DataValue {
    pub fn lazy<F>(f: F) -> Self
    where
        F: Fn() -> DataValue + Send + Sync + 'static,
    {
        DataValue::Lazy(Arc::new(f))
    }

    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, DataValue)>,
    {
        let mut object = DataValue::Object(Vec::new());
        for (key, value) in entries {
            object.insert(key, value);
        }
        object
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, DataValue::Undefined)
    }

    /// Borrow the member addressed by a single path segment. Objects are
    /// keyed by name, arrays by decimal index; nothing else has members.
    pub fn get(&self, key: &str) -> Option<&DataValue> {
        match self {
            DataValue::Object(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            DataValue::Array(items) => key.parse::<usize>().ok().and_then(|index| items.get(index)),
            _ => None,
        }
    }

    /// Member lookup by a single path segment.
    pub fn member(&self, key: &str) -> DataValue {
        self.get(key).cloned().unwrap_or_default()
    }

    /// Insert or overwrite a property. No-op unless `self` is an object.
    pub fn insert(&mut self, key: impl Into<String>, value: DataValue) {
        if let DataValue::Object(entries) = self {
            let key = key.into();
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => entries.push((key, value)),
            }
        }
    }
}

impl fmt::Debug for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Undefined => f.write_str("Undefined"),
            DataValue::Null => f.write_str("Null"),
            DataValue::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            DataValue::Number(n) => f.debug_tuple("Number").field(n).finish(),
            DataValue::String(s) => f.debug_tuple("String").field(s).finish(),
            DataValue::Array(items) => f.debug_list().entries(items).finish(),
            DataValue::Object(entries) => f
                .debug_map()
                .entries(entries.iter().map(|(k, v)| (k, v)))
                .finish(),
            DataValue::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

impl From<serde_json::Value> for DataValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => DataValue::Null,
            Value::Bool(b) => DataValue::Bool(b),
            Value::Number(n) => n
                .as_f64()
                .map(DataValue::Number)
                .unwrap_or_else(|| DataValue::String(n.to_string())),
            Value::String(s) => DataValue::String(s),
            Value::Array(items) => DataValue::Array(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                DataValue::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        DataValue::String(value.to_string())
    }
}

impl From<String> for DataValue {
    fn from(value: String) -> Self {
        DataValue::String(value)
    }
}

impl From<f64> for DataValue {
    fn from(value: f64) -> Self {
        DataValue::Number(value)
    }
}

impl From<bool> for DataValue {
    fn from(value: bool) -> Self {
        DataValue::Bool(value)
    }
}

/// A scalar tracking parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl ParamValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, ParamValue::Undefined)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Renders the value the way the browser stringifies it for a query string.
impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Undefined => f.write_str("undefined"),
            ParamValue::Null => f.write_str("null"),
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Number(n) => f.write_str(&number_to_string(*n)),
            ParamValue::String(s) => f.write_str(s),
        }
    }
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParamValue::Undefined | ParamValue::Null => serializer.serialize_none(),
            ParamValue::Bool(b) => serializer.serialize_bool(*b),
            ParamValue::Number(n) => serializer.serialize_f64(*n),
            ParamValue::String(s) => serializer.serialize_str(s),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::String(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        ParamValue::Number(value as f64)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<Option<String>> for ParamValue {
    fn from(value: Option<String>) -> Self {
        value.map(ParamValue::String).unwrap_or(ParamValue::Undefined)
    }
}

/// Flat key to scalar mapping handed to delivery.
pub type ParamSet = BTreeMap<String, ParamValue>;

/// Number to string as `String(n)` does in the browser.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        n.to_string()
    }
}

/// `Number.prototype.toFixed(2)` rendering.
///
/// Differs from `format!("{:.2}")` in three places: non-finite values are
/// spelled out, negative zero prints as `0.00`, and exact ties round away
/// from zero.
pub fn to_fixed_2(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0.00".to_string();
    }

    let magnitude = n.abs();
    let scaled = magnitude * 100.0;
    // Only multiples of 1/8 can sit exactly on a two-decimal tie.
    let is_tie = (magnitude * 8.0).fract() == 0.0 && scaled.fract() == 0.5;
    let rounded = if is_tie {
        format!("{:.2}", scaled.ceil() / 100.0)
    } else {
        format!("{magnitude:.2}")
    };

    if n < 0.0 {
        format!("-{rounded}")
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_fixed_matches_browser_rendering() {
        assert_eq!(to_fixed_2(0.5), "0.50");
        assert_eq!(to_fixed_2(-0.0), "0.00");
        assert_eq!(to_fixed_2(f64::NAN), "NaN");
        assert_eq!(to_fixed_2(f64::INFINITY), "Infinity");
        assert_eq!(to_fixed_2(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(to_fixed_2(0.125), "0.13");
        assert_eq!(to_fixed_2(0.875), "0.88");
        assert_eq!(to_fixed_2(-0.125), "-0.13");
        assert_eq!(to_fixed_2(1.005), "1.00");
        assert_eq!(to_fixed_2(-0.001), "-0.00");
        assert_eq!(to_fixed_2(1.0 - 2.0 / 3.0), "0.33");
    }

    #[test]
    fn test_number_to_string() {
        assert_eq!(number_to_string(2.0), "2");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(0.25), "0.25");
        assert_eq!(number_to_string(f64::NAN), "NaN");
    }

    #[test]
    fn test_member_lookup() {
        let value = DataValue::object([
            ("a", DataValue::from("x")),
            ("list", DataValue::Array(vec!["p".into(), "q".into()])),
        ]);

        assert!(matches!(value.member("a"), DataValue::String(s) if s == "x"));
        assert!(matches!(value.member("list").member("1"), DataValue::String(s) if s == "q"));
        assert!(value.member("missing").is_undefined());
        assert!(value.member("a").member("length").is_undefined());
    }

    #[test]
    fn test_get_borrows_from_source() {
        let value = DataValue::from(serde_json::json!({"a": {"b": [1, 2]}}));
        let DataValue::Object(entries) = &value else {
            panic!("expected object");
        };

        let a = value.get("a").unwrap();
        assert!(std::ptr::eq(a, &entries[0].1));
        assert!(matches!(a.get("b").and_then(|b| b.get("1")), Some(DataValue::Number(n)) if *n == 2.0));
        assert!(a.get("b").and_then(|b| b.get("2")).is_none());
        assert!(DataValue::from("s").get("0").is_none());
    }

    #[test]
    fn test_insert_overwrites_in_place() {
        let mut value = DataValue::object([("a", DataValue::from(1.0)), ("b", DataValue::from(2.0))]);
        value.insert("a", DataValue::from(3.0));

        let DataValue::Object(entries) = value else {
            panic!("expected object");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "a");
        assert!(matches!(entries[0].1, DataValue::Number(n) if n == 3.0));
    }
}

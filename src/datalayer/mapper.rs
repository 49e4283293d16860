//! Dotted-path extraction and flattening of host-page data

use serde::Deserialize;

use super::value::{DataValue, ParamSet, ParamValue};

/// Ordered `output_key -> dotted.path` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "serde_json::Map<String, serde_json::Value>")]
pub struct Mapping(Vec<(String, String)>);

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, output_key: impl Into<String>, path: impl Into<String>) -> Self {
        self.0.push((output_key.into(), path.into()));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, p)| (k.as_str(), p.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, P> FromIterator<(K, P)> for Mapping
where
    K: Into<String>,
    P: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, P)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, p)| (k.into(), p.into())).collect())
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Mapping {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        // Non-string paths cannot address anything; they resolve to undefined.
        map.into_iter()
            .map(|(key, path)| {
                let path = match path {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, path)
            })
            .collect()
    }
}

/// Resolve a dotted path such as `"ecommerce.purchase.id"` against `source`.
///
/// Empty segments are ignored, so `"a..b"` and `"a.b"` address the same value.
pub fn extract(source: &DataValue, path: &str) -> DataValue {
    let mut current = source;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        if matches!(current, DataValue::Undefined | DataValue::Null) {
            break;
        }
        match current.get(segment) {
            Some(member) => current = member,
            None => return DataValue::Undefined,
        }
    }
    current.clone()
}

/// Collapse `value` into underscore-joined keys.
pub fn flatten(value: &DataValue) -> ParamSet {
    let mut flat = ParamSet::new();
    flatten_into(value, "", &mut flat);
    flat
}

fn flatten_into(value: &DataValue, prefix: &str, flat: &mut ParamSet) {
    match value {
        DataValue::Lazy(produce) => flatten_into(&produce(), prefix, flat),
        DataValue::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten_into(item, &format!("{prefix}_{index}"), flat);
            }
        }
        DataValue::Object(entries) => {
            for (key, item) in entries {
                let key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}_{key}")
                };
                flatten_into(item, &key, flat);
            }
        }
        DataValue::Undefined => {
            flat.insert(prefix.to_string(), ParamValue::Undefined);
        }
        DataValue::Null => {
            flat.insert(prefix.to_string(), ParamValue::Null);
        }
        DataValue::Bool(b) => {
            flat.insert(prefix.to_string(), ParamValue::Bool(*b));
        }
        DataValue::Number(n) => {
            flat.insert(prefix.to_string(), ParamValue::Number(*n));
        }
        DataValue::String(s) => {
            flat.insert(prefix.to_string(), ParamValue::String(s.clone()));
        }
    }
}

/// Project `source` through `mapping` and flatten the result.
///
/// With `include_all`, every top-level property of `source` is copied first;
/// mapped keys are written afterwards and win on collision.
pub fn map_and_flatten(source: &DataValue, mapping: &Mapping, include_all: bool) -> ParamSet {
    let mut mapped = DataValue::Object(Vec::new());

    if include_all {
        if let DataValue::Object(entries) = source {
            for (key, value) in entries {
                mapped.insert(key.clone(), value.clone());
            }
        }
    }

    for (output_key, path) in mapping.iter() {
        mapped.insert(output_key, extract(source, path));
    }

    flatten(&mapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nested() -> DataValue {
        json!({"a": {"b": {"c": "x"}}}).into()
    }

    fn fixture() -> DataValue {
        DataValue::object([(
            "a",
            DataValue::object([
                (
                    "b",
                    DataValue::from(json!({"c": "x", "d": "y", "e": ["foo", "bar"]})),
                ),
                (
                    "bb",
                    DataValue::lazy(|| DataValue::from(json!({"hello": "world!"}))),
                ),
            ]),
        )])
    }

    #[test]
    fn test_extract_walks_path() {
        assert!(matches!(extract(&nested(), "a.b.c"), DataValue::String(s) if s == "x"));
    }

    #[test]
    fn test_extract_missing_segment_is_undefined() {
        assert!(extract(&nested(), "a.b.z").is_undefined());
        assert!(extract(&nested(), "z.y.x").is_undefined());
    }

    #[test]
    fn test_extract_ignores_empty_segments() {
        assert!(matches!(extract(&nested(), ".a..b.c."), DataValue::String(s) if s == "x"));
    }

    #[test]
    fn test_extract_empty_path_returns_source() {
        assert!(matches!(extract(&nested(), ""), DataValue::Object(_)));
    }

    #[test]
    fn test_extract_stops_at_null() {
        let source: DataValue = json!({"a": null}).into();
        assert!(matches!(extract(&source, "a.b.c"), DataValue::Null));
    }

    #[test]
    fn test_extract_does_not_invoke_lazy() {
        let source = DataValue::object([("f", DataValue::lazy(|| panic!("invoked")))]);
        assert!(matches!(extract(&source, "f"), DataValue::Lazy(_)));
        assert!(extract(&source, "f.x").is_undefined());
    }

    #[test]
    fn test_extract_shares_lazy_producer_with_source() {
        let producer: crate::datalayer::value::LazyFn = std::sync::Arc::new(|| DataValue::from("v"));
        let source = DataValue::object([(
            "outer",
            DataValue::object([("f", DataValue::Lazy(producer.clone()))]),
        )]);

        let DataValue::Lazy(found) = extract(&source, "outer.f") else {
            panic!("expected lazy value");
        };
        assert!(std::sync::Arc::ptr_eq(&found, &producer));
    }

    #[test]
    fn test_flatten_nested_arrays_and_objects() {
        let flat = flatten(&json!({"a": {"b": [1, {"c": true}]}, "d": "e"}).into());

        assert_eq!(flat.get("a_b_0"), Some(&ParamValue::Number(1.0)));
        assert_eq!(flat.get("a_b_1_c"), Some(&ParamValue::Bool(true)));
        assert_eq!(flat.get("d"), Some(&ParamValue::from("e")));
        assert_eq!(flat.len(), 3);
    }

    #[test]
    fn test_flatten_top_level_array_keeps_leading_underscore() {
        let flat = flatten(&json!(["x", "y"]).into());
        assert_eq!(flat.get("_0"), Some(&ParamValue::from("x")));
        assert_eq!(flat.get("_1"), Some(&ParamValue::from("y")));
    }

    #[test]
    fn test_flatten_scalar_at_empty_prefix() {
        let flat = flatten(&DataValue::from("lonely"));
        assert_eq!(flat.get(""), Some(&ParamValue::from("lonely")));
    }

    #[test]
    fn test_flatten_empty_containers_contribute_nothing() {
        assert!(flatten(&json!({"a": {}, "b": []}).into()).is_empty());
    }

    #[test]
    fn test_flatten_collision_last_write_wins() {
        let value = DataValue::object([
            ("a_b", DataValue::from("first")),
            ("a", DataValue::from(json!({"b": "second"}))),
        ]);
        assert_eq!(flatten(&value).get("a_b"), Some(&ParamValue::from("second")));
    }

    #[test]
    fn test_flatten_is_idempotent_on_flat_input() {
        let flat_input: DataValue =
            json!({"a": "1", "b_c": 2, "d": null, "e": false}).into();
        let once = flatten(&flat_input);

        let again = DataValue::object(once.iter().map(|(k, v)| {
            let value = match v {
                ParamValue::Undefined => DataValue::Undefined,
                ParamValue::Null => DataValue::Null,
                ParamValue::Bool(b) => DataValue::Bool(*b),
                ParamValue::Number(n) => DataValue::Number(*n),
                ParamValue::String(s) => DataValue::String(s.clone()),
            };
            (k.clone(), value)
        }));

        assert_eq!(flatten(&again), once);
    }

    #[test]
    fn test_map_and_flatten_only_mapped_keys() {
        let source: DataValue = json!({"a": {"b": "x"}, "other": 1}).into();
        let mapping = Mapping::new().with("foo", "a.b");

        let flat = map_and_flatten(&source, &mapping, false);

        assert_eq!(flat.len(), 1);
        assert_eq!(flat.get("foo"), Some(&ParamValue::from("x")));
    }

    #[test]
    fn test_map_and_flatten_fixture() {
        let mapping = Mapping::new()
            .with("a", "a.b.c")
            .with("b", "a.b")
            .with("c", "a.bb")
            .with("d", "z.xy");

        let flat = map_and_flatten(&fixture(), &mapping, false);

        assert_eq!(flat.get("a"), Some(&ParamValue::from("x")));
        assert_eq!(flat.get("b_c"), Some(&ParamValue::from("x")));
        assert_eq!(flat.get("b_d"), Some(&ParamValue::from("y")));
        assert_eq!(flat.get("b_e_0"), Some(&ParamValue::from("foo")));
        assert_eq!(flat.get("b_e_1"), Some(&ParamValue::from("bar")));
        assert_eq!(flat.get("c_hello"), Some(&ParamValue::from("world!")));
        assert_eq!(flat.get("d"), Some(&ParamValue::Undefined));
    }

    #[test]
    fn test_map_and_flatten_mapping_wins_over_include_all() {
        let source: DataValue = json!({"page": "home", "user": {"id": 7}}).into();
        let mapping = Mapping::new().with("page", "user.id");

        let flat = map_and_flatten(&source, &mapping, true);

        assert_eq!(flat.get("page"), Some(&ParamValue::Number(7.0)));
        assert_eq!(flat.get("user_id"), Some(&ParamValue::Number(7.0)));
    }

    #[test]
    fn test_mapping_deserializes_in_declaration_order() {
        let mapping: Mapping = serde_json::from_str(r#"{"z": "a.b", "a": "c"}"#).unwrap();
        let pairs: Vec<_> = mapping.iter().collect();
        assert_eq!(pairs, vec![("z", "a.b"), ("a", "c")]);
    }
}

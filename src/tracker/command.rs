//! Host-page command queue
//!
//! Pages talk to the tracker by pushing JSON arrays such as
//! `["set", "product", "shoe"]` or `["track"]` onto a queue. Older tags
//! pushed a single object instead; [`legacy::make_compatible`] rewrites those.

use serde_json::Value;
use thiserror::Error;

use crate::ab::GroupWeights;
use crate::datalayer::{DataValue, Mapping};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command must be a non-empty array")]
    NotAnArray,

    #[error("command method must be a string")]
    MissingMethod,

    #[error("`{method}` expects an argument at position {position}")]
    MissingArgument { method: &'static str, position: usize },

    #[error("invalid argument for `{method}`: {reason}")]
    InvalidArgument { method: &'static str, reason: String },
}

/// A parsed queue entry
#[derive(Debug, Clone)]
pub enum Command {
    Set {
        key: String,
        value: DataValue,
    },
    Map {
        source: DataValue,
        mapping: Mapping,
        include_all: bool,
    },
    Remote(String),
    Ab(Option<GroupWeights>),
    Track,
    /// Methods this tracker does not implement (`group`, `event`, ...)
    Unknown(String),
}

impl Command {
    pub fn method(&self) -> &str {
        match self {
            Command::Set { .. } => "set",
            Command::Map { .. } => "map",
            Command::Remote(_) => "remote",
            Command::Ab(_) => "ab",
            Command::Track => "track",
            Command::Unknown(method) => method,
        }
    }
}

impl TryFrom<Value> for Command {
    type Error = CommandError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Array(items) = value else {
            return Err(CommandError::NotAnArray);
        };
        let mut items = items.into_iter();
        let method = match items.next() {
            Some(Value::String(method)) => method,
            Some(_) => return Err(CommandError::MissingMethod),
            None => return Err(CommandError::NotAnArray),
        };
        let args: Vec<Value> = items.collect();

        let command = match method.as_str() {
            "set" => {
                let key = match args.first() {
                    Some(Value::String(key)) => key.clone(),
                    Some(other) => {
                        return Err(CommandError::InvalidArgument {
                            method: "set",
                            reason: format!("key must be a string, got {other}"),
                        })
                    }
                    None => {
                        return Err(CommandError::MissingArgument {
                            method: "set",
                            position: 1,
                        })
                    }
                };
                let value = args.get(1).cloned().map(DataValue::from).unwrap_or_default();
                Command::Set { key, value }
            }
            "map" => {
                let source = args.first().cloned().ok_or(CommandError::MissingArgument {
                    method: "map",
                    position: 1,
                })?;
                let mapping = match args.get(1) {
                    None | Some(Value::Null) => Mapping::new(),
                    Some(Value::Object(map)) => Mapping::from(map.clone()),
                    Some(other) => {
                        return Err(CommandError::InvalidArgument {
                            method: "map",
                            reason: format!("mapping must be an object, got {other}"),
                        })
                    }
                };
                let include_all = args.get(2).is_some_and(truthy);
                Command::Map {
                    source: DataValue::from(source),
                    mapping,
                    include_all,
                }
            }
            "remote" => match args.first() {
                Some(Value::String(domain)) if !domain.trim().is_empty() => {
                    Command::Remote(domain.trim().to_string())
                }
                Some(other) => {
                    return Err(CommandError::InvalidArgument {
                        method: "remote",
                        reason: format!("domain must be a non-empty string, got {other}"),
                    })
                }
                None => {
                    return Err(CommandError::MissingArgument {
                        method: "remote",
                        position: 1,
                    })
                }
            },
            "ab" => match args.first() {
                None | Some(Value::Null) => Command::Ab(None),
                Some(Value::Object(groups)) => Command::Ab(Some(GroupWeights::from(groups.clone()))),
                Some(other) => {
                    return Err(CommandError::InvalidArgument {
                        method: "ab",
                        reason: format!("groups must be an object, got {other}"),
                    })
                }
            },
            "track" => Command::Track,
            _ => Command::Unknown(method),
        };
        Ok(command)
    }
}

/// JavaScript truthiness of a JSON value
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub mod legacy {
    use serde_json::{json, Value};
    use tracing::warn;

    /// Data keys that only configured the old tag's DOM placement
    const IGNORED: &[&str] = &["_elem"];

    fn renamed(key: &str) -> Option<&'static str> {
        match key {
            "_dl" => Some("map"),
            "_ab" => Some("ab"),
            _ => None,
        }
    }

    /// Rewrite a queue into the array-of-commands form.
    ///
    /// Arrays are already current and pass through. Objects are the old
    /// `{data, domain}` form: every data entry becomes a command, followed by
    /// `remote` for the domain and a final `track`. Anything else yields no
    /// commands.
    pub fn make_compatible(queue: Value) -> Vec<Value> {
        match queue {
            Value::Array(commands) => commands,
            Value::Object(mut queue) => {
                match queue.get("version").and_then(Value::as_str) {
                    None | Some("v1") => {}
                    Some(version) => {
                        warn!(version, "unsupported queue version, ignoring queue");
                        return Vec::new();
                    }
                }

                let mut compatible = Vec::new();
                if let Some(Value::Object(data)) = queue.remove("data") {
                    for (key, value) in data {
                        if IGNORED.contains(&key.as_str()) {
                            continue;
                        }
                        match renamed(&key) {
                            Some(method) => {
                                let mut command = vec![Value::from(method)];
                                match value {
                                    Value::Array(args) => command.extend(args),
                                    other => command.push(other),
                                }
                                compatible.push(Value::Array(command));
                            }
                            None => compatible.push(json!(["set", key, value])),
                        }
                    }
                }
                if let Some(domain) = queue.remove("domain") {
                    compatible.push(json!(["remote", domain]));
                }
                compatible.push(json!(["track"]));
                compatible
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::legacy::make_compatible;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_set() {
        let command = Command::try_from(json!(["set", "product", "shoe"])).unwrap();
        match command {
            Command::Set { key, value } => {
                assert_eq!(key, "product");
                assert!(matches!(value, DataValue::String(s) if s == "shoe"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_set_without_value_is_undefined() {
        let command = Command::try_from(json!(["set", "k"])).unwrap();
        assert!(matches!(command, Command::Set { value: DataValue::Undefined, .. }));
    }

    #[test]
    fn test_parse_map() {
        let command =
            Command::try_from(json!(["map", {"a": {"b": "x"}}, {"foo": "a.b"}, 1])).unwrap();
        match command {
            Command::Map {
                mapping,
                include_all,
                ..
            } => {
                assert_eq!(mapping, Mapping::new().with("foo", "a.b"));
                assert!(include_all);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_ab_and_track() {
        assert!(matches!(Command::try_from(json!(["ab"])).unwrap(), Command::Ab(None)));
        assert!(matches!(
            Command::try_from(json!(["ab", {"x": 3, "y": 1}])).unwrap(),
            Command::Ab(Some(_))
        ));
        assert!(matches!(Command::try_from(json!(["track"])).unwrap(), Command::Track));
    }

    #[test]
    fn test_unknown_methods_parse() {
        let command = Command::try_from(json!(["event", "click"])).unwrap();
        assert_eq!(command.method(), "event");
        assert!(matches!(command, Command::Unknown(_)));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Command::try_from(json!({"set": 1})), Err(CommandError::NotAnArray)));
        assert!(matches!(Command::try_from(json!([])), Err(CommandError::NotAnArray)));
        assert!(matches!(Command::try_from(json!([1, 2])), Err(CommandError::MissingMethod)));
        assert!(matches!(
            Command::try_from(json!(["remote"])),
            Err(CommandError::MissingArgument { method: "remote", position: 1 })
        ));
        assert!(matches!(
            Command::try_from(json!(["ab", [1, 2]])),
            Err(CommandError::InvalidArgument { method: "ab", .. })
        ));
    }

    #[test]
    fn test_current_queue_passes_through() {
        let queue = json!([["set", "a", 1], ["track"]]);
        assert_eq!(make_compatible(queue.clone()), queue.as_array().unwrap().clone());
    }

    #[test]
    fn test_legacy_object_queue() {
        let queue = json!({
            "domain": "collector.test",
            "data": {
                "_elem": "#tag",
                "product": "shoe",
                "_dl": [{"a": 1}, {"x": "a"}],
                "_ab": [{"left": 1, "right": 1}]
            }
        });
        assert_eq!(
            make_compatible(queue),
            vec![
                json!(["set", "product", "shoe"]),
                json!(["map", {"a": 1}, {"x": "a"}]),
                json!(["ab", {"left": 1, "right": 1}]),
                json!(["remote", "collector.test"]),
                json!(["track"]),
            ]
        );
    }

    #[test]
    fn test_legacy_queue_without_data_still_tracks() {
        assert_eq!(make_compatible(json!({})), vec![json!(["track"])]);
    }

    #[test]
    fn test_other_queues_are_empty() {
        assert!(make_compatible(json!("y")).is_empty());
        assert!(make_compatible(json!({"version": "v3"})).is_empty());
    }
}

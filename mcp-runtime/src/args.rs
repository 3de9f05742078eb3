use serde_json::{Map, Value};

use crate::error::SmmError;
use crate::tools::{Param, ParamKind, ToolSpec};

/// Arguments as a tool host hands them over.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolArgs {
    /// Declaration order of the tool's params.
    Positional(Vec<Value>),
    Keyword(Map<String, Value>),
}

impl Default for ToolArgs {
    fn default() -> Self {
        ToolArgs::Keyword(Map::new())
    }
}

impl ToolArgs {
    pub fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(ToolArgs::default()),
            Value::Array(items) => Ok(ToolArgs::Positional(items)),
            Value::Object(map) => Ok(ToolArgs::Keyword(map)),
            other => Err(format!(
                "arguments must be an array or an object, got {}",
                json_type_name(&other)
            )),
        }
    }
}

/// Validated argument values, one slot per declared param.
#[derive(Debug)]
pub struct BoundArgs<'a> {
    pub values: Vec<(&'a Param, Value)>,
}

impl<'a> BoundArgs<'a> {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(param, _)| param.name == name)
            .map(|(_, value)| value)
    }
}

pub fn bind<'a>(spec: &'a ToolSpec, args: ToolArgs) -> Result<BoundArgs<'a>, SmmError> {
    let mut raw: Vec<Option<Value>> = vec![None; spec.params.len()];

    match args {
        ToolArgs::Positional(items) => {
            if items.len() > spec.params.len() {
                return Err(SmmError::invalid_argument(
                    spec.name,
                    None,
                    format!(
                        "takes at most {} argument(s), got {}",
                        spec.params.len(),
                        items.len()
                    ),
                ));
            }
            for (slot, item) in raw.iter_mut().zip(items) {
                *slot = Some(item);
            }
        }
        ToolArgs::Keyword(map) => {
            for (key, value) in map {
                let index = spec
                    .params
                    .iter()
                    .position(|param| param.name == key)
                    .ok_or_else(|| {
                        SmmError::invalid_argument(
                            spec.name,
                            Some(key.as_str()),
                            format!("unknown argument '{key}'"),
                        )
                    })?;
                raw[index] = Some(value);
            }
        }
    }

    let mut values = Vec::with_capacity(spec.params.len());
    for (param, value) in spec.params.iter().zip(raw) {
        match value {
            None | Some(Value::Null) => {
                if param.required {
                    return Err(SmmError::invalid_argument(
                        spec.name,
                        Some(param.name),
                        format!("missing required argument '{}'", param.name),
                    ));
                }
            }
            Some(value) => {
                let coerced = coerce(param, value)
                    .map_err(|message| SmmError::invalid_argument(spec.name, Some(param.name), message))?;
                values.push((param, coerced));
            }
        }
    }

    Ok(BoundArgs { values })
}

/// Integers and booleans also accept their string spelling, objects and
/// arrays their JSON text, so positional CLI arguments bind cleanly.
fn coerce(param: &Param, value: Value) -> Result<Value, String> {
    let name = param.name;
    match (param.kind, value) {
        (ParamKind::String, Value::String(s)) if s.trim().is_empty() => {
            Err(format!("'{name}' must not be empty"))
        }
        (ParamKind::String, Value::String(s)) => Ok(Value::String(s)),
        (ParamKind::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
        (ParamKind::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(Value::Number(n)),
        (ParamKind::Integer, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| format!("'{name}' must be an integer")),
        (ParamKind::Boolean, Value::Bool(b)) => Ok(Value::Bool(b)),
        (ParamKind::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Value::Bool(true)),
            "false" | "0" | "no" => Ok(Value::Bool(false)),
            _ => Err(format!("'{name}' must be a boolean")),
        },
        (ParamKind::Object, Value::Object(map)) => Ok(Value::Object(map)),
        (ParamKind::Array, Value::Array(items)) => Ok(Value::Array(items)),
        (ParamKind::Object | ParamKind::Array, Value::String(text)) => {
            let parsed: Value = serde_json::from_str(&text)
                .map_err(|_| format!("'{name}' must be a JSON {}", param.kind.as_str()))?;
            match (param.kind, &parsed) {
                (ParamKind::Object, Value::Object(_)) | (ParamKind::Array, Value::Array(_)) => {
                    Ok(parsed)
                }
                _ => Err(format!("'{name}' must be a JSON {}", param.kind.as_str())),
            }
        }
        (kind, other) => Err(format!(
            "'{name}' must be {} {}, got {}",
            article(kind),
            kind.as_str(),
            json_type_name(&other)
        )),
    }
}

fn article(kind: ParamKind) -> &'static str {
    match kind {
        ParamKind::Integer | ParamKind::Object | ParamKind::Array => "an",
        ParamKind::String | ParamKind::Boolean => "a",
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolRegistry;
    use serde_json::json;

    fn spec(name: &str) -> &'static ToolSpec {
        ToolRegistry::standard().get(name).unwrap()
    }

    #[test]
    fn positional_and_keyword_forms_bind_the_same() {
        let positional = bind(
            spec("get_topic_partition_metrics"),
            ToolArgs::Positional(vec![json!("orders"), json!(3)]),
        )
        .unwrap();
        let keyword = bind(
            spec("get_topic_partition_metrics"),
            ToolArgs::from_value(json!({"topic_name": "orders", "partition_num": 3})).unwrap(),
        )
        .unwrap();
        assert_eq!(positional.get("topic_name"), keyword.get("topic_name"));
        assert_eq!(positional.get("partition_num"), Some(&json!(3)));
        assert_eq!(keyword.get("duration"), None);
    }

    #[test]
    fn strings_coerce_to_integers_and_booleans() {
        let bound = bind(
            spec("get_all_consumer_group_metrics"),
            ToolArgs::from_value(json!({"include_producer_metrics": "true", "from_time": "1700000000"}))
                .unwrap(),
        )
        .unwrap();
        assert_eq!(bound.get("include_producer_metrics"), Some(&json!(true)));
        assert_eq!(bound.get("from_time"), Some(&json!(1_700_000_000_i64)));
    }

    #[test]
    fn topic_tools_require_exactly_their_topic() {
        let missing = bind(spec("get_topic_offsets"), ToolArgs::default()).unwrap_err();
        assert!(matches!(
            missing,
            SmmError::InvalidArgument { field: Some(ref f), .. } if f == "topic_name"
        ));

        let extra = bind(
            spec("get_topic_offsets"),
            ToolArgs::Positional(vec![json!("a"), json!("b")]),
        )
        .unwrap_err();
        assert!(extra.to_string().contains("at most 1"));

        let unknown = bind(
            spec("get_topic_offsets"),
            ToolArgs::from_value(json!({"topic": "orders"})).unwrap(),
        )
        .unwrap_err();
        assert!(unknown.to_string().contains("unknown argument 'topic'"));
    }

    #[test]
    fn wrong_types_are_reported_per_field() {
        let err = bind(
            spec("get_broker"),
            ToolArgs::Positional(vec![json!("one")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("'broker_id' must be an integer"));

        assert!(ToolArgs::from_value(json!("orders")).is_err());
    }
}

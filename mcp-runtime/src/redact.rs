use serde_json::{Map, Value, json};

pub const REDACTED: &str = "***REDACTED***";
pub const MAX_LIST_ITEMS: usize = 200;

const SENSITIVE_KEYS: [&str; 6] = [
    "password",
    "passcode",
    "token",
    "secret",
    "kerberoskeytab",
    "sslkeystorepasswd",
];

/// Mask secret-looking fields and cap long lists before a payload leaves
/// the process. Truncated lists end with a `{truncated, omitted_count}` marker.
pub fn redact(value: Value) -> Value {
    redact_with_limit(value, MAX_LIST_ITEMS)
}

pub fn redact_with_limit(value: Value, max_items: usize) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                let masked = if is_sensitive(&key) {
                    Value::String(REDACTED.to_string())
                } else {
                    redact_with_limit(value, max_items)
                };
                out.insert(key, masked);
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            let total = items.len();
            let mut out: Vec<Value> = items
                .into_iter()
                .take(max_items)
                .map(|item| redact_with_limit(item, max_items))
                .collect();
            if total > max_items {
                out.push(json!({ "truncated": true, "omitted_count": total - max_items }));
            }
            Value::Array(out)
        }
        other => other,
    }
}

fn is_sensitive(key: &str) -> bool {
    let lowered = key.to_ascii_lowercase();
    SENSITIVE_KEYS.contains(&lowered.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_masked_at_any_depth() {
        let input = json!({
            "name": "sasl",
            "Password": "hunter2",
            "nested": [{ "sslKeystorePasswd": "x", "port": 9093 }],
            "token": null
        });
        assert_eq!(
            redact(input),
            json!({
                "name": "sasl",
                "Password": REDACTED,
                "nested": [{ "sslKeystorePasswd": REDACTED, "port": 9093 }],
                "token": REDACTED
            })
        );
    }

    #[test]
    fn long_lists_are_truncated_with_marker() {
        let input = Value::Array((0..5).map(Value::from).collect());
        assert_eq!(
            redact_with_limit(input, 3),
            json!([0, 1, 2, { "truncated": true, "omitted_count": 2 }])
        );

        let short = json!([1, 2]);
        assert_eq!(redact_with_limit(short.clone(), 3), short);
    }
}

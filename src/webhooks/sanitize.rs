//! Inbound event cleanup applied at the HTTP boundary.

use serde_json::{Map, Value};

const DOLLAR_KEY_PREFIX: &str = "__dollar__";

/// Drop null-valued object fields and rename `$`-prefixed keys.
///
/// Provider attribute names like `$email` become `__dollar__email`. Nulls
/// inside arrays are kept so element positions do not shift.
pub fn sanitize_event(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                if value.is_null() {
                    continue;
                }
                out.insert(encode_key(key), sanitize_event(value));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_event).collect()),
        other => other,
    }
}

fn encode_key(key: String) -> String {
    match key.strip_prefix('$') {
        Some(rest) => format!("{}{}", DOLLAR_KEY_PREFIX, rest),
        None => key,
    }
}

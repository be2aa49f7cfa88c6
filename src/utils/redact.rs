use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashSet;

const REDACTION: &str = "[REDACTED]";

static SENSITIVE_KEYS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "key",
        "key1",
        "key2",
        "credentials",
        "token",
        "accesstoken",
        "authorization",
    ]
    .into_iter()
    .collect()
});

fn is_sensitive(key: &str) -> bool {
    SENSITIVE_KEYS.contains(key.to_lowercase().as_str())
}

pub fn redact_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, entry) in map {
                if is_sensitive(key) {
                    out.insert(key.clone(), Value::String(REDACTION.to_string()));
                } else {
                    out.insert(key.clone(), redact_value(entry));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        other => other.clone(),
    }
}

/// Redacts a raw response body before it is echoed for diagnosis. Bodies that
/// do not parse as JSON are passed through unchanged.
pub fn redact_body(raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(parsed) => redact_value(&parsed).to_string(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{redact_body, redact_value};
    use serde_json::Value;

    #[test]
    fn redact_value_masks_credential_keys() {
        let input = serde_json::json!({
            "properties": { "credentials": { "key": "secret" }, "target": "https://x" }
        });
        let out = redact_value(&input);
        assert_eq!(
            out["properties"]["credentials"],
            Value::String("[REDACTED]".to_string())
        );
        assert_eq!(
            out["properties"]["target"],
            Value::String("https://x".to_string())
        );
    }

    #[test]
    fn redact_value_masks_list_keys_response() {
        let input = serde_json::json!({ "key1": "aaa", "key2": "bbb" });
        let out = redact_value(&input);
        assert_eq!(out["key1"], Value::String("[REDACTED]".to_string()));
        assert_eq!(out["key2"], Value::String("[REDACTED]".to_string()));
    }

    #[test]
    fn redact_body_passes_non_json_through() {
        assert_eq!(redact_body("plain text error"), "plain text error");
    }
}

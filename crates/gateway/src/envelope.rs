//! Response envelope unwrapping.
//!
//! The gateway wraps tool output as `{ ok, result }`, and many tools return
//! `{ content, details }` inside `result`. Dashboards want the payload, so
//! `details` wins when present, then `result`, then the whole body. Neither
//! nesting is contractual, so the field names live in config.

use {
    clawboard_config::EnvelopeConfig,
    serde_json::{Map, Value},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnwrapPolicy {
    result_field: Option<String>,
    details_field: Option<String>,
}

impl Default for UnwrapPolicy {
    fn default() -> Self {
        Self {
            result_field: Some("result".into()),
            details_field: Some("details".into()),
        }
    }
}

impl From<&EnvelopeConfig> for UnwrapPolicy {
    fn from(cfg: &EnvelopeConfig) -> Self {
        let field = |name: &str| (!name.is_empty()).then(|| name.to_string());
        Self {
            result_field: field(&cfg.result_field),
            details_field: field(&cfg.details_field),
        }
    }
}

impl UnwrapPolicy {
    /// Return bodies untouched.
    pub fn raw() -> Self {
        Self {
            result_field: None,
            details_field: None,
        }
    }

    /// Unwrap a decoded 2xx body. `None` (empty or malformed body) becomes
    /// an empty object.
    pub fn unwrap(&self, body: Option<Value>) -> Value {
        let Some(body) = body else {
            return Value::Object(Map::new());
        };
        let working = take_field(body, self.result_field.as_deref());
        take_field(working, self.details_field.as_deref())
    }
}

/// `value[field]` when `value` is an object that has it (even if null),
/// otherwise `value` unchanged.
fn take_field(value: Value, field: Option<&str>) -> Value {
    match (value, field) {
        (Value::Object(mut map), Some(field)) => match map.remove(field) {
            Some(inner) => inner,
            None => Value::Object(map),
        },
        (value, _) => value,
    }
}

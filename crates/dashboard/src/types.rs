//! Payloads returned by the dashboard tools.
//!
//! Gateways differ in what they report, so every field is optional and
//! unknown fields are kept in `extra`. Values of an unexpected JSON type
//! are read as absent, and list entries that are not objects are dropped,
//! instead of failing the whole list.

use serde::{Deserialize, Serialize};

/// `createdAt` / `updatedAt` / `lastSeenAt`: epoch number or date string,
/// shown as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Number(serde_json::Number),
    Text(String),
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Session {
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub key: String,
    #[serde(deserialize_with = "lenient::string")]
    pub model: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub channel: Option<String>,
    #[serde(deserialize_with = "lenient::tokens")]
    pub total_tokens: Option<u64>,
    #[serde(deserialize_with = "lenient::timestamp")]
    pub updated_at: Option<Timestamp>,
    #[serde(deserialize_with = "lenient::timestamp")]
    pub created_at: Option<Timestamp>,
    #[serde(deserialize_with = "lenient::string")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Session {
    /// Missing or non-numeric token counts count as zero.
    pub fn tokens(&self) -> u64 {
        self.total_tokens.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsListResult {
    #[serde(deserialize_with = "lenient::tokens")]
    pub count: Option<u64>,
    #[serde(deserialize_with = "lenient::list")]
    pub sessions: Vec<Session>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Channel {
    #[serde(deserialize_with = "lenient::string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub platform: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub status: Option<String>,
    #[serde(deserialize_with = "lenient::boolean")]
    pub connected: Option<bool>,
    #[serde(deserialize_with = "lenient::timestamp")]
    pub last_seen_at: Option<Timestamp>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsListResult {
    #[serde(deserialize_with = "lenient::tokens")]
    pub count: Option<u64>,
    #[serde(deserialize_with = "lenient::list")]
    pub channels: Vec<Channel>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionStatusResult {
    #[serde(deserialize_with = "lenient::boolean")]
    pub ok: Option<bool>,
    #[serde(deserialize_with = "lenient::string")]
    pub session_key: Option<String>,
    pub changed_model: Option<serde_json::Value>,
    #[serde(deserialize_with = "lenient::string")]
    pub status_text: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SessionStatusResult {
    /// Heartbeat line. Gateways that skip the `details` envelope leave it
    /// one level down.
    pub fn heartbeat(&self) -> Option<&str> {
        self.status_text
            .as_deref()
            .or_else(|| {
                self.extra
                    .get("details")
                    .and_then(|d| d.get("statusText"))
                    .and_then(serde_json::Value::as_str)
            })
            .filter(|s| !s.trim().is_empty())
    }
}

mod lenient {
    use {
        super::Timestamp,
        serde::{Deserialize, Deserializer, de::DeserializeOwned},
        serde_json::Value,
    };

    fn value<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Value>, D::Error> {
        Option::<Value>::deserialize(d)
    }

    /// Strings as-is; numbers and booleans in their JSON spelling.
    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(value(d)?.and_then(|v| match v {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }))
    }

    pub fn string_or_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(string(d)?.unwrap_or_default())
    }

    /// Non-negative counts, given as numbers or numeric strings.
    pub fn tokens<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        let count = |f: f64| (f.is_finite() && f >= 0.0).then_some(f as u64);
        Ok(value(d)?.and_then(|v| match v {
            Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(count)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<u64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(count))
            },
            _ => None,
        }))
    }

    pub fn boolean<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        Ok(value(d)?.and_then(|v| match v {
            Value::Bool(b) => Some(b),
            Value::Number(n) => match n.as_u64() {
                Some(1) => Some(true),
                Some(0) => Some(false),
                _ => None,
            },
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }))
    }

    /// Arrays only; `null` or any other type is an empty list. Entries that
    /// are not objects are skipped.
    pub fn list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match value(d)? {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter(Value::is_object)
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        })
    }

    pub fn timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Timestamp>, D::Error> {
        Ok(value(d)?.and_then(|v| match v {
            Value::Number(n) => Some(Timestamp::Number(n)),
            Value::String(s) => Some(Timestamp::Text(s)),
            _ => None,
        }))
    }
}

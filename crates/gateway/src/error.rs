use reqwest::StatusCode;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The gateway answered with a non-success status.
#[derive(Debug, Clone, thiserror::Error)]
#[error("[Gateway] {tool} failed ({status})")]
pub struct GatewayError {
    pub tool: String,
    pub status: u16,
    /// Parsed JSON error body, or the raw text when it was not JSON.
    pub detail: Option<serde_json::Value>,
}

impl GatewayError {
    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED.as_u16()
    }

    /// 401 or 403: the credential itself was refused.
    pub fn is_auth_rejection(&self) -> bool {
        self.is_unauthorized() || self.status == StatusCode::FORBIDDEN.as_u16()
    }

    /// The tool is not installed on this gateway.
    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND.as_u16()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Password mode with no password held. Nothing was sent.
    #[error("password required, please log in")]
    CredentialsRequired,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("gateway connection failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The caller's cancellation token fired before the response arrived.
    #[error("request cancelled")]
    Cancelled,

    #[error("unexpected payload from {tool}: {source}")]
    Decode {
        tool: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Gateway(e) => Some(e.status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Gateway(e) if e.is_unauthorized())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Gateway(e) if e.is_not_found())
    }
}

/// Treat "tool not installed" (404) as no data instead of an error.
pub fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

const DETAIL_MAX_CHARS: usize = 200;

/// Short message for display. Other gateway statuses carry a compact form of
/// the error body: its `error`/`message` text, else the body truncated.
pub fn user_message(err: &Error) -> String {
    match err {
        Error::Gateway(e) if !e.is_unauthorized() && !e.is_not_found() => {
            match e.detail.as_ref().and_then(detail_summary) {
                Some(detail) => format!("{e}: {detail}"),
                None => e.to_string(),
            }
        },
        Error::CredentialsRequired => "Password required. Please log in.".into(),
        Error::Gateway(e) if e.is_unauthorized() => {
            format!("{e}: credentials rejected, please log in again")
        },
        Error::Gateway(e) if e.is_not_found() => {
            format!("{e}: tool not available on this gateway")
        },
        Error::Transport(e) if e.is_timeout() => {
            format!("gateway request timed out ({e}); check that the gateway is reachable")
        },
        Error::Transport(e) => format!(
            "gateway connection failed ({e}); check gateway.url and that the gateway accepts \
             connections from this host"
        ),
        other => other.to_string(),
    }
}

fn detail_summary(detail: &serde_json::Value) -> Option<String> {
    use serde_json::Value;

    let text = |v: &Value| {
        v.as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    };
    let summary = match detail {
        Value::Null => return None,
        Value::String(_) => text(detail)?,
        Value::Object(map) => ["error", "message"]
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(|v| text(v).or_else(|| v.get("message").and_then(text)))
            .unwrap_or_else(|| detail.to_string()),
        other => other.to_string(),
    };
    Some(truncate(&summary, DETAIL_MAX_CHARS))
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &s[..end]),
        None => s.to_string(),
    }
}

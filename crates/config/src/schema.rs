//! Config schema types (gateway connection, auth, probe, envelope, dashboard).
use std::time::Duration;

use {
    secrecy::Secret,
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClawboardConfig {
    pub gateway: GatewayConfig,
    pub auth: AuthConfig,
    pub probe: ProbeConfig,
    pub envelope: EnvelopeConfig,
    pub dashboard: DashboardConfig,
}

impl ClawboardConfig {
    /// Base URL without trailing slashes. Empty until a URL is configured.
    pub fn base_url(&self) -> &str {
        self.gateway
            .url
            .as_deref()
            .map(|u| u.trim_end_matches('/'))
            .unwrap_or_default()
    }
}

/// Where the gateway lives.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL, e.g. `http://127.0.0.1:18789`. Required.
    pub url: Option<String>,

    /// Session every invocation targets.
    pub session_key: String,

    /// Transport timeout for a single invocation. Unset means no timeout.
    pub timeout_secs: Option<u64>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: None,
            session_key: "main".into(),
            timeout_secs: None,
        }
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Pre-shared token from config, assumed valid until the first 401.
    #[default]
    Token,
    /// Password typed in by the operator, held in memory only.
    Password,
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token => f.write_str("token"),
            Self::Password => f.write_str("password"),
        }
    }
}

/// How a password is put on the wire. Token mode always uses bearer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    #[default]
    Bearer,
    Basic,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub mode: AuthMode,

    /// Required in token mode, ignored in password mode.
    pub token: Option<Secret<String>>,

    pub scheme: AuthScheme,

    /// User name sent with basic auth.
    pub username: String,

    /// Token mode only: probe the token at mount instead of trusting it.
    pub verify_on_mount: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::Token,
            token: None,
            scheme: AuthScheme::Bearer,
            username: "admin".into(),
            verify_on_mount: false,
        }
    }
}

/// The cheap, side-effect-free invocation used to validate credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub tool: String,
    pub args: serde_json::Value,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            tool: "sessions_list".into(),
            args: serde_json::json!({ "limit": 1 }),
        }
    }
}

/// Field names peeled off a successful response. An empty name disables
/// that level of unwrapping.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    pub result_field: String,
    pub details_field: String,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            result_field: "result".into(),
            details_field: "details".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Overview refresh period.
    pub poll_secs: u64,
    pub sessions_poll_secs: u64,
    pub channels_poll_secs: u64,
    /// `limit` passed to `sessions_list`.
    pub session_limit: u32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            poll_secs: 8,
            sessions_poll_secs: 10,
            channels_poll_secs: 10,
            session_limit: 200,
        }
    }
}

impl DashboardConfig {
    /// Zero disables polling for that view.
    pub fn interval(secs: u64) -> Option<Duration> {
        (secs > 0).then(|| Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    #[test]
    fn defaults_match_dashboard_expectations() {
        let cfg = ClawboardConfig::default();
        assert_eq!(cfg.gateway.session_key, "main");
        assert_eq!(cfg.auth.mode, AuthMode::Token);
        assert_eq!(cfg.auth.scheme, AuthScheme::Bearer);
        assert_eq!(cfg.probe.tool, "sessions_list");
        assert_eq!(cfg.probe.args, serde_json::json!({ "limit": 1 }));
        assert_eq!(cfg.envelope.result_field, "result");
        assert_eq!(cfg.envelope.details_field, "details");
        assert_eq!(cfg.dashboard.poll_secs, 8);
        assert_eq!(cfg.dashboard.session_limit, 200);
    }

    #[test]
    fn base_url_trims_trailing_slashes() {
        let mut cfg = ClawboardConfig::default();
        assert_eq!(cfg.base_url(), "");
        cfg.gateway.url = Some("http://localhost:18789///".into());
        assert_eq!(cfg.base_url(), "http://localhost:18789");
    }

    #[test]
    fn parses_partial_toml() {
        let cfg: ClawboardConfig = toml::from_str(
            r#"
            [gateway]
            url = "https://gw.example"

            [auth]
            mode = "password"
            scheme = "basic"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.gateway.url.as_deref(), Some("https://gw.example"));
        assert_eq!(cfg.gateway.session_key, "main");
        assert_eq!(cfg.auth.mode, AuthMode::Password);
        assert_eq!(cfg.auth.scheme, AuthScheme::Basic);
        assert_eq!(cfg.auth.username, "admin");
    }

    #[test]
    fn token_deserializes_as_secret() {
        let cfg: ClawboardConfig =
            serde_json::from_str(r#"{"auth": {"token": "tok-123"}}"#).unwrap();
        let token = cfg.auth.token.unwrap();
        assert_eq!(token.expose_secret(), "tok-123");
        assert!(!format!("{token:?}").contains("tok-123"));
    }

    #[test]
    fn zero_interval_disables_polling() {
        assert_eq!(DashboardConfig::interval(0), None);
        assert_eq!(
            DashboardConfig::interval(10),
            Some(Duration::from_secs(10))
        );
    }
}

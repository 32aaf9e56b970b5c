use crate::schema::{AuthMode, ClawboardConfig};

/// A configuration that cannot be used to reach the gateway.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing gateway.url (set it in clawboard.toml or CLAWBOARD_GATEWAY_URL)")]
    MissingUrl,

    #[error("invalid gateway.url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("auth.mode is token but no token is configured (set auth.token or CLAWBOARD_GATEWAY_TOKEN)")]
    MissingToken,

    #[error("unknown auth mode {0:?}, expected \"token\" or \"password\"")]
    UnknownAuthMode(String),

    #[error("gateway.session_key must not be empty")]
    EmptySessionKey,

    #[error("probe.tool must not be empty")]
    EmptyProbeTool,
}

impl ClawboardConfig {
    /// Check required values and normalize the base URL in place.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let raw = self
            .gateway
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::MissingUrl)?;

        let parsed = url::Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: raw.to_string(),
                reason: format!("unsupported scheme {:?}", parsed.scheme()),
            });
        }
        self.gateway.url = Some(raw.trim_end_matches('/').to_string());

        if self.gateway.session_key.trim().is_empty() {
            return Err(ConfigError::EmptySessionKey);
        }
        if self.probe.tool.trim().is_empty() {
            return Err(ConfigError::EmptyProbeTool);
        }
        if self.auth.mode == AuthMode::Token && self.auth.token.is_none() {
            return Err(ConfigError::MissingToken);
        }
        Ok(())
    }
}

/// Parse an auth mode given as free text (env var, CLI flag).
pub fn parse_auth_mode(raw: &str) -> Result<AuthMode, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "token" => Ok(AuthMode::Token),
        "password" => Ok(AuthMode::Password),
        _ => Err(ConfigError::UnknownAuthMode(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use {super::*, secrecy::Secret};

    fn token_config(url: &str) -> ClawboardConfig {
        let mut cfg = ClawboardConfig::default();
        cfg.gateway.url = Some(url.into());
        cfg.auth.token = Some(Secret::new("tok".into()));
        cfg
    }

    #[test]
    fn valid_token_config_is_normalized() {
        let mut cfg = token_config("http://127.0.0.1:18789/");
        cfg.validate().unwrap();
        assert_eq!(cfg.gateway.url.as_deref(), Some("http://127.0.0.1:18789"));
    }

    #[test]
    fn missing_url_fails() {
        let mut cfg = ClawboardConfig::default();
        assert_eq!(cfg.validate(), Err(ConfigError::MissingUrl));

        cfg.gateway.url = Some("   ".into());
        assert_eq!(cfg.validate(), Err(ConfigError::MissingUrl));
    }

    #[test]
    fn non_http_url_fails() {
        let mut cfg = token_config("ftp://gw.example");
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidUrl { .. })
        ));

        let mut cfg = token_config("not a url");
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn token_mode_requires_token() {
        let mut cfg = token_config("http://gw.example");
        cfg.auth.token = None;
        assert_eq!(cfg.validate(), Err(ConfigError::MissingToken));
    }

    #[test]
    fn password_mode_needs_no_token() {
        let mut cfg = token_config("http://gw.example");
        cfg.auth.token = None;
        cfg.auth.mode = AuthMode::Password;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn empty_session_key_fails() {
        let mut cfg = token_config("http://gw.example");
        cfg.gateway.session_key = " ".into();
        assert_eq!(cfg.validate(), Err(ConfigError::EmptySessionKey));
    }

    #[test]
    fn auth_mode_parsing() {
        assert_eq!(parse_auth_mode("Password"), Ok(AuthMode::Password));
        assert_eq!(parse_auth_mode(" token "), Ok(AuthMode::Token));
        assert_eq!(
            parse_auth_mode("oauth"),
            Err(ConfigError::UnknownAuthMode("oauth".into()))
        );
    }
}

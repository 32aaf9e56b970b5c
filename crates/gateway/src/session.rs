//! Credential state shared by the client and the auth session manager.
//!
//! Token mode: the token is fixed for the life of the process.
//! Password mode: the password lives only in memory. The auth session
//! manager writes it on login/logout; the client clears it on a 401.

use std::sync::{PoisonError, RwLock};

use {
    clawboard_config::{AuthConfig, AuthMode, AuthScheme},
    secrecy::{ExposeSecret, Secret},
};

/// Credential attached to one outgoing request.
#[derive(Clone)]
pub enum Credential {
    Bearer(Secret<String>),
    Basic {
        username: String,
        password: Secret<String>,
    },
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer([REDACTED])"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
        }
    }
}

impl Credential {
    pub fn apply(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::Bearer(token) => req.bearer_auth(token.expose_secret()),
            Self::Basic { username, password } => {
                req.basic_auth(username, Some(password.expose_secret()))
            },
        }
    }
}

/// A password together with the version it was stored under.
struct HeldPassword {
    version: u64,
    secret: Secret<String>,
}

#[derive(Default)]
struct PasswordSlot {
    held: Option<HeldPassword>,
    next_version: u64,
}

pub struct SessionContext {
    mode: AuthMode,
    scheme: AuthScheme,
    username: String,
    token: Option<Secret<String>>,
    password: RwLock<PasswordSlot>,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("mode", &self.mode)
            .field("scheme", &self.scheme)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("has_password", &self.has_password())
            .finish()
    }
}

impl SessionContext {
    /// Token mode with a fixed bearer token.
    pub fn with_token(token: Secret<String>) -> Self {
        Self {
            mode: AuthMode::Token,
            scheme: AuthScheme::Bearer,
            username: String::new(),
            token: Some(token),
            password: RwLock::new(PasswordSlot::default()),
        }
    }

    /// Password mode; starts without a password.
    pub fn with_password_scheme(scheme: AuthScheme, username: impl Into<String>) -> Self {
        Self {
            mode: AuthMode::Password,
            scheme,
            username: username.into(),
            token: None,
            password: RwLock::new(PasswordSlot::default()),
        }
    }

    pub fn from_config(auth: &AuthConfig) -> Self {
        match auth.mode {
            // A missing token is rejected by config validation; here it
            // just means every invoke fails with `CredentialsRequired`.
            AuthMode::Token => Self {
                mode: AuthMode::Token,
                scheme: AuthScheme::Bearer,
                username: String::new(),
                token: auth.token.clone(),
                password: RwLock::new(PasswordSlot::default()),
            },
            AuthMode::Password => Self::with_password_scheme(auth.scheme, auth.username.clone()),
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn is_password_mode(&self) -> bool {
        self.mode == AuthMode::Password
    }

    pub fn has_password(&self) -> bool {
        self.read_slot(|slot| slot.held.is_some())
    }

    /// Credential for the next request, with the password version it was
    /// built from (0 in token mode). `None` means nothing may be sent.
    pub fn credential(&self) -> Option<(Credential, u64)> {
        match self.mode {
            AuthMode::Token => self
                .token
                .clone()
                .map(|token| (Credential::Bearer(token), 0)),
            AuthMode::Password => self.read_slot(|slot| {
                slot.held
                    .as_ref()
                    .map(|held| (self.password_credential(held.secret.clone()), held.version))
            }),
        }
    }

    /// Credential built from a login candidate rather than the stored
    /// password. Token mode ignores the candidate.
    pub fn credential_for(&self, candidate: &Secret<String>) -> Option<Credential> {
        match self.mode {
            AuthMode::Token => self.token.clone().map(Credential::Bearer),
            AuthMode::Password => Some(self.password_credential(candidate.clone())),
        }
    }

    fn password_credential(&self, secret: Secret<String>) -> Credential {
        match self.scheme {
            AuthScheme::Bearer => Credential::Bearer(secret),
            AuthScheme::Basic => Credential::Basic {
                username: self.username.clone(),
                password: secret,
            },
        }
    }

    pub(crate) fn set_password(&self, secret: Secret<String>) {
        let mut slot = self.password.write().unwrap_or_else(PoisonError::into_inner);
        slot.next_version += 1;
        slot.held = Some(HeldPassword {
            version: slot.next_version,
            secret,
        });
    }

    /// Drop the password. Returns whether one was held.
    pub(crate) fn clear_password(&self) -> bool {
        let mut slot = self.password.write().unwrap_or_else(PoisonError::into_inner);
        slot.held.take().is_some()
    }

    /// Drop the password only if it is still the one a rejected request was
    /// sent with. Token mode has nothing to revoke locally and reports true.
    pub(crate) fn revoke(&self, version: u64) -> bool {
        if self.mode == AuthMode::Token {
            return true;
        }
        let mut slot = self.password.write().unwrap_or_else(PoisonError::into_inner);
        match &slot.held {
            Some(held) if held.version == version => {
                slot.held = None;
                true
            },
            _ => false,
        }
    }

    fn read_slot<R>(&self, f: impl FnOnce(&PasswordSlot) -> R) -> R {
        f(&self.password.read().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> Secret<String> {
        Secret::new(s.to_string())
    }

    #[test]
    fn token_mode_always_has_bearer_credential() {
        let session = SessionContext::with_token(secret("tok"));
        let (cred, version) = session.credential().unwrap();
        assert!(matches!(cred, Credential::Bearer(ref t) if t.expose_secret() == "tok"));
        assert_eq!(version, 0);
        assert!(!session.is_password_mode());
    }

    #[test]
    fn password_mode_starts_empty() {
        let session = SessionContext::with_password_scheme(AuthScheme::Bearer, "admin");
        assert!(session.is_password_mode());
        assert!(!session.has_password());
        assert!(session.credential().is_none());
    }

    #[test]
    fn set_and_clear_password() {
        let session = SessionContext::with_password_scheme(AuthScheme::Basic, "admin");
        session.set_password(secret("pw"));
        assert!(session.has_password());
        let (cred, _) = session.credential().unwrap();
        match cred {
            Credential::Basic { username, password } => {
                assert_eq!(username, "admin");
                assert_eq!(password.expose_secret(), "pw");
            },
            Credential::Bearer(_) => panic!("expected basic credential"),
        }
        assert!(session.clear_password());
        assert!(!session.clear_password());
        assert!(session.credential().is_none());
    }

    #[test]
    fn revoke_only_matches_current_version() {
        let session = SessionContext::with_password_scheme(AuthScheme::Bearer, "admin");
        session.set_password(secret("old"));
        let (_, old_version) = session.credential().unwrap();
        session.set_password(secret("new"));

        assert!(!session.revoke(old_version), "stale rejection keeps new password");
        assert!(session.has_password());

        let (_, current) = session.credential().unwrap();
        assert!(session.revoke(current));
        assert!(!session.has_password());
    }

    #[test]
    fn credential_for_uses_candidate() {
        let session = SessionContext::with_password_scheme(AuthScheme::Bearer, "admin");
        session.set_password(secret("stored"));
        let cred = session.credential_for(&secret("candidate")).unwrap();
        assert!(matches!(cred, Credential::Bearer(ref t) if t.expose_secret() == "candidate"));
    }

    #[test]
    fn from_config_respects_mode() {
        let mut auth = AuthConfig {
            token: Some(secret("tok")),
            ..AuthConfig::default()
        };
        let session = SessionContext::from_config(&auth);
        assert_eq!(session.mode(), AuthMode::Token);
        assert!(session.credential().is_some());

        auth.mode = AuthMode::Password;
        let session = SessionContext::from_config(&auth);
        assert_eq!(session.mode(), AuthMode::Password);
        assert!(session.credential().is_none());
    }

    #[test]
    fn debug_redacts_secrets() {
        let session = SessionContext::with_token(secret("super-secret-token"));
        let out = format!("{session:?}");
        assert!(out.contains("[REDACTED]"));
        assert!(!out.contains("super-secret-token"));

        let cred = Credential::Basic {
            username: "admin".into(),
            password: secret("pw-123"),
        };
        assert!(!format!("{cred:?}").contains("pw-123"));
    }
}

//! Authentication state machine.
//!
//! ```text
//! idle ──mount(token)──────▶ authenticated
//! idle ──mount(password)───▶ unauthenticated
//! unauthenticated ──login ok──▶ authenticated
//! *  ──login refused─────────▶ unauthenticated
//! authenticated ──401────────▶ unauthenticated
//! *  ──logout────────────────▶ unauthenticated
//! mount check unreachable ───▶ error ──retry──▶ (mount again)
//! ```
//!
//! Transitions are published over a `watch` channel as [`AuthSnapshot`]s.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError, Weak},
};

use {
    secrecy::Secret,
    tokio::sync::watch,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    client::GatewayClient,
    error::{Error, user_message},
    session::SessionContext,
};

const SESSION_EXPIRED: &str = "session expired, please log in again";
const TOKEN_REJECTED: &str = "gateway rejected the configured token";

// ── Types ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthStatus {
    /// Before the first check has resolved.
    #[default]
    Idle,
    Authenticated,
    Unauthenticated,
    Error,
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Authenticated => "authenticated",
            Self::Unauthenticated => "unauthenticated",
            Self::Error => "error",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub status: AuthStatus,
    /// Message for the last failed login or forced logout.
    pub error: Option<String>,
    /// A login or mount check is in flight.
    pub loading: bool,
    pub has_password: bool,
    pub password_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("login is only available in password mode")]
    NotPasswordMode,

    #[error("wrong password, please try again")]
    WrongPassword,

    #[error("gateway refused the login ({status})")]
    Rejected { status: u16 },

    #[error("{0}")]
    Connection(String),

    /// A newer login or a logout was issued while this one was in flight.
    #[error("login superseded")]
    Superseded,
}

// ── Manager ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Attempt {
    seq: u64,
    token: Option<CancellationToken>,
}

struct AuthShared {
    session: Arc<SessionContext>,
    state: watch::Sender<AuthSnapshot>,
    attempt: Mutex<Attempt>,
}

impl AuthShared {
    /// Start a new attempt, cancelling the previous one.
    fn begin(&self) -> (u64, CancellationToken) {
        let mut attempt = self.attempt.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = attempt.token.take() {
            previous.cancel();
        }
        attempt.seq += 1;
        let token = CancellationToken::new();
        attempt.token = Some(token.clone());
        (attempt.seq, token)
    }

    fn publish(&self, status: AuthStatus, error: Option<String>, loading: bool) {
        let has_password = self.session.has_password();
        let previous = self.state.borrow().status;
        self.state.send_modify(|state| {
            state.status = status;
            state.error = error;
            state.loading = loading;
            state.has_password = has_password;
        });
        if previous != status {
            info!(from = %previous, to = %status, "auth state changed");
        }
    }

    fn set_loading(&self) {
        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });
    }

    /// Runs synchronously inside the client after a 401 revoked the
    /// credential.
    fn on_unauthorized(&self) {
        let has_password = self.session.has_password();
        let message = if self.session.is_password_mode() {
            SESSION_EXPIRED
        } else {
            TOKEN_REJECTED
        };
        let forced = self.state.send_if_modified(|state| {
            state.has_password = has_password;
            if state.status != AuthStatus::Authenticated {
                return false;
            }
            state.status = AuthStatus::Unauthenticated;
            state.error = Some(message.to_string());
            true
        });
        if forced {
            warn!(mode = %self.session.mode(), "forced logout after gateway rejected credentials");
        }
    }
}

/// Owns the auth state and the client wired to report 401s back to it.
#[derive(Clone)]
pub struct AuthSessionManager {
    client: GatewayClient,
    shared: Arc<AuthShared>,
    verify_on_mount: bool,
}

impl fmt::Debug for AuthSessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSessionManager")
            .field("state", &*self.shared.state.borrow())
            .field("verify_on_mount", &self.verify_on_mount)
            .finish()
    }
}

impl AuthSessionManager {
    /// Take ownership of `client`'s unauthorized hook.
    pub fn new(client: GatewayClient) -> Self {
        let session = Arc::clone(client.session());
        let (state, _) = watch::channel(AuthSnapshot {
            has_password: session.has_password(),
            password_mode: session.is_password_mode(),
            ..AuthSnapshot::default()
        });
        let shared = Arc::new(AuthShared {
            session,
            state,
            attempt: Mutex::new(Attempt::default()),
        });

        let weak: Weak<AuthShared> = Arc::downgrade(&shared);
        let client = client.with_unauthorized_hook(Arc::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.on_unauthorized();
            }
        }));

        Self {
            client,
            shared,
            verify_on_mount: false,
        }
    }

    /// Token mode only: probe the token at mount instead of trusting it.
    pub fn with_verify_on_mount(mut self, verify: bool) -> Self {
        self.verify_on_mount = verify;
        self
    }

    /// Client whose 401s feed back into this manager. Use it for every
    /// data call.
    pub fn client(&self) -> &GatewayClient {
        &self.client
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.shared.session
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.shared.state.borrow().clone()
    }

    pub fn status(&self) -> AuthStatus {
        self.shared.state.borrow().status
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == AuthStatus::Authenticated
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.shared.state.subscribe()
    }

    /// Resolve the initial state.
    pub async fn mount(&self) -> AuthStatus {
        let (seq, token) = self.shared.begin();

        if self.shared.session.is_password_mode() {
            // Passwords are never persisted; every start asks again.
            self.shared.session.clear_password();
            self.shared.publish(AuthStatus::Unauthenticated, None, false);
            return AuthStatus::Unauthenticated;
        }

        if !self.verify_on_mount {
            self.shared.publish(AuthStatus::Authenticated, None, false);
            return AuthStatus::Authenticated;
        }

        self.shared.set_loading();
        let result = self.client.probe_current(&token).await;

        let attempt = self.shared.attempt.lock().unwrap_or_else(PoisonError::into_inner);
        if attempt.seq != seq {
            debug!("mount check superseded");
            return self.status();
        }
        let (status, error) = match result {
            Ok(()) => (AuthStatus::Authenticated, None),
            Err(Error::Gateway(e)) if e.is_auth_rejection() => {
                warn!(status = e.status, "gateway rejected the configured token");
                (AuthStatus::Unauthenticated, Some(TOKEN_REJECTED.to_string()))
            },
            Err(e) => {
                warn!(error = %e, "gateway check failed at startup");
                (AuthStatus::Error, Some(user_message(&e)))
            },
        };
        self.shared.publish(status, error, false);
        status
    }

    /// Leave the error state by running the mount logic again.
    pub async fn retry(&self) -> AuthStatus {
        self.shared.publish(AuthStatus::Idle, None, false);
        self.mount().await
    }

    /// Validate `password` with the probe invocation and commit it on
    /// success. A refused candidate never replaces a stored password.
    pub async fn login(&self, password: Secret<String>) -> Result<(), AuthError> {
        if !self.shared.session.is_password_mode() {
            return Err(AuthError::NotPasswordMode);
        }

        let (seq, token) = self.shared.begin();
        self.shared.set_loading();
        let result = self.client.probe(&password, &token).await;

        // Commit and publish in the same critical section as the
        // supersession check so a concurrent logout cannot interleave.
        let attempt = self.shared.attempt.lock().unwrap_or_else(PoisonError::into_inner);
        if attempt.seq != seq {
            debug!("login superseded");
            return Err(AuthError::Superseded);
        }

        let outcome = match result {
            Ok(()) => {
                self.shared.session.set_password(password);
                self.shared.publish(AuthStatus::Authenticated, None, false);
                return Ok(());
            },
            Err(Error::Gateway(e)) if e.is_auth_rejection() => AuthError::WrongPassword,
            Err(Error::Gateway(e)) => AuthError::Rejected { status: e.status },
            Err(Error::Cancelled) => AuthError::Superseded,
            Err(e) => AuthError::Connection(e.to_string()),
        };

        let status = match outcome {
            AuthError::Connection(_) => AuthStatus::Error,
            _ => AuthStatus::Unauthenticated,
        };
        debug!(error = %outcome, "login failed");
        self.shared.publish(status, Some(outcome.to_string()), false);
        Err(outcome)
    }

    /// Clear the password and any error. Cancels an in-flight login.
    pub fn logout(&self) {
        let (seq, _) = self.shared.begin();
        let _attempt = self.shared.attempt.lock().unwrap_or_else(PoisonError::into_inner);
        self.shared.session.clear_password();
        self.shared.publish(AuthStatus::Unauthenticated, None, false);
        debug!(attempt = seq, "logged out");
    }
}

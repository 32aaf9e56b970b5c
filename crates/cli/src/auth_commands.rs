use {
    anyhow::{Result, bail},
    clawboard_gateway::{AuthError, AuthSessionManager, AuthStatus},
    secrecy::Secret,
    tokio::sync::oneshot,
    tracing::debug,
};

/// Read once, for the first login attempt only.
pub const ENV_PASSWORD: &str = "CLAWBOARD_PASSWORD";

const MAX_ATTEMPTS: usize = 3;

/// Where login passwords come from.
pub struct PasswordSource {
    env: Option<Secret<String>>,
}

impl PasswordSource {
    pub fn from_env() -> Self {
        let env = std::env::var(ENV_PASSWORD)
            .ok()
            .filter(|v| !v.is_empty())
            .map(Secret::new);
        Self { env }
    }

    async fn next(&mut self) -> Result<Secret<String>> {
        if let Some(password) = self.env.take() {
            debug!("using password from {ENV_PASSWORD}");
            return Ok(password);
        }
        // A detached thread, so an interrupted prompt does not hold up
        // runtime shutdown.
        let (tx, rx) = oneshot::channel();
        std::thread::spawn(move || {
            let _ = tx.send(rpassword::prompt_password("Gateway password: "));
        });
        let password = rx.await??;
        if password.is_empty() {
            bail!("no password entered");
        }
        Ok(Secret::new(password))
    }
}

/// Drive the auth state machine to `authenticated`, prompting for the
/// password in password mode. Fails in token mode when the token is
/// rejected and whenever the gateway cannot be reached.
pub async fn ensure_authenticated(
    auth: &AuthSessionManager,
    passwords: &mut PasswordSource,
) -> Result<()> {
    let mut attempts = 0;
    loop {
        let snapshot = auth.snapshot();
        match snapshot.status {
            AuthStatus::Authenticated => return Ok(()),
            AuthStatus::Idle => {
                auth.mount().await;
            },
            AuthStatus::Error => {
                bail!(
                    "{}",
                    snapshot
                        .error
                        .unwrap_or_else(|| "gateway unreachable".into())
                );
            },
            AuthStatus::Unauthenticated if !snapshot.password_mode => {
                bail!(
                    "{}",
                    snapshot
                        .error
                        .unwrap_or_else(|| "gateway rejected the configured token".into())
                );
            },
            AuthStatus::Unauthenticated => {
                if attempts == MAX_ATTEMPTS {
                    bail!("too many failed login attempts");
                }
                if let Some(message) = &snapshot.error {
                    eprintln!("{message}");
                }
                attempts += 1;
                let password = passwords.next().await?;
                match auth.login(password).await {
                    Ok(()) => eprintln!("Logged in."),
                    // Reported from the snapshot on the next pass.
                    Err(AuthError::WrongPassword | AuthError::Rejected { .. }) => {},
                    Err(AuthError::Superseded) => debug!("login superseded"),
                    Err(e @ (AuthError::Connection(_) | AuthError::NotPasswordMode)) => {
                        bail!("login failed: {e}")
                    },
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        clawboard_config::{AuthScheme, ClawboardConfig},
        clawboard_gateway::{GatewayClient, SessionContext},
        std::sync::Arc,
    };

    fn manager(url: &str, session: SessionContext) -> AuthSessionManager {
        let mut config = ClawboardConfig::default();
        config.gateway.url = Some(url.to_string());
        AuthSessionManager::new(GatewayClient::new(&config, Arc::new(session)).unwrap())
    }

    fn env_password(pw: &str) -> PasswordSource {
        PasswordSource {
            env: Some(Secret::new(pw.to_string())),
        }
    }

    #[tokio::test]
    async fn token_mode_needs_no_password() {
        let auth = manager(
            "http://127.0.0.1:9",
            SessionContext::with_token(Secret::new("tok".into())),
        );
        let mut passwords = PasswordSource { env: None };
        ensure_authenticated(&auth, &mut passwords).await.unwrap();
        assert!(auth.is_authenticated());
    }

    #[tokio::test]
    async fn password_from_env_logs_in() {
        let mut server = mockito::Server::new_async().await;
        let probe = server
            .mock("POST", "/tools/invoke")
            .match_header("authorization", "Bearer from-env")
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let auth = manager(
            &server.url(),
            SessionContext::with_password_scheme(AuthScheme::Bearer, "admin"),
        );
        let mut passwords = env_password("from-env");
        ensure_authenticated(&auth, &mut passwords).await.unwrap();
        assert!(auth.is_authenticated());
        assert!(passwords.env.is_none());
        probe.assert_async().await;
    }

    #[tokio::test]
    async fn unreachable_gateway_fails_login() {
        let auth = manager(
            "http://127.0.0.1:9",
            SessionContext::with_password_scheme(AuthScheme::Bearer, "admin"),
        );
        let err = ensure_authenticated(&auth, &mut env_password("pw"))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("login failed"));
        assert_eq!(auth.status(), AuthStatus::Error);
    }

    #[tokio::test]
    async fn rejected_token_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/tools/invoke")
            .with_status(401)
            .create_async()
            .await;

        let auth = manager(
            &server.url(),
            SessionContext::with_token(Secret::new("stale".into())),
        )
        .with_verify_on_mount(true);
        let err = ensure_authenticated(&auth, &mut PasswordSource { env: None })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("rejected"));
    }
}

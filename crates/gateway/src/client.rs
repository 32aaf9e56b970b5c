//! HTTP client for `POST {base}/tools/invoke`.

use std::sync::Arc;

use {
    clawboard_config::ClawboardConfig,
    reqwest::StatusCode,
    secrecy::Secret,
    serde::{Serialize, de::DeserializeOwned},
    tokio_util::sync::CancellationToken,
    tracing::{debug, trace, warn},
};

use crate::{
    envelope::UnwrapPolicy,
    error::{Error, GatewayError, Result},
    session::{Credential, SessionContext},
};

/// Called synchronously after a 401 has cleared the stored password.
pub type UnauthorizedHook = Arc<dyn Fn() + Send + Sync>;

const INVOKE_PATH: &str = "/tools/invoke";

/// Body of one invocation.
#[derive(Debug, Clone, Serialize)]
pub struct InvocationRequest {
    pub tool: String,
    pub args: serde_json::Value,
    #[serde(rename = "sessionKey")]
    pub session_key: String,
}

impl InvocationRequest {
    pub fn new(tool: &str, args: serde_json::Value, session_key: &str) -> Self {
        // Tools expect an object even when called without arguments.
        let args = if args.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            args
        };
        Self {
            tool: tool.to_string(),
            args,
            session_key: session_key.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    endpoint: String,
    session_key: String,
    session: Arc<SessionContext>,
    unwrap: UnwrapPolicy,
    probe_tool: String,
    probe_args: serde_json::Value,
    on_unauthorized: Option<UnauthorizedHook>,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("endpoint", &self.endpoint)
            .field("session_key", &self.session_key)
            .field("session", &self.session)
            .field("unwrap", &self.unwrap)
            .field("probe_tool", &self.probe_tool)
            .field("on_unauthorized", &self.on_unauthorized.is_some())
            .finish()
    }
}

impl GatewayClient {
    /// Build a client from validated config.
    pub fn new(config: &ClawboardConfig, session: Arc<SessionContext>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.gateway.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(Error::Client)?;

        Ok(Self {
            http,
            endpoint: format!("{}{INVOKE_PATH}", config.base_url()),
            session_key: config.gateway.session_key.clone(),
            session,
            unwrap: UnwrapPolicy::from(&config.envelope),
            probe_tool: config.probe.tool.clone(),
            probe_args: config.probe.args.clone(),
            on_unauthorized: None,
        })
    }

    pub fn with_unauthorized_hook(mut self, hook: UnauthorizedHook) -> Self {
        self.on_unauthorized = Some(hook);
        self
    }

    pub fn with_unwrap_policy(mut self, policy: UnwrapPolicy) -> Self {
        self.unwrap = policy;
        self
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Invoke `tool` and convert the unwrapped payload to `T`.
    pub async fn invoke<T: DeserializeOwned>(
        &self,
        tool: &str,
        args: serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let value = self.invoke_value(tool, args, cancel).await?;
        serde_json::from_value(value).map_err(|source| Error::Decode {
            tool: tool.to_string(),
            source,
        })
    }

    /// Invoke `tool` and return the unwrapped payload as JSON.
    pub async fn invoke_value(
        &self,
        tool: &str,
        args: serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value> {
        let Some((credential, version)) = self.session.credential() else {
            debug!(tool, "no credential held, not sending");
            return Err(Error::CredentialsRequired);
        };

        let request = InvocationRequest::new(tool, args, &self.session_key);
        let response = self.send(&request, &credential, cancel).await?;

        if !response.status.is_success() {
            if response.status == StatusCode::UNAUTHORIZED {
                self.handle_unauthorized(tool, version);
            } else {
                debug!(tool, status = response.status.as_u16(), "gateway call failed");
            }
            return Err(response.into_gateway_error(tool).into());
        }

        trace!(tool, bytes = response.body.len(), "gateway call succeeded");
        Ok(self.unwrap.unwrap(response.json()))
    }

    /// Validate a login candidate with the probe invocation.
    ///
    /// Never touches the stored password and never fires the unauthorized
    /// hook: a wrong candidate is not a revocation.
    pub async fn probe(
        &self,
        candidate: &Secret<String>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let credential = self
            .session
            .credential_for(candidate)
            .ok_or(Error::CredentialsRequired)?;
        self.probe_with(&credential, cancel).await
    }

    /// Probe with whatever credential is currently held.
    pub async fn probe_current(&self, cancel: &CancellationToken) -> Result<()> {
        let (credential, _) = self.session.credential().ok_or(Error::CredentialsRequired)?;
        self.probe_with(&credential, cancel).await
    }

    async fn probe_with(&self, credential: &Credential, cancel: &CancellationToken) -> Result<()> {
        let request = InvocationRequest::new(
            &self.probe_tool,
            self.probe_args.clone(),
            &self.session_key,
        );
        let response = self.send(&request, credential, cancel).await?;
        if response.status.is_success() {
            debug!(tool = %self.probe_tool, "probe accepted");
            Ok(())
        } else {
            debug!(tool = %self.probe_tool, status = response.status.as_u16(), "probe refused");
            Err(response.into_gateway_error(&self.probe_tool).into())
        }
    }

    async fn send(
        &self,
        request: &InvocationRequest,
        credential: &Credential,
        cancel: &CancellationToken,
    ) -> Result<RawResponse> {
        debug!(tool = %request.tool, session_key = %request.session_key, "invoking gateway tool");

        let builder = credential.apply(self.http.post(&self.endpoint)).json(request);
        let exchange = async {
            let response = builder.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(RawResponse { status, body })
        };

        // Dropping `exchange` aborts the underlying connection.
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                trace!(tool = %request.tool, "gateway call cancelled");
                Err(Error::Cancelled)
            },
            result = exchange => result.map_err(Error::Transport),
        }
    }

    fn handle_unauthorized(&self, tool: &str, version: u64) {
        if !self.session.revoke(version) {
            debug!(tool, "401 for a credential that was already replaced, ignoring");
            return;
        }
        warn!(tool, mode = %self.session.mode(), "gateway rejected credentials");
        if let Some(hook) = &self.on_unauthorized {
            hook();
        }
    }
}

/// Status and body of one exchange, read in full before classification.
struct RawResponse {
    status: StatusCode,
    body: bytes::Bytes,
}

impl RawResponse {
    /// Defensive decode: empty or malformed bodies are `None`.
    fn json(&self) -> Option<serde_json::Value> {
        if self.body.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }

    fn into_gateway_error(self, tool: &str) -> GatewayError {
        let detail = self.json().or_else(|| {
            let text = String::from_utf8_lossy(&self.body).trim().to_string();
            (!text.is_empty()).then_some(serde_json::Value::String(text))
        });
        GatewayError {
            tool: tool.to_string(),
            status: self.status.as_u16(),
            detail,
        }
    }
}

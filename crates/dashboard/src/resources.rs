//! Gateway calls behind each view, and pollers wrapping them.

use {
    clawboard_gateway::{
        CancellationToken, Error, GatewayClient, PollOptions, ResourcePoller, Result, optional,
        producer,
    },
    serde_json::json,
    tracing::{debug, warn},
};

use crate::types::{ChannelsListResult, SessionStatusResult, SessionsListResult};

pub const SESSIONS_LIST: &str = "sessions_list";
pub const CHANNELS_LIST: &str = "channels_list";
pub const SESSION_STATUS: &str = "session_status";

/// `sessions_list` without message bodies.
pub async fn fetch_sessions(
    client: &GatewayClient,
    limit: u32,
    cancel: &CancellationToken,
) -> Result<SessionsListResult> {
    client
        .invoke(
            SESSIONS_LIST,
            json!({ "limit": limit, "messageLimit": 0 }),
            cancel,
        )
        .await
}

/// `channels_list`; `None` when the gateway has no such tool.
pub async fn fetch_channels(
    client: &GatewayClient,
    cancel: &CancellationToken,
) -> Result<Option<ChannelsListResult>> {
    optional(client.invoke(CHANNELS_LIST, json!({}), cancel).await)
}

/// `session_status` heartbeat; `None` when the gateway has no such tool.
pub async fn fetch_status(
    client: &GatewayClient,
    cancel: &CancellationToken,
) -> Result<Option<SessionStatusResult>> {
    optional(client.invoke(SESSION_STATUS, json!({}), cancel).await)
}

/// Everything the overview shows. A part is `None` when its call failed
/// or the tool is missing.
#[derive(Debug, Clone, Default)]
pub struct DashboardData {
    pub sessions: Option<SessionsListResult>,
    pub channels: Option<ChannelsListResult>,
    pub status: Option<SessionStatusResult>,
}

/// Run the three overview calls concurrently.
///
/// Fails only when sessions failed and channels produced nothing; then the
/// sessions error is returned. Other failures leave their part empty.
pub async fn fetch_dashboard(
    client: &GatewayClient,
    session_limit: u32,
    cancel: &CancellationToken,
) -> Result<DashboardData> {
    let (sessions, channels, status) = tokio::join!(
        fetch_sessions(client, session_limit, cancel),
        fetch_channels(client, cancel),
        fetch_status(client, cancel),
    );
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let channels = channels.unwrap_or_else(|e| {
        warn!(tool = CHANNELS_LIST, error = %e, "dashboard call failed");
        None
    });
    let sessions = match sessions {
        Ok(sessions) => Some(sessions),
        Err(e) if channels.is_none() => return Err(e),
        Err(e) => {
            warn!(tool = SESSIONS_LIST, error = %e, "dashboard call failed");
            None
        },
    };
    let status = status.unwrap_or_else(|e| {
        debug!(tool = SESSION_STATUS, error = %e, "heartbeat unavailable");
        None
    });

    Ok(DashboardData {
        sessions,
        channels,
        status,
    })
}

// ── Pollers ──────────────────────────────────────────────────────────────────

pub fn sessions_poller(
    client: GatewayClient,
    limit: u32,
    options: PollOptions,
) -> ResourcePoller<SessionsListResult> {
    ResourcePoller::spawn(
        SESSIONS_LIST,
        producer(move |token| {
            let client = client.clone();
            async move { fetch_sessions(&client, limit, &token).await }
        }),
        options,
    )
}

/// A gateway without `channels_list` polls as an empty list.
pub fn channels_poller(
    client: GatewayClient,
    options: PollOptions,
) -> ResourcePoller<ChannelsListResult> {
    ResourcePoller::spawn(
        CHANNELS_LIST,
        producer(move |token| {
            let client = client.clone();
            async move {
                fetch_channels(&client, &token)
                    .await
                    .map(Option::unwrap_or_default)
            }
        }),
        options,
    )
}

pub fn dashboard_poller(
    client: GatewayClient,
    session_limit: u32,
    options: PollOptions,
) -> ResourcePoller<DashboardData> {
    ResourcePoller::spawn(
        "dashboard",
        producer(move |token| {
            let client = client.clone();
            async move { fetch_dashboard(&client, session_limit, &token).await }
        }),
        options,
    )
}

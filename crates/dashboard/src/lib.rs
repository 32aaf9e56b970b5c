//! Dashboard data: typed gateway payloads, the pollers that keep them
//! fresh, and the overview figures derived from them.

pub mod resources;
pub mod summary;
pub mod types;

pub use {
    resources::{
        CHANNELS_LIST, DashboardData, SESSION_STATUS, SESSIONS_LIST,
        channels_poller, dashboard_poller, fetch_channels, fetch_dashboard, fetch_sessions,
        fetch_status, sessions_poller,
    },
    summary::{
        ChannelConnection, DashboardSummary, PlatformCount, SessionFilter, TopSession,
        filter_channels, normalize_platform, total_tokens,
    },
    types::{
        Channel, ChannelsListResult, Session, SessionStatusResult, SessionsListResult, Timestamp,
    },
};

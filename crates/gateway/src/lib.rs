//! Gateway access layer: the pieces every dashboard view depends on.
//!
//! - [`client::GatewayClient`] sends one `POST /tools/invoke`, attaches
//!   credentials, classifies failures and unwraps the response envelope.
//! - [`auth::AuthSessionManager`] owns the auth state machine and reacts to
//!   401s reported by the client.
//! - [`poller::ResourcePoller`] drives a producer on a schedule and only ever
//!   publishes the most recently issued result.
//!
//! Credential state lives in an explicit [`session::SessionContext`] shared
//! by `Arc`, so tests can build isolated sessions.

pub mod auth;
pub mod client;
pub mod envelope;
pub mod error;
pub mod poller;
pub mod refresh;
pub mod scheduler;
pub mod session;

pub use {
    auth::{AuthError, AuthSessionManager, AuthSnapshot, AuthStatus},
    client::{GatewayClient, InvocationRequest, UnauthorizedHook},
    envelope::UnwrapPolicy,
    error::{Error, GatewayError, Result, optional, user_message},
    poller::{PollFailure, PollOptions, PollState, Producer, ResourcePoller, producer},
    refresh::RefreshSignal,
    scheduler::{ManualScheduler, Scheduler, Ticker, TokioScheduler},
    session::{Credential, SessionContext},
};

/// Re-exported so callers can build cancellation tokens without a direct dependency.
pub use tokio_util::sync::CancellationToken;

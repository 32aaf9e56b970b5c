//! Configuration for the dashboard: where the gateway lives, how to
//! authenticate against it, and how often each view polls.
//!
//! Config is read once at startup. Sources, later ones winning:
//! 1. `clawboard.{toml,yaml,yml,json}` (explicit path, project-local, or user-global)
//! 2. `CLAWBOARD_*` environment variables
//!
//! [`load`] validates the result so a missing URL or token fails before any
//! network activity.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{apply_env_overrides, config_dir, discover, load, load_config},
    schema::{
        AuthConfig, AuthMode, AuthScheme, ClawboardConfig, DashboardConfig, EnvelopeConfig,
        GatewayConfig, ProbeConfig,
    },
    validate::ConfigError,
};

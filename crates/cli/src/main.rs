mod auth_commands;
mod render;
mod views;

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::Context as _,
    clap::{Parser, Subcommand},
    clawboard_config::ClawboardConfig,
    clawboard_dashboard::SessionFilter,
    clawboard_gateway::{AuthSessionManager, GatewayClient, SessionContext},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::views::{Context, ViewArgs};

#[derive(Parser)]
#[command(
    name = "clawboard",
    version,
    about = "Clawboard: sessions, channels and health of an OpenClaw gateway"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ./clawboard.toml, then ~/.config/clawboard/).
    #[arg(long, global = true, env = "CLAWBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Overview: session count, token usage, channel health, heartbeat.
    Status {
        #[command(flatten)]
        view: ViewArgs,
    },
    /// List sessions.
    Sessions {
        #[command(flatten)]
        view: ViewArgs,
        /// Case-insensitive match on key, model or channel.
        #[arg(short, long)]
        query: Option<String>,
        /// Only sessions on this channel.
        #[arg(long)]
        channel: Option<String>,
        /// Only sessions using this model.
        #[arg(long)]
        model: Option<String>,
    },
    /// List channels.
    Channels {
        #[command(flatten)]
        view: ViewArgs,
        /// Case-insensitive match on platform, status, name or id.
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Invoke a gateway tool and print the unwrapped result.
    Invoke {
        /// Tool name, e.g. `sessions_list`.
        tool: String,
        /// Arguments as a JSON object.
        #[arg(long, default_value = "{}")]
        args: String,
    },
    /// Check credentials against the gateway.
    Login,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    // Logs go to stderr; stdout carries the rendered views.
    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn connect(config: &ClawboardConfig) -> anyhow::Result<AuthSessionManager> {
    let session = Arc::new(SessionContext::from_config(&config.auth));
    let client = GatewayClient::new(config, session)?;
    Ok(AuthSessionManager::new(client).with_verify_on_mount(config.auth.verify_on_mount))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let config = clawboard_config::load(cli.config.as_deref())?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        gateway = %config.base_url(),
        mode = %config.auth.mode,
        "clawboard starting"
    );

    let mut ctx = Context::new(&config, connect(&config)?);

    match cli.command {
        Commands::Status { view } => views::status(&mut ctx, &view).await,
        Commands::Sessions {
            view,
            query,
            channel,
            model,
        } => {
            let filter = SessionFilter {
                query,
                channel,
                model,
            };
            views::sessions(&mut ctx, &view, filter).await
        },
        Commands::Channels { view, query } => views::channels(&mut ctx, &view, query).await,
        Commands::Invoke { tool, args } => {
            let args: serde_json::Value =
                serde_json::from_str(&args).context("--args must be valid JSON")?;
            views::invoke(&mut ctx, tool, args).await
        },
        Commands::Login => views::login(&mut ctx).await,
    }
}

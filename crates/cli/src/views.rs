//! One-shot and `--watch` renderings of the dashboard views.

use std::{io::IsTerminal, sync::Arc};

use {
    anyhow::{Result, bail},
    clap::Args,
    clawboard_config::{ClawboardConfig, DashboardConfig},
    clawboard_dashboard::{
        ChannelsListResult, DashboardData, DashboardSummary, SessionFilter, SessionsListResult,
        channels_poller, dashboard_poller, fetch_channels, fetch_dashboard, fetch_sessions,
        filter_channels, sessions_poller,
    },
    clawboard_gateway::{
        AuthSessionManager, AuthStatus, CancellationToken, Error, PollOptions, PollState,
        RefreshSignal, ResourcePoller, user_message,
    },
    serde::Serialize,
    tracing::debug,
};

use crate::{
    auth_commands::{PasswordSource, ensure_authenticated},
    render,
};

#[derive(Debug, Clone, Args)]
pub struct ViewArgs {
    /// Keep polling and redraw until Ctrl-C.
    #[arg(short, long)]
    pub watch: bool,

    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

/// Everything a view needs.
pub struct Context {
    pub auth: AuthSessionManager,
    pub passwords: PasswordSource,
    pub dashboard: DashboardConfig,
    pub refresh: RefreshSignal,
}

impl Context {
    pub fn new(config: &ClawboardConfig, auth: AuthSessionManager) -> Self {
        Self {
            auth,
            passwords: PasswordSource::from_env(),
            dashboard: config.dashboard.clone(),
            refresh: RefreshSignal::new(),
        }
    }

    fn poll_options(&self, secs: u64) -> PollOptions {
        PollOptions::once()
            .with_interval(DashboardConfig::interval(secs))
            .with_refresh(self.refresh.clone())
    }

    /// Run `call`, logging in again and retrying when the gateway revokes
    /// a password mid-call.
    async fn authed<T, F, Fut>(&mut self, call: F) -> Result<T>
    where
        F: Fn(AuthSessionManager) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        loop {
            ensure_authenticated(&self.auth, &mut self.passwords).await?;
            match call(self.auth.clone()).await {
                Err(e) if self.needs_login(&e) => debug!("credentials revoked, logging in again"),
                Err(e) => bail!("{}", user_message(&e)),
                Ok(value) => return Ok(value),
            }
        }
    }

    fn needs_login(&self, err: &Error) -> bool {
        self.auth.session().is_password_mode()
            && (err.is_unauthorized() || matches!(err, Error::CredentialsRequired))
    }
}

// ── Views ────────────────────────────────────────────────────────────────────

pub async fn status(ctx: &mut Context, args: &ViewArgs) -> Result<()> {
    let limit = ctx.dashboard.session_limit;
    let json = args.json;
    let show = move |data: &DashboardData| {
        let summary = DashboardSummary::from_data(data);
        if json {
            to_json(&summary)
        } else {
            render::summary(&summary)
        }
    };

    if args.watch {
        ensure_authenticated(&ctx.auth, &mut ctx.passwords).await?;
        let options = ctx.poll_options(ctx.dashboard.poll_secs);
        let poller = dashboard_poller(ctx.auth.client().clone(), limit, options);
        return watch(ctx, poller, show).await;
    }

    let data = ctx
        .authed(|auth| async move {
            fetch_dashboard(auth.client(), limit, &CancellationToken::new()).await
        })
        .await?;
    println!("{}", show(&data));
    Ok(())
}

pub async fn sessions(ctx: &mut Context, args: &ViewArgs, filter: SessionFilter) -> Result<()> {
    let limit = ctx.dashboard.session_limit;
    let json = args.json;
    let show = move |data: &SessionsListResult| {
        let sessions = filter.apply(&data.sessions);
        if json {
            to_json(&sessions)
        } else {
            render::sessions(&sessions)
        }
    };

    if args.watch {
        ensure_authenticated(&ctx.auth, &mut ctx.passwords).await?;
        let options = ctx.poll_options(ctx.dashboard.sessions_poll_secs);
        let poller = sessions_poller(ctx.auth.client().clone(), limit, options);
        return watch(ctx, poller, show).await;
    }

    let data = ctx
        .authed(|auth| async move {
            fetch_sessions(auth.client(), limit, &CancellationToken::new()).await
        })
        .await?;
    println!("{}", show(&data));
    Ok(())
}

pub async fn channels(ctx: &mut Context, args: &ViewArgs, query: Option<String>) -> Result<()> {
    let json = args.json;
    let show = move |data: &ChannelsListResult| {
        let channels = filter_channels(&data.channels, query.as_deref());
        if json {
            to_json(&channels)
        } else {
            render::channels(&channels)
        }
    };

    if args.watch {
        ensure_authenticated(&ctx.auth, &mut ctx.passwords).await?;
        let options = ctx.poll_options(ctx.dashboard.channels_poll_secs);
        let poller = channels_poller(ctx.auth.client().clone(), options);
        return watch(ctx, poller, show).await;
    }

    let data = ctx
        .authed(|auth| async move {
            fetch_channels(auth.client(), &CancellationToken::new())
                .await
                .map(Option::unwrap_or_default)
        })
        .await?;
    println!("{}", show(&data));
    Ok(())
}

/// Invoke any tool and print the unwrapped payload.
pub async fn invoke(ctx: &mut Context, tool: String, args: serde_json::Value) -> Result<()> {
    let tool = Arc::new(tool);
    let value = ctx
        .authed(|auth| {
            let tool = Arc::clone(&tool);
            let args = args.clone();
            async move {
                auth.client()
                    .invoke_value(&tool, args, &CancellationToken::new())
                    .await
            }
        })
        .await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Check credentials and report the outcome.
pub async fn login(ctx: &mut Context) -> Result<()> {
    ensure_authenticated(&ctx.auth, &mut ctx.passwords).await?;
    println!(
        "authenticated against {} ({} mode)",
        ctx.auth.client().endpoint(),
        ctx.auth.session().mode()
    );
    Ok(())
}

// ── Watch loop ───────────────────────────────────────────────────────────────

async fn watch<T, F>(ctx: &mut Context, poller: ResourcePoller<T>, show: F) -> Result<()>
where
    T: Send + Sync + 'static,
    F: Fn(&T) -> String,
{
    let mut states = poller.subscribe();
    let mut auth_states = ctx.auth.subscribe();
    let clear = std::io::stdout().is_terminal();

    loop {
        tokio::select! {
            () = interrupt() => {
                poller.shutdown();
                return Ok(());
            },
            changed = states.changed() => {
                changed?;
                let state = states.borrow_and_update().clone();
                if !state.loading {
                    draw(&state, &show, clear);
                }
            },
            changed = auth_states.changed() => {
                changed?;
                let status = auth_states.borrow_and_update().status;
                if status == AuthStatus::Unauthenticated {
                    eprintln!("Gateway rejected the session.");
                    if !relogin(ctx).await? {
                        poller.shutdown();
                        return Ok(());
                    }
                    ctx.refresh.trigger();
                }
            },
        }
    }
}

/// Log in again, giving up quietly on Ctrl-C. Returns false when interrupted.
async fn relogin(ctx: &mut Context) -> Result<bool> {
    until_interrupted(
        ensure_authenticated(&ctx.auth, &mut ctx.passwords),
        interrupt(),
    )
    .await
}

fn interrupt() -> impl Future<Output = ()> {
    async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            debug!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    }
}

/// `Ok(true)` when `work` finished first, `Ok(false)` when `interrupted` did.
async fn until_interrupted<W, I>(work: W, interrupted: I) -> Result<bool>
where
    W: Future<Output = Result<()>>,
    I: Future<Output = ()>,
{
    tokio::select! {
        biased;
        () = interrupted => Ok(false),
        done = work => done.map(|()| true),
    }
}

fn draw<T, F>(state: &PollState<T>, show: &F, clear: bool)
where
    F: Fn(&T) -> String,
{
    if clear {
        print!("\x1b[2J\x1b[H");
    }
    if let Some(err) = &state.error {
        println!("error: {}\n", user_message(err));
    }
    match &state.data {
        Some(data) => println!("{}", show(data.as_ref())),
        None => println!("(no data yet)"),
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
}

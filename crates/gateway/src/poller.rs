//! Generation-tracked polling of one gateway resource.
//!
//! Every cycle gets a fresh [`CancellationToken`] and a generation number.
//! Issuing a cycle cancels the previous token, so only the most recently
//! issued cycle can publish. Issuance order decides precedence, never
//! completion order.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use {
    futures::{FutureExt, future::BoxFuture},
    tokio::{
        sync::watch,
        task::{AbortHandle, JoinHandle},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, trace},
};

use crate::{
    error::Error,
    refresh::RefreshSignal,
    scheduler::{Scheduler, TokioScheduler},
};

/// Produces one value per cycle. The token fires when the cycle is
/// superseded or the poller shuts down.
pub type Producer<T, E = Error> =
    Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

/// Wrap an async closure as a [`Producer`].
pub fn producer<T, E, F, Fut>(f: F) -> Producer<T, E>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    Arc::new(move |token| f(token).boxed())
}

/// Failures a poller can publish.
pub trait PollFailure: fmt::Display + Send + Sync + 'static {
    /// Cancellation-class failures are swallowed, never published.
    fn is_cancellation(&self) -> bool {
        false
    }
}

impl PollFailure for Error {
    fn is_cancellation(&self) -> bool {
        self.is_cancelled()
    }
}

// ── State ────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct PollState<T, E = Error> {
    pub data: Option<Arc<T>>,
    pub loading: bool,
    pub error: Option<Arc<E>>,
    /// Generation of the most recently issued cycle.
    pub generation: u64,
}

impl<T, E> Default for PollState<T, E> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            generation: 0,
        }
    }
}

impl<T, E> Clone for PollState<T, E> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            loading: self.loading,
            error: self.error.clone(),
            generation: self.generation,
        }
    }
}

// ── Options ──────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PollOptions {
    pub interval: Option<Duration>,
    pub immediate: bool,
    pub scheduler: Arc<dyn Scheduler>,
    pub refresh: Option<RefreshSignal>,
}

impl fmt::Debug for PollOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollOptions")
            .field("interval", &self.interval)
            .field("immediate", &self.immediate)
            .field("refresh", &self.refresh.is_some())
            .finish()
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: None,
            immediate: true,
            scheduler: Arc::new(TokioScheduler),
            refresh: None,
        }
    }
}

impl PollOptions {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval: Some(interval),
            ..Self::default()
        }
    }

    /// A single fetch at start, then only on explicit refetch.
    pub fn once() -> Self {
        Self::default()
    }

    pub fn with_interval(mut self, interval: Option<Duration>) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_refresh(mut self, refresh: RefreshSignal) -> Self {
        self.refresh = Some(refresh);
        self
    }
}

// ── Poller ───────────────────────────────────────────────────────────────────

struct Cycle {
    generation: u64,
    token: Option<CancellationToken>,
    closed: bool,
}

struct Shared<T, E> {
    name: String,
    producer: Producer<T, E>,
    /// Guards issuance and publication; never held across an await.
    cycle: Mutex<Cycle>,
    state: watch::Sender<PollState<T, E>>,
}

impl<T, E> Shared<T, E>
where
    T: Send + Sync + 'static,
    E: PollFailure,
{
    fn issue(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let (generation, token) = {
            let mut cycle = self.cycle.lock().unwrap_or_else(PoisonError::into_inner);
            if cycle.closed {
                return None;
            }
            if let Some(previous) = cycle.token.take() {
                previous.cancel();
            }
            cycle.generation += 1;
            let generation = cycle.generation;
            let token = CancellationToken::new();
            cycle.token = Some(token.clone());
            self.state.send_modify(|state| {
                state.loading = true;
                state.error = None;
                state.generation = generation;
            });
            (generation, token)
        };

        trace!(poller = %self.name, generation, "cycle issued");
        let shared = Arc::clone(self);
        Some(tokio::spawn(async move { shared.run(generation, token).await }))
    }

    async fn run(self: Arc<Self>, generation: u64, token: CancellationToken) {
        let fetch = (self.producer)(token.clone());
        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => None,
            result = fetch => Some(result),
        };
        self.finish(generation, &token, outcome);
    }

    fn finish(&self, generation: u64, token: &CancellationToken, outcome: Option<Result<T, E>>) {
        let cycle = self.cycle.lock().unwrap_or_else(PoisonError::into_inner);
        let current = !cycle.closed && cycle.generation == generation && !token.is_cancelled();

        match outcome {
            // Superseded or shut down: the newer cycle or the shutdown owns
            // `loading`.
            None => trace!(poller = %self.name, generation, "cycle cancelled"),
            Some(Ok(data)) if current => {
                self.state.send_modify(|state| {
                    state.data = Some(Arc::new(data));
                    state.error = None;
                    state.loading = false;
                });
            },
            Some(Err(err)) if err.is_cancellation() => {
                trace!(poller = %self.name, generation, "cancellation swallowed");
                if current {
                    self.state.send_modify(|state| state.loading = false);
                }
            },
            Some(Err(err)) if current => {
                debug!(poller = %self.name, generation, error = %err, "poll failed");
                self.state.send_modify(|state| {
                    state.error = Some(Arc::new(err));
                    state.loading = false;
                });
            },
            Some(_) => trace!(
                poller = %self.name,
                generation,
                current = cycle.generation,
                "stale result discarded"
            ),
        }
    }
}

impl<T, E> Shared<T, E> {
    fn close(&self) {
        let mut cycle = self.cycle.lock().unwrap_or_else(PoisonError::into_inner);
        if cycle.closed {
            return;
        }
        cycle.closed = true;
        if let Some(token) = cycle.token.take() {
            token.cancel();
        }
        self.state
            .send_if_modified(|state| std::mem::replace(&mut state.loading, false));
        debug!(poller = %self.name, "poller stopped");
    }
}

/// Owns a resource's [`PollState`] and the tasks that refresh it.
///
/// Must be created inside a tokio runtime. Dropping the poller shuts it
/// down.
pub struct ResourcePoller<T, E = Error> {
    shared: Arc<Shared<T, E>>,
    tasks: Vec<AbortHandle>,
}

impl<T, E> fmt::Debug for ResourcePoller<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePoller")
            .field("name", &self.shared.name)
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

impl<T, E> ResourcePoller<T, E>
where
    T: Send + Sync + 'static,
    E: PollFailure,
{
    pub fn spawn(name: impl Into<String>, producer: Producer<T, E>, options: PollOptions) -> Self {
        let (state, _) = watch::channel(PollState::default());
        let shared = Arc::new(Shared {
            name: name.into(),
            producer,
            cycle: Mutex::new(Cycle {
                generation: 0,
                token: None,
                closed: false,
            }),
            state,
        });

        let mut tasks = Vec::new();

        if let Some(period) = options.interval {
            // Register with the scheduler now so no tick is missed.
            let mut ticker = options.scheduler.every(period);
            let shared = Arc::clone(&shared);
            let task = tokio::spawn(async move {
                while ticker.tick().await {
                    shared.issue();
                }
            });
            tasks.push(task.abort_handle());
        }

        if let Some(signal) = &options.refresh {
            let mut rx = signal.subscribe();
            let shared = Arc::clone(&shared);
            let task = tokio::spawn(async move {
                while rx.changed().await.is_ok() {
                    shared.issue();
                }
            });
            tasks.push(task.abort_handle());
        }

        debug!(
            poller = %shared.name,
            interval_ms = options.interval.map(|d| d.as_millis() as u64),
            immediate = options.immediate,
            "poller started"
        );

        if options.immediate {
            shared.issue();
        }

        Self { shared, tasks }
    }

    /// Issue a new cycle without waiting for it.
    pub fn trigger(&self) {
        self.shared.issue();
    }

    /// Issue a new cycle and wait until it has settled (published, been
    /// discarded, or been superseded).
    pub async fn refetch(&self) {
        if let Some(handle) = self.shared.issue() {
            let _ = handle.await;
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PollState<T, E>> {
        self.shared.state.subscribe()
    }

    pub fn snapshot(&self) -> PollState<T, E> {
        self.shared.state.borrow().clone()
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Cancel the in-flight cycle and stop the timer. Nothing is published
    /// afterwards. Idempotent.
    pub fn shutdown(&self) {
        for task in &self.tasks {
            task.abort();
        }
        self.shared.close();
    }
}

impl<T, E> Drop for ResourcePoller<T, E> {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        self.shared.close();
    }
}

use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering::SeqCst},
        Arc,
    },
    time::{Duration, Instant},
};

use futures::{stream::FuturesUnordered, StreamExt};
use tokio::{
    runtime::Runtime,
    task::{JoinError, JoinHandle},
};
use tracing::{debug, debug_span, info, info_span, warn};

use crate::{
    config::{ConfigError, DriverConfig},
    counter::{Counter, SharedCounter},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Created,
    Dispatched,
    Joined,
    Reported,
}

impl DriverState {
    fn next(self) -> Option<DriverState> {
        match self {
            DriverState::Created => Some(DriverState::Dispatched),
            DriverState::Dispatched => Some(DriverState::Joined),
            DriverState::Joined => Some(DriverState::Reported),
            DriverState::Reported => None,
        }
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverState::Created => "created",
            DriverState::Dispatched => "dispatched",
            DriverState::Joined => "joined",
            DriverState::Reported => "reported",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct Report {
    pub workers: usize,
    pub increments_per_worker: usize,
    pub value: u64,
    pub elapsed: Duration,
}

impl Report {
    pub fn expected(&self) -> u64 {
        (self.workers as u64) * (self.increments_per_worker as u64)
    }

    pub fn lost_updates(&self) -> u64 {
        self.expected().saturating_sub(self.value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("invalid driver config: {0}")]
    Config(#[from] ConfigError),
    #[error("worker {worker} failed before finishing its increments: {reason}")]
    TaskFailure { worker: usize, reason: String },
    #[error("workers did not finish within {after:?}")]
    JoinTimeout { after: Duration },
    #[error("{0} workers were still running when the counter was read")]
    WorkersStillActive(usize),
    #[error("driver cannot run again, it is already {0}")]
    AlreadyRun(DriverState),
    #[error("failed to build the worker pool: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Fans `workers` tasks out over a fixed pool, each calling
/// [`Counter::increment`] `increments` times, joins every one of them and only
/// then reads the counter.
///
/// A driver runs once: `created -> dispatched -> joined -> reported`.
#[derive(Debug)]
pub struct ConcurrentDriver {
    config: DriverConfig,
    state: DriverState,
}

impl Default for ConcurrentDriver {
    fn default() -> Self {
        Self {
            config: DriverConfig::default(),
            state: DriverState::Created,
        }
    }
}

impl ConcurrentDriver {
    pub fn new(config: DriverConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            state: DriverState::Created,
        })
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn run(&mut self) -> Result<Report, DriverError> {
        self.run_on(SharedCounter::new())
    }

    pub fn run_on<C: Counter>(&mut self, counter: C) -> Result<Report, DriverError> {
        if self.state != DriverState::Created {
            return Err(DriverError::AlreadyRun(self.state));
        }

        let span = info_span!(
            "run",
            workers = self.config.workers,
            increments = self.config.increments
        );
        let _entered = span.enter();

        let start = Instant::now();
        let deadline = self.config.join_timeout().map(|after| start + after);
        let counter = Arc::new(counter);
        let live = Arc::new(AtomicUsize::new(0));

        let runtime = self.build_runtime()?;
        let handles = self.dispatch(&runtime, &counter, &live);

        let joined = match self.config.join_timeout() {
            Some(after) => runtime
                .block_on(async { tokio::time::timeout(after, join_workers(handles)).await })
                .unwrap_or(Err(DriverError::JoinTimeout { after })),
            None => runtime.block_on(join_workers(handles)),
        };

        if let Err(err) = joined {
            warn!(%err, still_running = live.load(SeqCst), "workers did not all complete");
            // blocking workers cannot be cancelled. siblings of a failed worker
            // get whatever is left of the join timeout, without one the
            // runtime drop waits for them.
            match deadline {
                Some(deadline) => {
                    runtime.shutdown_timeout(deadline.saturating_duration_since(Instant::now()))
                }
                None => drop(runtime),
            }
            return Err(err);
        }
        self.advance(DriverState::Joined);

        // the counter is only ever read once nothing can still write to it
        ensure_all_joined(&live)?;

        let value = counter.get();
        self.advance(DriverState::Reported);

        let report = Report {
            workers: self.config.workers,
            increments_per_worker: self.config.increments,
            value,
            elapsed: start.elapsed(),
        };
        info!(
            value,
            expected = self.config.expected_total(),
            elapsed = ?report.elapsed,
            "all workers joined"
        );

        Ok(report)
    }

    // workers never await, so they go on the blocking pool, which is capped
    // at one thread per worker. the single async thread is left to drive the
    // join and its timer.
    fn build_runtime(&self) -> std::io::Result<Runtime> {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(self.config.workers)
            .thread_name("counter-worker")
            .enable_all()
            .build()
    }

    fn dispatch<C: Counter>(
        &mut self,
        runtime: &Runtime,
        counter: &Arc<C>,
        live: &Arc<AtomicUsize>,
    ) -> Vec<JoinHandle<()>> {
        let increments = self.config.increments;

        let handles = (0..self.config.workers)
            .map(|worker| {
                let counter = Arc::clone(counter);
                let live = LiveWorker::register(live);
                let span = debug_span!("worker", worker);

                runtime.spawn_blocking(move || {
                    let _live = live;
                    let _entered = span.enter();
                    debug!("started");
                    for _ in 0..increments {
                        counter.increment();
                    }
                    debug!("finished");
                })
            })
            .collect();

        self.advance(DriverState::Dispatched);
        handles
    }

    fn advance(&mut self, next: DriverState) {
        debug_assert_eq!(Some(next), self.state.next(), "driver states cannot be skipped");
        debug!(from = %self.state, to = %next, "driver state change");
        self.state = next;
    }
}

// drained in completion order, so a failed worker is reported as soon as it
// ends even if a sibling dispatched before it is still running
async fn join_workers(handles: Vec<JoinHandle<()>>) -> Result<(), DriverError> {
    let mut pending = handles
        .into_iter()
        .enumerate()
        .map(|(worker, handle)| async move { (worker, handle.await) })
        .collect::<FuturesUnordered<_>>();

    while let Some((worker, joined)) = pending.next().await {
        joined.map_err(|err| DriverError::TaskFailure {
            worker,
            reason: failure_reason(err),
        })?;
    }

    Ok(())
}

fn ensure_all_joined(live: &AtomicUsize) -> Result<(), DriverError> {
    match live.load(SeqCst) {
        0 => Ok(()),
        still_running => Err(DriverError::WorkersStillActive(still_running)),
    }
}

fn failure_reason(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }

    let payload = err.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

/// Counts a worker as live from dispatch until it is dropped, which happens
/// when the worker returns, unwinds, or is discarded without ever starting.
struct LiveWorker(Arc<AtomicUsize>);

impl LiveWorker {
    fn register(live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, SeqCst);
        Self(Arc::clone(live))
    }
}

impl Drop for LiveWorker {
    fn drop(&mut self) {
        self.0.fetch_sub(1, SeqCst);
    }
}

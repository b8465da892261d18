//! Periodic runs of every pipe over a bounded worker pool.
//!
//! Ticks are serial with a fixed delay: a run, deadline included, completes
//! before the next delay starts, so the same pipe never runs twice at once.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use wring_core::config::RoutineConfig;
use wring_core::{PipeId, WringError};

use crate::cycle::Cycle;

/// Counts of one completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub submitted: usize,
    pub completed: usize,
    pub elapsed: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum RoutineError {
    #[error("Can't list pipes: {0}")]
    Store(#[from] WringError),

    #[error("Run exceeded {lag:?}: {completed} of {submitted} pipe(s) done, {abandoned} abandoned")]
    Deadline {
        submitted: usize,
        completed: usize,
        abandoned: usize,
        lag: Duration,
    },

    #[error("{count} pipe run(s) escaped their error boundary, first: {first}")]
    Escaped { count: usize, first: String },

    #[error("Routine did not stop within {0:?}")]
    Shutdown(Duration),
}

/// What one pipe task came back with. `None` means it never got a worker
/// because the pool was closed.
type TaskOutcome = (PipeId, Option<Result<(), WringError>>);

pub struct Routine {
    cycle: Arc<Cycle>,
    pool: Arc<Semaphore>,
    threads: usize,
    tick: Duration,
    lag: Duration,
    shutdown: watch::Sender<bool>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Routine {
    pub fn new(cycle: Arc<Cycle>, config: &RoutineConfig) -> Self {
        Self::with_timing(cycle, config.resolved_threads(), config.tick(), config.lag())
    }

    pub fn with_timing(cycle: Arc<Cycle>, threads: usize, tick: Duration, lag: Duration) -> Self {
        let threads = threads.max(1);
        let (shutdown, _) = watch::channel(false);
        Self {
            cycle,
            pool: Arc::new(Semaphore::new(threads)),
            threads,
            tick,
            lag,
            shutdown,
            ticker: Mutex::new(None),
        }
    }

    /// Start ticking in the background. A second call is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut ticker = self.ticker.lock().unwrap_or_else(PoisonError::into_inner);
        if ticker.is_some() {
            warn!("routine already started");
            return;
        }
        let routine = Arc::clone(self);
        let mut shutdown = self.shutdown.subscribe();
        *ticker = Some(tokio::spawn(async move {
            info!(
                threads = routine.threads,
                tick = ?routine.tick,
                lag = ?routine.lag,
                "routine started"
            );
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(routine.tick) => {}
                    _ = shutdown.changed() => break,
                }
                if *shutdown.borrow() {
                    break;
                }
                match routine.call().await {
                    Ok(report) => info!(
                        submitted = report.submitted,
                        completed = report.completed,
                        elapsed_ms = report.elapsed.as_millis() as u64,
                        "run finished"
                    ),
                    Err(e) => error!(error = %e, "run failed"),
                }
            }
            info!("routine ticker stopped");
        }));
    }

    /// One pass over a snapshot of all pipes.
    pub async fn call(&self) -> Result<RunReport, RoutineError> {
        let start = Instant::now();
        let deadline = start + self.lag;
        let pipes = self.cycle.base().pipes().await?;
        let submitted = pipes.len();
        debug!(submitted, "run started");

        let mut tasks: JoinSet<TaskOutcome> = JoinSet::new();
        for pipe in pipes {
            let cycle = Arc::clone(&self.cycle);
            let pool = Arc::clone(&self.pool);
            tasks.spawn(async move {
                let Ok(_permit) = pool.acquire_owned().await else {
                    return (pipe.id, None);
                };
                (pipe.id, Some(cycle.exec(&pipe).await))
            });
        }

        let tracker = self.cycle.tracker();
        let mut completed = 0;
        let mut escaped: Vec<String> = Vec::new();
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(None) => break,
                Ok(Some(Ok((_, Some(Ok(())))))) => completed += 1,
                Ok(Some(Ok((id, Some(Err(e)))))) => {
                    tracker.capture(&format!("pipe {id}"), &e);
                    escaped.push(format!("pipe {id}: {e}"));
                }
                Ok(Some(Ok((id, None)))) => debug!(pipe = id, "pool closed, pipe skipped"),
                Ok(Some(Err(e))) if e.is_panic() => {
                    tracker.capture("pipe task", &e);
                    escaped.push(e.to_string());
                }
                Ok(Some(Err(_))) => {}
                Err(_) => {
                    let abandoned = tasks.len();
                    tasks.abort_all();
                    let err = RoutineError::Deadline {
                        submitted,
                        completed,
                        abandoned,
                        lag: self.lag,
                    };
                    tracker.capture("routine", &err);
                    return Err(err);
                }
            }
        }

        if let Some(first) = escaped.first() {
            return Err(RoutineError::Escaped {
                count: escaped.len(),
                first: first.clone(),
            });
        }
        Ok(RunReport {
            submitted,
            completed,
            elapsed: start.elapsed(),
        })
    }

    /// Stop ticking and let the current run finish within the lag.
    ///
    /// Pending pipes that have not got a worker yet are skipped. If the run
    /// is still going after the lag it is cancelled, and if that does not
    /// take effect within another lag the routine is declared stuck.
    /// A stopped routine cannot be started again.
    pub async fn stop(&self) -> Result<(), RoutineError> {
        self.shutdown.send_replace(true);
        self.pool.close();
        let handle = self
            .ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut handle) = handle else {
            return Ok(());
        };
        if tokio::time::timeout(self.lag, &mut handle).await.is_ok() {
            info!("routine stopped");
            return Ok(());
        }
        warn!(lag = ?self.lag, "run still going, cancelling it");
        handle.abort();
        match tokio::time::timeout(self.lag, handle).await {
            Ok(_) => {
                info!("routine stopped after cancellation");
                Ok(())
            }
            Err(_) => Err(RoutineError::Shutdown(self.lag)),
        }
    }
}

//! Periodic loops for the intake monitor and the status router.
//!
//! A [`PollingLoop`] runs one [`Cycle`] immediately on start and then once
//! per interval. Shutdown is checked only between cycles, so a cycle in
//! flight always finishes before the loop reports `Stopped`.

use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Lifecycle of a polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl LoopState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }

    /// Legal edges: Stopped → Starting → Running → Stopping → Stopped.
    pub fn can_become(&self, next: LoopState) -> bool {
        matches!(
            (self, next),
            (Self::Stopped, Self::Starting)
                | (Self::Starting, Self::Running)
                | (Self::Starting, Self::Stopped)
                | (Self::Running, Self::Stopping)
                | (Self::Stopping, Self::Stopped)
        )
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of periodic work.
#[async_trait]
pub trait Cycle: Send + Sync + 'static {
    type Report: fmt::Display + Send;

    fn name(&self) -> &'static str;

    async fn run_cycle(&self) -> Result<Self::Report>;
}

struct RunningLoop {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

pub struct PollingLoop<C: Cycle> {
    cycle: Arc<C>,
    interval: Duration,
    state_tx: watch::Sender<LoopState>,
    running: Mutex<Option<RunningLoop>>,
}

impl<C: Cycle> PollingLoop<C> {
    pub fn new(cycle: Arc<C>, interval: Duration) -> Self {
        let (state_tx, _) = watch::channel(LoopState::Stopped);
        Self {
            cycle,
            interval,
            state_tx,
            running: Mutex::new(None),
        }
    }

    pub fn state(&self) -> LoopState {
        *self.state_tx.borrow()
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<LoopState> {
        self.state_tx.subscribe()
    }

    fn transition(&self, action: &'static str, next: LoopState) -> Result<()> {
        let current = self.state();
        if !current.can_become(next) {
            return Err(PipelineError::LoopState {
                action,
                state: current,
            });
        }
        self.state_tx.send_replace(next);
        Ok(())
    }

    /// Start the loop. Fails unless the loop is stopped.
    pub async fn start(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        self.transition("start", LoopState::Starting)?;

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(drive(Arc::clone(&self.cycle), self.interval, shutdown_rx));
        *running = Some(RunningLoop { shutdown_tx, task });

        self.transition("start", LoopState::Running)?;
        info!(
            "{} loop started (every {}s)",
            self.cycle.name(),
            self.interval.as_secs()
        );
        Ok(())
    }

    /// Stop the loop, waiting for an in-flight cycle to finish.
    /// Stopping a stopped loop is a no-op.
    pub async fn stop(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        let Some(handle) = running.take() else {
            return Ok(());
        };
        self.transition("stop", LoopState::Stopping)?;

        // The receiver is gone if the task already exited; joining covers it.
        let _ = handle.shutdown_tx.send(()).await;
        if let Err(e) = handle.task.await {
            error!("{} loop task ended abnormally: {}", self.cycle.name(), e);
        }

        self.transition("stop", LoopState::Stopped)?;
        info!("{} loop stopped", self.cycle.name());
        Ok(())
    }
}

async fn drive<C: Cycle>(cycle: Arc<C>, interval: Duration, mut shutdown_rx: mpsc::Receiver<()>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.recv() => break,

            _ = ticker.tick() => {}
        }

        // Not raced against shutdown: a cycle always runs to completion.
        match cycle.run_cycle().await {
            Ok(report) => info!("{} cycle complete: {}", cycle.name(), report),
            Err(e) if e.is_transport() => {
                warn!("{} cycle aborted, will retry next tick: {}", cycle.name(), e)
            }
            Err(e) => error!("{} cycle failed: {}", cycle.name(), e),
        }
    }
}

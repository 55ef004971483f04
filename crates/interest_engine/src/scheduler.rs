//! # Drain Scheduler
//!
//! Drives [`Scene::drain`] from two sources:
//!
//! - **Heartbeat** - a fixed interval that drains every presence under
//!   [`SchedulerConfig::heartbeat_budget`], so nothing waits forever
//! - **Readiness signals** - the transport reports that a presence's
//!   connection has room, via [`SchedulerHandle::signal_ready`], and that
//!   presence is drained under the budget carried by the signal
//!
//! Both paths share the same drain primitive, including its
//! one-drain-per-presence guard.

use crate::error::EngineError;
use crate::shutdown::ShutdownState;
use crate::system::{DrainBudget, Scene};
use crate::types::PresenceId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, trace};

/// Heartbeat and budget settings for a [`DrainScheduler`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Budget applied to each presence on every heartbeat
    #[serde(default = "default_heartbeat_budget")]
    pub heartbeat_budget: DrainBudget,
}

fn default_heartbeat_interval_ms() -> u64 {
    3000
}

fn default_heartbeat_budget() -> DrainBudget {
    DrainBudget::Entries(256)
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            heartbeat_budget: default_heartbeat_budget(),
        }
    }
}

impl SchedulerConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.heartbeat_interval_ms == 0 {
            return Err("heartbeat_interval_ms must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// "This presence can take more data now."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadySignal {
    pub presence: PresenceId,
    pub budget: DrainBudget,
}

/// Cloneable sender side of the readiness channel.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<ReadySignal>,
}

impl SchedulerHandle {
    /// Asks the scheduler to drain `presence` under `budget`. Never blocks.
    pub fn signal_ready(&self, presence: PresenceId, budget: DrainBudget) -> Result<(), EngineError> {
        self.tx
            .send(ReadySignal { presence, budget })
            .map_err(|_| EngineError::SchedulerClosed)
    }
}

pub struct DrainScheduler {
    scene: Arc<Scene>,
    config: SchedulerConfig,
    rx: mpsc::UnboundedReceiver<ReadySignal>,
}

impl DrainScheduler {
    pub fn new(scene: Arc<Scene>, config: SchedulerConfig) -> (Self, SchedulerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { scene, config, rx }, SchedulerHandle { tx })
    }

    /// Runs the scheduler on its own task.
    pub fn spawn(self, shutdown: ShutdownState) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Runs until `shutdown` is initiated. The first heartbeat fires one
    /// interval after start.
    pub async fn run(mut self, shutdown: ShutdownState) {
        let period = self.config.heartbeat_interval();
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut accepting_signals = true;

        info!(
            "⏱️ Drain scheduler started for scene '{}' (heartbeat every {:?}, budget {:?})",
            self.scene.name(),
            period,
            self.config.heartbeat_budget
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.wait() => break,

                _ = heartbeat.tick() => self.heartbeat(),

                signal = self.rx.recv(), if accepting_signals => match signal {
                    Some(signal) => self.on_ready(signal),
                    None => {
                        debug!("All scheduler handles dropped, continuing on heartbeat only");
                        accepting_signals = false;
                    }
                },
            }
        }

        self.rx.close();
        info!("⏱️ Drain scheduler for scene '{}' stopped", self.scene.name());
    }

    /// Drains every presence under the heartbeat budget.
    pub fn heartbeat(&self) {
        let report = self.scene.drain_all(self.config.heartbeat_budget);
        trace!(
            "💓 Heartbeat drained {} entries in {} batches ({} failed)",
            report.drained,
            report.batches,
            report.failed_batches
        );
    }

    fn on_ready(&self, signal: ReadySignal) {
        match self.scene.drain(signal.presence, signal.budget) {
            Ok(report) => trace!(
                "Ready signal drained {} entries for presence {}",
                report.drained,
                signal.presence
            ),
            Err(err) => debug!("Ignoring ready signal: {}", err),
        }
    }
}

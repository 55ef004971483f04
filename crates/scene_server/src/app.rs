//! Main application logic and lifecycle management.
//!
//! [`Application`] turns a loaded configuration into a running scene: the
//! interest engine, the default feature modules over an in-process
//! transport, the drain scheduler, a statistics monitor and, when enabled,
//! the synthetic load driver. [`RunningApplication::shutdown`] takes them
//! down again in phases so nothing pending is lost.

use crate::cli::CliArgs;
use crate::config::AppConfig;
use crate::error::ServerError;
use crate::logging::display_banner;
use crate::signals::{setup_signal_handlers, setup_signal_handlers_silent};
use crate::simulation::{Simulation, SimulationReport};
use interest_engine::{create_scene, DrainBudget, DrainScheduler, EngineStats, Scene, SchedulerHandle, ShutdownState};
use scene_modules::{install_default_modules, ChannelTransport, SceneModules};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const STATS_INTERVAL: Duration = Duration::from_secs(60);
const SCHEDULER_STOP_TIMEOUT: Duration = Duration::from_secs(5);
const SIMULATION_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// A configured scene, ready to start.
pub struct Application {
    config: AppConfig,
    scene: Arc<Scene>,
    transport: Arc<ChannelTransport>,
    modules: SceneModules,
}

impl Application {
    /// Loads the configuration (creating a default file if missing),
    /// applies CLI overrides, validates, and builds the scene with every
    /// default module installed.
    pub async fn new(args: CliArgs) -> Result<Self, ServerError> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;
        config.apply_cli_overrides(&args);

        config
            .validate()
            .map_err(|e| ServerError::Config(format!("Configuration validation failed: {e}")))?;
        info!("✅ Configuration loaded and validated successfully");

        display_banner();
        Ok(Self::from_config(config))
    }

    /// Builds the scene from an already validated configuration.
    pub fn from_config(config: AppConfig) -> Self {
        let scene = create_scene(&config.server.scene_name, config.engine.clone());
        let transport = Arc::new(ChannelTransport::new());
        let modules = install_default_modules(&scene, transport.clone());

        info!(
            "🌐 Scene '{}' ready with {} event types",
            scene.name(),
            scene.registry().len()
        );

        Self {
            config,
            scene,
            transport,
            modules,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn scene(&self) -> &Arc<Scene> {
        &self.scene
    }

    pub fn transport(&self) -> &Arc<ChannelTransport> {
        &self.transport
    }

    pub fn modules(&self) -> &SceneModules {
        &self.modules
    }

    /// Runs until a termination signal, then shuts down gracefully. A second
    /// signal during shutdown exits immediately.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting scene server");
        self.log_configuration_summary();

        let running = self.start()?;

        info!("✅ Scene '{}' is now running!", running.scene.name());
        info!("🔍 Health monitoring active - stats every {:?}", STATS_INTERVAL);
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        let signal_shutdown_state = setup_signal_handlers().await?;

        tokio::spawn(async move {
            if let Err(e) = setup_signal_handlers_silent().await {
                error!("Failed to set up merciless shutdown signal handler: {e}");
                return;
            }

            warn!("Shutdown handler received again! I'll make this quick.");
            std::process::exit(1);
        });

        if signal_shutdown_state.is_shutdown_initiated() {
            running.shutdown_state().initiate_shutdown();
        }

        info!("🛑 Shutdown signal received, beginning graceful shutdown...");
        let summary = running.shutdown().await;
        log_final_statistics(&summary.stats, summary.simulation.as_ref());

        info!("✅ Scene server shutdown complete");
        Ok(())
    }

    /// Spawns the scheduler, the monitor and (if configured) the simulation.
    pub fn start(self) -> Result<RunningApplication, ServerError> {
        let shutdown_state = ShutdownState::new();

        let (scheduler, scheduler_handle) = DrainScheduler::new(self.scene.clone(), self.config.scheduler.clone());
        let scheduler_task = scheduler.spawn(shutdown_state.clone());

        let monitor_task = spawn_monitor(self.scene.clone(), self.transport.clone());

        let simulation_task = if self.config.simulation.is_enabled() {
            let mut simulation = Simulation::new(
                self.scene.clone(),
                self.modules.clone(),
                self.transport.clone(),
                scheduler_handle.clone(),
                self.config.server.region.clone(),
                self.config.simulation.clone(),
                self.config.server.max_presences,
            );
            if let Err(e) = simulation.populate() {
                shutdown_state.initiate_shutdown();
                monitor_task.abort();
                return Err(e);
            }
            Some(tokio::spawn(simulation.run(shutdown_state.clone())))
        } else {
            None
        };

        Ok(RunningApplication {
            scene: self.scene,
            shutdown_state,
            scheduler_handle,
            scheduler_task,
            monitor_task,
            simulation_task,
        })
    }

    fn log_configuration_summary(&self) {
        let server = &self.config.server;
        info!("📋 Configuration Summary:");
        info!("  🌐 Scene: {}", server.scene_name);
        info!(
            "  🌍 Region: {:.0}x{:.0}x{:.0} units",
            server.region.max_x - server.region.min_x,
            server.region.max_y - server.region.min_y,
            server.region.max_z - server.region.min_z
        );
        info!("  👥 Max presences: {}", server.max_presences);
        info!(
            "  💓 Heartbeat: every {}ms, budget {:?}",
            self.config.scheduler.heartbeat_interval_ms, self.config.scheduler.heartbeat_budget
        );
        info!("  🧭 Unknown event types: {:?}", self.config.engine.unknown_type_policy);
        if self.config.simulation.is_enabled() {
            info!(
                "  🤖 Simulation: {} presences, {} objects, tick {}ms",
                self.config.simulation.synthetic_presences,
                self.config.simulation.synthetic_objects,
                self.config.simulation.tick_interval_ms
            );
        }
    }
}

/// Background tasks of a started [`Application`].
pub struct RunningApplication {
    scene: Arc<Scene>,
    shutdown_state: ShutdownState,
    scheduler_handle: SchedulerHandle,
    scheduler_task: JoinHandle<()>,
    monitor_task: JoinHandle<()>,
    simulation_task: Option<JoinHandle<Simulation>>,
}

/// What [`RunningApplication::shutdown`] observed.
#[derive(Debug, Clone)]
pub struct ShutdownSummary {
    pub stats: EngineStats,
    /// Entries flushed by the final drain after the scheduler stopped
    pub final_drained: usize,
    pub simulation: Option<SimulationReport>,
}

impl RunningApplication {
    pub fn scene(&self) -> &Arc<Scene> {
        &self.scene
    }

    pub fn shutdown_state(&self) -> &ShutdownState {
        &self.shutdown_state
    }

    /// Readiness sink for transports.
    pub fn scheduler_handle(&self) -> &SchedulerHandle {
        &self.scheduler_handle
    }

    /// Stops every task and flushes what is still pending. Initiates
    /// shutdown first if nobody has yet.
    pub async fn shutdown(self) -> ShutdownSummary {
        if !self.shutdown_state.is_shutdown_initiated() {
            self.shutdown_state.initiate_shutdown();
        }

        // Phase 1: producers stop
        info!("📡 Phase 1: Stopping monitor and synthetic load...");
        self.monitor_task.abort();
        let simulation = match self.simulation_task {
            Some(task) => match tokio::time::timeout(SIMULATION_STOP_TIMEOUT, task).await {
                Ok(Ok(simulation)) => Some(simulation),
                Ok(Err(e)) => {
                    error!("❌ Simulation task failed: {}", e);
                    None
                }
                Err(_) => {
                    warn!("⏰ Simulation did not stop within {:?}", SIMULATION_STOP_TIMEOUT);
                    None
                }
            },
            None => None,
        };

        // Phase 2: the scheduler finishes its current drain
        info!("⏳ Phase 2: Waiting for the drain scheduler to stop...");
        match tokio::time::timeout(SCHEDULER_STOP_TIMEOUT, self.scheduler_task).await {
            Ok(Ok(())) => info!("✅ Drain scheduler stopped"),
            Ok(Err(e)) => error!("❌ Drain scheduler task failed: {}", e),
            Err(_) => warn!("⏰ Drain scheduler did not stop within {:?}, flushing anyway", SCHEDULER_STOP_TIMEOUT),
        }

        // Phase 3: flush everything still pending
        info!("🧹 Phase 3: Final drain of all presences...");
        let flushed = self.scene.drain_all(DrainBudget::Unlimited);
        info!(
            "✅ Final drain delivered {} entries in {} batches ({} failed)",
            flushed.drained, flushed.batches, flushed.failed_batches
        );
        self.shutdown_state.complete_shutdown();

        // Phase 4: presences leave, connections close
        info!("🔌 Phase 4: Disconnecting presences...");
        let simulation = match simulation {
            Some(simulation) => Some(simulation.teardown().await),
            None => None,
        };

        ShutdownSummary {
            stats: self.scene.stats(),
            final_drained: flushed.drained,
            simulation,
        }
    }
}

fn spawn_monitor(scene: Arc<Scene>, transport: Arc<ChannelTransport>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATS_INTERVAL);
        // The first tick completes immediately
        interval.tick().await;
        let mut last = scene.stats();

        loop {
            interval.tick().await;

            let stats = scene.stats();
            let published = stats.events_published - last.events_published;
            let drained = stats.entries_drained - last.entries_drained;
            let failures = stats.send_failures - last.send_failures;

            info!(
                "📊 Scene '{}' health - {} presences | {} connections | {} published | {} drained | {} coalesced | {} suppressed this period",
                scene.name(),
                stats.presences,
                transport.connection_count(),
                published,
                drained,
                stats.entries_coalesced - last.entries_coalesced,
                stats.entries_suppressed - last.entries_suppressed
            );

            if failures > 0 {
                warn!("⚠️ {} send failures this period", failures);
            }
            if stats.unregistered_drops > last.unregistered_drops {
                warn!(
                    "⚠️ {} events dropped for unregistered types this period",
                    stats.unregistered_drops - last.unregistered_drops
                );
            }
            if published > 100_000 {
                info!("🔥 High activity detected - {} events published this period", published);
            }

            last = stats;
        }
    })
}

fn log_final_statistics(stats: &EngineStats, simulation: Option<&SimulationReport>) {
    info!("📊 Final Statistics:");
    info!("  - Events published: {}", stats.events_published);
    info!(
        "  - Entries queued/coalesced/suppressed: {}/{}/{}",
        stats.entries_queued, stats.entries_coalesced, stats.entries_suppressed
    );
    info!("  - Entries drained: {} over {} drains", stats.entries_drained, stats.drains);
    info!("  - Sends: {} ({} failed)", stats.sends, stats.send_failures);
    info!(
        "  - Presences joined/left: {}/{}",
        stats.presences_joined, stats.presences_left
    );
    if let Some(report) = simulation {
        info!(
            "  - Simulation: {} ticks, {} messages received by {} presences",
            report.ticks, report.messages_received, report.presences
        );
    }
}

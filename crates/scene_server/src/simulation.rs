//! Synthetic load driver.
//!
//! Populates the scene with walking presences and drifting objects and keeps
//! every feature module busy: walkers circle their home spot, type and chat,
//! swap instant messages, nudge terrain; objects drift and preload sounds.
//! Each walker has an in-process connection whose reader counts deliveries
//! and, after each burst, tells the scheduler the connection has room again,
//! the same way a socket writer would.
//!
//! Layout and motion are deterministic functions of the walker index and the
//! tick number, so two runs with the same settings produce the same traffic.

use crate::config::{RegionSettings, SimulationSettings};
use crate::error::ServerError;
use futures::future::join_all;
use interest_engine::{DrainBudget, EngineError, PresenceId, Scene, SchedulerHandle, ShutdownState, Vec3};
use scene_modules::ambient::SoundPreload;
use scene_modules::appearance::Appearance;
use scene_modules::objects::{SceneObject, UpdateFlags};
use scene_modules::terrain::{TerrainPatch, PATCH_SAMPLES, PATCH_SIZE};
use scene_modules::{ChannelTransport, OutboundMessage, SceneModules};
use serde::Serialize;
use std::f64::consts::TAU;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Budget a reader asks for after emptying its inbox.
pub const READY_BUDGET: DrainBudget = DrainBudget::Bytes(16 * 1024);

const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653;
const WALK_HEIGHT: f64 = 25.0;
const DRIFT_HEIGHT: f64 = 22.0;
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Joins `presence` at `position` and opens its connection, unless the
/// scene already holds `max_presences`.
///
/// The connection is opened before the join so the lifecycle hooks' join
/// snapshot has somewhere to go. Concurrent admissions may race past the
/// first capacity check; the count is checked again after the join and an
/// admission that overfilled the scene is rolled back.
pub fn admit(
    scene: &Scene,
    transport: &ChannelTransport,
    max_presences: usize,
    presence: PresenceId,
    position: Vec3,
) -> Result<mpsc::UnboundedReceiver<OutboundMessage>, ServerError> {
    if scene.presence_count() >= max_presences {
        return Err(ServerError::SceneFull {
            presence,
            max: max_presences,
        });
    }

    let inbox = transport.connect(presence);
    if let Err(err) = scene.join(presence, position) {
        transport.disconnect(presence);
        return Err(err.into());
    }

    if scene.presence_count() > max_presences {
        if let Err(err) = scene.leave(presence) {
            warn!("⚠️ Could not roll back admission of presence {}: {}", presence, err);
        }
        transport.disconnect(presence);
        return Err(ServerError::SceneFull {
            presence,
            max: max_presences,
        });
    }
    Ok(inbox)
}

/// Totals reported when the driver is torn down.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SimulationReport {
    pub presences: usize,
    pub objects: usize,
    pub ticks: u64,
    pub messages_received: u64,
}

struct Walker {
    id: PresenceId,
    name: String,
    home: Vec3,
    radius: f64,
    phase: f64,
}

struct Drifter {
    object: SceneObject,
    home: Vec3,
    radius: f64,
    phase: f64,
}

/// Point `index` of `count` on a sunflower spiral filling `fraction` of the
/// region around its centre.
fn spiral_point(region: &RegionSettings, index: usize, count: usize, fraction: f64, height: f64) -> Vec3 {
    let center = region.center();
    let max_radius = fraction * region.width().min(region.depth()) / 2.0;
    let radius = max_radius * ((index as f64 + 0.5) / count.max(1) as f64).sqrt();
    let angle = index as f64 * GOLDEN_ANGLE;
    region.clamp(Vec3::new(
        center.x + radius * angle.cos(),
        center.y + radius * angle.sin(),
        region.min_z + height,
    ))
}

fn orbit(home: Vec3, radius: f64, phase: f64, angular_step: f64, tick: u64) -> Vec3 {
    let angle = phase + angular_step * tick as f64;
    Vec3::new(home.x + radius * angle.cos(), home.y + radius * angle.sin(), home.z)
}

pub struct Simulation {
    scene: Arc<Scene>,
    modules: SceneModules,
    transport: Arc<ChannelTransport>,
    scheduler: SchedulerHandle,
    region: RegionSettings,
    settings: SimulationSettings,
    max_presences: usize,
    walkers: Vec<Walker>,
    drifters: Vec<Drifter>,
    readers: Vec<JoinHandle<u64>>,
    ticks: u64,
}

impl Simulation {
    pub fn new(
        scene: Arc<Scene>,
        modules: SceneModules,
        transport: Arc<ChannelTransport>,
        scheduler: SchedulerHandle,
        region: RegionSettings,
        settings: SimulationSettings,
        max_presences: usize,
    ) -> Self {
        Self {
            scene,
            modules,
            transport,
            scheduler,
            region,
            settings,
            max_presences,
            walkers: Vec::new(),
            drifters: Vec::new(),
            readers: Vec::new(),
            ticks: 0,
        }
    }

    pub fn walker_count(&self) -> usize {
        self.walkers.len()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Places the drifting objects, then admits the walkers, so every
    /// walker's join snapshot already contains the objects.
    pub fn populate(&mut self) -> Result<(), ServerError> {
        let object_count = self.settings.synthetic_objects;
        for index in 0..object_count {
            let home = spiral_point(&self.region, index, object_count, 0.8, DRIFT_HEIGHT);
            let object = SceneObject {
                id: Uuid::new_v4(),
                local_id: 1000 + index as u32,
                name: format!("Drifter {index}"),
                position: home,
                scale: Vec3::new(0.5, 0.5, 0.5),
            };
            self.modules.objects.upsert_object(&self.scene, object.clone(), UpdateFlags::FULL)?;
            self.drifters.push(Drifter {
                object,
                home,
                radius: 2.0,
                phase: index as f64,
            });
        }

        let walker_count = self.settings.synthetic_presences;
        for index in 0..walker_count {
            let walker = Walker {
                id: PresenceId::new(),
                name: format!("Walker {index}"),
                home: spiral_point(&self.region, index, walker_count, 0.6, WALK_HEIGHT),
                radius: 4.0 + (index % 5) as f64 * 2.0,
                phase: index as f64 * TAU / walker_count as f64,
            };
            let inbox = admit(
                &self.scene,
                &self.transport,
                self.max_presences,
                walker.id,
                walker.home,
            )?;
            self.readers
                .push(tokio::spawn(read_inbox(walker.id, inbox, self.scheduler.clone())));

            let appearance = Appearance {
                serial: 1,
                visual_params: vec![(index % 256) as u8; 32],
                texture_ids: vec![Uuid::new_v4()],
            };
            self.modules
                .appearance
                .set_appearance(&self.scene, walker.id, appearance)?;
            self.walkers.push(walker);
        }

        info!(
            "🤖 Simulation populated scene '{}' with {} walkers and {} objects",
            self.scene.name(),
            self.walkers.len(),
            self.drifters.len()
        );
        Ok(())
    }

    /// Advances every walker and object by one tick and fires the periodic
    /// chat, terrain, sound and instant-message traffic.
    pub fn tick(&mut self, tick: u64) -> Result<(), ServerError> {
        let scene = self.scene.as_ref();

        for walker in &self.walkers {
            scene.update_presence_position(walker.id, self.walker_position(walker, tick))?;
        }

        for drifter in &mut self.drifters {
            drifter.object.position =
                self.region
                    .clamp(orbit(drifter.home, drifter.radius, drifter.phase, 0.1, tick));
            self.modules
                .objects
                .upsert_object(scene, drifter.object.clone(), UpdateFlags::POSITION)?;
        }

        if !self.walkers.is_empty() {
            let speaker = &self.walkers[(tick / 20) as usize % self.walkers.len()];
            let position = self.walker_position(speaker, tick);
            match tick % 20 {
                0 => {
                    self.modules.chat.set_typing(scene, speaker.id, position, true)?;
                }
                5 => {
                    self.modules.chat.set_typing(scene, speaker.id, position, false)?;
                    self.modules
                        .chat
                        .say(scene, speaker.id, &speaker.name, &format!("tick {tick}"), position)?;
                }
                _ => {}
            }

            if tick % 50 == 0 {
                self.edit_terrain_under(speaker, tick)?;
            }

            if tick % 100 == 0 && self.walkers.len() > 1 {
                let recipient = &self.walkers[(tick / 100) as usize % self.walkers.len()];
                if recipient.id != speaker.id {
                    self.modules
                        .chat
                        .instant_message(scene, speaker.id, &speaker.name, recipient.id, "ping")?;
                }
            }
        }

        if tick % 30 == 0 && !self.drifters.is_empty() {
            let drifter = &self.drifters[(tick / 30) as usize % self.drifters.len()];
            let preload = SoundPreload {
                sound_id: Uuid::new_v4(),
                object_id: drifter.object.id,
                owner_id: Uuid::nil(),
            };
            self.modules.ambient.preload(scene, preload, drifter.object.position)?;
        }

        trace!("🤖 Simulation tick {} complete", tick);
        Ok(())
    }

    fn walker_position(&self, walker: &Walker, tick: u64) -> Vec3 {
        self.region.clamp(orbit(walker.home, walker.radius, walker.phase, 0.05, tick))
    }

    fn edit_terrain_under(&self, walker: &Walker, tick: u64) -> Result<(), ServerError> {
        let position = self.walker_position(walker, tick);
        let x = ((position.x - self.region.min_x) / PATCH_SIZE).floor().max(0.0) as u16;
        let y = ((position.y - self.region.min_y) / PATCH_SIZE).floor().max(0.0) as u16;
        let bump = ((tick / 50) % 8) as f32 * 0.25;
        let heights = (0..PATCH_SAMPLES)
            .map(|sample| 20.0 + bump * (sample % 16) as f32 / 16.0)
            .collect();
        self.modules
            .terrain
            .edit_patch(&self.scene, TerrainPatch { x, y, heights })?;
        debug!("⛰️ {} reshaped terrain patch ({}, {})", walker.name, x, y);
        Ok(())
    }

    /// Ticks on `settings.tick_interval_ms` until shutdown is initiated, then
    /// hands the driver back for [`Simulation::teardown`].
    pub async fn run(mut self, shutdown: ShutdownState) -> Self {
        let mut ticker = tokio::time::interval(Duration::from_millis(self.settings.tick_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.wait() => break,

                _ = ticker.tick() => {
                    self.ticks += 1;
                    if let Err(err) = self.tick(self.ticks) {
                        warn!("⚠️ Simulation tick {} failed: {}", self.ticks, err);
                    }
                }
            }
        }

        info!("🤖 Simulation stopped after {} ticks", self.ticks);
        self
    }

    /// Removes every walker, closes the connections and collects the
    /// readers' delivery counts.
    pub async fn teardown(self) -> SimulationReport {
        for walker in &self.walkers {
            match self.scene.leave(walker.id) {
                Ok(()) | Err(EngineError::PresenceNotFound(_)) => {}
                Err(err) => warn!("⚠️ {} did not leave cleanly: {}", walker.name, err),
            }
            self.transport.disconnect(walker.id);
        }

        let messages_received = match tokio::time::timeout(TEARDOWN_TIMEOUT, join_all(self.readers)).await {
            Ok(results) => results.into_iter().filter_map(Result::ok).sum(),
            Err(_) => {
                warn!("⏰ Connection readers did not finish within {:?}", TEARDOWN_TIMEOUT);
                0
            }
        };

        SimulationReport {
            presences: self.walkers.len(),
            objects: self.drifters.len(),
            ticks: self.ticks,
            messages_received,
        }
    }
}

/// Counts deliveries for one presence until its connection closes.
async fn read_inbox(
    presence: PresenceId,
    mut inbox: mpsc::UnboundedReceiver<OutboundMessage>,
    scheduler: SchedulerHandle,
) -> u64 {
    let mut received = 0u64;
    let mut scheduler_open = true;

    while inbox.recv().await.is_some() {
        received += 1;
        while inbox.try_recv().is_ok() {
            received += 1;
        }

        if scheduler_open && scheduler.signal_ready(presence, READY_BUDGET).is_err() {
            debug!("Scheduler closed, reader for {} stops signalling", presence);
            scheduler_open = false;
        }
    }

    trace!("Connection for {} closed after {} messages", presence, received);
    received
}

#[cfg(test)]
mod tests {
    use super::*;
    use interest_engine::{create_scene, DrainScheduler, EngineConfig, SchedulerConfig};
    use scene_modules::install_default_modules;

    fn simulation(presences: usize, objects: usize, max_presences: usize) -> (Simulation, DrainScheduler) {
        let scene = create_scene("sim-test", EngineConfig::default());
        let transport = Arc::new(ChannelTransport::new());
        let modules = install_default_modules(&scene, transport.clone());
        let (scheduler, handle) = DrainScheduler::new(scene.clone(), SchedulerConfig::default());
        let settings = SimulationSettings {
            synthetic_presences: presences,
            synthetic_objects: objects,
            tick_interval_ms: 10,
        };
        let sim = Simulation::new(
            scene,
            modules,
            transport,
            handle,
            RegionSettings::default(),
            settings,
            max_presences,
        );
        (sim, scheduler)
    }

    #[test]
    fn test_spiral_points_stay_in_region() {
        let region = RegionSettings::default();
        for index in 0..64 {
            let point = spiral_point(&region, index, 64, 0.8, WALK_HEIGHT);
            assert!(region.contains(point), "{point:?} escaped the region");
        }
    }

    #[test]
    fn test_orbit_is_periodic() {
        let home = Vec3::new(100.0, 100.0, 25.0);
        let start = orbit(home, 5.0, 0.0, TAU / 40.0, 0);
        let lap = orbit(home, 5.0, 0.0, TAU / 40.0, 40);
        assert!(start.distance(lap) < 1e-9);
        assert!((start.distance(home) - 5.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_admit_enforces_capacity() {
        let scene = create_scene("capacity", EngineConfig::default());
        let transport = ChannelTransport::new();

        let first = PresenceId::new();
        admit(&scene, &transport, 1, first, Vec3::zero()).unwrap();
        assert!(transport.is_connected(first));

        let second = PresenceId::new();
        let result = admit(&scene, &transport, 1, second, Vec3::zero());
        assert!(matches!(result, Err(ServerError::SceneFull { max: 1, .. })));
        assert!(!transport.is_connected(second));
        assert_eq!(scene.presence_count(), 1);
    }

    #[test]
    fn test_concurrent_admissions_never_exceed_capacity() {
        const MAX: usize = 4;
        let scene = create_scene("crowded", EngineConfig::default());
        let transport = Arc::new(ChannelTransport::new());
        let barrier = Arc::new(std::sync::Barrier::new(16));

        let threads: Vec<_> = (0..16)
            .map(|_| {
                let (scene, transport, barrier) = (scene.clone(), transport.clone(), barrier.clone());
                std::thread::spawn(move || {
                    let presence = PresenceId::new();
                    barrier.wait();
                    admit(&scene, &transport, MAX, presence, Vec3::zero())
                        .map(|inbox| (presence, inbox))
                        .ok()
                })
            })
            .collect();
        let admitted: Vec<_> = threads
            .into_iter()
            .filter_map(|thread| thread.join().unwrap())
            .collect();

        assert!(scene.presence_count() <= MAX);
        assert_eq!(scene.presence_count(), admitted.len());
        assert_eq!(transport.connection_count(), admitted.len());
        for (presence, _) in &admitted {
            assert!(transport.is_connected(*presence));
        }
    }

    #[tokio::test]
    async fn test_admit_rejects_duplicate_and_closes_connection() {
        let scene = create_scene("duplicate", EngineConfig::default());
        let transport = ChannelTransport::new();
        let presence = PresenceId::new();

        let _inbox = admit(&scene, &transport, 10, presence, Vec3::zero()).unwrap();
        let result = admit(&scene, &transport, 10, presence, Vec3::zero());
        assert!(matches!(
            result,
            Err(ServerError::Engine(EngineError::PresenceAlreadyJoined(_)))
        ));
        assert!(!transport.is_connected(presence));
    }

    #[tokio::test]
    async fn test_populate_and_tick() {
        let (mut sim, _scheduler) = simulation(4, 6, 10);
        sim.populate().unwrap();

        assert_eq!(sim.walker_count(), 4);
        assert_eq!(sim.scene.presence_count(), 4);
        assert_eq!(sim.modules.objects.object_count(), 6);

        for tick in 1..=100 {
            sim.tick(tick).unwrap();
        }
        let stats = sim.scene.stats();
        assert!(stats.events_published > 0);
        assert!(stats.entries_coalesced > 0, "object drift should coalesce between drains");
        assert!(sim.modules.terrain.edited_patch_count() >= 1);

        let report = sim.teardown().await;
        assert_eq!(report.presences, 4);
        assert_eq!(report.objects, 6);
    }

    #[tokio::test]
    async fn test_populate_stops_at_capacity() {
        let (mut sim, _scheduler) = simulation(3, 0, 2);
        let result = sim.populate();
        assert!(matches!(result, Err(ServerError::SceneFull { max: 2, .. })));
        assert_eq!(sim.scene.presence_count(), 2);
    }

    #[tokio::test]
    async fn test_readers_count_drained_deliveries() {
        let (mut sim, _scheduler) = simulation(2, 3, 10);
        sim.populate().unwrap();

        // Join snapshots: objects and the other walker's appearance
        let drained = sim.scene.drain_all(DrainBudget::Unlimited);
        assert!(drained.drained > 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let report = sim.teardown().await;
        assert!(report.messages_received >= 2, "got {}", report.messages_received);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (mut sim, _scheduler) = simulation(2, 2, 10);
        sim.populate().unwrap();

        let shutdown = ShutdownState::new();
        let task = tokio::spawn(sim.run(shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(60)).await;
        shutdown.initiate_shutdown();

        let sim = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("simulation should stop promptly")
            .unwrap();
        assert!(sim.ticks() > 0);
        sim.teardown().await;
    }
}

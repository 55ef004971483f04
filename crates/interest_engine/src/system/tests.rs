//! Tests for publish, drain and presence lifecycle on a scene

use super::*;
use crate::config::{EngineConfig, UnknownTypePolicy};
use crate::error::{EngineError, SendError};
use crate::events::Event;
use crate::presence::Presence;
use crate::priority::{biased, within_cutoff};
use crate::registry::EventType;
use crate::types::{EventId, PresenceId, Priority, Vec3};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const TYPING: Uuid = Uuid::from_u128(0x7479_7069_6e67_0000_0000_0000_0000_0001);

#[derive(Debug, Clone)]
struct Sent {
    presence: PresenceId,
    type_name: &'static str,
    labels: Vec<&'static str>,
    priorities: Vec<f64>,
}

// Mock send handler recording every batch it is given
#[derive(Debug, Clone, Default)]
struct Recorder {
    sent: Arc<Mutex<Vec<Sent>>>,
}

impl Recorder {
    fn event_type(&self, type_name: &'static str) -> EventType<&'static str> {
        let sent = self.sent.clone();
        EventType::new(type_name, move |batch, presence| {
            sent.lock().unwrap().push(Sent {
                presence: presence.id(),
                type_name,
                labels: batch.iter().map(|d| *d.payload).collect(),
                priorities: batch.iter().map(|d| d.priority.value()).collect(),
            });
            Ok(())
        })
    }

    fn batches_for(&self, presence: PresenceId) -> Vec<Sent> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.presence == presence)
            .cloned()
            .collect()
    }

    fn labels_for(&self, presence: PresenceId) -> Vec<&'static str> {
        self.batches_for(presence)
            .into_iter()
            .flat_map(|s| s.labels)
            .collect()
    }

    fn send_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

fn scene() -> Scene {
    Scene::new(
        "test",
        EngineConfig {
            unknown_type_policy: UnknownTypePolicy::LogAndDrop,
            ..EngineConfig::default()
        },
    )
}

fn at(x: f64) -> Vec3 {
    Vec3::new(x, 0.0, 0.0)
}

fn event(id: EventId, type_name: &str, position: Vec3, label: &'static str) -> Event {
    Event::new(id, type_name, position, label)
}

#[test]
fn same_id_before_drain_leaves_one_entry() {
    let scene = scene();
    let recorder = Recorder::default();
    scene.register_type(recorder.event_type("object.update"));
    let viewer = PresenceId::new();
    scene.join(viewer, Vec3::zero()).unwrap();

    let id = EventId::random();
    let first = scene.publish(event(id, "object.update", at(3.0), "first")).unwrap();
    let second = scene.publish(event(id, "object.update", at(4.0), "second")).unwrap();

    assert_eq!(first.queued, 1);
    assert_eq!(second.coalesced, 1);
    assert_eq!(scene.presence(viewer).unwrap().pending_count(), 1);

    let report = scene.drain(viewer, DrainBudget::Unlimited).unwrap();
    assert_eq!(report.drained, 1);
    assert_eq!(recorder.labels_for(viewer), vec!["second"]);
    assert_eq!(recorder.batches_for(viewer)[0].priorities, vec![16.0]);
}

#[test]
fn suppressed_events_never_reach_that_presence() {
    let scene = scene();
    let recorder = Recorder::default();
    scene.register_type(
        recorder
            .event_type("chat.message")
            .priority(|event, _, presence| within_cutoff(event, presence, 400.0)),
    );

    let near = PresenceId::new();
    let far = PresenceId::new();
    scene.join(near, at(10.0)).unwrap();
    scene.join(far, at(30.0)).unwrap();

    let report = scene
        .publish(event(EventId::random(), "chat.message", Vec3::zero(), "hello"))
        .unwrap();
    assert_eq!(report.queued, 1);
    assert_eq!(report.suppressed, 1);

    scene.drain_all(DrainBudget::Unlimited);
    assert_eq!(recorder.labels_for(near), vec!["hello"]);
    assert!(recorder.labels_for(far).is_empty());
}

#[test]
fn batches_are_in_non_decreasing_priority_order() {
    let scene = scene();
    let recorder = Recorder::default();
    scene.register_type(recorder.event_type("object.update"));
    let viewer = PresenceId::new();
    scene.join(viewer, Vec3::zero()).unwrap();

    for (x, label) in [(9.0, "c"), (1.0, "a"), (40.0, "e"), (3.0, "b"), (12.0, "d")] {
        scene
            .publish(event(EventId::random(), "object.update", at(x), label))
            .unwrap();
    }

    scene.drain(viewer, DrainBudget::Unlimited).unwrap();
    let batches = recorder.batches_for(viewer);
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].labels, vec!["a", "b", "c", "d", "e"]);
    assert!(batches[0].priorities.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn groups_are_sent_most_urgent_type_first() {
    let scene = scene();
    let recorder = Recorder::default();
    scene.register_type(recorder.event_type("object.update"));
    scene.register_type(
        recorder
            .event_type("object.kill")
            .priority(|event, _, presence| biased(event, presence, -1.0)),
    );
    let viewer = PresenceId::new();
    scene.join(viewer, Vec3::zero()).unwrap();

    scene.publish(event(EventId::random(), "object.update", at(2.0), "far update")).unwrap();
    scene.publish(event(EventId::random(), "object.kill", at(1.0), "kill")).unwrap();
    scene.publish(event(EventId::random(), "object.update", at(5.0), "farther update")).unwrap();

    let report = scene.drain(viewer, DrainBudget::Unlimited).unwrap();
    assert_eq!(report.batches, 2);
    let types: Vec<&str> = recorder.batches_for(viewer).iter().map(|s| s.type_name).collect();
    assert_eq!(types, vec!["object.kill", "object.update"]);
}

#[test]
fn publish_to_only_reaches_its_target() {
    let scene = scene();
    let recorder = Recorder::default();
    scene.register_type(recorder.event_type("chat.im"));
    let ids: Vec<PresenceId> = (0..3).map(|_| PresenceId::new()).collect();
    for (n, id) in ids.iter().enumerate() {
        scene.join(*id, at(n as f64)).unwrap();
    }

    scene
        .publish_to(ids[1], event(EventId::random(), "chat.im", Vec3::zero(), "psst"))
        .unwrap();
    scene
        .publish(event(EventId::random(), "chat.im", Vec3::zero(), "everyone"))
        .unwrap();
    scene.drain_all(DrainBudget::Unlimited);

    assert_eq!(recorder.labels_for(ids[0]), vec!["everyone"]);
    assert_eq!(recorder.labels_for(ids[1]).len(), 2);
    assert!(recorder.labels_for(ids[1]).contains(&"psst"));
    assert_eq!(recorder.labels_for(ids[2]), vec!["everyone"]);
}

#[test]
fn typing_start_then_stop_delivers_only_stop() {
    let scene = scene();
    let recorder = Recorder::default();
    scene.register_type(
        recorder
            .event_type("chat.typing")
            .priority(|event, _, presence| within_cutoff(event, presence, 400.0)),
    );

    let a = PresenceId::new();
    let b = PresenceId::new();
    scene.join(a, Vec3::zero()).unwrap();
    scene.join(b, at(5.0)).unwrap();

    let typing = EventId::combine(a.0, TYPING);
    scene.publish(event(typing, "chat.typing", Vec3::zero(), "start")).unwrap();
    scene.publish(event(typing, "chat.typing", Vec3::zero(), "stop")).unwrap();

    scene.drain(b, DrainBudget::Unlimited).unwrap();
    assert_eq!(recorder.labels_for(b), vec!["stop"]);
}

#[test]
fn ambient_preload_respects_range_cutoff() {
    let scene = scene();
    let recorder = Recorder::default();
    scene.register_type(
        recorder
            .event_type("ambient.sound_preload")
            .priority(|event, _, presence| within_cutoff(event, presence, 4096.0)),
    );

    let c = PresenceId::new();
    let d = PresenceId::new();
    scene.join(c, at(150.0)).unwrap();
    scene.join(d, at(30.0)).unwrap();

    scene
        .publish(event(EventId::random(), "ambient.sound_preload", Vec3::zero(), "wind"))
        .unwrap();
    scene.drain_all(DrainBudget::Unlimited);

    assert!(recorder.labels_for(c).is_empty());
    assert_eq!(recorder.labels_for(d), vec!["wind"]);
    assert_eq!(recorder.batches_for(d)[0].priorities, vec![900.0]);
}

// Seeds joiners with every known entity, like an object module would
struct EntitySeeder {
    entities: Vec<(EventId, Vec3)>,
}

impl PresenceLifecycle for EntitySeeder {
    fn name(&self) -> &str {
        "entity_seeder"
    }

    fn on_join(&self, scene: &Scene, presence: &Arc<Presence>) {
        for (id, position) in &self.entities {
            scene
                .publish_to(presence.id(), event(*id, "object.update", *position, "snapshot"))
                .unwrap();
        }
    }
}

#[test]
fn joiner_gets_one_entry_per_visible_entity_regardless_of_join_order() {
    let entities = vec![
        (EventId::random(), at(5.0)),
        (EventId::random(), at(10.0)),
        (EventId::random(), at(15.0)),
        (EventId::random(), at(500.0)),
    ];

    let pending_for_joiner = |others_first: bool| {
        let scene = scene();
        let recorder = Recorder::default();
        scene.register_type(
            recorder
                .event_type("object.update")
                .priority(|event, _, presence| within_cutoff(event, presence, 4096.0)),
        );
        scene.add_lifecycle_hook(Arc::new(EntitySeeder {
            entities: entities.clone(),
        }));

        let joiner = PresenceId::new();
        let others = [PresenceId::new(), PresenceId::new()];
        if others_first {
            for other in others {
                scene.join(other, at(20.0)).unwrap();
            }
            scene.join(joiner, Vec3::zero()).unwrap();
        } else {
            scene.join(joiner, Vec3::zero()).unwrap();
            for other in others {
                scene.join(other, at(20.0)).unwrap();
            }
        }
        let presence = scene.presence(joiner).unwrap();
        let mut ids: Vec<EventId> = presence.pending().into_iter().map(|(id, _, _)| id).collect();
        ids.sort();
        ids
    };

    let first = pending_for_joiner(true);
    let second = pending_for_joiner(false);
    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
    assert!(!first.contains(&entities[3].0));
}

#[test]
fn draining_an_empty_list_is_a_no_op() {
    let scene = scene();
    let recorder = Recorder::default();
    scene.register_type(recorder.event_type("object.update"));
    let viewer = PresenceId::new();
    scene.join(viewer, Vec3::zero()).unwrap();

    for _ in 0..2 {
        let report = scene.drain(viewer, DrainBudget::Unlimited).unwrap();
        assert_eq!(report, DrainReport::default());
    }
    assert_eq!(recorder.send_count(), 0);
}

#[test]
fn failing_send_does_not_stop_other_groups() {
    let scene = scene();
    let recorder = Recorder::default();
    scene.register_type(EventType::<&'static str>::new("broken", |_, _| {
        Err(SendError::Transport("socket closed".to_string()))
    }).priority(|_, _, _| Some(Priority::URGENT)));
    scene.register_type(recorder.event_type("object.update"));
    let viewer = PresenceId::new();
    scene.join(viewer, Vec3::zero()).unwrap();

    scene.publish(event(EventId::random(), "broken", Vec3::zero(), "x")).unwrap();
    scene.publish(event(EventId::random(), "object.update", at(1.0), "ok")).unwrap();

    let report = scene.drain(viewer, DrainBudget::Unlimited).unwrap();
    assert_eq!(report.batches, 2);
    assert_eq!(report.failed_batches, 1);
    assert_eq!(recorder.labels_for(viewer), vec!["ok"]);
    assert_eq!(scene.stats().send_failures, 1);
}

#[test]
fn panicking_send_is_isolated() {
    let scene = scene();
    let recorder = Recorder::default();
    scene.register_type(
        EventType::<&'static str>::new("explodes", |_, _| panic!("handler bug"))
            .priority(|_, _, _| Some(Priority::URGENT)),
    );
    scene.register_type(recorder.event_type("object.update"));
    let viewer = PresenceId::new();
    scene.join(viewer, Vec3::zero()).unwrap();

    scene.publish(event(EventId::random(), "explodes", Vec3::zero(), "x")).unwrap();
    scene.publish(event(EventId::random(), "object.update", at(1.0), "ok")).unwrap();

    let report = scene.drain(viewer, DrainBudget::Unlimited).unwrap();
    assert_eq!(report.failed_batches, 1);
    assert_eq!(recorder.labels_for(viewer), vec!["ok"]);

    // The drain claim was released despite the panic
    scene.publish(event(EventId::random(), "object.update", at(1.0), "again")).unwrap();
    assert_eq!(scene.drain(viewer, DrainBudget::Unlimited).unwrap().drained, 1);
}

#[test]
fn leaving_mid_drain_drops_remaining_batches() {
    let scene = scene();
    let recorder = Recorder::default();
    scene.register_type(
        EventType::<&'static str>::new("logout", |_, presence| {
            presence.depart();
            Ok(())
        })
        .priority(|_, _, _| Some(Priority::URGENT)),
    );
    scene.register_type(recorder.event_type("object.update"));
    let viewer = PresenceId::new();
    scene.join(viewer, Vec3::zero()).unwrap();

    scene.publish(event(EventId::random(), "logout", Vec3::zero(), "bye")).unwrap();
    scene.publish(event(EventId::random(), "object.update", at(1.0), "late")).unwrap();

    let report = scene.drain(viewer, DrainBudget::Unlimited).unwrap();
    assert!(report.interrupted);
    assert_eq!(report.batches, 1);
    assert_eq!(recorder.send_count(), 0);
}

#[test]
fn leave_discards_pending_entries_and_later_publishes_skip_the_presence() {
    let scene = scene();
    let recorder = Recorder::default();
    scene.register_type(recorder.event_type("object.update"));
    let viewer = PresenceId::new();
    let handle = scene.join(viewer, Vec3::zero()).unwrap();

    scene.publish(event(EventId::random(), "object.update", at(1.0), "a")).unwrap();
    scene.publish(event(EventId::random(), "object.update", at(2.0), "b")).unwrap();
    scene.leave(viewer).unwrap();

    assert!(!handle.is_alive());
    assert_eq!(handle.pending_count(), 0);
    assert_eq!(scene.stats().entries_discarded, 2);

    let report = scene
        .publish(event(EventId::random(), "object.update", at(1.0), "c"))
        .unwrap();
    assert_eq!(report.reached(), 0);
    assert!(matches!(scene.leave(viewer), Err(EngineError::PresenceNotFound(_))));
    assert_eq!(recorder.send_count(), 0);
}

#[test]
#[should_panic(expected = "published without a registration")]
fn unregistered_type_panics_under_panic_policy() {
    let scene = Scene::new(
        "strict",
        EngineConfig {
            unknown_type_policy: UnknownTypePolicy::Panic,
            ..EngineConfig::default()
        },
    );
    let _ = scene.publish(event(EventId::random(), "nobody.home", Vec3::zero(), "x"));
}

#[test]
fn unregistered_type_is_dropped_under_log_policy() {
    let scene = scene();
    let viewer = PresenceId::new();
    scene.join(viewer, Vec3::zero()).unwrap();

    let result = scene.publish(event(EventId::random(), "nobody.home", Vec3::zero(), "x"));
    assert!(matches!(result, Err(EngineError::UnregisteredType(name)) if name == "nobody.home"));
    assert_eq!(scene.presence(viewer).unwrap().pending_count(), 0);
    assert_eq!(scene.stats().unregistered_drops, 1);
}

#[test]
fn addressing_unknown_or_duplicate_presences_fails() {
    let scene = scene();
    let recorder = Recorder::default();
    scene.register_type(recorder.event_type("object.update"));
    let viewer = PresenceId::new();
    scene.join(viewer, Vec3::zero()).unwrap();

    assert!(matches!(
        scene.join(viewer, Vec3::zero()),
        Err(EngineError::PresenceAlreadyJoined(id)) if id == viewer
    ));

    let stranger = PresenceId::new();
    assert!(matches!(
        scene.publish_to(stranger, event(EventId::random(), "object.update", Vec3::zero(), "x")),
        Err(EngineError::PresenceNotFound(id)) if id == stranger
    ));
    assert!(scene.drain(stranger, DrainBudget::Unlimited).is_err());
}

#[test]
fn re_registration_replaces_handlers() {
    let scene = scene();
    let old = Recorder::default();
    let new = Recorder::default();
    scene.register_type(old.event_type("object.update"));
    let viewer = PresenceId::new();
    scene.join(viewer, Vec3::zero()).unwrap();

    scene.publish(event(EventId::random(), "object.update", at(1.0), "x")).unwrap();
    scene.register_type(new.event_type("object.update"));
    scene.drain(viewer, DrainBudget::Unlimited).unwrap();

    assert_eq!(old.send_count(), 0);
    assert_eq!(new.labels_for(viewer), vec!["x"]);
    assert_eq!(scene.registry().len(), 1);
}

#[test]
fn unregistered_names_are_forgotten() {
    let scene = scene();
    let recorder = Recorder::default();
    scene.register_type(recorder.event_type("object.update"));
    scene.register_type(recorder.event_type("chat.message"));
    assert_eq!(scene.registry().type_names(), vec!["chat.message", "object.update"]);

    assert!(scene.registry().unregister("chat.message").is_some());
    assert!(scene.registry().unregister("chat.message").is_none());
    assert!(!scene.is_registered("chat.message"));
    assert!(matches!(
        scene.publish(event(EventId::random(), "chat.message", at(1.0), "late")),
        Err(EngineError::UnregisteredType(_))
    ));
}

// Open policy: an out-of-range update leaves the older in-range state pending.
#[test]
fn suppressed_update_does_not_cancel_pending_entry() {
    let scene = scene();
    let recorder = Recorder::default();
    scene.register_type(
        recorder
            .event_type("object.update")
            .priority(|event, _, presence| within_cutoff(event, presence, 100.0)),
    );
    let viewer = PresenceId::new();
    scene.join(viewer, Vec3::zero()).unwrap();

    let id = EventId::random();
    scene.publish(event(id, "object.update", at(5.0), "near")).unwrap();
    let report = scene.publish(event(id, "object.update", at(50.0), "far")).unwrap();
    assert_eq!(report.suppressed, 1);
    assert_eq!(report.coalesced, 0);

    scene.drain(viewer, DrainBudget::Unlimited).unwrap();
    assert_eq!(recorder.labels_for(viewer), vec!["near"]);
}

#[test]
fn combine_merges_pending_payloads() {
    let scene = scene();
    let merged = Arc::new(Mutex::new(Vec::new()));
    let sink = merged.clone();
    scene.register_type(
        EventType::<u32>::new("object.update", move |batch, _| {
            sink.lock().unwrap().extend(batch.iter().map(|d| *d.payload));
            Ok(())
        })
        .combine(|pending, new| pending | new),
    );
    assert!(scene.registry().get("object.update").unwrap().has_combine());
    let viewer = PresenceId::new();
    scene.join(viewer, Vec3::zero()).unwrap();

    let id = EventId::random();
    for flags in [0b001u32, 0b010, 0b100] {
        scene.publish(Event::new(id, "object.update", at(1.0), flags)).unwrap();
    }
    scene.drain(viewer, DrainBudget::Unlimited).unwrap();

    assert_eq!(*merged.lock().unwrap(), vec![0b111]);
}

#[test]
fn mismatched_payload_in_combine_keeps_pending_entry() {
    let scene = scene();
    scene.register_type(EventType::<u32>::new("object.update", |_, _| Ok(())).combine(|a, b| a | b));
    let viewer = PresenceId::new();
    scene.join(viewer, Vec3::zero()).unwrap();

    let id = EventId::random();
    scene.publish(Event::new(id, "object.update", at(1.0), 1u32)).unwrap();
    let report = scene
        .publish(Event::new(id, "object.update", at(1.0), "not a u32"))
        .unwrap();

    assert_eq!(report.reached(), 0);
    assert_eq!(scene.stats().combine_failures, 1);
    assert_eq!(scene.presence(viewer).unwrap().pending_count(), 1);
}

#[test]
fn entry_budget_takes_most_urgent_first() {
    let scene = scene();
    let recorder = Recorder::default();
    scene.register_type(recorder.event_type("object.update"));
    let viewer = PresenceId::new();
    scene.join(viewer, Vec3::zero()).unwrap();

    for (x, label) in [(5.0, "e"), (1.0, "a"), (4.0, "d"), (2.0, "b"), (3.0, "c")] {
        scene.publish(event(EventId::random(), "object.update", at(x), label)).unwrap();
    }

    let report = scene.drain(viewer, DrainBudget::Entries(2)).unwrap();
    assert_eq!(report.drained, 2);
    assert_eq!(recorder.labels_for(viewer), vec!["a", "b"]);
    assert_eq!(scene.presence(viewer).unwrap().pending_count(), 3);

    assert_eq!(scene.drain(viewer, DrainBudget::Entries(0)).unwrap().drained, 0);
}

#[test]
fn byte_budget_uses_size_hints_and_always_makes_progress() {
    let scene = scene();
    let recorder = Recorder::default();
    scene.register_type(recorder.event_type("terrain.patch").size_hint(|_| 100));
    let viewer = PresenceId::new();
    scene.join(viewer, Vec3::zero()).unwrap();

    for x in 1..=4 {
        scene
            .publish(event(EventId::random(), "terrain.patch", at(x as f64), "patch"))
            .unwrap();
    }

    let report = scene.drain(viewer, DrainBudget::Bytes(250)).unwrap();
    assert_eq!(report.drained, 2);
    assert_eq!(report.bytes, 200);

    let report = scene.drain(viewer, DrainBudget::Bytes(10)).unwrap();
    assert_eq!(report.drained, 1);
    assert_eq!(report.bytes, 100);
    assert_eq!(scene.presence(viewer).unwrap().pending_count(), 1);
}

#[test]
fn concurrent_drain_trigger_is_reported_busy() {
    let scene = scene();
    let recorder = Recorder::default();
    scene.register_type(recorder.event_type("object.update"));
    let viewer = PresenceId::new();
    let presence = scene.join(viewer, Vec3::zero()).unwrap();
    scene.publish(event(EventId::random(), "object.update", at(1.0), "x")).unwrap();

    let guard = presence.begin_drain().unwrap();
    let report = scene.drain(viewer, DrainBudget::Unlimited).unwrap();
    assert!(report.busy);
    assert_eq!(presence.pending_count(), 1);
    drop(guard);

    assert_eq!(scene.drain(viewer, DrainBudget::Unlimited).unwrap().drained, 1);
}

#[test]
fn concurrent_publishers_converge_to_one_entry_per_id() {
    let scene = scene();
    let recorder = Recorder::default();
    scene.register_type(recorder.event_type("object.update"));
    let viewers: Vec<PresenceId> = (0..4).map(|_| PresenceId::new()).collect();
    for viewer in &viewers {
        scene.join(*viewer, Vec3::zero()).unwrap();
    }
    let ids: Vec<EventId> = (0..50).map(|_| EventId::random()).collect();

    std::thread::scope(|threads| {
        for _ in 0..8 {
            threads.spawn(|| {
                for (n, id) in ids.iter().enumerate() {
                    scene
                        .publish(event(*id, "object.update", at(n as f64), "update"))
                        .unwrap();
                }
            });
        }
    });

    for viewer in &viewers {
        assert_eq!(scene.presence(*viewer).unwrap().pending_count(), 50);
    }
    let stats = scene.stats();
    assert_eq!(stats.entries_queued, 200);
    assert_eq!(stats.entries_coalesced, 8 * 50 * 4 - 200);
}

#[test]
fn moving_far_enough_rescores_pending_entries() {
    let scene = scene();
    let recorder = Recorder::default();
    scene.register_type(recorder.event_type("object.update"));
    let viewer = PresenceId::new();
    scene.join(viewer, Vec3::zero()).unwrap();

    scene.publish(event(EventId::random(), "object.update", at(0.0), "here")).unwrap();
    scene.publish(event(EventId::random(), "object.update", at(100.0), "there")).unwrap();

    // Below the re-scoring threshold nothing changes
    scene.update_presence_position(viewer, at(10.0)).unwrap();
    let before: Vec<String> = scene
        .presence(viewer)
        .unwrap()
        .pending()
        .into_iter()
        .map(|(_, _, p)| p.to_string())
        .collect();
    assert_eq!(before, vec!["0.000", "10000.000"]);

    scene.update_presence_position(viewer, at(100.0)).unwrap();
    scene.drain(viewer, DrainBudget::Unlimited).unwrap();
    assert_eq!(recorder.labels_for(viewer), vec!["there", "here"]);
}

#[test]
fn priority_fn_may_read_its_presence_during_rescore() {
    let scene = Arc::new(scene());
    let recorder = Recorder::default();
    scene.register_type(
        recorder
            .event_type("object.update")
            .priority(|event, _, presence| biased(event, presence, presence.pending_count() as f64)),
    );
    let viewer = PresenceId::new();
    scene.join(viewer, Vec3::zero()).unwrap();

    scene.publish(event(EventId::random(), "object.update", at(0.0), "here")).unwrap();
    scene.publish(event(EventId::random(), "object.update", at(100.0), "there")).unwrap();

    let (done_tx, done_rx) = std::sync::mpsc::channel();
    let mover = scene.clone();
    std::thread::spawn(move || {
        let result = mover.update_presence_position(viewer, at(100.0));
        let _ = done_tx.send(result);
    });
    done_rx
        .recv_timeout(std::time::Duration::from_secs(5))
        .expect("re-scoring must not hold the list lock while calling priority functions")
        .unwrap();

    // The list lock is free again for producers
    scene.publish(event(EventId::random(), "object.update", at(100.0), "later")).unwrap();
    assert_eq!(scene.presence(viewer).unwrap().pending_count(), 3);

    scene.drain(viewer, DrainBudget::Unlimited).unwrap();
    assert_eq!(recorder.labels_for(viewer), vec!["there", "later", "here"]);
}

#[test]
fn stats_track_publish_and_drain_activity() {
    let scene = scene();
    let recorder = Recorder::default();
    scene.register_type(recorder.event_type("object.update"));
    let viewer = PresenceId::new();
    scene.join(viewer, Vec3::zero()).unwrap();

    let id = EventId::random();
    scene.publish(event(id, "object.update", at(1.0), "a")).unwrap();
    scene.publish(event(id, "object.update", at(1.0), "b")).unwrap();
    scene.drain(viewer, DrainBudget::Unlimited).unwrap();

    let stats = scene.stats();
    assert_eq!(stats.presences, 1);
    assert_eq!(stats.registered_types, 1);
    assert_eq!(stats.events_published, 2);
    assert_eq!(stats.entries_queued, 1);
    assert_eq!(stats.entries_coalesced, 1);
    assert_eq!(stats.drains, 1);
    assert_eq!(stats.entries_drained, 1);
    assert_eq!(stats.sends, 1);
    assert_eq!(stats.presences_joined, 1);

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["entries_coalesced"], 1);
}

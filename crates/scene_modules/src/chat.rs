//! # Chat and Typing
//!
//! Local chat is spatial: a line reaches every presence within the range of
//! its [`ChatKind`] (whisper 10 m, normal 20 m, shout 100 m), suppressed for
//! everyone else. Every line gets a fresh event ID so consecutive lines are
//! never merged.
//!
//! Typing indicators are the opposite: one key per speaking avatar and no
//! combine function, so "start typing" followed by "stop typing" before a
//! drain leaves only "stop" pending and the listener never sees the
//! animation flicker.
//!
//! Instant messages bypass space entirely and go to one presence through
//! [`Scene::publish_to`].

use crate::messages::{ChatKind, OutboundMessage};
use crate::transport::ClientTransport;
use crate::SceneModule;
use chrono::{DateTime, Utc};
use interest_engine::{
    within_cutoff, Delivery, EngineError, Event, EventId, EventType, Presence, PresenceId, Priority,
    PublishReport, Scene, SendError, Vec3,
};
use std::sync::Arc;
use uuid::Uuid;

pub const CHAT_MESSAGE: &str = "chat.message";
pub const CHAT_TYPING: &str = "chat.typing";
pub const INSTANT_MESSAGE: &str = "chat.im";

const TYPING_KEY: Uuid = Uuid::from_u128(0x7479_7069_6e67_0000_0000_0000_0000_0001);

/// Squared range of normal chat, which typing indicators share.
pub const CHAT_RANGE_SQUARED: f64 = 20.0 * 20.0;

impl ChatKind {
    pub fn range(self) -> f64 {
        match self {
            ChatKind::Whisper => 10.0,
            ChatKind::Normal => 20.0,
            ChatKind::Shout => 100.0,
        }
    }

    pub fn range_squared(self) -> f64 {
        self.range() * self.range()
    }
}

#[derive(Debug, Clone)]
pub struct ChatLine {
    pub speaker: PresenceId,
    pub from_name: String,
    pub kind: ChatKind,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingState {
    pub speaker: PresenceId,
    pub typing: bool,
}

#[derive(Debug, Clone)]
pub struct InstantMessage {
    pub from: PresenceId,
    pub from_name: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

pub fn typing_event_id(speaker: PresenceId) -> EventId {
    EventId::combine(speaker.0, TYPING_KEY)
}

pub struct ChatModule {
    transport: Arc<dyn ClientTransport>,
}

impl ChatModule {
    pub fn new(transport: Arc<dyn ClientTransport>) -> Arc<Self> {
        Arc::new(Self { transport })
    }

    /// Normal-range local chat.
    pub fn say(
        &self,
        scene: &Scene,
        speaker: PresenceId,
        from_name: &str,
        text: &str,
        position: Vec3,
    ) -> Result<PublishReport, EngineError> {
        self.chat(scene, speaker, from_name, ChatKind::Normal, text, position)
    }

    pub fn chat(
        &self,
        scene: &Scene,
        speaker: PresenceId,
        from_name: &str,
        kind: ChatKind,
        text: &str,
        position: Vec3,
    ) -> Result<PublishReport, EngineError> {
        let line = ChatLine {
            speaker,
            from_name: from_name.to_string(),
            kind,
            text: text.to_string(),
            sent_at: Utc::now(),
        };
        scene.publish(Event::new(EventId::random(), CHAT_MESSAGE, position, line))
    }

    /// Starts or stops the speaker's typing animation for listeners in range.
    pub fn set_typing(
        &self,
        scene: &Scene,
        speaker: PresenceId,
        position: Vec3,
        typing: bool,
    ) -> Result<PublishReport, EngineError> {
        let state = TypingState { speaker, typing };
        scene.publish(Event::new(typing_event_id(speaker), CHAT_TYPING, position, state))
    }

    /// Private message to exactly one presence.
    pub fn instant_message(
        &self,
        scene: &Scene,
        from: PresenceId,
        from_name: &str,
        to: PresenceId,
        text: &str,
    ) -> Result<PublishReport, EngineError> {
        let message = InstantMessage {
            from,
            from_name: from_name.to_string(),
            text: text.to_string(),
            sent_at: Utc::now(),
        };
        scene.publish_to(to, Event::new(EventId::random(), INSTANT_MESSAGE, Vec3::zero(), message))
    }

    fn send_lines(&self, batch: &[Delivery<'_, ChatLine>], presence: &Presence) -> Result<(), SendError> {
        for delivery in batch {
            let line = delivery.payload;
            self.transport.deliver(
                presence.id(),
                OutboundMessage::ChatFromSimulator {
                    source_id: line.speaker.0,
                    from_name: line.from_name.clone(),
                    chat: line.kind,
                    message: line.text.clone(),
                    position: delivery.position,
                    sent_at: line.sent_at,
                },
            )?;
        }
        Ok(())
    }

    fn send_typing(&self, batch: &[Delivery<'_, TypingState>], presence: &Presence) -> Result<(), SendError> {
        for delivery in batch {
            self.transport.deliver(
                presence.id(),
                OutboundMessage::TypingIndicator {
                    source_id: delivery.payload.speaker.0,
                    typing: delivery.payload.typing,
                },
            )?;
        }
        Ok(())
    }

    fn send_instant(&self, batch: &[Delivery<'_, InstantMessage>], presence: &Presence) -> Result<(), SendError> {
        for delivery in batch {
            let message = delivery.payload;
            self.transport.deliver(
                presence.id(),
                OutboundMessage::InstantMessage {
                    from_id: message.from.0,
                    from_name: message.from_name.clone(),
                    message: message.text.clone(),
                    sent_at: message.sent_at,
                },
            )?;
        }
        Ok(())
    }
}

impl SceneModule for ChatModule {
    fn name(&self) -> &str {
        "chat"
    }

    fn register(self: Arc<Self>, scene: &Scene) {
        let module = Arc::clone(&self);
        scene.register_type(
            EventType::<ChatLine>::new(CHAT_MESSAGE, move |batch, presence| module.send_lines(batch, presence))
                .priority(|event, line, presence| within_cutoff(event, presence, line.kind.range_squared()))
                .size_hint(|line| 64 + line.from_name.len() + line.text.len()),
        );

        let module = Arc::clone(&self);
        scene.register_type(
            EventType::<TypingState>::new(CHAT_TYPING, move |batch, presence| module.send_typing(batch, presence))
                .priority(|event, _, presence| within_cutoff(event, presence, CHAT_RANGE_SQUARED)),
        );

        let module = self;
        scene.register_type(
            EventType::<InstantMessage>::new(INSTANT_MESSAGE, move |batch, presence| {
                module.send_instant(batch, presence)
            })
            .priority(|_, _, _| Some(Priority::new(0.0)))
            .size_hint(|message| 64 + message.from_name.len() + message.text.len()),
        );
    }
}

//! # Outbound Client Messages
//!
//! What the feature modules' send handlers hand to the transport. Each
//! variant corresponds to one message of the client protocol; the binary
//! layout is the transport's concern; these values carry only the fields
//! the modules decide.
//!
//! Messages serialize to JSON with a `kind` tag, which the channel transport
//! uses for debug logging and tests use to inspect deliveries:
//!
//! ```rust
//! use scene_modules::messages::OutboundMessage;
//!
//! let message = OutboundMessage::KillObjects { local_ids: vec![7, 9] };
//! let json = message.to_json()?;
//! assert!(json.contains("\"kind\":\"kill_objects\""));
//! # Ok::<(), serde_json::Error>(())
//! ```

use chrono::{DateTime, Utc};
use interest_engine::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Full or partial state of one scene object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectUpdateBlock {
    pub object_id: Uuid,
    pub local_id: u32,
    /// Which parts of the object changed, see [`UpdateFlags`](crate::objects::UpdateFlags)
    pub flags: u32,
    pub position: Vec3,
    pub scale: Vec3,
    pub name: String,
}

/// One 16x16 terrain height patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchBlock {
    pub x: u16,
    pub y: u16,
    pub heights: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundPreloadBlock {
    pub sound_id: Uuid,
    pub object_id: Uuid,
    pub owner_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    Whisper,
    Normal,
    Shout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Batched object state, one block per object
    ObjectUpdates { blocks: Vec<ObjectUpdateBlock> },
    /// Objects the client must forget
    KillObjects { local_ids: Vec<u32> },
    AvatarAppearance {
        avatar_id: Uuid,
        serial: u32,
        visual_params: Vec<u8>,
        texture_ids: Vec<Uuid>,
    },
    ChatFromSimulator {
        source_id: Uuid,
        from_name: String,
        chat: ChatKind,
        message: String,
        position: Vec3,
        sent_at: DateTime<Utc>,
    },
    /// Start/stop of another avatar's typing animation
    TypingIndicator { source_id: Uuid, typing: bool },
    InstantMessage {
        from_id: Uuid,
        from_name: String,
        message: String,
        sent_at: DateTime<Utc>,
    },
    /// Terrain height patches, batched
    LayerData { patches: Vec<PatchBlock> },
    PreloadSound { sounds: Vec<SoundPreloadBlock> },
    /// One quarter of the region's parcel ownership grid
    ParcelOverlay { sequence: u8, data: Vec<u8> },
}

impl OutboundMessage {
    /// Protocol message name, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::ObjectUpdates { .. } => "object_updates",
            OutboundMessage::KillObjects { .. } => "kill_objects",
            OutboundMessage::AvatarAppearance { .. } => "avatar_appearance",
            OutboundMessage::ChatFromSimulator { .. } => "chat_from_simulator",
            OutboundMessage::TypingIndicator { .. } => "typing_indicator",
            OutboundMessage::InstantMessage { .. } => "instant_message",
            OutboundMessage::LayerData { .. } => "layer_data",
            OutboundMessage::PreloadSound { .. } => "preload_sound",
            OutboundMessage::ParcelOverlay { .. } => "parcel_overlay",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

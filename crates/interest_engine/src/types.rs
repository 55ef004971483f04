//! # Core Type Definitions
//!
//! Identifiers and spatial primitives shared by every part of the engine.
//!
//! - [`PresenceId`] - Identifies one connected client session in a scene
//! - [`EventId`] - Identifies the logical subject of a pending state change
//! - [`Vec3`] - Double precision scene position or extent
//! - [`Priority`] - Scheduling key where lower values drain first

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Unique identifier for a connected presence (an avatar's client session).
///
/// # Examples
///
/// ```rust
/// use interest_engine::PresenceId;
///
/// let presence = PresenceId::new();
/// let parsed: PresenceId = presence.to_string().parse()?;
/// assert_eq!(presence, parsed);
/// # Ok::<(), uuid::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PresenceId(pub Uuid);

impl PresenceId {
    /// Creates a new random presence ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::str::FromStr for PresenceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for PresenceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PresenceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key under which an event is held in a presence's interest list.
///
/// Producers pick the identity semantics. A random ID makes every occurrence
/// independent (each chat line is delivered on its own), while an ID derived
/// from a subject with [`EventId::combine`] makes repeated updates to that
/// subject collapse into a single pending entry.
///
/// ```rust
/// use interest_engine::EventId;
/// use uuid::Uuid;
///
/// const APPEARANCE: Uuid = Uuid::from_u128(0x5a1e_0000_0000_0000_0000_0000_0000_0001);
///
/// let avatar = Uuid::new_v4();
/// assert_eq!(EventId::combine(avatar, APPEARANCE), EventId::combine(avatar, APPEARANCE));
/// assert_ne!(EventId::random(), EventId::random());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    /// A fresh identifier, unique per occurrence.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Deterministically derives a per-subject identifier by XOR-ing the
    /// subject's UUID with a type-specific constant.
    pub const fn combine(subject: Uuid, type_constant: Uuid) -> Self {
        Self(Uuid::from_u128(subject.as_u128() ^ type_constant.as_u128()))
    }
}

impl From<Uuid> for EventId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 3D vector in scene coordinates.
///
/// Used both for positions and for bounding extents of events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    /// X coordinate (east-west axis)
    pub x: f64,
    /// Y coordinate (north-south axis)
    pub y: f64,
    /// Z coordinate (vertical axis)
    pub z: f64,
}

impl Vec3 {
    /// Creates a new Vec3 with the specified coordinates.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Creates a zero vector (0, 0, 0).
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Squared Euclidean distance to another vector.
    ///
    /// Priority computations work in squared units to avoid the square root.
    pub fn distance_squared(&self, other: Vec3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    /// Euclidean distance to another vector.
    pub fn distance(&self, other: Vec3) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Self::zero()
    }
}

/// Delivery priority of a pending entry. Lower values are more urgent.
///
/// Ordering is total (`f64::total_cmp`), so a NaN produced by a faulty
/// priority function sorts after every finite value instead of corrupting
/// the heap.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Priority(f64);

impl Priority {
    /// The most urgent priority any entry can have.
    pub const URGENT: Priority = Priority(f64::NEG_INFINITY);

    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> f64 {
        self.0
    }

    /// Shifts this priority; a positive bias makes the entry less urgent.
    pub fn biased(self, bias: f64) -> Self {
        Self(self.0 + bias)
    }
}

impl PartialEq for Priority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Priority {}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<f64> for Priority {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

//! # Utility Functions
//!
//! Small helpers shared across the engine:
//!
//! - [`current_timestamp()`] - Consistent timestamp generation
//! - [`create_scene()`] - Scene factory returning a shareable handle
//! - Poison-tolerant lock helpers for the std locks guarding presence state

use crate::config::EngineConfig;
use crate::system::Scene;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Returns the current Unix timestamp in seconds.
///
/// A clock set before the Unix epoch yields 0 rather than panicking.
pub fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

/// Creates a new scene with the given configuration, ready to be shared
/// between producers, the drain scheduler and lifecycle hooks.
pub fn create_scene(name: &str, config: EngineConfig) -> Arc<Scene> {
    Arc::new(Scene::new(name, config))
}

// A panicking handler must not wedge the presence for everyone else, so the
// guarded data is used as-is after a poison.

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

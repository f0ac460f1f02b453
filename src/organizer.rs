//! Boundary to the engine that performs the on-screen transform.
//!
//! The controller never tracks the active flag itself. It asks
//! [`TransformOrganizer::is_active`] before every transition so that a
//! transform which silently failed is not mistaken for an applied one.

use crate::registry::Registry;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

/// Notified whenever the transform finishes entering or leaving.
pub trait TransitionCallback: Send + Sync {
    fn on_start(&self, _offset: i32) {}
    fn on_stop(&self) {}
}

pub trait TransformOrganizer: Send + Sync {
    fn is_active(&self) -> bool;
    fn schedule_transform_in(&self, display_id: i32, offset: i32);
    fn schedule_transform_out(&self, display_id: i32, offset: i32);
    fn register_transition_callback(&self, callback: Arc<dyn TransitionCallback>) -> CallbackId;
    fn unregister_transition_callback(&self, id: CallbackId) -> bool;
    /// Surface drawn behind the shifted content, if one exists.
    fn background_surface(&self) -> Option<SurfaceHandle>;
}

#[derive(Debug, Default, Clone, Copy)]
struct AppliedTransform {
    active: bool,
    display_id: i32,
    offset: i32,
}

/// Organizer that applies the transform synchronously without animating.
pub struct ImmediateOrganizer {
    applied: Mutex<AppliedTransform>,
    callbacks: Mutex<Registry<Arc<dyn TransitionCallback>>>,
    surface: Option<SurfaceHandle>,
}

impl Default for ImmediateOrganizer {
    fn default() -> Self {
        Self::new(Some(SurfaceHandle(1)))
    }
}

impl ImmediateOrganizer {
    pub fn new(surface: Option<SurfaceHandle>) -> Self {
        Self {
            applied: Mutex::new(AppliedTransform::default()),
            callbacks: Mutex::new(Registry::default()),
            surface,
        }
    }

    pub fn current_offset(&self) -> i32 {
        self.applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .offset
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn callbacks(&self) -> Vec<Arc<dyn TransitionCallback>> {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }
}

impl TransformOrganizer for ImmediateOrganizer {
    fn is_active(&self) -> bool {
        self.applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .active
    }

    fn schedule_transform_in(&self, display_id: i32, offset: i32) {
        {
            let mut applied = self.applied.lock().unwrap_or_else(PoisonError::into_inner);
            *applied = AppliedTransform {
                active: true,
                display_id,
                offset,
            };
        }
        tracing::debug!(display_id, offset, "transform applied");
        for callback in self.callbacks() {
            callback.on_start(offset);
        }
    }

    fn schedule_transform_out(&self, display_id: i32, offset: i32) {
        {
            let mut applied = self.applied.lock().unwrap_or_else(PoisonError::into_inner);
            if !applied.active {
                return;
            }
            if applied.display_id != display_id {
                tracing::warn!(
                    expected = applied.display_id,
                    display_id,
                    "transform out requested for another display"
                );
            }
            *applied = AppliedTransform {
                active: false,
                display_id,
                offset,
            };
        }
        tracing::debug!(display_id, "transform reverted");
        for callback in self.callbacks() {
            callback.on_stop();
        }
    }

    fn register_transition_callback(&self, callback: Arc<dyn TransitionCallback>) -> CallbackId {
        let id = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(callback);
        CallbackId(id)
    }

    fn unregister_transition_callback(&self, id: CallbackId) -> bool {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id.0)
            .is_some()
    }

    fn background_surface(&self) -> Option<SurfaceHandle> {
        self.surface
    }
}

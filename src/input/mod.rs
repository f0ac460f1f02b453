//! Input handlers that arm their own detection depending on controller state.

mod gesture;
mod touch;

pub use gesture::{GestureBackend, GestureEvent, GestureHandler, GestureSink, MockGestureBackend};
pub use touch::{TouchEvent, TouchHandler, TouchOutcome, TouchSink};

/// Receives enablement broadcasts from the controller.
///
/// All calls arrive on the controller's executor.
pub trait InputHandler: Send + Sync {
    fn name(&self) -> &str;

    /// The mode preference changed (or was re-broadcast).
    fn on_enabled_changed(&self, enabled: bool);

    /// The swipe-to-exit preference changed.
    fn on_swipe_to_exit_changed(&self, _enabled: bool) {}

    /// The tap-outside-to-exit preference changed.
    fn on_tap_outside_to_exit_changed(&self, _enabled: bool) {}

    /// The transform was just entered (`true`) or left (`false`).
    fn on_active_changed(&self, _active: bool) {}
}

use super::InputHandler;
use crate::organizer::TransitionCallback;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEvent {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchOutcome {
    Ignored,
    /// Touch landed on the shifted content.
    Interaction,
    /// Touch landed in the vacated area above the content.
    ExitRequested,
}

pub type TouchSink = Arc<dyn Fn(TouchOutcome) + Send + Sync>;

#[derive(Debug, Default)]
struct TouchState {
    enabled: bool,
    tap_outside_to_exit: bool,
    /// Top edge of the shifted content while the transform is applied.
    content_top: Option<f32>,
}

/// Classifies touches while the transform is applied.
pub struct TouchHandler {
    sink: TouchSink,
    state: Mutex<TouchState>,
}

impl TouchHandler {
    pub fn new(sink: TouchSink) -> Self {
        Self {
            sink,
            state: Mutex::new(TouchState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TouchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_armed(&self) -> bool {
        let state = self.lock();
        state.enabled && state.content_top.is_some()
    }

    pub fn handle_touch(&self, event: TouchEvent) -> TouchOutcome {
        let outcome = {
            let state = self.lock();
            match (state.enabled, state.content_top) {
                (true, Some(top)) if event.y < top => {
                    if state.tap_outside_to_exit {
                        TouchOutcome::ExitRequested
                    } else {
                        TouchOutcome::Ignored
                    }
                }
                (true, Some(_)) => TouchOutcome::Interaction,
                _ => TouchOutcome::Ignored,
            }
        };
        if outcome != TouchOutcome::Ignored {
            (self.sink)(outcome);
        }
        outcome
    }
}

impl InputHandler for TouchHandler {
    fn name(&self) -> &str {
        "touch"
    }

    fn on_enabled_changed(&self, enabled: bool) {
        let mut state = self.lock();
        state.enabled = enabled;
        if !enabled {
            state.content_top = None;
        }
    }

    fn on_tap_outside_to_exit_changed(&self, enabled: bool) {
        self.lock().tap_outside_to_exit = enabled;
    }

    fn on_active_changed(&self, active: bool) {
        if !active {
            self.lock().content_top = None;
        }
    }
}

impl TransitionCallback for TouchHandler {
    fn on_start(&self, offset: i32) {
        self.lock().content_top = Some(offset as f32);
    }

    fn on_stop(&self) {
        self.lock().content_top = None;
    }
}

//! The reduced-reach mode controller.
//!
//! All methods run on the controller's executor. Anything arriving from
//! other threads (timer expiry, settings changes, task switches, gestures)
//! is posted through the [`ExecutorHandle`] handed to [`ModeController::new`].
//!
//! Whether the transform is applied is never cached here; the organizer is
//! asked every time.

use crate::display::DisplayLayout;
use crate::events::{EventLog, EventRecord, ModeEvent, TransitionReason};
use crate::executor::ExecutorHandle;
use crate::input::{GestureEvent, InputHandler, TouchOutcome};
use crate::organizer::{CallbackId, TransformOrganizer, TransitionCallback};
use crate::settings::TimeoutDuration;
use crate::settings_observer::{SettingKey, SettingsProvider};
use crate::task_stack::{ListenerId, TaskStackListener};
use crate::timeout::TimeoutHandler;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_OFFSET_PERCENTAGE: u8 = 40;

/// Collaborators injected into the controller.
pub struct ControllerDeps {
    pub organizer: Arc<dyn TransformOrganizer>,
    pub settings: Arc<dyn SettingsProvider>,
    pub task_stack: Arc<dyn TaskStackListener>,
    pub input_handlers: Vec<Arc<dyn InputHandler>>,
    /// Registered with the organizer at construction.
    pub transition_callbacks: Vec<Arc<dyn TransitionCallback>>,
    pub display: DisplayLayout,
    pub offset_percentage: u8,
    /// Wall-clock length of one configured timeout second.
    pub timeout_unit: Duration,
}

impl ControllerDeps {
    pub fn new(
        organizer: Arc<dyn TransformOrganizer>,
        settings: Arc<dyn SettingsProvider>,
        task_stack: Arc<dyn TaskStackListener>,
    ) -> Self {
        Self {
            organizer,
            settings,
            task_stack,
            input_handlers: Vec::new(),
            transition_callbacks: Vec::new(),
            display: DisplayLayout::default(),
            offset_percentage: DEFAULT_OFFSET_PERCENTAGE,
            timeout_unit: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeState {
    Disabled,
    EnabledInactive,
    EnabledActive,
    LockedDisabled,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControllerState {
    pub mode: ModeState,
    pub enabled: bool,
    pub active: bool,
    pub locked_disabled: bool,
    pub keyguard_showing: bool,
    pub swipe_to_exit: bool,
    pub tap_outside_to_exit: bool,
    pub timeout: TimeoutDuration,
    pub timer_armed: bool,
    pub display: DisplayLayout,
}

pub struct ModeController {
    organizer: Arc<dyn TransformOrganizer>,
    settings: Arc<dyn SettingsProvider>,
    task_stack: Arc<dyn TaskStackListener>,
    input_handlers: Vec<Arc<dyn InputHandler>>,
    owned_callbacks: Vec<CallbackId>,
    executor: ExecutorHandle<ModeController>,
    timeout: TimeoutHandler,
    display: DisplayLayout,
    offset_percentage: u8,
    mode_enabled: bool,
    swipe_to_exit_enabled: bool,
    tap_outside_to_exit_enabled: bool,
    locked_disabled: bool,
    keyguard_showing: bool,
    task_listener: Option<ListenerId>,
    events: EventLog,
}

impl ModeController {
    pub fn new(deps: ControllerDeps, executor: ExecutorHandle<ModeController>) -> Self {
        let ControllerDeps {
            organizer,
            settings,
            task_stack,
            input_handlers,
            transition_callbacks,
            display,
            offset_percentage,
            timeout_unit,
        } = deps;

        let timeout = TimeoutHandler::with_unit(settings.timeout(), timeout_unit);
        let expiry = executor.clone();
        timeout.register_timeout_listener(Arc::new(move |generation| {
            expiry.execute(move |controller: &mut ModeController| {
                controller.on_timeout_expired(generation)
            });
        }));

        let owned_callbacks = transition_callbacks
            .into_iter()
            .map(|callback| organizer.register_transition_callback(callback))
            .collect();

        let mut controller = Self {
            mode_enabled: settings.enabled(),
            swipe_to_exit_enabled: settings.swipe_to_exit_enabled(),
            tap_outside_to_exit_enabled: false,
            organizer,
            settings,
            task_stack,
            input_handlers,
            owned_callbacks,
            executor,
            timeout,
            display,
            offset_percentage: offset_percentage.min(100),
            locked_disabled: false,
            keyguard_showing: false,
            task_listener: None,
            events: EventLog::default(),
        };
        let taps_app_to_exit = controller.settings.taps_app_to_exit_enabled();
        controller.set_tap_outside_to_exit_enabled(taps_app_to_exit);
        controller.update_input_handlers();
        tracing::debug!(
            enabled = controller.mode_enabled,
            timeout = %controller.timeout.timeout(),
            "mode controller created"
        );
        controller
    }

    pub fn set_enabled(&mut self, requested: bool) {
        if requested == self.mode_enabled {
            return;
        }
        self.mode_enabled = requested;
        tracing::debug!(enabled = requested, "mode preference changed");
        if !requested {
            self.stop_with(TransitionReason::Disabled);
        }
        self.update_input_handlers();
    }

    pub fn start_mode(&mut self) {
        self.start_with(TransitionReason::Api);
    }

    pub fn stop_mode(&mut self) {
        self.stop_with(TransitionReason::Api);
    }

    /// `locked` forces the mode off while `enabled_preference` disagrees
    /// with the current preference.
    pub fn set_locked_disabled(&mut self, locked: bool, enabled_preference: bool) {
        self.locked_disabled = locked && enabled_preference != self.mode_enabled;
        tracing::debug!(
            locked,
            enabled_preference,
            locked_disabled = self.locked_disabled,
            "lock state updated"
        );
        if self.locked_disabled {
            self.stop_with(TransitionReason::Locked);
        }
    }

    pub fn is_locked_disabled(&self) -> bool {
        self.locked_disabled
    }

    pub fn set_swipe_to_exit_enabled(&mut self, enabled: bool) {
        if enabled == self.swipe_to_exit_enabled {
            return;
        }
        self.swipe_to_exit_enabled = enabled;
        self.update_input_handlers();
    }

    /// Also keeps the foreground-task listener registered exactly while enabled.
    pub fn set_tap_outside_to_exit_enabled(&mut self, enabled: bool) {
        self.tap_outside_to_exit_enabled = enabled;
        for handler in &self.input_handlers {
            handler.on_tap_outside_to_exit_changed(enabled);
        }
        match (enabled, self.task_listener) {
            (true, None) => {
                let executor = self.executor.clone();
                let id = self.task_stack.add_listener(Arc::new(move || {
                    executor.execute(|controller: &mut ModeController| {
                        controller.on_foreground_task_changed()
                    });
                }));
                self.task_listener = Some(id);
            }
            (false, Some(id)) => {
                self.task_stack.remove_listener(id);
                self.task_listener = None;
            }
            _ => {}
        }
    }

    pub fn on_setting_changed(&mut self, key: SettingKey) {
        match key {
            SettingKey::Enabled => self.on_enabled_setting_changed(),
            SettingKey::Timeout => self.on_timeout_setting_changed(),
            SettingKey::SwipeToExit => self.on_swipe_setting_changed(),
            SettingKey::TapsAppToExit => self.on_tap_outside_setting_changed(),
        }
    }

    pub fn on_enabled_setting_changed(&mut self) {
        let enabled = self.settings.enabled();
        self.set_enabled(enabled);
    }

    pub fn on_timeout_setting_changed(&mut self) {
        let timeout = self.settings.timeout();
        self.timeout.set_timeout(timeout);
    }

    pub fn on_swipe_setting_changed(&mut self) {
        let enabled = self.settings.swipe_to_exit_enabled();
        self.set_swipe_to_exit_enabled(enabled);
    }

    pub fn on_tap_outside_setting_changed(&mut self) {
        let enabled = self.settings.taps_app_to_exit_enabled();
        self.set_tap_outside_to_exit_enabled(enabled);
    }

    /// The callback only sees transitions that happen after registration.
    pub fn register_transition_callback(
        &mut self,
        callback: Arc<dyn TransitionCallback>,
    ) -> CallbackId {
        self.organizer.register_transition_callback(callback)
    }

    pub fn unregister_transition_callback(&mut self, id: CallbackId) -> bool {
        self.organizer.unregister_transition_callback(id)
    }

    pub fn on_timeout_expired(&mut self, generation: u64) {
        if !self.timeout.is_current(generation) {
            tracing::debug!(generation, "stale timeout ignored");
            return;
        }
        self.stop_with(TransitionReason::Timeout);
    }

    pub fn on_foreground_task_changed(&mut self) {
        if !self.tap_outside_to_exit_enabled {
            return;
        }
        self.stop_with(TransitionReason::AppSwitch);
    }

    /// Any touch on the shifted content postpones the timeout.
    pub fn on_user_interaction(&mut self) {
        if self.organizer.is_active() {
            self.timeout.reset_timer();
        }
    }

    pub fn on_gesture(&mut self, event: GestureEvent) {
        match event {
            GestureEvent::SwipeDown => self.start_with(TransitionReason::Gesture),
            GestureEvent::SwipeUp => self.stop_with(TransitionReason::Gesture),
        }
    }

    pub fn on_touch(&mut self, outcome: TouchOutcome) {
        match outcome {
            TouchOutcome::Ignored => {}
            TouchOutcome::Interaction => self.on_user_interaction(),
            TouchOutcome::ExitRequested if self.tap_outside_to_exit_enabled => {
                self.stop_with(TransitionReason::TapOutside)
            }
            TouchOutcome::ExitRequested => {
                tracing::debug!("tap outside ignored; tap to exit disabled");
            }
        }
    }

    /// The mode stays off while the keyguard is showing.
    pub fn on_keyguard_visibility_changed(&mut self, showing: bool) {
        self.keyguard_showing = showing;
        if showing {
            self.stop_with(TransitionReason::Keyguard);
        }
    }

    pub fn on_display_changed(&mut self, layout: DisplayLayout) {
        let rotated = layout.rotation != self.display.rotation;
        self.display = layout;
        if rotated {
            self.stop_with(TransitionReason::Rotation);
        }
    }

    /// Leave the mode before the controller goes away.
    pub fn shutdown(&mut self) {
        self.stop_with(TransitionReason::Shutdown);
        self.timeout.disarm();
    }

    pub fn is_enabled(&self) -> bool {
        self.mode_enabled
    }

    pub fn is_active(&self) -> bool {
        self.organizer.is_active()
    }

    pub fn is_swipe_to_exit_enabled(&self) -> bool {
        self.swipe_to_exit_enabled
    }

    pub fn is_tap_outside_to_exit_enabled(&self) -> bool {
        self.tap_outside_to_exit_enabled
    }

    pub fn timeout_handler(&self) -> &TimeoutHandler {
        &self.timeout
    }

    pub fn display(&self) -> DisplayLayout {
        self.display
    }

    pub fn recent_events(&self) -> Vec<EventRecord> {
        self.events.recent()
    }

    pub fn mode(&self) -> ModeState {
        if !self.mode_enabled {
            ModeState::Disabled
        } else if self.locked_disabled {
            ModeState::LockedDisabled
        } else if self.organizer.is_active() {
            ModeState::EnabledActive
        } else {
            ModeState::EnabledInactive
        }
    }

    pub fn snapshot(&self) -> ControllerState {
        ControllerState {
            mode: self.mode(),
            enabled: self.mode_enabled,
            active: self.organizer.is_active(),
            locked_disabled: self.locked_disabled,
            keyguard_showing: self.keyguard_showing,
            swipe_to_exit: self.swipe_to_exit_enabled,
            tap_outside_to_exit: self.tap_outside_to_exit_enabled,
            timeout: self.timeout.timeout(),
            timer_armed: self.timeout.is_armed(),
            display: self.display,
        }
    }

    fn start_with(&mut self, reason: TransitionReason) {
        if self.locked_disabled {
            tracing::debug!(?reason, "start ignored; temporarily lock disabled");
            return;
        }
        if !self.mode_enabled {
            tracing::debug!(?reason, "start ignored; mode disabled");
            return;
        }
        if self.keyguard_showing {
            tracing::debug!(?reason, "start ignored; keyguard showing");
            return;
        }
        if self.organizer.is_active() {
            return;
        }
        if self.display.is_landscape() {
            tracing::debug!(?reason, "start ignored; landscape not supported");
            return;
        }

        let offset = self.display.transform_offset(self.offset_percentage);
        self.organizer
            .schedule_transform_in(self.display.display_id, offset);
        self.timeout.reset_timer();
        for handler in &self.input_handlers {
            handler.on_active_changed(true);
        }
        self.events.record(ModeEvent::Entered(reason));
        tracing::info!(?reason, offset, "reach mode entered");
    }

    fn stop_with(&mut self, reason: TransitionReason) {
        if !self.organizer.is_active() {
            return;
        }
        self.organizer.schedule_transform_out(self.display.display_id, 0);
        self.timeout.disarm();
        for handler in &self.input_handlers {
            handler.on_active_changed(false);
        }
        self.events.record(ModeEvent::Exited(reason));
        tracing::info!(?reason, "reach mode exited");
    }

    fn update_input_handlers(&self) {
        for handler in &self.input_handlers {
            handler.on_swipe_to_exit_changed(self.swipe_to_exit_enabled);
            handler.on_enabled_changed(self.mode_enabled);
        }
    }
}

impl Drop for ModeController {
    fn drop(&mut self) {
        if let Some(id) = self.task_listener.take() {
            self.task_stack.remove_listener(id);
        }
        for id in self.owned_callbacks.drain(..) {
            self.organizer.unregister_transition_callback(id);
        }
    }
}

//! Runs a [`ModeController`] on its own executor thread and wires every
//! external trigger so that it is posted there rather than run in place.

use crate::controller::{
    ControllerDeps, ControllerState, ModeController, DEFAULT_OFFSET_PERCENTAGE,
};
use crate::display::DisplayLayout;
use crate::events::EventRecord;
use crate::executor::{ExecutorQueue, ShellExecutor};
use crate::input::{
    GestureBackend, GestureHandler, InputHandler, TouchEvent, TouchHandler, TouchOutcome,
};
use crate::organizer::{CallbackId, TransformOrganizer, TransitionCallback};
use crate::settings_observer::{ObserverId, SettingsObservable, SettingsProvider};
use crate::task_stack::{TaskStackListener, TaskStackListenerImpl};
use std::sync::Arc;
use std::time::Duration;

const EXECUTOR_THREAD_NAME: &str = "reach-mode-main";

pub struct ModeServiceBuilder {
    organizer: Arc<dyn TransformOrganizer>,
    settings: Arc<dyn SettingsProvider>,
    observable: Arc<dyn SettingsObservable>,
    task_stack: Arc<dyn TaskStackListener>,
    gesture_backend: Option<Box<dyn GestureBackend>>,
    extra_handlers: Vec<Arc<dyn InputHandler>>,
    display: DisplayLayout,
    offset_percentage: u8,
    timeout_unit: Duration,
}

impl ModeServiceBuilder {
    pub fn task_stack(mut self, task_stack: Arc<dyn TaskStackListener>) -> Self {
        self.task_stack = task_stack;
        self
    }

    pub fn gesture_backend(mut self, backend: Box<dyn GestureBackend>) -> Self {
        self.gesture_backend = Some(backend);
        self
    }

    pub fn input_handler(mut self, handler: Arc<dyn InputHandler>) -> Self {
        self.extra_handlers.push(handler);
        self
    }

    pub fn display(mut self, display: DisplayLayout) -> Self {
        self.display = display;
        self
    }

    pub fn offset_percentage(mut self, percentage: u8) -> Self {
        self.offset_percentage = percentage;
        self
    }

    /// Shorten or stretch every configured timeout second.
    pub fn timeout_unit(mut self, unit: Duration) -> Self {
        self.timeout_unit = unit;
        self
    }

    pub fn build(self) -> anyhow::Result<ModeService> {
        let queue = ExecutorQueue::<ModeController>::new();

        let touch_executor = queue.handle();
        let touch = Arc::new(TouchHandler::new(Arc::new(move |outcome| {
            touch_executor.execute(move |c: &mut ModeController| c.on_touch(outcome));
        })));

        let gesture = self.gesture_backend.map(|backend| {
            let gesture_executor = queue.handle();
            Arc::new(GestureHandler::new(
                backend,
                Arc::new(move |event| {
                    gesture_executor.execute(move |c: &mut ModeController| c.on_gesture(event));
                }),
            ))
        });

        let mut deps = ControllerDeps::new(self.organizer, self.settings, self.task_stack);
        deps.input_handlers.push(touch.clone());
        if let Some(gesture) = &gesture {
            deps.input_handlers.push(gesture.clone());
        }
        deps.input_handlers.extend(self.extra_handlers);
        deps.transition_callbacks.push(touch.clone());
        deps.display = self.display;
        deps.offset_percentage = self.offset_percentage;
        deps.timeout_unit = self.timeout_unit;

        let controller = ModeController::new(deps, queue.handle());

        let settings_executor = queue.handle();
        let observer = self.observable.add_observer(Arc::new(move |key| {
            settings_executor.execute(move |c: &mut ModeController| c.on_setting_changed(key));
        }));

        let executor = match queue.spawn(EXECUTOR_THREAD_NAME, controller) {
            Ok(executor) => executor,
            Err(err) => {
                self.observable.remove_observer(observer);
                return Err(err);
            }
        };
        tracing::info!("reach mode service started");

        Ok(ModeService {
            executor: Some(executor),
            observable: self.observable,
            observer,
            touch,
            gesture,
        })
    }
}

/// Thread-safe front end to a controller living on its executor.
///
/// Setters are posted and return immediately; queries wait for the
/// executor to answer and return `None` once it has shut down.
pub struct ModeService {
    executor: Option<ShellExecutor<ModeController>>,
    observable: Arc<dyn SettingsObservable>,
    observer: ObserverId,
    touch: Arc<TouchHandler>,
    gesture: Option<Arc<GestureHandler>>,
}

impl ModeService {
    pub fn builder<S>(organizer: Arc<dyn TransformOrganizer>, settings: Arc<S>) -> ModeServiceBuilder
    where
        S: SettingsProvider + SettingsObservable + 'static,
    {
        ModeServiceBuilder {
            organizer,
            settings: settings.clone(),
            observable: settings,
            task_stack: Arc::new(TaskStackListenerImpl::new()),
            gesture_backend: None,
            extra_handlers: Vec::new(),
            display: DisplayLayout::default(),
            offset_percentage: DEFAULT_OFFSET_PERCENTAGE,
            timeout_unit: Duration::from_secs(1),
        }
    }

    /// Post `task` to the controller's executor.
    pub fn execute<F>(&self, task: F) -> bool
    where
        F: FnOnce(&mut ModeController) + Send + 'static,
    {
        match &self.executor {
            Some(executor) => executor.execute(task),
            None => false,
        }
    }

    /// Run `f` on the controller's executor and wait for the result.
    pub fn call<R, F>(&self, f: F) -> Option<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut ModeController) -> R + Send + 'static,
    {
        self.executor.as_ref()?.call(f)
    }

    pub fn start_mode(&self) {
        self.execute(|c| c.start_mode());
    }

    pub fn stop_mode(&self) {
        self.execute(|c| c.stop_mode());
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.execute(move |c| c.set_enabled(enabled));
    }

    pub fn set_locked_disabled(&self, locked: bool, enabled_preference: bool) {
        self.execute(move |c| c.set_locked_disabled(locked, enabled_preference));
    }

    pub fn set_swipe_to_exit_enabled(&self, enabled: bool) {
        self.execute(move |c| c.set_swipe_to_exit_enabled(enabled));
    }

    pub fn set_tap_outside_to_exit_enabled(&self, enabled: bool) {
        self.execute(move |c| c.set_tap_outside_to_exit_enabled(enabled));
    }

    pub fn on_keyguard_visibility_changed(&self, showing: bool) {
        self.execute(move |c| c.on_keyguard_visibility_changed(showing));
    }

    pub fn on_display_changed(&self, layout: DisplayLayout) {
        self.execute(move |c| c.on_display_changed(layout));
    }

    /// Classify a raw touch; resulting actions are posted to the executor.
    pub fn handle_touch(&self, event: TouchEvent) -> TouchOutcome {
        self.touch.handle_touch(event)
    }

    pub fn gesture_armed(&self) -> bool {
        self.gesture
            .as_ref()
            .map(|gesture| gesture.is_armed())
            .unwrap_or(false)
    }

    pub fn register_transition_callback(
        &self,
        callback: Arc<dyn TransitionCallback>,
    ) -> Option<CallbackId> {
        self.call(move |c| c.register_transition_callback(callback))
    }

    pub fn unregister_transition_callback(&self, id: CallbackId) -> bool {
        self.call(move |c| c.unregister_transition_callback(id))
            .unwrap_or(false)
    }

    pub fn is_active(&self) -> bool {
        self.call(|c| c.is_active()).unwrap_or(false)
    }

    pub fn is_locked_disabled(&self) -> bool {
        self.call(|c| c.is_locked_disabled()).unwrap_or(false)
    }

    pub fn state(&self) -> Option<ControllerState> {
        self.call(|c| c.snapshot())
    }

    pub fn recent_events(&self) -> Vec<EventRecord> {
        self.call(|c| c.recent_events()).unwrap_or_default()
    }

    /// Leave the mode, detach from settings and stop the executor.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(executor) = self.executor.take() else {
            return;
        };
        self.observable.remove_observer(self.observer);
        executor.execute(|c| c.shutdown());
        let _ = executor.shutdown();
        tracing::info!("reach mode service stopped");
    }
}

impl Drop for ModeService {
    fn drop(&mut self) {
        self.stop();
    }
}

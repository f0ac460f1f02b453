use reach_mode::events::{ModeEvent, TransitionReason};
use reach_mode::input::{GestureEvent, MockGestureBackend, TouchEvent, TouchOutcome};
use reach_mode::organizer::{ImmediateOrganizer, TransformOrganizer, TransitionCallback};
use reach_mode::service::ModeService;
use reach_mode::settings::{Settings, TimeoutDuration};
use reach_mode::settings_observer::SettingsStore;
use reach_mode::task_stack::TaskStackListenerImpl;
use reach_mode::ModeState;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
struct RecordingCallback {
    calls: Mutex<Vec<String>>,
}

impl RecordingCallback {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl TransitionCallback for RecordingCallback {
    fn on_start(&self, offset: i32) {
        if let Ok(mut guard) = self.calls.lock() {
            guard.push(format!("start:{offset}"));
        }
    }

    fn on_stop(&self) {
        if let Ok(mut guard) = self.calls.lock() {
            guard.push("stop".to_string());
        }
    }
}

struct Fixture {
    service: ModeService,
    organizer: Arc<ImmediateOrganizer>,
    store: Arc<SettingsStore>,
    task_stack: Arc<TaskStackListenerImpl>,
    gestures: MockGestureBackend,
}

fn fixture(settings: Settings) -> Fixture {
    fixture_with_unit(settings, Duration::from_secs(1))
}

fn fixture_with_unit(settings: Settings, timeout_unit: Duration) -> Fixture {
    let organizer = Arc::new(ImmediateOrganizer::default());
    let store = Arc::new(SettingsStore::in_memory(settings));
    let task_stack = Arc::new(TaskStackListenerImpl::new());
    let gestures = MockGestureBackend::default();
    let service = ModeService::builder(organizer.clone(), store.clone())
        .task_stack(task_stack.clone())
        .gesture_backend(Box::new(gestures.clone()))
        .timeout_unit(timeout_unit)
        .build()
        .unwrap();
    Fixture {
        service,
        organizer,
        store,
        task_stack,
        gestures,
    }
}

fn enabled_settings() -> Settings {
    let mut settings = Settings::default();
    settings.enabled = true;
    settings
}

fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

#[test]
fn configured_timeout_reverts_once() {
    let mut settings = enabled_settings();
    settings.timeout_secs = TimeoutDuration::Short.as_secs();
    let f = fixture_with_unit(settings, Duration::from_millis(10));
    f.service.start_mode();
    assert!(wait_until(Duration::from_secs(3), || !f.organizer.is_active()));

    let state = f.service.state().unwrap();
    assert!(!state.active);
    assert!(!state.timer_armed);
    assert_eq!(
        f.service.recent_events().last().map(|r| r.event),
        Some(ModeEvent::Exited(TransitionReason::Timeout))
    );

    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(f.service.recent_events().len(), 2);
}

#[test]
fn interaction_postpones_configured_timeout() {
    let mut settings = enabled_settings();
    settings.timeout_secs = TimeoutDuration::Short.as_secs();
    let f = fixture_with_unit(settings, Duration::from_millis(50));
    f.service.start_mode();
    let offset = f.organizer.current_offset();

    for _ in 0..4 {
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(
            f.service.handle_touch(TouchEvent {
                x: 5.0,
                y: offset as f32 + 10.0
            }),
            TouchOutcome::Interaction
        );
    }
    assert!(f.service.is_active());
    assert!(wait_until(Duration::from_secs(3), || !f.organizer.is_active()));
}

#[test]
fn settings_changes_are_applied_in_order() {
    let f = fixture(enabled_settings());
    f.service.start_mode();
    assert!(f.service.is_active());

    f.store.update(|s| s.timeout_secs = 4).unwrap();
    f.store.update(|s| s.timeout_secs = 12).unwrap();
    f.store.update(|s| s.enabled = false).unwrap();

    let state = f.service.state().unwrap();
    assert_eq!(state.timeout, TimeoutDuration::Long);
    assert_eq!(state.mode, ModeState::Disabled);
    assert!(!f.organizer.is_active());
}

#[test]
fn gestures_enter_and_exit() {
    let f = fixture(enabled_settings());
    assert!(f.service.gesture_armed());
    assert_eq!(f.gestures.install_count(), 1);

    assert!(f.gestures.simulate(GestureEvent::SwipeDown));
    assert!(f.service.is_active());

    assert!(f.gestures.simulate(GestureEvent::SwipeUp));
    assert!(f.service.is_active());

    f.store.update(|s| s.swipe_to_exit = true).unwrap();
    assert!(f.service.state().unwrap().swipe_to_exit);
    assert!(f.gestures.simulate(GestureEvent::SwipeUp));
    assert!(!f.service.is_active());

    f.service.set_enabled(false);
    assert!(!f.service.is_active());
    assert!(f.service.gesture_armed());
    assert!(f.gestures.simulate(GestureEvent::SwipeDown));
    assert!(!f.service.is_active());

    f.store.update(|s| s.swipe_to_exit = false).unwrap();
    assert!(!f.service.state().unwrap().swipe_to_exit);
    assert!(!f.service.gesture_armed());
    assert_eq!(f.gestures.uninstall_count(), 1);
}

#[test]
fn swipe_to_exit_arms_gestures_while_mode_disabled() {
    let mut settings = Settings::default();
    settings.swipe_to_exit = true;
    let f = fixture(settings);
    assert!(f.service.gesture_armed());
    assert_eq!(f.gestures.install_count(), 1);

    f.store.update(|s| s.swipe_to_exit = false).unwrap();
    assert!(!f.service.state().unwrap().swipe_to_exit);
    assert!(!f.service.gesture_armed());
}

#[test]
fn touches_outside_content_exit() {
    let f = fixture(enabled_settings());
    assert_eq!(
        f.service.handle_touch(TouchEvent { x: 5.0, y: 5.0 }),
        TouchOutcome::Ignored
    );

    f.service.start_mode();
    assert!(f.service.is_active());
    let offset = f.organizer.current_offset();
    assert!(offset > 0);

    assert_eq!(
        f.service.handle_touch(TouchEvent {
            x: 5.0,
            y: offset as f32 + 10.0
        }),
        TouchOutcome::Interaction
    );
    assert!(f.service.is_active());

    assert_eq!(
        f.service.handle_touch(TouchEvent { x: 5.0, y: 5.0 }),
        TouchOutcome::ExitRequested
    );
    assert!(!f.service.is_active());
}

#[test]
fn outside_touch_keeps_mode_when_tap_to_exit_off() {
    let mut settings = enabled_settings();
    settings.taps_app_to_exit = false;
    let f = fixture(settings);
    f.service.set_tap_outside_to_exit_enabled(false);
    f.service.start_mode();
    assert!(f.service.is_active());

    assert_eq!(
        f.service.handle_touch(TouchEvent { x: 5.0, y: 5.0 }),
        TouchOutcome::Ignored
    );
    assert!(f.service.is_active());

    f.store.update(|s| s.taps_app_to_exit = true).unwrap();
    assert!(f.service.state().unwrap().tap_outside_to_exit);
    assert_eq!(
        f.service.handle_touch(TouchEvent { x: 5.0, y: 5.0 }),
        TouchOutcome::ExitRequested
    );
    assert!(!f.service.is_active());
}

#[test]
fn app_switch_exits_when_enabled() {
    let f = fixture(enabled_settings());
    assert_eq!(f.task_stack.listener_count(), 1);

    f.service.start_mode();
    f.task_stack.on_task_moved_to_front(3);
    assert!(!f.service.is_active());

    f.store.update(|s| s.taps_app_to_exit = false).unwrap();
    f.service.start_mode();
    assert!(f.service.is_active());
    assert_eq!(f.task_stack.listener_count(), 0);
    f.task_stack.on_task_moved_to_front(4);
    assert!(f.service.is_active());
}

#[test]
fn lock_override_blocks_and_forces_stop() {
    let f = fixture(enabled_settings());
    f.service.start_mode();
    f.service.set_locked_disabled(true, false);
    assert!(f.service.is_locked_disabled());
    assert!(!f.service.is_active());

    f.service.start_mode();
    assert!(!f.service.is_active());
    assert_eq!(f.service.state().unwrap().mode, ModeState::LockedDisabled);

    f.service.set_locked_disabled(false, false);
    f.service.start_mode();
    assert!(f.service.is_active());
}

#[test]
fn late_callback_receives_only_future_transitions() {
    let f = fixture(enabled_settings());
    let early = Arc::new(RecordingCallback::default());
    f.service.register_transition_callback(early.clone()).unwrap();
    f.service.start_mode();

    let late = Arc::new(RecordingCallback::default());
    let id = f
        .service
        .register_transition_callback(late.clone())
        .unwrap();
    f.service.stop_mode();
    f.service.start_mode();
    assert!(f.service.is_active());

    let offset = f.organizer.current_offset();
    assert_eq!(
        early.calls(),
        vec![format!("start:{offset}"), "stop".to_string(), format!("start:{offset}")]
    );
    assert_eq!(late.calls(), vec!["stop".to_string(), format!("start:{offset}")]);
    assert!(f.service.unregister_transition_callback(id));
}

#[test]
fn shutdown_reverts_and_detaches() {
    let f = fixture(enabled_settings());
    f.service.start_mode();
    assert!(f.service.is_active());
    assert_eq!(f.store.observer_count(), 1);

    let Fixture {
        service,
        organizer,
        store,
        task_stack,
        ..
    } = f;
    service.shutdown();

    assert!(!organizer.is_active());
    assert_eq!(store.observer_count(), 0);
    assert_eq!(task_stack.listener_count(), 0);
    assert_eq!(organizer.callback_count(), 0);
}

use super::InputHandler;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureEvent {
    /// Swipe down along the bottom edge: enter the mode.
    SwipeDown,
    /// Swipe up while shifted: leave the mode.
    SwipeUp,
}

pub type GestureSink = Arc<dyn Fn(GestureEvent) + Send + Sync>;

/// Raw gesture detection. Recognition itself lives behind this trait.
pub trait GestureBackend: Send {
    fn install(&mut self, sink: GestureSink) -> anyhow::Result<()>;
    fn uninstall(&mut self) -> anyhow::Result<()>;
    fn is_installed(&self) -> bool;
}

/// Keeps the gesture backend installed while either the mode or
/// swipe-to-exit is enabled.
///
/// Swipe-up gestures are only forwarded when swipe-to-exit is on.
pub struct GestureHandler {
    backend: Mutex<Box<dyn GestureBackend>>,
    sink: GestureSink,
    mode_enabled: AtomicBool,
    swipe_to_exit: Arc<AtomicBool>,
}

impl GestureHandler {
    pub fn new(backend: Box<dyn GestureBackend>, sink: GestureSink) -> Self {
        Self {
            backend: Mutex::new(backend),
            sink,
            mode_enabled: AtomicBool::new(false),
            swipe_to_exit: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.backend
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_installed()
    }

    fn refresh(&self) {
        if self.mode_enabled.load(Ordering::SeqCst) || self.swipe_to_exit.load(Ordering::SeqCst) {
            self.start_running();
        } else {
            self.stop_running();
        }
    }

    fn start_running(&self) {
        let mut backend = self.backend.lock().unwrap_or_else(PoisonError::into_inner);
        if backend.is_installed() {
            return;
        }
        let sink = self.sink.clone();
        let swipe_to_exit = self.swipe_to_exit.clone();
        let filtered: GestureSink = Arc::new(move |event| {
            if event == GestureEvent::SwipeUp && !swipe_to_exit.load(Ordering::SeqCst) {
                tracing::trace!("swipe up ignored; swipe to exit disabled");
                return;
            }
            sink(event);
        });
        if let Err(err) = backend.install(filtered) {
            tracing::error!(?err, "failed to install gesture backend");
        }
    }

    fn stop_running(&self) {
        let mut backend = self.backend.lock().unwrap_or_else(PoisonError::into_inner);
        if !backend.is_installed() {
            return;
        }
        if let Err(err) = backend.uninstall() {
            tracing::error!(?err, "failed to uninstall gesture backend");
        }
    }
}

impl InputHandler for GestureHandler {
    fn name(&self) -> &str {
        "gesture"
    }

    fn on_enabled_changed(&self, enabled: bool) {
        self.mode_enabled.store(enabled, Ordering::SeqCst);
        self.refresh();
    }

    fn on_swipe_to_exit_changed(&self, enabled: bool) {
        self.swipe_to_exit.store(enabled, Ordering::SeqCst);
        self.refresh();
    }
}

/// Backend that lets callers inject gestures by hand.
#[derive(Clone, Default)]
pub struct MockGestureBackend {
    sink: Arc<Mutex<Option<GestureSink>>>,
    installs: Arc<AtomicUsize>,
    uninstalls: Arc<AtomicUsize>,
}

impl MockGestureBackend {
    pub fn install_count(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }

    pub fn uninstall_count(&self) -> usize {
        self.uninstalls.load(Ordering::SeqCst)
    }

    /// Deliver `event` as if it had been recognised. Returns `false` when not installed.
    pub fn simulate(&self, event: GestureEvent) -> bool {
        let sink = self
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match sink {
            Some(sink) => {
                sink(event);
                true
            }
            None => false,
        }
    }
}

impl GestureBackend for MockGestureBackend {
    fn install(&mut self, sink: GestureSink) -> anyhow::Result<()> {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
        self.installs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn uninstall(&mut self) -> anyhow::Result<()> {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.uninstalls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_installed(&self) -> bool {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

//! Reduced-reach display mode: a controller that shifts on-screen content
//! down on request and brings it back on timeout, lock, app switch or
//! explicit exit, with every trigger serialized onto one executor.

pub mod controller;
pub mod display;
pub mod events;
pub mod executor;
pub mod input;
pub mod logging;
pub mod organizer;
pub mod registry;
pub mod relay;
pub mod service;
pub mod settings;
pub mod settings_observer;
pub mod task_stack;
pub mod timeout;

pub use controller::{ControllerDeps, ControllerState, ModeController, ModeState};
pub use service::{ModeService, ModeServiceBuilder};

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::VecDeque;

const EVENT_LOG_CAPACITY: usize = 32;

/// Why the transform was entered or left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    Api,
    Gesture,
    Timeout,
    AppSwitch,
    TapOutside,
    Locked,
    Keyguard,
    Rotation,
    Disabled,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum ModeEvent {
    Entered(TransitionReason),
    Exited(TransitionReason),
}

#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub at: DateTime<Local>,
    pub event: ModeEvent,
}

/// Bounded history of recent transitions, newest last.
#[derive(Debug, Default)]
pub struct EventLog {
    records: VecDeque<EventRecord>,
}

impl EventLog {
    pub fn record(&mut self, event: ModeEvent) {
        if self.records.len() == EVENT_LOG_CAPACITY {
            self.records.pop_front();
        }
        self.records.push_back(EventRecord {
            at: Local::now(),
            event,
        });
    }

    pub fn recent(&self) -> Vec<EventRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn events(&self) -> Vec<ModeEvent> {
        self.records.iter().map(|r| r.event).collect()
    }
}

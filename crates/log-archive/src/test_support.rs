use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::{Clock, StatusEvent, StatusSink};

/// Always reports the same instant, for predictable archive names.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Keeps every event in memory, in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<StatusEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far.
    pub fn events(&self) -> Vec<StatusEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn failures(&self) -> Vec<StatusEvent> {
        self.events()
            .into_iter()
            .filter(StatusEvent::is_failure)
            .collect()
    }
}

impl StatusSink for RecordingSink {
    fn emit(&self, event: StatusEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Maximum events kept per session
pub const EVENT_LOG_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

impl Event {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            description: description.into(),
        }
    }
}

/// Ordered log of notable things that happened in a session
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: VecDeque<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self { events: VecDeque::new() }
    }

    /// Record an event, dropping the oldest once full
    pub fn log(&mut self, session_id: u32, description: impl Into<String>) -> Event {
        let event = Event::new(description);
        tracing::info!(session_id, "{}", event.description);

        if self.events.len() == EVENT_LOG_CAPACITY {
            self.events.pop_front();
        }
        self.events.push_back(event.clone());
        event
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn to_vec(&self) -> Vec<Event> {
        self.events.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

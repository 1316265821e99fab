use agent::{Decision, Reading, Status};
use std::collections::VecDeque;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoggedReading {
    pub tick: u64,
    pub temperature: f64,
    pub voltage: f64,
    pub current: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub id: u64,
    pub tick: u64,
    pub status: Status,
    pub message: String,
}

/// In-memory reading and event log. Consecutive events with the same message are collapsed.
#[derive(Clone, Debug)]
pub struct EventJournal {
    readings: VecDeque<LoggedReading>,
    reading_capacity: usize,
    events: Vec<Event>,
    next_id: u64,
}

impl EventJournal {
    pub fn new(reading_capacity: usize) -> Self {
        Self {
            readings: VecDeque::new(),
            reading_capacity,
            events: Vec::new(),
            next_id: 1,
        }
    }

    pub fn record_reading(&mut self, tick: u64, r: &Reading) {
        if self.reading_capacity == 0 {
            return;
        }
        if self.readings.len() == self.reading_capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(LoggedReading {
            tick,
            temperature: r.temperature,
            voltage: r.voltage,
            current: r.current,
        });
    }

    /// Logs alerts whose reason differs from the last logged event. Returns whether it logged.
    pub fn record_decision(&mut self, tick: u64, d: &Decision) -> bool {
        if !d.is_alert() {
            return false;
        }
        if self.events.last().is_some_and(|e| e.message == d.reason) {
            return false;
        }
        let event = Event {
            id: self.next_id,
            tick,
            status: d.status,
            message: d.reason.clone(),
        };
        tracing::warn!(id = event.id, tick, status = %event.status, "{}", event.message);
        self.next_id += 1;
        self.events.push(event);
        true
    }

    /// Up to `limit` most recent readings, oldest first.
    pub fn recent_readings(&self, limit: usize) -> Vec<LoggedReading> {
        let skip = self.readings.len().saturating_sub(limit);
        self.readings.iter().skip(skip).copied().collect()
    }

    /// Up to `limit` most recent events, newest first.
    pub fn recent_events(&self, limit: usize) -> Vec<Event> {
        self.events.iter().rev().take(limit).cloned().collect()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Wipe readings and events; ids restart at 1.
    pub fn clear(&mut self) {
        self.readings.clear();
        self.events.clear();
        self.next_id = 1;
    }
}

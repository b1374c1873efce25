//! Diagnostic event log.
//!
//! Events are for humans and exporters only; no part of the simulation reads
//! them back.

use crate::lifecycle::AgentMode;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Started,
    Stopped,
    AnomalySpawned {
        x: f64,
        y: f64,
        intensity: f64,
    },
    StateChanged {
        agent_id: usize,
        from: AgentMode,
        to: AgentMode,
    },
    Detection {
        agent_id: usize,
        intensity: f64,
        x: f64,
        y: f64,
    },
    Uploaded {
        agent_id: usize,
        count: usize,
    },
    Retasked {
        agent_id: usize,
        hotspot_x: usize,
        hotspot_y: usize,
    },
    SensingStarted {
        agent_id: usize,
    },
}

/// A timestamped event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
    /// Simulation time (ms)
    pub time_ms: u64,
    pub kind: EventKind,
}

impl std::fmt::Display for SimEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:>8.1}s] ", self.time_ms as f64 / 1000.0)?;
        match &self.kind {
            EventKind::Started => write!(f, "Simulation started"),
            EventKind::Stopped => write!(f, "Simulation stopped"),
            EventKind::AnomalySpawned { x, y, intensity } => {
                write!(f, "Anomaly spawned at ({:.0}, {:.0}) intensity {:.2}", x, y, intensity)
            }
            EventKind::StateChanged { agent_id, from, to } => {
                write!(f, "Drone {}: {} -> {}", agent_id, from, to)
            }
            EventKind::Detection {
                agent_id,
                intensity,
                x,
                y,
            } => write!(
                f,
                "Drone {} detected {:.3} at ({:.1}, {:.1})",
                agent_id, intensity, x, y
            ),
            EventKind::Uploaded { agent_id, count } => {
                write!(f, "Drone {} uploaded {} measurements", agent_id, count)
            }
            EventKind::Retasked {
                agent_id,
                hotspot_x,
                hotspot_y,
            } => write!(
                f,
                "Drone {} re-tasked to hotspot ({}, {})",
                agent_id, hotspot_x, hotspot_y
            ),
            EventKind::SensingStarted { agent_id } => {
                write!(f, "Drone {} holding for measurement", agent_id)
            }
        }
    }
}

/// Ordered event history with a fixed capacity.
///
/// Once full, the oldest entries are dropped; order of the retained entries
/// never changes.
#[derive(Debug, Clone, PartialEq)]
pub struct EventLog {
    entries: VecDeque<SimEvent>,
    capacity: usize,
    dropped: u64,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
            dropped: 0,
        }
    }

    pub fn push(&mut self, time_ms: u64, kind: EventKind) {
        if self.capacity == 0 {
            self.dropped += 1;
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
        }
        self.entries.push_back(SimEvent { time_ms, kind });
    }

    /// Retained events, oldest first.
    pub fn iter(&self) -> std::collections::vec_deque::Iter<'_, SimEvent> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Events discarded because the log was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn to_vec(&self) -> Vec<SimEvent> {
        self.entries.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.dropped = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_log_drops_oldest() {
        let mut log = EventLog::new(2);
        log.push(0, EventKind::Started);
        log.push(200, EventKind::Stopped);
        log.push(400, EventKind::Started);

        assert_eq!(log.len(), 2);
        assert_eq!(log.dropped(), 1);
        let times: Vec<u64> = log.iter().map(|e| e.time_ms).collect();
        assert_eq!(times, vec![200, 400]);
    }

    #[test]
    fn test_event_log_iterates_newest_first_in_reverse() {
        let mut log = EventLog::new(4);
        for t in [0, 200, 400] {
            log.push(t, EventKind::Started);
        }
        let newest: Vec<u64> = log.iter().rev().map(|e| e.time_ms).collect();
        assert_eq!(newest, vec![400, 200, 0]);
    }

    #[test]
    fn test_event_display() {
        let event = SimEvent {
            time_ms: 6_200,
            kind: EventKind::StateChanged {
                agent_id: 3,
                from: AgentMode::Roaming,
                to: AgentMode::Returning,
            },
        };
        assert_eq!(event.to_string(), "[     6.2s] Drone 3: ROAMING -> RETURNING");
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = SimEvent {
            time_ms: 0,
            kind: EventKind::Retasked {
                agent_id: 1,
                hotspot_x: 4,
                hotspot_y: 5,
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"]["type"], "retasked");
        assert_eq!(json["kind"]["hotspot_x"], 4);
    }
}

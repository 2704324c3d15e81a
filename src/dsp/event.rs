use std::fmt;

use serde::Serialize;

/// Direction in which a feature has to move to activate the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Rising,
    Falling,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EventState {
    #[default]
    Quiet,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Event {
    Onset,
    Offset,
}

impl Event {
    pub fn label(self) -> &'static str {
        match self {
            Event::Onset => "onset",
            Event::Offset => "offset",
        }
    }

    /// Wire form emitted by the text source: exactly one line.
    pub fn line(self) -> &'static str {
        match self {
            Event::Onset => "onset\n",
            Event::Offset => "offset\n",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Quiet goes Active when the value crosses `high` in the activating
/// direction; Active goes Quiet when it crosses `low` the other way. Every
/// other step is a no-op.
#[derive(Debug, Clone)]
pub struct EventDetector {
    direction: Direction,
    state: EventState,
    onsets: u64,
}

impl EventDetector {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            state: EventState::Quiet,
            onsets: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == EventState::Active
    }

    /// Number of onsets since the last reset.
    pub fn onsets(&self) -> u64 {
        self.onsets
    }

    pub fn update(&mut self, value: f32, low: f32, high: f32) -> Option<Event> {
        debug_assert!(value.is_finite(), "non-finite feature reached the detector");
        match (self.state, self.direction) {
            (EventState::Quiet, Direction::Rising) if value > high => Some(self.activate()),
            (EventState::Quiet, Direction::Falling) if value < high => Some(self.activate()),
            (EventState::Active, Direction::Rising) if value < low => Some(self.deactivate()),
            (EventState::Active, Direction::Falling) if value > low => Some(self.deactivate()),
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.state = EventState::Quiet;
        self.onsets = 0;
    }

    fn activate(&mut self) -> Event {
        self.state = EventState::Active;
        self.onsets += 1;
        Event::Onset
    }

    fn deactivate(&mut self) -> Event {
        self.state = EventState::Quiet;
        Event::Offset
    }
}

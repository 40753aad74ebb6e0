// src/detection.rs

use crate::uid::Uid;

/// What the reader last reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DetectionState {
    #[default]
    NoCard,
    CardPresent(Uid),
}

impl DetectionState {
    pub fn uid(&self) -> Option<Uid> {
        match self {
            DetectionState::NoCard => None,
            DetectionState::CardPresent(uid) => Some(*uid),
        }
    }
}

impl From<Option<Uid>> for DetectionState {
    fn from(uid: Option<Uid>) -> Self {
        uid.map_or(DetectionState::NoCard, DetectionState::CardPresent)
    }
}

/// A change of the detection state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DetectionEvent {
    pub previous: DetectionState,
    pub current: DetectionState,
}

impl DetectionEvent {
    /// The value listeners receive: the UID on the reader, if any.
    pub fn uid(&self) -> Option<Uid> {
        self.current.uid()
    }
}

/// Edge detector over successive poll results.
#[derive(Clone, Copy, Debug, Default)]
pub struct Detector {
    state: DetectionState,
}

impl Detector {
    pub fn new() -> Self {
        Detector::default()
    }

    pub fn state(&self) -> DetectionState {
        self.state
    }

    /// Records `next` and returns an event only if it differs from the
    /// current state.
    pub fn observe(&mut self, next: DetectionState) -> Option<DetectionEvent> {
        if next == self.state {
            return None;
        }
        let previous = core::mem::replace(&mut self.state, next);
        Some(DetectionEvent {
            previous,
            current: next,
        })
    }
}

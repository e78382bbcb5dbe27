//! Play queue and end-of-track advance policy
//!
//! The queue is plain control-domain state: an ordered list of pending
//! track paths per deck. The engine never sees it - when a deck reports
//! end-of-track, the control tick consults [`next_action`] and turns the
//! decision into ordinary commands (seek/play/load).

use std::collections::VecDeque;
use std::path::PathBuf;

/// FIFO of pending track paths for one deck
#[derive(Debug, Default)]
pub struct TrackQueue {
    tracks: VecDeque<PathBuf>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a track to the back of the queue
    pub fn push_back(&mut self, path: impl Into<PathBuf>) {
        self.tracks.push_back(path.into());
    }

    /// Remove and return the front track
    pub fn pop_front(&mut self) -> Option<PathBuf> {
        self.tracks.pop_front()
    }

    /// Peek at the front track without removing it
    pub fn front(&self) -> Option<&PathBuf> {
        self.tracks.front()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.tracks.iter()
    }
}

/// What to do with a deck whose track just ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceDecision {
    /// Rewind and replay the same track (loop flag set)
    Restart,
    /// Load the popped queue entry and play it
    Advance(PathBuf),
    /// Leave the deck halted at the end of the finished track
    Hold,
}

/// Decide the advance action for a deck that reached end-of-track
///
/// Consulted once per deck per control tick, never from the audio path.
/// The loop flag wins over the queue; otherwise the queue is popped only
/// when queue playback is enabled and something is actually queued. In
/// every remaining case the deck stays where it stopped.
pub fn next_action(looping: bool, autoplay: bool, queue: &mut TrackQueue) -> AdvanceDecision {
    if looping {
        return AdvanceDecision::Restart;
    }
    if autoplay {
        if let Some(next) = queue.pop_front() {
            return AdvanceDecision::Advance(next);
        }
    }
    AdvanceDecision::Hold
}

//! Mixer - sums the two deck outputs into the master stream
//!
//! A plain additive mixer: per-sample, per-channel summation with no
//! renormalization and no limiting. Two decks at full gain can exceed
//! unity amplitude; that clipping is accepted, matching the behavior of a
//! simple summing bus. Level management is the job of the deck gains and
//! the crossfader upstream.
//!
//! The deck set is fixed at construction time for the process lifetime;
//! there is no registration from the real-time path.

use crate::types::{StereoBuffer, NUM_DECKS};

/// Additive two-deck mixer
pub struct Mixer;

impl Mixer {
    pub fn new() -> Self {
        Self
    }

    /// Sum the deck blocks into `master`, frame by frame
    ///
    /// All buffers must share one block length; the backend sizes them from
    /// a single callback request. Empty decks contribute exact silence, so
    /// two empty decks yield an all-zero master block.
    pub fn mix(&self, deck_buffers: &[StereoBuffer; NUM_DECKS], master: &mut StereoBuffer) {
        master.fill_silence();
        for buffer in deck_buffers {
            master.add_buffer(buffer);
        }
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}

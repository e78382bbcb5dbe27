//! Lock-free command queue for real-time engine control
//!
//! The control domain (UI, session, queue ticks) never touches the engine
//! directly. Every mutation is encoded as an [`EngineCommand`] and pushed
//! through a bounded SPSC ring buffer; the audio thread drains the queue at
//! the top of each callback, before rendering the block.
//!
//! This is what keeps the two concurrency domains honest:
//! - pushing a command is wait-free and never blocks the control thread,
//! - popping is wait-free and never blocks the audio thread,
//! - no mutex exists for the callback to stall on while a load is underway.
//!
//! Parameter validation happens *before* a command is enqueued (see
//! [`crate::session::Session`]); by the time a command reaches the audio
//! thread it is known-good, so the real-time path has no error channel.

use crate::track::LoadedTrack;
use crate::types::DeckId;

/// Commands applied by the audio thread at block boundaries
///
/// Each variant is one atomic operation on the engine. `LoadTrack` carries
/// the fully decoded track; boxed so the enum stays pointer-sized in the
/// ring buffer while the audio payload itself never moves.
pub enum EngineCommand {
    /// Swap the deck's current track (last-load-wins; the previous track is
    /// dropped on the audio thread and reclaimed by the collector thread)
    LoadTrack { deck: DeckId, track: Box<LoadedTrack> },
    /// Remove the deck's current track, returning it to `Empty`
    UnloadTrack { deck: DeckId },

    /// Start or resume playback
    Play { deck: DeckId },
    /// Halt playback, keeping the playhead position
    Pause { deck: DeckId },
    /// Halt playback, keeping the playhead position (the transport has no
    /// rewind-on-stop; only an explicit seek moves the playhead)
    Stop { deck: DeckId },
    /// Toggle between playing and paused
    TogglePlay { deck: DeckId },

    /// Jump to an absolute source-frame position (clamped to track length)
    Seek { deck: DeckId, frame: u64 },
    /// Jump to a fraction of the track length in [0, 1]
    SeekRelative { deck: DeckId, fraction: f64 },
    /// Nudge the playhead by a signed number of seconds
    SkipSeconds { deck: DeckId, seconds: f64 },

    /// Set deck gain in [0, 1]
    SetGain { deck: DeckId, gain: f32 },
    /// Set the playback speed ratio in (0, 2]
    SetSpeed { deck: DeckId, ratio: f32 },
    /// Enable or disable restart-at-end looping
    SetLoop { deck: DeckId, enabled: bool },

    /// Move the crossfader; gains are recomputed for both decks except at
    /// the center detent
    SetCrossfader { value: f32 },
}

/// Capacity of the command queue
///
/// Control traffic is a handful of commands per user gesture; 256 gives
/// ample headroom for a burst of slider moves between two callbacks.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Create the command channel (producer for the control domain, consumer
/// for the audio thread)
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_channel_push_pop() {
        let (mut tx, mut rx) = command_channel();

        tx.push(EngineCommand::Play { deck: DeckId::A }).unwrap();
        tx.push(EngineCommand::SetCrossfader { value: 0.25 }).unwrap();

        assert!(matches!(rx.pop().unwrap(), EngineCommand::Play { deck: DeckId::A }));
        assert!(matches!(
            rx.pop().unwrap(),
            EngineCommand::SetCrossfader { value } if value == 0.25
        ));
        assert!(rx.pop().is_err());
    }

    #[test]
    fn test_command_stays_cache_line_sized() {
        // The ring buffer copies commands by value; keep the enum small.
        // The largest variants carry a DeckId plus one f64.
        let size = std::mem::size_of::<EngineCommand>();
        assert!(size <= 24, "EngineCommand is {} bytes, expected <= 24", size);
    }
}

//! Main audio engine - ties together decks, mixer and crossfader
//!
//! The engine is owned exclusively by the audio thread. Each callback
//! drains the command queue, renders both decks into pre-allocated
//! buffers, and sums them into the master block. Nothing here allocates,
//! locks, or returns errors; every input was validated before it was
//! queued.

use crate::types::{DeckId, StereoBuffer, NUM_DECKS};

use super::command::EngineCommand;
use super::crossfader::Crossfader;
use super::deck::{Deck, DeckAtomics};
use super::mixer::Mixer;

/// Preferred block size when the device lets us choose
pub const BUFFER_SIZE: usize = 512;

/// Maximum block size to pre-allocate for. Covers the common device
/// configurations (64..4096 frames); pre-allocating to this bound keeps
/// the callback allocation-free for any of them.
pub const MAX_BUFFER_SIZE: usize = 8192;

/// The two-deck mixing engine
pub struct AudioEngine {
    decks: [Deck; NUM_DECKS],
    mixer: Mixer,
    crossfader: Crossfader,
    /// Pre-allocated per-deck render buffers
    deck_buffers: [StereoBuffer; NUM_DECKS],
    output_rate: u32,
}

impl AudioEngine {
    /// Create an engine rendering at the given device sample rate
    pub fn new(output_rate: u32) -> Self {
        Self {
            decks: [
                Deck::new(DeckId::A, output_rate),
                Deck::new(DeckId::B, output_rate),
            ],
            mixer: Mixer::new(),
            crossfader: Crossfader::new(),
            deck_buffers: std::array::from_fn(|_| StereoBuffer::silence(MAX_BUFFER_SIZE)),
            output_rate,
        }
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    pub fn deck(&self, id: DeckId) -> &Deck {
        &self.decks[id.index()]
    }

    pub fn deck_mut(&mut self, id: DeckId) -> &mut Deck {
        &mut self.decks[id.index()]
    }

    pub fn crossfader(&self) -> &Crossfader {
        &self.crossfader
    }

    /// Lock-free state handles for both decks, in [A, B] order
    ///
    /// Call once at startup and hand the clones to the control domain.
    pub fn deck_atomics(&self) -> [std::sync::Arc<DeckAtomics>; NUM_DECKS] {
        std::array::from_fn(|i| self.decks[i].atomics())
    }

    /// Drain and apply all pending control commands
    ///
    /// Called at the top of every callback, before rendering, so a block
    /// never mixes pre- and post-command state.
    pub fn process_commands(&mut self, commands: &mut rtrb::Consumer<EngineCommand>) {
        while let Ok(cmd) = commands.pop() {
            self.apply(cmd);
        }
    }

    fn apply(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::LoadTrack { deck, track } => {
                self.deck_mut(deck).load_track(*track);
            }
            EngineCommand::UnloadTrack { deck } => self.deck_mut(deck).unload_track(),
            EngineCommand::Play { deck } => self.deck_mut(deck).play(),
            EngineCommand::Pause { deck } => self.deck_mut(deck).pause(),
            EngineCommand::Stop { deck } => self.deck_mut(deck).stop(),
            EngineCommand::TogglePlay { deck } => self.deck_mut(deck).toggle_play(),
            EngineCommand::Seek { deck, frame } => self.deck_mut(deck).seek_frame(frame),
            EngineCommand::SeekRelative { deck, fraction } => {
                self.deck_mut(deck).seek_relative(fraction)
            }
            EngineCommand::SkipSeconds { deck, seconds } => {
                self.deck_mut(deck).skip_seconds(seconds)
            }
            EngineCommand::SetGain { deck, gain } => self.deck_mut(deck).set_gain(gain),
            EngineCommand::SetSpeed { deck, ratio } => self.deck_mut(deck).set_speed(ratio),
            EngineCommand::SetLoop { deck, enabled } => self.deck_mut(deck).set_loop(enabled),
            EngineCommand::SetCrossfader { value } => {
                self.crossfader.set_value(value);
                // The center detent leaves both deck gains alone
                if let Some((gain_a, gain_b)) = self.crossfader.gains() {
                    self.deck_mut(DeckId::A).set_gain(gain_a);
                    self.deck_mut(DeckId::B).set_gain(gain_b);
                }
            }
        }
    }

    /// Render one block of master output
    ///
    /// Pulls a block from each deck and sums them. `master.len()` sets the
    /// block size and must not exceed [`MAX_BUFFER_SIZE`].
    pub fn process(&mut self, master: &mut StereoBuffer) {
        let block = master.len();

        for (deck, buffer) in self.decks.iter_mut().zip(self.deck_buffers.iter_mut()) {
            buffer.set_len_from_capacity(block);
            deck.process(buffer);
        }

        self.mixer.mix(&self.deck_buffers, master);
    }
}

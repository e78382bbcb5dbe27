//! Session - the control-domain surface of the engine
//!
//! The session owns everything the engine deliberately does not: parameter
//! validation, track decoding, the per-deck play queues, and the periodic
//! tick that turns end-of-track signals into advance actions. It talks to
//! the audio thread exclusively through the command queue and reads state
//! back exclusively through the deck atomics, so nothing here can ever
//! stall a callback.
//!
//! UI layers (out of scope here) are expected to call these methods from
//! their event handlers and to call [`Session::tick`] at a modest fixed
//! cadence - twice a second is plenty - alongside their progress-display
//! refresh.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::audio::CommandSender;
use crate::engine::{DeckAtomics, EngineCommand, MAX_GAIN, MAX_SPEED, MIN_GAIN};
use crate::queue::{next_action, AdvanceDecision, TrackQueue};
use crate::track::{LoadError, TrackLoader};
use crate::types::{DeckId, PlayState, NUM_DECKS};

/// Errors surfaced by the control surface
#[derive(Error, Debug)]
pub enum ControlError {
    /// A parameter was outside its domain; the prior value is untouched
    #[error("invalid {name}: {value} (expected {expected})")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        expected: &'static str,
    },

    /// An explicit advance was requested with nothing queued
    #[error("play queue for {0} is empty")]
    EmptyQueue(DeckId),

    /// Opening or decoding the track failed; the deck keeps its prior state
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The engine command queue is full (the audio callback has stalled or
    /// the control side is flooding it)
    #[error("engine command queue is full")]
    Backlogged,
}

/// Control-domain handle for both decks
pub struct Session {
    commands: CommandSender,
    atomics: [Arc<DeckAtomics>; NUM_DECKS],
    loader: TrackLoader,
    queues: [TrackQueue; NUM_DECKS],
    /// Per-deck "play queue" toggle: whether a finished deck pulls the next
    /// queued track by itself
    autoplay: [bool; NUM_DECKS],
    /// Last crossfade value pushed to the engine
    crossfade: f32,
}

impl Session {
    /// Build a session from the pieces [`start_audio_system`] returns
    ///
    /// [`start_audio_system`]: crate::audio::start_audio_system
    pub fn new(commands: CommandSender, atomics: [Arc<DeckAtomics>; NUM_DECKS]) -> Self {
        Self {
            commands,
            atomics,
            loader: TrackLoader::new(),
            queues: [TrackQueue::new(), TrackQueue::new()],
            autoplay: [false; NUM_DECKS],
            crossfade: crate::engine::CROSSFADE_CENTER,
        }
    }

    fn send(&mut self, cmd: EngineCommand) -> Result<(), ControlError> {
        self.commands.send(cmd).map_err(|_| ControlError::Backlogged)
    }

    // --- Track loading ---

    /// Decode the file at `path` and swap it onto `deck`
    ///
    /// Decoding happens right here in the control domain; only the finished
    /// track crosses to the audio thread, as a single swap. On failure the
    /// deck's previous state is untouched.
    pub fn load(&mut self, deck: DeckId, path: &Path) -> Result<(), ControlError> {
        let track = self.loader.load(path)?;
        self.send(EngineCommand::LoadTrack {
            deck,
            track: Box::new(track),
        })
    }

    /// Unload `deck`, returning it to the empty state
    pub fn unload(&mut self, deck: DeckId) -> Result<(), ControlError> {
        self.send(EngineCommand::UnloadTrack { deck })
    }

    // --- Transport ---

    pub fn play(&mut self, deck: DeckId) -> Result<(), ControlError> {
        self.send(EngineCommand::Play { deck })
    }

    pub fn pause(&mut self, deck: DeckId) -> Result<(), ControlError> {
        self.send(EngineCommand::Pause { deck })
    }

    /// Halt playback; the playhead stays where it is
    pub fn stop(&mut self, deck: DeckId) -> Result<(), ControlError> {
        self.send(EngineCommand::Stop { deck })
    }

    pub fn toggle_play(&mut self, deck: DeckId) -> Result<(), ControlError> {
        self.send(EngineCommand::TogglePlay { deck })
    }

    /// Rewind to frame 0, preserving the play/pause state ("reset")
    pub fn rewind(&mut self, deck: DeckId) -> Result<(), ControlError> {
        self.send(EngineCommand::Seek { deck, frame: 0 })
    }

    /// Seek to an absolute source-frame position
    pub fn seek(&mut self, deck: DeckId, frame: u64) -> Result<(), ControlError> {
        self.send(EngineCommand::Seek { deck, frame })
    }

    /// Seek to a fraction of the track length
    pub fn seek_relative(&mut self, deck: DeckId, fraction: f64) -> Result<(), ControlError> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(ControlError::InvalidParameter {
                name: "position",
                value: fraction,
                expected: "0.0..=1.0",
            });
        }
        self.send(EngineCommand::SeekRelative { deck, fraction })
    }

    /// Nudge the playhead by a signed number of seconds
    pub fn skip(&mut self, deck: DeckId, seconds: f64) -> Result<(), ControlError> {
        self.send(EngineCommand::SkipSeconds { deck, seconds })
    }

    // --- Parameters ---

    /// Set deck gain; values outside [0, 1] are rejected and the prior
    /// gain is kept
    pub fn set_gain(&mut self, deck: DeckId, gain: f32) -> Result<(), ControlError> {
        if !(MIN_GAIN..=MAX_GAIN).contains(&gain) {
            return Err(ControlError::InvalidParameter {
                name: "gain",
                value: gain as f64,
                expected: "0.0..=1.0",
            });
        }
        self.send(EngineCommand::SetGain { deck, gain })
    }

    /// Set the playback speed ratio; values outside (0, 2] are rejected
    /// and the prior ratio is kept. Zero in particular is a degenerate
    /// ratio that would stall the transport.
    pub fn set_speed(&mut self, deck: DeckId, ratio: f32) -> Result<(), ControlError> {
        if !(ratio > 0.0 && ratio <= MAX_SPEED) {
            return Err(ControlError::InvalidParameter {
                name: "speed",
                value: ratio as f64,
                expected: "0.0 (exclusive)..=2.0",
            });
        }
        self.send(EngineCommand::SetSpeed { deck, ratio })
    }

    pub fn set_loop(&mut self, deck: DeckId, enabled: bool) -> Result<(), ControlError> {
        self.send(EngineCommand::SetLoop { deck, enabled })
    }

    /// Move the crossfader; values outside [0, 1] are rejected
    pub fn set_crossfade(&mut self, value: f32) -> Result<(), ControlError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(ControlError::InvalidParameter {
                name: "crossfade",
                value: value as f64,
                expected: "0.0..=1.0",
            });
        }
        self.send(EngineCommand::SetCrossfader { value })?;
        self.crossfade = value;
        Ok(())
    }

    /// Last crossfade value accepted by [`Session::set_crossfade`]
    pub fn crossfade(&self) -> f32 {
        self.crossfade
    }

    // --- Queue ---

    /// Append a track path to a deck's play queue
    pub fn enqueue(&mut self, deck: DeckId, path: impl Into<std::path::PathBuf>) {
        self.queues[deck.index()].push_back(path);
    }

    pub fn queue(&self, deck: DeckId) -> &TrackQueue {
        &self.queues[deck.index()]
    }

    pub fn queue_mut(&mut self, deck: DeckId) -> &mut TrackQueue {
        &mut self.queues[deck.index()]
    }

    /// Enable or disable automatic advance from the queue at end-of-track
    pub fn set_autoplay(&mut self, deck: DeckId, enabled: bool) {
        self.autoplay[deck.index()] = enabled;
    }

    pub fn autoplay(&self, deck: DeckId) -> bool {
        self.autoplay[deck.index()]
    }

    /// Pop the front of the queue and play it immediately
    ///
    /// Unlike the automatic advance this ignores the autoplay toggle; it
    /// errors when nothing is queued.
    pub fn play_next(&mut self, deck: DeckId) -> Result<(), ControlError> {
        let path = self.queues[deck.index()]
            .pop_front()
            .ok_or(ControlError::EmptyQueue(deck))?;
        self.load(deck, &path)?;
        self.play(deck)
    }

    // --- State reads (lock-free) ---

    pub fn play_state(&self, deck: DeckId) -> PlayState {
        self.atomics[deck.index()].play_state()
    }

    pub fn is_playing(&self, deck: DeckId) -> bool {
        self.atomics[deck.index()].is_playing()
    }

    /// Playhead position in source frames
    pub fn position(&self, deck: DeckId) -> u64 {
        self.atomics[deck.index()].position()
    }

    /// Track length in source frames
    pub fn length(&self, deck: DeckId) -> u64 {
        self.atomics[deck.index()].length()
    }

    /// Playhead position as a fraction of the track length, for progress
    /// display
    pub fn position_relative(&self, deck: DeckId) -> f64 {
        self.atomics[deck.index()].position_relative()
    }

    pub fn gain(&self, deck: DeckId) -> f32 {
        self.atomics[deck.index()].gain()
    }

    pub fn speed(&self, deck: DeckId) -> f32 {
        self.atomics[deck.index()].speed()
    }

    pub fn looping(&self, deck: DeckId) -> bool {
        self.atomics[deck.index()].looping()
    }

    // --- End-of-track handling ---

    /// The control-rate tick: consume end-of-track latches and apply the
    /// advance policy
    ///
    /// For each deck that finished since the last tick: loop flag set -
    /// rewind and replay; otherwise pop the queue when autoplay is on and
    /// something is queued; otherwise leave the deck halted at the end.
    /// A failed load of a queued track leaves the deck untouched and is
    /// reported after both decks have been handled.
    pub fn tick(&mut self) -> Result<(), ControlError> {
        let mut first_error = None;

        for deck in DeckId::ALL {
            if !self.atomics[deck.index()].take_track_ended() {
                continue;
            }

            let looping = self.atomics[deck.index()].looping();
            let autoplay = self.autoplay[deck.index()];
            let decision = next_action(looping, autoplay, &mut self.queues[deck.index()]);

            log::debug!("{} reached end of track: {:?}", deck, decision);

            let outcome = match decision {
                AdvanceDecision::Restart => self.rewind(deck).and_then(|_| self.play(deck)),
                AdvanceDecision::Advance(path) => self
                    .load(deck, &path)
                    .and_then(|_| self.play(deck)),
                // The deck already halted itself at the end, position
                // preserved; nothing to send
                AdvanceDecision::Hold => Ok(()),
            };

            if let Err(e) = outcome {
                log::warn!("advance failed on {}: {}", deck, e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::CommandSender;
    use crate::engine::{command_channel, AudioEngine, EngineCommand};
    use crate::track::LoadedTrack;
    use crate::types::{StereoBuffer, StereoSample};

    /// A session wired straight to an engine, no audio device involved.
    /// The pump closure stands in for the audio callback.
    fn harness() -> (Session, AudioEngine, rtrb::Consumer<EngineCommand>) {
        let engine = AudioEngine::new(48_000);
        let atomics = engine.deck_atomics();
        let (producer, consumer) = command_channel();
        let session = Session::new(CommandSender { producer }, atomics);
        (session, engine, consumer)
    }

    fn pump(engine: &mut AudioEngine, rx: &mut rtrb::Consumer<EngineCommand>, frames: usize) {
        let mut master = StereoBuffer::silence(frames);
        engine.process_commands(rx);
        engine.process(&mut master);
    }

    fn load_synthetic(engine: &mut AudioEngine, deck: DeckId, frames: usize) {
        let samples = vec![StereoSample::mono(1.0); frames];
        engine.deck_mut(deck).load_track(LoadedTrack::from_samples(
            "synthetic",
            48_000,
            2,
            StereoBuffer::from_vec(samples),
        ));
    }

    #[test]
    fn test_invalid_parameters_are_rejected() {
        let (mut session, _engine, _rx) = harness();

        assert!(matches!(
            session.set_gain(DeckId::A, 1.5),
            Err(ControlError::InvalidParameter { name: "gain", .. })
        ));
        assert!(matches!(
            session.set_gain(DeckId::A, -0.1),
            Err(ControlError::InvalidParameter { .. })
        ));
        assert!(matches!(
            session.set_speed(DeckId::A, 0.0),
            Err(ControlError::InvalidParameter { name: "speed", .. })
        ));
        assert!(matches!(
            session.set_speed(DeckId::A, 2.1),
            Err(ControlError::InvalidParameter { .. })
        ));
        assert!(matches!(
            session.set_crossfade(1.01),
            Err(ControlError::InvalidParameter { .. })
        ));
        assert!(matches!(
            session.seek_relative(DeckId::A, -0.5),
            Err(ControlError::InvalidParameter { .. })
        ));

        // Boundary values pass
        assert!(session.set_gain(DeckId::A, 0.0).is_ok());
        assert!(session.set_gain(DeckId::A, 1.0).is_ok());
        assert!(session.set_speed(DeckId::A, 2.0).is_ok());
    }

    #[test]
    fn test_rejected_speed_keeps_prior_ratio() {
        let (mut session, mut engine, mut rx) = harness();
        load_synthetic(&mut engine, DeckId::A, 1000);

        session.set_speed(DeckId::A, 1.5).unwrap();
        pump(&mut engine, &mut rx, 16);
        assert_eq!(engine.deck(DeckId::A).speed(), 1.5);

        assert!(session.set_speed(DeckId::A, 3.0).is_err());
        pump(&mut engine, &mut rx, 16);
        assert_eq!(engine.deck(DeckId::A).speed(), 1.5);
    }

    #[test]
    fn test_loop_restarts_same_track_on_tick() {
        let (mut session, mut engine, mut rx) = harness();
        load_synthetic(&mut engine, DeckId::A, 100);

        session.set_loop(DeckId::A, true).unwrap();
        session.play(DeckId::A).unwrap();
        pump(&mut engine, &mut rx, 256); // runs past the end, deck halts

        assert_eq!(session.play_state(DeckId::A), PlayState::Paused);
        assert_eq!(session.position(DeckId::A), 100);

        session.tick().unwrap();
        pump(&mut engine, &mut rx, 16);

        assert_eq!(session.play_state(DeckId::A), PlayState::Playing);
        assert_eq!(engine.deck(DeckId::A).frames(), 100); // same track
        assert!(session.position(DeckId::A) <= 16);
    }

    #[test]
    fn test_hold_when_queue_empty() {
        let (mut session, mut engine, mut rx) = harness();
        load_synthetic(&mut engine, DeckId::B, 50);

        session.set_autoplay(DeckId::B, true);
        session.play(DeckId::B).unwrap();
        pump(&mut engine, &mut rx, 128);

        session.tick().unwrap();
        pump(&mut engine, &mut rx, 16);

        // Nothing queued: deck stays halted at the end
        assert_eq!(session.play_state(DeckId::B), PlayState::Paused);
        assert_eq!(session.position(DeckId::B), 50);
    }

    #[test]
    fn test_hold_when_autoplay_disabled() {
        let (mut session, mut engine, mut rx) = harness();
        load_synthetic(&mut engine, DeckId::A, 50);
        session.enqueue(DeckId::A, "queued.wav");

        session.play(DeckId::A).unwrap();
        pump(&mut engine, &mut rx, 128);
        session.tick().unwrap();

        // Autoplay off: no advance, queue untouched
        assert_eq!(session.play_state(DeckId::A), PlayState::Paused);
        assert_eq!(session.queue(DeckId::A).len(), 1);
    }

    #[test]
    fn test_advance_loads_queued_track_and_empties_queue() {
        let (mut session, mut engine, mut rx) = harness();
        load_synthetic(&mut engine, DeckId::A, 50);

        // Queue a real decodable file
        let dir = tempfile::tempdir().unwrap();
        let next = dir.path().join("next.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 48_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&next, spec).unwrap();
        for _ in 0..300 {
            writer.write_sample(1000i16).unwrap();
            writer.write_sample(1000i16).unwrap();
        }
        writer.finalize().unwrap();

        session.enqueue(DeckId::A, &next);
        session.set_autoplay(DeckId::A, true);
        session.play(DeckId::A).unwrap();
        pump(&mut engine, &mut rx, 128); // finish the 50-frame track

        session.tick().unwrap();
        pump(&mut engine, &mut rx, 16);

        assert!(session.queue(DeckId::A).is_empty());
        assert_eq!(session.play_state(DeckId::A), PlayState::Playing);
        assert_eq!(session.length(DeckId::A), 300);
        assert_eq!(engine.deck(DeckId::A).track().unwrap().path(), next);
    }

    #[test]
    fn test_tick_without_end_is_a_noop() {
        let (mut session, mut engine, mut rx) = harness();
        load_synthetic(&mut engine, DeckId::A, 10_000);
        session.play(DeckId::A).unwrap();
        pump(&mut engine, &mut rx, 64);

        session.tick().unwrap();
        pump(&mut engine, &mut rx, 16);
        assert_eq!(session.play_state(DeckId::A), PlayState::Playing);
    }

    #[test]
    fn test_play_next_errors_on_empty_queue() {
        let (mut session, _engine, _rx) = harness();
        assert!(matches!(
            session.play_next(DeckId::A),
            Err(ControlError::EmptyQueue(DeckId::A))
        ));
    }

    #[test]
    fn test_failed_advance_leaves_deck_untouched() {
        let (mut session, mut engine, mut rx) = harness();
        load_synthetic(&mut engine, DeckId::A, 50);

        session.enqueue(DeckId::A, "/nonexistent/queued.wav");
        session.set_autoplay(DeckId::A, true);
        session.play(DeckId::A).unwrap();
        pump(&mut engine, &mut rx, 128);

        let result = session.tick();
        assert!(matches!(result, Err(ControlError::Load(_))));
        pump(&mut engine, &mut rx, 16);

        // The finished track is still loaded, halted at its end
        assert_eq!(session.play_state(DeckId::A), PlayState::Paused);
        assert_eq!(session.length(DeckId::A), 50);
    }
}

//! Deck - per-deck transport engine
//!
//! Each deck owns one (or no) loaded track plus its playback state: playhead
//! position, play/pause, gain, speed ratio and the loop flag. The transport
//! is an explicit tagged state machine (`Empty` vs `Loaded`) so every
//! operation is exhaustive over "no track" without null checks.
//!
//! The deck runs in the audio callback. Control-side observers (progress
//! display, queue ticks) read the [`DeckAtomics`] snapshot instead of
//! touching the deck itself.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crate::track::LoadedTrack;
use crate::types::{DeckId, PlayState, StereoBuffer, StereoSample};

/// Gain domain
pub const MIN_GAIN: f32 = 0.0;
pub const MAX_GAIN: f32 = 1.0;

/// Speed ratio domain. Exactly zero is rejected everywhere: a zero ratio
/// stalls the playhead and divides by zero in naive resamplers.
pub const MAX_SPEED: f32 = 2.0;

/// Default gain matches the volume fader's initial detent
pub const DEFAULT_GAIN: f32 = 0.5;
/// Default speed is unity (no resampling beyond the device-rate conversion)
pub const DEFAULT_SPEED: f32 = 1.0;

/// Lock-free playback state for control-domain reads
///
/// The audio thread stores into these atomics whenever the corresponding
/// state changes; the control domain polls them at its own cadence. All
/// accesses use `Ordering::Relaxed` - only visibility is needed, not
/// ordering against other memory.
pub struct DeckAtomics {
    /// Playhead position in source frames
    position: AtomicU64,
    /// Track length in source frames (0 when empty)
    length: AtomicU64,
    /// Encoded [`PlayState`]
    state: AtomicU8,
    /// Current gain (f32 bits)
    gain: AtomicU32,
    /// Current speed ratio (f32 bits)
    speed: AtomicU32,
    /// Loop flag
    looping: AtomicBool,
    /// Latched when the playhead reaches the end of the track during a
    /// block. Cleared by the control tick that consumes it.
    track_ended: AtomicBool,
}

impl DeckAtomics {
    pub fn new() -> Self {
        Self {
            position: AtomicU64::new(0),
            length: AtomicU64::new(0),
            state: AtomicU8::new(PlayState::Empty.as_u8()),
            gain: AtomicU32::new(DEFAULT_GAIN.to_bits()),
            speed: AtomicU32::new(DEFAULT_SPEED.to_bits()),
            looping: AtomicBool::new(false),
            track_ended: AtomicBool::new(false),
        }
    }

    /// Playhead position in source frames
    #[inline]
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    /// Track length in source frames
    #[inline]
    pub fn length(&self) -> u64 {
        self.length.load(Ordering::Relaxed)
    }

    /// Playhead position as a fraction of the track length
    pub fn position_relative(&self) -> f64 {
        let length = self.length();
        if length == 0 {
            return 0.0;
        }
        self.position() as f64 / length as f64
    }

    #[inline]
    pub fn play_state(&self) -> PlayState {
        PlayState::from_u8(self.state.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.play_state() == PlayState::Playing
    }

    #[inline]
    pub fn has_track(&self) -> bool {
        self.play_state() != PlayState::Empty
    }

    #[inline]
    pub fn gain(&self) -> f32 {
        f32::from_bits(self.gain.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        f32::from_bits(self.speed.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn looping(&self) -> bool {
        self.looping.load(Ordering::Relaxed)
    }

    /// Consume the end-of-track latch
    ///
    /// Returns true at most once per end-of-track event. Only the control
    /// tick calls this.
    pub fn take_track_ended(&self) -> bool {
        self.track_ended.swap(false, Ordering::Relaxed)
    }

    /// Peek at the latch without consuming it
    pub fn track_ended(&self) -> bool {
        self.track_ended.load(Ordering::Relaxed)
    }
}

impl Default for DeckAtomics {
    fn default() -> Self {
        Self::new()
    }
}

/// Transport state: either no track, or a track with a playhead
///
/// `position` is a fractional source-frame index so variable-speed advance
/// accumulates without rounding drift. Invariant: 0 <= position <= frames.
enum Transport {
    Empty,
    Loaded {
        track: LoadedTrack,
        position: f64,
        playing: bool,
    },
}

/// A single deck of the player
pub struct Deck {
    id: DeckId,
    transport: Transport,
    /// Linear gain applied to produced frames
    gain: f32,
    /// Playback speed ratio; 1.0 plays at the track's natural tempo
    speed: f32,
    /// Restart-at-end flag, read by the control-domain advance policy
    looping: bool,
    /// Output sample rate the device negotiated
    output_rate: u32,
    atomics: Arc<DeckAtomics>,
}

impl Deck {
    /// Create an empty deck rendering at the given output rate
    pub fn new(id: DeckId, output_rate: u32) -> Self {
        Self {
            id,
            transport: Transport::Empty,
            gain: DEFAULT_GAIN,
            speed: DEFAULT_SPEED,
            looping: false,
            output_rate,
            atomics: Arc::new(DeckAtomics::new()),
        }
    }

    pub fn id(&self) -> DeckId {
        self.id
    }

    /// Clone-able handle to the lock-free state snapshot
    pub fn atomics(&self) -> Arc<DeckAtomics> {
        Arc::clone(&self.atomics)
    }

    // --- Track management ---

    /// Load a track, replacing whatever was loaded before
    ///
    /// Unconditional last-load-wins: the previous track is dropped here (its
    /// audio is reclaimed off-thread) and the deck lands in `Paused` at
    /// frame 0. Gain, speed and loop flag are deck parameters and persist
    /// across loads, like the hardware faders they model.
    pub fn load_track(&mut self, track: LoadedTrack) {
        self.atomics.length.store(track.frames(), Ordering::Relaxed);
        self.transport = Transport::Loaded {
            track,
            position: 0.0,
            playing: false,
        };
        self.atomics.position.store(0, Ordering::Relaxed);
        self.atomics
            .state
            .store(PlayState::Paused.as_u8(), Ordering::Relaxed);
        self.atomics.track_ended.store(false, Ordering::Relaxed);
    }

    /// Drop the current track and return to `Empty`
    pub fn unload_track(&mut self) {
        self.transport = Transport::Empty;
        self.atomics.position.store(0, Ordering::Relaxed);
        self.atomics.length.store(0, Ordering::Relaxed);
        self.atomics
            .state
            .store(PlayState::Empty.as_u8(), Ordering::Relaxed);
        self.atomics.track_ended.store(false, Ordering::Relaxed);
    }

    pub fn has_track(&self) -> bool {
        matches!(self.transport, Transport::Loaded { .. })
    }

    pub fn track(&self) -> Option<&LoadedTrack> {
        match &self.transport {
            Transport::Loaded { track, .. } => Some(track),
            Transport::Empty => None,
        }
    }

    pub fn play_state(&self) -> PlayState {
        match &self.transport {
            Transport::Empty => PlayState::Empty,
            Transport::Loaded { playing: true, .. } => PlayState::Playing,
            Transport::Loaded { playing: false, .. } => PlayState::Paused,
        }
    }

    /// Playhead position in whole source frames
    pub fn position(&self) -> u64 {
        match &self.transport {
            Transport::Empty => 0,
            Transport::Loaded { position, .. } => *position as u64,
        }
    }

    /// Track length in source frames (0 when empty)
    pub fn frames(&self) -> u64 {
        self.track().map(|t| t.frames()).unwrap_or(0)
    }

    // --- Playback controls ---

    /// Start or resume playback; no-op on an empty deck
    pub fn play(&mut self) {
        if let Transport::Loaded { playing, .. } = &mut self.transport {
            *playing = true;
            self.atomics
                .state
                .store(PlayState::Playing.as_u8(), Ordering::Relaxed);
            self.atomics.track_ended.store(false, Ordering::Relaxed);
        }
    }

    /// Halt playback, keeping the playhead where it is
    pub fn pause(&mut self) {
        if let Transport::Loaded { playing, .. } = &mut self.transport {
            *playing = false;
            self.atomics
                .state
                .store(PlayState::Paused.as_u8(), Ordering::Relaxed);
        }
    }

    /// Alias of [`Deck::pause`]: stopping does not rewind. Only a seek
    /// moves the playhead back to 0.
    pub fn stop(&mut self) {
        self.pause();
    }

    /// Toggle between playing and paused
    pub fn toggle_play(&mut self) {
        match self.play_state() {
            PlayState::Playing => self.pause(),
            PlayState::Paused => self.play(),
            PlayState::Empty => {}
        }
    }

    // --- Seeking ---

    /// Jump to an absolute source-frame position, clamped to [0, length].
    /// Valid while paused or playing; the play state is untouched.
    pub fn seek_frame(&mut self, frame: u64) {
        if let Transport::Loaded { track, position, .. } = &mut self.transport {
            let clamped = frame.min(track.frames());
            *position = clamped as f64;
            self.atomics.position.store(clamped, Ordering::Relaxed);
            self.atomics.track_ended.store(false, Ordering::Relaxed);
        }
    }

    /// Jump to `fraction` of the track length; the fraction is clamped to
    /// [0, 1] (out-of-domain values are rejected before they reach the
    /// engine, this clamp is a backstop)
    pub fn seek_relative(&mut self, fraction: f64) {
        let frames = self.frames();
        let fraction = fraction.clamp(0.0, 1.0);
        self.seek_frame((fraction * frames as f64).round() as u64);
    }

    /// Nudge the playhead by a signed number of source seconds
    pub fn skip_seconds(&mut self, seconds: f64) {
        if let Transport::Loaded { track, position, .. } = &mut self.transport {
            let delta = seconds * track.sample_rate() as f64;
            let target = (*position + delta).clamp(0.0, track.frames() as f64);
            *position = target;
            self.atomics.position.store(target as u64, Ordering::Relaxed);
            self.atomics.track_ended.store(false, Ordering::Relaxed);
        }
    }

    // --- Parameters ---

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Set deck gain. Domain errors are rejected at the control surface;
    /// here the value is clamped as a final backstop.
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(MIN_GAIN, MAX_GAIN);
        self.atomics
            .gain
            .store(self.gain.to_bits(), Ordering::Relaxed);
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Set the playback speed ratio. Values outside (0, 2] leave the prior
    /// ratio unchanged; in particular a ratio of exactly 0 never reaches
    /// the playhead arithmetic.
    pub fn set_speed(&mut self, ratio: f32) {
        if !(ratio > 0.0 && ratio <= MAX_SPEED) {
            return;
        }
        self.speed = ratio;
        self.atomics
            .speed
            .store(self.speed.to_bits(), Ordering::Relaxed);
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn set_loop(&mut self, enabled: bool) {
        self.looping = enabled;
        self.atomics.looping.store(enabled, Ordering::Relaxed);
    }

    // --- Audio processing ---

    /// Fill `output` with the next block of gain-scaled, speed-resampled
    /// audio and advance the playhead. Returns the number of frames
    /// produced from the track; the remainder of the buffer, if any, is
    /// silence.
    ///
    /// The playhead advances by `speed * source_rate / output_rate` source
    /// frames per produced frame, with linear interpolation between
    /// adjacent source frames. Empty and paused decks produce a full
    /// buffer of silence so the mixer never special-cases them.
    ///
    /// When the playhead reaches the track length the deck halts itself,
    /// clamps the position, and latches the end-of-track flag. What happens
    /// next (restart, queue advance, stay stopped) is a control-rate
    /// decision made elsewhere.
    pub fn process(&mut self, output: &mut StereoBuffer) -> usize {
        let out_len = output.len();

        let Transport::Loaded { track, position, playing } = &mut self.transport else {
            output.fill_silence();
            return out_len;
        };

        if !*playing {
            output.fill_silence();
            return out_len;
        }

        let frames = track.frames();
        let end = frames as f64;
        let step = self.speed as f64 * track.sample_rate() as f64 / self.output_rate as f64;
        let gain = self.gain;
        let samples = track.samples();
        let out = output.as_mut_slice();

        let mut produced = 0;
        while produced < out_len && *position < end {
            let base = *position as usize;
            let frac = (*position - base as f64) as f32;
            let s0 = samples[base];
            let s1 = if base + 1 < frames as usize {
                samples[base + 1]
            } else {
                s0
            };
            out[produced] = lerp_sample(s0, s1, frac) * gain;
            *position += step;
            produced += 1;
        }

        // Pad the tail with silence on end-of-media
        for slot in &mut out[produced..] {
            *slot = StereoSample::silence();
        }

        if *position >= end {
            // Transient overshoot is resolved before this call returns:
            // clamp back inside [0, length] and halt
            *position = end;
            *playing = false;
            self.atomics
                .state
                .store(PlayState::Paused.as_u8(), Ordering::Relaxed);
            self.atomics.track_ended.store(true, Ordering::Relaxed);
        }

        self.atomics
            .position
            .store(*position as u64, Ordering::Relaxed);

        produced
    }
}

/// Linear interpolation between two adjacent source frames
#[inline]
fn lerp_sample(s0: StereoSample, s1: StereoSample, t: f32) -> StereoSample {
    StereoSample {
        left: s0.left + (s1.left - s0.left) * t,
        right: s0.right + (s1.right - s0.right) * t,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlayState;

    /// A track whose every frame holds a constant value, at the deck rate
    fn constant_track(frames: usize, value: f32) -> LoadedTrack {
        let samples = vec![StereoSample::mono(value); frames];
        LoadedTrack::from_samples("test", 48_000, 2, StereoBuffer::from_vec(samples))
    }

    fn deck_with_track(frames: usize) -> Deck {
        let mut deck = Deck::new(DeckId::A, 48_000);
        deck.load_track(constant_track(frames, 1.0));
        deck
    }

    #[test]
    fn test_empty_deck_produces_silence() {
        let mut deck = Deck::new(DeckId::A, 48_000);
        let mut out = StereoBuffer::from_vec(vec![StereoSample::mono(0.7); 64]);

        let produced = deck.process(&mut out);
        assert_eq!(produced, 64);
        assert_eq!(out.peak(), 0.0);
        assert_eq!(deck.play_state(), PlayState::Empty);
    }

    #[test]
    fn test_load_lands_paused_at_zero() {
        let deck = deck_with_track(1000);
        assert_eq!(deck.play_state(), PlayState::Paused);
        assert_eq!(deck.position(), 0);
        assert_eq!(deck.frames(), 1000);
        assert_eq!(deck.atomics().length(), 1000);
    }

    #[test]
    fn test_reload_replaces_without_residue() {
        let mut deck = deck_with_track(1000);
        deck.play();
        let mut out = StereoBuffer::silence(256);
        deck.process(&mut out);
        assert!(deck.position() > 0);

        deck.load_track(constant_track(500, 0.25));
        assert_eq!(deck.play_state(), PlayState::Paused);
        assert_eq!(deck.position(), 0);
        assert_eq!(deck.frames(), 500);
        assert!(!deck.atomics().track_ended());
    }

    #[test]
    fn test_play_pause_keeps_position() {
        let mut deck = deck_with_track(10_000);
        deck.play();
        let mut out = StereoBuffer::silence(512);
        deck.process(&mut out);
        let pos = deck.position();
        assert_eq!(pos, 512);

        deck.pause();
        assert_eq!(deck.play_state(), PlayState::Paused);
        assert_eq!(deck.position(), pos);

        // stop() is halt-in-place as well
        deck.play();
        deck.stop();
        assert_eq!(deck.position(), pos);
    }

    #[test]
    fn test_play_on_empty_is_noop() {
        let mut deck = Deck::new(DeckId::B, 48_000);
        deck.play();
        assert_eq!(deck.play_state(), PlayState::Empty);
    }

    #[test]
    fn test_gain_scales_output_linearly() {
        let mut deck = deck_with_track(10_000);
        deck.play();
        deck.set_gain(1.0);
        let mut reference = StereoBuffer::silence(64);
        deck.process(&mut reference);

        deck.seek_frame(0);
        deck.set_gain(0.25);
        let mut scaled = StereoBuffer::silence(64);
        deck.process(&mut scaled);

        for (r, s) in reference.iter().zip(scaled.iter()) {
            assert!((r.left * 0.25 - s.left).abs() < 1e-6);
            assert!((r.right * 0.25 - s.right).abs() < 1e-6);
        }
    }

    #[test]
    fn test_speed_changes_source_consumption() {
        let mut deck = deck_with_track(10_000);
        deck.play();
        deck.set_speed(0.5);
        let mut out = StereoBuffer::silence(600);
        deck.process(&mut out);
        // 600 produced frames at half speed consume ~300 source frames
        assert_eq!(deck.position(), 300);

        deck.seek_frame(0);
        deck.set_speed(2.0);
        deck.play();
        deck.process(&mut out);
        assert_eq!(deck.position(), 1200);
    }

    #[test]
    fn test_invalid_speed_is_rejected() {
        let mut deck = deck_with_track(100);
        deck.set_speed(1.5);
        deck.set_speed(0.0);
        assert_eq!(deck.speed(), 1.5);
        deck.set_speed(2.5);
        assert_eq!(deck.speed(), 1.5);
        deck.set_speed(-1.0);
        assert_eq!(deck.speed(), 1.5);
        deck.set_speed(2.0);
        assert_eq!(deck.speed(), 2.0);
    }

    #[test]
    fn test_seek_clamps_to_length() {
        let mut deck = deck_with_track(1000);
        deck.seek_frame(5000);
        assert_eq!(deck.position(), 1000);
        deck.seek_frame(250);
        assert_eq!(deck.position(), 250);
    }

    #[test]
    fn test_seek_relative_maps_fraction_to_frames() {
        let mut deck = deck_with_track(1000);
        deck.seek_relative(0.5);
        assert_eq!(deck.position(), 500);
        deck.seek_relative(2.0); // clamped backstop
        assert_eq!(deck.position(), 1000);
    }

    #[test]
    fn test_seek_zero_then_play_restarts_from_frame_zero() {
        let mut deck = deck_with_track(2000);
        deck.play();
        let mut out = StereoBuffer::silence(256);
        deck.process(&mut out);

        deck.seek_frame(0);
        deck.play();
        assert_eq!(deck.position(), 0);
        deck.process(&mut out);
        assert_eq!(deck.position(), 256);
    }

    #[test]
    fn test_skip_seconds_clamps_at_track_edges() {
        let mut deck = deck_with_track(96_000); // 2s at 48kHz
        deck.skip_seconds(-5.0);
        assert_eq!(deck.position(), 0);
        deck.skip_seconds(1.0);
        assert_eq!(deck.position(), 48_000);
        deck.skip_seconds(5.0);
        assert_eq!(deck.position(), 96_000);
    }

    #[test]
    fn test_end_of_track_latches_and_halts() {
        let mut deck = deck_with_track(100);
        deck.play();
        let mut out = StereoBuffer::silence(256);

        let produced = deck.process(&mut out);
        assert_eq!(produced, 100);
        // Tail past end-of-media is silence
        assert_eq!(out[100], StereoSample::silence());
        assert_eq!(deck.play_state(), PlayState::Paused);
        assert_eq!(deck.position(), 100);
        assert!(deck.atomics().track_ended());

        // The latch is consumed exactly once
        assert!(deck.atomics().take_track_ended());
        assert!(!deck.atomics().take_track_ended());
    }

    #[test]
    fn test_rate_mismatch_resamples() {
        // 22.05kHz track on a 44.1kHz output: half a source frame per
        // output frame at unity speed
        let samples = vec![StereoSample::mono(0.5); 1000];
        let track =
            LoadedTrack::from_samples("test", 22_050, 2, StereoBuffer::from_vec(samples));
        let mut deck = Deck::new(DeckId::B, 44_100);
        deck.load_track(track);
        deck.play();

        let mut out = StereoBuffer::silence(400);
        deck.process(&mut out);
        assert_eq!(deck.position(), 200);
    }

    #[test]
    fn test_parameters_survive_reload() {
        let mut deck = deck_with_track(100);
        deck.set_gain(0.8);
        deck.set_speed(1.25);
        deck.set_loop(true);

        deck.load_track(constant_track(200, 0.1));
        assert_eq!(deck.gain(), 0.8);
        assert_eq!(deck.speed(), 1.25);
        assert!(deck.looping());
    }
}

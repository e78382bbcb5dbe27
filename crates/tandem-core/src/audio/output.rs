//! CPAL output stream hosting the engine
//!
//! One output stream; its data callback is the real-time domain. The
//! callback drains the command queue, renders the engine into a
//! pre-allocated master buffer, and interleaves the frames into the
//! device buffer. No allocation, no locks, no blocking I/O on this path.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use crate::engine::{command_channel, AudioEngine, DeckAtomics, EngineCommand, MAX_BUFFER_SIZE};
use crate::types::{StereoBuffer, NUM_DECKS};

use super::config::AudioConfig;
use super::error::{AudioError, AudioResult};
use super::CommandSender;

/// Handle keeping the audio stream alive; drop it to stop audio
pub struct AudioHandle {
    _stream: Stream,
    sample_rate: u32,
    buffer_size: u32,
}

impl AudioHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// One-way output latency estimate in milliseconds
    pub fn latency_ms(&self) -> f32 {
        self.buffer_size as f32 / self.sample_rate as f32 * 1000.0
    }
}

/// Everything the control domain needs after startup
pub struct AudioSystemResult {
    /// Keeps audio alive; drop to stop
    pub handle: AudioHandle,
    /// Lock-free command channel into the engine
    pub command_sender: CommandSender,
    /// Deck state snapshots for lock-free reads, in [A, B] order
    pub deck_atomics: [std::sync::Arc<DeckAtomics>; NUM_DECKS],
    /// Negotiated sample rate
    pub sample_rate: u32,
    /// Negotiated block size in frames
    pub buffer_size: u32,
    /// One-way output latency estimate in milliseconds
    pub latency_ms: f32,
}

/// Callback-owned state: the engine plus its pre-allocated render buffer
struct CallbackState {
    engine: AudioEngine,
    command_rx: rtrb::Consumer<EngineCommand>,
    master: StereoBuffer,
}

impl CallbackState {
    fn render(&mut self, frames: usize) {
        self.master.set_len_from_capacity(frames);
        self.engine.process_commands(&mut self.command_rx);
        self.engine.process(&mut self.master);
    }
}

/// Start the audio system
///
/// Picks the configured (or default) output device, negotiates an f32
/// stereo stream as close to the requested rate as the device allows,
/// builds the engine at that rate, and starts the stream.
pub fn start_audio_system(config: &AudioConfig) -> AudioResult<AudioSystemResult> {
    let host = cpal::default_host();

    let device = match &config.device {
        Some(name) => host
            .output_devices()
            .map_err(|e| AudioError::ConfigError(e.to_string()))?
            .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
            .ok_or_else(|| AudioError::DeviceNotFound(name.clone()))?,
        None => host.default_output_device().ok_or(AudioError::NoDevices)?,
    };

    log::info!(
        "using audio device: {}",
        device.name().unwrap_or_else(|_| "<unnamed>".to_string())
    );

    let (stream_config, buffer_size) = negotiate_output_config(&device, config)?;
    let sample_rate = stream_config.sample_rate.0;
    let channels = stream_config.channels as usize;

    let engine = AudioEngine::new(sample_rate);
    let deck_atomics = engine.deck_atomics();
    let (command_tx, command_rx) = command_channel();

    let mut state = CallbackState {
        engine,
        command_rx,
        master: StereoBuffer::silence(MAX_BUFFER_SIZE),
    };

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels;
                state.render(frames);

                let samples = state.master.as_slice();
                for (i, frame) in data.chunks_mut(channels).enumerate() {
                    if let Some(sample) = samples.get(i) {
                        frame[0] = sample.left;
                        if channels > 1 {
                            frame[1] = sample.right;
                        }
                        for extra in frame.iter_mut().skip(2) {
                            *extra = 0.0;
                        }
                    } else {
                        for ch in frame.iter_mut() {
                            *ch = 0.0;
                        }
                    }
                }
            },
            move |err| {
                log::error!("audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    let latency_ms = buffer_size as f32 / sample_rate as f32 * 1000.0;
    log::info!(
        "audio stream started: {}Hz, {} frames/block (~{:.1}ms)",
        sample_rate,
        buffer_size,
        latency_ms
    );

    Ok(AudioSystemResult {
        handle: AudioHandle {
            _stream: stream,
            sample_rate,
            buffer_size,
        },
        command_sender: CommandSender { producer: command_tx },
        deck_atomics,
        sample_rate,
        buffer_size,
        latency_ms,
    })
}

/// Pick the best output configuration the device offers
///
/// Preference order: f32 sample format, at least stereo, requested sample
/// rate within the supported range. Falls back to the closest supported
/// rate rather than failing.
fn negotiate_output_config(
    device: &cpal::Device,
    config: &AudioConfig,
) -> AudioResult<(StreamConfig, u32)> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    if supported.is_empty() {
        return Err(AudioError::ConfigError(
            "no supported output configurations".to_string(),
        ));
    }

    let target_rate = config.target_sample_rate();

    let best = supported
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .filter(|c| c.channels() >= 2)
        .find(|c| target_rate >= c.min_sample_rate().0 && target_rate <= c.max_sample_rate().0)
        .or_else(|| {
            supported
                .iter()
                .find(|c| c.sample_format() == SampleFormat::F32 && c.channels() >= 2)
        })
        .or_else(|| supported.first())
        .ok_or_else(|| AudioError::ConfigError("no usable output configuration".to_string()))?;

    let rate = if target_rate >= best.min_sample_rate().0 && target_rate <= best.max_sample_rate().0
    {
        cpal::SampleRate(target_rate)
    } else {
        let fallback = best.max_sample_rate();
        log::warn!(
            "device does not support {}Hz, falling back to {}Hz",
            target_rate,
            fallback.0
        );
        fallback
    };

    let buffer_size = config.buffer_size.frames();

    let stream_config = StreamConfig {
        channels: best.channels(),
        sample_rate: rate,
        buffer_size: cpal::BufferSize::Fixed(buffer_size),
    };

    Ok((stream_config, buffer_size))
}

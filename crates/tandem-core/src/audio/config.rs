//! Audio device configuration

use serde::{Deserialize, Serialize};

use crate::types::DEFAULT_SAMPLE_RATE;

/// Default block size in frames when the device lets us choose.
/// 512 frames at 48kHz is ~10.7ms - comfortable for mixing without
/// noticeable control latency.
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Smallest block size we will request from a device
pub const MIN_BUFFER_SIZE: u32 = 64;

/// Requested block size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BufferSize {
    /// Let the backend pick [`DEFAULT_BUFFER_SIZE`]
    #[default]
    Default,
    /// Request a fixed number of frames (clamped to a sane range)
    Fixed(u32),
}

impl BufferSize {
    /// Resolve to a concrete frame count
    pub fn frames(self) -> u32 {
        match self {
            BufferSize::Default => DEFAULT_BUFFER_SIZE,
            BufferSize::Fixed(frames) => {
                frames.clamp(MIN_BUFFER_SIZE, crate::engine::MAX_BUFFER_SIZE as u32)
            }
        }
    }
}

/// Audio system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device name; `None` selects the system default
    pub device: Option<String>,
    /// Requested sample rate; `None` asks for [`DEFAULT_SAMPLE_RATE`] and
    /// falls back to whatever the device supports
    pub sample_rate: Option<u32>,
    /// Requested block size
    pub buffer_size: BufferSize,
}

impl AudioConfig {
    /// The sample rate to aim for during device negotiation
    pub fn target_sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }
}

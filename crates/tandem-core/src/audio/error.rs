//! Audio backend error types

use thiserror::Error;

/// Errors raised while bringing up or running the audio device
#[derive(Error, Debug)]
pub enum AudioError {
    /// No output device is available
    #[error("no audio output devices found")]
    NoDevices,

    /// A device was requested by name but does not exist
    #[error("audio device not found: {0}")]
    DeviceNotFound(String),

    /// Device enumeration or configuration query failed
    #[error("failed to get device config: {0}")]
    ConfigError(String),

    /// The stream could not be built
    #[error("failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// The stream refused to start
    #[error("failed to start audio stream: {0}")]
    StreamPlayError(String),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;

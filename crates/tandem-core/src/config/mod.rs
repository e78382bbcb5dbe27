//! Application configuration
//!
//! One YAML file covering the audio backend and the library location.
//! Loading never fails hard: a missing or broken file means defaults.

mod io;
mod paths;

pub use io::{load_config, save_config};
pub use paths::{default_config_path, default_data_path, default_library_path};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::audio::AudioConfig;

/// Top-level app configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Audio device selection and stream parameters
    pub audio: AudioConfig,
    /// Location of the flat-text track library
    pub library_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            library_path: default_library_path(),
        }
    }
}

//! Generic YAML configuration I/O

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Load a configuration value from a YAML file
///
/// Missing or unparsable files fall back to `T::default()` - a broken
/// config file should never keep the app from starting.
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("no config at {:?}, using defaults", path);
        return T::default();
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            log::warn!("could not read config {:?}: {}, using defaults", path, e);
            return T::default();
        }
    };

    match serde_yaml::from_str(&contents) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("could not parse config {:?}: {}, using defaults", path, e);
            T::default()
        }
    }
}

/// Save a configuration value to a YAML file, creating parent directories
/// as needed
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("failed to serialize config")?;
    std::fs::write(path, yaml).with_context(|| format!("failed to write config {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn test_missing_file_yields_default() {
        let config: Sample = load_config(Path::new("/nonexistent/config.yaml"));
        assert_eq!(config, Sample::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let config = Sample {
            name: "deck".to_string(),
            count: 2,
        };
        save_config(&config, &path).unwrap();

        let loaded: Sample = load_config(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_garbage_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, ": not [ yaml").unwrap();

        let config: Sample = load_config(&path);
        assert_eq!(config, Sample::default());
    }
}

//! Standard on-disk locations

use std::path::PathBuf;

/// Root directory for tandem data
///
/// Returns `~/Music/tandem`; falls back to the working directory when no
/// home directory can be resolved.
pub fn default_data_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Music")
        .join("tandem")
}

/// Default location of the app config file
pub fn default_config_path() -> PathBuf {
    default_data_path().join("config.yaml")
}

/// Default location of the flat-text track library
pub fn default_library_path() -> PathBuf {
    default_data_path().join("library.txt")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_hang_off_the_data_root() {
        let root = default_data_path();
        assert!(root.ends_with("tandem"));
        assert!(default_config_path().starts_with(&root));
        assert!(default_library_path().ends_with("library.txt"));
    }
}

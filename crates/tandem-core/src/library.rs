//! Track library persistence
//!
//! The library on disk is deliberately plain: a text file with one
//! absolute track path per line, newline-terminated, no escaping. It is
//! read once at startup and written once at shutdown; everything the
//! engine ever does with it is "load this path" one line at a time.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// The in-memory track list backing the library file
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Library {
    tracks: Vec<PathBuf>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the library file
    ///
    /// A missing file is an empty library, not an error - first launch has
    /// nothing saved yet. Blank lines are skipped; entries whose file no
    /// longer exists are kept (the drive may just be unmounted) but logged.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("no library file at {:?}, starting empty", path);
            return Ok(Self::new());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read library file {:?}", path))?;

        let tracks: Vec<PathBuf> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect();

        for track in &tracks {
            if !track.exists() {
                log::warn!("library entry missing on disk: {:?}", track);
            }
        }

        log::info!("loaded {} library entries from {:?}", tracks.len(), path);
        Ok(Self { tracks })
    }

    /// Write the library file, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create library directory {:?}", parent))?;
        }

        let mut contents = String::new();
        for track in &self.tracks {
            contents.push_str(&track.to_string_lossy());
            contents.push('\n');
        }

        std::fs::write(path, contents)
            .with_context(|| format!("failed to write library file {:?}", path))
    }

    /// Append a track; duplicates are ignored
    pub fn add(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.tracks.contains(&path) {
            self.tracks.push(path);
        }
    }

    /// Remove a track if present; returns whether it was there
    pub fn remove(&mut self, path: &Path) -> bool {
        let before = self.tracks.len();
        self.tracks.retain(|t| t != path);
        self.tracks.len() != before
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.tracks.iter().any(|t| t == path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.tracks.iter()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty_library() {
        let library = Library::load(Path::new("/nonexistent/library.txt")).unwrap();
        assert!(library.is_empty());
    }

    #[test]
    fn test_round_trip_one_path_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("library.txt");

        let mut library = Library::new();
        library.add("/music/a.flac");
        library.add("/music/b with spaces.mp3");
        library.save(&file).unwrap();

        // Plain newline-terminated lines, no escaping
        let raw = std::fs::read_to_string(&file).unwrap();
        assert_eq!(raw, "/music/a.flac\n/music/b with spaces.mp3\n");

        let loaded = Library::load(&file).unwrap();
        assert_eq!(loaded, library);
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("library.txt");
        std::fs::write(&file, "/music/a.flac\n\n  \n/music/b.mp3\n").unwrap();

        let library = Library::load(&file).unwrap();
        assert_eq!(library.len(), 2);
    }

    #[test]
    fn test_add_deduplicates_and_remove_reports() {
        let mut library = Library::new();
        library.add("/music/a.flac");
        library.add("/music/a.flac");
        assert_eq!(library.len(), 1);

        assert!(library.remove(Path::new("/music/a.flac")));
        assert!(!library.remove(Path::new("/music/a.flac")));
        assert!(library.is_empty());
    }
}

//! Track loading and decoding
//!
//! Opens an audio file, attaches a decoder, and decodes the whole stream
//! into memory in one pass. All of this happens in the control domain; the
//! real-time side only ever sees a finished [`LoadedTrack`] arriving through
//! the command queue.
//!
//! Decoded audio is held behind a [`basedrop::Shared`] pointer so that a
//! superseded track can be dropped on the audio thread without the audio
//! thread paying for the deallocation (see [`crate::engine::gc`]).

use std::fs::File;
use std::path::{Path, PathBuf};

use basedrop::Shared;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use crate::engine::gc::gc_handle;
use crate::types::{StereoBuffer, StereoSample};

/// Errors raised while opening and decoding a track
#[derive(Error, Debug)]
pub enum LoadError {
    /// The path does not resolve to a readable stream
    #[error("cannot open {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No decoder recognizes the stream
    #[error("no decoder recognizes {path}: {reason}")]
    UnsupportedFormat { path: PathBuf, reason: String },

    /// A decoder was attached but the stream broke down mid-decode
    #[error("decoding {path} failed: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

/// An opened, decodable audio resource
///
/// Immutable once created. A deck holds at most one of these at a time and
/// replaces it wholesale on load; there is no partial-transition state.
pub struct LoadedTrack {
    path: PathBuf,
    sample_rate: u32,
    source_channels: u16,
    samples: Shared<StereoBuffer>,
}

impl LoadedTrack {
    /// Wrap already-decoded stereo audio as a track
    ///
    /// Used by the loader after decoding, and by tests that synthesize audio
    /// instead of reading files.
    pub fn from_samples(
        path: impl Into<PathBuf>,
        sample_rate: u32,
        source_channels: u16,
        samples: StereoBuffer,
    ) -> Self {
        Self {
            path: path.into(),
            sample_rate,
            source_channels,
            samples: Shared::new(&gc_handle(), samples),
        }
    }

    /// Source path this track was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sample rate of the decoded audio in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count of the source stream (before the stereo fold-down)
    pub fn source_channels(&self) -> u16 {
        self.source_channels
    }

    /// Total length in sample frames
    pub fn frames(&self) -> u64 {
        self.samples.len() as u64
    }

    /// Track length in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Decoded stereo audio
    pub fn samples(&self) -> &StereoBuffer {
        &self.samples
    }
}

impl std::fmt::Debug for LoadedTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedTrack")
            .field("path", &self.path)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frames())
            .finish()
    }
}

/// Opens tracks by path and attaches the matching decoder
///
/// The loader is stateless; one instance serves both decks.
#[derive(Debug, Default)]
pub struct TrackLoader;

impl TrackLoader {
    pub fn new() -> Self {
        Self
    }

    /// Open the resource at `path`, pick a decoder by header sniffing, and
    /// decode the full stream to stereo f32.
    ///
    /// Mono sources are duplicated into both channels; sources with more
    /// than two channels keep the first stereo pair. A failed load has no
    /// side effects beyond the transient file handle.
    pub fn load(&self, path: &Path) -> Result<LoadedTrack, LoadError> {
        let file = File::open(path).map_err(|e| LoadError::Unreadable {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Extension is only a hint; the probe sniffs the actual header
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| LoadError::UnsupportedFormat {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| LoadError::UnsupportedFormat {
                path: path.to_path_buf(),
                reason: "no audio track found".to_string(),
            })?;

        let track_id = track.id;

        let sample_rate =
            track
                .codec_params
                .sample_rate
                .ok_or_else(|| LoadError::UnsupportedFormat {
                    path: path.to_path_buf(),
                    reason: "unknown sample rate".to_string(),
                })?;

        let source_channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(2);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| LoadError::UnsupportedFormat {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let mut frames: Vec<StereoSample> = match track.codec_params.n_frames {
            Some(n) => Vec::with_capacity(n as usize),
            None => Vec::new(),
        };
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    return Err(LoadError::Malformed {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    });
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                // A corrupt packet is recoverable; the decoder resyncs on the next one
                Err(SymphoniaError::DecodeError(e)) => {
                    log::warn!("skipping corrupt packet in {:?}: {}", path, e);
                    continue;
                }
                Err(e) => {
                    return Err(LoadError::Malformed {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    });
                }
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count();

            if sample_buf.is_none() {
                sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }

            let buf = sample_buf.as_mut().expect("sample buffer initialized above");
            buf.copy_interleaved_ref(decoded);

            match channels {
                0 => continue,
                1 => frames.extend(buf.samples().iter().map(|&s| StereoSample::mono(s))),
                _ => frames.extend(
                    buf.samples()
                        .chunks_exact(channels)
                        .map(|frame| StereoSample::new(frame[0], frame[1])),
                ),
            }
        }

        log::info!(
            "loaded {:?}: {} frames @ {}Hz, {} source channel(s)",
            path,
            frames.len(),
            sample_rate,
            source_channels
        );

        Ok(LoadedTrack::from_samples(
            path,
            sample_rate,
            source_channels,
            StereoBuffer::from_vec(frames),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, sample_rate: u32, channels: u16, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            let value = if i % 2 == 0 { 8192i16 } else { -8192i16 };
            for _ in 0..channels {
                writer.write_sample(value).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_load_stereo_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 44_100, 2, 1024);

        let track = TrackLoader::new().load(&path).unwrap();
        assert_eq!(track.sample_rate(), 44_100);
        assert_eq!(track.source_channels(), 2);
        assert_eq!(track.frames(), 1024);
        assert!(track.samples().peak() > 0.1);
    }

    #[test]
    fn test_load_mono_upmixes_to_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, 48_000, 1, 256);

        let track = TrackLoader::new().load(&path).unwrap();
        assert_eq!(track.frames(), 256);
        let first = track.samples()[0];
        assert_eq!(first.left, first.right);
    }

    #[test]
    fn test_load_missing_file_is_unreadable() {
        let err = TrackLoader::new()
            .load(Path::new("/nonexistent/track.wav"))
            .unwrap_err();
        assert!(matches!(err, LoadError::Unreadable { .. }));
    }

    #[test]
    fn test_load_garbage_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.bin");
        std::fs::write(&path, b"this is not audio data at all").unwrap();

        let err = TrackLoader::new().load(&path).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_duration_follows_sample_rate() {
        let track = LoadedTrack::from_samples(
            "synthetic",
            1000,
            2,
            StereoBuffer::silence(2500),
        );
        assert!((track.duration_seconds() - 2.5).abs() < f64::EPSILON);
    }
}

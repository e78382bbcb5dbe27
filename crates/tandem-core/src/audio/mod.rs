//! Audio backend - the device-facing edge of the engine
//!
//! [`start_audio_system`] builds a CPAL output stream whose callback owns
//! the [`AudioEngine`](crate::engine::AudioEngine) exclusively. The caller
//! gets back the pieces the control domain needs: the command sender, the
//! deck atomics, and the negotiated stream parameters.
//!
//! ```ignore
//! let system = audio::start_audio_system(&AudioConfig::default())?;
//! let mut session = Session::new(system.command_sender, system.deck_atomics);
//! session.load(DeckId::A, Path::new("/music/track.flac"))?;
//! session.play(DeckId::A)?;
//! ```

mod config;
mod error;
mod output;

pub use config::{AudioConfig, BufferSize, DEFAULT_BUFFER_SIZE};
pub use error::{AudioError, AudioResult};
pub use output::{start_audio_system, AudioHandle, AudioSystemResult};

use crate::engine::EngineCommand;

/// Command sender for the control domain
///
/// Wraps the lock-free producer feeding the audio thread. Pushing is
/// wait-free; a full queue returns the command to the caller instead of
/// blocking.
pub struct CommandSender {
    pub(crate) producer: rtrb::Producer<EngineCommand>,
}

impl CommandSender {
    /// Send a command to the engine
    ///
    /// `Err(cmd)` hands the command back when the queue is full (the audio
    /// thread drains it every callback, so this only happens when the
    /// callback has stalled or the control side is flooding).
    pub fn send(&mut self, cmd: EngineCommand) -> Result<(), EngineCommand> {
        self.producer.push(cmd).map_err(|e| match e {
            rtrb::PushError::Full(value) => value,
        })
    }

    /// Whether the queue currently has room
    pub fn has_space(&self) -> bool {
        self.producer.slots() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::command_channel;
    use crate::types::DeckId;

    #[test]
    fn test_sender_reports_full_queue() {
        let (producer, _consumer) = command_channel();
        let mut sender = CommandSender { producer };

        let mut pushed = 0usize;
        loop {
            match sender.send(EngineCommand::Play { deck: DeckId::A }) {
                Ok(()) => pushed += 1,
                Err(EngineCommand::Play { deck: DeckId::A }) => break,
                Err(_) => panic!("a different command came back"),
            }
        }
        assert_eq!(pushed, crate::engine::COMMAND_QUEUE_CAPACITY);
        assert!(!sender.has_space());
    }
}

//! RT-safe deferred deallocation for track audio
//!
//! Loading a track onto a deck replaces the previous [`LoadedTrack`]
//! wholesale, and the replacement happens on the audio thread when the
//! swap command is applied. Decoded audio for a full-length track is tens
//! to hundreds of megabytes; freeing that inside the audio callback would
//! stall it well past the buffer deadline.
//!
//! Track audio therefore lives behind `basedrop::Shared<T>`. Dropping the
//! last reference on the audio thread only enqueues a pointer; the actual
//! deallocation happens on the collector thread below, where latency does
//! not matter.
//!
//! [`LoadedTrack`]: crate::track::LoadedTrack

use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use basedrop::{Collector, Handle};

/// Interval between collection sweeps. Reclamation only needs to keep up
/// with track loads, so a coarse cadence is plenty.
const COLLECT_INTERVAL: Duration = Duration::from_millis(250);

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

fn spawn_collector() -> Handle {
    let (tx, rx) = mpsc::channel();

    // The Collector is !Sync and must live on the thread that sweeps it
    thread::Builder::new()
        .name("tandem-gc".to_string())
        .spawn(move || {
            let mut collector = Collector::new();
            tx.send(collector.handle())
                .expect("collector handle receiver dropped");

            log::info!("track audio collector thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        })
        .expect("failed to spawn collector thread");

    rx.recv().expect("collector thread died before sending handle")
}

/// Handle for allocating `Shared<T>` values
///
/// Lazily starts the collector thread on first use; the handle itself is
/// cheap to clone.
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(spawn_collector).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::Shared;

    #[test]
    fn test_shared_allocation_and_drop() {
        let value = Shared::new(&gc_handle(), vec![0u8; 1024]);
        let clone = Shared::clone(&value);
        assert_eq!(clone.len(), 1024);
        drop(value);
        drop(clone); // queued for the collector thread, must not panic
    }
}

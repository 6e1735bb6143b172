//! Presence source producer
//!
//! A dedicated thread owns the driver, polls it, runs the debouncer and
//! pushes events into a bounded queue. A full queue blocks the producer
//! before its next poll. The stop flag is checked once per cycle; on stop
//! the current poll completes, the queue is closed and the driver is
//! closed exactly once.

use super::{format_target, transition, DebounceState, Observation, PresenceEvent, RawRead, TagReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Handle to a running presence source
pub struct PresenceSource {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PresenceSource {
    /// Start polling `reader` every `poll_interval`
    ///
    /// Returns the handle and the consumer end of the delivery queue. Each
    /// call starts from a fresh `NoTag` state.
    pub fn spawn<R: TagReader>(
        reader: R,
        poll_interval: Duration,
        queue_capacity: usize,
    ) -> std::io::Result<(Self, mpsc::Receiver<PresenceEvent>)> {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("presence-source".to_string())
            .spawn(move || run_loop(reader, poll_interval, tx, stop_flag))?;

        Ok((
            Self {
                stop,
                thread: Some(thread),
            },
            rx,
        ))
    }

    /// Ask the producer to stop after its current poll
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Stop and wait for the producer thread to finish
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            let joined = tokio::task::spawn_blocking(move || thread.join()).await;
            if !matches!(joined, Ok(Ok(()))) {
                warn!("Presence source thread did not exit cleanly");
            }
        }
    }
}

impl Drop for PresenceSource {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

fn observe(read: crate::Result<RawRead>) -> Observation {
    match read {
        Ok(RawRead::NoTarget) => Observation::NoTag,
        Ok(RawRead::Target(target)) => match format_target(&target) {
            Some(id) => Observation::Tag(id),
            None => Observation::Failed(format!("unsupported target: {:?}", target)),
        },
        Err(e) => Observation::Failed(e.to_string()),
    }
}

fn run_loop<R: TagReader>(
    mut reader: R,
    poll_interval: Duration,
    tx: mpsc::Sender<PresenceEvent>,
    stop: Arc<AtomicBool>,
) {
    info!(interval_ms = poll_interval.as_millis() as u64, "Presence source started");
    let mut state = DebounceState::NoTag;

    while !stop.load(Ordering::SeqCst) {
        let observation = observe(reader.read());
        let (next, event) = transition(&state, observation);

        if let Some(event) = event {
            match &event {
                PresenceEvent::Present { tag_id } => {
                    info!(tag_id = %tag_id, "Token placed on reader");
                }
                PresenceEvent::Absent { tag_id } => {
                    info!(tag_id = %tag_id, "Token removed from reader");
                }
                PresenceEvent::Error { message } => {
                    warn!(error = %message, "Token reader read failed");
                }
            }
            if tx.blocking_send(event).is_err() {
                debug!("Presence consumer gone, stopping");
                break;
            }
        }
        state = next;

        std::thread::sleep(poll_interval);
    }

    drop(tx);
    reader.close();
    info!("Presence source stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::RawTarget;
    use crate::Error;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// Replays a script of reads, then reports no target forever
    struct ScriptedReader {
        script: Arc<Mutex<VecDeque<crate::Result<RawRead>>>>,
        closes: Arc<AtomicUsize>,
    }

    impl TagReader for ScriptedReader {
        fn read(&mut self) -> crate::Result<RawRead> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(RawRead::NoTarget))
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn uid(bytes: &[u8]) -> crate::Result<RawRead> {
        Ok(RawRead::Target(RawTarget::Iso14443a { uid: bytes.to_vec() }))
    }

    #[tokio::test]
    async fn test_source_emits_deduplicated_edges() {
        let script = VecDeque::from(vec![
            Ok(RawRead::NoTarget),
            uid(&[0xab, 0xcd]),
            uid(&[0xab, 0xcd]),
            Err(Error::HardwareRead("glitch".to_string())),
            uid(&[0xab, 0xcd]),
            Ok(RawRead::NoTarget),
            Ok(RawRead::Target(RawTarget::Unknown {
                description: "felica".to_string(),
            })),
        ]);
        let closes = Arc::new(AtomicUsize::new(0));
        let reader = ScriptedReader {
            script: Arc::new(Mutex::new(script)),
            closes: Arc::clone(&closes),
        };

        let (source, mut rx) = PresenceSource::spawn(reader, Duration::from_millis(1), 4).unwrap();

        let mut events = Vec::new();
        for _ in 0..4 {
            events.push(rx.recv().await.unwrap());
        }
        source.shutdown().await;

        assert_eq!(
            events[0],
            PresenceEvent::Present { tag_id: "0xabcd".to_string() }
        );
        assert!(matches!(events[1], PresenceEvent::Error { .. }));
        assert_eq!(
            events[2],
            PresenceEvent::Absent { tag_id: "0xabcd".to_string() }
        );
        assert!(matches!(events[3], PresenceEvent::Error { .. }));

        // Queue is closed once the producer exits
        assert!(rx.recv().await.is_none());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropping_consumer_stops_producer() {
        let closes = Arc::new(AtomicUsize::new(0));
        let script = VecDeque::from(vec![uid(&[1]), Ok(RawRead::NoTarget), uid(&[2])]);
        let reader = ScriptedReader {
            script: Arc::new(Mutex::new(script)),
            closes: Arc::clone(&closes),
        };

        let (source, rx) = PresenceSource::spawn(reader, Duration::from_millis(1), 1).unwrap();
        drop(rx);
        source.shutdown().await;

        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    /// Alternates token and no token so every poll yields an event
    struct FlappingReader {
        reads: Arc<AtomicUsize>,
    }

    impl TagReader for FlappingReader {
        fn read(&mut self) -> crate::Result<RawRead> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst);
            if n % 2 == 0 {
                uid(&[0x42])
            } else {
                Ok(RawRead::NoTarget)
            }
        }
    }

    #[tokio::test]
    async fn test_full_queue_stalls_polling() {
        let reads = Arc::new(AtomicUsize::new(0));
        let reader = FlappingReader {
            reads: Arc::clone(&reads),
        };

        let (source, mut rx) = PresenceSource::spawn(reader, Duration::from_millis(1), 1).unwrap();

        // One event fills the queue, the next poll blocks on delivery
        tokio::time::sleep(Duration::from_millis(200)).await;
        let stalled = reads.load(Ordering::SeqCst);
        assert!(stalled <= 2, "producer kept polling: {} reads", stalled);

        // Draining one event lets at most one more poll through
        assert!(matches!(rx.recv().await, Some(PresenceEvent::Present { .. })));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(reads.load(Ordering::SeqCst) <= stalled + 1);

        drop(rx);
        source.shutdown().await;
    }
}

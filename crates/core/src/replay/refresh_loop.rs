use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{select, Receiver, Sender};

use crate::replay::frame_store::FrameStore;
use crate::shared::constants::MAX_CONSECUTIVE_FAILURES;
use crate::source::domain::frame_source::{FrameSource, SourceError};

/// Why a refresh loop stopped running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopExit {
    /// Stopped through [`RefreshLoop::stop`].
    Cancelled,
    /// The source signalled end of sequence; the store keeps the last
    /// frame. Not a fault.
    EndOfSequence,
    /// Too many consecutive source failures.
    SourceFailed,
}

/// The background producer: one thread per replay source, paced by a
/// fixed-interval ticker derived from the source's frame rate.
///
/// Each tick performs exactly one `next()` and, on success, one publish.
/// Cancellation is cooperative and checked between ticks; `stop` joins the
/// thread and hands the source back so the orchestrator can deactivate or
/// reuse it.
pub struct RefreshLoop<S: FrameSource + 'static> {
    stop_tx: Sender<()>,
    handle: JoinHandle<(S, LoopExit)>,
}

impl<S: FrameSource + 'static> RefreshLoop<S> {
    /// Spawns the loop thread. The source must already be activated; the
    /// first frame is expected to be in the store.
    pub fn start(source: S, store: Arc<FrameStore>) -> Self {
        let fps = source.fps();
        let interval = Duration::from_secs_f64(1.0 / fps);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

        log::info!("starting refresh loop at {fps:.2} fps");
        let handle = std::thread::spawn(move || run(source, store, interval, stop_rx));

        Self { stop_tx, handle }
    }

    /// True once the loop thread has exited on its own (end of sequence or
    /// source failure).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signals cancellation and joins the thread, returning the source and
    /// the exit reason. Returns `None` if the loop thread panicked.
    pub fn stop(self) -> Option<(S, LoopExit)> {
        // The loop may already have exited; a dangling send is fine.
        let _ = self.stop_tx.try_send(());
        match self.handle.join() {
            Ok(result) => Some(result),
            Err(_) => {
                log::error!("refresh loop thread panicked");
                None
            }
        }
    }
}

fn run<S: FrameSource>(
    mut source: S,
    store: Arc<FrameStore>,
    interval: Duration,
    stop_rx: Receiver<()>,
) -> (S, LoopExit) {
    let ticker = crossbeam_channel::tick(interval);
    let mut consecutive_failures = 0usize;

    loop {
        select! {
            recv(stop_rx) -> _ => {
                log::info!("refresh loop cancelled");
                return (source, LoopExit::Cancelled);
            }
            recv(ticker) -> _ => {
                match source.next() {
                    Ok(frame) => {
                        store.publish(frame);
                        consecutive_failures = 0;
                    }
                    Err(SourceError::EndOfSequence) => {
                        log::info!("source reached end of sequence, refresh loop stopping");
                        return (source, LoopExit::EndOfSequence);
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        log::error!(
                            "failed to produce frame ({consecutive_failures} consecutive): {e}"
                        );
                        if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                            log::error!("giving up after {consecutive_failures} consecutive failures");
                            return (source, LoopExit::SourceFailed);
                        }
                    }
                }
            }
        }
    }
}

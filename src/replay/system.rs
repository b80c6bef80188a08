//! Timestamp-driven playback of one homogeneous frame sequence.
//!
//! Each [`ReplaySystem::start`] spawns one named thread that walks the frames
//! in order. Before each frame it waits the frame's stored timestamp, read as
//! milliseconds to wait, then hands the frame to the handler. The wait is a
//! `recv_timeout` on a cancellation channel, so [`ReplaySystem::stop`] wakes
//! it immediately by dropping the sending side.
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::debug;

use crate::error::Result;
use crate::frame::ReplayFrame;

/// Cancellation state of one playback run.
#[derive(Debug, Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    signal: Receiver<()>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Sleep for `delay` or until cancelled. Returns true when cancelled.
    fn wait(&self, delay: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        match self.signal.recv_timeout(delay) {
            Err(RecvTimeoutError::Timeout) => self.is_cancelled(),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        }
    }
}

/// One "frame ready" notification.
#[derive(Debug)]
pub struct FrameReady<T> {
    pub frame: Arc<T>,
    /// Position of the frame in its sequence.
    pub index: usize,
    /// Token of the run that produced the notification. Consumers that
    /// hand the frame to another thread check it before delivering.
    pub token: CancelToken,
}

#[derive(Debug)]
struct Run {
    cancel: Option<Sender<()>>,
    cancelled: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl Run {
    fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        // disconnecting wakes the in-flight wait
        self.cancel.take();
    }
}

/// Replays a frame sequence with its recorded inter-frame delays.
///
/// Idle until the first [`start`](Self::start). A run ends when the last
/// frame has been handed over or when it is stopped; either way
/// [`is_finished`](Self::is_finished) then reports true. Starting again
/// cancels the current run and plays from the first frame.
#[derive(Debug)]
pub struct ReplaySystem<T: ReplayFrame> {
    frames: Arc<[Arc<T>]>,
    run: Option<Run>,
}

impl<T: ReplayFrame> ReplaySystem<T> {
    pub fn new(frames: Vec<T>) -> Self {
        Self { frames: frames.into_iter().map(Arc::new).collect(), run: None }
    }

    pub fn frames(&self) -> &[Arc<T>] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// True once the current run has emitted its last frame or observed a
    /// stop. False before the first start.
    pub fn is_finished(&self) -> bool {
        self.run.as_ref().is_some_and(|run| run.finished.load(Ordering::Acquire))
    }

    /// Start a fresh run on a background thread. The handler is called on
    /// that thread once per frame, in sequence order; the next wait begins
    /// only after it returns.
    pub fn start<F>(&mut self, handler: F) -> Result<()>
    where
        F: FnMut(FrameReady<T>) + Send + 'static,
    {
        self.stop();

        let (cancel_tx, cancel_rx) = crossbeam_channel::bounded::<()>(0);
        let cancelled = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let token = CancelToken { cancelled: cancelled.clone(), signal: cancel_rx };
        let frames = self.frames.clone();
        let done = finished.clone();

        thread::Builder::new().name(format!("replay-{}", T::KIND)).spawn(move || {
            play(&frames, &token, handler);
            done.store(true, Ordering::Release);
        })?;

        debug!(kind = T::KIND, frames = self.frames.len(), "replay started");
        self.run = Some(Run { cancel: Some(cancel_tx), cancelled, finished });
        Ok(())
    }

    /// Request cancellation of the current run. Does not wait for the
    /// thread; no frame is handed over after the run observes the request.
    pub fn stop(&mut self) {
        if let Some(run) = self.run.as_mut() {
            if run.cancel.is_some() {
                debug!(kind = T::KIND, "replay stop requested");
            }
            run.cancel();
        }
    }
}

impl<T: ReplayFrame> Drop for ReplaySystem<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn play<T: ReplayFrame>(frames: &[Arc<T>], token: &CancelToken, mut handler: impl FnMut(FrameReady<T>)) {
    for (index, frame) in frames.iter().enumerate() {
        let delay = Duration::from_millis(frame.timestamp().max(0) as u64);
        if token.wait(delay) {
            debug!(kind = T::KIND, emitted = index, "replay cancelled");
            return;
        }
        handler(FrameReady { frame: frame.clone(), index, token: token.clone() });
    }
    debug!(kind = T::KIND, emitted = frames.len(), "replay completed");
}

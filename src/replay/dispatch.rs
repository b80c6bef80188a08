//! Execution contexts that replay notifications are delivered on.
//!
//! Playback threads never call user handlers directly; they hand a job to a
//! [`Dispatcher`] and block until the job has run. That hand-off is what
//! keeps a playback thread from racing ahead of a slow consumer.
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::Replay;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub trait Dispatcher: Send + Sync {
    /// Run `job` on this context and return once it has run. Returns
    /// without running it if the context has gone away.
    fn send(&self, job: Job);
}

/// Runs jobs directly on the calling playback thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct Inline;

impl Dispatcher for Inline {
    fn send(&self, job: Job) {
        job()
    }
}

struct Envelope {
    job: Job,
    done: Sender<()>,
}

impl Envelope {
    fn run(self) {
        (self.job)();
        let _ = self.done.send(());
    }
}

/// Queue pumped by the thread that owns it, typically the main thread of
/// an application.
///
/// [`handle`](Self::handle) gives playback threads a [`Dispatcher`] that
/// posts into the queue; jobs run when the owner calls one of the pump
/// methods. Dropping the queue releases every blocked sender.
pub struct DispatchQueue {
    tx: Sender<Envelope>,
    rx: Receiver<Envelope>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    pub fn handle(&self) -> Arc<dyn Dispatcher> {
        Arc::new(QueueHandle { tx: self.tx.clone() })
    }

    /// Run every job already queued. Returns how many ran.
    pub fn pump(&self) -> usize {
        let mut ran = 0;
        while let Ok(envelope) = self.rx.try_recv() {
            envelope.run();
            ran += 1;
        }
        ran
    }

    /// Wait up to `timeout` for a job, then drain the queue.
    pub fn pump_timeout(&self, timeout: Duration) -> usize {
        match self.rx.recv_timeout(timeout) {
            Ok(envelope) => {
                envelope.run();
                1 + self.pump()
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => 0,
        }
    }

    /// Pump until `done` returns true.
    pub fn run_until(&self, mut done: impl FnMut() -> bool) {
        while !done() {
            self.pump_timeout(Duration::from_millis(10));
        }
        self.pump();
    }

    /// Pump until every playback thread of `replay` has finished.
    pub fn run_until_finished(&self, replay: &Replay) {
        self.run_until(|| replay.is_finished());
    }
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DispatchQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchQueue").field("pending", &self.rx.len()).finish()
    }
}

struct QueueHandle {
    tx: Sender<Envelope>,
}

impl Dispatcher for QueueHandle {
    fn send(&self, job: Job) {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        if self.tx.send(Envelope { job, done: done_tx }).is_err() {
            return;
        }
        // Err means the envelope was dropped unrun
        let _ = done_rx.recv();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn inline_runs_on_caller() {
        let caller = thread::current().id();
        let (tx, rx) = crossbeam_channel::unbounded();
        Inline.send(Box::new(move || tx.send(thread::current().id()).unwrap()));
        assert_eq!(rx.recv().unwrap(), caller);
    }

    #[test]
    fn queued_jobs_run_on_pumping_thread_and_block_sender() {
        let queue = DispatchQueue::new();
        let handle = queue.handle();
        let pumping = thread::current().id();
        let ran = Arc::new(AtomicUsize::new(0));

        let ran_in_job = ran.clone();
        let sender = thread::spawn(move || {
            let (tx, rx) = crossbeam_channel::unbounded();
            handle.send(Box::new(move || {
                ran_in_job.fetch_add(1, Ordering::SeqCst);
                tx.send(thread::current().id()).unwrap();
            }));
            // send has returned, so the job already ran
            rx.try_recv().unwrap()
        });

        let mut pumped = 0;
        while pumped == 0 {
            pumped = queue.pump_timeout(Duration::from_millis(50));
        }
        assert_eq!(sender.join().unwrap(), pumping);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_queue_releases_senders() {
        let queue = DispatchQueue::new();
        let handle = queue.handle();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_in_job = ran.clone();
        let sender = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            handle.send(Box::new(move || {
                ran_in_job.fetch_add(1, Ordering::SeqCst);
            }));
        });
        drop(queue);
        sender.join().unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn run_until_stops_when_done() {
        let queue = DispatchQueue::new();
        let mut polls = 0;
        queue.run_until(|| {
            polls += 1;
            polls > 3
        });
        assert_eq!(polls, 4);
    }
}

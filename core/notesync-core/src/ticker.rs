//! Background thread that invokes a callback on a fixed interval.
//!
//! Hosts without their own timer use this to drive [`crate::SyncEngine::tick`].

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct Ticker {
    worker: Option<(Sender<()>, JoinHandle<()>)>,
}

impl Ticker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts calling `f` every `interval`. Replaces a running ticker.
    pub fn start<F>(&mut self, interval: Duration, mut f: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.stop();
        let (tx, rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || loop {
            match rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => f(),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });
        debug!(interval_ms = interval.as_millis() as u64, "Ticker started");
        self.worker = Some((tx, handle));
    }

    /// Stops the thread. No callback runs after this returns.
    pub fn stop(&mut self) {
        let Some((tx, handle)) = self.worker.take() else {
            return;
        };
        let _ = tx.send(());
        if handle.join().is_err() {
            warn!("Ticker callback panicked");
        }
        debug!("Ticker stopped");
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_ticker_fires_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut ticker = Ticker::new();
        let counter = Arc::clone(&count);
        ticker.start(Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(ticker.is_running());

        thread::sleep(Duration::from_millis(100));
        ticker.stop();
        assert!(!ticker.is_running());

        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop > 0);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_restart_replaces_previous_thread() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut ticker = Ticker::new();

        let c = Arc::clone(&first);
        ticker.start(Duration::from_millis(5), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        thread::sleep(Duration::from_millis(30));

        let c = Arc::clone(&second);
        ticker.start(Duration::from_millis(5), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let frozen = first.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        drop(ticker);

        assert_eq!(first.load(Ordering::SeqCst), frozen);
        assert!(second.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn test_stop_without_start_is_noop() {
        let mut ticker = Ticker::new();
        ticker.stop();
        assert!(!ticker.is_running());
    }
}

// Fnlock Idle Monitor
// Typing clock and the background thread that ends smart-typing pauses

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};

/// Time of the last ordinary typing, compared against a fixed threshold
#[derive(Debug, Clone, Copy)]
pub struct IdleClock {
    last_typing: Option<Instant>,
    threshold: Duration,
}

impl IdleClock {
    pub fn new(threshold: Duration) -> Self {
        Self {
            last_typing: None,
            threshold,
        }
    }

    /// Record typing now
    pub fn touch(&mut self) {
        self.touch_at(Instant::now());
    }

    /// Record typing at `at`
    pub fn touch_at(&mut self, at: Instant) {
        self.last_typing = Some(at);
    }

    /// Check if more than `threshold` has passed since the last typing.
    ///
    /// A clock that was never touched is idle.
    pub fn is_idle(&self, now: Instant) -> bool {
        match self.last_typing {
            Some(last) => now.saturating_duration_since(last) > self.threshold,
            None => true,
        }
    }

    pub fn last_typing(&self) -> Option<Instant> {
        self.last_typing
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }
}

/// Periodic worker thread.
///
/// Calls `tick` every poll interval until `tick` returns false or
/// [`IdleMonitor::stop`] is called. Waiting happens on a channel, so stop
/// wakes the thread immediately instead of after a full interval.
pub struct IdleMonitor {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl IdleMonitor {
    /// Spawn the worker thread
    pub fn spawn<F>(poll_interval: Duration, tick: F) -> std::io::Result<Self>
    where
        F: Fn() -> bool + Send + 'static,
    {
        let (shutdown, signal) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("fnlock-idle".to_string())
            .spawn(move || loop {
                match signal.recv_timeout(poll_interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if !tick() {
                            break;
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        Ok(Self {
            shutdown: Some(shutdown),
            handle: Some(handle),
        })
    }

    /// Whether the worker thread has not been joined yet
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Signal the thread and wait for it. Safe to call repeatedly, and from
    /// the worker thread itself (which then only signals).
    pub fn stop(&mut self) {
        // Dropping the sender disconnects the channel
        self.shutdown.take();

        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            log::error!("Idle monitor thread panicked");
        }
    }
}

impl Drop for IdleMonitor {
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
    fn test_untouched_clock_is_idle() {
        let clock = IdleClock::new(Duration::from_secs(1));
        assert!(clock.is_idle(Instant::now()));
        assert_eq!(clock.last_typing(), None);
    }

    #[test]
    fn test_clock_threshold() {
        let mut clock = IdleClock::new(Duration::from_secs(1));
        let start = Instant::now();
        clock.touch_at(start);

        assert!(!clock.is_idle(start));
        assert!(!clock.is_idle(start + Duration::from_millis(999)));
        assert!(!clock.is_idle(start + Duration::from_secs(1)));
        assert!(clock.is_idle(start + Duration::from_millis(1001)));
    }

    #[test]
    fn test_touch_rearms_clock() {
        let mut clock = IdleClock::new(Duration::from_secs(1));
        let start = Instant::now();
        clock.touch_at(start);
        clock.touch_at(start + Duration::from_millis(800));
        assert!(!clock.is_idle(start + Duration::from_millis(1500)));
    }

    #[test]
    fn test_monitor_ticks_until_stopped() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticks_clone = ticks.clone();
        let mut monitor = IdleMonitor::spawn(Duration::from_millis(5), move || {
            ticks_clone.fetch_add(1, Ordering::SeqCst);
            true
        })
        .unwrap();

        std::thread::sleep(Duration::from_millis(60));
        monitor.stop();
        let seen = ticks.load(Ordering::SeqCst);
        assert!(seen > 0);
        assert!(!monitor.is_running());

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(ticks.load(Ordering::SeqCst), seen);

        monitor.stop();
    }

    #[test]
    fn test_monitor_exits_when_tick_declines() {
        let mut monitor = IdleMonitor::spawn(Duration::from_millis(1), || false).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        monitor.stop();
        assert!(!monitor.is_running());
    }
}

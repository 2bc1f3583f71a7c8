// Fnlock Notifier
// Outbound reporting of lock and pause transitions to presentation layers

use crossbeam_channel::{unbounded, Receiver, Sender};

/// Receives engine transitions.
///
/// Called from whichever thread caused the transition (hook delivery,
/// idle monitor or an API caller), never while the engine state is locked.
/// Implementations should tolerate repeated identical notifications.
pub trait Notifier: Send + Sync {
    fn on_toggle(&self, active: bool);
    fn on_pause(&self, paused: bool);
}

/// Notifier that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn on_toggle(&self, _: bool) {}
    fn on_pause(&self, _: bool) {}
}

/// Status line shown for a lock/pause combination
pub fn status_text(active: bool, paused: bool) -> &'static str {
    match (active, paused) {
        (true, true) => "FN LOCK: PAUSED",
        (true, false) => "FN LOCK: ON",
        (false, _) => "FN LOCK: OFF",
    }
}

/// Notifier that logs the status line at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn on_toggle(&self, active: bool) {
        log::info!("{}", status_text(active, false));
    }

    fn on_pause(&self, paused: bool) {
        // Resuming from a pause means the lock is on again
        log::info!("{}", status_text(true, paused));
    }
}

/// One engine transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    Toggled(bool),
    Paused(bool),
}

/// Notifier that forwards transitions over a channel, so consumers can
/// handle them on their own thread
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: Sender<EngineEvent>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end of its channel
    pub fn new() -> (Self, Receiver<EngineEvent>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }

    fn send(&self, event: EngineEvent) {
        if self.sender.send(event).is_err() {
            log::trace!("Dropped {:?}, receiver gone", event);
        }
    }
}

impl Notifier for ChannelNotifier {
    fn on_toggle(&self, active: bool) {
        self.send(EngineEvent::Toggled(active));
    }

    fn on_pause(&self, paused: bool) {
        self.send(EngineEvent::Paused(paused));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text() {
        assert_eq!(status_text(true, false), "FN LOCK: ON");
        assert_eq!(status_text(true, true), "FN LOCK: PAUSED");
        assert_eq!(status_text(false, false), "FN LOCK: OFF");
        assert_eq!(status_text(false, true), "FN LOCK: OFF");
    }

    #[test]
    fn test_channel_notifier_preserves_order() {
        let (notifier, events) = ChannelNotifier::new();
        notifier.on_toggle(true);
        notifier.on_pause(true);
        notifier.on_pause(false);

        let received: Vec<_> = events.try_iter().collect();
        assert_eq!(
            received,
            vec![
                EngineEvent::Toggled(true),
                EngineEvent::Paused(true),
                EngineEvent::Paused(false),
            ]
        );
    }

    #[test]
    fn test_channel_notifier_survives_dropped_receiver() {
        let (notifier, events) = ChannelNotifier::new();
        drop(events);
        notifier.on_toggle(false);
    }
}

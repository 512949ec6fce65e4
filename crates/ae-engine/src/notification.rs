//! Render-core -> host notification channel (§6 "Notifications").
//!
//! Lock-free, bounded, and non-blocking on the push side: the render thread
//! never blocks delivering a notification, and a full channel silently drops
//! the oldest-pending send rather than stalling the callback (§5 "the render
//! thread never blocks on ... user-held locks"). Grounded on the teacher's
//! `CommandQueueManager::split()` (`rf-bridge/src/command_queue.rs`), which
//! hands out a producer-side and consumer-side handle over an `rtrb` ring.

use rtrb::{Consumer, Producer, RingBuffer};

/// One event the render core reports to whatever is listening (§6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Notification {
    /// A step boundary was crossed; carries the in-callback frame offset.
    SequencerPositionUpdated { buffer_offset: usize },
    /// A queued tempo change was applied at a callback boundary.
    SequencerTempoUpdated,
    /// `buffer_position` crossed the configured notification marker.
    MarkerPositionReached,
    /// A bounded recording snippet filled and was flushed to disk.
    RecordedSnippetReady { index: u64 },
    /// The armed recording was stopped and finalized.
    RecordingCompleted,
    /// An offline bounce reached the end of its range and was finalized.
    BounceComplete,
    /// Driver construction failed; the engine has stopped and will not render.
    ErrorHardwareUnavailable,
}

const DEFAULT_CAPACITY: usize = 256;

/// Render-thread-side handle: push only, non-blocking.
pub struct NotificationSender {
    producer: Producer<Notification>,
}

impl NotificationSender {
    /// Attempt to deliver a notification. Returns `false` if the channel is
    /// full, in which case the caller should not retry on the render thread
    /// (log-and-drop, not block-and-retry).
    #[inline]
    pub fn send(&mut self, notification: Notification) -> bool {
        self.producer.push(notification).is_ok()
    }
}

/// Host-side handle: drain at whatever cadence the host polls on.
pub struct NotificationReceiver {
    consumer: Consumer<Notification>,
}

impl NotificationReceiver {
    pub fn try_recv(&mut self) -> Option<Notification> {
        self.consumer.pop().ok()
    }

    /// Drain everything currently queued, in order.
    pub fn drain(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Some(n) = self.try_recv() {
            out.push(n);
        }
        out
    }
}

/// Construct a bounded notification channel and split it into the
/// render-thread and host-thread halves.
pub fn notification_channel(capacity: usize) -> (NotificationSender, NotificationReceiver) {
    let (producer, consumer) = RingBuffer::new(capacity.max(1));
    (NotificationSender { producer }, NotificationReceiver { consumer })
}

/// `notification_channel` at the default capacity (§6: a handful of
/// notification kinds, none produced more than once per callback).
pub fn default_notification_channel() -> (NotificationSender, NotificationReceiver) {
    notification_channel(DEFAULT_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sent_notifications_are_received_in_order() {
        let (mut tx, mut rx) = notification_channel(4);
        tx.send(Notification::SequencerTempoUpdated);
        tx.send(Notification::MarkerPositionReached);

        assert_eq!(rx.try_recv(), Some(Notification::SequencerTempoUpdated));
        assert_eq!(rx.try_recv(), Some(Notification::MarkerPositionReached));
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn send_reports_failure_without_blocking_when_full() {
        let (mut tx, _rx) = notification_channel(1);
        assert!(tx.send(Notification::RecordingCompleted));
        assert!(!tx.send(Notification::BounceComplete));
    }

    #[test]
    fn drain_collects_every_pending_notification() {
        let (mut tx, mut rx) = notification_channel(8);
        for _ in 0..3 {
            tx.send(Notification::SequencerPositionUpdated { buffer_offset: 0 });
        }
        assert_eq!(rx.drain().len(), 3);
    }
}

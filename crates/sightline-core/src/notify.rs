//! The notification seam between the core and the outbound layer.
//!
//! The core never encodes or transmits anything itself. It hands a
//! [`Notification`] and its recipient to a [`Notifier`] and moves on;
//! delivery is fire-and-forget from the caller's point of view.

use sightline_types::{Notification, ObjectId};
use sightline_world::WorldObject;
use tokio::sync::mpsc;
use tracing::trace;

/// A notification paired with the object it is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outbound {
    /// The receiving object.
    pub recipient: ObjectId,
    /// The message.
    pub notification: Notification,
}

/// Sink for notifications produced by the core.
///
/// Implementations must not block: they are called from the background
/// services while world state is being walked.
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Deliver `notification` to `recipient`.
    fn notify(&self, recipient: &WorldObject, notification: Notification);
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, recipient: &WorldObject, notification: Notification) {
        trace!(recipient = %recipient.id(), ?notification, "notification dropped");
    }
}

/// Forwards notifications over an unbounded channel.
///
/// The receiving half is drained by whatever owns the outbound transport.
/// If the receiver is gone the notification is dropped.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    /// Sending half of the outbound queue.
    sender: mpsc::UnboundedSender<Outbound>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiver that drains it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, recipient: &WorldObject, notification: Notification) {
        let outbound = Outbound {
            recipient: recipient.id(),
            notification,
        };
        if self.sender.send(outbound).is_err() {
            trace!(recipient = %recipient.id(), "notification receiver closed");
        }
    }
}

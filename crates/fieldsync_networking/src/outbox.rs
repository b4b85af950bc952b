//! # Outbox
//!
//! Hands encoded change bundles to the transport.
//!
//! The engine never touches sockets: each flushed bundle becomes an
//! [`OutgoingPayload`] on a crossbeam channel, and whatever owns the
//! connection drains the other end. Enqueueing never blocks the tick.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use fieldsync_shared::AuthorityId;

use crate::bundle::encode_bundle;
use crate::companion::CompanionLookup;
use crate::error::{SyncError, SyncResult};
use crate::protocol::BitWriter;
use crate::scheduler::FieldChange;
use crate::schema::Reliability;

/// One encoded bundle addressed to one peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingPayload {
    /// Receiving authority.
    pub destination: AuthorityId,
    /// Delivery class the transport must honor.
    pub reliability: Reliability,
    /// Encoded bundle.
    pub bytes: Vec<u8>,
}

/// Producer end: encodes and enqueues bundles.
pub struct Outbox {
    sender: Sender<OutgoingPayload>,
    writer: BitWriter,
    class: Vec<FieldChange>,
    dropped: u64,
}

impl Outbox {
    /// Creates an outbox holding at most `capacity` payloads in flight.
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, OutboxReceiver) {
        let (sender, receiver) = bounded(capacity);
        (Self::with_sender(sender), OutboxReceiver { receiver })
    }

    /// Creates an outbox with no in-flight limit.
    #[must_use]
    pub fn unbounded() -> (Self, OutboxReceiver) {
        let (sender, receiver) = unbounded();
        (Self::with_sender(sender), OutboxReceiver { receiver })
    }

    fn with_sender(sender: Sender<OutgoingPayload>) -> Self {
        Self {
            sender,
            writer: BitWriter::with_capacity(1024),
            class: Vec::new(),
            dropped: 0,
        }
    }

    /// Unreliable payloads dropped because the channel was full.
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Enqueues a payload without blocking.
    ///
    /// Unreliable payloads are dropped when the channel is full. Returns
    /// false if the payload was dropped.
    ///
    /// # Errors
    ///
    /// - [`SyncError::OutboxFull`] if a reliable payload finds the channel
    ///   full; the payload is handed back so the caller can retry it
    /// - [`SyncError::ChannelClosed`] if every receiver is gone
    pub fn send(&mut self, payload: OutgoingPayload) -> SyncResult<bool> {
        match self.sender.try_send(payload) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(payload)) => match payload.reliability {
                Reliability::Reliable => Err(SyncError::OutboxFull(Box::new(payload))),
                Reliability::Unreliable => {
                    self.dropped += 1;
                    tracing::debug!(destination = payload.destination, "outbox full, dropping unreliable payload");
                    Ok(false)
                }
            },
            Err(TrySendError::Disconnected(_)) => Err(SyncError::ChannelClosed),
        }
    }

    /// Encodes `changes` for `destination`, one bundle per delivery
    /// class, and enqueues them.
    ///
    /// Classes with nothing to send produce no payload. Returns the number
    /// of payloads enqueued.
    ///
    /// # Errors
    ///
    /// Any [`encode_bundle`] or [`send`](Self::send) error. Reliable
    /// changes are flushed first, so a full channel stops the flush before
    /// the unreliable bundle is built.
    pub fn flush_changes(
        &mut self,
        changes: &[FieldChange],
        destination: AuthorityId,
        lookup: &impl CompanionLookup,
    ) -> SyncResult<usize> {
        let mut sent = 0;
        for reliability in [Reliability::Reliable, Reliability::Unreliable] {
            self.class.clear();
            self.class
                .extend(changes.iter().filter(|c| c.reliability == reliability));
            if self.class.is_empty() {
                continue;
            }

            self.writer.clear();
            let count = encode_bundle(&self.class, destination, lookup, &mut self.writer)?;
            if count == 0 {
                continue;
            }

            let payload = OutgoingPayload {
                destination,
                reliability,
                bytes: self.writer.as_bytes().to_vec(),
            };
            if self.send(payload)? {
                sent += 1;
            }
        }
        Ok(sent)
    }
}

/// Consumer end, held by the transport.
#[derive(Clone)]
pub struct OutboxReceiver {
    receiver: Receiver<OutgoingPayload>,
}

impl OutboxReceiver {
    /// Receives one payload (non-blocking).
    #[inline]
    pub fn try_recv(&self) -> Option<OutgoingPayload> {
        self.receiver.try_recv().ok()
    }

    /// Receives every pending payload (non-blocking).
    pub fn drain(&self) -> Vec<OutgoingPayload> {
        self.receiver.try_iter().collect()
    }

    /// Number of pending payloads.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Underlying channel, for `select!` loops.
    #[must_use]
    pub const fn channel(&self) -> &Receiver<OutgoingPayload> {
        &self.receiver
    }
}

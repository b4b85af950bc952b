//! # Sync Error Types
//!
//! All errors that can occur while encoding, decoding or scheduling fields.
//!
//! A decode error is fatal to the payload being decoded, never to the
//! process: no field is committed until the whole payload has decoded.

use thiserror::Error;

use crate::outbox::OutgoingPayload;
use crate::value::ValueKind;

/// Errors that can occur in the synchronization engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// Payload is shorter than the schema requires.
    #[error("decode underrun: needed {needed} bits, {remaining} remaining")]
    DecodeUnderrun {
        /// Bits the read required.
        needed: usize,
        /// Bits left in the payload.
        remaining: usize,
    },

    /// Field index outside the declared schema.
    #[error("unknown field index {index} (schema has {field_count} fields)")]
    UnknownFieldIndex {
        /// The offending index.
        index: usize,
        /// Number of fields in the schema.
        field_count: usize,
    },

    /// A value did not match the field's declared kind.
    #[error("field {index}: expected {expected:?}, found {found:?}")]
    KindMismatch {
        /// Field index.
        index: u8,
        /// Declared kind.
        expected: ValueKind,
        /// Kind of the offending value.
        found: ValueKind,
    },

    /// Field bits decoded to a value no peer could have written.
    #[error("malformed encoding for field {index}: {reason}")]
    MalformedField {
        /// Field index.
        index: u8,
        /// What was wrong.
        reason: &'static str,
    },

    /// Quantization parameters cannot produce a valid mapping.
    #[error("invalid quantization: range [{min}, {max}] at {bits} bits")]
    InvalidQuantization {
        /// Lower bound.
        min: f32,
        /// Upper bound.
        max: f32,
        /// Requested bit width.
        bits: u8,
    },

    /// A codec was attached to a kind it cannot encode.
    #[error("codec {codec} does not support {kind:?}")]
    UnsupportedCodec {
        /// Codec name.
        codec: String,
        /// Field kind.
        kind: ValueKind,
    },

    /// No codec registered under this name.
    #[error("unknown codec: {0}")]
    UnknownCodec(String),

    /// Schema declares more fields than an index can address.
    #[error("too many fields: {0} (max 256)")]
    TooManyFields(usize),

    /// No companion registered for this entity.
    #[error("unknown entity: {0}")]
    UnknownEntity(u32),

    /// A companion is already registered for this entity.
    #[error("entity {0} already has a companion")]
    DuplicateEntity(u32),

    /// Companion pool has no free slot.
    #[error("companion pool exhausted: capacity {capacity}")]
    PoolExhausted {
        /// Pool capacity.
        capacity: usize,
    },

    /// More changes than a bundle's count prefix can express.
    #[error("bundle overflow: {0} changes (max 65535)")]
    BundleOverflow(usize),

    /// Invalid configuration or schema file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The outgoing payload channel is full; the reliable payload was not
    /// enqueued and is handed back.
    #[error("outbox full: reliable payload for {} not enqueued", .0.destination)]
    OutboxFull(Box<OutgoingPayload>),

    /// The outgoing payload channel has no receiver.
    #[error("outgoing channel closed")]
    ChannelClosed,
}

/// Result type for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;

//! # Field Descriptor
//!
//! Static per-field configuration. Descriptors are immutable once a schema
//! is built; the only runtime-mutable input is the shared skip switch.

use std::cmp::Reverse;

use fieldsync_shared::{seconds_to_ticks, Ticks};
use serde::{Deserialize, Serialize};

use super::skip::SkipFlag;
use crate::error::SyncResult;
use crate::history::history_capacity;
use crate::protocol::{BitReader, BitWriter, CodecContext, CodecRef, QuantizationRange, Quantizer};
use crate::value::{SyncValue, ValueKind};

/// Override value meaning "no override; use the declared priority".
pub const PRIORITY_OVERRIDE_UNSET: i32 = i32::MAX;

/// Override given to the identity field so it always goes first.
pub const IDENTITY_PRIORITY_OVERRIDE: i32 = 0;

/// Override for the owner-authority field, right after identity.
pub const OWNER_AUTHORITY_PRIORITY_OVERRIDE: i32 = 1;

/// Delivery class of a field's updates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reliability {
    /// Guaranteed, ordered delivery.
    #[default]
    Reliable,
    /// Best-effort delivery.
    Unreliable,
}

/// Fields sharing a cadence, delivery class and thread affinity.
///
/// The scheduler refreshes and sends one group at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SyncGroupKey {
    /// Sample interval; 0 means "end of the tick in which a change occurs".
    pub interval_ticks: Ticks,
    /// Delivery class.
    pub reliability: Reliability,
    /// Whether live values may only be read on the primary thread.
    pub must_run_on_primary_thread: bool,
}

impl SyncGroupKey {
    /// True for groups processed at the end of every tick.
    #[inline]
    #[must_use]
    pub const fn is_end_of_tick(&self) -> bool {
        self.interval_ticks == 0
    }
}

/// Ordering key for outgoing changes. Smaller sorts first.
///
/// Any override beats any declared priority. Overrides compare
/// lower-first; declared priorities compare higher-first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SchedulingPriority {
    /// An explicit override (lower wins).
    Override(i32),
    /// The declared processing priority (higher wins).
    Declared(Reverse<i32>),
}

/// Static configuration of one synchronized field.
#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    pub(super) index: u8,
    pub(super) name: String,
    pub(super) kind: ValueKind,
    pub(super) must_run_on_primary_thread: bool,
    pub(super) processing_priority: i32,
    pub(super) priority_override: i32,
    pub(super) sync_interval_seconds: f32,
    pub(super) reliability: Reliability,
    pub(super) should_blend: bool,
    pub(super) quantization: QuantizationRange,
    pub(super) quantizer: Option<Quantizer>,
    pub(super) packed_bits: Option<u8>,
    pub(super) baseline: Option<SyncValue>,
    pub(super) codec: CodecRef,
    pub(super) skip: SkipFlag,
    pub(super) is_identity: bool,
}

impl FieldDescriptor {
    /// Dense index within the entity's schema.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> u8 {
        self.index
    }

    /// Field name (diagnostics only).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared value kind.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Whether the live value may only be read on the primary thread.
    #[inline]
    #[must_use]
    pub const fn must_run_on_primary_thread(&self) -> bool {
        self.must_run_on_primary_thread
    }

    /// Declared processing priority.
    #[inline]
    #[must_use]
    pub const fn processing_priority(&self) -> i32 {
        self.processing_priority
    }

    /// Internal priority override, [`PRIORITY_OVERRIDE_UNSET`] if none.
    #[inline]
    #[must_use]
    pub const fn priority_override(&self) -> i32 {
        self.priority_override
    }

    /// Sample/send interval in seconds.
    #[inline]
    #[must_use]
    pub const fn sync_interval_seconds(&self) -> f32 {
        self.sync_interval_seconds
    }

    /// Delivery class.
    #[inline]
    #[must_use]
    pub const fn reliability(&self) -> Reliability {
        self.reliability
    }

    /// Whether received values go to history for blending.
    #[inline]
    #[must_use]
    pub const fn should_blend(&self) -> bool {
        self.should_blend
    }

    /// Declared quantization range.
    #[inline]
    #[must_use]
    pub const fn quantization(&self) -> QuantizationRange {
        self.quantization
    }

    /// Fixed bit width for small unsigned integers.
    #[inline]
    #[must_use]
    pub const fn packed_bits(&self) -> Option<u8> {
        self.packed_bits
    }

    /// Baseline the field is encoded relative to.
    #[inline]
    #[must_use]
    pub const fn baseline(&self) -> Option<SyncValue> {
        self.baseline
    }

    /// Resolved codec.
    #[inline]
    #[must_use]
    pub const fn codec(&self) -> &CodecRef {
        &self.codec
    }

    /// True if this is the entity's identity field.
    #[inline]
    #[must_use]
    pub const fn is_identity(&self) -> bool {
        self.is_identity
    }

    /// Whether the field's skip switch is currently set.
    #[inline]
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.skip.is_set()
    }

    /// Cadence group this field belongs to.
    #[must_use]
    pub fn group_key(&self) -> SyncGroupKey {
        SyncGroupKey {
            interval_ticks: seconds_to_ticks(f64::from(self.sync_interval_seconds)),
            reliability: self.reliability,
            must_run_on_primary_thread: self.must_run_on_primary_thread,
        }
    }

    /// Effective ordering key for outgoing changes.
    #[must_use]
    pub const fn scheduling_priority(&self) -> SchedulingPriority {
        if self.priority_override == PRIORITY_OVERRIDE_UNSET {
            SchedulingPriority::Declared(Reverse(self.processing_priority))
        } else {
            SchedulingPriority::Override(self.priority_override)
        }
    }

    /// History capacity for this field under a global interpolation lead.
    #[must_use]
    pub fn history_capacity(&self, interpolation_lead_seconds: f32, minimum_size: usize) -> usize {
        history_capacity(interpolation_lead_seconds, self.sync_interval_seconds, minimum_size)
    }

    /// Parameters handed to the codec.
    #[inline]
    #[must_use]
    pub const fn codec_context(&self) -> CodecContext {
        CodecContext {
            index: self.index,
            kind: self.kind,
            quantizer: self.quantizer,
            packed_bits: self.packed_bits,
            baseline: self.baseline,
        }
    }

    /// Encodes `value` with this field's codec, returning bits written.
    ///
    /// # Errors
    ///
    /// [`crate::SyncError::KindMismatch`] if `value` is not of the declared kind.
    #[inline]
    pub fn encode(&self, writer: &mut BitWriter, value: &SyncValue) -> SyncResult<usize> {
        self.codec.serialize(writer, &self.codec_context(), value)
    }

    /// Decodes one value with this field's codec.
    ///
    /// # Errors
    ///
    /// [`crate::SyncError::DecodeUnderrun`] on a truncated payload.
    #[inline]
    pub fn decode(&self, reader: &mut BitReader<'_>) -> SyncResult<SyncValue> {
        self.codec.deserialize(reader, &self.codec_context())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_beats_declared() {
        let overridden = SchedulingPriority::Override(5);
        let urgent = SchedulingPriority::Declared(Reverse(1_000));
        assert!(overridden < urgent);
    }

    #[test]
    fn test_lower_override_wins() {
        assert!(SchedulingPriority::Override(0) < SchedulingPriority::Override(1));
        assert!(SchedulingPriority::Override(-3) < SchedulingPriority::Override(0));
    }

    #[test]
    fn test_higher_declared_wins() {
        assert!(SchedulingPriority::Declared(Reverse(10)) < SchedulingPriority::Declared(Reverse(2)));
    }

    #[test]
    fn test_group_key_end_of_tick() {
        let key = SyncGroupKey {
            interval_ticks: 0,
            reliability: Reliability::Reliable,
            must_run_on_primary_thread: false,
        };
        assert!(key.is_end_of_tick());
    }
}

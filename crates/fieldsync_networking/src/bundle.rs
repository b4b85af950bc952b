//! # Change Bundles
//!
//! Many field changes, across many entities, packed into one payload.
//!
//! ## Layout
//!
//! ```text
//! ┌───────────┬─────────────────────────────────────────────┬─────┐
//! │ count u16 │ entity u32 │ index u8 │ field encoding (var) │ ... │
//! └───────────┴─────────────────────────────────────────────┴─────┘
//! ```
//!
//! Changes authored by the destination are left out so a peer never
//! receives its own values back.

use fieldsync_shared::{AuthorityId, NetworkId, Ticks};

use crate::companion::CompanionLookup;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{BitReader, BitWriter};
use crate::scheduler::FieldChange;
use crate::value::SyncValue;

/// Encodes the changes not authored by `destination`.
///
/// Every change is resolved and kind-checked before the first bit is
/// written, so on error `writer` is left untouched. Returns the number of
/// changes encoded.
///
/// # Errors
///
/// - [`SyncError::UnknownEntity`] / [`SyncError::UnknownFieldIndex`]
/// - [`SyncError::KindMismatch`] if a change's value has the wrong kind
/// - [`SyncError::BundleOverflow`] past `u16::MAX` changes
pub fn encode_bundle(
    changes: &[FieldChange],
    destination: AuthorityId,
    lookup: &impl CompanionLookup,
    writer: &mut BitWriter,
) -> SyncResult<usize> {
    let eligible = || changes.iter().filter(|c| c.set_by != destination);

    let mut count = 0usize;
    for change in eligible() {
        let field = lookup
            .companion(change.entity)
            .ok_or(SyncError::UnknownEntity(change.entity))?
            .descriptor(change.index)?;
        if field.kind() != change.value.kind() {
            return Err(SyncError::KindMismatch {
                index: change.index,
                expected: field.kind(),
                found: change.value.kind(),
            });
        }
        count += 1;
    }
    let prefix = u16::try_from(count).map_err(|_| SyncError::BundleOverflow(count))?;

    writer.write_u16(prefix);
    for change in eligible() {
        let field = lookup
            .companion(change.entity)
            .ok_or(SyncError::UnknownEntity(change.entity))?
            .descriptor(change.index)?;
        writer.write_u32(change.entity);
        writer.write_u8(change.index);
        field.encode(writer, &change.value)?;
    }
    Ok(count)
}

/// Smallest encoded change: entity, index and a one-bit field.
const MIN_CHANGE_BITS: usize = 32 + 8 + 1;

/// Decodes bundles into a reusable scratch buffer before applying them.
#[derive(Debug, Default)]
pub struct BundleDecoder {
    staged: Vec<(NetworkId, u8, SyncValue)>,
}

impl BundleDecoder {
    /// Creates a decoder with an empty scratch buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a bundle from `source` and applies it.
    ///
    /// Every change is decoded before any is committed; a malformed bundle
    /// is rejected whole. Returns the number of changes applied.
    ///
    /// # Errors
    ///
    /// - [`SyncError::DecodeUnderrun`] on a truncated bundle, or when the
    ///   count prefix claims more changes than the payload can hold
    /// - [`SyncError::UnknownEntity`] / [`SyncError::UnknownFieldIndex`]
    pub fn decode(
        &mut self,
        reader: &mut BitReader<'_>,
        source: AuthorityId,
        receive_timestamp: Ticks,
        lookup: &mut impl CompanionLookup,
    ) -> SyncResult<usize> {
        self.staged.clear();
        if let Err(error) = self.stage(reader, &*lookup) {
            tracing::warn!(source, %error, "rejecting change bundle");
            self.staged.clear();
            return Err(error);
        }

        for &(entity, index, value) in &self.staged {
            if let Some(companion) = lookup.companion_mut(entity) {
                companion.commit_field(index, value, receive_timestamp, source);
            }
        }
        Ok(self.staged.len())
    }

    fn stage(&mut self, reader: &mut BitReader<'_>, lookup: &impl CompanionLookup) -> SyncResult<()> {
        let count = usize::from(reader.read_u16()?);
        reader.ensure(count * MIN_CHANGE_BITS)?;
        self.staged.reserve(count);
        for _ in 0..count {
            let entity = reader.read_u32()?;
            let index = reader.read_u8()?;
            let companion = lookup.companion(entity).ok_or(SyncError::UnknownEntity(entity))?;
            self.staged.push((entity, index, companion.decode_field(reader, index)?));
        }
        Ok(())
    }
}

/// Decodes a bundle from `source` and applies it with a one-off
/// [`BundleDecoder`].
///
/// # Errors
///
/// See [`BundleDecoder::decode`].
pub fn decode_bundle(
    reader: &mut BitReader<'_>,
    source: AuthorityId,
    receive_timestamp: Ticks,
    lookup: &mut impl CompanionLookup,
) -> SyncResult<usize> {
    BundleDecoder::new().decode(reader, source, receive_timestamp, lookup)
}

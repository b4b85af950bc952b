//! # Sync Companions
//!
//! A companion sits next to one networked entity and owns everything the
//! engine tracks about it: one change tracker per field, a history buffer
//! per blended field, and the accessor that reaches the live values.
//!
//! ## Receive Path
//!
//! ```text
//! payload ──▶ decode all into scratch ──▶ commit
//!                   │ error                 ├─ blended:  history.push(ts)
//!                   ▼                       └─ otherwise: accessor + tracker
//!            nothing mutated
//! ```

mod accessor;
mod registry;

use std::fmt;
use std::sync::Arc;

use fieldsync_shared::{AuthorityId, Ticks, AUTHORITY_UNSET};

pub use accessor::{FieldAccessor, FieldTable};
pub use registry::{CompanionLookup, CompanionRegistry, RegistryStats};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::history::HistoryBuffer;
use crate::protocol::{BitReader, BitWriter};
use crate::schema::{FieldDescriptor, SchemaDescriptor};
use crate::tracker::{ChangeTracker, RefreshFilter};
use crate::value::SyncValue;

/// Per-field runtime state.
#[derive(Debug)]
pub(crate) struct FieldSlot {
    pub(crate) tracker: ChangeTracker,
    pub(crate) history: Option<Arc<HistoryBuffer>>,
}

/// Synchronization state of one entity.
pub struct SyncCompanion {
    schema: Arc<SchemaDescriptor>,
    slots: Vec<FieldSlot>,
    accessor: Box<dyn FieldAccessor>,
    owner: AuthorityId,
    local_authority: AuthorityId,
    staged: Vec<(u8, SyncValue)>,
}

impl SyncCompanion {
    /// Creates a companion, sampling every field's initial value.
    #[must_use]
    pub fn new(
        schema: Arc<SchemaDescriptor>,
        accessor: Box<dyn FieldAccessor>,
        owner: AuthorityId,
        config: &SyncConfig,
    ) -> Self {
        let slots = Vec::with_capacity(schema.len());
        Self::assemble(schema, accessor, owner, config, slots, HistoryBuffer::with_capacity)
    }

    /// Builds a companion on top of recycled slot storage.
    pub(crate) fn assemble(
        schema: Arc<SchemaDescriptor>,
        mut accessor: Box<dyn FieldAccessor>,
        owner: AuthorityId,
        config: &SyncConfig,
        mut slots: Vec<FieldSlot>,
        mut make_history: impl FnMut(usize) -> HistoryBuffer,
    ) -> Self {
        if let Some(index) = schema.owner_authority_index() {
            accessor.write_field(index, SyncValue::U32(owner));
        }
        slots.clear();
        slots.extend(schema.fields().iter().map(|field| {
            let history = field.should_blend().then(|| {
                let capacity = field.history_capacity(
                    config.interpolation_lead_seconds,
                    config.history_minimum_size,
                );
                Arc::new(make_history(capacity))
            });
            FieldSlot {
                tracker: ChangeTracker::new(accessor.read_field(field.index())),
                history,
            }
        }));

        Self {
            schema,
            slots,
            accessor,
            owner,
            local_authority: config.local_authority,
            staged: Vec::new(),
        }
    }

    /// Releases the slot storage for reuse.
    pub(crate) fn into_slots(self) -> Vec<FieldSlot> {
        self.slots
    }

    /// Shared schema.
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &Arc<SchemaDescriptor> {
        &self.schema
    }

    /// Descriptor of field `index`.
    ///
    /// # Errors
    ///
    /// [`SyncError::UnknownFieldIndex`] if out of range.
    #[inline]
    pub fn descriptor(&self, index: u8) -> SyncResult<&FieldDescriptor> {
        self.schema.field(usize::from(index))
    }

    /// Number of fields.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the schema has no fields.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Authority that owns the entity.
    #[inline]
    #[must_use]
    pub const fn owner(&self) -> AuthorityId {
        self.owner
    }

    /// Transfers ownership.
    ///
    /// With an owner-authority field the new owner is written through the
    /// accessor, so the next refresh reports it as a change.
    pub fn set_owner(&mut self, owner: AuthorityId) {
        self.owner = owner;
        if let Some(index) = self.schema.owner_authority_index() {
            self.accessor.write_field(index, SyncValue::U32(owner));
        }
    }

    /// Authority recorded on locally refreshed changes.
    #[inline]
    #[must_use]
    pub const fn local_authority(&self) -> AuthorityId {
        self.local_authority
    }

    /// Change tracker of field `index`.
    #[must_use]
    pub fn tracker(&self, index: u8) -> Option<&ChangeTracker> {
        self.slots.get(usize::from(index)).map(|slot| &slot.tracker)
    }

    /// History buffer of field `index`, present for blended fields only.
    #[must_use]
    pub fn history(&self, index: u8) -> Option<&Arc<HistoryBuffer>> {
        self.slots.get(usize::from(index)).and_then(|slot| slot.history.as_ref())
    }

    /// Reads the live value of field `index` through the accessor.
    ///
    /// # Errors
    ///
    /// [`SyncError::UnknownFieldIndex`] if out of range.
    pub fn read_live(&self, index: u8) -> SyncResult<SyncValue> {
        self.descriptor(index)?;
        Ok(self.accessor.read_field(index))
    }

    /// Writes `value` into field `index` through the accessor.
    ///
    /// # Errors
    ///
    /// - [`SyncError::UnknownFieldIndex`] if out of range
    /// - [`SyncError::KindMismatch`] if `value` is not of the declared kind
    pub fn write_live(&mut self, index: u8, value: SyncValue) -> SyncResult<()> {
        let expected = self.descriptor(index)?.kind();
        if value.kind() != expected {
            return Err(SyncError::KindMismatch {
                index,
                expected,
                found: value.kind(),
            });
        }
        self.accessor.write_field(index, value);
        Ok(())
    }

    /// Writes every field except identity, in index order.
    ///
    /// Returns the number of bits written.
    ///
    /// # Errors
    ///
    /// [`SyncError::KindMismatch`] if the accessor returns a value of the
    /// wrong kind. `writer` is rolled back to where it started.
    pub fn serialize_all(&self, writer: &mut BitWriter) -> SyncResult<usize> {
        let start = writer.bit_len();
        let written = self
            .schema
            .fields()
            .iter()
            .filter(|f| !f.is_identity())
            .try_fold(0, |bits, field| {
                field
                    .encode(writer, &self.accessor.read_field(field.index()))
                    .map(|n| bits + n)
            });
        if written.is_err() {
            writer.truncate(start);
        }
        written
    }

    /// Writes one field, identity included.
    ///
    /// # Errors
    ///
    /// - [`SyncError::UnknownFieldIndex`] if out of range
    /// - [`SyncError::KindMismatch`] on an accessor kind error
    pub fn serialize_single(&self, writer: &mut BitWriter, index: u8) -> SyncResult<usize> {
        let field = self.descriptor(index)?;
        let start = writer.bit_len();
        let written = field.encode(writer, &self.accessor.read_field(index));
        if written.is_err() {
            writer.truncate(start);
        }
        written
    }

    /// Applies a full payload written by [`serialize_all`](Self::serialize_all).
    ///
    /// # Errors
    ///
    /// Any decode error. No field is mutated when one occurs.
    pub fn deserialize_init_all(&mut self, reader: &mut BitReader<'_>, receive_timestamp: Ticks) -> SyncResult<()> {
        self.deserialize_init_all_from(reader, receive_timestamp, AUTHORITY_UNSET)
    }

    /// [`deserialize_init_all`](Self::deserialize_init_all), recording
    /// `source` as the author of the accepted values.
    ///
    /// # Errors
    ///
    /// Any decode error. No field is mutated when one occurs.
    pub fn deserialize_init_all_from(
        &mut self,
        reader: &mut BitReader<'_>,
        receive_timestamp: Ticks,
        source: AuthorityId,
    ) -> SyncResult<()> {
        let mut staged = std::mem::take(&mut self.staged);
        staged.clear();

        let decoded = self
            .schema
            .fields()
            .iter()
            .filter(|f| !f.is_identity())
            .try_for_each(|field| -> SyncResult<()> {
                staged.push((field.index(), field.decode(reader)?));
                Ok(())
            });

        if decoded.is_ok() {
            for &(index, value) in &staged {
                self.commit_field(index, value, receive_timestamp, source);
            }
        }
        self.staged = staged;
        decoded
    }

    /// Applies one field written by [`serialize_single`](Self::serialize_single).
    ///
    /// # Errors
    ///
    /// [`SyncError::UnknownFieldIndex`] or any decode error, with no state
    /// mutated.
    pub fn deserialize_init_single(
        &mut self,
        reader: &mut BitReader<'_>,
        index: u8,
        receive_timestamp: Ticks,
    ) -> SyncResult<()> {
        self.deserialize_init_single_from(reader, index, receive_timestamp, AUTHORITY_UNSET)
    }

    /// [`deserialize_init_single`](Self::deserialize_init_single), recording
    /// `source` as the author of the accepted value.
    ///
    /// # Errors
    ///
    /// [`SyncError::UnknownFieldIndex`] or any decode error, with no state
    /// mutated.
    pub fn deserialize_init_single_from(
        &mut self,
        reader: &mut BitReader<'_>,
        index: u8,
        receive_timestamp: Ticks,
        source: AuthorityId,
    ) -> SyncResult<()> {
        let value = self.decode_field(reader, index)?;
        self.commit_field(index, value, receive_timestamp, source);
        Ok(())
    }

    /// Decodes one field without touching any state.
    pub(crate) fn decode_field(&self, reader: &mut BitReader<'_>, index: u8) -> SyncResult<SyncValue> {
        self.descriptor(index)?.decode(reader)
    }

    /// Routes a decoded value to history or to the accessor.
    pub(crate) fn commit_field(&mut self, index: u8, value: SyncValue, receive_timestamp: Ticks, source: AuthorityId) {
        let i = usize::from(index);
        let (Some(field), Some(slot)) = (self.schema.fields().get(i), self.slots.get_mut(i)) else {
            return;
        };
        match &slot.history {
            Some(history) if field.should_blend() => {
                history.push(receive_timestamp, value);
                slot.tracker.record_source(source);
            }
            _ => {
                self.accessor.write_field(index, value);
                slot.tracker.accept_remote(value, source);
            }
        }
        self.track_owner(index, value);
    }

    fn track_owner(&mut self, index: u8, value: SyncValue) {
        if let (Some(owner_index), SyncValue::U32(owner)) = (self.schema.owner_authority_index(), value) {
            if owner_index == index {
                self.owner = owner;
            }
        }
    }

    /// Writes a blended value, keeping the author of the received samples.
    pub(crate) fn commit_blended(&mut self, index: u8, value: SyncValue) {
        if let Some(slot) = self.slots.get_mut(usize::from(index)) {
            self.accessor.write_field(index, value);
            let source = slot.tracker.last_set_by();
            slot.tracker.accept_remote(value, source);
        }
    }

    /// Samples the live values of the fields selected by `filter`.
    ///
    /// Indices of fields whose value changed are appended to `changed`;
    /// returns how many were appended. Skipped and unselected fields are
    /// neither read nor mutated.
    pub fn refresh(&mut self, filter: &RefreshFilter, changed: &mut Vec<u8>) -> usize {
        let before = changed.len();
        for (field, slot) in self.schema.fields().iter().zip(self.slots.iter_mut()) {
            // Unselected fields may be bound to another thread.
            if field.is_skipped() || !filter.matches(&field.group_key()) {
                continue;
            }
            let live = self.accessor.read_field(field.index());
            if slot.tracker.refresh(field, filter, live, self.local_authority) {
                changed.push(field.index());
            }
        }
        if let Some(index) = self
            .schema
            .owner_authority_index()
            .filter(|index| changed[before..].contains(index))
        {
            let value = self.accessor.read_field(index);
            self.track_owner(index, value);
        }
        changed.len() - before
    }
}

impl fmt::Debug for SyncCompanion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncCompanion")
            .field("schema", &self.schema.name())
            .field("fields", &self.slots.len())
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

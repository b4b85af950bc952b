//! # Change Tracking
//!
//! Each field keeps two snapshots of its value. A refresh shifts
//! `current` into `previous` and samples the live value into `current`;
//! the field has changed when the two differ.

use fieldsync_shared::{AuthorityId, AUTHORITY_UNSET};

use crate::schema::{FieldDescriptor, SyncGroupKey};
use crate::value::SyncValue;

/// Which fields a refresh pass touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshFilter {
    /// Every field.
    All,
    /// Only fields of one cadence group.
    Group(SyncGroupKey),
}

impl RefreshFilter {
    /// Returns true if `key` is selected by this filter.
    #[inline]
    #[must_use]
    pub fn matches(&self, key: &SyncGroupKey) -> bool {
        match self {
            Self::All => true,
            Self::Group(group) => group == key,
        }
    }
}

/// Current/previous snapshot pair for one field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChangeTracker {
    current: SyncValue,
    previous: SyncValue,
    last_set_by: AuthorityId,
}

impl ChangeTracker {
    /// Creates a tracker with both snapshots set to `initial`.
    #[must_use]
    pub const fn new(initial: SyncValue) -> Self {
        Self {
            current: initial,
            previous: initial,
            last_set_by: AUTHORITY_UNSET,
        }
    }

    /// Samples `live` if the field is selected and not skipped.
    ///
    /// Returns true if a refresh happened and the sampled value differs
    /// from the one before it. A refresh records `local` as the author
    /// when the value changed.
    pub fn refresh(
        &mut self,
        descriptor: &FieldDescriptor,
        filter: &RefreshFilter,
        live: SyncValue,
        local: AuthorityId,
    ) -> bool {
        if descriptor.is_skipped() || !filter.matches(&descriptor.group_key()) {
            return false;
        }
        self.previous = self.current;
        self.current = live;
        let changed = self.has_changed();
        if changed {
            self.last_set_by = local;
        }
        changed
    }

    /// True if the last refresh observed a new value.
    #[inline]
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.previous != self.current
    }

    /// Records a value received from `source`.
    ///
    /// Both snapshots take the value so the next refresh does not report
    /// it back as a local change.
    pub fn accept_remote(&mut self, value: SyncValue, source: AuthorityId) {
        self.current = value;
        self.previous = value;
        self.last_set_by = source;
    }

    /// Records `source` as the author without touching the snapshots.
    pub(crate) fn record_source(&mut self, source: AuthorityId) {
        self.last_set_by = source;
    }

    /// Most recently sampled value.
    #[inline]
    #[must_use]
    pub const fn current(&self) -> SyncValue {
        self.current
    }

    /// Value before the most recent sample.
    #[inline]
    #[must_use]
    pub const fn previous(&self) -> SyncValue {
        self.previous
    }

    /// Authority that produced the current value.
    #[inline]
    #[must_use]
    pub const fn last_set_by(&self) -> AuthorityId {
        self.last_set_by
    }
}

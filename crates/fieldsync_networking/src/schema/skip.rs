//! Runtime skip switches keyed by registration id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Skip switch resolved for one field.
///
/// Fields without a registration id carry an empty flag that is never set.
#[derive(Clone, Debug, Default)]
pub struct SkipFlag(Option<Arc<AtomicBool>>);

impl SkipFlag {
    /// A flag that is never set.
    #[must_use]
    pub const fn never() -> Self {
        Self(None)
    }

    /// Whether the field is currently excluded from synchronization.
    #[inline]
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.0.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// Registration id → skip switch lookup table.
///
/// Flipping a switch disables every field registered under that id, across
/// all companions, without rebuilding anything.
#[derive(Debug, Default)]
pub struct SkipRegistry {
    flags: RwLock<HashMap<u32, Arc<AtomicBool>>>,
}

impl SkipRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the switch for `registration_id`, creating it unset.
    #[must_use]
    pub fn resolve(&self, registration_id: u32) -> SkipFlag {
        if let Some(flag) = self.flags.read().get(&registration_id) {
            return SkipFlag(Some(Arc::clone(flag)));
        }
        let mut flags = self.flags.write();
        let flag = flags
            .entry(registration_id)
            .or_insert_with(|| Arc::new(AtomicBool::new(false)));
        SkipFlag(Some(Arc::clone(flag)))
    }

    /// Sets or clears the switch for `registration_id`.
    pub fn set_skipped(&self, registration_id: u32, skipped: bool) {
        if let Some(flag) = self.resolve(registration_id).0 {
            flag.store(skipped, Ordering::Relaxed);
        }
    }

    /// Current state of the switch for `registration_id`.
    #[must_use]
    pub fn is_skipped(&self, registration_id: u32) -> bool {
        self.flags
            .read()
            .get(&registration_id)
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

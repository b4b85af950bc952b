//! # Companion Registry
//!
//! Owns every live companion, keyed by entity id. Companions live in a
//! fixed-capacity [`SlotPool`]; on despawn their slot vectors and any
//! history buffer nobody else still holds are parked in [`Recycler`]s and
//! handed to the next spawn.

use std::collections::HashMap;
use std::sync::Arc;

use fieldsync_core::{PoolHandle, Recycler, RecyclerStats, SlotPool};
use fieldsync_shared::{AuthorityId, NetworkId};

use super::{FieldAccessor, FieldSlot, SyncCompanion};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::history::HistoryBuffer;
use crate::schema::SchemaDescriptor;

/// Parked slot vectors kept for reuse.
const MAX_PARKED_SLOT_VECS: usize = 256;

/// Parked history buffers kept for reuse.
const MAX_PARKED_HISTORIES: usize = 1024;

/// Entity id → companion resolution used by bundle encoding and decoding.
pub trait CompanionLookup {
    /// Companion of `entity`.
    fn companion(&self, entity: NetworkId) -> Option<&SyncCompanion>;

    /// Mutable companion of `entity`.
    fn companion_mut(&mut self, entity: NetworkId) -> Option<&mut SyncCompanion>;
}

impl CompanionLookup for HashMap<NetworkId, SyncCompanion> {
    fn companion(&self, entity: NetworkId) -> Option<&SyncCompanion> {
        self.get(&entity)
    }

    fn companion_mut(&mut self, entity: NetworkId) -> Option<&mut SyncCompanion> {
        self.get_mut(&entity)
    }
}

/// Storage reuse counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Live companions.
    pub live: usize,
    /// Slot vector reuse.
    pub slot_storage: RecyclerStats,
    /// History buffer reuse.
    pub histories: RecyclerStats,
}

struct Entry {
    entity: NetworkId,
    companion: SyncCompanion,
}

/// Pooled set of companions.
pub struct CompanionRegistry {
    config: SyncConfig,
    pool: SlotPool<Entry>,
    handles: HashMap<NetworkId, PoolHandle>,
    slot_storage: Recycler<Vec<FieldSlot>>,
    histories: Recycler<HistoryBuffer>,
}

impl CompanionRegistry {
    /// Creates a registry sized by `config.companion_pool_capacity`.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: SyncConfig) -> SyncResult<Self> {
        config.validate()?;
        let capacity = config.companion_pool_capacity;
        Ok(Self {
            config,
            pool: SlotPool::new(capacity),
            handles: HashMap::with_capacity(capacity),
            slot_storage: Recycler::new(MAX_PARKED_SLOT_VECS),
            histories: Recycler::new(MAX_PARKED_HISTORIES),
        })
    }

    /// Configuration companions are built with.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Creates the companion for `entity`.
    ///
    /// # Errors
    ///
    /// - [`SyncError::DuplicateEntity`] if `entity` already has one
    /// - [`SyncError::PoolExhausted`] if every slot is taken
    pub fn spawn(
        &mut self,
        entity: NetworkId,
        schema: Arc<SchemaDescriptor>,
        accessor: Box<dyn FieldAccessor>,
        owner: AuthorityId,
    ) -> SyncResult<&mut SyncCompanion> {
        if self.handles.contains_key(&entity) {
            return Err(SyncError::DuplicateEntity(entity));
        }
        let capacity = self.pool.capacity();
        if self.pool.free_count() == 0 {
            return Err(SyncError::PoolExhausted { capacity });
        }

        let slots = self.slot_storage.acquire().unwrap_or_default();
        let histories = &self.histories;
        let companion = SyncCompanion::assemble(schema, accessor, owner, &self.config, slots, |size| {
            histories.acquire_matching(|buffer| buffer.capacity() >= size).map_or_else(
                || HistoryBuffer::with_capacity(size),
                |mut buffer| {
                    buffer.reset(size);
                    buffer
                },
            )
        });

        tracing::debug!(entity, schema = companion.schema().name(), owner, "companion spawned");

        let handle = self
            .pool
            .insert(Entry { entity, companion })
            .map_err(|_| SyncError::PoolExhausted { capacity })?;
        self.handles.insert(entity, handle);

        self.pool
            .get_mut(handle)
            .map(|entry| &mut entry.companion)
            .ok_or(SyncError::UnknownEntity(entity))
    }

    /// Destroys the companion of `entity` and recycles its storage.
    ///
    /// # Errors
    ///
    /// [`SyncError::UnknownEntity`] if `entity` has no companion.
    pub fn despawn(&mut self, entity: NetworkId) -> SyncResult<()> {
        let handle = self.handles.remove(&entity).ok_or(SyncError::UnknownEntity(entity))?;
        let entry = self.pool.remove(handle).ok_or(SyncError::UnknownEntity(entity))?;

        let mut slots = entry.companion.into_slots();
        let mut recycled = 0usize;
        for history in slots.drain(..).filter_map(|slot| slot.history) {
            // Buffers still held by a blending consumer are left to it.
            if let Ok(buffer) = Arc::try_unwrap(history) {
                if self.histories.release(buffer) {
                    recycled += 1;
                }
            }
        }
        self.slot_storage.release(slots);

        tracing::debug!(entity, recycled_histories = recycled, "companion despawned");
        Ok(())
    }

    /// Companion of `entity`.
    #[must_use]
    pub fn get(&self, entity: NetworkId) -> Option<&SyncCompanion> {
        let handle = *self.handles.get(&entity)?;
        self.pool.get(handle).map(|entry| &entry.companion)
    }

    /// Mutable companion of `entity`.
    pub fn get_mut(&mut self, entity: NetworkId) -> Option<&mut SyncCompanion> {
        let handle = *self.handles.get(&entity)?;
        self.pool.get_mut(handle).map(|entry| &mut entry.companion)
    }

    /// Returns true if `entity` has a companion.
    #[must_use]
    pub fn contains(&self, entity: NetworkId) -> bool {
        self.handles.contains_key(&entity)
    }

    /// Number of live companions.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.pool.len()
    }

    /// Returns true if no companion is live.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Maximum number of live companions.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Iterates over live companions in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (NetworkId, &SyncCompanion)> {
        self.pool.iter().map(|(_, entry)| (entry.entity, &entry.companion))
    }

    /// Iterates mutably over live companions in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (NetworkId, &mut SyncCompanion)> {
        self.pool
            .iter_mut()
            .map(|(_, entry)| (entry.entity, &mut entry.companion))
    }

    /// Storage reuse counters.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            live: self.pool.len(),
            slot_storage: self.slot_storage.stats(),
            histories: self.histories.stats(),
        }
    }
}

impl CompanionLookup for CompanionRegistry {
    fn companion(&self, entity: NetworkId) -> Option<&SyncCompanion> {
        self.get(entity)
    }

    fn companion_mut(&mut self, entity: NetworkId) -> Option<&mut SyncCompanion> {
        self.get_mut(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::companion::FieldTable;
    use crate::config::{DEFAULT_HISTORY_MINIMUM_SIZE, DEFAULT_INTERPOLATION_LEAD_SECONDS};
    use crate::protocol::CodecRegistry;
    use crate::schema::{FieldSpec, SchemaBuilder, SkipRegistry};
    use crate::value::{SyncValue, ValueKind};

    fn schema() -> Arc<SchemaDescriptor> {
        Arc::new(
            SchemaBuilder::new("crate")
                .field(FieldSpec::new("open", ValueKind::Bool))
                .field(FieldSpec::new("height", ValueKind::F32).blend())
                .build(&CodecRegistry::new(), &SkipRegistry::new())
                .unwrap(),
        )
    }

    fn accessor() -> Box<dyn FieldAccessor> {
        Box::new(FieldTable::new(vec![SyncValue::Bool(false), SyncValue::F32(1.0)]))
    }

    fn registry(capacity: usize) -> CompanionRegistry {
        CompanionRegistry::new(SyncConfig {
            companion_pool_capacity: capacity,
            ..SyncConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_spawn_lookup_despawn() {
        let mut registry = registry(4);
        registry.spawn(10, schema(), accessor(), 1).unwrap();
        assert!(registry.contains(10));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(10).unwrap().owner(), 1);

        registry.despawn(10).unwrap();
        assert!(registry.get(10).is_none());
        assert!(registry.is_empty());
        assert_eq!(registry.despawn(10).unwrap_err(), SyncError::UnknownEntity(10));
    }

    #[test]
    fn test_duplicate_and_exhausted() {
        let mut registry = registry(1);
        registry.spawn(1, schema(), accessor(), 0).unwrap();
        assert_eq!(
            registry.spawn(1, schema(), accessor(), 0).unwrap_err(),
            SyncError::DuplicateEntity(1)
        );
        assert_eq!(
            registry.spawn(2, schema(), accessor(), 0).unwrap_err(),
            SyncError::PoolExhausted { capacity: 1 }
        );
    }

    #[test]
    fn test_storage_reused_across_respawn() {
        let mut registry = registry(4);
        registry.spawn(1, schema(), accessor(), 0).unwrap();
        registry.despawn(1).unwrap();
        registry.spawn(2, schema(), accessor(), 0).unwrap();

        let stats = registry.stats();
        assert_eq!(stats.live, 1);
        assert_eq!(stats.slot_storage.reused, 1);
        assert_eq!(stats.histories.reused, 1);

        let history = registry.get(2).unwrap().history(1).unwrap();
        assert!(history.is_empty());
        // 0.25s lead over the default 1/24s interval, plus headroom.
        assert_eq!(history.capacity(), 15);
    }

    #[test]
    fn test_small_parked_history_not_reused() {
        let fast = Arc::new(
            SchemaBuilder::new("fast")
                .field(FieldSpec::new("height", ValueKind::F32).blend().interval(0.01))
                .build(&CodecRegistry::new(), &SkipRegistry::new())
                .unwrap(),
        );
        let needed = fast
            .field(0)
            .unwrap()
            .history_capacity(DEFAULT_INTERPOLATION_LEAD_SECONDS, DEFAULT_HISTORY_MINIMUM_SIZE);
        assert!(needed > 15);

        let mut registry = registry(4);
        registry.spawn(1, schema(), accessor(), 0).unwrap();
        registry.despawn(1).unwrap();

        let table = FieldTable::new(vec![SyncValue::F32(0.0)]);
        registry.spawn(2, Arc::clone(&fast), Box::new(table), 0).unwrap();
        let stats = registry.stats();
        assert_eq!(stats.histories.reused, 0);
        assert_eq!(stats.histories.missed, 2);
        assert_eq!(registry.get(2).unwrap().history(0).unwrap().capacity(), needed);

        // A larger parked buffer serves a smaller request.
        registry.despawn(2).unwrap();
        registry.spawn(3, schema(), accessor(), 0).unwrap();
        assert_eq!(registry.stats().histories.reused, 1);
        assert_eq!(registry.get(3).unwrap().history(1).unwrap().capacity(), 15);
    }

    #[test]
    fn test_shared_history_not_recycled() {
        let mut registry = registry(4);
        registry.spawn(1, schema(), accessor(), 0).unwrap();
        let held = Arc::clone(registry.get(1).unwrap().history(1).unwrap());
        registry.despawn(1).unwrap();

        held.push(5, SyncValue::F32(2.0));
        registry.spawn(2, schema(), accessor(), 0).unwrap();
        assert_eq!(registry.stats().histories.reused, 0);
        assert!(registry.get(2).unwrap().history(1).unwrap().is_empty());
    }

    #[test]
    fn test_iter_mut_visits_all() {
        let mut registry = registry(8);
        for entity in [3, 5, 7] {
            registry.spawn(entity, schema(), accessor(), 0).unwrap();
        }
        let mut seen: Vec<_> = registry.iter_mut().map(|(entity, _)| entity).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![3, 5, 7]);
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let config = SyncConfig {
            companion_pool_capacity: 0,
            ..SyncConfig::default()
        };
        assert!(matches!(
            CompanionRegistry::new(config),
            Err(SyncError::InvalidConfig(_))
        ));
    }
}

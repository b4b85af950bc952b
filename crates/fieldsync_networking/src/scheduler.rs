//! # Sync Scheduler
//!
//! Decides which fields are sampled and sent on each tick.
//!
//! ## Tick Order
//!
//! ```text
//! 1. advance(elapsed)        → every cadence group accumulates time
//! 2. collect(entity, ..)     → due groups refresh and queue changes
//!    (once per companion, per thread role)
//! 3. finish_tick(out)        → queued changes drained in priority order
//! ```
//!
//! ## Send Rules
//!
//! - End-of-tick groups (interval 0) are due every tick
//! - Reliable fields and end-of-tick fields go out only when changed
//! - Unreliable fields with an interval go out every time they are due

use fieldsync_shared::{AuthorityId, NetworkId, Ticks};

use crate::companion::SyncCompanion;
use crate::schema::{Reliability, SchedulingPriority, SchemaDescriptor, SyncGroupKey};
use crate::tracker::RefreshFilter;
use crate::value::SyncValue;

/// Thread a collection pass runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ThreadRole {
    /// The thread that owns primary-thread-only fields.
    Primary,
    /// Any other thread.
    Worker,
}

impl ThreadRole {
    /// Returns true if fields of `key` are sampled on this role.
    #[inline]
    #[must_use]
    pub const fn handles(self, key: &SyncGroupKey) -> bool {
        match self {
            Self::Primary => key.must_run_on_primary_thread,
            Self::Worker => !key.must_run_on_primary_thread,
        }
    }
}

/// One outgoing field update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldChange {
    /// Entity the field belongs to.
    pub entity: NetworkId,
    /// Field index.
    pub index: u8,
    /// Value to send.
    pub value: SyncValue,
    /// Delivery class.
    pub reliability: Reliability,
    /// Send ordering key.
    pub priority: SchedulingPriority,
    /// Authority that produced the value.
    pub set_by: AuthorityId,
}

/// Per-group cadence state.
#[derive(Clone, Copy, Debug)]
struct GroupClock {
    key: SyncGroupKey,
    accumulator: Ticks,
    due: bool,
}

impl GroupClock {
    fn advance(&mut self, elapsed: Ticks) {
        let interval = self.key.interval_ticks;
        if interval <= 0 {
            self.due = true;
            return;
        }
        self.accumulator += elapsed.max(0);
        if self.accumulator >= interval {
            self.due = true;
            // A stall sends once, not once per missed interval.
            self.accumulator %= interval;
        }
    }
}

/// Cadence groups, due flags and the queue of outgoing changes.
#[derive(Debug, Default)]
pub struct SyncScheduler {
    groups: Vec<GroupClock>,
    pending: Vec<FieldChange>,
    changed: Vec<u8>,
    tick_count: u64,
}

impl SyncScheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the cadence groups used by `schema`.
    pub fn register_schema(&mut self, schema: &SchemaDescriptor) {
        for key in schema.group_keys() {
            if !self.groups.iter().any(|g| g.key == key) {
                self.groups.push(GroupClock {
                    key,
                    accumulator: 0,
                    due: false,
                });
            }
        }
    }

    /// Number of registered groups.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Ticks advanced so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Starts a tick: accumulates `elapsed_ticks` and marks due groups.
    pub fn advance(&mut self, elapsed_ticks: Ticks) {
        self.tick_count += 1;
        for group in &mut self.groups {
            group.advance(elapsed_ticks);
        }
    }

    /// Returns true if `key` is due this tick.
    #[must_use]
    pub fn is_due(&self, key: &SyncGroupKey) -> bool {
        self.groups.iter().any(|g| g.key == *key && g.due)
    }

    /// Refreshes the due groups of `companion` handled by `role` and
    /// queues the resulting changes.
    ///
    /// Returns the number of changes queued.
    pub fn collect(&mut self, entity: NetworkId, companion: &mut SyncCompanion, role: ThreadRole) -> usize {
        let before = self.pending.len();
        for group in self.groups.iter().filter(|g| g.due && role.handles(&g.key)) {
            let key = group.key;
            self.changed.clear();
            companion.refresh(&RefreshFilter::Group(key), &mut self.changed);

            if key.reliability == Reliability::Unreliable && !key.is_end_of_tick() {
                let sampled = companion
                    .schema()
                    .fields()
                    .iter()
                    .filter(|f| !f.is_identity() && !f.is_skipped() && f.group_key() == key);
                for field in sampled {
                    if let Some(tracker) = companion.tracker(field.index()) {
                        self.pending.push(FieldChange {
                            entity,
                            index: field.index(),
                            value: tracker.current(),
                            reliability: key.reliability,
                            priority: field.scheduling_priority(),
                            set_by: tracker.last_set_by(),
                        });
                    }
                }
            } else {
                for &index in &self.changed {
                    let (Ok(field), Some(tracker)) = (companion.descriptor(index), companion.tracker(index)) else {
                        continue;
                    };
                    self.pending.push(FieldChange {
                        entity,
                        index,
                        value: tracker.current(),
                        reliability: key.reliability,
                        priority: field.scheduling_priority(),
                        set_by: tracker.last_set_by(),
                    });
                }
            }
        }
        self.pending.len() - before
    }

    /// Ends the tick: appends queued changes to `out` ordered by
    /// priority, then entity, then field index, and clears due flags.
    pub fn finish_tick(&mut self, out: &mut Vec<FieldChange>) {
        self.pending
            .sort_unstable_by_key(|c| (c.priority, c.entity, c.index));
        out.append(&mut self.pending);
        for group in &mut self.groups {
            group.due = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::companion::FieldTable;
    use crate::config::SyncConfig;
    use crate::protocol::CodecRegistry;
    use crate::schema::{FieldSpec, SchemaBuilder, SkipRegistry};
    use crate::value::ValueKind;
    use fieldsync_shared::TICKS_PER_SECOND;
    use std::sync::Arc;

    const TENTH: Ticks = TICKS_PER_SECOND / 10;

    fn schema() -> Arc<SchemaDescriptor> {
        Arc::new(
            SchemaBuilder::new("sched")
                .with_identity()
                .field(FieldSpec::new("score", ValueKind::I32).interval(0.0).priority(1))
                .field(FieldSpec::new("speed", ValueKind::F32).interval(0.1).unreliable())
                .field(FieldSpec::new("anim", ValueKind::U8).interval(0.0).primary_thread())
                .field(FieldSpec::new("urgent", ValueKind::Bool).interval(0.0).priority_override(2))
                .field(FieldSpec::new("loud", ValueKind::Bool).interval(0.0).priority(50))
                .build(&CodecRegistry::with_defaults().unwrap(), &SkipRegistry::new())
                .unwrap(),
        )
    }

    fn spawn(schema: &Arc<SchemaDescriptor>) -> (SyncCompanion, FieldTable) {
        let table = FieldTable::new(vec![
            SyncValue::Identity(1),
            SyncValue::I32(0),
            SyncValue::F32(0.0),
            SyncValue::U8(0),
            SyncValue::Bool(false),
            SyncValue::Bool(false),
        ]);
        let config = SyncConfig {
            local_authority: 9,
            ..SyncConfig::default()
        };
        let companion = SyncCompanion::new(Arc::clone(schema), Box::new(table.clone()), 9, &config);
        (companion, table)
    }

    fn run_tick(scheduler: &mut SyncScheduler, entities: &mut [(NetworkId, &mut SyncCompanion)], elapsed: Ticks) -> Vec<FieldChange> {
        scheduler.advance(elapsed);
        for (entity, companion) in entities.iter_mut() {
            scheduler.collect(*entity, companion, ThreadRole::Worker);
            scheduler.collect(*entity, companion, ThreadRole::Primary);
        }
        let mut out = Vec::new();
        scheduler.finish_tick(&mut out);
        out
    }

    #[test]
    fn test_reliable_sent_only_on_change() {
        let schema = schema();
        let (mut companion, table) = spawn(&schema);
        let mut scheduler = SyncScheduler::new();
        scheduler.register_schema(&schema);

        let idle = run_tick(&mut scheduler, &mut [(1, &mut companion)], TENTH / 2);
        assert!(idle.is_empty());

        table.set(1, SyncValue::I32(12));
        let changes = run_tick(&mut scheduler, &mut [(1, &mut companion)], TENTH / 4);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].index, 1);
        assert_eq!(changes[0].value, SyncValue::I32(12));
        assert_eq!(changes[0].set_by, 9);
        assert_eq!(changes[0].reliability, Reliability::Reliable);
    }

    #[test]
    fn test_unreliable_sampled_on_cadence() {
        let schema = schema();
        let (mut companion, _) = spawn(&schema);
        let mut scheduler = SyncScheduler::new();
        scheduler.register_schema(&schema);

        let early = run_tick(&mut scheduler, &mut [(1, &mut companion)], TENTH / 2);
        assert!(early.iter().all(|c| c.index != 2));

        // Unchanged but due: still sent.
        let due = run_tick(&mut scheduler, &mut [(1, &mut companion)], TENTH / 2);
        assert_eq!(due.iter().filter(|c| c.index == 2).count(), 1);
        assert_eq!(due[0].reliability, Reliability::Unreliable);

        let again = run_tick(&mut scheduler, &mut [(1, &mut companion)], TENTH / 2);
        assert!(again.iter().all(|c| c.index != 2));
    }

    #[test]
    fn test_thread_role_selects_groups() {
        let schema = schema();
        let (mut companion, table) = spawn(&schema);
        let mut scheduler = SyncScheduler::new();
        scheduler.register_schema(&schema);

        table.set(3, SyncValue::U8(4));
        scheduler.advance(1);
        assert_eq!(scheduler.collect(1, &mut companion, ThreadRole::Worker), 0);
        assert_eq!(companion.tracker(3).unwrap().current(), SyncValue::U8(0));
        assert_eq!(scheduler.collect(1, &mut companion, ThreadRole::Primary), 1);
    }

    #[test]
    fn test_priority_then_entity_then_index() {
        let schema = schema();
        let (mut a, table_a) = spawn(&schema);
        let (mut b, table_b) = spawn(&schema);
        let mut scheduler = SyncScheduler::new();
        scheduler.register_schema(&schema);

        for table in [&table_a, &table_b] {
            table.set(1, SyncValue::I32(1));
            table.set(4, SyncValue::Bool(true));
            table.set(5, SyncValue::Bool(true));
        }

        let changes = run_tick(&mut scheduler, &mut [(20, &mut b), (10, &mut a)], 1);
        let order: Vec<_> = changes.iter().map(|c| (c.entity, c.index)).collect();
        assert_eq!(
            order,
            vec![(10, 4), (20, 4), (10, 5), (20, 5), (10, 1), (20, 1)]
        );
    }

    #[test]
    fn test_groups_registered_once() {
        let schema = schema();
        let mut scheduler = SyncScheduler::new();
        scheduler.register_schema(&schema);
        scheduler.register_schema(&schema);
        assert_eq!(scheduler.group_count(), schema.group_keys().len());
        assert_eq!(scheduler.tick_count(), 0);
    }

    #[test]
    fn test_stall_sends_once() {
        let mut clock = GroupClock {
            key: SyncGroupKey {
                interval_ticks: 10,
                reliability: Reliability::Unreliable,
                must_run_on_primary_thread: false,
            },
            accumulator: 0,
            due: false,
        };
        clock.advance(35);
        assert!(clock.due);
        assert_eq!(clock.accumulator, 5);
    }
}

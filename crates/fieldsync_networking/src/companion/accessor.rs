//! # Field Accessors
//!
//! The seam between a companion and the object whose fields it mirrors.
//!
//! ```text
//! fieldsync defines:        the host implements:
//! ┌───────────────────┐    ┌────────────────────────┐
//! │ trait FieldAccess │ ←─ │ impl for its entities  │
//! └───────────────────┘    └────────────────────────┘
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::value::SyncValue;

/// Read/write access to the live values of one entity's fields.
///
/// Indices are schema indices. Values passed to `write_field` always
/// carry the field's declared kind.
pub trait FieldAccessor: Send {
    /// Reads the live value of field `index`.
    fn read_field(&self, index: u8) -> SyncValue;

    /// Writes a received or blended value into field `index`.
    fn write_field(&mut self, index: u8, value: SyncValue);
}

/// A field store shared between a companion and its host.
///
/// Useful for entities with no native object behind them. Clones share
/// the same storage.
#[derive(Clone, Debug)]
pub struct FieldTable {
    values: Arc<Mutex<Vec<SyncValue>>>,
}

impl FieldTable {
    /// Creates a table holding `values`, indexed by field index.
    #[must_use]
    pub fn new(values: Vec<SyncValue>) -> Self {
        Self {
            values: Arc::new(Mutex::new(values)),
        }
    }

    /// Current value of field `index`.
    #[must_use]
    pub fn get(&self, index: u8) -> Option<SyncValue> {
        self.values.lock().get(usize::from(index)).copied()
    }

    /// Overwrites field `index`. Out-of-range writes are ignored.
    pub fn set(&self, index: u8, value: SyncValue) {
        if let Some(slot) = self.values.lock().get_mut(usize::from(index)) {
            *slot = value;
        }
    }

    /// Copy of every value.
    #[must_use]
    pub fn snapshot(&self) -> Vec<SyncValue> {
        self.values.lock().clone()
    }
}

impl FieldAccessor for FieldTable {
    fn read_field(&self, index: u8) -> SyncValue {
        // Unknown indices read as a neutral value.
        self.get(index).unwrap_or(SyncValue::Bool(false))
    }

    fn write_field(&mut self, index: u8, value: SyncValue) {
        self.set(index, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_storage() {
        let table = FieldTable::new(vec![SyncValue::U8(1), SyncValue::F32(0.0)]);
        let mut accessor: Box<dyn FieldAccessor> = Box::new(table.clone());

        accessor.write_field(1, SyncValue::F32(2.5));
        assert_eq!(table.get(1), Some(SyncValue::F32(2.5)));

        table.set(0, SyncValue::U8(9));
        assert_eq!(accessor.read_field(0), SyncValue::U8(9));
    }

    #[test]
    fn test_out_of_range_ignored() {
        let table = FieldTable::new(vec![SyncValue::U8(1)]);
        table.set(5, SyncValue::U8(2));
        assert_eq!(table.get(5), None);
        assert_eq!(table.snapshot(), vec![SyncValue::U8(1)]);
    }
}

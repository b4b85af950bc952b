//! # Slot Pool
//!
//! Fixed-capacity slot allocator with generational handles.

/// A pool of fixed-capacity slots.
///
/// Values can be inserted and removed individually in O(1). Every slot
/// carries a generation counter that is bumped on removal, so a handle
/// kept past its value's lifetime no longer resolves.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Use one pool per thread or wrap in a mutex.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool: SlotPool<Companion> = SlotPool::new(4096);
///
/// // Insert - O(1), no heap allocation
/// let handle = pool.insert(companion)?;
///
/// // Remove - O(1), slot goes back on the free list
/// let companion = pool.remove(handle);
/// ```
pub struct SlotPool<T> {
    /// The storage array.
    slots: Box<[Slot<T>]>,
    /// Free list - indices of available slots.
    free_list: Vec<u32>,
    /// Number of occupied slots.
    len: usize,
}

struct Slot<T> {
    value: Option<T>,
    generation: u32,
}

/// Handle to an occupied slot in a [`SlotPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    index: u32,
    generation: u32,
}

impl PoolHandle {
    /// Slot index inside the pool.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.index as usize
    }

    /// Generation of the slot when this handle was issued.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl<T> SlotPool<T> {
    /// Creates a new pool with the specified capacity.
    ///
    /// All slots are allocated upfront.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or does not fit in a `u32`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        let top = u32::try_from(capacity).unwrap_or_else(|_| panic!("Capacity exceeds u32 range"));

        let slots: Vec<Slot<T>> = (0..capacity)
            .map(|_| Slot { value: None, generation: 0 })
            .collect();

        // Lowest index is handed out first
        let free_list: Vec<u32> = (0..top).rev().collect();

        Self {
            slots: slots.into_boxed_slice(),
            free_list,
            len: 0,
        }
    }

    /// Returns the total capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of occupied slots.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no slot is occupied.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of free slots.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    /// Stores a value in a free slot.
    ///
    /// # Errors
    ///
    /// Hands the value back when the pool is full.
    pub fn insert(&mut self, value: T) -> Result<PoolHandle, T> {
        let Some(index) = self.free_list.pop() else {
            return Err(value);
        };

        let slot = &mut self.slots[index as usize];
        slot.value = Some(value);
        self.len += 1;

        Ok(PoolHandle {
            index,
            generation: slot.generation,
        })
    }

    /// Removes a value and releases its slot.
    ///
    /// Returns None if the handle is stale or out of range.
    pub fn remove(&mut self, handle: PoolHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }

        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index);
        self.len -= 1;

        Some(value)
    }

    /// Returns true if the handle still resolves to a live value.
    #[inline]
    #[must_use]
    pub fn contains(&self, handle: PoolHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Gets a reference to a stored value.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    /// Gets a mutable reference to a stored value.
    #[inline]
    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Removes every value, invalidating all outstanding handles.
    pub fn clear(&mut self) {
        self.free_list.clear();
        for (index, slot) in self.slots.iter_mut().enumerate().rev() {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            #[allow(clippy::cast_possible_truncation)]
            self.free_list.push(index as u32);
        }
        self.len = 0;
    }

    /// Iterates over all stored values.
    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            #[allow(clippy::cast_possible_truncation)]
            let handle = PoolHandle {
                index: index as u32,
                generation: slot.generation,
            };
            slot.value.as_ref().map(|v| (handle, v))
        })
    }

    /// Iterates mutably over all stored values.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PoolHandle, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            #[allow(clippy::cast_possible_truncation)]
            let handle = PoolHandle {
                index: index as u32,
                generation: slot.generation,
            };
            slot.value.as_mut().map(|v| (handle, v))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_insert_remove() {
        let mut pool: SlotPool<u32> = SlotPool::new(10);

        let h1 = pool.insert(42).unwrap();
        assert_eq!(*pool.get(h1).unwrap(), 42);
        assert_eq!(pool.len(), 1);

        let removed = pool.remove(h1).unwrap();
        assert_eq!(removed, 42);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_pool_full_hands_value_back() {
        let mut pool: SlotPool<u8> = SlotPool::new(2);

        let _ = pool.insert(1).unwrap();
        let _ = pool.insert(2).unwrap();
        assert_eq!(pool.insert(3), Err(3));
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn test_pool_reuse_bumps_generation() {
        let mut pool: SlotPool<u32> = SlotPool::new(1);

        let h1 = pool.insert(1).unwrap();
        pool.remove(h1);

        let h2 = pool.insert(2).unwrap();
        assert_eq!(h1.index(), h2.index()); // Same slot reused
        assert_ne!(h1.generation(), h2.generation());
        assert!(pool.get(h1).is_none());
        assert_eq!(*pool.get(h2).unwrap(), 2);
        assert!(pool.remove(h1).is_none());
    }

    #[test]
    fn test_pool_clear_invalidates_handles() {
        let mut pool: SlotPool<u32> = SlotPool::new(4);
        let handles: Vec<_> = (0..3).map(|v| pool.insert(v).unwrap()).collect();

        pool.clear();

        assert!(pool.is_empty());
        assert_eq!(pool.free_count(), 4);
        assert!(handles.iter().all(|h| !pool.contains(*h)));
    }

    #[test]
    fn test_pool_iter_skips_free_slots() {
        let mut pool: SlotPool<u32> = SlotPool::new(4);
        let a = pool.insert(10).unwrap();
        let _b = pool.insert(20).unwrap();
        pool.remove(a);

        let values: Vec<u32> = pool.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![20]);

        for (_, v) in pool.iter_mut() {
            *v += 1;
        }
        assert_eq!(pool.iter().map(|(_, v)| *v).sum::<u32>(), 21);
    }
}

//! # FIELDSYNC Core
//!
//! Pooled memory for synchronization state that lives and dies with entities.
//!
//! ## Architecture Rules
//!
//! 1. **Sized once** - Pools are created at startup with a fixed capacity
//! 2. **Recycle, don't free** - Storage released on despawn is handed to the next spawn
//! 3. **Stale handles fail** - A handle to a freed slot never resolves to its successor
//!
//! ## Example
//!
//! ```rust,ignore
//! use fieldsync_core::{SlotPool, Recycler};
//!
//! let mut pool: SlotPool<Companion> = SlotPool::new(4096);
//! let buffers: Recycler<Vec<u8>> = Recycler::new(256);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod memory;

pub use memory::{PoolHandle, Recycler, RecyclerStats, SlotPool};

//! # Memory Management
//!
//! Pre-allocated pools and recyclers for churny entity workloads.
//!
//! ## Design Philosophy
//!
//! Entities are created and destroyed constantly. Their synchronization
//! state is not:
//! - Slots are reused through a free list
//! - Buffers are parked on despawn and handed out again on spawn

mod pool;
mod recycler;

pub use pool::{PoolHandle, SlotPool};
pub use recycler::{Recycler, RecyclerStats};

//! # FIELDSYNC Shared
//!
//! Common types used by every peer in a synchronization session.
//!
//! ## CRITICAL RULE
//!
//! The layout of everything in here is part of the wire contract.
//! Both ends of a session must be built against the same version.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod constants;
pub mod math;

pub use constants::{
    seconds_to_ticks, ticks_to_seconds, AuthorityId, NetworkId, Ticks, AUTHORITY_SERVER,
    AUTHORITY_UNSET, TICKS_PER_SECOND,
};
pub use math::{lerp, Quaternion, Vec2, Vec3, Vec4};

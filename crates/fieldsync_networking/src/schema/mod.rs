//! # Field Schemas
//!
//! Per-field static configuration and the builder that validates it.
//!
//! A [`SchemaDescriptor`] is computed once per distinct field set and
//! shared (`Arc`) by every companion using it. Fields are addressed by a
//! dense `u8` index; the identity field, when present, is always index 0.

mod builder;
mod descriptor;
mod skip;

pub use builder::{FieldSpec, SchemaBuilder, SchemaDescriptor, SchemaSpec, MAX_FIELDS};
pub use descriptor::{
    FieldDescriptor, Reliability, SchedulingPriority, SyncGroupKey, IDENTITY_PRIORITY_OVERRIDE,
    OWNER_AUTHORITY_PRIORITY_OVERRIDE, PRIORITY_OVERRIDE_UNSET,
};
pub use skip::{SkipFlag, SkipRegistry};

//! # FIELDSYNC Networking - The Field Synchronization Engine
//!
//! Keeps the fields of networked entities consistent between peers, at
//! the lowest bit cost that still reproduces them.
//!
//! ## Architecture
//!
//! - **Schema**: per-field static configuration, validated once per field set
//! - **Protocol**: bit-granular stream, quantization and pluggable codecs
//! - **Tracking**: current/previous snapshots decide what changed
//! - **History**: time-ordered samples for blended fields
//! - **Scheduling**: cadence groups and priority ordering for outgoing changes
//! - **Authority**: a peer never receives values it authored
//!
//! ## Data Flow
//!
//! ```text
//! SENDER                                          RECEIVER
//!   advance ─▶ collect ─▶ finish_tick               decode_bundle
//!                              │                        │
//!                        encode_bundle ──▶ Outbox ──▶ commit ─┬─▶ accessor
//!                                                             └─▶ history ─▶ blend
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use fieldsync_networking::{CompanionRegistry, FieldSpec, SyncConfig, ValueKind};
//!
//! let config = SyncConfig::default();
//! let schema = config
//!     .schema_builder("player")
//!     .with_identity()
//!     .field(FieldSpec::new("position", ValueKind::Vec3).blend().unreliable())
//!     .build(&codecs, &skips)?;
//!
//! let mut registry = CompanionRegistry::new(config)?;
//! registry.spawn(entity, Arc::new(schema), Box::new(accessor), owner)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod bundle;
pub mod companion;
pub mod config;
pub mod error;
pub mod history;
pub mod interpolation;
pub mod outbox;
pub mod protocol;
pub mod scheduler;
pub mod schema;
pub mod tracker;
pub mod value;

// Re-exports for convenience
pub use bundle::{decode_bundle, encode_bundle, BundleDecoder};
pub use companion::{CompanionLookup, CompanionRegistry, FieldAccessor, FieldTable, RegistryStats, SyncCompanion};
pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use history::{history_capacity, HistoryBuffer, HistorySample};
pub use interpolation::{BlendSettings, BlendingConsumer};
pub use outbox::{Outbox, OutboxReceiver, OutgoingPayload};
pub use protocol::{BitReader, BitWriter, CodecRegistry, CustomCodec, QuantizationRange, Quantizer};
pub use scheduler::{FieldChange, SyncScheduler, ThreadRole};
pub use schema::{
    FieldDescriptor, FieldSpec, Reliability, SchedulingPriority, SchemaBuilder, SchemaDescriptor, SchemaSpec,
    SkipRegistry, SyncGroupKey,
};
pub use tracker::{ChangeTracker, RefreshFilter};
pub use value::{SyncValue, ValueKind};

pub use fieldsync_shared::{AuthorityId, NetworkId, Ticks, AUTHORITY_SERVER, AUTHORITY_UNSET, TICKS_PER_SECOND};

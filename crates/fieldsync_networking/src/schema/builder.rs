//! # Schema Building
//!
//! Turns declarative [`FieldSpec`]s (written in code or loaded from TOML)
//! into a validated [`SchemaDescriptor`]. Every codec lookup, quantizer
//! and skip switch is resolved here, once per distinct field set.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::descriptor::{
    FieldDescriptor, Reliability, SyncGroupKey, IDENTITY_PRIORITY_OVERRIDE, OWNER_AUTHORITY_PRIORITY_OVERRIDE,
    PRIORITY_OVERRIDE_UNSET,
};
use super::skip::{SkipFlag, SkipRegistry};
use crate::config::DEFAULT_SYNC_INTERVAL_SECONDS;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{CodecRef, CodecRegistry, CustomCodec, IdentityCodec, QuantizationRange, IDENTITY};
use crate::value::{SyncValue, ValueKind};

/// Maximum number of fields an entity can declare (indices are `u8`).
pub const MAX_FIELDS: usize = 256;

const fn unset_override() -> i32 {
    PRIORITY_OVERRIDE_UNSET
}

/// Declarative description of one field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name.
    pub name: String,
    /// Declared value kind.
    pub kind: ValueKind,
    /// Live value may only be read on the primary thread.
    #[serde(default)]
    pub must_run_on_primary_thread: bool,
    /// Declared priority (higher goes first).
    #[serde(default)]
    pub processing_priority: i32,
    /// Internal override (lower goes first, `i32::MAX` = unset).
    #[serde(default = "unset_override")]
    pub priority_override: i32,
    /// Sample interval; `None` takes the schema default.
    #[serde(default)]
    pub sync_interval_seconds: Option<f32>,
    /// Delivery class.
    #[serde(default)]
    pub reliability: Reliability,
    /// Route received values through history for blending.
    #[serde(default)]
    pub should_blend: bool,
    /// Quantization range.
    #[serde(default)]
    pub quantization: QuantizationRange,
    /// Fixed bit width for small unsigned integers.
    #[serde(default)]
    pub packed_bits: Option<u8>,
    /// Encode relative to this value.
    #[serde(default)]
    pub baseline: Option<SyncValue>,
    /// Custom codec name.
    #[serde(default)]
    pub codec: Option<String>,
    /// Registration id of the skip switch gating this field.
    #[serde(default)]
    pub skip_registration: Option<u32>,
}

impl FieldSpec {
    /// A reliable field with default settings.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            must_run_on_primary_thread: false,
            processing_priority: 0,
            priority_override: PRIORITY_OVERRIDE_UNSET,
            sync_interval_seconds: None,
            reliability: Reliability::Reliable,
            should_blend: false,
            quantization: QuantizationRange::DISABLED,
            packed_bits: None,
            baseline: None,
            codec: None,
            skip_registration: None,
        }
    }

    /// Marks the field as primary-thread only.
    #[must_use]
    pub const fn primary_thread(mut self) -> Self {
        self.must_run_on_primary_thread = true;
        self
    }

    /// Sets the declared priority.
    #[must_use]
    pub const fn priority(mut self, priority: i32) -> Self {
        self.processing_priority = priority;
        self
    }

    /// Sets the internal priority override.
    #[must_use]
    pub const fn priority_override(mut self, priority_override: i32) -> Self {
        self.priority_override = priority_override;
        self
    }

    /// Sets the sample interval.
    #[must_use]
    pub const fn interval(mut self, seconds: f32) -> Self {
        self.sync_interval_seconds = Some(seconds);
        self
    }

    /// Switches to unreliable delivery.
    #[must_use]
    pub const fn unreliable(mut self) -> Self {
        self.reliability = Reliability::Unreliable;
        self
    }

    /// Routes received values through history.
    #[must_use]
    pub const fn blend(mut self) -> Self {
        self.should_blend = true;
        self
    }

    /// Enables quantization.
    #[must_use]
    pub const fn quantize(mut self, min: f32, max: f32, bits: u8) -> Self {
        self.quantization = QuantizationRange::new(min, max, bits);
        self
    }

    /// Packs a small unsigned integer into `bits` bits.
    #[must_use]
    pub const fn packed(mut self, bits: u8) -> Self {
        self.packed_bits = Some(bits);
        self
    }

    /// Encodes relative to `baseline`.
    #[must_use]
    pub const fn baseline(mut self, baseline: SyncValue) -> Self {
        self.baseline = Some(baseline);
        self
    }

    /// Uses the named custom codec.
    #[must_use]
    pub fn codec(mut self, name: impl Into<String>) -> Self {
        self.codec = Some(name.into());
        self
    }

    /// Gates the field behind a skip switch.
    #[must_use]
    pub const fn skip_registration(mut self, registration_id: u32) -> Self {
        self.skip_registration = Some(registration_id);
        self
    }
}

/// Declarative description of a whole field set, loadable from TOML.
///
/// ```toml
/// name = "player"
/// identity = true
/// owner_authority = true
///
/// [[fields]]
/// name = "position"
/// kind = "Vec3"
/// should_blend = true
/// reliability = "Unreliable"
/// sync_interval_seconds = 0.05
/// codec = "vector.quantized"
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchemaSpec {
    /// Schema name.
    pub name: String,
    /// Reserve index 0 for the identity field.
    #[serde(default)]
    pub identity: bool,
    /// Reserve the next index for the synced owner authority.
    #[serde(default)]
    pub owner_authority: bool,
    /// Default interval for fields that declare none.
    #[serde(default)]
    pub default_interval_seconds: Option<f32>,
    /// Field declarations in index order (after identity).
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

impl SchemaSpec {
    /// Parses a schema from TOML.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidConfig`] on malformed TOML.
    pub fn from_toml_str(source: &str) -> SyncResult<Self> {
        toml::from_str(source).map_err(|e| SyncError::InvalidConfig(e.to_string()))
    }

    /// Reads and parses a schema file.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidConfig`] if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| SyncError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }
}

/// Builds a [`SchemaDescriptor`].
#[derive(Clone, Debug)]
pub struct SchemaBuilder {
    spec: SchemaSpec,
}

impl SchemaBuilder {
    /// Starts an empty schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            spec: SchemaSpec {
                name: name.into(),
                identity: false,
                owner_authority: false,
                default_interval_seconds: None,
                fields: Vec::new(),
            },
        }
    }

    /// Starts from a declarative spec.
    #[must_use]
    pub const fn from_spec(spec: SchemaSpec) -> Self {
        Self { spec }
    }

    /// Reserves index 0 for the identity field.
    #[must_use]
    pub const fn with_identity(mut self) -> Self {
        self.spec.identity = true;
        self
    }

    /// Reserves the index after identity for the entity's owner authority.
    ///
    /// The field is a reliable `U32` that is sent right after identity;
    /// companions keep it in step with [`SyncCompanion::owner`].
    ///
    /// [`SyncCompanion::owner`]: crate::SyncCompanion::owner
    #[must_use]
    pub const fn with_owner_authority(mut self) -> Self {
        self.spec.owner_authority = true;
        self
    }

    /// Interval for fields that declare none.
    #[must_use]
    pub const fn default_interval(mut self, seconds: f32) -> Self {
        self.spec.default_interval_seconds = Some(seconds);
        self
    }

    /// Appends a field; indices follow declaration order.
    #[must_use]
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.spec.fields.push(field);
        self
    }

    /// Validates every field and resolves codecs and skip switches.
    ///
    /// # Errors
    ///
    /// - [`SyncError::TooManyFields`] past [`MAX_FIELDS`]
    /// - [`SyncError::UnknownCodec`] / [`SyncError::UnsupportedCodec`]
    /// - [`SyncError::InvalidQuantization`]
    /// - [`SyncError::InvalidConfig`] for any other inconsistent declaration
    pub fn build(self, codecs: &CodecRegistry, skips: &SkipRegistry) -> SyncResult<SchemaDescriptor> {
        let SchemaSpec {
            name,
            identity,
            owner_authority,
            default_interval_seconds,
            fields: specs,
        } = self.spec;

        let total = specs.len() + usize::from(identity) + usize::from(owner_authority);
        if total > MAX_FIELDS {
            return Err(SyncError::TooManyFields(total));
        }
        let default_interval = default_interval_seconds.unwrap_or(DEFAULT_SYNC_INTERVAL_SECONDS);

        let mut fields = Vec::with_capacity(total);
        if identity {
            fields.push(identity_descriptor(codecs));
        }
        #[allow(clippy::cast_possible_truncation)]
        let owner_authority_index = owner_authority.then_some(fields.len() as u8);
        if let Some(index) = owner_authority_index {
            fields.push(owner_authority_descriptor(index));
        }
        for spec in specs {
            #[allow(clippy::cast_possible_truncation)]
            let index = fields.len() as u8;
            fields.push(build_field(index, spec, default_interval, codecs, skips)?);
        }

        Ok(SchemaDescriptor {
            name,
            fields: fields.into_boxed_slice(),
            identity_index: identity.then_some(0),
            owner_authority_index,
        })
    }
}

fn identity_descriptor(codecs: &CodecRegistry) -> FieldDescriptor {
    let codec = codecs
        .resolve(IDENTITY)
        .unwrap_or_else(|_| Arc::new(IdentityCodec) as Arc<dyn CustomCodec>);
    FieldDescriptor {
        index: 0,
        name: "identity".to_string(),
        kind: ValueKind::Identity,
        must_run_on_primary_thread: false,
        processing_priority: 0,
        priority_override: IDENTITY_PRIORITY_OVERRIDE,
        sync_interval_seconds: 0.0,
        reliability: Reliability::Reliable,
        should_blend: false,
        quantization: QuantizationRange::DISABLED,
        quantizer: None,
        packed_bits: None,
        baseline: None,
        codec: CodecRef::Custom(codec),
        skip: SkipFlag::never(),
        is_identity: true,
    }
}

fn owner_authority_descriptor(index: u8) -> FieldDescriptor {
    FieldDescriptor {
        index,
        name: "owner_authority".to_string(),
        kind: ValueKind::U32,
        must_run_on_primary_thread: false,
        processing_priority: 0,
        priority_override: OWNER_AUTHORITY_PRIORITY_OVERRIDE,
        sync_interval_seconds: 0.0,
        reliability: Reliability::Reliable,
        should_blend: false,
        quantization: QuantizationRange::DISABLED,
        quantizer: None,
        packed_bits: None,
        baseline: None,
        codec: CodecRef::Native,
        skip: SkipFlag::never(),
        is_identity: false,
    }
}

fn invalid(spec: &FieldSpec, reason: &str) -> SyncError {
    SyncError::InvalidConfig(format!("field '{}': {reason}", spec.name))
}

fn build_field(
    index: u8,
    spec: FieldSpec,
    default_interval: f32,
    codecs: &CodecRegistry,
    skips: &SkipRegistry,
) -> SyncResult<FieldDescriptor> {
    if spec.kind == ValueKind::Identity {
        return Err(invalid(&spec, "identity kind is reserved for the identity field"));
    }

    let sync_interval_seconds = spec.sync_interval_seconds.unwrap_or(default_interval);
    if !sync_interval_seconds.is_finite() || sync_interval_seconds < 0.0 {
        return Err(invalid(&spec, "sync interval must be finite and non-negative"));
    }

    if spec.should_blend && !spec.kind.is_blendable() {
        return Err(invalid(&spec, "kind cannot be blended"));
    }

    let quantizer = spec.quantization.quantizer()?;
    if quantizer.is_some() && spec.kind != ValueKind::F32 && spec.kind.vector_components().is_none() {
        return Err(invalid(&spec, "quantization applies to f32 and vector kinds only"));
    }

    if let Some(bits) = spec.packed_bits {
        let width = match spec.kind {
            ValueKind::U8 => 8,
            ValueKind::U16 => 16,
            ValueKind::U32 => 32,
            _ => return Err(invalid(&spec, "bit packing applies to u8/u16/u32 only")),
        };
        if bits == 0 || bits > width {
            return Err(invalid(&spec, "packed bit width out of range"));
        }
    }

    let codec = match &spec.codec {
        None => CodecRef::Native,
        Some(name) => {
            let codec = codecs.resolve(name)?;
            if !codec.supports(spec.kind) {
                return Err(SyncError::UnsupportedCodec {
                    codec: name.clone(),
                    kind: spec.kind,
                });
            }
            CodecRef::Custom(codec)
        }
    };

    if let Some(baseline) = spec.baseline {
        if baseline.kind() != spec.kind {
            return Err(invalid(&spec, "baseline kind differs from field kind"));
        }
        if !codec.uses_baseline() {
            return Err(invalid(&spec, "baseline requires a baseline-relative codec"));
        }
    }

    let skip = spec
        .skip_registration
        .map_or_else(SkipFlag::never, |id| skips.resolve(id));

    Ok(FieldDescriptor {
        index,
        name: spec.name,
        kind: spec.kind,
        must_run_on_primary_thread: spec.must_run_on_primary_thread,
        processing_priority: spec.processing_priority,
        priority_override: spec.priority_override,
        sync_interval_seconds,
        reliability: spec.reliability,
        should_blend: spec.should_blend,
        quantization: spec.quantization,
        quantizer,
        packed_bits: spec.packed_bits,
        baseline: spec.baseline,
        codec,
        skip,
        is_identity: false,
    })
}

/// A validated field set: an arena of descriptor rows indexed by field index.
///
/// Built once per distinct field set and shared by every companion that
/// uses it.
#[derive(Clone, Debug)]
pub struct SchemaDescriptor {
    name: String,
    fields: Box<[FieldDescriptor]>,
    identity_index: Option<u8>,
    owner_authority_index: Option<u8>,
}

impl SchemaDescriptor {
    /// Schema name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of fields.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the schema declares no fields.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All descriptors in index order.
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Descriptor at `index`.
    ///
    /// # Errors
    ///
    /// [`SyncError::UnknownFieldIndex`] if out of range.
    #[inline]
    pub fn field(&self, index: usize) -> SyncResult<&FieldDescriptor> {
        self.fields.get(index).ok_or(SyncError::UnknownFieldIndex {
            index,
            field_count: self.fields.len(),
        })
    }

    /// Index of the identity field, if the schema has one.
    #[inline]
    #[must_use]
    pub const fn identity_index(&self) -> Option<u8> {
        self.identity_index
    }

    /// Index of the owner-authority field, if the schema has one.
    #[inline]
    #[must_use]
    pub const fn owner_authority_index(&self) -> Option<u8> {
        self.owner_authority_index
    }

    /// Distinct cadence groups used by this schema, in first-seen order.
    #[must_use]
    pub fn group_keys(&self) -> Vec<SyncGroupKey> {
        let mut seen = HashSet::new();
        self.fields
            .iter()
            .filter(|f| !f.is_identity())
            .map(FieldDescriptor::group_key)
            .filter(|key| seen.insert(*key))
            .collect()
    }

    /// Number of blended fields.
    #[must_use]
    pub fn blended_count(&self) -> usize {
        self.fields.iter().filter(|f| f.should_blend()).count()
    }
}

//! # Field Codecs
//!
//! Native per-kind encodings plus the pluggable custom codecs.
//!
//! Custom codecs are looked up by name exactly once, while a schema is
//! built. The resolved `Arc` is stored on the field descriptor, so the
//! encode/decode hot path never touches the registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use fieldsync_shared::Quaternion;

use super::bitstream::{BitReader, BitWriter};
use super::quantizer::Quantizer;
use crate::error::{SyncError, SyncResult};
use crate::value::{SyncValue, ValueKind};

/// Registry name of [`SmallestThreeQuaternionCodec`].
pub const SMALLEST_THREE_QUATERNION: &str = "quaternion.smallest_three";
/// Registry name of [`QuantizedVectorCodec`].
pub const QUANTIZED_VECTOR: &str = "vector.quantized";
/// Registry name of [`DeltaIntegerCodec`].
pub const DELTA_INTEGER: &str = "integer.delta";
/// Registry name of [`IdentityCodec`].
pub const IDENTITY: &str = "identity";

/// Per-field parameters handed to a codec on every call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CodecContext {
    /// Field index (for error reporting).
    pub index: u8,
    /// Declared kind of the field.
    pub kind: ValueKind,
    /// Prebuilt quantizer when the field's quantization is enabled.
    pub quantizer: Option<Quantizer>,
    /// Fixed bit width for small unsigned integers.
    pub packed_bits: Option<u8>,
    /// Value the field is encoded relative to.
    pub baseline: Option<SyncValue>,
}

impl CodecContext {
    /// Context for a plain field of `kind` with no extra settings.
    #[must_use]
    pub const fn plain(index: u8, kind: ValueKind) -> Self {
        Self {
            index,
            kind,
            quantizer: None,
            packed_bits: None,
            baseline: None,
        }
    }

    fn mismatch(&self, found: &SyncValue) -> SyncError {
        SyncError::KindMismatch {
            index: self.index,
            expected: self.kind,
            found: found.kind(),
        }
    }
}

/// A custom wire encoding for one or more value kinds.
pub trait CustomCodec: Send + Sync {
    /// Registry name.
    fn name(&self) -> &'static str;

    /// Whether this codec can encode fields of `kind`.
    fn supports(&self, kind: ValueKind) -> bool;

    /// Whether the encoding is relative to the field's baseline.
    fn uses_baseline(&self) -> bool {
        false
    }

    /// Appends `value` and returns the number of bits written.
    ///
    /// # Errors
    ///
    /// [`SyncError::KindMismatch`] if `value` is not of `ctx.kind`.
    fn serialize(&self, writer: &mut BitWriter, ctx: &CodecContext, value: &SyncValue) -> SyncResult<usize>;

    /// Reads one value.
    ///
    /// # Errors
    ///
    /// [`SyncError::DecodeUnderrun`] on a truncated payload.
    fn deserialize(&self, reader: &mut BitReader<'_>, ctx: &CodecContext) -> SyncResult<SyncValue>;
}

/// How a field is put on the wire.
#[derive(Clone)]
pub enum CodecRef {
    /// Built-in encoding for the field's kind.
    Native,
    /// A custom codec resolved at schema build time.
    Custom(Arc<dyn CustomCodec>),
}

impl CodecRef {
    /// Codec name for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Custom(codec) => codec.name(),
        }
    }

    /// Whether the field's baseline affects the encoding.
    #[must_use]
    pub fn uses_baseline(&self) -> bool {
        match self {
            Self::Native => false,
            Self::Custom(codec) => codec.uses_baseline(),
        }
    }

    /// Encodes `value`, returning the number of bits written.
    ///
    /// # Errors
    ///
    /// [`SyncError::KindMismatch`] if `value` is not of `ctx.kind`.
    #[inline]
    pub fn serialize(&self, writer: &mut BitWriter, ctx: &CodecContext, value: &SyncValue) -> SyncResult<usize> {
        match self {
            Self::Native => serialize_native(writer, ctx, value),
            Self::Custom(codec) => codec.serialize(writer, ctx, value),
        }
    }

    /// Decodes one value.
    ///
    /// # Errors
    ///
    /// Any decode error of the underlying codec.
    #[inline]
    pub fn deserialize(&self, reader: &mut BitReader<'_>, ctx: &CodecContext) -> SyncResult<SyncValue> {
        match self {
            Self::Native => deserialize_native(reader, ctx),
            Self::Custom(codec) => codec.deserialize(reader, ctx),
        }
    }
}

impl fmt::Debug for CodecRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CodecRef({})", self.name())
    }
}

impl Default for CodecRef {
    fn default() -> Self {
        Self::Native
    }
}

// ============================================================================
// NATIVE ENCODING
// ============================================================================

fn write_float(writer: &mut BitWriter, quantizer: Option<&Quantizer>, value: f32) {
    match quantizer {
        Some(q) => writer.write_bits(q.quantize(value), q.bits()),
        None => writer.write_f32(value),
    }
}

fn read_float(reader: &mut BitReader<'_>, quantizer: Option<&Quantizer>) -> SyncResult<f32> {
    match quantizer {
        Some(q) => Ok(q.unquantize(reader.read_bits(q.bits())?)),
        None => reader.read_f32(),
    }
}

/// Writes `value` with the built-in encoding of `ctx.kind`.
///
/// # Errors
///
/// [`SyncError::KindMismatch`] if `value` is not of `ctx.kind`.
pub fn serialize_native(writer: &mut BitWriter, ctx: &CodecContext, value: &SyncValue) -> SyncResult<usize> {
    if value.kind() != ctx.kind {
        return Err(ctx.mismatch(value));
    }
    let start = writer.bit_len();
    let quantizer = ctx.quantizer.as_ref();

    match (*value, ctx.packed_bits) {
        (SyncValue::Bool(v), _) => writer.write_bit(v),
        (SyncValue::U8(v), Some(bits)) => writer.write_bits(clamp_packed(u64::from(v), bits), bits),
        (SyncValue::U16(v), Some(bits)) => writer.write_bits(clamp_packed(u64::from(v), bits), bits),
        (SyncValue::U32(v), Some(bits)) => writer.write_bits(clamp_packed(u64::from(v), bits), bits),
        (SyncValue::U8(v), None) => writer.write_u8(v),
        (SyncValue::I8(v), _) => writer.write_i8(v),
        (SyncValue::U16(v), None) => writer.write_u16(v),
        (SyncValue::I16(v), _) => writer.write_i16(v),
        (SyncValue::U32(v), None) => writer.write_u32(v),
        (SyncValue::I32(v), _) => writer.write_i32(v),
        (SyncValue::U64(v), _) => writer.write_u64(v),
        (SyncValue::I64(v), _) => writer.write_i64(v),
        (SyncValue::F32(v), _) => write_float(writer, quantizer, v),
        (SyncValue::F64(v), _) => writer.write_f64(v),
        (SyncValue::Vec2(_) | SyncValue::Vec3(_) | SyncValue::Vec4(_), _) => {
            let count = ctx.kind.vector_components().unwrap_or(0);
            let components = value.vector_components().unwrap_or_default();
            for c in &components[..count] {
                write_float(writer, quantizer, *c);
            }
        }
        (SyncValue::Quaternion(q), _) => {
            for c in q.to_array() {
                writer.write_f32(c);
            }
        }
        (SyncValue::Identity(id), _) => writer.write_u32(id),
    }

    Ok(writer.bit_len() - start)
}

/// Reads one value with the built-in encoding of `ctx.kind`.
///
/// # Errors
///
/// [`SyncError::DecodeUnderrun`] on a truncated payload.
#[allow(clippy::cast_possible_truncation)]
pub fn deserialize_native(reader: &mut BitReader<'_>, ctx: &CodecContext) -> SyncResult<SyncValue> {
    let quantizer = ctx.quantizer.as_ref();

    let value = match (ctx.kind, ctx.packed_bits) {
        (ValueKind::Bool, _) => SyncValue::Bool(reader.read_bit()?),
        (ValueKind::U8, Some(bits)) => SyncValue::U8(reader.read_bits(bits)? as u8),
        (ValueKind::U16, Some(bits)) => SyncValue::U16(reader.read_bits(bits)? as u16),
        (ValueKind::U32, Some(bits)) => SyncValue::U32(reader.read_bits(bits)?),
        (ValueKind::U8, None) => SyncValue::U8(reader.read_u8()?),
        (ValueKind::I8, _) => SyncValue::I8(reader.read_i8()?),
        (ValueKind::U16, None) => SyncValue::U16(reader.read_u16()?),
        (ValueKind::I16, _) => SyncValue::I16(reader.read_i16()?),
        (ValueKind::U32, None) => SyncValue::U32(reader.read_u32()?),
        (ValueKind::I32, _) => SyncValue::I32(reader.read_i32()?),
        (ValueKind::U64, _) => SyncValue::U64(reader.read_u64()?),
        (ValueKind::I64, _) => SyncValue::I64(reader.read_i64()?),
        (ValueKind::F32, _) => SyncValue::F32(read_float(reader, quantizer)?),
        (ValueKind::F64, _) => SyncValue::F64(reader.read_f64()?),
        (ValueKind::Vec2 | ValueKind::Vec3 | ValueKind::Vec4, _) => {
            let count = ctx.kind.vector_components().unwrap_or(0);
            let per_component = quantizer.map_or(32, |q| usize::from(q.bits()));
            reader.ensure(count * per_component)?;

            let mut components = [0.0f32; 4];
            for c in &mut components[..count] {
                *c = read_float(reader, quantizer)?;
            }
            SyncValue::from_vector_components(ctx.kind, components).unwrap_or(SyncValue::zero(ctx.kind))
        }
        (ValueKind::Quaternion, _) => {
            reader.ensure(128)?;
            let mut components = [0.0f32; 4];
            for c in &mut components {
                *c = reader.read_f32()?;
            }
            SyncValue::Quaternion(Quaternion::from_array(components))
        }
        (ValueKind::Identity, _) => SyncValue::Identity(reader.read_u32()?),
    };

    Ok(value)
}

#[allow(clippy::cast_possible_truncation)]
fn clamp_packed(value: u64, bits: u8) -> u32 {
    let max = (1u64 << bits.min(32)) - 1;
    value.min(max) as u32
}

// ============================================================================
// CUSTOM CODECS
// ============================================================================

/// Rotation codec sending the three smallest components of a unit quaternion.
///
/// ```text
/// ┌──────────────┬────────────┬────────────┬────────────┐
/// │ largest (2b) │ a (N bits) │ b (N bits) │ c (N bits) │
/// └──────────────┴────────────┴────────────┴────────────┘
/// ```
///
/// The sign is flipped so the dropped component is positive; it is
/// rebuilt from the unit-length constraint.
#[derive(Clone, Copy, Debug)]
pub struct SmallestThreeQuaternionCodec {
    quantizer: Quantizer,
}

impl SmallestThreeQuaternionCodec {
    /// Default bits per transmitted component.
    pub const DEFAULT_COMPONENT_BITS: u8 = 9;

    /// Creates the codec with `component_bits` bits per component.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidQuantization`] if `component_bits` is outside `1..=32`.
    pub fn new(component_bits: u8) -> SyncResult<Self> {
        let bound = std::f32::consts::FRAC_1_SQRT_2;
        Ok(Self {
            quantizer: Quantizer::new(-bound, bound, component_bits)?,
        })
    }

    /// Bits written per quaternion.
    #[must_use]
    pub fn encoded_bits(&self) -> usize {
        2 + 3 * usize::from(self.quantizer.bits())
    }
}

impl CustomCodec for SmallestThreeQuaternionCodec {
    fn name(&self) -> &'static str {
        SMALLEST_THREE_QUATERNION
    }

    fn supports(&self, kind: ValueKind) -> bool {
        kind == ValueKind::Quaternion
    }

    fn serialize(&self, writer: &mut BitWriter, ctx: &CodecContext, value: &SyncValue) -> SyncResult<usize> {
        let SyncValue::Quaternion(q) = *value else {
            return Err(ctx.mismatch(value));
        };
        let components = q.normalized().to_array();

        let mut largest = 0usize;
        for i in 1..4 {
            if components[i].abs() > components[largest].abs() {
                largest = i;
            }
        }
        let sign = if components[largest] < 0.0 { -1.0 } else { 1.0 };

        #[allow(clippy::cast_possible_truncation)]
        writer.write_bits(largest as u32, 2);
        for (i, c) in components.iter().enumerate() {
            if i != largest {
                writer.write_bits(self.quantizer.quantize(c * sign), self.quantizer.bits());
            }
        }

        Ok(self.encoded_bits())
    }

    fn deserialize(&self, reader: &mut BitReader<'_>, _ctx: &CodecContext) -> SyncResult<SyncValue> {
        reader.ensure(self.encoded_bits())?;
        let largest = reader.read_bits(2)? as usize;

        let mut components = [0.0f32; 4];
        let mut sum_sq = 0.0f32;
        for (i, c) in components.iter_mut().enumerate() {
            if i != largest {
                *c = self.quantizer.unquantize(reader.read_bits(self.quantizer.bits())?);
                sum_sq += *c * *c;
            }
        }
        components[largest] = (1.0 - sum_sq).max(0.0).sqrt();

        Ok(SyncValue::Quaternion(Quaternion::from_array(components).normalized()))
    }
}

/// Per-component quantized encoding of vector fields, relative to an
/// optional baseline.
///
/// A field-level quantization range, when enabled, takes precedence over
/// the codec's own.
#[derive(Clone, Copy, Debug)]
pub struct QuantizedVectorCodec {
    quantizer: Quantizer,
}

impl QuantizedVectorCodec {
    /// Default lower bound per component.
    pub const DEFAULT_MIN: f32 = -100.0;
    /// Default upper bound per component.
    pub const DEFAULT_MAX: f32 = 100.0;
    /// Default bits per component.
    pub const DEFAULT_BITS: u8 = 32;

    /// Creates the codec for `[min, max]` at `bits` bits per component.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidQuantization`] on bad parameters.
    pub fn new(min: f32, max: f32, bits: u8) -> SyncResult<Self> {
        Ok(Self {
            quantizer: Quantizer::new(min, max, bits)?,
        })
    }

    fn quantizer<'a>(&'a self, ctx: &'a CodecContext) -> &'a Quantizer {
        ctx.quantizer.as_ref().unwrap_or(&self.quantizer)
    }

    fn baseline(ctx: &CodecContext) -> [f32; 4] {
        ctx.baseline
            .and_then(|b| b.vector_components())
            .unwrap_or_default()
    }
}

impl CustomCodec for QuantizedVectorCodec {
    fn name(&self) -> &'static str {
        QUANTIZED_VECTOR
    }

    fn supports(&self, kind: ValueKind) -> bool {
        kind.vector_components().is_some()
    }

    fn uses_baseline(&self) -> bool {
        true
    }

    fn serialize(&self, writer: &mut BitWriter, ctx: &CodecContext, value: &SyncValue) -> SyncResult<usize> {
        if value.kind() != ctx.kind {
            return Err(ctx.mismatch(value));
        }
        let (Some(count), Some(components)) = (ctx.kind.vector_components(), value.vector_components()) else {
            return Err(ctx.mismatch(value));
        };
        let baseline = Self::baseline(ctx);
        let quantizer = self.quantizer(ctx);

        for i in 0..count {
            writer.write_bits(quantizer.quantize(components[i] - baseline[i]), quantizer.bits());
        }
        Ok(count * usize::from(quantizer.bits()))
    }

    fn deserialize(&self, reader: &mut BitReader<'_>, ctx: &CodecContext) -> SyncResult<SyncValue> {
        let count = ctx.kind.vector_components().ok_or(SyncError::UnsupportedCodec {
            codec: QUANTIZED_VECTOR.to_string(),
            kind: ctx.kind,
        })?;
        let baseline = Self::baseline(ctx);
        let quantizer = self.quantizer(ctx);
        reader.ensure(count * usize::from(quantizer.bits()))?;

        let mut components = [0.0f32; 4];
        for i in 0..count {
            components[i] = quantizer.unquantize(reader.read_bits(quantizer.bits())?) + baseline[i];
        }
        SyncValue::from_vector_components(ctx.kind, components).ok_or(SyncError::UnsupportedCodec {
            codec: QUANTIZED_VECTOR.to_string(),
            kind: ctx.kind,
        })
    }
}

/// Integer codec writing the zigzag-encoded difference from the field's
/// baseline, prefixed by its significant bit count.
///
/// Values near the baseline cost a handful of bits instead of the full
/// width; the worst case is 7 bits over the native width.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeltaIntegerCodec;

impl DeltaIntegerCodec {
    const LENGTH_BITS: u8 = 7;

    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    const fn zigzag(delta: i64) -> u64 {
        ((delta << 1) ^ (delta >> 63)) as u64
    }

    #[allow(clippy::cast_possible_wrap)]
    const fn unzigzag(encoded: u64) -> i64 {
        ((encoded >> 1) as i64) ^ -((encoded & 1) as i64)
    }

    fn baseline_bits(ctx: &CodecContext) -> u64 {
        ctx.baseline.and_then(|b| b.to_raw_bits()).unwrap_or(0)
    }
}

impl CustomCodec for DeltaIntegerCodec {
    fn name(&self) -> &'static str {
        DELTA_INTEGER
    }

    fn supports(&self, kind: ValueKind) -> bool {
        kind.is_integer()
    }

    fn uses_baseline(&self) -> bool {
        true
    }

    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    fn serialize(&self, writer: &mut BitWriter, ctx: &CodecContext, value: &SyncValue) -> SyncResult<usize> {
        if value.kind() != ctx.kind {
            return Err(ctx.mismatch(value));
        }
        let raw = value.to_raw_bits().ok_or_else(|| ctx.mismatch(value))?;
        let delta = raw.wrapping_sub(Self::baseline_bits(ctx)) as i64;
        let encoded = Self::zigzag(delta);
        let length = (64 - encoded.leading_zeros()) as u8;

        writer.write_bits(u32::from(length), Self::LENGTH_BITS);
        writer.write_bits_u64(encoded, length);
        Ok(usize::from(Self::LENGTH_BITS) + usize::from(length))
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn deserialize(&self, reader: &mut BitReader<'_>, ctx: &CodecContext) -> SyncResult<SyncValue> {
        reader.ensure(usize::from(Self::LENGTH_BITS))?;
        let length = reader.read_bits(Self::LENGTH_BITS)? as u8;
        if length > 64 {
            return Err(SyncError::MalformedField {
                index: ctx.index,
                reason: "delta length exceeds 64 bits",
            });
        }

        let encoded = reader.read_bits_u64(length)?;
        let raw = Self::baseline_bits(ctx).wrapping_add(Self::unzigzag(encoded) as u64);
        SyncValue::from_raw_bits(ctx.kind, raw).ok_or(SyncError::UnsupportedCodec {
            codec: DELTA_INTEGER.to_string(),
            kind: ctx.kind,
        })
    }
}

/// Full-width codec for the entity identity field.
///
/// Identity has to be readable before anything else in a message can be
/// routed, so it never uses a lossy or baseline-relative encoding.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityCodec;

impl CustomCodec for IdentityCodec {
    fn name(&self) -> &'static str {
        IDENTITY
    }

    fn supports(&self, kind: ValueKind) -> bool {
        kind == ValueKind::Identity
    }

    fn serialize(&self, writer: &mut BitWriter, ctx: &CodecContext, value: &SyncValue) -> SyncResult<usize> {
        let SyncValue::Identity(id) = *value else {
            return Err(ctx.mismatch(value));
        };
        writer.write_u32(id);
        Ok(32)
    }

    fn deserialize(&self, reader: &mut BitReader<'_>, _ctx: &CodecContext) -> SyncResult<SyncValue> {
        Ok(SyncValue::Identity(reader.read_u32()?))
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Name → codec table consulted while schemas are built.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn CustomCodec>>,
}

impl CodecRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in codecs at default settings.
    ///
    /// # Errors
    ///
    /// Never fails with the built-in defaults; the signature mirrors the
    /// fallible codec constructors.
    pub fn with_defaults() -> SyncResult<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(SmallestThreeQuaternionCodec::new(
            SmallestThreeQuaternionCodec::DEFAULT_COMPONENT_BITS,
        )?));
        registry.register(Arc::new(QuantizedVectorCodec::new(
            QuantizedVectorCodec::DEFAULT_MIN,
            QuantizedVectorCodec::DEFAULT_MAX,
            QuantizedVectorCodec::DEFAULT_BITS,
        )?));
        registry.register(Arc::new(DeltaIntegerCodec));
        registry.register(Arc::new(IdentityCodec));
        Ok(registry)
    }

    /// Registers a codec under its own name, replacing any previous one.
    pub fn register(&mut self, codec: Arc<dyn CustomCodec>) {
        self.codecs.insert(codec.name().to_string(), codec);
    }

    /// Registers a codec under an alias (e.g. a tuned variant).
    pub fn register_as(&mut self, name: impl Into<String>, codec: Arc<dyn CustomCodec>) {
        self.codecs.insert(name.into(), codec);
    }

    /// Resolves a codec by name.
    ///
    /// # Errors
    ///
    /// [`SyncError::UnknownCodec`] if nothing is registered under `name`.
    pub fn resolve(&self, name: &str) -> SyncResult<Arc<dyn CustomCodec>> {
        self.codecs
            .get(name)
            .cloned()
            .ok_or_else(|| SyncError::UnknownCodec(name.to_string()))
    }

    /// Number of registered codecs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    /// Returns true if no codec is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.codecs.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldsync_shared::{Vec2, Vec3};

    fn roundtrip(codec: &CodecRef, ctx: &CodecContext, value: SyncValue) -> (SyncValue, usize) {
        let mut writer = BitWriter::new();
        let bits = codec.serialize(&mut writer, ctx, &value).unwrap();
        assert_eq!(bits, writer.bit_len());
        let mut reader = BitReader::new(writer.as_bytes());
        (codec.deserialize(&mut reader, ctx).unwrap(), bits)
    }

    #[test]
    fn test_native_exact_kinds() {
        let values = [
            SyncValue::Bool(true),
            SyncValue::U8(200),
            SyncValue::I8(-100),
            SyncValue::U16(65_000),
            SyncValue::I16(-30_000),
            SyncValue::U32(4_000_000_000),
            SyncValue::I32(-2_000_000_000),
            SyncValue::U64(u64::MAX - 3),
            SyncValue::I64(i64::MIN + 9),
            SyncValue::F32(-1234.5),
            SyncValue::F64(std::f64::consts::PI),
            SyncValue::Vec2(Vec2::new(1.5, -2.5)),
            SyncValue::Vec3(Vec3::new(0.1, 0.2, 0.3)),
            SyncValue::Quaternion(Quaternion::new(0.1, 0.2, 0.3, 0.9)),
            SyncValue::Identity(77),
        ];
        for value in values {
            let ctx = CodecContext::plain(0, value.kind());
            let (decoded, _) = roundtrip(&CodecRef::Native, &ctx, value);
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn test_bool_costs_one_bit() {
        let ctx = CodecContext::plain(0, ValueKind::Bool);
        let (_, bits) = roundtrip(&CodecRef::Native, &ctx, SyncValue::Bool(false));
        assert_eq!(bits, 1);
    }

    #[test]
    fn test_packed_integer_clamps() {
        let ctx = CodecContext {
            packed_bits: Some(4),
            ..CodecContext::plain(0, ValueKind::U8)
        };
        let (decoded, bits) = roundtrip(&CodecRef::Native, &ctx, SyncValue::U8(9));
        assert_eq!((decoded, bits), (SyncValue::U8(9), 4));

        let (clamped, _) = roundtrip(&CodecRef::Native, &ctx, SyncValue::U8(200));
        assert_eq!(clamped, SyncValue::U8(15));

        let one_bit = CodecContext {
            packed_bits: Some(1),
            ..CodecContext::plain(0, ValueKind::U32)
        };
        let (decoded, bits) = roundtrip(&CodecRef::Native, &one_bit, SyncValue::U32(1));
        assert_eq!((decoded, bits), (SyncValue::U32(1), 1));
    }

    #[test]
    fn test_native_quantized_float() {
        let quantizer = Quantizer::new(-100.0, 100.0, 16).unwrap();
        let ctx = CodecContext {
            quantizer: Some(quantizer),
            ..CodecContext::plain(3, ValueKind::F32)
        };
        let (decoded, bits) = roundtrip(&CodecRef::Native, &ctx, SyncValue::F32(42.5));
        assert_eq!(bits, 16);
        assert!((decoded.as_f32().unwrap() - 42.5).abs() <= quantizer.step());
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let ctx = CodecContext::plain(5, ValueKind::F32);
        let mut writer = BitWriter::new();
        let err = CodecRef::Native
            .serialize(&mut writer, &ctx, &SyncValue::Bool(true))
            .unwrap_err();
        assert_eq!(
            err,
            SyncError::KindMismatch { index: 5, expected: ValueKind::F32, found: ValueKind::Bool }
        );
        assert_eq!(writer.bit_len(), 0);
    }

    #[test]
    fn test_smallest_three_quaternion() {
        let codec = CodecRef::Custom(Arc::new(SmallestThreeQuaternionCodec::new(9).unwrap()));
        let ctx = CodecContext::plain(0, ValueKind::Quaternion);

        let inputs = [
            Quaternion::IDENTITY,
            Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 2.0),
            Quaternion::new(-0.5, 0.5, -0.5, -0.5),
            Quaternion::new(0.0, -0.8, 0.0, 0.6),
        ];
        for q in inputs {
            let (decoded, bits) = roundtrip(&codec, &ctx, SyncValue::Quaternion(q));
            assert_eq!(bits, 29);
            let SyncValue::Quaternion(d) = decoded else { panic!("wrong kind") };
            assert!(d.approx_same_rotation(q, 1e-3), "{q:?} -> {d:?}");
        }
    }

    #[test]
    fn test_quantized_vector_with_baseline() {
        let codec = CodecRef::Custom(Arc::new(QuantizedVectorCodec::new(-125.0, 125.0, 18).unwrap()));
        let ctx = CodecContext {
            baseline: Some(SyncValue::Vec3(Vec3::new(1000.0, 0.0, -1000.0))),
            ..CodecContext::plain(1, ValueKind::Vec3)
        };
        let value = Vec3::new(1010.0, 5.0, -1100.0);
        let (decoded, bits) = roundtrip(&codec, &ctx, SyncValue::Vec3(value));
        assert_eq!(bits, 54);
        let SyncValue::Vec3(d) = decoded else { panic!("wrong kind") };
        assert!(d.distance(value) < 0.01, "{d:?}");
    }

    #[test]
    fn test_quantized_vector_prefers_field_range() {
        let codec = CodecRef::Custom(Arc::new(QuantizedVectorCodec::new(-100.0, 100.0, 32).unwrap()));
        let ctx = CodecContext {
            quantizer: Some(Quantizer::new(-1.0, 1.0, 8).unwrap()),
            ..CodecContext::plain(1, ValueKind::Vec2)
        };
        let (_, bits) = roundtrip(&codec, &ctx, SyncValue::Vec2(Vec2::new(0.5, -0.5)));
        assert_eq!(bits, 16);
    }

    #[test]
    fn test_delta_integer_small_and_extreme() {
        let codec = CodecRef::Custom(Arc::new(DeltaIntegerCodec));
        let ctx = CodecContext {
            baseline: Some(SyncValue::I32(1000)),
            ..CodecContext::plain(2, ValueKind::I32)
        };

        let (decoded, bits) = roundtrip(&codec, &ctx, SyncValue::I32(1003));
        assert_eq!(decoded, SyncValue::I32(1003));
        assert!(bits < 16, "small delta used {bits} bits");

        let (decoded, bits) = roundtrip(&codec, &ctx, SyncValue::I32(1000));
        assert_eq!((decoded, bits), (SyncValue::I32(1000), 7));

        for v in [i32::MIN, i32::MAX, -1, 0] {
            let (decoded, _) = roundtrip(&codec, &ctx, SyncValue::I32(v));
            assert_eq!(decoded, SyncValue::I32(v));
        }

        let wide = CodecContext::plain(2, ValueKind::U64);
        let (decoded, _) = roundtrip(&codec, &wide, SyncValue::U64(u64::MAX));
        assert_eq!(decoded, SyncValue::U64(u64::MAX));
    }

    #[test]
    fn test_delta_integer_rejects_bad_length() {
        let mut writer = BitWriter::new();
        writer.write_bits(100, 7);
        let mut reader = BitReader::new(writer.as_bytes());
        let ctx = CodecContext::plain(4, ValueKind::U32);
        assert!(matches!(
            DeltaIntegerCodec.deserialize(&mut reader, &ctx),
            Err(SyncError::MalformedField { index: 4, .. })
        ));
    }

    #[test]
    fn test_registry_resolves_defaults() {
        let registry = CodecRegistry::with_defaults().unwrap();
        assert_eq!(registry.len(), 4);
        for name in [SMALLEST_THREE_QUATERNION, QUANTIZED_VECTOR, DELTA_INTEGER, IDENTITY] {
            assert_eq!(registry.resolve(name).unwrap().name(), name);
        }
        assert_eq!(
            registry.resolve("nope").err(),
            Some(SyncError::UnknownCodec("nope".to_string()))
        );
    }
}

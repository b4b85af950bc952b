//! # Field Values
//!
//! The closed set of scalar kinds a field can declare, and the tagged value
//! that carries one of them through trackers, history buffers and codecs.
//!
//! The tag never goes on the wire: both peers know each field's kind from
//! the shared schema.

use fieldsync_shared::{NetworkId, Quaternion, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Declared type of a synchronized field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// Boolean flag (1 bit on the wire).
    Bool,
    /// Unsigned 8-bit integer.
    U8,
    /// Signed 8-bit integer.
    I8,
    /// Unsigned 16-bit integer.
    U16,
    /// Signed 16-bit integer.
    I16,
    /// Unsigned 32-bit integer.
    U32,
    /// Signed 32-bit integer.
    I32,
    /// Unsigned 64-bit integer.
    U64,
    /// Signed 64-bit integer.
    I64,
    /// Single-precision float.
    F32,
    /// Double-precision float.
    F64,
    /// 2-component vector.
    Vec2,
    /// 3-component vector.
    Vec3,
    /// 4-component vector.
    Vec4,
    /// Rotation quaternion.
    Quaternion,
    /// Entity identity assignment.
    Identity,
}

impl ValueKind {
    /// True for kinds with a meaningful interpolation between two samples.
    #[must_use]
    pub const fn is_blendable(self) -> bool {
        matches!(
            self,
            Self::F32 | Self::F64 | Self::Vec2 | Self::Vec3 | Self::Vec4 | Self::Quaternion
        )
    }

    /// True for the integer kinds.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::U8 | Self::I8 | Self::U16 | Self::I16 | Self::U32 | Self::I32 | Self::U64 | Self::I64
        )
    }

    /// Bit width of an integer kind, `None` otherwise.
    #[must_use]
    pub const fn integer_bits(self) -> Option<u8> {
        match self {
            Self::U8 | Self::I8 => Some(8),
            Self::U16 | Self::I16 => Some(16),
            Self::U32 | Self::I32 => Some(32),
            Self::U64 | Self::I64 => Some(64),
            _ => None,
        }
    }

    /// Number of float components for vector kinds.
    #[must_use]
    pub const fn vector_components(self) -> Option<usize> {
        match self {
            Self::Vec2 => Some(2),
            Self::Vec3 => Some(3),
            Self::Vec4 => Some(4),
            _ => None,
        }
    }
}

/// A single field value.
///
/// Exactly one variant is active, and it must match the field's declared
/// [`ValueKind`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum SyncValue {
    /// Boolean flag.
    Bool(bool),
    /// Unsigned 8-bit integer.
    U8(u8),
    /// Signed 8-bit integer.
    I8(i8),
    /// Unsigned 16-bit integer.
    U16(u16),
    /// Signed 16-bit integer.
    I16(i16),
    /// Unsigned 32-bit integer.
    U32(u32),
    /// Signed 32-bit integer.
    I32(i32),
    /// Unsigned 64-bit integer.
    U64(u64),
    /// Signed 64-bit integer.
    I64(i64),
    /// Single-precision float.
    F32(f32),
    /// Double-precision float.
    F64(f64),
    /// 2-component vector.
    Vec2(Vec2),
    /// 3-component vector.
    Vec3(Vec3),
    /// 4-component vector.
    Vec4(Vec4),
    /// Rotation quaternion.
    Quaternion(Quaternion),
    /// Entity identity assignment.
    Identity(NetworkId),
}

impl SyncValue {
    /// Kind of the active variant.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::U8(_) => ValueKind::U8,
            Self::I8(_) => ValueKind::I8,
            Self::U16(_) => ValueKind::U16,
            Self::I16(_) => ValueKind::I16,
            Self::U32(_) => ValueKind::U32,
            Self::I32(_) => ValueKind::I32,
            Self::U64(_) => ValueKind::U64,
            Self::I64(_) => ValueKind::I64,
            Self::F32(_) => ValueKind::F32,
            Self::F64(_) => ValueKind::F64,
            Self::Vec2(_) => ValueKind::Vec2,
            Self::Vec3(_) => ValueKind::Vec3,
            Self::Vec4(_) => ValueKind::Vec4,
            Self::Quaternion(_) => ValueKind::Quaternion,
            Self::Identity(_) => ValueKind::Identity,
        }
    }

    /// Zero value of a kind (identity rotation for quaternions).
    #[must_use]
    pub const fn zero(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Bool => Self::Bool(false),
            ValueKind::U8 => Self::U8(0),
            ValueKind::I8 => Self::I8(0),
            ValueKind::U16 => Self::U16(0),
            ValueKind::I16 => Self::I16(0),
            ValueKind::U32 => Self::U32(0),
            ValueKind::I32 => Self::I32(0),
            ValueKind::U64 => Self::U64(0),
            ValueKind::I64 => Self::I64(0),
            ValueKind::F32 => Self::F32(0.0),
            ValueKind::F64 => Self::F64(0.0),
            ValueKind::Vec2 => Self::Vec2(Vec2::ZERO),
            ValueKind::Vec3 => Self::Vec3(Vec3::ZERO),
            ValueKind::Vec4 => Self::Vec4(Vec4::ZERO),
            ValueKind::Quaternion => Self::Quaternion(Quaternion::IDENTITY),
            ValueKind::Identity => Self::Identity(0),
        }
    }

    /// Integer value as 64 raw bits, sign-extended for signed kinds.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn to_raw_bits(&self) -> Option<u64> {
        match *self {
            Self::U8(v) => Some(v as u64),
            Self::I8(v) => Some(v as i64 as u64),
            Self::U16(v) => Some(v as u64),
            Self::I16(v) => Some(v as i64 as u64),
            Self::U32(v) => Some(v as u64),
            Self::I32(v) => Some(v as i64 as u64),
            Self::U64(v) => Some(v),
            Self::I64(v) => Some(v as u64),
            _ => None,
        }
    }

    /// Rebuilds an integer value of `kind` from raw bits, truncating to width.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub const fn from_raw_bits(kind: ValueKind, raw: u64) -> Option<Self> {
        match kind {
            ValueKind::U8 => Some(Self::U8(raw as u8)),
            ValueKind::I8 => Some(Self::I8(raw as i8)),
            ValueKind::U16 => Some(Self::U16(raw as u16)),
            ValueKind::I16 => Some(Self::I16(raw as i16)),
            ValueKind::U32 => Some(Self::U32(raw as u32)),
            ValueKind::I32 => Some(Self::I32(raw as i32)),
            ValueKind::U64 => Some(Self::U64(raw)),
            ValueKind::I64 => Some(Self::I64(raw as i64)),
            _ => None,
        }
    }

    /// Float components of vector values.
    #[must_use]
    pub fn vector_components(&self) -> Option<[f32; 4]> {
        match *self {
            Self::Vec2(v) => Some([v.x, v.y, 0.0, 0.0]),
            Self::Vec3(v) => Some([v.x, v.y, v.z, 0.0]),
            Self::Vec4(v) => Some(bytemuck::cast(v)),
            _ => None,
        }
    }

    /// Builds a vector value of `kind` from its components.
    #[must_use]
    pub fn from_vector_components(kind: ValueKind, c: [f32; 4]) -> Option<Self> {
        match kind {
            ValueKind::Vec2 => Some(Self::Vec2(Vec2::new(c[0], c[1]))),
            ValueKind::Vec3 => Some(Self::Vec3(Vec3::new(c[0], c[1], c[2]))),
            ValueKind::Vec4 => Some(Self::Vec4(bytemuck::cast(c))),
            _ => None,
        }
    }

    /// Boolean payload, if this is a boolean.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// Float payload, if this is an `F32`.
    #[must_use]
    pub const fn as_f32(&self) -> Option<f32> {
        match *self {
            Self::F32(v) => Some(v),
            _ => None,
        }
    }
}

macro_rules! impl_from_for_sync_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for SyncValue {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

impl_from_for_sync_value! {
    bool => Bool,
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    Quaternion => Quaternion,
}

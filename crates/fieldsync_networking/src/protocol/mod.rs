//! # Wire Protocol
//!
//! Bit-granular encoding of field values.
//!
//! ## Entity Payload Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ field 1 │ field 2 │ ... │ field N      (identity field omitted)│
//! ├──────────────────────────────────────────────────────────────┤
//! │ no tags, no length prefixes: order and kind come from schema │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Philosophy
//!
//! - Every bit counts - booleans cost one bit, floats can be quantized
//! - Codecs are resolved at schema build time, never per value
//! - Truncated input is an error, never a panic

mod bitstream;
mod codecs;
mod quantizer;

pub use bitstream::{BitReader, BitWriter};
pub use codecs::{
    deserialize_native, serialize_native, CodecContext, CodecRef, CodecRegistry, CustomCodec,
    DeltaIntegerCodec, IdentityCodec, QuantizedVectorCodec, SmallestThreeQuaternionCodec,
    DELTA_INTEGER, IDENTITY, QUANTIZED_VECTOR, SMALLEST_THREE_QUATERNION,
};
pub use quantizer::{QuantizationRange, Quantizer, MAX_QUANTIZED_BITS};

//! # Quantization
//!
//! Lossy linear mapping of a float range onto a fixed-width integer.
//!
//! ```text
//!  min                                                   max
//!   |-----|-----|-----|-----|-----|-----|-----|-----|-----|
//!   0     1     2     3    ...                      2^bits - 1
//!         <-step->
//! ```
//!
//! Out-of-range inputs are clamped, so a quantized field always costs
//! exactly `bits` bits.

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Largest supported quantized bit width.
pub const MAX_QUANTIZED_BITS: u8 = 32;

/// Declared quantization settings of a field.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuantizationRange {
    /// Lower bound of the representable range.
    pub min: f32,
    /// Upper bound of the representable range.
    pub max: f32,
    /// Bit width of the quantized integer.
    pub bits: u8,
    /// Whether quantization applies at all.
    pub enabled: bool,
}

impl QuantizationRange {
    /// Quantization switched off.
    pub const DISABLED: Self = Self {
        min: 0.0,
        max: 0.0,
        bits: 0,
        enabled: false,
    };

    /// An enabled range.
    #[must_use]
    pub const fn new(min: f32, max: f32, bits: u8) -> Self {
        Self {
            min,
            max,
            bits,
            enabled: true,
        }
    }

    /// Builds the quantizer for this range, or `None` when disabled.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidQuantization`] if enabled with bad parameters.
    pub fn quantizer(&self) -> SyncResult<Option<Quantizer>> {
        if !self.enabled {
            return Ok(None);
        }
        Quantizer::new(self.min, self.max, self.bits).map(Some)
    }
}

impl Default for QuantizationRange {
    fn default() -> Self {
        Self::DISABLED
    }
}

/// A validated, precomputed quantizer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quantizer {
    min: f32,
    max: f32,
    bits: u8,
    step: f64,
    half_step: f64,
    max_quantized: u64,
}

impl Quantizer {
    /// Creates a quantizer for `[min, max]` at `bits` bits.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidQuantization`] if `max <= min`, either bound is
    /// not finite, or `bits` is outside `1..=32`.
    pub fn new(min: f32, max: f32, bits: u8) -> SyncResult<Self> {
        let valid = min.is_finite() && max.is_finite() && max > min && (1..=MAX_QUANTIZED_BITS).contains(&bits);
        if !valid {
            return Err(SyncError::InvalidQuantization { min, max, bits });
        }

        let max_quantized = (1u64 << bits) - 1;
        #[allow(clippy::cast_precision_loss)]
        let step = (f64::from(max) - f64::from(min)) / max_quantized as f64;

        Ok(Self {
            min,
            max,
            bits,
            step,
            half_step: step / 2.0,
            max_quantized,
        })
    }

    /// Bit width of the quantized integer.
    #[inline]
    #[must_use]
    pub const fn bits(&self) -> u8 {
        self.bits
    }

    /// Size of one quantization step.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn step(&self) -> f32 {
        self.step as f32
    }

    /// Maps a float onto the integer grid, clamping to the range.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn quantize(&self, value: f32) -> u32 {
        let clamped = if value.is_nan() {
            self.min
        } else {
            value.clamp(self.min, self.max)
        };
        if clamped != value {
            tracing::trace!("quantization clamp: {} -> {}", value, clamped);
        }

        // Adding half a step before truncating rounds to nearest.
        let shifted = f64::from(clamped) - f64::from(self.min) + self.half_step;
        let quantized = (shifted / self.step) as u64;
        quantized.min(self.max_quantized) as u32
    }

    /// Maps a quantized integer back to the float range.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn unquantize(&self, quantized: u32) -> f32 {
        let q = u64::from(quantized).min(self.max_quantized);
        #[allow(clippy::cast_precision_loss)]
        let value = q as f64 * self.step + f64::from(self.min);
        (value as f32).clamp(self.min, self.max)
    }
}

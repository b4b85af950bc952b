//! # Value Blending
//!
//! Smooths received samples of blended fields into a continuous value.
//!
//! ## Timeline
//!
//! ```text
//!   oldest            adjusted = now - lead          newest    now
//!     │──────────────────────│───────────────────────────│───────│
//!     └ clamp to oldest      └ lerp/slerp between         └ extrapolate
//!                              the bracketing samples       past newest
//! ```
//!
//! Extrapolation continues the motion of the last two samples for at
//! most one of their intervals. Once the newest sample is older than the
//! inactivity window, blending yields nothing and the field keeps its
//! last written value.

use fieldsync_shared::{lerp, Ticks};

use crate::companion::SyncCompanion;
use crate::history::{HistoryBuffer, HistorySample};
use crate::value::SyncValue;

/// Blending parameters in ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlendSettings {
    /// How far behind `now` values are rendered.
    pub lead_ticks: Ticks,
    /// Samples older than this stop blending.
    pub inactivity_ticks: Ticks,
}

/// Turns history buffers into blended values.
///
/// Holds scratch storage so samples can be copied out of a buffer and the
/// buffer's lock released before any math runs.
#[derive(Debug)]
pub struct BlendingConsumer {
    settings: BlendSettings,
    scratch: Vec<HistorySample>,
}

impl BlendingConsumer {
    /// Creates a consumer.
    #[must_use]
    pub const fn new(settings: BlendSettings) -> Self {
        Self {
            settings,
            scratch: Vec::new(),
        }
    }

    /// Active settings.
    #[must_use]
    pub const fn settings(&self) -> BlendSettings {
        self.settings
    }

    /// Blended value of `history` at `now`, `None` if empty or inactive.
    pub fn blend(&mut self, history: &HistoryBuffer, now: Ticks) -> Option<SyncValue> {
        history.copy_into(&mut self.scratch);
        blend_samples(&self.scratch, now, self.settings)
    }

    /// Writes blended values for every blended field of `companion`.
    ///
    /// History older than the sample bracketing `now - lead` is pruned.
    /// Returns the number of fields written.
    pub fn apply(&mut self, companion: &mut SyncCompanion, now: Ticks) -> usize {
        let adjusted = now - self.settings.lead_ticks;
        let mut applied = 0;
        for index in 0..companion.len() {
            let Ok(index) = u8::try_from(index) else {
                break;
            };
            let blended = match companion.history(index) {
                Some(history) => {
                    let value = self.blend(history, now);
                    history.prune_before(adjusted);
                    value
                }
                None => continue,
            };
            if let Some(value) = blended {
                companion.commit_blended(index, value);
                applied += 1;
            }
        }
        applied
    }
}

/// Core blending over time-ordered samples.
fn blend_samples(samples: &[HistorySample], now: Ticks, settings: BlendSettings) -> Option<SyncValue> {
    let newest = samples.last()?;
    let oldest = samples.first()?;
    if now - newest.timestamp >= settings.inactivity_ticks {
        return None;
    }

    let adjusted = now - settings.lead_ticks;

    if adjusted >= newest.timestamp {
        let Some(before) = samples.len().checked_sub(2).and_then(|i| samples.get(i)) else {
            return Some(newest.value);
        };
        let span = newest.timestamp - before.timestamp;
        if span <= 0 {
            return Some(newest.value);
        }
        let t = fraction(adjusted - newest.timestamp, span);
        return Some(extrapolate(before.value, newest.value, t));
    }

    if adjusted <= oldest.timestamp {
        return Some(oldest.value);
    }

    // First sample strictly after `adjusted`; its predecessor is at or before.
    let upper = samples.partition_point(|s| s.timestamp <= adjusted);
    let (older, newer) = (samples.get(upper.checked_sub(1)?)?, samples.get(upper)?);
    let t = fraction(adjusted - older.timestamp, newer.timestamp - older.timestamp);
    Some(interpolate(older.value, newer.value, t))
}

/// `part / whole`, clamped to `0..=1`.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn fraction(part: Ticks, whole: Ticks) -> f32 {
    if whole <= 0 {
        return 1.0;
    }
    (part as f64 / whole as f64).clamp(0.0, 1.0) as f32
}

/// Linear blend for the linear kinds; `t` may exceed 1.
fn lerp_linear(a: SyncValue, b: SyncValue, t: f32) -> Option<SyncValue> {
    match (a, b) {
        (SyncValue::F32(a), SyncValue::F32(b)) => Some(SyncValue::F32(lerp(a, b, t))),
        (SyncValue::F64(a), SyncValue::F64(b)) => Some(SyncValue::F64(a + (b - a) * f64::from(t))),
        (SyncValue::Vec2(a), SyncValue::Vec2(b)) => Some(SyncValue::Vec2(a.lerp(b, t))),
        (SyncValue::Vec3(a), SyncValue::Vec3(b)) => Some(SyncValue::Vec3(a.lerp(b, t))),
        (SyncValue::Vec4(a), SyncValue::Vec4(b)) => Some(SyncValue::Vec4(a.lerp(b, t))),
        _ => None,
    }
}

fn interpolate(older: SyncValue, newer: SyncValue, t: f32) -> SyncValue {
    match (older, newer) {
        (SyncValue::Quaternion(a), SyncValue::Quaternion(b)) => SyncValue::Quaternion(a.slerp(b, t)),
        _ => lerp_linear(older, newer, t).unwrap_or(older),
    }
}

fn extrapolate(before: SyncValue, newest: SyncValue, t: f32) -> SyncValue {
    match (before, newest) {
        (SyncValue::Quaternion(a), SyncValue::Quaternion(b)) => {
            let step = b * a.inverse();
            SyncValue::Quaternion(b.slerp((step * b).normalized(), t))
        }
        _ => lerp_linear(before, newest, 1.0 + t).unwrap_or(newest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldsync_shared::{Quaternion, Vec3, TICKS_PER_SECOND};

    const SETTINGS: BlendSettings = BlendSettings {
        lead_ticks: 100,
        inactivity_ticks: 10_000,
    };

    fn history(samples: &[(Ticks, f32)]) -> HistoryBuffer {
        let history = HistoryBuffer::with_capacity(16);
        for &(t, v) in samples {
            history.push(t, SyncValue::F32(v));
        }
        history
    }

    fn blended_f32(consumer: &mut BlendingConsumer, history: &HistoryBuffer, now: Ticks) -> f32 {
        consumer.blend(history, now).and_then(|v| v.as_f32()).unwrap()
    }

    #[test]
    fn test_empty_history() {
        let mut consumer = BlendingConsumer::new(SETTINGS);
        assert!(consumer.blend(&HistoryBuffer::with_capacity(4), 0).is_none());
    }

    #[test]
    fn test_interpolates_between_brackets() {
        let mut consumer = BlendingConsumer::new(SETTINGS);
        let history = history(&[(1_000, 0.0), (1_200, 10.0), (1_400, 30.0)]);

        // adjusted = 1_100: halfway between the first two samples
        assert!((blended_f32(&mut consumer, &history, 1_200) - 5.0).abs() < 1e-4);
        // adjusted = 1_300: halfway between the last two
        assert!((blended_f32(&mut consumer, &history, 1_400) - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_before_oldest_clamps() {
        let mut consumer = BlendingConsumer::new(SETTINGS);
        let history = history(&[(1_000, 4.0), (1_200, 8.0)]);
        assert!((blended_f32(&mut consumer, &history, 1_050) - 4.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_extrapolation_capped_at_one_interval() {
        let mut consumer = BlendingConsumer::new(SETTINGS);
        let history = history(&[(1_000, 0.0), (1_200, 10.0)]);

        // adjusted = 1_300: half an interval past newest
        assert!((blended_f32(&mut consumer, &history, 1_400) - 15.0).abs() < 1e-4);
        // far past newest: capped
        assert!((blended_f32(&mut consumer, &history, 5_000) - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_single_sample_returns_newest() {
        let mut consumer = BlendingConsumer::new(SETTINGS);
        let history = history(&[(1_000, 3.0)]);
        assert!((blended_f32(&mut consumer, &history, 2_000) - 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_inactive_history_yields_nothing() {
        let mut consumer = BlendingConsumer::new(SETTINGS);
        let history = history(&[(1_000, 3.0)]);
        assert!(consumer.blend(&history, 1_000 + SETTINGS.inactivity_ticks).is_none());
    }

    #[test]
    fn test_quaternion_slerp() {
        let mut consumer = BlendingConsumer::new(SETTINGS);
        let history = HistoryBuffer::with_capacity(4);
        let quarter_turn = Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), std::f32::consts::FRAC_PI_2);
        history.push(1_000, SyncValue::Quaternion(Quaternion::IDENTITY));
        history.push(1_200, SyncValue::Quaternion(quarter_turn));

        let Some(SyncValue::Quaternion(q)) = consumer.blend(&history, 1_200) else {
            panic!("expected quaternion");
        };
        let expected = Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), std::f32::consts::FRAC_PI_4);
        assert!(q.approx_same_rotation(expected, 1e-4));
    }

    #[test]
    fn test_vector_blend() {
        let mut consumer = BlendingConsumer::new(SETTINGS);
        let history = HistoryBuffer::with_capacity(4);
        history.push(0, SyncValue::Vec3(Vec3::ZERO));
        history.push(200, SyncValue::Vec3(Vec3::new(2.0, 4.0, 6.0)));

        let Some(SyncValue::Vec3(v)) = consumer.blend(&history, 200) else {
            panic!("expected vector");
        };
        assert!(v.distance(Vec3::new(1.0, 2.0, 3.0)) < 1e-4);
    }

    #[test]
    fn test_config_settings_scale() {
        let settings = crate::config::SyncConfig::default().blend_settings();
        assert_eq!(settings.lead_ticks, TICKS_PER_SECOND / 4);
    }
}

//! Engine configuration.
//!
//! Loaded from TOML (file IO is optional; `from_toml_str` is enough for
//! embedded configs). Every key has a default, so an empty document is a
//! valid configuration.

use std::path::Path;

use fieldsync_shared::{seconds_to_ticks, AuthorityId, AUTHORITY_UNSET};
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::interpolation::BlendSettings;
use crate::schema::SchemaBuilder;

/// Interpolation lead applied to every blended field.
pub const DEFAULT_INTERPOLATION_LEAD_SECONDS: f32 = 0.25;

/// Lower bound on history capacity.
pub const DEFAULT_HISTORY_MINIMUM_SIZE: usize = 10;

/// Blending stops once the newest sample is this old.
pub const DEFAULT_BLEND_INACTIVITY_SECONDS: f32 = 2.0;

/// Interval for fields that declare none (24 Hz).
pub const DEFAULT_SYNC_INTERVAL_SECONDS: f32 = 1.0 / 24.0;

/// Default number of companion slots.
pub const DEFAULT_COMPANION_POOL_CAPACITY: usize = 4096;

/// Engine-wide synchronization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How far behind real time blended fields are rendered.
    pub interpolation_lead_seconds: f32,
    /// Minimum history capacity per blended field.
    pub history_minimum_size: usize,
    /// Sample age after which blending yields nothing.
    pub blend_inactivity_seconds: f32,
    /// Interval for fields that declare none.
    pub default_sync_interval_seconds: f32,
    /// Maximum number of live companions.
    pub companion_pool_capacity: usize,
    /// Authority id of this peer.
    pub local_authority: AuthorityId,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interpolation_lead_seconds: DEFAULT_INTERPOLATION_LEAD_SECONDS,
            history_minimum_size: DEFAULT_HISTORY_MINIMUM_SIZE,
            blend_inactivity_seconds: DEFAULT_BLEND_INACTIVITY_SECONDS,
            default_sync_interval_seconds: DEFAULT_SYNC_INTERVAL_SECONDS,
            companion_pool_capacity: DEFAULT_COMPANION_POOL_CAPACITY,
            local_authority: AUTHORITY_UNSET,
        }
    }
}

impl SyncConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidConfig`] on malformed TOML or invalid values.
    pub fn from_toml_str(source: &str) -> SyncResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| SyncError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidConfig`] if the file cannot be read or is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| SyncError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Checks every value is usable.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidConfig`] naming the first offending key.
    pub fn validate(&self) -> SyncResult<()> {
        fn check(ok: bool, key: &str) -> SyncResult<()> {
            if ok {
                Ok(())
            } else {
                Err(SyncError::InvalidConfig(format!("{key} out of range")))
            }
        }

        check(
            self.interpolation_lead_seconds.is_finite() && self.interpolation_lead_seconds >= 0.0,
            "interpolation_lead_seconds",
        )?;
        check(self.history_minimum_size > 0, "history_minimum_size")?;
        check(
            self.blend_inactivity_seconds.is_finite() && self.blend_inactivity_seconds > 0.0,
            "blend_inactivity_seconds",
        )?;
        check(
            self.default_sync_interval_seconds.is_finite() && self.default_sync_interval_seconds >= 0.0,
            "default_sync_interval_seconds",
        )?;
        check(
            self.companion_pool_capacity > 0 && u32::try_from(self.companion_pool_capacity).is_ok(),
            "companion_pool_capacity",
        )
    }

    /// Blending parameters in ticks.
    #[must_use]
    pub fn blend_settings(&self) -> BlendSettings {
        BlendSettings {
            lead_ticks: seconds_to_ticks(f64::from(self.interpolation_lead_seconds)),
            inactivity_ticks: seconds_to_ticks(f64::from(self.blend_inactivity_seconds)),
        }
    }

    /// Schema builder using this configuration's default interval.
    #[must_use]
    pub fn schema_builder(&self, name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name).default_interval(self.default_sync_interval_seconds)
    }
}

//! Weights and thresholds governing the fusion policy.
//!
//! [`FusionConfig::default()`] is the production policy. Alternate policies
//! can be loaded from TOML; any key left out keeps its default.
//!
//! ```toml
//! binary_threshold = 0.6
//! metadata_max_boost = 0.2
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Immutable fusion policy injected into the engine at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FusionConfig {
    /// Pixels strictly above this probability count as detected.
    pub binary_threshold: f32,
    /// Opening structuring element radius (1 means a 3x3 square).
    pub opening_radius: usize,
    /// Cleaned area ratio above which the detector is considered saturated.
    pub max_area_ratio: f32,
    /// Area ratio below which confidence falls off quadratically.
    pub min_area_ratio: f32,
    /// Patch score above which the manipulation score is trusted undamped.
    pub patch_trust_threshold: f32,
    /// Manipulation score above which it is trusted undamped.
    pub manipulation_trust_threshold: f32,
    /// Noisy-OR exponent for the AI-generation score.
    pub ai_weight: f32,
    /// Noisy-OR exponent for the manipulation score.
    pub manipulation_weight: f32,
    /// Metadata scores at or below this never change suspicion.
    pub metadata_threshold: f32,
    /// Largest fraction of remaining headroom metadata may add.
    pub metadata_max_boost: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            binary_threshold: 0.50,
            opening_radius: 1,
            max_area_ratio: 0.25,
            min_area_ratio: 0.001,
            patch_trust_threshold: 0.05,
            manipulation_trust_threshold: 0.85,
            ai_weight: 1.0,
            manipulation_weight: 1.0,
            metadata_threshold: 0.75,
            metadata_max_boost: 0.25,
        }
    }
}

impl FusionConfig {
    /// Parse and validate a policy from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on malformed TOML and [`Error::InvalidConfig`]
    /// if a value is out of range.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a policy file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, otherwise the errors
    /// of [`FusionConfig::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check every value against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let unit_fields = [
            ("binary_threshold", self.binary_threshold),
            ("max_area_ratio", self.max_area_ratio),
            ("min_area_ratio", self.min_area_ratio),
            ("patch_trust_threshold", self.patch_trust_threshold),
            ("manipulation_trust_threshold", self.manipulation_trust_threshold),
            ("metadata_threshold", self.metadata_threshold),
            ("metadata_max_boost", self.metadata_max_boost),
        ];
        for (name, value) in unit_fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        if self.min_area_ratio <= 0.0 {
            return Err(Error::InvalidConfig(
                "min_area_ratio must be positive".to_string(),
            ));
        }
        if self.patch_trust_threshold <= 0.0 {
            return Err(Error::InvalidConfig(
                "patch_trust_threshold must be positive".to_string(),
            ));
        }
        if self.metadata_threshold >= 1.0 {
            return Err(Error::InvalidConfig(
                "metadata_threshold must be below 1".to_string(),
            ));
        }

        for (name, value) in [
            ("ai_weight", self.ai_weight),
            ("manipulation_weight", self.manipulation_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }

        Ok(())
    }
}

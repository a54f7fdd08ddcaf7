//! Metadata-driven suspicion boost.
//!
//! A metadata score at or below the threshold never changes suspicion, so
//! missing or ordinary EXIF cannot produce false positives. Above it, the
//! boost grows linearly up to `max_boost` and is applied to the remaining
//! headroom: `final = base + boost * (1 - base)`.

use serde::{Deserialize, Serialize};

use crate::config::FusionConfig;
use crate::map::clip01;

/// Added to the headroom denominator when normalizing the excess score.
const HEADROOM_EPS: f32 = 1e-8;

/// Precomputed metadata suspicion from an external EXIF analyzer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataSignal {
    /// Suspicion in `[0, 1]`.
    pub score: f32,
    /// Human-readable explanation, carried through to reports untouched.
    #[serde(default)]
    pub reason: String,
}

impl MetadataSignal {
    /// Signal with an explanation.
    pub fn new(score: f32, reason: impl Into<String>) -> Self {
        Self {
            score,
            reason: reason.into(),
        }
    }
}

/// Raises suspicion when metadata is clearly anomalous.
#[derive(Debug, Clone, Copy)]
pub struct MetadataBooster {
    threshold: f32,
    max_boost: f32,
}

impl Default for MetadataBooster {
    fn default() -> Self {
        Self::new(&FusionConfig::default())
    }
}

impl MetadataBooster {
    /// Booster using the metadata threshold and cap of `config`.
    #[must_use]
    pub fn new(config: &FusionConfig) -> Self {
        Self {
            threshold: config.metadata_threshold,
            max_boost: config.metadata_max_boost,
        }
    }

    /// Fraction of the headroom added for `metadata_score`, in `[0, max_boost]`.
    #[must_use]
    pub fn boost_amount(&self, metadata_score: f32) -> f32 {
        let m = clip01(metadata_score);
        if m <= self.threshold {
            return 0.0;
        }
        let norm = clip01((m - self.threshold) / (1.0 - self.threshold + HEADROOM_EPS));
        self.max_boost * norm
    }

    /// Apply the metadata boost to `base_suspicion`.
    #[must_use]
    pub fn boost(&self, base_suspicion: f32, metadata_score: f32) -> f32 {
        let base = clip01(base_suspicion);
        let amount = self.boost_amount(metadata_score);
        clip01(base + amount * (1.0 - base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_or_below_threshold_is_noop() {
        let b = MetadataBooster::default();
        for m in [0.0, 0.3, 0.6, 0.75] {
            for base in [0.0, 0.42, 1.0] {
                assert!((b.boost(base, m) - base).abs() < f32::EPSILON);
            }
        }
    }

    #[test]
    fn strong_metadata_boosts_from_zero() {
        let b = MetadataBooster::default();
        let v = b.boost(0.0, 0.95);
        assert!((v - 0.2).abs() < 1e-5, "got {v}");
    }

    #[test]
    fn maximal_metadata_adds_capped_boost() {
        let b = MetadataBooster::default();
        assert!((b.boost_amount(1.0) - 0.25).abs() < 1e-5);
        let v = b.boost(0.6, 1.0);
        assert!((v - 0.7).abs() < 1e-5, "got {v}");
    }

    #[test]
    fn saturated_base_stays_at_one() {
        let b = MetadataBooster::default();
        assert!((b.boost(1.0, 1.0) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn boost_is_monotonic_above_threshold() {
        let b = MetadataBooster::default();
        let mut prev = b.boost(0.3, 0.75);
        for step in 1..=50 {
            #[allow(clippy::cast_precision_loss)]
            let m = 0.75 + 0.005 * step as f32;
            let v = b.boost(0.3, m);
            assert!(v >= prev, "not monotonic at {m}: {v} < {prev}");
            assert!(v <= 1.0);
            prev = v;
        }
    }

    #[test]
    fn out_of_range_metadata_is_clipped() {
        let b = MetadataBooster::default();
        assert!((b.boost(0.0, 7.0) - b.boost(0.0, 1.0)).abs() < f32::EPSILON);
        assert!(b.boost(0.0, -1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn signal_deserializes_without_reason() {
        let s: MetadataSignal = serde_json::from_str(r#"{"score": 0.85}"#).unwrap();
        assert!((s.score - 0.85).abs() < f32::EPSILON);
        assert!(s.reason.is_empty());
    }
}

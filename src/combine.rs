//! Area-aware damping and weighted noisy-OR of the two visual signals.
//!
//! `visual = 1 - (1 - ai)^w_ai * (1 - manip_eff)^w_manip`
//!
//! Any single near-certain signal drives the result towards 1, while two weak
//! signals stay weak.

use crate::config::FusionConfig;
use crate::map::clip01;

/// Output of [`ScoreCombiner::combine`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualScore {
    /// Manipulation score after area damping.
    pub effective_manipulation: f32,
    /// Combined visual suspicion in `[0, 1]`.
    pub visual_suspicion: f32,
}

/// Merges the AI-generation and manipulation scores into one visual suspicion.
#[derive(Debug, Clone, Copy)]
pub struct ScoreCombiner {
    patch_trust_threshold: f32,
    manipulation_trust_threshold: f32,
    ai_weight: f32,
    manipulation_weight: f32,
}

impl Default for ScoreCombiner {
    fn default() -> Self {
        Self::new(&FusionConfig::default())
    }
}

impl ScoreCombiner {
    /// Combiner using the thresholds and weights of `config`.
    #[must_use]
    pub fn new(config: &FusionConfig) -> Self {
        Self {
            patch_trust_threshold: config.patch_trust_threshold,
            manipulation_trust_threshold: config.manipulation_trust_threshold,
            ai_weight: config.ai_weight,
            manipulation_weight: config.manipulation_weight,
        }
    }

    /// Discount a manipulation score whose detected area is small.
    ///
    /// Trusted as-is when `patch_score` exceeds the patch threshold or the
    /// score itself exceeds the manipulation threshold; otherwise scaled by
    /// `sqrt(patch_score / patch_threshold)`.
    #[must_use]
    pub fn damp(&self, manipulation_score: f32, patch_score: f32) -> f32 {
        let manip = clip01(manipulation_score);
        let patch = clip01(patch_score);
        if patch > self.patch_trust_threshold || manip > self.manipulation_trust_threshold {
            return manip;
        }
        let damping_factor = (patch / self.patch_trust_threshold).sqrt();
        clip01(manip * damping_factor)
    }

    /// Weighted noisy-OR of two suspicion scores.
    #[must_use]
    pub fn noisy_or(&self, ai_score: f32, manipulation_score: f32) -> f32 {
        let p_not_ai = (1.0 - clip01(ai_score)).powf(self.ai_weight);
        let p_not_manip = (1.0 - clip01(manipulation_score)).powf(self.manipulation_weight);
        clip01(1.0 - p_not_ai * p_not_manip)
    }

    /// Damp the manipulation score by area, then noisy-OR it with the AI score.
    #[must_use]
    pub fn combine(&self, ai_score: f32, manipulation_score: f32, patch_score: f32) -> VisualScore {
        let effective_manipulation = self.damp(manipulation_score, patch_score);
        VisualScore {
            effective_manipulation,
            visual_suspicion: self.noisy_or(ai_score, effective_manipulation),
        }
    }
}

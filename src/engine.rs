//! Fusion engine: refine, combine, boost, and merge heatmaps.

use log::{debug, trace};

use crate::combine::ScoreCombiner;
use crate::config::FusionConfig;
use crate::error::Result;
use crate::heatmap::HeatmapAligner;
use crate::map::{clip01, ScoreMap, SuppressionMask};
use crate::metadata::MetadataBooster;
use crate::refine::{MaskRefiner, RefineOutcome, RefineScratch};

/// Pipeline stage of a single fusion call. Stages only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionStage {
    /// Nothing computed yet.
    Idle,
    /// Refining the manipulation mask and aligning heatmaps.
    Refining,
    /// Combining AI and manipulation scores.
    Combining,
    /// Applying the metadata boost.
    Boosting,
    /// Result packaged.
    Done,
}

impl FusionStage {
    /// The stage that follows `self`; `Done` is terminal.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Idle => Self::Refining,
            Self::Refining => Self::Combining,
            Self::Combining => Self::Boosting,
            Self::Boosting | Self::Done => Self::Done,
        }
    }
}

fn advance(stage: &mut FusionStage) {
    let next = stage.next();
    trace!("fusion stage {stage:?} -> {next:?}");
    *stage = next;
}

/// The four scalar inputs to score fusion.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DetectionSample {
    /// AI-generation suspicion.
    pub ai_score: f32,
    /// Refined manipulation confidence.
    pub manipulation_score: f32,
    /// Area proxy of the manipulation map, used only for damping.
    pub patch_score: f32,
    /// Metadata suspicion.
    pub metadata_score: f32,
}

impl DetectionSample {
    /// Copy with every score clipped into `[0, 1]`.
    #[must_use]
    pub fn clipped(self) -> Self {
        Self {
            ai_score: clip01(self.ai_score),
            manipulation_score: clip01(self.manipulation_score),
            patch_score: clip01(self.patch_score),
            metadata_score: clip01(self.metadata_score),
        }
    }
}

/// Scalar outcome of [`FusionEngine::fuse_scores`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreFusion {
    /// Manipulation score after area damping.
    pub effective_manipulation: f32,
    /// Noisy-OR of the AI and effective manipulation scores.
    pub visual_suspicion: f32,
    /// Visual suspicion after the metadata boost.
    pub final_suspicion: f32,
}

/// Borrowed inputs for one [`FusionEngine::fuse`] call.
#[derive(Debug, Clone, Copy)]
pub struct FusionInput<'a> {
    /// AI-generation suspicion from the external classifier.
    pub ai_score: f32,
    /// Activation map from the classifier's explainer.
    pub ai_heatmap: &'a ScoreMap,
    /// Raw manipulation probability map.
    pub manipulation_mask: &'a ScoreMap,
    /// Optional regions that must not count as manipulation evidence.
    pub suppression: Option<&'a SuppressionMask>,
    /// Metadata suspicion from the external EXIF analyzer.
    pub metadata_score: f32,
}

/// Scores and merged heatmap for one image.
#[derive(Debug, Clone)]
pub struct FusionResult {
    /// Clipped scalar inputs, with the refined manipulation and patch scores.
    pub sample: DetectionSample,
    /// Which refinement gate decided the manipulation score.
    pub refine_outcome: RefineOutcome,
    /// Manipulation score after area damping.
    pub effective_manipulation: f32,
    /// Combined visual suspicion before the metadata boost.
    pub visual_suspicion: f32,
    /// Suspicion after the metadata boost.
    pub final_suspicion: f32,
    /// Authoritative output; equals `final_suspicion`. Higher is more suspicious.
    pub fusion_score: f32,
    /// Elementwise max of the normalized AI and manipulation heatmaps, on the AI grid.
    pub fusion_heatmap: ScoreMap,
}

impl FusionResult {
    /// `1 - fusion_score`, for display.
    #[must_use]
    pub fn authenticity(&self) -> f32 {
        1.0 - self.fusion_score
    }
}

/// Stateless fusion pipeline configured once at construction.
///
/// All methods take `&self` and allocate their outputs, so one engine can be
/// shared across threads.
#[derive(Debug, Clone)]
pub struct FusionEngine {
    config: FusionConfig,
    refiner: MaskRefiner,
    aligner: HeatmapAligner,
    combiner: ScoreCombiner,
    booster: MetadataBooster,
}

impl Default for FusionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FusionEngine {
    /// Engine with the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::build(FusionConfig::default())
    }

    /// Engine with a custom policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`](crate::Error::InvalidConfig) if the
    /// policy fails validation.
    pub fn with_config(config: FusionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: FusionConfig) -> Self {
        Self {
            refiner: MaskRefiner::new(&config),
            aligner: HeatmapAligner::new(),
            combiner: ScoreCombiner::new(&config),
            booster: MetadataBooster::new(&config),
            config,
        }
    }

    /// The policy this engine was built with.
    #[must_use]
    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Combine and boost already-refined scalar scores.
    #[must_use]
    pub fn fuse_scores(&self, sample: DetectionSample) -> ScoreFusion {
        let s = sample.clipped();
        let visual = self
            .combiner
            .combine(s.ai_score, s.manipulation_score, s.patch_score);
        let final_suspicion = self
            .booster
            .boost(visual.visual_suspicion, s.metadata_score);
        ScoreFusion {
            effective_manipulation: visual.effective_manipulation,
            visual_suspicion: visual.visual_suspicion,
            final_suspicion,
        }
    }

    /// Run the full pipeline on one image's detector outputs.
    ///
    /// # Errors
    ///
    /// Returns an error only if the heatmaps cannot be resized or merged,
    /// which cannot happen for maps built through [`ScoreMap`]'s constructors.
    pub fn fuse(&self, input: &FusionInput<'_>) -> Result<FusionResult> {
        self.fuse_with_scratch(input, &mut RefineScratch::default())
    }

    /// [`FusionEngine::fuse`] reusing refinement buffers across calls.
    ///
    /// # Errors
    ///
    /// See [`FusionEngine::fuse`].
    pub fn fuse_with_scratch(
        &self,
        input: &FusionInput<'_>,
        scratch: &mut RefineScratch,
    ) -> Result<FusionResult> {
        let mut stage = FusionStage::Idle;

        advance(&mut stage);
        let refinement =
            self.refiner
                .refine_with_scratch(input.manipulation_mask, input.suppression, scratch);
        let ai_norm = self.aligner.normalize(input.ai_heatmap);
        let manip_norm = self.aligner.normalize(&refinement.heatmap);
        let (w, h) = ai_norm.shape();
        let manip_norm = self.aligner.resize(&manip_norm, w, h)?;
        debug!(
            "refined manipulation {:.4} ({:?}, area {:.5}), patch {:.4}",
            refinement.score, refinement.outcome, refinement.area_ratio, refinement.patch_score
        );

        let sample = DetectionSample {
            ai_score: input.ai_score,
            manipulation_score: refinement.score,
            patch_score: refinement.patch_score,
            metadata_score: input.metadata_score,
        }
        .clipped();

        advance(&mut stage);
        let visual =
            self.combiner
                .combine(sample.ai_score, sample.manipulation_score, sample.patch_score);

        advance(&mut stage);
        let final_suspicion = self
            .booster
            .boost(visual.visual_suspicion, sample.metadata_score);

        let fusion_heatmap = self.aligner.merge(&ai_norm, &manip_norm)?;
        advance(&mut stage);
        debug!(
            "fusion: ai={:.4} manip_eff={:.4} visual={:.4} meta={:.4} final={final_suspicion:.4}",
            sample.ai_score,
            visual.effective_manipulation,
            visual.visual_suspicion,
            sample.metadata_score
        );
        debug_assert_eq!(stage, FusionStage::Done);

        Ok(FusionResult {
            sample,
            refine_outcome: refinement.outcome,
            effective_manipulation: visual.effective_manipulation,
            visual_suspicion: visual.visual_suspicion,
            final_suspicion,
            fusion_score: final_suspicion,
            fusion_heatmap,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_advance_in_order_and_stop_at_done() {
        let mut stage = FusionStage::Idle;
        let mut seen = vec![stage];
        for _ in 0..5 {
            stage = stage.next();
            seen.push(stage);
        }
        assert_eq!(
            seen,
            vec![
                FusionStage::Idle,
                FusionStage::Refining,
                FusionStage::Combining,
                FusionStage::Boosting,
                FusionStage::Done,
                FusionStage::Done,
            ]
        );
    }

    #[test]
    fn fuse_scores_ai_dominant_without_boost() {
        let engine = FusionEngine::new();
        let out = engine.fuse_scores(DetectionSample {
            ai_score: 0.9,
            manipulation_score: 0.1,
            patch_score: 0.2,
            metadata_score: 0.0,
        });
        assert!((out.visual_suspicion - 0.91).abs() < 1e-5);
        assert!((out.final_suspicion - 0.91).abs() < 1e-5);
    }

    #[test]
    fn fuse_scores_metadata_only() {
        let engine = FusionEngine::new();
        let out = engine.fuse_scores(DetectionSample {
            metadata_score: 0.95,
            ..DetectionSample::default()
        });
        assert!(out.visual_suspicion.abs() < f32::EPSILON);
        assert!((out.final_suspicion - 0.2).abs() < 1e-5);
    }

    #[test]
    fn fuse_scores_clips_inputs() {
        let engine = FusionEngine::new();
        let out = engine.fuse_scores(DetectionSample {
            ai_score: -3.0,
            manipulation_score: 2.0,
            patch_score: 9.0,
            metadata_score: f32::NAN,
        });
        assert!((out.final_suspicion - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn with_config_rejects_invalid_policy() {
        let config = FusionConfig {
            binary_threshold: 2.0,
            ..FusionConfig::default()
        };
        assert!(FusionEngine::with_config(config).is_err());
    }

    #[test]
    fn fuse_blank_masks_yields_zero_and_zero_heatmap() {
        let engine = FusionEngine::new();
        let ai = ScoreMap::filled(14, 14, 0.0).unwrap();
        let manip = ScoreMap::filled(32, 32, 0.0).unwrap();
        let result = engine
            .fuse(&FusionInput {
                ai_score: 0.0,
                ai_heatmap: &ai,
                manipulation_mask: &manip,
                suppression: None,
                metadata_score: 0.0,
            })
            .unwrap();
        assert!(result.fusion_score.abs() < f32::EPSILON);
        assert_eq!(result.refine_outcome, RefineOutcome::Empty);
        assert_eq!(result.fusion_heatmap.shape(), (14, 14));
        assert!(result.fusion_heatmap.as_slice().iter().all(|&v| v == 0.0));
        assert!((result.authenticity() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn fusion_score_equals_final_suspicion() {
        let engine = FusionEngine::new();
        let ai = ScoreMap::new(2, 2, vec![0.0, 0.5, 1.0, 0.2]).unwrap();
        let manip = ScoreMap::filled(8, 8, 0.3).unwrap();
        let result = engine
            .fuse(&FusionInput {
                ai_score: 0.4,
                ai_heatmap: &ai,
                manipulation_mask: &manip,
                suppression: None,
                metadata_score: 0.9,
            })
            .unwrap();
        assert!((result.fusion_score - result.final_suspicion).abs() < f32::EPSILON);
        assert!(result.final_suspicion > result.visual_suspicion);
    }
}

//! Reduce a raw manipulation probability map to one refined confidence.
//!
//! The pipeline is: suppress (e.g. faces), binarize, open with a square
//! structuring element, gate on the cleaned area, then damp the mean
//! surviving probability when the cleaned area is vanishingly small.
//!
//! The returned heatmap is the suppressed map *before* binarization, so the
//! visualization shows raw activation while the score stays heavily gated.

use log::{debug, trace};

use crate::config::FusionConfig;
use crate::map::{clip01, ScoreMap, SuppressionMask};
use crate::morphology::{BinaryOpening, MorphologicalFilter};
use crate::resample::{NearestNeighbor, Resampler};

/// Which gate decided the refined score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefineOutcome {
    /// No pixel survived thresholding and opening.
    Empty,
    /// The cleaned area exceeded the saturation ratio; treated as a detector failure.
    WholeImage,
    /// The score was computed from the surviving pixels.
    Scored,
}

/// Result of refining one probability map.
#[derive(Debug, Clone)]
pub struct Refinement {
    /// Refined manipulation confidence in `[0, 1]`.
    pub score: f32,
    /// Suppressed map prior to binarization.
    pub heatmap: ScoreMap,
    /// Mean of the suppressed map, used as an area proxy downstream.
    pub patch_score: f32,
    /// Which gate decided `score`.
    pub outcome: RefineOutcome,
    /// Pixels surviving the opening.
    pub pixel_count: usize,
    /// `pixel_count / total_pixels`.
    pub area_ratio: f32,
    /// Mean probability over surviving pixels (`0.0` unless `Scored`).
    pub base_confidence: f32,
    /// Small-area penalty applied to `base_confidence` (`0.0` unless `Scored`).
    pub area_factor: f32,
}

/// Reusable working buffers for [`MaskRefiner::refine_with_scratch`].
#[derive(Debug, Default)]
pub struct RefineScratch {
    suppression: Vec<f32>,
    binary: Vec<u8>,
    morphology: Vec<u8>,
}

/// Turns a probability map plus optional suppression mask into a refined score.
#[derive(Debug, Clone)]
pub struct MaskRefiner<F = BinaryOpening, R = NearestNeighbor> {
    binary_threshold: f32,
    max_area_ratio: f32,
    min_area_ratio: f32,
    filter: F,
    resampler: R,
}

impl MaskRefiner {
    /// Refiner with a square opening of the configured radius and
    /// nearest-neighbor suppression resampling.
    #[must_use]
    pub fn new(config: &FusionConfig) -> Self {
        Self::with_parts(
            config,
            BinaryOpening {
                radius: config.opening_radius,
            },
            NearestNeighbor,
        )
    }
}

impl Default for MaskRefiner {
    fn default() -> Self {
        Self::new(&FusionConfig::default())
    }
}

impl<F: MorphologicalFilter, R: Resampler> MaskRefiner<F, R> {
    /// Refiner with caller-supplied morphology and resampling routines.
    pub fn with_parts(config: &FusionConfig, filter: F, resampler: R) -> Self {
        Self {
            binary_threshold: config.binary_threshold,
            max_area_ratio: config.max_area_ratio,
            min_area_ratio: config.min_area_ratio,
            filter,
            resampler,
        }
    }

    /// Refine `mask`, allocating fresh working buffers.
    #[must_use]
    pub fn refine(&self, mask: &ScoreMap, suppression: Option<&SuppressionMask>) -> Refinement {
        self.refine_with_scratch(mask, suppression, &mut RefineScratch::default())
    }

    /// Refine `mask`, reusing `scratch` across calls.
    #[must_use]
    pub fn refine_with_scratch(
        &self,
        mask: &ScoreMap,
        suppression: Option<&SuppressionMask>,
        scratch: &mut RefineScratch,
    ) -> Refinement {
        let (width, height) = mask.shape();
        let heatmap = self.suppress(mask, suppression, &mut scratch.suppression);
        let patch_score = clip01(heatmap.mean());

        let values = heatmap.as_slice();
        scratch.binary.clear();
        scratch
            .binary
            .extend(values.iter().map(|&v| u8::from(v > self.binary_threshold)));
        self.filter
            .apply(&mut scratch.binary, width, height, &mut scratch.morphology);
        let cleaned = &scratch.binary;

        let pixel_count = cleaned.iter().filter(|&&v| v != 0).count();
        #[allow(clippy::cast_precision_loss)]
        let area_ratio = pixel_count as f32 / values.len() as f32;

        let (outcome, base_confidence, area_factor) = if pixel_count == 0 {
            debug!(
                "refine: no pixels above {} after opening",
                self.binary_threshold
            );
            (RefineOutcome::Empty, 0.0, 0.0)
        } else if area_ratio > self.max_area_ratio {
            debug!(
                "refine: cleaned area {area_ratio:.4} exceeds {}, discarding",
                self.max_area_ratio
            );
            (RefineOutcome::WholeImage, 0.0, 0.0)
        } else {
            let masked_sum: f64 = values
                .iter()
                .zip(cleaned)
                .filter(|(_, &c)| c != 0)
                .map(|(&v, _)| f64::from(v))
                .sum();
            #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
            let base = (masked_sum / pixel_count as f64) as f32;
            let factor = if area_ratio >= self.min_area_ratio {
                1.0
            } else {
                (area_ratio / self.min_area_ratio).powi(2)
            };
            trace!(
                "refine: pixels={pixel_count} area={area_ratio:.5} base={base:.4} factor={factor:.4}"
            );
            (RefineOutcome::Scored, base, factor)
        };

        Refinement {
            score: clip01(base_confidence * area_factor),
            heatmap,
            patch_score,
            outcome,
            pixel_count,
            area_ratio,
            base_confidence,
            area_factor,
        }
    }

    /// `mask * suppression`, resampling the suppression mask to `mask`'s shape if needed.
    fn suppress(
        &self,
        mask: &ScoreMap,
        suppression: Option<&SuppressionMask>,
        buf: &mut Vec<f32>,
    ) -> ScoreMap {
        let Some(suppression) = suppression else {
            return mask.clone();
        };
        let (width, height) = mask.shape();

        let factors: &[f32] = if suppression.shape() == mask.shape() {
            suppression.as_map().as_slice()
        } else {
            debug!(
                "suppression mask {:?} resampled to mask shape {:?}",
                suppression.shape(),
                mask.shape()
            );
            self.resampler
                .resample_into(suppression.as_map(), width, height, buf);
            buf
        };

        let data = mask
            .as_slice()
            .iter()
            .zip(factors)
            .map(|(&m, &s)| m * s)
            .collect();
        ScoreMap::from_parts_unchecked(width, height, data)
    }
}

//! Normalize, resample and merge heatmaps from different detectors.

use crate::error::Result;
use crate::map::{clip01, ScoreMap};
use crate::resample::{Bilinear, Resampler};

/// Range below which a map is considered uniform.
const UNIFORM_RANGE: f32 = 1e-8;
/// Added to the range denominator during min-max scaling.
const NORMALIZE_EPS: f32 = 1e-8;

/// Brings maps of arbitrary range and resolution onto a common `[0, 1]` grid.
#[derive(Debug, Clone, Copy)]
pub struct HeatmapAligner<R = Bilinear> {
    resampler: R,
}

impl HeatmapAligner {
    /// Aligner with bilinear resampling.
    #[must_use]
    pub fn new() -> Self {
        Self {
            resampler: Bilinear,
        }
    }
}

impl Default for HeatmapAligner {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resampler> HeatmapAligner<R> {
    /// Aligner using a caller-supplied resampling routine.
    pub fn with_resampler(resampler: R) -> Self {
        Self { resampler }
    }

    /// Min-max scale `map` into `[0, 1]`.
    ///
    /// Uniform maps (range below `1e-8`) become all zeros.
    #[must_use]
    pub fn normalize(&self, map: &ScoreMap) -> ScoreMap {
        let (lo, hi) = map.min_max();
        let range = hi - lo;
        if range.is_nan() || range < UNIFORM_RANGE {
            return map.map_values(|_| 0.0);
        }
        let denom = range + NORMALIZE_EPS;
        map.map_values(|v| clip01((v - lo) / denom))
    }

    /// Resample `map` to `width x height`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`](crate::Error::InvalidInput) if `width`
    /// or `height` is zero.
    pub fn resize(&self, map: &ScoreMap, width: usize, height: usize) -> Result<ScoreMap> {
        if map.shape() == (width, height) {
            return Ok(map.clone());
        }
        self.resampler.resample(map, width, height)
    }

    /// Elementwise maximum of two same-shaped maps.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`](crate::Error::ShapeMismatch) if the
    /// shapes differ; resize one map first.
    pub fn merge(&self, a: &ScoreMap, b: &ScoreMap) -> Result<ScoreMap> {
        a.zip_with(b, f32::max)
    }

    /// Normalize both maps, resize `secondary` onto `reference`'s grid and merge.
    ///
    /// The engine passes the AI heatmap as `reference` and the manipulation
    /// heatmap as `secondary`.
    ///
    /// # Errors
    ///
    /// Never fails for maps built through [`ScoreMap`]'s constructors; the
    /// shapes are equalized before merging.
    pub fn align_and_merge(&self, reference: &ScoreMap, secondary: &ScoreMap) -> Result<ScoreMap> {
        let reference = self.normalize(reference);
        let secondary = self.normalize(secondary);
        let (w, h) = reference.shape();
        let secondary = self.resize(&secondary, w, h)?;
        self.merge(&reference, &secondary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn aligner() -> HeatmapAligner {
        HeatmapAligner::new()
    }

    #[test]
    fn normalize_uniform_map_is_all_zero() {
        let map = ScoreMap::filled(6, 4, 0.37).unwrap();
        let out = aligner().normalize(&map);
        assert_eq!(out.shape(), (6, 4));
        assert!(out.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn normalize_scales_to_unit_range() {
        let map = ScoreMap::new(4, 1, vec![-2.0, 0.0, 2.0, 6.0]).unwrap();
        let out = aligner().normalize(&map);
        let expected = [0.0, 0.25, 0.5, 1.0];
        for (v, e) in out.as_slice().iter().zip(expected) {
            assert!((v - e).abs() < 1e-5, "{v} vs {e}");
        }
    }

    #[test]
    fn normalize_all_nan_is_all_zero() {
        let map = ScoreMap::filled(2, 2, f32::NAN).unwrap();
        let out = aligner().normalize(&map);
        assert!(out.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn resize_same_shape_is_identity() {
        #[allow(clippy::cast_precision_loss)]
        let data: Vec<f32> = (0..35).map(|i| (i as f32 * 0.37).sin().abs()).collect();
        let map = ScoreMap::new(7, 5, data).unwrap();
        let out = aligner().resize(&map, 7, 5).unwrap();
        for (a, b) in map.as_slice().iter().zip(out.as_slice()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn resize_changes_shape() {
        let map = ScoreMap::filled(16, 16, 0.5).unwrap();
        let out = aligner().resize(&map, 4, 8).unwrap();
        assert_eq!(out.shape(), (4, 8));
        assert!(out.as_slice().iter().all(|&v| (v - 0.5).abs() < 1e-6));
    }

    #[test]
    fn resize_to_empty_shape_is_invalid_input() {
        let map = ScoreMap::filled(4, 3, 0.5).unwrap();
        assert!(matches!(
            aligner().resize(&map, 0, 3),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn merge_takes_elementwise_max() {
        let a = ScoreMap::new(3, 1, vec![0.1, 0.9, 0.5]).unwrap();
        let b = ScoreMap::new(3, 1, vec![0.4, 0.2, 0.5]).unwrap();
        let m = aligner().merge(&a, &b).unwrap();
        assert_eq!(m.as_slice(), &[0.4, 0.9, 0.5]);
    }

    #[test]
    fn merge_rejects_mismatched_shapes() {
        let a = ScoreMap::filled(3, 3, 0.1).unwrap();
        let b = ScoreMap::filled(4, 3, 0.1).unwrap();
        assert!(matches!(
            aligner().merge(&a, &b),
            Err(Error::ShapeMismatch {
                expected: (3, 3),
                actual: (4, 3)
            })
        ));
    }

    #[test]
    fn align_and_merge_uses_reference_shape() {
        let reference = ScoreMap::new(2, 2, vec![0.0, 1.0, 0.0, 0.0]).unwrap();
        let secondary = ScoreMap::filled(8, 8, 3.0).unwrap();
        let merged = aligner().align_and_merge(&reference, &secondary).unwrap();
        assert_eq!(merged.shape(), (2, 2));
        // Secondary is uniform so normalizes to zero; reference survives.
        assert!((merged.get(1, 0) - 1.0).abs() < 1e-6);
        assert!(merged.get(0, 1).abs() < 1e-6);
        assert!(merged.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
    }
}

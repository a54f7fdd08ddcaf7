//! Resampling of score maps to a target resolution.
//!
//! Both resamplers use pixel-center sampling (`align_corners = false`):
//! destination pixel `d` samples source coordinate `(d + 0.5) * src / dst - 0.5`,
//! so a same-size resample is the identity.

use crate::error::Result;
use crate::map::{checked_len, ScoreMap};

/// Capability: resample a map to `width x height`.
pub trait Resampler {
    /// Write the resampled values of `src` into `out` (cleared first).
    fn resample_into(&self, src: &ScoreMap, width: usize, height: usize, out: &mut Vec<f32>);

    /// Resample `src` into a freshly allocated map.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`](crate::Error::InvalidInput) if `width`
    /// or `height` is zero.
    fn resample(&self, src: &ScoreMap, width: usize, height: usize) -> Result<ScoreMap> {
        let mut out = Vec::with_capacity(checked_len(width, height)?);
        self.resample_into(src, width, height, &mut out);
        Ok(ScoreMap::from_parts_unchecked(width, height, out))
    }
}

/// Bilinear interpolation, edge samples clamped to the border pixels.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bilinear;

/// Nearest-neighbor sampling; never blends values, so binary masks stay binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestNeighbor;

/// Source sample position for destination index `d`, with the two
/// neighbouring source indices and the weight of the second one.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn linear_tap(d: usize, src_len: usize, dst_len: usize) -> (usize, usize, f32) {
    let scale = src_len as f32 / dst_len as f32;
    let pos = ((d as f32 + 0.5) * scale - 0.5).max(0.0);
    let i0 = (pos.floor() as usize).min(src_len - 1);
    let i1 = (i0 + 1).min(src_len - 1);
    let frac = if i0 == i1 { 0.0 } else { pos - i0 as f32 };
    (i0, i1, frac)
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn nearest_tap(d: usize, src_len: usize, dst_len: usize) -> usize {
    let scale = src_len as f32 / dst_len as f32;
    ((d as f32 * scale).floor() as usize).min(src_len - 1)
}

impl Resampler for Bilinear {
    fn resample_into(&self, src: &ScoreMap, width: usize, height: usize, out: &mut Vec<f32>) {
        out.clear();
        let (sw, sh) = src.shape();
        let data = src.as_slice();

        let x_taps: Vec<_> = (0..width).map(|x| linear_tap(x, sw, width)).collect();

        for y in 0..height {
            let (y0, y1, fy) = linear_tap(y, sh, height);
            let row0 = &data[y0 * sw..(y0 + 1) * sw];
            let row1 = &data[y1 * sw..(y1 + 1) * sw];
            for &(x0, x1, fx) in &x_taps {
                let top = row0[x0] + (row0[x1] - row0[x0]) * fx;
                let bottom = row1[x0] + (row1[x1] - row1[x0]) * fx;
                out.push(top + (bottom - top) * fy);
            }
        }
    }
}

impl Resampler for NearestNeighbor {
    fn resample_into(&self, src: &ScoreMap, width: usize, height: usize, out: &mut Vec<f32>) {
        out.clear();
        let (sw, sh) = src.shape();
        let data = src.as_slice();

        let x_taps: Vec<_> = (0..width).map(|x| nearest_tap(x, sw, width)).collect();

        for y in 0..height {
            let row = nearest_tap(y, sh, height) * sw;
            out.extend(x_taps.iter().map(|&x| data[row + x]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn ramp(w: usize, h: usize) -> ScoreMap {
        #[allow(clippy::cast_precision_loss)]
        let data = (0..w * h).map(|i| i as f32 / (w * h) as f32).collect();
        ScoreMap::new(w, h, data).unwrap()
    }

    #[test]
    fn bilinear_same_shape_is_identity() {
        let src = ramp(7, 5);
        let out = Bilinear.resample(&src, 7, 5).unwrap();
        for (a, b) in src.as_slice().iter().zip(out.as_slice()) {
            assert!((a - b).abs() < 1e-6, "{a} vs {b}");
        }
    }

    #[test]
    fn nearest_same_shape_is_identity() {
        let src = ramp(4, 6);
        let out = NearestNeighbor.resample(&src, 4, 6).unwrap();
        assert_eq!(src, out);
    }

    #[test]
    fn bilinear_upsample_interpolates_between_samples() {
        let src = ScoreMap::new(2, 1, vec![0.0, 1.0]).unwrap();
        let out = Bilinear.resample(&src, 4, 1).unwrap();
        // Sample positions: -0.25 (clamped 0), 0.25, 0.75, 1.25 (clamped to 1).
        let expected = [0.0, 0.25, 0.75, 1.0];
        for (v, e) in out.as_slice().iter().zip(expected) {
            assert!((v - e).abs() < 1e-6, "{v} vs {e}");
        }
    }

    #[test]
    fn bilinear_downsample_averages_neighbours() {
        let src = ScoreMap::new(4, 1, vec![0.0, 1.0, 0.0, 1.0]).unwrap();
        let out = Bilinear.resample(&src, 2, 1).unwrap();
        // Sample positions 0.5 and 2.5.
        for &v in out.as_slice() {
            assert!((v - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn nearest_upsample_keeps_binary_values() {
        let src = ScoreMap::new(2, 2, vec![0.0, 1.0, 1.0, 0.0]).unwrap();
        let out = NearestNeighbor.resample(&src, 5, 3).unwrap();
        assert!(out.as_slice().iter().all(|&v| v == 0.0 || v == 1.0));
        assert!(out.get(0, 0).abs() < f32::EPSILON);
        assert!((out.get(4, 0) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn resample_rejects_empty_target() {
        let src = ramp(4, 4);
        assert!(matches!(
            Bilinear.resample(&src, 0, 3),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            NearestNeighbor.resample(&src, 3, 0),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn resample_into_reuses_buffer() {
        let src = ramp(8, 8);
        let mut buf = Vec::with_capacity(64);
        Bilinear.resample_into(&src, 4, 4, &mut buf);
        assert_eq!(buf.len(), 16);
        NearestNeighbor.resample_into(&src, 2, 2, &mut buf);
        assert_eq!(buf.len(), 4);
    }
}

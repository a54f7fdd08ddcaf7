//! 2D score maps and suppression masks.
//!
//! Maps are stored row-major as a flat `Vec<f32>` of length `width * height`,
//! the same layout the alpha maps of any raster pipeline use.

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Horizontal padding added on each side of a suppressed region, as a fraction of its width.
const REGION_PAD_X: f32 = 0.1;
/// Vertical padding added above and below a suppressed region, as a fraction of its height.
const REGION_PAD_Y: f32 = 0.2;

/// Clip a score into `[0, 1]`. `NaN` maps to `0.0`.
#[must_use]
pub fn clip01(x: f32) -> f32 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

pub(crate) fn checked_len(width: usize, height: usize) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidInput(format!(
            "map dimensions must be non-zero, got {width}x{height}"
        )));
    }
    width
        .checked_mul(height)
        .ok_or_else(|| Error::InvalidInput(format!("map dimensions {width}x{height} overflow")))
}

/// A per-pixel probability map produced by an external detector.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreMap {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl ScoreMap {
    /// Wrap row-major `data` as a `width x height` map.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if either dimension is zero or
    /// `data.len() != width * height`.
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        let expected = checked_len(width, height)?;
        if data.len() != expected {
            return Err(Error::InvalidInput(format!(
                "map {width}x{height} needs {expected} values, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A map filled with a single value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if either dimension is zero.
    pub fn filled(width: usize, height: usize, value: f32) -> Result<Self> {
        let len = checked_len(width, height)?;
        Self::new(width, height, vec![value; len])
    }

    /// Build a map from nested rows, as transported in JSON requests.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for empty input or ragged rows.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(width * height);
        for (y, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(Error::InvalidInput(format!(
                    "row {y} has {} values, expected {width}",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Self::new(width, height, data)
    }

    /// Convert an 8-bit grayscale raster into probabilities `value / 255`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the image is empty.
    pub fn from_luma(img: &GrayImage) -> Result<Self> {
        let data = img.pixels().map(|p| f32::from(p[0]) / 255.0).collect();
        Self::new(img.width() as usize, img.height() as usize, data)
    }

    /// Render the map as an 8-bit grayscale raster, clipping values to `[0, 1]`.
    #[must_use]
    pub fn to_luma(&self) -> GrayImage {
        #[allow(clippy::cast_possible_truncation)]
        let (w, h) = (self.width as u32, self.height as u32);
        GrayImage::from_fn(w, h, |x, y| {
            let v = clip01(self.get(x as usize, y as usize));
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let level = (v * 255.0).round() as u8;
            Luma([level])
        })
    }

    /// Nested rows, one `Vec` per scanline.
    #[must_use]
    pub fn to_rows(&self) -> Vec<Vec<f32>> {
        self.data.chunks(self.width).map(<[f32]>::to_vec).collect()
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// `(width, height)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Total number of pixels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always `false`; constructors reject empty maps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate is outside the map.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    /// Row-major values.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Smallest and largest value. `NaN` entries are ignored.
    #[must_use]
    pub fn min_max(&self) -> (f32, f32) {
        self.data
            .iter()
            .filter(|v| !v.is_nan())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    /// Arithmetic mean of all values, accumulated in `f64`.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn mean(&self) -> f32 {
        let sum = self.data.iter().map(|&v| f64::from(v)).sum::<f64>();
        (sum / self.data.len() as f64) as f32
    }

    /// Apply `f` to every value, producing a new map of the same shape.
    #[must_use]
    pub fn map_values(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Combine two same-shaped maps value by value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] if the shapes differ.
    pub fn zip_with(&self, other: &Self, f: impl Fn(f32, f32) -> f32) -> Result<Self> {
        if self.shape() != other.shape() {
            return Err(Error::ShapeMismatch {
                expected: self.shape(),
                actual: other.shape(),
            });
        }
        Ok(Self {
            width: self.width,
            height: self.height,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }

    pub(crate) fn from_parts_unchecked(width: usize, height: usize, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            width,
            height,
            data,
        }
    }
}

/// Axis-aligned pixel rectangle, e.g. a detected face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Attenuation mask: regions at `0.0` never contribute manipulation evidence.
#[derive(Debug, Clone, PartialEq)]
pub struct SuppressionMask(ScoreMap);

impl SuppressionMask {
    /// Wrap an existing map as a suppression mask.
    #[must_use]
    pub fn new(map: ScoreMap) -> Self {
        Self(map)
    }

    /// Mask that suppresses nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if either dimension is zero.
    pub fn ones(width: usize, height: usize) -> Result<Self> {
        ScoreMap::filled(width, height, 1.0).map(Self)
    }

    /// All-ones mask with each region zeroed, padded by 10% of the region
    /// width left and right and 20% of its height above and below.
    ///
    /// Regions partly or fully outside the mask are clipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if either dimension is zero.
    pub fn from_regions(width: usize, height: usize, regions: &[Region]) -> Result<Self> {
        let mut data = vec![1.0_f32; checked_len(width, height)?];
        for r in regions {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let pad_w = (REGION_PAD_X * r.width as f32) as usize;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let pad_h = (REGION_PAD_Y * r.height as f32) as usize;

            let (x, y) = (r.x as usize, r.y as usize);
            let x1 = x.saturating_sub(pad_w);
            let y1 = y.saturating_sub(pad_h);
            let x2 = (x + r.width as usize + pad_w).min(width);
            let y2 = (y + r.height as usize + pad_h).min(height);

            for row in y1..y2 {
                for col in x1..x2 {
                    data[row * width + col] = 0.0;
                }
            }
        }
        ScoreMap::new(width, height, data).map(Self)
    }

    /// The underlying map.
    #[must_use]
    pub fn as_map(&self) -> &ScoreMap {
        &self.0
    }

    /// `(width, height)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.0.shape()
    }
}

impl From<ScoreMap> for SuppressionMask {
    fn from(map: ScoreMap) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip01_is_identity_inside_unit_interval() {
        for x in [0.0, 0.001, 0.25, 0.5, 0.999, 1.0] {
            assert!((clip01(x) - x).abs() < f32::EPSILON);
        }
        assert!(clip01(-0.3).abs() < f32::EPSILON);
        assert!((clip01(1.7) - 1.0).abs() < f32::EPSILON);
        assert!(clip01(f32::NAN).abs() < f32::EPSILON);
    }

    #[test]
    fn new_rejects_zero_dimensions() {
        assert!(matches!(
            ScoreMap::new(0, 4, vec![]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn new_rejects_wrong_length() {
        let err = ScoreMap::new(3, 3, vec![0.0; 8]).unwrap_err();
        assert!(err.to_string().contains("needs 9 values"));
    }

    #[test]
    fn from_rows_rejects_ragged_rows() {
        let rows = vec![vec![0.1, 0.2], vec![0.3]];
        let err = ScoreMap::from_rows(&rows).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn from_rows_and_to_rows_preserve_layout() {
        let rows = vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]];
        let map = ScoreMap::from_rows(&rows).unwrap();
        assert_eq!(map.shape(), (3, 2));
        assert!((map.get(2, 1) - 0.6).abs() < f32::EPSILON);
        assert_eq!(map.to_rows(), rows);
    }

    #[test]
    fn luma_conversion_scales_to_unit_range() {
        let mut img = GrayImage::new(2, 1);
        img.put_pixel(1, 0, Luma([255]));
        let map = ScoreMap::from_luma(&img).unwrap();
        assert!(map.get(0, 0).abs() < f32::EPSILON);
        assert!((map.get(1, 0) - 1.0).abs() < f32::EPSILON);

        let back = map.to_luma();
        assert_eq!(back.get_pixel(1, 0)[0], 255);
    }

    #[test]
    fn min_max_ignores_nan() {
        let map = ScoreMap::new(3, 1, vec![0.2, f32::NAN, 0.7]).unwrap();
        let (lo, hi) = map.min_max();
        assert!((lo - 0.2).abs() < f32::EPSILON);
        assert!((hi - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn zip_with_rejects_mismatched_shapes() {
        let a = ScoreMap::filled(2, 2, 0.5).unwrap();
        let b = ScoreMap::filled(3, 2, 0.5).unwrap();
        assert!(matches!(
            a.zip_with(&b, f32::max),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn from_regions_zeroes_padded_region() {
        // 20x10 face at (20, 20): pad 2px horizontally, 2px vertically.
        let region = Region {
            x: 20,
            y: 20,
            width: 20,
            height: 10,
        };
        let mask = SuppressionMask::from_regions(64, 64, &[region]).unwrap();
        let m = mask.as_map();
        assert!(m.get(18, 18).abs() < f32::EPSILON);
        assert!(m.get(41, 31).abs() < f32::EPSILON);
        assert!((m.get(17, 25) - 1.0).abs() < f32::EPSILON);
        assert!((m.get(30, 32) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn from_regions_clips_to_bounds() {
        let region = Region {
            x: 6,
            y: 6,
            width: 10,
            height: 10,
        };
        let mask = SuppressionMask::from_regions(8, 8, &[region]).unwrap();
        assert!(mask.as_map().get(7, 7).abs() < f32::EPSILON);
        assert!((mask.as_map().get(0, 0) - 1.0).abs() < f32::EPSILON);
    }
}

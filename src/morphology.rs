//! Binary morphology on flat `u8` masks (`0` background, `1` foreground).
//!
//! Pixels outside the mask never influence the result: erosion treats them as
//! foreground and dilation as background.

/// Capability: clean up a binary mask in place.
pub trait MorphologicalFilter {
    /// Filter `mask` (`width * height`, row-major), using `scratch` as working space.
    fn apply(&self, mask: &mut [u8], width: usize, height: usize, scratch: &mut Vec<u8>);
}

/// Opening (erosion then dilation) with a square all-ones structuring element
/// of side `2 * radius + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryOpening {
    /// Structuring element radius; `1` is the 3x3 square.
    pub radius: usize,
}

impl Default for BinaryOpening {
    fn default() -> Self {
        Self { radius: 1 }
    }
}

/// Neighbourhood bounds `[lo, hi]` of `i` clipped to `0..len`.
fn window(i: usize, radius: usize, len: usize) -> (usize, usize) {
    (i.saturating_sub(radius), (i + radius).min(len - 1))
}

/// `dst[p] = 1` iff every in-bounds neighbour of `p` in `src` is set.
fn erode(src: &[u8], dst: &mut [u8], width: usize, height: usize, radius: usize) {
    for y in 0..height {
        let (y0, y1) = window(y, radius, height);
        for x in 0..width {
            let (x0, x1) = window(x, radius, width);
            let all = (y0..=y1).all(|ny| {
                src[ny * width + x0..=ny * width + x1]
                    .iter()
                    .all(|&v| v != 0)
            });
            dst[y * width + x] = u8::from(all);
        }
    }
}

/// `dst[p] = 1` iff any in-bounds neighbour of `p` in `src` is set.
fn dilate(src: &[u8], dst: &mut [u8], width: usize, height: usize, radius: usize) {
    for y in 0..height {
        let (y0, y1) = window(y, radius, height);
        for x in 0..width {
            let (x0, x1) = window(x, radius, width);
            let any = (y0..=y1).any(|ny| {
                src[ny * width + x0..=ny * width + x1]
                    .iter()
                    .any(|&v| v != 0)
            });
            dst[y * width + x] = u8::from(any);
        }
    }
}

impl MorphologicalFilter for BinaryOpening {
    fn apply(&self, mask: &mut [u8], width: usize, height: usize, scratch: &mut Vec<u8>) {
        debug_assert_eq!(mask.len(), width * height);
        if self.radius == 0 || mask.is_empty() {
            return;
        }
        scratch.clear();
        scratch.resize(mask.len(), 0);
        erode(mask, scratch, width, height, self.radius);
        dilate(scratch, mask, width, height, self.radius);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(mask: &mut [u8], w: usize, h: usize) {
        let mut scratch = Vec::new();
        BinaryOpening::default().apply(mask, w, h, &mut scratch);
    }

    #[test]
    fn opening_removes_isolated_pixel() {
        let mut mask = vec![0u8; 7 * 7];
        mask[3 * 7 + 3] = 1;
        open(&mut mask, 7, 7);
        assert!(mask.iter().all(|&v| v == 0));
    }

    #[test]
    fn opening_removes_thin_line() {
        let mut mask = vec![0u8; 9 * 9];
        for x in 1..8 {
            mask[4 * 9 + x] = 1;
        }
        open(&mut mask, 9, 9);
        assert!(mask.iter().all(|&v| v == 0));
    }

    #[test]
    fn opening_preserves_3x3_block() {
        let mut mask = vec![0u8; 8 * 8];
        for y in 2..5 {
            for x in 3..6 {
                mask[y * 8 + x] = 1;
            }
        }
        let before = mask.clone();
        open(&mut mask, 8, 8);
        assert_eq!(mask, before);
    }

    #[test]
    fn opening_keeps_full_mask_at_borders() {
        let mut mask = vec![1u8; 5 * 4];
        open(&mut mask, 5, 4);
        assert!(mask.iter().all(|&v| v == 1));
    }

    #[test]
    fn opening_trims_spur_off_block() {
        let mut mask = vec![0u8; 10 * 10];
        for y in 3..7 {
            for x in 3..7 {
                mask[y * 10 + x] = 1;
            }
        }
        mask[3 * 10 + 7] = 1;
        open(&mut mask, 10, 10);
        assert_eq!(mask[3 * 10 + 7], 0);
        assert_eq!(mask.iter().map(|&v| usize::from(v)).sum::<usize>(), 16);
    }

    #[test]
    fn zero_radius_is_identity() {
        let mut mask = vec![0u8, 1, 0, 1];
        let mut scratch = Vec::new();
        BinaryOpening { radius: 0 }.apply(&mut mask, 2, 2, &mut scratch);
        assert_eq!(mask, vec![0, 1, 0, 1]);
    }
}

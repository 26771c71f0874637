//! Luminance to ramp-index quantization with brightness/contrast remapping.

/// Maps raw cell luminance to a density-ramp index. The contrast adjustment
/// is applied around a user-chosen midpoint and deliberately left unclamped;
/// the index mapping clamps into [0, 255] before bucketing.
#[derive(Clone, Copy, Debug)]
pub struct Quantizer {
    midpoint: f32,
    contrast: f32,
    invert: bool,
    levels: usize,
}

impl Quantizer {
    pub fn new(midpoint: f32, contrast: f32, invert: bool, levels: usize) -> Self {
        Self { midpoint, contrast, invert, levels: levels.max(1) }
    }

    /// Contrast/brightness remap. May leave [0, 255].
    pub fn adjust(&self, raw: f32) -> f32 {
        (raw - self.midpoint) * self.contrast + self.midpoint
    }

    /// Ramp index for a raw luminance in [0, 255]. Monotonic in `raw` for a
    /// fixed configuration (non-decreasing, or non-increasing when
    /// inverted).
    pub fn index(&self, raw: f32) -> usize {
        let adjusted = self.adjust(raw).clamp(0.0, 255.0);
        let bucket = (adjusted / 255.0 * self.levels as f32).floor() as usize;
        let index = bucket.min(self.levels - 1);
        if self.invert {
            self.levels - 1 - index
        } else {
            index
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_level_ramp_end_to_end_buckets() {
        // contrast 1 and midpoint 128 leave luminance untouched.
        let quantizer = Quantizer::new(128.0, 1.0, false, 2);
        assert_eq!(quantizer.index(200.0), 1);
        assert_eq!(quantizer.index(50.0), 0);
    }

    #[test]
    fn monotonic_over_full_range() {
        for invert in [false, true] {
            let quantizer = Quantizer::new(141.0, 0.55, invert, 10);
            let mut previous = quantizer.index(0.0);
            for raw in 1..=255 {
                let index = quantizer.index(raw as f32);
                if invert {
                    assert!(index <= previous, "invert must never increase the index");
                } else {
                    assert!(index >= previous, "must never decrease the index");
                }
                previous = index;
            }
        }
    }

    #[test]
    fn invert_mirrors_extremes() {
        let quantizer = Quantizer::new(128.0, 1.0, true, 8);
        assert_eq!(quantizer.index(0.0), 7);
        assert_eq!(quantizer.index(255.0), 0);
    }

    #[test]
    fn adjustment_is_unclamped_but_index_is_not() {
        let quantizer = Quantizer::new(128.0, 2.0, false, 4);
        assert!(quantizer.adjust(255.0) > 255.0);
        assert!(quantizer.adjust(0.0) < 0.0);
        assert_eq!(quantizer.index(255.0), 3);
        assert_eq!(quantizer.index(0.0), 0);
    }

    #[test]
    fn zero_levels_is_promoted_to_one() {
        let quantizer = Quantizer::new(128.0, 1.0, false, 0);
        assert_eq!(quantizer.index(200.0), 0);
    }
}

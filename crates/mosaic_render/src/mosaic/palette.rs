//! Anchor-palette policies and the character/color assignment they produce.

use std::sync::Arc;

use crate::color::{lerp_hsla, Hsla, Rgba};

use super::ramp::DensityRamp;

/// Closed set of color-assignment strategies. `Uniform`, `Gradient`,
/// `Banded` and `Thirds` derive one color per ramp position from the anchor
/// colors; `ImageDerived` bypasses the anchors entirely and takes one color
/// per grid cell from the sampler's dominant-color extraction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PalettePolicy {
    Uniform { color: Hsla },
    Gradient { start: Hsla, end: Hsla },
    Banded { start: Hsla, end: Hsla },
    Thirds { start: Hsla, mid: Hsla, end: Hsla },
    ImageDerived,
}

/// Concrete color mapping consumed by the renderers.
#[derive(Clone, Debug, PartialEq)]
pub enum ColorAssignment {
    /// One optional color per ramp position; blanks carry `None`.
    PerRamp(Vec<Option<Rgba>>),
    /// One color per grid cell, content-derived. Renderers fall back to a
    /// default color for out-of-range indices instead of failing.
    PerCell(Arc<Vec<[u8; 3]>>),
}

impl ColorAssignment {
    /// Resolves the color for a glyph at `ramp_position` in grid cell
    /// `cell`. `None` means unmapped; the renderers substitute their
    /// fallback color.
    pub fn resolve(&self, ramp_position: usize, cell: usize) -> Option<Rgba> {
        match self {
            ColorAssignment::PerRamp(colors) => colors.get(ramp_position).copied().flatten(),
            ColorAssignment::PerCell(colors) => colors.get(cell).copied().map(Rgba::from_rgb),
        }
    }
}

/// Builds the per-ramp color assignment for an anchor policy. Blank ramp
/// characters are skipped when counting positions and never receive a
/// color. `ImageDerived` has no anchor mapping; it yields an empty per-cell
/// assignment that the render path replaces with extracted cell colors.
pub fn build(policy: &PalettePolicy, ramp: &DensityRamp) -> ColorAssignment {
    if let PalettePolicy::ImageDerived = policy {
        return ColorAssignment::PerCell(Arc::new(Vec::new()));
    }

    let visible = ramp.visible_len();
    let mut colors = Vec::with_capacity(ramp.len());
    let mut position = 0usize;

    for &c in ramp.chars() {
        if DensityRamp::is_blank(c) {
            colors.push(None);
            continue;
        }

        let color = match *policy {
            PalettePolicy::Uniform { color } => color,
            PalettePolicy::Gradient { start, end } => {
                if visible <= 1 {
                    start
                } else {
                    lerp_hsla(start, end, position as f32 / (visible - 1) as f32)
                }
            },
            PalettePolicy::Banded { start, end } => {
                if position < visible / 2 {
                    start
                } else {
                    end
                }
            },
            PalettePolicy::Thirds { start, mid, end } => {
                if position < visible / 3 {
                    start
                } else if position < 2 * visible / 3 {
                    mid
                } else {
                    end
                }
            },
            PalettePolicy::ImageDerived => unreachable!("handled above"),
        };

        colors.push(Some(color.to_rgba()));
        position += 1;
    }

    ColorAssignment::PerRamp(colors)
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: Hsla = Hsla { h: 0.0, s: 100.0, l: 50.0, a: 1.0 };
    const MID: Hsla = Hsla { h: 120.0, s: 100.0, l: 50.0, a: 1.0 };
    const END: Hsla = Hsla { h: 240.0, s: 100.0, l: 50.0, a: 1.0 };

    fn per_ramp(assignment: ColorAssignment) -> Vec<Option<Rgba>> {
        match assignment {
            ColorAssignment::PerRamp(colors) => colors,
            ColorAssignment::PerCell(_) => panic!("expected per-ramp assignment"),
        }
    }

    #[test]
    fn uniform_maps_every_visible_char_to_the_anchor() {
        let ramp = DensityRamp::new("AB A", 0, 0);
        let colors = per_ramp(build(&PalettePolicy::Uniform { color: START }, &ramp));
        assert_eq!(colors.len(), 4);
        assert_eq!(colors[2], None);
        for index in [0, 1, 3] {
            assert_eq!(colors[index], Some(START.to_rgba()));
        }
    }

    #[test]
    fn gradient_endpoints_are_anchor_exact() {
        let ramp = DensityRamp::new("ABCDE", 0, 0);
        let colors = per_ramp(build(&PalettePolicy::Gradient { start: START, end: END }, &ramp));
        assert_eq!(colors[0], Some(START.to_rgba()));
        assert_eq!(colors[4], Some(END.to_rgba()));
    }

    #[test]
    fn gradient_skips_blanks_when_counting_positions() {
        let ramp = DensityRamp::new("A B", 0, 0);
        let colors = per_ramp(build(&PalettePolicy::Gradient { start: START, end: END }, &ramp));
        // Two visible characters: the second is the gradient's far end even
        // though it sits at ramp index 2.
        assert_eq!(colors[0], Some(START.to_rgba()));
        assert_eq!(colors[1], None);
        assert_eq!(colors[2], Some(END.to_rgba()));
    }

    #[test]
    fn single_visible_char_gradient_degenerates_to_start() {
        let ramp = DensityRamp::new("A", 0, 2);
        let colors = per_ramp(build(&PalettePolicy::Gradient { start: START, end: END }, &ramp));
        assert_eq!(colors[0], Some(START.to_rgba()));
    }

    #[test]
    fn banded_splits_at_floor_half() {
        let ramp = DensityRamp::new("ABCDE", 0, 0);
        let colors = per_ramp(build(&PalettePolicy::Banded { start: START, end: END }, &ramp));
        // floor(5 / 2) = 2 positions take the start color.
        assert_eq!(colors[0], Some(START.to_rgba()));
        assert_eq!(colors[1], Some(START.to_rgba()));
        assert_eq!(colors[2], Some(END.to_rgba()));
        assert_eq!(colors[4], Some(END.to_rgba()));
    }

    #[test]
    fn thirds_split_at_floor_boundaries() {
        let ramp = DensityRamp::new("ABCDEFG", 0, 0);
        let colors = per_ramp(build(&PalettePolicy::Thirds { start: START, mid: MID, end: END }, &ramp));
        // floor(7/3) = 2, floor(14/3) = 4.
        assert_eq!(colors[1], Some(START.to_rgba()));
        assert_eq!(colors[2], Some(MID.to_rgba()));
        assert_eq!(colors[3], Some(MID.to_rgba()));
        assert_eq!(colors[4], Some(END.to_rgba()));
    }

    #[test]
    fn duplicate_chars_get_per_position_colors() {
        let ramp = DensityRamp::new("AA", 0, 0);
        let colors = per_ramp(build(&PalettePolicy::Gradient { start: START, end: END }, &ramp));
        assert_ne!(colors[0], colors[1]);
    }

    #[test]
    fn per_cell_resolve_falls_out_of_range_to_none() {
        let assignment = ColorAssignment::PerCell(Arc::new(vec![[1, 2, 3]]));
        assert_eq!(assignment.resolve(0, 0), Some(Rgba { r: 1, g: 2, b: 3, a: 255 }));
        assert_eq!(assignment.resolve(0, 5), None);
    }
}

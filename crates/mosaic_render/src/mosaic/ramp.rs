//! Density ramp: the ordered character set standing in for luminance levels.

/// Filler appended `dark_fill` times at the dark end of the ramp.
pub const DARK_FILLER: char = '0';
/// Filler appended `space_fill` times at the light end of the ramp.
pub const LIGHT_FILLER: char = ' ';

/// Ordered characters from one brightness extreme to the other. Index 0 and
/// index len-1 are the extremes the quantizer maps onto. Duplicates are
/// allowed; each position can carry its own color.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DensityRamp {
    chars: Vec<char>,
}

impl DensityRamp {
    /// Builds the ramp from the user's base string plus the configured
    /// filler counts. An entirely empty ramp degrades to a single blank.
    pub fn new(base: &str, dark_fill: usize, space_fill: usize) -> Self {
        let mut chars: Vec<char> = base.chars().collect();
        chars.extend(std::iter::repeat(DARK_FILLER).take(dark_fill));
        chars.extend(std::iter::repeat(LIGHT_FILLER).take(space_fill));
        if chars.is_empty() {
            chars.push(LIGHT_FILLER);
        }
        Self { chars }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    /// Character at a ramp position, clamped into range.
    pub fn char_at(&self, index: usize) -> char {
        self.chars[index.min(self.chars.len() - 1)]
    }

    /// Blank ramp characters never receive a color and are never emitted as
    /// glyphs.
    pub fn is_blank(c: char) -> bool {
        c.is_whitespace()
    }

    /// Number of non-blank ramp positions.
    pub fn visible_len(&self) -> usize {
        self.chars.iter().filter(|&&c| !Self::is_blank(c)).count()
    }

    /// Distinct non-blank characters in codepoint order, the exact set the
    /// font subsetter needs to cover.
    pub fn distinct_visible(&self) -> String {
        let mut set: Vec<char> = self.chars.iter().copied().filter(|&c| !Self::is_blank(c)).collect();
        set.sort_unstable();
        set.dedup();
        set.into_iter().collect()
    }
}

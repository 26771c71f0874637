//! In-memory TrueType fixture for font tests, built with the same table
//! writers the subsetter uses: notdef, square glyphs for 'A' and 'B', and a
//! composite 'C' referencing 'A'.

use super::subset::{assemble_font, build_cmap, build_name};

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn push_i16(out: &mut Vec<u8>, value: i16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// One-contour square outline with 16-bit coordinates, padded to 4 bytes.
fn simple_square(x0: i16, y0: i16, size: i16) -> Vec<u8> {
    let mut glyph = Vec::new();
    push_i16(&mut glyph, 1); // numberOfContours
    push_i16(&mut glyph, x0);
    push_i16(&mut glyph, y0);
    push_i16(&mut glyph, x0 + size);
    push_i16(&mut glyph, y0 + size);
    push_u16(&mut glyph, 3); // endPtsOfContours
    push_u16(&mut glyph, 0); // instructionLength
    glyph.extend_from_slice(&[0x01; 4]); // on-curve, 16-bit deltas
    for delta in [x0, size, 0, -size] {
        push_i16(&mut glyph, delta);
    }
    for delta in [y0, 0, size, 0] {
        push_i16(&mut glyph, delta);
    }
    while glyph.len() % 4 != 0 {
        glyph.push(0);
    }
    glyph
}

/// Composite glyph with a single untransformed component.
fn composite(component: u16) -> Vec<u8> {
    let mut glyph = Vec::new();
    push_i16(&mut glyph, -1);
    push_i16(&mut glyph, 50);
    push_i16(&mut glyph, 0);
    push_i16(&mut glyph, 550);
    push_i16(&mut glyph, 500);
    push_u16(&mut glyph, 0x0003); // ARG_1_AND_2_ARE_WORDS | ARGS_ARE_XY_VALUES
    push_u16(&mut glyph, component);
    push_i16(&mut glyph, 0);
    push_i16(&mut glyph, 0);
    while glyph.len() % 4 != 0 {
        glyph.push(0);
    }
    glyph
}

fn build_head() -> Vec<u8> {
    let mut head = Vec::new();
    push_u32(&mut head, 0x0001_0000); // version
    push_u32(&mut head, 0); // fontRevision
    push_u32(&mut head, 0); // checkSumAdjustment (patched at assembly)
    push_u32(&mut head, 0x5F0F_3CF5); // magicNumber
    push_u16(&mut head, 0); // flags
    push_u16(&mut head, 1000); // unitsPerEm
    head.extend_from_slice(&[0u8; 16]); // created + modified
    push_i16(&mut head, 0); // xMin
    push_i16(&mut head, -200); // yMin
    push_i16(&mut head, 800); // xMax
    push_i16(&mut head, 800); // yMax
    push_u16(&mut head, 0); // macStyle
    push_u16(&mut head, 8); // lowestRecPPEM
    push_i16(&mut head, 2); // fontDirectionHint
    push_i16(&mut head, 1); // indexToLocFormat: long
    push_i16(&mut head, 0); // glyphDataFormat
    head
}

fn build_hhea(num_glyphs: u16) -> Vec<u8> {
    let mut hhea = Vec::new();
    push_u32(&mut hhea, 0x0001_0000);
    push_i16(&mut hhea, 800); // ascender
    push_i16(&mut hhea, -200); // descender
    push_i16(&mut hhea, 0); // lineGap
    push_u16(&mut hhea, 600); // advanceWidthMax
    push_i16(&mut hhea, 0); // minLeftSideBearing
    push_i16(&mut hhea, 0); // minRightSideBearing
    push_i16(&mut hhea, 800); // xMaxExtent
    push_i16(&mut hhea, 1); // caretSlopeRise
    push_i16(&mut hhea, 0); // caretSlopeRun
    push_i16(&mut hhea, 0); // caretOffset
    hhea.extend_from_slice(&[0u8; 8]); // reserved
    push_i16(&mut hhea, 0); // metricDataFormat
    push_u16(&mut hhea, num_glyphs); // numberOfHMetrics
    hhea
}

fn build_maxp(num_glyphs: u16) -> Vec<u8> {
    let mut maxp = Vec::new();
    push_u32(&mut maxp, 0x0001_0000);
    push_u16(&mut maxp, num_glyphs);
    for value in [4u16, 1, 4, 1, 2, 0, 0, 0, 0, 0, 0, 1, 1] {
        push_u16(&mut maxp, value);
    }
    maxp
}

/// Assembles the fixture font: "Mosaic Test Regular", 1000 units/em,
/// glyphs [notdef, 'A', 'B', 'C' (composite of 'A')].
pub(crate) fn sample_font() -> Vec<u8> {
    let glyphs = [Vec::new(), simple_square(50, 0, 500), simple_square(100, 50, 400), composite(1)];

    let mut glyf = Vec::new();
    let mut loca = Vec::new();
    push_u32(&mut loca, 0);
    for glyph in &glyphs {
        glyf.extend_from_slice(glyph);
        push_u32(&mut loca, glyf.len() as u32);
    }

    let mut hmtx = Vec::new();
    for _ in &glyphs {
        push_u16(&mut hmtx, 600);
        push_i16(&mut hmtx, 50);
    }

    let num_glyphs = glyphs.len() as u16;
    let mut post = vec![0u8; 32];
    post[0..4].copy_from_slice(&0x0003_0000u32.to_be_bytes());

    assemble_font(vec![
        (*b"cmap", build_cmap(&[('A' as u32, 1), ('B' as u32, 2), ('C' as u32, 3)])),
        (*b"glyf", glyf),
        (*b"head", build_head()),
        (*b"hhea", build_hhea(num_glyphs)),
        (*b"hmtx", hmtx),
        (*b"loca", loca),
        (*b"maxp", build_maxp(num_glyphs)),
        (*b"name", build_name("Mosaic Test", "Regular")),
        (*b"post", post),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_parses_with_fontdue() {
        let font =
            fontdue::Font::from_bytes(sample_font(), fontdue::FontSettings::default()).unwrap();
        assert_eq!(font.lookup_glyph_index('A'), 1);
        assert_eq!(font.lookup_glyph_index('B'), 2);
        assert_eq!(font.lookup_glyph_index('C'), 3);
        assert_eq!(font.lookup_glyph_index('z'), 0);

        let (metrics, coverage) = font.rasterize('A', 24.0);
        assert!(metrics.width > 0 && metrics.height > 0);
        assert!(coverage.iter().any(|&value| value > 0));
    }
}

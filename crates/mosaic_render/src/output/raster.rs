//! Raster mosaic rendering onto an owned pixel surface.

use std::collections::HashMap;

use fontdue::Metrics;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use log::{debug, warn};

use crate::color::Rgba;
use crate::mosaic::grid::{self, GridGeometry};
use crate::mosaic::palette::ColorAssignment;
use crate::mosaic::ramp::DensityRamp;
use crate::{Background, MosaicError, RenderConfig};

/// Glyphs with no mapped color fall back to this instead of failing the
/// render.
const FALLBACK_COLOR: Rgba = Rgba::WHITE;

/// Paints the character mosaic at `export_width` pixels wide; the height
/// follows the source aspect ratio. The effective grid is the configured
/// grid scaled by the ratio of export size to source size, so high-
/// resolution exports gain cells instead of stretching glyphs. Rendering is
/// best-effort per cell: color resolution problems degrade to a fallback
/// color, never an aborted render.
pub fn render(
    image: &RgbaImage,
    font: &fontdue::Font,
    config: &RenderConfig,
    assignment: &ColorAssignment,
    export_width: u32,
) -> Result<RgbaImage, MosaicError> {
    let (source_width, source_height) = image.dimensions();
    if source_width == 0 || source_height == 0 {
        return Err(MosaicError::EmptyImage);
    }
    if export_width == 0 {
        return Err(MosaicError::InvalidExportWidth(export_width));
    }

    let export_height =
        ((export_width as f64 * source_height as f64 / source_width as f64).round() as u32).max(1);

    let base = GridGeometry::derive(config.columns, source_width, source_height)?;
    let scale_x = export_width as f64 / source_width as f64;
    let scale_y = export_height as f64 / source_height as f64;
    let effective = GridGeometry {
        columns: ((base.columns as f64 * scale_x).floor() as u32).max(1),
        rows: ((base.rows as f64 * scale_y).floor() as u32).max(1),
    };
    debug!(
        "raster render {export_width}x{export_height}, grid {}x{}",
        effective.columns, effective.rows
    );

    let resampled = imageops::resize(image, export_width, export_height, FilterType::CatmullRom);
    let luminances = grid::luminance_grid(&resampled, &effective);

    let ramp = config.ramp();
    let quantizer = config.quantizer(ramp.len());

    let mut surface =
        RgbaImage::from_pixel(export_width, export_height, background_pixel(config.background));

    let cell_width = export_width as f32 / effective.columns as f32;
    let cell_height = export_height as f32 / effective.rows as f32;
    let font_size = 0.9 * cell_width.min(cell_height);

    let mut glyph_cache: HashMap<char, (Metrics, Vec<u8>)> = HashMap::new();
    let mut warned_fallback = false;

    for cy in 0..effective.rows {
        // Per-cell colors are extracted on the base grid; map each
        // export-scaled cell back to the base cell it covers.
        let base_cy = (cy as u64 * base.rows as u64 / effective.rows as u64) as u32;
        for cx in 0..effective.columns {
            let cell = (cy * effective.columns + cx) as usize;
            let index = quantizer.index(luminances[cell]);
            let c = ramp.char_at(index);
            if DensityRamp::is_blank(c) {
                continue;
            }

            let base_cx = (cx as u64 * base.columns as u64 / effective.columns as u64) as u32;
            let base_cell = (base_cy * base.columns + base_cx) as usize;
            let color = assignment.resolve(index, base_cell).unwrap_or_else(|| {
                if !warned_fallback {
                    warn!("no color mapped for {c:?} at cell {cell}; using fallback");
                    warned_fallback = true;
                }
                FALLBACK_COLOR
            });

            let (metrics, coverage) =
                glyph_cache.entry(c).or_insert_with(|| font.rasterize(c, font_size));

            let origin_x = cx as f32 * cell_width + (cell_width - metrics.width as f32) / 2.0;
            let origin_y = cy as f32 * cell_height + (cell_height - metrics.height as f32) / 2.0;
            blend_glyph(&mut surface, metrics, coverage, origin_x, origin_y, color);
        }
    }

    Ok(surface)
}

fn background_pixel(background: Background) -> image::Rgba<u8> {
    match background {
        Background::Black => image::Rgba([0, 0, 0, 255]),
        Background::White => image::Rgba([255, 255, 255, 255]),
        Background::Transparent => image::Rgba([0, 0, 0, 0]),
        Background::Custom(hsla) => {
            let rgba = hsla.to_rgba();
            image::Rgba([rgba.r, rgba.g, rgba.b, rgba.a])
        },
    }
}

/// Alpha-blends a glyph coverage bitmap onto the surface, clipping at the
/// edges.
fn blend_glyph(
    surface: &mut RgbaImage,
    metrics: &Metrics,
    coverage: &[u8],
    origin_x: f32,
    origin_y: f32,
    color: Rgba,
) {
    let (width, height) = surface.dimensions();
    let base_x = origin_x.round() as i64;
    let base_y = origin_y.round() as i64;

    for row in 0..metrics.height {
        let y = base_y + row as i64;
        if y < 0 || y >= height as i64 {
            continue;
        }
        for col in 0..metrics.width {
            let x = base_x + col as i64;
            if x < 0 || x >= width as i64 {
                continue;
            }

            let alpha =
                coverage[row * metrics.width + col] as f32 / 255.0 * color.a as f32 / 255.0;
            if alpha <= 0.0 {
                continue;
            }

            let pixel = surface.get_pixel_mut(x as u32, y as u32);
            let blend = |src: u8, dst: u8| (src as f32 * alpha + dst as f32 * (1.0 - alpha)).round() as u8;
            pixel.0 = [
                blend(color.r, pixel.0[0]),
                blend(color.g, pixel.0[1]),
                blend(color.b, pixel.0[2]),
                ((alpha + pixel.0[3] as f32 / 255.0 * (1.0 - alpha)) * 255.0).round() as u8,
            ];
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::color::Hsla;
    use crate::font::testfont::sample_font;
    use crate::font::FontFace;
    use crate::mosaic::palette::{self, PalettePolicy};

    use super::*;

    fn gray(width: u32, height: u32, level: u8) -> RgbaImage {
        RgbaImage::from_pixel(width, height, image::Rgba([level, level, level, 255]))
    }

    fn config(palette: PalettePolicy, background: Background) -> RenderConfig {
        RenderConfig {
            density: "AB".to_string(),
            dark_fill: 0,
            space_fill: 0,
            columns: 10,
            midpoint: 128.0,
            contrast: 1.0,
            invert: false,
            palette,
            background,
        }
    }

    fn test_face() -> FontFace {
        FontFace::from_bytes(sample_font()).unwrap()
    }

    #[test]
    fn export_dimensions_follow_aspect_ratio() {
        let face = test_face();
        let config = config(
            PalettePolicy::Uniform { color: Hsla::opaque(0.0, 100.0, 50.0) },
            Background::Black,
        );
        let ramp = config.ramp();
        let assignment = palette::build(&config.palette, &ramp);

        let image = gray(100, 50, 200);
        let surface = render(&image, face.fontdue(), &config, &assignment, 300).unwrap();
        assert_eq!(surface.dimensions(), (300, 150));
    }

    #[test]
    fn zero_export_width_is_an_input_error() {
        let face = test_face();
        let config = config(
            PalettePolicy::Uniform { color: Hsla::opaque(0.0, 100.0, 50.0) },
            Background::Black,
        );
        let ramp = config.ramp();
        let assignment = palette::build(&config.palette, &ramp);
        let image = gray(100, 50, 200);
        let result = render(&image, face.fontdue(), &config, &assignment, 0);
        assert!(matches!(result, Err(MosaicError::InvalidExportWidth(0))));
    }

    #[test]
    fn uniform_anchor_colors_every_glyph() {
        let face = test_face();
        let config = config(
            PalettePolicy::Uniform { color: Hsla::opaque(0.0, 100.0, 50.0) },
            Background::Black,
        );
        let ramp = config.ramp();
        let assignment = palette::build(&config.palette, &ramp);

        // Bright gray maps every cell to 'B'; the anchor is pure red.
        let image = gray(100, 50, 200);
        let surface = render(&image, face.fontdue(), &config, &assignment, 200).unwrap();

        let mut glyph_pixels = 0;
        for pixel in surface.pixels() {
            let [r, g, b, _] = pixel.0;
            if r > 0 || g > 0 || b > 0 {
                glyph_pixels += 1;
                // Blending red over black never introduces green or blue.
                assert_eq!((g, b), (0, 0), "unexpected color {:?}", pixel.0);
            }
        }
        assert!(glyph_pixels > 0, "no glyphs rendered");
    }

    #[test]
    fn image_derived_colors_follow_the_base_grid_at_scale() {
        let face = test_face();
        let config = config(PalettePolicy::ImageDerived, Background::Black);

        // Base-grid extraction: left half red, right half blue.
        let base = GridGeometry::derive(config.columns, 100, 50).unwrap();
        let cells: Vec<[u8; 3]> = (0..base.cell_count())
            .map(|cell| {
                let cx = (cell % base.columns as usize) as u32;
                if cx < base.columns / 2 {
                    [255, 0, 0]
                } else {
                    [0, 0, 255]
                }
            })
            .collect();
        let assignment = ColorAssignment::PerCell(Arc::new(cells));

        // Export at twice the source size: the effective grid has four
        // times the cells the colors were extracted on, so every export
        // cell must resolve through its covering base cell.
        let image = gray(100, 50, 50);
        let surface = render(&image, face.fontdue(), &config, &assignment, 200).unwrap();

        let mut red = 0;
        let mut blue = 0;
        for (x, _, pixel) in surface.enumerate_pixels() {
            let [r, g, b, _] = pixel.0;
            if (r, g, b) == (0, 0, 0) {
                continue;
            }
            assert_eq!(g, 0, "unexpected tint {:?} at x={x}", pixel.0);
            if x < 100 {
                assert_eq!(b, 0, "blue glyph on the red half at x={x}");
                red += 1;
            } else {
                assert_eq!(r, 0, "red glyph on the blue half at x={x}");
                blue += 1;
            }
        }
        assert!(red > 0 && blue > 0, "both halves must render glyphs");
    }

    #[test]
    fn unmapped_colors_fall_back_to_white() {
        let face = test_face();
        let config = config(PalettePolicy::ImageDerived, Background::Black);
        // Empty per-cell map: every lookup is out of range.
        let assignment = ColorAssignment::PerCell(Arc::new(Vec::new()));

        let image = gray(100, 50, 200);
        let surface = render(&image, face.fontdue(), &config, &assignment, 200).unwrap();
        let white = surface.pixels().filter(|p| p.0 == [255, 255, 255, 255]).count();
        assert!(white > 0, "fallback glyphs missing");
    }

    #[test]
    fn blank_ramp_renders_only_background() {
        let face = test_face();
        let mut config = config(
            PalettePolicy::Uniform { color: Hsla::opaque(0.0, 100.0, 50.0) },
            Background::Transparent,
        );
        config.density = " ".to_string();
        let ramp = config.ramp();
        let assignment = palette::build(&config.palette, &ramp);

        let image = gray(100, 50, 200);
        let surface = render(&image, face.fontdue(), &config, &assignment, 100).unwrap();
        assert!(surface.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn custom_background_fills_the_surface() {
        let face = test_face();
        let mut config = config(
            PalettePolicy::Uniform { color: Hsla::opaque(0.0, 100.0, 50.0) },
            Background::Custom(Hsla::opaque(240.0, 100.0, 50.0)),
        );
        config.density = " ".to_string();
        let ramp = config.ramp();
        let assignment = palette::build(&config.palette, &ramp);

        let image = gray(100, 50, 200);
        let surface = render(&image, face.fontdue(), &config, &assignment, 100).unwrap();
        assert_eq!(surface.get_pixel(0, 0).0, [0, 0, 255, 255]);
    }
}

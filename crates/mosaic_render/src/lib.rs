//! Character-mosaic rendering: image -> grid -> characters -> colors ->
//! raster or SVG output.
//!
//! The caller supplies a decoded pixel buffer, a loaded font and an
//! immutable [`RenderConfig`] snapshot per render; the library owns the
//! whole pipeline from grid sampling to the encoded artifact.

pub mod color;
pub mod font;
pub mod mosaic;
pub mod output;
pub mod schedule;

use std::sync::{Arc, Mutex};

use image::RgbaImage;

pub use color::{euclidean_distance, hsl_to_rgb, lerp_hsla, rgb_to_hsl, Hsla, Rgba};
pub use font::{FontFace, FontSubsetter, SubsetError};
pub use mosaic::grid::GridGeometry;
pub use mosaic::palette::{ColorAssignment, PalettePolicy};
pub use mosaic::quantize::Quantizer;
pub use mosaic::ramp::DensityRamp;
pub use schedule::{ExtractionState, ExtractionWorker, RenderScheduler, RenderToken};

use mosaic::{grid, palette};

#[derive(Debug, thiserror::Error)]
pub enum MosaicError {
    #[error("no image loaded")]
    EmptyImage,
    #[error("grid of {columns} columns collapses to zero rows for a {width}x{height} image")]
    DegenerateGrid { columns: u32, width: u32, height: u32 },
    #[error("invalid export width {0}")]
    InvalidExportWidth(u32),
    #[error(transparent)]
    FontSubset(#[from] SubsetError),
}

/// Background painted before any glyphs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Background {
    Black,
    White,
    Transparent,
    Custom(Hsla),
}

/// Immutable configuration snapshot read by one render pass. Hosts mutate
/// their own working copy and hand a fresh snapshot to each render, so no
/// state is shared across in-flight renders.
#[derive(Clone, Debug)]
pub struct RenderConfig {
    /// User-supplied density characters, darkest to lightest.
    pub density: String,
    /// Count of `'0'` fillers appended at the dark end.
    pub dark_fill: usize,
    /// Count of space fillers appended at the light end.
    pub space_fill: usize,
    /// Requested grid column count; clamped into [10, 300].
    pub columns: u32,
    /// Brightness midpoint the contrast adjustment pivots around.
    pub midpoint: f32,
    /// Contrast factor, typically in [0, 2].
    pub contrast: f32,
    /// Swap the dark and light ends of the ramp.
    pub invert: bool,
    pub palette: PalettePolicy,
    pub background: Background,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            density: "RRBZ21".to_string(),
            dark_fill: 4,
            space_fill: 0,
            columns: 150,
            midpoint: 141.0,
            contrast: 0.55,
            invert: true,
            palette: PalettePolicy::Gradient {
                start: Hsla::opaque(60.0, 100.0, 50.0),
                end: Hsla::opaque(300.0, 100.0, 50.0),
            },
            background: Background::Black,
        }
    }
}

impl RenderConfig {
    pub fn ramp(&self) -> DensityRamp {
        DensityRamp::new(&self.density, self.dark_fill, self.space_fill)
    }

    pub fn quantizer(&self, levels: usize) -> Quantizer {
        Quantizer::new(self.midpoint, self.contrast, self.invert, levels)
    }
}

/// Quantizes the image to rows of ramp characters without touching fonts or
/// colors. This is the text preview surface.
pub fn char_rows(image: &RgbaImage, config: &RenderConfig) -> Result<Vec<String>, MosaicError> {
    let (width, height) = image.dimensions();
    let geometry = GridGeometry::derive(config.columns, width, height)?;
    let luminances = grid::luminance_grid(image, &geometry);

    let ramp = config.ramp();
    let quantizer = config.quantizer(ramp.len());

    let columns = geometry.columns as usize;
    Ok(luminances
        .chunks(columns)
        .map(|row| row.iter().map(|&raw| ramp.char_at(quantizer.index(raw))).collect())
        .collect())
}

/// Owns the loaded font, the subset cache and the extraction worker; one
/// instance serves any number of render calls.
pub struct MosaicRenderer {
    face: Arc<FontFace>,
    subsetter: FontSubsetter,
    extraction: Mutex<ExtractionWorker>,
}

impl MosaicRenderer {
    pub fn new(font_data: Vec<u8>) -> Result<Self, MosaicError> {
        let face = Arc::new(FontFace::from_bytes(font_data)?);
        Ok(Self {
            subsetter: FontSubsetter::new(Arc::clone(&face)),
            face,
            extraction: Mutex::new(ExtractionWorker::spawn()),
        })
    }

    pub fn face(&self) -> &FontFace {
        &self.face
    }

    pub fn subsetter(&self) -> &FontSubsetter {
        &self.subsetter
    }

    /// Color assignment for one render pass. The image-derived policy goes
    /// through the extraction worker; anchor policies are pure ramp math.
    fn assignment(
        &self,
        image: &RgbaImage,
        config: &RenderConfig,
        geometry: GridGeometry,
    ) -> ColorAssignment {
        match config.palette {
            PalettePolicy::ImageDerived => {
                let mut extraction =
                    self.extraction.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                ColorAssignment::PerCell(extraction.extract_blocking(image, geometry))
            },
            ref policy => palette::build(policy, &config.ramp()),
        }
    }

    /// Renders the mosaic to a fresh pixel buffer `export_width` wide.
    pub fn render_raster(
        &self,
        image: &RgbaImage,
        config: &RenderConfig,
        export_width: u32,
    ) -> Result<RgbaImage, MosaicError> {
        let (width, height) = image.dimensions();
        let geometry = GridGeometry::derive(config.columns, width, height)?;
        let assignment = self.assignment(image, config, geometry);
        output::raster::render(image, self.face.fontdue(), config, &assignment, export_width)
    }

    /// Renders the mosaic as a self-contained SVG document string.
    pub fn render_svg(&self, image: &RgbaImage, config: &RenderConfig) -> Result<String, MosaicError> {
        let (width, height) = image.dimensions();
        let geometry = GridGeometry::derive(config.columns, width, height)?;
        let assignment = self.assignment(image, config, geometry);
        output::svg::render(image, config, &assignment, &self.subsetter)
    }
}

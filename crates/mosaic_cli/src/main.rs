use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use mosaic_render::{
    char_rows, Background, Hsla, MosaicRenderer, PalettePolicy, RenderConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Convert images to colored character mosaics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the character grid to stdout for a quick preview
    Preview(PreviewArgs),
    /// Render the mosaic to a raster image file
    Raster(RasterArgs),
    /// Render the mosaic to an SVG file with an embedded subset font
    Vector(VectorArgs),
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    /// Input image path
    input: PathBuf,
    #[command(flatten)]
    settings: RenderSettings,
}

#[derive(Parser, Debug)]
struct RasterArgs {
    /// Input image path
    input: PathBuf,
    /// Output image path (format chosen by extension)
    #[arg(short, long)]
    output: PathBuf,
    /// TrueType font file used for glyph shapes
    #[arg(short, long)]
    font: PathBuf,
    /// Export width in pixels; height follows the source aspect ratio
    #[arg(long, default_value_t = 1920)]
    export_width: u32,
    #[command(flatten)]
    settings: RenderSettings,
}

#[derive(Parser, Debug)]
struct VectorArgs {
    /// Input image path
    input: PathBuf,
    /// Output SVG path
    #[arg(short, long)]
    output: PathBuf,
    /// TrueType font file embedded (subset) into the SVG
    #[arg(short, long)]
    font: PathBuf,
    #[command(flatten)]
    settings: RenderSettings,
}

#[derive(Parser, Debug, Clone)]
struct RenderSettings {
    /// Density characters, darkest to lightest
    #[arg(long, default_value = "RRBZ21")]
    density: String,
    /// Count of '0' fillers appended at the dark end
    #[arg(long, default_value_t = 4)]
    dark_fill: usize,
    /// Count of space fillers appended at the light end
    #[arg(long, default_value_t = 0)]
    space_fill: usize,
    /// Grid column count (clamped to 10..=300)
    #[arg(long, default_value_t = 150)]
    columns: u32,
    /// Brightness midpoint the contrast adjustment pivots around
    #[arg(long, default_value_t = 141.0)]
    midpoint: f32,
    /// Contrast factor
    #[arg(long, default_value_t = 0.55)]
    contrast: f32,
    /// Swap the dark and light ends of the ramp
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    invert: bool,
    /// Color strategy
    #[arg(long, value_enum, default_value = "gradient")]
    palette: PaletteChoice,
    /// First anchor color as "h,s,l[,a]"
    #[arg(long, value_parser = parse_hsla, default_value = "60,100,50")]
    start: Hsla,
    /// Middle anchor color (three-color palette only)
    #[arg(long, value_parser = parse_hsla, default_value = "180,100,50")]
    middle: Hsla,
    /// Last anchor color
    #[arg(long, value_parser = parse_hsla, default_value = "300,100,50")]
    end: Hsla,
    /// Background fill
    #[arg(long, value_enum, default_value = "black")]
    background: BackgroundChoice,
    /// Background color as "h,s,l[,a]" when --background custom
    #[arg(long, value_parser = parse_hsla, default_value = "0,0,0")]
    bg_color: Hsla,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum PaletteChoice {
    Uniform,
    Gradient,
    Banded,
    Thirds,
    Image,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum BackgroundChoice {
    Black,
    White,
    Transparent,
    Custom,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Preview(args) => preview(args),
        Commands::Raster(args) => raster(args),
        Commands::Vector(args) => vector(args),
    }
}

fn preview(args: PreviewArgs) -> Result<()> {
    let image = load_image(&args.input)?;
    let config = args.settings.to_config();
    let rows = char_rows(&image, &config)
        .with_context(|| format!("failed to render {:?}", args.input))?;

    for row in rows {
        println!("{}", row);
    }

    Ok(())
}

fn raster(args: RasterArgs) -> Result<()> {
    let image = load_image(&args.input)?;
    let renderer = load_renderer(&args.font)?;
    let config = args.settings.to_config();

    let surface = renderer
        .render_raster(&image, &config, args.export_width)
        .with_context(|| format!("failed to render {:?}", args.input))?;
    surface
        .save(&args.output)
        .with_context(|| format!("failed to write {:?}", args.output))?;
    Ok(())
}

fn vector(args: VectorArgs) -> Result<()> {
    let image = load_image(&args.input)?;
    let renderer = load_renderer(&args.font)?;
    let config = args.settings.to_config();

    let svg = renderer
        .render_svg(&image, &config)
        .with_context(|| format!("failed to render {:?}", args.input))?;
    fs::write(&args.output, svg)
        .with_context(|| format!("failed to write {:?}", args.output))?;
    Ok(())
}

fn load_image(path: &PathBuf) -> Result<image::RgbaImage> {
    let image = image::open(path).with_context(|| format!("failed to open image {:?}", path))?;
    Ok(image.into_rgba8())
}

fn load_renderer(font: &PathBuf) -> Result<MosaicRenderer> {
    let data = fs::read(font).with_context(|| format!("failed to read font {:?}", font))?;
    MosaicRenderer::new(data).with_context(|| format!("failed to load font {:?}", font))
}

fn parse_hsla(value: &str) -> Result<Hsla, String> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return Err(format!("expected \"h,s,l\" or \"h,s,l,a\", got {value:?}"));
    }
    let mut components = [0.0f32; 4];
    components[3] = 1.0;
    for (slot, part) in components.iter_mut().zip(&parts) {
        *slot = part.parse::<f32>().map_err(|err| format!("invalid component {part:?}: {err}"))?;
    }
    Ok(Hsla::new(components[0], components[1], components[2], components[3]))
}

impl RenderSettings {
    fn to_config(&self) -> RenderConfig {
        RenderConfig {
            density: self.density.clone(),
            dark_fill: self.dark_fill,
            space_fill: self.space_fill,
            columns: self.columns,
            midpoint: self.midpoint,
            contrast: self.contrast,
            invert: self.invert,
            palette: self.palette.to_policy(self),
            background: self.background.to_background(self),
        }
    }
}

impl PaletteChoice {
    fn to_policy(self, settings: &RenderSettings) -> PalettePolicy {
        match self {
            PaletteChoice::Uniform => PalettePolicy::Uniform { color: settings.start },
            PaletteChoice::Gradient => {
                PalettePolicy::Gradient { start: settings.start, end: settings.end }
            },
            PaletteChoice::Banded => {
                PalettePolicy::Banded { start: settings.start, end: settings.end }
            },
            PaletteChoice::Thirds => PalettePolicy::Thirds {
                start: settings.start,
                mid: settings.middle,
                end: settings.end,
            },
            PaletteChoice::Image => PalettePolicy::ImageDerived,
        }
    }
}

impl BackgroundChoice {
    fn to_background(self, settings: &RenderSettings) -> Background {
        match self {
            BackgroundChoice::Black => Background::Black,
            BackgroundChoice::White => Background::White,
            BackgroundChoice::Transparent => Background::Transparent,
            BackgroundChoice::Custom => Background::Custom(settings.bg_color),
        }
    }
}

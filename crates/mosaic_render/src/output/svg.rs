//! Run-length-encoded SVG export with an embedded glyph-subset font.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::RgbaImage;
use log::debug;

use crate::color::Rgba;
use crate::font::FontSubsetter;
use crate::mosaic::grid::{self, GridGeometry};
use crate::mosaic::palette::ColorAssignment;
use crate::mosaic::ramp::DensityRamp;
use crate::{Background, MosaicError, RenderConfig};

/// One horizontal run of identical glyphs sharing a color class. `x` is the
/// starting column; the run covers columns [x, x + len) — the end column is
/// exclusive and the final run of a row is flushed once at row end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Run {
    pub ch: char,
    pub class: Option<String>,
    pub x: usize,
    pub len: usize,
}

/// Merges a row of cells into glyph runs. `None` cells are blanks: they are
/// never emitted, only advance the horizontal position (and therefore split
/// runs).
pub(crate) fn merge_row(cells: &[Option<(char, Option<String>)>]) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    let mut current: Option<Run> = None;

    for (x, cell) in cells.iter().enumerate() {
        match cell {
            Some((ch, class)) => match current.as_mut() {
                Some(run) if run.ch == *ch && run.class == *class => run.len += 1,
                _ => {
                    if let Some(run) = current.take() {
                        runs.push(run);
                    }
                    current = Some(Run { ch: *ch, class: class.clone(), x, len: 1 });
                },
            },
            None => {
                if let Some(run) = current.take() {
                    runs.push(run);
                }
            },
        }
    }

    if let Some(run) = current.take() {
        runs.push(run);
    }
    runs
}

/// Emits the mosaic as a self-contained SVG document: one `<text>` per row,
/// one `<tspan>` per run, a `<style>` block with the color classes, and the
/// subset font inlined as a base64 data URI.
pub fn render(
    image: &RgbaImage,
    config: &RenderConfig,
    assignment: &ColorAssignment,
    subsetter: &FontSubsetter,
) -> Result<String, MosaicError> {
    let (width, height) = image.dimensions();
    let geometry = GridGeometry::derive(config.columns, width, height)?;

    let luminances = grid::luminance_grid(image, &geometry);
    let ramp = config.ramp();
    let quantizer = config.quantizer(ramp.len());

    // A per-ramp assignment with at most one distinct color collapses to a
    // single global fill with no per-glyph classes.
    let global_fill = global_fill(assignment);
    let mut classes: BTreeMap<String, Rgba> = BTreeMap::new();

    let mut cells: Vec<Option<(char, Option<String>)>> = Vec::with_capacity(geometry.cell_count());
    for (cell, &raw) in luminances.iter().enumerate() {
        let index = quantizer.index(raw);
        let c = ramp.char_at(index);
        if DensityRamp::is_blank(c) {
            cells.push(None);
            continue;
        }

        let class = if global_fill.is_some() {
            None
        } else {
            let color = assignment.resolve(index, cell).unwrap_or(Rgba::WHITE);
            let name = match assignment {
                ColorAssignment::PerRamp(_) => format!("r{index}"),
                ColorAssignment::PerCell(_) => {
                    // Deterministic name from the channel values so cells
                    // sharing a color share a class.
                    format!("c{}_{}_{}", color.r, color.g, color.b)
                },
            };
            classes.entry(name.clone()).or_insert(color);
            Some(name)
        };
        cells.push(Some((c, class)));
    }

    let subset = subsetter.subset(&ramp.distinct_visible())?;
    let family = subsetter.face().family();
    debug!("svg render {}x{} grid, {} color classes", geometry.columns, geometry.rows, classes.len());

    let mut svg = String::new();
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 {} {}\">\n",
        geometry.columns, geometry.rows
    );

    svg.push_str("<style>\n");
    let _ = write!(
        svg,
        "@font-face{{font-family:'{family}';src:url(data:font/ttf;base64,{}) format('truetype');}}\n",
        BASE64.encode(subset.as_slice())
    );
    let fill = global_fill.unwrap_or(Rgba::WHITE);
    let _ = write!(
        svg,
        "text{{font-family:'{family}',monospace;font-size:1px;dominant-baseline:hanging;{}}}\n",
        css_fill(fill)
    );
    for (name, color) in &classes {
        let _ = write!(svg, ".{name}{{{}}}\n", css_fill(*color));
    }
    svg.push_str("</style>\n");

    if let Some(fill) = background_fill(config.background) {
        let _ = write!(svg, "<rect width=\"100%\" height=\"100%\" fill=\"{fill}\"/>\n");
    }

    let columns = geometry.columns as usize;
    for row in 0..geometry.rows as usize {
        let runs = merge_row(&cells[row * columns..(row + 1) * columns]);
        if runs.is_empty() {
            continue;
        }

        let _ = write!(svg, "<text y=\"{row}\">");
        for run in runs {
            match run.class {
                Some(class) => {
                    let _ = write!(svg, "<tspan x=\"{}\" class=\"{class}\">", run.x);
                },
                None => {
                    let _ = write!(svg, "<tspan x=\"{}\">", run.x);
                },
            }
            for _ in 0..run.len {
                push_escaped(&mut svg, run.ch);
            }
            svg.push_str("</tspan>");
        }
        svg.push_str("</text>\n");
    }

    svg.push_str("</svg>\n");
    Ok(svg)
}

/// The single fill color when the assignment carries at most one distinct
/// color, `None` when per-glyph classes are required.
fn global_fill(assignment: &ColorAssignment) -> Option<Rgba> {
    let ColorAssignment::PerRamp(colors) = assignment else {
        return None;
    };

    let mut distinct = colors.iter().flatten();
    let first = distinct.next().copied()?;
    if distinct.all(|&color| color == first) {
        Some(first)
    } else {
        None
    }
}

fn css_fill(color: Rgba) -> String {
    if color.a == 255 {
        format!("fill:rgb({},{},{});", color.r, color.g, color.b)
    } else {
        format!(
            "fill:rgb({},{},{});fill-opacity:{:.3};",
            color.r,
            color.g,
            color.b,
            color.a as f32 / 255.0
        )
    }
}

fn background_fill(background: Background) -> Option<String> {
    match background {
        Background::Black => Some("black".to_string()),
        Background::White => Some("white".to_string()),
        Background::Transparent => None,
        Background::Custom(hsla) => {
            let rgba = hsla.to_rgba();
            Some(format!("rgb({},{},{})", rgba.r, rgba.g, rgba.b))
        },
    }
}

fn push_escaped(out: &mut String, c: char) {
    match c {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        _ => out.push(c),
    }
}

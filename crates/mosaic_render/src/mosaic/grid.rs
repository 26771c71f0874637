//! Grid geometry and per-cell image sampling.

use image::RgbaImage;
use rayon::prelude::*;

use crate::MosaicError;

pub const MIN_COLUMNS: u32 = 10;
pub const MAX_COLUMNS: u32 = 300;

/// Cell grid dimensions derived from the requested column count and the
/// source aspect ratio.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridGeometry {
    pub columns: u32,
    pub rows: u32,
}

impl GridGeometry {
    /// Clamps the requested column count into [10, 300] and derives the row
    /// count as `floor(columns * height / width)`. A zero-sized image or a
    /// grid that collapses to zero rows is an input error: the render is
    /// skipped rather than producing partial output.
    pub fn derive(requested_columns: u32, image_width: u32, image_height: u32) -> Result<Self, MosaicError> {
        if image_width == 0 || image_height == 0 {
            return Err(MosaicError::EmptyImage);
        }

        let columns = requested_columns.clamp(MIN_COLUMNS, MAX_COLUMNS);
        let rows = (columns as u64 * image_height as u64 / image_width as u64) as u32;
        if rows == 0 {
            return Err(MosaicError::DegenerateGrid {
                columns,
                width: image_width,
                height: image_height,
            });
        }

        Ok(Self { columns, rows })
    }

    pub fn cell_count(&self) -> usize {
        self.columns as usize * self.rows as usize
    }
}

/// Pixel bounds [x0, x1) x [y0, y1) of one cell. Integer division leaves
/// ragged cell sizes near the edges; that is expected and tolerated.
fn cell_bounds(geometry: &GridGeometry, width: u32, height: u32, cx: u32, cy: u32) -> (u32, u32, u32, u32) {
    let x0 = (cx as u64 * width as u64 / geometry.columns as u64) as u32;
    let x1 = ((cx as u64 + 1) * width as u64 / geometry.columns as u64) as u32;
    let y0 = (cy as u64 * height as u64 / geometry.rows as u64) as u32;
    let y1 = ((cy as u64 + 1) * height as u64 / geometry.rows as u64) as u32;
    (x0, x1.min(width), y0, y1.min(height))
}

/// Reduces every cell to its mean grayscale luminance, `(R+G+B)/3` averaged
/// over the cell rectangle. Cells are independent, so the reduction runs in
/// parallel. An empty rectangle (possible when the grid outnumbers the
/// pixels) yields 0 instead of dividing by zero.
pub fn luminance_grid(image: &RgbaImage, geometry: &GridGeometry) -> Vec<f32> {
    let (width, height) = image.dimensions();
    (0..geometry.cell_count())
        .into_par_iter()
        .map(|cell| {
            let cx = (cell % geometry.columns as usize) as u32;
            let cy = (cell / geometry.columns as usize) as u32;
            let (x0, x1, y0, y1) = cell_bounds(geometry, width, height, cx, cy);

            let mut total = 0.0f64;
            let mut count = 0u64;
            for y in y0..y1 {
                for x in x0..x1 {
                    let pixel = image.get_pixel(x, y).0;
                    total += (pixel[0] as f64 + pixel[1] as f64 + pixel[2] as f64) / 3.0;
                    count += 1;
                }
            }

            if count == 0 {
                0.0
            } else {
                (total / count as f64) as f32
            }
        })
        .collect()
}

/// Reduces every cell to the unweighted mean of its R, G and B channels:
/// the per-cell dominant color used by the image-derived palette. Not a
/// k-means pass; see `color::kmeans` for the standalone clustering utility.
pub fn dominant_colors(image: &RgbaImage, geometry: &GridGeometry) -> Vec<[u8; 3]> {
    let (width, height) = image.dimensions();
    (0..geometry.cell_count())
        .into_par_iter()
        .map(|cell| {
            let cx = (cell % geometry.columns as usize) as u32;
            let cy = (cell / geometry.columns as usize) as u32;
            let (x0, x1, y0, y1) = cell_bounds(geometry, width, height, cx, cy);

            let mut sums = [0u64; 3];
            let mut count = 0u64;
            for y in y0..y1 {
                for x in x0..x1 {
                    let pixel = image.get_pixel(x, y).0;
                    sums[0] += pixel[0] as u64;
                    sums[1] += pixel[1] as u64;
                    sums[2] += pixel[2] as u64;
                    count += 1;
                }
            }

            if count == 0 {
                [0, 0, 0]
            } else {
                [
                    ((sums[0] as f64 / count as f64).round()) as u8,
                    ((sums[1] as f64 / count as f64).round()) as u8,
                    ((sums[2] as f64 / count as f64).round()) as u8,
                ]
            }
        })
        .collect()
}

//! Payload decoding into raw elevation grids.
//!
//! GSI serves the same elevation model in two encodings:
//!
//! - `dem_png`: each pixel's RGB channels hold a signed 24-bit big-endian
//!   value in centimetres. `(128, 0, 0)` is reserved and marks sea / no data.
//! - `dem`: plain text, one line per row, comma separated metres, with `e`
//!   for cells that have no data.
//!
//! Both decode to a [`RawElevationGrid`] of fixed width so the resampler does
//! not need to care where the samples came from.

use crate::config::MAX_TILE_WIDTH;
use crate::{DemError, Result};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Reserved pixel value marking sea / no data in the PNG encoding.
pub const SEA_SENTINEL: [u8; 3] = [128, 0, 0];

/// Centimetre-to-metre scale of the PNG encoding.
pub const PNG_ELEVATION_RESOLUTION: f64 = 0.01;

/// Literal used for cells without data in the text encoding.
pub const TEXT_MISSING_CELL: &str = "e";

const TWO_POW_23: i32 = 1 << 23;
const TWO_POW_24: i32 = 1 << 24;

/// Encoding of an upstream tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemEncoding {
    /// Colour-encoded PNG raster (`dem_png`).
    Png,
    /// Comma-delimited text grid (`dem`).
    Text,
}

impl DemEncoding {
    /// File extension used by the upstream service.
    pub const fn extension(&self) -> &'static str {
        match self {
            DemEncoding::Png => "png",
            DemEncoding::Text => "txt",
        }
    }
}

impl std::fmt::Display for DemEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// What a raw sample represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleKind {
    /// A measured elevation.
    Measured,
    /// The sea sentinel; elevation reads as 0.
    Sea,
    /// No data for this cell; elevation reads as 0.
    Missing,
}

/// A square grid of raw elevations in metres, row-major, row 0 at the top.
#[derive(Debug, Clone, PartialEq)]
pub struct RawElevationGrid {
    width: usize,
    heights: Vec<f64>,
    kinds: Vec<SampleKind>,
}

impl RawElevationGrid {
    fn with_capacity(width: usize) -> Self {
        Self {
            width,
            heights: Vec::with_capacity(width * width),
            kinds: Vec::with_capacity(width * width),
        }
    }

    /// Build a grid from measured values, e.g. for tests or synthetic tiles.
    ///
    /// Fails with [`DemError::MalformedPayload`] if `heights` is not `width * width` long.
    pub fn from_measured(width: usize, heights: Vec<f64>) -> Result<Self> {
        if width.checked_mul(width) != Some(heights.len()) {
            return Err(DemError::MalformedPayload(format!(
                "expected a {}x{} grid, got {} samples",
                width,
                width,
                heights.len()
            )));
        }
        let kinds = vec![SampleKind::Measured; heights.len()];
        Ok(Self {
            width,
            heights,
            kinds,
        })
    }

    fn push(&mut self, height: f64, kind: SampleKind) {
        self.heights.push(height);
        self.kinds.push(kind);
    }

    /// Width (and height) of the grid in samples.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Elevation at `(row, col)` in metres.
    ///
    /// # Panics
    /// Panics if the position is outside the grid.
    pub fn height(&self, row: usize, col: usize) -> f64 {
        self.heights[row * self.width + col]
    }

    /// Tag of the sample at `(row, col)`.
    ///
    /// # Panics
    /// Panics if the position is outside the grid.
    pub fn kind(&self, row: usize, col: usize) -> SampleKind {
        self.kinds[row * self.width + col]
    }

    /// All elevations, row-major.
    pub fn heights(&self) -> &[f64] {
        &self.heights
    }

    /// Number of samples carrying the given tag.
    pub fn count(&self, kind: SampleKind) -> usize {
        self.kinds.iter().filter(|k| **k == kind).count()
    }
}

/// A borrowed, already-decoded pixel plane.
#[derive(Debug, Clone, Copy)]
pub struct RasterImage<'a> {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Interleaved bytes per pixel: 3 (RGB) or 4 (RGBA).
    pub channels: u8,
    /// Pixel bytes, row-major.
    pub pixels: &'a [u8],
}

impl<'a> RasterImage<'a> {
    /// View an RGBA image from the `image` crate.
    pub fn from_rgba(image: &'a image::RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            channels: 4,
            pixels: image.as_raw(),
        }
    }

    /// View an RGB image from the `image` crate.
    pub fn from_rgb(image: &'a image::RgbImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            channels: 3,
            pixels: image.as_raw(),
        }
    }
}

/// A fetched tile payload in one of the two upstream encodings.
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    /// Colour-encoded raster, already decoded to a pixel plane.
    ColorRaster(RasterImage<'a>),
    /// Comma-delimited text grid.
    DelimitedText(&'a str),
}

impl Payload<'_> {
    /// Encoding of this payload.
    pub fn encoding(&self) -> DemEncoding {
        match self {
            Payload::ColorRaster(_) => DemEncoding::Png,
            Payload::DelimitedText(_) => DemEncoding::Text,
        }
    }

    /// Decode into a `raw_width × raw_width` grid.
    ///
    /// `raw_width` above [`MAX_TILE_WIDTH`] is rejected as
    /// [`DemError::InvalidConfig`].
    pub fn decode(&self, raw_width: usize) -> Result<RawElevationGrid> {
        if raw_width > MAX_TILE_WIDTH {
            return Err(DemError::InvalidConfig(format!(
                "raw width must be at most {}, got {}",
                MAX_TILE_WIDTH, raw_width
            )));
        }
        match self {
            Payload::ColorRaster(raster) => decode_raster(raster, raw_width),
            Payload::DelimitedText(text) => decode_text(text, raw_width),
        }
    }
}

/// Decode PNG file bytes into an RGBA plane.
pub fn decode_png(bytes: &[u8]) -> Result<image::RgbaImage> {
    let image = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)?;
    Ok(image.to_rgba8())
}

/// Decode a single PNG pixel to an elevation in metres.
pub fn decode_pixel(r: u8, g: u8, b: u8) -> (f64, SampleKind) {
    if [r, g, b] == SEA_SENTINEL {
        return (0.0, SampleKind::Sea);
    }
    let mut value = (i32::from(r) << 16) | (i32::from(g) << 8) | i32::from(b);
    if value > TWO_POW_23 {
        value -= TWO_POW_24;
    }
    (f64::from(value) * PNG_ELEVATION_RESOLUTION, SampleKind::Measured)
}

/// Encode an elevation in metres as a PNG pixel (inverse of [`decode_pixel`]).
///
/// Values are rounded to the nearest centimetre and wrapped into 24 bits.
pub fn encode_pixel(elevation: f64) -> [u8; 3] {
    let centimetres = (elevation / PNG_ELEVATION_RESOLUTION).round() as i64;
    let value = centimetres.rem_euclid(i64::from(TWO_POW_24)) as u32;
    [(value >> 16) as u8, (value >> 8) as u8, value as u8]
}

fn decode_raster(raster: &RasterImage<'_>, raw_width: usize) -> Result<RawElevationGrid> {
    if raster.width as usize != raw_width || raster.height as usize != raw_width {
        return Err(DemError::MalformedPayload(format!(
            "raster is {}x{}, expected {}x{}",
            raster.width, raster.height, raw_width, raw_width
        )));
    }
    if raster.channels != 3 && raster.channels != 4 {
        return Err(DemError::MalformedPayload(format!(
            "raster has {} channels, expected 3 or 4",
            raster.channels
        )));
    }
    let channels = usize::from(raster.channels);
    let expected_len = raw_width
        .checked_mul(raw_width)
        .and_then(|samples| samples.checked_mul(channels));
    if expected_len != Some(raster.pixels.len()) {
        return Err(DemError::MalformedPayload(format!(
            "raster holds {} bytes, expected {} channel(s) of {}x{}",
            raster.pixels.len(),
            channels,
            raw_width,
            raw_width
        )));
    }

    let mut grid = RawElevationGrid::with_capacity(raw_width);
    for pixel in raster.pixels.chunks_exact(channels) {
        let (height, kind) = decode_pixel(pixel[0], pixel[1], pixel[2]);
        grid.push(height, kind);
    }

    trace!(
        sea = grid.count(SampleKind::Sea),
        width = raw_width,
        "decoded colour raster"
    );
    Ok(grid)
}

fn decode_text(text: &str, raw_width: usize) -> Result<RawElevationGrid> {
    let mut lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }

    if lines.len() != raw_width {
        return Err(DemError::MalformedPayload(format!(
            "text grid has {} rows, expected {}",
            lines.len(),
            raw_width
        )));
    }

    let mut grid = RawElevationGrid::with_capacity(raw_width);
    for (row, line) in lines.iter().enumerate() {
        let cells: Vec<&str> = line.split(',').collect();
        if cells.len() != raw_width {
            return Err(DemError::MalformedPayload(format!(
                "row {} has {} columns, expected {}",
                row,
                cells.len(),
                raw_width
            )));
        }
        for (col, cell) in cells.iter().enumerate() {
            let (height, kind) = parse_cell(cell, row, col)?;
            grid.push(height, kind);
        }
    }

    trace!(
        missing = grid.count(SampleKind::Missing),
        width = raw_width,
        "decoded text grid"
    );
    Ok(grid)
}

fn parse_cell(cell: &str, row: usize, col: usize) -> Result<(f64, SampleKind)> {
    let cell = cell.trim();
    if cell == TEXT_MISSING_CELL {
        return Ok((0.0, SampleKind::Missing));
    }
    match cell.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok((value, SampleKind::Measured)),
        _ => Err(DemError::MalformedPayload(format!(
            "cell ({}, {}) is not a number: {:?}",
            row, col, cell
        ))),
    }
}

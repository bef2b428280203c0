//! Nearest-neighbour resampling and `i16` quantization.

use crate::address::{pow2, EffectiveAddress};
use crate::config::MAX_TILE_WIDTH;
use crate::decode::RawElevationGrid;
use crate::{DemError, Result};

/// Samples whose scaled value did not fit the `i16` output range.
///
/// Reported alongside the heightmap; the offending samples were clamped to
/// `i16::MIN` / `i16::MAX` (NaN becomes 0), never wrapped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantizationOverflow {
    /// Number of output samples that were clamped.
    pub clamped: usize,
    /// Smallest out-of-range scaled value seen.
    pub min_scaled: f64,
    /// Largest out-of-range scaled value seen.
    pub max_scaled: f64,
}

/// A square grid of quantized heights, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Heightmap {
    width: usize,
    samples: Vec<i16>,
    overflow: Option<QuantizationOverflow>,
}

impl Heightmap {
    /// Width (and height) in samples.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Quantized samples, row-major.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Sample at `(row, col)`.
    ///
    /// # Panics
    /// Panics if the position is outside the grid.
    pub fn get(&self, row: usize, col: usize) -> i16 {
        self.samples[row * self.width + col]
    }

    /// Clamping report, if any sample was out of range.
    pub fn overflow(&self) -> Option<&QuantizationOverflow> {
        self.overflow.as_ref()
    }

    /// Consume the heightmap, returning the sample buffer.
    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }
}

/// Round half up, matching JavaScript's `Math.round` (`-2.5` becomes `-2`).
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Resample `grid` onto an `output_width × output_width` heightmap.
///
/// The output covers the footprint of `address` inside the raw grid: output
/// row `oy` maps to `oy / 2^y_bits / (W_out - 1) + frac_y` of the raw height,
/// and likewise for columns. Each output sample takes the nearest raw sample
/// and is scaled by `height_power` before quantization.
pub fn resample(
    grid: &RawElevationGrid,
    address: &EffectiveAddress,
    output_width: usize,
    height_power: f64,
) -> Result<Heightmap> {
    if !(2..=MAX_TILE_WIDTH).contains(&output_width) {
        return Err(DemError::InvalidConfig(format!(
            "output width must be between 2 and {}, got {}",
            MAX_TILE_WIDTH, output_width
        )));
    }
    if grid.width() == 0 {
        return Err(DemError::MalformedPayload("raw grid is empty".to_string()));
    }

    let last_out = (output_width - 1) as f64;
    let divisor_x = pow2(address.x_bits);
    let divisor_y = pow2(address.y_bits);

    // Column lookups are identical for every row.
    let source_cols: Vec<usize> = (0..output_width)
        .map(|ox| {
            let col_frac = ox as f64 / divisor_x / last_out + address.frac_x;
            source_index(col_frac, grid.width())
        })
        .collect();

    let mut quantizer = Quantizer::default();
    let mut samples = Vec::with_capacity(output_width * output_width);
    for oy in 0..output_width {
        let row_frac = oy as f64 / divisor_y / last_out + address.frac_y;
        let src_row = source_index(row_frac, grid.width());
        for &src_col in &source_cols {
            let scaled = grid.height(src_row, src_col) * height_power;
            samples.push(quantizer.quantize(scaled));
        }
    }

    Ok(Heightmap {
        width: output_width,
        samples,
        overflow: quantizer.finish(),
    })
}

fn source_index(frac: f64, raw_width: usize) -> usize {
    let last = raw_width - 1;
    let index = round_half_up(frac * last as f64);
    if index.is_nan() || index <= 0.0 {
        0
    } else if index >= last as f64 {
        last
    } else {
        index as usize
    }
}

#[derive(Default)]
struct Quantizer {
    overflow: Option<QuantizationOverflow>,
}

impl Quantizer {
    fn quantize(&mut self, scaled: f64) -> i16 {
        let rounded = round_half_up(scaled);
        if rounded.is_nan() {
            self.record(scaled);
            0
        } else if rounded > f64::from(i16::MAX) {
            self.record(scaled);
            i16::MAX
        } else if rounded < f64::from(i16::MIN) {
            self.record(scaled);
            i16::MIN
        } else {
            rounded as i16
        }
    }

    fn record(&mut self, scaled: f64) {
        let report = self.overflow.get_or_insert(QuantizationOverflow {
            clamped: 0,
            min_scaled: f64::INFINITY,
            max_scaled: f64::NEG_INFINITY,
        });
        report.clamped += 1;
        if !scaled.is_nan() {
            report.min_scaled = report.min_scaled.min(scaled);
            report.max_scaled = report.max_scaled.max(scaled);
        }
    }

    fn finish(self) -> Option<QuantizationOverflow> {
        self.overflow
    }
}

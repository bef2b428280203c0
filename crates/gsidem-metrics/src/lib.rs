//! Metrics infrastructure for the GSI terrain tile pipeline.
//!
//! Every metric the tile pipeline records is declared here as a [`Metric`]
//! constant, so names, units and label keys live in one place. The `metrics`
//! crate is re-exported so callers record through the same version.
//!
//! No recorder is installed here. Without one the `metrics` macros are no-ops,
//! so library code can record unconditionally.
//!
//! # Example
//!
//! ```rust,ignore
//! use gsidem_metrics::{metric_defs, describe_metrics, TileLabels};
//!
//! describe_metrics();
//!
//! let labels = TileLabels::new("png", 15);
//! metrics::counter!(metric_defs::TILE_DECODED.name, &labels.to_labels()).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// Which `metrics` macro family a [`Metric`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    /// Lowercase name, as used in exporter output.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name plus metadata of one metric, built in a `const` context.
///
/// ```rust
/// use gsidem_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const TILES: Metric = Metric::counter("gsidem.example.tiles")
///     .with_description("Tiles seen")
///     .with_unit(Unit::Count)
///     .with_labels(&["encoding"]);
///
/// assert_eq!(TILES.kind, MetricKind::Counter);
/// assert_eq!(TILES.labels, &["encoding"]);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// Dotted metric name, `gsidem.<area>.<what>`.
    pub name: &'static str,
    pub kind: MetricKind,
    /// Shown by exporters that support descriptions; empty if unset.
    pub description: &'static str,
    pub unit: Option<Unit>,
    /// Label keys every recording is expected to carry.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn new(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    pub const fn counter(name: &'static str) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    pub const fn gauge(name: &'static str) -> Self {
        Self::new(name, MetricKind::Gauge)
    }

    pub const fn histogram(name: &'static str) -> Self {
        Self::new(name, MetricKind::Histogram)
    }

    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Hand the description and unit to the installed recorder.
    pub fn describe(&self) {
        let (name, text) = (self.name, self.description);
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => describe_counter!(name, unit, text),
            (MetricKind::Counter, None) => describe_counter!(name, text),
            (MetricKind::Gauge, Some(unit)) => describe_gauge!(name, unit, text),
            (MetricKind::Gauge, None) => describe_gauge!(name, text),
            (MetricKind::Histogram, Some(unit)) => describe_histogram!(name, unit, text),
            (MetricKind::Histogram, None) => describe_histogram!(name, text),
        }
    }
}

/// All metric definitions for the tile pipeline.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Labels present on every tile-scoped metric.
    pub const TILE_LABELS: &[&str] = &["encoding", "level"];

    // Tile lifecycle

    /// Tile geometry requests received by a provider.
    pub const TILE_REQUESTS: Metric = Metric::counter("gsidem.tile.requests")
        .with_description("Tile geometry requests received")
        .with_unit(Unit::Count)
        .with_labels(TILE_LABELS);

    /// Tiles decoded into a heightmap.
    pub const TILE_DECODED: Metric = Metric::counter("gsidem.tile.decoded")
        .with_description("Tiles decoded into a heightmap")
        .with_unit(Unit::Count)
        .with_labels(TILE_LABELS);

    /// Tiles rejected because the payload could not be decoded.
    pub const TILE_FAILED: Metric = Metric::counter("gsidem.tile.failed")
        .with_description("Tiles rejected due to a malformed payload")
        .with_unit(Unit::Count)
        .with_labels(TILE_LABELS);

    /// Requests abandoned by the caller before decoding.
    pub const TILE_CANCELLED: Metric = Metric::counter("gsidem.tile.cancelled")
        .with_description("Tile requests abandoned before decoding")
        .with_unit(Unit::Count)
        .with_labels(TILE_LABELS);

    /// Time spent decoding and resampling one tile.
    pub const TILE_DECODE_TIME: Metric = Metric::histogram("gsidem.tile.decode_time_us")
        .with_description("Time to decode and resample one tile in microseconds")
        .with_unit(Unit::Microseconds)
        .with_labels(TILE_LABELS);

    // Sample quality

    /// Output samples clamped to the `i16` range during quantization.
    pub const QUANTIZE_CLAMPED: Metric = Metric::counter("gsidem.quantize.clamped_samples")
        .with_description("Samples clamped to the i16 range during quantization")
        .with_unit(Unit::Count)
        .with_labels(TILE_LABELS);

    /// Raw samples tagged as missing ("e" cells) per decoded tile.
    pub const RAW_MISSING_SAMPLES: Metric = Metric::histogram("gsidem.raw.missing_samples")
        .with_description("Raw samples without data per decoded tile")
        .with_unit(Unit::Count)
        .with_labels(TILE_LABELS);

    /// Raw samples carrying the sea sentinel per decoded tile.
    pub const RAW_SEA_SAMPLES: Metric = Metric::histogram("gsidem.raw.sea_samples")
        .with_description("Raw samples carrying the sea sentinel per decoded tile")
        .with_unit(Unit::Count)
        .with_labels(TILE_LABELS);

    // Batch rendering

    /// Tiles currently being rendered by a batch job.
    pub const BATCH_IN_FLIGHT: Metric = Metric::gauge("gsidem.batch.in_flight")
        .with_description("Tiles currently being rendered by a batch job")
        .with_unit(Unit::Count);

    /// All metrics, used by [`describe_metrics`](super::describe_metrics).
    pub const ALL: &[&Metric] = &[
        &TILE_REQUESTS,
        &TILE_DECODED,
        &TILE_FAILED,
        &TILE_CANCELLED,
        &TILE_DECODE_TIME,
        &QUANTIZE_CLAMPED,
        &RAW_MISSING_SAMPLES,
        &RAW_SEA_SAMPLES,
        &BATCH_IN_FLIGHT,
    ];
}

/// Labels identifying which kind of tile a metric sample belongs to.
///
/// # Example
///
/// ```rust
/// use gsidem_metrics::TileLabels;
///
/// let labels = TileLabels::new("txt", 14);
/// assert_eq!(
///     labels.to_labels(),
///     vec![("encoding", "txt".to_string()), ("level", "14".to_string())]
/// );
/// ```
#[derive(Debug, Clone)]
pub struct TileLabels {
    /// Payload encoding ("png" or "txt").
    pub encoding: &'static str,
    /// Effective (upstream) level of the tile.
    pub level: u32,
}

impl TileLabels {
    pub fn new(encoding: &'static str, level: u32) -> Self {
        Self { encoding, level }
    }

    /// Key/value pairs accepted by the `metrics` macros.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![
            ("encoding", self.encoding.to_string()),
            ("level", self.level.to_string()),
        ]
    }
}

/// Describes all metrics used by the pipeline.
///
/// Call once at startup, after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_labels_follow_declared_keys() {
        let labels = TileLabels::new("png", 15).to_labels();
        let keys: Vec<&str> = labels.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, metric_defs::TILE_LABELS);
    }

    #[test]
    fn test_metric_definitions() {
        assert_eq!(metric_defs::TILE_DECODED.name, "gsidem.tile.decoded");
        assert_eq!(metric_defs::TILE_DECODED.kind, MetricKind::Counter);
        assert_eq!(metric_defs::TILE_DECODE_TIME.unit, Some(Unit::Microseconds));
        assert_eq!(metric_defs::TILE_DECODE_TIME.kind, MetricKind::Histogram);
        assert_eq!(metric_defs::BATCH_IN_FLIGHT.kind, MetricKind::Gauge);
        assert_eq!(metric_defs::QUANTIZE_CLAMPED.labels, &["encoding", "level"]);
    }

    #[test]
    fn test_all_metrics_unique() {
        let mut names: Vec<&str> = metric_defs::ALL.iter().map(|m| m.name).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total, "metric names must be unique");
        assert_eq!(total, 9);
    }

    #[test]
    fn test_bare_gauge_has_no_metadata() {
        const BARE: Metric = Metric::gauge("bare");

        assert_eq!(BARE.kind, MetricKind::Gauge);
        assert!(BARE.description.is_empty());
        assert!(BARE.unit.is_none());
        assert!(BARE.labels.is_empty());
    }

    #[test]
    fn test_tile_metrics_carry_tile_labels() {
        for metric in metric_defs::ALL {
            if metric.name.starts_with("gsidem.batch.") {
                assert!(metric.labels.is_empty(), "{}", metric.name);
            } else {
                assert_eq!(metric.labels, metric_defs::TILE_LABELS, "{}", metric.name);
            }
        }
    }

    #[test]
    fn test_describe_without_recorder() {
        // No recorder installed: describing must be a harmless no-op.
        describe_metrics();
        assert_eq!(MetricKind::Histogram.to_string(), "histogram");
    }
}

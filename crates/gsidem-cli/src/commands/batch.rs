//! `gsidem batch`: render a rectangle of renderer tiles from a local mirror.
//!
//! The mirror is laid out the way the upstream server is,
//! `{root}/{level}/{x}/{y}.{png|txt}`, and output goes to
//! `{out}/{level}/{x}/{y}.json` keyed by the renderer tile. Tiles are rendered
//! on the rayon pool; once the cancel flag is raised, tiles that have not
//! started yet are reported as cancelled rather than failed.

use super::{read_file, write_tile_json};
use crate::error::CliError;
use gsidem::{FetchOutcome, GsiTerrainProvider, TileCoord};
use gsidem_metrics::{metric_defs, metrics};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Largest number of tiles a single batch may cover.
pub const MAX_BATCH_TILES: u64 = 1 << 20;

#[derive(clap::Args, Clone, Debug)]
pub struct BatchArgs {
    #[clap(long, help = "Root of the local tile mirror")]
    pub root: PathBuf,
    #[clap(long, help = "Renderer zoom level")]
    pub level: u32,
    #[clap(long, help = "First renderer column (inclusive)")]
    pub x_min: u32,
    #[clap(long, help = "Last renderer column (inclusive)")]
    pub x_max: u32,
    #[clap(long, help = "First renderer row (inclusive)")]
    pub y_min: u32,
    #[clap(long, help = "Last renderer row (inclusive)")]
    pub y_max: u32,
    #[clap(long, help = "Directory for the heightmap JSON files")]
    pub out: PathBuf,
}

impl BatchArgs {
    fn coords(&self) -> Result<Vec<TileCoord>, CliError> {
        if self.x_min > self.x_max || self.y_min > self.y_max {
            return Err(CliError::Config(format!(
                "empty tile range x {}..={} y {}..={}",
                self.x_min, self.x_max, self.y_min, self.y_max
            )));
        }
        let columns = u64::from(self.x_max - self.x_min) + 1;
        let rows = u64::from(self.y_max - self.y_min) + 1;
        let tiles = columns.saturating_mul(rows);
        if tiles > MAX_BATCH_TILES {
            return Err(CliError::Config(format!(
                "tile range covers {} tiles, at most {} allowed per batch",
                tiles, MAX_BATCH_TILES
            )));
        }
        Ok((self.y_min..=self.y_max)
            .flat_map(|y| {
                (self.x_min..=self.x_max).map(move |x| TileCoord::new(x, y, self.level))
            })
            .collect())
    }
}

/// What happened to one tile of a batch.
#[derive(Debug)]
pub enum TileOutcome {
    Written(PathBuf),
    Cancelled,
    Failed { coord: TileCoord, error: CliError },
}

/// Per-batch tallies.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub written: usize,
    pub cancelled: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.written + self.cancelled + self.failed
    }
}

/// Output path for a renderer tile.
pub fn output_path(out: &Path, coord: TileCoord) -> PathBuf {
    out.join(coord.level.to_string())
        .join(coord.x.to_string())
        .join(format!("{}.json", coord.y))
}

/// Render every tile in the range, stopping early once `cancel` is set.
pub fn run_batch(
    provider: &GsiTerrainProvider,
    args: &BatchArgs,
    cancel: &AtomicBool,
) -> Result<BatchSummary, CliError> {
    let coords = args.coords()?;
    let total = coords.len();
    info!(
        total,
        level = args.level,
        threads = rayon::current_num_threads(),
        "rendering batch"
    );

    let done = AtomicUsize::new(0);
    let report_interval = std::cmp::max(100, total / 20);
    let started = Instant::now();

    let outcomes: Vec<TileOutcome> = coords
        .par_iter()
        .map(|&coord| {
            let outcome = render_one(provider, args, coord, cancel);
            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            if finished % report_interval == 0 {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                info!(finished, total, elapsed_ms, "batch progress");
            }
            outcome
        })
        .collect();

    let mut summary = BatchSummary::default();
    for outcome in outcomes {
        match outcome {
            TileOutcome::Written(path) => {
                debug!(path = %path.display(), "wrote heightmap");
                summary.written += 1;
            }
            TileOutcome::Cancelled => summary.cancelled += 1,
            TileOutcome::Failed { coord, error } => {
                warn!(tile = %coord, "{}", error);
                summary.failed += 1;
            }
        }
    }

    info!(
        written = summary.written,
        cancelled = summary.cancelled,
        failed = summary.failed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "batch finished"
    );
    Ok(summary)
}

fn render_one(
    provider: &GsiTerrainProvider,
    args: &BatchArgs,
    coord: TileCoord,
    cancel: &AtomicBool,
) -> TileOutcome {
    let request = provider.tile_request(coord);

    if cancel.load(Ordering::SeqCst) {
        let cancelled =
            provider.request_tile_geometry_from_bytes(&request, FetchOutcome::Cancelled);
        return match cancelled {
            Ok(_) => TileOutcome::Cancelled,
            Err(e) => TileOutcome::Failed {
                coord,
                error: e.into(),
            },
        };
    }

    let in_flight = metrics::gauge!(metric_defs::BATCH_IN_FLIGHT.name);
    in_flight.increment(1.0);
    let result = read_file(&request.mirror_path(&args.root)).and_then(|bytes| {
        let tile = provider
            .request_tile_geometry_from_bytes(&request, FetchOutcome::Ready(bytes.as_slice()))?;
        match tile {
            Some(tile) => {
                let path = output_path(&args.out, coord);
                write_tile_json(&path, &tile)?;
                Ok(TileOutcome::Written(path))
            }
            None => Ok(TileOutcome::Cancelled),
        }
    });
    in_flight.decrement(1.0);

    result.unwrap_or_else(|error| TileOutcome::Failed { coord, error })
}

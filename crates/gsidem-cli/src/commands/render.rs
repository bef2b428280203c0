//! `gsidem render`: turn one local payload into heightmap JSON.

use super::{read_file, write_tile_json};
use crate::error::CliError;
use gsidem::{FetchOutcome, GsiTerrainProvider, HeightmapTerrainData, TileCoord};
use std::path::PathBuf;
use tracing::info;

#[derive(clap::Args, Clone, Debug)]
pub struct RenderArgs {
    #[clap(help = "Renderer tile column")]
    pub x: u32,
    #[clap(help = "Renderer tile row")]
    pub y: u32,
    #[clap(help = "Renderer zoom level")]
    pub level: u32,
    #[clap(long, help = "Upstream tile payload (.png or .txt, matching --png)")]
    pub payload: PathBuf,
    #[clap(long, short, help = "Write JSON here instead of stdout")]
    pub output: Option<PathBuf>,
}

pub fn render_tile(
    provider: &GsiTerrainProvider,
    args: &RenderArgs,
) -> Result<HeightmapTerrainData, CliError> {
    let request = provider.tile_request(TileCoord::new(args.x, args.y, args.level));
    let bytes = read_file(&args.payload)?;
    provider
        .request_tile_geometry_from_bytes(&request, FetchOutcome::Ready(bytes.as_slice()))?
        .ok_or_else(|| CliError::Cancelled(request.coord.to_string()))
}

pub fn run(provider: &GsiTerrainProvider, args: &RenderArgs) -> Result<(), CliError> {
    let tile = render_tile(provider, args)?;
    if let Some((min, max)) = tile.min_max_height() {
        info!(min, max, "rendered {}x{} heightmap", tile.width, tile.height);
    }

    match &args.output {
        Some(path) => write_tile_json(path, &tile),
        None => {
            println!("{}", serde_json::to_string_pretty(&tile)?);
            Ok(())
        }
    }
}

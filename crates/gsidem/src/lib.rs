//! # gsidem
//!
//! Quantized terrain heightmaps from the elevation tiles published by the
//! Geospatial Information Authority of Japan (GSI, 国土地理院).
//!
//! ## Overview
//!
//! A 3D terrain renderer asks for tiles by `(x, y, level)` on a Web Mercator
//! quadtree with two root tiles. For each request this crate:
//!
//! 1. resolves the GSI tile that holds the data (GSI stops at level 15, so
//!    deeper requests crop a sub-tile out of a level 15 tile),
//! 2. decodes the tile payload, either the colour-encoded `dem_png` raster or
//!    the comma-delimited `dem` text grid,
//! 3. resamples the 256×256 raw grid down to a 32×32 heightmap with
//!    nearest-neighbour sampling and clamps it into `i16`,
//! 4. wraps the result with the metadata the renderer needs.
//!
//! Fetching is left to the caller: the crate builds URLs and consumes bytes,
//! but performs no I/O of its own.
//!
//! ## Example
//!
//! ```no_run
//! use gsidem::{FetchOutcome, GsiTerrainProvider, ProviderConfig, TileCoord};
//!
//! let provider = GsiTerrainProvider::new(ProviderConfig {
//!     use_png_data: true,
//!     ..Default::default()
//! })?;
//!
//! // Mt. Fuji area, one level deeper than GSI publishes
//! let request = provider.tile_request(TileCoord::new(116_420, 25_800, 16));
//! println!("fetch {}", request.url);
//!
//! let bytes = std::fs::read("15/29105/12900.png")?;
//! let fetched = FetchOutcome::Ready(bytes.as_slice());
//! if let Some(tile) = provider.request_tile_geometry_from_bytes(&request, fetched)? {
//!     println!("{:?}", tile.min_max_height());
//! }
//! # Ok::<(), gsidem::DemError>(())
//! ```

mod address;
mod config;
mod decode;
mod error;
mod provider;
mod resample;
mod tile;

pub use address::{EffectiveAddress, TileCoord, TilingScheme};
pub use config::{
    ProviderConfig, DEFAULT_CREDIT, DEFAULT_OUTPUT_WIDTH, DEFAULT_RAW_WIDTH, GSI_MAX_TERRAIN_LEVEL,
    MAX_TILE_WIDTH, PNG_BASE_URL, TEXT_BASE_URL,
};
pub use decode::{
    decode_pixel, decode_png, encode_pixel, DemEncoding, Payload, RasterImage, RawElevationGrid,
    SampleKind, SEA_SENTINEL,
};
pub use error::DemError;
pub use provider::{DefaultProxy, FetchOutcome, GsiTerrainProvider, Proxy, TileRequest};
pub use resample::{resample, round_half_up, Heightmap, QuantizationOverflow};
pub use tile::{HeightmapTerrainData, TerrainDataStructure};

/// Result type for DEM operations.
pub type Result<T> = std::result::Result<T, DemError>;

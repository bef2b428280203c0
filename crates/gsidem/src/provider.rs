//! GSI terrain provider.
//!
//! The provider ties the pipeline together for one configuration:
//!
//! 1. [`GsiTerrainProvider::tile_request`] resolves a renderer tile to the
//!    upstream tile and builds its URL.
//! 2. The caller fetches the bytes (or gives up).
//! 3. [`GsiTerrainProvider::request_tile_geometry`] decodes, resamples and
//!    assembles the heightmap.
//!
//! The provider holds no per-tile state and is `Send + Sync`, so one instance
//! can serve any number of worker threads.

use crate::address::{EffectiveAddress, TileCoord, TilingScheme};
use crate::config::ProviderConfig;
use crate::decode::{decode_png, DemEncoding, Payload, RasterImage, SampleKind};
use crate::resample::resample;
use crate::tile::HeightmapTerrainData;
use crate::{DemError, Result};
use gsidem_metrics::{metric_defs, metrics, TileLabels};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

/// Level served from the 5 m mesh dataset, whose directory carries a `5a` suffix.
const FIVE_METRE_MESH_LEVEL: u32 = 15;

/// WGS84 semi-major axis in metres.
const WGS84_MAXIMUM_RADIUS: f64 = 6_378_137.0;

/// Heightmap quality factor used to estimate the level-zero geometric error.
const HEIGHTMAP_TERRAIN_QUALITY: f64 = 0.25;

/// Rewrites tile URLs before they are fetched.
pub trait Proxy: Send + Sync + std::fmt::Debug {
    /// Return the URL to fetch for `resource`.
    fn get_url(&self, resource: &str) -> String;
}

/// Proxy that appends the URI-encoded resource as the query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultProxy {
    proxy: String,
}

impl DefaultProxy {
    /// Create a proxy for the given endpoint.
    pub fn new(proxy: impl Into<String>) -> Self {
        Self {
            proxy: proxy.into(),
        }
    }
}

impl Proxy for DefaultProxy {
    fn get_url(&self, resource: &str) -> String {
        format!("{}?{}", self.proxy, encode_uri_component(resource))
    }
}

/// Percent-encode everything outside `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
fn encode_uri_component(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => encoded.push(byte as char),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

/// Result of the fetch collaborator for one tile.
#[derive(Debug, Clone, Copy)]
pub enum FetchOutcome<T> {
    /// The payload arrived.
    Ready(T),
    /// The caller abandoned the request; nothing should be decoded.
    Cancelled,
}

/// Everything needed to fetch and later decode one renderer tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TileRequest {
    /// The tile the renderer asked for.
    pub coord: TileCoord,
    /// The upstream tile holding its data.
    pub address: EffectiveAddress,
    /// Upstream URL, after any proxy rewrite.
    pub url: String,
    /// Expected payload encoding.
    pub encoding: DemEncoding,
}

impl TileRequest {
    /// Path of the upstream tile inside a local mirror:
    /// `{root}/{level}/{x}/{y}.{png|txt}`.
    pub fn mirror_path(&self, root: &Path) -> PathBuf {
        root.join(self.address.level.to_string())
            .join(self.address.x.to_string())
            .join(format!("{}.{}", self.address.y, self.encoding.extension()))
    }
}

/// Terrain provider producing quantized heightmaps from GSI elevation tiles.
///
/// # Example
///
/// ```
/// use gsidem::{FetchOutcome, GsiTerrainProvider, Payload, ProviderConfig, TileCoord};
///
/// let config = ProviderConfig {
///     raw_width: 3,
///     output_width: 3,
///     ..Default::default()
/// };
/// let provider = GsiTerrainProvider::new(config)?;
/// let request = provider.tile_request(TileCoord::new(0, 0, 3));
/// assert_eq!(request.url, "https://cyberjapandata.gsi.go.jp/xyz/dem/3/0/0.txt");
///
/// let payload = Payload::DelimitedText("1,2,e\n4,5,6\n7,8,9");
/// let tile = provider
///     .request_tile_geometry(&request, FetchOutcome::Ready(payload))?
///     .expect("not cancelled");
/// assert_eq!(tile.width, 3);
/// # Ok::<(), gsidem::DemError>(())
/// ```
#[derive(Debug)]
pub struct GsiTerrainProvider {
    config: ProviderConfig,
    tiling_scheme: TilingScheme,
    proxy: Option<Box<dyn Proxy>>,
    level_zero_maximum_geometric_error: f64,
}

impl GsiTerrainProvider {
    /// Create a provider, validating the configuration.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        config.validate()?;
        let proxy = config
            .proxy
            .as_ref()
            .map(|p| Box::new(DefaultProxy::new(p.clone())) as Box<dyn Proxy>);
        let tiling_scheme = TilingScheme::GSI;
        let level_zero_maximum_geometric_error =
            level_zero_geometric_error(config.output_width, tiling_scheme);

        Ok(Self {
            config,
            tiling_scheme,
            proxy,
            level_zero_maximum_geometric_error,
        })
    }

    /// Replace the renderer root shape (defaults to [`TilingScheme::GSI`]).
    pub fn with_tiling_scheme(mut self, tiling_scheme: TilingScheme) -> Self {
        self.tiling_scheme = tiling_scheme;
        self.level_zero_maximum_geometric_error =
            level_zero_geometric_error(self.config.output_width, tiling_scheme);
        self
    }

    /// Replace the proxy configured in [`ProviderConfig::proxy`].
    pub fn with_proxy(mut self, proxy: Box<dyn Proxy>) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// The renderer root shape in use.
    pub fn tiling_scheme(&self) -> TilingScheme {
        self.tiling_scheme
    }

    /// Attribution to display with the terrain.
    pub fn credit(&self) -> &str {
        self.config.credit()
    }

    /// Always ready; there is no metadata to load.
    pub fn ready(&self) -> bool {
        true
    }

    /// GSI tiles carry no water mask.
    pub fn has_water_mask(&self) -> bool {
        false
    }

    /// Data is reported as available for every tile; coverage gaps decode as 0.
    pub fn tile_data_available(&self, _coord: TileCoord) -> bool {
        true
    }

    /// Maximum geometric error in metres for tiles at `level`.
    pub fn level_maximum_geometric_error(&self, level: u32) -> f64 {
        self.level_zero_maximum_geometric_error / crate::address::pow2(level)
    }

    /// Resolve a renderer tile against the configured maximum level.
    pub fn resolve(&self, coord: TileCoord) -> EffectiveAddress {
        EffectiveAddress::resolve(coord, self.config.max_supported_level, self.tiling_scheme)
    }

    /// Upstream URL for a resolved address, before any proxy rewrite.
    pub fn tile_url(&self, address: &EffectiveAddress) -> String {
        let suffix = if address.level == FIVE_METRE_MESH_LEVEL {
            "5a"
        } else {
            ""
        };
        format!(
            "{}{}/{}/{}/{}.{}",
            self.config.base_url(),
            suffix,
            address.level,
            address.x,
            address.y,
            self.config.encoding().extension()
        )
    }

    /// Resolve a renderer tile and build the URL to fetch.
    pub fn tile_request(&self, coord: TileCoord) -> TileRequest {
        let address = self.resolve(coord);
        let url = self.tile_url(&address);
        let url = match &self.proxy {
            Some(proxy) => proxy.get_url(&url),
            None => url,
        };
        debug!(
            tile = %coord,
            level = address.level,
            x = address.x,
            y = address.y,
            frac_x = address.frac_x,
            frac_y = address.frac_y,
            "resolved tile"
        );
        TileRequest {
            coord,
            address,
            url,
            encoding: self.config.encoding(),
        }
    }

    /// Build the heightmap for a request from a fetched payload.
    ///
    /// Returns `Ok(None)` when the fetch was cancelled. A payload that does not
    /// decode fails the whole tile; no partial heightmap is ever returned.
    pub fn request_tile_geometry(
        &self,
        request: &TileRequest,
        fetched: FetchOutcome<Payload<'_>>,
    ) -> Result<Option<HeightmapTerrainData>> {
        self.metered(request, fetched, |payload| self.build_tile(request, payload))
    }

    /// Like [`request_tile_geometry`](Self::request_tile_geometry), starting from
    /// the raw response body (PNG file bytes or UTF-8 text).
    pub fn request_tile_geometry_from_bytes(
        &self,
        request: &TileRequest,
        fetched: FetchOutcome<&[u8]>,
    ) -> Result<Option<HeightmapTerrainData>> {
        self.metered(request, fetched, |bytes| self.build_tile_from_bytes(request, bytes))
    }

    /// Count, time and log one tile request around `build`.
    fn metered<T>(
        &self,
        request: &TileRequest,
        fetched: FetchOutcome<T>,
        build: impl FnOnce(T) -> Result<(HeightmapTerrainData, TileStats)>,
    ) -> Result<Option<HeightmapTerrainData>> {
        let labels =
            TileLabels::new(request.encoding.extension(), request.address.level).to_labels();
        metrics::counter!(metric_defs::TILE_REQUESTS.name, &labels).increment(1);

        let fetched = match fetched {
            FetchOutcome::Ready(fetched) => fetched,
            FetchOutcome::Cancelled => {
                debug!(tile = %request.coord, "request cancelled before decode");
                metrics::counter!(metric_defs::TILE_CANCELLED.name, &labels).increment(1);
                return Ok(None);
            }
        };

        let started = Instant::now();
        let result = build(fetched);
        match &result {
            Ok((_, stats)) => {
                metrics::counter!(metric_defs::TILE_DECODED.name, &labels).increment(1);
                metrics::histogram!(metric_defs::TILE_DECODE_TIME.name, &labels)
                    .record(started.elapsed().as_micros() as f64);
                metrics::histogram!(metric_defs::RAW_MISSING_SAMPLES.name, &labels)
                    .record(stats.missing as f64);
                metrics::histogram!(metric_defs::RAW_SEA_SAMPLES.name, &labels)
                    .record(stats.sea as f64);
                if stats.clamped > 0 {
                    metrics::counter!(metric_defs::QUANTIZE_CLAMPED.name, &labels)
                        .increment(stats.clamped as u64);
                }
            }
            Err(e) => {
                warn!(tile = %request.coord, url = %request.url, "rejected tile: {}", e);
                metrics::counter!(metric_defs::TILE_FAILED.name, &labels).increment(1);
            }
        }
        result.map(|(tile, _)| Some(tile))
    }

    fn build_tile_from_bytes(
        &self,
        request: &TileRequest,
        bytes: &[u8],
    ) -> Result<(HeightmapTerrainData, TileStats)> {
        match request.encoding {
            DemEncoding::Png => {
                let image = decode_png(bytes)?;
                self.build_tile(request, Payload::ColorRaster(RasterImage::from_rgba(&image)))
            }
            DemEncoding::Text => {
                let text = std::str::from_utf8(bytes).map_err(|e| {
                    DemError::MalformedPayload(format!("text payload is not UTF-8: {}", e))
                })?;
                self.build_tile(request, Payload::DelimitedText(text))
            }
        }
    }

    fn build_tile(
        &self,
        request: &TileRequest,
        payload: Payload<'_>,
    ) -> Result<(HeightmapTerrainData, TileStats)> {
        if payload.encoding() != request.encoding {
            return Err(DemError::EncodingMismatch {
                expected: request.encoding.extension(),
                actual: payload.encoding().extension(),
            });
        }

        let grid = payload.decode(self.config.raw_width)?;
        let mut stats = TileStats {
            missing: grid.count(SampleKind::Missing),
            sea: grid.count(SampleKind::Sea),
            clamped: 0,
        };

        let heightmap = resample(
            &grid,
            &request.address,
            self.config.output_width,
            self.config.height_power,
        )?;

        if let Some(overflow) = heightmap.overflow() {
            warn!(
                tile = %request.coord,
                clamped = overflow.clamped,
                min = overflow.min_scaled,
                max = overflow.max_scaled,
                "heights outside the i16 range were clamped"
            );
            stats.clamped = overflow.clamped;
        }

        debug!(tile = %request.coord, missing = stats.missing, sea = stats.sea, "built heightmap");
        let tile = HeightmapTerrainData::assemble(heightmap, self.config.max_supported_level);
        Ok((tile, stats))
    }
}

/// Per-tile sample counts reported to metrics.
struct TileStats {
    missing: usize,
    sea: usize,
    clamped: usize,
}

fn level_zero_geometric_error(output_width: usize, tiling_scheme: TilingScheme) -> f64 {
    WGS84_MAXIMUM_RADIUS * 2.0 * std::f64::consts::PI * HEIGHTMAP_TERRAIN_QUALITY
        / (output_width as f64 * f64::from(tiling_scheme.level_zero_tiles_x))
}

//! End-to-end tests for the tile pipeline using synthetic GSI payloads.

use gsidem::{
    encode_pixel, resample, DemError, EffectiveAddress, FetchOutcome, GsiTerrainProvider,
    HeightmapTerrainData, Payload, ProviderConfig, RawElevationGrid, SampleKind, TileCoord,
    TilingScheme, SEA_SENTINEL,
};
use std::io::Cursor;

/// Encode a `width × width` elevation function as `dem_png` bytes.
fn png_tile(width: u32, elevation: impl Fn(u32, u32) -> Option<f64>) -> Vec<u8> {
    let image = image::RgbImage::from_fn(width, width, |x, y| match elevation(x, y) {
        Some(e) => image::Rgb(encode_pixel(e)),
        None => image::Rgb(SEA_SENTINEL),
    });
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("PNG encoding failed");
    bytes
}

/// A `width × width` text tile whose value is `row * 100 + col`.
fn text_tile(width: usize) -> String {
    let mut text = String::new();
    for row in 0..width {
        let line: Vec<String> = (0..width)
            .map(|col| format!("{}", row * 100 + col))
            .collect();
        text.push_str(&line.join(","));
        text.push('\n');
    }
    text
}

fn png_provider() -> GsiTerrainProvider {
    GsiTerrainProvider::new(ProviderConfig {
        use_png_data: true,
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn test_corner_sampling_scenario() {
    let mut heights = vec![0.0; 256 * 256];
    heights[0] = 10.0;
    heights[255] = 20.0;
    heights[255 * 256] = 30.0;
    heights[255 * 256 + 255] = 40.0;
    let grid = RawElevationGrid::from_measured(256, heights).unwrap();
    let address = EffectiveAddress::resolve(TileCoord::new(9, 4, 12), 15, TilingScheme::SQUARE);

    let map = resample(&grid, &address, 2, 1.0).unwrap();
    assert_eq!(map.samples(), &[10, 20, 30, 40]);
}

#[test]
fn test_small_text_scenario() {
    let provider = GsiTerrainProvider::new(ProviderConfig {
        raw_width: 3,
        output_width: 3,
        ..Default::default()
    })
    .unwrap()
    .with_tiling_scheme(TilingScheme::SQUARE);

    let payload = Payload::DelimitedText("1,2,e\n4,5,6\n7,8,9");
    let grid = payload.decode(3).unwrap();
    assert_eq!(grid.heights(), &[1.0, 2.0, 0.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
    assert_eq!(grid.kind(0, 2), SampleKind::Missing);

    let request = provider.tile_request(TileCoord::new(1, 1, 1));
    let tile = provider
        .request_tile_geometry(&request, FetchOutcome::Ready(payload))
        .unwrap()
        .unwrap();
    assert_eq!(tile.buffer, vec![1, 2, 0, 4, 5, 6, 7, 8, 9]);
}

#[test]
fn test_png_bytes_end_to_end() {
    let provider = png_provider();
    // Elevation depends only on the column: 0.5 m per column, starting below sea level.
    let bytes = png_tile(256, |x, _| Some(x as f64 * 0.5 - 20.0));

    // Even x at level 10: left half of the GSI tile.
    let request = provider.tile_request(TileCoord::new(908, 402, 10));
    assert_eq!(request.address.x, 454);
    assert!(request.url.ends_with("/dem_png/10/454/402.png"));

    let tile = provider
        .request_tile_geometry_from_bytes(&request, FetchOutcome::Ready(bytes.as_slice()))
        .unwrap()
        .expect("tile should not be cancelled");

    assert_eq!(tile.width, 32);
    assert_eq!(tile.height, 32);
    assert_eq!(tile.buffer.len(), 32 * 32);
    // First column samples raw column 0, last column samples the middle (column 128).
    assert_eq!(tile.height_at(0, 0), Some(-20.0));
    assert_eq!(tile.height_at(31, 17), Some(44.0));
    // Every row is identical.
    for row in 1..32 {
        assert_eq!(tile.buffer[row * 32..row * 32 + 32], tile.buffer[0..32]);
    }
}

#[test]
fn test_png_sea_sentinel_reads_as_zero() {
    let provider = png_provider();
    let bytes = png_tile(256, |_, y| if y < 128 { None } else { Some(12.0) });

    let request = provider.tile_request(TileCoord::new(0, 0, 8));
    let tile = provider
        .request_tile_geometry_from_bytes(&request, FetchOutcome::Ready(bytes.as_slice()))
        .unwrap()
        .unwrap();

    assert_eq!(tile.height_at(5, 0), Some(0.0));
    assert_eq!(tile.height_at(5, 31), Some(12.0));
}

#[test]
fn test_text_tile_deeper_than_max_level() {
    let provider = GsiTerrainProvider::new(ProviderConfig::default()).unwrap();
    let text = text_tile(256);

    // Level 16, odd x: shift 1 → x drops 2 bits (frac 3/4 for x = 7), y drops 1 bit.
    let request = provider.tile_request(TileCoord::new(7, 3, 16));
    assert_eq!(request.address.level, 15);
    assert_eq!(request.address.frac_x, 0.75);
    assert_eq!(request.address.frac_y, 0.5);
    assert!(request.url.ends_with("/dem5a/15/1/1.txt"));

    let tile = provider
        .request_tile_geometry_from_bytes(&request, FetchOutcome::Ready(text.as_bytes()))
        .unwrap()
        .unwrap();

    // Top-left sample: row round(0.5 * 255) = 128, col round(0.75 * 255) = 191.
    assert_eq!(tile.buffer[0], 128 * 100 + 191);
}

#[test]
fn test_height_power_and_clamping() {
    let provider = GsiTerrainProvider::new(ProviderConfig {
        height_power: 10.0,
        raw_width: 4,
        output_width: 4,
        ..Default::default()
    })
    .unwrap()
    .with_tiling_scheme(TilingScheme::SQUARE);

    let text = "1,2,3,4\n5,6,7,8\n9,10,11,12\n3000,3500,-4000,e\n";
    let request = provider.tile_request(TileCoord::new(0, 0, 2));
    let tile = provider
        .request_tile_geometry(&request, FetchOutcome::Ready(Payload::DelimitedText(text)))
        .unwrap()
        .unwrap();

    assert_eq!(&tile.buffer[0..4], &[10, 20, 30, 40]);
    assert_eq!(&tile.buffer[12..16], &[30_000, i16::MAX, i16::MIN, 0]);
}

#[test]
fn test_truncated_png_is_rejected() {
    let provider = png_provider();
    let bytes = png_tile(256, |_, _| Some(1.0));
    let request = provider.tile_request(TileCoord::new(0, 0, 8));

    let fetched = FetchOutcome::Ready(&bytes[..bytes.len() / 2]);
    let result = provider.request_tile_geometry_from_bytes(&request, fetched);
    assert!(matches!(result, Err(DemError::ImageDecode(_))));
}

#[test]
fn test_wrong_png_size_is_rejected() {
    let provider = png_provider();
    let bytes = png_tile(64, |_, _| Some(1.0));
    let request = provider.tile_request(TileCoord::new(0, 0, 8));

    let fetched = FetchOutcome::Ready(bytes.as_slice());
    let result = provider.request_tile_geometry_from_bytes(&request, fetched);
    assert!(matches!(result, Err(DemError::MalformedPayload(_))));
}

#[test]
fn test_parallel_requests_are_independent() {
    let provider = GsiTerrainProvider::new(ProviderConfig::default()).unwrap();
    let text = text_tile(256);

    let tiles: Vec<HeightmapTerrainData> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4u32)
            .map(|x| {
                let provider = &provider;
                let text = text.as_str();
                scope.spawn(move || {
                    let request = provider.tile_request(TileCoord::new(x, 0, 16));
                    let fetched = FetchOutcome::Ready(Payload::DelimitedText(text));
                    provider
                        .request_tile_geometry(&request, fetched)
                        .unwrap()
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    // Each quarter of the tile starts at a different column.
    let first_cols: Vec<i16> = tiles.iter().map(|t| t.buffer[0]).collect();
    assert_eq!(first_cols, vec![0, 64, 128, 191]);
}

#[test]
fn test_heightmap_serializes_to_json() {
    let provider = GsiTerrainProvider::new(ProviderConfig {
        raw_width: 2,
        output_width: 2,
        ..Default::default()
    })
    .unwrap();
    let request = provider.tile_request(TileCoord::new(0, 0, 0));
    let tile = provider
        .request_tile_geometry(&request, FetchOutcome::Ready(Payload::DelimitedText("1,2\n3,4")))
        .unwrap()
        .unwrap();

    let json = serde_json::to_value(&tile).unwrap();
    assert_eq!(json["width"], 2);
    assert_eq!(json["childTileMask"], 15);
    assert_eq!(json["structure"]["elementMultiplier"], 256.0);

    let back: HeightmapTerrainData = serde_json::from_value(json).unwrap();
    assert_eq!(back, tile);
}

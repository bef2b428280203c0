//! `gsidem url`: show where a renderer tile's data comes from.

use gsidem::{GsiTerrainProvider, TileCoord};

#[derive(clap::Args, Clone, Debug)]
pub struct UrlArgs {
    #[clap(help = "Renderer tile column")]
    pub x: u32,
    #[clap(help = "Renderer tile row")]
    pub y: u32,
    #[clap(help = "Renderer zoom level")]
    pub level: u32,
}

pub fn describe(provider: &GsiTerrainProvider, args: &UrlArgs) -> String {
    let request = provider.tile_request(TileCoord::new(args.x, args.y, args.level));
    let address = &request.address;
    format!(
        "tile      {}\nupstream  {}/{}/{} (offset {}, {}; shift {})\nurl       {}",
        request.coord,
        address.level,
        address.x,
        address.y,
        address.frac_x,
        address.frac_y,
        address.shift_levels,
        request.url
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsidem::ProviderConfig;

    #[test]
    fn test_describe_deep_tile() {
        let provider = GsiTerrainProvider::new(ProviderConfig::default()).unwrap();
        let text = describe(
            &provider,
            &UrlArgs {
                x: 7,
                y: 3,
                level: 16,
            },
        );
        assert!(text.contains("tile      16/7/3"));
        assert!(text.contains("upstream  15/1/1 (offset 0.75, 0.5; shift 1)"));
        assert!(text.ends_with("https://cyberjapandata.gsi.go.jp/xyz/dem5a/15/1/1.txt"));
    }
}

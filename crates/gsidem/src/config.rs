//! Provider configuration.

use crate::decode::DemEncoding;
use crate::{DemError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Highest level GSI publishes elevation tiles for.
pub const GSI_MAX_TERRAIN_LEVEL: u32 = 15;

/// Side length of a GSI elevation tile in samples.
pub const DEFAULT_RAW_WIDTH: usize = 256;

/// Side length of the heightmaps handed to the renderer.
pub const DEFAULT_OUTPUT_WIDTH: usize = 32;

/// Largest raw or output side length accepted.
pub const MAX_TILE_WIDTH: usize = 4096;

/// Base URL of the PNG-encoded elevation tiles.
pub const PNG_BASE_URL: &str = "https://cyberjapandata.gsi.go.jp/xyz/dem_png";

/// Base URL of the text-encoded elevation tiles.
pub const TEXT_BASE_URL: &str = "https://cyberjapandata.gsi.go.jp/xyz/dem";

/// Attribution required by GSI.
pub const DEFAULT_CREDIT: &str = "国土地理院";

/// Configuration for a [`GsiTerrainProvider`](crate::GsiTerrainProvider).
///
/// Every field has a default, so a YAML file only needs the values it changes:
///
/// ```yaml
/// use_png_data: true
/// height_power: 1.5
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Fetch `dem_png` tiles instead of `dem` text tiles.
    pub use_png_data: bool,
    /// Multiplier applied to every height before quantization.
    pub height_power: f64,
    /// Deepest level with upstream data.
    pub max_supported_level: u32,
    /// Side length of upstream tiles in samples.
    pub raw_width: usize,
    /// Side length of the produced heightmaps.
    pub output_width: usize,
    /// Replaces the default base URL for the configured encoding.
    pub base_url: Option<String>,
    /// Proxy endpoint; tile URLs become `{proxy}?{encoded url}`.
    pub proxy: Option<String>,
    /// Attribution text; defaults to [`DEFAULT_CREDIT`].
    pub credit: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            use_png_data: false,
            height_power: 1.0,
            max_supported_level: GSI_MAX_TERRAIN_LEVEL,
            raw_width: DEFAULT_RAW_WIDTH,
            output_width: DEFAULT_OUTPUT_WIDTH,
            base_url: None,
            proxy: None,
            credit: None,
        }
    }
}

impl ProviderConfig {
    /// Parse and validate a YAML configuration.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Check the values the pipeline depends on.
    pub fn validate(&self) -> Result<()> {
        if self.raw_width < 2 {
            return Err(DemError::InvalidConfig(format!(
                "raw_width must be at least 2, got {}",
                self.raw_width
            )));
        }
        if self.raw_width > MAX_TILE_WIDTH {
            return Err(DemError::InvalidConfig(format!(
                "raw_width must be at most {}, got {}",
                MAX_TILE_WIDTH, self.raw_width
            )));
        }
        if self.output_width < 2 {
            return Err(DemError::InvalidConfig(format!(
                "output_width must be at least 2, got {}",
                self.output_width
            )));
        }
        if self.output_width > self.raw_width {
            return Err(DemError::InvalidConfig(format!(
                "output_width {} exceeds raw_width {}",
                self.output_width, self.raw_width
            )));
        }
        if !self.height_power.is_finite() {
            return Err(DemError::InvalidConfig(format!(
                "height_power must be finite, got {}",
                self.height_power
            )));
        }
        if let Some(base) = &self.base_url {
            if base.trim().is_empty() {
                return Err(DemError::InvalidConfig("base_url is empty".to_string()));
            }
        }
        Ok(())
    }

    /// Encoding selected by `use_png_data`.
    pub fn encoding(&self) -> DemEncoding {
        if self.use_png_data {
            DemEncoding::Png
        } else {
            DemEncoding::Text
        }
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/'),
            None => match self.encoding() {
                DemEncoding::Png => PNG_BASE_URL,
                DemEncoding::Text => TEXT_BASE_URL,
            },
        }
    }

    /// Attribution text.
    pub fn credit(&self) -> &str {
        self.credit.as_deref().unwrap_or(DEFAULT_CREDIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::default();
        assert!(!config.use_png_data);
        assert_eq!(config.height_power, 1.0);
        assert_eq!(config.max_supported_level, 15);
        assert_eq!(config.raw_width, 256);
        assert_eq!(config.output_width, 32);
        assert_eq!(config.encoding(), DemEncoding::Text);
        assert_eq!(config.base_url(), TEXT_BASE_URL);
        assert_eq!(config.credit(), "国土地理院");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = "use_png_data: true\nheight_power: 1.5\n";
        let config = ProviderConfig::from_yaml_str(yaml).unwrap();
        assert!(config.use_png_data);
        assert_eq!(config.height_power, 1.5);
        assert_eq!(config.output_width, 32);
        assert_eq!(config.base_url(), PNG_BASE_URL);
    }

    #[test]
    fn test_base_url_override_trims_slash() {
        let config = ProviderConfig {
            base_url: Some("http://localhost:8080/dem/".to_string()),
            ..Default::default()
        };
        assert_eq!(config.base_url(), "http://localhost:8080/dem");
    }

    #[test]
    fn test_validation_failures() {
        let widths = |raw_width, output_width| ProviderConfig {
            raw_width,
            output_width,
            ..Default::default()
        };
        let blank_url = ProviderConfig {
            base_url: Some("  ".to_string()),
            ..Default::default()
        };
        let nan_power = ProviderConfig {
            height_power: f64::NAN,
            ..Default::default()
        };
        let bad = [
            widths(1, 1),
            widths(256, 0),
            widths(MAX_TILE_WIDTH + 1, 256),
            widths(usize::MAX, 256),
            widths(2, 1 << 20),
            widths(256, 257),
            blank_url,
            nan_power,
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(DemError::InvalidConfig(_))), "{config:?}");
        }
    }

    #[test]
    fn test_width_bounds_are_inclusive() {
        let largest = ProviderConfig {
            raw_width: MAX_TILE_WIDTH,
            output_width: MAX_TILE_WIDTH,
            ..Default::default()
        };
        assert!(largest.validate().is_ok());

        let same = ProviderConfig {
            raw_width: 3,
            output_width: 3,
            ..Default::default()
        };
        assert!(same.validate().is_ok());
    }

    #[test]
    fn test_yaml_errors_propagate() {
        assert!(matches!(ProviderConfig::from_yaml_str("raw_width: [1"), Err(DemError::Yaml(_))));
        assert!(matches!(
            ProviderConfig::from_yaml_str("output_width: 1"),
            Err(DemError::InvalidConfig(_))
        ));
    }
}

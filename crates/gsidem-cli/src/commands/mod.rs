//! Subcommand implementations and the helpers they share.

pub mod batch;
pub mod render;
pub mod url;

use crate::error::CliError;
use gsidem::{HeightmapTerrainData, ProviderConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Provider settings that can be given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config: Option<PathBuf>,
    pub png: bool,
    pub height_power: Option<f64>,
}

/// Load the configuration file (if any) and apply command-line overrides.
///
/// Flags win over file values; the merged result is validated again.
pub fn resolve_config(overrides: &ConfigOverrides) -> Result<ProviderConfig, CliError> {
    let mut config = match &overrides.config {
        Some(path) => {
            debug!(path = %path.display(), "loading provider config");
            ProviderConfig::from_file(path)?
        }
        None => ProviderConfig::default(),
    };

    if overrides.png {
        config.use_png_data = true;
    }
    if let Some(height_power) = overrides.height_power {
        config.height_power = height_power;
    }

    config.validate()?;
    Ok(config)
}

/// Read a whole file, keeping the path in the error.
pub fn read_file(path: &Path) -> Result<Vec<u8>, CliError> {
    fs::read(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Write heightmap JSON to `path`, creating parent directories.
pub fn write_tile_json(path: &Path, tile: &HeightmapTerrainData) -> Result<(), CliError> {
    let write_err = |source| CliError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let json = serde_json::to_string(tile)?;
    fs::write(path, json).map_err(write_err)
}

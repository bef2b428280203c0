//! Heightmap terrain data handed to the renderer.

use crate::resample::Heightmap;
use serde::{Deserialize, Serialize};

/// How the renderer interprets the heightmap buffer.
///
/// A stored value `v` means `v * height_scale + height_offset` metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerrainDataStructure {
    /// Multiplier applied to each stored height.
    pub height_scale: f64,
    /// Offset added after scaling.
    pub height_offset: f64,
    /// Buffer elements making up one height.
    pub elements_per_height: u32,
    /// Buffer elements between consecutive heights.
    pub stride: u32,
    /// Multiplier between the elements of a multi-element height.
    pub element_multiplier: f64,
}

impl Default for TerrainDataStructure {
    fn default() -> Self {
        Self {
            height_scale: 1.0,
            height_offset: 0.0,
            elements_per_height: 1,
            stride: 1,
            element_multiplier: 256.0,
        }
    }
}

/// A quantized heightmap plus the metadata a renderer needs to read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeightmapTerrainData {
    /// Heights, row-major, north to south and west to east.
    pub buffer: Vec<i16>,
    /// Width of the heightmap in samples.
    pub width: usize,
    /// Height of the heightmap in samples.
    pub height: usize,
    /// Buffer layout.
    pub structure: TerrainDataStructure,
    /// Child availability mask; the renderer reads the low four bits.
    pub child_tile_mask: u32,
}

impl HeightmapTerrainData {
    /// Wrap a heightmap with the fixed GSI structure.
    pub fn assemble(heightmap: Heightmap, max_supported_level: u32) -> Self {
        let width = heightmap.width();
        Self {
            buffer: heightmap.into_samples(),
            width,
            height: width,
            structure: TerrainDataStructure::default(),
            child_tile_mask: max_supported_level,
        }
    }

    /// Height in metres at `(col, row)`, with the structure applied.
    ///
    /// Returns `None` outside the grid, or when the buffer is too short for the
    /// declared dimensions (possible for deserialized data).
    pub fn height_at(&self, col: usize, row: usize) -> Option<f64> {
        if col >= self.width || row >= self.height {
            return None;
        }
        let index = (row * self.width + col).checked_mul(self.structure.stride as usize)?;
        let raw = *self.buffer.get(index)?;
        Some(f64::from(raw) * self.structure.height_scale + self.structure.height_offset)
    }

    /// Lowest and highest height in metres, or `None` for an empty buffer.
    pub fn min_max_height(&self) -> Option<(f64, f64)> {
        let min = self.buffer.iter().min()?;
        let max = self.buffer.iter().max()?;
        let structure = &self.structure;
        let scale = |v: i16| f64::from(v) * structure.height_scale + structure.height_offset;
        Some((scale(*min), scale(*max)))
    }
}

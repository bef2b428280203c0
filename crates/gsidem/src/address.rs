//! Tile address resolution.
//!
//! The renderer addresses tiles in a Web Mercator quadtree whose level 0 is
//! two tiles wide and one tile tall. GSI publishes tiles on the standard XYZ
//! scheme (one root tile) and only up to level 15. Resolving a renderer tile
//! therefore means:
//!
//! - dropping `level - max` levels when the request is deeper than the data,
//! - dropping one extra bit of `x` because two renderer columns share one GSI
//!   column,
//! - remembering where the requested footprint sits inside the GSI tile
//!   (`frac_x`, `frac_y`) so the resampler can crop it.
//!
//! ```text
//!  renderer level 16, x = 5, y = 3        GSI level 15 tile (x = 1, y = 1)
//!  +-----+-----+-----+-----+            +-----------------------+
//!  |  4  | [5] |  6  |  7  |   --->     | frac_x = 1/4          |
//!  +-----+-----+-----+-----+            | frac_y = 1/2          |
//!                                       +-----------------------+
//! ```

/// Renderer tile coordinates (level, x, y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    /// Quadtree level (0 = root).
    pub level: u32,
    /// X coordinate (column, 0 at 180°W, increases eastward).
    pub x: u32,
    /// Y coordinate (row, 0 at ~85.05°N, increases southward).
    pub y: u32,
}

impl TileCoord {
    /// Create a new tile coordinate.
    pub fn new(x: u32, y: u32, level: u32) -> Self {
        Self { level, x, y }
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.level, self.x, self.y)
    }
}

/// Shape of the renderer's level-0 quadtree root.
///
/// Both counts must be powers of two. Each power of two beyond one tile adds a
/// bit that has to be shifted away to reach the single-root GSI scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilingScheme {
    /// Number of tiles in x at level 0.
    pub level_zero_tiles_x: u32,
    /// Number of tiles in y at level 0.
    pub level_zero_tiles_y: u32,
}

impl TilingScheme {
    /// Renderer scheme used for GSI terrain: 2 × 1 root tiles.
    pub const GSI: Self = Self {
        level_zero_tiles_x: 2,
        level_zero_tiles_y: 1,
    };

    /// A square 1 × 1 root, identical to the upstream XYZ scheme.
    pub const SQUARE: Self = Self {
        level_zero_tiles_x: 1,
        level_zero_tiles_y: 1,
    };

    /// Number of tiles in x at the given level.
    pub fn tiles_x_at_level(&self, level: u32) -> u64 {
        u64::from(self.level_zero_tiles_x) << level.min(32)
    }

    /// Number of tiles in y at the given level.
    pub fn tiles_y_at_level(&self, level: u32) -> u64 {
        u64::from(self.level_zero_tiles_y) << level.min(32)
    }

    fn root_bits_x(&self) -> u32 {
        self.level_zero_tiles_x.trailing_zeros()
    }

    fn root_bits_y(&self) -> u32 {
        self.level_zero_tiles_y.trailing_zeros()
    }
}

/// The upstream tile that holds data for a renderer tile, plus the
/// requested tile's offset inside it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveAddress {
    /// Upstream column.
    pub x: u32,
    /// Upstream row.
    pub y: u32,
    /// Upstream level, never above the maximum supported level.
    pub level: u32,
    /// Levels dropped because the request was deeper than the data.
    pub shift_levels: u32,
    /// Total bits dropped from the requested x.
    pub x_bits: u32,
    /// Total bits dropped from the requested y.
    pub y_bits: u32,
    /// Horizontal offset of the requested tile within the upstream tile, in `[0, 1)`.
    pub frac_x: f64,
    /// Vertical offset of the requested tile within the upstream tile, in `[0, 1)`.
    pub frac_y: f64,
}

impl EffectiveAddress {
    /// Resolve a renderer tile against the given root shape and maximum level.
    pub fn resolve(coord: TileCoord, max_level: u32, scheme: TilingScheme) -> Self {
        let shift_levels = coord.level.saturating_sub(max_level);
        let level = coord.level - shift_levels;

        let x_bits = shift_levels + scheme.root_bits_x();
        let y_bits = shift_levels + scheme.root_bits_y();

        let (x, frac_x) = split_bits(coord.x, x_bits);
        let (y, frac_y) = split_bits(coord.y, y_bits);

        Self {
            x,
            y,
            level,
            shift_levels,
            x_bits,
            y_bits,
            frac_x,
            frac_y,
        }
    }

    /// Width of the requested footprint as a fraction of the upstream tile.
    pub fn span_x(&self) -> f64 {
        1.0 / pow2(self.x_bits)
    }

    /// Height of the requested footprint as a fraction of the upstream tile.
    pub fn span_y(&self) -> f64 {
        1.0 / pow2(self.y_bits)
    }
}

/// `2^bits` as a float; exact for every shift that fits a `u32` coordinate.
pub(crate) fn pow2(bits: u32) -> f64 {
    2f64.powi(bits.min(i32::MAX as u32) as i32)
}

/// Split `value` into its parent index (`value >> bits`) and the fractional
/// position of the dropped low bits.
fn split_bits(value: u32, bits: u32) -> (u32, f64) {
    let parent = value.checked_shr(bits).unwrap_or(0);
    let remainder = if bits >= u32::BITS {
        value
    } else {
        value & ((1u32 << bits) - 1)
    };
    (parent, f64::from(remainder) / pow2(bits))
}

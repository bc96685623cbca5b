//! Texel grid layout for vertex and bone animation textures
//!
//! Every unique entry (a deduplicated vertex or a skeleton bone) owns exactly
//! one texel per animation frame. Entries are laid out row-major, so entry `i`
//! lives at `(i % width, i / width)` inside a frame's row block.
//!
//! # Auto-size rules
//!
//! Vertex textures:
//! - `width = min(prev_pow2(max_width), next_pow2(N))`
//! - `rows_per_frame = ceil(N / width)`
//! - `height = next_pow2(rows_per_frame × total_frames)`
//!
//! Bone textures:
//! - `width = clamp(next_pow2(bone_count), 8, prev_pow2(max_width))`
//! - `height = next_pow2(total_frames + 1)` (row 0 holds the reference pose)

use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest texture edge the target engine accepts
pub const MAX_TEXTURE_DIMENSION: u32 = 4096;

/// Bone textures are never narrower than this
pub const MIN_BONE_TEXTURE_WIDTH: u32 = 8;

/// Texture dimensions in texels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSize {
    pub width: u32,
    pub height: u32,
}

impl GridSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Larger of the two axes
    pub fn max_dim(&self) -> u32 {
        self.width.max(self.height)
    }

    /// Number of texels in the whole texture
    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for GridSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Which texture family a layout belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridKind {
    Vertex,
    Bone,
}

impl fmt::Display for GridKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridKind::Vertex => f.write_str("vertex"),
            GridKind::Bone => f.write_str("bone"),
        }
    }
}

/// A layout that cannot hold the data it was planned for
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapacityError {
    #[error("{kind} texture needs {required} rows but only has {available}")]
    HeightExceeded {
        kind: GridKind,
        required: u32,
        available: u32,
    },

    #[error("{kind} texture size {size} exceeds the {limit} texel limit")]
    TextureTooLarge {
        kind: GridKind,
        size: GridSize,
        limit: u32,
    },

    #[error("{kind} texture frame holds {capacity} texels but {entries} entries need one each")]
    RowOverflow {
        kind: GridKind,
        entries: u32,
        capacity: u32,
    },
}

/// Round up to the next power of two (`0` and `1` both map to `1`)
#[inline]
pub fn round_up_to_power_of_two(value: u32) -> u32 {
    value.checked_next_power_of_two().unwrap_or(1 << 31)
}

/// Round down to the previous power of two (`0` maps to `1`)
#[inline]
pub fn round_down_to_power_of_two(value: u32) -> u32 {
    1 << (u32::BITS - 1 - value.max(1).leading_zeros())
}

/// Layout of a vertex animation texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexGridLayout {
    pub size: GridSize,
    /// Texel rows occupied by a single animation frame
    pub rows_per_frame: u32,
}

impl VertexGridLayout {
    /// Plan the grid for `unique_count` vertices over `total_frames` frames
    ///
    /// With `auto_size` off the caller's `override_size` is kept and
    /// `rows_per_frame = next_pow2(unique_count / width)` (integer division).
    /// That formula can under-allocate; [`Self::check_capacity`] reports it.
    pub fn plan(
        unique_count: u32,
        total_frames: u32,
        auto_size: bool,
        max_width: u32,
        override_size: GridSize,
    ) -> Self {
        if auto_size {
            let width =
                round_down_to_power_of_two(max_width).min(round_up_to_power_of_two(unique_count));
            let rows_per_frame = unique_count.div_ceil(width);
            let height = round_up_to_power_of_two(rows_per_frame.saturating_mul(total_frames));
            Self {
                size: GridSize::new(width, height),
                rows_per_frame,
            }
        } else {
            debug_assert!(override_size.width > 0, "override width must be non-zero");
            Self {
                size: override_size,
                rows_per_frame: round_up_to_power_of_two(unique_count / override_size.width),
            }
        }
    }

    /// Texels written per animation frame
    pub fn texels_per_frame(&self) -> usize {
        self.size.width as usize * self.rows_per_frame as usize
    }

    /// Rows needed to store `total_frames` frames
    pub fn required_height(&self, total_frames: u32) -> u32 {
        self.rows_per_frame.saturating_mul(total_frames)
    }

    pub fn check_capacity(&self, unique_count: u32, total_frames: u32) -> Result<(), CapacityError> {
        let required = self.required_height(total_frames);
        if required > self.size.height {
            return Err(CapacityError::HeightExceeded {
                kind: GridKind::Vertex,
                required,
                available: self.size.height,
            });
        }
        check_dimensions(GridKind::Vertex, self.size)?;

        let capacity = self.size.width.saturating_mul(self.rows_per_frame);
        if unique_count > capacity {
            return Err(CapacityError::RowOverflow {
                kind: GridKind::Vertex,
                entries: unique_count,
                capacity,
            });
        }
        Ok(())
    }
}

/// Layout of the bone position/rotation textures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoneGridLayout {
    pub size: GridSize,
}

impl BoneGridLayout {
    /// Plan the grid for `bone_count` bones over `total_frames` frames
    ///
    /// `max_width` should be at least [`MIN_BONE_TEXTURE_WIDTH`] when `auto_size`
    /// is set; a smaller one still yields the minimum width.
    pub fn plan(
        bone_count: u32,
        total_frames: u32,
        auto_size: bool,
        max_width: u32,
        override_size: GridSize,
    ) -> Self {
        if auto_size {
            let limit = round_down_to_power_of_two(max_width).max(MIN_BONE_TEXTURE_WIDTH);
            let width = round_up_to_power_of_two(bone_count).clamp(MIN_BONE_TEXTURE_WIDTH, limit);
            let height = round_up_to_power_of_two(total_frames.saturating_add(1));
            Self {
                size: GridSize::new(width, height),
            }
        } else {
            Self {
                size: override_size,
            }
        }
    }

    /// One row per frame plus the reference pose row
    pub fn required_height(total_frames: u32) -> u32 {
        total_frames.saturating_add(1)
    }

    pub fn check_capacity(&self, bone_count: u32, total_frames: u32) -> Result<(), CapacityError> {
        let required = Self::required_height(total_frames);
        if required > self.size.height {
            return Err(CapacityError::HeightExceeded {
                kind: GridKind::Bone,
                required,
                available: self.size.height,
            });
        }
        check_dimensions(GridKind::Bone, self.size)?;

        if bone_count > self.size.width {
            return Err(CapacityError::RowOverflow {
                kind: GridKind::Bone,
                entries: bone_count,
                capacity: self.size.width,
            });
        }
        Ok(())
    }
}

fn check_dimensions(kind: GridKind, size: GridSize) -> Result<(), CapacityError> {
    if size.max_dim() > MAX_TEXTURE_DIMENSION {
        return Err(CapacityError::TextureTooLarge {
            kind,
            size,
            limit: MAX_TEXTURE_DIMENSION,
        });
    }
    Ok(())
}

// ============================================================================
// Index <-> texel helpers
// ============================================================================

/// Flat index of texel `(x, y)`
#[inline]
pub fn grid_index(x: u32, y: u32, width: u32) -> u32 {
    y * width + x
}

/// Column of a flat index
#[inline]
pub fn grid_x(index: u32, width: u32) -> u32 {
    index % width
}

/// Row of a flat index
#[inline]
pub fn grid_y(index: u32, width: u32) -> u32 {
    index / width
}

/// UV of the centre of the texel owned by entry `index`
#[inline]
pub fn grid_uv(index: u32, size: GridSize) -> Vec2 {
    let x = grid_x(index, size.width) as f32;
    let y = grid_y(index, size.width) as f32;
    Vec2::new(
        (x + 0.5) / size.width as f32,
        (y + 0.5) / size.height as f32,
    )
}

/// Texel-centre UVs for entries `0..count`
pub fn grid_uvs(count: u32, size: GridSize) -> Vec<Vec2> {
    (0..count).map(|i| grid_uv(i, size)).collect()
}

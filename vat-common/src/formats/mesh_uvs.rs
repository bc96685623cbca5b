//! VAT mesh UV binary format (.vatuv)
//!
//! Per-LOD animation UV channels and skin weight colours for the static mesh
//! that replays a bake. POD format - no magic bytes.
//!
//! # Layout
//! ```text
//! 0x00: lod_count u16
//! 0x02: channel_count u16
//! 0x04: flags u16 (bit 0: colours present)
//! 0x06: reserved u16
//! then per channel:
//!   channel u16, reserved u16
//!   per LOD: vertex_count u32, vertex_count × (u f32, v f32)
//! then, if colours are present, per LOD:
//!   vertex_count u32, vertex_count × RGBA8
//! ```
//! All values little-endian.

use std::io::{self, Write};

use glam::Vec2;
use thiserror::Error;

/// File extension for baked mesh UVs
pub const VAT_MESH_UV_EXT: &str = "vatuv";

/// Flag bit: weight colours follow the UV channels
pub const FLAG_HAS_COLORS: u16 = 0x01;

/// One UV channel of every LOD
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UvChannelData {
    /// Mesh UV channel index the data belongs in
    pub channel: u16,
    /// Per LOD, per vertex UV
    pub lods: Vec<Vec<Vec2>>,
}

/// Contents of a .vatuv file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VatMeshUvs {
    pub lod_count: u16,
    pub channels: Vec<UvChannelData>,
    /// Per LOD, per vertex RGBA8
    pub colors: Option<Vec<Vec<[u8; 4]>>>,
}

#[derive(Debug, Error)]
pub enum MeshUvFormatError {
    #[error("mesh UV file ends early at byte {0}")]
    UnexpectedEof(usize),

    #[error("mesh UV file has {0} trailing bytes")]
    TrailingBytes(usize),

    #[error("channel {channel} has {actual} LODs, file declares {expected}")]
    LodCount {
        channel: u16,
        expected: usize,
        actual: usize,
    },

    #[error("{0} does not fit the format")]
    TooLarge(&'static str),

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn write_count<W: Write>(w: &mut W, count: usize) -> Result<(), MeshUvFormatError> {
    let count = u32::try_from(count).map_err(|_| MeshUvFormatError::TooLarge("vertex count"))?;
    w.write_all(&count.to_le_bytes())?;
    Ok(())
}

/// Write a complete .vatuv file
pub fn write_vat_mesh_uvs<W: Write>(w: &mut W, data: &VatMeshUvs) -> Result<(), MeshUvFormatError> {
    let lod_count = data.lod_count as usize;
    let channel_count =
        u16::try_from(data.channels.len()).map_err(|_| MeshUvFormatError::TooLarge("channel count"))?;
    let flags = if data.colors.is_some() { FLAG_HAS_COLORS } else { 0 };

    w.write_all(&data.lod_count.to_le_bytes())?;
    w.write_all(&channel_count.to_le_bytes())?;
    w.write_all(&flags.to_le_bytes())?;
    w.write_all(&0u16.to_le_bytes())?;

    for channel in &data.channels {
        if channel.lods.len() != lod_count {
            return Err(MeshUvFormatError::LodCount {
                channel: channel.channel,
                expected: lod_count,
                actual: channel.lods.len(),
            });
        }
        w.write_all(&channel.channel.to_le_bytes())?;
        w.write_all(&0u16.to_le_bytes())?;
        for uvs in &channel.lods {
            write_count(w, uvs.len())?;
            for uv in uvs {
                w.write_all(&uv.x.to_le_bytes())?;
                w.write_all(&uv.y.to_le_bytes())?;
            }
        }
    }

    if let Some(colors) = &data.colors {
        if colors.len() != lod_count {
            return Err(MeshUvFormatError::LodCount {
                channel: u16::MAX,
                expected: lod_count,
                actual: colors.len(),
            });
        }
        for lod in colors {
            write_count(w, lod.len())?;
            for color in lod {
                w.write_all(color)?;
            }
        }
    }

    Ok(())
}

/// Little-endian reader over a byte slice
struct Cursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], MeshUvFormatError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(MeshUvFormatError::UnexpectedEof(self.offset))?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16, MeshUvFormatError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, MeshUvFormatError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f32(&mut self) -> Result<f32, MeshUvFormatError> {
        Ok(f32::from_bits(self.u32()?))
    }
}

/// Parse a complete .vatuv file
pub fn read_vat_mesh_uvs(bytes: &[u8]) -> Result<VatMeshUvs, MeshUvFormatError> {
    let mut cursor = Cursor { bytes, offset: 0 };
    let lod_count = cursor.u16()?;
    let channel_count = cursor.u16()?;
    let flags = cursor.u16()?;
    let _reserved = cursor.u16()?;

    let mut channels = Vec::with_capacity(channel_count as usize);
    for _ in 0..channel_count {
        let channel = cursor.u16()?;
        let _reserved = cursor.u16()?;
        let mut lods = Vec::with_capacity(lod_count as usize);
        for _ in 0..lod_count {
            let count = cursor.u32()? as usize;
            let mut uvs = Vec::new();
            for _ in 0..count {
                let u = cursor.f32()?;
                let v = cursor.f32()?;
                uvs.push(Vec2::new(u, v));
            }
            lods.push(uvs);
        }
        channels.push(UvChannelData { channel, lods });
    }

    let colors = if flags & FLAG_HAS_COLORS != 0 {
        let mut lods = Vec::with_capacity(lod_count as usize);
        for _ in 0..lod_count {
            let count = cursor.u32()? as usize;
            let raw = cursor.take(count.saturating_mul(4))?;
            lods.push(
                raw.chunks_exact(4)
                    .map(|c| [c[0], c[1], c[2], c[3]])
                    .collect(),
            );
        }
        Some(lods)
    } else {
        None
    };

    let trailing = bytes.len() - cursor.offset;
    if trailing != 0 {
        return Err(MeshUvFormatError::TrailingBytes(trailing));
    }

    Ok(VatMeshUvs {
        lod_count,
        channels,
        colors,
    })
}

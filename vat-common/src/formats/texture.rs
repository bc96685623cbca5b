//! VAT texture binary format (.vattex)
//!
//! Uncompressed RGBA16F payload for baked animation textures.
//! POD format - no magic bytes.
//!
//! # Layout
//! ```text
//! 0x00: width u16 (max 65535)
//! 0x02: height u16 (max 65535)
//! 0x04: compression u16 (0 = HDR, 1 = vector displacement)
//! 0x06: reserved u16
//! 0x08: texel_data (width × height × 8 bytes, f16 R, G, B, A little-endian)
//! ```

use std::io::{self, Write};

use thiserror::Error;

use crate::color::Float16Color;

/// File extension for baked animation textures
pub const VAT_TEXTURE_EXT: &str = "vattex";

/// Compression hint recorded for the importing engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum TextureCompression {
    /// Full half-float range (offsets, bone positions, bone rotations)
    Hdr = 0,
    /// Normalised displacement data (normal deltas)
    VectorDisplacement = 1,
}

impl TextureCompression {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::Hdr),
            1 => Some(Self::VectorDisplacement),
            _ => None,
        }
    }
}

/// VatTexture header (8 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct VatTextureHeader {
    pub width: u16,
    pub height: u16,
    pub compression: u16,
    pub reserved: u16,
}

impl VatTextureHeader {
    pub const SIZE: usize = 8;

    pub fn new(width: u16, height: u16, compression: TextureCompression) -> Self {
        Self {
            width,
            height,
            compression: compression as u16,
            reserved: 0,
        }
    }

    /// Number of texels in the payload
    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Payload size in bytes (8 bytes per texel)
    pub fn data_size(&self) -> usize {
        self.texel_count() * Float16Color::SIZE
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..2].copy_from_slice(&self.width.to_le_bytes());
        bytes[2..4].copy_from_slice(&self.height.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.compression.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.reserved.to_le_bytes());
        bytes
    }

    /// Read header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            width: u16::from_le_bytes([bytes[0], bytes[1]]),
            height: u16::from_le_bytes([bytes[2], bytes[3]]),
            compression: u16::from_le_bytes([bytes[4], bytes[5]]),
            reserved: u16::from_le_bytes([bytes[6], bytes[7]]),
        })
    }
}

#[derive(Debug, Error)]
pub enum TextureFormatError {
    #[error("texture file is {0} bytes, too short for the header")]
    TruncatedHeader(usize),

    #[error("texture payload is {actual} bytes, expected {expected}")]
    PayloadSize { expected: usize, actual: usize },

    #[error("texel count {texels} does not match {width}x{height}")]
    TexelCount {
        width: u16,
        height: u16,
        texels: usize,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Write a complete VatTexture file
pub fn write_vat_texture<W: Write>(
    w: &mut W,
    header: &VatTextureHeader,
    texels: &[Float16Color],
) -> Result<(), TextureFormatError> {
    if texels.len() != header.texel_count() {
        return Err(TextureFormatError::TexelCount {
            width: header.width,
            height: header.height,
            texels: texels.len(),
        });
    }

    w.write_all(&header.to_bytes())?;
    for texel in texels {
        w.write_all(&texel.to_le_bytes())?;
    }
    Ok(())
}

/// Parse a complete VatTexture file
pub fn read_vat_texture(
    bytes: &[u8],
) -> Result<(VatTextureHeader, Vec<Float16Color>), TextureFormatError> {
    let header = VatTextureHeader::from_bytes(bytes)
        .ok_or(TextureFormatError::TruncatedHeader(bytes.len()))?;

    let payload = &bytes[VatTextureHeader::SIZE..];
    if payload.len() != header.data_size() {
        return Err(TextureFormatError::PayloadSize {
            expected: header.data_size(),
            actual: payload.len(),
        });
    }

    let texels = payload
        .chunks_exact(Float16Color::SIZE)
        .map(|chunk| {
            let mut texel = [0u8; Float16Color::SIZE];
            texel.copy_from_slice(chunk);
            Float16Color::from_le_bytes(texel)
        })
        .collect();

    Ok((header, texels))
}

//! RGBA16F texel type shared by the encoder and the texture format

use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use half::f16;

/// One RGBA16F texel (8 bytes, channels in R, G, B, A order)
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Float16Color {
    pub r: f16,
    pub g: f16,
    pub b: f16,
    pub a: f16,
}

impl Float16Color {
    pub const SIZE: usize = 8;

    pub const ZERO: Self = Self {
        r: f16::ZERO,
        g: f16::ZERO,
        b: f16::ZERO,
        a: f16::ZERO,
    };

    /// Convert a linear float color, rounding each channel to half precision
    pub fn from_vec4(v: Vec4) -> Self {
        Self {
            r: f16::from_f32(v.x),
            g: f16::from_f32(v.y),
            b: f16::from_f32(v.z),
            a: f16::from_f32(v.w),
        }
    }

    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(
            self.r.to_f32(),
            self.g.to_f32(),
            self.b.to_f32(),
            self.a.to_f32(),
        )
    }

    pub fn to_le_bytes(self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..2].copy_from_slice(&self.r.to_le_bytes());
        bytes[2..4].copy_from_slice(&self.g.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.b.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.a.to_le_bytes());
        bytes
    }

    pub fn from_le_bytes(bytes: [u8; Self::SIZE]) -> Self {
        Self {
            r: f16::from_le_bytes([bytes[0], bytes[1]]),
            g: f16::from_le_bytes([bytes[2], bytes[3]]),
            b: f16::from_le_bytes([bytes[4], bytes[5]]),
            a: f16::from_le_bytes([bytes[6], bytes[7]]),
        }
    }
}

//! Texel encoding for baked animation data
//!
//! Three schemes turn sampled float data into RGBA16F texels:
//!
//! - **LDR vectors** (normal deltas): each component normalised against the
//!   vector's own largest component, alpha holds `max_dim / bound`.
//! - **HDR vectors** (vertex offsets, bone positions): xyz is the direction
//!   scaled so its largest component is ±1, alpha holds the magnitude as
//!   `-1 + 2 × max_dim / global_max`.
//! - **Quaternions** (bone rotations): largest-component encoding, see [`quat`].
//!
//! Entries whose largest component is zero are skipped and keep the texture's
//! zero fill.

mod bits;
mod quat;


pub use bits::{pack_bits, unpack_bits};
pub use quat::{
    decode_quat, encode_quat, encode_quat_texture, largest_component, sanitize_quat,
    selector_bits, QUAT_SIZE_SQUARED_EPSILON,
};

use glam::{Vec3, Vec4};

use crate::color::Float16Color;

/// Fixed bound used for normal delta textures
///
/// Two unit normals can differ by at most 2 on any axis.
pub const NORMAL_DELTA_BOUND: f32 = 2.0;

/// Vector texture encoding scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorEncoding {
    /// Fixed-range normalisation, alpha = `max_dim / bound`
    Ldr,
    /// Direction plus signed-range magnitude, alpha = `-1 + 2 × max_dim / bound`
    Hdr,
}

/// Map `value` from `[-bound, bound]` to `[0, 1]`
#[inline]
pub fn encode_float(value: f32, bound: f32) -> f32 {
    (value / bound + 1.0) * 0.5
}

/// Inverse of [`encode_float`]
#[inline]
pub fn decode_float(value: f32, bound: f32) -> f32 {
    (value * 2.0 - 1.0) * bound
}

/// Largest absolute component of the xyz part
#[inline]
pub fn abs_max(v: Vec3) -> f32 {
    v.abs().max_element()
}

/// LDR-encode one vector, `None` when all components are zero
pub fn encode_vector_ldr(v: Vec3, bound: f32) -> Option<Vec4> {
    let max_dim = abs_max(v);
    if max_dim > 0.0 {
        Some(Vec4::new(
            encode_float(v.x, max_dim),
            encode_float(v.y, max_dim),
            encode_float(v.z, max_dim),
            max_dim / bound,
        ))
    } else {
        None
    }
}

/// HDR-encode one vector against `global_max`, `None` when all components are zero
pub fn encode_vector_hdr(v: Vec3, global_max: f32) -> Option<Vec4> {
    let max_dim = abs_max(v);
    if max_dim > 0.0 {
        let dir = v / max_dim;
        let magnitude = -1.0 + (max_dim / global_max) * 2.0;
        Some(dir.extend(magnitude))
    } else {
        None
    }
}

/// Inverse of the LDR scheme: `((xyz × 2 − 1) × w) × bound`
pub fn decode_vec(texel: Vec4, bound: f32) -> Vec3 {
    ((texel.truncate() * 2.0 - Vec3::ONE) * texel.w) * bound
}

/// Inverse of the HDR scheme: `xyz × (w + 1) / 2 × global_max`
pub fn decode_vec_hdr(texel: Vec4, global_max: f32) -> Vec3 {
    texel.truncate() * ((texel.w + 1.0) * 0.5 * global_max)
}

/// Encode a flat sequence of vectors into a zero-filled texture of `texel_count` texels
///
/// Only the xyz part of each input is encoded; entry `i` lands in texel `i`.
pub fn encode_vector_texture(
    data: &[Vec4],
    bound: f32,
    encoding: VectorEncoding,
    texel_count: usize,
) -> Vec<Float16Color> {
    debug_assert!(data.len() <= texel_count, "more entries than texels");

    let mut texels = vec![Float16Color::ZERO; texel_count];
    for (texel, value) in texels.iter_mut().zip(data) {
        let encoded = match encoding {
            VectorEncoding::Ldr => encode_vector_ldr(value.truncate(), bound),
            VectorEncoding::Hdr => encode_vector_hdr(value.truncate(), bound),
        };
        if let Some(encoded) = encoded {
            *texel = Float16Color::from_vec4(encoded);
        }
    }
    texels
}

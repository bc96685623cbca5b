//! Largest-component quaternion encoding
//!
//! The largest-magnitude component is dropped and its index stored in the
//! signs of R and G (bit 0 in R, bit 1 in G). The remaining three components
//! are negated when the dropped one is negative, so the dropped component can
//! be rebuilt as `+sqrt(1 − a² − b² − c²)`.
//!
//! Texel layout:
//! - R: `max(0.001, encode(a, m)) × (bit0 ? 1 : −1)`
//! - G: `max(0.001, encode(b, m)) × (bit1 ? 1 : −1)`
//! - B: `c / m`
//! - A: `−1 + 2m`
//!
//! where `m` is the largest absolute value among the three kept components.
//! B carries no sign bit. A zero remainder encodes to `(0, 0, 0, 1)`.

use glam::{Quat, Vec3, Vec4};

use super::{abs_max, decode_float, encode_float};
use crate::color::Float16Color;

/// Quaternions with a squared length below this collapse to identity
pub const QUAT_SIZE_SQUARED_EPSILON: f32 = 1e-8;

const NORMALIZED_TOLERANCE: f32 = 0.01;

/// Floor for the R/G magnitudes so the sign bit survives a zero channel
const SIGN_FLOOR: f32 = 0.001;

/// Identity for degenerate input, renormalised when noticeably off unit length
///
/// Returns the clean quaternion and whether renormalisation was needed.
pub fn sanitize_quat(q: Quat) -> (Quat, bool) {
    if q.length_squared() < QUAT_SIZE_SQUARED_EPSILON {
        (Quat::IDENTITY, false)
    } else if (1.0 - q.length_squared()).abs() >= NORMALIZED_TOLERANCE {
        (q.normalize(), true)
    } else {
        (q, false)
    }
}

/// Index of the largest-magnitude component
///
/// Comparisons are strictly greater in index order, so on a tie the earlier
/// component stays selected.
pub fn largest_component(q: [f32; 4]) -> usize {
    let mut index = 0;
    let mut max = q[0].abs();
    for (i, c) in q.iter().enumerate().skip(1) {
        if c.abs() > max {
            max = c.abs();
            index = i;
        }
    }
    index
}

/// Selector bits `(bit0, bit1)` for a dropped component index
pub fn selector_bits(index: usize) -> (bool, bool) {
    match index {
        0 => (false, false),
        1 => (false, true),
        2 => (true, false),
        _ => (true, true),
    }
}

/// Encode one quaternion given as `(x, y, z, w)`
pub fn encode_quat(q: Vec4) -> Vec4 {
    let values = q.to_array();
    let index = largest_component(values);
    let (bit0, bit1) = selector_bits(index);

    let mut remaining = match index {
        0 => Vec3::new(values[1], values[2], values[3]),
        1 => Vec3::new(values[0], values[2], values[3]),
        2 => Vec3::new(values[0], values[1], values[3]),
        _ => Vec3::new(values[0], values[1], values[2]),
    };
    if values[index] < 0.0 {
        remaining = -remaining;
    }

    let max_dim = abs_max(remaining);
    if max_dim > 0.0 {
        let sign = |bit: bool| if bit { 1.0 } else { -1.0 };
        Vec4::new(
            encode_float(remaining.x, max_dim).max(SIGN_FLOOR) * sign(bit0),
            encode_float(remaining.y, max_dim).max(SIGN_FLOOR) * sign(bit1),
            remaining.z / max_dim,
            -1.0 + max_dim * 2.0,
        )
    } else {
        Vec4::new(0.0, 0.0, 0.0, 1.0)
    }
}

/// Rebuild a quaternion `(x, y, z, w)` from an encoded texel
///
/// `(0, 0, 0, 1)` carries no selector and decodes to identity.
pub fn decode_quat(texel: Vec4) -> Vec4 {
    if texel.x == 0.0 && texel.y == 0.0 {
        return Vec4::W;
    }

    let bit0 = texel.x > 0.0;
    let bit1 = texel.y > 0.0;
    let index = match (bit0, bit1) {
        (false, false) => 0,
        (false, true) => 1,
        (true, false) => 2,
        (true, true) => 3,
    };

    let max_dim = (texel.w + 1.0) * 0.5;
    let a = decode_float(texel.x.abs(), max_dim);
    let b = decode_float(texel.y.abs(), max_dim);
    let c = texel.z * max_dim;
    let dropped = (1.0 - a * a - b * b - c * c).max(0.0).sqrt();

    match index {
        0 => Vec4::new(dropped, a, b, c),
        1 => Vec4::new(a, dropped, b, c),
        2 => Vec4::new(a, b, dropped, c),
        _ => Vec4::new(a, b, c, dropped),
    }
}

/// Encode a flat sequence of quaternions into a zero-filled texture
pub fn encode_quat_texture(data: &[Vec4], texel_count: usize) -> Vec<Float16Color> {
    debug_assert!(data.len() <= texel_count, "more entries than texels");

    let mut texels = vec![Float16Color::ZERO; texel_count];
    for (texel, q) in texels.iter_mut().zip(data) {
        *texel = Float16Color::from_vec4(encode_quat(*q));
    }
    texels
}

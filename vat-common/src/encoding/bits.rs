//! Small-integer packing into float channels
//!
//! `value + 1024` is treated as a half-float bit pattern (sign:1, exp:5,
//! mantissa:10) and its fields are moved into the matching positions of an
//! f32 bit pattern with the exponent rebiased by +112 (127 − 15). Unpacking
//! reverses the field moves and subtracts the offset. Values in `0..=2047`
//! survive the round trip bit-exactly.

const VALUE_OFFSET: u32 = 1024;
const EXPONENT_REBIAS: u32 = 127 - 15;

/// Pack a small integer into the bits of an f32
pub fn pack_bits(value: u32) -> f32 {
    let half = value.wrapping_add(VALUE_OFFSET);
    let sign = (half & 0x8000) << 16;
    let exponent = (((half >> 10) & 0x1f) + EXPONENT_REBIAS) << 23;
    let mantissa = (half & 0x3ff) << 13;
    f32::from_bits(sign | exponent | mantissa)
}

/// Inverse of [`pack_bits`]
pub fn unpack_bits(packed: f32) -> u32 {
    let bits = packed.to_bits();
    let sign = (bits >> 16) & 0x8000;
    let exponent = ((((bits >> 23) & 0xff).wrapping_sub(EXPONENT_REBIAS)) & 0x1f) << 10;
    let mantissa = (bits >> 13) & 0x3ff;
    (sign | exponent | mantissa).wrapping_sub(VALUE_OFFSET)
}

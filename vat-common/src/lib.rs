//! Shared types and utilities for vertex animation texture baking
//!
//! This crate holds everything that does not depend on a mesh or an
//! animation source, so both the baker and any runtime-side loader can use it:
//!
//! # Modules
//!
//! - [`grid`] - Texture grid planning, capacity checks and texel UVs
//! - [`encoding`] - LDR/HDR vector, quaternion and bit packing texel encoders
//! - [`color`] - RGBA16F texel type
//! - [`formats`] - `.vattex` texture and `.vatuv` mesh UV file formats

pub mod color;
pub mod encoding;
pub mod formats;
pub mod grid;

pub use color::Float16Color;

pub use encoding::{
    NORMAL_DELTA_BOUND, VectorEncoding, decode_quat, decode_vec, decode_vec_hdr, encode_quat,
    encode_quat_texture, encode_vector_texture, pack_bits, unpack_bits,
};

pub use grid::{
    BoneGridLayout, CapacityError, GridKind, GridSize, MAX_TEXTURE_DIMENSION,
    MIN_BONE_TEXTURE_WIDTH, VertexGridLayout, grid_uv, grid_uvs, round_down_to_power_of_two,
    round_up_to_power_of_two,
};

pub use formats::{
    MeshUvFormatError, TextureCompression, TextureFormatError, UvChannelData, VAT_MESH_UV_EXT,
    VAT_TEXTURE_EXT, VatMeshUvs, VatTextureHeader, read_vat_mesh_uvs, read_vat_texture,
    write_vat_mesh_uvs, write_vat_texture,
};

//! Binary file formats for baked animation data
//!
//! POD formats with fixed headers and no magic bytes. The extension
//! identifies the content.

pub mod mesh_uvs;
pub mod texture;

pub use mesh_uvs::*;
pub use texture::*;

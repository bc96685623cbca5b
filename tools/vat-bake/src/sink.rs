//! Output collaborators
//!
//! The baker hands finished texel payloads and mesh UV channels to sinks and
//! records the references they return on the profile. The file sinks write
//! `.vattex` and `.vatuv` files into an output directory.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use glam::Vec2;
use vat_common::{
    Float16Color, GridSize, TextureCompression, UvChannelData, VAT_MESH_UV_EXT, VAT_TEXTURE_EXT,
    VatMeshUvs, VatTextureHeader, write_vat_mesh_uvs, write_vat_texture,
};

use crate::bone_map::LodBoneUvs;
use crate::error::PersistenceError;

/// The four generated textures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureRole {
    Offsets,
    Normals,
    BonePosition,
    BoneRotation,
}

impl TextureRole {
    /// Name suffix after the profile name
    pub fn suffix(self) -> &'static str {
        match self {
            TextureRole::Offsets => "Offsets",
            TextureRole::Normals => "Normals",
            TextureRole::BonePosition => "BonePos",
            TextureRole::BoneRotation => "BoneRot",
        }
    }

    pub fn compression(self) -> TextureCompression {
        match self {
            TextureRole::Normals => TextureCompression::VectorDisplacement,
            _ => TextureCompression::Hdr,
        }
    }
}

/// A generated texture ready to persist
///
/// Payloads are linear RGBA16F and meant for nearest filtering.
#[derive(Debug, Clone, Copy)]
pub struct TextureDesc<'a> {
    pub name: &'a str,
    pub role: TextureRole,
    pub size: GridSize,
    /// Reference from a previous bake, updated in place when present
    pub existing: Option<&'a str>,
    /// `size.width × size.height` texels, row-major
    pub texels: &'a [Float16Color],
}

pub trait TextureSink {
    /// Persist a texture and return its reference
    fn write_texture(&mut self, desc: &TextureDesc<'_>) -> Result<String, PersistenceError>;
}

/// Animation channels of one static mesh LOD
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticLodOutput {
    pub vertex_uvs: Option<Vec<Vec2>>,
    pub bone_uvs: Option<LodBoneUvs>,
}

/// Everything written onto the static mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticMeshOutput {
    pub name: String,
    /// Reference from a previous bake, updated in place when present
    pub existing: Option<String>,
    pub vertex_channel: Option<u32>,
    pub bone_channel: Option<u32>,
    /// Influences 2 and 3, plus weight colours
    pub bone_full_channel: Option<u32>,
    pub lods: Vec<StaticLodOutput>,
}

pub trait MeshSink {
    /// Persist the mesh channels and return the mesh reference
    fn write_mesh(&mut self, mesh: &StaticMeshOutput) -> Result<String, PersistenceError>;
}

/// Writes `<name>.vattex` files into a directory
#[derive(Debug, Clone)]
pub struct FileTextureSink {
    pub dir: PathBuf,
}

impl FileTextureSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

fn create_file(path: &Path, target: &str) -> Result<BufWriter<File>, PersistenceError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| PersistenceError::new(target, e))?;
    }
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| PersistenceError::new(target, e))
}

fn dimension(value: u32, target: &str) -> Result<u16, PersistenceError> {
    u16::try_from(value).map_err(|e| PersistenceError::new(target, e))
}

impl TextureSink for FileTextureSink {
    fn write_texture(&mut self, desc: &TextureDesc<'_>) -> Result<String, PersistenceError> {
        let path = match desc.existing {
            Some(existing) => PathBuf::from(existing),
            None => self.dir.join(format!("{}.{}", desc.name, VAT_TEXTURE_EXT)),
        };

        let header = VatTextureHeader::new(
            dimension(desc.size.width, desc.name)?,
            dimension(desc.size.height, desc.name)?,
            desc.role.compression(),
        );
        let mut writer = create_file(&path, desc.name)?;
        write_vat_texture(&mut writer, &header, desc.texels)
            .map_err(|e| PersistenceError::new(desc.name, e))?;
        writer.flush().map_err(|e| PersistenceError::new(desc.name, e))?;

        tracing::info!("Wrote {} ({}) to {:?}", desc.name, desc.size, path);
        Ok(path.display().to_string())
    }
}

/// Writes `<mesh name>.vatuv` files into a directory
#[derive(Debug, Clone)]
pub struct FileMeshSink {
    pub dir: PathBuf,
}

impl FileMeshSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

/// Gather per-LOD data into `.vatuv` channels
pub fn mesh_uv_file(mesh: &StaticMeshOutput) -> Result<VatMeshUvs, PersistenceError> {
    let lod_count = u16::try_from(mesh.lods.len()).map_err(|e| PersistenceError::new(&mesh.name, e))?;
    let channel_id =
        |channel: u32| u16::try_from(channel).map_err(|e| PersistenceError::new(&mesh.name, e));
    let mut channels = Vec::new();

    if let Some(channel) = mesh.vertex_channel {
        channels.push(UvChannelData {
            channel: channel_id(channel)?,
            lods: mesh
                .lods
                .iter()
                .map(|lod| lod.vertex_uvs.clone().unwrap_or_default())
                .collect(),
        });
    }
    if let Some(channel) = mesh.bone_channel {
        channels.push(UvChannelData {
            channel: channel_id(channel)?,
            lods: mesh
                .lods
                .iter()
                .map(|lod| lod.bone_uvs.as_ref().map(|b| b.uv1.clone()).unwrap_or_default())
                .collect(),
        });
    }
    let colors = match mesh.bone_full_channel {
        Some(channel) => {
            channels.push(UvChannelData {
                channel: channel_id(channel)?,
                lods: mesh
                    .lods
                    .iter()
                    .map(|lod| lod.bone_uvs.as_ref().map(|b| b.uv2.clone()).unwrap_or_default())
                    .collect(),
            });
            Some(
                mesh.lods
                    .iter()
                    .map(|lod| lod.bone_uvs.as_ref().map(|b| b.colors.clone()).unwrap_or_default())
                    .collect(),
            )
        }
        None => None,
    };

    Ok(VatMeshUvs {
        lod_count,
        channels,
        colors,
    })
}

impl MeshSink for FileMeshSink {
    fn write_mesh(&mut self, mesh: &StaticMeshOutput) -> Result<String, PersistenceError> {
        let data = mesh_uv_file(mesh)?;
        let path = match &mesh.existing {
            Some(existing) => PathBuf::from(existing),
            None => self.dir.join(format!("{}.{}", mesh.name, VAT_MESH_UV_EXT)),
        };
        let mut writer = create_file(&path, &mesh.name)?;
        write_vat_mesh_uvs(&mut writer, &data).map_err(|e| PersistenceError::new(&mesh.name, e))?;
        writer.flush().map_err(|e| PersistenceError::new(&mesh.name, e))?;

        tracing::info!(
            "Wrote {} UV channels for {} LODs to {:?}",
            data.channels.len(),
            data.lod_count,
            path
        );
        Ok(path.display().to_string())
    }
}

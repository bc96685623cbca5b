//! Bake error taxonomy
//!
//! Configuration, capacity and data-integrity problems abort a bake before
//! any output is touched. Persistence problems are reported separately and
//! never undo computed data.

use thiserror::Error;
use vat_common::{GridKind, GridSize};

pub use vat_common::CapacityError;

/// Problems with the profile itself, found before sampling starts
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("manual {list} texture size {size} is too small (larger axis must be at least 8)")]
    InvalidOverrideSize { list: GridKind, size: GridSize },

    #[error("max width {0} must be a power of two of at least 8")]
    InvalidMaxWidth(u32),

    #[error("profile has no vertex or bone animations")]
    NoAnimations,

    #[error("{list} animation {index} has no sequence")]
    MissingSequence { list: GridKind, index: usize },

    #[error("sequence '{name}' is not known to the pose evaluator")]
    UnknownSequence { name: String },

    #[error("animations use different skeletons: expected '{expected}', found '{found}'")]
    SkeletonMismatch { expected: String, found: String },

    #[error("{list} animation {index} needs at least one frame")]
    InvalidFrameCount { list: GridKind, index: usize },

    #[error("sequence '{name}' has no playable length")]
    ZeroLengthClip { name: String },
}

/// Source mesh or skeleton data that cannot be baked
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataIntegrityError {
    #[error("reference LOD has no vertices")]
    EmptyMesh,

    #[error("mesh has no LOD {0}")]
    MissingLod(usize),

    #[error("LOD {lod}: expected {expected} vertices, got {actual}")]
    VertexCountMismatch {
        lod: usize,
        expected: usize,
        actual: usize,
    },

    #[error("LOD {lod} section {section}: bone map index {index} out of range ({len} entries)")]
    InvalidBoneMapIndex {
        lod: usize,
        section: usize,
        index: u8,
        len: usize,
    },

    #[error("bone index {index} is outside the mesh skeleton ({count} bones)")]
    InvalidBoneIndex { index: usize, count: usize },

    #[error("bone '{0}' is missing from the global skeleton")]
    BoneNotInSkeleton(String),

    #[error("bone {bone} has invalid parent {parent}")]
    InvalidBoneParent { bone: usize, parent: usize },

    #[error("pose evaluator returned {actual} bone transforms, skeleton has {expected}")]
    BoneCountMismatch { expected: usize, actual: usize },

    #[error("LOD {lod} vertex {vertex} has a non-finite position")]
    NonFinitePosition { lod: usize, vertex: usize },
}

/// Anything that aborts a bake
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BakeError {
    #[error("invalid profile: {0}")]
    Config(#[from] ConfigError),

    #[error("texture capacity: {0}")]
    Capacity(#[from] CapacityError),

    #[error("invalid source data: {0}")]
    DataIntegrity(#[from] DataIntegrityError),
}

/// A sink rejected a generated asset
#[derive(Debug, Error)]
#[error("failed to persist {target}: {source}")]
pub struct PersistenceError {
    pub target: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl PersistenceError {
    pub fn new(
        target: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            target: target.into(),
            source: source.into(),
        }
    }
}

/// Malformed input to the UV island partitioner
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IslandError {
    #[error("index buffer length {0} is not a multiple of 3")]
    IndexCountNotTriangles(usize),

    #[error("index {index} at corner {corner} is out of range for {uv_count} UVs")]
    IndexOutOfRange {
        corner: usize,
        index: u32,
        uv_count: usize,
    },
}

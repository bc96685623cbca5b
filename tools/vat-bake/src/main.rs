//! vat-bake - vertex animation texture baker
//!
//! Bakes glTF skinned mesh animation into RGBA16F textures (.vattex) and
//! static mesh UV channels (.vatuv) as configured by a TOML bake profile.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use glam::Vec4;
use std::path::{Path, PathBuf};
use vat_common::{
    BoneGridLayout, TextureCompression, VAT_MESH_UV_EXT, VAT_TEXTURE_EXT, VertexGridLayout,
    read_vat_mesh_uvs, read_vat_texture,
};

use vat_bake::{
    BakeMode, BakeProfile, FileMeshSink, FileTextureSink, GltfRig, PoseEvaluator, bake,
    load_gltf_rig, partition_islands,
};

#[derive(Parser)]
#[command(name = "vat-bake")]
#[command(about = "Vertex animation texture baker")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bake a glTF skinned mesh with a profile
    Bake {
        /// Path to the bake profile (TOML), updated after the bake
        profile: PathBuf,

        /// Input glTF/GLB file
        input: PathBuf,

        /// Output directory (default: profile directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only write mesh UV channels, skip sampling and textures
        #[arg(long)]
        mesh_only: bool,
    },

    /// Validate a profile without baking
    Check {
        /// Path to the bake profile (TOML)
        profile: PathBuf,

        /// Also resolve sequences against this glTF/GLB file
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Show the texture layout a profile would produce
    Plan {
        /// Path to the bake profile (TOML)
        profile: PathBuf,

        /// Unique vertex count of the reference LOD
        #[arg(long, default_value_t = 0)]
        vertices: u32,

        /// Bone count of the global skeleton
        #[arg(long, default_value_t = 0)]
        bones: u32,
    },

    /// Describe a .vattex, .vatuv or glTF/GLB file
    Info {
        input: PathBuf,
    },

    /// Partition a glTF mesh LOD into UV islands
    Islands {
        /// Input glTF/GLB file
        input: PathBuf,

        /// LOD index (default: 0)
        #[arg(short, long, default_value_t = 0)]
        lod: usize,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Bake {
            profile: profile_path,
            input,
            output,
            mesh_only,
        } => {
            let mut profile = BakeProfile::load(&profile_path)?;
            let GltfRig {
                mesh,
                mut evaluator,
                ..
            } = load_gltf_rig(&input)?;

            let output = output.unwrap_or_else(|| {
                profile_path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default()
            });
            let mode = if mesh_only {
                BakeMode::MeshOnly
            } else {
                BakeMode::Full
            };
            tracing::info!("Baking {:?} with {:?} -> {:?}", input, profile_path, output);

            let report = bake(
                &mut profile,
                &mesh,
                &mut evaluator,
                &mut FileTextureSink::new(output.clone()),
                &mut FileMeshSink::new(output),
                mode,
            )?;
            profile.save(&profile_path)?;

            if !report.persistence_errors.is_empty() {
                bail!(
                    "{} output(s) failed to write, profile updated with the rest",
                    report.persistence_errors.len()
                );
            }
            tracing::info!("Done!");
        }

        Commands::Check { profile, input } => {
            tracing::info!("Checking profile {:?}", profile);
            let profile = BakeProfile::load(&profile)?;
            match input {
                Some(input) => {
                    let rig = load_gltf_rig(&input)?;
                    profile.validate_against(&rig.evaluator)?;
                }
                None => profile.validate()?,
            }
            tracing::info!("Profile is valid!");
        }

        Commands::Plan {
            profile,
            vertices,
            bones,
        } => {
            let profile = BakeProfile::load(&profile)?;
            profile.validate()?;
            print_plan(&profile, vertices, bones);
        }

        Commands::Info { input } => {
            let ext = input
                .extension()
                .and_then(|e| e.to_str())
                .map(|s| s.to_lowercase())
                .unwrap_or_default();

            match ext.as_str() {
                VAT_TEXTURE_EXT => print_texture_info(&input)?,
                VAT_MESH_UV_EXT => print_mesh_uv_info(&input)?,
                "gltf" | "glb" => print_rig_info(&input)?,
                _ => bail!(
                    "Unsupported file: {:?} (use .{}, .{}, .gltf, or .glb)",
                    input,
                    VAT_TEXTURE_EXT,
                    VAT_MESH_UV_EXT
                ),
            }
        }

        Commands::Islands { input, lod } => {
            let rig = load_gltf_rig(&input)?;
            let geometry = rig
                .geometry
                .get(lod)
                .with_context(|| format!("LOD {} not found in {:?}", lod, input))?;
            let (triangle_islands, island_count) =
                partition_islands(&geometry.indices, &geometry.uvs)?;

            let mut triangles = vec![0usize; island_count];
            for &island in &triangle_islands {
                triangles[island] += 1;
            }
            println!(
                "LOD {}: {} triangles in {} UV islands",
                lod,
                triangle_islands.len(),
                island_count
            );
            for (island, count) in triangles.iter().enumerate() {
                println!("  [{}] {} triangles", island, count);
            }
        }
    }

    Ok(())
}

fn print_plan(profile: &BakeProfile, vertices: u32, bones: u32) {
    if profile.has_vertex_anims() {
        let frames = profile.total_frames_vert();
        let layout = VertexGridLayout::plan(
            vertices,
            frames,
            profile.auto_size,
            profile.max_width,
            profile.vertex.override_size,
        );
        println!(
            "Vertex: {} ({} rows per frame, {} frames)",
            layout.size, layout.rows_per_frame, frames
        );
        for (i, clip) in profile.vertex.anims.iter().enumerate() {
            println!(
                "  [{}] {} starts at row {}",
                i,
                clip.sequence.as_deref().unwrap_or("-"),
                profile.start_height_of_anim_vert(i)
            );
        }
        if let Err(err) = layout.check_capacity(vertices, frames) {
            println!("  Does not fit: {}", err);
        }
    }

    if profile.has_bone_anims() {
        let frames = profile.total_frames_bone();
        let layout = BoneGridLayout::plan(
            bones,
            frames,
            profile.auto_size,
            profile.max_width,
            profile.bone.override_size,
        );
        println!("Bone: {} ({} frames + reference row)", layout.size, frames);
        for (i, clip) in profile.bone.anims.iter().enumerate() {
            println!(
                "  [{}] {} starts at row {}",
                i,
                clip.sequence.as_deref().unwrap_or("-"),
                profile.start_height_of_anim_bone(i)
            );
        }
        if let Err(err) = layout.check_capacity(bones, frames) {
            println!("  Does not fit: {}", err);
        }
    }
}

fn print_texture_info(path: &Path) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read: {:?}", path))?;
    let (header, texels) =
        read_vat_texture(&bytes).with_context(|| format!("Failed to parse: {:?}", path))?;

    let compression = match TextureCompression::from_u16(header.compression) {
        Some(TextureCompression::Hdr) => "HDR",
        Some(TextureCompression::VectorDisplacement) => "vector displacement",
        None => "unknown",
    };
    println!("{}x{} RGBA16F, {}", header.width, header.height, compression);

    let (min, max) = texels.iter().map(|t| t.to_vec4()).fold(
        (Vec4::splat(f32::INFINITY), Vec4::splat(f32::NEG_INFINITY)),
        |(min, max), v| (min.min(v), max.max(v)),
    );
    if !texels.is_empty() {
        for (channel, (lo, hi)) in ["R", "G", "B", "A"]
            .iter()
            .zip(min.to_array().into_iter().zip(max.to_array()))
        {
            println!("  {}: {:.4} .. {:.4}", channel, lo, hi);
        }
    }
    Ok(())
}

fn print_mesh_uv_info(path: &Path) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read: {:?}", path))?;
    let data =
        read_vat_mesh_uvs(&bytes).with_context(|| format!("Failed to parse: {:?}", path))?;

    println!("{} LODs, {} UV channels", data.lod_count, data.channels.len());
    for channel in &data.channels {
        let counts: Vec<usize> = channel.lods.iter().map(Vec::len).collect();
        println!("  UV{}: vertices per LOD {:?}", channel.channel, counts);
    }
    if let Some(colors) = &data.colors {
        let counts: Vec<usize> = colors.iter().map(Vec::len).collect();
        println!("  Weight colours: vertices per LOD {:?}", counts);
    }
    Ok(())
}

fn print_rig_info(path: &Path) -> Result<()> {
    let rig = load_gltf_rig(path)?;

    println!(
        "{}: skeleton '{}' with {} joints, {} UV channels",
        rig.mesh.name,
        rig.mesh.skeleton.name,
        rig.mesh.skeleton.bone_count(),
        rig.mesh.num_tex_coords
    );
    for (i, lod) in rig.mesh.lods.iter().enumerate() {
        println!(
            "  LOD {}: {} vertices in {} sections",
            i,
            lod.vertex_count(),
            lod.sections.len()
        );
    }

    println!("Animations:");
    for name in rig.evaluator.clip_names() {
        let duration = rig
            .evaluator
            .clip_info(name)
            .map(|info| info.duration)
            .unwrap_or_default();
        println!("  {} ({:.2}s)", name, duration);
    }
    Ok(())
}

//! Import pipeline
//!
//! Glue from a decoded container to renderable data: per model, the sparse
//! point list is densified into a volume and surface-meshed; combined-tier
//! bakes are packed into atlases and the affected UVs rewritten. The
//! pipeline also extracts the palette, the material table, and the flat
//! scene-node list an external hierarchy builder consumes.
//!
//! The container stores extents and points Z-up; everything downstream is
//! Y-up, so Y and Z are swapped exactly once, here.

use std::path::Path;

use glam::UVec3;

use crate::core::{Error, Result};
use crate::mesh::atlas::{Atlas, bake_atlases};
use crate::mesh::config::MesherConfig;
use crate::mesh::descriptor::MeshDescriptor;
use crate::mesh::mesher::mesh_volume;
use crate::mesh::volume::VoxelVolume;
use crate::vox::chunk::{Body, VoxelsBody};
use crate::vox::material::{MaterialKind, MaterialTable};
use crate::vox::palette::{DEFAULT_PALETTE, PALETTE_SIZE, Rgba, palette_image};
use crate::vox::scene::SceneNodes;
use crate::vox::stream::Diagnostic;
use crate::vox::{ChunkTag, VoxAsset};

/// One meshed model of an asset.
#[derive(Debug)]
pub struct ImportedShape {
    /// Volume extent after the Y/Z swap.
    pub extent: UVec3,
    pub mesh: MeshDescriptor,
    /// One atlas per material kind the combined tiers touched.
    pub atlases: Vec<Atlas>,
}

/// Everything the import pipeline hands to its collaborators.
#[derive(Debug)]
pub struct ImportedModel {
    pub name: String,
    /// Container version; selects the orientation codec for node frames.
    pub version: i32,
    pub palette: Box<[Rgba; PALETTE_SIZE]>,
    pub materials: MaterialTable,
    pub shapes: Vec<ImportedShape>,
    pub nodes: SceneNodes,
    pub diagnostics: Vec<Diagnostic>,
}

impl ImportedModel {
    /// Palette atlas image sampled by exact-tier diffuse faces.
    pub fn palette_image(&self) -> image::RgbaImage {
        palette_image(&self.palette)
    }
}

/// Import a container from memory.
pub fn import_bytes(bytes: &[u8], name: &str, config: &MesherConfig) -> Result<ImportedModel> {
    let asset = VoxAsset::decode(bytes)?;
    import_asset(asset, name, config)
}

/// Import a container file; the model is named after the file stem.
pub fn import_file(path: impl AsRef<Path>, config: &MesherConfig) -> Result<ImportedModel> {
    let path = path.as_ref();
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let asset = VoxAsset::decode_file(path)?;
    import_asset(asset, &name, config)
}

/// Import an already-decoded container.
pub fn import_asset(asset: VoxAsset, name: &str, config: &MesherConfig) -> Result<ImportedModel> {
    let root = &asset.root;

    let palette: Box<[Rgba; PALETTE_SIZE]> = match root.find_child(ChunkTag::Palette) {
        Some(chunk) => match &chunk.body {
            Body::Palette(body) => body.colors.clone(),
            _ => Box::new(DEFAULT_PALETTE),
        },
        None => Box::new(DEFAULT_PALETTE),
    };

    let mut materials = MaterialTable::new();
    for chunk in &root.children {
        if let Body::Material(body) = &chunk.body {
            // Plain diffuse slots stay unassigned and mesh into the
            // palette bucket.
            if body.kind == MaterialKind::Diffuse {
                continue;
            }
            if let Err(err) = materials.set(body.id as u32, body.kind, body.attrs) {
                log::warn!("ignoring material: {err}");
            }
        }
    }

    let mut shapes = Vec::new();
    for i in 1..root.children.len() {
        let Body::Size(size) = &root.children[i - 1].body else {
            continue;
        };
        let Body::Voxels(voxels) = &root.children[i].body else {
            continue;
        };

        let extent = UVec3::new(
            size.extent.x.max(0) as u32,
            size.extent.z.max(0) as u32,
            size.extent.y.max(0) as u32,
        );
        match build_shape(extent, voxels, &palette, &materials, config) {
            Ok(shape) => shapes.push(shape),
            Err(err) => {
                log::warn!("skipping model {}: {err}", shapes.len());
                continue;
            }
        }
    }

    let nodes = {
        let from_file = SceneNodes::from_root(root);
        if from_file.is_empty() {
            SceneNodes::synthesize(name, shapes.len())
        } else {
            from_file
        }
    };

    Ok(ImportedModel {
        name: name.to_string(),
        version: asset.version,
        palette,
        materials,
        shapes,
        nodes,
        diagnostics: asset.diagnostics,
    })
}

fn build_shape(
    extent: UVec3,
    voxels: &VoxelsBody,
    palette: &[Rgba; PALETTE_SIZE],
    materials: &MaterialTable,
    config: &MesherConfig,
) -> std::result::Result<ImportedShape, Error> {
    let points = voxels
        .points
        .iter()
        .map(|p| [p.x as u32, p.z as u32, p.y as u32, p.index as u32]);
    let volume = VoxelVolume::from_points(extent, points)?;

    let mut output = mesh_volume(&volume, palette, materials, config);
    let atlases = bake_atlases(&mut output.mesh, &output.bakes);

    Ok(ImportedShape {
        extent,
        mesh: output.mesh,
        atlases,
    })
}

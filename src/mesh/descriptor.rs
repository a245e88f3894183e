//! Mesh descriptors and bake requests
//!
//! The mesher fills one descriptor per shape: shared vertex buffers plus a
//! partition of the triangle list into named submesh buckets, each bucket
//! bound to one material/texture assignment by the caller. Combined-tier
//! quads additionally carry a bake request for the atlas packer.

use glam::{Vec2, Vec3};
use image::RgbaImage;

use crate::vox::material::MaterialKind;

/// Names one submesh bucket. Buckets appear in this order: the palette
/// bucket, then combined buckets in material-kind order, then exact
/// buckets in palette-index order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubmeshKey {
    /// Exact-voxel diffuse faces sampling the shared palette atlas.
    Palette,
    /// Combined faces of one material kind, sampling a baked atlas.
    Combined(MaterialKind),
    /// Exact-voxel faces of one imported material, keyed by palette id.
    Material(u8),
}

impl SubmeshKey {
    /// Display label, e.g. `"palette"`, `"metal combined"`, `"material 17"`.
    pub fn label(&self) -> String {
        match self {
            SubmeshKey::Palette => "palette".to_string(),
            SubmeshKey::Combined(kind) => format!("{} combined", kind.label()),
            SubmeshKey::Material(id) => format!("material {id}"),
        }
    }
}

/// One submesh bucket: its key and the triangle indices assigned to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submesh {
    pub key: SubmeshKey,
    pub indices: Vec<u32>,
}

/// Geometry of one meshed shape.
///
/// All buckets index into the same four vertex buffers. The buffers are
/// owned by the shape that produced them until handed to the hierarchy or
/// material binder.
#[derive(Debug, Default)]
pub struct MeshDescriptor {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    /// Material-facing UVs: palette atlas cell, voxel-unit tiling, or the
    /// unit square remapped by atlas placement.
    pub uv0: Vec<Vec2>,
    /// Per-face unit square, independent of the material layout.
    pub uv1: Vec<Vec2>,
    /// Non-empty buckets in their canonical order.
    pub submeshes: Vec<Submesh>,
}

impl MeshDescriptor {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Total triangles across every bucket.
    pub fn triangle_count(&self) -> usize {
        self.submeshes.iter().map(|s| s.indices.len() / 3).sum()
    }

    /// Bucket lookup by key.
    pub fn submesh(&self, key: SubmeshKey) -> Option<&Submesh> {
        self.submeshes.iter().find(|s| s.key == key)
    }
}

/// A rectangle image destined for the atlas of its material kind.
///
/// `first_vertex` is the first of the quad's four vertices; the packer
/// remaps `uv0[first_vertex..first_vertex + 4]` through the placement rect
/// it assigns to this image.
#[derive(Debug)]
pub struct BakeRequest {
    pub kind: MaterialKind,
    pub first_vertex: u32,
    /// One pixel per covered voxel, from the palette lookup.
    pub color: RgbaImage,
    /// Shader attribute channels, present for metal regions.
    pub attributes: Option<RgbaImage>,
}

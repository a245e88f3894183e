//! Greedy surface mesher
//!
//! The volume is swept once per axis direction. Each sweep scans cells in
//! row-major order and merges exposed faces into the largest rectangle
//! that passes the active tier's equality test, so flat regions collapse
//! into a handful of quads.
//!
//! Three merge tiers are tried per cell, in priority order:
//!
//! 1. **Combined, unconstrained** — cells merge by material kind alone,
//!    growing straight through detail boundaries. Chosen for busy regions
//!    (see [`MesherConfig::unlimited_switches`]); the covered colors are
//!    baked to a texture.
//! 2. **Combined, exposure-bounded** — same kind-level merge but stopping
//!    at exposure boundaries like normal growth. Also bakes.
//! 3. **Exact** — cells must share the identical voxel id; the face
//!    samples the palette atlas (diffuse) or carries its material id.
//!
//! Tiers 1 and 2 run only when combined baking is enabled. A face-normal
//! neighbor occludes a cell only when it holds the same material kind;
//! different kinds never occlude each other, so a diffuse/metal boundary
//! is drawn from both sides.
//!
//! Visited state is one cell deep in the swept plane and resets between
//! directions: a cell exposed on two faces is emitted once per face.

use std::collections::BTreeMap;

use glam::{IVec3, Vec2, Vec3};
use image::RgbaImage;

use crate::mesh::config::MesherConfig;
use crate::mesh::descriptor::{BakeRequest, MeshDescriptor, Submesh, SubmeshKey};
use crate::mesh::volume::VoxelVolume;
use crate::vox::material::{MaterialKind, MaterialTable};
use crate::vox::palette::{PALETTE_COLUMNS, PALETTE_ROWS, PALETTE_SIZE, Rgba};

/// Output of one mesher invocation.
#[derive(Debug)]
pub struct MeshOutput {
    pub mesh: MeshDescriptor,
    pub bakes: Vec<BakeRequest>,
}

/// Mesh one volume. The volume and all scratch state are owned by this
/// single call; the mesher itself never fails, since every cell reaching
/// it was bounds-checked by the volume builder.
pub fn mesh_volume(
    volume: &VoxelVolume,
    palette: &[Rgba; PALETTE_SIZE],
    materials: &MaterialTable,
    config: &MesherConfig,
) -> MeshOutput {
    Mesher {
        volume,
        palette,
        materials,
        config,
        extent: volume.extent().as_ivec3(),
        visited: vec![false; volume.len()],
        positions: Vec::new(),
        normals: Vec::new(),
        uv0: Vec::new(),
        uv1: Vec::new(),
        palette_tris: Vec::new(),
        combined_tris: Default::default(),
        exact_tris: BTreeMap::new(),
        bakes: Vec::new(),
    }
    .run()
}

/// One axis-aligned sweep: which axis is swept, which two span the face
/// plane, and how the emitted quad is oriented.
struct SweepDir {
    sweep: usize,
    width: usize,
    height: usize,
    /// Sweep coordinate of the boundary slice, where faces are always
    /// exposed.
    limit: i32,
    normal: IVec3,
    face_offset: Vec3,
    /// Flip triangle winding so the face points along `normal`.
    invert: bool,
}

fn directions(extent: IVec3) -> [SweepDir; 6] {
    [
        SweepDir {
            sweep: 0,
            width: 1,
            height: 2,
            limit: 0,
            normal: IVec3::NEG_X,
            face_offset: Vec3::ZERO,
            invert: true,
        },
        SweepDir {
            sweep: 0,
            width: 1,
            height: 2,
            limit: extent.x - 1,
            normal: IVec3::X,
            face_offset: Vec3::X,
            invert: false,
        },
        SweepDir {
            sweep: 1,
            width: 0,
            height: 2,
            limit: 0,
            normal: IVec3::NEG_Y,
            face_offset: Vec3::ZERO,
            invert: false,
        },
        SweepDir {
            sweep: 1,
            width: 0,
            height: 2,
            limit: extent.y - 1,
            normal: IVec3::Y,
            face_offset: Vec3::Y,
            invert: true,
        },
        SweepDir {
            sweep: 2,
            width: 0,
            height: 1,
            limit: 0,
            normal: IVec3::NEG_Z,
            face_offset: Vec3::ZERO,
            invert: true,
        },
        SweepDir {
            sweep: 2,
            width: 0,
            height: 1,
            limit: extent.z - 1,
            normal: IVec3::Z,
            face_offset: Vec3::Z,
            invert: false,
        },
    ]
}

const UNIT_SQUARE: [Vec2; 4] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(0.0, 1.0),
];

struct Mesher<'a> {
    volume: &'a VoxelVolume,
    palette: &'a [Rgba; PALETTE_SIZE],
    materials: &'a MaterialTable,
    config: &'a MesherConfig,
    extent: IVec3,
    visited: Vec<bool>,

    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    uv0: Vec<Vec2>,
    uv1: Vec<Vec2>,

    palette_tris: Vec<u32>,
    combined_tris: [Vec<u32>; MaterialKind::COUNT],
    exact_tris: BTreeMap<u8, Vec<u32>>,
    bakes: Vec<BakeRequest>,
}

impl Mesher<'_> {
    fn run(mut self) -> MeshOutput {
        for dir in directions(self.extent) {
            self.sweep(&dir);
            self.visited.fill(false);
        }

        let mut submeshes = Vec::new();
        let palette_tris = std::mem::take(&mut self.palette_tris);
        if !palette_tris.is_empty() {
            submeshes.push(Submesh {
                key: SubmeshKey::Palette,
                indices: palette_tris,
            });
        }
        for kind in MaterialKind::ALL {
            let indices = std::mem::take(&mut self.combined_tris[kind.index()]);
            if !indices.is_empty() {
                submeshes.push(Submesh {
                    key: SubmeshKey::Combined(kind),
                    indices,
                });
            }
        }
        for (vox, indices) in std::mem::take(&mut self.exact_tris) {
            if !indices.is_empty() {
                submeshes.push(Submesh {
                    key: SubmeshKey::Material(vox),
                    indices,
                });
            }
        }

        MeshOutput {
            mesh: MeshDescriptor {
                positions: self.positions,
                normals: self.normals,
                uv0: self.uv0,
                uv1: self.uv1,
                submeshes,
            },
            bakes: self.bakes,
        }
    }

    fn sweep(&mut self, dir: &SweepDir) {
        for x in 0..self.extent.x {
            for y in 0..self.extent.y {
                for z in 0..self.extent.z {
                    self.process_cell(dir, IVec3::new(x, y, z));
                }
            }
        }
    }

    fn process_cell(&mut self, dir: &SweepDir, cell: IVec3) {
        let vox = self.volume.at(cell);
        if vox == 0 || self.visited[self.volume.index_of(cell)] {
            return;
        }
        let kind = self.materials.kind_of(vox);

        if self.config.bake_combined {
            let same_kind = |v: u8| self.materials.kind_of(v) == kind;

            let (uw, uh) = self.grow(dir, cell, false, &same_kind, kind);
            let (unlimited_switches, _) = self.region_stats(dir, cell, uw, uh);
            if unlimited_switches > self.config.unlimited_switches
                && rect_magnitude(uw, uh) > self.config.min_extent
            {
                self.emit_combined(dir, cell, uw, uh, vox, kind);
                return;
            }

            let (bw, bh) = self.grow(dir, cell, true, &same_kind, kind);
            let (bounded_switches, mismatch_ratio) = self.region_stats(dir, cell, bw, bh);
            if (bounded_switches > self.config.bounded_switches
                || mismatch_ratio > self.config.mismatch_ratio)
                && rect_magnitude(bw, bh) > self.config.min_extent
            {
                self.emit_combined(dir, cell, bw, bh, vox, kind);
                return;
            }
        }

        let (w, h) = self.grow(dir, cell, true, &|v| v == vox, kind);
        if w > 0 && h > 0 {
            self.emit_quad(dir, cell, w, h, vox, kind, false);
            self.mark_visited(dir, cell, w, h);
        }
    }

    /// Grow the largest rectangle of cells passing `eq`, anchored at
    /// `start`. Width is fixed by the first row; height growth stops at
    /// the first row whose achieved width differs, keeping the region
    /// perfectly rectangular. Returns zero when the starting cell itself
    /// fails, which for an exposure-checked tier means it is unexposed.
    fn grow(
        &self,
        dir: &SweepDir,
        start: IVec3,
        check_exposure: bool,
        eq: &dyn Fn(u8) -> bool,
        occluder: MaterialKind,
    ) -> (i32, i32) {
        let cols_max = self.extent[dir.width] - 1 - start[dir.width];
        let rows_max = self.extent[dir.height] - 1 - start[dir.height];
        let at_limit = start[dir.sweep] == dir.limit;

        let mut width = 0;
        let mut height = 0;
        while height <= rows_max {
            let mut w = 0;
            while w <= cols_max {
                let cell = offset_by(dir, start, w, height);
                let v = self.volume.at(cell);
                if v == 0 || self.visited[self.volume.index_of(cell)] || !eq(v) {
                    break;
                }
                if check_exposure && !at_limit {
                    let nv = self.volume.at(cell + dir.normal);
                    if nv != 0 && self.materials.kind_of(nv) == occluder {
                        break;
                    }
                }
                w += 1;
            }

            if width == 0 {
                width = w;
            }
            if width == 0 {
                break;
            }
            if w != width {
                break;
            }
            height += 1;
        }

        (width, height)
    }

    /// Voxel-id switch statistics over a rectangle: raw count of
    /// mismatching 4-neighbor pairs and the ratio against the maximum
    /// possible pairs.
    fn region_stats(&self, dir: &SweepDir, start: IVec3, w: i32, h: i32) -> (u32, f32) {
        let mut switches = 0u32;
        for y in 0..h {
            for x in 0..w {
                let v = self.volume.at(offset_by(dir, start, x, y));
                if x > 0 && v != self.volume.at(offset_by(dir, start, x - 1, y)) {
                    switches += 1;
                }
                if y > 0 && v != self.volume.at(offset_by(dir, start, x, y - 1)) {
                    switches += 1;
                }
            }
        }
        let max_switches = w * (h - 1) + (w - 1) * h;
        let ratio = if max_switches == 0 {
            0.0
        } else {
            switches as f32 / max_switches as f32
        };
        (switches, ratio)
    }

    fn emit_combined(&mut self, dir: &SweepDir, start: IVec3, w: i32, h: i32, vox: u8, kind: MaterialKind) {
        let first_vertex = self.emit_quad(dir, start, w, h, vox, kind, true);
        let color = self.bake_color(dir, start, w, h);
        let attributes =
            (kind == MaterialKind::Metal).then(|| self.bake_attributes(dir, start, w, h));
        self.bakes.push(BakeRequest {
            kind,
            first_vertex,
            color,
            attributes,
        });
        self.mark_visited(dir, start, w, h);
    }

    /// Append the quad's vertices and triangles; returns its first vertex
    /// index.
    fn emit_quad(
        &mut self,
        dir: &SweepDir,
        start: IVec3,
        w: i32,
        h: i32,
        vox: u8,
        kind: MaterialKind,
        combined: bool,
    ) -> u32 {
        let base = self.positions.len() as u32;

        let mut wvec = IVec3::ZERO;
        wvec[dir.width] = w;
        let mut hvec = IVec3::ZERO;
        hvec[dir.height] = h;

        let origin = -self.extent.as_vec3() / 2.0;
        let corner = start.as_vec3() + dir.face_offset + origin;
        let corners = [
            corner,
            corner + wvec.as_vec3(),
            corner + (wvec + hvec).as_vec3(),
            corner + hvec.as_vec3(),
        ];
        for c in corners {
            self.positions.push(c * self.config.scale);
            self.normals.push(dir.normal.as_vec3());
        }

        self.uv1.extend_from_slice(&UNIT_SQUARE);
        if combined {
            self.uv0.extend_from_slice(&UNIT_SQUARE);
        } else if kind == MaterialKind::Diffuse {
            // One epsilon-sized patch inside the palette cell of this id.
            let slot = (vox - 1) as u32;
            let u = (slot % PALETTE_COLUMNS) as f32 / PALETTE_COLUMNS as f32;
            let v = (slot / PALETTE_COLUMNS) as f32 / PALETTE_ROWS as f32;
            let eps = 1.0 / PALETTE_SIZE as f32;
            self.uv0.extend_from_slice(&[
                Vec2::new(u, v),
                Vec2::new(u + eps, v),
                Vec2::new(u + eps, v + eps),
                Vec2::new(u, v + eps),
            ]);
        } else {
            let (fw, fh) = (w as f32, h as f32);
            self.uv0.extend_from_slice(&[
                Vec2::ZERO,
                Vec2::new(fw, 0.0),
                Vec2::new(fw, fh),
                Vec2::new(0.0, fh),
            ]);
        }

        let order: [u32; 6] = if dir.invert {
            [0, 2, 1, 0, 3, 2]
        } else {
            [0, 1, 2, 0, 2, 3]
        };
        let bucket = if combined {
            &mut self.combined_tris[kind.index()]
        } else if kind == MaterialKind::Diffuse {
            &mut self.palette_tris
        } else {
            self.exact_tris.entry(vox).or_default()
        };
        bucket.extend(order.iter().map(|i| base + i));

        base
    }

    fn mark_visited(&mut self, dir: &SweepDir, start: IVec3, w: i32, h: i32) {
        for y in 0..h {
            for x in 0..w {
                let cell = offset_by(dir, start, x, y);
                self.visited[self.volume.index_of(cell)] = true;
            }
        }
    }

    /// One color pixel per covered voxel; row 0 of the rectangle lands at
    /// the image bottom so a v-up sampler sees the region upright.
    fn bake_color(&self, dir: &SweepDir, start: IVec3, w: i32, h: i32) -> RgbaImage {
        let mut image = RgbaImage::new(w as u32, h as u32);
        for y in 0..h {
            for x in 0..w {
                let v = self.volume.at(offset_by(dir, start, x, y));
                let color = if v == 0 {
                    Rgba::WHITE
                } else {
                    self.palette[(v - 1) as usize]
                };
                image.put_pixel(x as u32, (h - 1 - y) as u32, image::Rgba(color.to_array()));
            }
        }
        image
    }

    /// Metal shader channels per covered voxel; voxels without an imported
    /// material stay zero.
    fn bake_attributes(&self, dir: &SweepDir, start: IVec3, w: i32, h: i32) -> RgbaImage {
        let channel = |f: f32| (f.clamp(0.0, 1.0) * 255.0) as u8;
        let mut image = RgbaImage::new(w as u32, h as u32);
        for y in 0..h {
            for x in 0..w {
                let v = self.volume.at(offset_by(dir, start, x, y));
                let pixel = match (v != 0).then(|| self.materials.attrs_of(v)).flatten() {
                    Some(attrs) => [
                        channel(attrs.metallic()),
                        channel(attrs.specular_level()),
                        channel(attrs.refraction()),
                        channel(attrs.smoothness()),
                    ],
                    None => [0; 4],
                };
                image.put_pixel(x as u32, (h - 1 - y) as u32, image::Rgba(pixel));
            }
        }
        image
    }
}

fn offset_by(dir: &SweepDir, base: IVec3, w: i32, h: i32) -> IVec3 {
    let mut p = base;
    p[dir.width] += w;
    p[dir.height] += h;
    p
}

fn rect_magnitude(w: i32, h: i32) -> f32 {
    Vec2::new(w as f32, h as f32).length()
}

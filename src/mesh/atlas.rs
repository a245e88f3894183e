//! Texture atlas baking
//!
//! Collaborator boundary of the mesher: the rectangle images produced by
//! the combined tiers are shelf-packed into one atlas per material kind,
//! and the unit-square UVs recorded by each bake request are remapped
//! through the returned placement rects. The packing itself is
//! deliberately simple; what the mesher relies on is no overlap, source
//! pixel dimensions preserved exactly, and an exact affine UV remap.

use glam::Vec2;
use image::RgbaImage;

use crate::mesh::descriptor::{BakeRequest, MeshDescriptor};
use crate::vox::material::MaterialKind;

/// Pixels kept free between packed images.
const PADDING: u32 = 1;

/// Normalized placement of one packed image inside its atlas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacementRect {
    pub min: Vec2,
    pub size: Vec2,
}

impl PlacementRect {
    /// Map a unit-square UV into this rect.
    pub fn remap(&self, uv: Vec2) -> Vec2 {
        self.min + uv * self.size
    }
}

/// One packed atlas: the color sheet, the attribute sheet when any source
/// carried one, and where each source landed.
#[derive(Debug)]
pub struct Atlas {
    pub kind: MaterialKind,
    pub color: RgbaImage,
    pub attributes: Option<RgbaImage>,
    /// Placement per packed request, in the order the requests appear in
    /// the bake list (filtered to this kind).
    pub placements: Vec<PlacementRect>,
}

/// Pack every bake request into one atlas per material kind and remap the
/// combined-quad UVs of `mesh` in place. Returns the atlases in material-
/// kind order; kinds with no requests produce none.
pub fn bake_atlases(mesh: &mut MeshDescriptor, bakes: &[BakeRequest]) -> Vec<Atlas> {
    let mut atlases = Vec::new();
    for kind in MaterialKind::ALL {
        let requests: Vec<&BakeRequest> = bakes.iter().filter(|b| b.kind == kind).collect();
        if requests.is_empty() {
            continue;
        }

        let atlas = pack(kind, &requests);
        for (request, rect) in requests.iter().zip(&atlas.placements) {
            let first = request.first_vertex as usize;
            for uv in &mut mesh.uv0[first..first + 4] {
                *uv = rect.remap(*uv);
            }
        }
        atlases.push(atlas);
    }
    atlases
}

/// Shelf-pack one kind's images: tallest first, rows filled left to right,
/// atlas dimensions rounded up to powers of two.
fn pack(kind: MaterialKind, requests: &[&BakeRequest]) -> Atlas {
    let mut order: Vec<usize> = (0..requests.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(requests[i].color.height()));

    let total_area: u32 = requests
        .iter()
        .map(|r| (r.color.width() + PADDING) * (r.color.height() + PADDING))
        .sum();
    let max_width = requests.iter().map(|r| r.color.width()).max().unwrap_or(1);
    let side = (total_area as f32).sqrt().ceil() as u32;
    let atlas_width = side.max(max_width + PADDING).next_power_of_two();

    // Pixel offsets per request, assigned shelf by shelf.
    let mut offsets = vec![(0u32, 0u32); requests.len()];
    let mut x = 0;
    let mut y = 0;
    let mut shelf_height = 0;
    for &i in &order {
        let (w, h) = requests[i].color.dimensions();
        if x > 0 && x + w > atlas_width {
            x = 0;
            y += shelf_height + PADDING;
            shelf_height = 0;
        }
        offsets[i] = (x, y);
        shelf_height = shelf_height.max(h);
        x += w + PADDING;
    }
    let atlas_height = (y + shelf_height).next_power_of_two();

    let mut color = RgbaImage::new(atlas_width, atlas_height);
    for (request, &(ox, oy)) in requests.iter().zip(&offsets) {
        blit(&mut color, &request.color, ox, oy);
    }

    let attributes = if requests.iter().any(|r| r.attributes.is_some()) {
        let mut sheet = RgbaImage::new(atlas_width, atlas_height);
        for (request, &(ox, oy)) in requests.iter().zip(&offsets) {
            if let Some(image) = &request.attributes {
                blit(&mut sheet, image, ox, oy);
            }
        }
        Some(sheet)
    } else {
        None
    };

    let placements = requests
        .iter()
        .zip(&offsets)
        .map(|(request, &(ox, oy))| {
            let (w, h) = request.color.dimensions();
            PlacementRect {
                // Pixel rows count down from the top; UV space counts up.
                min: Vec2::new(
                    ox as f32 / atlas_width as f32,
                    1.0 - (oy + h) as f32 / atlas_height as f32,
                ),
                size: Vec2::new(
                    w as f32 / atlas_width as f32,
                    h as f32 / atlas_height as f32,
                ),
            }
        })
        .collect();

    Atlas {
        kind,
        color,
        attributes,
        placements,
    }
}

fn blit(target: &mut RgbaImage, source: &RgbaImage, ox: u32, oy: u32) {
    for (x, y, pixel) in source.enumerate_pixels() {
        target.put_pixel(ox + x, oy + y, *pixel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::descriptor::MeshDescriptor;

    fn filled(w: u32, h: u32, value: u8) -> RgbaImage {
        RgbaImage::from_pixel(w, h, image::Rgba([value, value, value, 255]))
    }

    fn request(kind: MaterialKind, first_vertex: u32, image: RgbaImage) -> BakeRequest {
        BakeRequest {
            kind,
            first_vertex,
            color: image,
            attributes: None,
        }
    }

    fn unit_quad_mesh(quads: usize) -> MeshDescriptor {
        MeshDescriptor {
            uv0: (0..quads)
                .flat_map(|_| {
                    [
                        Vec2::new(0.0, 0.0),
                        Vec2::new(1.0, 0.0),
                        Vec2::new(1.0, 1.0),
                        Vec2::new(0.0, 1.0),
                    ]
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_remap_is_exact_affine() {
        let rect = PlacementRect {
            min: Vec2::new(0.25, 0.5),
            size: Vec2::new(0.5, 0.25),
        };
        assert_eq!(rect.remap(Vec2::ZERO), rect.min);
        assert_eq!(rect.remap(Vec2::ONE), rect.min + rect.size);
        assert_eq!(rect.remap(Vec2::new(0.5, 0.5)), Vec2::new(0.5, 0.625));
    }

    #[test]
    fn test_pack_preserves_dimensions_and_pixels() {
        let mut mesh = unit_quad_mesh(2);
        let bakes = vec![
            request(MaterialKind::Diffuse, 0, filled(16, 4, 10)),
            request(MaterialKind::Diffuse, 4, filled(8, 8, 200)),
        ];
        let atlases = bake_atlases(&mut mesh, &bakes);
        assert_eq!(atlases.len(), 1);

        let atlas = &atlases[0];
        assert_eq!(atlas.placements.len(), 2);
        for (i, rect) in atlas.placements.iter().enumerate() {
            let (w, h) = bakes[i].color.dimensions();
            // Placement size corresponds to the unscaled source dimensions.
            let aw = atlas.color.width() as f32;
            let ah = atlas.color.height() as f32;
            assert_eq!(rect.size.x * aw, w as f32);
            assert_eq!(rect.size.y * ah, h as f32);

            // The packed pixels match the source.
            let px = (rect.min.x * aw) as u32;
            let py = ah as u32 - (rect.min.y * ah) as u32 - h;
            assert_eq!(atlas.color.get_pixel(px, py), bakes[i].color.get_pixel(0, 0));
        }
    }

    #[test]
    fn test_no_overlap() {
        let mut mesh = unit_quad_mesh(4);
        let bakes: Vec<BakeRequest> = [(16u32, 4u32), (8, 8), (4, 4), (12, 2)]
            .iter()
            .enumerate()
            .map(|(i, &(w, h))| request(MaterialKind::Diffuse, i as u32 * 4, filled(w, h, 255)))
            .collect();
        let atlases = bake_atlases(&mut mesh, &bakes);
        let atlas = &atlases[0];

        let aw = atlas.color.width() as f32;
        let ah = atlas.color.height() as f32;
        let spans: Vec<(u32, u32, u32, u32)> = atlas
            .placements
            .iter()
            .enumerate()
            .map(|(i, rect)| {
                let (w, h) = bakes[i].color.dimensions();
                let x = (rect.min.x * aw) as u32;
                let y = ah as u32 - (rect.min.y * ah) as u32 - h;
                (x, y, w, h)
            })
            .collect();

        for (i, &(ax, ay, aw, ah)) in spans.iter().enumerate() {
            for &(bx, by, bw, bh) in &spans[i + 1..] {
                let disjoint = ax + aw <= bx || bx + bw <= ax || ay + ah <= by || by + bh <= ay;
                assert!(disjoint, "placements overlap");
            }
        }
    }

    #[test]
    fn test_uv_rewrite_lands_in_rect() {
        let mut mesh = unit_quad_mesh(2);
        let bakes = vec![
            request(MaterialKind::Diffuse, 0, filled(16, 16, 1)),
            request(MaterialKind::Metal, 4, filled(8, 8, 2)),
        ];
        let atlases = bake_atlases(&mut mesh, &bakes);
        assert_eq!(atlases.len(), 2);
        assert_eq!(atlases[0].kind, MaterialKind::Diffuse);
        assert_eq!(atlases[1].kind, MaterialKind::Metal);

        // Each quad's UVs now span exactly its placement rect.
        let rect = atlases[0].placements[0];
        assert_eq!(mesh.uv0[0], rect.min);
        assert_eq!(mesh.uv0[2], rect.min + rect.size);
        let rect = atlases[1].placements[0];
        assert_eq!(mesh.uv0[4], rect.min);
        assert_eq!(mesh.uv0[6], rect.min + rect.size);
    }

    #[test]
    fn test_attribute_sheet_packs_alongside_color() {
        let mut mesh = unit_quad_mesh(2);
        let bakes = vec![
            BakeRequest {
                kind: MaterialKind::Metal,
                first_vertex: 0,
                color: filled(4, 4, 50),
                attributes: Some(filled(4, 4, 99)),
            },
            request(MaterialKind::Metal, 4, filled(4, 4, 60)),
        ];
        let atlases = bake_atlases(&mut mesh, &bakes);
        let atlas = &atlases[0];
        let sheet = atlas.attributes.as_ref().expect("attribute sheet missing");
        assert_eq!(sheet.dimensions(), atlas.color.dimensions());

        let aw = atlas.color.width() as f32;
        let ah = atlas.color.height() as f32;
        let rect = atlas.placements[0];
        let x = (rect.min.x * aw) as u32;
        let y = ah as u32 - (rect.min.y * ah) as u32 - 4;
        assert_eq!(sheet.get_pixel(x, y)[0], 99);
    }
}

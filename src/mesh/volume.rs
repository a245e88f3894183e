//! Dense voxel volume
//!
//! A volume is a dense 3D grid of palette indices built from the sparse
//! point list of a model chunk. Index 0 is empty space; 1..=255 address
//! palette slots. One volume is owned by exactly one mesher invocation.

use glam::{IVec3, UVec3};

use crate::core::ValidationError;

/// Largest allowed edge of a volume on any axis.
pub const MAX_EDGE: u32 = 256;

/// Dense 3D grid of palette indices, laid out `x + nx * (y + ny * z)`.
pub struct VoxelVolume {
    extent: UVec3,
    cells: Vec<u8>,
}

impl std::fmt::Debug for VoxelVolume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoxelVolume")
            .field("extent", &self.extent)
            .field("cells", &self.cells.len())
            .finish()
    }
}

impl VoxelVolume {
    /// Allocate an empty volume. Extents above [`MAX_EDGE`] are rejected.
    pub fn new(extent: UVec3) -> Result<Self, ValidationError> {
        for value in [extent.x, extent.y, extent.z] {
            if value > MAX_EDGE {
                return Err(ValidationError::OutOfRange {
                    what: "volume extent",
                    value,
                    max: MAX_EDGE,
                });
            }
        }
        Ok(Self {
            extent,
            cells: vec![0; (extent.x * extent.y * extent.z) as usize],
        })
    }

    /// Build a volume from an ordered point list `[x, y, z, index]`.
    ///
    /// Writes land in list order, so a later duplicate coordinate wins.
    /// Any coordinate outside the extent, or an index outside 1..=255,
    /// fails the whole shape.
    pub fn from_points(
        extent: UVec3,
        points: impl IntoIterator<Item = [u32; 4]>,
    ) -> Result<Self, ValidationError> {
        let mut volume = Self::new(extent)?;
        for [x, y, z, index] in points {
            for (value, max) in [(x, extent.x), (y, extent.y), (z, extent.z)] {
                if value >= max {
                    return Err(ValidationError::OutOfRange {
                        what: "voxel coordinate",
                        value,
                        max: max.saturating_sub(1),
                    });
                }
            }
            if index == 0 || index > 255 {
                return Err(ValidationError::OutOfRange {
                    what: "voxel index",
                    value: index,
                    max: 255,
                });
            }
            let slot = volume.offset(x, y, z);
            volume.cells[slot] = index as u8;
        }
        Ok(volume)
    }

    pub fn extent(&self) -> UVec3 {
        self.extent
    }

    fn offset(&self, x: u32, y: u32, z: u32) -> usize {
        (x + self.extent.x * (y + self.extent.y * z)) as usize
    }

    /// Cell value at an in-bounds position.
    pub fn at(&self, p: IVec3) -> u8 {
        debug_assert!(self.contains(p), "{p} outside {}", self.extent);
        self.cells[self.offset(p.x as u32, p.y as u32, p.z as u32)]
    }

    /// Whether a position lies inside the volume.
    pub fn contains(&self, p: IVec3) -> bool {
        p.cmpge(IVec3::ZERO).all() && p.cmplt(self.extent.as_ivec3()).all()
    }

    /// Linear cell index of an in-bounds position; also addresses the
    /// mesher's visited bitmap.
    pub fn index_of(&self, p: IVec3) -> usize {
        debug_assert!(self.contains(p), "{p} outside {}", self.extent);
        self.offset(p.x as u32, p.y as u32, p.z as u32)
    }

    /// Cell count of the dense grid.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

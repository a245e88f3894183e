//! Material kinds and per-slot attributes
//!
//! A `MATL` chunk assigns one palette slot a physical class plus a sparse
//! set of numeric fields. The mesher partitions faces by class; the baker
//! turns metal attributes into shader-facing mask channels.

use crate::core::ValidationError;

/// Physical material classes carried by the container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MaterialKind {
    #[default]
    Diffuse,
    Metal,
    Glass,
    Emissive,
}

impl MaterialKind {
    /// Number of material classes.
    pub const COUNT: usize = 4;

    /// All classes in bucket order.
    pub const ALL: [MaterialKind; Self::COUNT] = [
        MaterialKind::Diffuse,
        MaterialKind::Metal,
        MaterialKind::Glass,
        MaterialKind::Emissive,
    ];

    /// Wire value of the `_type` dictionary key.
    pub fn type_value(self) -> &'static str {
        match self {
            MaterialKind::Diffuse => "_diffuse",
            MaterialKind::Metal => "_metal",
            MaterialKind::Glass => "_glass",
            MaterialKind::Emissive => "_emit",
        }
    }

    /// Parse a `_type` dictionary value.
    pub fn from_type_value(value: &str) -> Option<Self> {
        Some(match value {
            "_diffuse" => MaterialKind::Diffuse,
            "_metal" => MaterialKind::Metal,
            "_glass" => MaterialKind::Glass,
            "_emit" => MaterialKind::Emissive,
            _ => return None,
        })
    }

    /// Human-readable name used for submesh bucket labels.
    pub fn label(self) -> &'static str {
        match self {
            MaterialKind::Diffuse => "diffuse",
            MaterialKind::Metal => "metal",
            MaterialKind::Glass => "glass",
            MaterialKind::Emissive => "emissive",
        }
    }

    /// Position in [`Self::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Sparse numeric fields of a material chunk.
///
/// Every field defaults to zero and is emitted on the wire only when
/// non-zero.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MaterialAttrs {
    pub roughness: f32,
    pub ior: f32,
    pub specular: f32,
    pub metal: f32,
    pub emission: f32,
    pub flux: f32,
    pub low_dynamic_range: f32,
    pub alpha: f32,
    pub transparency: f32,
    pub density: f32,
}

impl MaterialAttrs {
    /// Metallic channel of the baked attribute mask.
    pub fn metallic(&self) -> f32 {
        self.metal
    }

    /// Specular level channel; the wire value is biased by one.
    pub fn specular_level(&self) -> f32 {
        (self.specular - 1.0).clamp(0.0, 1.0)
    }

    /// Index-of-refraction channel, remapped into [0, 1].
    pub fn refraction(&self) -> f32 {
        ((1.0 + self.ior) / 3.0).clamp(0.0, 1.0)
    }

    /// Smoothness channel, the inverse of roughness.
    pub fn smoothness(&self) -> f32 {
        (1.0 - self.roughness).clamp(0.0, 1.0)
    }
}

/// Per-palette-slot material assignments for one asset.
///
/// Slots without an imported non-diffuse material read as plain diffuse
/// with no attributes.
#[derive(Clone, Debug)]
pub struct MaterialTable {
    slots: [Option<(MaterialKind, MaterialAttrs)>; 256],
}

impl Default for MaterialTable {
    fn default() -> Self {
        Self { slots: [None; 256] }
    }
}

impl MaterialTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a material to palette id `id` (1-based, up to 256).
    pub fn set(
        &mut self,
        id: u32,
        kind: MaterialKind,
        attrs: MaterialAttrs,
    ) -> Result<(), ValidationError> {
        if id == 0 || id > 256 {
            return Err(ValidationError::OutOfRange {
                what: "material id",
                value: id,
                max: 256,
            });
        }
        self.slots[(id - 1) as usize] = Some((kind, attrs));
        Ok(())
    }

    /// Material class of a voxel id; diffuse when nothing was imported.
    pub fn kind_of(&self, voxel: u8) -> MaterialKind {
        debug_assert!(voxel != 0);
        self.slots[(voxel - 1) as usize]
            .map(|(kind, _)| kind)
            .unwrap_or_default()
    }

    /// Attributes of a voxel id, when a material was imported for it.
    pub fn attrs_of(&self, voxel: u8) -> Option<&MaterialAttrs> {
        debug_assert!(voxel != 0);
        self.slots[(voxel - 1) as usize]
            .as_ref()
            .map(|(_, attrs)| attrs)
    }

    /// Whether palette id `voxel` carries an imported material.
    pub fn has_material(&self, voxel: u8) -> bool {
        debug_assert!(voxel != 0);
        self.slots[(voxel - 1) as usize].is_some()
    }
}

//! Meshing policy
//!
//! The combined-tier thresholds were tuned empirically in the format's
//! reference importer. They are policy, not invariants, so they live here
//! as plain config fields and can be loaded from JSON.

use serde::{Deserialize, Serialize};

/// Policy knobs for the greedy mesher.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MesherConfig {
    /// Merge across voxel colors within one material kind, baking the
    /// covered colors to a texture. When off, only exact-voxel merging
    /// runs.
    pub bake_combined: bool,
    /// World size of one voxel.
    pub scale: f32,
    /// Tier-1 threshold: raw id-switch count an unconstrained region must
    /// exceed to merge.
    pub unlimited_switches: u32,
    /// Tier-2 threshold: raw id-switch count an exposure-bounded region
    /// must exceed to merge.
    pub bounded_switches: u32,
    /// Tier-2 alternative: mismatching 4-neighbor ratio the region must
    /// exceed to merge.
    pub mismatch_ratio: f32,
    /// Minimum `(width, height)` diagonal for either combined tier.
    pub min_extent: f32,
}

impl Default for MesherConfig {
    fn default() -> Self {
        Self {
            bake_combined: false,
            scale: 1.0,
            unlimited_switches: 256,
            bounded_switches: 128,
            mismatch_ratio: 0.25,
            min_extent: 8.0,
        }
    }
}

impl MesherConfig {
    /// Default policy with combined baking switched on.
    pub fn with_combined() -> Self {
        Self {
            bake_combined: true,
            ..Default::default()
        }
    }
}

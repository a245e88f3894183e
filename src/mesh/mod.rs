//! Volume building and surface meshing

pub mod atlas;
pub mod config;
pub mod descriptor;
pub mod mesher;
pub mod volume;

pub use config::MesherConfig;
pub use descriptor::{BakeRequest, MeshDescriptor, Submesh, SubmeshKey};
pub use mesher::{MeshOutput, mesh_volume};
pub use volume::VoxelVolume;

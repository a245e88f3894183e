//! Chunked voxel container codec
//!
//! The container is a header (magic + version) followed by one root chunk
//! whose subtree holds everything else: model extents and point lists,
//! palette and materials, scene nodes, and render settings. See [`chunk`]
//! for the framing rules and [`VoxAsset`] for the entry points.

pub mod chunk;
pub mod dict;
pub mod material;
pub mod palette;
pub mod rotation;
pub mod scene;
pub mod stream;
pub mod tag;

pub use chunk::{Body, Chunk};
pub use stream::Diagnostic;
pub use tag::ChunkTag;

use std::path::Path;

use crate::core::{FormatError, Result};
use stream::{ByteReader, ByteWriter};

/// Container magic: `"VOX "` little-endian.
pub const MAGIC: u32 = tag::fourcc(b"VOX ");

/// Container version this crate writes.
pub const VERSION: i32 = 150;

/// A decoded container: version, chunk tree, and the non-fatal events
/// recovered while reading it.
#[derive(Debug)]
pub struct VoxAsset {
    pub version: i32,
    pub root: Chunk,
    pub diagnostics: Vec<Diagnostic>,
}

impl VoxAsset {
    /// Wrap a chunk tree for encoding at the current version.
    pub fn new(root: Chunk) -> Self {
        Self {
            version: VERSION,
            root,
            diagnostics: Vec::new(),
        }
    }

    /// Decode a container from memory.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(bytes);

        let magic = r.read_u32()?;
        if magic != MAGIC {
            return Err(FormatError::BadMagic(magic).into());
        }
        let version = r.read_i32()?;

        let mut diagnostics = Vec::new();
        let root = Chunk::decode(&mut r, &mut diagnostics)?;
        Ok(Self {
            version,
            root,
            diagnostics,
        })
    }

    /// Read and decode a container file.
    pub fn decode_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::decode(&bytes)
    }

    /// Encode the container. All declared lengths are recomputed from the
    /// chunk tree as it stands now.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut w = ByteWriter::new();
        w.write_u32(MAGIC);
        w.write_i32(self.version);
        self.root.encode(&mut w)?;
        Ok(w.into_inner())
    }

    /// Encode the container and write it to a file.
    pub fn encode_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.encode()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

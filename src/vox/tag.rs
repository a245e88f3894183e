//! Chunk type tags
//!
//! Every record in the container starts with a 4-byte ASCII tag. The tag set
//! is closed: legacy `MATT` materials are recognized but refused, and any
//! other unlisted tag aborts the decode.

use crate::core::FormatError;

/// Pack a 4-byte ASCII tag into its little-endian integer form.
pub const fn fourcc(bytes: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*bytes)
}

const MAIN: u32 = fourcc(b"MAIN");
const PACK: u32 = fourcc(b"PACK");
const SIZE: u32 = fourcc(b"SIZE");
const XYZI: u32 = fourcc(b"XYZI");
const NTRN: u32 = fourcc(b"nTRN");
const NGRP: u32 = fourcc(b"nGRP");
const NSHP: u32 = fourcc(b"nSHP");
const LAYR: u32 = fourcc(b"LAYR");
const RGBA: u32 = fourcc(b"RGBA");
const MATT: u32 = fourcc(b"MATT");
const MATL: u32 = fourcc(b"MATL");
const RLIT: u32 = fourcc(b"rLIT");
const RAIR: u32 = fourcc(b"rAIR");
const RLEN: u32 = fourcc(b"rLEN");
const POST: u32 = fourcc(b"POST");
const RDIS: u32 = fourcc(b"rDIS");
const ROBJ: u32 = fourcc(b"rOBJ");
const RCAM: u32 = fourcc(b"rCAM");
const NOTE: u32 = fourcc(b"NOTE");
const IMAP: u32 = fourcc(b"IMAP");

/// Identifies one chunk variant in the container tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChunkTag {
    /// `MAIN` container root
    Main,
    /// `PACK` model count
    Pack,
    /// `SIZE` volume extent
    Size,
    /// `XYZI` voxel point list
    Voxels,
    /// `nTRN` transform node
    Transform,
    /// `nGRP` group node
    Group,
    /// `nSHP` shape node
    Shape,
    /// `LAYR` layer
    Layer,
    /// `RGBA` 256-entry palette
    Palette,
    /// `MATL` typed key-value material
    Material,
    /// `rLIT` lighting
    Lighting,
    /// `rAIR` atmosphere
    Atmosphere,
    /// `rLEN` lens
    Lens,
    /// `POST` post-process
    Post,
    /// `rDIS` view / background
    View,
    /// `rOBJ` render object
    RenderObject,
    /// `rCAM` render camera
    RenderCamera,
    /// `NOTE` annotation
    Note,
    /// `IMAP` palette index map
    IndexMap,
}

impl ChunkTag {
    /// Map a raw tag value to its variant.
    pub fn from_raw(raw: u32) -> Result<Self, FormatError> {
        Ok(match raw {
            MAIN => Self::Main,
            PACK => Self::Pack,
            SIZE => Self::Size,
            XYZI => Self::Voxels,
            NTRN => Self::Transform,
            NGRP => Self::Group,
            NSHP => Self::Shape,
            LAYR => Self::Layer,
            RGBA => Self::Palette,
            MATT => return Err(FormatError::LegacyMaterial),
            MATL => Self::Material,
            RLIT => Self::Lighting,
            RAIR => Self::Atmosphere,
            RLEN => Self::Lens,
            POST => Self::Post,
            RDIS => Self::View,
            ROBJ => Self::RenderObject,
            RCAM => Self::RenderCamera,
            NOTE => Self::Note,
            IMAP => Self::IndexMap,
            _ => {
                return Err(FormatError::UnknownTag {
                    raw,
                    fourcc: fourcc_string(raw),
                });
            }
        })
    }

    /// Raw little-endian tag value.
    pub fn raw(self) -> u32 {
        match self {
            Self::Main => MAIN,
            Self::Pack => PACK,
            Self::Size => SIZE,
            Self::Voxels => XYZI,
            Self::Transform => NTRN,
            Self::Group => NGRP,
            Self::Shape => NSHP,
            Self::Layer => LAYR,
            Self::Palette => RGBA,
            Self::Material => MATL,
            Self::Lighting => RLIT,
            Self::Atmosphere => RAIR,
            Self::Lens => RLEN,
            Self::Post => POST,
            Self::View => RDIS,
            Self::RenderObject => ROBJ,
            Self::RenderCamera => RCAM,
            Self::Note => NOTE,
            Self::IndexMap => IMAP,
        }
    }

    /// Four-character tag name, e.g. `"XYZI"`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Main => "MAIN",
            Self::Pack => "PACK",
            Self::Size => "SIZE",
            Self::Voxels => "XYZI",
            Self::Transform => "nTRN",
            Self::Group => "nGRP",
            Self::Shape => "nSHP",
            Self::Layer => "LAYR",
            Self::Palette => "RGBA",
            Self::Material => "MATL",
            Self::Lighting => "rLIT",
            Self::Atmosphere => "rAIR",
            Self::Lens => "rLEN",
            Self::Post => "POST",
            Self::View => "rDIS",
            Self::RenderObject => "rOBJ",
            Self::RenderCamera => "rCAM",
            Self::Note => "NOTE",
            Self::IndexMap => "IMAP",
        }
    }
}

/// Render an arbitrary raw tag for error reporting; non-printable bytes show
/// as `.`.
fn fourcc_string(raw: u32) -> String {
    raw.to_le_bytes()
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}

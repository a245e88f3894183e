//! Error types for the voxmesh crate

use thiserror::Error;

/// Errors raised while framing or parsing the binary container.
///
/// Everything here is fatal to the whole decode except realignment, which is
/// recovered in place and surfaced as a [`crate::vox::Diagnostic`] instead.
#[derive(Debug, Error, PartialEq)]
pub enum FormatError {
    #[error("bad magic {0:#010x}")]
    BadMagic(u32),

    #[error("unsupported chunk tag {fourcc:?} ({raw:#010x})")]
    UnknownTag { raw: u32, fourcc: String },

    #[error("legacy material chunks are not supported")]
    LegacyMaterial,

    #[error("unexpected end of input at offset {0}")]
    UnexpectedEof(usize),

    #[error("invalid key {key:?} in {chunk} dictionary")]
    UnknownKey { chunk: &'static str, key: String },

    #[error("malformed {what} value {value:?}")]
    BadValue { what: &'static str, value: String },

    #[error("string is not ASCII")]
    NonAscii,
}

/// Errors raised when decoded content is outside its declared bounds.
///
/// Fatal to the current shape only; the import pipeline skips the shape and
/// keeps going.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{what} {value} out of range (max {max})")]
    OutOfRange {
        what: &'static str,
        value: u32,
        max: u32,
    },

    #[error("scene node index {index} out of range (len {len})")]
    NodeIndex { index: usize, len: usize },
}

/// Encode-side self-check failures.
///
/// A declared size that disagrees with the bytes a body writer actually
/// emitted is a codec bug, not bad input, and must never be masked.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsistencyError {
    #[error("{tag} declared body size {declared} but wrote {written} bytes")]
    BodySize {
        tag: &'static str,
        declared: usize,
        written: usize,
    },
}

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("consistency error: {0}")]
    Consistency(#[from] ConsistencyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

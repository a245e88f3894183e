//! Core types and utilities: errors and logging

pub mod error;
pub mod logging;

pub use error::{ConsistencyError, Error, FormatError, Result, ValidationError};

//! Property dictionaries and their textual value codecs
//!
//! Several chunk variants store optional fields as a count-prefixed list of
//! `(ASCII key, ASCII value)` pairs. Values are space-separated,
//! locale-invariant decimal text. Integers round-trip exactly; floats
//! round-trip through Rust's shortest `Display` form (value equality, not
//! byte equality, for text produced by other writers).

use glam::{Vec2, Vec3};

use crate::core::FormatError;
use crate::vox::palette::Rgba;
use crate::vox::stream::{ByteReader, ByteWriter};

/// Wire size of one dictionary entry: two length prefixes plus the text.
pub fn entry_size(key: &str, value: &str) -> usize {
    2 * 4 + key.len() + value.len()
}

/// Write one `(key, value)` entry.
pub fn write_entry(w: &mut ByteWriter, key: &str, value: &str) {
    w.write_string(key);
    w.write_string(value);
}

/// Read one `(key, value)` entry.
pub fn read_entry(r: &mut ByteReader) -> Result<(String, String), FormatError> {
    let key = r.read_string()?;
    let value = r.read_string()?;
    Ok((key, value))
}

pub fn parse_int(value: &str) -> Result<i32, FormatError> {
    value.parse().map_err(|_| FormatError::BadValue {
        what: "integer",
        value: value.to_string(),
    })
}

pub fn fmt_int(value: i32) -> String {
    value.to_string()
}

/// Booleans travel as `0` / `1`; any non-zero integer reads as true.
pub fn parse_bool(value: &str) -> Result<bool, FormatError> {
    Ok(parse_int(value)? != 0)
}

pub fn fmt_bool(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

pub fn parse_float(value: &str) -> Result<f32, FormatError> {
    value.parse().map_err(|_| FormatError::BadValue {
        what: "float",
        value: value.to_string(),
    })
}

pub fn fmt_float(value: f32) -> String {
    value.to_string()
}

fn split_floats<const N: usize>(value: &str, what: &'static str) -> Result<[f32; N], FormatError> {
    let mut out = [0.0; N];
    let mut parts = value.split(' ');
    for slot in &mut out {
        let part = parts.next().ok_or(FormatError::BadValue {
            what,
            value: value.to_string(),
        })?;
        *slot = parse_float(part)?;
    }
    Ok(out)
}

pub fn parse_vec2(value: &str) -> Result<Vec2, FormatError> {
    let [x, y] = split_floats(value, "vec2")?;
    Ok(Vec2::new(x, y))
}

pub fn fmt_vec2(v: Vec2) -> String {
    format!("{} {}", v.x, v.y)
}

pub fn parse_vec3(value: &str) -> Result<Vec3, FormatError> {
    let [x, y, z] = split_floats(value, "vec3")?;
    Ok(Vec3::new(x, y, z))
}

pub fn fmt_vec3(v: Vec3) -> String {
    format!("{} {} {}", v.x, v.y, v.z)
}

/// Colors travel as `r g b`; alpha is forced to 255 on read.
pub fn parse_rgb(value: &str) -> Result<Rgba, FormatError> {
    let mut channels = [0u8; 3];
    let mut parts = value.split(' ');
    for slot in &mut channels {
        let part = parts.next().ok_or(FormatError::BadValue {
            what: "color",
            value: value.to_string(),
        })?;
        *slot = part.parse().map_err(|_| FormatError::BadValue {
            what: "color",
            value: value.to_string(),
        })?;
    }
    Ok(Rgba::new(channels[0], channels[1], channels[2], 255))
}

pub fn fmt_rgb(c: Rgba) -> String {
    format!("{} {} {}", c.r, c.g, c.b)
}

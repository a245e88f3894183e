//! Orientation codecs for transform frames
//!
//! Two mutually incompatible encodings of the `_r` value exist in the wild:
//! an enumerated Euler-angle lookup used by old writers, and the
//! signed-permutation-matrix form used from container version 200 on. They
//! are selected by the file version, never mixed. The raw integer is kept
//! on the decoded frame so re-encoding is byte-exact either way.

use glam::{Mat3, Vec3};

use crate::core::FormatError;
use crate::vox::stream::Diagnostic;

/// First container version whose `_r` values are permutation matrices.
pub const MATRIX_ROTATION_VERSION: i32 = 200;

/// Decoded orientation of a transform frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Orientation {
    /// Legacy decode: Euler angles in degrees plus a per-axis mirror.
    Euler { angles: Vec3, mirror: Vec3 },
    /// Signed permutation of the coordinate axes.
    Matrix(Mat3),
}

impl Orientation {
    pub const IDENTITY: Orientation = Orientation::Euler {
        angles: Vec3::ZERO,
        mirror: Vec3::ONE,
    };
}

const MIRROR_X: i32 = 1 << 4;
const MIRROR_Z: i32 = 1 << 5;
const MIRROR_Y: i32 = 1 << 6;

/// Low-nibble lookup of the legacy codec. Entries are
/// `(code, angles, flips the mirror)`; codes absent here decode as
/// identity with a diagnostic.
const EULER_TABLE: [(i32, Vec3, bool); 6] = [
    (0b0001, Vec3::new(180.0, 0.0, 90.0), false),
    (0b0010, Vec3::new(90.0, 90.0, 0.0), true),
    (0b0100, Vec3::new(0.0, 0.0, 0.0), true),
    (0b0110, Vec3::new(180.0, -90.0, 0.0), false),
    (0b1000, Vec3::new(-90.0, -180.0, 0.0), false),
    (0b1001, Vec3::new(-90.0, 0.0, -90.0), true),
];

/// Decode an `_r` value with the codec the container version selects.
pub fn decode_rotation(
    raw: i32,
    version: i32,
    diags: &mut Vec<Diagnostic>,
) -> Result<Orientation, FormatError> {
    if version >= MATRIX_ROTATION_VERSION {
        decode_matrix(raw).map(Orientation::Matrix)
    } else {
        Ok(decode_euler(raw, diags))
    }
}

/// Legacy codec: bits 4..=6 are per-axis keep-sign flags (clear means
/// mirrored), the low nibble selects an Euler triple.
pub fn decode_euler(raw: i32, diags: &mut Vec<Diagnostic>) -> Orientation {
    let mut mirror = Vec3::new(
        if raw & MIRROR_X != 0 { 1.0 } else { -1.0 },
        if raw & MIRROR_Y != 0 { 1.0 } else { -1.0 },
        if raw & MIRROR_Z != 0 { 1.0 } else { -1.0 },
    );

    let code = raw & 0b1111;
    let mut angles = Vec3::ZERO;
    match EULER_TABLE.iter().find(|(c, _, _)| *c == code) {
        Some(&(_, table_angles, flip)) => {
            angles = table_angles;
            if flip {
                mirror = -mirror;
            }
        }
        None => diags.push(Diagnostic::UnknownOrientation { raw }),
    }

    Orientation::Euler { angles, mirror }
}

/// Legacy encode, the inverse of [`decode_euler`] over the table entries.
pub fn encode_euler(angles: Vec3, mirror: Vec3) -> i32 {
    let mut raw = 0;
    let mut mirror = mirror;
    if let Some(&(code, _, flip)) = EULER_TABLE.iter().find(|(_, a, _)| *a == angles) {
        raw |= code;
        if flip {
            mirror = -mirror;
        }
    }
    if mirror.x > 0.0 {
        raw |= MIRROR_X;
    }
    if mirror.y > 0.0 {
        raw |= MIRROR_Y;
    }
    if mirror.z > 0.0 {
        raw |= MIRROR_Z;
    }
    raw
}

/// Matrix codec: bits 0..=1 and 2..=3 index the non-zero column of the
/// first and second row, the third row takes the remaining column; bits
/// 4..=6 are per-row negative-sign flags.
pub fn decode_matrix(raw: i32) -> Result<Mat3, FormatError> {
    let c0 = (raw & 0b11) as usize;
    let c1 = ((raw >> 2) & 0b11) as usize;
    if c0 > 2 || c1 > 2 || c0 == c1 {
        return Err(FormatError::BadValue {
            what: "rotation",
            value: raw.to_string(),
        });
    }
    let c2 = 3 - c0 - c1;

    let mut rows = [[0.0f32; 3]; 3];
    rows[0][c0] = if raw & (1 << 4) != 0 { -1.0 } else { 1.0 };
    rows[1][c1] = if raw & (1 << 5) != 0 { -1.0 } else { 1.0 };
    rows[2][c2] = if raw & (1 << 6) != 0 { -1.0 } else { 1.0 };

    Ok(Mat3::from_cols(
        Vec3::new(rows[0][0], rows[1][0], rows[2][0]),
        Vec3::new(rows[0][1], rows[1][1], rows[2][1]),
        Vec3::new(rows[0][2], rows[1][2], rows[2][2]),
    ))
}

/// Matrix encode, the inverse of [`decode_matrix`]. Fails when the matrix
/// is not a signed permutation.
pub fn encode_matrix(m: Mat3) -> Result<i32, FormatError> {
    let rows = [
        Vec3::new(m.x_axis.x, m.y_axis.x, m.z_axis.x),
        Vec3::new(m.x_axis.y, m.y_axis.y, m.z_axis.y),
        Vec3::new(m.x_axis.z, m.y_axis.z, m.z_axis.z),
    ];

    let mut raw = 0;
    let mut seen = [false; 3];
    for (i, row) in rows.iter().enumerate() {
        let mut non_zero = None;
        for c in 0..3 {
            let v = row[c];
            if v == 0.0 {
                continue;
            }
            if v.abs() != 1.0 || non_zero.is_some() {
                non_zero = None;
                break;
            }
            non_zero = Some((c, v < 0.0));
        }
        let Some((c, negative)) = non_zero else {
            return Err(FormatError::BadValue {
                what: "rotation matrix",
                value: format!("{m}"),
            });
        };
        if seen[c] {
            return Err(FormatError::BadValue {
                what: "rotation matrix",
                value: format!("{m}"),
            });
        }
        seen[c] = true;
        if i < 2 {
            raw |= (c as i32) << (2 * i);
        }
        if negative {
            raw |= 1 << (4 + i);
        }
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euler_known_entries() {
        let mut diags = Vec::new();
        // All mirror bits set, table entry 0b0100: identity angles with a
        // flipped mirror.
        let o = decode_euler(0b0100 | MIRROR_X | MIRROR_Y | MIRROR_Z, &mut diags);
        assert_eq!(
            o,
            Orientation::Euler {
                angles: Vec3::ZERO,
                mirror: Vec3::splat(-1.0),
            }
        );
        assert!(diags.is_empty());
    }

    #[test]
    fn test_euler_unknown_entry_flagged() {
        let mut diags = Vec::new();
        let o = decode_euler(0b0011 | MIRROR_X | MIRROR_Y | MIRROR_Z, &mut diags);
        assert_eq!(
            o,
            Orientation::Euler {
                angles: Vec3::ZERO,
                mirror: Vec3::ONE,
            }
        );
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn test_euler_encode_roundtrip() {
        let mut diags = Vec::new();
        for &(code, _, _) in &EULER_TABLE {
            for bits in [
                0,
                MIRROR_X,
                MIRROR_Y | MIRROR_Z,
                MIRROR_X | MIRROR_Y | MIRROR_Z,
            ] {
                let raw = code | bits;
                let Orientation::Euler { angles, mirror } = decode_euler(raw, &mut diags) else {
                    unreachable!()
                };
                assert_eq!(encode_euler(angles, mirror), raw, "raw {raw:#b}");
            }
        }
        assert!(diags.is_empty());
    }

    #[test]
    fn test_matrix_identity() {
        // Row 0 takes col 0, row 1 takes col 1, all signs positive.
        let raw = 1 << 2;
        assert_eq!(decode_matrix(raw).unwrap(), Mat3::IDENTITY);
        assert_eq!(encode_matrix(Mat3::IDENTITY).unwrap(), raw);
    }

    #[test]
    fn test_matrix_documented_example() {
        // (1 << 0) | (2 << 2) | (1 << 5) | (1 << 6): row 0 takes col 1,
        // row 1 takes -col 2, row 2 takes -col 0.
        let raw = (1 << 0) | (2 << 2) | (1 << 5) | (1 << 6);
        let m = decode_matrix(raw).unwrap();
        assert_eq!(m * Vec3::X, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(m * Vec3::Y, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(m * Vec3::Z, Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(encode_matrix(m).unwrap(), raw);
    }

    #[test]
    fn test_matrix_rejects_duplicate_rows() {
        assert!(decode_matrix((1 << 0) | (1 << 2)).is_err());
        assert!(decode_matrix(3).is_err());
    }

    #[test]
    fn test_version_selects_codec() {
        let mut diags = Vec::new();
        assert!(matches!(
            decode_rotation(4, 150, &mut diags).unwrap(),
            Orientation::Euler { .. }
        ));
        assert!(matches!(
            decode_rotation(4, 200, &mut diags).unwrap(),
            Orientation::Matrix(_)
        ));
    }
}

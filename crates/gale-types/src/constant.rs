//! Compile-time constant values
//!
//! The checker evaluates constant expressions; lowering only formats them.
//! An untyped constant's final representation depends on the desired type
//! at its use site, so truncation to a concrete width happens here, at
//! formatting time, not at evaluation time.

use crate::ty::BasicKind;

/// Evaluated constant value
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    /// All integer widths, including uint64 (hence i128).
    Int(i128),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl ConstValue {
    pub fn as_int(&self) -> Option<i128> {
        match self {
            ConstValue::Int(v) => Some(*v),
            ConstValue::Float(f) if f.fract() == 0.0 => Some(*f as i128),
            _ => None,
        }
    }

    /// Truncate an integer constant to the width and signedness of `kind`,
    /// reproducing source-language wraparound.
    pub fn truncate_int(value: i128, kind: BasicKind) -> i128 {
        let Some(bits) = kind.bits() else {
            return value;
        };
        let masked = (value as u128) & (u128::MAX >> (128 - bits));
        if kind.is_unsigned() {
            masked as i128
        } else {
            // Sign-extend from `bits`.
            let sign_bit = 1u128 << (bits - 1);
            if masked & sign_bit != 0 {
                (masked as i128) - (1i128 << bits)
            } else {
                masked as i128
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_to_signed_widths() {
        assert_eq!(ConstValue::truncate_int(200, BasicKind::Int8), -56);
        assert_eq!(ConstValue::truncate_int(-1, BasicKind::Int8), -1);
        assert_eq!(ConstValue::truncate_int(65535, BasicKind::Int16), -1);
        assert_eq!(ConstValue::truncate_int(1 << 31, BasicKind::Int32), -(1 << 31));
    }

    #[test]
    fn truncates_to_unsigned_widths() {
        assert_eq!(ConstValue::truncate_int(-1, BasicKind::Uint8), 255);
        assert_eq!(ConstValue::truncate_int(256, BasicKind::Uint8), 0);
        assert_eq!(ConstValue::truncate_int(-1, BasicKind::Uint32), 4294967295);
        assert_eq!(
            ConstValue::truncate_int(-1, BasicKind::Uint64),
            u64::MAX as i128
        );
    }

    #[test]
    fn untyped_kinds_pass_through() {
        assert_eq!(
            ConstValue::truncate_int(1 << 80, BasicKind::UntypedInt),
            1 << 80
        );
    }
}

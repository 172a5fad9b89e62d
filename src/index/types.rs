//! Key attribute types and comparison operators.

use std::cmp::Ordering;
use std::fmt;

use crate::common::config::MAX_STRING_LEN;
use crate::common::{Error, Result};

/// Type of the indexed attribute.
///
/// Keys are fixed-length byte strings; the type only decides how two keys
/// compare and which lengths are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AttrType {
    /// 4-byte little-endian `i32`.
    Int = 0,
    /// 4-byte little-endian `f32`.
    Float = 1,
    /// Fixed-length byte string, 1..=255 bytes.
    String = 2,
}

impl AttrType {
    /// Decode the on-disk tag.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(AttrType::Int),
            1 => Some(AttrType::Float),
            2 => Some(AttrType::String),
            _ => None,
        }
    }

    /// Check that `attr_len` is a legal key length for this type.
    pub fn validate(self, attr_len: usize) -> Result<()> {
        let ok = match self {
            AttrType::Int | AttrType::Float => attr_len == 4,
            AttrType::String => (1..=MAX_STRING_LEN).contains(&attr_len),
        };
        if ok {
            Ok(())
        } else {
            Err(Error::InvalidAttribute {
                attr_type: self,
                attr_len,
            })
        }
    }

    /// Compare two encoded keys of this type.
    ///
    /// Floats use IEEE total ordering so that NaN keys still sort
    /// deterministically.
    pub fn compare(self, a: &[u8], b: &[u8]) -> Ordering {
        match self {
            AttrType::Int => read_i32(a).cmp(&read_i32(b)),
            AttrType::Float => read_f32(a).total_cmp(&read_f32(b)),
            AttrType::String => a.cmp(b),
        }
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrType::Int => write!(f, "INT"),
            AttrType::Float => write!(f, "FLOAT"),
            AttrType::String => write!(f, "STRING"),
        }
    }
}

#[inline]
fn read_i32(bytes: &[u8]) -> i32 {
    i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[inline]
fn read_f32(bytes: &[u8]) -> f32 {
    f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Comparison operator of a scan predicate `entry_key <op> value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompOp {
    /// No predicate; every entry qualifies.
    NoOp,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CompOp {
    /// Evaluate the operator given `entry_key.cmp(value)`.
    pub fn holds(self, ord: Ordering) -> bool {
        match self {
            CompOp::NoOp => true,
            CompOp::Eq => ord == Ordering::Equal,
            CompOp::Ne => ord != Ordering::Equal,
            CompOp::Lt => ord == Ordering::Less,
            CompOp::Gt => ord == Ordering::Greater,
            CompOp::Le => ord != Ordering::Greater,
            CompOp::Ge => ord != Ordering::Less,
        }
    }
}

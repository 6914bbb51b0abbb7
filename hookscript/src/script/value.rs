//! Runtime values.
//!
//! Values are transient: they live for one invocation of a script and are
//! either dropped with its variable scope or consumed into a message.

use std::fmt;

use super::expr::LValue;
use crate::context::Word;
use crate::text;

/// A script runtime value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Byte-oriented text, without terminator.
    NarrowString(Vec<u8>),
    /// UTF-16 code units, without terminator.
    WideString(Vec<u16>),
    Int32(i32),
    /// A raw argument or return-value word, not yet interpreted.
    Word(Word),
    /// Points at a storage location.  Resolved when it is written to a
    /// native slot or dereferenced.
    Reference(LValue),
    ByteBuffer { pointer: Word, length: usize },
    Guid(Guid),
}

impl Value {
    /// Name of the type, as used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::NarrowString(_) => "narrow string",
            Value::WideString(_) => "wide string",
            Value::Int32(_) => "int32",
            Value::Word(_) => "native word",
            Value::Reference(_) => "reference",
            Value::ByteBuffer { .. } => "byte buffer",
            Value::Guid(_) => "guid",
        }
    }

    /// Element count of a string or buffer value: UTF-16 code units for
    /// wide strings, bytes otherwise.  `None` for non-sequence values.
    pub fn element_count(&self) -> Option<usize> {
        match self {
            Value::NarrowString(b) => Some(b.len()),
            Value::WideString(u) => Some(u.len()),
            Value::ByteBuffer { length, .. } => Some(*length),
            _ => None,
        }
    }
}

impl Value {
    /// Native byte image of the value as it would sit in an arena: strings
    /// NUL terminated, integers and words native-endian, a buffer as its
    /// pointer, a GUID in its 16-byte layout.  A reference is imaged as a
    /// null word; publishing it needs the invocation's arena.
    pub fn storage(&self) -> Vec<u8> {
        match self {
            Value::NarrowString(b) => text::narrow_storage(b),
            Value::WideString(u) => text::wide_storage(u),
            Value::Int32(n) => n.to_ne_bytes().to_vec(),
            Value::Word(w) => w.to_ne_bytes().to_vec(),
            Value::ByteBuffer { pointer, .. } => pointer.to_ne_bytes().to_vec(),
            Value::Guid(g) => g.to_bytes().to_vec(),
            Value::Reference(_) => 0usize.to_ne_bytes().to_vec(),
        }
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int32(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::WideString(s.encode_utf16().collect())
    }
}

// ── Guid ──────────────────────────────────────────────────────────────────────

/// A 128-bit globally unique identifier in its native storage layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    pub const SIZE: usize = 16;

    /// Decode the native layout: `data1`..`data3` little-endian, `data4` raw.
    pub fn from_bytes(b: &[u8; Self::SIZE]) -> Self {
        let mut data4 = [0u8; 8];
        data4.copy_from_slice(&b[8..]);
        Guid {
            data1: u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            data2: u16::from_le_bytes([b[4], b[5]]),
            data3: u16::from_le_bytes([b[6], b[7]]),
            data4,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..4].copy_from_slice(&self.data1.to_le_bytes());
        out[4..6].copy_from_slice(&self.data2.to_le_bytes());
        out[6..8].copy_from_slice(&self.data3.to_le_bytes());
        out[8..].copy_from_slice(&self.data4);
        out
    }
}

/// Registry form: `{3F2504E0-4F89-11D3-9A0C-0305E82C3301}`.
impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.data4;
        write!(
            f,
            "{{{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}}}",
            self.data1, self.data2, self.data3, d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7]
        )
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! Structured messages produced by `send_*` statements.
//!
//! A message is an ordered tuple of typed fields.  Its signature spells the
//! field kinds in order, GVariant style: `s` for text, `i` for a 32-bit
//! integer, `ay` for a byte sequence, so three sends of a narrow string, a
//! wide string and an integer give `(ssi)`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::value::Value;
use crate::error::RuntimeError;
use crate::text;

/// One typed element of a [`Message`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Field {
    /// Text; narrow and wide sources both arrive here as UTF-8.
    Str(String),
    Int32(i32),
    Bytes(Vec<u8>),
}

impl Field {
    /// Signature code of this field.
    pub fn signature(&self) -> &'static str {
        match self {
            Field::Str(_) => "s",
            Field::Int32(_) => "i",
            Field::Bytes(_) => "ay",
        }
    }
}

/// A materialized operand as a message field.  Strings of either encoding
/// become text, GUIDs their registry form.
impl TryFrom<Value> for Field {
    type Error = RuntimeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::NarrowString(b) => Ok(Field::Str(text::decode_narrow(&b))),
            Value::WideString(u) => Ok(Field::Str(text::decode_wide(&u))),
            Value::Int32(n) => Ok(Field::Int32(n)),
            Value::Guid(g) => Ok(Field::Str(g.to_string())),
            other => Err(RuntimeError::mismatch("message field", other.type_name())),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Str(s) => {
                f.write_str("'")?;
                for c in s.chars() {
                    match c {
                        '\'' => f.write_str("\\'")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        c => write!(f, "{c}")?,
                    }
                }
                f.write_str("'")
            }
            Field::Int32(n) => write!(f, "{n}"),
            Field::Bytes(bytes) => {
                f.write_str("[")?;
                for (i, b) in bytes.iter().enumerate() {
                    if i == 0 {
                        write!(f, "byte 0x{b:02x}")?;
                    } else {
                        write!(f, ", 0x{b:02x}")?;
                    }
                }
                f.write_str("]")
            }
        }
    }
}

/// A frozen message, as delivered to the handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    fields: Vec<Field>,
}

impl Message {
    pub fn new(fields: Vec<Field>) -> Self {
        Message { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Tuple signature, e.g. `(ssi)`.
    pub fn signature(&self) -> String {
        let mut sig = String::from("(");
        for field in &self.fields {
            sig.push_str(field.signature());
        }
        sig.push(')');
        sig
    }

    /// True when the fields match `signature` exactly.
    pub fn is_of_type(&self, signature: &str) -> bool {
        self.signature() == signature
    }
}

/// GVariant text form: `('Hey', 42)`, `('x',)`.
impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{field}")?;
        }
        if self.fields.len() == 1 {
            f.write_str(",")?;
        }
        f.write_str(")")
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Accumulates fields while one statement executes.
#[derive(Debug, Default)]
pub(crate) struct MessageBuilder {
    fields: Vec<Field>,
}

impl MessageBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Freeze the accumulated fields; `None` if nothing was sent.
    pub(crate) fn finish(self) -> Option<Message> {
        if self.fields.is_empty() {
            None
        } else {
            Some(Message::new(self.fields))
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! Built-in `send_*` functions.
//!
//! Built-ins are statement-level side effects: each call appends one field
//! to the message being assembled for the current statement and produces no
//! value.  The dispatcher is called from the evaluator for every
//! [`Expr::Call`] in statement position.

use super::expr::{Expr, LValue};
use super::interp::Frame;
use super::message::{Field, MessageBuilder};
use super::value::Value;
use crate::error::RuntimeError;
use crate::text::Encoding;

// ── Builtin ───────────────────────────────────────────────────────────────────

/// The fixed set of callable built-ins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    SendNarrowString,
    SendWideString,
    SendInt32,
    SendByteArray,
    SendGuid,
    SendNarrowFormatString,
    SendWideFormatString,
}

impl Builtin {
    pub const ALL: [Builtin; 7] = [
        Builtin::SendNarrowString,
        Builtin::SendWideString,
        Builtin::SendInt32,
        Builtin::SendByteArray,
        Builtin::SendGuid,
        Builtin::SendNarrowFormatString,
        Builtin::SendWideFormatString,
    ];

    pub fn from_name(name: &str) -> Option<Builtin> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::SendNarrowString => "send_narrow_string",
            Builtin::SendWideString => "send_wide_string",
            Builtin::SendInt32 => "send_int32",
            Builtin::SendByteArray => "send_byte_array",
            Builtin::SendGuid => "send_guid",
            Builtin::SendNarrowFormatString => "send_narrow_format_string",
            Builtin::SendWideFormatString => "send_wide_format_string",
        }
    }

    /// Format built-ins take a format operand plus any number of values.
    fn is_variadic(self) -> bool {
        matches!(self, Builtin::SendNarrowFormatString | Builtin::SendWideFormatString)
    }

    fn required_args(self) -> usize {
        match self {
            Builtin::SendByteArray => 2,
            _ => 1,
        }
    }

    /// Check the number of call arguments; the error is the diagnostic text.
    pub(crate) fn check_arity(self, got: usize) -> Result<(), String> {
        let want = self.required_args();
        let ok = if self.is_variadic() { got >= want } else { got == want };
        if ok {
            return Ok(());
        }
        let plural = if want == 1 { "argument" } else { "arguments" };
        let at_least = if self.is_variadic() { "at least " } else { "" };
        Err(format!("{} expects {at_least}{want} {plural}, got {got}", self.name()))
    }
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

/// Run one built-in call, appending its field to `msg`.
pub(crate) fn invoke(
    frame: &mut Frame<'_, '_>,
    builtin: Builtin,
    args: &[Expr],
    msg: &mut MessageBuilder,
) -> Result<(), RuntimeError> {
    let field = match builtin {
        Builtin::SendNarrowString => {
            let v = frame.eval(operand(args, 0)?)?;
            Field::try_from(frame.read_string(&v, Encoding::Narrow)?)?
        }
        Builtin::SendWideString => {
            let v = frame.eval(operand(args, 0)?)?;
            Field::try_from(frame.read_string(&v, Encoding::Wide)?)?
        }
        Builtin::SendInt32 => {
            let v = frame.eval(operand(args, 0)?)?;
            Field::Int32(frame.int32(&v)?)
        }
        Builtin::SendByteArray => {
            let p = frame.eval(operand(args, 0)?)?;
            let pointer = frame.to_word(&p)?;
            let l = frame.eval(operand(args, 1)?)?;
            let length = frame.length(&l)?;
            Field::Bytes(frame.read_buffer(&Value::ByteBuffer { pointer, length })?)
        }
        Builtin::SendGuid => {
            let v = frame.eval(operand(args, 0)?)?;
            Field::try_from(frame.guid(&v)?)?
        }
        Builtin::SendNarrowFormatString => Field::Str(format_string(frame, args, Encoding::Narrow)?),
        Builtin::SendWideFormatString => Field::Str(format_string(frame, args, Encoding::Wide)?),
    };
    msg.push(field);
    Ok(())
}

fn operand(args: &[Expr], index: usize) -> Result<&Expr, RuntimeError> {
    args.get(index)
        .ok_or_else(|| RuntimeError::mismatch("call argument", format!("{} argument(s)", args.len())))
}

// ── Format strings ────────────────────────────────────────────────────────────

/// What a conversion directive asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Directive {
    Str,
    Int,
}

/// An operand converted for a directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FormatArg {
    Text(String),
    Int(i32),
}

/// Where directive operands come from.
enum Operands<'a> {
    /// Extra arguments written in the call.
    Explicit(std::slice::Iter<'a, Expr>),
    /// Argument slots following the one that held the format string.
    Implicit(usize),
    None,
}

fn format_string(
    frame: &mut Frame<'_, '_>,
    args: &[Expr],
    encoding: Encoding,
) -> Result<String, RuntimeError> {
    let format_expr = operand(args, 0)?;
    let format_value = frame.eval(format_expr)?;
    let format = frame.read_text(&format_value, encoding)?;

    let mut operands = match (format_expr, args.len()) {
        (_, n) if n > 1 => Operands::Explicit(args[1..].iter()),
        (Expr::Arg(i), _) => Operands::Implicit(i + 1),
        _ => Operands::None,
    };
    let limit = frame.limits().max_format_arguments;
    let mut consumed = 0usize;

    interpolate(&format, |directive| {
        consumed += 1;
        if consumed > limit {
            return Err(RuntimeError::LimitExceeded {
                what: "format argument count",
                requested: consumed,
                limit,
            });
        }
        let value = match &mut operands {
            Operands::Explicit(it) => match it.next() {
                Some(expr) => frame.eval(expr)?,
                None => return Err(missing(directive)),
            },
            Operands::Implicit(next) => {
                let v = frame.load(&LValue::Argument(*next))?;
                *next += 1;
                v
            }
            Operands::None => return Err(missing(directive)),
        };
        Ok(match directive {
            Directive::Str => FormatArg::Text(frame.read_text(&value, encoding)?),
            Directive::Int => FormatArg::Int(frame.int32(&value)?),
        })
    })
}

fn missing(directive: Directive) -> RuntimeError {
    let d = match directive {
        Directive::Str => "%s",
        Directive::Int => "%d",
    };
    RuntimeError::Format(format!("missing argument for {d}"))
}

/// printf-style interpolation.
///
/// Supports `%s`, `%d`, `%%`, a `-` (left-justify) or `0` (zero-pad, `%d`
/// only) flag, and a decimal field width.  `operand` supplies the value for
/// each directive in order.
pub(crate) fn interpolate<F>(format: &str, mut operand: F) -> Result<String, RuntimeError>
where
    F: FnMut(Directive) -> Result<FormatArg, RuntimeError>,
{
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut left = false;
        let mut zero = false;
        loop {
            match chars.peek() {
                Some('-') => left = true,
                Some('0') => zero = true,
                _ => break,
            }
            chars.next();
        }
        let mut width = 0usize;
        while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
            width = width
                .checked_mul(10)
                .and_then(|w| w.checked_add(d as usize))
                .ok_or_else(|| RuntimeError::Format("field width too large".into()))?;
            chars.next();
        }

        match chars.next() {
            Some('%') => out.push('%'),
            Some('s') => {
                let s = match operand(Directive::Str)? {
                    FormatArg::Text(s) => s,
                    FormatArg::Int(n) => n.to_string(),
                };
                pad(&mut out, &s, width, left);
            }
            Some('d' | 'i') => {
                let n = match operand(Directive::Int)? {
                    FormatArg::Int(n) => n,
                    FormatArg::Text(s) => {
                        return Err(RuntimeError::mismatch("integer for %d", format!("text {s:?}")));
                    }
                };
                if zero && !left {
                    out.push_str(&format!("{n:0width$}"));
                } else {
                    pad(&mut out, &n.to_string(), width, left);
                }
            }
            Some(other) => {
                return Err(RuntimeError::Format(format!("unsupported directive %{other}")));
            }
            None => {
                return Err(RuntimeError::Format("incomplete directive at end of format string".into()));
            }
        }
    }
    Ok(out)
}

/// Space-pad `s` to `width` characters.
fn pad(out: &mut String, s: &str, width: usize, left: bool) {
    let fill = width.saturating_sub(s.chars().count());
    if left {
        out.push_str(s);
        out.extend(std::iter::repeat(' ').take(fill));
    } else {
        out.extend(std::iter::repeat(' ').take(fill));
        out.push_str(s);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

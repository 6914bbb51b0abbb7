//! Script evaluator.
//!
//! Each execution builds a [`Frame`] on the caller's stack: a fresh variable
//! scope plus the invocation context of the intercepted call.  Nothing in a
//! frame survives the execution, so one compiled script can run on any
//! number of threads at once.

use std::collections::HashMap;

use tracing::{debug, trace};

use super::builtins;
use super::expr::{Expr, LValue};
use super::message::MessageBuilder;
use super::stmt::{Stmt, StmtKind};
use super::value::{Guid, Value};
use super::Script;
use crate::config::Limits;
use crate::context::{InvocationContext, Word};
use crate::error::{MemoryError, RuntimeError};
use crate::text::{self, Encoding};

/// Longest chain of local-to-local references followed before giving up.
const MAX_REFERENCE_DEPTH: usize = 16;

// ── VariableScope ─────────────────────────────────────────────────────────────

/// Locals of one execution.
#[derive(Debug, Default)]
pub(crate) struct VariableScope {
    vars: HashMap<String, Value>,
    /// Native addresses handed out for `&name`.  Published storage may embed
    /// the address of another local, so any assignment invalidates them all.
    published: HashMap<String, Word>,
}

impl VariableScope {
    fn get(&self, name: &str) -> Result<&Value, RuntimeError> {
        self.vars
            .get(name)
            .ok_or_else(|| RuntimeError::UnboundVariable { name: name.to_owned() })
    }

    fn define(&mut self, name: &str, value: Value) {
        self.published.clear();
        self.vars.insert(name.to_owned(), value);
    }

    fn assign(&mut self, name: &str, value: Value) -> Result<(), RuntimeError> {
        if !self.vars.contains_key(name) {
            return Err(RuntimeError::UnboundVariable { name: name.to_owned() });
        }
        self.define(name, value);
        Ok(())
    }
}

// ── Frame ─────────────────────────────────────────────────────────────────────

pub(crate) struct Frame<'s, 'c> {
    script: &'s Script,
    ctx: &'c mut dyn InvocationContext,
    scope: VariableScope,
}

/// Execute `statements` against `ctx`, stopping at the first error.
pub(crate) fn run(
    script: &Script,
    statements: &[Stmt],
    ctx: &mut dyn InvocationContext,
) -> Result<(), RuntimeError> {
    let mut frame = Frame { script, ctx, scope: VariableScope::default() };
    for stmt in statements {
        trace!(line = stmt.line, "executing statement");
        if let Err(e) = frame.exec(stmt) {
            debug!(line = stmt.line, error = %e, "script execution aborted");
            return Err(e);
        }
    }
    Ok(())
}

impl<'s, 'c> Frame<'s, 'c> {
    pub(crate) fn limits(&self) -> &Limits {
        self.script.limits()
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<(), RuntimeError> {
        match &stmt.kind {
            StmtKind::Assign { target, value, declare } => {
                let v = self.eval(value)?;
                self.store(target, v, *declare)
            }
            StmtKind::Expr(expr) => {
                let mut msg = MessageBuilder::new();
                match expr {
                    Expr::Comma(items) => {
                        for item in items {
                            self.exec_expr(item, &mut msg)?;
                        }
                    }
                    other => self.exec_expr(other, &mut msg)?,
                }
                if let Some(message) = msg.finish() {
                    self.script.deliver(message);
                }
                Ok(())
            }
        }
    }

    fn exec_expr(&mut self, expr: &Expr, msg: &mut MessageBuilder) -> Result<(), RuntimeError> {
        match expr {
            Expr::Call(builtin, args) => builtins::invoke(self, *builtin, args, msg),
            other => self.eval(other).map(drop),
        }
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    pub(crate) fn eval(&self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Str(s) => Ok(Value::WideString(text::encode_wide(s))),
            Expr::Int(n) => Ok(Value::Int32(*n)),
            Expr::Var(name) => self.scope.get(name).cloned(),
            Expr::Arg(i) => self.load(&LValue::Argument(*i)),
            Expr::RetVal => self.load(&LValue::ReturnValue),
            Expr::AddressOf(lv) => {
                match lv {
                    LValue::Local(name) => {
                        self.scope.get(name)?;
                    }
                    LValue::Argument(i) => self.check_argument(*i)?,
                    LValue::ReturnValue => {}
                }
                Ok(Value::Reference(lv.clone()))
            }
            Expr::Len(inner) => {
                let v = self.eval(inner)?;
                let n = self.element_count(&v)?;
                i32::try_from(n).map(Value::Int32).map_err(|_| RuntimeError::LimitExceeded {
                    what: "length",
                    requested: n,
                    limit: i32::MAX as usize,
                })
            }
            Expr::Call(builtin, _) => Err(RuntimeError::mismatch(
                "value",
                format!("call to {}, which produces no value", builtin.name()),
            )),
            Expr::Comma(_) => Err(RuntimeError::mismatch("value", "expression sequence")),
        }
    }

    fn check_argument(&self, index: usize) -> Result<(), RuntimeError> {
        let count = self.ctx.argument_count();
        if index < count {
            Ok(())
        } else {
            Err(RuntimeError::ArgumentIndexOutOfRange { index, count })
        }
    }

    /// Current content of a storage location.
    pub(crate) fn load(&self, lv: &LValue) -> Result<Value, RuntimeError> {
        match lv {
            LValue::Local(name) => self.scope.get(name).cloned(),
            LValue::Argument(i) => {
                self.check_argument(*i)?;
                Ok(Value::Word(self.ctx.get_argument(*i)))
            }
            LValue::ReturnValue => Ok(Value::Word(self.ctx.get_return_value())),
        }
    }

    fn store(&mut self, target: &LValue, value: Value, declare: bool) -> Result<(), RuntimeError> {
        match target {
            LValue::Local(name) if declare => {
                self.scope.define(name, value);
                Ok(())
            }
            LValue::Local(name) => self.scope.assign(name, value),
            LValue::Argument(i) => {
                self.check_argument(*i)?;
                let word = self.to_word(&value)?;
                self.ctx.set_argument(*i, word);
                Ok(())
            }
            LValue::ReturnValue => {
                let word = self.to_word(&value)?;
                self.ctx.set_return_value(word);
                Ok(())
            }
        }
    }

    /// Follow references between locals until reaching something else.
    fn resolve(&self, value: &Value) -> Result<Value, RuntimeError> {
        let mut v = value.clone();
        for _ in 0..MAX_REFERENCE_DEPTH {
            match v {
                Value::Reference(LValue::Local(name)) => v = self.scope.get(&name)?.clone(),
                other => return Ok(other),
            }
        }
        Err(RuntimeError::mismatch("resolvable reference", "reference cycle"))
    }

    // ── Native words and storage ──────────────────────────────────────────────

    /// The word a value stores into a native slot.
    pub(crate) fn to_word(&mut self, value: &Value) -> Result<Word, RuntimeError> {
        match value {
            Value::Word(w) => Ok(*w),
            Value::Int32(n) => Ok(*n as isize as Word),
            Value::Reference(lv) => self.address_of(lv, 0),
            Value::ByteBuffer { pointer, .. } => Ok(*pointer),
            other => Err(RuntimeError::mismatch("native word", other.type_name())),
        }
    }

    /// Native address of a storage location.  Locals are copied into the
    /// invocation's arena the first time their address is taken.
    fn address_of(&mut self, lv: &LValue, depth: usize) -> Result<Word, RuntimeError> {
        if depth >= MAX_REFERENCE_DEPTH {
            return Err(RuntimeError::mismatch("resolvable reference", "reference cycle"));
        }
        match lv {
            LValue::Local(name) => {
                if let Some(&address) = self.scope.published.get(name) {
                    return Ok(address);
                }
                let value = self.scope.get(name)?.clone();
                let storage = self.storage_of(&value, depth)?;
                let address = self.ctx.retain(storage);
                self.scope.published.insert(name.clone(), address);
                Ok(address)
            }
            LValue::Argument(i) => {
                self.check_argument(*i)?;
                self.ctx.argument_address(*i).ok_or_else(|| RuntimeError::InvalidLValue {
                    reason: format!("the address of arg{i} is not available"),
                })
            }
            LValue::ReturnValue => {
                self.ctx.return_value_address().ok_or_else(|| RuntimeError::InvalidLValue {
                    reason: "the address of retval is not available".into(),
                })
            }
        }
    }

    /// Native byte image of a value; references are published first.
    fn storage_of(&mut self, value: &Value, depth: usize) -> Result<Vec<u8>, RuntimeError> {
        match value {
            Value::Reference(lv) => Ok(self.address_of(lv, depth + 1)?.to_ne_bytes().to_vec()),
            other => Ok(other.storage()),
        }
    }

    // ── Operand interpretation ────────────────────────────────────────────────

    /// The string a value denotes.  Native words and buffers are read as
    /// `encoding` text; NUL-terminated in the case of words.
    pub(crate) fn read_string(&mut self, value: &Value, encoding: Encoding) -> Result<Value, RuntimeError> {
        let max = self.limits().max_string_length;
        match self.resolve(value)? {
            s @ (Value::NarrowString(_) | Value::WideString(_)) => Ok(s),
            buffer @ Value::ByteBuffer { .. } => {
                let bytes = self.read_buffer(&buffer)?;
                Ok(string_value(bytes, encoding))
            }
            v @ (Value::Word(_) | Value::Reference(_)) => {
                let address = self.to_word(&v)?;
                let bytes = self
                    .ctx
                    .memory()
                    .read_terminated(address, encoding.unit_size(), max)?;
                Ok(string_value(bytes, encoding))
            }
            other => Err(RuntimeError::mismatch("string", other.type_name())),
        }
    }

    /// [`read_string`](Self::read_string), decoded.
    pub(crate) fn read_text(&mut self, value: &Value, encoding: Encoding) -> Result<String, RuntimeError> {
        match self.read_string(value, encoding)? {
            Value::NarrowString(b) => Ok(text::decode_narrow(&b)),
            Value::WideString(u) => Ok(text::decode_wide(&u)),
            other => Err(RuntimeError::mismatch("string", other.type_name())),
        }
    }

    /// A value as a signed 32-bit integer; words keep their low 32 bits.
    pub(crate) fn int32(&mut self, value: &Value) -> Result<i32, RuntimeError> {
        match self.resolve(value)? {
            Value::Int32(n) => Ok(n),
            Value::Word(w) => Ok(w as u32 as i32),
            v @ Value::Reference(_) => {
                let address = self.to_word(&v)?;
                Ok(i32::from_ne_bytes(self.read_array(address)?))
            }
            other => Err(RuntimeError::mismatch("integer", other.type_name())),
        }
    }

    /// A value used as a byte count.
    pub(crate) fn length(&mut self, value: &Value) -> Result<usize, RuntimeError> {
        match self.resolve(value)? {
            Value::Int32(n) => usize::try_from(n)
                .map_err(|_| RuntimeError::mismatch("non-negative length", n.to_string())),
            Value::Word(w) => Ok(w),
            v @ Value::Reference(_) => {
                let address = self.to_word(&v)?;
                Ok(Word::from_ne_bytes(self.read_array(address)?))
            }
            other => Err(RuntimeError::mismatch("length", other.type_name())),
        }
    }

    /// Element count for `len()`: code units of a string, bytes of a buffer,
    /// or the byte length of the narrow string a native word points at.
    fn element_count(&self, value: &Value) -> Result<usize, RuntimeError> {
        let v = self.resolve(value)?;
        if let Some(n) = v.element_count() {
            return Ok(n);
        }
        match v {
            Value::Word(w) => {
                let max = self.limits().max_string_length;
                Ok(self.ctx.memory().read_terminated(w, 1, max)?.len())
            }
            other => Err(RuntimeError::mismatch("string or buffer", other.type_name())),
        }
    }

    pub(crate) fn read_buffer(&mut self, buffer: &Value) -> Result<Vec<u8>, RuntimeError> {
        let Value::ByteBuffer { pointer, length } = *buffer else {
            return Err(RuntimeError::mismatch("byte buffer", buffer.type_name()));
        };
        let limit = self.limits().max_byte_array_length;
        if length > limit {
            return Err(RuntimeError::LimitExceeded { what: "byte array length", requested: length, limit });
        }
        if length == 0 {
            return Ok(Vec::new());
        }
        Ok(self.ctx.memory().read(pointer, length)?)
    }

    /// A GUID value, or the 16 bytes a pointer refers to.
    pub(crate) fn guid(&mut self, value: &Value) -> Result<Value, RuntimeError> {
        let v = self.resolve(value)?;
        if let Value::Guid(_) = v {
            return Ok(v);
        }
        let address = self.to_word(&v)?;
        Ok(Value::Guid(Guid::from_bytes(&self.read_array(address)?)))
    }

    fn read_array<const N: usize>(&self, address: Word) -> Result<[u8; N], RuntimeError> {
        let bytes = self.ctx.memory().read(address, N)?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| MemoryError::Unreadable { address, len: N }.into())
    }
}

fn string_value(bytes: Vec<u8>, encoding: Encoding) -> Value {
    match encoding {
        Encoding::Narrow => Value::NarrowString(bytes),
        Encoding::Wide => Value::WideString(text::wide_units(&bytes)),
    }
}

//! The call-site scripting language.
//!
//! A [`Script`] is compiled once and then executed every time an
//! instrumented function is entered or left:
//!
//! - `var name = value` and `name = value` for locals
//! - `argN = value` / `retval = value` to rewrite the intercepted call
//! - `&name`, `&argN`, `&retval` for addresses, `len(x)` for lengths
//! - `send_*` built-ins that report values to a message handler
//! - a `---` line separating the enter half from the leave half
//!
//! # Quick start
//!
//! ```rust
//! use hookscript::script::Script;
//!
//! let script = Script::compile("send_int32 (arg0)\n---\nsend_int32 (retval)").unwrap();
//! assert_eq!(script.enter_statements().len(), 1);
//! assert_eq!(script.leave_statements().len(), 1);
//!
//! let err = Script::compile("'").unwrap_err();
//! assert_eq!(err.to_string(), "Script(line 1): SyntaxError: Unexpected token ILLEGAL");
//! ```

pub mod builtins;
pub mod expr;
mod interp;
pub mod message;
pub mod stmt;
pub mod value;

use std::fmt;

use tracing::{debug, trace, warn};

use crate::config::Limits;
use crate::context::{InvocationContext, PointCut};
use crate::error::{RuntimeError, SyntaxError};

pub use message::{Field, Message};
pub use stmt::{Stmt, StmtKind};
pub use value::{Guid, Value};

/// Receives every message a script produces, on the intercepting thread.
pub type MessageHandler = Box<dyn Fn(&Script, Message) + Send + Sync>;

/// A compiled script.
///
/// The statement lists never change after compilation, so a script can be
/// shared by reference across threads and executed concurrently.  The
/// message handler is set through `&mut self`, i.e. before sharing.
pub struct Script {
    source: String,
    enter: Vec<Stmt>,
    leave: Vec<Stmt>,
    limits: Limits,
    handler: Option<MessageHandler>,
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script")
            .field("source", &self.source)
            .field("enter", &self.enter)
            .field("leave", &self.leave)
            .field("limits", &self.limits)
            .field("handler", &self.handler.as_ref().map(|_| "<handler>"))
            .finish()
    }
}

impl Script {
    /// Compile `source` with default [`Limits`].
    pub fn compile(source: &str) -> Result<Script, SyntaxError> {
        Self::compile_with_limits(source, Limits::default())
    }

    pub fn compile_with_limits(source: &str, limits: Limits) -> Result<Script, SyntaxError> {
        match stmt::parse_script(source) {
            Ok(halves) => {
                debug!(
                    enter = halves.enter.len(),
                    leave = halves.leave.len(),
                    "compiled script"
                );
                Ok(Script {
                    source: source.to_owned(),
                    enter: halves.enter,
                    leave: halves.leave,
                    limits,
                    handler: None,
                })
            }
            Err(e) => {
                debug!(line = e.line, message = %e.message, "script failed to compile");
                Err(e)
            }
        }
    }

    /// Compile, reporting failure through an optional error slot.
    ///
    /// Returns `None` on failure whether or not `error` is given; when it
    /// is, the diagnostic is stored there.
    pub fn from_string(source: &str, error: Option<&mut Option<SyntaxError>>) -> Option<Script> {
        match Self::compile(source) {
            Ok(script) => Some(script),
            Err(e) => {
                if let Some(slot) = error {
                    *slot = Some(e);
                }
                None
            }
        }
    }

    /// Install the handler for this script's messages, replacing any
    /// previous one.
    pub fn set_message_handler<F>(&mut self, handler: F)
    where
        F: Fn(&Script, Message) + Send + Sync + 'static,
    {
        self.handler = Some(Box::new(handler));
    }

    pub fn clear_message_handler(&mut self) {
        self.handler = None;
    }

    pub fn has_message_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Run the half selected by the context's point-cut.
    pub fn execute(&self, ctx: &mut dyn InvocationContext) -> Result<(), RuntimeError> {
        let statements = self.statements(ctx.point_cut());
        interp::run(self, statements, ctx)
    }

    pub fn statements(&self, point_cut: PointCut) -> &[Stmt] {
        match point_cut {
            PointCut::Enter => &self.enter,
            PointCut::Leave => &self.leave,
        }
    }

    pub fn enter_statements(&self) -> &[Stmt] {
        &self.enter
    }

    pub fn leave_statements(&self) -> &[Stmt] {
        &self.leave
    }

    /// The text this script was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub(crate) fn deliver(&self, message: Message) {
        match &self.handler {
            Some(handler) => {
                trace!(signature = %message.signature(), "delivering message");
                handler(self, message);
            }
            None => warn!(signature = %message.signature(), "no message handler; message dropped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_string_without_sink() {
        assert!(Script::from_string("'", None).is_none());
    }

    #[test]
    fn from_string_with_sink() {
        let mut err = None;
        assert!(Script::from_string("'", Some(&mut err)).is_none());
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some("Script(line 1): SyntaxError: Unexpected token ILLEGAL")
        );
    }

    #[test]
    fn from_string_success_leaves_sink_empty() {
        let mut err = None;
        assert!(Script::from_string("send_int32(arg0)", Some(&mut err)).is_some());
        assert!(err.is_none());
    }

    #[test]
    fn keeps_source_and_limits() {
        let limits = Limits { max_string_length: 8, ..Limits::default() };
        let script = Script::compile_with_limits("send_int32(arg0)\n", limits).unwrap();
        assert_eq!(script.source(), "send_int32(arg0)\n");
        assert_eq!(script.limits().max_string_length, 8);
    }

    #[test]
    fn statements_by_point_cut() {
        let script = Script::compile("send_int32(arg0)\n---\nsend_int32(retval)\nsend_int32(arg1)").unwrap();
        assert_eq!(script.statements(PointCut::Enter).len(), 1);
        assert_eq!(script.statements(PointCut::Leave).len(), 2);
    }

    #[test]
    fn handler_replacement() {
        let mut script = Script::compile("").unwrap();
        assert!(!script.has_message_handler());
        script.set_message_handler(|_, _| {});
        assert!(script.has_message_handler());
        script.clear_message_handler();
        assert!(!script.has_message_handler());
    }

    #[test]
    fn script_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Script>();
    }
}

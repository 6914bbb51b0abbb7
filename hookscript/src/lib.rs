//! Call-site scripting for dynamic binary instrumentation.
//!
//! A [`Script`] is compiled from a small line-oriented language and then
//! run each time an instrumented function is entered or left.  Scripts read
//! and rewrite the intercepted call's argument and return-value words, and
//! report what they see as typed [`Message`]s to a host-supplied handler.
//!
//! The engine never hooks anything itself.  The host implements
//! [`InvocationContext`] for the call it intercepted (or uses
//! [`native::NativeInvocation`] when the slots live in this process) and
//! calls [`Script::execute`].

pub mod config;
pub mod context;
pub mod error;
pub mod native;
pub mod script;
pub mod text;

pub use config::Limits;
pub use context::{InvocationContext, PointCut, ProcessMemory, Word};
pub use error::{MemoryError, RuntimeError, SyntaxError};
pub use script::{Field, Message, Script};

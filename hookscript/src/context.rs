//! The host seam: what the engine needs from the interception layer.
//!
//! The hooking mechanism decides when a script runs and hands the engine an
//! [`InvocationContext`] for the call being intercepted.  The engine only
//! reads and writes pointer-sized slot contents and reads bytes reachable
//! through them; it never frees anything a slot refers to.

use crate::error::MemoryError;

/// Content of one native argument or return-value slot.
pub type Word = usize;

/// Which half of a script applies to the current invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointCut {
    /// Before the real function runs.
    Enter,
    /// After it returns.
    Leave,
}

/// Read access to the address space of the instrumented process.
pub trait ProcessMemory {
    /// Copy `len` bytes starting at `address`.
    fn read(&self, address: Word, len: usize) -> Result<Vec<u8>, MemoryError>;

    /// Read a string of `unit_size`-byte code units terminated by an all-zero
    /// unit.  The terminator is not included in the result.
    ///
    /// Scanning gives up after `max_units` units with
    /// [`MemoryError::Unterminated`].
    fn read_terminated(
        &self,
        address: Word,
        unit_size: usize,
        max_units: usize,
    ) -> Result<Vec<u8>, MemoryError> {
        if address == 0 {
            return Err(MemoryError::Null);
        }
        let mut out = Vec::new();
        for i in 0..max_units {
            let at = i
                .checked_mul(unit_size)
                .and_then(|off| address.checked_add(off))
                .ok_or(MemoryError::Unreadable { address, len: (i + 1) * unit_size })?;
            let unit = self.read(at, unit_size)?;
            if unit.iter().all(|&b| b == 0) {
                return Ok(out);
            }
            out.extend_from_slice(&unit);
        }
        Err(MemoryError::Unterminated { address, max_units })
    }
}

/// The live, per-call view of an intercepted function.
///
/// Implementations are per invocation and never shared between threads, so
/// writes through one context are invisible to every other invocation.
pub trait InvocationContext {
    fn point_cut(&self) -> PointCut;

    /// Number of addressable argument slots; `argN` with `N >= count` is an
    /// error.
    fn argument_count(&self) -> usize;

    /// Read argument slot `index`.  Only called with `index < argument_count()`.
    fn get_argument(&self, index: usize) -> Word;

    /// Overwrite argument slot `index`.  Only called with
    /// `index < argument_count()`.
    fn set_argument(&mut self, index: usize, value: Word);

    fn get_return_value(&self) -> Word;

    fn set_return_value(&mut self, value: Word);

    /// Memory reachable through slot contents.
    fn memory(&self) -> &dyn ProcessMemory;

    /// Move `storage` into the invocation's own arena and return its address.
    ///
    /// Used when a script substitutes a value the native code will see, e.g.
    /// `arg0 = &text`.  The storage must stay valid, and at least 8-byte
    /// aligned, for as long as the hooked call can observe it.
    fn retain(&mut self, storage: Vec<u8>) -> Word;

    /// Address of argument slot `index` itself, if the host can expose it.
    fn argument_address(&self, _index: usize) -> Option<Word> {
        None
    }

    /// Address of the return-value slot itself, if the host can expose it.
    fn return_value_address(&self) -> Option<Word> {
        None
    }
}

//! Invocation context over real process memory.
//!
//! The hooking layer builds a [`NativeInvocation`] around the argument
//! words and return-value word of the call it intercepted.  Every pointer
//! a script dereferences through it is read directly; validity of that
//! memory is the hooking layer's contract, not the engine's.

use std::mem::size_of;

use crate::context::{InvocationContext, PointCut, ProcessMemory, Word};
use crate::error::MemoryError;

// ── NativeMemory ──────────────────────────────────────────────────────────────

/// Reads the current process's address space.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeMemory;

impl ProcessMemory for NativeMemory {
    fn read(&self, address: Word, len: usize) -> Result<Vec<u8>, MemoryError> {
        if address == 0 {
            return Err(MemoryError::Null);
        }
        if address.checked_add(len).is_none() {
            return Err(MemoryError::Unreadable { address, len });
        }
        // SAFETY: the hooking layer guarantees that addresses reachable from
        // the intercepted call's slots are readable for the requested length.
        let bytes = unsafe { std::slice::from_raw_parts(address as *const u8, len) };
        Ok(bytes.to_vec())
    }

    fn read_terminated(
        &self,
        address: Word,
        unit_size: usize,
        max_units: usize,
    ) -> Result<Vec<u8>, MemoryError> {
        if address == 0 {
            return Err(MemoryError::Null);
        }
        let units = if unit_size == 1 {
            // SAFETY: as for `read`; strnlen stops at the terminator or
            // after `max_units` bytes.
            unsafe { libc::strnlen(address as *const libc::c_char, max_units) }
        } else {
            let mut n = 0;
            // SAFETY: as for `read`; each unit is read before it is tested.
            while n < max_units
                && unsafe { std::slice::from_raw_parts((address + n * unit_size) as *const u8, unit_size) }
                    .iter()
                    .any(|&b| b != 0)
            {
                n += 1;
            }
            n
        };
        if units == max_units {
            return Err(MemoryError::Unterminated { address, max_units });
        }
        self.read(address, units * unit_size)
    }
}

// ── NativeInvocation ──────────────────────────────────────────────────────────

/// Storage handed out by [`InvocationContext::retain`], kept 8-byte aligned.
#[derive(Debug, Default)]
pub struct Retained {
    chunks: Vec<Box<[u64]>>,
}

impl Retained {
    fn push(&mut self, bytes: Vec<u8>) -> Word {
        let mut chunk = vec![0u64; bytes.len().div_ceil(size_of::<u64>()).max(1)].into_boxed_slice();
        for (word, src) in chunk.iter_mut().zip(bytes.chunks(size_of::<u64>())) {
            let mut raw = [0u8; 8];
            raw[..src.len()].copy_from_slice(src);
            *word = u64::from_ne_bytes(raw);
        }
        let address = chunk.as_ptr() as Word;
        self.chunks.push(chunk);
        address
    }

    /// Number of buffers retained.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Context for one intercepted call whose slots live in host memory.
///
/// Values substituted by the script (`arg0 = &text`) are kept in an arena
/// owned by this struct.  A host that lets the real function run after the
/// enter half must keep them alive with [`NativeInvocation::into_retained`]
/// until the call returns.
#[derive(Debug)]
pub struct NativeInvocation<'a> {
    point_cut: PointCut,
    arguments: &'a mut [Word],
    return_value: &'a mut Word,
    memory: NativeMemory,
    retained: Retained,
}

impl<'a> NativeInvocation<'a> {
    pub fn new(point_cut: PointCut, arguments: &'a mut [Word], return_value: &'a mut Word) -> Self {
        NativeInvocation {
            point_cut,
            arguments,
            return_value,
            memory: NativeMemory,
            retained: Retained::default(),
        }
    }

    /// Release the slots and keep only the retained storage.
    pub fn into_retained(self) -> Retained {
        self.retained
    }
}

impl InvocationContext for NativeInvocation<'_> {
    fn point_cut(&self) -> PointCut {
        self.point_cut
    }

    fn argument_count(&self) -> usize {
        self.arguments.len()
    }

    fn get_argument(&self, index: usize) -> Word {
        self.arguments[index]
    }

    fn set_argument(&mut self, index: usize, value: Word) {
        self.arguments[index] = value;
    }

    fn get_return_value(&self) -> Word {
        *self.return_value
    }

    fn set_return_value(&mut self, value: Word) {
        *self.return_value = value;
    }

    fn memory(&self) -> &dyn ProcessMemory {
        &self.memory
    }

    fn retain(&mut self, storage: Vec<u8>) -> Word {
        self.retained.push(storage)
    }

    fn argument_address(&self, index: usize) -> Option<Word> {
        self.arguments.get(index).map(|slot| slot as *const Word as Word)
    }

    fn return_value_address(&self) -> Option<Word> {
        Some(&*self.return_value as *const Word as Word)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_live_buffers() {
        let data = *b"HELLO";
        let bytes = NativeMemory.read(data.as_ptr() as Word, 5).unwrap();
        assert_eq!(bytes, b"HELLO");
        assert_eq!(NativeMemory.read(0, 1), Err(MemoryError::Null));
    }

    #[test]
    fn reads_terminated_strings() {
        let narrow = b"Hey\0";
        assert_eq!(NativeMemory.read_terminated(narrow.as_ptr() as Word, 1, 64).unwrap(), b"Hey");

        let wide: Vec<u16> = "Hey\0".encode_utf16().collect();
        let bytes = NativeMemory.read_terminated(wide.as_ptr() as Word, 2, 64).unwrap();
        assert_eq!(bytes.len(), 6);
    }

    #[test]
    fn unterminated_within_limit() {
        let narrow = b"abcdef\0";
        assert_eq!(
            NativeMemory.read_terminated(narrow.as_ptr() as Word, 1, 3),
            Err(MemoryError::Unterminated { address: narrow.as_ptr() as Word, max_units: 3 })
        );
    }

    #[test]
    fn retained_storage_is_aligned_and_stable() {
        let mut args = [0 as Word; 2];
        let mut ret: Word = 0;
        let mut inv = NativeInvocation::new(PointCut::Enter, &mut args, &mut ret);
        let a = inv.retain(b"abc\0".to_vec());
        let b = inv.retain(vec![1u8; 20]);
        assert_eq!(a % 8, 0);
        assert_eq!(b % 8, 0);
        assert_eq!(inv.memory().read(a, 4).unwrap(), b"abc\0");
        assert_eq!(inv.memory().read(b, 20).unwrap(), vec![1u8; 20]);
        let retained = inv.into_retained();
        assert_eq!(retained.len(), 2);
    }

    #[test]
    fn slots_read_and_write_through() {
        let mut args = [1 as Word, 2, 3];
        let mut ret: Word = 9;
        {
            let mut inv = NativeInvocation::new(PointCut::Leave, &mut args, &mut ret);
            assert_eq!(inv.argument_count(), 3);
            assert_eq!(inv.get_argument(1), 2);
            inv.set_argument(1, 20);
            inv.set_return_value(90);
            assert_eq!(inv.argument_address(3), None);
            assert!(inv.return_value_address().is_some());
        }
        assert_eq!(args, [1, 20, 3]);
        assert_eq!(ret, 90);
    }
}

//! Shared fixtures: a fake address space and an invocation over it.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use hookscript::error::MemoryError;
use hookscript::{InvocationContext, Message, PointCut, ProcessMemory, Script, Word};

/// Disjoint byte regions at made-up addresses.
#[derive(Debug)]
pub struct FakeMemory {
    regions: Vec<(Word, Vec<u8>)>,
    next: Word,
}

impl Default for FakeMemory {
    fn default() -> Self {
        FakeMemory { regions: Vec::new(), next: 0x1000 }
    }
}

impl FakeMemory {
    /// Place `bytes` at a fresh 16-byte-aligned address.
    pub fn alloc(&mut self, bytes: Vec<u8>) -> Word {
        let base = self.next;
        self.next = (base + bytes.len() + 16 + 15) & !15;
        self.regions.push((base, bytes));
        base
    }

    pub fn alloc_narrow(&mut self, s: &str) -> Word {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        self.alloc(bytes)
    }

    pub fn alloc_wide(&mut self, s: &str) -> Word {
        let mut bytes = Vec::new();
        for u in s.encode_utf16().chain(std::iter::once(0)) {
            bytes.extend_from_slice(&u.to_ne_bytes());
        }
        self.alloc(bytes)
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Read back a NUL-terminated wide string.
    pub fn wide_string_at(&self, address: Word) -> String {
        let bytes = self.read_terminated(address, 2, 4096).expect("wide string");
        let units: Vec<u16> = bytes.chunks_exact(2).map(|p| u16::from_ne_bytes([p[0], p[1]])).collect();
        String::from_utf16(&units).expect("valid UTF-16")
    }

    pub fn word_at(&self, address: Word) -> Word {
        let bytes = self.read(address, std::mem::size_of::<Word>()).expect("word");
        Word::from_ne_bytes(bytes.try_into().expect("word-sized"))
    }
}

impl ProcessMemory for FakeMemory {
    fn read(&self, address: Word, len: usize) -> Result<Vec<u8>, MemoryError> {
        if address == 0 {
            return Err(MemoryError::Null);
        }
        for (base, bytes) in &self.regions {
            if let Some(offset) = address.checked_sub(*base) {
                if offset < bytes.len().max(1) {
                    return match offset.checked_add(len) {
                        Some(end) if end <= bytes.len() => Ok(bytes[offset..end].to_vec()),
                        _ => Err(MemoryError::Unreadable { address, len }),
                    };
                }
            }
        }
        Err(MemoryError::Unreadable { address, len })
    }
}

/// One intercepted call with a fixed number of argument slots.
#[derive(Debug)]
pub struct MockContext {
    pub point_cut: PointCut,
    pub args: Vec<Word>,
    pub retval: Word,
    pub memory: FakeMemory,
}

impl MockContext {
    pub fn new(point_cut: PointCut, arg_count: usize) -> Self {
        MockContext {
            point_cut,
            args: vec![0; arg_count],
            retval: 0,
            memory: FakeMemory::default(),
        }
    }

    pub fn enter(arg_count: usize) -> Self {
        Self::new(PointCut::Enter, arg_count)
    }

    pub fn leave(arg_count: usize) -> Self {
        Self::new(PointCut::Leave, arg_count)
    }
}

impl InvocationContext for MockContext {
    fn point_cut(&self) -> PointCut {
        self.point_cut
    }

    fn argument_count(&self) -> usize {
        self.args.len()
    }

    fn get_argument(&self, index: usize) -> Word {
        self.args[index]
    }

    fn set_argument(&mut self, index: usize, value: Word) {
        self.args[index] = value;
    }

    fn get_return_value(&self) -> Word {
        self.retval
    }

    fn set_return_value(&mut self, value: Word) {
        self.retval = value;
    }

    fn memory(&self) -> &dyn ProcessMemory {
        &self.memory
    }

    fn retain(&mut self, storage: Vec<u8>) -> Word {
        self.memory.alloc(storage)
    }
}

pub type Inbox = Arc<Mutex<Vec<Message>>>;

/// Compile `source` with a handler that collects every message.
pub fn collecting(source: &str) -> (Script, Inbox) {
    let mut script = Script::compile(source).expect("script compiles");
    let inbox: Inbox = Arc::default();
    let sink = Arc::clone(&inbox);
    script.set_message_handler(move |_, msg| sink.lock().expect("inbox").push(msg));
    (script, inbox)
}

pub fn take(inbox: &Inbox) -> Vec<Message> {
    std::mem::take(&mut *inbox.lock().expect("inbox"))
}

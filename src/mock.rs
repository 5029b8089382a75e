//! In-memory stand-in for a target process.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::io;

use crate::process::CopyAddress;

/// Sparse byte-addressed memory. Reading any byte that was never written fails
/// the way an unmapped page does.
#[derive(Debug, Default)]
pub struct MockMemory {
    bytes: RefCell<BTreeMap<usize, u8>>,
    reads: Cell<usize>,
}

impl MockMemory {
    pub fn write(&self, addr: usize, data: &[u8]) {
        let mut bytes = self.bytes.borrow_mut();
        for (i, b) in data.iter().enumerate() {
            bytes.insert(addr + i, *b);
        }
    }

    pub fn write_pointer(&self, addr: usize, value: usize) {
        self.write(addr, &value.to_ne_bytes());
    }

    pub fn write_f32(&self, addr: usize, value: f32) {
        self.write(addr, &value.to_ne_bytes());
    }

    /// Number of `copy_address` calls so far.
    pub fn reads(&self) -> usize {
        self.reads.get()
    }
}

impl CopyAddress for MockMemory {
    fn copy_address(&self, addr: usize, buf: &mut [u8]) -> io::Result<()> {
        self.reads.set(self.reads.get() + 1);
        let bytes = self.bytes.borrow();
        for (i, slot) in buf.iter_mut().enumerate() {
            *slot = *bytes.get(&(addr + i)).ok_or_else(|| {
                io::Error::new(io::ErrorKind::Other, format!("unmapped address {:#x}", addr + i))
            })?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MockMemoryBuilder {
    memory: MockMemory,
}

impl MockMemoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(self, addr: usize, data: &[u8]) -> Self {
        self.memory.write(addr, data);
        self
    }

    pub fn pointer(self, addr: usize, value: usize) -> Self {
        self.memory.write_pointer(addr, value);
        self
    }

    pub fn f32(self, addr: usize, value: f32) -> Self {
        self.memory.write_f32(addr, value);
        self
    }

    pub fn build(self) -> MockMemory {
        self.memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_region_fails() {
        let memory = MockMemoryBuilder::new().bytes(0x10, &[1, 2, 3]).build();
        assert_eq!(memory.read_bytes(0x10, 3).unwrap(), vec![1, 2, 3]);
        assert!(memory.read_bytes(0x10, 4).is_err());
        assert_eq!(memory.reads(), 2);
    }
}

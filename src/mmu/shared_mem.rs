use std::fs;
use std::path::Path;

use anyhow::{ensure, Context};

use crate::base::mem::HasMemory;

/// Flat byte buffer shared between the host and the transfer engine, addressed by the 16-bit
/// address field of an instruction.
#[derive(Debug, Clone)]
pub struct SharedMemory {
    bytes: Vec<u8>,
}

impl HasMemory for SharedMemory {
    fn size(&self) -> usize {
        self.bytes.len()
    }

    fn read_impl(&self, addr: usize, n: usize) -> &[u8] {
        &self.bytes[addr..addr + n]
    }

    fn write_impl(&mut self, addr: usize, data: &[u8]) {
        self.bytes[addr..addr + data.len()].copy_from_slice(data);
    }
}

impl SharedMemory {
    pub const MAX_SIZE: usize = 1 << 16;

    pub fn new(size: usize) -> anyhow::Result<Self> {
        ensure!(
            size > 0 && size <= Self::MAX_SIZE,
            "shared memory of {} bytes does not fit the 16-bit address space",
            size
        );
        Ok(Self { bytes: vec![0u8; size] })
    }

    /// Copies a raw binary image to address 0 and returns its length.
    pub fn load_image(&mut self, path: &Path) -> anyhow::Result<usize> {
        let image = fs::read(path).with_context(|| format!("failed to read memory image {:?}", path))?;
        self.write(0, &image)
            .with_context(|| format!("memory image {:?} is larger than shared memory", path))?;
        Ok(image.len())
    }

    pub fn dump(&self, path: &Path) -> anyhow::Result<()> {
        fs::write(path, &self.bytes).with_context(|| format!("failed to write memory dump {:?}", path))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }
}

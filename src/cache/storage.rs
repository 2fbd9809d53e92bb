//! Line storage behind a [`LineCache`](crate::cache::line_cache::LineCache).
//!
//! Configuration caches assemble a wide line from a stream of narrow chunks; data caches hold a
//! line as an array of fixed-width elements that are written one at a time.
use anyhow::bail;
use num::{BigUint, One, Zero};
use smallvec::SmallVec;

use crate::cache::features::CacheGeometry;
use crate::utils::low_mask;

/// Bytes carried by one streaming transfer between shared memory and a cache.
pub type TransferReg = SmallVec<[u8; 8]>;

pub fn word_from_le(bytes: &[u8]) -> u64 {
    bytes.iter().rev().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

pub fn word_to_le(word: u64, n: usize) -> TransferReg {
    word.to_le_bytes().iter().copied().take(n).collect()
}

/// Read-only view of one line, as consumed by the compute array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineView<'a> {
    Config(&'a BigUint),
    Data(&'a [u64]),
}

pub trait LineStorage: Send {
    fn num_lines(&self) -> usize;

    /// Merges one streamed datum into `line`. Callers have range-checked `line` and `place`.
    fn merge(&mut self, line: usize, place: usize, datum: &[u8]);

    /// Little-endian bytes of the element at `place`, sized to one streaming transfer. Only
    /// element-addressed storage can be drained.
    fn element(&self, _line: usize, _place: usize) -> Option<TransferReg> {
        None
    }

    fn view(&self, line: usize) -> LineView<'_>;

    /// Overwrites a whole line with element values, starting at place 0.
    fn fill(&mut self, line: usize, values: &[u64]) -> anyhow::Result<()>;

    fn clear(&mut self);
}

/// Lines of a configuration cache, each `width` bits wide.
#[derive(Debug, Clone)]
pub struct ConfigLines {
    lines: Vec<BigUint>,
    width: usize,
    chunk: usize,
    mask: BigUint,
}

impl ConfigLines {
    pub fn new(geometry: &CacheGeometry) -> Self {
        let width = geometry.line_bits();
        Self {
            lines: vec![BigUint::zero(); geometry.num_lines],
            width,
            chunk: geometry.granularity_bits,
            mask: (BigUint::one() << width) - BigUint::one(),
        }
    }

    fn rotate_left(&self, value: &BigUint) -> BigUint {
        let hi = (value << self.chunk) & &self.mask;
        let lo = value >> (self.width - self.chunk);
        hi | lo
    }
}

impl LineStorage for ConfigLines {
    fn num_lines(&self) -> usize {
        self.lines.len()
    }

    fn merge(&mut self, line: usize, _place: usize, datum: &[u8]) {
        let chunk = word_from_le(datum) & low_mask(self.chunk as u32);
        let rotated = self.rotate_left(&self.lines[line]);
        self.lines[line] = rotated | BigUint::from(chunk);
    }

    fn view(&self, line: usize) -> LineView<'_> {
        LineView::Config(&self.lines[line])
    }

    fn fill(&mut self, _line: usize, _values: &[u64]) -> anyhow::Result<()> {
        bail!("configuration lines are only written by streaming");
    }

    fn clear(&mut self) {
        self.lines.iter_mut().for_each(|line| *line = BigUint::zero());
    }
}

/// Lines of a data cache, each an array of `places` elements of `element_bits` bits.
#[derive(Debug, Clone)]
pub struct DataLines {
    lines: Vec<Vec<u64>>,
    element_bits: usize,
}

impl DataLines {
    pub fn new(geometry: &CacheGeometry) -> Self {
        Self {
            lines: vec![vec![0u64; geometry.places()]; geometry.num_lines],
            element_bits: geometry.width_bits,
        }
    }

    fn element_mask(&self) -> u64 {
        low_mask(self.element_bits as u32)
    }
}

impl LineStorage for DataLines {
    fn num_lines(&self) -> usize {
        self.lines.len()
    }

    fn merge(&mut self, line: usize, place: usize, datum: &[u8]) {
        self.lines[line][place] = word_from_le(datum) & self.element_mask();
    }

    fn element(&self, line: usize, place: usize) -> Option<TransferReg> {
        Some(word_to_le(self.lines[line][place], self.element_bits / 8))
    }

    fn view(&self, line: usize) -> LineView<'_> {
        LineView::Data(&self.lines[line])
    }

    fn fill(&mut self, line: usize, values: &[u64]) -> anyhow::Result<()> {
        let mask = self.element_mask();
        let Some(target) = self.lines.get_mut(line) else {
            bail!("line {} out of range", line);
        };
        if values.len() > target.len() {
            bail!("{} values do not fit a line of {} places", values.len(), target.len());
        }
        target.iter_mut().zip(values).for_each(|(slot, value)| *slot = value & mask);
        Ok(())
    }

    fn clear(&mut self) {
        self.lines.iter_mut().for_each(|line| line.fill(0));
    }
}

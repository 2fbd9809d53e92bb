use anyhow::bail;

/// Trait for byte-addressed simulated memories.
///
/// Implementors only provide raw slice access; the provided `read`/`write` methods perform the
/// range check before every access so that a bad address becomes an `Err` instead of a panic.
pub trait HasMemory {
    fn size(&self) -> usize;

    fn read_impl(&self, addr: usize, n: usize) -> &[u8];

    fn write_impl(&mut self, addr: usize, data: &[u8]);

    fn check_range(&self, addr: usize, n: usize) -> Result<(), anyhow::Error> {
        match addr.checked_add(n) {
            Some(end) if end <= self.size() => Ok(()),
            _ => bail!(
                "access of {} bytes @ {:#06x} exceeds memory of {} bytes",
                n,
                addr,
                self.size()
            ),
        }
    }

    fn read(&self, addr: usize, n: usize) -> Result<&[u8], anyhow::Error> {
        self.check_range(addr, n)?;
        Ok(self.read_impl(addr, n))
    }

    fn read_n<const N: usize>(&self, addr: usize) -> Result<[u8; N], anyhow::Error> {
        let slice = self.read(addr, N)?;
        Ok(slice.try_into()?)
    }

    fn write(&mut self, addr: usize, data: &[u8]) -> Result<(), anyhow::Error> {
        self.check_range(addr, data.len())?;
        self.write_impl(addr, data);
        Ok(())
    }
}

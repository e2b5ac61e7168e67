use thiserror::Error;

/// Physical base of the SFR window on every supported board.
pub const SFR_BASE: u32 = 0x1F80_0000;
/// Size of the SFR window in bytes (1 MiB).
pub const SFR_WINDOW: u32 = 0x10_0000;
/// Mask applied to bus addresses to obtain a window offset.
pub const SFR_ADDR_MASK: u32 = SFR_WINDOW - 1;

/// Register-file level access errors.
///
/// These are mapped into `SfrError` by the dispatch engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegisterError {
    #[error("Register offset {0:#x} outside the SFR window")]
    OutOfBounds(u32),

    #[error("Misaligned register access at {0:#x}")]
    Misaligned(u32),
}

/// Word-addressable backing store for the whole SFR window.
///
/// Offsets are window offsets (already masked), and every access is a full
/// aligned 32-bit word. Width and byte-lane handling lives in the bus.
pub struct RegisterFile {
    cells: Vec<u32>,
}

impl RegisterFile {
    /// Create a zeroed register file covering the full SFR window.
    pub fn new() -> Self {
        Self::with_size(SFR_WINDOW as usize)
    }

    /// Create a zeroed register file of `size` bytes (rounded down to words).
    pub fn with_size(size: usize) -> Self {
        Self {
            cells: vec![0; size / 4],
        }
    }

    /// Size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.cells.len() * 4
    }

    #[inline(always)]
    fn index(&self, offset: u32) -> Result<usize, RegisterError> {
        if offset & 3 != 0 {
            return Err(RegisterError::Misaligned(offset));
        }
        let idx = (offset >> 2) as usize;
        if idx >= self.cells.len() {
            return Err(RegisterError::OutOfBounds(offset));
        }
        Ok(idx)
    }

    #[inline(always)]
    pub fn read(&self, offset: u32) -> Result<u32, RegisterError> {
        let idx = self.index(offset)?;
        Ok(self.cells[idx])
    }

    #[inline(always)]
    pub fn write(&mut self, offset: u32, value: u32) -> Result<(), RegisterError> {
        let idx = self.index(offset)?;
        self.cells[idx] = value;
        Ok(())
    }

    /// Zero every cell.
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Load a reset pattern on top of a cleared file.
    pub fn load_pattern(&mut self, pattern: &[(u32, u32)]) -> Result<(), RegisterError> {
        self.clear();
        for &(offset, value) in pattern {
            self.write(offset, value)?;
        }
        Ok(())
    }

    /// Iterate over `(offset, value)` for every non-zero cell.
    pub fn iter_nonzero(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != 0)
            .map(|(i, v)| ((i as u32) << 2, *v))
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

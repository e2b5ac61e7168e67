use crate::board::Board;
use crate::bus::SfrBus;
use crate::cpu::CpuLink;
use crate::devices::Peripherals;
use crate::regfile::RegisterFile;
use crate::unlock::UnlockState;
use crate::SfrError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};

/// Version identifier for snapshot compatibility checks.
pub const SNAPSHOT_VERSION: &str = "1.0";

/// Serializable state of the SFR block.
///
/// Only non-zero cells are stored. Peripheral models keep their own state
/// and are not part of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SfrSnapshot {
    pub version: String,
    pub board: Board,
    pub unlock: UnlockState,
    /// Level last signalled to the core.
    pub latched_priority: u8,
    pub cells: Vec<(u32, u32)>,
    /// Hex SHA-256 over the cells, little-endian offset then value.
    pub hash: String,
}

fn cells_hash(cells: &[(u32, u32)]) -> String {
    let mut hasher = Sha256::new();
    for (offset, value) in cells {
        hasher.update(offset.to_le_bytes());
        hasher.update(value.to_le_bytes());
    }
    hex::encode(hasher.finalize())
}

impl SfrSnapshot {
    /// Write the snapshot using bincode.
    pub fn save_to<W: Write>(&self, writer: &mut W) -> Result<(), SfrError> {
        bincode::serialize_into(&mut *writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load_from<R: Read>(reader: &mut R) -> Result<Self, SfrError> {
        Ok(bincode::deserialize_from(reader)?)
    }
}

impl<C: CpuLink, P: Peripherals> SfrBus<C, P> {
    /// Capture the register file, unlock state and interrupt latch.
    pub fn snapshot(&self) -> SfrSnapshot {
        let cells: Vec<(u32, u32)> = self.regs.iter_nonzero().collect();
        SfrSnapshot {
            version: SNAPSHOT_VERSION.to_string(),
            board: self.config.board,
            unlock: self.unlock.state(),
            latched_priority: self.intc.latched(),
            hash: cells_hash(&cells),
            cells,
        }
    }

    /// Restore a previously captured snapshot.
    ///
    /// Nothing changes unless the whole snapshot is accepted. The core is
    /// not signalled: the caller restores its own interrupt state alongside.
    pub fn restore(&mut self, snapshot: &SfrSnapshot) -> Result<(), SfrError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SfrError::Snapshot(format!(
                "version mismatch: expected {}, found {}",
                SNAPSHOT_VERSION, snapshot.version
            )));
        }
        if snapshot.board != self.config.board {
            return Err(SfrError::Snapshot(format!(
                "taken on {}, this block is {}",
                snapshot.board.name(),
                self.config.board.name()
            )));
        }
        let hash = cells_hash(&snapshot.cells);
        if hash != snapshot.hash {
            return Err(SfrError::Snapshot(format!(
                "register hash mismatch: expected {}, computed {}",
                snapshot.hash, hash
            )));
        }

        let mut regs = RegisterFile::new();
        regs.load_pattern(&snapshot.cells)?;
        self.regs = regs;
        self.unlock.restore(snapshot.unlock);
        self.intc.restore_latched(snapshot.latched_priority);
        log::info!(
            "[SFR] Restored snapshot ({} non-zero registers)",
            snapshot.cells.len()
        );
        Ok(())
    }
}

use serde::{Deserialize, Serialize};

/// First word of the system unlock sequence.
pub const SYSKEY_MAGIC1: u32 = 0xAA99_6655;
/// Second word of the system unlock sequence.
pub const SYSKEY_MAGIC2: u32 = 0x5566_99AA;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnlockState {
    #[default]
    Locked,
    Stage1,
    Stage2,
}

/// SYSKEY unlock sequencer.
///
/// Two magic words written in order open a window for exactly one
/// protected write. Anything else relocks.
#[derive(Debug, Default, Clone)]
pub struct SysKeyLock {
    state: UnlockState,
}

impl SysKeyLock {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn state(&self) -> UnlockState {
        self.state
    }

    /// Advance on a SYSKEY write.
    pub fn feed(&mut self, key: u32) -> UnlockState {
        let next = match (self.state, key) {
            (UnlockState::Locked, SYSKEY_MAGIC1) => UnlockState::Stage1,
            (UnlockState::Stage1, SYSKEY_MAGIC2) => UnlockState::Stage2,
            _ => UnlockState::Locked,
        };
        if next != self.state {
            log::debug!("[SYSKEY] {:?} -> {:?} (key {:#010x})", self.state, next, key);
        }
        self.state = next;
        next
    }

    /// Use up the unlock for one protected write.
    ///
    /// Returns whether the write may proceed. The lock is closed either way.
    pub fn consume(&mut self) -> bool {
        let granted = self.state == UnlockState::Stage2;
        self.state = UnlockState::Locked;
        granted
    }

    pub fn reset(&mut self) {
        self.state = UnlockState::Locked;
    }

    pub(crate) fn restore(&mut self, state: UnlockState) {
        self.state = state;
    }
}

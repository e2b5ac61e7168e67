use crate::SfrError;
use crate::writeop::WriteOp;
use std::collections::HashMap;
use std::fmt;

/// Access policy of a register as seen by software.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadWrite,
    ReadOnly,
    WriteOnly,
}

/// Unit part of a generated register name (`U2STA`, `LATB`, `IPC12`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    None,
    Number(u8),
    Letter(char),
}

/// Register name assembled from static parts, so descriptors stay `Copy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterName {
    pub prefix: &'static str,
    pub unit: Unit,
    pub suffix: &'static str,
}

impl RegisterName {
    pub const fn plain(name: &'static str) -> Self {
        Self { prefix: name, unit: Unit::None, suffix: "" }
    }

    pub const fn numbered(prefix: &'static str, n: u8, suffix: &'static str) -> Self {
        Self { prefix, unit: Unit::Number(n), suffix }
    }

    pub const fn lettered(prefix: &'static str, letter: char) -> Self {
        Self { prefix, unit: Unit::Letter(letter), suffix: "" }
    }
}

impl fmt::Display for RegisterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix)?;
        match self.unit {
            Unit::None => {}
            Unit::Number(n) => write!(f, "{}", n)?,
            Unit::Letter(c) => write!(f, "{}", c)?,
        }
        f.write_str(self.suffix)
    }
}

/// Side effect run when a register is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEffect {
    None,
    /// Always reads as zero regardless of the stored value.
    Zero,
    /// Served by the UART receive hook (unit is 1-based).
    UartReceive(u8),
    /// UART status poll hook runs before the stored value is returned.
    UartStatus(u8),
    /// Served by the SPI buffer hook.
    SpiBuffer(u8),
}

/// Side effect run when a register is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteEffect {
    None,
    /// Flag, enable or priority register: rerun arbitration.
    Interrupts,
    SysKey,
    SoftReset,
    UartTransmit(u8),
    UartMode(u8),
    UartStatus(u8),
    SpiControl(u8),
    /// Forwarded to the SPI hook, never stored.
    SpiBuffer(u8),
    EthControl,
    MiiCommand,
    MiiWrite,
    RtcControl,
    /// Port index 0..=9 (A..K without I).
    GpioLatch(u8),
    /// PORTx writes land in LATx.
    GpioPort(u8),
}

impl WriteEffect {
    /// Whether the computed value is committed to the register's own cell.
    pub fn commits(self) -> bool {
        !matches!(self, WriteEffect::SpiBuffer(_))
    }
}

/// Static description of one register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterDescriptor {
    pub offset: u32,
    pub name: RegisterName,
    pub access: Access,
    /// Register has CLR/SET/INV views at +0x4/+0x8/+0xC.
    pub aliased: bool,
    /// Bits software may change; the rest keep their old value.
    pub writable: u32,
    pub read: ReadEffect,
    pub write: WriteEffect,
    /// Write requires a completed unlock sequence.
    pub protected: bool,
}

impl RegisterDescriptor {
    /// Plain read-write storage without alias views.
    pub const fn storage(offset: u32, name: RegisterName) -> Self {
        Self {
            offset,
            name,
            access: Access::ReadWrite,
            aliased: false,
            writable: u32::MAX,
            read: ReadEffect::None,
            write: WriteEffect::None,
            protected: false,
        }
    }

    /// Read-write register with CLR/SET/INV views.
    pub const fn aliased(offset: u32, name: RegisterName) -> Self {
        let mut desc = Self::storage(offset, name);
        desc.aliased = true;
        desc
    }

    pub const fn read_only(mut self) -> Self {
        self.access = Access::ReadOnly;
        self
    }

    pub const fn write_only(mut self) -> Self {
        self.access = Access::WriteOnly;
        self
    }

    pub const fn mask(mut self, writable: u32) -> Self {
        self.writable = writable;
        self
    }

    pub const fn on_read(mut self, effect: ReadEffect) -> Self {
        self.read = effect;
        self
    }

    pub const fn on_write(mut self, effect: WriteEffect) -> Self {
        self.write = effect;
        self
    }

    pub const fn protected(mut self) -> Self {
        self.protected = true;
        self
    }
}

/// Result of resolving a word offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub index: usize,
    pub op: WriteOp,
}

/// Offset to descriptor mapping, built once and immutable afterwards.
///
/// Alias views are entered as separate keys pointing at the same
/// descriptor, tagged with their write operation.
#[derive(Default)]
pub struct DescriptorTable {
    descriptors: Vec<RegisterDescriptor>,
    index: HashMap<u32, Resolved>,
}

impl DescriptorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor and its alias views.
    pub fn insert(&mut self, desc: RegisterDescriptor) -> Result<(), SfrError> {
        let index = self.descriptors.len();
        let ops: &[WriteOp] = if desc.aliased {
            &[WriteOp::Assign, WriteOp::Clear, WriteOp::Set, WriteOp::Invert]
        } else {
            &[WriteOp::Assign]
        };

        for &op in ops {
            let offset = desc.offset + op.alias_offset();
            if self.index.contains_key(&offset) {
                return Err(SfrError::DuplicateRegister(offset));
            }
        }
        for &op in ops {
            self.index.insert(desc.offset + op.alias_offset(), Resolved { index, op });
        }
        self.descriptors.push(desc);
        Ok(())
    }

    /// Resolve a word-aligned offset to its descriptor and write form.
    #[inline]
    pub fn resolve(&self, offset: u32) -> Option<(RegisterDescriptor, WriteOp)> {
        self.index
            .get(&offset)
            .map(|r| (self.descriptors[r.index], r.op))
    }

    /// Descriptor whose base offset is exactly `offset`.
    pub fn get(&self, offset: u32) -> Option<&RegisterDescriptor> {
        match self.index.get(&offset) {
            Some(r) if r.op == WriteOp::Assign => Some(&self.descriptors[r.index]),
            _ => None,
        }
    }

    /// Number of registers (alias views not counted).
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisterDescriptor> {
        self.descriptors.iter()
    }
}

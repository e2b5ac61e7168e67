//! Special function register block of a PIC32MZ microcontroller.
//!
//! The crate maps the 1 MiB SFR window onto a flat register file, gives
//! every register an access policy and optional side effects, and runs the
//! priority interrupt controller on top of it. An instruction core drives
//! it through [`SfrBus::on_bus_read`] and [`SfrBus::on_bus_write`] and
//! receives interrupt and reset signals through [`CpuLink`].

pub mod board;
pub mod bus;
pub mod config;
pub mod cpu;
pub mod descriptor;
pub mod devices;
pub mod irq;
pub mod map;
pub mod regfile;
pub mod script;
pub mod snapshot;
pub mod unlock;
pub mod writeop;

use std::fmt;
use thiserror::Error;

pub use board::Board;
pub use bus::{AccessWidth, BusStats, SfrBus};
pub use config::SfrConfig;
pub use cpu::{CpuLink, InterruptLine};
pub use devices::intc::{Arbitration, InterruptController};
pub use devices::uart::Uarts;
pub use devices::{IoPort, NullPeripherals, Peripherals};
pub use regfile::{RegisterError, RegisterFile, SFR_BASE};
pub use snapshot::{SfrSnapshot, SNAPSHOT_VERSION};
pub use unlock::UnlockState;
pub use writeop::WriteOp;

/// Direction of a bus access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessKind::Read => write!(f, "read"),
            AccessKind::Write => write!(f, "write"),
        }
    }
}

/// Errors surfaced by the SFR block.
///
/// Only `UnsupportedRegister` can come out of a well-formed bus access;
/// the firmware touched an address with no descriptor and the emulated
/// machine cannot continue. Access policy and unlock violations never
/// produce an error.
#[derive(Debug, Error)]
pub enum SfrError {
    #[error("Peripheral register not supported: {access} at {address:#010x}")]
    UnsupportedRegister { address: u32, access: AccessKind },

    #[error("Invalid access width: {0} bytes")]
    InvalidWidth(usize),

    #[error("Unknown interrupt source {0}")]
    UnknownSource(usize),

    #[error("Unknown peripheral unit {0}")]
    UnknownUnit(u8),

    #[error("Register at offset {0:#x} defined twice")]
    DuplicateRegister(u32),

    #[error(transparent)]
    Register(#[from] RegisterError),

    #[error("Script line {line}: {message}")]
    Script { line: usize, message: String },

    #[error("Snapshot rejected: {0}")]
    Snapshot(String),

    #[error("Snapshot codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

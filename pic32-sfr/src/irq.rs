//! Interrupt source numbers shared with peripheral models.
//!
//! Peripherals raise and clear sources by these numbers only.

/// Highest source number implemented by the device.
pub const IRQ_LAST: usize = 190;
/// Number of interrupt sources (0..=IRQ_LAST).
pub const NUM_SOURCES: usize = IRQ_LAST + 1;

pub const CORE_TIMER: usize = 0;
pub const CORE_SOFT0: usize = 1;
pub const CORE_SOFT1: usize = 2;
pub const INT0: usize = 3;

pub const T1: usize = 4;
pub const T2: usize = 9;
pub const T3: usize = 14;
pub const T4: usize = 19;
pub const T5: usize = 24;
pub const T6: usize = 28;
pub const T7: usize = 32;
pub const T8: usize = 36;
pub const T9: usize = 40;

pub const ETH: usize = 153;
pub const RTCC: usize = 166;

/// Timer period-match sources, indexed by timer number minus one.
const TIMERS: [usize; 9] = [T1, T2, T3, T4, T5, T6, T7, T8, T9];

/// First (fault) source of each SPI module; receive and transmit follow.
const SPI_FAULT: [usize; 6] = [109, 142, 154, 163, 176, 185];

/// First (error) source of each UART; receive and transmit follow.
const UART_ERROR: [usize; 6] = [112, 145, 157, 170, 179, 188];

/// Error, receive and transmit sources of one peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqTriple {
    pub error: usize,
    pub rx: usize,
    pub tx: usize,
}

impl IrqTriple {
    const fn starting_at(first: usize) -> Self {
        Self { error: first, rx: first + 1, tx: first + 2 }
    }
}

/// Sources of UART `unit` (1-based).
pub fn uart(unit: u8) -> Option<IrqTriple> {
    let idx = (unit as usize).checked_sub(1)?;
    UART_ERROR.get(idx).map(|&first| IrqTriple::starting_at(first))
}

/// Sources of SPI `unit` (1-based).
pub fn spi(unit: u8) -> Option<IrqTriple> {
    let idx = (unit as usize).checked_sub(1)?;
    SPI_FAULT.get(idx).map(|&first| IrqTriple::starting_at(first))
}

/// Period-match source of timer `unit` (1-based).
pub fn timer(unit: u8) -> Option<usize> {
    let idx = (unit as usize).checked_sub(1)?;
    TIMERS.get(idx).copied()
}

use crate::SfrError;
use crate::devices::{IoPort, Peripherals};
use crate::irq;
use crate::map::{self, NUM_UART};
use std::collections::VecDeque;

/// RX path state (host → guest)
#[derive(Default)]
struct RxState {
    /// Input FIFO (keyboard/serial input from host)
    fifo: VecDeque<u8>,
}

/// TX path state (guest → host)
#[derive(Default)]
struct TxState {
    /// Output FIFO (console output to host)
    fifo: VecDeque<u8>,
}

#[derive(Default)]
struct Channel {
    rx: RxState,
    tx: TxState,
}

/// Host-side model of the six UARTs.
///
/// Transmission is instantaneous: bytes written to UxTXREG land in the
/// output FIFO and the transmitter reports idle again right away.
pub struct Uarts {
    channels: Vec<Channel>,
}

impl Uarts {
    pub fn new() -> Self {
        Self {
            channels: (0..NUM_UART).map(|_| Channel::default()).collect(),
        }
    }

    fn channel(&mut self, unit: u8) -> Option<&mut Channel> {
        (unit as usize)
            .checked_sub(1)
            .and_then(|i| self.channels.get_mut(i))
    }

    // Host I/O methods

    /// Push input byte from host and signal data available.
    pub fn push_input(&mut self, io: &mut IoPort<'_>, unit: u8, byte: u8) -> Result<(), SfrError> {
        let Some(ch) = self.channel(unit) else {
            return Err(SfrError::UnknownUnit(unit));
        };
        ch.rx.fifo.push_back(byte);
        io.set_bits(map::usta(unit), map::USTA_URXDA)?;
        if let Some(irqs) = irq::uart(unit) {
            io.raise_irq(irqs.rx)?;
        }
        Ok(())
    }

    /// Pop one output byte.
    pub fn pop_output(&mut self, unit: u8) -> Option<u8> {
        self.channel(unit)?.tx.fifo.pop_front()
    }

    /// Drain all output of one unit.
    pub fn drain_output(&mut self, unit: u8) -> Vec<u8> {
        match self.channel(unit) {
            Some(ch) => ch.tx.fifo.drain(..).collect(),
            None => Vec::new(),
        }
    }

    pub fn has_output(&self, unit: u8) -> bool {
        (unit as usize)
            .checked_sub(1)
            .and_then(|i| self.channels.get(i))
            .is_some_and(|ch| !ch.tx.fifo.is_empty())
    }

    /// Bytes still waiting to be read by the guest.
    pub fn input_len(&self, unit: u8) -> usize {
        (unit as usize)
            .checked_sub(1)
            .and_then(|i| self.channels.get(i))
            .map_or(0, |ch| ch.rx.fifo.len())
    }
}

impl Default for Uarts {
    fn default() -> Self {
        Self::new()
    }
}

impl Peripherals for Uarts {
    fn uart_put_char(&mut self, io: &mut IoPort<'_>, unit: u8, byte: u8) {
        let Some(ch) = self.channel(unit) else {
            return;
        };
        ch.tx.fifo.push_back(byte);
        // Transmit buffer has room again straight away.
        if let Some(irqs) = irq::uart(unit) {
            if let Err(e) = io.raise_irq(irqs.tx) {
                log::warn!("[UART{}] Failed to raise TX interrupt: {}", unit, e);
            }
        }
    }

    fn uart_get_char(&mut self, io: &mut IoPort<'_>, unit: u8) -> Result<u32, SfrError> {
        let Some(ch) = self.channel(unit) else {
            return Ok(0);
        };
        let byte = ch.rx.fifo.pop_front().unwrap_or(0);
        if ch.rx.fifo.is_empty() {
            io.clear_bits(map::usta(unit), map::USTA_URXDA)?;
            if let Some(irqs) = irq::uart(unit) {
                io.clear_irq(irqs.rx)?;
            }
        }
        Ok(byte as u32)
    }

    fn uart_poll_status(&mut self, io: &mut IoPort<'_>, unit: u8) -> Result<(), SfrError> {
        let has_input = self.input_len(unit) > 0;
        let sta = map::usta(unit);
        io.set_bits(sta, map::USTA_RIDLE | map::USTA_TRMT)?;
        io.clear_bits(sta, map::USTA_UTXBF)?;
        if has_input {
            io.set_bits(sta, map::USTA_URXDA)
        } else {
            io.clear_bits(sta, map::USTA_URXDA)
        }
    }

    fn uart_update_mode(&mut self, io: &mut IoPort<'_>, unit: u8) -> Result<(), SfrError> {
        let mode = io.read(map::umode(unit));
        log::debug!("[UART{}] MODE={:#06x}", unit, mode);
        if mode & map::UMODE_ON == 0 {
            // Module off: receiver is flushed.
            if let Some(ch) = self.channel(unit) {
                ch.rx.fifo.clear();
            }
            io.clear_bits(map::usta(unit), map::USTA_URXDA)?;
        }
        Ok(())
    }

    fn reset(&mut self, io: &mut IoPort<'_>) -> Result<(), SfrError> {
        let _ = io;
        for ch in &mut self.channels {
            ch.rx.fifo.clear();
            ch.tx.fifo.clear();
        }
        Ok(())
    }
}

pub mod intc;
pub mod uart;

use crate::SfrError;
use crate::cpu::CpuLink;
use crate::map;
use crate::regfile::RegisterFile;
use intc::InterruptController;

/// Handle given to peripheral models during a hook.
///
/// It writes register cells directly (no access policy, no aliases) and
/// raises or clears interrupt sources with immediate re-arbitration.
pub struct IoPort<'a> {
    regs: &'a mut RegisterFile,
    intc: &'a mut InterruptController,
    cpu: &'a mut dyn CpuLink,
}

impl<'a> IoPort<'a> {
    pub fn new(
        regs: &'a mut RegisterFile,
        intc: &'a mut InterruptController,
        cpu: &'a mut dyn CpuLink,
    ) -> Self {
        Self { regs, intc, cpu }
    }

    /// Read a register cell. Offsets outside the window read as zero.
    pub fn read(&self, offset: u32) -> u32 {
        self.regs.read(offset).unwrap_or(0)
    }

    pub fn write(&mut self, offset: u32, value: u32) -> Result<(), SfrError> {
        self.regs.write(offset, value)?;
        Ok(())
    }

    pub fn set_bits(&mut self, offset: u32, bits: u32) -> Result<(), SfrError> {
        let value = self.regs.read(offset)?;
        self.write(offset, value | bits)
    }

    pub fn clear_bits(&mut self, offset: u32, bits: u32) -> Result<(), SfrError> {
        let value = self.regs.read(offset)?;
        self.write(offset, value & !bits)
    }

    /// Set an interrupt flag; no-op if already set.
    pub fn raise_irq(&mut self, source: usize) -> Result<bool, SfrError> {
        self.intc.raise(self.regs, self.cpu, source)
    }

    /// Clear an interrupt flag; no-op if already clear.
    pub fn clear_irq(&mut self, source: usize) -> Result<bool, SfrError> {
        self.intc.clear(self.regs, self.cpu, source)
    }
}

/// Hooks through which external peripheral models observe the register
/// block. Every hook has a default, so a model implements only what it
/// backs. Units are 1-based; GPIO ports are indices into
/// [`map::PORT_LETTERS`].
pub trait Peripherals {
    /// A byte was written to UxTXREG.
    fn uart_put_char(&mut self, io: &mut IoPort<'_>, unit: u8, byte: u8) {
        let _ = (io, unit, byte);
    }

    /// UxRXREG is being read; the returned value is stored and returned.
    ///
    /// Without a model, the last byte pushed into the register is returned
    /// and the data-available flag drops.
    fn uart_get_char(&mut self, io: &mut IoPort<'_>, unit: u8) -> Result<u32, SfrError> {
        let value = io.read(map::urxreg(unit));
        io.clear_bits(map::usta(unit), map::USTA_URXDA)?;
        Ok(value)
    }

    /// UxSTA is about to be read.
    ///
    /// Without a model the transmitter is always idle and empty.
    fn uart_poll_status(&mut self, io: &mut IoPort<'_>, unit: u8) -> Result<(), SfrError> {
        let sta = map::usta(unit);
        io.set_bits(sta, map::USTA_RIDLE | map::USTA_TRMT)?;
        io.clear_bits(sta, map::USTA_UTXBF)
    }

    fn uart_update_mode(&mut self, io: &mut IoPort<'_>, unit: u8) -> Result<(), SfrError> {
        let _ = (io, unit);
        Ok(())
    }

    fn uart_update_status(&mut self, io: &mut IoPort<'_>, unit: u8) -> Result<(), SfrError> {
        let _ = (io, unit);
        Ok(())
    }

    /// SPIxCON changed.
    fn spi_control(&mut self, io: &mut IoPort<'_>, unit: u8) -> Result<(), SfrError> {
        let _ = (io, unit);
        Ok(())
    }

    /// A word was written to SPIxBUF.
    fn spi_write_buf(&mut self, io: &mut IoPort<'_>, unit: u8, data: u32) -> Result<(), SfrError> {
        let _ = (io, unit, data);
        Ok(())
    }

    /// SPIxBUF is being read. An empty bus reads all ones.
    fn spi_read_buf(&mut self, io: &mut IoPort<'_>, unit: u8) -> Result<u32, SfrError> {
        let _ = (io, unit);
        Ok(0xFF)
    }

    fn eth_control(&mut self, io: &mut IoPort<'_>) -> Result<(), SfrError> {
        let _ = io;
        Ok(())
    }

    /// EMAC1MCMD written (read or scan request).
    fn mii_command(&mut self, io: &mut IoPort<'_>) -> Result<(), SfrError> {
        let _ = io;
        Ok(())
    }

    /// EMAC1MWTD written (PHY register write).
    fn mii_write(&mut self, io: &mut IoPort<'_>) -> Result<(), SfrError> {
        let _ = io;
        Ok(())
    }

    fn rtc_control(&mut self, io: &mut IoPort<'_>) -> Result<(), SfrError> {
        let _ = io;
        Ok(())
    }

    /// LATx changed, directly or through PORTx.
    fn gpio_write(&mut self, io: &mut IoPort<'_>, port: u8, latch: u32) -> Result<(), SfrError> {
        let _ = (io, port, latch);
        Ok(())
    }

    /// Registers were just reloaded with the power-on pattern; drop any
    /// volatile state (FIFOs, shift registers).
    fn reset(&mut self, io: &mut IoPort<'_>) -> Result<(), SfrError> {
        let _ = io;
        Ok(())
    }
}

/// No peripheral models attached: all hooks keep their defaults.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPeripherals;

impl Peripherals for NullPeripherals {}

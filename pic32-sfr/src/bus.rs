use crate::config::SfrConfig;
use crate::cpu::CpuLink;
use crate::descriptor::{Access, DescriptorTable, ReadEffect, RegisterDescriptor, WriteEffect};
use crate::devices::intc::{Arbitration, InterruptController};
use crate::devices::{IoPort, Peripherals};
use crate::irq;
use crate::map;
use crate::regfile::{RegisterFile, SFR_ADDR_MASK};
use crate::unlock::{SysKeyLock, UnlockState};
use crate::writeop::WriteOp;
use crate::{AccessKind, SfrError};

/// Width of a bus access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessWidth {
    Byte,
    Half,
    Word,
}

impl AccessWidth {
    pub fn from_bytes(width: usize) -> Result<Self, SfrError> {
        match width {
            1 => Ok(AccessWidth::Byte),
            2 => Ok(AccessWidth::Half),
            4 => Ok(AccessWidth::Word),
            other => Err(SfrError::InvalidWidth(other)),
        }
    }

    pub fn bytes(self) -> usize {
        match self {
            AccessWidth::Byte => 1,
            AccessWidth::Half => 2,
            AccessWidth::Word => 4,
        }
    }

    #[inline]
    fn value_mask(self) -> u32 {
        match self {
            AccessWidth::Byte => 0xFF,
            AccessWidth::Half => 0xFFFF,
            AccessWidth::Word => u32::MAX,
        }
    }

    /// Bits of the word touched by an access at byte `lane`.
    #[inline]
    pub fn lane_mask(self, lane: u32) -> u32 {
        self.value_mask() << (lane * 8)
    }

    /// Value seen by the core for a read at `lane`.
    #[inline]
    pub fn extract(self, word: u32, lane: u32) -> u32 {
        (word >> (lane * 8)) & self.value_mask()
    }

    /// Write data moved into its lane.
    #[inline]
    pub fn position(self, value: u32, lane: u32) -> u32 {
        (value & self.value_mask()) << (lane * 8)
    }
}

/// Access counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BusStats {
    pub reads: u64,
    pub writes: u64,
    /// Writes to read-only or reads of write-only registers.
    pub policy_violations: u64,
}

/// The SFR block: register file, descriptor table, interrupt controller
/// and unlock sequencer behind a single read/write entry point.
///
/// All state is owned here and mutated synchronously by the caller's
/// thread. `C` receives interrupt and reset signals; `P` backs the
/// peripheral side effects.
pub struct SfrBus<C: CpuLink, P: Peripherals> {
    pub(crate) config: SfrConfig,
    pub(crate) table: DescriptorTable,
    pub(crate) regs: RegisterFile,
    pub(crate) intc: InterruptController,
    pub(crate) unlock: SysKeyLock,
    pub(crate) cpu: C,
    pub(crate) peripherals: P,
    pub(crate) stats: BusStats,
}

impl<C: CpuLink, P: Peripherals> SfrBus<C, P> {
    /// Build the register map and load the board's power-on pattern.
    pub fn new(config: SfrConfig, cpu: C, peripherals: P) -> Result<Self, SfrError> {
        let table = map::build_table()?;
        let mut regs = RegisterFile::new();
        regs.load_pattern(&config.power_on_pattern())?;
        log::info!(
            "[SFR] {} register block at {:#010x} ({} registers)",
            config.board.name(),
            config.base,
            table.len()
        );
        Ok(Self {
            config,
            table,
            regs,
            intc: InterruptController::new(),
            unlock: SysKeyLock::new(),
            cpu,
            peripherals,
            stats: BusStats::default(),
        })
    }

    // ============================================================
    // Accessors
    // ============================================================

    pub fn config(&self) -> &SfrConfig {
        &self.config
    }

    pub fn table(&self) -> &DescriptorTable {
        &self.table
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    pub fn cpu(&self) -> &C {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut C {
        &mut self.cpu
    }

    pub fn peripherals(&self) -> &P {
        &self.peripherals
    }

    pub fn stats(&self) -> BusStats {
        self.stats
    }

    pub fn unlock_state(&self) -> UnlockState {
        self.unlock.state()
    }

    pub fn interrupt_controller(&self) -> &InterruptController {
        &self.intc
    }

    /// Raw cell value, bypassing policy and side effects.
    pub fn peek(&self, offset: u32) -> Option<u32> {
        self.regs.read(offset & SFR_ADDR_MASK & !3).ok()
    }

    /// Give a peripheral model access to the register block, e.g. to push
    /// a received byte from the host.
    pub fn split_io(&mut self) -> (&mut P, IoPort<'_>) {
        let io = IoPort::new(&mut self.regs, &mut self.intc, &mut self.cpu);
        (&mut self.peripherals, io)
    }

    fn with_io<R>(&mut self, f: impl FnOnce(&mut P, &mut IoPort<'_>) -> R) -> R {
        let mut io = IoPort::new(&mut self.regs, &mut self.intc, &mut self.cpu);
        f(&mut self.peripherals, &mut io)
    }

    // ============================================================
    // Bus entry points
    // ============================================================

    /// Split a bus address into a word offset and a byte lane.
    ///
    /// Misaligned halfwords and words are aligned down to their natural
    /// boundary inside the word.
    fn decode(&self, address: u32, width: AccessWidth) -> (u32, u32) {
        let offset = self.config.offset(address);
        let lane = offset & 3;
        let aligned = match width {
            AccessWidth::Byte => lane,
            AccessWidth::Half => lane & 2,
            AccessWidth::Word => 0,
        };
        if aligned != lane {
            log::warn!("[SFR] Misaligned {}-byte access at {:#010x}, aligning", width.bytes(), address);
        }
        (offset & !3, aligned)
    }

    fn unsupported(&self, address: u32, access: AccessKind) -> SfrError {
        log::error!(
            "[SFR] Peripheral register not supported: {} at {:#010x}",
            access,
            address
        );
        SfrError::UnsupportedRegister { address, access }
    }

    fn policy_violation(&mut self, desc: &RegisterDescriptor, op: WriteOp, access: AccessKind) {
        self.stats.policy_violations += 1;
        log::warn!(
            "[SFR] {} of {:?} register {}{} ignored",
            access,
            desc.access,
            desc.name,
            op.suffix()
        );
    }

    /// Read `width` bytes (1, 2 or 4) at a physical address.
    pub fn on_bus_read(&mut self, address: u32, width: usize) -> Result<u32, SfrError> {
        let width = AccessWidth::from_bytes(width)?;
        let (offset, lane) = self.decode(address, width);
        let Some((desc, op)) = self.table.resolve(offset) else {
            return Err(self.unsupported(address, AccessKind::Read));
        };
        self.stats.reads += 1;

        // CLR/SET/INV views are write-only windows onto the base cell.
        let word = if op.is_alias() {
            0
        } else if desc.access == Access::WriteOnly {
            self.policy_violation(&desc, op, AccessKind::Read);
            0
        } else {
            self.read_register(&desc)?
        };

        let value = width.extract(word, lane);
        log::trace!("[SFR] {}{} -> {:#010x}", desc.name, op.suffix(), value);
        Ok(value)
    }

    fn read_register(&mut self, desc: &RegisterDescriptor) -> Result<u32, SfrError> {
        match desc.read {
            ReadEffect::None => Ok(self.regs.read(desc.offset)?),
            ReadEffect::Zero => Ok(0),
            ReadEffect::UartReceive(unit) => {
                let value = self.with_io(|p, io| p.uart_get_char(io, unit))?;
                self.regs.write(desc.offset, value)?;
                Ok(value)
            }
            ReadEffect::UartStatus(unit) => {
                self.with_io(|p, io| p.uart_poll_status(io, unit))?;
                Ok(self.regs.read(desc.offset)?)
            }
            ReadEffect::SpiBuffer(unit) => self.with_io(|p, io| p.spi_read_buf(io, unit)),
        }
    }

    /// Write the low `width` bytes (1, 2 or 4) of `value` at a physical
    /// address.
    pub fn on_bus_write(&mut self, address: u32, width: usize, value: u32) -> Result<(), SfrError> {
        let width = AccessWidth::from_bytes(width)?;
        let (offset, lane) = self.decode(address, width);
        let Some((desc, op)) = self.table.resolve(offset) else {
            return Err(self.unsupported(address, AccessKind::Write));
        };
        self.stats.writes += 1;

        if desc.access == Access::ReadOnly {
            self.policy_violation(&desc, op, AccessKind::Write);
            return Ok(());
        }
        if desc.protected && !self.unlock.consume() {
            log::debug!("[SFR] {}{} locked, write dropped", desc.name, op.suffix());
            return Ok(());
        }

        let target = match desc.write {
            WriteEffect::GpioPort(port) => map::lat(port),
            _ => desc.offset,
        };
        let old = if desc.write.commits() {
            self.regs.read(target)?
        } else {
            0
        };

        let lane_mask = width.lane_mask(lane);
        let merged = (op.apply(old, width.position(value, lane)) & lane_mask) | (old & !lane_mask);
        let mut new = (merged & desc.writable) | (old & !desc.writable);
        if desc.write == WriteEffect::RtcControl {
            new &= !map::RTCCON_CLKON;
            if new & map::RTCCON_ON != 0 {
                new |= map::RTCCON_CLKON;
            }
        }

        log::trace!(
            "[SFR] {}{} <- {:#010x} ({:#010x} -> {:#010x})",
            desc.name,
            op.suffix(),
            value,
            old,
            new
        );
        if desc.write.commits() {
            self.regs.write(target, new)?;
        }
        self.run_write_effect(desc.write, new)
    }

    fn run_write_effect(&mut self, effect: WriteEffect, new: u32) -> Result<(), SfrError> {
        match effect {
            WriteEffect::None => Ok(()),
            WriteEffect::Interrupts => {
                self.intc.update(&mut self.regs, &mut self.cpu)?;
                Ok(())
            }
            WriteEffect::SysKey => {
                self.unlock.feed(new);
                Ok(())
            }
            WriteEffect::SoftReset => {
                if new & map::RSWRST_SWRST != 0 {
                    self.soft_reset()?;
                }
                Ok(())
            }
            WriteEffect::UartTransmit(unit) => {
                self.with_io(|p, io| p.uart_put_char(io, unit, new as u8));
                Ok(())
            }
            WriteEffect::UartMode(unit) => self.with_io(|p, io| p.uart_update_mode(io, unit)),
            WriteEffect::UartStatus(unit) => self.with_io(|p, io| p.uart_update_status(io, unit)),
            WriteEffect::SpiControl(unit) => self.with_io(|p, io| p.spi_control(io, unit)),
            WriteEffect::SpiBuffer(unit) => self.with_io(|p, io| p.spi_write_buf(io, unit, new)),
            WriteEffect::EthControl => self.with_io(|p, io| p.eth_control(io)),
            WriteEffect::MiiCommand => self.with_io(|p, io| p.mii_command(io)),
            WriteEffect::MiiWrite => self.with_io(|p, io| p.mii_write(io)),
            WriteEffect::RtcControl => self.with_io(|p, io| p.rtc_control(io)),
            WriteEffect::GpioLatch(port) | WriteEffect::GpioPort(port) => {
                self.with_io(|p, io| p.gpio_write(io, port, new))
            }
        }
    }

    // ============================================================
    // Interrupt sources
    // ============================================================

    /// Set the flag of `source` and re-arbitrate. No-op if already set.
    pub fn raise_source(&mut self, source: usize) -> Result<bool, SfrError> {
        self.intc.raise(&mut self.regs, &mut self.cpu, source)
    }

    /// Clear the flag of `source` and re-arbitrate. No-op if already clear.
    pub fn clear_source(&mut self, source: usize) -> Result<bool, SfrError> {
        self.intc.clear(&mut self.regs, &mut self.cpu, source)
    }

    /// Core timer compare line.
    pub fn timer_irq(&mut self, raise: bool) -> Result<bool, SfrError> {
        log::trace!("[SFR] Core timer interrupt {}", if raise { "raised" } else { "cleared" });
        if raise {
            self.raise_source(irq::CORE_TIMER)
        } else {
            self.clear_source(irq::CORE_TIMER)
        }
    }

    /// Core software interrupt 0 or 1.
    pub fn soft_irq(&mut self, num: usize) -> Result<bool, SfrError> {
        if num > 1 {
            return Err(SfrError::UnknownSource(irq::CORE_SOFT0 + num));
        }
        log::trace!("[SFR] Soft interrupt {}", num);
        self.raise_source(irq::CORE_SOFT0 + num)
    }

    /// Force a re-arbitration.
    pub fn recompute(&mut self) -> Result<Arbitration, SfrError> {
        self.intc.update(&mut self.regs, &mut self.cpu)
    }

    /// Current winner, computed without side effects.
    pub fn arbitration(&self) -> Result<Arbitration, SfrError> {
        InterruptController::arbitrate(&self.regs)
    }

    // ============================================================
    // Reset
    // ============================================================

    /// Validated software reset: request a core reset, then reload the
    /// power-on state.
    pub fn soft_reset(&mut self) -> Result<(), SfrError> {
        log::info!("[SFR] Software reset");
        self.cpu.request_cpu_reset();
        self.reset()
    }

    /// Reload the power-on pattern and drop volatile peripheral state.
    ///
    /// The interrupt latch is cleared without signalling the core.
    pub fn reset(&mut self) -> Result<(), SfrError> {
        self.regs.load_pattern(&self.config.power_on_pattern())?;
        self.unlock.reset();
        self.intc.reset();
        self.with_io(|p, io| p.reset(io))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;
    use crate::devices::uart::Uarts;
    use crate::devices::NullPeripherals;
    use crate::map::*;
    use crate::regfile::SFR_BASE;
    use crate::unlock::{SYSKEY_MAGIC1, SYSKEY_MAGIC2};

    #[derive(Default)]
    struct RecordingCpu {
        asserts: Vec<u8>,
        deasserts: u32,
        resets: u32,
    }

    impl CpuLink for RecordingCpu {
        fn assert_hardware_interrupt(&mut self, level: u8) {
            self.asserts.push(level);
        }
        fn deassert_hardware_interrupt(&mut self) {
            self.deasserts += 1;
        }
        fn request_cpu_reset(&mut self) {
            self.resets += 1;
        }
    }

    #[derive(Default)]
    struct RecordingPeripherals {
        spi_writes: Vec<(u8, u32)>,
        gpio: Vec<(u8, u32)>,
        mii_commands: u32,
        resets: u32,
    }

    impl Peripherals for RecordingPeripherals {
        fn spi_write_buf(&mut self, _io: &mut IoPort<'_>, unit: u8, data: u32) -> Result<(), SfrError> {
            self.spi_writes.push((unit, data));
            Ok(())
        }

        fn spi_read_buf(&mut self, _io: &mut IoPort<'_>, _unit: u8) -> Result<u32, SfrError> {
            Ok(0x5A)
        }

        fn gpio_write(&mut self, _io: &mut IoPort<'_>, port: u8, latch: u32) -> Result<(), SfrError> {
            self.gpio.push((port, latch));
            Ok(())
        }

        fn mii_command(&mut self, io: &mut IoPort<'_>) -> Result<(), SfrError> {
            self.mii_commands += 1;
            io.write(EMAC1MRDD, 0x796D)
        }

        fn reset(&mut self, _io: &mut IoPort<'_>) -> Result<(), SfrError> {
            self.resets += 1;
            Ok(())
        }
    }

    type TestBus = SfrBus<RecordingCpu, RecordingPeripherals>;

    fn bus() -> TestBus {
        SfrBus::new(SfrConfig::default(), RecordingCpu::default(), RecordingPeripherals::default()).unwrap()
    }

    fn addr(offset: u32) -> u32 {
        SFR_BASE + offset
    }

    fn unlock(bus: &mut TestBus) {
        bus.on_bus_write(addr(SYSKEY), 4, SYSKEY_MAGIC1).unwrap();
        bus.on_bus_write(addr(SYSKEY), 4, SYSKEY_MAGIC2).unwrap();
        assert_eq!(bus.unlock_state(), UnlockState::Stage2);
    }

    /// IPC value placing `priority` in the field of `source`.
    fn ipc_field(source: usize, priority: u32) -> u32 {
        priority << (2 + (source & 3) * 8)
    }

    #[test]
    fn test_width_helpers() {
        assert_eq!(AccessWidth::Half.lane_mask(2), 0xFFFF_0000);
        assert_eq!(AccessWidth::Byte.lane_mask(2), 0x00FF_0000);
        assert_eq!(AccessWidth::Half.extract(0xAABB_CCDD, 2), 0xAABB);
        assert!(matches!(AccessWidth::from_bytes(3), Err(SfrError::InvalidWidth(3))));
    }

    #[test]
    fn test_sub_word_reads() {
        let mut bus = bus();
        bus.on_bus_write(addr(tmr(1)), 4, 0xAABB_CCDD).unwrap();
        assert_eq!(bus.on_bus_read(addr(tmr(1)) + 1, 1).unwrap(), 0xCC);
        assert_eq!(bus.on_bus_read(addr(tmr(1)) + 3, 1).unwrap(), 0xAA);
        assert_eq!(bus.on_bus_read(addr(tmr(1)) + 2, 2).unwrap(), 0xAABB);
        assert_eq!(bus.on_bus_read(addr(tmr(1)), 2).unwrap(), 0xCCDD);
    }

    #[test]
    fn test_odd_halfword_uses_enclosing_half() {
        let mut bus = bus();
        bus.on_bus_write(addr(tmr(1)), 4, 0xAABB_CCDD).unwrap();
        assert_eq!(bus.on_bus_read(addr(tmr(1)) + 3, 2).unwrap(), 0xAABB);
        assert_eq!(bus.on_bus_read(addr(tmr(1)) + 1, 2).unwrap(), 0xCCDD);

        bus.on_bus_write(addr(tmr(1)) + 3, 2, 0x1234).unwrap();
        assert_eq!(bus.peek(tmr(1)), Some(0x1234_CCDD));
        bus.on_bus_write(addr(tmr(1)) + 1, 2, 0x5678).unwrap();
        assert_eq!(bus.peek(tmr(1)), Some(0x1234_5678));
    }

    #[test]
    fn test_window_at_custom_base() {
        let config = SfrConfig {
            base: 0x1F88_0000,
            ..SfrConfig::default()
        };
        let mut bus = SfrBus::new(config, RecordingCpu::default(), RecordingPeripherals::default()).unwrap();
        assert_eq!(bus.on_bus_read(0x1F88_0000 + DEVID, 4).unwrap(), Board::WiFire.devid());

        bus.on_bus_write(0x1F88_0000 + tmr(4), 4, 0xCAFE).unwrap();
        assert_eq!(bus.peek(tmr(4)), Some(0xCAFE));
        assert_eq!(bus.on_bus_read(0x1F88_0000 + tmr(4) + 1, 1).unwrap(), 0xCA);

        // The default location is just another address to this block.
        let err = bus.on_bus_read(SFR_BASE + 0xF_FFF0, 4).unwrap_err();
        assert!(matches!(err, SfrError::UnsupportedRegister { address: 0x1F8F_FFF0, .. }));
    }

    #[test]
    fn test_sub_word_writes_merge() {
        let mut bus = bus();
        bus.on_bus_write(addr(tmr(1)), 4, 0xAABB_CCDD).unwrap();
        bus.on_bus_write(addr(tmr(1)) + 2, 2, 0x1234).unwrap();
        assert_eq!(bus.peek(tmr(1)), Some(0x1234_CCDD));

        bus.on_bus_write(addr(tmr(1)) + 1, 1, 0xFFEE).unwrap();
        assert_eq!(bus.peek(tmr(1)), Some(0x1234_EEDD));

        // Byte SET through the alias only touches its own lane.
        bus.on_bus_write(addr(tmr(1) + WriteOp::SET_OFFSET), 1, 0x22).unwrap();
        assert_eq!(bus.peek(tmr(1)), Some(0x1234_EEFF));
    }

    #[test]
    fn test_misaligned_word_is_aligned() {
        let mut bus = bus();
        bus.on_bus_write(addr(pr(2)) + 2, 4, 0x0102_0304).unwrap();
        assert_eq!(bus.peek(pr(2)), Some(0x0102_0304));
        assert_eq!(bus.on_bus_read(addr(pr(2)) + 1, 4).unwrap(), 0x0102_0304);
    }

    #[test]
    fn test_alias_operations() {
        let mut bus = bus();
        let samples = [
            (0x0000_0000u32, 0xFFFF_FFFFu32),
            (0xFFFF_FFFF, 0x0000_FFFF),
            (0x1234_5678, 0x0F0F_0F0F),
            (0xA5A5_A5A5, 0x8000_0001),
        ];
        for reg in [tmr(3), odc(2), IPTMR, ubrg(5)] {
            for (old, data) in samples {
                for op in WriteOp::ALIASES {
                    bus.on_bus_write(addr(reg), 4, old).unwrap();
                    bus.on_bus_write(addr(reg + op.alias_offset()), 4, data).unwrap();
                    assert_eq!(bus.on_bus_read(addr(reg), 4).unwrap(), op.apply(old, data));
                    assert_eq!(bus.on_bus_read(addr(reg + op.alias_offset()), 4).unwrap(), 0);
                }
            }
        }
    }

    #[test]
    fn test_unsupported_register_is_fatal() {
        let mut bus = bus();
        let err = bus.on_bus_read(addr(0xF_FFF0), 4).unwrap_err();
        assert!(matches!(
            err,
            SfrError::UnsupportedRegister { address: 0x1F8F_FFF0, access: AccessKind::Read }
        ));
        let err = bus.on_bus_write(addr(0x7_0000), 1, 0).unwrap_err();
        assert!(matches!(err, SfrError::UnsupportedRegister { access: AccessKind::Write, .. }));
        assert!(matches!(bus.on_bus_read(addr(tmr(1)), 8), Err(SfrError::InvalidWidth(8))));
    }

    #[test]
    fn test_read_only_write_is_dropped() {
        let mut bus = bus();
        bus.on_bus_write(addr(DEVID), 4, 0).unwrap();
        bus.on_bus_write(addr(INTSTAT), 4, 0x0000_0305).unwrap();
        assert_eq!(bus.on_bus_read(addr(DEVID), 4).unwrap(), Board::WiFire.devid());
        assert_eq!(bus.on_bus_read(addr(INTSTAT), 4).unwrap(), 0);
        assert_eq!(bus.stats().policy_violations, 2);
    }

    #[test]
    fn test_write_only_read_returns_sentinel() {
        let mut bus = SfrBus::new(SfrConfig::default(), RecordingCpu::default(), Uarts::new()).unwrap();
        bus.on_bus_write(addr(utxreg(1)), 4, b'h' as u32).unwrap();
        assert_eq!(bus.on_bus_read(addr(utxreg(1)), 4).unwrap(), 0);
        assert_eq!(bus.stats().policy_violations, 1);
        assert_eq!(bus.peek(utxreg(1)), Some(b'h' as u32));
    }

    #[test]
    fn test_register_write_masks() {
        let mut bus = bus();

        bus.on_bus_write(addr(CFGCON), 4, u32::MAX).unwrap();
        assert_eq!(bus.peek(CFGCON), Some(CFGCON_WRITABLE));

        // Status bits of UxSTA survive a clearing write.
        bus.on_bus_write(addr(usta(1)), 4, USTA_OERR).unwrap();
        assert_eq!(bus.peek(usta(1)), Some(USTA_RIDLE | USTA_TRMT | USTA_OERR));

        bus.on_bus_write(addr(spistat(2)), 4, u32::MAX).unwrap();
        assert_eq!(bus.peek(spistat(2)), Some(SPISTAT_SPITBE | SPISTAT_SPIROV));
        bus.on_bus_write(addr(spistat(2) + WriteOp::CLR_OFFSET), 4, u32::MAX).unwrap();
        assert_eq!(bus.peek(spistat(2)), Some(SPISTAT_SPITBE));
    }

    #[test]
    fn test_rtccon_clock_follows_on_bit() {
        let mut bus = bus();
        bus.on_bus_write(addr(RTCCON), 4, RTCCON_ON | RTCCON_WREN | RTCCON_HALFSEC).unwrap();
        assert_eq!(bus.peek(RTCCON), Some(RTCCON_ON | RTCCON_WREN | RTCCON_CLKON));
        bus.on_bus_write(addr(RTCCON + WriteOp::CLR_OFFSET), 4, RTCCON_ON).unwrap();
        assert_eq!(bus.peek(RTCCON), Some(RTCCON_WREN));
    }

    #[test]
    fn test_port_write_lands_in_latch() {
        let mut bus = bus();
        let b = port_index('B').unwrap();
        bus.on_bus_write(addr(portx(b)), 4, 0x1234).unwrap();
        assert_eq!(bus.peek(lat(b)), Some(0x1234));
        assert_eq!(bus.peek(portx(b)), Some(0xFFFF));

        bus.on_bus_write(addr(portx(b) + WriteOp::CLR_OFFSET), 2, 0x0004).unwrap();
        assert_eq!(bus.peek(lat(b)), Some(0x1230));
        bus.on_bus_write(addr(lat(b) + WriteOp::INV_OFFSET), 4, 0x1).unwrap();
        assert_eq!(bus.peripherals().gpio, vec![(b, 0x1234), (b, 0x1230), (b, 0x1231)]);
    }

    #[test]
    fn test_spi_buffer_forwarded_not_stored() {
        let mut bus = bus();
        bus.on_bus_write(addr(spibuf(3)), 1, 0xA5).unwrap();
        assert_eq!(bus.peripherals().spi_writes, vec![(3, 0xA5)]);
        assert_eq!(bus.peek(spibuf(3)), Some(0));
        assert_eq!(bus.on_bus_read(addr(spibuf(3)), 1).unwrap(), 0x5A);

        let mut plain = SfrBus::new(SfrConfig::default(), RecordingCpu::default(), NullPeripherals).unwrap();
        assert_eq!(plain.on_bus_read(addr(spibuf(1)), 4).unwrap(), 0xFF);
    }

    #[test]
    fn test_mii_command_hook_updates_registers() {
        let mut bus = bus();
        bus.on_bus_write(addr(EMAC1MCMD), 4, 1).unwrap();
        assert_eq!(bus.peripherals().mii_commands, 1);
        assert_eq!(bus.on_bus_read(addr(EMAC1MRDD), 4).unwrap(), 0x796D);
    }

    #[test]
    fn test_uart_console_round_trip() {
        let mut bus = SfrBus::new(SfrConfig::for_board(Board::MebII), RecordingCpu::default(), Uarts::new()).unwrap();
        for &b in b"ok" {
            bus.on_bus_write(addr(utxreg(1)), 1, b as u32).unwrap();
        }

        {
            let (uarts, mut io) = bus.split_io();
            assert_eq!(uarts.drain_output(1), b"ok".to_vec());
            uarts.push_input(&mut io, 1, b'>').unwrap();
        }
        let sta = bus.on_bus_read(addr(usta(1)), 4).unwrap();
        assert_eq!(sta & (USTA_URXDA | USTA_RIDLE | USTA_TRMT), USTA_URXDA | USTA_RIDLE | USTA_TRMT);
        assert_eq!(bus.on_bus_read(addr(urxreg(1)), 4).unwrap(), b'>' as u32);
        assert_eq!(bus.on_bus_read(addr(usta(1)), 1).unwrap() & USTA_URXDA, 0);
        // Writes to the receive register are a policy violation.
        bus.on_bus_write(addr(urxreg(1)), 4, 0).unwrap();
        assert_eq!(bus.stats().policy_violations, 1);
    }

    #[test]
    fn test_flag_write_triggers_arbitration() {
        let mut bus = bus();
        bus.on_bus_write(addr(ipc(1)), 4, ipc_field(4, 5)).unwrap();
        bus.on_bus_write(addr(iec(0) + WriteOp::SET_OFFSET), 4, 1 << 4).unwrap();
        assert!(bus.cpu().asserts.is_empty());
        bus.on_bus_write(addr(ifs(0) + WriteOp::SET_OFFSET), 4, 1 << 4).unwrap();
        assert_eq!(bus.cpu().asserts, vec![5]);
        assert_eq!(bus.on_bus_read(addr(INTSTAT), 4).unwrap(), 4 | 5 << 8);

        bus.on_bus_write(addr(ifs(0) + WriteOp::CLR_OFFSET), 4, 1 << 4).unwrap();
        assert_eq!(bus.cpu().deasserts, 1);
        assert_eq!(bus.on_bus_read(addr(INTSTAT), 4).unwrap(), 0);
    }

    #[test]
    fn test_source_raise_clear_idempotent() {
        let mut bus = bus();
        bus.on_bus_write(addr(ipc(28)), 4, ipc_field(113, 4)).unwrap();
        bus.on_bus_write(addr(iec(3) + WriteOp::SET_OFFSET), 4, 1 << (113 & 31)).unwrap();

        let before = bus.arbitration().unwrap();
        assert!(bus.raise_source(113).unwrap());
        let count = bus.interrupt_controller().recomputations();
        assert!(!bus.raise_source(113).unwrap());
        assert_eq!(bus.interrupt_controller().recomputations(), count);
        assert_eq!(bus.cpu().asserts, vec![4]);

        assert!(bus.clear_source(113).unwrap());
        assert_eq!(bus.arbitration().unwrap(), before);
        let count = bus.interrupt_controller().recomputations();
        assert!(!bus.clear_source(113).unwrap());
        assert_eq!(bus.interrupt_controller().recomputations(), count);
        assert_eq!(bus.cpu().deasserts, 1);
    }

    #[test]
    fn test_core_timer_and_soft_interrupts() {
        let mut bus = bus();
        bus.on_bus_write(addr(ipc(0)), 4, ipc_field(0, 1) | ipc_field(2, 2)).unwrap();
        bus.on_bus_write(addr(iec(0)), 4, 0b111).unwrap();
        bus.timer_irq(true).unwrap();
        assert_eq!(bus.interrupt_controller().latched(), 1);
        bus.soft_irq(1).unwrap();
        assert_eq!(bus.arbitration().unwrap().vector, 2);
        assert!(bus.soft_irq(2).is_err());
        bus.timer_irq(false).unwrap();
        assert_eq!(bus.cpu().asserts, vec![1, 2]);
    }

    #[test]
    fn test_tie_prefers_lower_vector() {
        let mut bus = bus();
        bus.on_bus_write(addr(ipc(1)), 4, ipc_field(5, 3)).unwrap();
        bus.on_bus_write(addr(ipc(2)), 4, ipc_field(9, 3)).unwrap();
        bus.on_bus_write(addr(iec(0)), 4, (1 << 5) | (1 << 9)).unwrap();
        bus.on_bus_write(addr(ifs(0) + WriteOp::SET_OFFSET), 4, (1 << 5) | (1 << 9)).unwrap();

        let intstat = bus.on_bus_read(addr(INTSTAT), 4).unwrap();
        assert_eq!(intstat & 0xFF, 5);
        assert_eq!(intstat >> 8 & 7, 3);
    }

    #[test]
    fn test_higher_priority_switches_vector() {
        let mut bus = bus();
        bus.on_bus_write(addr(ipc(1)), 4, ipc_field(5, 3)).unwrap();
        bus.on_bus_write(addr(iec(0)), 4, 1 << 5).unwrap();
        bus.raise_source(5).unwrap();
        assert_eq!(bus.cpu().asserts, vec![3]);

        bus.on_bus_write(addr(ipc(0) + WriteOp::SET_OFFSET), 4, ipc_field(2, 6)).unwrap();
        bus.on_bus_write(addr(iec(0) + WriteOp::SET_OFFSET), 4, 1 << 2).unwrap();
        bus.raise_source(2).unwrap();

        let result = bus.arbitration().unwrap();
        assert_eq!((result.vector, result.priority), (2, 6));
        assert_eq!(bus.on_bus_read(addr(INTSTAT), 4).unwrap(), 2 | 6 << 8);
        assert_eq!(bus.cpu().asserts.iter().filter(|&&l| l == 6).count(), 1);
        assert_eq!(bus.cpu().asserts, vec![3, 6]);
    }

    #[test]
    fn test_protected_write_needs_unlock() {
        let mut bus = bus();
        let osccon = Board::WiFire.osccon();

        bus.on_bus_write(addr(OSCCON), 4, 0x0000_0101).unwrap();
        assert_eq!(bus.peek(OSCCON), Some(osccon));

        unlock(&mut bus);
        bus.on_bus_write(addr(OSCCON + WriteOp::SET_OFFSET), 4, 0x0000_0001).unwrap();
        assert_eq!(bus.peek(OSCCON), Some(osccon | 1));
        assert_eq!(bus.unlock_state(), UnlockState::Locked);

        // The unlock was used up by the previous write.
        bus.on_bus_write(addr(OSCCON), 4, 0).unwrap();
        assert_eq!(bus.peek(OSCCON), Some(osccon | 1));
        assert_eq!(bus.stats().policy_violations, 0);
    }

    #[test]
    fn test_broken_sequence_blocks_reset() {
        let mut bus = bus();
        bus.on_bus_write(addr(SYSKEY), 4, SYSKEY_MAGIC1).unwrap();
        bus.on_bus_write(addr(SYSKEY), 4, 0).unwrap();
        bus.on_bus_write(addr(SYSKEY), 4, SYSKEY_MAGIC2).unwrap();
        assert_eq!(bus.unlock_state(), UnlockState::Locked);
        assert_eq!(bus.on_bus_read(addr(SYSKEY), 4).unwrap(), 0);

        bus.on_bus_write(addr(tmr(1)), 4, 77).unwrap();
        bus.on_bus_write(addr(RSWRST), 4, RSWRST_SWRST).unwrap();
        assert_eq!(bus.cpu().resets, 0);
        assert_eq!(bus.peek(tmr(1)), Some(77));
    }

    #[test]
    fn test_unlock_then_unrelated_write_keeps_stage() {
        let mut bus = bus();
        unlock(&mut bus);
        // Unprotected registers do not consume the unlock.
        bus.on_bus_write(addr(tmr(2)), 4, 1).unwrap();
        assert_eq!(bus.unlock_state(), UnlockState::Stage2);
        bus.on_bus_write(addr(RSWRST), 4, 0).unwrap();
        assert_eq!(bus.unlock_state(), UnlockState::Locked);
        assert_eq!(bus.cpu().resets, 0);
    }

    #[test]
    fn test_software_reset_restores_power_on_state() {
        let mut bus = bus();
        bus.on_bus_write(addr(lat(0)), 4, 0).unwrap();
        bus.on_bus_write(addr(tmr(4)), 4, 0x55).unwrap();
        bus.on_bus_write(addr(ubrg(2)), 4, 0x1A).unwrap();
        bus.on_bus_write(addr(ipc(1)), 4, ipc_field(5, 3)).unwrap();
        bus.on_bus_write(addr(iec(0)), 4, 1 << 5).unwrap();
        bus.raise_source(5).unwrap();
        assert_eq!(bus.interrupt_controller().latched(), 3);

        unlock(&mut bus);
        bus.on_bus_write(addr(RSWRST + WriteOp::SET_OFFSET), 4, RSWRST_SWRST).unwrap();

        assert_eq!(bus.cpu().resets, 1);
        assert_eq!(bus.peripherals().resets, 1);
        assert_eq!(bus.unlock_state(), UnlockState::Locked);
        assert_eq!(bus.interrupt_controller().latched(), 0);

        let mut expected: Vec<(u32, u32)> = Board::WiFire
            .reset_pattern()
            .into_iter()
            .filter(|(_, v)| *v != 0)
            .collect();
        expected.sort_unstable();
        let actual: Vec<(u32, u32)> = bus.registers().iter_nonzero().collect();
        assert_eq!(actual, expected);
    }
}

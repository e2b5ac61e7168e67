//! PIC32MZ special-function-register map.
//!
//! Offsets are relative to the start of the SFR window (`0x1F80_0000`).
//! The table built here is pure configuration: every register the
//! dispatch engine understands, with its access policy and side effects.

use crate::SfrError;
use crate::descriptor::{DescriptorTable, ReadEffect, RegisterDescriptor, RegisterName, WriteEffect};

// ============================================================
// System controller
// ============================================================

pub const CFGCON: u32 = 0x0000;
pub const DEVID: u32 = 0x0020;
pub const SYSKEY: u32 = 0x0030;
pub const OSCCON: u32 = 0x1200;
pub const OSCTUN: u32 = 0x1210;
pub const SPLLCON: u32 = 0x1220;
pub const RCON: u32 = 0x1240;
pub const RSWRST: u32 = 0x1250;
pub const REFO1CON: u32 = 0x1280;
pub const PB1DIV: u32 = 0x1300;

/// Peripheral-pin-select input and output mapping registers.
pub const PPS_INPUT_START: u32 = 0x1404;
pub const PPS_OUTPUT_START: u32 = 0x1500;
pub const PPS_END: u32 = 0x16C0;

pub const fn refocon(n: u8) -> u32 {
    REFO1CON + (n as u32 - 1) * 0x20
}

pub const fn pbdiv(n: u8) -> u32 {
    PB1DIV + (n as u32 - 1) * 0x10
}

/// Peripheral bus divisors present on the device (there is no PB6).
pub const PB_BUSES: [u8; 7] = [1, 2, 3, 4, 5, 7, 8];

pub const CFGCON_TDOEN: u32 = 1 << 0;
pub const CFGCON_TROEN: u32 = 1 << 2;
pub const CFGCON_JTAGEN: u32 = 1 << 3;
pub const CFGCON_ECC_MASK: u32 = 3 << 4;
pub const CFGCON_ECC_DISWR: u32 = 3 << 4;
pub const CFGCON_USBSSEN: u32 = 1 << 8;
pub const CFGCON_PGLOCK: u32 = 1 << 11;
pub const CFGCON_PMDLOCK: u32 = 1 << 12;
pub const CFGCON_IOLOCK: u32 = 1 << 13;
pub const CFGCON_OCACLK: u32 = 1 << 16;
pub const CFGCON_ICACLK: u32 = 1 << 17;
pub const CFGCON_CPUPRI: u32 = 1 << 24;
pub const CFGCON_DMAPRI: u32 = 1 << 25;

pub const CFGCON_WRITABLE: u32 = CFGCON_DMAPRI
    | CFGCON_CPUPRI
    | CFGCON_ICACLK
    | CFGCON_OCACLK
    | CFGCON_IOLOCK
    | CFGCON_PMDLOCK
    | CFGCON_PGLOCK
    | CFGCON_USBSSEN
    | CFGCON_ECC_MASK
    | CFGCON_JTAGEN
    | CFGCON_TROEN
    | CFGCON_TDOEN;

/// Software reset trigger bit in RSWRST.
pub const RSWRST_SWRST: u32 = 1 << 0;

// ============================================================
// Interrupt controller
// ============================================================

pub const INTCON: u32 = 0x1_0000;
pub const PRISS: u32 = 0x1_0010;
pub const INTSTAT: u32 = 0x1_0020;
pub const IPTMR: u32 = 0x1_0030;
pub const IFS0: u32 = 0x1_0040;
pub const IEC0: u32 = 0x1_00C0;
pub const IPC0: u32 = 0x1_0140;
pub const OFF0: u32 = 0x1_0540;

/// Number of IFS/IEC banks (32 sources each).
pub const NUM_IRQ_BANKS: usize = 6;
/// Number of IPC registers (4 sources each).
pub const NUM_IPC: usize = 48;

pub const fn ifs(n: usize) -> u32 {
    IFS0 + n as u32 * 0x10
}

pub const fn iec(n: usize) -> u32 {
    IEC0 + n as u32 * 0x10
}

pub const fn ipc(n: usize) -> u32 {
    IPC0 + n as u32 * 0x10
}

pub const fn off(n: usize) -> u32 {
    OFF0 + n as u32 * 4
}

// ============================================================
// Timers, SPI, UART
// ============================================================

pub const NUM_TIMERS: u8 = 9;
pub const NUM_SPI: u8 = 6;
pub const NUM_UART: u8 = 6;

const TIMER_BASE: u32 = 0x4_0000;
const SPI_BASE: u32 = 0x2_1000;
const UART_BASE: u32 = 0x2_2000;
const UNIT_STRIDE: u32 = 0x200;

pub const fn txcon(n: u8) -> u32 {
    TIMER_BASE + (n as u32 - 1) * UNIT_STRIDE
}

pub const fn tmr(n: u8) -> u32 {
    txcon(n) + 0x10
}

pub const fn pr(n: u8) -> u32 {
    txcon(n) + 0x20
}

pub const fn spicon(n: u8) -> u32 {
    SPI_BASE + (n as u32 - 1) * UNIT_STRIDE
}

pub const fn spistat(n: u8) -> u32 {
    spicon(n) + 0x10
}

pub const fn spibuf(n: u8) -> u32 {
    spicon(n) + 0x20
}

pub const fn spibrg(n: u8) -> u32 {
    spicon(n) + 0x30
}

pub const fn spicon2(n: u8) -> u32 {
    spicon(n) + 0x40
}

pub const fn umode(n: u8) -> u32 {
    UART_BASE + (n as u32 - 1) * UNIT_STRIDE
}

pub const fn usta(n: u8) -> u32 {
    umode(n) + 0x10
}

pub const fn utxreg(n: u8) -> u32 {
    umode(n) + 0x20
}

pub const fn urxreg(n: u8) -> u32 {
    umode(n) + 0x30
}

pub const fn ubrg(n: u8) -> u32 {
    umode(n) + 0x40
}

pub const UMODE_ON: u32 = 1 << 15;

pub const USTA_URXDA: u32 = 1 << 0;
pub const USTA_OERR: u32 = 1 << 1;
pub const USTA_FERR: u32 = 1 << 2;
pub const USTA_PERR: u32 = 1 << 3;
pub const USTA_RIDLE: u32 = 1 << 4;
pub const USTA_TRMT: u32 = 1 << 8;
pub const USTA_UTXBF: u32 = 1 << 9;
pub const USTA_READ_ONLY: u32 =
    USTA_URXDA | USTA_FERR | USTA_PERR | USTA_RIDLE | USTA_TRMT | USTA_UTXBF;

pub const SPISTAT_SPIRBF: u32 = 1 << 0;
pub const SPISTAT_SPITBF: u32 = 1 << 1;
pub const SPISTAT_SPITBE: u32 = 1 << 3;
pub const SPISTAT_SPIRBE: u32 = 1 << 5;
pub const SPISTAT_SPIROV: u32 = 1 << 6;

// ============================================================
// GPIO ports
// ============================================================

/// Port letters in register order; there is no port I.
pub const PORT_LETTERS: [char; 10] = ['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K'];
pub const PORT_K: u8 = 9;

const GPIO_BASE: u32 = 0x6_0000;

pub const fn port_base(port: u8) -> u32 {
    GPIO_BASE + port as u32 * 0x100
}

pub const fn ansel(port: u8) -> u32 {
    port_base(port)
}

pub const fn tris(port: u8) -> u32 {
    port_base(port) + 0x10
}

pub const fn portx(port: u8) -> u32 {
    port_base(port) + 0x20
}

pub const fn lat(port: u8) -> u32 {
    port_base(port) + 0x30
}

pub const fn odc(port: u8) -> u32 {
    port_base(port) + 0x40
}

pub const fn cnpu(port: u8) -> u32 {
    port_base(port) + 0x50
}

pub const fn cnpd(port: u8) -> u32 {
    port_base(port) + 0x60
}

pub const fn cncon(port: u8) -> u32 {
    port_base(port) + 0x70
}

pub const fn cnen(port: u8) -> u32 {
    port_base(port) + 0x80
}

pub const fn cnstat(port: u8) -> u32 {
    port_base(port) + 0x90
}

/// Port index for a letter, if the device has that port.
pub fn port_index(letter: char) -> Option<u8> {
    PORT_LETTERS
        .iter()
        .position(|&c| c == letter.to_ascii_uppercase())
        .map(|i| i as u8)
}

// ============================================================
// Ethernet controller and MAC
// ============================================================

pub const ETHCON1: u32 = 0x8_2000;
pub const ETHCON2: u32 = 0x8_2010;
pub const ETHTXST: u32 = 0x8_2020;
pub const ETHRXST: u32 = 0x8_2030;
pub const ETHHT0: u32 = 0x8_2040;
pub const ETHHT1: u32 = 0x8_2050;
pub const ETHPMM0: u32 = 0x8_2060;
pub const ETHPMM1: u32 = 0x8_2070;
pub const ETHPMCS: u32 = 0x8_2080;
pub const ETHPMO: u32 = 0x8_2090;
pub const ETHRXFC: u32 = 0x8_20A0;
pub const ETHRXWM: u32 = 0x8_20B0;
pub const ETHIEN: u32 = 0x8_20C0;
pub const ETHIRQ: u32 = 0x8_20D0;
pub const ETHSTAT: u32 = 0x8_20E0;
pub const ETHRXOVFLOW: u32 = 0x8_2100;
pub const ETHFRMTXOK: u32 = 0x8_2110;
pub const ETHSCOLFRM: u32 = 0x8_2120;
pub const ETHMCOLFRM: u32 = 0x8_2130;
pub const ETHFRMRXOK: u32 = 0x8_2140;
pub const ETHFCSERR: u32 = 0x8_2150;
pub const ETHALGNERR: u32 = 0x8_2160;
pub const EMAC1CFG1: u32 = 0x8_2200;
pub const EMAC1CFG2: u32 = 0x8_2210;
pub const EMAC1IPGT: u32 = 0x8_2220;
pub const EMAC1IPGR: u32 = 0x8_2230;
pub const EMAC1CLRT: u32 = 0x8_2240;
pub const EMAC1MAXF: u32 = 0x8_2250;
pub const EMAC1SUPP: u32 = 0x8_2260;
pub const EMAC1TEST: u32 = 0x8_2270;
pub const EMAC1MCFG: u32 = 0x8_2280;
pub const EMAC1MCMD: u32 = 0x8_2290;
pub const EMAC1MADR: u32 = 0x8_22A0;
pub const EMAC1MWTD: u32 = 0x8_22B0;
pub const EMAC1MRDD: u32 = 0x8_22C0;
pub const EMAC1MIND: u32 = 0x8_22D0;
pub const EMAC1SA0: u32 = 0x8_2300;
pub const EMAC1SA1: u32 = 0x8_2310;
pub const EMAC1SA2: u32 = 0x8_2320;

/// Registers backed by plain storage (no side effects).
const ETH_STORAGE: [(u32, &str); 36] = [
    (ETHCON2, "ETHCON2"),
    (ETHTXST, "ETHTXST"),
    (ETHRXST, "ETHRXST"),
    (ETHHT0, "ETHHT0"),
    (ETHHT1, "ETHHT1"),
    (ETHPMM0, "ETHPMM0"),
    (ETHPMM1, "ETHPMM1"),
    (ETHPMCS, "ETHPMCS"),
    (ETHPMO, "ETHPMO"),
    (ETHRXFC, "ETHRXFC"),
    (ETHRXWM, "ETHRXWM"),
    (ETHIEN, "ETHIEN"),
    (ETHIRQ, "ETHIRQ"),
    (ETHSTAT, "ETHSTAT"),
    (ETHRXOVFLOW, "ETHRXOVFLOW"),
    (ETHFRMTXOK, "ETHFRMTXOK"),
    (ETHSCOLFRM, "ETHSCOLFRM"),
    (ETHMCOLFRM, "ETHMCOLFRM"),
    (ETHFRMRXOK, "ETHFRMRXOK"),
    (ETHFCSERR, "ETHFCSERR"),
    (ETHALGNERR, "ETHALGNERR"),
    (EMAC1CFG1, "EMAC1CFG1"),
    (EMAC1CFG2, "EMAC1CFG2"),
    (EMAC1IPGT, "EMAC1IPGT"),
    (EMAC1IPGR, "EMAC1IPGR"),
    (EMAC1CLRT, "EMAC1CLRT"),
    (EMAC1MAXF, "EMAC1MAXF"),
    (EMAC1SUPP, "EMAC1SUPP"),
    (EMAC1TEST, "EMAC1TEST"),
    (EMAC1MCFG, "EMAC1MCFG"),
    (EMAC1MADR, "EMAC1MADR"),
    (EMAC1MRDD, "EMAC1MRDD"),
    (EMAC1MIND, "EMAC1MIND"),
    (EMAC1SA0, "EMAC1SA0"),
    (EMAC1SA1, "EMAC1SA1"),
    (EMAC1SA2, "EMAC1SA2"),
];

// ============================================================
// RTCC and prefetch
// ============================================================

pub const RTCCON: u32 = 0x0C00;
pub const RTCALRM: u32 = 0x0C10;
pub const RTCTIME: u32 = 0x0C20;
pub const RTCDATE: u32 = 0x0C30;
pub const ALRMTIME: u32 = 0x0C40;
pub const ALRMDATE: u32 = 0x0C50;

pub const RTCCON_HALFSEC: u32 = 1 << 1;
pub const RTCCON_SYNC: u32 = 1 << 2;
pub const RTCCON_WREN: u32 = 1 << 3;
pub const RTCCON_CLKON: u32 = 1 << 6;
pub const RTCCON_ON: u32 = 1 << 15;

/// BCD field positions in RTCTIME and RTCDATE.
pub const RTCTIME_SEC: u32 = 8;
pub const RTCTIME_MIN: u32 = 16;
pub const RTCTIME_HOUR: u32 = 24;
pub const RTCDATE_DAY: u32 = 8;
pub const RTCDATE_MONTH: u32 = 16;
pub const RTCDATE_YEAR: u32 = 24;

pub const PRECON: u32 = 0xE_0000;
pub const PRESTAT: u32 = 0xE_0010;

// ============================================================
// Table construction
// ============================================================

/// Build the descriptor table for the whole SFR window.
pub fn build_table() -> Result<DescriptorTable, SfrError> {
    let mut t = DescriptorTable::new();
    system_controller(&mut t)?;
    interrupt_controller(&mut t)?;
    timers(&mut t)?;
    spi(&mut t)?;
    uarts(&mut t)?;
    gpio(&mut t)?;
    ethernet(&mut t)?;
    rtcc_and_prefetch(&mut t)?;
    Ok(t)
}

fn system_controller(t: &mut DescriptorTable) -> Result<(), SfrError> {
    use RegisterDescriptor as R;
    use RegisterName as N;

    t.insert(R::aliased(CFGCON, N::plain("CFGCON")).mask(CFGCON_WRITABLE))?;
    t.insert(R::storage(DEVID, N::plain("DEVID")).read_only())?;
    t.insert(
        R::storage(SYSKEY, N::plain("SYSKEY"))
            .on_read(ReadEffect::Zero)
            .on_write(WriteEffect::SysKey),
    )?;
    t.insert(R::aliased(OSCCON, N::plain("OSCCON")).protected())?;
    t.insert(R::aliased(OSCTUN, N::plain("OSCTUN")))?;
    t.insert(R::aliased(SPLLCON, N::plain("SPLLCON")).protected())?;
    t.insert(R::aliased(RCON, N::plain("RCON")))?;
    t.insert(
        R::aliased(RSWRST, N::plain("RSWRST"))
            .protected()
            .on_write(WriteEffect::SoftReset),
    )?;
    for n in 1..=4 {
        t.insert(R::aliased(refocon(n), N::numbered("REFO", n, "CON")))?;
        t.insert(R::aliased(refocon(n) + 0x10, N::numbered("REFO", n, "TRIM")))?;
    }
    for n in PB_BUSES {
        t.insert(R::aliased(pbdiv(n), N::numbered("PB", n, "DIV")))?;
    }

    // Pin selects are plain words packed at a 4-byte stride.
    for offset in (PPS_INPUT_START..PPS_OUTPUT_START).step_by(4) {
        t.insert(R::storage(offset, N::plain("PPSIN")))?;
    }
    for offset in (PPS_OUTPUT_START..PPS_END).step_by(4) {
        t.insert(R::storage(offset, N::plain("PPSOUT")))?;
    }
    Ok(())
}

fn interrupt_controller(t: &mut DescriptorTable) -> Result<(), SfrError> {
    use RegisterDescriptor as R;
    use RegisterName as N;

    t.insert(R::aliased(INTCON, N::plain("INTCON")))?;
    t.insert(R::aliased(PRISS, N::plain("PRISS")))?;
    t.insert(R::storage(INTSTAT, N::plain("INTSTAT")).read_only())?;
    t.insert(R::aliased(IPTMR, N::plain("IPTMR")))?;
    for n in 0..NUM_IRQ_BANKS {
        t.insert(R::aliased(ifs(n), N::numbered("IFS", n as u8, "")).on_write(WriteEffect::Interrupts))?;
        t.insert(R::aliased(iec(n), N::numbered("IEC", n as u8, "")).on_write(WriteEffect::Interrupts))?;
    }
    for n in 0..NUM_IPC {
        t.insert(R::aliased(ipc(n), N::numbered("IPC", n as u8, "")).on_write(WriteEffect::Interrupts))?;
    }
    for n in 0..crate::irq::NUM_SOURCES {
        t.insert(R::storage(off(n), N::numbered("OFF", n as u8, "")))?;
    }
    Ok(())
}

fn timers(t: &mut DescriptorTable) -> Result<(), SfrError> {
    use RegisterDescriptor as R;
    use RegisterName as N;

    for n in 1..=NUM_TIMERS {
        t.insert(R::aliased(txcon(n), N::numbered("T", n, "CON")))?;
        t.insert(R::aliased(tmr(n), N::numbered("TMR", n, "")))?;
        t.insert(R::aliased(pr(n), N::numbered("PR", n, "")))?;
    }
    Ok(())
}

fn spi(t: &mut DescriptorTable) -> Result<(), SfrError> {
    use RegisterDescriptor as R;
    use RegisterName as N;

    for n in 1..=NUM_SPI {
        t.insert(R::aliased(spicon(n), N::numbered("SPI", n, "CON")).on_write(WriteEffect::SpiControl(n)))?;
        t.insert(R::aliased(spistat(n), N::numbered("SPI", n, "STAT")).mask(SPISTAT_SPIROV))?;
        t.insert(
            R::storage(spibuf(n), N::numbered("SPI", n, "BUF"))
                .on_read(ReadEffect::SpiBuffer(n))
                .on_write(WriteEffect::SpiBuffer(n)),
        )?;
        t.insert(R::aliased(spibrg(n), N::numbered("SPI", n, "BRG")))?;
        t.insert(R::aliased(spicon2(n), N::numbered("SPI", n, "CON2")))?;
    }
    Ok(())
}

fn uarts(t: &mut DescriptorTable) -> Result<(), SfrError> {
    use RegisterDescriptor as R;
    use RegisterName as N;

    for n in 1..=NUM_UART {
        t.insert(R::aliased(umode(n), N::numbered("U", n, "MODE")).on_write(WriteEffect::UartMode(n)))?;
        t.insert(
            R::aliased(usta(n), N::numbered("U", n, "STA"))
                .mask(!USTA_READ_ONLY)
                .on_read(ReadEffect::UartStatus(n))
                .on_write(WriteEffect::UartStatus(n)),
        )?;
        t.insert(
            R::storage(utxreg(n), N::numbered("U", n, "TXREG"))
                .write_only()
                .on_write(WriteEffect::UartTransmit(n)),
        )?;
        t.insert(
            R::storage(urxreg(n), N::numbered("U", n, "RXREG"))
                .read_only()
                .on_read(ReadEffect::UartReceive(n)),
        )?;
        t.insert(R::aliased(ubrg(n), N::numbered("U", n, "BRG")))?;
    }
    Ok(())
}

fn gpio(t: &mut DescriptorTable) -> Result<(), SfrError> {
    use RegisterDescriptor as R;
    use RegisterName as N;

    for (i, &letter) in PORT_LETTERS.iter().enumerate() {
        let port = i as u8;
        if port != PORT_K {
            t.insert(R::aliased(ansel(port), N::lettered("ANSEL", letter)))?;
        }
        t.insert(R::aliased(tris(port), N::lettered("TRIS", letter)))?;
        t.insert(R::aliased(portx(port), N::lettered("PORT", letter)).on_write(WriteEffect::GpioPort(port)))?;
        t.insert(R::aliased(lat(port), N::lettered("LAT", letter)).on_write(WriteEffect::GpioLatch(port)))?;
        t.insert(R::aliased(odc(port), N::lettered("ODC", letter)))?;
        t.insert(R::aliased(cnpu(port), N::lettered("CNPU", letter)))?;
        t.insert(R::aliased(cnpd(port), N::lettered("CNPD", letter)))?;
        t.insert(R::aliased(cncon(port), N::lettered("CNCON", letter)))?;
        t.insert(R::aliased(cnen(port), N::lettered("CNEN", letter)))?;
        t.insert(R::aliased(cnstat(port), N::lettered("CNSTAT", letter)))?;
    }
    Ok(())
}

fn ethernet(t: &mut DescriptorTable) -> Result<(), SfrError> {
    use RegisterDescriptor as R;
    use RegisterName as N;

    t.insert(R::aliased(ETHCON1, N::plain("ETHCON1")).on_write(WriteEffect::EthControl))?;
    t.insert(R::aliased(EMAC1MCMD, N::plain("EMAC1MCMD")).on_write(WriteEffect::MiiCommand))?;
    t.insert(R::aliased(EMAC1MWTD, N::plain("EMAC1MWTD")).on_write(WriteEffect::MiiWrite))?;
    for (offset, name) in ETH_STORAGE {
        t.insert(R::aliased(offset, N::plain(name)))?;
    }
    Ok(())
}

fn rtcc_and_prefetch(t: &mut DescriptorTable) -> Result<(), SfrError> {
    use RegisterDescriptor as R;
    use RegisterName as N;

    t.insert(
        R::aliased(RTCCON, N::plain("RTCCON"))
            .mask(!(RTCCON_HALFSEC | RTCCON_SYNC | RTCCON_CLKON))
            .on_write(WriteEffect::RtcControl),
    )?;
    t.insert(R::aliased(RTCALRM, N::plain("RTCALRM")))?;
    t.insert(R::aliased(RTCTIME, N::plain("RTCTIME")))?;
    t.insert(R::aliased(RTCDATE, N::plain("RTCDATE")))?;
    t.insert(R::aliased(ALRMTIME, N::plain("ALRMTIME")))?;
    t.insert(R::aliased(ALRMDATE, N::plain("ALRMDATE")))?;
    t.insert(R::aliased(PRECON, N::plain("PRECON")))?;
    t.insert(R::aliased(PRESTAT, N::plain("PRESTAT")))?;
    Ok(())
}

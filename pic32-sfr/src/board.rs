use crate::map::*;
use serde::{Deserialize, Serialize};

/// Supported boards. They differ only in identity registers, clock
/// setup, pin defaults and which peripherals the firmware uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum Board {
    /// chipKIT WiFire
    #[default]
    #[value(name = "wifire")]
    WiFire,
    /// Microchip MEB-II
    #[value(name = "meb2")]
    MebII,
    /// Microchip Explorer-16
    #[value(name = "explorer16")]
    Explorer16,
    /// Olimex HMZ144
    #[value(name = "hmz144")]
    Hmz144,
}

/// A chip-select line as (port index, pin).
pub type PinRef = (u8, u8);

impl Board {
    pub fn name(self) -> &'static str {
        match self {
            Board::WiFire => "chipKIT WiFire",
            Board::MebII => "Microchip MEB-II",
            Board::Explorer16 => "Microchip Explorer16",
            Board::Hmz144 => "Olimex HMZ144",
        }
    }

    pub fn devid(self) -> u32 {
        match self {
            Board::WiFire => 0x4510_E053,     // MZ2048ECG100 rev A4
            Board::MebII => 0x4512_7053,      // MZ2048ECH144 rev A4
            Board::Explorer16 => 0x3511_3053, // MZ2048ECH100 rev A3
            Board::Hmz144 => 0x5512_2053,     // MZ2048ECG144 rev A5
        }
    }

    pub fn osccon(self) -> u32 {
        match self {
            Board::Hmz144 => 0x0000_1122, // 12 MHz crystal
            _ => 0x0000_1120,             // 24 MHz crystal
        }
    }

    pub fn spllcon(self) -> u32 {
        match self {
            Board::Hmz144 => 0x0163_0201,
            _ => 0x0131_0201,
        }
    }

    /// UART carrying the firmware console (1-based).
    pub fn console_uart(self) -> u8 {
        match self {
            Board::WiFire => 4,
            Board::MebII | Board::Explorer16 => 1,
            Board::Hmz144 => 2,
        }
    }

    /// SPI port wired to the SD card slot (1-based).
    pub fn sdcard_spi(self) -> u8 {
        match self {
            Board::WiFire => 3,
            Board::MebII | Board::Hmz144 => 2,
            Board::Explorer16 => 1,
        }
    }

    /// SD card chip selects (card 0, card 1).
    pub fn sdcard_selects(self) -> [Option<PinRef>; 2] {
        const B: u8 = 1;
        const C: u8 = 2;
        match self {
            Board::WiFire => [Some((C, 3)), None],
            Board::MebII | Board::Hmz144 => [Some((B, 14)), None],
            Board::Explorer16 => [Some((B, 1)), Some((B, 2))],
        }
    }

    /// Power-on values of every register that does not reset to zero.
    ///
    /// The register file is cleared before this is applied.
    pub fn reset_pattern(self) -> Vec<(u32, u32)> {
        let mut p = vec![
            (PRECON, 0x0000_0007),
            (CFGCON, CFGCON_ECC_DISWR | CFGCON_TDOEN),
            (DEVID, self.devid()),
            (OSCCON, self.osccon()),
            (SPLLCON, self.spllcon()),
        ];

        for n in PB_BUSES {
            let value = if n == 7 { 0x8800 } else { 0x8801 };
            p.push((pbdiv(n), value));
        }

        // All pins are digital-off inputs, driven high.
        for (i, &letter) in PORT_LETTERS.iter().enumerate() {
            let port = i as u8;
            if port != PORT_K {
                p.push((ansel(port), 0xFFFF));
            }
            p.push((tris(port), 0xFFFF));
            let mut port_value = if letter == 'A' { 0xFFCF } else { 0xFFFF };
            let mut lat_value = 0xFFFF;
            match (self, letter) {
                // Button 1 on RB12 reads as pressed-off.
                (Board::MebII, 'B') => port_value ^= 1 << 12,
                // Keeps the chipKIT bootloader from waiting on RC12.
                (Board::WiFire, 'C') => lat_value ^= 0x1000,
                _ => {}
            }
            p.push((portx(port), port_value));
            p.push((lat(port), lat_value));
        }

        for n in 1..=NUM_UART {
            p.push((usta(n), USTA_RIDLE | USTA_TRMT));
        }
        for n in 1..=NUM_SPI {
            p.push((spistat(n), SPISTAT_SPITBE));
        }
        for n in 1..=NUM_TIMERS {
            p.push((pr(n), 0xFFFF));
        }

        p.extend_from_slice(&[
            (EMAC1CFG1, 0x800D),
            (EMAC1CFG2, 0x4082),
            (EMAC1IPGT, 0x0012),
            (EMAC1IPGR, 0x0C12),
            (EMAC1CLRT, 0x370F),
            (EMAC1MAXF, 0x05EE),
            (EMAC1SUPP, 0x1000),
            (EMAC1MCFG, 0x0020),
            (EMAC1MADR, 0x0100),
            (EMAC1SA0, 0x79C1),
            (EMAC1SA1, 0xCBC0),
            (EMAC1SA2, 0x1E00),
        ]);
        p
    }
}

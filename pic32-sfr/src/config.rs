use crate::board::Board;
use crate::map;
use crate::regfile::{SFR_ADDR_MASK, SFR_BASE, SFR_WINDOW};
use std::time::{SystemTime, UNIX_EPOCH};

/// Static configuration of the SFR block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SfrConfig {
    pub board: Board,
    /// Physical address where the window is mapped.
    pub base: u32,
    /// Seed RTCTIME/RTCDATE from the host's UTC clock at power-on.
    /// Off leaves both at zero, which keeps runs reproducible.
    pub host_clock: bool,
}

impl SfrConfig {
    pub fn for_board(board: Board) -> Self {
        Self { board, ..Self::default() }
    }

    /// Whether a physical address falls inside the window.
    pub fn contains(&self, address: u32) -> bool {
        address.wrapping_sub(self.base) < SFR_WINDOW
    }

    /// Window offset of a bus address, relative to `base`.
    ///
    /// Addresses outside the window wrap into it, the way the core's
    /// segment mirrors reach the same registers.
    #[inline]
    pub fn offset(&self, address: u32) -> u32 {
        address.wrapping_sub(self.base) & SFR_ADDR_MASK
    }

    /// Board reset pattern plus the calendar registers when the host clock
    /// is enabled.
    pub fn power_on_pattern(&self) -> Vec<(u32, u32)> {
        let mut cells = self.board.reset_pattern();
        if self.host_clock {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            let (time, date) = rtc_registers(now);
            log::debug!("[SFR] RTC seeded: RTCTIME={:#010x} RTCDATE={:#010x}", time, date);
            cells.push((map::RTCTIME, time));
            cells.push((map::RTCDATE, date));
        }
        cells
    }
}

impl Default for SfrConfig {
    fn default() -> Self {
        Self {
            board: Board::default(),
            base: SFR_BASE,
            host_clock: false,
        }
    }
}

fn bcd(value: u64) -> u32 {
    let value = (value % 100) as u32;
    (value / 10) << 4 | value % 10
}

/// Civil (year, month, day) of a day count since 1970-01-01.
fn civil_from_days(days: u64) -> (u64, u64, u64) {
    let z = days + 719_468;
    let era = z / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + u64::from(month <= 2);
    (year, month, day)
}

/// BCD RTCTIME and RTCDATE values for a UTC timestamp.
pub fn rtc_registers(unix_secs: u64) -> (u32, u32) {
    let days = unix_secs / 86_400;
    let secs = unix_secs % 86_400;
    let (year, month, day) = civil_from_days(days);
    // 1970-01-01 was a Thursday.
    let weekday = (days + 4) % 7;

    let time = bcd(secs % 60) << map::RTCTIME_SEC
        | bcd(secs / 60 % 60) << map::RTCTIME_MIN
        | bcd(secs / 3600) << map::RTCTIME_HOUR;
    let date = bcd(weekday)
        | bcd(day) << map::RTCDATE_DAY
        | bcd(month) << map::RTCDATE_MONTH
        | bcd(year.saturating_sub(2000)) << map::RTCDATE_YEAR;
    (time, date)
}

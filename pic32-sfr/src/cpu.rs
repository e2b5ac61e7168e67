/// Signals from the SFR block to the instruction core.
///
/// The interrupt controller only calls the interrupt methods when the
/// published priority actually changes.
pub trait CpuLink {
    /// Request an external interrupt at `level` (1..=7).
    fn assert_hardware_interrupt(&mut self, level: u8);

    /// No source is armed any more.
    fn deassert_hardware_interrupt(&mut self);

    /// A validated software reset was performed.
    fn request_cpu_reset(&mut self);
}

/// Simple latch of the core-facing lines, for hosts that poll.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InterruptLine {
    pub level: u8,
    pub asserted: bool,
    pub resets_requested: u32,
}

impl CpuLink for InterruptLine {
    fn assert_hardware_interrupt(&mut self, level: u8) {
        self.level = level;
        self.asserted = true;
    }

    fn deassert_hardware_interrupt(&mut self) {
        self.level = 0;
        self.asserted = false;
    }

    fn request_cpu_reset(&mut self) {
        self.resets_requested += 1;
    }
}

impl<T: CpuLink + ?Sized> CpuLink for &mut T {
    fn assert_hardware_interrupt(&mut self, level: u8) {
        (**self).assert_hardware_interrupt(level)
    }

    fn deassert_hardware_interrupt(&mut self) {
        (**self).deassert_hardware_interrupt()
    }

    fn request_cpu_reset(&mut self) {
        (**self).request_cpu_reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_line_tracks_level() {
        let mut line = InterruptLine::default();
        line.assert_hardware_interrupt(5);
        assert!(line.asserted);
        assert_eq!(line.level, 5);
        line.deassert_hardware_interrupt();
        assert!(!line.asserted);
        assert_eq!(line.level, 0);
        line.request_cpu_reset();
        assert_eq!(line.resets_requested, 1);
    }
}

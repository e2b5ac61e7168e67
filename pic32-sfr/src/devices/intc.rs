use crate::SfrError;
use crate::cpu::CpuLink;
use crate::irq::NUM_SOURCES;
use crate::map::{self, INTSTAT, NUM_IRQ_BANKS};
use crate::regfile::RegisterFile;

/// Outcome of one priority scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Arbitration {
    pub pending: bool,
    pub vector: u32,
    pub priority: u8,
}

impl Arbitration {
    /// INTSTAT encoding: vector in bits 0..7, requested level in bits 8..10.
    #[inline]
    pub fn intstat(&self) -> u32 {
        if self.pending {
            self.vector | (self.priority as u32) << 8
        } else {
            0
        }
    }
}

/// Priority arbiter over the IFS/IEC/IPC registers.
///
/// Flag, enable and priority bits live in the register file. The
/// controller only keeps the level currently latched into the core, so
/// it can signal the core on changes and nothing else.
#[derive(Debug, Default)]
pub struct InterruptController {
    latched: u8,
    recomputations: u64,
}

impl InterruptController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Level last signalled to the core.
    #[inline]
    pub fn latched(&self) -> u8 {
        self.latched
    }

    /// Number of times arbitration has been rerun.
    #[inline]
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }

    /// Drop the latch without signalling the core (used by soft reset).
    pub fn reset(&mut self) {
        self.latched = 0;
    }

    pub(crate) fn restore_latched(&mut self, level: u8) {
        self.latched = level & 7;
    }

    /// Priority level of `source` from its IPC field.
    pub fn source_priority(regs: &RegisterFile, source: usize) -> Result<u8, SfrError> {
        let ipc = regs.read(map::ipc(source >> 2))?;
        Ok(((ipc >> (2 + (source & 3) * 8)) & 7) as u8)
    }

    /// Scan every source and pick the winner.
    ///
    /// Only a strictly greater level replaces the current winner, so the
    /// lowest index wins a tie.
    pub fn arbitrate(regs: &RegisterFile) -> Result<Arbitration, SfrError> {
        let mut armed = [0u32; NUM_IRQ_BANKS];
        for (n, bank) in armed.iter_mut().enumerate() {
            *bank = regs.read(map::ifs(n))? & regs.read(map::iec(n))?;
        }

        // Quick check: nothing armed in any bank.
        if armed.iter().all(|&b| b == 0) {
            return Ok(Arbitration::default());
        }

        let mut result = Arbitration::default();
        for source in 0..NUM_SOURCES {
            if (armed[source >> 5] >> (source & 31)) & 1 == 0 {
                continue;
            }
            let level = Self::source_priority(regs, source)?;
            if level > result.priority {
                result.vector = source as u32;
                result.priority = level;
            }
        }
        // Armed sources at level 0 never interrupt the core.
        result.pending = result.priority > 0;
        Ok(result)
    }

    /// Rerun arbitration, publish INTSTAT and signal the core on change.
    pub fn update(
        &mut self,
        regs: &mut RegisterFile,
        cpu: &mut dyn CpuLink,
    ) -> Result<Arbitration, SfrError> {
        self.recomputations += 1;
        let result = Self::arbitrate(regs)?;
        regs.write(INTSTAT, result.intstat())?;

        if result.priority != self.latched {
            log::debug!(
                "[INTC] Priority level {} -> {} (vector {})",
                self.latched,
                result.priority,
                result.vector
            );
            self.latched = result.priority;
            if result.priority > 0 {
                cpu.assert_hardware_interrupt(result.priority);
            } else {
                cpu.deassert_hardware_interrupt();
            }
        }
        Ok(result)
    }

    #[inline]
    fn check_source(source: usize) -> Result<(u32, u32), SfrError> {
        if source >= NUM_SOURCES {
            return Err(SfrError::UnknownSource(source));
        }
        Ok((map::ifs(source >> 5), 1u32 << (source & 31)))
    }

    /// Set the flag of `source`. Returns false if it was already set.
    pub fn raise(
        &mut self,
        regs: &mut RegisterFile,
        cpu: &mut dyn CpuLink,
        source: usize,
    ) -> Result<bool, SfrError> {
        let (ifs, bit) = Self::check_source(source)?;
        let flags = regs.read(ifs)?;
        if flags & bit != 0 {
            return Ok(false);
        }
        regs.write(ifs, flags | bit)?;
        self.update(regs, cpu)?;
        Ok(true)
    }

    /// Clear the flag of `source`. Returns false if it was already clear.
    pub fn clear(
        &mut self,
        regs: &mut RegisterFile,
        cpu: &mut dyn CpuLink,
        source: usize,
    ) -> Result<bool, SfrError> {
        let (ifs, bit) = Self::check_source(source)?;
        let flags = regs.read(ifs)?;
        if flags & bit == 0 {
            return Ok(false);
        }
        regs.write(ifs, flags & !bit)?;
        self.update(regs, cpu)?;
        Ok(true)
    }

    /// Whether the flag of `source` is set.
    pub fn is_pending(regs: &RegisterFile, source: usize) -> Result<bool, SfrError> {
        let (ifs, bit) = Self::check_source(source)?;
        Ok(regs.read(ifs)? & bit != 0)
    }
}

/// Helpers for test setup and peripheral models: enable and prioritise a
/// source directly in the register file, without arbitration.
pub fn configure_source(
    regs: &mut RegisterFile,
    source: usize,
    enabled: bool,
    priority: u8,
    subpriority: u8,
) -> Result<(), SfrError> {
    if source >= NUM_SOURCES {
        return Err(SfrError::UnknownSource(source));
    }
    let iec = map::iec(source >> 5);
    let bit = 1u32 << (source & 31);
    let value = regs.read(iec)?;
    regs.write(iec, if enabled { value | bit } else { value & !bit })?;

    let ipc = map::ipc(source >> 2);
    let shift = (source & 3) * 8;
    let field = ((priority as u32 & 7) << 2 | (subpriority as u32 & 3)) << shift;
    let value = regs.read(ipc)?;
    regs.write(ipc, (value & !(0x1F << shift)) | field)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

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

    /// Tiny deterministic generator so the property tests need no extra crates.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self) -> u32 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (self.0 >> 33) as u32
        }
    }

    #[test]
    fn test_idle_controller_publishes_nothing() {
        let mut regs = RegisterFile::new();
        let mut cpu = RecordingCpu::default();
        let mut intc = InterruptController::new();
        let result = intc.update(&mut regs, &mut cpu).unwrap();
        assert!(!result.pending);
        assert_eq!(regs.read(INTSTAT).unwrap(), 0);
        assert!(cpu.asserts.is_empty());
        assert_eq!(cpu.deasserts, 0);
    }

    #[test]
    fn test_tie_goes_to_lowest_index() {
        let mut regs = RegisterFile::new();
        let mut cpu = RecordingCpu::default();
        let mut intc = InterruptController::new();
        configure_source(&mut regs, 5, true, 3, 0).unwrap();
        configure_source(&mut regs, 9, true, 3, 2).unwrap();
        intc.raise(&mut regs, &mut cpu, 9).unwrap();
        intc.raise(&mut regs, &mut cpu, 5).unwrap();

        let result = InterruptController::arbitrate(&regs).unwrap();
        assert_eq!(result.vector, 5);
        assert_eq!(result.priority, 3);
        assert_eq!(regs.read(INTSTAT).unwrap(), 5 | 3 << 8);
        // Level went 0 -> 3 once; the second raise kept it at 3.
        assert_eq!(cpu.asserts, vec![3]);
    }

    #[test]
    fn test_higher_priority_preempts() {
        let mut regs = RegisterFile::new();
        let mut cpu = RecordingCpu::default();
        let mut intc = InterruptController::new();
        configure_source(&mut regs, 5, true, 3, 0).unwrap();
        configure_source(&mut regs, 2, true, 6, 0).unwrap();
        intc.raise(&mut regs, &mut cpu, 5).unwrap();
        intc.raise(&mut regs, &mut cpu, 2).unwrap();
        assert_eq!(intc.latched(), 6);
        assert_eq!(regs.read(INTSTAT).unwrap(), 2 | 6 << 8);
        assert_eq!(cpu.asserts, vec![3, 6]);

        intc.clear(&mut regs, &mut cpu, 2).unwrap();
        assert_eq!(cpu.asserts, vec![3, 6, 3]);
        intc.clear(&mut regs, &mut cpu, 5).unwrap();
        assert_eq!(cpu.deasserts, 1);
        assert_eq!(intc.latched(), 0);
    }

    #[test]
    fn test_disabled_or_zero_priority_ignored() {
        let mut regs = RegisterFile::new();
        let mut cpu = RecordingCpu::default();
        let mut intc = InterruptController::new();
        configure_source(&mut regs, 40, false, 7, 0).unwrap();
        configure_source(&mut regs, 41, true, 0, 0).unwrap();
        intc.raise(&mut regs, &mut cpu, 40).unwrap();
        intc.raise(&mut regs, &mut cpu, 41).unwrap();
        assert_eq!(intc.latched(), 0);
        assert!(cpu.asserts.is_empty());
        assert_eq!(regs.read(INTSTAT).unwrap(), 0);
    }

    #[test]
    fn test_raise_and_clear_are_idempotent() {
        let mut regs = RegisterFile::new();
        let mut cpu = RecordingCpu::default();
        let mut intc = InterruptController::new();
        configure_source(&mut regs, 113, true, 4, 0).unwrap();

        assert!(intc.raise(&mut regs, &mut cpu, 113).unwrap());
        let count = intc.recomputations();
        assert!(!intc.raise(&mut regs, &mut cpu, 113).unwrap());
        assert_eq!(intc.recomputations(), count);
        assert_eq!(cpu.asserts, vec![4]);

        assert!(intc.clear(&mut regs, &mut cpu, 113).unwrap());
        let count = intc.recomputations();
        assert!(!intc.clear(&mut regs, &mut cpu, 113).unwrap());
        assert_eq!(intc.recomputations(), count);
        assert_eq!(cpu.deasserts, 1);
    }

    #[test]
    fn test_raise_clear_round_trip() {
        let mut rng = Lcg(7);
        let mut regs = RegisterFile::new();
        let mut cpu = RecordingCpu::default();
        let mut intc = InterruptController::new();
        for source in 0..NUM_SOURCES {
            let level = (rng.next() % 8) as u8;
            configure_source(&mut regs, source, rng.next() % 2 == 0, level, 0).unwrap();
            if rng.next() % 4 == 0 {
                intc.raise(&mut regs, &mut cpu, source).unwrap();
            }
        }
        for source in 0..NUM_SOURCES {
            if InterruptController::is_pending(&regs, source).unwrap() {
                continue;
            }
            let before = intc.update(&mut regs, &mut cpu).unwrap();
            intc.raise(&mut regs, &mut cpu, source).unwrap();
            intc.clear(&mut regs, &mut cpu, source).unwrap();
            let after = InterruptController::arbitrate(&regs).unwrap();
            assert_eq!(before, after, "source {}", source);
            assert_eq!(intc.latched(), before.priority);
        }
    }

    #[test]
    fn test_published_priority_is_max_over_armed() {
        let mut rng = Lcg(0x5eed);
        for _ in 0..32 {
            let mut regs = RegisterFile::new();
            let mut cpu = RecordingCpu::default();
            let mut intc = InterruptController::new();
            for n in 0..NUM_IRQ_BANKS {
                regs.write(map::ifs(n), rng.next()).unwrap();
                regs.write(map::iec(n), rng.next()).unwrap();
            }
            for n in 0..map::NUM_IPC {
                regs.write(map::ipc(n), rng.next()).unwrap();
            }
            let result = intc.update(&mut regs, &mut cpu).unwrap();

            let mut best: Option<(usize, u8)> = None;
            for source in 0..NUM_SOURCES {
                let flag = regs.read(map::ifs(source >> 5)).unwrap() >> (source & 31) & 1;
                let enable = regs.read(map::iec(source >> 5)).unwrap() >> (source & 31) & 1;
                if flag & enable == 0 {
                    continue;
                }
                let level = InterruptController::source_priority(&regs, source).unwrap();
                if best.map_or(true, |(_, b)| level > b) {
                    best = Some((source, level));
                }
            }
            let expected_level = best.map_or(0, |(_, l)| l);
            assert_eq!(result.priority, expected_level);
            if expected_level > 0 {
                let lowest = (0..NUM_SOURCES)
                    .find(|&s| {
                        let flag = regs.read(map::ifs(s >> 5)).unwrap() >> (s & 31) & 1;
                        let enable = regs.read(map::iec(s >> 5)).unwrap() >> (s & 31) & 1;
                        flag & enable == 1
                            && InterruptController::source_priority(&regs, s).unwrap() == expected_level
                    })
                    .unwrap();
                assert_eq!(result.vector as usize, lowest);
            }
        }
    }

    #[test]
    fn test_unknown_source_rejected() {
        let mut regs = RegisterFile::new();
        let mut cpu = RecordingCpu::default();
        let mut intc = InterruptController::new();
        assert!(matches!(
            intc.raise(&mut regs, &mut cpu, NUM_SOURCES),
            Err(SfrError::UnknownSource(191))
        ));
        assert!(cpu.asserts.is_empty());
    }
}

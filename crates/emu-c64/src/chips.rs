//! Peripheral chips attached to the I/O area: VIC-II, SID and the two CIAs.
//!
//! The machine only needs each chip's register interface, its interrupt
//! output and its clock. Hosts supply real chip models through [`Chips`];
//! the default is a [`Latch`] per chip, which stores register writes and
//! reads them back.

use emu_core::{StateError, StateReader, StateWriter, Stateful, Tickable};

/// A memory-mapped chip clocked once per CPU cycle.
pub trait Peripheral: Tickable + Stateful + Send {
    /// Return to the power-on state.
    fn reset(&mut self);

    /// Read register `reg` (already masked to the chip's register count).
    /// Reads may have side effects, such as clearing interrupt flags.
    fn read(&mut self, reg: u8) -> u8;

    /// Write register `reg`.
    fn write(&mut self, reg: u8, value: u8);

    /// Whether the chip is pulling its interrupt output low.
    fn irq(&self) -> bool {
        false
    }
}

/// Register file stand-in: writes are stored, reads return them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Latch {
    regs: Vec<u8>,
    ticks: u64,
}

impl Latch {
    #[must_use]
    pub fn new(register_count: usize) -> Self {
        Self {
            regs: vec![0; register_count],
            ticks: 0,
        }
    }

    /// Cycles clocked since the last reset.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    #[must_use]
    pub fn registers(&self) -> &[u8] {
        &self.regs
    }
}

impl Tickable for Latch {
    fn tick(&mut self) {
        self.ticks += 1;
    }
}

impl Peripheral for Latch {
    fn reset(&mut self) {
        self.regs.fill(0);
        self.ticks = 0;
    }

    fn read(&mut self, reg: u8) -> u8 {
        self.regs.get(usize::from(reg)).copied().unwrap_or(0)
    }

    fn write(&mut self, reg: u8, value: u8) {
        if let Some(slot) = self.regs.get_mut(usize::from(reg)) {
            *slot = value;
        }
    }
}

impl Stateful for Latch {
    fn state_size(&self) -> usize {
        self.regs.len() + 8
    }

    fn save_state(&self, writer: &mut StateWriter) {
        writer.write_bytes(&self.regs);
        writer.write_u64(self.ticks);
    }

    fn load_state(&mut self, reader: &mut StateReader<'_>) -> Result<(), StateError> {
        let regs = reader.read_bytes(self.regs.len())?;
        let ticks = reader.read_u64()?;
        self.regs.copy_from_slice(regs);
        self.ticks = ticks;
        Ok(())
    }
}

/// VIC-II register count as seen from the CPU ($D000-$D03F mirror).
pub const VIC_REGISTERS: usize = 64;
pub const SID_REGISTERS: usize = 32;
pub const CIA_REGISTERS: usize = 16;

/// The four peripheral chips on the board.
pub struct Chips {
    pub vic: Box<dyn Peripheral>,
    pub sid: Box<dyn Peripheral>,
    pub cia1: Box<dyn Peripheral>,
    pub cia2: Box<dyn Peripheral>,
}

impl Default for Chips {
    fn default() -> Self {
        Self {
            vic: Box::new(Latch::new(VIC_REGISTERS)),
            sid: Box::new(Latch::new(SID_REGISTERS)),
            cia1: Box::new(Latch::new(CIA_REGISTERS)),
            cia2: Box::new(Latch::new(CIA_REGISTERS)),
        }
    }
}

impl Chips {
    pub fn reset(&mut self) {
        self.vic.reset();
        self.sid.reset();
        self.cia1.reset();
        self.cia2.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_reads_back_writes() {
        let mut latch = Latch::new(16);
        latch.write(3, 0x5A);
        assert_eq!(latch.read(3), 0x5A);
        assert_eq!(latch.read(4), 0);
        // Out-of-range registers are ignored
        latch.write(200, 1);
        assert_eq!(latch.read(200), 0);
    }

    #[test]
    fn latch_counts_ticks_until_reset() {
        let mut latch = Latch::new(4);
        latch.tick_n(emu_core::Ticks::new(10));
        assert_eq!(latch.ticks(), 10);
        latch.write(0, 9);
        latch.reset();
        assert_eq!(latch.ticks(), 0);
        assert_eq!(latch.registers(), &[0; 4]);
    }

    #[test]
    fn latch_state_round_trip() {
        let mut latch = Latch::new(8);
        latch.write(7, 0x77);
        latch.tick();
        let mut writer = StateWriter::new();
        writer.write_component("latch", &latch).expect("size");
        let bytes = writer.into_inner();

        let mut restored = Latch::new(8);
        StateReader::new(&bytes)
            .read_component("latch", &mut restored)
            .expect("restore");
        assert_eq!(restored, latch);
    }
}

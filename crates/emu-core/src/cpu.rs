//! CPU core trait.

use crate::{Bus, Stateful};

/// A CPU core.
///
/// CPUs execute instructions and access memory through a bus. Unlike other
/// `Tickable` components, CPUs take a bus reference in their tick method
/// because they need to access memory on specific cycles.
///
/// The trait is object safe so a machine can hold any core behind a
/// `Box<dyn Cpu>` and move it onto its execution thread.
pub trait Cpu: Stateful + Send {
    /// Advance the CPU by one clock cycle.
    ///
    /// The bus is passed in, not owned, so it can be shared with other
    /// components (e.g., video chip).
    fn tick(&mut self, bus: &mut dyn Bus);

    /// Reset the CPU, fetching the reset vector through the bus.
    fn reset(&mut self, bus: &mut dyn Bus);

    /// Returns the current program counter.
    ///
    /// Returns `u32` to support all CPU address widths: 16-bit (6502, Z80),
    /// 24-bit (68000), and 32-bit (ARM7TDMI). Narrower CPUs zero-extend.
    fn pc(&self) -> u32;

    /// Drive the level-sensitive interrupt request line.
    fn set_irq_line(&mut self, asserted: bool);

    /// Drive the non-maskable interrupt line. The CPU reacts to the
    /// inactive-to-active edge.
    fn set_nmi_line(&mut self, asserted: bool);
}

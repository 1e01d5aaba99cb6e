//! Components driven by the master clock.

use crate::Ticks;

/// Something the machine advances once per master clock tick.
///
/// Peripheral chips implement this so the machine can step them in lock
/// step with the CPU. The CPU itself is ticked through [`Cpu`](crate::Cpu)
/// because it needs the bus.
pub trait Tickable {
    /// Advance by one tick.
    fn tick(&mut self);

    /// Advance by `count` ticks. Overrides must match calling
    /// [`tick`](Self::tick) that many times.
    fn tick_n(&mut self, count: Ticks) {
        for _ in 0..count.get() {
            self.tick();
        }
    }
}

//! Core traits and types for cycle-accurate emulation.
//!
//! Everything ticks at the master crystal frequency. All component timing
//! derives from this. No exceptions.
//!
//! Every stateful component also implements [`Stateful`], so a whole
//! machine can be captured into a byte buffer and restored later.

mod bus;
mod clock;
mod cpu;
mod state;
mod tickable;
mod ticks;

pub use bus::Bus;
pub use clock::MasterClock;
pub use cpu::Cpu;
pub use state::{StateError, StateReader, StateWriter, Stateful};
pub use tickable::Tickable;
pub use ticks::Ticks;

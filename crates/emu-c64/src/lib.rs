//! Cycle-accurate Commodore 64 machine core.
//!
//! The C64 master clock ticks at CPU cycle rate (985,248 Hz PAL). All
//! components (VIC-II, CIA, SID) tick at this rate. One frame is 312
//! raster lines x 63 cycles = 19,656 CPU cycles (~50.12 Hz).
//!
//! The crate covers the memory map, the expansion port with its
//! cartridges, the execution thread and machine snapshots. The CPU and
//! the peripheral chips plug in through [`emu_core::Cpu`] and
//! [`Peripheral`].

mod board;
mod bus;
mod c64;
pub mod cartridge;
mod chips;
pub mod config;
mod error;
mod expansion_port;
pub mod memory;
mod message;
mod snapshot;
mod timing;

pub use board::{Board, CartridgeButton, ClockPosition};
pub use bus::C64Bus;
pub use c64::{C64, SuspendGuard};
pub use chips::{CIA_REGISTERS, Chips, Latch, Peripheral, SID_REGISTERS, VIC_REGISTERS};
pub use config::{C64Config, C64Model, Settings};
pub use error::{CartridgeError, RomError, SnapshotError};
pub use expansion_port::{ControlLines, ExpansionPort};
pub use memory::{AddressSpace, OPEN_BUS, Region};
pub use message::{MESSAGE_QUEUE_CAPACITY, Message, MessageQueue};
pub use snapshot::{
    HEADER_LEN, MAX_AUTO_SNAPSHOTS, MAX_USER_SNAPSHOTS, SNAPSHOT_MAGIC, SNAPSHOT_VERSION, Snapshot,
    SnapshotStore,
};
pub use timing::FrameTimer;

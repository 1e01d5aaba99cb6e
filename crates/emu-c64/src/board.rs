//! The machine as seen by the execution thread.
//!
//! `Board` owns the CPU, the bus and everything else that changes while
//! the emulation runs. It is not thread-safe by itself; [`C64`](crate::C64)
//! wraps it in a mutex and only lets other threads at it while the
//! execution thread is parked.
//!
//! # Cycle order
//!
//! Each cycle:
//! 1. VIC-II, CIA1, CIA2 (first clock phase)
//! 2. Interrupt lines sampled: IRQ = VIC | CIA1, NMI = CIA2 | cartridge
//! 3. CPU (second clock phase, may touch any chip through the bus)
//! 4. SID
//! 5. Expansion port (cartridge-internal time)
//!
//! Then the clock position advances; line and frame ends run their
//! bookkeeping.

use std::sync::Arc;

use emu_core::{Cpu, StateError, StateReader, StateWriter, Stateful, Tickable};
use log::{debug, error, info};

use crate::bus::C64Bus;
use crate::cartridge::{ButtonAction, Cartridge, CartridgeImage, CartridgeType};
use crate::chips::Chips;
use crate::config::{C64Config, C64Model, Settings};
use crate::error::{CartridgeError, RomError, SnapshotError};
use crate::memory::AddressSpace;
use crate::message::{Message, MessageQueue};
use crate::snapshot::{HEADER_LEN, Snapshot, SnapshotStore};

/// Where the beam is, and how many cycles and frames have elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockPosition {
    /// CPU cycles executed since power-on.
    pub cycle: u64,
    /// Completed frames.
    pub frame: u64,
    /// Current rasterline, 0-based.
    pub rasterline: u16,
    /// Cycle within the rasterline, 1-based.
    pub rasterline_cycle: u8,
}

impl Default for ClockPosition {
    fn default() -> Self {
        Self {
            cycle: 0,
            frame: 0,
            rasterline: 0,
            rasterline_cycle: 1,
        }
    }
}

impl ClockPosition {
    fn validate(&self, model: C64Model) -> Result<(), StateError> {
        if !(1..=model.cycles_per_line()).contains(&self.rasterline_cycle) {
            return Err(StateError::InvalidField {
                field: "rasterline cycle",
                value: u64::from(self.rasterline_cycle),
            });
        }
        if self.rasterline >= model.lines_per_frame() {
            return Err(StateError::InvalidField {
                field: "rasterline",
                value: u64::from(self.rasterline),
            });
        }
        Ok(())
    }
}

impl Stateful for ClockPosition {
    fn state_size(&self) -> usize {
        8 + 8 + 2 + 1
    }

    fn save_state(&self, writer: &mut StateWriter) {
        writer.write_u64(self.cycle);
        writer.write_u64(self.frame);
        writer.write_u16(self.rasterline);
        writer.write_u8(self.rasterline_cycle);
    }

    fn load_state(&mut self, reader: &mut StateReader<'_>) -> Result<(), StateError> {
        self.cycle = reader.read_u64()?;
        self.frame = reader.read_u64()?;
        self.rasterline = reader.read_u16()?;
        self.rasterline_cycle = reader.read_u8()?;
        Ok(())
    }
}

/// Cartridge front-panel buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartridgeButton {
    /// Usually freeze.
    First,
    /// Usually reset.
    Second,
}

pub struct Board {
    cpu: Box<dyn Cpu>,
    bus: C64Bus,
    settings: Settings,
    clock: ClockPosition,
    warp: bool,
    /// Set by the drive while a bulk transfer is in progress.
    transfer_active: bool,
    snapshots: SnapshotStore,
    messages: Arc<MessageQueue>,
}

impl Board {
    /// Build the machine. The CPU is not reset until [`reset`](Self::reset).
    pub fn new(
        config: &C64Config,
        cpu: Box<dyn Cpu>,
        chips: Chips,
        messages: Arc<MessageQueue>,
    ) -> Result<Self, RomError> {
        let memory = AddressSpace::new(&config.kernal_rom, &config.basic_rom, &config.char_rom)?;
        Ok(Self {
            cpu,
            bus: C64Bus::new(memory, chips),
            settings: config.settings.clone(),
            clock: ClockPosition::default(),
            warp: config.settings.always_warp,
            transfer_active: false,
            snapshots: SnapshotStore::new(),
            messages,
        })
    }

    #[must_use]
    pub fn model(&self) -> C64Model {
        self.settings.model
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn clock(&self) -> ClockPosition {
        self.clock
    }

    #[must_use]
    pub fn warp(&self) -> bool {
        self.warp
    }

    #[must_use]
    pub fn cpu(&self) -> &dyn Cpu {
        &*self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &C64Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut C64Bus {
        &mut self.bus
    }

    #[must_use]
    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    #[must_use]
    pub fn messages(&self) -> &Arc<MessageQueue> {
        &self.messages
    }

    /// Power-on reset of every chip. The clock position keeps counting.
    pub fn reset(&mut self) {
        self.bus.reset();
        self.cpu.reset(&mut self.bus);
        info!("C64 reset");
        self.messages.put(Message::Reset);
    }

    /// Reset every chip but keep RAM, as a cartridge reset button does.
    pub fn reset_keeping_ram(&mut self) {
        self.bus.reset_keeping_ram();
        self.cpu.reset(&mut self.bus);
        info!("C64 reset (RAM kept)");
        self.messages.put(Message::Reset);
    }

    /// Run one CPU cycle. Returns true if it completed a frame.
    pub fn execute_one_cycle(&mut self) -> bool {
        let chips = &mut self.bus.chips;
        chips.vic.tick();
        chips.cia1.tick();
        chips.cia2.tick();

        self.cpu.set_irq_line(self.bus.irq());
        self.cpu.set_nmi_line(self.bus.nmi());
        self.cpu.tick(&mut self.bus);

        self.bus.chips.sid.tick();
        self.bus.port.execute(&mut self.bus.memory);

        self.clock.cycle += 1;
        if self.clock.rasterline_cycle < self.model().cycles_per_line() {
            self.clock.rasterline_cycle += 1;
            return false;
        }
        self.end_of_rasterline()
    }

    /// Run to the end of the current rasterline. Returns true if that also
    /// ended a frame.
    pub fn execute_one_line(&mut self) -> bool {
        loop {
            let frame_done = self.execute_one_cycle();
            if self.clock.rasterline_cycle == 1 {
                return frame_done;
            }
        }
    }

    /// Run to the end of the current frame.
    pub fn execute_one_frame(&mut self) {
        while !self.execute_one_cycle() {}
    }

    fn end_of_rasterline(&mut self) -> bool {
        self.clock.rasterline_cycle = 1;
        self.clock.rasterline += 1;
        if self.clock.rasterline < self.model().lines_per_frame() {
            return false;
        }
        self.clock.rasterline = 0;
        self.end_of_frame();
        true
    }

    fn end_of_frame(&mut self) {
        self.clock.frame += 1;
        self.update_warp();

        if let Some(period) = self.settings.auto_snapshot_period() {
            if self.clock.frame % period == 0 {
                if let Err(err) = self.take_auto_snapshot() {
                    error!("Automatic snapshot failed: {err}");
                }
            }
        }
    }

    fn update_warp(&mut self) {
        let warp =
            self.settings.always_warp || (self.settings.warp_load && self.transfer_active);
        if warp != self.warp {
            self.warp = warp;
            debug!("Warp {}", if warp { "on" } else { "off" });
            self.messages
                .put(if warp { Message::WarpOn } else { Message::WarpOff });
        }
    }

    pub fn set_always_warp(&mut self, enabled: bool) {
        self.settings.always_warp = enabled;
        self.update_warp();
    }

    pub fn set_warp_load(&mut self, enabled: bool) {
        self.settings.warp_load = enabled;
        self.update_warp();
    }

    /// Called by the drive when a bulk transfer starts or stops. Takes
    /// effect at the next frame boundary.
    pub fn set_transfer_active(&mut self, active: bool) {
        self.transfer_active = active;
    }

    /// Enable or disable automatic snapshots, taken every `interval`
    /// seconds of emulated time.
    pub fn set_auto_snapshots(&mut self, enabled: bool, interval: u32) {
        self.settings.auto_snapshots = enabled;
        self.settings.auto_snapshot_interval = interval;
    }

    // -----------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------

    fn state_size(&self) -> usize {
        self.clock.state_size()
            + self.bus.memory.state_size()
            + self.bus.port.state_size()
            + self.cpu.state_size()
            + self.bus.chips.vic.state_size()
            + self.bus.chips.sid.state_size()
            + self.bus.chips.cia1.state_size()
            + self.bus.chips.cia2.state_size()
    }

    /// Capture the whole machine.
    pub fn take_snapshot(&self) -> Result<Snapshot, SnapshotError> {
        let expected = self.state_size();
        let mut writer = Snapshot::writer(expected);
        self.save_components(&mut writer).inspect_err(|err| {
            error!("Snapshot aborted: {err}");
        })?;

        let actual = writer.len() - HEADER_LEN;
        if actual != expected {
            let err = StateError::SizeMismatch {
                component: "snapshot",
                expected,
                actual,
            };
            error!("Snapshot aborted: {err}");
            return Err(err.into());
        }
        Ok(Snapshot::from_writer(writer))
    }

    fn save_components(&self, writer: &mut StateWriter) -> Result<(), StateError> {
        let chips = &self.bus.chips;
        writer.write_component("clock", &self.clock)?;
        writer.write_component("memory", &self.bus.memory)?;
        writer.write_component("expansion port", &self.bus.port)?;
        writer.write_component("cpu", &*self.cpu)?;
        writer.write_component("vic", &*chips.vic)?;
        writer.write_component("sid", &*chips.sid)?;
        writer.write_component("cia1", &*chips.cia1)?;
        writer.write_component("cia2", &*chips.cia2)?;
        Ok(())
    }

    fn load_components(&mut self, state: &[u8]) -> Result<(), SnapshotError> {
        let mut reader = StateReader::new(state);
        let mut clock = ClockPosition::default();
        reader.read_component("clock", &mut clock)?;
        clock.validate(self.model())?;

        let chips = &mut self.bus.chips;
        reader.read_component("memory", &mut self.bus.memory)?;
        reader.read_component("expansion port", &mut self.bus.port)?;
        reader.read_component("cpu", &mut *self.cpu)?;
        reader.read_component("vic", &mut *chips.vic)?;
        reader.read_component("sid", &mut *chips.sid)?;
        reader.read_component("cia1", &mut *chips.cia1)?;
        reader.read_component("cia2", &mut *chips.cia2)?;
        if reader.remaining() != 0 {
            return Err(SnapshotError::TrailingBytes(reader.remaining()));
        }
        self.clock = clock;
        Ok(())
    }

    /// Replace the machine state with a snapshot. On failure the previous
    /// state is put back.
    pub fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let backup = self.take_snapshot()?;
        if let Err(err) = self.load_components(snapshot.state()) {
            error!("Snapshot restore failed: {err}");
            if let Err(rollback) = self.load_components(backup.state()) {
                error!("Could not roll back to the previous state: {rollback}");
            }
            return Err(err);
        }
        info!(
            "Restored snapshot at frame {}, cycle {}",
            self.clock.frame, self.clock.cycle
        );
        self.messages.put(Message::SnapshotRestored);
        Ok(())
    }

    pub fn take_auto_snapshot(&mut self) -> Result<(), SnapshotError> {
        let snapshot = self.take_snapshot()?;
        self.snapshots.push_auto(snapshot);
        debug!("Automatic snapshot at frame {}", self.clock.frame);
        self.messages.put(Message::SnapshotTaken);
        Ok(())
    }

    pub fn take_user_snapshot(&mut self) -> Result<(), SnapshotError> {
        let snapshot = self.take_snapshot()?;
        self.snapshots.push_user(snapshot)?;
        info!("User snapshot at frame {}", self.clock.frame);
        self.messages.put(Message::SnapshotTaken);
        Ok(())
    }

    pub fn restore_auto_snapshot(&mut self, index: usize) -> Result<(), SnapshotError> {
        let snapshot = self
            .snapshots
            .auto(index)
            .cloned()
            .ok_or(SnapshotError::NoSuchSnapshot(index))?;
        self.restore_snapshot(&snapshot)
    }

    pub fn restore_user_snapshot(&mut self, index: usize) -> Result<(), SnapshotError> {
        let snapshot = self
            .snapshots
            .user(index)
            .cloned()
            .ok_or(SnapshotError::NoSuchSnapshot(index))?;
        self.restore_snapshot(&snapshot)
    }

    /// Restore the newest automatic snapshot and drop it from the ring, so
    /// repeated calls step further back in time.
    pub fn restore_latest_auto_snapshot(&mut self) -> Result<(), SnapshotError> {
        let snapshot = self.snapshots.delete_auto(0)?;
        let result = self.restore_snapshot(&snapshot);
        if result.is_err() {
            self.snapshots.reinsert_auto(0, snapshot);
        }
        result
    }

    pub fn restore_latest_user_snapshot(&mut self) -> Result<(), SnapshotError> {
        self.restore_user_snapshot(0)
    }

    pub fn delete_auto_snapshot(&mut self, index: usize) -> Result<(), SnapshotError> {
        self.snapshots.delete_auto(index).map(drop)
    }

    pub fn delete_user_snapshot(&mut self, index: usize) -> Result<(), SnapshotError> {
        self.snapshots.delete_user(index).map(drop)
    }

    // -----------------------------------------------------------------
    // Cartridges
    // -----------------------------------------------------------------

    /// Validate and plug in a cartridge, then reset the machine. A rejected
    /// image leaves everything as it was.
    pub fn attach_cartridge(
        &mut self,
        image: CartridgeImage,
    ) -> Result<CartridgeType, CartridgeError> {
        let kind = self
            .bus
            .port
            .attach_image(image, &mut self.bus.memory)
            .inspect_err(|err| error!("Cartridge rejected: {err}"))?;
        self.reset();
        self.messages.put(Message::CartridgeAttached);
        Ok(kind)
    }

    /// Unplug the cartridge and reset the machine.
    pub fn detach_cartridge(&mut self) -> Option<Cartridge> {
        let cartridge = self.bus.port.detach(&mut self.bus.memory)?;
        self.reset();
        self.messages.put(Message::CartridgeDetached);
        Some(cartridge)
    }

    pub fn press_cartridge_button(&mut self, button: CartridgeButton) {
        let port = &mut self.bus.port;
        let action = match button {
            CartridgeButton::First => port.press_first_button(&mut self.bus.memory),
            CartridgeButton::Second => port.press_second_button(&mut self.bus.memory),
        };
        if action == ButtonAction::ResetKeepingRam {
            self.reset_keeping_ram();
        }
    }

    pub fn set_cartridge_switch(&mut self, position: i8) {
        self.bus.port.set_switch(position, &mut self.bus.memory);
    }
}

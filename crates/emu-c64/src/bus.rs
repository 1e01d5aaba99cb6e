//! C64 bus: memory and I/O routing.
//!
//! Implements `emu_core::Bus` for the C64. Every CPU access looks up its
//! 4K slot in the routing table and is dispatched to RAM, a ROM, the I/O
//! chips or the cartridge. The C64 is fully memory-mapped; there is no
//! separate I/O address space.

#![allow(clippy::cast_possible_truncation)]

use emu_core::Bus;

use crate::chips::Chips;
use crate::expansion_port::ExpansionPort;
use crate::memory::{AddressSpace, Region};

/// The C64 bus, implementing `emu_core::Bus`.
///
/// Owns all subsystems. The CPU accesses everything through the `Bus` trait.
pub struct C64Bus {
    pub memory: AddressSpace,
    pub port: ExpansionPort,
    pub chips: Chips,
}

impl C64Bus {
    #[must_use]
    pub fn new(memory: AddressSpace, chips: Chips) -> Self {
        let mut bus = Self {
            memory,
            port: ExpansionPort::new(),
            chips,
        };
        bus.port.update_lookup_tables(&mut bus.memory);
        bus
    }

    /// Power-on reset of memory, chips and cartridge.
    pub fn reset(&mut self) {
        self.memory.reset();
        self.chips.reset();
        self.port.reset(&mut self.memory);
    }

    /// Reset with RAM contents preserved.
    pub fn reset_keeping_ram(&mut self) {
        self.memory.reset_keeping_ram();
        self.chips.reset();
        self.port.reset(&mut self.memory);
    }

    /// Level of the CPU's IRQ input (true = asserted).
    #[must_use]
    pub fn irq(&self) -> bool {
        self.chips.vic.irq() || self.chips.cia1.irq()
    }

    /// Level of the CPU's NMI input (true = asserted).
    #[must_use]
    pub fn nmi(&self) -> bool {
        self.chips.cia2.irq() || self.port.nmi()
    }

    fn read_io(&mut self, addr: u16) -> u8 {
        match addr {
            0xD000..=0xD3FF => self.chips.vic.read((addr & 0x3F) as u8),
            0xD400..=0xD7FF => self.chips.sid.read((addr & 0x1F) as u8),
            0xD800..=0xDBFF => self.memory.colour_ram_read(addr - 0xD800),
            0xDC00..=0xDCFF => self.chips.cia1.read((addr & 0x0F) as u8),
            0xDD00..=0xDDFF => self.chips.cia2.read((addr & 0x0F) as u8),
            _ => self.port.peek_io(addr, &mut self.memory),
        }
    }

    fn write_io(&mut self, addr: u16, value: u8) {
        match addr {
            0xD000..=0xD3FF => self.chips.vic.write((addr & 0x3F) as u8, value),
            0xD400..=0xD7FF => self.chips.sid.write((addr & 0x1F) as u8, value),
            0xD800..=0xDBFF => self.memory.colour_ram_write(addr - 0xD800, value),
            0xDC00..=0xDCFF => self.chips.cia1.write((addr & 0x0F) as u8, value),
            0xDD00..=0xDDFF => self.chips.cia2.write((addr & 0x0F) as u8, value),
            _ => self.port.poke_io(addr, value, &mut self.memory),
        }
    }
}

impl Bus for C64Bus {
    fn read(&mut self, addr: u16) -> u8 {
        match self.memory.read_source(addr) {
            Region::Io => self.read_io(addr),
            Region::CartLo | Region::CartHi => self.port.peek(addr, &mut self.memory),
            region => self.memory.read(region, addr),
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        match self.memory.write_target(addr) {
            Region::Ram => {
                if self.memory.write_ram(addr, value) {
                    // Processor port changed: rebank before the next access
                    self.port.update_lookup_tables(&mut self.memory);
                }
            }
            Region::Io => self.write_io(addr, value),
            Region::CartLo | Region::CartHi => self.port.poke(addr, value),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::{CartridgeImage, CartridgeType, ChipImage};
    use crate::memory::OPEN_BUS;

    fn make_bus() -> C64Bus {
        let kernal = vec![0xEE; 8192];
        let basic = vec![0xBB; 8192];
        let chargen = vec![0xCC; 4096];
        let memory = AddressSpace::new(&kernal, &basic, &chargen).expect("valid ROMs");
        C64Bus::new(memory, Chips::default())
    }

    #[test]
    fn ram_read_write() {
        let mut bus = make_bus();
        bus.write(0x8000, 0xAB);
        assert_eq!(bus.read(0x8000), 0xAB);
    }

    #[test]
    fn roms_visible() {
        let mut bus = make_bus();
        assert_eq!(bus.read(0xA000), 0xBB);
        assert_eq!(bus.read(0xE000), 0xEE);
    }

    #[test]
    fn port_write_rebanks_before_next_read() {
        let mut bus = make_bus();
        bus.write(0xA000, 0x11);
        bus.write(0x0001, 0x36);
        assert_eq!(bus.read(0xA000), 0x11);
        assert_eq!(bus.read(0xE000), 0xEE);
        bus.write(0x0001, 0x33);
        assert_eq!(bus.read(0xD000), 0xCC);
    }

    #[test]
    fn vic_register_access() {
        let mut bus = make_bus();
        // Border colour, through a mirror
        bus.write(0xD020, 0x06);
        assert_eq!(bus.read(0xD020), 0x06);
        assert_eq!(bus.read(0xD060), 0x06);
    }

    #[test]
    fn colour_ram_access() {
        let mut bus = make_bus();
        bus.write(0xD800, 0xF5);
        assert_eq!(bus.read(0xD800), 0x05);
    }

    #[test]
    fn cia_register_access() {
        let mut bus = make_bus();
        bus.write(0xDC02, 0xFF);
        bus.write(0xDD13, 0x42);
        assert_eq!(bus.read(0xDC02), 0xFF);
        assert_eq!(bus.read(0xDD03), 0x42);
    }

    #[test]
    fn io_expansion_without_cartridge_floats() {
        let mut bus = make_bus();
        assert_eq!(bus.read(0xDE00), OPEN_BUS);
        assert_eq!(bus.read(0xDF80), OPEN_BUS);
    }

    #[test]
    fn cartridge_register_rebanks_before_next_read() {
        let mut bus = make_bus();
        let chips = (0..4)
            .map(|bank| ChipImage::new(bank, 0x8000, vec![0x10 + bank as u8; 0x2000]))
            .collect();
        bus.port
            .attach_image(
                CartridgeImage::new(CartridgeType::Ocean, false, false, chips),
                &mut bus.memory,
            )
            .expect("attach");
        assert_eq!(bus.read(0x8000), 0x10);
        bus.write(0xDE00, 3);
        assert_eq!(bus.read(0x8000), 0x13);
    }

    #[test]
    fn ultimax_writes_reach_cartridge_not_ram() {
        let mut bus = make_bus();
        bus.port.set_game_line(false, &mut bus.memory);
        bus.write(0x4000, 0x55);
        assert_eq!(bus.memory.ram_read(0x4000), 0x00);
        assert_eq!(bus.read(0x4000), OPEN_BUS);
        assert_eq!(bus.read(0xE000), OPEN_BUS);
        // Zero page is still RAM
        bus.write(0x0010, 0x66);
        assert_eq!(bus.read(0x0010), 0x66);
    }

    #[test]
    fn cartridge_nmi_reaches_cpu_line() {
        let mut bus = make_bus();
        let chips = (0..4)
            .map(|bank| ChipImage::new(bank, 0x8000, vec![0; 0x4000]))
            .collect();
        bus.port
            .attach_image(
                CartridgeImage::new(CartridgeType::FinalIii, true, true, chips),
                &mut bus.memory,
            )
            .expect("attach");
        assert!(!bus.nmi());
        bus.port.press_first_button(&mut bus.memory);
        assert!(bus.nmi());
        assert_eq!(bus.memory.read_source(0xE000), Region::CartHi);
    }
}

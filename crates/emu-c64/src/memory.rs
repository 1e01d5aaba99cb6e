//! C64 address space: 64K RAM with overlaid ROMs, I/O and cartridge windows.
//!
//! The CPU's view of memory is decided per 4K slot by a routing table. Each
//! slot holds a read source and a write target. The table is recomputed
//! from the PLA's inputs whenever one of them changes: the 6510 port bits at
//! $01 (LORAM, HIRAM, CHAREN) and the expansion port's GAME and EXROM lines.
//!
//! # Banking
//!
//! | Mode    | EXROM | GAME | $8000     | $A000      | $D000       | $E000      |
//! |---------|-------|------|-----------|------------|-------------|------------|
//! | Normal  | 1     | 1    | RAM       | BASIC      | I/O or char | Kernal     |
//! | 8K      | 0     | 1    | ROML      | BASIC      | I/O or char | Kernal     |
//! | 16K     | 0     | 0    | ROML      | ROMH       | I/O or char | Kernal     |
//! | Ultimax | 1     | 0    | ROML      | unmapped   | I/O         | ROMH       |
//!
//! The table above shows the default port value $37. Clearing HIRAM and
//! LORAM progressively replaces ROM with RAM; the full 32-entry table is
//! [`BANK_MAP`]. Slot 0 ($0000-$0FFF) is RAM in every configuration.
//!
//! Writes go to RAM underneath ROM. Cartridge windows are only writable in
//! ultimax mode, and unmapped slots swallow writes.

#![allow(clippy::cast_possible_truncation)]

use emu_core::{StateError, StateReader, StateWriter, Stateful};

use crate::error::RomError;

/// Where a slot's reads come from or its writes go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Region {
    Ram,
    Kernal,
    Basic,
    CharRom,
    Io,
    /// Cartridge ROML window ($8000-$9FFF).
    CartLo,
    /// Cartridge ROMH window ($A000-$BFFF, or $E000-$FFFF in ultimax mode).
    CartHi,
    /// Nothing responds. Reads float high.
    Unmapped,
}

impl Region {
    fn from_u8(value: u8) -> Result<Self, StateError> {
        Ok(match value {
            0 => Self::Ram,
            1 => Self::Kernal,
            2 => Self::Basic,
            3 => Self::CharRom,
            4 => Self::Io,
            5 => Self::CartLo,
            6 => Self::CartHi,
            7 => Self::Unmapped,
            _ => {
                return Err(StateError::InvalidField {
                    field: "memory region",
                    value: u64::from(value),
                });
            }
        })
    }
}

const RAM: Region = Region::Ram;
const KRN: Region = Region::Kernal;
const BAS: Region = Region::Basic;
const CHR: Region = Region::CharRom;
const IO: Region = Region::Io;
const CLO: Region = Region::CartLo;
const CHI: Region = Region::CartHi;
const NON: Region = Region::Unmapped;

/// PLA output for every combination of EXROM, GAME, CHAREN, HIRAM, LORAM
/// (index bits 4 to 0).
///
/// Columns: $1000-$7FFF, $8000-$9FFF, $A000-$BFFF, $C000-$CFFF,
/// $D000-$DFFF, $E000-$FFFF.
pub const BANK_MAP: [[Region; 6]; 32] = [
    // EXROM=0 GAME=0: 16K cartridge
    [RAM, RAM, RAM, RAM, RAM, RAM],
    [RAM, RAM, RAM, RAM, RAM, RAM],
    [RAM, RAM, CHI, RAM, CHR, KRN],
    [RAM, CLO, CHI, RAM, CHR, KRN],
    [RAM, RAM, RAM, RAM, RAM, RAM],
    [RAM, RAM, RAM, RAM, IO, RAM],
    [RAM, RAM, CHI, RAM, IO, KRN],
    [RAM, CLO, CHI, RAM, IO, KRN],
    // EXROM=0 GAME=1: 8K cartridge
    [RAM, RAM, RAM, RAM, RAM, RAM],
    [RAM, RAM, RAM, RAM, CHR, RAM],
    [RAM, RAM, RAM, RAM, CHR, KRN],
    [RAM, CLO, BAS, RAM, CHR, KRN],
    [RAM, RAM, RAM, RAM, RAM, RAM],
    [RAM, RAM, RAM, RAM, IO, RAM],
    [RAM, RAM, RAM, RAM, IO, KRN],
    [RAM, CLO, BAS, RAM, IO, KRN],
    // EXROM=1 GAME=0: ultimax, port bits ignored
    [NON, CLO, NON, NON, IO, CHI],
    [NON, CLO, NON, NON, IO, CHI],
    [NON, CLO, NON, NON, IO, CHI],
    [NON, CLO, NON, NON, IO, CHI],
    [NON, CLO, NON, NON, IO, CHI],
    [NON, CLO, NON, NON, IO, CHI],
    [NON, CLO, NON, NON, IO, CHI],
    [NON, CLO, NON, NON, IO, CHI],
    // EXROM=1 GAME=1: no cartridge
    [RAM, RAM, RAM, RAM, RAM, RAM],
    [RAM, RAM, RAM, RAM, CHR, RAM],
    [RAM, RAM, RAM, RAM, CHR, KRN],
    [RAM, RAM, BAS, RAM, CHR, KRN],
    [RAM, RAM, RAM, RAM, RAM, RAM],
    [RAM, RAM, RAM, RAM, IO, RAM],
    [RAM, RAM, RAM, RAM, IO, KRN],
    [RAM, RAM, BAS, RAM, IO, KRN],
];

/// [`BANK_MAP`] column for each 4K slot. Slot 0 is handled separately.
const SLOT_COLUMN: [usize; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 2, 2, 3, 4, 5, 5];

/// Value seen on undriven 6510 port pins (pull-up resistors).
const PORT_PULL_UP: u8 = 0x37;

/// Value read from an address nothing drives.
pub const OPEN_BUS: u8 = 0xFF;

/// 64K RAM, ROMs, colour RAM, the 6510 port and the routing table.
pub struct AddressSpace {
    ram: Box<[u8; 0x10000]>,
    /// Kernal ROM (8K, mapped at $E000-$FFFF).
    kernal_rom: Box<[u8]>,
    /// BASIC ROM (8K, mapped at $A000-$BFFF).
    basic_rom: Box<[u8]>,
    /// Character ROM (4K, mapped at $D000-$DFFF).
    char_rom: Box<[u8]>,
    /// Colour RAM (1K, 4-bit per nybble, at $D800-$DBFF).
    colour_ram: [u8; 1024],
    /// 6510 port: data direction register ($00).
    port_ddr: u8,
    /// 6510 port: data register ($01).
    port_data: u8,
    read_map: [Region; 16],
    write_map: [Region; 16],
}

fn check_rom(rom: &'static str, data: &[u8], expected: usize) -> Result<Box<[u8]>, RomError> {
    if data.len() == expected {
        Ok(data.into())
    } else {
        Err(RomError {
            rom,
            expected,
            actual: data.len(),
        })
    }
}

impl AddressSpace {
    /// Create the address space with the given ROMs, in its power-on state.
    pub fn new(kernal_rom: &[u8], basic_rom: &[u8], char_rom: &[u8]) -> Result<Self, RomError> {
        let mut memory = Self {
            ram: Box::new([0; 0x10000]),
            kernal_rom: check_rom("Kernal", kernal_rom, 0x2000)?,
            basic_rom: check_rom("BASIC", basic_rom, 0x2000)?,
            char_rom: check_rom("Character", char_rom, 0x1000)?,
            colour_ram: [0; 1024],
            port_ddr: 0,
            port_data: 0,
            read_map: [Region::Ram; 16],
            write_map: [Region::Ram; 16],
        };
        memory.reset();
        Ok(memory)
    }

    /// Power-on state: RAM pattern, port defaults, no cartridge lines.
    pub fn reset(&mut self) {
        // Real DRAM powers up in alternating 64-byte stripes of $00 and $FF
        for (i, byte) in self.ram.iter_mut().enumerate() {
            *byte = if i & 0x40 != 0 { 0xFF } else { 0x00 };
        }
        self.colour_ram = [0; 1024];
        self.reset_port();
    }

    /// Reset everything except RAM contents.
    pub fn reset_keeping_ram(&mut self) {
        self.reset_port();
    }

    fn reset_port(&mut self) {
        self.port_ddr = 0x2F; // Bits 0-3,5 output
        self.port_data = 0x37; // All ROMs + I/O visible
        self.update_lookup_tables(true, true);
    }

    /// Effective port value: (data & ddr) | (pull-ups & !ddr).
    #[must_use]
    pub fn processor_port(&self) -> u8 {
        (self.port_data & self.port_ddr) | (PORT_PULL_UP & !self.port_ddr)
    }

    /// Recompute the routing table from the port bits and the given
    /// expansion port lines (`true` = high = inactive).
    pub fn update_lookup_tables(&mut self, game: bool, exrom: bool) {
        let index = (usize::from(exrom) << 4)
            | (usize::from(game) << 3)
            | usize::from(self.processor_port() & 0x07);
        let row = &BANK_MAP[index];
        let ultimax = exrom && !game;

        self.read_map[0] = Region::Ram;
        self.write_map[0] = Region::Ram;
        for slot in 1..16 {
            let source = row[SLOT_COLUMN[slot]];
            self.read_map[slot] = source;
            self.write_map[slot] = match source {
                Region::Io => Region::Io,
                Region::CartLo | Region::CartHi if ultimax => source,
                Region::Unmapped => Region::Unmapped,
                _ => Region::Ram,
            };
        }
    }

    /// Override one slot. Used by cartridges that map themselves in ways
    /// the PLA table does not describe.
    pub fn set_slot(&mut self, slot: usize, read: Region, write: Region) {
        self.read_map[slot & 0x0F] = read;
        self.write_map[slot & 0x0F] = write;
    }

    #[must_use]
    pub fn read_source(&self, addr: u16) -> Region {
        self.read_map[usize::from(addr >> 12)]
    }

    #[must_use]
    pub fn write_target(&self, addr: u16) -> Region {
        self.write_map[usize::from(addr >> 12)]
    }

    #[must_use]
    pub fn read_map(&self) -> &[Region; 16] {
        &self.read_map
    }

    #[must_use]
    pub fn write_map(&self) -> &[Region; 16] {
        &self.write_map
    }

    /// Read from a RAM or ROM region. I/O and cartridge regions are
    /// resolved by the bus before it gets here.
    #[must_use]
    pub fn read(&self, region: Region, addr: u16) -> u8 {
        match region {
            Region::Ram => match addr {
                0x0000 => self.port_ddr,
                0x0001 => self.processor_port(),
                _ => self.ram[usize::from(addr)],
            },
            Region::Kernal => self.kernal_rom[usize::from(addr & 0x1FFF)],
            Region::Basic => self.basic_rom[usize::from(addr & 0x1FFF)],
            Region::CharRom => self.char_rom[usize::from(addr & 0x0FFF)],
            Region::Io | Region::CartLo | Region::CartHi | Region::Unmapped => OPEN_BUS,
        }
    }

    /// Write RAM, or the 6510 port at $00/$01.
    ///
    /// Returns true when the port changed, in which case the caller must
    /// recompute the routing table before the next access.
    pub fn write_ram(&mut self, addr: u16, value: u8) -> bool {
        match addr {
            0x0000 => {
                self.port_ddr = value;
                true
            }
            0x0001 => {
                self.port_data = value;
                true
            }
            _ => {
                self.ram[usize::from(addr)] = value;
                false
            }
        }
    }

    /// Direct RAM read (bypasses banking, for debugging/observation).
    #[must_use]
    pub fn ram_read(&self, addr: u16) -> u8 {
        self.ram[usize::from(addr)]
    }

    /// Direct RAM write (bypasses banking, for program loading).
    pub fn ram_write(&mut self, addr: u16, value: u8) {
        self.ram[usize::from(addr)] = value;
    }

    /// Read colour RAM at the given offset (0-1023).
    #[must_use]
    pub fn colour_ram_read(&self, offset: u16) -> u8 {
        self.colour_ram[usize::from(offset & 0x03FF)] & 0x0F
    }

    /// Write colour RAM at the given offset (0-1023). Only low 4 bits stored.
    pub fn colour_ram_write(&mut self, offset: u16, value: u8) {
        self.colour_ram[usize::from(offset & 0x03FF)] = value & 0x0F;
    }
}

impl Stateful for AddressSpace {
    fn state_size(&self) -> usize {
        self.ram.len() + self.colour_ram.len() + 2 + 32
    }

    fn save_state(&self, writer: &mut StateWriter) {
        writer.write_bytes(&self.ram[..]);
        writer.write_bytes(&self.colour_ram);
        writer.write_u8(self.port_ddr);
        writer.write_u8(self.port_data);
        for region in self.read_map.iter().chain(&self.write_map) {
            writer.write_u8(*region as u8);
        }
    }

    fn load_state(&mut self, reader: &mut StateReader<'_>) -> Result<(), StateError> {
        let mut read_map = [Region::Ram; 16];
        let mut write_map = [Region::Ram; 16];
        let mut ram = vec![0; 0x10000];
        let mut colour_ram = [0; 1024];
        reader.read_into(&mut ram)?;
        reader.read_into(&mut colour_ram)?;
        let port_ddr = reader.read_u8()?;
        let port_data = reader.read_u8()?;
        for slot in read_map.iter_mut().chain(write_map.iter_mut()) {
            *slot = Region::from_u8(reader.read_u8()?)?;
        }

        self.ram.copy_from_slice(&ram);
        self.colour_ram = colour_ram;
        self.port_ddr = port_ddr;
        self.port_data = port_data;
        self.read_map = read_map;
        self.write_map = write_map;
        Ok(())
    }
}

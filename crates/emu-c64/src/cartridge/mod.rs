//! Cartridge hardware: ROM chips plus the bank-switching logic of each type.
//!
//! A cartridge sees the machine through three things: the ROML ($8000) and
//! ROMH ($A000 or $E000) windows, the two 256-byte I/O windows at $DE00
//! (I/O 1) and $DF00 (I/O 2), and the GAME/EXROM/NMI lines it drives on the
//! expansion port. Register writes select banks and change lines; the port
//! recomputes the memory map afterwards.
//!
//! Supported types (CRT type numbers):
//! - Type 0 (Normal): 4K, 8K or 16K, no bankswitching.
//! - Type 3 (Final Cartridge III): 4x16K, packed control register at $DFFF.
//! - Type 4 (Simon's BASIC): 2x8K, reading $DE00 selects 8K, writing 16K.
//! - Type 5 (Ocean): up to 64 x 8K banks, selected via $DE00.
//! - Type 6 (Expert): 8K on-board RAM, three-position mode switch.
//! - Type 7 (Fun Play / Power Play): 16x8K, scrambled bank bits at $DE00.
//! - Type 8 (Super Games): 4x16K, control register at $DF00.
//! - Type 10 (Epyx FastLoad): 8K, disabled by a discharging capacitor.
//! - Type 15 (C64 Game System): 64x8K, the I/O 1 address selects the bank.
//! - Type 18 (Zaxxon): ROML reads switch the ROMH bank.
//! - Type 19 (Magic Desk): up to 128 x 8K, bit 7 of $DE00 disables.
//! - Type 32 (EasyFlash): 64x8K dual banks, 256B RAM at $DF00.

#![allow(clippy::cast_possible_truncation)]

mod banked;
mod freezer;
mod image;

use std::fmt;

use emu_core::{StateError, StateReader, StateWriter, Stateful};
use log::debug;

use crate::error::CartridgeError;
use crate::expansion_port::ControlLines;
use crate::memory::{AddressSpace, OPEN_BUS};

pub use image::{CartridgeImage, ChipImage};

/// Cartridge hardware type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartridgeType {
    Normal,
    FinalIii,
    SimonsBasic,
    Ocean,
    Expert,
    FunPlay,
    SuperGames,
    EpyxFastload,
    C64GameSystem,
    Zaxxon,
    MagicDesk,
    EasyFlash,
}

impl CartridgeType {
    /// Look up a CRT hardware type number.
    #[must_use]
    pub const fn from_id(id: u16) -> Option<Self> {
        Some(match id {
            0 => Self::Normal,
            3 => Self::FinalIii,
            4 => Self::SimonsBasic,
            5 => Self::Ocean,
            6 => Self::Expert,
            7 => Self::FunPlay,
            8 => Self::SuperGames,
            10 => Self::EpyxFastload,
            15 => Self::C64GameSystem,
            18 => Self::Zaxxon,
            19 => Self::MagicDesk,
            32 => Self::EasyFlash,
            _ => return None,
        })
    }

    /// CRT hardware type number.
    #[must_use]
    pub const fn id(self) -> u16 {
        match self {
            Self::Normal => 0,
            Self::FinalIii => 3,
            Self::SimonsBasic => 4,
            Self::Ocean => 5,
            Self::Expert => 6,
            Self::FunPlay => 7,
            Self::SuperGames => 8,
            Self::EpyxFastload => 10,
            Self::C64GameSystem => 15,
            Self::Zaxxon => 18,
            Self::MagicDesk => 19,
            Self::EasyFlash => 32,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::FinalIii => "Final Cartridge III",
            Self::SimonsBasic => "Simons' BASIC",
            Self::Ocean => "Ocean",
            Self::Expert => "Expert",
            Self::FunPlay => "Fun Play",
            Self::SuperGames => "Super Games",
            Self::EpyxFastload => "Epyx FastLoad",
            Self::C64GameSystem => "C64 Game System",
            Self::Zaxxon => "Zaxxon",
            Self::MagicDesk => "Magic Desk",
            Self::EasyFlash => "EasyFlash",
        }
    }
}

impl fmt::Display for CartridgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Mode switch positions for cartridges that have one.
pub const SWITCH_LEFT: i8 = -1;
pub const SWITCH_NEUTRAL: i8 = 0;
pub const SWITCH_RIGHT: i8 = 1;

/// Follow-up the machine must perform after a cartridge button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    None,
    /// Reset every chip but keep the contents of RAM.
    ResetKeepingRam,
}

/// Which chip (and which 8K half of it) a ROM window shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Window {
    chip: Option<u16>,
    offset: u16,
}

/// Type-specific registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variant {
    Normal,
    FinalIii { control: u8 },
    SimonsBasic,
    Ocean,
    Expert { active: bool },
    FunPlay,
    SuperGames { protected: bool },
    EpyxFastload { capacitor: u32 },
    C64GameSystem,
    Zaxxon,
    MagicDesk,
    EasyFlash { control: u8 },
}

impl Variant {
    fn new(kind: CartridgeType) -> Self {
        match kind {
            CartridgeType::Normal => Self::Normal,
            CartridgeType::FinalIii => Self::FinalIii { control: 0 },
            CartridgeType::SimonsBasic => Self::SimonsBasic,
            CartridgeType::Ocean => Self::Ocean,
            CartridgeType::Expert => Self::Expert { active: false },
            CartridgeType::FunPlay => Self::FunPlay,
            CartridgeType::SuperGames => Self::SuperGames { protected: false },
            CartridgeType::EpyxFastload => Self::EpyxFastload {
                capacitor: banked::EPYX_CAPACITOR_CYCLES,
            },
            CartridgeType::C64GameSystem => Self::C64GameSystem,
            CartridgeType::Zaxxon => Self::Zaxxon,
            CartridgeType::MagicDesk => Self::MagicDesk,
            CartridgeType::EasyFlash => Self::EasyFlash { control: 0 },
        }
    }

    fn kind(self) -> CartridgeType {
        match self {
            Self::Normal => CartridgeType::Normal,
            Self::FinalIii { .. } => CartridgeType::FinalIii,
            Self::SimonsBasic => CartridgeType::SimonsBasic,
            Self::Ocean => CartridgeType::Ocean,
            Self::Expert { .. } => CartridgeType::Expert,
            Self::FunPlay => CartridgeType::FunPlay,
            Self::SuperGames { .. } => CartridgeType::SuperGames,
            Self::EpyxFastload { .. } => CartridgeType::EpyxFastload,
            Self::C64GameSystem => CartridgeType::C64GameSystem,
            Self::Zaxxon => CartridgeType::Zaxxon,
            Self::MagicDesk => CartridgeType::MagicDesk,
            Self::EasyFlash { .. } => CartridgeType::EasyFlash,
        }
    }

    fn state_size(self) -> usize {
        match self {
            Self::FinalIii { .. }
            | Self::Expert { .. }
            | Self::SuperGames { .. }
            | Self::EasyFlash { .. } => 1,
            Self::EpyxFastload { .. } => 4,
            _ => 0,
        }
    }

    fn save_state(self, writer: &mut StateWriter) {
        match self {
            Self::FinalIii { control } | Self::EasyFlash { control } => writer.write_u8(control),
            Self::Expert { active } => writer.write_bool(active),
            Self::SuperGames { protected } => writer.write_bool(protected),
            Self::EpyxFastload { capacitor } => writer.write_u32(capacitor),
            _ => {}
        }
    }

    fn load_state(self, reader: &mut StateReader<'_>) -> Result<Self, StateError> {
        Ok(match self {
            Self::FinalIii { .. } => Self::FinalIii {
                control: reader.read_u8()?,
            },
            Self::EasyFlash { .. } => Self::EasyFlash {
                control: reader.read_u8()?,
            },
            Self::Expert { .. } => Self::Expert {
                active: reader.read_bool()?,
            },
            Self::SuperGames { .. } => Self::SuperGames {
                protected: reader.read_bool()?,
            },
            Self::EpyxFastload { .. } => Self::EpyxFastload {
                capacitor: reader.read_u32()?,
            },
            other => other,
        })
    }
}

/// An attached cartridge.
#[derive(Debug, Clone)]
pub struct Cartridge {
    variant: Variant,
    name: String,
    /// GAME line level after reset (`true` = high = inactive).
    game: bool,
    /// EXROM line level after reset.
    exrom: bool,
    chips: Vec<ChipImage>,
    /// Bank most recently selected with [`bank_in`](Self::bank_in).
    bank: u8,
    rom_l: Window,
    rom_h: Window,
    /// On-board RAM. Empty unless the hardware has some.
    ram: Vec<u8>,
    switch: i8,
}

impl Cartridge {
    /// Validate an image and build the matching controller.
    pub fn new(image: CartridgeImage) -> Result<Self, CartridgeError> {
        let kind = image.validate()?;
        let mut cartridge = Self::blank(kind);
        cartridge.name = image.name;
        cartridge.game = image.game;
        cartridge.exrom = image.exrom;
        cartridge.chips = image.chips;

        match kind {
            // Starts in 16K mode; the ROM then switches configurations itself
            CartridgeType::FinalIii | CartridgeType::SuperGames => {
                cartridge.game = false;
                cartridge.exrom = false;
            }
            CartridgeType::EpyxFastload => {
                cartridge.game = true;
                cartridge.exrom = false;
            }
            // Boot jumper holds GAME low
            CartridgeType::EasyFlash => {
                cartridge.game = false;
                cartridge.exrom = true;
            }
            CartridgeType::Expert => {
                cartridge.ram.copy_from_slice(&cartridge.chips[0].data);
            }
            _ => {}
        }
        Ok(cartridge)
    }

    /// A cartridge of the given type with no chips, ready to be filled in
    /// from saved state.
    pub(crate) fn blank(kind: CartridgeType) -> Self {
        Self {
            variant: Variant::new(kind),
            name: String::new(),
            game: true,
            exrom: true,
            chips: Vec::new(),
            bank: 0,
            rom_l: Window::default(),
            rom_h: Window::default(),
            ram: vec![0; Self::ram_size(kind)],
            switch: SWITCH_NEUTRAL,
        }
    }

    /// Bytes of on-board RAM the hardware carries.
    fn ram_size(kind: CartridgeType) -> usize {
        match kind {
            CartridgeType::Expert => 0x2000,
            CartridgeType::EasyFlash => 0x100,
            _ => 0,
        }
    }

    #[must_use]
    pub fn kind(&self) -> CartridgeType {
        self.variant.kind()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn chips(&self) -> &[ChipImage] {
        &self.chips
    }

    /// Bank most recently switched in.
    #[must_use]
    pub fn bank(&self) -> u8 {
        self.bank
    }

    #[must_use]
    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    #[must_use]
    pub fn switch(&self) -> i8 {
        self.switch
    }

    /// Latched control register, for types that have one.
    #[must_use]
    pub fn control_register(&self) -> Option<u8> {
        match self.variant {
            Variant::FinalIii { control } | Variant::EasyFlash { control } => Some(control),
            _ => None,
        }
    }

    /// Whether the cartridge currently takes part in address decoding.
    /// Only meaningful for cartridges with on-board RAM that can switch
    /// themselves out.
    #[must_use]
    pub fn is_active(&self) -> bool {
        match self.variant {
            Variant::Expert { active } => active,
            _ => true,
        }
    }

    /// Return to the power-on configuration and drive the power-on lines.
    pub fn reset(&mut self, lines: &mut ControlLines) {
        lines.game = self.game;
        lines.exrom = self.exrom;
        lines.nmi = false;
        self.rom_l = Window::default();
        self.rom_h = Window::default();
        self.variant = match self.variant {
            Variant::Expert { .. } => {
                self.expert_apply_switch(lines);
                Variant::Expert { active: false }
            }
            other => Variant::new(other.kind()),
        };
        self.bank_in(0);
    }

    /// Map every chip belonging to `bank` into its window.
    ///
    /// A 16K chip at $8000 fills ROML with its lower half and ROMH with its
    /// upper half. Calling this twice with the same bank is a no-op.
    pub fn bank_in(&mut self, bank: u8) {
        if bank != self.bank {
            debug!("{}: bank {bank}", self.variant.kind());
        }
        for (index, chip) in self.chips.iter().enumerate() {
            if chip.bank != u16::from(bank) {
                continue;
            }
            let window = Window {
                chip: Some(index as u16),
                offset: 0,
            };
            match chip.load_address {
                0x8000 if chip.data.len() > 0x2000 => {
                    self.rom_l = window;
                    self.rom_h = Window {
                        offset: 0x2000,
                        ..window
                    };
                }
                0x8000 => self.rom_l = window,
                _ => self.rom_h = window,
            }
        }
        self.bank = bank;
    }

    /// Read the ROM currently visible at `addr` without side effects.
    ///
    /// $8000-$9FFF reads ROML, any other address reads ROMH. Chips smaller
    /// than their window are mirrored.
    #[must_use]
    pub fn spy_peek(&self, addr: u16) -> u8 {
        if matches!(self.variant, Variant::Expert { .. }) {
            return self.ram[usize::from(addr & 0x1FFF)];
        }
        let window = if (0x8000..0xA000).contains(&addr) {
            self.rom_l
        } else {
            self.rom_h
        };
        let Some(chip) = window.chip.and_then(|i| self.chips.get(usize::from(i))) else {
            return OPEN_BUS;
        };
        if chip.data.is_empty() {
            return OPEN_BUS;
        }
        chip.data[(usize::from(window.offset) + usize::from(addr & 0x1FFF)) % chip.data.len()]
    }

    /// CPU read from a cartridge ROM window.
    pub fn peek(&mut self, addr: u16, lines: &mut ControlLines) -> u8 {
        let value = self.spy_peek(addr);
        match self.variant {
            Variant::EpyxFastload { .. } if addr < 0xA000 => self.epyx_recharge(lines),
            Variant::Zaxxon if addr < 0xA000 => self.zaxxon_select(addr),
            _ => {}
        }
        value
    }

    /// CPU write to a cartridge ROM window. Only reachable in ultimax mode
    /// or when the cartridge has mapped its RAM for writing.
    pub fn poke(&mut self, addr: u16, value: u8) {
        if let Variant::Expert { .. } = self.variant {
            if (0x8000..0xA000).contains(&addr) {
                self.ram[usize::from(addr & 0x1FFF)] = value;
            }
        }
    }

    /// CPU read from I/O 1 ($DE00-$DEFF) or I/O 2 ($DF00-$DFFF).
    pub fn peek_io(&mut self, addr: u16, lines: &mut ControlLines) -> u8 {
        match self.variant {
            Variant::FinalIii { .. } => self.final_iii_peek_io(addr),
            Variant::SimonsBasic => Self::simons_basic_peek_io(addr, lines),
            Variant::Expert { .. } => self.expert_peek_io(addr, lines),
            Variant::SuperGames { .. } => 0x00,
            Variant::EpyxFastload { .. } => self.epyx_peek_io(addr, lines),
            Variant::C64GameSystem => self.c64gs_peek_io(addr),
            Variant::EasyFlash { .. } => self.easyflash_peek_io(addr),
            _ => OPEN_BUS,
        }
    }

    /// CPU write to I/O 1 or I/O 2.
    pub fn poke_io(&mut self, addr: u16, value: u8, lines: &mut ControlLines) {
        match self.variant {
            Variant::Normal | Variant::Zaxxon => {}
            Variant::FinalIii { .. } => self.final_iii_poke_io(addr, value, lines),
            Variant::SimonsBasic => Self::simons_basic_poke_io(addr, lines),
            Variant::Ocean => self.ocean_poke_io(addr, value),
            Variant::Expert { .. } => self.expert_poke_io(addr, lines),
            Variant::FunPlay => self.fun_play_poke_io(addr, value, lines),
            Variant::SuperGames { .. } => self.super_games_poke_io(addr, value, lines),
            Variant::EpyxFastload { .. } => {}
            Variant::C64GameSystem => self.c64gs_poke_io(addr),
            Variant::MagicDesk => self.magic_desk_poke_io(addr, value, lines),
            Variant::EasyFlash { .. } => self.easyflash_poke_io(addr, value, lines),
        }
    }

    /// Advance cartridge-internal time by one CPU cycle.
    pub fn execute(&mut self, lines: &mut ControlLines) {
        if let Variant::EpyxFastload { .. } = self.variant {
            self.epyx_discharge(lines);
        }
    }

    /// Apply overrides the PLA table cannot express. Called after the
    /// default routing for the current lines has been computed.
    pub fn update_lookup_tables(&self, memory: &mut AddressSpace) {
        if let Variant::Expert { .. } = self.variant {
            self.expert_update_lookup_tables(memory);
        }
    }

    /// Press the cartridge's first button (usually freeze).
    pub fn press_first_button(&mut self, lines: &mut ControlLines) -> ButtonAction {
        match self.variant {
            Variant::FinalIii { .. } => self.final_iii_freeze(lines),
            Variant::Expert { .. } => self.expert_freeze(lines),
            _ => {}
        }
        ButtonAction::None
    }

    /// Press the cartridge's second button (usually reset).
    pub fn press_second_button(&mut self, _lines: &mut ControlLines) -> ButtonAction {
        match self.variant {
            Variant::FinalIii { .. } => ButtonAction::ResetKeepingRam,
            _ => ButtonAction::None,
        }
    }

    /// Move the mode switch. Positions outside -1..=1 are clamped.
    pub fn set_switch(&mut self, position: i8, lines: &mut ControlLines) {
        self.switch = position.clamp(SWITCH_LEFT, SWITCH_RIGHT);
        if let Variant::Expert { .. } = self.variant {
            self.variant = Variant::Expert { active: false };
            self.expert_apply_switch(lines);
        }
    }

    fn window_state_size() -> usize {
        1 + 2 + 2
    }

    fn save_window(window: Window, writer: &mut StateWriter) {
        writer.write_bool(window.chip.is_some());
        writer.write_u16(window.chip.unwrap_or(0));
        writer.write_u16(window.offset);
    }

    fn load_window(&self, reader: &mut StateReader<'_>) -> Result<Window, StateError> {
        let present = reader.read_bool()?;
        let chip = reader.read_u16()?;
        let offset = reader.read_u16()?;
        if present && usize::from(chip) >= self.chips.len() {
            return Err(StateError::InvalidField {
                field: "cartridge window chip",
                value: u64::from(chip),
            });
        }
        Ok(Window {
            chip: present.then_some(chip),
            offset,
        })
    }
}

impl Stateful for Cartridge {
    fn state_size(&self) -> usize {
        let chips: usize = self.chips.iter().map(|c| 2 + 2 + 4 + c.data.len()).sum();
        2 + self.name.len()
            + 2 // power-on lines
            + 1 // switch
            + 2 + chips
            + 1 // bank
            + 2 * Self::window_state_size()
            + 4 + self.ram.len()
            + self.variant.state_size()
    }

    fn save_state(&self, writer: &mut StateWriter) {
        writer.write_u16(self.name.len() as u16);
        writer.write_bytes(self.name.as_bytes());
        writer.write_bool(self.game);
        writer.write_bool(self.exrom);
        writer.write_u8(self.switch as u8);
        writer.write_u16(self.chips.len() as u16);
        for chip in &self.chips {
            writer.write_u16(chip.bank);
            writer.write_u16(chip.load_address);
            writer.write_u32(chip.data.len() as u32);
            writer.write_bytes(&chip.data);
        }
        writer.write_u8(self.bank);
        Self::save_window(self.rom_l, writer);
        Self::save_window(self.rom_h, writer);
        writer.write_u32(self.ram.len() as u32);
        writer.write_bytes(&self.ram);
        self.variant.save_state(writer);
    }

    fn load_state(&mut self, reader: &mut StateReader<'_>) -> Result<(), StateError> {
        let name_len = usize::from(reader.read_u16()?);
        self.name = String::from_utf8_lossy(reader.read_bytes(name_len)?).into_owned();
        self.game = reader.read_bool()?;
        self.exrom = reader.read_bool()?;
        self.switch = reader.read_u8()? as i8;
        let chip_count = usize::from(reader.read_u16()?);
        self.chips.clear();
        for _ in 0..chip_count {
            let bank = reader.read_u16()?;
            let load_address = reader.read_u16()?;
            let len = reader.read_u32()? as usize;
            let data = reader.read_bytes(len)?.to_vec();
            self.chips.push(ChipImage::new(bank, load_address, data));
        }
        self.bank = reader.read_u8()?;
        self.rom_l = self.load_window(reader)?;
        self.rom_h = self.load_window(reader)?;
        let ram_len = reader.read_u32()?;
        if ram_len as usize != Self::ram_size(self.kind()) {
            return Err(StateError::InvalidField {
                field: "cartridge RAM",
                value: u64::from(ram_len),
            });
        }
        self.ram = reader.read_bytes(ram_len as usize)?.to_vec();
        self.variant = self.variant.load_state(reader)?;
        Ok(())
    }
}

//! Expansion port: the GAME, EXROM and NMI lines and the attached cartridge.
//!
//! GAME and EXROM are open-collector inputs to the PLA, pulled high when
//! nothing drives them. Whenever a line changes, the routing table is
//! recomputed before the call that changed it returns.

use emu_core::{StateError, StateReader, StateWriter, Stateful};
use log::{debug, info};

use crate::cartridge::{ButtonAction, Cartridge, CartridgeImage, CartridgeType};
use crate::error::CartridgeError;
use crate::memory::{AddressSpace, OPEN_BUS};

/// Expansion port line levels. `true` means high, which is inactive for
/// GAME and EXROM. `nmi` is true while the cartridge asserts NMI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlLines {
    pub game: bool,
    pub exrom: bool,
    pub nmi: bool,
}

impl Default for ControlLines {
    fn default() -> Self {
        Self {
            game: true,
            exrom: true,
            nmi: false,
        }
    }
}

impl ControlLines {
    /// GAME low with EXROM high.
    #[must_use]
    pub fn ultimax(&self) -> bool {
        !self.game && self.exrom
    }
}

#[derive(Debug, Default)]
pub struct ExpansionPort {
    lines: ControlLines,
    cartridge: Option<Cartridge>,
}

impl ExpansionPort {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lines(&self) -> ControlLines {
        self.lines
    }

    #[must_use]
    pub fn game_line(&self) -> bool {
        self.lines.game
    }

    #[must_use]
    pub fn exrom_line(&self) -> bool {
        self.lines.exrom
    }

    #[must_use]
    pub fn ultimax(&self) -> bool {
        self.lines.ultimax()
    }

    /// Whether the cartridge is pulling NMI low.
    #[must_use]
    pub fn nmi(&self) -> bool {
        self.lines.nmi
    }

    #[must_use]
    pub fn cartridge(&self) -> Option<&Cartridge> {
        self.cartridge.as_ref()
    }

    pub fn set_game_line(&mut self, value: bool, memory: &mut AddressSpace) {
        self.lines.game = value;
        self.update_lookup_tables(memory);
    }

    pub fn set_exrom_line(&mut self, value: bool, memory: &mut AddressSpace) {
        self.lines.exrom = value;
        self.update_lookup_tables(memory);
    }

    /// Recompute the routing table: PLA defaults for the current lines,
    /// then any cartridge-specific override.
    pub fn update_lookup_tables(&self, memory: &mut AddressSpace) {
        memory.update_lookup_tables(self.lines.game, self.lines.exrom);
        if let Some(cartridge) = &self.cartridge {
            cartridge.update_lookup_tables(memory);
        }
    }

    /// Put the cartridge (if any) into its power-on configuration.
    pub fn reset(&mut self, memory: &mut AddressSpace) {
        match &mut self.cartridge {
            Some(cartridge) => cartridge.reset(&mut self.lines),
            None => self.lines = ControlLines::default(),
        }
        self.update_lookup_tables(memory);
    }

    /// Validate an image, plug the resulting cartridge in and reset it.
    /// On error the port is left untouched.
    pub fn attach_image(
        &mut self,
        image: CartridgeImage,
        memory: &mut AddressSpace,
    ) -> Result<CartridgeType, CartridgeError> {
        let cartridge = Cartridge::new(image)?;
        let kind = cartridge.kind();
        self.attach(cartridge, memory);
        Ok(kind)
    }

    pub fn attach(&mut self, cartridge: Cartridge, memory: &mut AddressSpace) {
        info!(
            "Attaching {} cartridge \"{}\" ({} chips)",
            cartridge.kind(),
            cartridge.name(),
            cartridge.chips().len()
        );
        self.cartridge = Some(cartridge);
        self.reset(memory);
    }

    /// Remove the cartridge and restore the default memory map.
    pub fn detach(&mut self, memory: &mut AddressSpace) -> Option<Cartridge> {
        let cartridge = self.cartridge.take();
        if let Some(cartridge) = &cartridge {
            info!("Detaching {} cartridge", cartridge.kind());
        }
        self.lines = ControlLines::default();
        self.update_lookup_tables(memory);
        cartridge
    }

    /// Refresh the routing table if an access changed the lines.
    fn sync(&self, before: ControlLines, memory: &mut AddressSpace) {
        if self.lines != before {
            debug!(
                "Expansion port lines GAME={} EXROM={} NMI={}",
                u8::from(self.lines.game),
                u8::from(self.lines.exrom),
                u8::from(self.lines.nmi)
            );
            self.update_lookup_tables(memory);
        }
    }

    /// Read a cartridge ROM window without side effects.
    #[must_use]
    pub fn spy_peek(&self, addr: u16) -> u8 {
        self.cartridge
            .as_ref()
            .map_or(OPEN_BUS, |cartridge| cartridge.spy_peek(addr))
    }

    /// CPU read from ROML or ROMH.
    pub fn peek(&mut self, addr: u16, memory: &mut AddressSpace) -> u8 {
        let before = self.lines;
        let Some(cartridge) = &mut self.cartridge else {
            return OPEN_BUS;
        };
        let value = cartridge.peek(addr, &mut self.lines);
        self.sync(before, memory);
        value
    }

    /// CPU write to ROML or ROMH.
    pub fn poke(&mut self, addr: u16, value: u8) {
        if let Some(cartridge) = &mut self.cartridge {
            cartridge.poke(addr, value);
        }
    }

    /// CPU read from I/O 1 or I/O 2.
    pub fn peek_io(&mut self, addr: u16, memory: &mut AddressSpace) -> u8 {
        let Some(cartridge) = &mut self.cartridge else {
            return OPEN_BUS;
        };
        let value = cartridge.peek_io(addr, &mut self.lines);
        self.update_lookup_tables(memory);
        value
    }

    /// CPU write to I/O 1 or I/O 2.
    pub fn poke_io(&mut self, addr: u16, value: u8, memory: &mut AddressSpace) {
        let Some(cartridge) = &mut self.cartridge else {
            return;
        };
        cartridge.poke_io(addr, value, &mut self.lines);
        self.update_lookup_tables(memory);
    }

    /// Advance the cartridge by one CPU cycle.
    pub fn execute(&mut self, memory: &mut AddressSpace) {
        let before = self.lines;
        if let Some(cartridge) = &mut self.cartridge {
            cartridge.execute(&mut self.lines);
            self.sync(before, memory);
        }
    }

    pub fn press_first_button(&mut self, memory: &mut AddressSpace) -> ButtonAction {
        let Some(cartridge) = &mut self.cartridge else {
            return ButtonAction::None;
        };
        let action = cartridge.press_first_button(&mut self.lines);
        self.update_lookup_tables(memory);
        action
    }

    pub fn press_second_button(&mut self, memory: &mut AddressSpace) -> ButtonAction {
        let Some(cartridge) = &mut self.cartridge else {
            return ButtonAction::None;
        };
        let action = cartridge.press_second_button(&mut self.lines);
        self.update_lookup_tables(memory);
        action
    }

    pub fn set_switch(&mut self, position: i8, memory: &mut AddressSpace) {
        if let Some(cartridge) = &mut self.cartridge {
            cartridge.set_switch(position, &mut self.lines);
            self.update_lookup_tables(memory);
        }
    }
}

impl Stateful for ExpansionPort {
    fn state_size(&self) -> usize {
        3 + 1
            + self
                .cartridge
                .as_ref()
                .map_or(0, |cartridge| 2 + cartridge.state_size())
    }

    fn save_state(&self, writer: &mut StateWriter) {
        writer.write_bool(self.lines.game);
        writer.write_bool(self.lines.exrom);
        writer.write_bool(self.lines.nmi);
        writer.write_bool(self.cartridge.is_some());
        if let Some(cartridge) = &self.cartridge {
            writer.write_u16(cartridge.kind().id());
            cartridge.save_state(writer);
        }
    }

    fn load_state(&mut self, reader: &mut StateReader<'_>) -> Result<(), StateError> {
        let lines = ControlLines {
            game: reader.read_bool()?,
            exrom: reader.read_bool()?,
            nmi: reader.read_bool()?,
        };
        let cartridge = if reader.read_bool()? {
            let id = reader.read_u16()?;
            let kind = CartridgeType::from_id(id).ok_or(StateError::InvalidField {
                field: "cartridge type",
                value: u64::from(id),
            })?;
            let mut cartridge = Cartridge::blank(kind);
            cartridge.load_state(reader)?;
            Some(cartridge)
        } else {
            None
        };
        self.lines = lines;
        self.cartridge = cartridge;
        Ok(())
    }
}

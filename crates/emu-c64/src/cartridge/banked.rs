//! Bank-switching game and utility cartridges.

use super::{Cartridge, Variant};
use crate::expansion_port::ControlLines;
use crate::memory::OPEN_BUS;

/// Cycles until the Epyx FastLoad capacitor has discharged and the
/// cartridge drops out of the memory map.
pub(super) const EPYX_CAPACITOR_CYCLES: u32 = 512;

/// Fun Play / Power Play writes this to switch the cartridge off.
const FUN_PLAY_DISABLE: u8 = 0x86;

impl Cartridge {
    /// Reading $DE00 switches to 8K, writing switches to 16K.
    pub(super) fn simons_basic_peek_io(addr: u16, lines: &mut ControlLines) -> u8 {
        if addr == 0xDE00 {
            lines.game = true;
        }
        OPEN_BUS
    }

    pub(super) fn simons_basic_poke_io(addr: u16, lines: &mut ControlLines) {
        if addr == 0xDE00 {
            lines.game = false;
        }
    }

    /// Lower six bits of $DE00 select the bank.
    pub(super) fn ocean_poke_io(&mut self, addr: u16, value: u8) {
        if addr == 0xDE00 {
            self.bank_in(value & 0x3F);
        }
    }

    /// ```text
    /// Bit in $DE00 -> 76543210
    ///                 xx210xx3 <- bit in selected bank
    /// ```
    pub(super) fn fun_play_poke_io(&mut self, addr: u16, value: u8, lines: &mut ControlLines) {
        if addr != 0xDE00 {
            return;
        }
        if value == FUN_PLAY_DISABLE {
            lines.game = true;
            lines.exrom = true;
            return;
        }
        self.bank_in(fun_play_bank(value));
    }

    /// $DF00: bits 0-1 bank, bit 2 selects 8K mode, bit 3 locks the
    /// register until the next reset.
    pub(super) fn super_games_poke_io(&mut self, addr: u16, value: u8, lines: &mut ControlLines) {
        let Variant::SuperGames { protected } = self.variant else {
            return;
        };
        if addr != 0xDF00 || protected {
            return;
        }
        if value & 0x04 != 0 {
            lines.exrom = false;
            lines.game = true;
        } else {
            lines.exrom = false;
            lines.game = false;
        }
        self.bank_in(value & 0x03);
        self.variant = Variant::SuperGames {
            protected: value & 0x08 != 0,
        };
    }

    /// Any ROML or I/O 1 access charges the capacitor and maps the ROM.
    pub(super) fn epyx_recharge(&mut self, lines: &mut ControlLines) {
        self.variant = Variant::EpyxFastload {
            capacitor: EPYX_CAPACITOR_CYCLES,
        };
        lines.exrom = false;
    }

    pub(super) fn epyx_discharge(&mut self, lines: &mut ControlLines) {
        let Variant::EpyxFastload { capacitor } = self.variant else {
            return;
        };
        if capacitor == 0 {
            return;
        }
        let capacitor = capacitor - 1;
        self.variant = Variant::EpyxFastload { capacitor };
        if capacitor == 0 {
            lines.exrom = true;
        }
    }

    /// I/O 1 recharges; I/O 2 shows the last page of the ROM.
    pub(super) fn epyx_peek_io(&mut self, addr: u16, lines: &mut ControlLines) -> u8 {
        if addr < 0xDF00 {
            self.epyx_recharge(lines);
            OPEN_BUS
        } else {
            self.spy_peek(0x9F00 | (addr & 0x00FF))
        }
    }

    /// The I/O 1 address, not the data, selects the bank.
    pub(super) fn c64gs_poke_io(&mut self, addr: u16) {
        if addr < 0xDF00 {
            self.bank_in((addr & 0x3F) as u8);
        }
    }

    pub(super) fn c64gs_peek_io(&mut self, addr: u16) -> u8 {
        if addr < 0xDF00 {
            self.bank_in(0);
        }
        OPEN_BUS
    }

    /// Reading the lower 4K of ROML switches ROMH to bank 0, the upper 4K
    /// to bank 1.
    pub(super) fn zaxxon_select(&mut self, addr: u16) {
        self.bank_in(u8::from(addr >= 0x9000));
    }

    /// Bit 7 of $DE00 releases EXROM and leaves the bank alone, otherwise
    /// the low bits select the bank.
    pub(super) fn magic_desk_poke_io(&mut self, addr: u16, value: u8, lines: &mut ControlLines) {
        if addr != 0xDE00 {
            return;
        }
        lines.exrom = value & 0x80 != 0;
        if !lines.exrom {
            self.bank_in(value & 0x7F);
        }
    }

    /// $DE00 bank, $DE02 mode, $DF00-$DFFF RAM.
    pub(super) fn easyflash_poke_io(&mut self, addr: u16, value: u8, lines: &mut ControlLines) {
        match addr {
            0xDE00 => self.bank_in(value & 0x3F),
            0xDE02 => {
                // Bit 2 (M): GAME from bit 0 instead of the boot jumper.
                // Bits 1 (X) and 0 (G) set assert EXROM and GAME.
                lines.game = value & 0x04 != 0 && value & 0x01 == 0;
                lines.exrom = value & 0x02 == 0;
                self.variant = Variant::EasyFlash { control: value };
            }
            0xDF00..=0xDFFF => self.ram[usize::from(addr & 0xFF)] = value,
            _ => {}
        }
    }

    pub(super) fn easyflash_peek_io(&self, addr: u16) -> u8 {
        if addr >= 0xDF00 {
            self.ram[usize::from(addr & 0xFF)]
        } else {
            OPEN_BUS
        }
    }
}

/// Unscramble the Fun Play bank number from a $DE00 write.
pub(super) fn fun_play_bank(value: u8) -> u8 {
    ((value >> 3) & 0x07) | ((value << 3) & 0x08)
}

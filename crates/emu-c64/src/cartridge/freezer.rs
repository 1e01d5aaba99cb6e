//! Freezer cartridges: Final Cartridge III and Expert.
//!
//! Both take over the machine with an NMI while in ultimax mode, which
//! replaces the kernal's NMI vector with their own.

use log::debug;

use super::{Cartridge, SWITCH_LEFT, SWITCH_RIGHT, Variant};
use crate::expansion_port::ControlLines;
use crate::memory::{AddressSpace, OPEN_BUS, Region};

/// Final Cartridge III control register.
const FINAL_III_CONTROL: u16 = 0xDFFF;

impl Cartridge {
    /// I/O 1 and I/O 2 mirror $1E00-$1FFF of the selected ROML bank.
    pub(super) fn final_iii_peek_io(&self, addr: u16) -> u8 {
        self.spy_peek(0x8000 + 0x1E00 + (addr - 0xDE00))
    }

    pub(super) fn final_iii_poke_io(&mut self, addr: u16, value: u8, lines: &mut ControlLines) {
        if addr == FINAL_III_CONTROL {
            self.final_iii_write_control(value, lines);
        }
    }

    /// ```text
    /// 7    hide (1 = both lines forced high)
    /// 6    NMI line   (0 = low = active)
    /// 5    GAME line  (0 = low = active)
    /// 4    EXROM line (0 = low = active)
    /// 3-2  unused
    /// 1-0  bank shown at $8000 (ROMH shows its upper half)
    /// ```
    pub(super) fn final_iii_write_control(&mut self, value: u8, lines: &mut ControlLines) {
        let hide = value & 0x80 != 0;
        lines.nmi = value & 0x40 == 0;
        lines.game = hide || value & 0x20 != 0;
        lines.exrom = hide || value & 0x10 != 0;
        self.bank_in(value & 0x03);
        self.variant = Variant::FinalIii { control: value };
    }

    /// Freeze: bank 0 in ultimax mode, plus an NMI.
    pub(super) fn final_iii_freeze(&mut self, lines: &mut ControlLines) {
        debug!("Final Cartridge III: freeze");
        self.final_iii_write_control(0x10, lines);
    }

    /// Lines for the current switch position while the cartridge is idle.
    ///
    /// | Switch | Mode | Lines                          |
    /// |--------|------|--------------------------------|
    /// | left   | PRG  | 8K, RAM readable and writable  |
    /// | middle | OFF  | both high                      |
    /// | right  | ON   | both high until activated      |
    pub(super) fn expert_apply_switch(&self, lines: &mut ControlLines) {
        lines.game = true;
        lines.exrom = self.switch != SWITCH_LEFT;
        lines.nmi = false;
    }

    fn expert_set_active(&mut self, active: bool, lines: &mut ControlLines) {
        self.variant = Variant::Expert { active };
        if active {
            lines.game = false;
            lines.exrom = true;
        } else {
            self.expert_apply_switch(lines);
        }
    }

    /// In ON mode, reading I/O 1 maps the cartridge in.
    pub(super) fn expert_peek_io(&mut self, addr: u16, lines: &mut ControlLines) -> u8 {
        if addr < 0xDF00 && self.switch == SWITCH_RIGHT {
            self.expert_set_active(true, lines);
        }
        OPEN_BUS
    }

    /// In ON mode, writing I/O 1 maps the cartridge out.
    pub(super) fn expert_poke_io(&mut self, addr: u16, lines: &mut ControlLines) {
        if addr < 0xDF00 && self.switch == SWITCH_RIGHT {
            self.expert_set_active(false, lines);
        }
    }

    pub(super) fn expert_freeze(&mut self, lines: &mut ControlLines) {
        if self.switch == SWITCH_RIGHT {
            debug!("Expert: freeze");
            self.expert_set_active(true, lines);
            lines.nmi = true;
        }
    }

    /// In PRG mode the RAM at $8000 accepts writes, which the PLA alone
    /// would send to the C64's own RAM.
    pub(super) fn expert_update_lookup_tables(&self, memory: &mut AddressSpace) {
        if self.switch == SWITCH_LEFT {
            memory.set_slot(0x8, Region::CartLo, Region::CartLo);
            memory.set_slot(0x9, Region::CartLo, Region::CartLo);
        }
    }
}

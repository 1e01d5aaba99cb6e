//! Cartridge images as handed over by a loader, and their validation.
//!
//! Parsing container formats is the loader's job. By the time an image
//! reaches the machine it is a list of chips, each with a bank number, a
//! load address and its bytes. Every hardware type accepts only a fixed
//! chip layout; anything else is rejected before the cartridge is built.

use std::ops::RangeInclusive;

use super::CartridgeType;
use crate::error::CartridgeError;

/// One ROM chip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipImage {
    /// Bank number the chip answers to.
    pub bank: u16,
    /// $8000 for ROML, $A000 or $E000 for ROMH.
    pub load_address: u16,
    pub data: Vec<u8>,
}

impl ChipImage {
    #[must_use]
    pub fn new(bank: u16, load_address: u16, data: Vec<u8>) -> Self {
        Self {
            bank,
            load_address,
            data,
        }
    }
}

/// A cartridge as supplied by a loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartridgeImage {
    /// CRT hardware type number.
    pub type_id: u16,
    pub name: String,
    /// GAME line level at power-on (`true` = high = inactive).
    pub game: bool,
    /// EXROM line level at power-on.
    pub exrom: bool,
    pub chips: Vec<ChipImage>,
}

impl CartridgeImage {
    #[must_use]
    pub fn new(kind: CartridgeType, game: bool, exrom: bool, chips: Vec<ChipImage>) -> Self {
        Self {
            type_id: kind.id(),
            name: String::new(),
            game,
            exrom,
            chips,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Check the chip layout against the hardware type's rules.
    pub(super) fn validate(&self) -> Result<CartridgeType, CartridgeError> {
        let kind = CartridgeType::from_id(self.type_id)
            .ok_or(CartridgeError::UnsupportedType(self.type_id))?;
        let layout = Layout::of(kind);

        if !layout.chips.contains(&self.chips.len()) {
            return Err(CartridgeError::ChipCount {
                kind,
                expected: layout.expected,
                found: self.chips.len(),
            });
        }

        for (index, chip) in self.chips.iter().enumerate() {
            if !layout.sizes.contains(&chip.data.len()) {
                return Err(CartridgeError::ChipSize {
                    kind,
                    index,
                    size: chip.data.len(),
                });
            }
            if !layout.addresses.contains(&chip.load_address) {
                return Err(CartridgeError::ChipAddress {
                    kind,
                    index,
                    address: chip.load_address,
                });
            }
            if chip.bank >= layout.banks {
                return Err(CartridgeError::ChipBank {
                    kind,
                    index,
                    bank: chip.bank,
                });
            }
        }

        if kind == CartridgeType::SimonsBasic || kind == CartridgeType::Zaxxon {
            // One chip in ROML, the rest in ROMH
            let roml = self.chips.iter().filter(|c| c.load_address == 0x8000).count();
            if roml != 1 {
                return Err(CartridgeError::ChipCount {
                    kind,
                    expected: "exactly 1 ROML",
                    found: roml,
                });
            }
        }
        Ok(kind)
    }
}

/// Chip layout accepted by a hardware type.
struct Layout {
    chips: RangeInclusive<usize>,
    expected: &'static str,
    sizes: &'static [usize],
    addresses: &'static [u16],
    /// Exclusive upper bound on bank numbers.
    banks: u16,
}

impl Layout {
    const fn banked(max_chips: usize, expected: &'static str, addresses: &'static [u16]) -> Self {
        Self {
            chips: 1..=max_chips,
            expected,
            sizes: &[0x2000],
            addresses,
            banks: max_chips as u16,
        }
    }

    const fn of(kind: CartridgeType) -> Self {
        match kind {
            CartridgeType::Normal => Self {
                chips: 1..=2,
                expected: "1 to 2",
                sizes: &[0x1000, 0x2000, 0x4000],
                addresses: &[0x8000, 0xA000, 0xE000, 0xF000],
                banks: 1,
            },
            CartridgeType::FinalIii => Self {
                chips: 4..=4,
                expected: "4",
                sizes: &[0x4000],
                addresses: &[0x8000],
                banks: 4,
            },
            CartridgeType::SimonsBasic => Self {
                chips: 2..=2,
                expected: "2",
                sizes: &[0x2000],
                addresses: &[0x8000, 0xA000],
                banks: 1,
            },
            CartridgeType::Ocean => Self::banked(64, "1 to 64", &[0x8000, 0xA000]),
            CartridgeType::Expert | CartridgeType::EpyxFastload => Self {
                chips: 1..=1,
                expected: "1",
                sizes: &[0x2000],
                addresses: &[0x8000],
                banks: 1,
            },
            CartridgeType::FunPlay => Self::banked(16, "1 to 16", &[0x8000]),
            CartridgeType::SuperGames => Self {
                chips: 4..=4,
                expected: "4",
                sizes: &[0x4000],
                addresses: &[0x8000],
                banks: 4,
            },
            CartridgeType::C64GameSystem => Self::banked(64, "1 to 64", &[0x8000]),
            CartridgeType::Zaxxon => Self {
                chips: 3..=3,
                expected: "3",
                sizes: &[0x1000, 0x2000],
                addresses: &[0x8000, 0xA000],
                banks: 2,
            },
            CartridgeType::MagicDesk => Self::banked(128, "1 to 128", &[0x8000]),
            CartridgeType::EasyFlash => Self {
                chips: 1..=128,
                expected: "1 to 128",
                sizes: &[0x2000],
                addresses: &[0x8000, 0xA000, 0xE000],
                banks: 64,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(kind: CartridgeType, chips: Vec<ChipImage>) -> CartridgeImage {
        CartridgeImage::new(kind, true, false, chips)
    }

    #[test]
    fn accepts_normal_16k() {
        let img = image(
            CartridgeType::Normal,
            vec![
                ChipImage::new(0, 0x8000, vec![0; 0x2000]),
                ChipImage::new(0, 0xA000, vec![0; 0x2000]),
            ],
        );
        assert_eq!(img.validate(), Ok(CartridgeType::Normal));
    }

    #[test]
    fn rejects_unknown_type() {
        let mut img = image(CartridgeType::Normal, vec![]);
        img.type_id = 99;
        assert_eq!(img.validate(), Err(CartridgeError::UnsupportedType(99)));
    }

    #[test]
    fn rejects_empty_image() {
        let img = image(CartridgeType::Ocean, vec![]);
        assert!(matches!(
            img.validate(),
            Err(CartridgeError::ChipCount { found: 0, .. })
        ));
    }

    #[test]
    fn rejects_wrong_chip_size_for_final_iii() {
        let chips = (0..4)
            .map(|bank| ChipImage::new(bank, 0x8000, vec![0; 0x2000]))
            .collect();
        let img = image(CartridgeType::FinalIii, chips);
        assert_eq!(
            img.validate(),
            Err(CartridgeError::ChipSize {
                kind: CartridgeType::FinalIii,
                index: 0,
                size: 0x2000
            })
        );
    }

    #[test]
    fn super_games_needs_all_four_banks() {
        let chips = (0..3)
            .map(|bank| ChipImage::new(bank, 0x8000, vec![0; 0x4000]))
            .collect();
        let img = image(CartridgeType::SuperGames, chips);
        assert_eq!(
            img.validate(),
            Err(CartridgeError::ChipCount {
                kind: CartridgeType::SuperGames,
                expected: "4",
                found: 3
            })
        );
    }

    #[test]
    fn rejects_expert_chip_at_wrong_address() {
        let img = image(
            CartridgeType::Expert,
            vec![ChipImage::new(0, 0xA000, vec![0; 0x2000])],
        );
        assert!(matches!(
            img.validate(),
            Err(CartridgeError::ChipAddress { address: 0xA000, .. })
        ));
    }

    #[test]
    fn rejects_bank_out_of_range() {
        let img = image(
            CartridgeType::FunPlay,
            vec![ChipImage::new(16, 0x8000, vec![0; 0x2000])],
        );
        assert!(matches!(
            img.validate(),
            Err(CartridgeError::ChipBank { bank: 16, .. })
        ));
    }

    #[test]
    fn zaxxon_needs_one_roml_chip() {
        let img = image(
            CartridgeType::Zaxxon,
            vec![
                ChipImage::new(0, 0xA000, vec![0; 0x2000]),
                ChipImage::new(0, 0xA000, vec![0; 0x2000]),
                ChipImage::new(1, 0xA000, vec![0; 0x2000]),
            ],
        );
        assert!(matches!(
            img.validate(),
            Err(CartridgeError::ChipCount { found: 0, .. })
        ));
    }

    #[test]
    fn error_message_names_the_cartridge() {
        let img = image(CartridgeType::SimonsBasic, vec![]);
        let err = img.validate().unwrap_err();
        assert_eq!(err.to_string(), "Simons' BASIC: expected 2 chips, found 0");
    }
}

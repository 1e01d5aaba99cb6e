//! Error types.

use emu_core::StateError;
use thiserror::Error;

use crate::cartridge::CartridgeType;

/// A built-in ROM image has the wrong size.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{rom} ROM must be {expected} bytes, got {actual}")]
pub struct RomError {
    pub rom: &'static str,
    pub expected: usize,
    pub actual: usize,
}

/// A cartridge image was rejected at attach time. Nothing was changed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartridgeError {
    #[error("unsupported cartridge type {0}")]
    UnsupportedType(u16),
    #[error("{kind}: expected {expected} chips, found {found}")]
    ChipCount {
        kind: CartridgeType,
        expected: &'static str,
        found: usize,
    },
    #[error("{kind}: chip {index} has invalid size ${size:04X}")]
    ChipSize {
        kind: CartridgeType,
        index: usize,
        size: usize,
    },
    #[error("{kind}: chip {index} has invalid load address ${address:04X}")]
    ChipAddress {
        kind: CartridgeType,
        index: usize,
        address: u16,
    },
    #[error("{kind}: chip {index} has invalid bank {bank}")]
    ChipBank {
        kind: CartridgeType,
        index: usize,
        bank: u16,
    },
}

/// Snapshot capture, restore or store failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("not a C64 snapshot")]
    BadMagic,
    #[error("snapshot version {major}.{minor}.{subminor} is not supported")]
    Version { major: u8, minor: u8, subminor: u8 },
    #[error("snapshot has {0} unread trailing bytes")]
    TrailingBytes(usize),
    #[error("snapshot state: {0}")]
    State(#[from] StateError),
    #[error("user snapshot store is full")]
    StoreFull,
    #[error("no snapshot at index {0}")]
    NoSuchSnapshot(usize),
}

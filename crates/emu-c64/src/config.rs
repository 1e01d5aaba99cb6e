//! C64 configuration: model selection, runtime settings and ROM images.
//!
//! | Model | CPU clock    | Cycles/line | Lines/frame | Frames/s |
//! |-------|--------------|-------------|-------------|----------|
//! | PAL   | 985,248 Hz   | 63          | 312         | 50       |
//! | NTSC  | 1,022,727 Hz | 65          | 263         | 60       |

use std::time::Duration;

use emu_core::{MasterClock, Ticks};
use serde::{Deserialize, Serialize};

/// C64 model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum C64Model {
    /// PAL C64 (6569 VIC-II, 985,248 Hz CPU).
    #[default]
    C64Pal,
    /// NTSC C64 (6567 VIC-II, 1,022,727 Hz CPU).
    C64Ntsc,
}

impl C64Model {
    /// CPU clock frequency in Hz.
    #[must_use]
    pub const fn cpu_frequency(self) -> u32 {
        match self {
            Self::C64Pal => 985_248,
            Self::C64Ntsc => 1_022_727,
        }
    }

    #[must_use]
    pub const fn cycles_per_line(self) -> u8 {
        match self {
            Self::C64Pal => 63,
            Self::C64Ntsc => 65,
        }
    }

    #[must_use]
    pub const fn lines_per_frame(self) -> u16 {
        match self {
            Self::C64Pal => 312,
            Self::C64Ntsc => 263,
        }
    }

    #[must_use]
    pub const fn frames_per_second(self) -> u32 {
        match self {
            Self::C64Pal => 50,
            Self::C64Ntsc => 60,
        }
    }

    #[must_use]
    pub const fn cycles_per_frame(self) -> u64 {
        self.cycles_per_line() as u64 * self.lines_per_frame() as u64
    }

    #[must_use]
    pub const fn master_clock(self) -> MasterClock {
        MasterClock::new(self.cpu_frequency() as u64)
    }

    /// Real time one frame takes on the original hardware.
    #[must_use]
    pub fn frame_duration(self) -> Duration {
        self.master_clock()
            .duration_of(Ticks::new(self.cycles_per_frame()))
    }
}

/// Runtime settings. Missing fields take their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Video standard. Fixed for the lifetime of a machine.
    pub model: C64Model,
    /// Run unthrottled all the time.
    pub always_warp: bool,
    /// Run unthrottled while the disk drive is transferring data.
    pub warp_load: bool,
    /// Capture automatic snapshots.
    pub auto_snapshots: bool,
    /// Seconds of emulated time between automatic snapshots.
    pub auto_snapshot_interval: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: C64Model::C64Pal,
            always_warp: false,
            warp_load: true,
            auto_snapshots: true,
            auto_snapshot_interval: 3,
        }
    }
}

impl Settings {
    /// Frames between automatic snapshots, or `None` when disabled.
    #[must_use]
    pub fn auto_snapshot_period(&self) -> Option<u64> {
        let frames =
            u64::from(self.model.frames_per_second()) * u64::from(self.auto_snapshot_interval);
        (self.auto_snapshots && frames > 0).then_some(frames)
    }
}

/// Configuration for constructing a C64 instance.
#[derive(Debug, Clone)]
pub struct C64Config {
    pub settings: Settings,
    /// Kernal ROM (8,192 bytes).
    pub kernal_rom: Vec<u8>,
    /// BASIC ROM (8,192 bytes).
    pub basic_rom: Vec<u8>,
    /// Character ROM (4,096 bytes).
    pub char_rom: Vec<u8>,
}

impl C64Config {
    /// Configuration with default settings.
    #[must_use]
    pub fn new(kernal_rom: Vec<u8>, basic_rom: Vec<u8>, char_rom: Vec<u8>) -> Self {
        Self {
            settings: Settings::default(),
            kernal_rom,
            basic_rom,
            char_rom,
        }
    }
}

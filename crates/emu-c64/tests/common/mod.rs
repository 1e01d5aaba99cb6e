//! Shared fixtures: a scripted CPU and ROM images.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use emu_c64::{Board, C64Config, Chips, MessageQueue, Settings};
use emu_core::{Bus, Cpu, StateError, StateReader, StateWriter, Stateful};

/// Reset vector stored in the test kernal.
pub const RESET_VECTOR: u16 = 0xE000;

/// One bus access, performed on one CPU cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Read(u16),
    Write(u16, u8),
}

/// What the CPU observed.
#[derive(Debug, Default)]
pub struct Trace {
    /// Values returned by scripted reads, in order.
    pub reads: Vec<u8>,
    /// Inactive-to-active transitions of the NMI line.
    pub nmi_edges: u32,
    /// IRQ line level on the last cycle.
    pub irq: bool,
}

/// A CPU that performs one scripted bus access per cycle and idles (no bus
/// traffic) once the script runs out.
pub struct ScriptCpu {
    script: Arc<Mutex<VecDeque<Op>>>,
    trace: Arc<Mutex<Trace>>,
    pc: u16,
    cycles: u64,
    nmi: bool,
}

/// Handles for feeding a [`ScriptCpu`] and inspecting it after it has been
/// moved into a machine.
#[derive(Clone)]
pub struct Probe {
    script: Arc<Mutex<VecDeque<Op>>>,
    trace: Arc<Mutex<Trace>>,
}

impl Probe {
    pub fn push(&self, ops: &[Op]) {
        self.script.lock().expect("script lock").extend(ops);
    }

    pub fn pending(&self) -> usize {
        self.script.lock().expect("script lock").len()
    }

    pub fn reads(&self) -> Vec<u8> {
        self.trace.lock().expect("trace lock").reads.clone()
    }

    pub fn nmi_edges(&self) -> u32 {
        self.trace.lock().expect("trace lock").nmi_edges
    }
}

impl ScriptCpu {
    pub fn new() -> (Self, Probe) {
        let probe = Probe {
            script: Arc::default(),
            trace: Arc::default(),
        };
        let cpu = Self {
            script: Arc::clone(&probe.script),
            trace: Arc::clone(&probe.trace),
            pc: 0,
            cycles: 0,
            nmi: false,
        };
        (cpu, probe)
    }
}

impl Stateful for ScriptCpu {
    fn state_size(&self) -> usize {
        2 + 8 + 1
    }

    fn save_state(&self, writer: &mut StateWriter) {
        writer.write_u16(self.pc);
        writer.write_u64(self.cycles);
        writer.write_bool(self.nmi);
    }

    fn load_state(&mut self, reader: &mut StateReader<'_>) -> Result<(), StateError> {
        self.pc = reader.read_u16()?;
        self.cycles = reader.read_u64()?;
        self.nmi = reader.read_bool()?;
        Ok(())
    }
}

impl Cpu for ScriptCpu {
    fn tick(&mut self, bus: &mut dyn Bus) {
        self.cycles += 1;
        let op = self.script.lock().expect("script lock").pop_front();
        match op {
            Some(Op::Read(addr)) => {
                let value = bus.read(addr);
                self.trace.lock().expect("trace lock").reads.push(value);
            }
            Some(Op::Write(addr, value)) => bus.write(addr, value),
            None => {}
        }
    }

    fn reset(&mut self, bus: &mut dyn Bus) {
        self.pc = u16::from_le_bytes([bus.read(0xFFFC), bus.read(0xFFFD)]);
    }

    fn pc(&self) -> u32 {
        u32::from(self.pc)
    }

    fn set_irq_line(&mut self, asserted: bool) {
        self.trace.lock().expect("trace lock").irq = asserted;
    }

    fn set_nmi_line(&mut self, asserted: bool) {
        if asserted && !self.nmi {
            self.trace.lock().expect("trace lock").nmi_edges += 1;
        }
        self.nmi = asserted;
    }
}

/// Kernal filled with $EA, reset vector pointing at [`RESET_VECTOR`].
pub fn kernal() -> Vec<u8> {
    let mut rom = vec![0xEA; 0x2000];
    rom[0x1FFC..0x1FFE].copy_from_slice(&RESET_VECTOR.to_le_bytes());
    rom
}

pub fn config(settings: Settings) -> C64Config {
    let mut config = C64Config::new(kernal(), vec![0xBB; 0x2000], vec![0xCC; 0x1000]);
    config.settings = settings;
    config
}

/// Settings without automatic snapshots or pacing surprises.
pub fn quiet_settings() -> Settings {
    Settings {
        auto_snapshots: false,
        ..Settings::default()
    }
}

/// A reset board driven by a [`ScriptCpu`].
pub fn new_board(settings: Settings) -> (Board, Probe) {
    let (cpu, probe) = ScriptCpu::new();
    let mut board = Board::new(
        &config(settings),
        Box::new(cpu),
        Chips::default(),
        Arc::new(MessageQueue::new()),
    )
    .expect("valid ROMs");
    board.reset();
    (board, probe)
}

/// Run until the CPU has consumed every scripted access.
pub fn run_script(board: &mut Board, probe: &Probe, ops: &[Op]) -> Vec<u8> {
    let before = probe.reads().len();
    probe.push(ops);
    while probe.pending() > 0 {
        board.execute_one_cycle();
    }
    probe.reads().split_off(before)
}

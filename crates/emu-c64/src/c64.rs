//! Top-level C64 system: the execution thread and its thread-safe handle.
//!
//! The master clock ticks at CPU cycle rate (985,248 Hz PAL). A dedicated
//! thread runs the [`Board`] one frame at a time and paces itself to real
//! time unless warp mode is on.
//!
//! # States
//!
//! | State     | Thread | Board accessible via            |
//! |-----------|--------|---------------------------------|
//! | Halted    | none   | [`C64::with_board`] (no waiting) |
//! | Running   | alive  | [`C64::with_board`] (suspends)   |
//! | Suspended | parked | [`C64::with_board`] (no waiting) |
//!
//! Suspending nests: every [`C64::suspend`] needs its own
//! [`C64::resume`], and the thread only continues once the last one has
//! resumed. The thread checks for pause and stop requests between cycles,
//! never inside one.
//!
//! The execution thread must never call back into the handle's
//! suspending methods (for example from a message listener).

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use emu_core::Cpu;
use log::{error, info, warn};

use crate::board::{Board, CartridgeButton, ClockPosition};
use crate::cartridge::{CartridgeImage, CartridgeType};
use crate::chips::Chips;
use crate::config::{C64Config, C64Model};
use crate::error::{CartridgeError, RomError, SnapshotError};
use crate::message::{Message, MessageQueue};
use crate::snapshot::Snapshot;
use crate::timing::FrameTimer;

/// All state guarded by these mutexes is plain data, so a panic while a
/// lock was held cannot break an invariant the next holder relies on.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct Control {
    /// Outstanding `suspend` calls.
    pause_depth: u32,
    /// The execution thread is waiting in `park`.
    parked: bool,
    /// The execution thread exists and has not yet left its loop.
    alive: bool,
}

struct Shared {
    board: Mutex<Board>,
    control: Mutex<Control>,
    signal: Condvar,
    /// Mirrors `pause_depth > 0` for the per-cycle check.
    pause_requested: AtomicBool,
    stop_requested: AtomicBool,
    frame_duration: Duration,
}

impl Shared {
    /// Block while suspended. Returns once resumed or asked to stop.
    fn park(&self) {
        let mut control = lock(&self.control);
        control.parked = true;
        self.signal.notify_all();
        while control.pause_depth > 0 && !self.stop_requested.load(Ordering::Acquire) {
            control = self
                .signal
                .wait(control)
                .unwrap_or_else(PoisonError::into_inner);
        }
        control.parked = false;
    }

    fn interrupted(&self) -> bool {
        self.pause_requested.load(Ordering::Relaxed) || self.stop_requested.load(Ordering::Relaxed)
    }

    fn execution_loop(&self) {
        let _exit = ExitGuard(self);
        let mut timer = FrameTimer::new(self.frame_duration);
        loop {
            if self.pause_requested.load(Ordering::Acquire) {
                self.park();
                timer.restart();
            }
            if self.stop_requested.load(Ordering::Acquire) {
                break;
            }

            let (frame_done, warp) = {
                let mut board = lock(&self.board);
                let mut frame_done = false;
                while !frame_done && !self.interrupted() {
                    frame_done = board.execute_one_cycle();
                }
                (frame_done, board.warp())
            };

            if frame_done {
                if warp {
                    timer.restart();
                } else {
                    timer.synchronize();
                }
            }
        }
    }
}

/// Marks the execution thread as gone when its loop ends, whether it
/// returns or unwinds from a panicking chip, so waiters in `suspend` wake.
struct ExitGuard<'a>(&'a Shared);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        let mut control = lock(&self.0.control);
        control.alive = false;
        control.parked = false;
        self.0.signal.notify_all();
    }
}

/// Thread-safe handle to a C64.
pub struct C64 {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
    messages: Arc<MessageQueue>,
    model: C64Model,
}

/// Keeps the machine suspended until dropped.
#[must_use = "the machine resumes as soon as the guard is dropped"]
pub struct SuspendGuard<'a> {
    c64: &'a C64,
}

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        self.c64.resume();
    }
}

impl C64 {
    /// Create a halted C64 with placeholder peripheral chips.
    pub fn new(config: &C64Config, cpu: Box<dyn Cpu>) -> Result<Self, RomError> {
        Self::with_chips(config, cpu, Chips::default())
    }

    /// Create a halted C64 with the given peripheral chips.
    pub fn with_chips(
        config: &C64Config,
        cpu: Box<dyn Cpu>,
        chips: Chips,
    ) -> Result<Self, RomError> {
        let messages = Arc::new(MessageQueue::new());
        let board = Board::new(config, cpu, chips, Arc::clone(&messages))?;
        let model = config.settings.model;
        Ok(Self {
            shared: Arc::new(Shared {
                board: Mutex::new(board),
                control: Mutex::new(Control::default()),
                signal: Condvar::new(),
                pause_requested: AtomicBool::new(false),
                stop_requested: AtomicBool::new(false),
                frame_duration: model.frame_duration(),
            }),
            thread: Mutex::new(None),
            messages,
            model,
        })
    }

    #[must_use]
    pub fn model(&self) -> C64Model {
        self.model
    }

    /// Reset every chip and start running.
    pub fn power_up(&self) -> io::Result<()> {
        self.halt();
        lock(&self.shared.board).reset();
        info!("C64 powered up ({:?})", self.model);
        self.messages.put(Message::PowerOn);
        self.run()
    }

    /// Start the execution thread. Does nothing if it is already running.
    pub fn run(&self) -> io::Result<()> {
        let mut thread = lock(&self.thread);
        if thread.is_some() {
            return Ok(());
        }
        lock(&self.shared.control).alive = true;

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("c64-execution".into())
            .spawn(move || shared.execution_loop());
        match spawned {
            Ok(handle) => *thread = Some(handle),
            Err(err) => {
                lock(&self.shared.control).alive = false;
                error!("Could not start the execution thread: {err}");
                return Err(err);
            }
        }
        info!("C64 running");
        self.messages.put(Message::Run);
        Ok(())
    }

    /// Stop the execution thread and wait for it. The machine state is kept,
    /// so a later [`run`](Self::run) continues where this left off.
    pub fn halt(&self) {
        let Some(handle) = lock(&self.thread).take() else {
            return;
        };
        self.shared.stop_requested.store(true, Ordering::Release);
        {
            let _control = lock(&self.shared.control);
            self.shared.signal.notify_all();
        }
        if handle.join().is_err() {
            error!("Execution thread panicked");
        }
        self.shared.stop_requested.store(false, Ordering::Release);
        info!("C64 halted");
        self.messages.put(Message::Halt);
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        lock(&self.thread).is_some()
    }

    #[must_use]
    pub fn is_suspended(&self) -> bool {
        lock(&self.shared.control).pause_depth > 0
    }

    /// Pause the execution thread at the next cycle boundary and wait until
    /// it has stopped. Calls nest.
    pub fn suspend(&self) {
        let mut control = lock(&self.shared.control);
        control.pause_depth += 1;
        self.shared.pause_requested.store(true, Ordering::Release);
        while control.alive && !control.parked {
            control = self
                .shared
                .signal
                .wait(control)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Undo one [`suspend`](Self::suspend). The thread continues when the
    /// outermost suspend is undone.
    pub fn resume(&self) {
        let mut control = lock(&self.shared.control);
        if control.pause_depth == 0 {
            warn!("resume() without a matching suspend()");
            return;
        }
        control.pause_depth -= 1;
        if control.pause_depth == 0 {
            self.shared.pause_requested.store(false, Ordering::Release);
            self.shared.signal.notify_all();
        }
    }

    /// Suspend until the returned guard is dropped.
    pub fn suspended(&self) -> SuspendGuard<'_> {
        self.suspend();
        SuspendGuard { c64: self }
    }

    /// Run `f` on the machine while the execution thread is parked.
    pub fn with_board<R>(&self, f: impl FnOnce(&mut Board) -> R) -> R {
        let _guard = self.suspended();
        let mut board = lock(&self.shared.board);
        f(&mut board)
    }

    pub fn reset(&self) {
        self.with_board(Board::reset);
    }

    #[must_use]
    pub fn clock(&self) -> ClockPosition {
        self.with_board(|board| board.clock())
    }

    #[must_use]
    pub fn warp(&self) -> bool {
        self.with_board(|board| board.warp())
    }

    pub fn set_always_warp(&self, enabled: bool) {
        self.with_board(|board| board.set_always_warp(enabled));
    }

    pub fn set_warp_load(&self, enabled: bool) {
        self.with_board(|board| board.set_warp_load(enabled));
    }

    pub fn set_transfer_active(&self, active: bool) {
        self.with_board(|board| board.set_transfer_active(active));
    }

    // -----------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------

    pub fn take_snapshot(&self) -> Result<Snapshot, SnapshotError> {
        self.with_board(|board| board.take_snapshot())
    }

    pub fn restore_snapshot(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        self.with_board(|board| board.restore_snapshot(snapshot))
    }

    pub fn take_auto_snapshot(&self) -> Result<(), SnapshotError> {
        self.with_board(Board::take_auto_snapshot)
    }

    pub fn take_user_snapshot(&self) -> Result<(), SnapshotError> {
        self.with_board(Board::take_user_snapshot)
    }

    pub fn restore_auto_snapshot(&self, index: usize) -> Result<(), SnapshotError> {
        self.with_board(|board| board.restore_auto_snapshot(index))
    }

    pub fn restore_user_snapshot(&self, index: usize) -> Result<(), SnapshotError> {
        self.with_board(|board| board.restore_user_snapshot(index))
    }

    pub fn restore_latest_auto_snapshot(&self) -> Result<(), SnapshotError> {
        self.with_board(Board::restore_latest_auto_snapshot)
    }

    pub fn restore_latest_user_snapshot(&self) -> Result<(), SnapshotError> {
        self.with_board(Board::restore_latest_user_snapshot)
    }

    pub fn delete_auto_snapshot(&self, index: usize) -> Result<(), SnapshotError> {
        self.with_board(|board| board.delete_auto_snapshot(index))
    }

    pub fn delete_user_snapshot(&self, index: usize) -> Result<(), SnapshotError> {
        self.with_board(|board| board.delete_user_snapshot(index))
    }

    #[must_use]
    pub fn auto_snapshot(&self, index: usize) -> Option<Snapshot> {
        self.with_board(|board| board.snapshots().auto(index).cloned())
    }

    #[must_use]
    pub fn user_snapshot(&self, index: usize) -> Option<Snapshot> {
        self.with_board(|board| board.snapshots().user(index).cloned())
    }

    #[must_use]
    pub fn auto_snapshot_count(&self) -> usize {
        self.with_board(|board| board.snapshots().auto_count())
    }

    #[must_use]
    pub fn user_snapshot_count(&self) -> usize {
        self.with_board(|board| board.snapshots().user_count())
    }

    // -----------------------------------------------------------------
    // Cartridges
    // -----------------------------------------------------------------

    pub fn attach_cartridge(&self, image: CartridgeImage) -> Result<CartridgeType, CartridgeError> {
        self.with_board(|board| board.attach_cartridge(image))
    }

    /// Returns the type of the cartridge that was removed, if any.
    pub fn detach_cartridge(&self) -> Option<CartridgeType> {
        self.with_board(|board| board.detach_cartridge().map(|cartridge| cartridge.kind()))
    }

    pub fn press_cartridge_button(&self, button: CartridgeButton) {
        self.with_board(|board| board.press_cartridge_button(button));
    }

    pub fn set_cartridge_switch(&self, position: i8) {
        self.with_board(|board| board.set_cartridge_switch(position));
    }

    // -----------------------------------------------------------------
    // Host notifications
    // -----------------------------------------------------------------

    /// Register a callback for every message. It runs on whichever thread
    /// posts the message, usually the execution thread.
    pub fn set_listener(&self, listener: impl Fn(Message) + Send + 'static) {
        self.messages.set_listener(listener);
    }

    pub fn clear_listener(&self) {
        self.messages.clear_listener();
    }

    /// Oldest pending message, if any.
    pub fn get_message(&self) -> Option<Message> {
        self.messages.get()
    }
}

impl Drop for C64 {
    fn drop(&mut self) {
        self.halt();
    }
}

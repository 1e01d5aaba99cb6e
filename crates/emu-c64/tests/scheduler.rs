//! The execution thread as seen through the `C64` handle.

mod common;

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use common::{Op, Probe, ScriptCpu, config, quiet_settings};
use emu_c64::{C64, Message, Settings};

fn warp_settings() -> Settings {
    Settings {
        always_warp: true,
        ..quiet_settings()
    }
}

fn machine(settings: Settings) -> (C64, Probe) {
    let (cpu, probe) = ScriptCpu::new();
    let c64 = C64::new(&config(settings), Box::new(cpu)).expect("valid ROMs");
    (c64, probe)
}

/// Poll `condition` for up to five seconds.
fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

#[test]
fn halt_and_run_continue_where_they_left_off() {
    let (c64, _probe) = machine(warp_settings());
    c64.power_up().expect("thread starts");
    assert!(eventually(|| c64.clock().frame >= 2));

    c64.halt();
    assert!(!c64.is_running());
    let stopped = c64.clock();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(c64.clock(), stopped);

    c64.run().expect("thread starts");
    assert!(eventually(|| c64.clock().frame > stopped.frame));
    assert!(c64.clock().cycle > stopped.cycle);
    c64.halt();
}

#[test]
fn run_twice_is_harmless() {
    let (c64, _probe) = machine(warp_settings());
    c64.run().expect("thread starts");
    c64.run().expect("already running");
    assert!(c64.is_running());
    c64.halt();
    c64.halt();

    let messages: Vec<_> = std::iter::from_fn(|| c64.get_message()).collect();
    assert_eq!(messages, [Message::Run, Message::Halt]);
}

#[test]
fn nested_suspend_from_two_threads() {
    let (c64, _probe) = machine(warp_settings());
    c64.power_up().expect("thread starts");

    c64.suspend();
    let frozen = c64.clock();
    thread::scope(|scope| {
        scope.spawn(|| {
            c64.suspend();
            assert_eq!(c64.clock(), frozen);
            c64.resume();
        });
    });

    // The outer suspend is still in effect
    assert!(c64.is_suspended());
    thread::sleep(Duration::from_millis(10));
    assert_eq!(c64.clock(), frozen);

    c64.resume();
    assert!(!c64.is_suspended());
    assert!(eventually(|| c64.clock().cycle > frozen.cycle));
    c64.halt();
}

#[test]
fn concurrent_board_access_sees_a_monotonic_clock() {
    let (c64, _probe) = machine(warp_settings());
    c64.power_up().expect("thread starts");

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let mut last = 0;
                for _ in 0..50 {
                    let cycle = c64.with_board(|board| board.clock().cycle);
                    assert!(cycle >= last);
                    last = cycle;
                }
            });
        }
    });

    assert!(!c64.is_suspended());
    let now = c64.clock().cycle;
    assert!(eventually(|| c64.clock().cycle > now));
    c64.halt();
}

#[test]
fn bus_traffic_runs_on_the_execution_thread() {
    let (c64, probe) = machine(warp_settings());
    c64.power_up().expect("thread starts");

    probe.push(&[Op::Write(0x4000, 0x42), Op::Read(0x4000)]);
    assert!(eventually(|| probe.pending() == 0));
    assert_eq!(probe.reads(), [0x42]);
    let stored = c64.with_board(|board| board.bus().memory.ram_read(0x4000));
    assert_eq!(stored, 0x42);
    c64.halt();
}

#[test]
fn dropping_the_handle_stops_the_thread() {
    let (c64, _probe) = machine(warp_settings());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    c64.set_listener(move |message| sink.lock().expect("sink").push(message));

    c64.power_up().expect("thread starts");
    drop(c64);

    let seen = seen.lock().expect("sink");
    assert_eq!(seen.last(), Some(&Message::Halt));
    assert!(seen.contains(&Message::PowerOn));
}

#[test]
fn cleared_listener_gets_nothing() {
    let (c64, _probe) = machine(warp_settings());
    let seen = Arc::new(Mutex::new(0u32));
    let sink = Arc::clone(&seen);
    c64.set_listener(move |_| *sink.lock().expect("sink") += 1);
    c64.reset();
    c64.clear_listener();
    c64.reset();

    assert_eq!(*seen.lock().expect("sink"), 1);
    // The queue still has both
    let resets = std::iter::from_fn(|| c64.get_message())
        .filter(|m| *m == Message::Reset)
        .count();
    assert_eq!(resets, 2);
}

#[test]
fn paced_mode_runs_near_real_time() {
    let (c64, _probe) = machine(quiet_settings());
    c64.power_up().expect("thread starts");
    assert!(!c64.warp());

    thread::sleep(Duration::from_millis(300));
    let frames = c64.clock().frame;
    c64.halt();

    // 300 ms is about 15 PAL frames
    assert!(frames <= 25, "ran {frames} frames in 300 ms");
}

#[test]
fn warp_toggles_post_messages() {
    let (c64, _probe) = machine(quiet_settings());
    c64.set_always_warp(true);
    assert!(c64.warp());
    c64.set_always_warp(false);
    assert!(!c64.warp());

    // Transfer warp waits for a frame boundary
    c64.set_transfer_active(true);
    assert!(!c64.warp());
    c64.with_board(|board| board.execute_one_frame());
    assert!(c64.warp());

    let messages: Vec<_> = std::iter::from_fn(|| c64.get_message()).collect();
    assert_eq!(
        messages,
        [Message::WarpOn, Message::WarpOff, Message::WarpOn]
    );
}

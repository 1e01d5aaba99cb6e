//! Snapshot capture, restore and the two snapshot rings.

mod common;

use std::thread;
use std::time::{Duration, Instant};

use common::{Op, ScriptCpu, config, new_board, quiet_settings, run_script};
use emu_c64::{
    C64, HEADER_LEN, MAX_AUTO_SNAPSHOTS, MAX_USER_SNAPSHOTS, Message, SNAPSHOT_VERSION, Settings,
    Snapshot, SnapshotError,
};
use emu_core::StateError;

/// Offset of the first read-map entry: clock, RAM, colour RAM, the two
/// processor port registers.
const READ_MAP_OFFSET: usize = HEADER_LEN + 19 + 0x10000 + 1024 + 2;

#[test]
fn restore_through_the_handle_rewinds_a_running_machine() {
    let settings = Settings {
        always_warp: true,
        ..quiet_settings()
    };
    let (cpu, probe) = ScriptCpu::new();
    let c64 = C64::new(&config(settings), Box::new(cpu)).expect("valid ROMs");
    c64.power_up().expect("thread starts");

    probe.push(&[Op::Write(0x2000, 1)]);
    let (snapshot, clock) = c64.with_board(|board| (board.take_snapshot(), board.clock()));
    let snapshot = snapshot.expect("snapshot");

    let deadline = Instant::now() + Duration::from_secs(5);
    while c64.clock().frame <= clock.frame && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }

    {
        let _paused = c64.suspended();
        c64.restore_snapshot(&snapshot).expect("restore");
        assert_eq!(c64.clock(), clock);
        let now = c64.take_snapshot().expect("snapshot");
        assert_eq!(now.state(), snapshot.state());
    }
    c64.halt();
    assert!(std::iter::from_fn(|| c64.get_message()).any(|m| m == Message::SnapshotRestored));
}

#[test]
fn corrupt_region_tag_is_rejected_and_state_kept() {
    let (mut board, probe) = new_board(quiet_settings());
    run_script(&mut board, &probe, &[Op::Write(0x1234, 0x56)]);
    let good = board.take_snapshot().expect("snapshot");

    let mut bytes = good.as_bytes().to_vec();
    bytes[READ_MAP_OFFSET] = 0xFF;
    let corrupt = Snapshot::from_bytes(&bytes).expect("header is fine");

    run_script(&mut board, &probe, &[Op::Write(0x1234, 0x78)]);
    let before = board.take_snapshot().expect("snapshot");
    let err = board.restore_snapshot(&corrupt).expect_err("bad region");
    assert!(matches!(
        err,
        SnapshotError::State(StateError::InvalidField { value: 0xFF, .. })
    ));

    let after = board.take_snapshot().expect("snapshot");
    assert_eq!(after.state(), before.state());
    assert_eq!(board.bus().memory.ram_read(0x1234), 0x78);
}

#[test]
fn truncated_snapshot_is_rejected() {
    let (mut board, _probe) = new_board(quiet_settings());
    let good = board.take_snapshot().expect("snapshot");
    let bytes = good.as_bytes();
    let short = Snapshot::from_bytes(&bytes[..bytes.len() - 1]).expect("header is fine");

    let before = board.take_snapshot().expect("snapshot");
    assert!(board.restore_snapshot(&short).is_err());
    assert_eq!(board.take_snapshot().expect("snapshot").state(), before.state());
}

#[test]
fn header_is_checked() {
    assert!(matches!(
        Snapshot::from_bytes(b"C64"),
        Err(SnapshotError::BadMagic)
    ));
    assert!(matches!(
        Snapshot::from_bytes(b"D64S\x00\x01\x00"),
        Err(SnapshotError::BadMagic)
    ));

    let (board, _probe) = new_board(quiet_settings());
    let mut bytes = board.take_snapshot().expect("snapshot").as_bytes().to_vec();
    bytes[4] = SNAPSHOT_VERSION.0 + 1;
    assert!(matches!(
        Snapshot::from_bytes(&bytes),
        Err(SnapshotError::Version { .. })
    ));

    // Subminor revisions stay compatible
    bytes[4] = SNAPSHOT_VERSION.0;
    bytes[6] = SNAPSHOT_VERSION.2 + 1;
    assert!(Snapshot::from_bytes(&bytes).is_ok());
}

#[test]
fn auto_ring_evicts_the_oldest() {
    let (mut board, _probe) = new_board(quiet_settings());
    let mut taken = Vec::new();
    for _ in 0..=MAX_AUTO_SNAPSHOTS {
        board.execute_one_cycle();
        board.take_auto_snapshot().expect("auto snapshot");
        taken.push(board.snapshots().auto(0).cloned().expect("newest"));
    }

    let store = board.snapshots();
    assert_eq!(store.auto_count(), MAX_AUTO_SNAPSHOTS);
    assert_eq!(store.auto(0).map(Snapshot::state), taken.last().map(Snapshot::state));
    // The first one is gone, the second is now the oldest
    assert_eq!(
        store.auto(MAX_AUTO_SNAPSHOTS - 1).map(Snapshot::state),
        Some(taken[1].state())
    );
    assert!(store.auto(MAX_AUTO_SNAPSHOTS).is_none());
}

#[test]
fn user_ring_refuses_when_full() {
    let (mut board, _probe) = new_board(quiet_settings());
    for _ in 0..MAX_USER_SNAPSHOTS {
        board.take_user_snapshot().expect("room left");
    }
    assert!(matches!(
        board.take_user_snapshot(),
        Err(SnapshotError::StoreFull)
    ));
    assert_eq!(board.snapshots().user_count(), MAX_USER_SNAPSHOTS);

    board.delete_user_snapshot(0).expect("delete");
    assert_eq!(board.snapshots().user_count(), MAX_USER_SNAPSHOTS - 1);
    assert!(matches!(
        board.restore_user_snapshot(MAX_USER_SNAPSHOTS - 1),
        Err(SnapshotError::NoSuchSnapshot(_))
    ));
    board.take_user_snapshot().expect("room again");
}

#[test]
fn restore_latest_auto_steps_back_in_time() {
    let (mut board, _probe) = new_board(quiet_settings());
    board.execute_one_cycle();
    board.take_auto_snapshot().expect("auto snapshot");
    let first = board.clock();
    board.execute_one_line();
    board.take_auto_snapshot().expect("auto snapshot");
    let second = board.clock();
    board.execute_one_line();

    board.restore_latest_auto_snapshot().expect("restore");
    assert_eq!(board.clock(), second);
    assert_eq!(board.snapshots().auto_count(), 1);

    board.restore_latest_auto_snapshot().expect("restore");
    assert_eq!(board.clock(), first);
    assert_eq!(board.snapshots().auto_count(), 0);

    assert!(matches!(
        board.restore_latest_auto_snapshot(),
        Err(SnapshotError::NoSuchSnapshot(0))
    ));
}

#[test]
fn running_machine_takes_automatic_snapshots() {
    let settings = Settings {
        always_warp: true,
        auto_snapshots: true,
        auto_snapshot_interval: 1,
        ..Settings::default()
    };
    let (cpu, _probe) = ScriptCpu::new();
    let c64 = C64::new(&config(settings), Box::new(cpu)).expect("valid ROMs");
    c64.power_up().expect("thread starts");

    let deadline = Instant::now() + Duration::from_secs(20);
    while c64.auto_snapshot_count() == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    c64.halt();

    assert!(c64.auto_snapshot_count() >= 1);
    let snapshot = c64.auto_snapshot(0).expect("newest");
    // Taken on a frame boundary, one emulated second in
    let clock = c64.with_board(|board| {
        board.restore_snapshot(&snapshot).map(|()| board.clock())
    });
    let clock = clock.expect("restore");
    assert_eq!(clock.frame % 50, 0);
    assert_eq!((clock.rasterline, clock.rasterline_cycle), (0, 1));
    assert!(std::iter::from_fn(|| c64.get_message()).any(|m| m == Message::SnapshotTaken));
}

//! Machine snapshots and the two snapshot stores.
//!
//! A snapshot is a header followed by every stateful component, written in
//! a fixed order (see [`Board::take_snapshot`](crate::Board::take_snapshot)):
//!
//! ```text
//! 0..4   magic "C64S"
//! 4      major version
//! 5      minor version
//! 6      subminor version
//! 7..    clock, memory, expansion port, CPU, VIC, SID, CIA1, CIA2
//! ```

use std::collections::VecDeque;
use std::time::SystemTime;

use emu_core::StateWriter;
use log::debug;

use crate::error::SnapshotError;

pub const SNAPSHOT_MAGIC: [u8; 4] = *b"C64S";
pub const SNAPSHOT_VERSION: (u8, u8, u8) = (0, 1, 0);
pub const HEADER_LEN: usize = 7;

/// Capacity of the automatic ring. The oldest entry is evicted.
pub const MAX_AUTO_SNAPSHOTS: usize = 16;
/// Capacity of the user ring. Taking a snapshot fails when it is full.
pub const MAX_USER_SNAPSHOTS: usize = 32;

/// An immutable captured machine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    data: Box<[u8]>,
    timestamp: SystemTime,
}

impl Snapshot {
    /// Writer pre-sized for `state_size` bytes of component state, with
    /// the header already written.
    pub(crate) fn writer(state_size: usize) -> StateWriter {
        let mut writer = StateWriter::with_capacity(HEADER_LEN + state_size);
        writer.write_bytes(&SNAPSHOT_MAGIC);
        writer.write_u8(SNAPSHOT_VERSION.0);
        writer.write_u8(SNAPSHOT_VERSION.1);
        writer.write_u8(SNAPSHOT_VERSION.2);
        writer
    }

    pub(crate) fn from_writer(writer: StateWriter) -> Self {
        Self {
            data: writer.into_inner().into_boxed_slice(),
            timestamp: SystemTime::now(),
        }
    }

    /// Accept a snapshot produced elsewhere, e.g. read back from a file.
    /// Only the header is checked here; the body is checked on restore.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        if bytes.len() < HEADER_LEN || bytes[..4] != SNAPSHOT_MAGIC {
            return Err(SnapshotError::BadMagic);
        }
        let (major, minor, subminor) = (bytes[4], bytes[5], bytes[6]);
        if (major, minor) != (SNAPSHOT_VERSION.0, SNAPSHOT_VERSION.1) {
            return Err(SnapshotError::Version {
                major,
                minor,
                subminor,
            });
        }
        Ok(Self {
            data: bytes.into(),
            timestamp: SystemTime::now(),
        })
    }

    /// Full byte image, header included.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Component state, header stripped.
    #[must_use]
    pub fn state(&self) -> &[u8] {
        &self.data[HEADER_LEN..]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// When the snapshot was taken.
    #[must_use]
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }
}

/// Automatic and user snapshot rings. Index 0 is always the newest entry.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    auto: VecDeque<Snapshot>,
    user: VecDeque<Snapshot>,
}

impl SnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert at the front, evicting the oldest entry when full.
    pub fn push_auto(&mut self, snapshot: Snapshot) {
        if self.auto.len() == MAX_AUTO_SNAPSHOTS {
            self.auto.pop_back();
            debug!("Auto snapshot ring full, evicted oldest entry");
        }
        self.auto.push_front(snapshot);
    }

    /// Insert at the front. Fails without touching the ring when full.
    pub fn push_user(&mut self, snapshot: Snapshot) -> Result<(), SnapshotError> {
        if self.user.len() == MAX_USER_SNAPSHOTS {
            return Err(SnapshotError::StoreFull);
        }
        self.user.push_front(snapshot);
        Ok(())
    }

    #[must_use]
    pub fn auto(&self, index: usize) -> Option<&Snapshot> {
        self.auto.get(index)
    }

    #[must_use]
    pub fn user(&self, index: usize) -> Option<&Snapshot> {
        self.user.get(index)
    }

    #[must_use]
    pub fn auto_count(&self) -> usize {
        self.auto.len()
    }

    #[must_use]
    pub fn user_count(&self) -> usize {
        self.user.len()
    }

    /// Remove an entry; later entries shift down by one.
    pub fn delete_auto(&mut self, index: usize) -> Result<Snapshot, SnapshotError> {
        self.auto
            .remove(index)
            .ok_or(SnapshotError::NoSuchSnapshot(index))
    }

    /// Remove an entry; later entries shift down by one.
    pub fn delete_user(&mut self, index: usize) -> Result<Snapshot, SnapshotError> {
        self.user
            .remove(index)
            .ok_or(SnapshotError::NoSuchSnapshot(index))
    }

    /// Put an entry back where [`delete_auto`](Self::delete_auto) took it.
    pub(crate) fn reinsert_auto(&mut self, index: usize, snapshot: Snapshot) {
        let index = index.min(self.auto.len());
        self.auto.insert(index, snapshot);
        self.auto.truncate(MAX_AUTO_SNAPSHOTS);
    }

    pub fn clear(&mut self) {
        self.auto.clear();
        self.user.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(tag: u8) -> Snapshot {
        let mut writer = Snapshot::writer(1);
        writer.write_u8(tag);
        Snapshot::from_writer(writer)
    }

    fn tag(snapshot: Option<&Snapshot>) -> u8 {
        snapshot.expect("present").state()[0]
    }

    #[test]
    fn header_layout() {
        let snap = snapshot(9);
        assert_eq!(&snap.as_bytes()[..4], b"C64S");
        assert_eq!(snap.len(), HEADER_LEN + 1);
        assert_eq!(snap.state(), &[9]);
    }

    #[test]
    fn from_bytes_validates_header() {
        let snap = snapshot(1);
        assert_eq!(Snapshot::from_bytes(snap.as_bytes()).map(|s| s.state()[0]), Ok(1));
        assert_eq!(Snapshot::from_bytes(b"C64"), Err(SnapshotError::BadMagic));
        assert_eq!(
            Snapshot::from_bytes(b"VC64\0\x01\0"),
            Err(SnapshotError::BadMagic)
        );
        assert_eq!(
            Snapshot::from_bytes(b"C64S\x02\x00\x03"),
            Err(SnapshotError::Version {
                major: 2,
                minor: 0,
                subminor: 3
            })
        );
    }

    #[test]
    fn auto_ring_evicts_oldest() {
        let mut store = SnapshotStore::new();
        for i in 0..=MAX_AUTO_SNAPSHOTS as u8 {
            store.push_auto(snapshot(i));
        }
        assert_eq!(store.auto_count(), MAX_AUTO_SNAPSHOTS);
        // Newest first, entry 0 evicted
        assert_eq!(tag(store.auto(0)), MAX_AUTO_SNAPSHOTS as u8);
        assert_eq!(tag(store.auto(MAX_AUTO_SNAPSHOTS - 1)), 1);
    }

    #[test]
    fn user_ring_rejects_when_full() {
        let mut store = SnapshotStore::new();
        for i in 0..MAX_USER_SNAPSHOTS as u8 {
            store.push_user(snapshot(i)).expect("room");
        }
        assert_eq!(store.push_user(snapshot(0xFF)), Err(SnapshotError::StoreFull));
        assert_eq!(store.user_count(), MAX_USER_SNAPSHOTS);
        assert_eq!(tag(store.user(0)), MAX_USER_SNAPSHOTS as u8 - 1);
    }

    #[test]
    fn delete_shifts_later_entries() {
        let mut store = SnapshotStore::new();
        for i in 0..4 {
            store.push_user(snapshot(i)).expect("room");
        }
        // Ring is now [3, 2, 1, 0]
        let removed = store.delete_user(1).expect("exists");
        assert_eq!(removed.state(), &[2]);
        assert_eq!(store.user_count(), 3);
        assert_eq!(tag(store.user(1)), 1);
        assert_eq!(tag(store.user(2)), 0);
        assert_eq!(store.delete_user(3), Err(SnapshotError::NoSuchSnapshot(3)));
    }

    #[test]
    fn reinsert_restores_position() {
        let mut store = SnapshotStore::new();
        for i in 0..3 {
            store.push_auto(snapshot(i));
        }
        let taken = store.delete_auto(0).expect("exists");
        store.reinsert_auto(0, taken);
        assert_eq!(tag(store.auto(0)), 2);
        assert_eq!(store.auto_count(), 3);
    }
}

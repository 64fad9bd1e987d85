//! Payload and cursor bookkeeping for virtual descriptors.
//!
//! The shim binds these entries to real handle numbers; everything about
//! payload lifetime, cursor movement, and table capacity lives here,
//! independent of any real handle.

use std::collections::HashMap;
use std::hash::Hash;

/// One registered payload with its read cursor.
#[derive(Debug)]
pub struct TrackedPayload {
    payload: Vec<u8>,
    pos: usize,
}

impl TrackedPayload {
    pub fn new(payload: Vec<u8>) -> Self {
        Self { payload, pos: 0 }
    }

    /// Copy up to `dst.len()` bytes from the cursor and advance it.
    /// Returns the count copied; zero at end of payload, never an error.
    pub fn read_into(&mut self, dst: &mut [u8]) -> usize {
        let remaining = self.payload.len() - self.pos;
        let n = remaining.min(dst.len());
        dst[..n].copy_from_slice(&self.payload[self.pos..self.pos + n]);
        self.pos += n;
        n
    }

    pub fn remaining(&self) -> usize {
        self.payload.len() - self.pos
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn pos(&self) -> usize {
        self.pos
    }
}

/// Bounded handle-to-payload table. Keys are opaque handle numbers; the
/// caller owns whatever real resource sits behind each key.
#[derive(Debug)]
pub struct PayloadTable<K> {
    entries: HashMap<K, TrackedPayload>,
    capacity: usize,
}

impl<K: Eq + Hash> PayloadTable<K> {
    pub fn bounded(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
        }
    }

    /// Register a payload under a key. Returns false when the table is at
    /// capacity; the caller must then discard the handle it prepared.
    pub fn insert(&mut self, key: K, payload: Vec<u8>) -> bool {
        if self.entries.len() >= self.capacity {
            return false;
        }
        self.entries.insert(key, TrackedPayload::new(payload));
        true
    }

    /// Serve a read on a tracked key. `None` when the key is not ours.
    pub fn read(&mut self, key: &K, dst: &mut [u8]) -> Option<usize> {
        self.entries.get_mut(key).map(|entry| entry.read_into(dst))
    }

    /// Drop a key. Returns whether it was tracked, so a second release of
    /// the same key finds nothing and reports false.
    pub fn release(&mut self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_serves_min_of_count_and_remaining() {
        let mut entry = TrackedPayload::new(b"abcdefgh".to_vec());
        let mut buf = [0u8; 5];
        assert_eq!(entry.read_into(&mut buf), 5);
        assert_eq!(&buf, b"abcde");
        assert_eq!(entry.read_into(&mut buf), 3);
        assert_eq!(&buf[..3], b"fgh");
    }

    #[test]
    fn test_cursor_never_exceeds_length() {
        let mut entry = TrackedPayload::new(b"xyz".to_vec());
        let mut buf = [0u8; 16];
        for _ in 0..4 {
            entry.read_into(&mut buf);
            assert!(entry.pos() <= entry.len());
        }
        assert_eq!(entry.pos(), entry.len());
    }

    #[test]
    fn test_read_past_end_returns_zero_not_error() {
        let mut entry = TrackedPayload::new(b"data".to_vec());
        let mut buf = [0u8; 8];
        assert_eq!(entry.read_into(&mut buf), 4);
        assert_eq!(entry.read_into(&mut buf), 0);
        assert_eq!(entry.read_into(&mut buf), 0);
        assert_eq!(entry.remaining(), 0);
    }

    #[test]
    fn test_zero_sized_destination() {
        let mut entry = TrackedPayload::new(b"data".to_vec());
        assert_eq!(entry.read_into(&mut []), 0);
        assert_eq!(entry.pos(), 0);
    }

    #[test]
    fn test_table_rejects_insert_at_capacity() {
        let mut table: PayloadTable<i32> = PayloadTable::bounded(2);
        assert!(table.insert(3, b"a".to_vec()));
        assert!(table.insert(4, b"b".to_vec()));
        assert!(!table.insert(5, b"c".to_vec()));
        // Existing entries are untouched by the rejected insert
        assert_eq!(table.len(), 2);
        assert!(table.contains(&3));
        assert!(!table.contains(&5));
    }

    #[test]
    fn test_release_frees_a_slot() {
        let mut table: PayloadTable<i32> = PayloadTable::bounded(1);
        assert!(table.insert(7, b"a".to_vec()));
        assert!(!table.insert(8, b"b".to_vec()));
        assert!(table.release(&7));
        assert!(table.insert(8, b"b".to_vec()));
    }

    #[test]
    fn test_double_release_finds_nothing() {
        let mut table: PayloadTable<i32> = PayloadTable::bounded(4);
        table.insert(9, b"payload".to_vec());
        assert!(table.release(&9));
        assert!(!table.release(&9));
    }

    #[test]
    fn test_read_on_untracked_key_is_none() {
        let mut table: PayloadTable<i32> = PayloadTable::bounded(4);
        table.insert(1, b"tracked".to_vec());
        let mut buf = [0u8; 8];
        assert!(table.read(&2, &mut buf).is_none());
        assert_eq!(table.read(&1, &mut buf), Some(7));
    }
}

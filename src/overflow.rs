//! Overflow buffer (C2): a pair of (move-to-front list, ordered map) used
//! per segment slot and, once, as the index-level global overflow buffer.
//! 溢出缓冲区（C2）：每个 slot 或全局使用的一对 (前移链表, 有序映射)。

use crate::mflist::MfList;
use std::collections::BTreeMap;

/// Holds keys that linearly predict into one slot (or, globally, keys beyond
/// the current maximum covered key) but have not yet been folded into a
/// segment's sorted array.
///
/// The ordered part is a `BTreeMap` rather than a literal multimap: this
/// index does not support duplicate keys, so "last write wins" on the
/// ordered side is exactly the multimap's observable behavior for every
/// reachable input. The ordered part is only ever populated transiently,
/// inside `to_sorted_data`, and is empty the rest of the time — `find`
/// checking it first is therefore almost always a cheap no-op, matching the
/// reference implementation (see `SPEC_FULL.md` section 9).
pub struct OverflowBuffer<K, V> {
  unsorted: MfList<K, V>,
  sorted: BTreeMap<K, V>,
}

impl<K: Ord + Copy, V: Copy> Default for OverflowBuffer<K, V> {
  fn default() -> Self {
    OverflowBuffer { unsorted: MfList::new(), sorted: BTreeMap::new() }
  }
}

impl<K: Ord + Copy, V: Copy> OverflowBuffer<K, V> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_empty(&self) -> bool {
    self.unsorted.is_empty() && self.sorted.is_empty()
  }

  /// Approximate heap footprint: the MFL's node arena plus a per-entry
  /// estimate for the (normally empty, only transiently populated)
  /// ordered side.
  pub fn size_in_bytes(&self) -> usize {
    const BTREE_ENTRY_OVERHEAD: usize = 48;
    std::mem::size_of::<Self>()
      + self.unsorted.heap_bytes()
      + self.sorted.len() * (std::mem::size_of::<K>() + std::mem::size_of::<V>() + BTREE_ENTRY_OVERHEAD)
  }

  /// Plain insert (always allocates in the MFL). Used by per-slot segment
  /// buffers.
  pub fn insert(&mut self, key: K, value: V) {
    self.unsorted.insert(key, value);
  }

  /// Reuse-insert (reclaims stale MFL nodes left by a prior `clear`). Used
  /// by the global overflow buffer only.
  pub fn reuse_insert(&mut self, key: K, value: V) {
    self.unsorted.reuse_insert(key, value);
  }

  /// Read-only membership check (no move-to-front promotion), used by the
  /// owning segment to decide whether its array entry at this slot is
  /// shadowed by a same-key overwrite sitting in this buffer.
  pub fn contains(&self, key: K) -> bool {
    if self.sorted.contains_key(&key) {
      return true;
    }
    self.unsorted.iter().any(|(k, _)| k == key)
  }

  pub fn find(&mut self, key: K) -> Option<V> {
    if !self.sorted.is_empty() {
      if let Some(v) = self.sorted.get(&key) {
        return Some(*v);
      }
    }
    self.unsorted.find(key)
  }

  /// Scans the unsorted part for keys in `[start, end)` and appends them
  /// to `out` in ascending key order. A key can appear more than once in
  /// the unsorted part (repeated overwrites before a retrain); since
  /// `unsorted.iter()` walks head to tail and appends always land at the
  /// tail, the occurrence seen last for a given key is the most recent
  /// one, so a plain map insert naturally keeps the right value.
  pub fn range(&self, start: K, end: K, out: &mut Vec<(K, V)>) {
    let mut matches: BTreeMap<K, V> = BTreeMap::new();
    for (k, v) in self.unsorted.iter() {
      if k >= start && k < end {
        matches.insert(k, v);
      }
    }
    out.extend(matches);
  }

  /// Drains both parts into `keys`/`values` in ascending key order: folds
  /// the unsorted part into the ordered map, then iterates the map. Leaves
  /// the ordered map populated; callers that reuse this buffer (the
  /// global overflow buffer) must call `clear` afterward.
  pub fn to_sorted_data(&mut self, keys: &mut Vec<K>, values: &mut Vec<V>) {
    for (k, v) in self.unsorted.iter() {
      self.sorted.insert(k, v);
    }
    for (&k, &v) in self.sorted.iter() {
      keys.push(k);
      values.push(v);
    }
  }

  /// Logical reset of both parts. The unsorted part's allocated nodes
  /// survive for `reuse_insert` to reclaim; the ordered part is dropped
  /// outright since it is rebuilt from scratch on each `to_sorted_data`.
  pub fn clear(&mut self) {
    self.unsorted.clear();
    self.sorted.clear();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn find_checks_unsorted_after_sorted() {
    let mut ob: OverflowBuffer<u32, u32> = OverflowBuffer::new();
    ob.insert(5, 50);
    ob.insert(10, 100);
    assert_eq!(ob.find(5), Some(50));
    assert_eq!(ob.find(999), None);
  }

  #[test]
  fn range_sorts_only_matches() {
    let mut ob: OverflowBuffer<u32, u32> = OverflowBuffer::new();
    for k in [30, 10, 20, 5, 40] {
      ob.insert(k, k);
    }
    let mut out = Vec::new();
    ob.range(10, 35, &mut out);
    let keys: Vec<_> = out.iter().map(|(k, _)| *k).collect();
    assert_eq!(keys, vec![10, 20, 30]);
  }

  #[test]
  fn to_sorted_data_drains_in_order() {
    let mut ob: OverflowBuffer<u32, u32> = OverflowBuffer::new();
    for k in [7, 3, 9, 1] {
      ob.insert(k, k * 10);
    }
    let mut keys = Vec::new();
    let mut values = Vec::new();
    ob.to_sorted_data(&mut keys, &mut values);
    assert_eq!(keys, vec![1, 3, 7, 9]);
    assert_eq!(values, vec![10, 30, 70, 90]);
  }
}

//! Index facade (C6): bulk load, insert, find, range, and the retrain /
//! overflow-promotion policy that ties C1-C5 together.
//! 索引门面（C6）：bulk load、insert、find、range，以及串联 C1-C5 的
//! retrain / overflow 提升策略。

use crate::error::{IndexError, Result};
use crate::key::Key;
use crate::locator::SegmentLocator;
use crate::overflow::OverflowBuffer;
use crate::segment::{SegId, Segment};
use crate::spline::{build_segments, SegmentDescriptor};

/// An updatable learned index over monotonically-comparable integer keys.
///
/// Segments live in an arena (`Vec<Option<Segment<K, V>>>`) addressed by
/// stable `usize` indices; the segment locator (an adaptive radix tree)
/// stores those same indices as its leaf payload without ever owning a
/// segment. See `SPEC_FULL.md` section 5 for the full ownership argument.
pub struct Index<K: Key, V: Copy> {
  max_error: usize,
  overflow_threshold: usize,
  arena: Vec<Option<Segment<K, V>>>,
  free_list: Vec<SegId>,
  head: Option<SegId>,
  tail: Option<SegId>,
  locator: SegmentLocator<SegId>,
  global_overflow: OverflowBuffer<K, V>,
  max_key: Option<K>,
  num_seg: usize,
  num_seg_array_keys: usize,
  num_total_keys: usize,
  num_global_overflow_keys: usize,
}

impl<K: Key, V: Copy> Index<K, V> {
  /// Builds an empty index. `max_error` is ε, the maximum slot-prediction
  /// error the spline builder and every segment's model must honor.
  /// `overflow_threshold` gates the first promotion of the global overflow
  /// buffer into segments, before any segment exists.
  pub fn new(max_error: usize, overflow_threshold: usize) -> Result<Self> {
    if max_error == 0 {
      return Err(IndexError::InvalidMaxError);
    }
    Ok(Index {
      max_error,
      overflow_threshold,
      arena: Vec::new(),
      free_list: Vec::new(),
      head: None,
      tail: None,
      locator: SegmentLocator::new(),
      global_overflow: OverflowBuffer::new(),
      max_key: None,
      num_seg: 0,
      num_seg_array_keys: 0,
      num_total_keys: 0,
      num_global_overflow_keys: 0,
    })
  }

  /// `Index::new(32, 1024)`, the reference implementation's defaults.
  pub fn with_defaults() -> Result<Self> {
    Self::new(32, 1024)
  }

  /// Loads a sorted, duplicate-free `(keys, values)` pair as the index's
  /// initial segments. Must be the first mutating call; calling it again
  /// on a non-empty index is a debug-only precondition violation (not a
  /// typed error, since "already loaded" is a caller-logic bug rather than
  /// bad input).
  pub fn bulk_load(&mut self, keys: &[K], values: &[V]) -> Result<()> {
    if keys.is_empty() {
      return Err(IndexError::EmptyBulkLoad);
    }
    if keys.len() != values.len() {
      return Err(IndexError::LengthMismatch { keys_len: keys.len(), values_len: values.len() });
    }
    if keys.windows(2).any(|w| w[0] >= w[1]) {
      return Err(IndexError::NotSorted);
    }
    debug_assert!(self.arena.is_empty(), "bulk_load must be the first mutating call");

    let descs = build_segments(keys, self.max_error);
    let n = self.splice_segments(None, None, &descs, keys, values);
    self.num_seg += n;
    self.num_seg_array_keys += keys.len();
    self.num_total_keys += keys.len();
    self.max_key = Some(keys[keys.len() - 1]);
    Ok(())
  }

  /// Routes `(k, v)` to the owning segment's slot overflow buffer, or to
  /// the global overflow buffer if `k` exceeds every segment's coverage
  /// (or no segment exists yet). May trigger a retrain or an
  /// overflow-to-segment transform as a side effect.
  pub fn insert(&mut self, k: K, v: V) {
    self.num_total_keys += 1;
    let beyond_max = self.num_seg == 0 || self.max_key.is_none_or(|m| k > m);

    if beyond_max {
      self.global_overflow.reuse_insert(k, v);
      self.num_global_overflow_keys += 1;
      let should_transform = if self.num_seg == 0 {
        self.num_total_keys > self.overflow_threshold
      } else {
        self.num_global_overflow_keys > self.num_seg_array_keys / self.num_seg
      };
      if should_transform {
        self.transform_overflow_to_segment();
      }
      return;
    }

    let segid = self
      .locator
      .lower_bound(k)
      .expect("a key <= max_key must resolve to a live segment (locator invariant)");
    let avg_seg_keys = (self.num_seg_array_keys / self.num_seg) as u32;
    let retrain_needed = {
      let seg = self.arena[segid].as_mut().expect("locator referenced a freed segment");
      seg.insert(k, v, self.max_error);
      seg.is_retrain(avg_seg_keys)
    };
    if retrain_needed {
      self.retrain(segid);
    }
  }

  /// Point lookup. `None` means `k` was never inserted (or bulk-loaded)
  /// and has never been overwritten into presence.
  pub fn find(&mut self, k: K) -> Option<V> {
    let beyond_max = self.num_seg == 0 || self.max_key.is_none_or(|m| k > m);
    if beyond_max {
      return self.global_overflow.find(k);
    }
    let segid = self.locator.lower_bound(k)?;
    self.arena[segid].as_mut().and_then(|seg| seg.find(k, self.max_error))
  }

  /// Appends every logically-present `(key, value)` pair with key in
  /// `[start, end)` to `out`, walking the segment sibling list and, if the
  /// range reaches past the last covered segment, the global overflow
  /// buffer. The result is not globally sorted (see `SPEC_FULL.md`
  /// section 4.4); sort `out` yourself if you need that.
  pub fn range(&mut self, start: K, end: K, out: &mut Vec<(K, V)>) {
    let beyond_max = self.num_seg == 0 || self.max_key.is_none_or(|m| start > m);
    if beyond_max {
      self.global_overflow.range(start, end, out);
      return;
    }

    let mut cur = self.locator.lower_bound(start);
    while let Some(segid) = cur {
      let seg = self.arena[segid].as_ref().expect("locator referenced a freed segment");
      let early_stop = seg.range(start, end, self.max_error, out);
      cur = if early_stop { None } else { seg.next };
    }

    if self.max_key.is_none_or(|m| end > m) && !self.global_overflow.is_empty() {
      self.global_overflow.range(start, end, out);
    }
  }

  /// Approximate total heap footprint: every live segment, the locator
  /// trie, and the global overflow buffer.
  pub fn size_in_bytes(&self) -> usize {
    let arena_bytes: usize =
      self.arena.iter().filter_map(|s| s.as_ref()).map(|s| s.size_in_bytes()).sum();
    std::mem::size_of::<Self>()
      + arena_bytes
      + self.locator.size_in_bytes()
      + self.global_overflow.size_in_bytes()
  }

  /// Number of live segments.
  pub fn num_segments(&self) -> usize {
    self.num_seg
  }

  /// Allocates `seg` into a free arena slot (reusing one freed by a prior
  /// retrain/transform if available), without linking it into the sibling
  /// list or the locator.
  fn alloc_segment(&mut self, seg: Segment<K, V>) -> SegId {
    if let Some(id) = self.free_list.pop() {
      self.arena[id] = Some(seg);
      id
    } else {
      self.arena.push(Some(seg));
      self.arena.len() - 1
    }
  }

  /// Materializes `descs` (drawn from `keys`/`values`) as a chain of fresh
  /// segments spliced into the sibling list between `before` and `after`
  /// (either end may be absent), inserting each new segment's last key
  /// into the locator. Returns the number of segments created.
  ///
  /// `before`/`after` must already have had the segment(s) they used to
  /// point at removed from the arena; this only rewrites the pointers on
  /// either side of the splice (and `self.head`/`self.tail` when an end is
  /// absent), it never reads through a stale link.
  fn splice_segments(
    &mut self,
    before: Option<SegId>,
    after: Option<SegId>,
    descs: &[SegmentDescriptor<K>],
    keys: &[K],
    values: &[V],
  ) -> usize {
    let mut prev = before;
    for desc in descs {
      let seg = Segment::from_descriptor(desc, keys, values);
      let segid = self.alloc_segment(seg);
      self.arena[segid].as_mut().unwrap().pre = prev;
      match prev {
        Some(p) => self.arena[p].as_mut().unwrap().next = Some(segid),
        None => self.head = Some(segid),
      }
      let last_key = self.arena[segid].as_ref().unwrap().last_key();
      self.locator.insert(last_key, segid);
      prev = Some(segid);
    }

    match prev {
      Some(last_new) => self.arena[last_new].as_mut().unwrap().next = after,
      None => {
        if let Some(b) = before {
          self.arena[b].as_mut().unwrap().next = after;
        }
      }
    }
    match after {
      Some(a) => self.arena[a].as_mut().unwrap().pre = prev.or(before),
      None => self.tail = prev.or(before),
    }
    descs.len()
  }

  /// Regenerates one segment in place: drains it (array + every slot
  /// buffer) into a sorted stream, re-splines that stream, and splices the
  /// resulting segments in where the old one was. No user-visible state
  /// changes (P6): the set of `(key, value)` pairs is identical before and
  /// after, just redistributed across a fresh, ε-compliant set of models.
  fn retrain(&mut self, segid: SegId) {
    let mut seg = self.arena[segid].take().expect("retrain on a missing segment");
    let last_key = seg.last_key();
    self.locator.erase(last_key);
    let pre = seg.pre;
    let next = seg.next;
    self.free_list.push(segid);
    self.num_seg -= 1;

    let mut keys = Vec::new();
    let mut values = Vec::new();
    seg.to_sorted_data(&mut keys, &mut values);

    let descs = build_segments(&keys, self.max_error);
    let n = self.splice_segments(pre, next, &descs, &keys, &values);
    self.num_seg += n;
    self.num_seg_array_keys += keys.len();
  }

  /// Promotes the global overflow buffer into segments: drains the
  /// current tail segment (if any) and the global overflow buffer into
  /// one sorted stream, re-splines it, and appends the result as the new
  /// tail. Clears the global overflow buffer via `clear` (not drop), so
  /// its MFL's allocated nodes survive for subsequent `reuse_insert`s.
  fn transform_overflow_to_segment(&mut self) {
    let mut keys = Vec::new();
    let mut values = Vec::new();
    let mut before = None;

    if let Some(tail_id) = self.tail {
      let mut seg = self.arena[tail_id].take().expect("tail segment missing from arena");
      let last_key = seg.last_key();
      self.locator.erase(last_key);
      before = seg.pre;
      self.free_list.push(tail_id);
      self.num_seg -= 1;
      seg.to_sorted_data(&mut keys, &mut values);
    }

    self.global_overflow.to_sorted_data(&mut keys, &mut values);
    self.global_overflow.clear();
    self.num_global_overflow_keys = 0;

    if keys.is_empty() {
      return;
    }

    let descs = build_segments(&keys, self.max_error);
    let n = self.splice_segments(before, None, &descs, &keys, &values);
    self.num_seg += n;
    self.num_seg_array_keys += keys.len();
    self.max_key = Some(keys[keys.len() - 1]);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn idx() -> Index<u64, u64> {
    Index::new(32, 1024).unwrap()
  }

  #[test]
  fn bulk_load_rejects_bad_input() {
    let mut i = idx();
    assert_eq!(i.bulk_load(&[], &[]).unwrap_err(), IndexError::EmptyBulkLoad);
    assert!(matches!(i.bulk_load(&[1, 2], &[1]).unwrap_err(), IndexError::LengthMismatch { .. }));
    assert_eq!(i.bulk_load(&[2, 1], &[1, 2]).unwrap_err(), IndexError::NotSorted);
    assert_eq!(i.bulk_load(&[1, 1], &[1, 2]).unwrap_err(), IndexError::NotSorted);
  }

  #[test]
  fn new_rejects_zero_error() {
    assert_eq!(Index::<u64, u64>::new(0, 1024).unwrap_err(), IndexError::InvalidMaxError);
  }

  /// P8: iterating `head -> next -> ...` visits every live segment exactly
  /// once in ascending key order, both right after bulk load and after a
  /// retrain has spliced in a replacement chain.
  #[test]
  fn sibling_list_stays_consistent_across_retrain() {
    let mut i = idx();
    let keys: Vec<u64> = (0..2000).step_by(2).collect();
    let values = keys.clone();
    i.bulk_load(&keys, &values).unwrap();

    let mut seen = Vec::new();
    let mut cur = i.head;
    while let Some(segid) = cur {
      let seg = i.arena[segid].as_ref().unwrap();
      seen.push(seg.first_key());
      cur = seg.next;
    }
    assert_eq!(seen.len(), i.num_seg);
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(i.tail, cur.or(i.tail)); // reached the end without looping

    // force heavy buffering to trip a retrain, then re-check.
    for k in (1u64..2000).step_by(2) {
      i.insert(k, k * 10);
    }
    let mut seen2 = Vec::new();
    let mut cur2 = i.head;
    while let Some(segid) = cur2 {
      let seg = i.arena[segid].as_ref().unwrap();
      seen2.push(seg.first_key());
      cur2 = seg.next;
    }
    assert!(seen2.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(seen2.len(), i.num_seg);
  }

  #[test]
  fn transform_promotes_overflow_with_no_prior_segments() {
    let mut i = Index::new(32, 3).unwrap();
    for k in [5u64, 3, 7, 1, 9] {
      i.insert(k, k);
    }
    assert!(i.num_segments() >= 1);
    for k in [5u64, 3, 7, 1, 9] {
      assert_eq!(i.find(k), Some(k));
    }
  }
}

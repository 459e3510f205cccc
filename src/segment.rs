//! Segment (C3): one contiguous, immutable-between-retrains key range with
//! a linear model, per-slot overflow buffers, and sibling links into the
//! segment arena.
//! 段（C3）：一段连续、两次 retrain 之间不可变的键范围，带线性模型、
//! 按 slot 懒分配的溢出缓冲区，以及指向 segment arena 的兄弟链接。

use crate::key::Key;
use crate::overflow::OverflowBuffer;
use crate::spline::SegmentDescriptor;

/// Stable index into the index facade's segment arena. Never a pointer:
/// the locator stores these as its leaf payload without owning the segment.
pub type SegId = usize;

/// Retrain hysteresis starts here and doubles on every retrain of a given
/// segment, so repeated retrains of the same hot segment get steadily
/// rarer.
const INITIAL_ALPHA: u32 = 32;

pub struct Segment<K: Key, V: Copy> {
  keys: Vec<K>,
  values: Vec<V>,
  buffers: Vec<Option<Box<OverflowBuffer<K, V>>>>,
  slope: f32,
  pub pre: Option<SegId>,
  pub next: Option<SegId>,
  num_buffer_keys: u32,
  num_buffer_sorted_keys: u32,
  alpha: u32,
}

impl<K: Key, V: Copy> Segment<K, V> {
  /// Builds a segment's arrays from `desc` and the slices it was drawn
  /// from. Buffers start unallocated; counters start at zero except the
  /// array size, which `desc.size` already fixes.
  pub fn from_descriptor(desc: &SegmentDescriptor<K>, keys: &[K], values: &[V]) -> Self {
    let size = desc.size as usize;
    let slice_keys = keys[desc.offset..desc.offset + size].to_vec();
    let slice_values = values[desc.offset..desc.offset + size].to_vec();
    let mut buffers = Vec::with_capacity(size);
    buffers.resize_with(size, || None);
    Segment {
      keys: slice_keys,
      values: slice_values,
      buffers,
      slope: desc.slope,
      pre: None,
      next: None,
      num_buffer_keys: 0,
      num_buffer_sorted_keys: 0,
      alpha: INITIAL_ALPHA,
    }
  }

  pub fn len(&self) -> usize {
    self.keys.len()
  }

  pub fn first_key(&self) -> K {
    self.keys[0]
  }

  pub fn last_key(&self) -> K {
    self.keys[self.keys.len() - 1]
  }

  pub fn num_array_keys(&self) -> u32 {
    self.keys.len() as u32
  }

  pub fn total_kv_num(&self) -> u32 {
    self.keys.len() as u32 + self.num_buffer_keys
  }

  fn heap_bytes(&self) -> usize {
    let arrays = self.keys.capacity() * std::mem::size_of::<K>()
      + self.values.capacity() * std::mem::size_of::<V>()
      + self.buffers.capacity() * std::mem::size_of::<Option<Box<OverflowBuffer<K, V>>>>();
    let buffer_payload: usize =
      self.buffers.iter().filter_map(|b| b.as_ref()).map(|b| b.size_in_bytes()).sum();
    arrays + buffer_payload
  }

  pub fn size_in_bytes(&self) -> usize {
    std::mem::size_of::<Self>() + self.heap_bytes()
  }

  /// Search bound `[lo, hi)` around the model's estimate for `key`; see
  /// `SPEC_FULL.md` section 4.2. `est` is clamped to a valid array index
  /// purely so the safe-Rust indexing below cannot panic; see that
  /// section's rationale for why this never changes the outcome.
  fn search_bound(&self, key: K, max_error: usize) -> (usize, usize) {
    let n = self.keys.len();
    if key < self.keys[0] {
      return (0, 0);
    }
    let delta = key.sub_as_f64(self.keys[0]);
    let est_f = (self.slope as f64 * delta).floor();
    let est = est_f.max(0.0) as usize;
    let est_clamped = est.min(n - 1);

    if self.keys[est_clamped] < key {
      let lo = (est + 1).min(n);
      let hi = (est + max_error + 1).min(n);
      (lo, hi)
    } else {
      let lo = if est >= max_error { est - max_error } else { 0 };
      (lo, est_clamped)
    }
  }

  fn lower_bound_in(&self, lo: usize, hi: usize, key: K) -> usize {
    self.keys[lo..hi].partition_point(|&k| k < key) + lo
  }

  /// Lazily allocates slot `pos`'s buffer and appends `(key, value)` to
  /// it. A key equal to the slot's array key is allowed here too: the
  /// array is immutable between retrains, so an overwrite of an existing
  /// key has nowhere else to go. `find`/`range`/`to_sorted_data` all
  /// consult the buffer before the array for this reason.
  pub fn insert(&mut self, key: K, value: V, max_error: usize) {
    let (lo, hi) = self.search_bound(key, max_error);
    let pos = self.lower_bound_in(lo, hi, key);
    let buf = self.buffers[pos].get_or_insert_with(|| Box::new(OverflowBuffer::new()));
    buf.insert(key, value);
    self.num_buffer_keys += 1;
  }

  /// A buffer entry at `pos` is checked before the array: a later insert
  /// of a key already present in the array lands in that slot's buffer
  /// (see `insert`), and must shadow the array's now-stale value so
  /// `find` always returns the most recently inserted value for a key
  /// (`SPEC_FULL.md` section 8, P1 / the "overwrite via buffer" boundary
  /// behavior).
  pub fn find(&mut self, key: K, max_error: usize) -> Option<V> {
    let (lo, hi) = self.search_bound(key, max_error);
    let pos = self.lower_bound_in(lo, hi, key);
    if pos < self.buffers.len() {
      if let Some(buf) = self.buffers[pos].as_mut() {
        if let Some(v) = buf.find(key) {
          return Some(v);
        }
      }
    }
    if pos < self.keys.len() && self.keys[pos] == key {
      return Some(self.values[pos]);
    }
    None
  }

  /// Walks forward from `start`, appending `(key, value)` pairs in
  /// `[start, end)` into `out`. Returns `true` if the walk stopped inside
  /// this segment (the caller need not continue into `next`).
  pub fn range(&self, start: K, end: K, max_error: usize, out: &mut Vec<(K, V)>) -> bool {
    let (lo, hi) = self.search_bound(start, max_error);
    let mut pos = self.lower_bound_in(lo, hi, start);
    let n = self.keys.len();
    while pos != n && self.keys[pos] < end {
      let mut shadowed = false;
      if let Some(buf) = self.buffers[pos].as_ref() {
        buf.range(start, end, out);
        shadowed = buf.contains(self.keys[pos]);
      }
      if !shadowed {
        out.push((self.keys[pos], self.values[pos]));
      }
      pos += 1;
    }
    pos < n
  }

  /// Drains every slot's buffer (sorted) followed by the slot's array
  /// entry, in slot order, into `keys`/`values`.
  pub fn to_sorted_data(&mut self, keys: &mut Vec<K>, values: &mut Vec<V>) {
    for i in 0..self.keys.len() {
      let shadowed = self.buffers[i].as_ref().is_some_and(|buf| buf.contains(self.keys[i]));
      if let Some(buf) = self.buffers[i].as_mut() {
        buf.to_sorted_data(keys, values);
      }
      if !shadowed {
        keys.push(self.keys[i]);
        values.push(self.values[i]);
      }
    }
  }

  /// `total_kv_num > alpha * avg_seg_keys && num_buffer_sorted_keys /
  /// num_buffer_keys > 0.6`. `num_buffer_sorted_keys` is intentionally
  /// never incremented elsewhere in this crate (see `SPEC_FULL.md`
  /// section 9): the second condition is therefore false whenever
  /// `num_buffer_keys > 0`, so in practice this almost never returns
  /// true and `alpha` almost never doubles. Promotion happens via
  /// `transform_overflow_to_segment` instead.
  pub fn is_retrain(&mut self, avg_seg_keys: u32) -> bool {
    if self.num_buffer_keys == 0 {
      return false;
    }
    let ratio = self.num_buffer_sorted_keys as f64 / self.num_buffer_keys as f64;
    if self.total_kv_num() > self.alpha * avg_seg_keys && ratio > 0.6 {
      self.alpha *= 2;
      true
    } else {
      false
    }
  }
}

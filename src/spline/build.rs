//! Online epsilon-bounded segmentation (C4): the rotating-cone / corridor
//! method. Feed keys one at a time via `add_key`, call `finalize` to flush
//! the last open segment.
//! 在线 ε 有界分段（C4）：旋转锥 / 走廊法。

use crate::key::Key;
use crate::spline::types::SegmentDescriptor;

/// A segment currently being grown. The cone's coordinate origin is always
/// this segment's own `first_key` at local index 0 — the same origin
/// `Segment::search_bound` uses (`SPEC_FULL.md` section 3 invariant 2:
/// `|floor(slope·(K − keys[0])) − i| ≤ ε`). `min_slope`/`max_slope` bound
/// the feasible slope given every point admitted so far.
struct OpenSegment<K: Key> {
  first_key: K,
  offset: usize,
  last_key: K,
  local_len: usize,
  min_slope: f64,
  max_slope: f64,
}

impl<K: Key> OpenSegment<K> {
  fn fresh(key: K, offset: usize) -> Self {
    OpenSegment {
      first_key: key,
      offset,
      last_key: key,
      local_len: 1,
      min_slope: f64::NEG_INFINITY,
      max_slope: f64::INFINITY,
    }
  }

  fn slope(&self) -> f32 {
    if self.local_len == 1 {
      0.0
    } else {
      (((self.min_slope + self.max_slope) * 0.5) as f32)
    }
  }

  fn into_descriptor(self) -> SegmentDescriptor<K> {
    SegmentDescriptor {
      first_key: self.first_key,
      offset: self.offset,
      size: self.local_len as u32,
      slope: self.slope(),
    }
  }
}

pub struct SplineBuilder<K: Key> {
  max_error: usize,
  descriptors: Vec<SegmentDescriptor<K>>,
  open: Option<OpenSegment<K>>,
  next_offset: usize,
  #[cfg(debug_assertions)]
  last_seen: Option<K>,
}

impl<K: Key> SplineBuilder<K> {
  pub fn new(max_error: usize) -> Self {
    SplineBuilder {
      max_error,
      descriptors: Vec::new(),
      open: None,
      next_offset: 0,
      #[cfg(debug_assertions)]
      last_seen: None,
    }
  }

  /// Feeds one key from a strictly-sorted stream. Undefined (asserted in
  /// debug) if `key` is not strictly greater than the previously fed key.
  pub fn add_key(&mut self, key: K) {
    #[cfg(debug_assertions)]
    {
      if let Some(last) = self.last_seen {
        debug_assert!(last < key, "spline builder input must be strictly increasing");
      }
      self.last_seen = Some(key);
    }

    let Some(seg) = &mut self.open else {
      self.open = Some(OpenSegment::fresh(key, self.next_offset));
      return;
    };

    let idx = seg.local_len as f64;
    let dx = key.sub_as_f64(seg.first_key);

    if dx == 0.0 {
      // Defensive branch mirroring the reference builder; unreachable
      // under the strictly-increasing precondition except for a
      // duplicate of the segment's own first key.
      if idx > 2.0 * self.max_error as f64 {
        self.close_and_restart(key);
      } else {
        seg.local_len += 1;
        seg.last_key = key;
      }
      return;
    }

    let eps = self.max_error as f64;
    let slope_lo = (idx - eps) / dx;
    let slope_hi = (idx + eps) / dx;
    let new_min = seg.min_slope.max(slope_lo);
    let new_max = seg.max_slope.min(slope_hi);

    if new_min > new_max {
      self.close_and_restart(key);
    } else {
      seg.min_slope = new_min;
      seg.max_slope = new_max;
      seg.local_len += 1;
      seg.last_key = key;
    }
  }

  /// Closes the current segment and restarts a fresh cone anchored at the
  /// rejected key itself, at local index 0 — the same origin
  /// `Segment::search_bound` will later predict against. An anchor
  /// inherited from the closed segment's last key (as an earlier reading
  /// of the corridor-method prose suggested) lets the fitted slope drift
  /// arbitrarily once the gap between that old anchor and the new
  /// segment's real data is large, which can blow straight through ε; see
  /// `DESIGN.md`.
  fn close_and_restart(&mut self, rejected: K) {
    let closed = self.open.take().expect("close_and_restart called with no open segment");
    self.next_offset += closed.local_len;
    self.descriptors.push(closed.into_descriptor());
    self.open = Some(OpenSegment::fresh(rejected, self.next_offset));
  }

  /// Flushes the current open segment (if any) and returns every emitted
  /// descriptor, consuming the builder.
  pub fn finalize(mut self) -> Vec<SegmentDescriptor<K>> {
    if let Some(seg) = self.open.take() {
      self.next_offset += seg.local_len;
      self.descriptors.push(seg.into_descriptor());
    }
    self.descriptors
  }
}

/// Runs the builder over an entire sorted slice in one call; a convenience
/// wrapper over `add_key`/`finalize` for bulk load and retrain.
pub fn build_segments<K: Key>(keys: &[K], max_error: usize) -> Vec<SegmentDescriptor<K>> {
  let mut builder = SplineBuilder::new(max_error);
  for &k in keys {
    builder.add_key(k);
  }
  builder.finalize()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn check_descriptors(keys: &[u64], max_error: usize, descs: &[SegmentDescriptor<u64>]) {
    let mut covered = 0usize;
    for d in descs {
      assert_eq!(d.offset, covered);
      let size = d.size as usize;
      let slice = &keys[d.offset..d.offset + size];
      assert_eq!(d.first_key, slice[0]);
      for (i, &k) in slice.iter().enumerate() {
        let pred = (d.slope as f64 * (k - d.first_key) as f64).floor();
        assert!(
          (pred - i as f64).abs() <= max_error as f64 + 1e-9,
          "key {k} at local pos {i}: predicted {pred}, allowed error {max_error}"
        );
      }
      covered += size;
    }
    assert_eq!(covered, keys.len());
  }

  #[test]
  fn linear_sequence_one_segment() {
    let keys: Vec<u64> = (0..1000).collect();
    let descs = build_segments(&keys, 32);
    assert_eq!(descs.len(), 1);
    check_descriptors(&keys, 32, &descs);
  }

  #[test]
  fn sparse_then_dense_splits_segments() {
    let mut keys: Vec<u64> = (0..100u64).step_by(10).collect();
    keys.extend(1000..1100);
    let descs = build_segments(&keys, 16);
    assert!(descs.len() >= 2);
    check_descriptors(&keys, 16, &descs);
    // non-overlap: strictly increasing offsets covering the whole range.
    for w in descs.windows(2) {
      let prev_end = w[0].offset + w[0].size as usize;
      assert_eq!(prev_end, w[1].offset);
    }
  }

  /// A dense arithmetic run, then a huge sparse jump into another dense
  /// run: the second run must fit within ε of *its own* first key, not
  /// drift because the segment that closed right before it ended far
  /// away. Regression test for the anchor-continuation bug described in
  /// `DESIGN.md` — with the buggy "anchor at the previous segment's last
  /// key" restart, the tiny slope needed to bridge the million-key jump
  /// gets reused as the new segment's model, which predicts every
  /// following point miles off from its true local slot.
  #[test]
  fn dense_run_after_a_huge_sparse_jump_stays_within_epsilon() {
    let mut keys: Vec<u64> = (0..1000u64).collect();
    keys.extend(1_000_000..1_000_200u64);
    let descs = build_segments(&keys, 2);
    check_descriptors(&keys, 2, &descs);
  }

  #[test]
  fn singleton_segment_has_zero_slope() {
    // A single key trivially yields one segment with slope 0.
    let descs = build_segments(&[42u64], 32);
    assert_eq!(descs.len(), 1);
    assert_eq!(descs[0].slope, 0.0);
    assert_eq!(descs[0].size, 1);
  }
}

//! Error definitions for the spline index
//! 样条索引的错误定义

use std::fmt;

/// Precondition violations that are cheap to check at the public boundary.
/// Everything else (e.g. "is this slice really sorted") stays a
/// `debug_assert!` per the crate's error-handling design: see `SPEC_FULL.md`
/// section 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum IndexError {
  /// `bulk_load` was called with an empty `keys` slice.
  EmptyBulkLoad,
  /// `keys.len() != values.len()` on `bulk_load`.
  LengthMismatch { keys_len: usize, values_len: usize },
  /// `keys` passed to `bulk_load` was not strictly sorted ascending.
  /// Checked unconditionally (not just in debug builds): unlike the
  /// spline builder's own `add_key`, this is the one place a caller's bad
  /// input reaches the crate directly, so it gets a typed error rather
  /// than a `debug_assert!`. See `SPEC_FULL.md` section 7.
  NotSorted,
  /// `max_error == 0` was passed to `Index::new`.
  InvalidMaxError,
}

impl fmt::Display for IndexError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      IndexError::EmptyBulkLoad => {
        write!(f, "bulk_load requires a non-empty key slice / bulk_load 需要非空的键切片")
      }
      IndexError::LengthMismatch { keys_len, values_len } => write!(
        f,
        "keys.len() ({keys_len}) != values.len() ({values_len}) / 键值长度不一致"
      ),
      IndexError::NotSorted => {
        write!(f, "bulk_load keys must be sorted ascending / bulk_load 的键必须升序排列")
      }
      IndexError::InvalidMaxError => {
        write!(f, "max_error must be >= 1 / max_error 必须大于等于 1")
      }
    }
  }
}

impl std::error::Error for IndexError {}

pub type Result<T> = std::result::Result<T, IndexError>;

//! The key trait: the small set of integer types this index supports.
//! 索引支持的整数键类型

use std::fmt::Debug;
use std::ops::Sub;

/// A key usable with the index: an unsigned integer compared by its natural
/// total order, convertible to `f64` for slope arithmetic and to a fixed-width
/// big-endian byte string for the segment locator.
///
/// 可用作索引键的类型：按自然全序比较的无符号整数，可转换为 `f64`
/// 用于斜率计算，也可转换为定长大端字节串供 segment locator 使用。
pub trait Key: Copy + Ord + Debug + Send + Sync + Sub<Output = Self> + 'static {
  /// Number of bytes `write_be_bytes` writes; also the locator's trie depth.
  const BYTE_LEN: usize;

  /// Widens to `f64`. Used only for slope/intercept arithmetic, never for
  /// equality or ordering.
  fn as_f64(self) -> f64;

  /// `self - other` widened to `f64`, for callers that already know
  /// `self >= other` and want to avoid the precision loss of subtracting
  /// two large `as_f64()` values (catastrophic cancellation for keys near
  /// 2^53 and above).
  fn sub_as_f64(self, other: Self) -> f64 {
    (self - other).as_f64()
  }

  /// Writes this key's big-endian bytes into `out[..Self::BYTE_LEN]`.
  fn write_be_bytes(self, out: &mut [u8]);
}

macro_rules! impl_key {
  ($t:ty, $len:expr) => {
    impl Key for $t {
      const BYTE_LEN: usize = $len;

      #[inline]
      fn as_f64(self) -> f64 {
        self as f64
      }

      #[inline]
      fn write_be_bytes(self, out: &mut [u8]) {
        out[..$len].copy_from_slice(&self.to_be_bytes());
      }
    }
  };
}

impl_key!(u32, 4);
impl_key!(u64, 8);

/// Largest `BYTE_LEN` across supported keys; sized so the locator can use a
/// fixed stack buffer instead of allocating per key encoded.
pub const MAX_KEY_BYTES: usize = 8;

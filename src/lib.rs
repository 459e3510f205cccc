//! # spline_index
//!
//! An updatable learned index for monotonically-comparable integer keys.
//!
//! Given a sorted bulk load of key/value pairs, the index fits a
//! piecewise-linear model of the empirical CDF (the spline) bounded by a
//! fixed maximum prediction error ε, then serves point lookups, bounded
//! range scans, and arbitrary-order inserts over it. Inserts are quarantined
//! into per-slot overflow buffers rather than rewriting segments in place;
//! segments (and the trailing global overflow buffer) are occasionally
//! retrained/promoted once a segment's buffer grows large relative to its
//! array.
//!
//! ## Usage
//!
//! ```rust
//! use spline_index::Index;
//!
//! let keys: Vec<u64> = (0..1000).map(|i| i * 10).collect();
//! let values = keys.clone();
//!
//! let mut index = Index::with_defaults().unwrap();
//! index.bulk_load(&keys, &values).unwrap();
//! assert_eq!(index.find(500), Some(500));
//! assert_eq!(index.find(505), None);
//!
//! index.insert(505, 999);
//! assert_eq!(index.find(505), Some(999));
//! ```
//!
//! ## What this crate does not do
//!
//! No durability, no crash recovery, no concurrent access, no variable-length
//! keys. Deletion is an internal retrain primitive only, never a public
//! operation. See `SPEC_FULL.md` for the full design rationale.

mod error;
mod index;
mod key;
mod locator;
mod mflist;
mod overflow;
mod segment;
mod spline;

pub use error::{IndexError, Result};
pub use index::Index;
pub use key::Key;

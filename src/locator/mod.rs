//! Segment locator (C5): the adaptive radix tree keyed by segment end-key.
//! segment locator（C5）：以 segment 末端键为键的自适应基数树。

mod node;
mod tree;

pub use tree::SegmentLocator;

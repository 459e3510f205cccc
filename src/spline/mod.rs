//! Spline builder (C4): online epsilon-bounded piecewise-linear
//! segmentation of a sorted key stream.
//! 样条构建器（C4）：对已排序键流做在线 ε 有界分段。

mod build;
mod types;

pub use build::{build_segments, SplineBuilder};
pub use types::SegmentDescriptor;

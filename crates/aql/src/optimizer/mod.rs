//! Filter analysis for index planning.

mod range_analyzer;

pub use range_analyzer::{index_or_condition, RangeAnalyzer};

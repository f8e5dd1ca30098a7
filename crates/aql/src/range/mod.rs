//! Range-condition algebra.
//!
//! - `RangeBound`: one side of a range, constant or computed at runtime
//! - `RangeInfo`: all bounds on one `variable.attribute`
//! - `RangeMap`: AND of ranges, one OR-branch
//! - `RangeMapVec`: OR of branches
//! - `condition`: planner-facing index conditions and overlap pruning

mod bound;
mod condition;
mod info;
mod map;
mod map_vec;

pub use bound::{IndexOperator, IndexOperatorKind, RangeBound};
pub use condition::{
    are_disjoint_index_and_conditions, are_disjoint_range_infos, difference_index_and,
    difference_range_infos, is_contained_index_and_conditions, remove_overlaps_index_or,
    IndexAndCondition, IndexOrCondition,
};
pub use info::{BoundSide, RangeInfo};
pub use map::{and_combine_range_maps, AttributeRanges, RangeMap};
pub use map_vec::{
    and_combine_range_map_vecs, and_combine_range_map_vecs_bounded,
    and_combine_range_map_vecs_ignore_empty, or_combine_range_map_vecs, RangeConfig, RangeMapVec,
};

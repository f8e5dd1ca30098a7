//! Disjunction of AND-branches.
//!
//! A `RangeMapVec` without branches carries no information and acts as the
//! identity of both combinators that treat it specially (`or_combine` and
//! `and_combine_ignore_empty`). The plain `and_combine` is the Cartesian
//! product and therefore annihilates on an empty operand.

use super::condition::{split_constant_parts, IndexAndCondition, IndexOrCondition};
use super::info::RangeInfo;
use super::map::{and_combine_range_maps, AttributeRanges, RangeMap};
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use hashbrown::HashSet;
use strata_core::{Error, JsonValue, Result};

/// Limits for combining disjunctions.
#[derive(Clone, Debug)]
pub struct RangeConfig {
    /// Maximum number of OR-branches a bounded AND may produce (default: 256)
    pub max_or_branches: usize,
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            max_or_branches: 256,
        }
    }
}

impl RangeConfig {
    pub fn with_max_or_branches(mut self, limit: usize) -> Self {
        self.max_or_branches = limit;
        self
    }
}

/// OR of `RangeMap` branches.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RangeMapVec {
    maps: Vec<RangeMap>,
}

impl RangeMapVec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: RangeMap) -> Self {
        Self { maps: alloc::vec![map] }
    }

    /// Appends a branch.
    pub fn emplace_back(&mut self, map: RangeMap) {
        self.maps.push(map);
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn get(&self, pos: usize) -> Option<&RangeMap> {
        self.maps.get(pos)
    }

    pub fn get_mut(&mut self, pos: usize) -> Option<&mut RangeMap> {
        self.maps.get_mut(pos)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RangeMap> {
        self.maps.iter()
    }

    /// Ranges of `variable` in the branch at `pos`.
    pub fn find(&self, variable: &str, pos: usize) -> Option<&AttributeRanges> {
        self.maps.get(pos)?.find_variable(variable)
    }

    pub fn erase_empty_or_undefined(&mut self, variable: &str) {
        for map in &mut self.maps {
            map.erase_empty_or_undefined(variable);
        }
    }

    /// True if every branch constrains `variable`. A vector without branches
    /// maps nothing.
    pub fn is_mapped(&self, variable: &str) -> bool {
        !self.maps.is_empty()
            && self
                .maps
                .iter()
                .all(|map| map.find_variable(variable).is_some())
    }

    /// Positions of the branches that constrain `variable` with valid ranges
    /// only.
    pub fn valid_positions(&self, variable: &str) -> Vec<usize> {
        self.maps
            .iter()
            .enumerate()
            .filter(|(_, map)| map.find_variable(variable).is_some() && map.is_valid(variable))
            .map(|(pos, _)| pos)
            .collect()
    }

    /// Attributes of `variable` constrained in any branch.
    pub fn attributes(&self, variable: &str) -> HashSet<String> {
        let mut attributes = HashSet::new();
        for map in &self.maps {
            attributes.extend(map.attributes(variable));
        }
        attributes
    }

    /// Removes from `range` the constant parts already covered by other
    /// branches on the same variable and attribute. `range` is about to
    /// become a further branch of this disjunction, so the branches may be
    /// trimmed as well. A branch that `range` covers completely is
    /// invalidated and `range` is left whole.
    ///
    /// Only branches consisting of this single range take part; in any other
    /// branch the attribute's interval is not the branch's matched set.
    pub fn difference_range_info(&mut self, range: &mut RangeInfo) {
        for pos in self.valid_positions(&range.variable) {
            if !range.is_valid() {
                break;
            }
            let map = &mut self.maps[pos];
            if map.len() != 1 {
                continue;
            }
            if let Some(existing) = map.find_mut(&range.variable, &range.attribute) {
                split_constant_parts(existing, range);
            }
        }
    }

    /// Projects the disjunction onto one index: for each branch, the ranges
    /// of `variable` along `attributes` up to the first unconstrained one.
    ///
    /// Returns `None` when a branch does not constrain the leading attribute,
    /// because the index cannot then bound the scan. Statically empty
    /// branches are left out.
    pub fn to_index_or_condition(
        &self,
        variable: &str,
        attributes: &[&str],
    ) -> Option<IndexOrCondition> {
        if self.maps.is_empty() || attributes.is_empty() {
            return None;
        }
        let mut condition = IndexOrCondition::with_capacity(self.maps.len());
        for map in &self.maps {
            if map.is_statically_empty() {
                continue;
            }
            let branch: IndexAndCondition = map.prefix(variable, attributes);
            if branch.is_empty() {
                log::debug!(
                    "branch does not constrain {}.{}, no index condition",
                    variable,
                    attributes[0]
                );
                return None;
            }
            condition.push(branch);
        }
        Some(condition)
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::Array(self.maps.iter().map(RangeMap::to_json).collect())
    }

    pub fn from_json(json: &JsonValue) -> Result<Self> {
        let branches = json
            .as_array()
            .ok_or_else(|| Error::malformed("range map vector must be an array"))?;
        Ok(Self {
            maps: branches.iter().map(RangeMap::from_json).collect::<Result<_>>()?,
        })
    }
}

impl<'a> IntoIterator for &'a RangeMapVec {
    type Item = &'a RangeMap;
    type IntoIter = core::slice::Iter<'a, RangeMap>;

    fn into_iter(self) -> Self::IntoIter {
        self.maps.iter()
    }
}

/// OR of two disjunctions: the branches of `lhs` followed by those of `rhs`
/// not identical to one already present.
pub fn or_combine_range_map_vecs(lhs: &RangeMapVec, rhs: &RangeMapVec) -> RangeMapVec {
    if lhs.is_empty() {
        return rhs.clone();
    }
    if rhs.is_empty() {
        return lhs.clone();
    }
    let mut combined = lhs.clone();
    for map in rhs {
        if combined.maps.iter().any(|existing| existing.same_constraints(map)) {
            log::trace!("skipping duplicate OR branch");
            continue;
        }
        combined.maps.push(map.clone());
    }
    combined
}

/// AND of two disjunctions, distributed over the branches. Produces
/// `lhs.len() * rhs.len()` branches; see `and_combine_range_map_vecs_bounded`
/// for a variant with a ceiling.
pub fn and_combine_range_map_vecs(lhs: &RangeMapVec, rhs: &RangeMapVec) -> RangeMapVec {
    let mut combined = RangeMapVec {
        maps: Vec::with_capacity(lhs.len() * rhs.len()),
    };
    for left in lhs {
        for right in rhs {
            combined.maps.push(and_combine_range_maps(left, right));
        }
    }
    combined
}

/// Like `and_combine_range_map_vecs`, but an absent or empty operand is the
/// neutral element and the other operand is returned.
pub fn and_combine_range_map_vecs_ignore_empty(
    lhs: Option<&RangeMapVec>,
    rhs: Option<&RangeMapVec>,
) -> Option<RangeMapVec> {
    match (lhs, rhs) {
        (None, None) => None,
        (Some(vec), None) | (None, Some(vec)) => Some(vec.clone()),
        (Some(l), Some(r)) if l.is_empty() => Some(r.clone()),
        (Some(l), Some(r)) if r.is_empty() => Some(l.clone()),
        (Some(l), Some(r)) => Some(and_combine_range_map_vecs(l, r)),
    }
}

/// AND of two disjunctions with a ceiling on the result size.
///
/// Empty operands are neutral. Branches known to match nothing are dropped
/// as they are produced; if every branch is empty one of them is kept so the
/// result still reads as `false`. Fails with `BranchLimitExceeded` once more
/// than `config.max_or_branches` branches survive.
pub fn and_combine_range_map_vecs_bounded(
    lhs: &RangeMapVec,
    rhs: &RangeMapVec,
    config: &RangeConfig,
) -> Result<RangeMapVec> {
    if lhs.is_empty() {
        return Ok(rhs.clone());
    }
    if rhs.is_empty() {
        return Ok(lhs.clone());
    }
    let mut combined = RangeMapVec::new();
    let mut empty_branch = None;
    for left in lhs {
        for right in rhs {
            let map = and_combine_range_maps(left, right);
            if map.is_statically_empty() {
                empty_branch.get_or_insert(map);
                continue;
            }
            if combined.maps.iter().any(|existing| existing.same_constraints(&map)) {
                continue;
            }
            if combined.len() == config.max_or_branches {
                log::debug!(
                    "AND of {} and {} branches exceeds the limit of {}",
                    lhs.len(),
                    rhs.len(),
                    config.max_or_branches
                );
                return Err(Error::branch_limit(combined.len() + 1, config.max_or_branches));
            }
            combined.maps.push(map);
        }
    }
    if combined.is_empty() {
        if let Some(map) = empty_branch {
            combined.maps.push(map);
        }
    }
    Ok(combined)
}

impl fmt::Display for RangeMapVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_json(), f)
    }
}

//! Index conditions and OR-branch pruning.
//!
//! An `IndexAndCondition` lists the ranges of one variable in index
//! attribute order; an `IndexOrCondition` is a disjunction of those. Pruning
//! rewrites a disjunction so that no index range is scanned twice while the
//! union of matched documents stays the same.
//!
//! A range's matched set is contained in its constant interval. It equals
//! that interval only when the range has no runtime bounds ("exact"). A
//! branch may therefore only be cut by a partner whose matched set is known
//! exactly: the partner is exact on the cut attribute, and on every other
//! attribute it is exact and covers the branch being cut.

use super::bound::{complement, compare_lower, compare_upper, lower_above_upper};
use super::info::{BoundSide, RangeInfo};
use alloc::format;
use alloc::vec::Vec;
use core::cmp::Ordering;
use strata_core::{Error, Result};

/// Ranges of one variable in index attribute order (AND).
pub type IndexAndCondition = Vec<RangeInfo>;

/// Disjunction of index AND-conditions. Without branches it matches nothing.
pub type IndexOrCondition = Vec<IndexAndCondition>;

fn is_empty_range(range: &RangeInfo) -> bool {
    range.is_defined() && !range.is_valid()
}

fn is_exact(range: &RangeInfo) -> bool {
    range.is_defined() && range.is_constant()
}

fn is_unbounded(range: &RangeInfo) -> bool {
    is_exact(range) && !range.low_const.is_defined() && !range.high_const.is_defined()
}

/// True if the constant intervals do not intersect. Sound for ranges with
/// runtime bounds too, since those only narrow the matched set.
fn constant_parts_disjoint(lhs: &RangeInfo, rhs: &RangeInfo) -> bool {
    is_empty_range(lhs)
        || is_empty_range(rhs)
        || lower_above_upper(&lhs.low_const, &rhs.high_const)
        || lower_above_upper(&rhs.low_const, &lhs.high_const)
}

/// True if the constant interval of `outer` includes that of `inner`.
fn interval_covers(outer: &RangeInfo, inner: &RangeInfo) -> bool {
    is_empty_range(inner)
        || (compare_lower(&outer.low_const, &inner.low_const) != Ordering::Greater
            && compare_upper(&outer.high_const, &inner.high_const) != Ordering::Less)
}

/// Removes the interval of the exact range `cutter` from `target` if what
/// remains is a single interval. Returns whether `target` changed.
fn subtract(target: &mut RangeInfo, cutter: &RangeInfo) -> bool {
    if is_empty_range(target) || constant_parts_disjoint(target, cutter) {
        return false;
    }
    if interval_covers(cutter, target) {
        log::debug!(
            "range on {}.{} is covered, dropping it",
            target.variable,
            target.attribute
        );
        target.invalidate();
        return true;
    }
    let covers_start =
        compare_lower(&cutter.low_const, &target.low_const) != Ordering::Greater;
    let covers_end =
        compare_upper(&cutter.high_const, &target.high_const) != Ordering::Less;
    match (covers_start, covers_end) {
        (true, _) => target.tighten(BoundSide::Low, &complement(&cutter.high_const)),
        (_, true) => target.tighten(BoundSide::High, &complement(&cutter.low_const)),
        // cutter lies strictly inside target, the rest would be two intervals
        (false, false) => return false,
    }
    log::debug!(
        "split overlapping ranges on {}.{}",
        target.variable,
        target.attribute
    );
    true
}

/// Makes the constant parts of two ranges on the same slot disjoint while
/// keeping their union. Returns whether anything changed.
pub(crate) fn split_constant_parts(lhs: &mut RangeInfo, rhs: &mut RangeInfo) -> bool {
    if constant_parts_disjoint(lhs, rhs) {
        return false;
    }
    if is_exact(lhs) && subtract(rhs, lhs) {
        return true;
    }
    is_exact(rhs) && subtract(lhs, rhs)
}

/// Makes the constant parts of `lhs` and `rhs` disjoint, preserving the
/// union of what they match. `rhs` is trimmed in preference to `lhs`.
///
/// A side is only trimmed by a partner without runtime bounds; runtime bound
/// lists are never modified. Fails with `InvalidUsage` if the ranges belong
/// to different slots.
pub fn difference_range_infos(lhs: &mut RangeInfo, rhs: &mut RangeInfo) -> Result<()> {
    if !lhs.same_slot(rhs) {
        return Err(Error::invalid_usage(format!(
            "cannot split range on {}.{} against range on {}.{}",
            lhs.variable, lhs.attribute, rhs.variable, rhs.attribute
        )));
    }
    split_constant_parts(lhs, rhs);
    Ok(())
}

/// True if both ranges are constant and their intervals provably do not
/// intersect. Ranges with runtime bounds are never reported disjoint.
pub fn are_disjoint_range_infos(lhs: &RangeInfo, rhs: &RangeInfo) -> bool {
    lhs.is_constant() && rhs.is_constant() && constant_parts_disjoint(lhs, rhs)
}

fn find<'a>(condition: &'a [RangeInfo], attribute: &str) -> Option<&'a RangeInfo> {
    condition.iter().find(|range| range.attribute == attribute)
}

fn matches_nothing(condition: &[RangeInfo]) -> bool {
    condition.iter().any(is_empty_range)
}

fn shared_attribute_disjoint(
    lhs: &[RangeInfo],
    rhs: &[RangeInfo],
    disjoint: impl Fn(&RangeInfo, &RangeInfo) -> bool,
) -> bool {
    lhs.iter().any(|l| find(rhs, &l.attribute).is_some_and(|r| disjoint(l, r)))
}

/// True if the conditions match disjoint sets: one of them matches nothing,
/// or some shared attribute has constant, disjoint ranges.
pub fn are_disjoint_index_and_conditions(lhs: &[RangeInfo], rhs: &[RangeInfo]) -> bool {
    matches_nothing(lhs)
        || matches_nothing(rhs)
        || shared_attribute_disjoint(lhs, rhs, are_disjoint_range_infos)
}

/// True if the matched set of `outer` includes that of `inner` on every
/// attribute except `skip`. Requires `outer` to be exact there; attributes
/// only `inner` constrains just narrow `inner`.
fn covers_condition(outer: &[RangeInfo], inner: &[RangeInfo], skip: Option<&str>) -> bool {
    outer
        .iter()
        .filter(|o| skip != Some(o.attribute.as_str()))
        .all(|o| {
            is_exact(o)
                && match find(inner, &o.attribute) {
                    Some(i) => interval_covers(o, i),
                    None => is_unbounded(o),
                }
        })
}

/// True if every document matched by `inner` is matched by `outer`: for each
/// attribute `outer` constrains, `outer` is constant and its interval covers
/// `inner`'s range on that attribute. A condition that matches nothing is
/// contained in anything.
pub fn is_contained_index_and_conditions(inner: &[RangeInfo], outer: &[RangeInfo]) -> bool {
    matches_nothing(inner) || (!matches_nothing(outer) && covers_condition(outer, inner, None))
}

fn mark_empty(condition: &mut [RangeInfo]) -> bool {
    match condition.first_mut() {
        Some(range) if range.is_valid() => {
            range.invalidate();
            true
        }
        _ => false,
    }
}

/// Cuts `target` on the first attribute where `cutter` is exact and covers
/// `target` on all remaining attributes.
fn try_cut(target: &mut [RangeInfo], cutter: &[RangeInfo]) -> bool {
    let attributes: Vec<_> = target.iter().map(|range| range.attribute.clone()).collect();
    for attribute in &attributes {
        let Some(cut) = find(cutter, attribute) else {
            continue;
        };
        if !is_exact(cut) || !covers_condition(cutter, target, Some(attribute)) {
            continue;
        }
        if let Some(range) = target.iter_mut().find(|range| &range.attribute == attribute) {
            if subtract(range, cut) {
                return true;
            }
        }
    }
    false
}

/// `difference_index_and` reporting whether either side changed.
pub(crate) fn try_difference_index_and(lhs: &mut [RangeInfo], rhs: &mut [RangeInfo]) -> bool {
    if matches_nothing(lhs)
        || matches_nothing(rhs)
        || shared_attribute_disjoint(lhs, rhs, constant_parts_disjoint)
    {
        return false;
    }
    if is_contained_index_and_conditions(lhs, rhs) {
        return mark_empty(lhs);
    }
    if is_contained_index_and_conditions(rhs, lhs) {
        return mark_empty(rhs);
    }
    try_cut(rhs, lhs) || try_cut(lhs, rhs)
}

/// Rewrites two AND-conditions so that they match disjoint sets while their
/// union is unchanged. A condition covered by the other is marked as
/// matching nothing. Otherwise one attribute of one side is trimmed, which is
/// only possible when the other side's matched set on that attribute is
/// exact and it covers the trimmed side everywhere else; if no such
/// attribute exists both are left as they are.
pub fn difference_index_and(lhs: &mut IndexAndCondition, rhs: &mut IndexAndCondition) {
    if !try_difference_index_and(lhs, rhs) {
        log::trace!("no sound split between AND-conditions");
    }
}

fn prune_once(condition: &mut IndexOrCondition) -> bool {
    let before = condition.len();
    condition.retain(|branch| !matches_nothing(branch));
    if condition.len() != before {
        log::debug!("dropped {} empty OR branches", before - condition.len());
        return true;
    }
    for j in 1..condition.len() {
        for i in 0..j {
            if is_contained_index_and_conditions(&condition[j], &condition[i]) {
                log::debug!("OR branch {} is contained in branch {}", j, i);
                condition.remove(j);
                return true;
            }
            if is_contained_index_and_conditions(&condition[i], &condition[j]) {
                log::debug!("OR branch {} is contained in branch {}", i, j);
                condition.remove(i);
                return true;
            }
            let (head, tail) = condition.split_at_mut(j);
            if try_difference_index_and(&mut head[i], &mut tail[0]) {
                return true;
            }
        }
    }
    false
}

/// Removes OR-branches contained in other branches and splits overlapping
/// ones, so that no index range is scanned twice. Branches that match
/// nothing are dropped. Runs to a fixpoint, so a second call changes
/// nothing.
pub fn remove_overlaps_index_or(condition: &mut IndexOrCondition) {
    while prune_once(condition) {}
}

//! Range extraction from filter expressions.

use crate::ast::{Ast, AstNode, BinaryOp, NodeId};
use crate::range::{
    and_combine_range_map_vecs_bounded, or_combine_range_map_vecs, remove_overlaps_index_or,
    IndexOrCondition, RangeBound, RangeConfig, RangeInfo, RangeMap, RangeMapVec,
};
use alloc::format;
use strata_core::{Error, Result};

/// Walks a filter expression and collects the ranges it implies.
///
/// Supports:
/// - Comparisons `x.a == v`, `x.a < v`, `x.a <= v`, `x.a > v`, `x.a >= v`,
///   with the attribute on either side
/// - `&&` as a bounded AND of the operands' disjunctions
/// - `||` as an OR of the operands' disjunctions
///
/// `None` means the expression yields no range information. The result is
/// always implied by the filter, never the other way round, so it may only
/// narrow an index scan whose rows are filtered afterwards.
pub struct RangeAnalyzer<'a> {
    ast: &'a Ast,
    config: RangeConfig,
}

impl<'a> RangeAnalyzer<'a> {
    /// Creates an analyzer with the default configuration.
    pub fn new(ast: &'a Ast) -> Self {
        Self {
            ast,
            config: RangeConfig::default(),
        }
    }

    /// Creates an analyzer with custom configuration.
    pub fn with_config(ast: &'a Ast, config: RangeConfig) -> Self {
        Self { ast, config }
    }

    pub fn config(&self) -> &RangeConfig {
        &self.config
    }

    /// Analyzes the expression rooted at `node`.
    pub fn analyze(&self, node: NodeId) -> Result<Option<RangeMapVec>> {
        let expr = self
            .ast
            .get(node)
            .ok_or_else(|| Error::invalid_usage(format!("dangling filter node {}", node.index())))?;
        match expr {
            AstNode::BinaryOperator {
                op: BinaryOp::And,
                lhs,
                rhs,
            } => {
                let lhs = self.analyze(*lhs)?;
                let rhs = self.analyze(*rhs)?;
                self.and_combine(lhs, rhs)
            }
            AstNode::BinaryOperator {
                op: BinaryOp::Or,
                lhs,
                rhs,
            } => match (self.analyze(*lhs)?, self.analyze(*rhs)?) {
                (Some(lhs), Some(rhs)) => Ok(Some(or_combine_range_map_vecs(&lhs, &rhs))),
                // an unconstrained alternative makes the whole OR unconstrained
                _ => Ok(None),
            },
            AstNode::BinaryOperator { op, lhs, rhs } if op.is_comparison() => {
                self.analyze_comparison(*op, *lhs, *rhs)
            }
            _ => Ok(None),
        }
    }

    fn and_combine(
        &self,
        lhs: Option<RangeMapVec>,
        rhs: Option<RangeMapVec>,
    ) -> Result<Option<RangeMapVec>> {
        let (lhs, rhs) = match (lhs, rhs) {
            (Some(lhs), Some(rhs)) => (lhs, rhs),
            (known, None) | (None, known) => return Ok(known),
        };
        match and_combine_range_map_vecs_bounded(&lhs, &rhs, &self.config) {
            Ok(combined) => Ok(Some(combined)),
            Err(Error::BranchLimitExceeded { limit, .. }) => {
                log::debug!(
                    "AND exceeds {} branches, keeping the operand with fewer branches",
                    limit
                );
                Ok(Some(if lhs.len() <= rhs.len() { lhs } else { rhs }))
            }
            Err(err) => Err(err),
        }
    }

    fn analyze_comparison(
        &self,
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    ) -> Result<Option<RangeMapVec>> {
        let (op, (variable, attribute), value) = match (
            self.ast.resolve_attribute(lhs),
            self.ast.resolve_attribute(rhs),
        ) {
            (Some(slot), _) if !self.ast.references_variable(rhs, &slot.0) => (op, slot, rhs),
            (_, Some(slot)) if !self.ast.references_variable(lhs, &slot.0) => {
                (op.reversed(), slot, lhs)
            }
            _ => return Ok(None),
        };
        let range = match op {
            BinaryOp::Eq => {
                let bound = RangeBound::from_expression(self.ast, value, true)?;
                RangeInfo::new(variable, attribute, bound.clone(), bound, true)
            }
            BinaryOp::Lt | BinaryOp::Le => {
                let high = RangeBound::from_expression(self.ast, value, op == BinaryOp::Le)?;
                RangeInfo::new(variable, attribute, RangeBound::Undefined, high, false)
            }
            BinaryOp::Gt | BinaryOp::Ge => {
                let low = RangeBound::from_expression(self.ast, value, op == BinaryOp::Ge)?;
                RangeInfo::new(variable, attribute, low, RangeBound::Undefined, false)
            }
            _ => return Ok(None),
        };
        log::trace!("range on {}.{}", range.variable, range.attribute);
        Ok(Some(RangeMapVec::from_map(RangeMap::with_range(range))))
    }
}

/// Projects `ranges` onto an index over `attributes` of `variable` and
/// removes overlapping branches. `None` if the index cannot bound the scan.
pub fn index_or_condition(
    ranges: &RangeMapVec,
    variable: &str,
    attributes: &[&str],
) -> Option<IndexOrCondition> {
    let mut condition = ranges.to_index_or_condition(variable, attributes)?;
    remove_overlaps_index_or(&mut condition);
    Some(condition)
}

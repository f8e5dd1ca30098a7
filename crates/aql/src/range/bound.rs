//! Single-sided bounds of a range.
//!
//! A bound is either absent, a constant value, or an expression that can only
//! be evaluated at execution time. Expression bounds keep a serialized
//! snapshot of the expression and, once known, the handle of the live node in
//! the query's `Ast`.

use crate::ast::{Ast, NodeId};
use core::cmp::Ordering;
use strata_core::{compare_values, Error, JsonObject, JsonValue, Result};

/// Operator a physical index applies for one constant bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexOperatorKind {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl IndexOperatorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IndexOperatorKind::Eq => "==",
            IndexOperatorKind::Lt => "<",
            IndexOperatorKind::Le => "<=",
            IndexOperatorKind::Gt => ">",
            IndexOperatorKind::Ge => ">=",
        }
    }
}

/// A constant condition handed to an index scan.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexOperator {
    pub kind: IndexOperatorKind,
    pub value: JsonValue,
}

impl IndexOperator {
    pub fn new(kind: IndexOperatorKind, value: JsonValue) -> Self {
        Self { kind, value }
    }
}

/// Lower or upper bound of a range.
#[derive(Clone, Debug, Default)]
pub enum RangeBound {
    /// No bound on this side.
    #[default]
    Undefined,
    /// Constant value known at optimization time.
    Constant { value: JsonValue, inclusive: bool },
    /// Expression evaluated at execution time.
    Expression {
        snapshot: JsonValue,
        inclusive: bool,
        node: Option<NodeId>,
    },
}

impl RangeBound {
    /// Creates a constant bound.
    pub fn constant(value: impl Into<JsonValue>, inclusive: bool) -> Self {
        RangeBound::Constant {
            value: value.into(),
            inclusive,
        }
    }

    /// Creates a bound from an expression node: literal nodes become
    /// constants, anything else is snapshotted and remembered.
    pub fn from_expression(ast: &Ast, node: NodeId, inclusive: bool) -> Result<Self> {
        if let Some(value) = ast.literal(node) {
            return Ok(RangeBound::Constant {
                value: value.clone(),
                inclusive,
            });
        }
        Ok(RangeBound::Expression {
            snapshot: ast.to_json(node)?,
            inclusive,
            node: Some(node),
        })
    }

    /// Deserializes `{bound?, include, isConstant}`.
    ///
    /// A missing `bound` yields an undefined bound.
    pub fn from_json(json: &JsonValue) -> Result<Self> {
        let inclusive = json.get_bool("include")?;
        let is_constant = json.get_bool("isConstant")?;
        Ok(match json.get("bound") {
            None => RangeBound::Undefined,
            Some(value) if is_constant => RangeBound::Constant {
                value: value.clone(),
                inclusive,
            },
            Some(snapshot) => RangeBound::Expression {
                snapshot: snapshot.clone(),
                inclusive,
                node: None,
            },
        })
    }

    /// Replaces this bound by a deserialized one.
    pub fn assign_json(&mut self, json: &JsonValue) -> Result<()> {
        *self = RangeBound::from_json(json)?;
        Ok(())
    }

    /// Replaces this bound by one built from an expression node.
    pub fn assign_expression(&mut self, ast: &Ast, node: NodeId, inclusive: bool) -> Result<()> {
        *self = RangeBound::from_expression(ast, node, inclusive)?;
        Ok(())
    }

    /// Replaces this bound by a copy of `other`.
    pub fn assign(&mut self, other: &RangeBound) {
        *self = other.clone();
    }

    pub fn to_json(&self) -> JsonValue {
        let mut obj = JsonObject::new();
        match self {
            RangeBound::Undefined => {}
            RangeBound::Constant { value, .. } => obj.insert("bound", value.clone()),
            RangeBound::Expression { snapshot, .. } => obj.insert("bound", snapshot.clone()),
        }
        obj.insert("include", self.inclusive());
        obj.insert("isConstant", self.is_constant());
        JsonValue::Object(obj)
    }

    #[inline]
    pub fn is_defined(&self) -> bool {
        !matches!(self, RangeBound::Undefined)
    }

    /// Undefined bounds count as constant.
    #[inline]
    pub fn is_constant(&self) -> bool {
        !matches!(self, RangeBound::Expression { .. })
    }

    pub fn inclusive(&self) -> bool {
        match self {
            RangeBound::Undefined => false,
            RangeBound::Constant { inclusive, .. } | RangeBound::Expression { inclusive, .. } => {
                *inclusive
            }
        }
    }

    pub fn set_inclusive(&mut self, value: bool) {
        match self {
            RangeBound::Undefined => {}
            RangeBound::Constant { inclusive, .. } | RangeBound::Expression { inclusive, .. } => {
                *inclusive = value
            }
        }
    }

    /// The serialized bound: the constant value, or the expression snapshot.
    pub fn value(&self) -> Option<&JsonValue> {
        match self {
            RangeBound::Undefined => None,
            RangeBound::Constant { value, .. } => Some(value),
            RangeBound::Expression { snapshot, .. } => Some(snapshot),
        }
    }

    /// The constant value and inclusion flag, if this is a constant bound.
    pub fn as_constant(&self) -> Option<(&JsonValue, bool)> {
        match self {
            RangeBound::Constant { value, inclusive } => Some((value, *inclusive)),
            _ => None,
        }
    }

    /// Replaces `self` by the stronger of `self` and `that`, both read as
    /// lower bounds: the larger value wins, exclusive wins a tie.
    ///
    /// Only constant bounds are combined; expression bounds belong in the
    /// variable lists of a range and leave `self` untouched.
    pub fn and_combine_lower_bounds(&mut self, that: &RangeBound) {
        self.and_combine(that, Ordering::Greater);
    }

    /// Replaces `self` by the stronger of `self` and `that`, both read as
    /// upper bounds: the smaller value wins, exclusive wins a tie.
    pub fn and_combine_upper_bounds(&mut self, that: &RangeBound) {
        self.and_combine(that, Ordering::Less);
    }

    fn and_combine(&mut self, that: &RangeBound, stronger: Ordering) {
        let (other, other_inclusive) = match that {
            RangeBound::Undefined => return,
            RangeBound::Constant { value, inclusive } => (value, *inclusive),
            RangeBound::Expression { .. } => {
                log::trace!("ignoring non-constant bound in constant combination");
                return;
            }
        };
        match self {
            RangeBound::Undefined => *self = that.clone(),
            RangeBound::Constant { value, inclusive } => {
                let cmp = compare_values(other, value);
                if cmp == stronger {
                    *value = other.clone();
                    *inclusive = other_inclusive;
                } else if cmp == Ordering::Equal && !other_inclusive {
                    *inclusive = false;
                }
            }
            RangeBound::Expression { .. } => {
                log::trace!("constant bound not combined into an expression slot");
            }
        }
    }

    /// Returns the live expression node for an expression bound, rebuilding
    /// it from the snapshot the first time; `None` for constant bounds.
    pub fn expression_node(&mut self, ast: &mut Ast) -> Result<Option<NodeId>> {
        match self {
            RangeBound::Undefined | RangeBound::Constant { .. } => Ok(None),
            RangeBound::Expression { node: Some(id), .. } => {
                if !ast.owns(*id) {
                    return Err(Error::invalid_usage(alloc::format!(
                        "cached expression node {} is not part of this query",
                        id.index()
                    )));
                }
                Ok(Some(*id))
            }
            RangeBound::Expression { snapshot, node, .. } => {
                let id = ast.from_json(snapshot)?;
                *node = Some(id);
                Ok(Some(id))
            }
        }
    }

    /// Index operator for a constant bound; `high` selects `<`/`<=` over
    /// `>`/`>=`.
    pub fn to_index_operator(&self, high: bool) -> Result<IndexOperator> {
        let (value, inclusive) = self.as_constant().ok_or_else(|| {
            Error::invalid_usage("index operators require a defined constant bound")
        })?;
        let kind = match (high, inclusive) {
            (true, true) => IndexOperatorKind::Le,
            (true, false) => IndexOperatorKind::Lt,
            (false, true) => IndexOperatorKind::Ge,
            (false, false) => IndexOperatorKind::Gt,
        };
        Ok(IndexOperator::new(kind, value.clone()))
    }
}

// The cached node handle is a lookup shortcut, not part of the constraint.
impl PartialEq for RangeBound {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RangeBound::Undefined, RangeBound::Undefined) => true,
            (
                RangeBound::Constant { value: a, inclusive: ia },
                RangeBound::Constant { value: b, inclusive: ib },
            ) => ia == ib && a == b,
            (
                RangeBound::Expression {
                    snapshot: a,
                    inclusive: ia,
                    ..
                },
                RangeBound::Expression {
                    snapshot: b,
                    inclusive: ib,
                    ..
                },
            ) => ia == ib && a == b,
            _ => false,
        }
    }
}

/// Orders two constant lower bounds by where they start; an undefined bound
/// is minus infinity and, on equal values, inclusive starts first.
pub(crate) fn compare_lower(lhs: &RangeBound, rhs: &RangeBound) -> Ordering {
    match (lhs.as_constant(), rhs.as_constant()) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some((a, ia)), Some((b, ib))) => compare_values(a, b).then(ib.cmp(&ia)),
    }
}

/// Orders two constant upper bounds by where they end; an undefined bound
/// is plus infinity and, on equal values, exclusive ends first.
pub(crate) fn compare_upper(lhs: &RangeBound, rhs: &RangeBound) -> Ordering {
    match (lhs.as_constant(), rhs.as_constant()) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some((a, ia)), Some((b, ib))) => compare_values(a, b).then(ia.cmp(&ib)),
    }
}

/// True if no value can be at or above `low` and at or below `high`.
pub(crate) fn lower_above_upper(low: &RangeBound, high: &RangeBound) -> bool {
    match (low.as_constant(), high.as_constant()) {
        (Some((lv, li)), Some((hv, hi))) => match compare_values(lv, hv) {
            Ordering::Greater => true,
            Ordering::Equal => !(li && hi),
            Ordering::Less => false,
        },
        _ => false,
    }
}

/// The constant bound covering exactly the values beyond `edge`: `<= v`
/// becomes `> v`, `< v` becomes `>= v`.
pub(crate) fn complement(edge: &RangeBound) -> RangeBound {
    match edge.as_constant() {
        Some((value, inclusive)) => RangeBound::constant(value.clone(), !inclusive),
        None => RangeBound::Undefined,
    }
}

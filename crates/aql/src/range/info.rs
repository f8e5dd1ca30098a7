//! Range of one variable attribute.
//!
//! All constant bounds on a side are folded into a single strongest bound
//! (`low_const`/`high_const`). Bounds only known at execution time are kept
//! in `lows`/`highs`; a document matches only if it satisfies every one of
//! them.
//!
//! `valid == false` means the range is known to match nothing.
//! `equality` means the range was given as identical low/high pairs. With
//! expression bounds this is optimistic: two "equal" runtime bounds may still
//! disagree, so `is_1_value_range_info` is a hint, never a guarantee.

use super::bound::{IndexOperator, IndexOperatorKind, RangeBound};
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;
use strata_core::{compare_values, Error, JsonObject, JsonValue, Result};

/// Side of a range a bound applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundSide {
    Low,
    High,
}

/// Constraints on `variable.attribute`.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeInfo {
    /// Query variable name.
    pub variable: String,
    /// Attribute path, dots denote nested access.
    pub attribute: String,
    pub(crate) low_const: RangeBound,
    pub(crate) high_const: RangeBound,
    pub(crate) lows: Vec<RangeBound>,
    pub(crate) highs: Vec<RangeBound>,
    valid: bool,
    defined: bool,
    equality: bool,
}

impl RangeInfo {
    /// Creates a range from a low and a high bound. `equality` should be set
    /// iff the caller knows both bounds are the same expression.
    pub fn new(
        variable: impl Into<String>,
        attribute: impl Into<String>,
        low: RangeBound,
        high: RangeBound,
        equality: bool,
    ) -> Self {
        let mut range = Self::empty(variable, attribute);
        range.equality = equality;
        range.insert_bound(BoundSide::Low, low);
        range.insert_bound(BoundSide::High, high);
        range
    }

    /// Creates an unbounded range.
    pub fn empty(variable: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            attribute: attribute.into(),
            low_const: RangeBound::Undefined,
            high_const: RangeBound::Undefined,
            lows: Vec::new(),
            highs: Vec::new(),
            valid: true,
            defined: true,
            equality: false,
        }
    }

    /// Creates a range that carries no information at all.
    pub fn undefined() -> Self {
        Self {
            valid: false,
            defined: false,
            ..Self::empty(String::new(), String::new())
        }
    }

    /// Adds one bound. Constant bounds are AND-combined into the constant
    /// slot of their side, expression bounds are appended to the side's list.
    pub fn insert_bound(&mut self, side: BoundSide, bound: RangeBound) {
        match (side, bound.is_constant()) {
            (_, true) if !bound.is_defined() => return,
            (BoundSide::Low, true) => self.low_const.and_combine_lower_bounds(&bound),
            (BoundSide::High, true) => self.high_const.and_combine_upper_bounds(&bound),
            (BoundSide::Low, false) => self.lows.push(bound),
            (BoundSide::High, false) => self.highs.push(bound),
        }
        self.check_constant_bounds();
    }

    /// Intersects `that` into `self`; both must describe the same variable
    /// and attribute.
    pub fn fuse(&mut self, that: &RangeInfo) -> Result<()> {
        if self.defined && that.defined && !self.same_slot(that) {
            return Err(Error::invalid_usage(format!(
                "cannot fuse range on {}.{} with range on {}.{}",
                self.variable, self.attribute, that.variable, that.attribute
            )));
        }
        self.intersect(that);
        Ok(())
    }

    /// `fuse` without the slot check, for callers that looked the slot up.
    pub(crate) fn intersect(&mut self, that: &RangeInfo) {
        if !that.defined {
            return;
        }
        if !self.defined {
            *self = that.clone();
            return;
        }
        if !self.valid {
            return;
        }
        if !that.valid {
            self.valid = false;
            return;
        }
        self.low_const.and_combine_lower_bounds(&that.low_const);
        self.lows.extend(that.lows.iter().cloned());
        self.high_const.and_combine_upper_bounds(&that.high_const);
        self.highs.extend(that.highs.iter().cloned());
        // if either side is at most one value, so is the intersection
        self.equality = self.equality || that.equality;
        self.check_constant_bounds();
    }

    fn check_constant_bounds(&mut self) {
        if !self.valid {
            return;
        }
        if let (Some((low, low_inclusive)), Some((high, high_inclusive))) =
            (self.low_const.as_constant(), self.high_const.as_constant())
        {
            match compare_values(low, high) {
                Ordering::Greater => self.valid = false,
                Ordering::Equal if low_inclusive && high_inclusive => self.equality = true,
                Ordering::Equal => self.valid = false,
                Ordering::Less => {}
            }
        }
    }

    pub(crate) fn same_slot(&self, other: &RangeInfo) -> bool {
        self.variable == other.variable && self.attribute == other.attribute
    }

    #[inline]
    pub fn is_defined(&self) -> bool {
        self.defined
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Marks the range as matching nothing.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Drops the equality hint, e.g. after an expression bound was withdrawn.
    pub fn revoke_equality(&mut self) {
        self.equality = false;
    }

    pub fn equality(&self) -> bool {
        self.equality
    }

    /// True if no runtime evaluation is needed to know the matched values.
    pub fn is_constant(&self) -> bool {
        if !self.defined {
            return false;
        }
        !self.valid || (self.lows.is_empty() && self.highs.is_empty())
    }

    /// True if the range is at most a single value. With expression bounds
    /// this may still turn out empty at runtime.
    pub fn is_1_value_range_info(&self) -> bool {
        self.defined && self.valid && self.equality
    }

    pub fn low_const(&self) -> &RangeBound {
        &self.low_const
    }

    pub fn high_const(&self) -> &RangeBound {
        &self.high_const
    }

    pub fn lows(&self) -> &[RangeBound] {
        &self.lows
    }

    pub fn highs(&self) -> &[RangeBound] {
        &self.highs
    }

    /// Mutable access to the runtime lower bounds, e.g. to materialize their
    /// expression nodes.
    pub fn lows_mut(&mut self) -> &mut [RangeBound] {
        &mut self.lows
    }

    pub fn highs_mut(&mut self) -> &mut [RangeBound] {
        &mut self.highs
    }

    /// Index operators for a constant, non-empty range.
    pub fn to_index_operators(&self) -> Result<Vec<IndexOperator>> {
        if !self.is_constant() || !self.valid {
            return Err(Error::invalid_usage(format!(
                "range on {}.{} has no constant index representation",
                self.variable, self.attribute
            )));
        }
        if self.equality {
            if let Some((value, _)) = self.low_const.as_constant() {
                return Ok(alloc::vec![IndexOperator::new(
                    IndexOperatorKind::Eq,
                    value.clone()
                )]);
            }
        }
        let mut ops = Vec::with_capacity(2);
        if self.low_const.is_defined() {
            ops.push(self.low_const.to_index_operator(false)?);
        }
        if self.high_const.is_defined() {
            ops.push(self.high_const.to_index_operator(true)?);
        }
        Ok(ops)
    }

    pub fn to_json(&self) -> JsonValue {
        let bounds = |list: &[RangeBound]| -> JsonValue {
            JsonValue::Array(list.iter().map(RangeBound::to_json).collect())
        };
        JsonValue::Object(
            JsonObject::new()
                .with("variable", self.variable.as_str())
                .with("attribute", self.attribute.as_str())
                .with("lowConst", self.low_const.to_json())
                .with("highConst", self.high_const.to_json())
                .with("lows", bounds(&self.lows))
                .with("highs", bounds(&self.highs))
                .with("valid", self.valid)
                .with("defined", self.defined)
                .with("equality", self.equality),
        )
    }

    pub fn from_json(json: &JsonValue) -> Result<Self> {
        let low_const = RangeBound::from_json(required(json, "lowConst")?)?;
        let high_const = RangeBound::from_json(required(json, "highConst")?)?;
        if !low_const.is_constant() || !high_const.is_constant() {
            return Err(Error::malformed("constant bound slot holds an expression"));
        }
        let expressions = |key: &str| -> Result<Vec<RangeBound>> {
            json.get_array(key)?
                .iter()
                .map(|item| match RangeBound::from_json(item)? {
                    bound @ RangeBound::Expression { .. } => Ok(bound),
                    _ => Err(Error::malformed(format!(
                        "'{}' may only hold expression bounds",
                        key
                    ))),
                })
                .collect()
        };
        Ok(Self {
            variable: json.get_str("variable")?.into(),
            attribute: json.get_str("attribute")?.into(),
            low_const,
            high_const,
            lows: expressions("lows")?,
            highs: expressions("highs")?,
            valid: json.get_bool("valid")?,
            defined: json.get_bool("defined")?,
            equality: json.get_bool("equality")?,
        })
    }

    /// True if both ranges carry identical constraints. Cached expression
    /// handles are ignored.
    pub fn same_constraints(&self, other: &RangeInfo) -> bool {
        self == other
    }

    /// Tightens one constant bound and revalidates.
    pub(crate) fn tighten(&mut self, side: BoundSide, bound: &RangeBound) {
        match side {
            BoundSide::Low => self.low_const.and_combine_lower_bounds(bound),
            BoundSide::High => self.high_const.and_combine_upper_bounds(bound),
        }
        self.check_constant_bounds();
    }
}

fn required<'a>(json: &'a JsonValue, key: &str) -> Result<&'a JsonValue> {
    json.get(key)
        .ok_or_else(|| Error::malformed(format!("missing attribute '{}'", key)))
}

impl fmt::Display for RangeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_json(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Ast;

    fn range(low: Option<(i64, bool)>, high: Option<(i64, bool)>) -> RangeInfo {
        let bound = |b: Option<(i64, bool)>| match b {
            Some((v, inclusive)) => RangeBound::constant(v, inclusive),
            None => RangeBound::Undefined,
        };
        RangeInfo::new("x", "age", bound(low), bound(high), false)
    }

    fn parameter_bound(ast: &mut Ast, name: &str, inclusive: bool) -> RangeBound {
        let node = ast.parameter(name);
        RangeBound::from_expression(ast, node, inclusive).unwrap()
    }

    #[test]
    fn test_insert_bounds_in_sequence() {
        let mut r = RangeInfo::empty("x", "age");
        r.insert_bound(BoundSide::Low, RangeBound::constant(18, true));
        r.insert_bound(BoundSide::High, RangeBound::constant(65, true));

        assert_eq!(r.low_const(), &RangeBound::constant(18, true));
        assert_eq!(r.high_const(), &RangeBound::constant(65, true));
        assert!(r.is_valid());
        assert!(!r.equality());
        assert!(r.is_constant());
    }

    #[test]
    fn test_contradictory_bounds_invalid() {
        let r = range(Some((70, true)), Some((65, true)));
        assert!(!r.is_valid());
        assert!(r.is_constant());
        assert!(!r.is_1_value_range_info());
    }

    #[test]
    fn test_point_range_is_equality() {
        let r = range(Some((30, true)), Some((30, true)));
        assert!(r.is_valid());
        assert!(r.equality());
        assert!(r.is_1_value_range_info());
    }

    #[test]
    fn test_point_with_exclusive_side_invalid() {
        assert!(!range(Some((30, false)), Some((30, true))).is_valid());
        assert!(!range(Some((30, true)), Some((30, false))).is_valid());
    }

    #[test]
    fn test_expression_bounds_kept_apart() {
        let mut ast = Ast::new();
        let mut r = range(Some((1, true)), None);
        r.insert_bound(BoundSide::High, parameter_bound(&mut ast, "max", false));
        r.insert_bound(BoundSide::High, parameter_bound(&mut ast, "cap", true));

        assert_eq!(r.highs().len(), 2);
        assert!(!r.high_const().is_defined());
        assert!(!r.is_constant());
    }

    #[test]
    fn test_invalid_range_is_constant_even_with_expressions() {
        let mut ast = Ast::new();
        let mut r = range(Some((5, true)), Some((1, true)));
        r.insert_bound(BoundSide::Low, parameter_bound(&mut ast, "p", true));
        assert!(!r.is_valid());
        assert!(r.is_constant());
    }

    #[test]
    fn test_fuse_intersects() {
        let mut a = range(Some((0, true)), Some((10, true)));
        let b = range(Some((5, false)), Some((20, true)));
        a.fuse(&b).unwrap();

        assert_eq!(a.low_const(), &RangeBound::constant(5, false));
        assert_eq!(a.high_const(), &RangeBound::constant(10, true));
        assert!(a.is_valid());
    }

    #[test]
    fn test_fuse_detects_empty_intersection() {
        let mut a = range(Some((0, true)), Some((10, true)));
        a.fuse(&range(Some((11, true)), None)).unwrap();
        assert!(!a.is_valid());
    }

    #[test]
    fn test_fuse_with_self_is_idempotent() {
        let mut a = range(Some((0, false)), Some((10, true)));
        let copy = a.clone();
        a.fuse(&copy).unwrap();
        assert_eq!(a, copy);
    }

    #[test]
    fn test_fuse_rejects_other_attribute() {
        let mut a = range(Some((0, true)), None);
        let b = RangeInfo::new("x", "name", RangeBound::Undefined, RangeBound::Undefined, false);
        assert!(matches!(a.fuse(&b), Err(Error::InvalidUsage { .. })));
    }

    #[test]
    fn test_fuse_keeps_equality_hint() {
        let mut ast = Ast::new();
        let eq = parameter_bound(&mut ast, "v", true);
        let mut a = RangeInfo::new("x", "age", eq.clone(), eq, true);
        a.fuse(&range(Some((0, true)), None)).unwrap();
        assert!(a.is_1_value_range_info());
        assert!(!a.is_constant());

        a.revoke_equality();
        assert!(!a.is_1_value_range_info());
        assert!(a.is_valid());
    }

    #[test]
    fn test_fuse_with_undefined_is_neutral() {
        let mut a = range(Some((0, true)), None);
        let before = a.clone();
        a.fuse(&RangeInfo::undefined()).unwrap();
        assert_eq!(a, before);

        let mut u = RangeInfo::undefined();
        u.fuse(&before).unwrap();
        assert_eq!(u, before);
    }

    #[test]
    fn test_clone_is_deep() {
        let mut ast = Ast::new();
        let mut a = range(Some((0, true)), None);
        a.insert_bound(BoundSide::Low, parameter_bound(&mut ast, "p", true));
        let mut b = a.clone();
        b.insert_bound(BoundSide::Low, parameter_bound(&mut ast, "q", true));
        b.insert_bound(BoundSide::High, RangeBound::constant(3, true));

        assert_eq!(a.lows().len(), 1);
        assert!(!a.high_const().is_defined());
    }

    #[test]
    fn test_to_index_operators() {
        let ops = range(Some((1, false)), Some((9, true))).to_index_operators().unwrap();
        assert_eq!(
            ops,
            alloc::vec![
                IndexOperator::new(IndexOperatorKind::Gt, JsonValue::from(1)),
                IndexOperator::new(IndexOperatorKind::Le, JsonValue::from(9)),
            ]
        );

        let ops = range(Some((4, true)), Some((4, true))).to_index_operators().unwrap();
        assert_eq!(ops, alloc::vec![IndexOperator::new(IndexOperatorKind::Eq, JsonValue::from(4))]);

        assert!(range(Some((4, true)), Some((1, true))).to_index_operators().is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let mut ast = Ast::new();
        let mut r = range(Some((0, true)), Some((10, false)));
        r.insert_bound(BoundSide::High, parameter_bound(&mut ast, "max", true));

        let json = r.to_json();
        let restored = RangeInfo::from_json(&json).unwrap();
        assert_eq!(restored, r);
        assert_eq!(
            restored.to_json().to_json_string().unwrap(),
            json.to_json_string().unwrap()
        );
    }

    #[test]
    fn test_display_renders_json() {
        use alloc::string::ToString;

        let r = range(Some((0, true)), Some((10, false)));
        let text = r.to_string();
        assert_eq!(text, r.to_json().to_json_string().unwrap());
        assert!(text.contains(r#""variable":"x""#));
        assert!(text.contains(r#""attribute":"age""#));
    }

    #[test]
    fn test_from_json_rejects_constant_in_variable_list() {
        let r = range(Some((0, true)), None);
        let mut json = r.to_json();
        if let JsonValue::Object(obj) = &mut json {
            obj.insert(
                "lows",
                JsonValue::Array(alloc::vec![RangeBound::constant(1, true).to_json()]),
            );
        }
        assert!(matches!(
            RangeInfo::from_json(&json),
            Err(Error::MalformedData { .. })
        ));
    }
}

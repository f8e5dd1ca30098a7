//! Conjunction of per-attribute ranges.

use super::bound::RangeBound;
use super::info::RangeInfo;
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use hashbrown::HashSet;
use strata_core::{Error, JsonObject, JsonValue, Result};

/// Ranges of one variable, keyed by attribute path.
pub type AttributeRanges = BTreeMap<String, RangeInfo>;

/// One AND-branch: `variable -> attribute -> RangeInfo`.
///
/// Inserting into an occupied slot intersects the ranges instead of
/// replacing the existing one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RangeMap {
    ranges: BTreeMap<String, AttributeRanges>,
}

impl RangeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a map holding a single range.
    pub fn with_range(range: RangeInfo) -> Self {
        let mut map = Self::new();
        map.insert_range(range);
        map
    }

    /// Creates a map holding a single range built from two bounds.
    pub fn from_bounds(
        variable: &str,
        attribute: &str,
        low: RangeBound,
        high: RangeBound,
        equality: bool,
    ) -> Self {
        Self::with_range(RangeInfo::new(variable, attribute, low, high, equality))
    }

    /// Builds a range from `low` and `high` and ANDs it into the slot.
    pub fn insert(
        &mut self,
        variable: &str,
        attribute: &str,
        low: RangeBound,
        high: RangeBound,
        equality: bool,
    ) {
        self.insert_range(RangeInfo::new(variable, attribute, low, high, equality));
    }

    /// ANDs `range` into the slot of its variable and attribute.
    pub fn insert_range(&mut self, range: RangeInfo) {
        let attributes = self.ranges.entry(range.variable.clone()).or_default();
        match attributes.get_mut(&range.attribute) {
            Some(existing) => {
                log::trace!(
                    "intersecting range on {}.{}",
                    range.variable,
                    range.attribute
                );
                existing.intersect(&range);
            }
            None => {
                attributes.insert(range.attribute.clone(), range);
            }
        }
    }

    pub fn find_variable(&self, variable: &str) -> Option<&AttributeRanges> {
        self.ranges.get(variable)
    }

    pub fn find(&self, variable: &str, attribute: &str) -> Option<&RangeInfo> {
        self.ranges.get(variable)?.get(attribute)
    }

    pub fn find_mut(&mut self, variable: &str, attribute: &str) -> Option<&mut RangeInfo> {
        self.ranges.get_mut(variable)?.get_mut(attribute)
    }

    /// Removes a slot. A variable without attributes is removed as well.
    pub fn erase(&mut self, variable: &str, attribute: &str) -> Option<RangeInfo> {
        let attributes = self.ranges.get_mut(variable)?;
        let removed = attributes.remove(attribute);
        if attributes.is_empty() {
            self.ranges.remove(variable);
        }
        removed
    }

    /// Drops every range of `variable` that is invalid or undefined.
    pub fn erase_empty_or_undefined(&mut self, variable: &str) {
        if let Some(attributes) = self.ranges.get_mut(variable) {
            attributes.retain(|_, range| range.is_valid() && range.is_defined());
            if attributes.is_empty() {
                self.ranges.remove(variable);
            }
        }
    }

    /// True if every range of `variable` is valid. Vacuously true for an
    /// unmapped variable.
    pub fn is_valid(&self, variable: &str) -> bool {
        self.ranges
            .get(variable)
            .map_or(true, |attributes| attributes.values().all(RangeInfo::is_valid))
    }

    /// True if some range in the map is known to match nothing, which makes
    /// the whole conjunction empty.
    pub fn is_statically_empty(&self) -> bool {
        self.iter().any(|range| !range.is_valid() && range.is_defined())
    }

    pub fn attributes(&self, variable: &str) -> HashSet<String> {
        self.ranges
            .get(variable)
            .map(|attributes| attributes.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn variables(&self) -> HashSet<String> {
        self.ranges.keys().cloned().collect()
    }

    /// Number of ranges over all variables.
    pub fn len(&self) -> usize {
        self.ranges.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Iterates ranges ordered by variable, then attribute.
    pub fn iter(&self) -> impl Iterator<Item = &RangeInfo> {
        self.ranges.values().flat_map(BTreeMap::values)
    }

    /// True if both maps carry identical constraints.
    pub fn same_constraints(&self, other: &RangeMap) -> bool {
        self == other
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::Array(
            self.iter()
                .map(|range| {
                    JsonValue::Object(
                        JsonObject::new()
                            .with("variable", range.variable.as_str())
                            .with("attribute", range.attribute.as_str())
                            .with("range", range.to_json()),
                    )
                })
                .collect(),
        )
    }

    pub fn from_json(json: &JsonValue) -> Result<Self> {
        let records = json
            .as_array()
            .ok_or_else(|| Error::malformed("range map must be an array"))?;
        let mut map = Self::new();
        for record in records {
            let variable = record.get_str("variable")?;
            let attribute = record.get_str("attribute")?;
            let range = RangeInfo::from_json(
                record
                    .get("range")
                    .ok_or_else(|| Error::malformed("missing attribute 'range'"))?,
            )?;
            if range.variable != variable || range.attribute != attribute {
                return Err(Error::malformed(format!(
                    "record for {}.{} holds range on {}.{}",
                    variable, attribute, range.variable, range.attribute
                )));
            }
            map.insert_range(range);
        }
        Ok(map)
    }

    /// Ranges of `variable` ordered by the given attribute list, stopping at
    /// the first attribute without a range.
    pub(crate) fn prefix(&self, variable: &str, attributes: &[&str]) -> Vec<RangeInfo> {
        let Some(ranges) = self.ranges.get(variable) else {
            return Vec::new();
        };
        attributes
            .iter()
            .map_while(|attribute| ranges.get(*attribute).cloned())
            .collect()
    }
}

/// Returns a new map with every range of `lhs` and every range of `rhs`
/// ANDed on top.
pub fn and_combine_range_maps(lhs: &RangeMap, rhs: &RangeMap) -> RangeMap {
    let mut combined = lhs.clone();
    for range in rhs.iter() {
        combined.insert_range(range.clone());
    }
    combined
}

impl fmt::Display for RangeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_json(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ge(v: i64) -> RangeBound {
        RangeBound::constant(v, true)
    }

    fn le(v: i64) -> RangeBound {
        RangeBound::constant(v, true)
    }

    #[test]
    fn test_insert_low_then_high() {
        let mut map = RangeMap::new();
        map.insert("x", "age", ge(18), RangeBound::Undefined, false);
        map.insert("x", "age", RangeBound::Undefined, le(65), false);

        let range = map.find("x", "age").unwrap();
        assert_eq!(range.low_const(), &RangeBound::constant(18, true));
        assert_eq!(range.high_const(), &RangeBound::constant(65, true));
        assert!(range.is_valid());
        assert!(!range.equality());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_insert_contradiction() {
        let mut map = RangeMap::new();
        map.insert("x", "age", ge(70), RangeBound::Undefined, false);
        map.insert("x", "age", RangeBound::Undefined, le(65), false);

        assert!(!map.find("x", "age").unwrap().is_valid());
        assert!(!map.is_valid("x"));
        assert!(map.is_statically_empty());
    }

    #[test]
    fn test_insert_equality_from_two_sides() {
        let mut map = RangeMap::new();
        map.insert("x", "age", ge(30), RangeBound::Undefined, false);
        map.insert("x", "age", RangeBound::Undefined, le(30), false);

        let range = map.find("x", "age").unwrap();
        assert!(range.is_valid());
        assert!(range.equality());
        assert!(range.is_1_value_range_info());
    }

    #[test]
    fn test_find_absent() {
        let map = RangeMap::from_bounds("x", "a", ge(1), le(2), false);
        assert!(map.find("y", "a").is_none());
        assert!(map.find("x", "b").is_none());
        assert!(map.find_variable("y").is_none());
        assert!(map.is_valid("y"));
    }

    #[test]
    fn test_introspection() {
        let mut map = RangeMap::new();
        map.insert("x", "a", ge(1), RangeBound::Undefined, false);
        map.insert("x", "b.c", ge(1), RangeBound::Undefined, false);
        map.insert("y", "a", ge(1), RangeBound::Undefined, false);

        let attrs = map.attributes("x");
        assert_eq!(attrs.len(), 2);
        assert!(attrs.contains("a") && attrs.contains("b.c"));
        assert!(map.attributes("z").is_empty());

        let vars = map.variables();
        assert_eq!(vars.len(), 2);
        assert!(vars.contains("x") && vars.contains("y"));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_erase() {
        let mut map = RangeMap::from_bounds("x", "a", ge(1), le(2), false);
        map.insert("x", "b", ge(1), le(2), false);

        assert!(map.erase("x", "a").is_some());
        assert!(map.erase("x", "a").is_none());
        assert!(map.erase("x", "b").is_some());
        assert!(map.is_empty());
        assert!(map.variables().is_empty());
    }

    #[test]
    fn test_erase_empty_or_undefined() {
        let mut map = RangeMap::new();
        map.insert("x", "a", ge(5), le(1), false);
        map.insert("x", "b", ge(1), le(5), false);
        map.insert_range(RangeInfo::undefined());

        map.erase_empty_or_undefined("x");
        assert!(map.find("x", "a").is_none());
        assert!(map.find("x", "b").is_some());

        map.erase_empty_or_undefined("");
        assert!(map.find_variable("").is_none());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_and_combine_is_pure() {
        let a = RangeMap::from_bounds("x", "a", ge(0), le(10), false);
        let mut b = RangeMap::from_bounds("x", "a", ge(5), RangeBound::Undefined, false);
        b.insert("y", "b", ge(1), RangeBound::Undefined, false);

        let combined = and_combine_range_maps(&a, &b);
        let range = combined.find("x", "a").unwrap();
        assert_eq!(range.low_const(), &RangeBound::constant(5, true));
        assert_eq!(range.high_const(), &RangeBound::constant(10, true));
        assert!(combined.find("y", "b").is_some());

        assert_eq!(a.find("x", "a").unwrap().low_const(), &RangeBound::constant(0, true));
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn test_and_with_self_is_idempotent() {
        let a = RangeMap::from_bounds("x", "a", RangeBound::constant(0, false), le(10), false);
        assert!(and_combine_range_maps(&a, &a).same_constraints(&a));
    }

    #[test]
    fn test_prefix_stops_at_gap() {
        let mut map = RangeMap::new();
        map.insert("x", "a", ge(1), RangeBound::Undefined, false);
        map.insert("x", "c", ge(1), RangeBound::Undefined, false);

        let prefix = map.prefix("x", &["a", "b", "c"]);
        assert_eq!(prefix.len(), 1);
        assert_eq!(prefix[0].attribute, "a");
        assert!(map.prefix("x", &["b"]).is_empty());
        assert!(map.prefix("y", &["a"]).is_empty());
    }

    #[test]
    fn test_json_round_trip() {
        let mut map = RangeMap::new();
        map.insert("x", "a", ge(1), RangeBound::constant(4, false), false);
        map.insert("y", "name", RangeBound::constant("b", true), RangeBound::constant("b", true), true);

        let json = map.to_json();
        let restored = RangeMap::from_json(&json).unwrap();
        assert!(restored.same_constraints(&map));
        assert_eq!(
            restored.to_json().to_json_string().unwrap(),
            json.to_json_string().unwrap()
        );
    }

    #[test]
    fn test_display_renders_json() {
        use alloc::string::ToString;

        let map = RangeMap::from_bounds("x", "a", ge(1), le(2), false);
        assert_eq!(map.to_string(), map.to_json().to_json_string().unwrap());
        assert_eq!(RangeMap::new().to_string(), "[]");
    }

    #[test]
    fn test_from_json_rejects_mismatched_record() {
        let map = RangeMap::from_bounds("x", "a", ge(1), le(2), false);
        let mut json = map.to_json();
        if let JsonValue::Array(records) = &mut json {
            if let JsonValue::Object(record) = &mut records[0] {
                record.insert("attribute", "b");
            }
        }
        assert!(matches!(
            RangeMap::from_json(&json),
            Err(Error::MalformedData { .. })
        ));
        assert!(RangeMap::from_json(&JsonValue::Null).is_err());
    }
}

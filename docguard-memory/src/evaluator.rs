//! Selector evaluation and collation for in-memory document filtering.
//!
//! This module provides the evaluation engine for [`Expr`] trees, and the ordering
//! used to sort query results.

use serde_json::{Map, Value};
use std::{cmp::Ordering, collections::BTreeMap};

use docguard_core::error::StoreError;

use crate::selector::{Expr, FieldOp, QueryVisitor, Sort, SortDirection};

/// Borrowed, comparable view of a JSON value.
///
/// Numbers are normalized to `f64`. Ordering between two values of the same kind is
/// partial, the way range operators need it; [`Comparable::collate`] adds a total
/// order across kinds for sorting.
#[derive(Debug, PartialEq)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(BTreeMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Value> for Comparable<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => Comparable::Null,
            Value::Bool(value) => Comparable::Bool(*value),
            Value::Number(value) => value
                .as_f64()
                .map(Comparable::Number)
                .unwrap_or(Comparable::Null),
            Value::String(value) => Comparable::String(value),
            Value::Array(array) => Comparable::Array(array.iter().map(Comparable::from).collect()),
            Value::Object(object) => Comparable::Map(
                object
                    .iter()
                    .map(|(key, value)| (key.as_str(), Comparable::from(value)))
                    .collect(),
            ),
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl Comparable<'_> {
    /// Position of the value's kind in the collation order:
    /// null, booleans, numbers, strings, arrays, objects.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Bool(_) => 1,
            Comparable::Number(_) => 2,
            Comparable::String(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::Map(_) => 5,
        }
    }

    /// Total order used to sort query results.
    pub(crate) fn collate(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Array(a), Comparable::Array(b)) => a
                .iter()
                .zip(b)
                .map(|(left, right)| left.collate(right))
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (Comparable::Map(a), Comparable::Map(b)) => a
                .iter()
                .zip(b)
                .map(|((left_key, left), (right_key, right))| {
                    left_key.cmp(right_key).then_with(|| left.collate(right))
                })
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            _ => self
                .rank()
                .cmp(&other.rank())
                .then_with(|| self.partial_cmp(other).unwrap_or(Ordering::Equal)),
        }
    }
}

/// Resolves a dotted path such as `author.name` inside a document body.
pub(crate) fn lookup<'a>(body: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = body.get(segments.next()?)?;

    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }

    Some(current)
}

/// Compares two document bodies by a list of sort keys. Missing fields sort first.
pub(crate) fn compare_by(sort: &[Sort], a: &Map<String, Value>, b: &Map<String, Value>) -> Ordering {
    sort.iter()
        .map(|key| {
            let left = lookup(a, &key.field).map(Comparable::from).unwrap_or(Comparable::Null);
            let right = lookup(b, &key.field).map(Comparable::from).unwrap_or(Comparable::Null);

            match key.direction {
                SortDirection::Asc => left.collate(&right),
                SortDirection::Desc => right.collate(&left),
            }
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

pub(crate) struct DocumentEvaluator<'a> {
    body: &'a Map<String, Value>,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(body: &'a Map<String, Value>) -> Self {
        Self { body }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<bool, StoreError> {
        self.visit_expr(expr)
    }

    /// Evaluates `expr` against one document body.
    pub fn matches(body: &'a Map<String, Value>, expr: &Expr) -> Result<bool, StoreError> {
        DocumentEvaluator::new(body).evaluate(expr)
    }
}

fn is_member(field_value: &Comparable<'_>, values: &Comparable<'_>) -> bool {
    match (field_value, values) {
        (Comparable::Array(array), Comparable::Array(values)) => {
            values.iter().any(|value| array.contains(value))
        }
        (single_value, Comparable::Array(values)) => values.contains(single_value),
        _ => false,
    }
}

impl QueryVisitor for DocumentEvaluator<'_> {
    type Output = bool;
    type Error = StoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(lookup(self.body, field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: FieldOp, value: &Value) -> Result<Self::Output, Self::Error> {
        let Some(field_value) = lookup(self.body, field) else {
            return Ok(false);
        };

        let left = Comparable::from(field_value);
        let right = Comparable::from(value);

        Ok(match op {
            FieldOp::Eq => left == right,
            FieldOp::Ne => left != right,
            FieldOp::Gt => left.partial_cmp(&right) == Some(Ordering::Greater),
            FieldOp::Gte => matches!(
                left.partial_cmp(&right),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FieldOp::Lt => left.partial_cmp(&right) == Some(Ordering::Less),
            FieldOp::Lte => matches!(
                left.partial_cmp(&right),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FieldOp::In => is_member(&left, &right),
            FieldOp::NotIn => !is_member(&left, &right),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::MangoQuery;
    use serde_json::json;

    fn body(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(body) => body,
            _ => panic!("fixture must be an object"),
        }
    }

    fn matches(selector: Value, doc: Value) -> bool {
        let query = MangoQuery::parse(&json!({ "selector": selector })).unwrap();
        DocumentEvaluator::matches(&body(doc), &query.selector).unwrap()
    }

    #[test]
    fn range_operators_compare_same_kinds_only() {
        let doc = json!({ "year": 2021, "title": "b" });

        assert!(matches(json!({ "year": { "$gt": 2020 } }), doc.clone()));
        assert!(matches(json!({ "year": { "$gte": 2021, "$lt": 2022 } }), doc.clone()));
        assert!(matches(json!({ "title": { "$lte": "b" } }), doc.clone()));
        assert!(!matches(json!({ "year": { "$gt": "2020" } }), doc));
    }

    #[test]
    fn integers_and_floats_are_equal() {
        assert!(matches(json!({ "n": 1.0 }), json!({ "n": 1 })));
    }

    #[test]
    fn membership() {
        let doc = json!({ "status": "draft", "tags": ["rust", "db"] });

        assert!(matches(json!({ "status": { "$in": ["draft", "published"] } }), doc.clone()));
        assert!(matches(json!({ "tags": { "$in": ["db"] } }), doc.clone()));
        assert!(matches(json!({ "tags": { "$nin": ["go"] } }), doc.clone()));
        assert!(!matches(json!({ "status": { "$nin": ["draft"] } }), doc));
    }

    #[test]
    fn missing_fields_never_compare() {
        let doc = json!({ "title": "x" });

        assert!(!matches(json!({ "year": { "$ne": 1 } }), doc.clone()));
        assert!(matches(json!({ "year": { "$exists": false } }), doc.clone()));
        assert!(matches(json!({ "$not": { "year": 1 } }), doc));
    }

    #[test]
    fn dotted_paths_reach_nested_fields() {
        let doc = json!({ "author": { "name": "ann" } });

        assert!(matches(json!({ "author.name": "ann" }), doc.clone()));
        assert!(matches(json!({ "author": { "name": { "$exists": true } } }), doc.clone()));
        assert!(!matches(json!({ "author.name.first": "ann" }), doc));
    }

    #[test]
    fn collation_orders_kinds() {
        let values = [json!(null), json!(false), json!(true), json!(-1), json!(3), json!("a"), json!([1]), json!({})];

        for pair in values.windows(2) {
            assert_eq!(
                Comparable::from(&pair[0]).collate(&Comparable::from(&pair[1])),
                Ordering::Less,
                "{} < {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn sorts_by_multiple_keys() {
        let sort = vec![
            Sort { field: "a".into(), direction: SortDirection::Asc },
            Sort { field: "b".into(), direction: SortDirection::Desc },
        ];
        let first = body(json!({ "a": 1, "b": 2 }));
        let second = body(json!({ "a": 1, "b": 1 }));

        assert_eq!(compare_by(&sort, &first, &second), Ordering::Less);
        assert_eq!(compare_by(&sort, &second, &body(json!({ "a": 0 }))), Ordering::Greater);
    }
}

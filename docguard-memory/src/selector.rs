//! Mango-style query parsing for the in-memory store.
//!
//! Queries reach the store as raw JSON, the way a CouchDB `_find` request would send
//! them. This module turns one into a [`MangoQuery`]: a filter [`Expr`] tree plus
//! `limit`, `skip` and `sort`. Evaluation of the tree lives in
//! [`evaluator`](crate::evaluator).
//!
//! # Supported selector syntax
//!
//! - Implicit equality: `{ "title": "hello" }`
//! - Field operators: `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`, `$nin`, `$exists`
//! - Combinators: `$and`, `$or` (arrays of selectors), `$not` (one selector)
//! - Nested fields, either dotted (`"author.name"`) or as nested objects
//!
//! ```ignore
//! use docguard_memory::selector::MangoQuery;
//! use serde_json::json;
//!
//! let query = MangoQuery::parse(&json!({
//!     "selector": { "year": { "$gte": 2020 }, "tags": { "$in": ["rust"] } },
//!     "sort": [{ "year": "desc" }],
//!     "limit": 10
//! }))?;
//! ```

use serde_json::{Map, Value};

use docguard_core::error::{StoreError, StoreResult};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Sort specification for query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// Dotted path of the field to sort by.
    pub field: String,
    pub direction: SortDirection,
}

/// Field comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// The field equals one of the values, or an array field shares one with them.
    In,
    /// Negation of [`FieldOp::In`] for fields that exist.
    NotIn,
}

impl FieldOp {
    fn from_operator(operator: &str) -> Option<Self> {
        Some(match operator {
            "$eq" => FieldOp::Eq,
            "$ne" => FieldOp::Ne,
            "$gt" => FieldOp::Gt,
            "$gte" => FieldOp::Gte,
            "$lt" => FieldOp::Lt,
            "$lte" => FieldOp::Lte,
            "$in" => FieldOp::In,
            "$nin" => FieldOp::NotIn,
            _ => return None,
        })
    }
}

/// A filter expression over documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// All expressions must match. An empty list matches everything.
    And(Vec<Expr>),
    /// Any expression must match.
    Or(Vec<Expr>),
    Not(Box<Expr>),
    /// Checks whether a field is present.
    Exists(String, bool),
    Field {
        /// Dotted path of the field to compare.
        field: String,
        op: FieldOp,
        value: Value,
    },
}

impl Expr {
    pub fn field(field: impl Into<String>, op: FieldOp, value: Value) -> Self {
        Expr::Field {
            field: field.into(),
            op,
            value,
        }
    }

    /// Collapses a list of conditions, avoiding a one-element `And`.
    fn all(mut exprs: Vec<Expr>) -> Self {
        if exprs.len() == 1 {
            exprs.remove(0)
        } else {
            Expr::And(exprs)
        }
    }
}

/// Walks an [`Expr`] tree; implemented by the evaluator.
pub trait QueryVisitor {
    type Output;
    type Error: Into<StoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error>;
    fn visit_field(&mut self, field: &str, op: FieldOp, value: &Value) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, *op, value),
        }
    }
}

/// A parsed `_find` request.
#[derive(Debug, Clone, PartialEq)]
pub struct MangoQuery {
    pub selector: Expr,
    pub limit: Option<usize>,
    pub skip: usize,
    pub sort: Vec<Sort>,
}

impl Default for MangoQuery {
    fn default() -> Self {
        Self {
            selector: Expr::And(Vec::new()),
            limit: None,
            skip: 0,
            sort: Vec::new(),
        }
    }
}

impl MangoQuery {
    /// Parses a raw query. Keys other than `selector`, `limit`, `skip` and `sort`
    /// are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidQuery`] if the query is not an object or any of
    /// the recognized keys is malformed.
    pub fn parse(query: &Value) -> StoreResult<Self> {
        let query = query
            .as_object()
            .ok_or_else(|| invalid("query must be a JSON object"))?;

        let selector = match query.get("selector") {
            Some(Value::Object(selector)) => parse_selector(selector, None)?,
            Some(Value::Null) | None => Expr::And(Vec::new()),
            Some(_) => return Err(invalid("selector must be a JSON object")),
        };

        Ok(Self {
            selector,
            limit: query.get("limit").map(|limit| count(limit, "limit")).transpose()?,
            skip: query
                .get("skip")
                .map(|skip| count(skip, "skip"))
                .transpose()?
                .unwrap_or(0),
            sort: match query.get("sort") {
                Some(sort) => parse_sort(sort)?,
                None => Vec::new(),
            },
        })
    }
}

fn invalid(message: impl Into<String>) -> StoreError {
    StoreError::InvalidQuery(message.into())
}

fn count(value: &Value, key: &str) -> StoreResult<usize> {
    value
        .as_u64()
        .and_then(|count| usize::try_from(count).ok())
        .ok_or_else(|| invalid(format!("{key} must be a non-negative integer")))
}

fn join_path(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}.{key}"),
        None => key.to_string(),
    }
}

/// Parses a selector object. `path` is set when the object is nested under a field.
fn parse_selector(selector: &Map<String, Value>, path: Option<&str>) -> StoreResult<Expr> {
    let mut conditions = Vec::with_capacity(selector.len());

    for (key, value) in selector {
        let condition = match (key.as_str(), path) {
            ("$and", None) => Expr::And(parse_selector_list(key, value)?),
            ("$or", None) => Expr::Or(parse_selector_list(key, value)?),
            ("$not", None) => match value {
                Value::Object(inner) => Expr::Not(Box::new(parse_selector(inner, None)?)),
                _ => return Err(invalid("$not expects a selector object")),
            },
            (operator, Some(field)) if operator.starts_with('$') => {
                parse_operator(field, operator, value)?
            }
            (operator, None) if operator.starts_with('$') => {
                return Err(invalid(format!("unsupported operator '{operator}'")));
            }
            (name, _) => {
                let field = join_path(path, name);
                match value {
                    Value::Object(inner) => parse_selector(inner, Some(&field))?,
                    _ => Expr::field(field, FieldOp::Eq, value.clone()),
                }
            }
        };

        conditions.push(condition);
    }

    Ok(Expr::all(conditions))
}

fn parse_selector_list(operator: &str, value: &Value) -> StoreResult<Vec<Expr>> {
    let selectors = value
        .as_array()
        .ok_or_else(|| invalid(format!("{operator} expects an array of selectors")))?;

    selectors
        .iter()
        .map(|selector| match selector {
            Value::Object(selector) => parse_selector(selector, None),
            _ => Err(invalid(format!("{operator} expects an array of selectors"))),
        })
        .collect()
}

fn parse_operator(field: &str, operator: &str, value: &Value) -> StoreResult<Expr> {
    if operator == "$exists" {
        return match value {
            Value::Bool(should_exist) => Ok(Expr::Exists(field.to_string(), *should_exist)),
            _ => Err(invalid("$exists expects a boolean")),
        };
    }

    let op = FieldOp::from_operator(operator)
        .ok_or_else(|| invalid(format!("unsupported operator '{operator}'")))?;

    if matches!(op, FieldOp::In | FieldOp::NotIn) && !value.is_array() {
        return Err(invalid(format!("{operator} expects an array")));
    }

    Ok(Expr::field(field, op, value.clone()))
}

/// Accepts `["field", { "other": "desc" }]`.
fn parse_sort(sort: &Value) -> StoreResult<Vec<Sort>> {
    let fields = sort
        .as_array()
        .ok_or_else(|| invalid("sort must be an array"))?;

    fields
        .iter()
        .map(|entry| match entry {
            Value::String(field) => Ok(Sort {
                field: field.clone(),
                direction: SortDirection::Asc,
            }),
            Value::Object(keyed) if keyed.len() == 1 => {
                let (field, direction) = keyed
                    .iter()
                    .next()
                    .ok_or_else(|| invalid("empty sort entry"))?;
                let direction = match direction.as_str() {
                    Some("asc") => SortDirection::Asc,
                    Some("desc") => SortDirection::Desc,
                    _ => return Err(invalid(format!("invalid sort direction for '{field}'"))),
                };

                Ok(Sort {
                    field: field.clone(),
                    direction,
                })
            }
            _ => Err(invalid("sort entries must be a field name or a single-key object")),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn selector(value: Value) -> Expr {
        MangoQuery::parse(&json!({ "selector": value })).unwrap().selector
    }

    #[test]
    fn implicit_equality() {
        assert_eq!(
            selector(json!({ "title": "hello" })),
            Expr::field("title", FieldOp::Eq, json!("hello"))
        );
    }

    #[test]
    fn nested_objects_become_dotted_paths() {
        assert_eq!(
            selector(json!({ "author": { "name": "ann", "age": { "$gt": 30 } } })),
            Expr::And(vec![
                Expr::field("author.age", FieldOp::Gt, json!(30)),
                Expr::field("author.name", FieldOp::Eq, json!("ann")),
            ])
        );
    }

    #[test]
    fn combinators() {
        assert_eq!(
            selector(json!({
                "$or": [{ "a": 1 }, { "b": { "$exists": false } }],
                "$not": { "c": { "$in": [1, 2] } }
            })),
            Expr::And(vec![
                Expr::Not(Box::new(Expr::field("c", FieldOp::In, json!([1, 2])))),
                Expr::Or(vec![
                    Expr::field("a", FieldOp::Eq, json!(1)),
                    Expr::Exists("b".into(), false),
                ]),
            ])
        );
    }

    #[test]
    fn missing_selector_matches_everything() {
        let query = MangoQuery::parse(&json!({ "limit": 2, "skip": 1 })).unwrap();

        assert_eq!(query.selector, Expr::And(Vec::new()));
        assert_eq!(query.limit, Some(2));
        assert_eq!(query.skip, 1);
    }

    #[test]
    fn parses_sort() {
        let query = MangoQuery::parse(&json!({ "sort": ["a", { "b": "desc" }] })).unwrap();

        assert_eq!(
            query.sort,
            vec![
                Sort { field: "a".into(), direction: SortDirection::Asc },
                Sort { field: "b".into(), direction: SortDirection::Desc },
            ]
        );
    }

    #[test]
    fn rejects_malformed_queries() {
        for query in [
            json!([]),
            json!({ "selector": [] }),
            json!({ "selector": { "$where": "1" } }),
            json!({ "selector": { "a": { "$regex": "x" } } }),
            json!({ "selector": { "a": { "$in": 1 } } }),
            json!({ "selector": { "a": { "$exists": "yes" } } }),
            json!({ "selector": { "$and": {} } }),
            json!({ "limit": -1 }),
            json!({ "sort": [{ "a": "up" }] }),
        ] {
            assert!(
                matches!(MangoQuery::parse(&query), Err(StoreError::InvalidQuery(_))),
                "{query} should be rejected"
            );
        }
    }
}

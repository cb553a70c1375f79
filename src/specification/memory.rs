//! In-memory translation: specifications evaluated against plain collections.

use super::schema::lookup;
use super::{
    CompareOp, OrderKey, Predicate, Queryable, SortDirection, Specification,
    SpecificationTranslator,
};
use crate::error::Result;
use serde_json::Value;
use std::cmp::Ordering;

/// Translator for pure in-memory stores.
///
/// Includes are validated against the schema but load nothing: in-memory aggregates
/// already hold their related data.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryTranslator;

impl<T: Queryable> SpecificationTranslator<T> for MemoryTranslator {
    type Source = Vec<T>;
    type Query = MemoryQuery<T>;

    fn translate(&self, spec: &Specification<T>, source: Vec<T>) -> Result<MemoryQuery<T>> {
        spec.validate()?;

        Ok(MemoryQuery {
            items: source,
            filter: spec.filter().cloned(),
            ordering: spec.ordering(),
            skip: spec.skip(),
            take: spec.take(),
        })
    }
}

/// Deferred in-memory query: nothing is evaluated until [`execute`](MemoryQuery::execute)
/// or [`count`](MemoryQuery::count).
#[derive(Debug)]
pub struct MemoryQuery<T> {
    items: Vec<T>,
    filter: Option<Predicate>,
    ordering: Vec<OrderKey>,
    skip: Option<usize>,
    take: Option<usize>,
}

impl<T: Queryable> MemoryQuery<T> {
    /// Filter, stable-sort, then page.
    ///
    /// # Errors
    /// Returns `Error::Translation` if an item cannot be viewed as a document
    pub fn execute(self) -> Result<Vec<T>> {
        let mut rows = filtered(self.items, self.filter.as_ref())?;

        if !self.ordering.is_empty() {
            // sort_by is stable: rows equal on every key keep source order.
            rows.sort_by(|(a, _), (b, _)| compare_documents(a, b, &self.ordering));
        }

        let skip = self.skip.unwrap_or(0);
        let take = self.take.unwrap_or(usize::MAX);
        Ok(rows
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|(_, item)| item)
            .collect())
    }

    /// Number of items matching the filter, ignoring paging.
    ///
    /// # Errors
    /// Returns `Error::Translation` if an item cannot be viewed as a document
    pub fn count(self) -> Result<usize> {
        Ok(filtered(self.items, self.filter.as_ref())?.len())
    }
}

fn filtered<T: Queryable>(items: Vec<T>, filter: Option<&Predicate>) -> Result<Vec<(Value, T)>> {
    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        let doc = item.to_document()?;
        if filter.map_or(true, |p| matches(&doc, p)) {
            rows.push((doc, item));
        }
    }
    Ok(rows)
}

fn compare_documents(a: &Value, b: &Value, ordering: &[OrderKey]) -> Ordering {
    for key in ordering {
        let left = lookup(a, &key.field).unwrap_or(&Value::Null);
        let right = lookup(b, &key.field).unwrap_or(&Value::Null);
        let ord = match key.direction {
            SortDirection::Ascending => compare_values(left, right),
            SortDirection::Descending => compare_values(right, left),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Evaluate a predicate against a document.
pub fn matches(doc: &Value, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Compare { field, op, value } => {
            let actual = lookup(doc, field).unwrap_or(&Value::Null);
            compare_op(actual, *op, value)
        }
        Predicate::Contains { field, value } => match lookup(doc, field) {
            Some(Value::String(s)) => s.contains(value.as_str()),
            Some(Value::Array(items)) => items.iter().any(|v| v.as_str() == Some(value.as_str())),
            _ => false,
        },
        Predicate::StartsWith { field, value } => match lookup(doc, field) {
            Some(Value::String(s)) => s.starts_with(value.as_str()),
            _ => false,
        },
        Predicate::In { field, values } => {
            let actual = lookup(doc, field).unwrap_or(&Value::Null);
            values.iter().any(|v| values_equal(actual, v))
        }
        Predicate::IsNull { field } => lookup(doc, field).map_or(true, Value::is_null),
        Predicate::And { all } => all.iter().all(|p| matches(doc, p)),
        Predicate::Or { any } => any.iter().any(|p| matches(doc, p)),
        Predicate::Not { predicate } => !matches(doc, predicate),
    }
}

fn compare_op(actual: &Value, op: CompareOp, expected: &Value) -> bool {
    match op {
        CompareOp::Eq => values_equal(actual, expected),
        CompareOp::Ne => !values_equal(actual, expected),
        // Range comparisons only hold between values of the same kind; null never matches.
        _ if !same_kind(actual, expected) || actual.is_null() => false,
        CompareOp::Gt => compare_values(actual, expected) == Ordering::Greater,
        CompareOp::Ge => compare_values(actual, expected) != Ordering::Less,
        CompareOp::Lt => compare_values(actual, expected) == Ordering::Less,
        CompareOp::Le => compare_values(actual, expected) != Ordering::Greater,
    }
}

fn same_kind(a: &Value, b: &Value) -> bool {
    kind_rank(a) == kind_rank(b)
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Ordering::Equal,
        _ => a == b,
    }
}

fn kind_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: null < bool < number < string < array < object.
///
/// Integers compare exactly; mixed integer/float pairs compare as `f64`. Objects compare
/// equal to each other.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                x.cmp(&y)
            } else if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                x.cmp(&y)
            } else {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.total_cmp(&y)
            }
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

//! Provider-agnostic query specifications and their translators.
//!
//! A [`Specification`] bundles an optional filter [`Predicate`], include directives,
//! ascending and descending order-by keys, and optional paging. It is plain data: field
//! names, operators and `serde_json::Value` operands, so it can be logged, serialized, or
//! handed to any backend.
//!
//! Each persistence family gets a [`SpecificationTranslator`] that turns a specification
//! into its native query form:
//!
//! | Translator | Native query | Store family |
//! |------------|--------------|--------------|
//! | [`MemoryTranslator`] | [`MemoryQuery`] | pure in-memory collections |
//! | [`SqlTranslator`] | [`SqlQuery`] | relational (Postgres, SQLite) |
//! | [`DocumentTranslator`] | [`DocumentQuery`] | document stores (aggregation pipeline) |
//!
//! # Ordering
//!
//! All ascending keys apply first in registration order, then all descending keys in
//! registration order, chained as then-by. The first key registered is the primary key.
//!
//! # Example
//!
//! ```
//! use modern_kit::specification::{Predicate, Specification, Queryable};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Book {
//!     id: u32,
//!     title: String,
//!     year: u16,
//! }
//!
//! impl Queryable for Book {
//!     fn collection() -> &'static str { "books" }
//!     fn columns() -> &'static [&'static str] { &["id", "title", "year"] }
//! }
//!
//! let spec = Specification::<Book>::builder()
//!     .filter(Predicate::ge("year", 2000))
//!     .order_by("title")
//!     .order_by_descending("year")
//!     .take(20)
//!     .build();
//!
//! assert_eq!(spec.ordering().len(), 2);
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

pub mod document;
pub mod memory;
pub mod schema;
pub mod sql;

pub use document::{DocumentQuery, DocumentTranslator};
pub use memory::{MemoryQuery, MemoryTranslator};
pub use schema::{Queryable, Relation};
pub use sql::{SqlDialect, SqlQuery, SqlTranslator, TableRef};

/// Comparison operators usable in a [`Predicate::Compare`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        };
        f.write_str(symbol)
    }
}

/// Data-only filter predicate over an entity's fields.
///
/// Field names may be dotted paths into nested values (`"address.city"`); whether a given
/// translator supports nested paths is up to that translator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    /// Substring match on string fields. On array fields an element must equal `value`
    /// exactly; elements are never substring-matched. SQL translation supports string
    /// columns only.
    Contains { field: String, value: String },
    StartsWith { field: String, value: String },
    In { field: String, values: Vec<Value> },
    /// Field is null or missing.
    IsNull { field: String },
    And { all: Vec<Predicate> },
    Or { any: Vec<Predicate> },
    Not { predicate: Box<Predicate> },
}

impl Predicate {
    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ge, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Le, value)
    }

    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Predicate::Contains {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn starts_with(field: impl Into<String>, value: impl Into<String>) -> Self {
        Predicate::StartsWith {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn is_in<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Predicate::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Predicate::IsNull {
            field: field.into(),
        }
    }

    /// Conjunction, flattening nested `And`s.
    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And { mut all } => {
                all.push(other);
                Predicate::And { all }
            }
            first => Predicate::And {
                all: vec![first, other],
            },
        }
    }

    /// Disjunction, flattening nested `Or`s.
    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or { mut any } => {
                any.push(other);
                Predicate::Or { any }
            }
            first => Predicate::Or {
                any: vec![first, other],
            },
        }
    }

    pub fn negate(self) -> Self {
        Predicate::Not {
            predicate: Box::new(self),
        }
    }

    /// Every field referenced by this predicate, in depth-first order.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::Compare { field, .. }
            | Predicate::Contains { field, .. }
            | Predicate::StartsWith { field, .. }
            | Predicate::In { field, .. }
            | Predicate::IsNull { field } => out.push(field.as_str()),
            Predicate::And { all: parts } | Predicate::Or { any: parts } => {
                for p in parts {
                    p.collect_fields(out);
                }
            }
            Predicate::Not { predicate } => predicate.collect_fields(out),
        }
    }
}

/// Sort direction of an order-by key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// One key of the effective sort chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderKey {
    pub field: String,
    pub direction: SortDirection,
}

/// Immutable query description bound to entity type `T`.
///
/// Built with [`Specification::builder`]; consumed by a [`SpecificationTranslator`].
pub struct Specification<T> {
    filter: Option<Predicate>,
    includes: Vec<String>,
    order_by: Vec<String>,
    order_by_descending: Vec<String>,
    skip: Option<usize>,
    take: Option<usize>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Specification<T> {
    pub fn builder() -> SpecificationBuilder<T> {
        SpecificationBuilder {
            spec: Specification::all(),
        }
    }

    /// Specification matching every entity, in provider order.
    pub fn all() -> Self {
        Specification {
            filter: None,
            includes: Vec::new(),
            order_by: Vec::new(),
            order_by_descending: Vec::new(),
            skip: None,
            take: None,
            _entity: PhantomData,
        }
    }

    pub fn filter(&self) -> Option<&Predicate> {
        self.filter.as_ref()
    }

    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    /// Ascending keys, in registration order.
    pub fn order_by(&self) -> &[String] {
        &self.order_by
    }

    /// Descending keys, in registration order.
    pub fn order_by_descending(&self) -> &[String] {
        &self.order_by_descending
    }

    /// Effective sort chain: ascending keys, then descending keys.
    pub fn ordering(&self) -> Vec<OrderKey> {
        let asc = self.order_by.iter().map(|f| OrderKey {
            field: f.clone(),
            direction: SortDirection::Ascending,
        });
        let desc = self.order_by_descending.iter().map(|f| OrderKey {
            field: f.clone(),
            direction: SortDirection::Descending,
        });
        asc.chain(desc).collect()
    }

    pub fn skip(&self) -> Option<usize> {
        self.skip
    }

    pub fn take(&self) -> Option<usize> {
        self.take
    }

    pub fn is_paged(&self) -> bool {
        self.skip.is_some() || self.take.is_some()
    }

    /// Copy of this specification with paging replaced.
    pub fn with_paging(&self, skip: Option<usize>, take: Option<usize>) -> Self {
        Specification {
            skip,
            take,
            ..self.clone()
        }
    }

    /// Copy of this specification with paging removed (used for counting).
    pub fn without_paging(&self) -> Self {
        self.with_paging(None, None)
    }
}

impl<T: Queryable> Specification<T> {
    /// Check every referenced member against `T`'s schema.
    ///
    /// # Errors
    /// Returns `Error::Translation` naming the first member with no native column or relation.
    pub fn validate(&self) -> Result<()> {
        if let Some(filter) = &self.filter {
            for field in filter.fields() {
                if !T::has_column(field) {
                    return Err(untranslatable::<T>("filter field", field));
                }
            }
        }

        for include in &self.includes {
            if T::relation(include).is_none() {
                return Err(untranslatable::<T>("include", include));
            }
        }

        for key in self.order_by.iter().chain(&self.order_by_descending) {
            if !T::has_column(key) {
                return Err(untranslatable::<T>("order-by key", key));
            }
        }

        Ok(())
    }
}

fn untranslatable<T: Queryable>(what: &str, member: &str) -> Error {
    Error::Translation(format!(
        "{} '{}' is not a column or relation of '{}'",
        what,
        member,
        T::collection()
    ))
}

impl<T> Default for Specification<T> {
    fn default() -> Self {
        Self::all()
    }
}

impl<T> Clone for Specification<T> {
    fn clone(&self) -> Self {
        Specification {
            filter: self.filter.clone(),
            includes: self.includes.clone(),
            order_by: self.order_by.clone(),
            order_by_descending: self.order_by_descending.clone(),
            skip: self.skip,
            take: self.take,
            _entity: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Specification<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Specification")
            .field("filter", &self.filter)
            .field("includes", &self.includes)
            .field("order_by", &self.order_by)
            .field("order_by_descending", &self.order_by_descending)
            .field("skip", &self.skip)
            .field("take", &self.take)
            .finish()
    }
}

/// Builder for [`Specification`]. Directives accumulate in call order.
pub struct SpecificationBuilder<T> {
    spec: Specification<T>,
}

impl<T> SpecificationBuilder<T> {
    /// Set the filter. Calling again ANDs the new predicate onto the existing one.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.spec.filter = Some(match self.spec.filter.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn include(mut self, relation: impl Into<String>) -> Self {
        self.spec.includes.push(relation.into());
        self
    }

    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.spec.order_by.push(field.into());
        self
    }

    pub fn order_by_descending(mut self, field: impl Into<String>) -> Self {
        self.spec.order_by_descending.push(field.into());
        self
    }

    pub fn skip(mut self, count: usize) -> Self {
        self.spec.skip = Some(count);
        self
    }

    pub fn take(mut self, count: usize) -> Self {
        self.spec.take = Some(count);
        self
    }

    pub fn build(self) -> Specification<T> {
        self.spec
    }
}

/// Converts a [`Specification`] into a provider-native query.
///
/// Translation validates the specification and builds the query; it never executes it.
pub trait SpecificationTranslator<T: Queryable> {
    /// Base queryable / collection handle the query starts from.
    type Source;

    /// Native query produced, ready for the caller to execute.
    type Query;

    /// # Errors
    /// Returns `Error::Translation` when a referenced member cannot be expressed natively.
    fn translate(&self, spec: &Specification<T>, source: Self::Source) -> Result<Self::Query>;
}

//! Query schema: which members of an entity a translator may reference.

use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::Value;

/// A navigable relation from one entity to another collection.
///
/// `local_key` lives on the declaring entity, `foreign_key` on the related collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Relation {
    /// Name used in `include` directives and as the output field/alias.
    pub name: &'static str,
    /// Table or collection holding the related records.
    pub collection: &'static str,
    pub local_key: &'static str,
    pub foreign_key: &'static str,
}

/// Schema of an entity that specifications can be translated against.
///
/// Only declared columns can be filtered or ordered on and only declared relations can be
/// included. Members outside the schema (computed properties, transient fields) make
/// translation fail instead of being ignored.
///
/// # Example
///
/// ```
/// use modern_kit::specification::{Queryable, Relation};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Customer {
///     id: u64,
///     name: String,
/// }
///
/// impl Queryable for Customer {
///     fn collection() -> &'static str {
///         "customers"
///     }
///
///     fn columns() -> &'static [&'static str] {
///         &["id", "name"]
///     }
///
///     fn relations() -> &'static [Relation] {
///         &[Relation {
///             name: "orders",
///             collection: "orders",
///             local_key: "id",
///             foreign_key: "customer_id",
///         }]
///     }
/// }
/// ```
pub trait Queryable: Serialize {
    /// Native table or collection name.
    fn collection() -> &'static str;

    /// Members backed by a native column / document field.
    fn columns() -> &'static [&'static str];

    /// Relations that can be included.
    fn relations() -> &'static [Relation] {
        &[]
    }

    /// Document view used by in-memory evaluation. Defaults to the serde representation.
    ///
    /// # Errors
    /// Returns `Err` if the entity cannot be represented as JSON
    fn to_document(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| {
            Error::Translation(format!(
                "cannot evaluate {} in memory: {}",
                Self::collection(),
                e
            ))
        })
    }

    /// True if `path` (possibly dotted) starts at a declared column.
    fn has_column(path: &str) -> bool {
        let root = path.split('.').next().unwrap_or(path);
        Self::columns().contains(&root)
    }

    fn relation(name: &str) -> Option<&'static Relation> {
        Self::relations().iter().find(|r| r.name == name)
    }
}

/// Resolve a dotted path inside a JSON document. Numeric segments index arrays.
pub(crate) fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(document, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

//! Relational translation: specifications rendered as parameterized SQL.
//!
//! The output is a [`SqlQuery`] (statement text plus positional parameters) for the caller's
//! driver to prepare and execute. Identifiers are always quoted; operand values never
//! appear in the statement text.
//!
//! ```
//! use modern_kit::specification::{
//!     Predicate, Queryable, Specification, SpecificationTranslator, SqlDialect, SqlTranslator,
//!     TableRef,
//! };
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Author {
//!     id: u32,
//!     name: String,
//! }
//!
//! impl Queryable for Author {
//!     fn collection() -> &'static str { "authors" }
//!     fn columns() -> &'static [&'static str] { &["id", "name"] }
//! }
//!
//! let spec = Specification::<Author>::builder()
//!     .filter(Predicate::eq("name", "Le Guin"))
//!     .order_by("id")
//!     .build();
//!
//! let query = SqlTranslator::new(SqlDialect::Postgres)
//!     .translate(&spec, TableRef::of::<Author>())
//!     .unwrap();
//!
//! assert_eq!(
//!     query.sql,
//!     r#"SELECT "t0".* FROM "authors" AS "t0" WHERE "t0"."name" = $1 ORDER BY "t0"."id" ASC"#
//! );
//! ```

use super::{
    CompareOp, Predicate, Queryable, SortDirection, Specification, SpecificationTranslator,
};
use crate::error::{Error, Result};
use serde_json::Value;

/// Placeholder and paging conventions of the target database.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SqlDialect {
    /// `$1, $2, ...` placeholders.
    #[default]
    Postgres,
    /// `?` placeholders.
    Sqlite,
}

/// Base table a query selects from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableRef {
    pub name: String,
    pub alias: String,
}

impl TableRef {
    /// The entity's own collection, aliased `t0`.
    pub fn of<T: Queryable>() -> Self {
        TableRef {
            name: T::collection().to_string(),
            alias: "t0".to_string(),
        }
    }

    /// A different table or view for the same entity shape (e.g. a tenant-scoped view).
    pub fn named(name: impl Into<String>) -> Self {
        TableRef {
            name: name.into(),
            alias: "t0".to_string(),
        }
    }
}

/// A parameterized SQL statement.
#[derive(Clone, Debug, PartialEq)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Translator for relational stores.
#[derive(Clone, Copy, Debug, Default)]
pub struct SqlTranslator {
    dialect: SqlDialect,
}

impl SqlTranslator {
    pub fn new(dialect: SqlDialect) -> Self {
        SqlTranslator { dialect }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// `SELECT COUNT(*)` over the filtered table. Includes, ordering and paging are ignored.
    ///
    /// # Errors
    /// Returns `Error::Translation` when a referenced member cannot be expressed as SQL.
    pub fn translate_count<T: Queryable>(
        &self,
        spec: &Specification<T>,
        source: TableRef,
    ) -> Result<SqlQuery> {
        spec.validate()?;

        let mut writer = SqlWriter::new(self.dialect, &source.alias);
        let mut sql = format!(
            "SELECT COUNT(*) FROM {} AS {}",
            quote(&source.name),
            quote(&source.alias)
        );
        if let Some(filter) = spec.filter() {
            sql.push_str(" WHERE ");
            sql.push_str(&writer.predicate(filter)?);
        }

        Ok(SqlQuery {
            sql,
            params: writer.params,
        })
    }
}

impl<T: Queryable> SpecificationTranslator<T> for SqlTranslator {
    type Source = TableRef;
    type Query = SqlQuery;

    fn translate(&self, spec: &Specification<T>, source: TableRef) -> Result<SqlQuery> {
        spec.validate()?;

        let mut writer = SqlWriter::new(self.dialect, &source.alias);

        let mut projection = vec![format!("{}.*", quote(&source.alias))];
        let mut joins = String::new();
        for include in spec.includes() {
            let relation = T::relation(include)
                .ok_or_else(|| Error::Translation(format!("unknown relation '{}'", include)))?;
            if relation.name == source.alias {
                return Err(Error::Translation(format!(
                    "relation '{}' collides with the base table alias",
                    relation.name
                )));
            }
            projection.push(format!("{}.*", quote(relation.name)));
            joins.push_str(&format!(
                " LEFT JOIN {} AS {} ON {}.{} = {}.{}",
                quote(relation.collection),
                quote(relation.name),
                quote(relation.name),
                quote(relation.foreign_key),
                quote(&source.alias),
                quote(relation.local_key),
            ));
        }

        let mut sql = format!(
            "SELECT {} FROM {} AS {}{}",
            projection.join(", "),
            quote(&source.name),
            quote(&source.alias),
            joins
        );

        if let Some(filter) = spec.filter() {
            sql.push_str(" WHERE ");
            sql.push_str(&writer.predicate(filter)?);
        }

        let ordering = spec.ordering();
        if !ordering.is_empty() {
            let keys = ordering
                .iter()
                .map(|key| {
                    let direction = match key.direction {
                        SortDirection::Ascending => "ASC",
                        SortDirection::Descending => "DESC",
                    };
                    Ok(format!("{} {}", writer.column(&key.field)?, direction))
                })
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&keys.join(", "));
        }

        match (spec.take(), spec.skip(), self.dialect) {
            (Some(take), Some(skip), _) => sql.push_str(&format!(" LIMIT {} OFFSET {}", take, skip)),
            (Some(take), None, _) => sql.push_str(&format!(" LIMIT {}", take)),
            // SQLite only accepts OFFSET after a LIMIT clause.
            (None, Some(skip), SqlDialect::Sqlite) => {
                sql.push_str(&format!(" LIMIT -1 OFFSET {}", skip))
            }
            (None, Some(skip), SqlDialect::Postgres) => {
                sql.push_str(&format!(" OFFSET {}", skip))
            }
            (None, None, _) => {}
        }

        debug!("Translated specification to SQL: {}", sql);

        Ok(SqlQuery {
            sql,
            params: writer.params,
        })
    }
}

struct SqlWriter<'a> {
    dialect: SqlDialect,
    alias: &'a str,
    params: Vec<Value>,
}

impl<'a> SqlWriter<'a> {
    fn new(dialect: SqlDialect, alias: &'a str) -> Self {
        SqlWriter {
            dialect,
            alias,
            params: Vec::new(),
        }
    }

    fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        match self.dialect {
            SqlDialect::Postgres => format!("${}", self.params.len()),
            SqlDialect::Sqlite => "?".to_string(),
        }
    }

    fn column(&self, field: &str) -> Result<String> {
        if field.contains('.') {
            return Err(Error::Translation(format!(
                "nested path '{}' has no relational column",
                field
            )));
        }
        Ok(format!("{}.{}", quote(self.alias), quote(field)))
    }

    fn predicate(&mut self, predicate: &Predicate) -> Result<String> {
        match predicate {
            Predicate::Compare { field, op, value } => {
                let column = self.column(field)?;
                match (op, value) {
                    (CompareOp::Eq, Value::Null) => Ok(format!("{} IS NULL", column)),
                    (CompareOp::Ne, Value::Null) => Ok(format!("{} IS NOT NULL", column)),
                    (_, Value::Array(_) | Value::Object(_)) => Err(Error::Translation(format!(
                        "cannot compare column '{}' with a composite value",
                        field
                    ))),
                    _ => {
                        let placeholder = self.bind(value.clone());
                        Ok(format!("{} {} {}", column, op, placeholder))
                    }
                }
            }
            Predicate::Contains { field, value } => {
                let column = self.column(field)?;
                let placeholder = self.bind(Value::String(format!("%{}%", escape_like(value))));
                Ok(format!("{} LIKE {} ESCAPE '\\'", column, placeholder))
            }
            Predicate::StartsWith { field, value } => {
                let column = self.column(field)?;
                let placeholder = self.bind(Value::String(format!("{}%", escape_like(value))));
                Ok(format!("{} LIKE {} ESCAPE '\\'", column, placeholder))
            }
            Predicate::In { field, values } => {
                let column = self.column(field)?;
                if values.is_empty() {
                    return Ok("1 = 0".to_string());
                }
                let placeholders: Vec<String> =
                    values.iter().map(|v| self.bind(v.clone())).collect();
                Ok(format!("{} IN ({})", column, placeholders.join(", ")))
            }
            Predicate::IsNull { field } => Ok(format!("{} IS NULL", self.column(field)?)),
            Predicate::And { all } => self.junction(all, " AND ", "1 = 1"),
            Predicate::Or { any } => self.junction(any, " OR ", "1 = 0"),
            Predicate::Not { predicate } => Ok(format!("NOT ({})", self.predicate(predicate)?)),
        }
    }

    fn junction(&mut self, parts: &[Predicate], separator: &str, empty: &str) -> Result<String> {
        if parts.is_empty() {
            return Ok(empty.to_string());
        }
        let rendered = parts
            .iter()
            .map(|p| self.predicate(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!("({})", rendered.join(separator)))
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

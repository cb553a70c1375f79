//! Document-store translation: specifications rendered as an aggregation pipeline.
//!
//! Stages are appended in a fixed order: `$match`, one `$lookup` per include, `$sort`,
//! `$skip`, `$limit`. Stages already present on the source query run first.

use super::{
    CompareOp, Predicate, Queryable, SortDirection, Specification, SpecificationTranslator,
};
use crate::error::Result;
use serde_json::{json, Map, Value};

/// Aggregation pipeline against one collection.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentQuery {
    pub collection: String,
    pub pipeline: Vec<Value>,
}

impl DocumentQuery {
    /// Empty pipeline over the entity's own collection.
    pub fn collection<T: Queryable>() -> Self {
        DocumentQuery {
            collection: T::collection().to_string(),
            pipeline: Vec::new(),
        }
    }

    /// Append a caller-supplied stage (e.g. a tenant `$match`) before translation.
    pub fn with_stage(mut self, stage: Value) -> Self {
        self.pipeline.push(stage);
        self
    }

    /// Pipeline counting the matching documents: source stages, `$match`, then `$count`.
    pub fn count_pipeline(&self) -> Vec<Value> {
        let mut stages: Vec<Value> = self
            .pipeline
            .iter()
            .filter(|stage| {
                let skip = ["$lookup", "$sort", "$skip", "$limit"];
                !stage
                    .as_object()
                    .is_some_and(|s| s.keys().any(|k| skip.contains(&k.as_str())))
            })
            .cloned()
            .collect();
        stages.push(json!({ "$count": "total" }));
        stages
    }
}

/// Translator for document stores.
#[derive(Clone, Copy, Debug, Default)]
pub struct DocumentTranslator;

impl<T: Queryable> SpecificationTranslator<T> for DocumentTranslator {
    type Source = DocumentQuery;
    type Query = DocumentQuery;

    fn translate(&self, spec: &Specification<T>, source: DocumentQuery) -> Result<DocumentQuery> {
        spec.validate()?;

        let mut query = source;

        if let Some(filter) = spec.filter() {
            query.pipeline.push(json!({ "$match": render(filter) }));
        }

        for include in spec.includes() {
            if let Some(relation) = T::relation(include) {
                query.pipeline.push(json!({
                    "$lookup": {
                        "from": relation.collection,
                        "localField": relation.local_key,
                        "foreignField": relation.foreign_key,
                        "as": relation.name,
                    }
                }));
            }
        }

        let mut sort = Map::new();
        for key in spec.ordering() {
            // A key registered twice keeps its first (higher precedence) direction.
            if sort.contains_key(&key.field) {
                continue;
            }
            let direction = match key.direction {
                SortDirection::Ascending => 1,
                SortDirection::Descending => -1,
            };
            sort.insert(key.field, json!(direction));
        }
        if !sort.is_empty() {
            query.pipeline.push(json!({ "$sort": sort }));
        }

        if let Some(skip) = spec.skip() {
            query.pipeline.push(json!({ "$skip": skip }));
        }
        if let Some(take) = spec.take() {
            query.pipeline.push(json!({ "$limit": take }));
        }

        Ok(query)
    }
}

fn render(predicate: &Predicate) -> Value {
    match predicate {
        Predicate::Compare { field, op, value } => {
            let operator = match op {
                CompareOp::Eq => "$eq",
                CompareOp::Ne => "$ne",
                CompareOp::Gt => "$gt",
                CompareOp::Ge => "$gte",
                CompareOp::Lt => "$lt",
                CompareOp::Le => "$lte",
            };
            json!({ field.as_str(): { operator: value } })
        }
        // `$regex` alone would also match array elements by substring.
        Predicate::Contains { field, value } => json!({ "$or": [
            { field.as_str(): { "$not": { "$type": "array" }, "$regex": escape_regex(value) } },
            { field.as_str(): { "$elemMatch": { "$eq": value } } }
        ] }),
        Predicate::StartsWith { field, value } => {
            json!({ field.as_str(): { "$regex": format!("^{}", escape_regex(value)) } })
        }
        Predicate::In { field, values } => json!({ field.as_str(): { "$in": values } }),
        // Matches both explicit null and a missing field.
        Predicate::IsNull { field } => json!({ field.as_str(): Value::Null }),
        Predicate::And { all } if all.is_empty() => json!({}),
        Predicate::And { all } => json!({ "$and": all.iter().map(render).collect::<Vec<_>>() }),
        Predicate::Or { any } if any.is_empty() => json!({ "$expr": false }),
        Predicate::Or { any } => json!({ "$or": any.iter().map(render).collect::<Vec<_>>() }),
        Predicate::Not { predicate } => json!({ "$nor": [render(predicate)] }),
    }
}

fn escape_regex(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::specification::Relation;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Article {
        id: String,
        title: String,
        author: Author,
    }

    #[derive(Serialize)]
    struct Author {
        name: String,
    }

    impl Queryable for Article {
        fn collection() -> &'static str {
            "articles"
        }

        fn columns() -> &'static [&'static str] {
            &["id", "title", "author", "published_at"]
        }

        fn relations() -> &'static [Relation] {
            &[Relation {
                name: "comments",
                collection: "comments",
                local_key: "id",
                foreign_key: "article_id",
            }]
        }
    }

    fn translate(spec: &Specification<Article>) -> Result<DocumentQuery> {
        DocumentTranslator.translate(spec, DocumentQuery::collection::<Article>())
    }

    #[test]
    fn test_empty_specification_yields_empty_pipeline() {
        let query = translate(&Specification::all()).unwrap();
        assert_eq!(query.collection, "articles");
        assert!(query.pipeline.is_empty());
    }

    #[test]
    fn test_pipeline_stage_order() {
        let spec = Specification::builder()
            .filter(Predicate::eq("author.name", "Ada").and(Predicate::is_null("published_at")))
            .include("comments")
            .order_by_descending("published_at")
            .order_by("title")
            .skip(10)
            .take(5)
            .build();

        let query = translate(&spec).unwrap();
        assert_eq!(
            query.pipeline,
            vec![
                json!({ "$match": { "$and": [
                    { "author.name": { "$eq": "Ada" } },
                    { "published_at": null }
                ] } }),
                json!({ "$lookup": {
                    "from": "comments",
                    "localField": "id",
                    "foreignField": "article_id",
                    "as": "comments"
                } }),
                json!({ "$sort": { "title": 1, "published_at": -1 } }),
                json!({ "$skip": 10 }),
                json!({ "$limit": 5 }),
            ]
        );

        // Key order inside $sort carries precedence.
        let sort_keys: Vec<&String> = query.pipeline[2]["$sort"]
            .as_object()
            .unwrap()
            .keys()
            .collect();
        assert_eq!(sort_keys, ["title", "published_at"]);
    }

    #[test]
    fn test_duplicate_sort_key_keeps_first_direction() {
        let spec = Specification::<Article>::builder()
            .order_by("title")
            .order_by_descending("title")
            .build();
        let query = translate(&spec).unwrap();
        assert_eq!(query.pipeline, vec![json!({ "$sort": { "title": 1 } })]);
    }

    #[test]
    fn test_text_operators_are_escaped_regexes() {
        let spec = Specification::<Article>::builder()
            .filter(Predicate::starts_with("title", "C++ (2nd").negate())
            .build();
        let query = translate(&spec).unwrap();
        assert_eq!(
            query.pipeline[0],
            json!({ "$match": { "$nor": [ { "title": { "$regex": "^C\\+\\+ \\(2nd" } } ] } })
        );
    }

    #[test]
    fn test_contains_is_substring_on_strings_and_element_match_on_arrays() {
        let spec = Specification::<Article>::builder()
            .filter(Predicate::contains("title", "a.b"))
            .build();
        let query = translate(&spec).unwrap();
        assert_eq!(
            query.pipeline[0],
            json!({ "$match": { "$or": [
                { "title": { "$not": { "$type": "array" }, "$regex": "a\\.b" } },
                { "title": { "$elemMatch": { "$eq": "a.b" } } }
            ] } })
        );
    }

    #[test]
    fn test_source_stages_run_first_and_count_pipeline() {
        let source = DocumentQuery::collection::<Article>()
            .with_stage(json!({ "$match": { "tenant": "acme" } }));
        let spec = Specification::<Article>::builder()
            .filter(Predicate::is_in("id", ["a", "b"]))
            .include("comments")
            .take(1)
            .build();

        let query = DocumentTranslator.translate(&spec, source).unwrap();
        assert_eq!(query.pipeline[0], json!({ "$match": { "tenant": "acme" } }));
        assert_eq!(query.pipeline.len(), 4);

        assert_eq!(
            query.count_pipeline(),
            vec![
                json!({ "$match": { "tenant": "acme" } }),
                json!({ "$match": { "id": { "$in": ["a", "b"] } } }),
                json!({ "$count": "total" }),
            ]
        );
    }

    #[test]
    fn test_unknown_include_fails() {
        let spec = Specification::<Article>::builder().include("tags").build();
        assert!(matches!(translate(&spec), Err(Error::Translation(_))));
    }
}

//! Generic repository trait: the backing-store adapter interface.
//!
//! Services never talk to a database directly; they go through [`Repository`], implemented
//! once per store (SQL through a driver plus [`SqlTranslator`](crate::specification::SqlTranslator),
//! a document store plus [`DocumentTranslator`](crate::specification::DocumentTranslator), or the
//! bundled [`InMemoryRepository`]).
//!
//! # Error Handling
//!
//! Absence is not an error: `get`, `update` and `delete` report it as `Ok(None)`. Return
//! `Err` for:
//! - Connectivity issues, timeouts, constraint violations: wrap the driver error with
//!   [`Error::repository`] so the cause stays reachable through `source()`
//! - Creating an id that already exists: [`Error::Conflict`]
//! - A specification the store cannot express: [`Error::Translation`]

use crate::entity::EntityModel;
use crate::error::{Error, Result};
use crate::specification::{MemoryTranslator, Queryable, Specification, SpecificationTranslator};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Trait for backing-store adapters.
///
/// Works on the store's own shape of the entity (the DBO, `E`). All methods are async and
/// take `&self`; implementations share their connection pool or store internally.
#[allow(async_fn_in_trait)]
pub trait Repository<E: EntityModel>: Send + Sync {
    /// Fetch one entity by id.
    ///
    /// # Errors
    /// Returns `Err` if the store is unavailable or the fetch fails
    async fn get(&self, id: &E::Id) -> Result<Option<E>>;

    /// Batch fetch. Default implementation calls `get()` for each id.
    ///
    /// Override for efficiency (e.g. SQL `WHERE id IN (...)`).
    ///
    /// # Errors
    /// Returns `Err` if the store is unavailable or a fetch fails
    async fn get_many(&self, ids: &[E::Id]) -> Result<Vec<Option<E>>> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            results.push(self.get(id).await?);
        }
        Ok(results)
    }

    /// Fetch every entity matching the specification, ordered and paged as it says.
    ///
    /// # Errors
    /// Returns `Error::Translation` for untranslatable specifications, or a store failure
    async fn get_all(&self, spec: &Specification<E>) -> Result<Vec<E>>;

    /// Count entities matching the specification's filter, ignoring paging.
    ///
    /// Default implementation fetches the unpaged result and counts it.
    ///
    /// # Errors
    /// Same as `get_all()`
    async fn count(&self, spec: &Specification<E>) -> Result<u64> {
        Ok(self.get_all(&spec.without_paging()).await?.len() as u64)
    }

    /// Insert a new entity, returning it as stored (with any store-assigned fields).
    ///
    /// # Errors
    /// Returns `Error::Conflict` if the id already exists, or a store failure
    async fn create(&self, entity: E) -> Result<E>;

    /// Replace an existing entity. `Ok(None)` if the id does not exist.
    ///
    /// # Errors
    /// Returns `Err` on store failure or optimistic-concurrency conflict
    async fn update(&self, entity: E) -> Result<Option<E>>;

    /// Remove an entity, returning the removed value. `Ok(None)` if the id does not exist.
    ///
    /// # Errors
    /// Returns `Err` on store failure
    async fn delete(&self, id: &E::Id) -> Result<Option<E>>;
}

impl<E: EntityModel, R: Repository<E>> Repository<E> for Arc<R> {
    async fn get(&self, id: &E::Id) -> Result<Option<E>> {
        (**self).get(id).await
    }

    async fn get_many(&self, ids: &[E::Id]) -> Result<Vec<Option<E>>> {
        (**self).get_many(ids).await
    }

    async fn get_all(&self, spec: &Specification<E>) -> Result<Vec<E>> {
        (**self).get_all(spec).await
    }

    async fn count(&self, spec: &Specification<E>) -> Result<u64> {
        (**self).count(spec).await
    }

    async fn create(&self, entity: E) -> Result<E> {
        (**self).create(entity).await
    }

    async fn update(&self, entity: E) -> Result<Option<E>> {
        (**self).update(entity).await
    }

    async fn delete(&self, id: &E::Id) -> Result<Option<E>> {
        (**self).delete(id).await
    }
}

// ============================================================================
// In-Memory Repository
// ============================================================================

struct StoredRow<E> {
    seq: u64,
    entity: E,
}

/// Pure in-memory backing store.
///
/// Serves both as the in-memory persistence option and as a deterministic test double.
/// Specifications run through [`MemoryTranslator`]; without an order-by, results come back
/// in insertion order. Clones share the same store.
///
/// ```ignore
/// let repo = InMemoryRepository::<CustomerRow>::new();
/// repo.insert(CustomerRow { id: 1, name: "Ada".into() });
///
/// let found = repo.get(&1).await?;
/// assert_eq!(found.map(|c| c.name), Some("Ada".to_string()));
/// ```
pub struct InMemoryRepository<E: EntityModel> {
    rows: Arc<DashMap<E::Id, StoredRow<E>>>,
    next_seq: Arc<AtomicU64>,
}

impl<E: EntityModel> InMemoryRepository<E> {
    /// Create a new empty in-memory repository.
    pub fn new() -> Self {
        InMemoryRepository {
            rows: Arc::new(DashMap::new()),
            next_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Seed or overwrite an entity without conflict checks.
    pub fn insert(&self, entity: E) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.rows.insert(entity.id(), StoredRow { seq, entity });
    }

    /// Remove all entities.
    pub fn clear(&self) {
        self.rows.clear();
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn snapshot(&self) -> Vec<E> {
        let mut rows: Vec<(u64, E)> = self
            .rows
            .iter()
            .map(|row| (row.seq, row.entity.clone()))
            .collect();
        rows.sort_by_key(|(seq, _)| *seq);
        rows.into_iter().map(|(_, entity)| entity).collect()
    }
}

impl<E: EntityModel> Default for InMemoryRepository<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EntityModel> Clone for InMemoryRepository<E> {
    fn clone(&self) -> Self {
        InMemoryRepository {
            rows: Arc::clone(&self.rows),
            next_seq: Arc::clone(&self.next_seq),
        }
    }
}

impl<E: EntityModel + Queryable> Repository<E> for InMemoryRepository<E> {
    async fn get(&self, id: &E::Id) -> Result<Option<E>> {
        Ok(self.rows.get(id).map(|row| row.entity.clone()))
    }

    async fn get_all(&self, spec: &Specification<E>) -> Result<Vec<E>> {
        MemoryTranslator.translate(spec, self.snapshot())?.execute()
    }

    async fn count(&self, spec: &Specification<E>) -> Result<u64> {
        let matched = MemoryTranslator.translate(spec, self.snapshot())?.count()?;
        Ok(matched as u64)
    }

    async fn create(&self, entity: E) -> Result<E> {
        use dashmap::mapref::entry::Entry;

        match self.rows.entry(entity.id()) {
            Entry::Occupied(_) => Err(Error::Conflict(format!(
                "{} with id {} already exists",
                E::collection(),
                entity.id()
            ))),
            Entry::Vacant(slot) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                slot.insert(StoredRow {
                    seq,
                    entity: entity.clone(),
                });
                Ok(entity)
            }
        }
    }

    async fn update(&self, entity: E) -> Result<Option<E>> {
        match self.rows.get_mut(&entity.id()) {
            Some(mut row) => {
                row.entity = entity.clone();
                Ok(Some(entity))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &E::Id) -> Result<Option<E>> {
        Ok(self.rows.remove(id).map(|(_, row)| row.entity))
    }
}

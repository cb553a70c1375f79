//! Generic CRUD service over a repository.

use super::cancellable;
use crate::entity::{CacheEntity, EntityModel, Identifiable};
use crate::error::{Error, Result};
use crate::page::{BulkResult, Page, PageRequest};
use crate::repository::Repository;
use crate::specification::Specification;
use futures::future::join_all;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Maps repository DBOs (`E`) to DTOs (`E::Dto`) and reports absence as
/// [`Error::NotFound`]. Clones share the repository.
pub struct CrudService<E, R>
where
    E: EntityModel,
    R: Repository<E>,
{
    repository: Arc<R>,
    _model: PhantomData<fn() -> E>,
}

impl<E, R> Clone for CrudService<E, R>
where
    E: EntityModel,
    R: Repository<E>,
{
    fn clone(&self) -> Self {
        CrudService {
            repository: Arc::clone(&self.repository),
            _model: PhantomData,
        }
    }
}

impl<E, R> CrudService<E, R>
where
    E: EntityModel,
    R: Repository<E>,
{
    pub fn new(repository: R) -> Self {
        Self::from_arc(Arc::new(repository))
    }

    pub fn from_arc(repository: Arc<R>) -> Self {
        CrudService {
            repository,
            _model: PhantomData,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    fn not_found(id: &E::Id) -> Error {
        Error::not_found(<E::Dto as CacheEntity>::cache_prefix(), id)
    }

    /// # Errors
    /// Returns `Error::NotFound` if the id does not exist, or the repository error
    pub async fn get(&self, id: &E::Id, cancel: &CancellationToken) -> Result<E::Dto> {
        cancellable(cancel, self.repository.get(id))
            .await?
            .map(|row| row.to_dto())
            .ok_or_else(|| Self::not_found(id))
    }

    /// # Errors
    /// Returns `Error::Translation` for untranslatable specifications, or the repository error
    pub async fn get_all(
        &self,
        spec: &Specification<E>,
        cancel: &CancellationToken,
    ) -> Result<Vec<E::Dto>> {
        let rows = cancellable(cancel, self.repository.get_all(spec)).await?;
        Ok(rows.iter().map(E::to_dto).collect())
    }

    /// One page of the matching entities plus the total match count.
    ///
    /// The request's page and size replace any skip/take already on `spec`.
    ///
    /// # Errors
    /// Returns `Error::ValidationError` for a zero page or size, otherwise as `get_all()`
    pub async fn get_page(
        &self,
        spec: &Specification<E>,
        request: PageRequest,
        cancel: &CancellationToken,
    ) -> Result<Page<E::Dto>> {
        request.validate()?;

        let total = cancellable(cancel, self.repository.count(spec)).await?;
        let paged = spec.with_paging(Some(request.offset()), Some(request.size));
        let rows = cancellable(cancel, self.repository.get_all(&paged)).await?;

        debug!(
            "Page {} of {} ({} items, {} total)",
            request.page,
            E::Dto::cache_prefix(),
            rows.len(),
            total
        );

        Ok(Page {
            items: rows.iter().map(E::to_dto).collect(),
            total,
            page: request.page,
            size: request.size,
        })
    }

    /// Store a new entity and return it as the repository stored it.
    ///
    /// # Errors
    /// Returns `Error::Conflict` if the id already exists, or the repository error
    pub async fn create(&self, dto: E::Dto, cancel: &CancellationToken) -> Result<E::Dto> {
        let created = cancellable(cancel, self.repository.create(E::from_dto(dto))).await?;
        info!(
            "✓ Created {} {}",
            E::Dto::cache_prefix(),
            created.id()
        );
        Ok(created.to_dto())
    }

    /// # Errors
    /// Returns `Error::NotFound` if the id does not exist, or the repository error
    pub async fn update(&self, dto: E::Dto, cancel: &CancellationToken) -> Result<E::Dto> {
        let id = dto.id();
        let updated = cancellable(cancel, self.repository.update(E::from_dto(dto)))
            .await?
            .ok_or_else(|| Self::not_found(&id))?;
        info!("✓ Updated {} {}", E::Dto::cache_prefix(), id);
        Ok(updated.to_dto())
    }

    /// Remove an entity and return its last stored value.
    ///
    /// # Errors
    /// Returns `Error::NotFound` if the id does not exist, or the repository error
    pub async fn delete(&self, id: &E::Id, cancel: &CancellationToken) -> Result<E::Dto> {
        let removed = cancellable(cancel, self.repository.delete(id))
            .await?
            .ok_or_else(|| Self::not_found(id))?;
        info!("✓ Deleted {} {}", E::Dto::cache_prefix(), id);
        Ok(removed.to_dto())
    }

    /// Create each item independently. Failures do not roll back other items.
    pub async fn create_many(
        &self,
        dtos: Vec<E::Dto>,
        cancel: &CancellationToken,
    ) -> BulkResult<E::Dto> {
        let results = join_all(dtos.into_iter().map(|dto| self.create(dto, cancel))).await;
        BulkResult::from_results(results)
    }

    /// Update each item independently. Failures do not roll back other items.
    pub async fn update_many(
        &self,
        dtos: Vec<E::Dto>,
        cancel: &CancellationToken,
    ) -> BulkResult<E::Dto> {
        let results = join_all(dtos.into_iter().map(|dto| self.update(dto, cancel))).await;
        BulkResult::from_results(results)
    }

    /// Delete each id independently. Failures do not roll back other items.
    pub async fn delete_many(
        &self,
        ids: &[E::Id],
        cancel: &CancellationToken,
    ) -> BulkResult<E::Dto> {
        let results = join_all(ids.iter().map(|id| self.delete(id, cancel))).await;
        BulkResult::from_results(results)
    }
}

//! Read-through / write-through cached CRUD service.
//!
//! Each id is either *Absent* from the cache or *Cached* with the DTO of the most recent
//! successful write this service instance knows about:
//!
//! | Event | Cache afterwards |
//! |-------|------------------|
//! | Read miss | Cached (if `cache_on_read`) |
//! | Create | Cached if `add_to_cache_when_entity_created`, else unchanged |
//! | Update | Cached if `add_or_update_in_cache_when_entity_is_updated`, else Absent |
//! | Delete | Absent |
//! | Idle longer than `expiration` | Absent |
//!
//! Backing-store errors propagate unchanged. Cache failures are logged and degrade to a
//! miss; they never replace a store error or a successful result.

use super::crud::CrudService;
use crate::backend::{CacheBackend, InMemoryBackend};
use crate::config::CacheSettings;
use crate::entity::{EntityModel, Identifiable};
use crate::error::{Error, Result};
use crate::layer::CacheLayer;
use crate::observability::CacheMetrics;
use crate::page::{BulkResult, Page, PageRequest};
use crate::repository::Repository;
use crate::specification::Specification;
use crate::strategy::CacheStrategy;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// CRUD service with a local DTO cache kept coherent on writes.
///
/// Clones share both the repository and the cache.
///
/// # Example
///
/// ```ignore
/// use modern_kit::{CachedCrudService, InMemoryRepository};
/// use tokio_util::sync::CancellationToken;
///
/// let service = CachedCrudService::timed(InMemoryRepository::<CustomerRow>::new(), ttl);
/// let cancel = CancellationToken::new();
///
/// service.create(Customer { id: 1, name: "A".into() }, &cancel).await?;
/// let customer = service.get(&1, &cancel).await?; // served from cache
/// ```
pub struct CachedCrudService<E, R, B>
where
    E: EntityModel,
    R: Repository<E>,
    B: CacheBackend,
{
    inner: CrudService<E, R>,
    cache: Arc<CacheLayer<B>>,
}

impl<E, R, B> Clone for CachedCrudService<E, R, B>
where
    E: EntityModel,
    R: Repository<E>,
    B: CacheBackend,
{
    fn clone(&self) -> Self {
        CachedCrudService {
            inner: self.inner.clone(),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<E, R> CachedCrudService<E, R, InMemoryBackend>
where
    E: EntityModel,
    R: Repository<E>,
{
    /// Process-local cache whose entries live until deleted or invalidated.
    pub fn in_memory(repository: R) -> Self {
        Self::new(repository, InMemoryBackend::new(), CacheSettings::default())
    }

    /// Process-local cache whose entries expire after `expiration` without access.
    pub fn timed(repository: R, expiration: Duration) -> Self {
        Self::new(
            repository,
            InMemoryBackend::new(),
            CacheSettings::default().with_expiration(expiration),
        )
    }
}

impl<E, R, B> CachedCrudService<E, R, B>
where
    E: EntityModel,
    R: Repository<E>,
    B: CacheBackend,
{
    pub fn new(repository: R, backend: B, settings: CacheSettings) -> Self {
        Self::from_parts(CrudService::new(repository), CacheLayer::new(backend, settings))
    }

    /// Create a cached service reporting to a custom metrics handler.
    pub fn with_metrics(
        repository: R,
        backend: B,
        settings: CacheSettings,
        metrics: Box<dyn CacheMetrics>,
    ) -> Self {
        Self::from_parts(
            CrudService::new(repository),
            CacheLayer::new(backend, settings).with_metrics(metrics),
        )
    }

    /// Wrap an existing service, sharing its repository.
    pub fn from_parts(inner: CrudService<E, R>, cache: CacheLayer<B>) -> Self {
        CachedCrudService {
            inner,
            cache: Arc::new(cache),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        self.cache.settings()
    }

    pub fn backend(&self) -> &B {
        self.cache.backend()
    }

    /// The uncached service underneath.
    pub fn uncached(&self) -> &CrudService<E, R> {
        &self.inner
    }

    /// Read-through get ([`CacheStrategy::Refresh`]).
    ///
    /// # Errors
    /// Returns `Error::NotFound` if the id does not exist, or the repository error
    pub async fn get(&self, id: &E::Id, cancel: &CancellationToken) -> Result<E::Dto> {
        self.get_with(id, CacheStrategy::Refresh, cancel).await
    }

    /// Get with an explicit cache strategy.
    ///
    /// # Errors
    /// Returns `Error::NotFound` if the id does not exist (for `Fresh`: is not cached), or
    /// the repository error
    pub async fn get_with(
        &self,
        id: &E::Id,
        strategy: CacheStrategy,
        cancel: &CancellationToken,
    ) -> Result<E::Dto> {
        debug!("» Get {:?} (strategy: {})", id, strategy);

        match strategy {
            CacheStrategy::Fresh => {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                self.cache
                    .lookup::<E::Dto>(id)
                    .await
                    .ok_or_else(|| Error::not_found(Self::entity_name(), id))
            }
            CacheStrategy::Refresh => match self.cache.lookup::<E::Dto>(id).await {
                Some(dto) => Ok(dto),
                None => self.load(id, cancel).await,
            },
            CacheStrategy::Invalidate => {
                self.cache.evict::<E::Dto>(id).await;
                self.load(id, cancel).await
            }
            CacheStrategy::Bypass => self.load(id, cancel).await,
        }
    }

    /// Matching entities straight from the backing store, cached when `cache_on_read`.
    ///
    /// # Errors
    /// Returns `Error::Translation` for untranslatable specifications, or the repository error
    pub async fn get_all(
        &self,
        spec: &Specification<E>,
        cancel: &CancellationToken,
    ) -> Result<Vec<E::Dto>> {
        let dtos = self.inner.get_all(spec, cancel).await?;
        self.populate(&dtos).await;
        Ok(dtos)
    }

    /// # Errors
    /// Returns `Error::ValidationError` for a zero page or size, otherwise as `get_all()`
    pub async fn get_page(
        &self,
        spec: &Specification<E>,
        request: PageRequest,
        cancel: &CancellationToken,
    ) -> Result<Page<E::Dto>> {
        let page = self.inner.get_page(spec, request, cancel).await?;
        self.populate(&page.items).await;
        Ok(page)
    }

    /// # Errors
    /// Returns `Error::Conflict` if the id already exists, or the repository error
    pub async fn create(&self, dto: E::Dto, cancel: &CancellationToken) -> Result<E::Dto> {
        let created = self.inner.create(dto, cancel).await?;
        if self.settings().add_to_cache_when_entity_created {
            self.cache.store(&created).await;
        }
        Ok(created)
    }

    /// # Errors
    /// Returns `Error::NotFound` if the id does not exist, or the repository error
    pub async fn update(&self, dto: E::Dto, cancel: &CancellationToken) -> Result<E::Dto> {
        let id = dto.id();
        match self.inner.update(dto, cancel).await {
            Ok(updated) => {
                if self.settings().add_or_update_in_cache_when_entity_is_updated {
                    self.cache.store(&updated).await;
                } else {
                    self.cache.evict::<E::Dto>(&id).await;
                }
                Ok(updated)
            }
            Err(e) => {
                if e.is_not_found() {
                    self.cache.evict::<E::Dto>(&id).await;
                }
                Err(e)
            }
        }
    }

    /// Delete from the backing store and evict from the cache.
    ///
    /// The entry is evicted even when the store no longer has the entity.
    ///
    /// # Errors
    /// Returns `Error::NotFound` if the id does not exist, or the repository error
    pub async fn delete(&self, id: &E::Id, cancel: &CancellationToken) -> Result<E::Dto> {
        let result = self.inner.delete(id, cancel).await;
        match &result {
            Ok(_) => self.cache.evict::<E::Dto>(id).await,
            Err(e) if e.is_not_found() => self.cache.evict::<E::Dto>(id).await,
            Err(_) => {}
        }
        result
    }

    /// Create each item with the same cache rules as [`create`](Self::create).
    pub async fn create_many(
        &self,
        dtos: Vec<E::Dto>,
        cancel: &CancellationToken,
    ) -> BulkResult<E::Dto> {
        let results = join_all(dtos.into_iter().map(|dto| self.create(dto, cancel))).await;
        BulkResult::from_results(results)
    }

    /// Update each item with the same cache rules as [`update`](Self::update).
    pub async fn update_many(
        &self,
        dtos: Vec<E::Dto>,
        cancel: &CancellationToken,
    ) -> BulkResult<E::Dto> {
        let results = join_all(dtos.into_iter().map(|dto| self.update(dto, cancel))).await;
        BulkResult::from_results(results)
    }

    /// Delete each id with the same cache rules as [`delete`](Self::delete).
    pub async fn delete_many(
        &self,
        ids: &[E::Id],
        cancel: &CancellationToken,
    ) -> BulkResult<E::Dto> {
        let results = join_all(ids.iter().map(|id| self.delete(id, cancel))).await;
        BulkResult::from_results(results)
    }

    /// Drop the cached entry for `id`; the next read goes to the backing store.
    pub async fn invalidate(&self, id: &E::Id) {
        self.cache.evict::<E::Dto>(id).await;
    }

    /// Drop every cached entry of the backend.
    ///
    /// # Errors
    /// Returns the backend error, e.g. `Error::NotImplemented` for backends without `clear_all`
    pub async fn clear(&self) -> Result<()> {
        self.cache.clear().await
    }

    fn entity_name() -> &'static str {
        <E::Dto as crate::entity::CacheEntity>::cache_prefix()
    }

    /// Fetch from the backing store and bring the cache in line with the answer.
    ///
    /// Leaves the cache untouched when the store fails or the call is cancelled.
    async fn load(&self, id: &E::Id, cancel: &CancellationToken) -> Result<E::Dto> {
        match self.inner.get(id, cancel).await {
            Ok(dto) => {
                if self.settings().cache_on_read {
                    self.cache.store(&dto).await;
                } else {
                    self.cache.evict::<E::Dto>(id).await;
                }
                Ok(dto)
            }
            Err(e) => {
                if e.is_not_found() {
                    self.cache.evict::<E::Dto>(id).await;
                }
                Err(e)
            }
        }
    }

    async fn populate(&self, dtos: &[E::Dto]) {
        if !self.settings().cache_on_read {
            return;
        }
        for dto in dtos {
            self.cache.store(dto).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{CacheEntity, Identifiable};
    use crate::repository::InMemoryRepository;
    use crate::specification::{Predicate, Queryable};
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Ticket {
        id: u32,
        title: String,
    }

    impl Identifiable for Ticket {
        type Id = u32;

        fn id(&self) -> u32 {
            self.id
        }
    }

    impl CacheEntity for Ticket {
        fn cache_prefix() -> &'static str {
            "ticket"
        }
    }

    impl EntityModel for Ticket {
        type Dto = Ticket;

        fn to_dto(&self) -> Ticket {
            self.clone()
        }

        fn from_dto(dto: Ticket) -> Self {
            dto
        }
    }

    impl Queryable for Ticket {
        fn collection() -> &'static str {
            "tickets"
        }

        fn columns() -> &'static [&'static str] {
            &["id", "title"]
        }
    }

    type Service = CachedCrudService<Ticket, InMemoryRepository<Ticket>, InMemoryBackend>;

    fn ticket(id: u32, title: &str) -> Ticket {
        Ticket {
            id,
            title: title.to_string(),
        }
    }

    fn service(settings: CacheSettings) -> (Service, InMemoryRepository<Ticket>) {
        let repo = InMemoryRepository::new();
        let service = CachedCrudService::new(repo.clone(), InMemoryBackend::new(), settings);
        (service, repo)
    }

    async fn is_cached(service: &Service, id: u32) -> bool {
        service
            .backend()
            .exists(&format!("ticket:{}", id))
            .await
            .expect("exists")
    }

    #[tokio::test]
    async fn test_create_populates_when_enabled() {
        let (service, _) = service(CacheSettings::default());
        let cancel = CancellationToken::new();

        service
            .create(ticket(1, "a"), &cancel)
            .await
            .expect("Failed to create");
        assert!(is_cached(&service, 1).await);
    }

    #[tokio::test]
    async fn test_create_leaves_cache_absent_when_disabled() {
        let (service, _) = service(CacheSettings::default().with_add_on_create(false));
        let cancel = CancellationToken::new();

        service
            .create(ticket(1, "a"), &cancel)
            .await
            .expect("Failed to create");
        assert!(!is_cached(&service, 1).await);

        service.get(&1, &cancel).await.expect("Failed to get");
        assert!(is_cached(&service, 1).await);
    }

    #[tokio::test]
    async fn test_update_disabled_invalidates() {
        let (service, repo) = service(CacheSettings::default().with_add_or_update_on_update(false));
        let cancel = CancellationToken::new();

        service
            .create(ticket(1, "a"), &cancel)
            .await
            .expect("Failed to create");
        service
            .update(ticket(1, "b"), &cancel)
            .await
            .expect("Failed to update");
        assert!(!is_cached(&service, 1).await);

        repo.insert(ticket(1, "changed elsewhere"));
        let fetched = service.get(&1, &cancel).await.expect("Failed to get");
        assert_eq!(fetched.title, "changed elsewhere");
    }

    #[tokio::test]
    async fn test_update_of_missing_entity_evicts() {
        let (service, repo) = service(CacheSettings::default());
        let cancel = CancellationToken::new();

        service
            .create(ticket(1, "a"), &cancel)
            .await
            .expect("Failed to create");
        repo.clear();

        let result = service.update(ticket(1, "b"), &cancel).await;
        assert!(result.expect_err("gone").is_not_found());
        assert!(!is_cached(&service, 1).await);
    }

    #[tokio::test]
    async fn test_delete_evicts_even_when_store_forgot() {
        let (service, repo) = service(CacheSettings::default());
        let cancel = CancellationToken::new();

        service
            .create(ticket(1, "a"), &cancel)
            .await
            .expect("Failed to create");
        repo.clear();

        assert!(service.delete(&1, &cancel).await.is_err());
        assert!(!is_cached(&service, 1).await);
        assert!(service
            .get(&1, &cancel)
            .await
            .expect_err("deleted")
            .is_not_found());
    }

    #[tokio::test]
    async fn test_strategies() {
        let (service, repo) = service(CacheSettings::default().with_add_on_create(false));
        let cancel = CancellationToken::new();
        repo.insert(ticket(1, "v1"));

        let fresh = service.get_with(&1, CacheStrategy::Fresh, &cancel).await;
        assert!(fresh.expect_err("not cached").is_not_found());

        service.get(&1, &cancel).await.expect("Failed to get");
        repo.insert(ticket(1, "v2"));

        let cached = service
            .get_with(&1, CacheStrategy::Fresh, &cancel)
            .await
            .expect("Failed to get");
        assert_eq!(cached.title, "v1");

        let bypassed = service
            .get_with(&1, CacheStrategy::Bypass, &cancel)
            .await
            .expect("Failed to get");
        assert_eq!(bypassed.title, "v2");

        repo.insert(ticket(1, "v3"));
        service
            .get_with(&1, CacheStrategy::Invalidate, &cancel)
            .await
            .expect("Failed to get");
        assert_eq!(
            service.get(&1, &cancel).await.expect("Failed to get").title,
            "v3"
        );

        repo.clear();
        let gone = service
            .get_with(&1, CacheStrategy::Invalidate, &cancel)
            .await;
        assert!(gone.expect_err("gone").is_not_found());
        assert!(!is_cached(&service, 1).await);
    }

    #[tokio::test]
    async fn test_cache_on_read_disabled() {
        let (service, repo) = service(CacheSettings::default().with_cache_on_read(false));
        let cancel = CancellationToken::new();
        repo.insert(ticket(1, "a"));
        repo.insert(ticket(2, "b"));

        service.get(&1, &cancel).await.expect("Failed to get");
        service
            .get_all(&Specification::all(), &cancel)
            .await
            .expect("Failed to list");
        assert!(!is_cached(&service, 1).await);
        assert!(!is_cached(&service, 2).await);
    }

    #[tokio::test]
    async fn test_get_all_populates() {
        let (service, repo) = service(CacheSettings::default());
        let cancel = CancellationToken::new();
        repo.insert(ticket(1, "alpha"));
        repo.insert(ticket(2, "beta"));

        let spec = Specification::builder()
            .filter(Predicate::starts_with("title", "al"))
            .build();
        let found = service.get_all(&spec, &cancel).await.expect("Failed to list");

        assert_eq!(found, vec![ticket(1, "alpha")]);
        assert!(is_cached(&service, 1).await);
        assert!(!is_cached(&service, 2).await);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let (service, _) = service(CacheSettings::default());
        let cancel = CancellationToken::new();
        service
            .create_many(vec![ticket(1, "a"), ticket(2, "b")], &cancel)
            .await;

        service.invalidate(&1).await;
        assert!(!is_cached(&service, 1).await);
        assert!(is_cached(&service, 2).await);

        service.clear().await.expect("Failed to clear");
        assert!(!is_cached(&service, 2).await);
    }

    #[tokio::test]
    async fn test_cancelled_update_keeps_cached_value() {
        let (service, _) = service(CacheSettings::default());
        let cancel = CancellationToken::new();
        service
            .create(ticket(1, "a"), &cancel)
            .await
            .expect("Failed to create");

        let cancelled = CancellationToken::new();
        cancelled.cancel();
        let result = service.update(ticket(1, "b"), &cancelled).await;
        assert!(matches!(result, Err(Error::Cancelled)));

        let cached = service
            .get_with(&1, CacheStrategy::Fresh, &cancel)
            .await
            .expect("Failed to get");
        assert_eq!(cached.title, "a");
    }

    #[tokio::test]
    async fn test_clones_share_cache() {
        let (service, _) = service(CacheSettings::default());
        let other = service.clone();
        let cancel = CancellationToken::new();

        service
            .create(ticket(4, "shared"), &cancel)
            .await
            .expect("Failed to create");
        let seen = other
            .get_with(&4, CacheStrategy::Fresh, &cancel)
            .await
            .expect("Failed to get");
        assert_eq!(seen.title, "shared");
    }

    #[tokio::test]
    async fn test_huge_expiration_does_not_panic() {
        let repo = InMemoryRepository::<Ticket>::new();
        let service: Service = CachedCrudService::timed(repo, Duration::MAX);
        let cancel = CancellationToken::new();

        service
            .create(ticket(5, "forever"), &cancel)
            .await
            .expect("Failed to create");
        let cached = service
            .get_with(&5, CacheStrategy::Fresh, &cancel)
            .await
            .expect("Failed to get");
        assert_eq!(cached.title, "forever");
    }
}

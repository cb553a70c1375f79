//! # modern-kit
//!
//! Generic CRUD scaffolding with a provider-agnostic query specification and a
//! read-through / write-through entity cache.
//!
//! ## Features
//!
//! - **Specifications:** filter predicates, includes and multi-key ordering described as
//!   data, translated for in-memory collections, SQL (Postgres / SQLite) or document
//!   aggregation pipelines
//! - **Repository Agnostic:** services talk to any store through the [`Repository`] trait
//! - **DTO / DBO Mapping:** entities are stored in their store shape and served in their
//!   exposed shape through [`EntityModel`]
//! - **Coherent Caching:** [`CachedCrudService`] keeps a local DTO cache in line with writes,
//!   with optional sliding expiration
//! - **Cancellable:** every service operation takes a `CancellationToken`
//!
//! ## Quick Start
//!
//! ```ignore
//! use modern_kit::{
//!     CacheEntity, CachedCrudService, EntityModel, Identifiable, InMemoryRepository,
//!     Predicate, Queryable, Specification,
//! };
//! use serde::{Deserialize, Serialize};
//! use tokio_util::sync::CancellationToken;
//!
//! // 1. The exposed shape (DTO)
//! #[derive(Clone, Serialize, Deserialize)]
//! struct Customer {
//!     id: u64,
//!     name: String,
//! }
//!
//! impl Identifiable for Customer {
//!     type Id = u64;
//!     fn id(&self) -> u64 { self.id }
//! }
//!
//! impl CacheEntity for Customer {
//!     fn cache_prefix() -> &'static str { "customer" }
//! }
//!
//! // 2. The stored shape (DBO), mapped to the DTO
//! #[derive(Clone, Serialize)]
//! struct CustomerRow {
//!     id: u64,
//!     full_name: String,
//! }
//!
//! impl EntityModel for CustomerRow { /* to_dto / from_dto */ }
//! impl Queryable for CustomerRow { /* collection / columns */ }
//!
//! // 3. Compose and use
//! let service = CachedCrudService::in_memory(InMemoryRepository::<CustomerRow>::new());
//! let cancel = CancellationToken::new();
//!
//! service.create(Customer { id: 1, name: "A".into() }, &cancel).await?;
//! let customer = service.get(&1, &cancel).await?;
//!
//! let spec = Specification::builder()
//!     .filter(Predicate::starts_with("full_name", "A"))
//!     .order_by("full_name")
//!     .build();
//! let matches = service.get_all(&spec, &cancel).await?;
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod config;
pub mod entity;
pub mod error;
pub mod key;
pub mod layer;
pub mod observability;
pub mod page;
pub mod repository;
pub mod serialization;
pub mod service;
pub mod specification;
pub mod strategy;

// Re-exports for convenience
pub use backend::{CacheBackend, InMemoryBackend};
pub use config::CacheSettings;
pub use entity::{CacheEntity, EntityModel, Identifiable};
pub use error::{Error, RepositoryError, Result};
pub use page::{BulkFailure, BulkResult, Page, PageRequest};
pub use repository::{InMemoryRepository, Repository};
pub use service::{CachedCrudService, CrudService};
pub use specification::{
    Predicate, Queryable, Relation, Specification, SpecificationBuilder,
    SpecificationTranslator,
};
pub use strategy::CacheStrategy;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

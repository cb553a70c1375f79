//! Integration tests for cache entry encoding as seen through the cached service.
//!
//! Entries the service cannot trust (wrong magic, other schema version, corrupt payload)
//! must be evicted and re-read from the backing store.

use modern_kit::backend::{CacheBackend, InMemoryBackend};
use modern_kit::serialization::{serialize_for_cache, CACHE_MAGIC, CURRENT_SCHEMA_VERSION};
use modern_kit::{
    CacheEntity, CacheSettings, CacheStrategy, CachedCrudService, EntityModel, Identifiable,
    InMemoryRepository, Queryable,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct Product {
    id: String,
    name: String,
    price_cents: i64,
    in_stock: bool,
}

impl Identifiable for Product {
    type Id = String;

    fn id(&self) -> String {
        self.id.clone()
    }
}

impl CacheEntity for Product {
    fn cache_prefix() -> &'static str {
        "product"
    }
}

impl EntityModel for Product {
    type Dto = Product;

    fn to_dto(&self) -> Product {
        self.clone()
    }

    fn from_dto(dto: Product) -> Self {
        dto
    }
}

impl Queryable for Product {
    fn collection() -> &'static str {
        "products"
    }

    fn columns() -> &'static [&'static str] {
        &["id", "name", "price_cents", "in_stock"]
    }
}

type Service = CachedCrudService<Product, InMemoryRepository<Product>, InMemoryBackend>;

fn product(name: &str) -> Product {
    Product {
        id: "sku-1".to_string(),
        name: name.to_string(),
        price_cents: 1299,
        in_stock: true,
    }
}

fn setup() -> (Service, InMemoryRepository<Product>, InMemoryBackend) {
    let _ = env_logger::builder().is_test(true).try_init();
    let repo = InMemoryRepository::new();
    let backend = InMemoryBackend::new();
    let service = CachedCrudService::new(repo.clone(), backend.clone(), CacheSettings::default());
    (service, repo, backend)
}

#[tokio::test]
async fn test_cached_bytes_carry_envelope_header() {
    let (service, _, backend) = setup();
    let cancel = CancellationToken::new();

    service
        .create(product("Lamp"), &cancel)
        .await
        .expect("Failed to create");

    let bytes = backend
        .get("product:sku-1")
        .await
        .expect("Failed to read")
        .expect("entry should be cached");
    assert_eq!(&bytes[..4], &CACHE_MAGIC);
    // postcard writes the version as a varint; small versions take one byte
    assert_eq!(u32::from(bytes[4]), CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_entry_from_other_schema_version_is_refetched() {
    let (service, repo, backend) = setup();
    let cancel = CancellationToken::new();
    repo.insert(product("current"));

    let mut stale = serialize_for_cache(&product("stale")).expect("Failed to serialize");
    stale[4] = (CURRENT_SCHEMA_VERSION + 1) as u8;
    backend
        .set("product:sku-1", stale, None)
        .await
        .expect("Failed to seed");

    let fetched = service
        .get(&"sku-1".to_string(), &cancel)
        .await
        .expect("Failed to get");
    assert_eq!(fetched.name, "current");

    let cached = service
        .get_with(&"sku-1".to_string(), CacheStrategy::Fresh, &cancel)
        .await
        .expect("entry should be repopulated");
    assert_eq!(cached.name, "current");
}

#[tokio::test]
async fn test_foreign_bytes_are_evicted() {
    let (service, _, backend) = setup();
    let cancel = CancellationToken::new();

    backend
        .set("product:sku-1", b"{\"json\":true}".to_vec(), None)
        .await
        .expect("Failed to seed");

    let result = service
        .get_with(&"sku-1".to_string(), CacheStrategy::Fresh, &cancel)
        .await;
    assert!(result.expect_err("untrusted entry").is_not_found());
    assert!(!backend.exists("product:sku-1").await.expect("exists"));
}

#[tokio::test]
async fn test_truncated_payload_falls_back_to_store() {
    let (service, repo, backend) = setup();
    let cancel = CancellationToken::new();
    repo.insert(product("from store"));

    let mut bytes = serialize_for_cache(&product("cached")).expect("Failed to serialize");
    bytes.truncate(bytes.len() - 3);
    backend
        .set("product:sku-1", bytes, None)
        .await
        .expect("Failed to seed");

    let fetched = service
        .get(&"sku-1".to_string(), &cancel)
        .await
        .expect("Failed to get");
    assert_eq!(fetched.name, "from store");
}

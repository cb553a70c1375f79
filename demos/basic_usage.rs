//! Basic usage example: composing a repository, a cached service and specifications.

use modern_kit::backend::InMemoryBackend;
use modern_kit::error::Result;
use modern_kit::specification::{
    DocumentQuery, DocumentTranslator, Relation, SqlDialect, SqlTranslator, TableRef,
};
use modern_kit::{
    CacheEntity, CacheSettings, CacheStrategy, CachedCrudService, EntityModel, Identifiable,
    InMemoryRepository, PageRequest, Predicate, Queryable, Specification,
    SpecificationTranslator,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Employment as handlers see it.
#[derive(Clone, Serialize, Deserialize, Debug)]
struct Employment {
    id: String,
    employer_name: String,
    salary: f64,
}

impl Identifiable for Employment {
    type Id = String;

    fn id(&self) -> String {
        self.id.clone()
    }
}

impl CacheEntity for Employment {
    fn cache_prefix() -> &'static str {
        "employment"
    }
}

/// Employment as the store keeps it.
#[derive(Clone, Serialize, Debug)]
struct EmploymentRow {
    id: String,
    employer: String,
    salary_cents: i64,
    loanapp_id: Option<String>,
}

impl Identifiable for EmploymentRow {
    type Id = String;

    fn id(&self) -> String {
        self.id.clone()
    }
}

impl EntityModel for EmploymentRow {
    type Dto = Employment;

    fn to_dto(&self) -> Employment {
        Employment {
            id: self.id.clone(),
            employer_name: self.employer.clone(),
            salary: self.salary_cents as f64 / 100.0,
        }
    }

    fn from_dto(dto: Employment) -> Self {
        EmploymentRow {
            id: dto.id,
            employer: dto.employer_name,
            salary_cents: (dto.salary * 100.0).round() as i64,
            loanapp_id: None,
        }
    }
}

impl Queryable for EmploymentRow {
    fn collection() -> &'static str {
        "employments"
    }

    fn columns() -> &'static [&'static str] {
        &["id", "employer", "salary_cents", "loanapp_id"]
    }

    fn relations() -> &'static [Relation] {
        const RELATIONS: &[Relation] = &[Relation {
            name: "loan_application",
            collection: "loan_applications",
            local_key: "loanapp_id",
            foreign_key: "id",
        }];
        RELATIONS
    }
}

fn employment(id: &str, employer: &str, salary: f64) -> Employment {
    Employment {
        id: id.to_string(),
        employer_name: employer.to_string(),
        salary,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .try_init()
        .ok();

    println!("\n=== Modern Kit - Basic Example ===\n");

    // 1. Compose the service explicitly
    println!("1. Loading settings and composing the cached service...");
    let settings = CacheSettings::load()?;
    let repository = InMemoryRepository::<EmploymentRow>::new();
    let service = CachedCrudService::new(repository.clone(), InMemoryBackend::new(), settings);
    let cancel = CancellationToken::new();
    println!("   ✓ Service ready ({:?})\n", service.settings());

    // 2. Writes go through the store, then the cache
    println!("2. Creating employments:");
    let created = service
        .create_many(
            vec![
                employment("emp_001", "Acme Corp", 75_000.0),
                employment("emp_002", "Tech Inc", 95_000.0),
                employment("emp_003", "Acme Corp", 61_500.0),
            ],
            &cancel,
        )
        .await;
    println!(
        "   ✓ {} created, {} failed\n",
        created.succeeded.len(),
        created.failed.len()
    );

    // 3. Served from cache
    println!("3. Reading emp_001:");
    let emp = service.get(&"emp_001".to_string(), &cancel).await?;
    println!("   ✓ {} (${:.2})\n", emp.employer_name, emp.salary);

    // 4. Update refreshes the cached copy
    println!("4. Raising emp_001's salary:");
    service
        .update(employment("emp_001", "Acme Corp", 80_000.0), &cancel)
        .await?;
    let emp = service
        .get_with(&"emp_001".to_string(), CacheStrategy::Fresh, &cancel)
        .await?;
    println!("   ✓ Cached copy now shows ${:.2}\n", emp.salary);

    // 5. Specification-driven listing
    println!("5. Acme employments, best paid first:");
    let spec = Specification::builder()
        .filter(Predicate::eq("employer", "Acme Corp"))
        .order_by_descending("salary_cents")
        .build();
    let page = service
        .get_page(&spec, PageRequest::new(1, 10), &cancel)
        .await?;
    for emp in &page.items {
        println!("   - {} ${:.2}", emp.id, emp.salary);
    }
    println!("   ✓ {} of {} shown\n", page.items.len(), page.total);

    // 6. The same specification for other stores
    println!("6. Translating for other stores:");
    let spec = Specification::<EmploymentRow>::builder()
        .filter(Predicate::ge("salary_cents", 7_000_000))
        .include("loan_application")
        .order_by("employer")
        .take(25)
        .build();
    let sql = SqlTranslator::new(SqlDialect::Postgres).translate(&spec, TableRef::of::<EmploymentRow>())?;
    println!("   SQL:      {}", sql.sql);
    println!("   params:   {:?}", sql.params);
    let doc = DocumentTranslator.translate(&spec, DocumentQuery::collection::<EmploymentRow>())?;
    println!("   pipeline: {}\n", serde_json::Value::Array(doc.pipeline));

    // 7. Delete always evicts
    println!("7. Deleting emp_002:");
    service.delete(&"emp_002".to_string(), &cancel).await?;
    match service.get(&"emp_002".to_string(), &cancel).await {
        Err(e) if e.is_not_found() => println!("   ✓ {}\n", e),
        other => println!("   ✗ unexpected: {:?}\n", other),
    }

    println!("Store holds {} employments", repository.len());
    Ok(())
}

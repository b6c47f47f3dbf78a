//! Runs against a real PostgreSQL server when TEST_DATABASE_URL is set.
//!
//! The schema is created in a throwaway schema so the tests never touch
//! existing nucleus data.

use nucleus_resolver::db::{init_pool, PgStore};
use nucleus_resolver::{Classification, CompanyProfile, NucleusResolver, NucleusStore};
use std::sync::Arc;

async fn test_store() -> Option<Arc<PgStore>> {
    let url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("TEST_DATABASE_URL not set, skipping PostgreSQL test");
            return None;
        }
    };

    let schema = format!("nucleus_test_{}", std::process::id());
    let setup_pool = init_pool(&url, 1).await.expect("connect to test database");
    sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema))
        .execute(&setup_pool)
        .await
        .unwrap();
    sqlx::query(&format!("CREATE SCHEMA {}", schema))
        .execute(&setup_pool)
        .await
        .unwrap();

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(4)
        .after_connect(move |conn, _meta| {
            let schema = schema.clone();
            Box::pin(async move {
                sqlx::query(&format!("SET search_path TO {}", schema))
                    .execute(conn)
                    .await?;
                Ok(())
            })
        })
        .connect(&url)
        .await
        .unwrap();

    let store = PgStore::new(pool);
    store.init_schema().await.unwrap();
    Some(Arc::new(store))
}

#[tokio::test]
async fn test_postgres_resolution_flow() {
    let Some(store) = test_store().await else {
        return;
    };
    let resolver = NucleusResolver::new(store.clone());

    let created = resolver.resolve("Tower Research").await.unwrap();
    assert_eq!(created.classification, Classification::New);
    let exact = resolver.resolve("Tower  Research!!").await.unwrap();
    assert_eq!(exact.classification, Classification::Exact);
    let variant = resolver.resolve("Tower Research Pvt Ltd").await.unwrap();
    assert_eq!(variant.classification, Classification::Variant);
    resolver.resolve("Tower Research Pvt Ltd").await.unwrap();

    let nucleus = store.get_nucleus(&created.canonical_id).await.unwrap().unwrap();
    assert_eq!(nucleus.variants, vec!["Tower Research Pvt Ltd".to_string()]);

    let profile = CompanyProfile {
        url: Some("https://www.linkedin.com/company/tower-research/".to_string()),
        ..Default::default()
    };
    assert!(store.update_company_profile("Tower Research", &profile).await.unwrap());
    let missing = store.companies_missing_url().await.unwrap();
    assert!(!missing.contains(&"Tower Research".to_string()));
    assert!(missing.contains(&"Tower Research Pvt Ltd".to_string()));

    let ids = store
        .nucleus_ids_for_names(&["Tower Research".to_string(), "Tower Research Pvt Ltd".to_string()])
        .await
        .unwrap();
    assert_eq!(ids, vec![created.canonical_id.clone()]);
}

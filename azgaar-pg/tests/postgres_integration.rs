//! Tests d'intégration PostgreSQL du ledger
//!
//! Ces tests nécessitent une base PostgreSQL disponible.
//! Configuration via variables d'environnement:
//! - PGHOST, PGPORT, PGUSER, PGPASSWORD, PGDATABASE
//!
//! Exécution:
//! ```bash
//! # Avec PostgreSQL local
//! cargo test --test postgres_integration -- --ignored
//!
//! # Avec Docker
//! docker run -d --name postgres-test -e POSTGRES_PASSWORD=test -p 5432:5432 postgres
//! PGPASSWORD=test cargo test --test postgres_integration -- --ignored
//! ```

use anyhow::Result;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Config, Pool, Runtime};
use tokio_postgres::NoTls;

/// Configuration de test
fn test_config() -> Config {
    let mut cfg = Config::new();
    cfg.host = Some(std::env::var("PGHOST").unwrap_or_else(|_| "localhost".into()));
    cfg.port = Some(
        std::env::var("PGPORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5432),
    );
    cfg.dbname = Some(std::env::var("PGDATABASE").unwrap_or_else(|_| "openheim_test".into()));
    cfg.user = Some(std::env::var("PGUSER").unwrap_or_else(|_| "postgres".into()));
    cfg.password = std::env::var("PGPASSWORD").ok();
    cfg
}

/// Crée un pool de connexions de test
async fn create_test_pool() -> Result<Pool> {
    let cfg = test_config();
    let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;
    Ok(pool)
}

/// Configure la base de test avec le schéma du ledger
async fn setup_test_schema(pool: &Pool) -> Result<()> {
    let client = pool.get().await?;

    client
        .batch_execute(
            r#"
            DROP SCHEMA IF EXISTS regular CASCADE;
            CREATE SCHEMA regular;

            CREATE TABLE regular."FileUpload" (
                "name" TEXT PRIMARY KEY,
                "baseName" TEXT NOT NULL,
                "path" TEXT NOT NULL,
                "version" TEXT,
                "status" TEXT NOT NULL,
                "createdDate" TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
        )
        .await?;

    Ok(())
}

async fn insert_record(
    pool: &Pool,
    name: &str,
    version: Option<&str>,
    status: &str,
) -> Result<()> {
    let client = pool.get().await?;
    let created: DateTime<Utc> = Utc::now();
    client
        .execute(
            r#"INSERT INTO regular."FileUpload"
               ("name", "baseName", "path", "version", "status", "createdDate")
               VALUES ($1, $2, $3, $4, $5, $6)
               ON CONFLICT ("name")
               DO UPDATE SET "version" = EXCLUDED."version",
                             "status" = EXCLUDED."status",
                             "createdDate" = EXCLUDED."createdDate""#,
            &[
                &name,
                &"openheim",
                &"/srv/data-loader/processed_zips/openheim-0.0.1.zip",
                &version,
                &status,
                &created,
            ],
        )
        .await?;
    Ok(())
}

/// Test de connexion basique
#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_database_connection() {
    let pool = create_test_pool().await.expect("Failed to create pool");
    let client = pool.get().await.expect("Failed to get client");

    let row = client
        .query_one("SELECT 1 as test", &[])
        .await
        .expect("Query failed");
    let value: i32 = row.get("test");
    assert_eq!(value, 1);
}

/// Test de création du schéma
#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_schema_creation() {
    let pool = create_test_pool().await.expect("Failed to create pool");
    setup_test_schema(&pool)
        .await
        .expect("Failed to setup schema");

    let client = pool.get().await.expect("Failed to get client");

    let tables = client
        .query(
            "SELECT table_name FROM information_schema.tables WHERE table_schema = 'regular'",
            &[],
        )
        .await
        .expect("Failed to query tables");

    let table_names: Vec<String> = tables.iter().map(|r| r.get(0)).collect();
    assert!(table_names.contains(&"FileUpload".to_string()));
}

/// Test de l'upsert par conflit sur le nom
#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_upsert_replaces_version_and_status() {
    let pool = create_test_pool().await.expect("Failed to create pool");
    setup_test_schema(&pool)
        .await
        .expect("Failed to setup schema");

    insert_record(&pool, "openheim.zip", Some("0.0.1"), "active")
        .await
        .expect("Failed to insert");
    insert_record(&pool, "openheim.zip", Some("0.0.2"), "active")
        .await
        .expect("Failed to upsert");

    let client = pool.get().await.expect("Failed to get client");
    let rows = client
        .query(
            r#"SELECT "version", "status" FROM regular."FileUpload" WHERE "name" = $1"#,
            &[&"openheim.zip"],
        )
        .await
        .expect("Query failed");

    // Un seul enregistrement par nom, porteur de la dernière version
    assert_eq!(rows.len(), 1);
    let version: Option<String> = rows[0].get(0);
    let status: String = rows[0].get(1);
    assert_eq!(version.as_deref(), Some("0.0.2"));
    assert_eq!(status, "active");
}

/// Test de la rétrogradation de l'actif précédent à l'activation
#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_activation_demotes_previous_active() {
    let pool = create_test_pool().await.expect("Failed to create pool");
    setup_test_schema(&pool)
        .await
        .expect("Failed to setup schema");

    insert_record(&pool, "other.zip", Some("1.0.0"), "active")
        .await
        .expect("Failed to insert");

    // Activation transactionnelle: rétrograder puis upsert
    let mut client = pool.get().await.expect("Failed to get client");
    let tx = client.transaction().await.expect("Failed to start tx");
    tx.execute(
        r#"UPDATE regular."FileUpload" SET "status" = 'passed' WHERE "status" = 'active'"#,
        &[],
    )
    .await
    .expect("Failed to demote");
    let created: DateTime<Utc> = Utc::now();
    tx.execute(
        r#"INSERT INTO regular."FileUpload"
           ("name", "baseName", "path", "version", "status", "createdDate")
           VALUES ($1, $2, $3, $4, 'active', $5)
           ON CONFLICT ("name")
           DO UPDATE SET "version" = EXCLUDED."version",
                         "status" = EXCLUDED."status",
                         "createdDate" = EXCLUDED."createdDate""#,
        &[
            &"openheim.zip",
            &"openheim",
            &"/srv/data-loader/processed_zips/openheim-0.0.1.zip",
            &Some("0.0.1"),
            &created,
        ],
    )
    .await
    .expect("Failed to upsert active");
    tx.commit().await.expect("Failed to commit");
    drop(client);

    // Exactement un enregistrement actif après activation
    let client = pool.get().await.expect("Failed to get client");
    let active: i64 = client
        .query_one(
            r#"SELECT COUNT(*) FROM regular."FileUpload" WHERE "status" = 'active'"#,
            &[],
        )
        .await
        .expect("Count failed")
        .get(0);
    assert_eq!(active, 1);

    let passed: String = client
        .query_one(
            r#"SELECT "status" FROM regular."FileUpload" WHERE "name" = $1"#,
            &[&"other.zip"],
        )
        .await
        .expect("Query failed")
        .get(0);
    assert_eq!(passed, "passed");
}

/// Test du calcul de version suivante depuis la dernière ligne
#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_latest_version_lookup() {
    let pool = create_test_pool().await.expect("Failed to create pool");
    setup_test_schema(&pool)
        .await
        .expect("Failed to setup schema");

    insert_record(&pool, "openheim.zip", Some("0.0.7"), "active")
        .await
        .expect("Failed to insert");

    let client = pool.get().await.expect("Failed to get client");
    let row = client
        .query_opt(
            r#"SELECT "version" FROM regular."FileUpload"
               WHERE "name" = $1
               ORDER BY "createdDate" DESC
               LIMIT 1"#,
            &[&"openheim.zip"],
        )
        .await
        .expect("Query failed");

    let latest: Option<String> = row.and_then(|r| r.get(0));
    assert_eq!(latest.as_deref(), Some("0.0.7"));

    // Nom inconnu: pas de ligne
    let absent = client
        .query_opt(
            r#"SELECT "version" FROM regular."FileUpload"
               WHERE "name" = $1
               ORDER BY "createdDate" DESC
               LIMIT 1"#,
            &[&"missing.zip"],
        )
        .await
        .expect("Query failed");
    assert!(absent.is_none());
}

/// Test du marquage d'échec sans version
#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_failed_record_has_no_version() {
    let pool = create_test_pool().await.expect("Failed to create pool");
    setup_test_schema(&pool)
        .await
        .expect("Failed to setup schema");

    insert_record(&pool, "openheim.zip", Some("0.0.3"), "active")
        .await
        .expect("Failed to insert");
    insert_record(&pool, "openheim.zip", None, "failed")
        .await
        .expect("Failed to mark failed");

    let client = pool.get().await.expect("Failed to get client");
    let row = client
        .query_one(
            r#"SELECT "version", "status" FROM regular."FileUpload" WHERE "name" = $1"#,
            &[&"openheim.zip"],
        )
        .await
        .expect("Query failed");

    let version: Option<String> = row.get(0);
    let status: String = row.get(1);
    assert!(version.is_none());
    assert_eq!(status, "failed");
}

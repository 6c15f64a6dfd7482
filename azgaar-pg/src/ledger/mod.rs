//! Ledger durable de versions et de statuts par nom d'archive
//!
//! Chaque nom d'archive possède au plus un enregistrement dans
//! `regular."FileUpload"` (upsert par conflit sur `name`). Le passage à
//! `active` rétrograde d'abord l'enregistrement actif précédent en `passed`
//! dans la même transaction : il n'existe jamais zéro ni deux
//! enregistrements actifs.
//!
//! Les échecs d'écriture du ledger en cours de boucle sont journalisés mais
//! non fatals : l'emplacement de l'archive sur le système de fichiers fait
//! foi, le ledger est une télémétrie au mieux. Un ledger injoignable au
//! démarrage reste en revanche fatal.

pub mod version;

use std::fmt;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use deadpool_postgres::{Config, GenericClient, Pool, PoolConfig, Runtime};
use tokio_postgres::NoTls;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
pub use version::Version;

/// Table du ledger (colonnes camelCase héritées du schéma applicatif)
const LEDGER_TABLE: &str = r#"regular."FileUpload""#;

/// Statut de cycle de vie d'un enregistrement d'archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    /// Archive détectée, pas encore traitée
    Uploaded,
    /// Version actuellement servie
    Active,
    /// Version supplantée par une activation plus récente
    Passed,
    /// Tentative de traitement échouée
    Failed,
}

impl UploadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadStatus::Uploaded => "uploaded",
            UploadStatus::Active => "active",
            UploadStatus::Passed => "passed",
            UploadStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enregistrement d'archive, clé conceptuelle `name`
#[derive(Debug, Clone)]
pub struct ArchiveRecord {
    /// Nom de l'archive entrante (clé unique)
    pub name: String,
    /// Nom de base sans extension
    pub base_name: String,
    /// Emplacement actuel de l'archive sur disque
    pub path: String,
    /// Version calculée pour cette tentative ; absente sur échec
    pub version: Option<Version>,
}

/// Accès au ledger via un pool de connexions
pub struct Ledger {
    pool: Pool,
}

impl Ledger {
    /// Crée le pool et sonde la connexion
    ///
    /// # Errors
    ///
    /// Une base injoignable au démarrage est une erreur fatale.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = create_pool(config)?;

        let client = pool
            .get()
            .await
            .context("Failed to get connection from ledger pool")?;
        client
            .execute("SELECT 1", &[])
            .await
            .context("Ledger connection probe failed")?;

        info!(
            host = %config.host,
            dbname = %config.dbname,
            "Connected to ledger database"
        );

        Ok(Self { pool })
    }

    /// Calcule la version de la prochaine tentative pour ce nom d'archive
    pub async fn next_version(&self, name: &str) -> Result<Version> {
        let client = self.pool.get().await?;

        let query = format!(
            r#"SELECT "version" FROM {LEDGER_TABLE}
               WHERE "name" = $1
               ORDER BY "createdDate" DESC
               LIMIT 1"#
        );
        let row = client
            .query_opt(&query, &[&name])
            .await
            .context("Failed to read latest version from ledger")?;

        let latest: Option<String> = row.and_then(|r| r.get(0));
        let next = Version::next_from(latest.as_deref());
        debug!(name = name, next = %next, "Computed next version");
        Ok(next)
    }

    /// Insère un enregistrement `uploaded` sans écraser l'existant
    pub async fn seed_uploaded(&self, record: &ArchiveRecord) -> Result<()> {
        let client = self.pool.get().await?;

        let query = format!(
            r#"INSERT INTO {LEDGER_TABLE}
               ("name", "baseName", "path", "version", "status", "createdDate")
               VALUES ($1, $2, $3, $4, $5, $6)
               ON CONFLICT ("name") DO NOTHING"#
        );
        let version = record.version.map(|v| v.to_string());
        let created: DateTime<Utc> = Utc::now();
        client
            .execute(
                &query,
                &[
                    &record.name,
                    &record.base_name,
                    &record.path,
                    &version,
                    &UploadStatus::Uploaded.as_str(),
                    &created,
                ],
            )
            .await
            .context("Failed to seed uploaded record")?;

        info!(name = %record.name, "Seeded uploaded ledger record");
        Ok(())
    }

    /// Active cette tentative : rétrograde l'actif précédent puis upsert
    ///
    /// Les deux écritures forment une seule transaction, seule exigence
    /// transactionnelle multi-instructions du système.
    pub async fn activate(&self, record: &ArchiveRecord) -> Result<()> {
        let mut client = self.pool.get().await?;
        let tx = client
            .transaction()
            .await
            .context("Failed to begin ledger transaction")?;

        let demote = format!(
            r#"UPDATE {LEDGER_TABLE} SET "status" = 'passed' WHERE "status" = 'active'"#
        );
        let demoted = tx
            .execute(&demote, &[])
            .await
            .context("Failed to demote previous active record")?;

        upsert(&tx, record, UploadStatus::Active).await?;

        tx.commit()
            .await
            .context("Failed to commit ledger activation")?;

        info!(
            name = %record.name,
            version = %record.version.map(|v| v.to_string()).unwrap_or_default(),
            demoted = demoted,
            "Ledger record activated"
        );
        Ok(())
    }

    /// Enregistre une tentative échouée (statut `failed`, sans version)
    pub async fn mark_failed(&self, record: &ArchiveRecord) -> Result<()> {
        let client = self.pool.get().await?;
        upsert(&client, record, UploadStatus::Failed).await?;

        info!(name = %record.name, "Ledger record marked failed");
        Ok(())
    }
}

/// Upsert par conflit sur `name` : seuls version, statut et horodatage
/// sont remplacés
async fn upsert(
    client: &impl GenericClient,
    record: &ArchiveRecord,
    status: UploadStatus,
) -> Result<()> {
    let query = format!(
        r#"INSERT INTO {LEDGER_TABLE}
           ("name", "baseName", "path", "version", "status", "createdDate")
           VALUES ($1, $2, $3, $4, $5, $6)
           ON CONFLICT ("name")
           DO UPDATE SET "version" = EXCLUDED."version",
                         "status" = EXCLUDED."status",
                         "createdDate" = EXCLUDED."createdDate""#
    );
    let version = record.version.map(|v| v.to_string());
    let created: DateTime<Utc> = Utc::now();

    client
        .execute(
            &query,
            &[
                &record.name,
                &record.base_name,
                &record.path,
                &version,
                &status.as_str(),
                &created,
            ],
        )
        .await
        .with_context(|| format!("Failed to upsert ledger record as {status}"))?;

    Ok(())
}

/// Crée le pool de connexions du ledger
fn create_pool(config: &DatabaseConfig) -> Result<Pool> {
    let mut cfg = Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.dbname = Some(config.dbname.clone());
    cfg.user = Some(config.user.clone());
    cfg.password = Some(config.password.clone());
    cfg.pool = Some(PoolConfig {
        max_size: config.pool_size,
        ..Default::default()
    });

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .context("Failed to create ledger pool")
}

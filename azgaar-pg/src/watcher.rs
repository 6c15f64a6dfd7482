//! Machine à états d'ingestion des archives
//!
//! Boucle séquentielle unique : au plus une archive en vol. La revendication
//! par renommage atomique protège contre un second tick de scrutation rapide,
//! pas contre des watchers parallèles (exclus par construction ; un
//! déploiement parallèle devrait réintroduire un bail dans le ledger).
//!
//! États : idle → claimed → validating → running → succeeded | failed,
//! les états terminaux ramenant à idle. Aucune étape n'est rejouée
//! automatiquement ; une nouvelle archive entrante du même nom constitue
//! une nouvelle tentative avec une version fraîchement calculée.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::Result;
use thiserror::Error;
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::clean;
use crate::config::{DatabaseConfig, Settings};
use crate::ledger::{ArchiveRecord, Ledger, Version};

/// Scripts externes exécutés depuis le répertoire de scripts
const DDL_SQL: &str = "01_spatial_schema.sql";
const OGR2OGR_SH: &str = "03_ogr2ogr_import.sh";
const ATTR_SQL: &str = "04_bulk_attribute_import.sql";

/// Échec attendu d'une tentative de traitement d'archive
///
/// Distinct des erreurs de programmation : chaque variante correspond à un
/// chemin de sortie prévu (archive déplacée vers failed, statut enregistré).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Membres requis absents du manifest de l'archive
    #[error("Archive is missing required members: {missing:?}")]
    Manifest { missing: Vec<String> },

    /// Archive illisible ou corrompue
    #[error("Unreadable archive: {0}")]
    Archive(String),

    /// Étape externe terminée avec un statut non nul
    #[error("Step '{name}' failed with exit code {code:?}")]
    Step { name: &'static str, code: Option<i32> },

    /// Étape interne d'extraction/nettoyage en échec
    #[error("Clean step failed: {0}")]
    Clean(String),

    /// Erreur d'I/O pendant le traitement
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Watcher du répertoire d'arrivée, pilote du pipeline
pub struct Watcher {
    settings: Settings,
    db: DatabaseConfig,
    ledger: Ledger,
}

impl Watcher {
    pub fn new(settings: Settings, db: DatabaseConfig, ledger: Ledger) -> Self {
        Self {
            settings,
            db,
            ledger,
        }
    }

    /// Boucle de scrutation : ne retourne jamais en fonctionnement normal
    pub async fn run(&self) -> Result<()> {
        self.ensure_dirs()?;

        info!(
            dir = %self.settings.watch_dir.display(),
            file = %self.settings.inbound_name,
            interval = ?self.settings.poll_interval,
            "Watching folder for inbound archive"
        );

        loop {
            if let Err(e) = self.poll_once().await {
                error!(error = %e, "Poll cycle failed");
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    /// Un tick de scrutation : revendique et traite au plus une archive
    pub async fn poll_once(&self) -> Result<()> {
        let inbound = self.settings.watch_dir.join(&self.settings.inbound_name);
        if !inbound.is_file() {
            return Ok(());
        }

        info!(path = %inbound.display(), "Found inbound archive");

        // Version de la tentative ; une lecture du ledger en échec n'empêche
        // pas le traitement
        let version = match self.ledger.next_version(&self.settings.inbound_name).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Ledger read failed, falling back to initial version");
                Version::initial()
            }
        };

        // Revendication : renommage atomique avant tout traitement
        let claimed = match claim(&inbound, self.settings.base_name(), version) {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Could not claim inbound archive, will retry");
                return Ok(());
            }
        };
        info!(path = %claimed.display(), version = %version, "Claimed archive");

        match self.process(&claimed).await {
            Ok(()) => self.finish_success(&claimed, version).await,
            Err(e) => {
                error!(error = %e, "Failed to process archive");
                self.finish_failure(&claimed).await;
            }
        }

        Ok(())
    }

    /// Pipeline d'une archive revendiquée, abandon à la première erreur
    async fn process(&self, claimed: &Path) -> Result<(), PipelineError> {
        // 1. Manifest, sans rien extraire
        check_manifest(claimed, &self.settings.required_members)?;

        // 2. Extraction en bloc dans le répertoire de travail
        self.extract_archive(claimed)?;

        // 3-6. Étapes en ordre strict
        self.run_step("schema", "psql", &self.psql_args(DDL_SQL)).await?;

        clean::run(&self.settings.data_dir, &self.settings)
            .map_err(|e| PipelineError::Clean(format!("{e:#}")))?;

        self.run_step("vector-load", "bash", &[OGR2OGR_SH.to_string()])
            .await?;
        self.run_step("attribute-load", "psql", &self.psql_args(ATTR_SQL))
            .await?;

        Ok(())
    }

    /// Chemin de succès : archivage, activation du ledger, élagage
    async fn finish_success(&self, claimed: &Path, version: Version) {
        info!("All steps completed successfully");

        let destination = self.move_archive(claimed, &self.settings.archive_dir);

        let record = self.record(&destination, Some(version));
        if let Err(e) = self.ledger.activate(&record).await {
            // Le système de fichiers fait foi ; le statut peut rester périmé
            error!(error = %e, "Ledger activation failed (status may be stale)");
        }

        match prune_archive_dir(&self.settings.archive_dir, self.settings.keep_archives) {
            Ok(0) => {}
            Ok(removed) => info!(removed = removed, "Pruned old archived zips"),
            Err(e) => error!(error = %e, "Failed to prune archive directory"),
        }
    }

    /// Chemin d'échec : déplacement vers failed, statut enregistré
    async fn finish_failure(&self, claimed: &Path) {
        let destination = self.move_archive(claimed, &self.settings.failed_dir);

        let record = self.record(&destination, None);
        if let Err(e) = self.ledger.mark_failed(&record).await {
            error!(error = %e, "Ledger failure record could not be written");
        }
    }

    /// Déplace l'archive revendiquée ; en cas d'échec du déplacement,
    /// l'archive reste en place et son chemin actuel est enregistré
    fn move_archive(&self, claimed: &Path, target_dir: &Path) -> PathBuf {
        let file_name = claimed.file_name().unwrap_or_default();
        let destination = target_dir.join(file_name);

        match move_file(claimed, &destination) {
            Ok(()) => {
                info!(from = %claimed.display(), to = %destination.display(), "Moved archive");
                destination
            }
            Err(e) => {
                error!(
                    error = %e,
                    path = %claimed.display(),
                    "Could not move archive, leaving it in place"
                );
                claimed.to_path_buf()
            }
        }
    }

    fn record(&self, path: &Path, version: Option<Version>) -> ArchiveRecord {
        ArchiveRecord {
            name: self.settings.inbound_name.clone(),
            base_name: self.settings.base_name().to_string(),
            path: path.display().to_string(),
            version,
        }
    }

    fn extract_archive(&self, claimed: &Path) -> Result<(), PipelineError> {
        let file = fs::File::open(claimed)?;
        let mut archive =
            zip::ZipArchive::new(file).map_err(|e| PipelineError::Archive(e.to_string()))?;
        archive
            .extract(&self.settings.data_dir)
            .map_err(|e| PipelineError::Archive(e.to_string()))?;

        info!(dir = %self.settings.data_dir.display(), "Extracted archive to data directory");
        Ok(())
    }

    /// Exécute une étape externe ; le seul contrat observable est le code
    /// de sortie du processus
    async fn run_step(
        &self,
        name: &'static str,
        program: &str,
        args: &[String],
    ) -> Result<(), PipelineError> {
        info!(step = name, program = program, "Running pipeline step");

        let status = Command::new(program)
            .args(args)
            .current_dir(&self.settings.scripts_dir)
            .env("PGHOST", &self.db.host)
            .env("PGPORT", self.db.port.to_string())
            .env("PGDATABASE", &self.db.dbname)
            .env("PGUSER", &self.db.user)
            .env("PGPASSWORD", &self.db.password)
            .status()
            .await?;

        if status.success() {
            info!(step = name, "Pipeline step completed");
            Ok(())
        } else {
            Err(PipelineError::Step {
                name,
                code: status.code(),
            })
        }
    }

    fn psql_args(&self, script: &str) -> Vec<String> {
        vec![
            self.db.dbname.clone(),
            "-U".to_string(),
            self.db.user.clone(),
            "-v".to_string(),
            "ON_ERROR_STOP=1".to_string(),
            "-f".to_string(),
            script.to_string(),
        ]
    }

    fn ensure_dirs(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.settings.data_dir)?;
        fs::create_dir_all(&self.settings.archive_dir)?;
        fs::create_dir_all(&self.settings.failed_dir)?;
        Ok(())
    }
}

/// Revendique l'archive entrante par renommage atomique dans son répertoire
///
/// Le nom de travail embarque la version de la tentative ; les archives
/// conservées restent ainsi distinguables après archivage.
pub fn claim(inbound: &Path, base_name: &str, version: Version) -> std::io::Result<PathBuf> {
    let claimed = inbound.with_file_name(format!("{base_name}-{version}.zip"));
    fs::rename(inbound, &claimed)?;
    Ok(claimed)
}

/// Déplace un fichier, avec repli copie puis suppression
///
/// Le renommage échoue (EXDEV) quand la source et la destination ne sont
/// pas sur le même système de fichiers, cas des répertoires par défaut
/// (`/var/www/html` et `/srv`). Le repli garantit que l'archive quitte
/// toujours le répertoire surveillé.
pub fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}

/// Vérifie la présence de tous les membres requis sans extraire
pub fn check_manifest(path: &Path, required: &[String]) -> Result<(), PipelineError> {
    let file = fs::File::open(path)?;
    let archive = zip::ZipArchive::new(file).map_err(|e| PipelineError::Archive(e.to_string()))?;

    let names: HashSet<&str> = archive.file_names().collect();
    let missing: Vec<String> = required
        .iter()
        .filter(|member| !names.contains(member.as_str()))
        .cloned()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::Manifest { missing })
    }
}

/// Ne conserve que les `keep` zips les plus récemment modifiés
///
/// Retourne le nombre de fichiers supprimés.
pub fn prune_archive_dir(dir: &Path, keep: usize) -> std::io::Result<usize> {
    let mut zips: Vec<(PathBuf, SystemTime)> = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "zip") {
            let modified = entry.metadata()?.modified()?;
            zips.push((path, modified));
        }
    }

    if zips.len() <= keep {
        return Ok(0);
    }

    // Les plus récents d'abord
    zips.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = 0;
    for (path, _) in &zips[keep..] {
        match fs::remove_file(path) {
            Ok(()) => {
                info!(path = %path.display(), "Deleted old archived zip");
                removed += 1;
            }
            Err(e) => warn!(error = %e, path = %path.display(), "Failed to delete old zip"),
        }
    }

    Ok(removed)
}

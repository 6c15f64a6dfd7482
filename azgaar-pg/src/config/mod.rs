//! Configuration du système
//!
//! Valeur explicite construite au démarrage et passée au watcher et au
//! pipeline : pas d'état global. La table de règles par fichier remplace le
//! dispatch par sous-chaîne de nom de fichier et est validée avant la
//! première itération de la boucle.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use azgaar::IdStrategy;

/// Fichiers de sortie générés par l'étape d'extraction
pub const LAND_OUTPUT_FILE: &str = "openheim_land_cleaned.geojson";
pub const RIVERS_OUTPUT_FILE: &str = "openheim_rivers_cleaned.geojson";

/// Types de géométries GeoJSON reconnus par les allow-lists
const KNOWN_GEOMETRY_KINDS: &[&str] = &[
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
];

/// Règle de nettoyage/validation d'un fichier annexe
#[derive(Debug, Clone)]
pub struct FileRule {
    /// Nom du fichier dans le répertoire de données
    pub file: String,

    /// Stratégie de normalisation du `properties.id`
    pub strategy: IdStrategy,

    /// Retourner l'axe Y (fichier encore dans le repère source SVG)
    pub flip: bool,

    /// Allow-list de types de géométries ; `None` désactive la validation
    pub allowed: Option<Vec<String>>,
}

impl FileRule {
    fn new(file: &str, strategy: IdStrategy, flip: bool, allowed: Option<&[&str]>) -> Self {
        Self {
            file: file.to_string(),
            strategy,
            flip,
            allowed: allowed.map(|kinds| kinds.iter().map(|k| k.to_string()).collect()),
        }
    }
}

/// Configuration principale du watcher et du pipeline
#[derive(Debug, Clone)]
pub struct Settings {
    /// Répertoire surveillé pour l'archive entrante
    pub watch_dir: PathBuf,

    /// Répertoire de travail, écrasé en bloc à chaque extraction
    pub data_dir: PathBuf,

    /// Répertoire des archives traitées avec succès
    pub archive_dir: PathBuf,

    /// Répertoire des archives en échec
    pub failed_dir: PathBuf,

    /// Répertoire des scripts externes (DDL, ogr2ogr, SQL d'attributs)
    pub scripts_dir: PathBuf,

    /// Intervalle entre deux scrutations du répertoire
    pub poll_interval: Duration,

    /// Nom fixe de l'archive entrante
    pub inbound_name: String,

    /// Nom du dessin SVG dans l'archive
    pub svg_file: String,

    /// Hauteur du canvas SVG pour le retournement de l'axe Y
    pub svg_height: f64,

    /// Nombre d'archives conservées après élagage
    pub keep_archives: usize,

    /// Membres requis de l'archive (manifest, vérifié par nom exact)
    pub required_members: Vec<String>,

    /// Table de règles par fichier, dans l'ordre de traitement
    pub file_rules: Vec<FileRule>,
}

impl Settings {
    /// Construit la configuration par défaut du projet Openheim
    ///
    /// Les chemins de répertoires sont surchargés par les variables
    /// d'environnement `DATA_DIR`, `ARCHIVE_DIR`, `FAILED_DIR` et
    /// `SCRIPTS_DIR` si présentes.
    pub fn new(watch_dir: Option<PathBuf>) -> Self {
        Self {
            watch_dir: watch_dir.unwrap_or_else(|| PathBuf::from("/var/www/html/azgaar")),
            data_dir: env_path("DATA_DIR", "/srv/data-loader/data"),
            archive_dir: env_path("ARCHIVE_DIR", "/srv/data-loader/processed_zips"),
            failed_dir: env_path("FAILED_DIR", "/srv/data-loader/failed_zips"),
            scripts_dir: env_path("SCRIPTS_DIR", "/srv/data-loader"),
            poll_interval: Duration::from_secs(10),
            inbound_name: "openheim.zip".to_string(),
            svg_file: "openheim.svg".to_string(),
            svg_height: 2000.0,
            keep_archives: 3,
            required_members: [
                "cells.geojson",
                "openheim.svg",
                "biomes.csv",
                "burgs.csv",
                "cultures.csv",
                "markers.csv",
                "provinces.csv",
                "religions.csv",
                "rivers.csv",
                "routes.csv",
                "markers.geojson",
                "rivers.geojson",
                "routes.geojson",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            file_rules: vec![
                FileRule::new("cells.geojson", IdStrategy::Generic, true, None),
                FileRule::new("markers.geojson", IdStrategy::Marker, true, None),
                FileRule::new("routes.geojson", IdStrategy::Generic, true, None),
                FileRule::new(
                    LAND_OUTPUT_FILE,
                    IdStrategy::Generic,
                    false,
                    Some(&["Polygon", "MultiPolygon"]),
                ),
                FileRule::new(
                    RIVERS_OUTPUT_FILE,
                    IdStrategy::River,
                    false,
                    Some(&["LineString"]),
                ),
            ],
        }
    }

    /// Valide la cohérence de la configuration au démarrage
    pub fn validate(&self) -> Result<()> {
        if self.required_members.is_empty() {
            bail!("Required archive member list is empty");
        }
        if self.keep_archives == 0 {
            bail!("Archive retention must keep at least one zip");
        }
        if self.poll_interval.is_zero() {
            bail!("Poll interval must be non-zero");
        }
        if self.svg_height <= 0.0 {
            bail!("SVG height must be positive");
        }

        let mut seen = std::collections::HashSet::new();
        for rule in &self.file_rules {
            if !seen.insert(rule.file.as_str()) {
                bail!("Duplicate file rule: {}", rule.file);
            }
            if let Some(allowed) = &rule.allowed {
                for kind in allowed {
                    if !KNOWN_GEOMETRY_KINDS.contains(&kind.as_str()) {
                        bail!("Unknown geometry kind '{}' in rule for {}", kind, rule.file);
                    }
                }
            }
        }

        Ok(())
    }

    /// Nom de base de l'archive entrante, sans extension
    pub fn base_name(&self) -> &str {
        self.inbound_name
            .strip_suffix(".zip")
            .unwrap_or(&self.inbound_name)
    }
}

fn env_path(var: &str, default: &str) -> PathBuf {
    std::env::var_os(var)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

/// Configuration de la base de données du ledger
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub pool_size: usize,
}

impl DatabaseConfig {
    /// Charge la configuration depuis les variables d'environnement
    ///
    /// # Errors
    ///
    /// L'absence de `PGPASSWORD` est une erreur fatale au démarrage : le
    /// watcher ne démarre jamais sans identifiants complets.
    pub fn from_env() -> Result<Self> {
        let password = std::env::var("PGPASSWORD")
            .context("PGPASSWORD is required (set it in the environment or .env)")?;

        Ok(Self {
            host: std::env::var("PGHOST").unwrap_or_else(|_| "localhost".into()),
            port: std::env::var("PGPORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("PGDATABASE").unwrap_or_else(|_| "openheim".into()),
            user: std::env::var("PGUSER").unwrap_or_else(|_| "postgres".into()),
            password,
            pool_size: std::env::var("POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(4),
        })
    }
}

//! Étape d'extraction et de nettoyage du jeu de données
//!
//! Pilotée en interne par le watcher, mais aussi exposée comme
//! sous-commande `clean` : son contrat reste un code de sortie, comme les
//! autres étapes du pipeline.
//!
//! Déroulement : extraction land/rivières depuis le SVG, nettoyage en place
//! des fichiers annexes selon la table de règles, puis validation des
//! allow-lists de géométries. Un fichier d'entrée manquant est un simple
//! avertissement ; une validation en échec est fatale pour toute la passe
//! car les chargements en aval supposent des types homogènes par table.

use std::fs;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{bail, Context, Result};
use azgaar::coords::flip_y_value;
use azgaar::ids::normalize_id;
use azgaar::ExtractOptions;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::{FileRule, Settings, LAND_OUTPUT_FILE, RIVERS_OUTPUT_FILE};

/// Exécute la passe complète d'extraction, nettoyage et validation
pub fn run(data_dir: &Path, settings: &Settings) -> Result<()> {
    // 1. Extraction depuis le dessin SVG
    let svg_path = data_dir.join(&settings.svg_file);
    info!(path = %svg_path.display(), "Parsing SVG file");

    let options = ExtractOptions {
        svg_height: settings.svg_height,
    };
    let extracted = azgaar::extract(&svg_path, &options)
        .with_context(|| format!("Failed to extract features from {}", svg_path.display()))?;

    for err in &extracted.errors {
        warn!(error = %err, "Shape skipped during extraction");
    }

    write_collection(&data_dir.join(LAND_OUTPUT_FILE), extracted.land)?;
    write_collection(&data_dir.join(RIVERS_OUTPUT_FILE), extracted.rivers)?;

    // 2. Nettoyage en place des fichiers annexes
    for rule in &settings.file_rules {
        clean_file(data_dir, rule, settings.svg_height)?;
    }

    // 3. Validation des allow-lists
    for rule in &settings.file_rules {
        if let Some(allowed) = &rule.allowed {
            validate_file(data_dir, &rule.file, allowed)?;
        }
    }

    Ok(())
}

/// Écrit une FeatureCollection sur disque
fn write_collection(path: &Path, features: Vec<geojson::Feature>) -> Result<()> {
    let collection = geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };

    let file = fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &collection)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!(path = %path.display(), count = collection.features.len(), "Exported feature collection");
    Ok(())
}

/// Nettoie un fichier selon sa règle ; retourne true si réécrit
///
/// Un fichier absent est ignoré avec un avertissement : certains exports
/// n'embarquent pas tous les fichiers annexes.
pub fn clean_file(data_dir: &Path, rule: &FileRule, svg_height: f64) -> Result<bool> {
    let path = data_dir.join(&rule.file);
    if !path.is_file() {
        warn!(path = %path.display(), "File does not exist and will be skipped");
        return Ok(false);
    }

    let text = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut data: Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse JSON in {}", path.display()))?;

    let mut changed = false;

    if let Some(features) = data.get_mut("features").and_then(Value::as_array_mut) {
        for feature in features.iter_mut() {
            // Identifiant canonique
            if let Some(props) = feature.get_mut("properties").and_then(Value::as_object_mut) {
                let old = props.get("id").cloned().unwrap_or(Value::Null);
                let new = normalize_id(rule.strategy, &old);
                if new != old {
                    props.insert("id".to_string(), new);
                    changed = true;
                }
            }

            // Retour vers le repère cartésien pour les fichiers encore en
            // coordonnées source
            if rule.flip {
                if let Some(geom) = feature.get_mut("geometry").and_then(Value::as_object_mut) {
                    if let Some(coords) = geom.get("coordinates") {
                        let flipped = flip_y_value(coords, svg_height);
                        geom.insert("coordinates".to_string(), flipped);
                        changed = true;
                    }
                }
            }
        }
    }

    if changed {
        let file = fs::File::create(&path)
            .with_context(|| format!("Failed to rewrite {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &data)
            .with_context(|| format!("Failed to rewrite {}", path.display()))?;
        info!(path = %path.display(), "Cleaned and rewrote file");
    } else {
        info!(path = %path.display(), "No change needed");
    }

    Ok(changed)
}

/// Vérifie que chaque feature du fichier porte un type de géométrie autorisé
///
/// Toute non-conformité est fatale : les features fautives sont toutes
/// journalisées avant l'abandon.
pub fn validate_file(data_dir: &Path, file: &str, allowed: &[String]) -> Result<()> {
    let path = data_dir.join(file);
    if !path.is_file() {
        warn!(path = %path.display(), "Validation skipped (file not found)");
        return Ok(());
    }

    let text = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let data: Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse JSON in {}", path.display()))?;

    let mut invalid = 0_usize;
    if let Some(features) = data.get("features").and_then(Value::as_array) {
        for (index, feature) in features.iter().enumerate() {
            let kind = feature
                .get("geometry")
                .and_then(|g| g.get("type"))
                .and_then(Value::as_str)
                .unwrap_or("<missing>");

            if !allowed.iter().any(|a| a == kind) {
                error!(
                    path = %path.display(),
                    feature = index,
                    kind = kind,
                    expected = ?allowed,
                    "Feature has unexpected geometry type"
                );
                invalid += 1;
            }
        }
    }

    if invalid > 0 {
        bail!(
            "Validation failed for {}: {} feature(s) with unexpected geometry type",
            path.display(),
            invalid
        );
    }

    info!(path = %path.display(), "Validation passed");
    Ok(())
}

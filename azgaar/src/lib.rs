//! # azgaar
//!
//! Parser pour les exports SVG du générateur de cartes Azgaar
//! (Fantasy Map Generator), tel qu'utilisé par le projet Openheim.
//!
//! ## Features
//!
//! - Extraction des contours land/eau douce depuis le masque et le groupe
//!   de références du dessin
//! - Polygones à trous : l'eau douce fusionnée est soustraite des terres
//! - Rivières en LineString, identifiants normalisés en entiers
//! - Axe Y retourné vers le repère cartésien GeoJSON
//!
//! ## Usage
//!
//! ```rust,ignore
//! use azgaar::{extract, ExtractOptions};
//! use std::path::Path;
//!
//! let result = extract(Path::new("openheim.svg"), &ExtractOptions::default())?;
//! println!("{} land, {} rivers", result.land.len(), result.rivers.len());
//! ```

pub mod coords;
pub mod error;
pub mod features;
pub mod ids;
pub mod path;
pub mod svg;
pub mod types;

pub use error::AzgaarError;
pub use ids::IdStrategy;
pub use types::{ExtractOptions, ExtractResult};

use std::path::Path;

use tracing::info;

/// Extrait les features land et rivières d'un export SVG Azgaar.
///
/// # Arguments
///
/// * `svg_path` - Chemin vers le fichier SVG exporté
/// * `options` - Options d'extraction (hauteur du canvas)
///
/// # Returns
///
/// Un `ExtractResult` contenant les features land (polygones à trous), les
/// features rivières, et les erreurs non fatales rencontrées (formes
/// ignorées).
///
/// # Errors
///
/// Retourne `AzgaarError` si le fichier est illisible ou si le document
/// SVG est invalide. Une forme individuelle malformée n'est jamais fatale.
pub fn extract(svg_path: &Path, options: &ExtractOptions) -> Result<ExtractResult, AzgaarError> {
    // 1. Lire et parser le document
    let text = std::fs::read_to_string(svg_path)?;
    let map = svg::parse_document(&text)?;

    // 2. Construire les features land puis rivières
    let (land, mut errors) = features::extract_land(&map, options.svg_height);
    let (rivers, mut river_errors) = features::extract_rivers(&map, options.svg_height);
    errors.append(&mut river_errors);

    info!(
        land = land.len(),
        rivers = rivers.len(),
        skipped = errors.len(),
        "Extracted features from SVG"
    );

    Ok(ExtractResult {
        land,
        rivers,
        errors,
    })
}

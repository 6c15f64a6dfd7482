//! Types de données pour le crate azgaar

use crate::AzgaarError;

/// Options d'extraction
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// Hauteur du canvas SVG, utilisée pour retourner l'axe Y
    /// (le SVG a l'origine en haut à gauche, le GeoJSON en bas à gauche)
    pub svg_height: f64,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        // Hauteur des exports Azgaar du projet Openheim
        Self { svg_height: 2000.0 }
    }
}

/// Résultat de l'extraction d'un export SVG
#[derive(Debug)]
pub struct ExtractResult {
    /// Features land (Polygon/MultiPolygon, trous d'eau douce soustraits)
    pub land: Vec<geojson::Feature>,

    /// Features rivières (LineString)
    pub rivers: Vec<geojson::Feature>,

    /// Erreurs non fatales rencontrées pendant l'extraction
    /// (formes au path invalide ou à la géométrie dégénérée, ignorées)
    pub errors: Vec<AzgaarError>,
}

impl ExtractResult {
    /// Nombre total de features extraites
    pub fn feature_count(&self) -> usize {
        self.land.len() + self.rivers.len()
    }
}

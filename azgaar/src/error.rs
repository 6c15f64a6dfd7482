//! Types d'erreurs pour le crate azgaar

use thiserror::Error;

/// Erreurs pouvant survenir lors de l'extraction d'un export SVG
#[derive(Debug, Error)]
pub enum AzgaarError {
    /// Erreur d'I/O lors de la lecture du fichier SVG
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document SVG illisible
    #[error("Invalid SVG document: {0}")]
    InvalidDocument(String),

    /// Chaîne de commandes `d` invalide pour une forme
    ///
    /// Fatale pour la forme concernée uniquement, pas pour l'extraction.
    #[error("Invalid path data for shape {shape_id}: {reason}")]
    InvalidPath { shape_id: String, reason: String },

    /// Géométrie dégénérée après opération booléenne
    #[error("Degenerate geometry for shape {shape_id}: {reason}")]
    DegenerateGeometry { shape_id: String, reason: String },
}

impl AzgaarError {
    /// Crée une erreur de path invalide avec contexte
    pub fn invalid_path(shape_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            shape_id: shape_id.into(),
            reason: reason.into(),
        }
    }

    /// Crée une erreur de géométrie dégénérée
    pub fn degenerate(shape_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DegenerateGeometry {
            shape_id: shape_id.into(),
            reason: reason.into(),
        }
    }
}

//! Extraction de coordonnées depuis le mini-langage de path SVG
//!
//! Chaque segment de dessin est échantillonné par ses points de départ et
//! d'arrivée. Les courbes (cubiques, quadratiques, arcs) ne sont pas
//! aplaties : seuls leurs points terminaux sont conservés, ce qui suffit
//! pour les contours générés par Azgaar.

use svgtypes::{PathParser, PathSegment};

use crate::AzgaarError;

/// Convertit une chaîne de commandes `d` en liste ordonnée de points (x, y)
///
/// Supporte les commandes absolues et relatives ainsi que les sous-chemins
/// multiples. Une chaîne malformée retourne une erreur contextualisée par
/// l'identifiant de la forme : l'appelant doit ignorer la forme concernée,
/// pas interrompre l'extraction.
pub fn path_to_coords(shape_id: &str, d: &str) -> Result<Vec<(f64, f64)>, AzgaarError> {
    parse(d).map_err(|reason| AzgaarError::invalid_path(shape_id, reason))
}

fn parse(d: &str) -> Result<Vec<(f64, f64)>, String> {
    let mut coords: Vec<(f64, f64)> = Vec::new();

    // Point courant et point de départ du sous-chemin en cours
    let (mut cx, mut cy) = (0.0_f64, 0.0_f64);
    let (mut sx, mut sy) = (0.0_f64, 0.0_f64);

    for segment in PathParser::from(d) {
        let segment = segment.map_err(|e| e.to_string())?;

        match segment {
            PathSegment::MoveTo { abs, x, y } => {
                let (nx, ny) = resolve(abs, x, y, cx, cy);
                cx = nx;
                cy = ny;
                sx = nx;
                sy = ny;
            }
            PathSegment::LineTo { abs, x, y } => {
                let (nx, ny) = resolve(abs, x, y, cx, cy);
                push_segment(&mut coords, (cx, cy), (nx, ny));
                cx = nx;
                cy = ny;
            }
            PathSegment::HorizontalLineTo { abs, x } => {
                let nx = if abs { x } else { cx + x };
                push_segment(&mut coords, (cx, cy), (nx, cy));
                cx = nx;
            }
            PathSegment::VerticalLineTo { abs, y } => {
                let ny = if abs { y } else { cy + y };
                push_segment(&mut coords, (cx, cy), (cx, ny));
                cy = ny;
            }
            PathSegment::CurveTo { abs, x, y, .. }
            | PathSegment::SmoothCurveTo { abs, x, y, .. }
            | PathSegment::Quadratic { abs, x, y, .. }
            | PathSegment::SmoothQuadratic { abs, x, y }
            | PathSegment::EllipticalArc { abs, x, y, .. } => {
                let (nx, ny) = resolve(abs, x, y, cx, cy);
                push_segment(&mut coords, (cx, cy), (nx, ny));
                cx = nx;
                cy = ny;
            }
            PathSegment::ClosePath { .. } => {
                push_segment(&mut coords, (cx, cy), (sx, sy));
                cx = sx;
                cy = sy;
            }
        }
    }

    Ok(coords)
}

fn resolve(abs: bool, x: f64, y: f64, cx: f64, cy: f64) -> (f64, f64) {
    if abs {
        (x, y)
    } else {
        (cx + x, cy + y)
    }
}

/// Ajoute les deux extrémités d'un segment en évitant de répéter le point
/// de départ lorsqu'il est déjà le dernier point émis
fn push_segment(coords: &mut Vec<(f64, f64)>, start: (f64, f64), end: (f64, f64)) {
    if coords.last() != Some(&start) {
        coords.push(start);
    }
    coords.push(end);
}

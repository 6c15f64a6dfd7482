//! Normalisation de séquences de coordonnées
//!
//! Opérations composables sur des listes de points (x, y) et sur les
//! tableaux de coordonnées GeoJSON bruts, quel que soit le type de
//! géométrie.

use serde_json::Value;

/// Supprime les doublons consécutifs en préservant l'ordre
///
/// Une séquence vide est retournée telle quelle.
pub fn deduplicate(coords: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    let mut deduped: Vec<(f64, f64)> = Vec::with_capacity(coords.len());
    for pt in coords {
        if deduped.last() != Some(&pt) {
            deduped.push(pt);
        }
    }
    deduped
}

/// Ferme un ring en répétant le premier point si nécessaire
///
/// Idempotent. À n'appliquer qu'aux rings de polygones, jamais aux lignes
/// ouvertes.
pub fn ensure_closed(mut coords: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    if let (Some(&first), Some(&last)) = (coords.first(), coords.last()) {
        if first != last {
            coords.push(first);
        }
    }
    coords
}

/// Retourne l'axe Y : `y := height - y`
///
/// Appliquée deux fois avec la même hauteur, c'est l'identité.
pub fn flip_y(coords: &mut [(f64, f64)], height: f64) {
    for pt in coords.iter_mut() {
        pt.1 = height - pt.1;
    }
}

/// Retourne l'axe Y d'un tableau de coordonnées GeoJSON, à profondeur
/// d'imbrication arbitraire
///
/// Un tableau de deux nombres est traité comme une paire (x, y) quel que
/// soit son niveau d'imbrication, ce qui couvre Point, LineString, Polygon,
/// MultiLineString et MultiPolygon sans branchement par type. Toute valeur
/// non-tableau est retournée inchangée.
pub fn flip_y_value(coords: &Value, height: f64) -> Value {
    let Value::Array(items) = coords else {
        return coords.clone();
    };

    if items.len() == 2 && items.iter().all(Value::is_number) {
        let x = items[0].as_f64().unwrap_or_default();
        let y = items[1].as_f64().unwrap_or_default();
        return serde_json::json!([x, height - y]);
    }

    Value::Array(items.iter().map(|c| flip_y_value(c, height)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deduplicate() {
        let coords = vec![(0.0, 0.0), (0.0, 0.0), (1.0, 1.0), (1.0, 1.0), (0.0, 0.0)];
        assert_eq!(
            deduplicate(coords),
            vec![(0.0, 0.0), (1.0, 1.0), (0.0, 0.0)]
        );
    }

    #[test]
    fn test_deduplicate_empty() {
        assert!(deduplicate(vec![]).is_empty());
    }

    #[test]
    fn test_ensure_closed() {
        let closed = ensure_closed(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        assert_eq!(closed.first(), closed.last());
        // Idempotence
        assert_eq!(ensure_closed(closed.clone()), closed);
    }

    #[test]
    fn test_ensure_closed_empty() {
        assert!(ensure_closed(vec![]).is_empty());
    }

    #[test]
    fn test_flip_y_involution() {
        let original = vec![(3.5, 10.25), (0.0, 2000.0), (-4.0, -1.5)];
        let mut coords = original.clone();
        flip_y(&mut coords, 2000.0);
        flip_y(&mut coords, 2000.0);
        assert_eq!(coords, original);
    }

    #[test]
    fn test_flip_y_value_point() {
        let flipped = flip_y_value(&json!([5.0, 30.0]), 100.0);
        assert_eq!(flipped, json!([5.0, 70.0]));
    }

    #[test]
    fn test_flip_y_value_polygon() {
        let poly = json!([[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 0.0]]]);
        let flipped = flip_y_value(&poly, 100.0);
        assert_eq!(
            flipped,
            json!([[[0.0, 100.0], [10.0, 100.0], [10.0, 90.0], [0.0, 100.0]]])
        );
    }

    #[test]
    fn test_flip_y_value_multipolygon_depth() {
        // Trois niveaux d'imbrication : la paire reste détectée au fond
        let mp = json!([[[[1.0, 25.0], [2.0, 25.0], [1.0, 25.0]]]]);
        let flipped = flip_y_value(&mp, 50.0);
        assert_eq!(flipped, json!([[[[1.0, 25.0], [2.0, 25.0], [1.0, 25.0]]]]));
    }

    #[test]
    fn test_flip_y_value_non_array_unchanged() {
        assert_eq!(flip_y_value(&json!("text"), 100.0), json!("text"));
        assert_eq!(flip_y_value(&Value::Null, 100.0), Value::Null);
    }
}

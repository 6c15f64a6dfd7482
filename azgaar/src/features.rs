//! Construction des features land et rivières depuis le dessin
//!
//! Les terres et les étendues d'eau douce sont des polygones candidats ;
//! l'eau douce est fusionnée puis soustraite des terres pour produire des
//! polygones à trous. Les requêtes d'aire et d'adjacence en aval restent
//! ainsi correctes sans découpage a posteriori.

use geo::{BooleanOps, LineString, MultiPolygon, Polygon, Validation};
use serde_json::Value;
use tracing::warn;

use crate::coords;
use crate::ids::{normalize_id, IdStrategy};
use crate::path;
use crate::svg::SvgMap;
use crate::AzgaarError;

/// Construit les features land (trous d'eau douce soustraits)
///
/// Un polygone land scindé par la soustraction produit une feature par
/// morceau, chacune héritant du même identifiant normalisé. Les formes hors
/// des deux ensembles de références sont ignorées.
pub fn extract_land(map: &SvgMap, height: f64) -> (Vec<geojson::Feature>, Vec<AzgaarError>) {
    let mut errors = Vec::new();
    let mut land: Vec<(String, MultiPolygon<f64>)> = Vec::new();
    let mut freshwater: Vec<MultiPolygon<f64>> = Vec::new();

    // 1. Classifier chaque forme par appartenance aux ensembles de références
    for shape in &map.shapes {
        let is_land = map.land_ids.contains(&shape.id);
        let is_freshwater = !is_land && map.freshwater_ids.contains(&shape.id);
        if !is_land && !is_freshwater {
            continue;
        }

        // 2. Polygone candidat : dédupliqué, fermé de force, axe Y retourné
        let Some(polygon) = shape_to_polygon(shape, height, &mut errors) else {
            continue;
        };

        if is_land {
            land.push((shape.id.clone(), polygon));
        } else {
            freshwater.push(polygon);
        }
    }

    // 3. Fusionner l'eau douce en une seule région
    let freshwater_union = merge_freshwater(&freshwater);

    // 4. Soustraire la région d'eau douce de chaque polygone land
    let mut features = Vec::new();
    for (shape_id, polygon) in land {
        let carved = match &freshwater_union {
            Some(freshwater) => polygon.difference(freshwater),
            None => polygon,
        };

        if carved.0.is_empty() {
            warn!(shape_id = %shape_id, "Land polygon degenerated after freshwater subtraction, dropped");
            errors.push(AzgaarError::degenerate(
                &shape_id,
                "empty result after freshwater subtraction",
            ));
            continue;
        }

        let id = normalize_id(IdStrategy::River, &Value::String(shape_id));
        for piece in &carved {
            features.push(feature(geojson::Value::from(piece), id.clone(), "land"));
        }
    }

    (features, errors)
}

/// Construit les features rivières (LineString) depuis les formes `river*`
pub fn extract_rivers(map: &SvgMap, height: f64) -> (Vec<geojson::Feature>, Vec<AzgaarError>) {
    let mut features = Vec::new();
    let mut errors = Vec::new();

    for shape in &map.shapes {
        if !shape.id.starts_with("river") {
            continue;
        }

        let coords = match path::path_to_coords(&shape.id, &shape.d) {
            Ok(c) => c,
            Err(e) => {
                warn!(shape_id = %shape.id, error = %e, "Skipping river with invalid path data");
                errors.push(e);
                continue;
            }
        };

        // Lignes ouvertes : jamais fermées, uniquement dédupliquées et retournées
        let mut coords = coords::deduplicate(coords);
        coords::flip_y(&mut coords, height);
        if coords.len() < 2 {
            continue;
        }

        let line = LineString::from(coords);
        let id = normalize_id(IdStrategy::River, &Value::String(shape.id.clone()));
        features.push(feature(geojson::Value::from(&line), id, "river"));
    }

    (features, errors)
}

/// Transforme une forme en polygone candidat, réparé si invalide
fn shape_to_polygon(
    shape: &crate::svg::PathShape,
    height: f64,
    errors: &mut Vec<AzgaarError>,
) -> Option<MultiPolygon<f64>> {
    let coords = match path::path_to_coords(&shape.id, &shape.d) {
        Ok(c) => c,
        Err(e) => {
            warn!(shape_id = %shape.id, error = %e, "Skipping shape with invalid path data");
            errors.push(e);
            return None;
        }
    };

    let coords = coords::deduplicate(coords);
    // Fermeture forcée : même une forme ouverte dans le source est traitée
    // comme un polygone candidat
    let mut coords = coords::ensure_closed(coords);
    coords::flip_y(&mut coords, height);

    // Un ring fermé porte au moins 4 points
    if coords.len() <= 3 {
        return None;
    }

    let polygon = Polygon::new(LineString::from(coords), vec![]);
    if polygon.is_valid() {
        Some(MultiPolygon::new(vec![polygon]))
    } else {
        Some(repair(polygon))
    }
}

/// Répare un polygone auto-intersectant par une passe d'union booléenne
/// (l'équivalent du buffer de largeur nulle)
fn repair(polygon: Polygon<f64>) -> MultiPolygon<f64> {
    let mp = MultiPolygon::new(vec![polygon]);
    mp.union(&mp)
}

/// Fusionne tous les polygones d'eau douce en une région unique
fn merge_freshwater(polygons: &[MultiPolygon<f64>]) -> Option<MultiPolygon<f64>> {
    let mut iter = polygons.iter();
    let first = iter.next()?.clone();
    Some(iter.fold(first, |acc, mp| acc.union(mp)))
}

/// Feature GeoJSON avec les propriétés `id` et `type`
fn feature(geometry: geojson::Value, id: Value, feature_type: &str) -> geojson::Feature {
    let mut properties = serde_json::Map::new();
    properties.insert("id".to_string(), id);
    properties.insert("type".to_string(), Value::String(feature_type.to_string()));

    geojson::Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geometry)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svg::PathShape;
    use serde_json::json;

    const HEIGHT: f64 = 100.0;

    fn map_with(
        shapes: Vec<(&str, &str)>,
        land: Vec<&str>,
        freshwater: Vec<&str>,
    ) -> SvgMap {
        SvgMap {
            shapes: shapes
                .into_iter()
                .map(|(id, d)| PathShape {
                    id: id.to_string(),
                    d: d.to_string(),
                })
                .collect(),
            land_ids: land.into_iter().map(String::from).collect(),
            freshwater_ids: freshwater.into_iter().map(String::from).collect(),
        }
    }

    fn polygon_rings(feature: &geojson::Feature) -> usize {
        match &feature.geometry.as_ref().unwrap().value {
            geojson::Value::Polygon(rings) => rings.len(),
            other => panic!("Expected Polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_land_with_freshwater_hole() {
        let map = map_with(
            vec![
                ("island1", "M 0 0 L 10 0 L 10 10 L 0 10 Z"),
                ("lake1", "M 4 4 L 6 4 L 6 6 L 4 6 Z"),
            ],
            vec!["island1"],
            vec!["lake1"],
        );

        let (features, errors) = extract_land(&map, HEIGHT);
        assert!(errors.is_empty());
        assert_eq!(features.len(), 1);

        // Exactement un ring intérieur : le lac
        assert_eq!(polygon_rings(&features[0]), 2);

        let props = features[0].properties.as_ref().unwrap();
        assert_eq!(props["type"], json!("land"));
        assert_eq!(props["id"], json!("island1"));
    }

    #[test]
    fn test_land_without_freshwater_unchanged() {
        let map = map_with(
            vec![("island1", "M 0 0 L 10 0 L 10 10 L 0 10 Z")],
            vec!["island1"],
            vec![],
        );

        let (features, errors) = extract_land(&map, HEIGHT);
        assert!(errors.is_empty());
        assert_eq!(features.len(), 1);
        assert_eq!(polygon_rings(&features[0]), 1);
    }

    #[test]
    fn test_unreferenced_shapes_discarded() {
        let map = map_with(
            vec![("cell42", "M 0 0 L 10 0 L 10 10 Z")],
            vec![],
            vec![],
        );

        let (features, errors) = extract_land(&map, HEIGHT);
        assert!(features.is_empty());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_invalid_path_skips_shape_only() {
        let map = map_with(
            vec![
                ("island1", "M 0 0 L 10 0 L 10 10 L 0 10 Z"),
                ("island2", "M 0 0 L nonsense"),
            ],
            vec!["island1", "island2"],
            vec![],
        );

        let (features, errors) = extract_land(&map, HEIGHT);
        assert_eq!(features.len(), 1);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_fully_covered_land_dropped() {
        let map = map_with(
            vec![
                ("island1", "M 0 0 L 10 0 L 10 10 L 0 10 Z"),
                ("lake1", "M -1 -1 L 11 -1 L 11 11 L -1 11 Z"),
            ],
            vec!["island1"],
            vec!["lake1"],
        );

        let (features, errors) = extract_land(&map, HEIGHT);
        assert!(features.is_empty());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_self_intersecting_polygon_repaired() {
        // Noeud papillon : invalide, réparé par la passe d'union
        let map = map_with(
            vec![("island1", "M 0 0 L 1 1 L 1 0 L 0 1 Z")],
            vec!["island1"],
            vec![],
        );

        let (features, _) = extract_land(&map, HEIGHT);
        assert!(!features.is_empty());
    }

    #[test]
    fn test_extract_rivers() {
        let map = map_with(
            vec![
                ("river5", "M 0 0 L 5 5 L 10 5"),
                ("river6", "M 1 1"),
                ("island1", "M 0 0 L 10 0 L 10 10 Z"),
            ],
            vec![],
            vec![],
        );

        let (features, errors) = extract_rivers(&map, HEIGHT);
        assert!(errors.is_empty());
        // river6 n'a qu'un point, island1 n'est pas une rivière
        assert_eq!(features.len(), 1);

        let props = features[0].properties.as_ref().unwrap();
        assert_eq!(props["id"], json!(5));
        assert_eq!(props["type"], json!("river"));

        match &features[0].geometry.as_ref().unwrap().value {
            geojson::Value::LineString(line) => {
                // Y retourné : 100 - 0 = 100
                assert_eq!(line[0], vec![0.0, 100.0]);
            }
            other => panic!("Expected LineString, got {:?}", other),
        }
    }
}

//! Lecture du document SVG exporté par Azgaar
//!
//! Le dessin porte trois constructions qui nous intéressent :
//! - les formes `<path>` (contours de terres, lacs, rivières),
//! - le masque `<mask id="land">` dont les `<use fill="white">` référencent
//!   les formes comptant comme terre,
//! - le groupe `<g id="freshwater">` dont les `<use>` référencent les
//!   étendues d'eau douce.

use std::collections::HashSet;

use roxmltree::{Document, Node};

use crate::AzgaarError;

const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// Valeur sentinelle du `fill` marquant une référence incluse dans le masque
const LAND_INCLUDE_FILL: &str = "white";

/// Une forme `<path>` du dessin
#[derive(Debug, Clone)]
pub struct PathShape {
    /// Attribut `id` de l'élément
    pub id: String,
    /// Chaîne de commandes `d`
    pub d: String,
}

/// Modèle du document : formes et ensembles de références
///
/// Les ensembles `land_ids` et `freshwater_ids` sont transitoires,
/// reconstruits à chaque extraction, et servent uniquement à classifier les
/// polygones de cette passe.
#[derive(Debug, Default)]
pub struct SvgMap {
    /// Toutes les formes portant `id` et `d`
    pub shapes: Vec<PathShape>,
    /// Identifiants référencés par le masque land avec le fill sentinelle
    pub land_ids: HashSet<String>,
    /// Identifiants référencés par le groupe freshwater
    pub freshwater_ids: HashSet<String>,
}

/// Parse le texte d'un document SVG
pub fn parse_document(text: &str) -> Result<SvgMap, AzgaarError> {
    let doc = Document::parse(text)
        .map_err(|e| AzgaarError::InvalidDocument(e.to_string()))?;

    let mut map = SvgMap::default();

    for node in doc.descendants() {
        if node.has_tag_name("path") {
            if let (Some(id), Some(d)) = (node.attribute("id"), node.attribute("d")) {
                map.shapes.push(PathShape {
                    id: id.to_string(),
                    d: d.to_string(),
                });
            }
        } else if node.has_tag_name("mask") && node.attribute("id") == Some("land") {
            collect_land_refs(node, &mut map.land_ids);
        } else if node.has_tag_name("g") && node.attribute("id") == Some("freshwater") {
            collect_freshwater_refs(node, &mut map.freshwater_ids);
        }
    }

    Ok(map)
}

/// Références du masque land : enfants directs `<use>` avec le fill sentinelle
fn collect_land_refs(mask: Node, out: &mut HashSet<String>) {
    for child in mask.children().filter(|n| n.has_tag_name("use")) {
        if child.attribute("fill") != Some(LAND_INCLUDE_FILL) {
            continue;
        }
        if let Some(id) = href_target(child) {
            out.insert(id);
        }
    }
}

/// Références du groupe freshwater : tous les `<use>` descendants,
/// sans condition sur le fill
fn collect_freshwater_refs(group: Node, out: &mut HashSet<String>) {
    for node in group.descendants().filter(|n| n.has_tag_name("use")) {
        if let Some(id) = href_target(node) {
            out.insert(id);
        }
    }
}

/// Cible d'un `<use>` : `xlink:href` ou `href` (SVG 2), sans le `#`
fn href_target(node: Node) -> Option<String> {
    let href = node
        .attribute((XLINK_NS, "href"))
        .or_else(|| node.attribute("href"))?;
    Some(href.trim_start_matches('#').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SVG: &str = r##"
        <svg xmlns="http://www.w3.org/2000/svg"
             xmlns:xlink="http://www.w3.org/1999/xlink" height="100">
          <defs>
            <mask id="land">
              <use xlink:href="#island1" fill="white"/>
              <use xlink:href="#ocean" fill="black"/>
            </mask>
          </defs>
          <g id="freshwater">
            <g>
              <use xlink:href="#lake1"/>
            </g>
            <use href="#lake2"/>
          </g>
          <path id="island1" d="M 0 0 L 10 0 L 10 10 Z"/>
          <path id="lake1" d="M 2 2 L 4 2 L 4 4 Z"/>
          <path id="river3" d="M 0 0 L 5 5"/>
          <path d="M 1 1 L 2 2"/>
        </svg>"##;

    #[test]
    fn test_parse_document() {
        let map = parse_document(SVG).unwrap();

        // Le path sans id est ignoré
        assert_eq!(map.shapes.len(), 3);

        // Seul le use avec fill="white" compte comme land
        assert_eq!(map.land_ids.len(), 1);
        assert!(map.land_ids.contains("island1"));

        // Tous les use descendants du groupe, xlink:href comme href
        assert_eq!(map.freshwater_ids.len(), 2);
        assert!(map.freshwater_ids.contains("lake1"));
        assert!(map.freshwater_ids.contains("lake2"));
    }

    #[test]
    fn test_invalid_document() {
        assert!(parse_document("<svg").is_err());
    }
}

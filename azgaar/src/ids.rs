//! Normalisation des identifiants vers des entiers canoniques
//!
//! Les exports Azgaar mélangent trois conventions d'identifiants selon le
//! fichier : `river12`, `marker7`, ou un suffixe numérique quelconque
//! (`zone_14`). Trois stratégies interchangeables les ramènent à un entier.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// Stratégie de normalisation d'identifiant, choisie par fichier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdStrategy {
    /// Préfixe textuel `river` suivi de chiffres
    River,
    /// Préfixe textuel `marker` suivi de chiffres
    Marker,
    /// Repli générique : suffixe numérique le plus à droite
    Generic,
}

impl IdStrategy {
    fn prefix(self) -> Option<&'static str> {
        match self {
            IdStrategy::River => Some("river"),
            IdStrategy::Marker => Some("marker"),
            IdStrategy::Generic => None,
        }
    }
}

/// Normalise la valeur d'un identifiant selon la stratégie donnée
///
/// Stratégies à préfixe : une chaîne `<préfixe><chiffres>` devient l'entier,
/// toute autre valeur est retournée inchangée. Stratégie générique : un
/// nombre est retourné tel quel, une chaîne est réduite à son suffixe
/// numérique, tout le reste devient null.
pub fn normalize_id(strategy: IdStrategy, value: &Value) -> Value {
    match strategy.prefix() {
        Some(prefix) => strip_prefix_id(prefix, value),
        None => generic_id(value),
    }
}

fn strip_prefix_id(prefix: &str, value: &Value) -> Value {
    if let Value::String(s) = value {
        if let Some(rest) = s.strip_prefix(prefix) {
            if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(n) = rest.parse::<i64>() {
                    return Value::from(n);
                }
            }
        }
    }
    value.clone()
}

fn generic_id(value: &Value) -> Value {
    match value {
        Value::Number(_) => value.clone(),
        Value::String(s) => match trailing_digits().captures(s) {
            Some(caps) => caps
                .get(1)
                .and_then(|m| m.as_str().parse::<i64>().ok())
                .map(Value::from)
                .unwrap_or(Value::Null),
            None => Value::Null,
        },
        _ => Value::Null,
    }
}

fn trailing_digits() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)$").expect("valid regex"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_river_prefix() {
        assert_eq!(normalize_id(IdStrategy::River, &json!("river12")), json!(12));
        // Pas de chiffres après le préfixe : inchangé
        assert_eq!(
            normalize_id(IdStrategy::River, &json!("river")),
            json!("river")
        );
        // Reste non purement numérique : inchangé
        assert_eq!(
            normalize_id(IdStrategy::River, &json!("river12b")),
            json!("river12b")
        );
        // Mauvais préfixe : inchangé
        assert_eq!(
            normalize_id(IdStrategy::River, &json!("marker7")),
            json!("marker7")
        );
    }

    #[test]
    fn test_marker_prefix() {
        assert_eq!(normalize_id(IdStrategy::Marker, &json!("marker7")), json!(7));
        assert_eq!(normalize_id(IdStrategy::Marker, &json!(3)), json!(3));
    }

    #[test]
    fn test_generic_fallback() {
        assert_eq!(normalize_id(IdStrategy::Generic, &json!("zone_14")), json!(14));
        assert_eq!(normalize_id(IdStrategy::Generic, &json!(5)), json!(5));
        assert_eq!(normalize_id(IdStrategy::Generic, &json!("abc")), Value::Null);
        assert_eq!(normalize_id(IdStrategy::Generic, &Value::Null), Value::Null);
        assert_eq!(normalize_id(IdStrategy::Generic, &json!(true)), Value::Null);
    }

    #[test]
    fn test_generic_rightmost_run() {
        // Seul le suffixe le plus à droite est retenu
        assert_eq!(
            normalize_id(IdStrategy::Generic, &json!("a12b34")),
            json!(34)
        );
    }
}

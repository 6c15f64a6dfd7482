//! Versions sémantiques à trois composantes pour le ledger

use std::fmt;
use std::str::FromStr;

/// Version `major.minor.patch`, strictement croissante par tentative
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    /// Version initiale attribuée en l'absence d'historique : `0.0.1`
    pub fn initial() -> Self {
        Self {
            major: 0,
            minor: 0,
            patch: 1,
        }
    }

    /// Incrémente la composante patch
    pub fn bump_patch(self) -> Self {
        Self {
            patch: self.patch + 1,
            ..self
        }
    }

    /// Calcule la version suivante depuis la dernière version du ledger
    ///
    /// Absente ou inanalysable : `0.0.1`. Sinon le patch est incrémenté.
    pub fn next_from(latest: Option<&str>) -> Self {
        match latest {
            None => Self::initial(),
            Some(s) => s
                .parse::<Version>()
                .map(Version::bump_patch)
                .unwrap_or_else(|_| Self::initial()),
        }
    }
}

impl FromStr for Version {
    type Err = String;

    /// Analyse tolérante : les composantes manquantes valent 0, les
    /// composantes au-delà de la troisième sont ignorées
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<u32> = s
            .trim()
            .split('.')
            .map(|p| p.parse::<u32>().map_err(|e| e.to_string()))
            .collect::<Result<_, _>>()?;

        if parts.is_empty() {
            return Err("empty version string".to_string());
        }

        Ok(Self {
            major: parts[0],
            minor: parts.get(1).copied().unwrap_or(0),
            patch: parts.get(2).copied().unwrap_or(0),
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

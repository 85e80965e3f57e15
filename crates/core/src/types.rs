//! Gemeinsame Identifikationstypen fuer Klingel
//!
//! Beide Typen verwenden das Newtype-Pattern, damit ein Nickname nie mit
//! einem beliebigen String und eine Verbindung nie mit einer anderen ID
//! verwechselt wird.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::ops::Deref;
use uuid::Uuid;

use crate::error::{KlingelError, Result};

/// Minimale Nickname-Laenge (Zeichen, nach Trimmen)
pub const NICKNAME_MIN_LAENGE: usize = 3;
/// Maximale Nickname-Laenge (Zeichen, nach Trimmen)
pub const NICKNAME_MAX_LAENGE: usize = 32;

// ---------------------------------------------------------------------------
// Nickname
// ---------------------------------------------------------------------------

/// Eindeutiger Benutzername – die Identitaet eines Clients
///
/// Ein `Nickname` ist immer validiert, auch beim Deserialisieren. Lookups
/// mit rohen Strings (z.B. dem `to`-Feld einer Nachricht) funktionieren
/// ueber `Borrow<str>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct Nickname(String);

impl Nickname {
    /// Validiert einen rohen Nickname mit den Standardgrenzen
    pub fn pruefen(roh: &str) -> Result<Self> {
        Self::pruefen_mit(roh, NICKNAME_MIN_LAENGE, NICKNAME_MAX_LAENGE)
    }

    /// Validiert einen rohen Nickname mit konfigurierten Grenzen
    ///
    /// Umgebende Leerzeichen werden entfernt, Steuerzeichen sind verboten.
    pub fn pruefen_mit(roh: &str, min: usize, max: usize) -> Result<Self> {
        let name = roh.trim();
        let laenge = name.chars().count();

        if laenge < min {
            return Err(KlingelError::NicknameZuKurz { min, laenge });
        }
        if laenge > max {
            return Err(KlingelError::NicknameZuLang { max, laenge });
        }
        if name.chars().any(char::is_control) {
            return Err(KlingelError::NicknameUngueltigeZeichen);
        }

        Ok(Self(name.to_string()))
    }

    /// Gibt den Nickname als &str zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Nickname {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Deref for Nickname {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Nickname {
    type Error = KlingelError;

    fn try_from(roh: String) -> Result<Self> {
        Self::pruefen(&roh)
    }
}

impl AsRef<str> for Nickname {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Nickname {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// VerbindungsId
// ---------------------------------------------------------------------------

/// Prozessweit eindeutige ID einer einzelnen Client-Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerbindungsId(pub Uuid);

impl VerbindungsId {
    /// Erstellt eine neue zufaellige VerbindungsId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for VerbindungsId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for VerbindungsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn nickname_wird_getrimmt() {
        let nick = Nickname::pruefen("  alice ").unwrap();
        assert_eq!(nick.as_str(), "alice");
    }

    #[test]
    fn nickname_zu_kurz() {
        let err = Nickname::pruefen("ab").unwrap_err();
        assert!(matches!(err, KlingelError::NicknameZuKurz { min: 3, laenge: 2 }));
        assert!(Nickname::pruefen("    ").is_err());
    }

    #[test]
    fn nickname_zu_lang() {
        let lang = "x".repeat(NICKNAME_MAX_LAENGE + 1);
        assert!(matches!(
            Nickname::pruefen(&lang),
            Err(KlingelError::NicknameZuLang { .. })
        ));
    }

    #[test]
    fn nickname_mit_steuerzeichen() {
        assert!(matches!(
            Nickname::pruefen("bo\u{0007}b"),
            Err(KlingelError::NicknameUngueltigeZeichen)
        ));
    }

    #[test]
    fn nickname_laenge_zaehlt_zeichen_nicht_bytes() {
        // 3 Zeichen, aber 6 Bytes
        assert!(Nickname::pruefen("äöü").is_ok());
    }

    #[test]
    fn nickname_lookup_per_str() {
        let mut map = HashMap::new();
        map.insert(Nickname::pruefen("carol").unwrap(), 1);
        assert_eq!(map.get("carol"), Some(&1));
    }

    #[test]
    fn nickname_serialisiert_als_string() {
        let nick = Nickname::pruefen("dave").unwrap();
        assert_eq!(serde_json::to_string(&nick).unwrap(), "\"dave\"");
    }

    #[test]
    fn nickname_deserialisieren_validiert() {
        let nick: Nickname = serde_json::from_str("\" erin \"").unwrap();
        assert_eq!(nick.as_str(), "erin");
        assert!(serde_json::from_str::<Nickname>("\"\"").is_err());
        assert!(serde_json::from_str::<Nickname>("\"ev\\u0000e\"").is_err());
    }

    #[test]
    fn nickname_als_str_verwendbar() {
        fn laenge(s: &str) -> usize {
            s.len()
        }
        let nick = Nickname::pruefen("frank").unwrap();
        assert_eq!(laenge(&nick), 5);
        assert!(nick.starts_with("fr"));
    }

    #[test]
    fn verbindungs_id_eindeutig() {
        let a = VerbindungsId::new();
        let b = VerbindungsId::new();
        assert_ne!(a, b, "Zwei neue VerbindungsIds muessen verschieden sein");
        assert!(a.to_string().starts_with("conn:"));
    }
}

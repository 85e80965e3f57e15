//! Fehlertypen fuer Klingel
//!
//! Zentraler Fehler-Enum fuer die gemeinsamen Typen. Die Crates darueber
//! definieren eigene Fehler.

use thiserror::Error;

/// Globaler Result-Alias fuer Klingel
pub type Result<T> = std::result::Result<T, KlingelError>;

/// Fehler in den gemeinsamen Klingel-Typen
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KlingelError {
    #[error("Nickname zu kurz: mindestens {min} Zeichen, erhalten {laenge}")]
    NicknameZuKurz { min: usize, laenge: usize },

    #[error("Nickname zu lang: hoechstens {max} Zeichen, erhalten {laenge}")]
    NicknameZuLang { max: usize, laenge: usize },

    #[error("Nickname enthaelt ungueltige Zeichen")]
    NicknameUngueltigeZeichen,
}

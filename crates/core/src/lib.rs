//! klingel-core – Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Klingel-Crates gemeinsam genutzt werden: Nicknames (die
//! Identitaet eines Benutzers) und Verbindungs-IDs.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{KlingelError, Result};
pub use types::{Nickname, VerbindungsId};

//! Kontakt-Graph – Registrierte Nicknames und ihre Kontakte
//!
//! Jeder registrierte Nickname hat einen Eintrag (auch ohne Kontakte). Die
//! Kontakt-Relation ist symmetrisch und wird nie wieder entfernt. Der Graph
//! ist unabhaengig davon, wer gerade online ist.

use klingel_core::Nickname;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Thread-safe via Arc + RwLock. Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct KontaktGraph {
    inner: Arc<RwLock<BTreeMap<Nickname, BTreeSet<Nickname>>>>,
}

impl KontaktGraph {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Legt ein Konto mit leerer Kontaktliste an
    ///
    /// Gibt `false` zurueck wenn der Nickname bereits registriert ist.
    pub fn konto_anlegen(&self, nickname: Nickname) -> bool {
        let mut graph = self.inner.write();
        if graph.contains_key(&nickname) {
            return false;
        }
        graph.insert(nickname, BTreeSet::new());
        true
    }

    /// Gibt den registrierten Nickname zu einem rohen String zurueck
    pub fn konto(&self, nickname: &str) -> Option<Nickname> {
        self.inner
            .read()
            .get_key_value(nickname)
            .map(|(k, _)| k.clone())
    }

    pub fn ist_bekannt(&self, nickname: &str) -> bool {
        self.inner.read().contains_key(nickname)
    }

    pub fn sind_kontakte(&self, a: &str, b: &str) -> bool {
        self.inner
            .read()
            .get(a)
            .is_some_and(|kontakte| kontakte.contains(b))
    }

    /// Traegt a und b gegenseitig als Kontakt ein (idempotent)
    ///
    /// Beide Richtungen unter einem Write-Lock, damit nie eine halbe
    /// Beziehung sichtbar ist.
    pub fn gegenseitig_hinzufuegen(&self, a: &Nickname, b: &Nickname) {
        let mut graph = self.inner.write();
        graph.entry(a.clone()).or_default().insert(b.clone());
        graph.entry(b.clone()).or_default().insert(a.clone());
    }

    /// Kontakte eines Nicknames (alphabetisch)
    pub fn kontakte_von(&self, nickname: &str) -> BTreeSet<Nickname> {
        self.inner
            .read()
            .get(nickname)
            .cloned()
            .unwrap_or_default()
    }

    /// Durchsucht alle registrierten Nicknames (Teilstring, ohne Gross-/Kleinschreibung)
    ///
    /// `ausser` wird nie zurueckgegeben.
    pub fn suchen(&self, anfrage: &str, ausser: &str) -> Vec<Nickname> {
        let anfrage = anfrage.to_lowercase();
        self.inner
            .read()
            .keys()
            .filter(|nick| nick.as_str() != ausser)
            .filter(|nick| nick.as_str().to_lowercase().contains(&anfrage))
            .cloned()
            .collect()
    }

    /// Anzahl registrierter Konten
    pub fn konto_anzahl(&self) -> usize {
        self.inner.read().len()
    }
}

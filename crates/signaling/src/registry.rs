//! Session-Registry – Wer ist ueber welche Verbindung online?
//!
//! Haelt pro Nickname hoechstens eine Session (Verbindung + letzte
//! Aktivitaet). Alle Operationen sind einzelne, nicht-suspendierende
//! DashMap-Schritte; kein Guard lebt ueber ein `.await` hinaus.
//!
//! ## Invarianten
//! - Pro Nickname hoechstens eine Session; die neueste Anmeldung gewinnt
//! - `entfernen` loescht nur, wenn die gespeicherte Verbindung exakt die
//!   uebergebene ist. Ein verspaeteter Cleanup einer alten Verbindung kann
//!   so keine neuere Session desselben Nicknames loeschen.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use klingel_core::{Nickname, VerbindungsId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::broadcast::{SchliessGrund, VerbindungsHandle};

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Bindung eines Nicknames an genau eine Verbindung
#[derive(Debug, Clone)]
pub struct Session {
    pub verbindung: VerbindungsHandle,
    pub letzte_aktivitaet: Instant,
    /// Einfuegereihenfolge fuer deterministische Snapshots
    seq: u64,
}

/// Ergebnis einer Registrierung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrierErgebnis {
    /// Nickname war nicht online
    Neu,
    /// Dieselbe Verbindung war bereits registriert, nur Aktivitaet erneuert
    ///
    /// Der Router erreicht diesen Fall nicht, er lehnt eine zweite Anmeldung
    /// vorher ab. Die Registry bleibt trotzdem idempotent fuer denselben
    /// Aufrufer.
    Erneuert,
    /// Eine andere Verbindung hielt den Nickname und wurde geschlossen
    Ersetzt { alte_verbindung: VerbindungsId },
}

// ---------------------------------------------------------------------------
// SessionRegistry
// ---------------------------------------------------------------------------

/// Registry aller aktiven Sessions
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<SessionRegistryInner>,
}

#[derive(Default)]
struct SessionRegistryInner {
    sessions: DashMap<Nickname, Session>,
    naechste_seq: AtomicU64,
}

impl SessionRegistry {
    /// Erstellt eine leere Registry
    pub fn neu() -> Self {
        Self::default()
    }

    /// Bindet `nickname` an `verbindung`
    ///
    /// Eine andere, bisher registrierte Verbindung wird mit
    /// `SchliessGrund::Ersetzt` geschlossen. Dieselbe Verbindung erneut zu
    /// registrieren schliesst nichts und aendert die Reihenfolge nicht. Die
    /// Aktivitaet wird immer auf jetzt gesetzt.
    pub fn registrieren(
        &self,
        nickname: Nickname,
        verbindung: VerbindungsHandle,
    ) -> RegistrierErgebnis {
        let jetzt = Instant::now();
        let seq = self.inner.naechste_seq.fetch_add(1, Ordering::Relaxed);

        let verdraengt = match self.inner.sessions.entry(nickname.clone()) {
            Entry::Occupied(mut eintrag) => {
                if eintrag.get().verbindung.id() == verbindung.id() {
                    eintrag.get_mut().letzte_aktivitaet = jetzt;
                    return RegistrierErgebnis::Erneuert;
                }
                let alt = eintrag.insert(Session {
                    verbindung,
                    letzte_aktivitaet: jetzt,
                    seq,
                });
                Some(alt.verbindung)
            }
            Entry::Vacant(eintrag) => {
                eintrag.insert(Session {
                    verbindung,
                    letzte_aktivitaet: jetzt,
                    seq,
                });
                None
            }
        };

        // Schliessen erst nach Freigabe des Map-Eintrags
        match verdraengt {
            Some(alte) => {
                tracing::info!(
                    nickname = %nickname,
                    alte_verbindung = %alte.id(),
                    "Session durch neue Anmeldung ersetzt"
                );
                alte.schliessen(SchliessGrund::Ersetzt);
                RegistrierErgebnis::Ersetzt {
                    alte_verbindung: alte.id(),
                }
            }
            None => RegistrierErgebnis::Neu,
        }
    }

    /// Setzt die letzte Aktivitaet auf jetzt; ohne Session wirkungslos
    pub fn aktivitaet_melden(&self, nickname: &str) {
        if let Some(mut session) = self.inner.sessions.get_mut(nickname) {
            session.letzte_aktivitaet = Instant::now();
        }
    }

    /// Gibt die Verbindung eines Nicknames zurueck
    pub fn nachschlagen(&self, nickname: &str) -> Option<VerbindungsHandle> {
        self.inner
            .sessions
            .get(nickname)
            .map(|s| s.verbindung.clone())
    }

    /// Entfernt die Session nur, wenn sie zu `verbindung` gehoert
    ///
    /// Idempotent. Gibt `true` zurueck wenn tatsaechlich entfernt wurde.
    pub fn entfernen(&self, nickname: &str, verbindung: VerbindungsId) -> bool {
        self.inner
            .sessions
            .remove_if(nickname, |_, s| s.verbindung.id() == verbindung)
            .is_some()
    }

    /// Alle online Nicknames in Einfuegereihenfolge
    pub fn snapshot(&self) -> Vec<Nickname> {
        self.snapshot_mit_verbindungen()
            .into_iter()
            .map(|(nickname, _)| nickname)
            .collect()
    }

    /// Wie `snapshot`, zusaetzlich mit den Verbindungen
    pub fn snapshot_mit_verbindungen(&self) -> Vec<(Nickname, VerbindungsHandle)> {
        let mut eintraege: Vec<(u64, Nickname, VerbindungsHandle)> = self
            .inner
            .sessions
            .iter()
            .map(|e| (e.seq, e.key().clone(), e.verbindung.clone()))
            .collect();
        eintraege.sort_by_key(|(seq, _, _)| *seq);
        eintraege
            .into_iter()
            .map(|(_, nickname, verbindung)| (nickname, verbindung))
            .collect()
    }

    /// Sessions deren letzte Aktivitaet laenger als `timeout` zurueckliegt
    pub fn abgelaufene(
        &self,
        jetzt: Instant,
        timeout: Duration,
    ) -> Vec<(Nickname, VerbindungsHandle)> {
        self.inner
            .sessions
            .iter()
            .filter(|e| jetzt.saturating_duration_since(e.letzte_aktivitaet) > timeout)
            .map(|e| (e.key().clone(), e.verbindung.clone()))
            .collect()
    }

    /// Entfernt eine Session nur, wenn sie zu `verbindung` gehoert und
    /// weiterhin abgelaufen ist
    ///
    /// Eine Aktivitaet zwischen `abgelaufene` und diesem Aufruf gewinnt.
    pub fn entfernen_wenn_abgelaufen(
        &self,
        nickname: &str,
        verbindung: VerbindungsId,
        jetzt: Instant,
        timeout: Duration,
    ) -> bool {
        self.inner
            .sessions
            .remove_if(nickname, |_, s| {
                s.verbindung.id() == verbindung
                    && jetzt.saturating_duration_since(s.letzte_aktivitaet) > timeout
            })
            .is_some()
    }

    /// Prueft ob ein Nickname eine Session hat
    pub fn ist_online(&self, nickname: &str) -> bool {
        self.inner.sessions.contains_key(nickname)
    }

    /// Anzahl der Sessions
    pub fn anzahl(&self) -> usize {
        self.inner.sessions.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::VerbindungsEmpfaenger;

    fn nick(name: &str) -> Nickname {
        Nickname::pruefen(name).unwrap()
    }

    fn verbindung() -> (VerbindungsHandle, VerbindungsEmpfaenger) {
        VerbindungsHandle::neu(8)
    }

    #[test]
    fn registrieren_und_nachschlagen() {
        let registry = SessionRegistry::neu();
        let (v, _rx) = verbindung();

        assert_eq!(registry.registrieren(nick("alice"), v.clone()), RegistrierErgebnis::Neu);
        assert!(registry.ist_online("alice"));
        assert_eq!(registry.nachschlagen("alice").map(|h| h.id()), Some(v.id()));
        assert!(registry.nachschlagen("bob").is_none());
        assert_eq!(registry.anzahl(), 1);
    }

    #[test]
    fn doppelte_anmeldung_schliesst_alte_verbindung() {
        let registry = SessionRegistry::neu();
        let (alt, alt_rx) = verbindung();
        let (neu, neu_rx) = verbindung();

        registry.registrieren(nick("bob"), alt.clone());
        let ergebnis = registry.registrieren(nick("bob"), neu.clone());

        assert_eq!(
            ergebnis,
            RegistrierErgebnis::Ersetzt {
                alte_verbindung: alt.id()
            }
        );
        assert_eq!(*alt_rx.schliessen.borrow(), Some(SchliessGrund::Ersetzt));
        assert_eq!(*neu_rx.schliessen.borrow(), None);
        assert_eq!(registry.nachschlagen("bob").map(|h| h.id()), Some(neu.id()));
        assert_eq!(registry.anzahl(), 1);
    }

    #[test]
    fn gleiche_verbindung_erneuert_nur() {
        let registry = SessionRegistry::neu();
        let (v, rx) = verbindung();
        let (andere, _andere_rx) = verbindung();

        registry.registrieren(nick("carol"), v.clone());
        registry.registrieren(nick("dave"), andere);
        assert_eq!(
            registry.registrieren(nick("carol"), v),
            RegistrierErgebnis::Erneuert
        );
        assert_eq!(*rx.schliessen.borrow(), None);
        assert_eq!(registry.snapshot(), vec![nick("carol"), nick("dave")]);
    }

    #[test]
    fn entfernen_nur_mit_passender_verbindung() {
        let registry = SessionRegistry::neu();
        let (alt, _alt_rx) = verbindung();
        let (neu, _neu_rx) = verbindung();

        registry.registrieren(nick("dave"), alt.clone());
        registry.registrieren(nick("dave"), neu.clone());

        // Verspaeteter Cleanup der alten Verbindung
        assert!(!registry.entfernen("dave", alt.id()));
        assert!(!registry.entfernen("dave", alt.id()));
        assert!(registry.ist_online("dave"));

        assert!(registry.entfernen("dave", neu.id()));
        assert!(!registry.entfernen("dave", neu.id()));
        assert!(!registry.ist_online("dave"));
    }

    #[test]
    fn snapshot_in_einfuegereihenfolge() {
        let registry = SessionRegistry::neu();
        let mut empfaenger = Vec::new();
        for name in ["zoe", "adam", "mia"] {
            let (v, rx) = verbindung();
            empfaenger.push(rx);
            registry.registrieren(nick(name), v);
        }
        assert_eq!(registry.snapshot(), vec![nick("zoe"), nick("adam"), nick("mia")]);

        // Neuanmeldung verschiebt ans Ende
        let (v, _rx) = verbindung();
        registry.registrieren(nick("zoe"), v);
        assert_eq!(registry.snapshot(), vec![nick("adam"), nick("mia"), nick("zoe")]);
    }

    #[tokio::test(start_paused = true)]
    async fn aktivitaet_verhindert_ablauf() {
        let registry = SessionRegistry::neu();
        let (v, _rx) = verbindung();
        let timeout = Duration::from_secs(120);
        registry.registrieren(nick("erin"), v.clone());

        tokio::time::advance(Duration::from_secs(100)).await;
        registry.aktivitaet_melden("erin");
        tokio::time::advance(Duration::from_secs(100)).await;
        assert!(registry.abgelaufene(Instant::now(), timeout).is_empty());

        tokio::time::advance(Duration::from_secs(21)).await;
        let abgelaufen = registry.abgelaufene(Instant::now(), timeout);
        assert_eq!(abgelaufen.len(), 1);
        assert_eq!(abgelaufen[0].0, nick("erin"));
    }

    #[tokio::test(start_paused = true)]
    async fn entfernen_wenn_abgelaufen_prueft_erneut() {
        let registry = SessionRegistry::neu();
        let (v, _rx) = verbindung();
        let timeout = Duration::from_secs(10);
        registry.registrieren(nick("finn"), v.clone());

        tokio::time::advance(Duration::from_secs(11)).await;
        let kandidaten = registry.abgelaufene(Instant::now(), timeout);
        assert_eq!(kandidaten.len(), 1);

        // Aktivitaet zwischen Sammeln und Entfernen gewinnt
        registry.aktivitaet_melden("finn");
        assert!(!registry.entfernen_wenn_abgelaufen("finn", v.id(), Instant::now(), timeout));
        assert!(registry.ist_online("finn"));
    }

    #[test]
    fn aktivitaet_ohne_session_ist_wirkungslos() {
        let registry = SessionRegistry::neu();
        registry.aktivitaet_melden("niemand");
        assert_eq!(registry.anzahl(), 0);
        assert!(!registry.ist_online("niemand"));
    }

    #[test]
    fn clone_teilt_inneren_state() {
        let r1 = SessionRegistry::neu();
        let r2 = r1.clone();
        let (v, _rx) = verbindung();
        r1.registrieren(nick("shared"), v);
        assert!(r2.ist_online("shared"));
    }
}

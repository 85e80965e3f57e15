//! Gemeinsamer Server-Zustand fuer den Signaling-Service
//!
//! Haelt Registry, Kontakt-Graph, Broadcaster und Metriken als geteilte
//! Referenzen, die sicher zwischen tokio-Tasks geteilt werden koennen.

use klingel_core::{Nickname, Result, VerbindungsId};
use klingel_observability::KlingelMetriken;
use klingel_protocol::Ausgehend;
use std::sync::Arc;
use std::time::Duration;

use crate::broadcast::{SendeFehler, SEND_QUEUE_GROESSE};
use crate::contacts::KontaktGraph;
use crate::presence::PresenceBroadcaster;
use crate::registry::SessionRegistry;

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Minimale Nickname-Laenge (Zeichen)
    pub nickname_min_laenge: usize,
    /// Maximale Nickname-Laenge (Zeichen)
    pub nickname_max_laenge: usize,
    /// Groesse der Send-Queue pro Verbindung
    pub send_queue_groesse: usize,
    /// Pruefintervall des Liveness-Monitors in Sekunden
    pub liveness_pruef_intervall_sek: u64,
    /// Inaktivitaet in Sekunden, nach der eine Session entfernt wird
    pub liveness_timeout_sek: u64,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            nickname_min_laenge: klingel_core::types::NICKNAME_MIN_LAENGE,
            nickname_max_laenge: klingel_core::types::NICKNAME_MAX_LAENGE,
            send_queue_groesse: SEND_QUEUE_GROESSE,
            liveness_pruef_intervall_sek: 30,
            liveness_timeout_sek: 120,
        }
    }
}

impl SignalingConfig {
    pub fn pruef_intervall(&self) -> Duration {
        Duration::from_secs(self.liveness_pruef_intervall_sek.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.liveness_timeout_sek)
    }
}

/// Ergebnis einer Zustellung an einen Nickname
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zustellung {
    /// In die Send-Queue des Empfaengers gelegt
    Zugestellt,
    /// Nickname hat keine Session
    Offline,
    /// Queue des Empfaengers voll, Nachricht verworfen
    Verworfen,
    /// Verbindung des Empfaengers war geschlossen, Session entfernt
    Geschlossen,
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct SignalingState {
    /// Signaling-Konfiguration
    pub config: Arc<SignalingConfig>,
    /// Wer ist ueber welche Verbindung online
    pub sessions: SessionRegistry,
    /// Registrierte Konten und Kontakte
    pub kontakte: KontaktGraph,
    /// Verteilt `user_list`
    pub presence: PresenceBroadcaster,
    /// Prometheus-Metriken
    pub metriken: KlingelMetriken,
}

impl SignalingState {
    /// Erstellt einen neuen SignalingState
    pub fn neu(config: SignalingConfig, metriken: KlingelMetriken) -> Arc<Self> {
        let sessions = SessionRegistry::neu();
        let presence = PresenceBroadcaster::neu(sessions.clone(), metriken.clone());
        Arc::new(Self {
            config: Arc::new(config),
            sessions,
            kontakte: KontaktGraph::neu(),
            presence,
            metriken,
        })
    }

    /// Prueft einen Nickname gegen die konfigurierten Grenzen
    pub fn nickname_pruefen(&self, roh: &str) -> Result<Nickname> {
        Nickname::pruefen_mit(
            roh,
            self.config.nickname_min_laenge,
            self.config.nickname_max_laenge,
        )
    }

    /// Beendet die Session von `nickname`, falls sie noch zu `verbindung` gehoert
    ///
    /// Wurde tatsaechlich entfernt, erhalten alle anderen eine neue
    /// Online-Liste.
    pub fn sitzung_beenden(&self, nickname: &str, verbindung: VerbindungsId) -> bool {
        let entfernt = self.sessions.entfernen(nickname, verbindung);
        if entfernt {
            tracing::info!(nickname = %nickname, verbindung = %verbindung, "Session beendet");
            self.presence.user_liste_senden();
        }
        entfernt
    }

    /// Sendet eine Nachricht an die Session eines Nicknames
    ///
    /// Ist die Verbindung des Empfaengers bereits geschlossen, wird er wie
    /// offline behandelt: Session entfernen und Online-Liste verteilen.
    pub fn an_benutzer_senden(&self, nickname: &str, nachricht: impl Into<Ausgehend>) -> Zustellung {
        let Some(verbindung) = self.sessions.nachschlagen(nickname) else {
            return Zustellung::Offline;
        };
        match verbindung.senden(nachricht) {
            Ok(()) => Zustellung::Zugestellt,
            Err(SendeFehler::Voll) => Zustellung::Verworfen,
            Err(SendeFehler::Geschlossen) => {
                tracing::warn!(nickname = %nickname, "Zustellung fehlgeschlagen – Verbindung geschlossen");
                self.metriken.delivery_failures_total.inc();
                self.sitzung_beenden(nickname, verbindung.id());
                Zustellung::Geschlossen
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Liveness-Monitor – Entfernt inaktive Sessions
//!
//! Prueft in festem Intervall alle Sessions. Wer laenger als der Timeout
//! nichts gesendet hat, wird entfernt und seine Verbindung mit
//! `SchliessGrund::Timeout` geschlossen. Pro Pruefung hoechstens ein
//! Presence-Broadcast, egal wie viele Sessions entfernt wurden.

use klingel_core::Nickname;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use crate::broadcast::SchliessGrund;
use crate::server_state::SignalingState;

pub struct LivenessMonitor {
    state: Arc<SignalingState>,
}

impl LivenessMonitor {
    pub fn neu(state: Arc<SignalingState>) -> Self {
        Self { state }
    }

    /// Eine Pruefrunde zum Zeitpunkt `jetzt`
    ///
    /// Gibt die entfernten Nicknames zurueck.
    pub fn pruefen(&self, jetzt: Instant) -> Vec<Nickname> {
        let timeout = self.state.config.timeout();
        let mut entfernt = Vec::new();

        for (nickname, verbindung) in self.state.sessions.abgelaufene(jetzt, timeout) {
            if self
                .state
                .sessions
                .entfernen_wenn_abgelaufen(&nickname, verbindung.id(), jetzt, timeout)
            {
                tracing::info!(nickname = %nickname, "Session wegen Inaktivitaet entfernt");
                verbindung.schliessen(SchliessGrund::Timeout);
                entfernt.push(nickname);
            }
        }

        if !entfernt.is_empty() {
            self.state
                .metriken
                .sessions_evicted_total
                .inc_by(entfernt.len() as u64);
            self.state.presence.user_liste_senden();
        }
        entfernt
    }

    /// Startet die Pruef-Loop (laeuft bis `shutdown_rx` ein Signal sendet)
    pub async fn starten(self, mut shutdown_rx: watch::Receiver<bool>) {
        let intervall = self.state.config.pruef_intervall();
        let mut ticker = tokio::time::interval(intervall);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // Ersten Tick ueberspringen

        tracing::info!(
            intervall_sek = intervall.as_secs(),
            timeout_sek = self.state.config.liveness_timeout_sek,
            "Liveness-Monitor gestartet"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let entfernt = self.pruefen(Instant::now());
                    if !entfernt.is_empty() {
                        tracing::debug!(anzahl = entfernt.len(), "Liveness-Pruefung abgeschlossen");
                    }
                }
                ergebnis = shutdown_rx.changed() => {
                    if ergebnis.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Liveness-Monitor beendet");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Presence-Broadcaster – Verteilt die Online-Liste an alle Clients
//!
//! Pro Aufruf wird die Liste genau einmal aus dem aktuellen Registry-Stand
//! berechnet und an alle offenen Verbindungen gesendet. Tote Verbindungen
//! (Task beendet, Schliessen angefordert) werden dabei aus der Registry
//! entfernt, bevor die Liste gebaut wird.

use klingel_core::Nickname;
use klingel_observability::KlingelMetriken;
use klingel_protocol::ServerNachricht;

use crate::broadcast::SendeFehler;
use crate::registry::SessionRegistry;

/// Sendet `user_list` an alle offenen Verbindungen
///
/// Clone teilt Registry und Metriken.
#[derive(Clone)]
pub struct PresenceBroadcaster {
    registry: SessionRegistry,
    metriken: KlingelMetriken,
}

impl PresenceBroadcaster {
    pub fn neu(registry: SessionRegistry, metriken: KlingelMetriken) -> Self {
        Self { registry, metriken }
    }

    /// Berechnet die Online-Liste und sendet sie an alle offenen Verbindungen
    ///
    /// Faellt ein Empfaenger waehrend des Sendens weg, wird er entfernt und
    /// die Runde mit der verkleinerten Liste wiederholt, damit alle
    /// verbliebenen Clients den exakten Stand erhalten. Gibt die zuletzt
    /// versendete Liste zurueck.
    pub fn user_liste_senden(&self) -> Vec<Nickname> {
        loop {
            let (offen, tot): (Vec<_>, Vec<_>) = self
                .registry
                .snapshot_mit_verbindungen()
                .into_iter()
                .partition(|(_, verbindung)| verbindung.ist_offen());

            for (nickname, verbindung) in &tot {
                if self.registry.entfernen(nickname, verbindung.id()) {
                    tracing::debug!(nickname = %nickname, "Tote Verbindung beim Broadcast entfernt");
                }
            }

            let users: Vec<Nickname> = offen.iter().map(|(n, _)| n.clone()).collect();
            let nachricht = ServerNachricht::UserList {
                users: users.clone(),
            };

            let mut wiederholen = false;
            for (nickname, verbindung) in &offen {
                match verbindung.senden(nachricht.clone()) {
                    Ok(()) | Err(SendeFehler::Voll) => {}
                    Err(SendeFehler::Geschlossen) => {
                        tracing::warn!(
                            nickname = %nickname,
                            "user_list nicht zustellbar – Session wird entfernt"
                        );
                        if self.registry.entfernen(nickname, verbindung.id()) {
                            wiederholen = true;
                        }
                    }
                }
            }

            self.metriken.presence_broadcasts_total.inc();
            self.metriken
                .online_sessions
                .set(self.registry.anzahl() as i64);

            if !wiederholen {
                tracing::debug!(online = users.len(), "Online-Liste verteilt");
                return users;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

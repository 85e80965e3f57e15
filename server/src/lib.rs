//! klingel-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;

use anyhow::Result;
use config::ServerConfig;
use klingel_observability::{observability_router, HealthState, KlingelMetriken};
use klingel_signaling::{LivenessMonitor, SignalingServer, SignalingState};
use std::sync::Arc;
use tokio::sync::watch;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Metriken und gemeinsamen Zustand anlegen
    /// 2. Liveness-Monitor starten
    /// 3. WebSocket-Listener inkl. `/health` und `/metrics` starten
    /// 4. Auf Ctrl-C warten, dann alle Verbindungen schliessen
    pub async fn starten(self) -> Result<()> {
        let bind_addr = self.config.bind_adresse()?;
        let metriken = KlingelMetriken::neu()?;
        let state = SignalingState::neu(self.config.signaling_config(), metriken.clone());

        let sessions = state.sessions.clone();
        let health = HealthState::neu(move || sessions.anzahl());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tracing::info!(
            adresse = %bind_addr,
            pruef_intervall_sek = self.config.liveness.pruef_intervall_sek,
            timeout_sek = self.config.liveness.timeout_sek,
            "Server startet"
        );

        let liveness =
            tokio::spawn(LivenessMonitor::neu(Arc::clone(&state)).starten(shutdown_rx.clone()));

        let server = SignalingServer::neu(Arc::clone(&state), bind_addr);
        let zusatz = observability_router(metriken, health.clone());
        let mut server_task = tokio::spawn(server.starten(zusatz, shutdown_rx));

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        let vorzeitig = tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
                None
            }
            ergebnis = &mut server_task => {
                tracing::error!("Signaling-Server unerwartet beendet");
                Some(ergebnis)
            }
        };

        health.herunterfahren_melden();
        let _ = shutdown_tx.send(true);

        let ergebnis = match vorzeitig {
            Some(ergebnis) => ergebnis,
            None => server_task.await,
        };
        if let Err(e) = liveness.await {
            tracing::warn!(fehler = %e, "Liveness-Monitor nicht sauber beendet");
        }

        ergebnis??;
        tracing::info!("Server beendet");
        Ok(())
    }
}

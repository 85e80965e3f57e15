//! Prometheus-kompatible Metriken fuer Klingel
//!
//! Registrierte Metriken:
//! - `klingel_online_sessions` – Gauge: Aktuell registrierte Sessions
//! - `klingel_messages_forwarded_total` – Counter: Weitergeleitete Nachrichten (type)
//! - `klingel_delivery_failures_total` – Counter: Zustellungen an geschlossene Verbindungen
//! - `klingel_presence_broadcasts_total` – Counter: Versendete `user_list`-Runden
//! - `klingel_sessions_superseded_total` – Counter: Durch neue Anmeldung verdraengte Sessions
//! - `klingel_sessions_evicted_total` – Counter: Wegen Inaktivitaet entfernte Sessions

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Alle Klingel-Prometheus-Metriken
///
/// Clone teilt die Registry und alle Metriken.
#[derive(Clone)]
pub struct KlingelMetriken {
    pub registry: Arc<Registry>,

    pub online_sessions: IntGauge,
    pub messages_forwarded_total: IntCounterVec,
    pub delivery_failures_total: IntCounter,
    pub presence_broadcasts_total: IntCounter,
    pub sessions_superseded_total: IntCounter,
    pub sessions_evicted_total: IntCounter,
}

impl KlingelMetriken {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let online_sessions = IntGauge::with_opts(Opts::new(
            "klingel_online_sessions",
            "Anzahl aktuell registrierter Sessions",
        ))?;
        registry.register(Box::new(online_sessions.clone()))?;

        let messages_forwarded_total = IntCounterVec::new(
            Opts::new(
                "klingel_messages_forwarded_total",
                "Gesamtanzahl weitergeleiteter Nachrichten",
            ),
            &["type"],
        )?;
        registry.register(Box::new(messages_forwarded_total.clone()))?;

        let delivery_failures_total = IntCounter::with_opts(Opts::new(
            "klingel_delivery_failures_total",
            "Zustellungen an bereits geschlossene Verbindungen",
        ))?;
        registry.register(Box::new(delivery_failures_total.clone()))?;

        let presence_broadcasts_total = IntCounter::with_opts(Opts::new(
            "klingel_presence_broadcasts_total",
            "Anzahl versendeter user_list-Runden",
        ))?;
        registry.register(Box::new(presence_broadcasts_total.clone()))?;

        let sessions_superseded_total = IntCounter::with_opts(Opts::new(
            "klingel_sessions_superseded_total",
            "Durch eine neue Anmeldung verdraengte Sessions",
        ))?;
        registry.register(Box::new(sessions_superseded_total.clone()))?;

        let sessions_evicted_total = IntCounter::with_opts(Opts::new(
            "klingel_sessions_evicted_total",
            "Wegen Inaktivitaet entfernte Sessions",
        ))?;
        registry.register(Box::new(sessions_evicted_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            online_sessions,
            messages_forwarded_total,
            delivery_failures_total,
            presence_broadcasts_total,
            sessions_superseded_total,
            sessions_evicted_total,
        })
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: KlingelMetriken) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<KlingelMetriken>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metriken_erstellen_erfolgreich() {
        let metriken = KlingelMetriken::neu().unwrap();
        assert!(!metriken.registry.gather().is_empty());
    }

    #[test]
    fn zwei_instanzen_kollidieren_nicht() {
        // Jede Instanz hat ihre eigene Registry
        let a = KlingelMetriken::neu().unwrap();
        let b = KlingelMetriken::neu().unwrap();
        a.online_sessions.set(3);
        assert_eq!(b.online_sessions.get(), 0);
    }

    #[test]
    fn counter_mit_labels() {
        let metriken = KlingelMetriken::neu().unwrap();
        metriken
            .messages_forwarded_total
            .with_label_values(&["offer"])
            .inc();
        let wert = metriken
            .messages_forwarded_total
            .with_label_values(&["offer"])
            .get();
        assert_eq!(wert, 1);
    }

    #[test]
    fn metriken_export_prometheus_format() {
        let metriken = KlingelMetriken::neu().unwrap();
        metriken.online_sessions.set(5);
        metriken.sessions_evicted_total.inc();

        let output = metriken.exportieren().unwrap();
        assert!(output.contains("klingel_online_sessions 5"));
        assert!(output.contains("klingel_sessions_evicted_total 1"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }
}

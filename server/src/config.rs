//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist. Die Umgebungsvariable `PORT` ueberschreibt den Port.

use anyhow::{bail, Context};
use klingel_observability::logging::{log_format_gueltig, log_level_gueltig};
use klingel_signaling::SignalingConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Umgebungsvariable, die den Port ueberschreibt
pub const PORT_ENV: &str = "PORT";

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Nicknames und Send-Queues
    pub signaling: SignalingEinstellungen,
    /// Entfernen inaktiver Sessions
    pub liveness: LivenessEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer WebSocket, Health und Metriken
    pub bind_adresse: String,
    /// Port (ueberschreibbar per `PORT`)
    pub port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Signaling-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingEinstellungen {
    pub nickname_min_laenge: usize,
    pub nickname_max_laenge: usize,
    /// Ausgehende Nachrichten pro Verbindung, bevor verworfen wird
    pub send_queue_groesse: usize,
}

impl Default for SignalingEinstellungen {
    fn default() -> Self {
        let standard = SignalingConfig::default();
        Self {
            nickname_min_laenge: standard.nickname_min_laenge,
            nickname_max_laenge: standard.nickname_max_laenge,
            send_queue_groesse: standard.send_queue_groesse,
        }
    }
}

/// Liveness-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessEinstellungen {
    /// Pruefintervall in Sekunden
    pub pruef_intervall_sek: u64,
    /// Inaktivitaet in Sekunden bis zum Entfernen
    pub timeout_sek: u64,
}

impl Default for LivenessEinstellungen {
    fn default() -> Self {
        let standard = SignalingConfig::default();
        Self {
            pruef_intervall_sek: standard.liveness_pruef_intervall_sek,
            timeout_sek: standard.liveness_timeout_sek,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    /// `PORT` wird danach angewendet.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let mut config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str::<Self>(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => bail!("Konfigurationsdatei '{pfad}' nicht lesbar: {e}"),
        };

        config.port_ueberschreiben(std::env::var(PORT_ENV).ok())?;
        config.validieren()?;
        Ok(config)
    }

    /// Uebernimmt den Port aus einem Umgebungswert (falls gesetzt)
    pub fn port_ueberschreiben(&mut self, wert: Option<String>) -> anyhow::Result<()> {
        if let Some(wert) = wert {
            self.netzwerk.port = wert
                .trim()
                .parse()
                .with_context(|| format!("{PORT_ENV}='{wert}' ist kein gueltiger Port"))?;
        }
        Ok(())
    }

    /// Prueft die Werte auf Widersprueche
    pub fn validieren(&self) -> anyhow::Result<()> {
        let s = &self.signaling;
        if s.nickname_min_laenge == 0 || s.nickname_min_laenge > s.nickname_max_laenge {
            bail!(
                "Ungueltige Nickname-Grenzen: min={} max={}",
                s.nickname_min_laenge,
                s.nickname_max_laenge
            );
        }
        if s.send_queue_groesse == 0 {
            bail!("send_queue_groesse muss groesser als 0 sein");
        }
        if self.liveness.pruef_intervall_sek == 0 || self.liveness.timeout_sek == 0 {
            bail!("Liveness-Intervall und -Timeout muessen groesser als 0 sein");
        }
        if !log_level_gueltig(&self.logging.level) {
            tracing::warn!(level = %self.logging.level, "Unbekannter Log-Level");
        }
        if !log_format_gueltig(&self.logging.format) {
            tracing::warn!(format = %self.logging.format, "Unbekanntes Log-Format, verwende text");
        }
        Ok(())
    }

    /// Gibt die vollstaendige Bind-Adresse zurueck
    pub fn bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        let roh = format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port);
        roh.parse()
            .with_context(|| format!("Ungueltige Bind-Adresse '{roh}'"))
    }

    /// Baut die Konfiguration fuer den Signaling-Service
    pub fn signaling_config(&self) -> SignalingConfig {
        SignalingConfig {
            nickname_min_laenge: self.signaling.nickname_min_laenge,
            nickname_max_laenge: self.signaling.nickname_max_laenge,
            send_queue_groesse: self.signaling.send_queue_groesse,
            liveness_pruef_intervall_sek: self.liveness.pruef_intervall_sek,
            liveness_timeout_sek: self.liveness.timeout_sek,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.netzwerk.port, 8080);
        assert_eq!(cfg.signaling.nickname_min_laenge, 3);
        assert_eq!(cfg.liveness.pruef_intervall_sek, 30);
        assert_eq!(cfg.liveness.timeout_sek, 120);
        assert_eq!(cfg.logging.level, "info");
        cfg.validieren().unwrap();
    }

    #[test]
    fn bind_adresse() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_adresse().unwrap(), "0.0.0.0:8080".parse().unwrap());
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [netzwerk]
            port = 9000

            [liveness]
            timeout_sek = 60

            [logging]
            format = "json"
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.netzwerk.port, 9000);
        assert_eq!(cfg.liveness.timeout_sek, 60);
        assert_eq!(cfg.logging.format, "json");
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.netzwerk.bind_adresse, "0.0.0.0");
        assert_eq!(cfg.liveness.pruef_intervall_sek, 30);
        assert_eq!(cfg.signaling.send_queue_groesse, 64);
    }

    #[test]
    fn port_aus_umgebung() {
        let mut cfg = ServerConfig::default();
        cfg.port_ueberschreiben(None).unwrap();
        assert_eq!(cfg.netzwerk.port, 8080);

        cfg.port_ueberschreiben(Some("3000".into())).unwrap();
        assert_eq!(cfg.netzwerk.port, 3000);

        assert!(cfg.port_ueberschreiben(Some("achtzig".into())).is_err());
        assert_eq!(cfg.netzwerk.port, 3000);
    }

    #[test]
    fn widerspruechliche_nickname_grenzen() {
        let mut cfg = ServerConfig::default();
        cfg.signaling.nickname_min_laenge = 10;
        cfg.signaling.nickname_max_laenge = 5;
        assert!(cfg.validieren().is_err());
    }

    #[test]
    fn signaling_config_uebernimmt_werte() {
        let mut cfg = ServerConfig::default();
        cfg.liveness.timeout_sek = 45;
        cfg.signaling.send_queue_groesse = 8;
        let sc = cfg.signaling_config();
        assert_eq!(sc.liveness_timeout_sek, 45);
        assert_eq!(sc.send_queue_groesse, 8);
    }

    #[test]
    fn fehlende_datei_liefert_standardwerte() {
        let cfg = ServerConfig::laden("/gibt/es/nicht/klingel.toml").unwrap();
        assert_eq!(cfg.liveness.timeout_sek, 120);
    }
}

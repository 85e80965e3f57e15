//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable:
//! - `KLINGEL_LOG_LEVEL`: Filter-Direktive (z.B. `debug` oder
//!   `info,klingel_signaling=trace`), Standard: Wert aus der Konfiguration
//! - `KLINGEL_LOG_FORMAT`: Format (text/json), Standard: Wert aus der Konfiguration
//!
//! `RUST_LOG` wird als Fallback ebenfalls beachtet.

use tracing_subscriber::{fmt, EnvFilter};

/// Umgebungsvariable fuer den Log-Level
pub const LOG_LEVEL_ENV: &str = "KLINGEL_LOG_LEVEL";
/// Umgebungsvariable fuer das Log-Format
pub const LOG_FORMAT_ENV: &str = "KLINGEL_LOG_FORMAT";

/// Initialisiert das Logging-System.
///
/// Umgebungsvariablen haben Vorrang vor den uebergebenen Werten.
/// Faellt auf `info` / `text` zurueck falls beides ungueltig ist.
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = format_aufloesen(std::env::var(LOG_FORMAT_ENV).ok(), format);

    match format {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_current_span(true)
                .init();
        }
        _ => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }
}

/// Waehlt das wirksame Log-Format: gueltiger Umgebungswert, sonst
/// gueltiger Konfigurationswert, sonst `text`.
pub fn format_aufloesen<'a>(aus_env: Option<String>, aus_config: &'a str) -> &'a str {
    match aus_env.as_deref() {
        Some("json") => "json",
        Some("text") => "text",
        _ if log_format_gueltig(aus_config) => aus_config,
        _ => "text",
    }
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}

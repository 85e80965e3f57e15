//! Fehlertypen fuer den Signaling-Service

use thiserror::Error;

/// Fehlertyp fuer den Signaling-Service
///
/// Ein Fehler aus dem Dispatcher beendet nur die betroffene Verbindung.
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (Socket, Bind)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket-Transportfehler
    #[error("WebSocket-Fehler: {0}")]
    WebSocket(#[from] axum::Error),

    /// Ausgehender Frame konnte nicht serialisiert werden
    #[error("Serialisierungsfehler: {0}")]
    Serialisierung(#[from] serde_json::Error),

    /// Die eigene Verbindung ist bereits geschlossen
    #[error("Verbindung getrennt")]
    VerbindungGetrennt,
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;

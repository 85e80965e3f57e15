//! Verbindungs-Handle – Send-Queue und Schliess-Signal einer Verbindung
//!
//! Jede Verbindung besitzt eine begrenzte Send-Queue. Andere Tasks legen
//! Nachrichten nicht-blockierend hinein (`try_send`), der Verbindungs-Task
//! schreibt sie auf den WebSocket. Ein separates `watch`-Signal fordert das
//! Schliessen an, damit es auch bei voller Queue ankommt.
//!
//! Ein Handle gilt als offen, solange der Verbindungs-Task lebt (Receiver
//! nicht gedroppt) und niemand das Schliessen angefordert hat.

use klingel_core::VerbindungsId;
use klingel_protocol::Ausgehend;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Standardgroesse der Send-Queue pro Client
pub const SEND_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// Schliessgruende und Sendefehler
// ---------------------------------------------------------------------------

/// Warum der Server eine Verbindung schliesst
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchliessGrund {
    /// Derselbe Nickname hat sich ueber eine neue Verbindung angemeldet
    Ersetzt,
    /// Keine Aktivitaet innerhalb des Liveness-Timeouts
    Timeout,
    /// Server faehrt herunter
    Herunterfahren,
}

impl SchliessGrund {
    /// WebSocket-Close-Code
    pub fn code(&self) -> u16 {
        match self {
            Self::Ersetzt => 1000,
            Self::Timeout => 4000,
            Self::Herunterfahren => 1001,
        }
    }

    /// Close-Reason (fuer den Client sichtbar)
    pub fn text(&self) -> &'static str {
        match self {
            Self::Ersetzt => "superseded by new session",
            Self::Timeout => "timeout",
            Self::Herunterfahren => "server shutting down",
        }
    }
}

/// Fehler beim Einreihen einer Nachricht
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendeFehler {
    /// Queue voll – Nachricht verworfen, Verbindung bleibt bestehen
    #[error("Send-Queue voll")]
    Voll,
    /// Verbindung ist geschlossen oder wird geschlossen
    #[error("Verbindung geschlossen")]
    Geschlossen,
}

// ---------------------------------------------------------------------------
// VerbindungsHandle
// ---------------------------------------------------------------------------

/// Handle auf eine einzelne Client-Verbindung
///
/// Clone teilt Queue und Schliess-Signal.
#[derive(Clone, Debug)]
pub struct VerbindungsHandle {
    id: VerbindungsId,
    tx: mpsc::Sender<Ausgehend>,
    schliessen_tx: Arc<watch::Sender<Option<SchliessGrund>>>,
}

/// Empfangsseite eines Handles, gehoert dem Verbindungs-Task
#[derive(Debug)]
pub struct VerbindungsEmpfaenger {
    pub nachrichten: mpsc::Receiver<Ausgehend>,
    pub schliessen: watch::Receiver<Option<SchliessGrund>>,
}

impl VerbindungsHandle {
    /// Erstellt ein neues Handle mit frischer VerbindungsId
    pub fn neu(queue_groesse: usize) -> (Self, VerbindungsEmpfaenger) {
        let (tx, nachrichten) = mpsc::channel(queue_groesse.max(1));
        let (schliessen_tx, schliessen) = watch::channel(None);
        let handle = Self {
            id: VerbindungsId::new(),
            tx,
            schliessen_tx: Arc::new(schliessen_tx),
        };
        (
            handle,
            VerbindungsEmpfaenger {
                nachrichten,
                schliessen,
            },
        )
    }

    pub fn id(&self) -> VerbindungsId {
        self.id
    }

    /// Reiht eine Nachricht nicht-blockierend ein
    pub fn senden(&self, nachricht: impl Into<Ausgehend>) -> Result<(), SendeFehler> {
        if self.schliessen_angefordert() {
            return Err(SendeFehler::Geschlossen);
        }
        match self.tx.try_send(nachricht.into()) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(verbindung = %self.id, "Send-Queue voll – Nachricht verworfen");
                Err(SendeFehler::Voll)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(verbindung = %self.id, "Send-Queue geschlossen (Client getrennt)");
                Err(SendeFehler::Geschlossen)
            }
        }
    }

    /// Fordert das Schliessen der Verbindung an
    ///
    /// Nur der erste Grund zaehlt, weitere Aufrufe sind wirkungslos.
    pub fn schliessen(&self, grund: SchliessGrund) {
        let gesetzt = self.schliessen_tx.send_if_modified(|aktuell| {
            if aktuell.is_none() {
                *aktuell = Some(grund);
                true
            } else {
                false
            }
        });
        if gesetzt {
            tracing::debug!(verbindung = %self.id, grund = grund.text(), "Schliessen angefordert");
        }
    }

    /// Gibt den angeforderten Schliessgrund zurueck
    pub fn schliess_grund(&self) -> Option<SchliessGrund> {
        *self.schliessen_tx.borrow()
    }

    fn schliessen_angefordert(&self) -> bool {
        self.schliess_grund().is_some()
    }

    /// Prueft ob die Verbindung noch Nachrichten annehmen kann
    pub fn ist_offen(&self) -> bool {
        !self.tx.is_closed() && !self.schliessen_angefordert()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Message-Dispatcher – Routet Client-Nachrichten an die richtigen Handler
//!
//! Der Dispatcher empfaengt dekodierte Frames einer ClientConnection,
//! prueft den Verbindungszustand und ruft den passenden Handler auf.
//! Antworten und Weiterleitungen laufen ueber die Send-Queues.
//!
//! ## Zustandspruefung
//! - `join`, `register`, `login` sind immer erlaubt (auf einer bereits
//!   angemeldeten Verbindung mit Fehlerantwort)
//! - Alle anderen Nachrichten nur im angemeldeten Zustand, sonst verworfen

use klingel_core::Nickname;
use klingel_protocol::{Ausgehend, ClientNachricht};
use std::sync::Arc;

use crate::broadcast::{SendeFehler, VerbindungsHandle};
use crate::error::{SignalingError, SignalingResult};
use crate::handlers::{auth_handler, contact_handler, forward_handler};
use crate::server_state::SignalingState;

// ---------------------------------------------------------------------------
// VerbindungsKontext
// ---------------------------------------------------------------------------

/// Zustand einer einzelnen Verbindung
///
/// Haelt die eigene Verbindung und den angemeldeten Nickname. Beim Drop
/// (auch bei Panic im Verbindungs-Task) wird die Session aufgeraeumt.
pub struct VerbindungsKontext {
    state: Arc<SignalingState>,
    /// Eigene Verbindung (Send-Queue + Schliess-Signal)
    pub verbindung: VerbindungsHandle,
    /// Angemeldeter Nickname (None solange nicht authentifiziert)
    nickname: Option<Nickname>,
}

impl VerbindungsKontext {
    pub fn neu(state: Arc<SignalingState>, verbindung: VerbindungsHandle) -> Self {
        Self {
            state,
            verbindung,
            nickname: None,
        }
    }

    pub fn state(&self) -> &Arc<SignalingState> {
        &self.state
    }

    pub fn nickname(&self) -> Option<&Nickname> {
        self.nickname.as_ref()
    }

    pub fn ist_authentifiziert(&self) -> bool {
        self.nickname.is_some()
    }

    pub(crate) fn authentifizieren(&mut self, nickname: Nickname) {
        tracing::debug!(
            nickname = %nickname,
            verbindung = %self.verbindung.id(),
            "Verbindung authentifiziert"
        );
        self.nickname = Some(nickname);
    }

    /// Legt eine Antwort in die eigene Send-Queue
    ///
    /// Eine volle Queue verwirft nur diese Antwort. Ist die eigene
    /// Verbindung geschlossen, endet der Verbindungs-Task.
    pub fn antworten(&self, nachricht: impl Into<Ausgehend>) -> SignalingResult<()> {
        match self.verbindung.senden(nachricht) {
            Ok(()) | Err(SendeFehler::Voll) => Ok(()),
            Err(SendeFehler::Geschlossen) => Err(SignalingError::VerbindungGetrennt),
        }
    }

    /// Raeumt die Session dieser Verbindung auf (idempotent)
    ///
    /// Entfernt nur, wenn der Nickname noch an diese Verbindung gebunden ist.
    pub fn beenden(&mut self) {
        if let Some(nickname) = self.nickname.take() {
            self.state.sitzung_beenden(&nickname, self.verbindung.id());
        }
    }
}

impl Drop for VerbindungsKontext {
    fn drop(&mut self) {
        self.beenden();
    }
}

// ---------------------------------------------------------------------------
// MessageDispatcher
// ---------------------------------------------------------------------------

/// Zentraler Message-Dispatcher
pub struct MessageDispatcher {
    state: Arc<SignalingState>,
}

impl MessageDispatcher {
    /// Erstellt einen neuen Dispatcher
    pub fn neu(state: Arc<SignalingState>) -> Self {
        Self { state }
    }

    /// Dekodiert einen Text-Frame und verarbeitet ihn
    ///
    /// Jeder Frame einer angemeldeten Verbindung zaehlt als Aktivitaet, auch
    /// ein ungueltiger. Ungueltige Frames werden verworfen, die Verbindung
    /// bleibt offen.
    pub fn frame_verarbeiten(
        &self,
        text: &str,
        ctx: &mut VerbindungsKontext,
    ) -> SignalingResult<()> {
        if let Some(nickname) = ctx.nickname() {
            self.state.sessions.aktivitaet_melden(nickname);
        }

        match ClientNachricht::dekodieren(text) {
            Ok(nachricht) => {
                tracing::trace!(
                    typ = nachricht.typ(),
                    verbindung = %ctx.verbindung.id(),
                    "Nachricht empfangen"
                );
                self.dispatch(nachricht, ctx)
            }
            Err(e) => {
                tracing::debug!(
                    verbindung = %ctx.verbindung.id(),
                    fehler = %e,
                    "Ungueltiger Frame verworfen"
                );
                Ok(())
            }
        }
    }

    /// Verarbeitet eine dekodierte Nachricht
    pub fn dispatch(
        &self,
        nachricht: ClientNachricht,
        ctx: &mut VerbindungsKontext,
    ) -> SignalingResult<()> {
        match nachricht {
            // -------------------------------------------------------------------
            // Anmeldung (immer erlaubt)
            // -------------------------------------------------------------------
            ClientNachricht::Join(req) => auth_handler::handle_join(req, ctx),
            ClientNachricht::Register(req) => auth_handler::handle_register(req, ctx),
            ClientNachricht::Login(req) => auth_handler::handle_login(req, ctx),

            // -------------------------------------------------------------------
            // Alles andere erfordert Anmeldung
            // -------------------------------------------------------------------
            ClientNachricht::SearchUser(req) => match self.angemeldet("search_user", ctx) {
                Some(absender) => contact_handler::handle_search(req, &absender, ctx),
                None => Ok(()),
            },
            ClientNachricht::AddContactRequest(req) => {
                match self.angemeldet("add_contact_request", ctx) {
                    Some(absender) => contact_handler::handle_contact_request(req, &absender, ctx),
                    None => Ok(()),
                }
            }
            ClientNachricht::AddContactResponse(req) => {
                match self.angemeldet("add_contact_response", ctx) {
                    Some(absender) => {
                        contact_handler::handle_contact_response(req, &absender, ctx)
                    }
                    None => Ok(()),
                }
            }
            ClientNachricht::Weiterleiten(w) => match self.angemeldet(w.art.as_str(), ctx) {
                Some(absender) => forward_handler::handle_forward(w, &absender, ctx),
                None => Ok(()),
            },
        }
    }

    /// Gibt den angemeldeten Nickname zurueck
    ///
    /// Ohne Anmeldung wird die Nachricht verworfen.
    fn angemeldet(&self, typ: &str, ctx: &VerbindungsKontext) -> Option<Nickname> {
        let Some(absender) = ctx.nickname().cloned() else {
            tracing::debug!(
                typ,
                verbindung = %ctx.verbindung.id(),
                "Nachricht vor Anmeldung verworfen"
            );
            return None;
        };
        Some(absender)
    }
}

//! klingel-signaling – WebSocket Presence- und Signaling-Layer
//!
//! Dieser Crate implementiert den Kern von Klingel: wer ist online, wer ist
//! mit wem bekannt, und die Weiterleitung von Call-Setup-, SDP/ICE- und
//! Textnachrichten zwischen Clients. Medien werden nicht transportiert.
//!
//! ## Architektur
//!
//! ```text
//! WebSocket Listener (SignalingServer, axum)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task)
//!     |  State Machine: Unauthentifiziert -> Authentifiziert -> Geschlossen
//!     |
//!     v
//! MessageDispatcher
//!     |
//!     +-- AuthHandler     (join, register, login)
//!     +-- ContactHandler  (search_user, add_contact_request/response)
//!     +-- ForwardHandler  (call, offer, answer, candidate, text_message, ...)
//!
//! SessionRegistry     – Nickname -> Verbindung + letzte Aktivitaet
//! KontaktGraph        – Registrierte Nicknames und symmetrische Kontakte
//! PresenceBroadcaster – user_list an alle offenen Verbindungen
//! LivenessMonitor     – Entfernt inaktive Sessions periodisch
//! ```

pub mod broadcast;
pub mod connection;
pub mod contacts;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod liveness;
pub mod presence;
pub mod registry;
pub mod server_state;
pub mod ws;

// Bequeme Re-Exporte
pub use broadcast::{SchliessGrund, SendeFehler, VerbindungsEmpfaenger, VerbindungsHandle};
pub use connection::ClientConnection;
pub use contacts::KontaktGraph;
pub use dispatcher::{MessageDispatcher, VerbindungsKontext};
pub use error::{SignalingError, SignalingResult};
pub use liveness::LivenessMonitor;
pub use presence::PresenceBroadcaster;
pub use registry::{RegistrierErgebnis, SessionRegistry};
pub use server_state::{SignalingConfig, SignalingState, Zustellung};
pub use ws::SignalingServer;

//! klingel-protocol – Nachrichten des Signaling-Protokolls
//!
//! Dieses Crate definiert alle JSON-Nachrichten die zwischen Client und
//! Server ueber die WebSocket-Verbindung ausgetauscht werden.

pub mod control;

pub use control::{
    AnmeldeAntwort, Anmeldung, Ausgehend, ClientNachricht, DekodierFehler, KontaktAnfrage,
    KontaktAntwort, ServerNachricht, Suche, Weiterleitung, WeiterleitungsArt,
};

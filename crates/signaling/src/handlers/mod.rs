//! Handler fuer alle Client-Nachrichten
//!
//! Jeder Handler ist fuer eine Gruppe von Nachrichtentypen zustaendig
//! und greift ueber den VerbindungsKontext auf den SignalingState zu.

pub mod auth_handler;
pub mod contact_handler;
pub mod forward_handler;

//! Forward-Handler – Call-Setup, SDP/ICE und Textnachrichten
//!
//! Der Umschlag wird unveraendert weitergereicht, nur `from` wird vom
//! Server gesetzt. Ist das Ziel nicht erreichbar, erhaelt der Absender
//! eine `error`-Nachricht.

use klingel_core::Nickname;
use klingel_protocol::{Ausgehend, ServerNachricht, Weiterleitung};

use crate::dispatcher::VerbindungsKontext;
use crate::error::SignalingResult;
use crate::server_state::Zustellung;

/// Leitet einen adressierten Umschlag an `to` weiter
pub fn handle_forward(
    weiterleitung: Weiterleitung,
    absender: &Nickname,
    ctx: &VerbindungsKontext,
) -> SignalingResult<()> {
    let art = weiterleitung.art;
    let Some(ziel) = weiterleitung.to.clone() else {
        tracing::debug!(typ = art.as_str(), nickname = %absender, "Weiterleitung ohne Ziel");
        return ctx.antworten(ServerNachricht::error(format!(
            "{}: Empfaenger fehlt",
            art.as_str()
        )));
    };

    let umschlag = Ausgehend::Weitergeleitet(weiterleitung.mit_absender(absender));
    match ctx.state().an_benutzer_senden(&ziel, umschlag) {
        Zustellung::Zugestellt => {
            ctx.state()
                .metriken
                .messages_forwarded_total
                .with_label_values(&[art.as_str()])
                .inc();
            tracing::trace!(typ = art.as_str(), von = %absender, an = %ziel, "Weitergeleitet");
            Ok(())
        }
        Zustellung::Verworfen => {
            ctx.antworten(ServerNachricht::error(format!(
                "{}: Empfaenger '{}' ueberlastet, Nachricht verworfen",
                art.as_str(),
                ziel
            )))
        }
        Zustellung::Offline | Zustellung::Geschlossen => {
            tracing::debug!(typ = art.as_str(), von = %absender, an = %ziel, "Empfaenger nicht online");
            ctx.antworten(ServerNachricht::error(format!(
                "{}: Empfaenger '{}' nicht gefunden oder offline",
                art.as_str(),
                ziel
            )))
        }
    }
}

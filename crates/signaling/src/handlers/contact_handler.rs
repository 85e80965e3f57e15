//! Contact-Handler – Suche und Kontaktanfragen
//!
//! Fehlgeschlagene Vorbedingungen (unbekannter Nickname, man selbst,
//! bereits Kontakt) werden still ignoriert.

use klingel_core::Nickname;
use klingel_protocol::{KontaktAnfrage, KontaktAntwort, ServerNachricht, Suche};

use crate::dispatcher::VerbindungsKontext;
use crate::error::SignalingResult;

/// `search_user` – Teilstringsuche ueber alle registrierten Nicknames
pub fn handle_search(
    request: Suche,
    absender: &Nickname,
    ctx: &VerbindungsKontext,
) -> SignalingResult<()> {
    let anfrage = request.query.trim();
    if anfrage.is_empty() {
        return Ok(());
    }

    let users = ctx.state().kontakte.suchen(anfrage, absender.as_str());
    tracing::debug!(
        nickname = %absender,
        anfrage,
        treffer = users.len(),
        "Benutzersuche"
    );
    ctx.antworten(ServerNachricht::SearchResult { users })
}

/// `add_contact_request` – Anfrage an den Ziel-Nickname weiterreichen
pub fn handle_contact_request(
    request: KontaktAnfrage,
    absender: &Nickname,
    ctx: &VerbindungsKontext,
) -> SignalingResult<()> {
    let state = ctx.state();
    let Some(ziel) = state.kontakte.konto(&request.to) else {
        tracing::debug!(ziel = %request.to, "Kontaktanfrage an unbekannten Nickname");
        return Ok(());
    };
    if ziel == *absender {
        return Ok(());
    }
    if state.kontakte.sind_kontakte(absender.as_str(), ziel.as_str()) {
        tracing::debug!(nickname = %absender, ziel = %ziel, "Bereits Kontakte");
        return Ok(());
    }

    let zustellung = state.an_benutzer_senden(
        ziel.as_str(),
        ServerNachricht::IncomingContactRequest {
            from: absender.clone(),
        },
    );
    tracing::debug!(nickname = %absender, ziel = %ziel, ?zustellung, "Kontaktanfrage");
    Ok(())
}

/// `add_contact_response` – Anfrage annehmen oder ablehnen
pub fn handle_contact_response(
    request: KontaktAntwort,
    absender: &Nickname,
    ctx: &VerbindungsKontext,
) -> SignalingResult<()> {
    let state = ctx.state();
    let Some(anfragender) = state.kontakte.konto(&request.from) else {
        tracing::debug!(from = %request.from, "Kontaktantwort fuer unbekannten Nickname");
        return Ok(());
    };
    if anfragender == *absender {
        return Ok(());
    }

    if request.accepted {
        state.kontakte.gegenseitig_hinzufuegen(absender, &anfragender);
        tracing::info!(a = %absender, b = %anfragender, "Kontakt hinzugefuegt");

        state.an_benutzer_senden(
            anfragender.as_str(),
            ServerNachricht::ContactAdded {
                nickname: absender.clone(),
            },
        );
        ctx.antworten(ServerNachricht::ContactAdded {
            nickname: anfragender,
        })
    } else {
        tracing::debug!(nickname = %absender, anfragender = %anfragender, "Kontaktanfrage abgelehnt");
        state.an_benutzer_senden(
            anfragender.as_str(),
            ServerNachricht::ContactRejected {
                nickname: absender.clone(),
            },
        );
        Ok(())
    }
}

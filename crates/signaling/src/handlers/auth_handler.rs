//! Auth-Handler – join, register, login
//!
//! Bindet eine Verbindung an einen Nickname. Eine aeltere Verbindung
//! desselben Nicknames wird dabei geschlossen (die neueste gewinnt).
//! Nach jeder erfolgreichen Anmeldung erhalten alle die neue Online-Liste.

use klingel_core::Nickname;
use klingel_protocol::{AnmeldeAntwort, Anmeldung, ServerNachricht};

use crate::dispatcher::VerbindungsKontext;
use crate::error::SignalingResult;
use crate::registry::RegistrierErgebnis;

const BEREITS_ANGEMELDET: &str = "Bereits angemeldet";
const NICKNAME_VERGEBEN: &str = "Dieser Nickname ist bereits vergeben";
const BENUTZER_NICHT_GEFUNDEN: &str = "Benutzer nicht gefunden";

/// `join` – Konto bei Bedarf anlegen und anmelden
pub fn handle_join(request: Anmeldung, ctx: &mut VerbindungsKontext) -> SignalingResult<()> {
    if ctx.ist_authentifiziert() {
        return ctx.antworten(ServerNachricht::Joined(AnmeldeAntwort::fehler(
            BEREITS_ANGEMELDET,
        )));
    }

    let nickname = match ctx.state().nickname_pruefen(&request.nickname) {
        Ok(n) => n,
        Err(e) => {
            tracing::debug!(fehler = %e, "join mit ungueltigem Nickname abgelehnt");
            return ctx.antworten(ServerNachricht::Joined(AnmeldeAntwort::fehler(
                e.to_string(),
            )));
        }
    };

    // Vorhandenes Konto wiederverwenden (gespeicherte Schreibweise)
    let nickname = match ctx.state().kontakte.konto(nickname.as_str()) {
        Some(vorhanden) => vorhanden,
        None => {
            ctx.state().kontakte.konto_anlegen(nickname.clone());
            tracing::info!(nickname = %nickname, "Konto angelegt");
            nickname
        }
    };

    sitzung_uebernehmen(ctx, nickname.clone());
    let kontakte = kontakte_von(ctx, &nickname);
    ctx.antworten(ServerNachricht::Joined(AnmeldeAntwort::erfolg(Some(kontakte))))?;
    ctx.state().presence.user_liste_senden();
    Ok(())
}

/// `register` – neues Konto anlegen und anmelden
pub fn handle_register(request: Anmeldung, ctx: &mut VerbindungsKontext) -> SignalingResult<()> {
    if ctx.ist_authentifiziert() {
        return ctx.antworten(ServerNachricht::RegisterResponse(AnmeldeAntwort::fehler(
            BEREITS_ANGEMELDET,
        )));
    }

    let nickname = match ctx.state().nickname_pruefen(&request.nickname) {
        Ok(n) => n,
        Err(e) => {
            tracing::debug!(fehler = %e, "register mit ungueltigem Nickname abgelehnt");
            return ctx.antworten(ServerNachricht::RegisterResponse(AnmeldeAntwort::fehler(
                e.to_string(),
            )));
        }
    };

    if !ctx.state().kontakte.konto_anlegen(nickname.clone()) {
        tracing::debug!(nickname = %nickname, "register: Nickname bereits vergeben");
        return ctx.antworten(ServerNachricht::RegisterResponse(AnmeldeAntwort::fehler(
            NICKNAME_VERGEBEN,
        )));
    }

    tracing::info!(
        nickname = %nickname,
        konten = ctx.state().kontakte.konto_anzahl(),
        "Konto registriert"
    );
    sitzung_uebernehmen(ctx, nickname);
    ctx.antworten(ServerNachricht::RegisterResponse(AnmeldeAntwort::erfolg(None)))?;
    ctx.state().presence.user_liste_senden();
    Ok(())
}

/// `login` – vorhandenes Konto an diese Verbindung binden
pub fn handle_login(request: Anmeldung, ctx: &mut VerbindungsKontext) -> SignalingResult<()> {
    if ctx.ist_authentifiziert() {
        return ctx.antworten(ServerNachricht::LoginResponse(AnmeldeAntwort::fehler(
            BEREITS_ANGEMELDET,
        )));
    }

    let Some(nickname) = ctx.state().kontakte.konto(request.nickname.trim()) else {
        tracing::debug!(nickname = %request.nickname, "login: unbekannter Nickname");
        return ctx.antworten(ServerNachricht::LoginResponse(AnmeldeAntwort::fehler(
            BENUTZER_NICHT_GEFUNDEN,
        )));
    };

    sitzung_uebernehmen(ctx, nickname.clone());
    let kontakte = kontakte_von(ctx, &nickname);
    ctx.antworten(ServerNachricht::LoginResponse(AnmeldeAntwort::erfolg(Some(kontakte))))?;
    ctx.state().presence.user_liste_senden();
    Ok(())
}

// ---------------------------------------------------------------------------
// Hilfsfunktionen
// ---------------------------------------------------------------------------

/// Bindet den Nickname an die eigene Verbindung
fn sitzung_uebernehmen(ctx: &mut VerbindungsKontext, nickname: Nickname) {
    let ergebnis = ctx
        .state()
        .sessions
        .registrieren(nickname.clone(), ctx.verbindung.clone());
    if let RegistrierErgebnis::Ersetzt { alte_verbindung } = ergebnis {
        ctx.state().metriken.sessions_superseded_total.inc();
        tracing::info!(
            nickname = %nickname,
            alte_verbindung = %alte_verbindung,
            neue_verbindung = %ctx.verbindung.id(),
            "Aeltere Session verdraengt"
        );
    }
    ctx.authentifizieren(nickname);
}

fn kontakte_von(ctx: &VerbindungsKontext, nickname: &Nickname) -> Vec<Nickname> {
    ctx.state()
        .kontakte
        .kontakte_von(nickname.as_str())
        .into_iter()
        .collect()
}

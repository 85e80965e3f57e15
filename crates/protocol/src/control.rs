//! Control-Protokoll (WebSocket, JSON)
//!
//! Definiert alle Steuerungsnachrichten die zwischen Client und Server
//! ausgetauscht werden.
//!
//! ## Design
//! - Jeder Frame ist ein JSON-Objekt mit Pflichtfeld `type`
//! - Eingehende Frames werden genau einmal in `ClientNachricht` dekodiert
//! - Weitergeleitete Nachrichten bleiben als JSON-Objekt erhalten, der
//!   Server setzt nur `from`

use klingel_core::Nickname;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Dekodierfehler
// ---------------------------------------------------------------------------

/// Gruende warum ein eingehender Frame ignoriert wird
#[derive(Debug, Error)]
pub enum DekodierFehler {
    #[error("Kein gueltiges JSON: {0}")]
    KeinJson(#[source] serde_json::Error),

    #[error("JSON-Wert ist kein Objekt")]
    KeinObjekt,

    #[error("Feld 'type' fehlt")]
    TypFehlt,

    #[error("Unbekannter Nachrichtentyp '{0}'")]
    UnbekannterTyp(String),

    #[error("Ungueltige Felder fuer '{typ}': {quelle}")]
    UngueltigeFelder {
        typ: String,
        #[source]
        quelle: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Eingehende Nachrichten
// ---------------------------------------------------------------------------

/// Identitaets-Anspruch (`join`, `register`, `login`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anmeldung {
    /// Roher Nickname, wird im Router validiert
    #[serde(default)]
    pub nickname: String,
}

/// Benutzersuche
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suche {
    #[serde(default)]
    pub query: String,
}

/// Kontaktanfrage an einen anderen Benutzer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KontaktAnfrage {
    pub to: String,
}

/// Antwort auf eine eingegangene Kontaktanfrage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KontaktAntwort {
    /// Urspruenglicher Anfragesteller
    pub from: String,
    #[serde(default)]
    pub accepted: bool,
}

/// Nachrichtentypen die unveraendert an `to` weitergeleitet werden
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeiterleitungsArt {
    Call,
    CallAccepted,
    CallRejected,
    Offer,
    Answer,
    Candidate,
    TextMessage,
}

impl WeiterleitungsArt {
    /// Alle weiterleitbaren Typen
    pub const ALLE: [WeiterleitungsArt; 7] = [
        Self::Call,
        Self::CallAccepted,
        Self::CallRejected,
        Self::Offer,
        Self::Answer,
        Self::Candidate,
        Self::TextMessage,
    ];

    /// Wire-Name des Typs (Wert des `type`-Felds)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::CallAccepted => "call_accepted",
            Self::CallRejected => "call_rejected",
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::Candidate => "candidate",
            Self::TextMessage => "text_message",
        }
    }

    /// Ordnet einen `type`-Wert einer Weiterleitungsart zu
    pub fn aus_typ(typ: &str) -> Option<Self> {
        Self::ALLE.into_iter().find(|art| art.as_str() == typ)
    }
}

/// Eine adressierte Nachricht mit opakem Inhalt
#[derive(Debug, Clone, PartialEq)]
pub struct Weiterleitung {
    pub art: WeiterleitungsArt,
    /// Zieladresse; `None` wenn das Feld fehlt oder kein String ist
    pub to: Option<String>,
    /// Vollstaendiger Umschlag inklusive `type` und `to`
    umschlag: Map<String, Value>,
}

impl Weiterleitung {
    /// Setzt `from` auf den Absender und gibt den Umschlag zur Zustellung zurueck
    ///
    /// Ein vom Client mitgeschicktes `from` wird ueberschrieben.
    pub fn mit_absender(mut self, absender: &Nickname) -> Map<String, Value> {
        self.umschlag
            .insert("from".to_string(), Value::String(absender.to_string()));
        self.umschlag
    }
}

/// Alle Nachrichten die ein Client senden darf
#[derive(Debug, Clone)]
pub enum ClientNachricht {
    Join(Anmeldung),
    Register(Anmeldung),
    Login(Anmeldung),
    SearchUser(Suche),
    AddContactRequest(KontaktAnfrage),
    AddContactResponse(KontaktAntwort),
    Weiterleiten(Weiterleitung),
}

impl ClientNachricht {
    /// Dekodiert einen Text-Frame
    pub fn dekodieren(text: &str) -> Result<Self, DekodierFehler> {
        let wert: Value = serde_json::from_str(text).map_err(DekodierFehler::KeinJson)?;
        Self::aus_wert(wert)
    }

    /// Dekodiert einen bereits geparsten JSON-Wert
    pub fn aus_wert(wert: Value) -> Result<Self, DekodierFehler> {
        let Value::Object(umschlag) = wert else {
            return Err(DekodierFehler::KeinObjekt);
        };
        let typ = umschlag
            .get("type")
            .and_then(Value::as_str)
            .ok_or(DekodierFehler::TypFehlt)?
            .to_string();

        let nachricht = match typ.as_str() {
            "join" => Self::Join(felder(&typ, umschlag)?),
            "register" => Self::Register(felder(&typ, umschlag)?),
            "login" => Self::Login(felder(&typ, umschlag)?),
            "search_user" => Self::SearchUser(felder(&typ, umschlag)?),
            "add_contact_request" => Self::AddContactRequest(felder(&typ, umschlag)?),
            "add_contact_response" => Self::AddContactResponse(felder(&typ, umschlag)?),
            andere => {
                let art = WeiterleitungsArt::aus_typ(andere)
                    .ok_or_else(|| DekodierFehler::UnbekannterTyp(typ.clone()))?;
                let to = umschlag
                    .get("to")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                Self::Weiterleiten(Weiterleitung { art, to, umschlag })
            }
        };
        Ok(nachricht)
    }

    /// Wire-Name des Typs (fuer Logging)
    pub fn typ(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::Register(_) => "register",
            Self::Login(_) => "login",
            Self::SearchUser(_) => "search_user",
            Self::AddContactRequest(_) => "add_contact_request",
            Self::AddContactResponse(_) => "add_contact_response",
            Self::Weiterleiten(w) => w.art.as_str(),
        }
    }
}

fn felder<T: DeserializeOwned>(typ: &str, umschlag: Map<String, Value>) -> Result<T, DekodierFehler> {
    serde_json::from_value(Value::Object(umschlag)).map_err(|quelle| {
        DekodierFehler::UngueltigeFelder {
            typ: typ.to_string(),
            quelle,
        }
    })
}

// ---------------------------------------------------------------------------
// Ausgehende Nachrichten
// ---------------------------------------------------------------------------

/// Antwort auf `join`, `register` und `login`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnmeldeAntwort {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<Nickname>>,
}

impl AnmeldeAntwort {
    /// Erfolgreiche Anmeldung, optional mit Kontaktliste
    pub fn erfolg(contacts: Option<Vec<Nickname>>) -> Self {
        Self {
            success: true,
            error: None,
            contacts,
        }
    }

    /// Fehlgeschlagene Anmeldung
    pub fn fehler(grund: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(grund.into()),
            contacts: None,
        }
    }
}

/// Alle Nachrichten die der Server selbst erzeugt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerNachricht {
    UserList { users: Vec<Nickname> },
    Joined(AnmeldeAntwort),
    RegisterResponse(AnmeldeAntwort),
    LoginResponse(AnmeldeAntwort),
    SearchResult { users: Vec<Nickname> },
    IncomingContactRequest { from: Nickname },
    ContactAdded { nickname: Nickname },
    ContactRejected { nickname: Nickname },
    Error { message: String },
}

impl ServerNachricht {
    /// Erstellt eine Fehlermeldung an den Absender
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Ein Frame in der Send-Queue eines Clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Ausgehend {
    /// Vom Server erzeugte Nachricht
    Server(ServerNachricht),
    /// Weitergeleiteter Umschlag eines anderen Clients
    Weitergeleitet(Map<String, Value>),
}

impl Ausgehend {
    /// Serialisiert den Frame als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<ServerNachricht> for Ausgehend {
    fn from(nachricht: ServerNachricht) -> Self {
        Self::Server(nachricht)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

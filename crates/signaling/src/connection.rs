//! Client-Connection – Verwaltet eine einzelne WebSocket-Verbindung
//!
//! Jede WebSocket-Verbindung bekommt eine `ClientConnection` in einem
//! eigenen tokio-Task. Der Task liest eingehende Frames, leert die eigene
//! Send-Queue auf den Socket und reagiert auf das Schliess-Signal.
//!
//! ## State Machine
//! ```text
//! Unauthentifiziert -> Authentifiziert -> Geschlossen
//!         |                                   ^
//!         +----------- Disconnect ------------+
//! ```
//!
//! Beim Verlassen der Schleife (Close, Fehler, Verdraengung, Timeout,
//! Shutdown) wird die Session ueber den VerbindungsKontext aufgeraeumt.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use klingel_protocol::Ausgehend;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

use crate::broadcast::{SchliessGrund, VerbindungsHandle};
use crate::dispatcher::{MessageDispatcher, VerbindungsKontext};
use crate::error::SignalingResult;
use crate::server_state::SignalingState;

/// Verarbeitet eine einzelne WebSocket-Verbindung
pub struct ClientConnection {
    state: Arc<SignalingState>,
    peer_addr: SocketAddr,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection
    pub fn neu(state: Arc<SignalingState>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Diese Methode laeuft bis die Verbindung getrennt wird oder ein
    /// Shutdown-Signal eingeht.
    pub async fn verarbeiten(self, socket: WebSocket, mut shutdown_rx: watch::Receiver<bool>) {
        let peer_addr = self.peer_addr;
        let (verbindung, mut empfaenger) =
            VerbindungsHandle::neu(self.state.config.send_queue_groesse);
        let verbindungs_id = verbindung.id();

        tracing::info!(peer = %peer_addr, verbindung = %verbindungs_id, "Neue Verbindung");

        let (mut sink, mut stream) = socket.split();
        let mut ctx = VerbindungsKontext::neu(Arc::clone(&self.state), verbindung);
        let dispatcher = MessageDispatcher::neu(Arc::clone(&self.state));

        let beim_start_herunterfahren = *shutdown_rx.borrow();
        let grund = if beim_start_herunterfahren {
            Some(SchliessGrund::Herunterfahren)
        } else {
            loop {
                tokio::select! {
                    biased;

                    // Schliessen angefordert (Verdraengung, Timeout)
                    Ok(()) = empfaenger.schliessen.changed() => {
                        let angefordert = *empfaenger.schliessen.borrow_and_update();
                        if let Some(grund) = angefordert {
                            break Some(grund);
                        }
                    }

                    // Shutdown-Signal
                    Ok(()) = shutdown_rx.changed() => {
                        let herunterfahren = *shutdown_rx.borrow();
                        if herunterfahren {
                            tracing::info!(peer = %peer_addr, "Shutdown-Signal – Verbindung wird getrennt");
                            break Some(SchliessGrund::Herunterfahren);
                        }
                    }

                    // Ausgehende Nachricht aus der eigenen Send-Queue
                    Some(ausgehend) = empfaenger.nachrichten.recv() => {
                        if let Err(e) = frame_senden(&mut sink, &ausgehend).await {
                            tracing::warn!(peer = %peer_addr, fehler = %e, "Senden fehlgeschlagen");
                            break None;
                        }
                    }

                    // Eingehende Nachricht vom Client
                    frame = stream.next() => {
                        let text = match frame {
                            Some(Ok(Message::Text(text))) => text,
                            Some(Ok(Message::Binary(daten))) => match String::from_utf8(daten) {
                                Ok(text) => text,
                                Err(_) => {
                                    tracing::debug!(peer = %peer_addr, "Binaer-Frame ohne UTF-8 verworfen");
                                    continue;
                                }
                            },
                            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                            Some(Ok(Message::Close(_))) | None => {
                                tracing::info!(peer = %peer_addr, "Verbindung vom Client getrennt");
                                break None;
                            }
                            Some(Err(e)) => {
                                tracing::warn!(peer = %peer_addr, fehler = %e, "WebSocket-Lesefehler");
                                break None;
                            }
                        };

                        tracing::trace!(peer = %peer_addr, laenge = text.len(), "Frame empfangen");
                        if let Err(e) = dispatcher.frame_verarbeiten(&text, &mut ctx) {
                            tracing::warn!(peer = %peer_addr, fehler = %e, "Verbindung wird wegen Fehler beendet");
                            break None;
                        }
                    }
                }
            }
        };

        // Session aufraeumen bevor der Socket geschlossen wird
        ctx.beenden();
        drop(empfaenger);

        if let Some(grund) = grund {
            tracing::debug!(peer = %peer_addr, code = grund.code(), grund = grund.text(), "Sende Close-Frame");
            let close = Message::Close(Some(CloseFrame {
                code: grund.code(),
                reason: grund.text().into(),
            }));
            if let Err(e) = sink.send(close).await {
                tracing::debug!(peer = %peer_addr, fehler = %e, "Close-Frame nicht zustellbar");
            }
        }
        let _ = sink.close().await;

        tracing::info!(peer = %peer_addr, verbindung = %verbindungs_id, "Verbindungs-Task beendet");
    }
}

/// Serialisiert einen Frame und schreibt ihn auf den Socket
async fn frame_senden(
    sink: &mut SplitSink<WebSocket, Message>,
    ausgehend: &Ausgehend,
) -> SignalingResult<()> {
    let json = ausgehend.to_json()?;
    sink.send(Message::Text(json)).await?;
    Ok(())
}

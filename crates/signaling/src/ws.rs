//! WebSocket-Listener fuer den Signaling-Service
//!
//! Nimmt WebSocket-Verbindungen auf `GET /` an und startet fuer jede einen
//! eigenen ClientConnection-Task. Zusaetzliche Routen (Health, Metriken)
//! werden in denselben Router gemerged.
//!
//! Die Verbindungs-Tasks laufen nach dem Upgrade ausserhalb von
//! `axum::serve`. Jeder haelt einen Klon von `aktiv`; beim Shutdown wartet
//! der Server, bis der letzte Klon gedroppt ist (hoechstens
//! `VERBINDUNGEN_ABWARTEN`), damit alle Close-Frames noch rausgehen.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tower_http::trace::TraceLayer;

use crate::connection::ClientConnection;
use crate::error::SignalingResult;
use crate::server_state::SignalingState;

/// Maximale Wartezeit auf laufende Verbindungs-Tasks beim Shutdown
const VERBINDUNGEN_ABWARTEN: Duration = Duration::from_secs(5);

/// State fuer den WebSocket-Handler
#[derive(Clone)]
struct WsState {
    state: Arc<SignalingState>,
    shutdown_rx: watch::Receiver<bool>,
    /// Wird nie beschrieben; lebt solange ein Verbindungs-Task laeuft
    aktiv: mpsc::Sender<()>,
}

/// WebSocket-Server fuer Presence und Signaling
pub struct SignalingServer {
    state: Arc<SignalingState>,
    bind_addr: SocketAddr,
}

impl SignalingServer {
    /// Erstellt einen neuen SignalingServer
    pub fn neu(state: Arc<SignalingState>, bind_addr: SocketAddr) -> Self {
        Self { state, bind_addr }
    }

    /// Bindet den Listener und laeuft bis zum Shutdown-Signal
    pub async fn starten(
        self,
        zusatz: Router,
        shutdown_rx: watch::Receiver<bool>,
    ) -> SignalingResult<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        self.mit_listener(listener, zusatz, shutdown_rx).await
    }

    /// Wie `starten`, aber mit bereits gebundenem Listener
    pub async fn mit_listener(
        self,
        listener: TcpListener,
        zusatz: Router,
        shutdown_rx: watch::Receiver<bool>,
    ) -> SignalingResult<()> {
        let addr = listener.local_addr()?;
        let (aktiv_tx, mut aktiv_rx) = mpsc::channel::<()>(1);
        let app = self.router(zusatz, shutdown_rx.clone(), aktiv_tx);

        tracing::info!(addr = %addr, "Signaling-Server gestartet");

        let mut stop_rx = shutdown_rx;
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = stop_rx.wait_for(|stop| *stop).await;
        })
        .await?;

        // Router samt Sender ist mit `serve` gedroppt: `recv` liefert `None`,
        // sobald der letzte Verbindungs-Task beendet ist
        if tokio::time::timeout(VERBINDUNGEN_ABWARTEN, aktiv_rx.recv())
            .await
            .is_err()
        {
            tracing::warn!(
                wartezeit_sek = VERBINDUNGEN_ABWARTEN.as_secs(),
                "Verbindungs-Tasks nicht rechtzeitig beendet"
            );
        }

        tracing::info!("Signaling-Server beendet");
        Ok(())
    }

    /// Baut den Router mit WebSocket-Route und Zusatzrouten
    fn router(
        &self,
        zusatz: Router,
        shutdown_rx: watch::Receiver<bool>,
        aktiv: mpsc::Sender<()>,
    ) -> Router {
        let ws_state = WsState {
            state: Arc::clone(&self.state),
            shutdown_rx,
            aktiv,
        };
        Router::new()
            .route("/", get(ws_handler))
            .with_state(ws_state)
            .merge(zusatz)
            .layer(TraceLayer::new_for_http())
    }
}

/// GET / – WebSocket-Upgrade
async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    State(ws_state): State<WsState>,
) -> impl IntoResponse {
    let WsState {
        state,
        shutdown_rx,
        aktiv,
    } = ws_state;
    ws.on_upgrade(move |socket| async move {
        ClientConnection::neu(state, peer_addr)
            .verarbeiten(socket, shutdown_rx)
            .await;
        drop(aktiv);
    })
}

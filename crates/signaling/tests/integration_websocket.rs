//! End-to-End-Tests ueber echte WebSocket-Verbindungen

use futures_util::{SinkExt, StreamExt};
use klingel_observability::{observability_router, HealthState, KlingelMetriken};
use klingel_signaling::{SignalingConfig, SignalingServer, SignalingState};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WARTEZEIT: Duration = Duration::from_secs(5);

struct TestServer {
    addr: SocketAddr,
    state: Arc<SignalingState>,
    shutdown_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

async fn server_starten() -> TestServer {
    let metriken = KlingelMetriken::neu().unwrap();
    let state = SignalingState::neu(SignalingConfig::default(), metriken.clone());
    let sessions = state.sessions.clone();
    let health = HealthState::neu(move || sessions.anzahl());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = SignalingServer::neu(Arc::clone(&state), addr);
    let task = tokio::spawn(async move {
        server
            .mit_listener(listener, observability_router(metriken, health), shutdown_rx)
            .await
            .expect("Server-Fehler");
    });

    TestServer {
        addr,
        state,
        shutdown_tx,
        task,
    }
}

async fn verbinden(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/"))
        .await
        .expect("WebSocket-Verbindung fehlgeschlagen");
    client
}

async fn senden(client: &mut Client, nachricht: Value) {
    client
        .send(Message::Text(nachricht.to_string()))
        .await
        .unwrap();
}

/// Liest bis zum ersten JSON-Frame vom Typ `typ`
async fn erwarten(client: &mut Client, typ: &str) -> Value {
    tokio::time::timeout(WARTEZEIT, async {
        loop {
            match client.next().await {
                Some(Ok(Message::Text(text))) => {
                    let frame: Value = serde_json::from_str(&text).unwrap();
                    if frame["type"] == typ {
                        return frame;
                    }
                }
                Some(Ok(_)) => {}
                andere => panic!("Verbindung beendet waehrend auf '{typ}' gewartet wurde: {andere:?}"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("Kein '{typ}' innerhalb der Wartezeit"))
}

/// Liest bis zum Close-Frame und gibt Code und Grund zurueck
async fn close_erwarten(client: &mut Client) -> (u16, String) {
    tokio::time::timeout(WARTEZEIT, async {
        loop {
            match client.next().await {
                Some(Ok(Message::Close(Some(frame)))) => {
                    return (u16::from(frame.code), frame.reason.to_string());
                }
                Some(Ok(_)) => {}
                andere => panic!("Kein Close-Frame: {andere:?}"),
            }
        }
    })
    .await
    .expect("Kein Close-Frame innerhalb der Wartezeit")
}

async fn anmelden(addr: SocketAddr, nickname: &str) -> Client {
    let mut client = verbinden(addr).await;
    senden(&mut client, json!({"type": "join", "nickname": nickname})).await;
    let antwort = erwarten(&mut client, "joined").await;
    assert_eq!(antwort["success"], true);
    client
}

#[tokio::test]
async fn join_und_weiterleitung_ueber_websocket() {
    let server = server_starten().await;
    let mut alice = anmelden(server.addr, "alice").await;
    let mut bob = anmelden(server.addr, "bob").await;

    let liste = erwarten(&mut alice, "user_list").await;
    let liste = if liste["users"] == json!(["alice"]) {
        erwarten(&mut alice, "user_list").await
    } else {
        liste
    };
    assert_eq!(liste["users"], json!(["alice", "bob"]));

    senden(
        &mut alice,
        json!({"type": "text_message", "to": "bob", "text": "hallo"}),
    )
    .await;
    let nachricht = erwarten(&mut bob, "text_message").await;
    assert_eq!(
        nachricht,
        json!({"type": "text_message", "to": "bob", "from": "alice", "text": "hallo"})
    );

    senden(&mut bob, json!({"type": "call", "to": "carol"})).await;
    let fehler = erwarten(&mut bob, "error").await;
    assert!(fehler["message"].as_str().unwrap().contains("carol"));

    let _ = server.shutdown_tx.send(true);
}

#[tokio::test]
async fn verdraengte_verbindung_erhaelt_close_frame() {
    let server = server_starten().await;
    let mut alt = anmelden(server.addr, "alice").await;
    let mut neu = verbinden(server.addr).await;

    senden(&mut neu, json!({"type": "login", "nickname": "alice"})).await;
    let antwort = erwarten(&mut neu, "login_response").await;
    assert_eq!(antwort["success"], true);

    let (code, grund) = close_erwarten(&mut alt).await;
    assert_eq!(code, 1000);
    assert_eq!(grund, "superseded by new session");
    assert_eq!(server.state.sessions.anzahl(), 1);

    let _ = server.shutdown_tx.send(true);
}

#[tokio::test]
async fn verbindungsabbruch_aktualisiert_presence() {
    let server = server_starten().await;
    let mut alice = anmelden(server.addr, "alice").await;
    let bob = anmelden(server.addr, "bob").await;

    drop(bob);

    let liste = tokio::time::timeout(WARTEZEIT, async {
        loop {
            let liste = erwarten(&mut alice, "user_list").await;
            if liste["users"] == json!(["alice"]) {
                return liste;
            }
        }
    })
    .await
    .expect("Presence wurde nicht aktualisiert");
    assert_eq!(liste["users"], json!(["alice"]));

    let _ = server.shutdown_tx.send(true);
}

#[tokio::test]
async fn shutdown_schliesst_verbindungen() {
    let server = server_starten().await;
    let mut alice = anmelden(server.addr, "alice").await;

    server.shutdown_tx.send(true).unwrap();

    let (code, grund) = close_erwarten(&mut alice).await;
    assert_eq!(code, 1001);
    assert_eq!(grund, "server shutting down");
    tokio::time::timeout(WARTEZEIT, server.task)
        .await
        .expect("Server wurde nicht beendet")
        .unwrap();
}

#[tokio::test]
async fn shutdown_wartet_auf_verbindungs_tasks() {
    let server = server_starten().await;
    let mut alice = anmelden(server.addr, "alice").await;
    let mut bob = anmelden(server.addr, "bob").await;
    assert_eq!(server.state.sessions.anzahl(), 2);

    server.shutdown_tx.send(true).unwrap();
    tokio::time::timeout(WARTEZEIT, server.task)
        .await
        .expect("Server wurde nicht beendet")
        .unwrap();

    // Alle Verbindungs-Tasks sind durch, bevor der Server zurueckkehrt
    assert_eq!(server.state.sessions.anzahl(), 0);
    assert_eq!(close_erwarten(&mut alice).await.0, 1001);
    assert_eq!(close_erwarten(&mut bob).await.0, 1001);
}

#[tokio::test]
async fn health_endpunkt_neben_websocket() {
    let server = server_starten().await;
    let _alice = anmelden(server.addr, "alice").await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut antwort = String::new();
    stream.read_to_string(&mut antwort).await.unwrap();

    assert!(antwort.starts_with("HTTP/1.1 200"));
    assert!(antwort.contains("\"online_users\":1"));

    let _ = server.shutdown_tx.send(true);
}

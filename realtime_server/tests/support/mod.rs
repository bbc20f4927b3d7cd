// Shared helpers for integration tests: one server per test binary plus a small WebSocket client.
#![allow(dead_code)]

use std::{
    sync::{
        Arc, OnceLock,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

// Global host:port used by all tests after the server publishes its bound address.
static SERVER_ADDR: OnceLock<String> = OnceLock::new();
// One-time guard that ensures the server bootstrap path runs only once.
static SERVER_READY: OnceLock<()> = OnceLock::new();

pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

// Ensure the test server is running and return its host:port.
pub fn ensure_server() -> &'static str {
    SERVER_READY.get_or_init(|| {
        let published_addr = Arc::new(OnceLock::<String>::new());
        let published_addr_thread = Arc::clone(&published_addr);
        // Spawn an OS thread so the server outlives individual `#[tokio::test]` runtimes.
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                // Bind to an ephemeral port to avoid collisions with local services.
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_addr_thread.set(addr.to_string());
                // In-memory history; no database needed.
                realtime_server::run_with_settings(listener, realtime_server::Settings::default())
                    .await
                    .expect("server failed");
            });
        });
        wait_for_server_readiness(published_addr);
    });

    SERVER_ADDR
        .get()
        .expect("server addr should be initialized")
        .as_str()
}

fn wait_for_server_readiness(published_addr: Arc<OnceLock<String>>) {
    let addr = loop {
        if let Some(addr) = published_addr.get() {
            break addr.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };
    let _ = SERVER_ADDR.set(addr.clone());

    for _ in 0..100 {
        if std::net::TcpStream::connect(&addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("server did not become ready in time");
}

// Ids unique within this test binary so tests never share users.
pub fn next_user_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1_000);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

// Connects as `user_id` and waits until the server has registered the socket.
//
// Registration is confirmed by the first world batch, which is only sent to
// registered connections.
pub async fn connect(user_id: u64) -> Socket {
    let addr = ensure_server();
    let (mut socket, _) = connect_async(format!("ws://{addr}/ws/{user_id}"))
        .await
        .expect("websocket connect");
    recv_type(&mut socket, "remoteData").await;
    socket
}

pub async fn send_json(socket: &mut Socket, value: Value) {
    socket
        .send(Message::text(value.to_string()))
        .await
        .expect("send frame");
}

// Next JSON frame of the given `type`, skipping everything else (mostly world ticks).
pub async fn recv_type(socket: &mut Socket, kind: &str) -> Value {
    tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            let msg = socket
                .next()
                .await
                .expect("socket open")
                .expect("valid frame");
            if let Message::Text(text) = msg {
                let value: Value = serde_json::from_str(text.as_str()).expect("server sends JSON");
                if value["type"] == kind {
                    return value;
                }
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {kind}"))
}

// Frames matching `predicate` seen within `window`.
pub async fn collect_for(
    socket: &mut Socket,
    window: Duration,
    predicate: impl Fn(&Value) -> bool,
) -> Vec<Value> {
    let mut seen = Vec::new();
    let deadline = tokio::time::Instant::now() + window;
    while let Ok(Some(Ok(msg))) = tokio::time::timeout_at(deadline, socket.next()).await {
        if let Message::Text(text) = msg {
            let value: Value = serde_json::from_str(text.as_str()).expect("server sends JSON");
            if predicate(&value) {
                seen.push(value);
            }
        }
    }
    seen
}

// Waits for the server to close the socket and returns the close reason.
pub async fn recv_close(socket: &mut Socket) -> Option<String> {
    tokio::time::timeout(Duration::from_secs(3), async {
        while let Some(msg) = socket.next().await {
            match msg {
                Ok(Message::Close(frame)) => {
                    return frame.map(|frame| frame.reason.to_string());
                }
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
        None
    })
    .await
    .expect("timed out waiting for close")
}

// History between two users as the HTTP route returns it.
pub async fn history(local_id: u64, remote_id: u64) -> Vec<Value> {
    let addr = ensure_server();
    let res = reqwest::Client::new()
        .get(format!(
            "http://{addr}/history?localId={local_id}&remoteId={remote_id}"
        ))
        .send()
        .await
        .expect("history request should succeed");
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    res.json::<Vec<Value>>().await.expect("history body is JSON")
}

// Persistence runs in the background; poll until `count` entries exist.
pub async fn wait_for_history(local_id: u64, remote_id: u64, count: usize) -> Vec<Value> {
    for _ in 0..50 {
        let entries = history(local_id, remote_id).await;
        if entries.len() >= count {
            return entries;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    history(local_id, remote_id).await
}

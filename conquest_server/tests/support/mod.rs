// Shared bootstrapping and client helpers for integration tests.
#![allow(dead_code)]

use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

// Base URL published once the background server has bound its port.
static SERVER_URL: OnceLock<String> = OnceLock::new();
// Guards the bootstrap so it runs once per test binary.
static SERVER_READY: OnceLock<()> = OnceLock::new();

/// Starts the server on first use and returns its `http://host:port` base URL.
pub fn ensure_server() -> &'static str {
    SERVER_READY.get_or_init(|| {
        let published_url = Arc::new(OnceLock::<String>::new());
        let published_url_thread = Arc::clone(&published_url);
        // An OS thread keeps the server alive across individual `#[tokio::test]` runtimes.
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                // Ephemeral port so parallel test binaries never collide.
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_url_thread.set(format!("http://{addr}"));
                conquest_server::run(listener).await.expect("server failed");
            });
        });
        wait_for_server_url_and_readiness(published_url);
    });

    SERVER_URL
        .get()
        .expect("server url should be initialized")
        .as_str()
}

/// WebSocket URL for a session in `room_id` as `user_id`.
pub fn ws_url(room_id: &str, user_id: &str) -> String {
    let base = ensure_server().replacen("http://", "ws://", 1);
    format!("{base}/ws?room_id={room_id}&user_id={user_id}")
}

/// Creates a uniquely named room and returns its id.
pub async fn create_room(client: &reqwest::Client) -> String {
    let base_url = ensure_server();
    let room_id = format!("test-{}", uuid::Uuid::new_v4());
    let res = client
        .post(format!("{base_url}/rooms"))
        .json(&serde_json::json!({ "room_id": room_id }))
        .send()
        .await
        .expect("create room request");
    assert_eq!(res.status(), reqwest::StatusCode::CREATED);
    room_id
}

pub async fn add_player(client: &reqwest::Client, room_id: &str, user_id: &str) -> usize {
    let base_url = ensure_server();
    let res = client
        .post(format!("{base_url}/rooms/{room_id}/players"))
        .json(&serde_json::json!({
            "user_id": user_id,
            "display_name": user_id,
            "is_bot": false,
        }))
        .send()
        .await
        .expect("add player request");
    assert_eq!(res.status(), reqwest::StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.expect("add player body");
    body["player_index"].as_u64().expect("player_index") as usize
}

// Waits for the URL to be published, then for the socket to accept TCP connections.
fn wait_for_server_url_and_readiness(published_url: Arc<OnceLock<String>>) {
    let base_url = loop {
        if let Some(url) = published_url.get() {
            break url.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };
    let _ = SERVER_URL.set(base_url.clone());

    let addr = base_url
        .strip_prefix("http://")
        .expect("base url should use http://");

    for _ in 0..100 {
        if std::net::TcpStream::connect(addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    panic!("server did not become ready in time");
}

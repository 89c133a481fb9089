// End-to-end tests for `HubConnection` against an in-process WebSocket
// hub. The connections skip negotiation and talk ws:// directly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use hublink_client::{ConnectionState, Error, HubConfig, HubConnection, ReconnectPolicy};

const SEP: char = '\u{1e}';
const WAIT: Duration = Duration::from_secs(5);

// ── Mock hub plumbing ───────────────────────────────────────────────

/// Accept one connection and complete the hub handshake.
async fn accept_hub(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.expect("accept");
    let mut ws = tokio_tungstenite::accept_async(stream)
        .await
        .expect("ws upgrade");

    let handshake = loop {
        match ws.next().await.expect("handshake frame").expect("frame") {
            Message::Text(text) => break text.to_string(),
            _ => {}
        }
    };
    assert!(handshake.contains("\"protocol\":\"json\""));

    ws.send(Message::Text(format!("{{}}{SEP}").into()))
        .await
        .expect("handshake ack");
    ws
}

/// Keep reading so the peer stays open; completions come from `reply`.
async fn serve_invocations(
    mut ws: WebSocketStream<TcpStream>,
    reply: impl Fn(&str, &[Value]) -> Option<Value>,
) {
    while let Some(Ok(message)) = ws.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        for record in text.split(SEP).filter(|r| !r.is_empty()) {
            let Ok(value) = serde_json::from_str::<Value>(record) else {
                continue;
            };
            if value["type"] != json!(1) {
                continue;
            }
            let target = value["target"].as_str().unwrap_or_default().to_owned();
            let args = value["arguments"].as_array().cloned().unwrap_or_default();
            let Some(id) = value["invocationId"].as_str() else {
                continue;
            };

            let completion = match reply(&target, &args) {
                Some(result) => json!({ "type": 3, "invocationId": id, "result": result }),
                None => json!({
                    "type": 3,
                    "invocationId": id,
                    "error": format!("unknown hub method '{target}'"),
                }),
            };
            ws.send(Message::Text(format!("{completion}{SEP}").into()))
                .await
                .expect("completion");
        }
    }
}

fn connect_to(addr: std::net::SocketAddr) -> HubConnection {
    let mut config = HubConfig::new(
        format!("ws://{addr}/hubs/chat").parse().expect("url"),
    );
    config.skip_negotiation = true;
    config.keepalive = Duration::from_secs(60);
    HubConnection::new(config).expect("connection")
}

async fn wait_for_state(conn: &HubConnection, want: &ConnectionState) {
    let mut rx = conn.state_changes();
    tokio::time::timeout(WAIT, async {
        loop {
            if *rx.borrow_and_update() == *want {
                return;
            }
            rx.changed().await.expect("state channel");
        }
    })
    .await
    .expect("state never reached");
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn start_connects_and_is_idempotent() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let accepted = Arc::new(AtomicUsize::new(0));

    let count = Arc::clone(&accepted);
    tokio::spawn(async move {
        loop {
            let ws = accept_hub(&listener).await;
            count.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(serve_invocations(ws, |_, _| None));
        }
    });

    let conn = connect_to(addr);
    conn.start().await;
    wait_for_state(&conn, &ConnectionState::Connected).await;

    // Second start must not open a second socket.
    conn.start().await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(accepted.load(Ordering::SeqCst), 1);
    assert!(conn.is_connected());

    conn.stop();
    wait_for_state(&conn, &ConnectionState::Disconnected).await;
}

#[tokio::test]
async fn server_events_fan_out_to_all_handlers() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    tokio::spawn(async move {
        let mut ws = accept_hub(&listener).await;
        let event = json!({
            "type": 1,
            "target": "ReceiveMessage",
            "arguments": [{ "id": "m1", "content": "merhaba" }],
        });
        ws.send(Message::Text(format!("{event}{SEP}").into()))
            .await
            .expect("event");
        serve_invocations(ws, |_, _| None).await;
    });

    let conn = connect_to(addr);
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let seen_a = Arc::clone(&seen);
    conn.on("ReceiveMessage", move |args| {
        let content = args[0]["content"].as_str().unwrap_or_default();
        seen_a.lock().unwrap().push(format!("a:{content}"));
    });
    let seen_b = Arc::clone(&seen);
    conn.on("ReceiveMessage", move |args| {
        let content = args[0]["content"].as_str().unwrap_or_default();
        seen_b.lock().unwrap().push(format!("b:{content}"));
    });

    conn.start().await;
    wait_for_state(&conn, &ConnectionState::Connected).await;

    tokio::time::timeout(WAIT, async {
        loop {
            if seen.lock().unwrap().len() == 2 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("handlers never fired");

    assert_eq!(*seen.lock().unwrap(), vec!["a:merhaba", "b:merhaba"]);
    conn.stop();
}

#[tokio::test]
async fn invoke_round_trips_a_completion() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    tokio::spawn(async move {
        let ws = accept_hub(&listener).await;
        serve_invocations(ws, |target, args| match target {
            "GetOnlineUsers" => Some(json!(["alice", "bob"])),
            "JoinRoom" => Some(json!({ "room": args[0] })),
            _ => None,
        })
        .await;
    });

    let conn = connect_to(addr);
    conn.start().await;
    wait_for_state(&conn, &ConnectionState::Connected).await;

    let users = conn.invoke("GetOnlineUsers", vec![]).await.unwrap();
    assert_eq!(users, json!(["alice", "bob"]));

    let joined = conn.invoke("JoinRoom", vec![json!("genel")]).await.unwrap();
    assert_eq!(joined, json!({ "room": "genel" }));

    // Concurrent invocations resolve independently by id.
    let (a, b) = tokio::join!(
        conn.invoke("GetOnlineUsers", vec![]),
        conn.invoke("JoinRoom", vec![json!("destek")]),
    );
    assert_eq!(a.unwrap(), json!(["alice", "bob"]));
    assert_eq!(b.unwrap(), json!({ "room": "destek" }));

    conn.stop();
}

#[tokio::test]
async fn invoke_surfaces_a_server_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    tokio::spawn(async move {
        let ws = accept_hub(&listener).await;
        serve_invocations(ws, |_, _| None).await;
    });

    let conn = connect_to(addr);
    conn.start().await;
    wait_for_state(&conn, &ConnectionState::Connected).await;

    let err = conn.invoke("NoSuchMethod", vec![]).await.unwrap_err();
    assert!(matches!(
        err,
        Error::InvocationRejected { target, .. } if target == "NoSuchMethod"
    ));

    conn.stop();
}

#[tokio::test]
async fn stop_disconnects_and_blocks_invocations() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    tokio::spawn(async move {
        let ws = accept_hub(&listener).await;
        serve_invocations(ws, |_, _| None).await;
    });

    let conn = connect_to(addr);
    conn.start().await;
    wait_for_state(&conn, &ConnectionState::Connected).await;

    conn.stop();
    assert_eq!(conn.state(), ConnectionState::Disconnected);

    let err = conn.invoke("GetOnlineUsers", vec![]).await;
    assert!(matches!(err, Err(Error::NotConnected)));

    // Stopping again is a no-op.
    conn.stop();
    assert_eq!(conn.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn stop_during_connect_leaves_the_connection_down() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
    let (reached_tx, reached_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        // First connection: withhold the handshake ack until released,
        // so the client is still mid-establishment when stop() runs.
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = tokio_tungstenite::accept_async(stream)
            .await
            .expect("ws upgrade");
        loop {
            match ws.next().await.expect("handshake frame").expect("frame") {
                Message::Text(_) => break,
                _ => {}
            }
        }
        reached_tx.send(()).expect("reached signal");
        release_rx.await.expect("release signal");
        ws.send(Message::Text(format!("{{}}{SEP}").into()))
            .await
            .expect("handshake ack");
        tokio::spawn(serve_invocations(ws, |_, _| None));

        // Later connections complete normally.
        loop {
            let ws = accept_hub(&listener).await;
            tokio::spawn(serve_invocations(ws, |_, _| None));
        }
    });

    let conn = connect_to(addr);
    let starter = tokio::spawn({
        let conn = conn.clone();
        async move { conn.start().await }
    });

    reached_rx.await.expect("handshake reached");
    conn.stop();
    release_tx.send(()).expect("release");
    starter.await.expect("start task");

    // The late-arriving channel must be discarded, not adopted.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert!(!conn.is_connected());
    assert!(matches!(
        conn.invoke("GetOnlineUsers", vec![]).await,
        Err(Error::NotConnected)
    ));

    // A fresh start after the raced stop connects normally.
    conn.start().await;
    wait_for_state(&conn, &ConnectionState::Connected).await;
    conn.stop();
    wait_for_state(&conn, &ConnectionState::Disconnected).await;
}

#[tokio::test]
async fn dropped_connection_reconnects_and_handlers_survive() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let accepted = Arc::new(AtomicUsize::new(0));

    let count = Arc::clone(&accepted);
    tokio::spawn(async move {
        // First connection is dropped abruptly right after the
        // handshake; the second stays up and emits an event.
        let ws = accept_hub(&listener).await;
        count.fetch_add(1, Ordering::SeqCst);
        drop(ws);

        let mut ws = accept_hub(&listener).await;
        count.fetch_add(1, Ordering::SeqCst);
        let event = json!({
            "type": 1,
            "target": "UserOnline",
            "arguments": ["alice"],
        });
        ws.send(Message::Text(format!("{event}{SEP}").into()))
            .await
            .expect("event");
        serve_invocations(ws, |_, _| None).await;
    });

    let conn = {
        let mut config = HubConfig::new(
            format!("ws://{addr}/hubs/chat").parse().expect("url"),
        );
        config.skip_negotiation = true;
        config.keepalive = Duration::from_secs(60);
        config.reconnect = ReconnectPolicy::new(vec![
            Duration::from_millis(10),
            Duration::from_millis(10),
        ]);
        HubConnection::new(config).expect("connection")
    };

    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_events = Arc::clone(&seen);
    conn.on("UserOnline", move |args| {
        let user = args[0].as_str().unwrap_or_default().to_owned();
        seen_events.lock().unwrap().push(user);
    });

    conn.start().await;
    wait_for_state(&conn, &ConnectionState::Connected).await;

    // The handler registered before the drop still fires after the
    // reconnect.
    tokio::time::timeout(WAIT, async {
        loop {
            if !seen.lock().unwrap().is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("event never arrived after reconnect");

    assert_eq!(accepted.load(Ordering::SeqCst), 2);
    assert_eq!(*seen.lock().unwrap(), vec!["alice"]);
    assert!(conn.is_connected());

    conn.stop();
}

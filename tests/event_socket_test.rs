use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::{accept_async, tungstenite};
use uuid::Uuid;

use crewdeck_api::realtime::{
    ClientMessage, ConnectionState, EventSocket, EventSocketConfig, ServerMessage,
};

/// One server round: accept a connection, wait for a Subscribe, confirm it,
/// push a single event, then drop the connection.
async fn serve_round(
    listener: &TcpListener,
    subs_tx: &tokio::sync::mpsc::UnboundedSender<Vec<String>>,
    round: usize,
) {
    let (stream, _) = listener.accept().await.expect("accept");
    let mut ws = accept_async(stream).await.expect("handshake");

    while let Some(Ok(msg)) = ws.next().await {
        let tungstenite::Message::Text(text) = msg else {
            continue;
        };
        let parsed: ClientMessage = serde_json::from_str(&text).expect("client message");
        if let ClientMessage::Subscribe { topics } = parsed {
            subs_tx.send(topics.clone()).unwrap();
            let confirm = ServerMessage::SubscriptionConfirmed { topics };
            ws.send(tungstenite::Message::Text(
                serde_json::to_string(&confirm).unwrap(),
            ))
            .await
            .unwrap();
            let event = ServerMessage::Event {
                id: Uuid::new_v4(),
                topic: "bookings.approved".to_string(),
                payload: json!({ "round": round }),
            };
            ws.send(tungstenite::Message::Text(
                serde_json::to_string(&event).unwrap(),
            ))
            .await
            .unwrap();
            break;
        }
    }
    let _ = ws.close(None).await;
}

#[tokio::test]
async fn replays_subscriptions_after_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (subs_tx, mut subs_rx) = tokio::sync::mpsc::unbounded_channel();

    let server = tokio::spawn(async move {
        serve_round(&listener, &subs_tx, 0).await;
        serve_round(&listener, &subs_tx, 1).await;
    });

    let mut config = EventSocketConfig::new(format!("ws://{addr}"));
    config.reconnect_delay = Duration::from_millis(50);
    config.connect_timeout = Duration::from_secs(2);
    config.max_reconnect_attempts = 20;
    let socket = EventSocket::new(config);
    socket.subscribe(&["bookings.approved".to_string()]);

    let handle = socket.connect().expect("first connect starts the loop");

    let first = tokio::time::timeout(Duration::from_secs(5), subs_rx.recv())
        .await
        .expect("first subscribe")
        .unwrap();
    assert_eq!(first, vec!["bookings.approved".to_string()]);

    // The server dropped the connection; the client must come back on its
    // own and replay the same subscription.
    let second = tokio::time::timeout(Duration::from_secs(5), subs_rx.recv())
        .await
        .expect("resubscribe after reconnect")
        .unwrap();
    assert_eq!(second, vec!["bookings.approved".to_string()]);

    server.await.unwrap();

    // Both pushed events should have landed in the buffer.
    tokio::time::timeout(Duration::from_secs(5), async {
        while socket.recent_events().len() < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("events buffered");

    let events = socket.recent_events();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.topic == "bookings.approved"));
    assert_eq!(events[0].payload["round"], 0);
    assert_eq!(events[1].payload["round"], 1);

    socket.close();
    let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    assert_eq!(socket.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn gives_up_after_bounded_reconnect_attempts() {
    // Nothing listens on this port; the loop must stop on its own.
    let mut config = EventSocketConfig::new("ws://127.0.0.1:1");
    config.reconnect_delay = Duration::from_millis(5);
    config.connect_timeout = Duration::from_millis(200);
    config.max_reconnect_attempts = 2;
    let socket = EventSocket::new(config);

    let handle = socket.connect().expect("loop starts");
    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("loop terminates")
        .unwrap();
    assert_eq!(socket.state(), ConnectionState::Disconnected);

    // A fresh connect is allowed once the previous loop has ended.
    assert!(socket.connect().is_some());
    socket.close();
}

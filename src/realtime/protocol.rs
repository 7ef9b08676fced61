use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages the client sends to the event stream endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { topics: Vec<String> },
    Unsubscribe { topics: Vec<String> },
    Ping,
}

/// Messages the server pushes back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Event {
        id: Uuid,
        topic: String,
        payload: serde_json::Value,
    },
    SubscriptionConfirmed {
        topics: Vec<String>,
    },
    Pong,
    Error {
        message: String,
    },
    System {
        message: String,
    },
}

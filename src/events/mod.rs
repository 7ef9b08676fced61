use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("failed to send event: {0}")]
    SendError(String),
    #[error("failed to serialize event: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Domain events emitted after state changes commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    BookingCreated {
        booking_id: Uuid,
        organization_id: Uuid,
    },
    BookingApproved {
        booking_id: Uuid,
        organization_id: Uuid,
        approved_by: Uuid,
        events_generated: usize,
    },
    BookingRejected {
        booking_id: Uuid,
        organization_id: Uuid,
    },
    BookingCancelled {
        booking_id: Uuid,
        organization_id: Uuid,
    },
    EventInstancesGenerated {
        booking_id: Uuid,
        count: usize,
        first_date: Option<NaiveDate>,
        last_date: Option<NaiveDate>,
    },
    KitCreated {
        kit_id: Uuid,
        organization_id: Uuid,
    },
    KitInstanceAssigned {
        kit_instance_id: Uuid,
        booking_id: Uuid,
    },
    StaffAssigned {
        booking_id: Uuid,
        user_id: Uuid,
    },
    LocationCreated {
        location_id: Uuid,
        organization_id: Uuid,
    },
}

impl Event {
    /// Topic the event is routed under on the message queue.
    pub fn topic(&self) -> &'static str {
        match self {
            Event::BookingCreated { .. } => "bookings.created",
            Event::BookingApproved { .. } => "bookings.approved",
            Event::BookingRejected { .. } => "bookings.rejected",
            Event::BookingCancelled { .. } => "bookings.cancelled",
            Event::EventInstancesGenerated { .. } => "bookings.instances_generated",
            Event::KitCreated { .. } => "kits.created",
            Event::KitInstanceAssigned { .. } => "kits.assigned",
            Event::StaffAssigned { .. } => "staff.assigned",
            Event::LocationCreated { .. } => "locations.created",
        }
    }
}

/// Cloneable handle for emitting events onto the in-process channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, event: Event) -> Result<(), EventError> {
        self.tx
            .send(event)
            .await
            .map_err(|e| EventError::SendError(e.to_string()))
    }
}

pub fn event_channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}

/// Drains the event channel and fans events out to the message queue.
///
/// Publish failures are logged and dropped; the channel keeps draining so a
/// broken queue never backs up request handlers.
pub async fn process_events(
    mut rx: mpsc::Receiver<Event>,
    queue: std::sync::Arc<dyn crate::message_queue::MessageQueue>,
) {
    info!("event processor started");
    while let Some(event) = rx.recv().await {
        let topic = event.topic();
        debug!(topic, "processing event");
        let payload = match serde_json::to_value(&event) {
            Ok(p) => p,
            Err(e) => {
                error!(topic, error = %e, "failed to serialize event, dropping");
                continue;
            }
        };
        let message = crate::message_queue::Message::new(topic, payload);
        if let Err(e) = queue.publish(message).await {
            error!(topic, error = %e, "failed to publish event to queue");
        }
    }
    info!("event processor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_are_stable() {
        let e = Event::BookingApproved {
            booking_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            approved_by: Uuid::new_v4(),
            events_generated: 4,
        };
        assert_eq!(e.topic(), "bookings.approved");
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let e = Event::BookingCreated {
            booking_id: Uuid::nil(),
            organization_id: Uuid::nil(),
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "booking_created");
    }

    #[tokio::test]
    async fn sender_delivers_to_receiver() {
        let (sender, mut rx) = event_channel(8);
        sender
            .send(Event::BookingCancelled {
                booking_id: Uuid::new_v4(),
                organization_id: Uuid::new_v4(),
            })
            .await
            .unwrap();
        let got = rx.recv().await.unwrap();
        assert_eq!(got.topic(), "bookings.cancelled");
    }
}

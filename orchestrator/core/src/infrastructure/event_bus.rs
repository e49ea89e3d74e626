// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Provisioning Events
//
// Provides in-memory event streaming using tokio broadcast channels.
// Observers (log sinks, tests) see every state transition of every
// provisioning run. Events are not persisted.

use crate::domain::events::ProvisioningEvent;
use crate::domain::provisioning::ProvisioningId;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Event bus for publishing and subscribing to provisioning events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<ProvisioningEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many events can be buffered before dropping old ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: ProvisioningEvent) {
        debug!("Publishing event: {:?}", event);

        // send() only fails when nobody is subscribed
        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all provisioning events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe and filter for a single provisioning run
    pub fn subscribe_provisioning(&self, provisioning_id: ProvisioningId) -> ProvisioningEventReceiver {
        ProvisioningEventReceiver {
            receiver: self.sender.subscribe(),
            provisioning_id,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all provisioning events
pub struct EventReceiver {
    receiver: broadcast::Receiver<ProvisioningEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<ProvisioningEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<ProvisioningEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver for the events of one provisioning run (filtered)
pub struct ProvisioningEventReceiver {
    receiver: broadcast::Receiver<ProvisioningEvent>,
    provisioning_id: ProvisioningId,
}

impl ProvisioningEventReceiver {
    pub async fn recv(&mut self) -> Result<ProvisioningEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if event.provisioning_id() == self.provisioning_id {
                return Ok(event);
            }
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::provisioning::ProvisioningState;
    use crate::domain::service::TenantId;
    use chrono::Utc;

    fn state_changed(id: ProvisioningId, state: ProvisioningState) -> ProvisioningEvent {
        ProvisioningEvent::StateChanged {
            provisioning_id: id,
            tenant_id: TenantId::new("u1"),
            state,
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();
        let id = ProvisioningId::new();

        event_bus.publish(state_changed(id, ProvisioningState::Allocating));

        match receiver.recv().await.unwrap() {
            ProvisioningEvent::StateChanged { provisioning_id, state, .. } => {
                assert_eq!(provisioning_id, id);
                assert_eq!(state, ProvisioningState::Allocating);
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_provisioning_event_filtering() {
        let event_bus = EventBus::new(10);
        let ours = ProvisioningId::new();
        let theirs = ProvisioningId::new();
        let mut receiver = event_bus.subscribe_provisioning(ours);

        event_bus.publish(state_changed(theirs, ProvisioningState::Rendering));
        event_bus.publish(state_changed(ours, ProvisioningState::Launching));

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.provisioning_id(), ours);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();
        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus.publish(state_changed(ProvisioningId::new(), ProvisioningState::Persisting));

        let _ = receiver1.recv().await.unwrap();
        let _ = receiver2.recv().await.unwrap();
        assert!(matches!(receiver1.try_recv(), Err(EventBusError::Empty)));
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let event_bus = EventBus::default();
        event_bus.publish(state_changed(ProvisioningId::new(), ProvisioningState::Validating));
        assert_eq!(event_bus.subscriber_count(), 0);
    }
}

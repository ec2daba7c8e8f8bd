//! Change notifications for connected clients.
//!
//! Every successful mutation is published as an [`ApiEvent`]. Delivery is
//! best effort: a notification that nobody receives is not an error, and the
//! API response never waits on subscribers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiAction {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Task,
}

/// A change made through the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEvent {
    pub action: ApiAction,
    pub resource_type: ResourceType,
    /// The resource as the API returned it.
    pub resource: serde_json::Value,
    /// User ID of the caller who made the change.
    pub actor: Uuid,
}

impl ApiEvent {
    pub fn new(
        action: ApiAction,
        resource_type: ResourceType,
        resource: serde_json::Value,
        actor: Uuid,
    ) -> Self {
        Self {
            action,
            resource_type,
            resource,
            actor,
        }
    }
}

/// Destination for [`ApiEvent`]s.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationSink: Send + Sync {
    fn emit(&self, event: ApiEvent);
}

/// Fans events out to every subscriber of a tokio broadcast channel.
///
/// Slow subscribers lag and lose the oldest events once `capacity` is
/// exceeded.
pub struct BroadcastNotifier {
    sender: broadcast::Sender<ApiEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ApiEvent> {
        self.sender.subscribe()
    }
}

impl NotificationSink for BroadcastNotifier {
    fn emit(&self, event: ApiEvent) {
        let action = event.action;
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!(?action, receivers, "Event published"),
            Err(_) => tracing::debug!(?action, "No subscribers, event dropped"),
        }
    }
}

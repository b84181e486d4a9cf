// # Push Backend Trait
//
// Defines the narrow "send message to recipient" interface to the
// third-party push delivery service.
//
// Backends perform one delivery attempt per call. They do not retry, do not
// read the token store, and do not decide whether a payload is an alert;
// that is owned by `PushNotifier` and the fire-alert handler.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::PushPriority;

/// A single outbound push message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    /// Key/value data delivered to the app
    pub data: BTreeMap<String, String>,
    /// Recipient token payload
    pub recipient: String,
    /// Delivery priority
    pub priority: PushPriority,
    /// How long the backend may hold the message for an offline device
    pub ttl: Duration,
}

/// Trait for push delivery backends
#[async_trait]
pub trait PushBackend: Send + Sync {
    /// Prepare the backend connection
    ///
    /// Must be idempotent: initializing an already-initialized backend
    /// (including concurrently) is a no-op, not an error.
    async fn initialize(&self) -> Result<(), crate::Error> {
        Ok(())
    }

    /// Deliver `message`
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The backend's message id
    /// - `Err(Error)`: Delivery failed (not retried)
    async fn send(&self, message: &PushMessage) -> Result<String, crate::Error>;

    /// Backend name for logs (e.g., "fcm")
    fn backend_name(&self) -> &'static str;
}

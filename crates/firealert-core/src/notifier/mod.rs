//! Push notifier
//!
//! Turns a key/value payload into a push message addressed to whichever
//! recipient token is on record at send time.
//!
//! ## Flow
//!
//! 1. Read the current token from the `TokenStore` (never cached)
//! 2. No token: log and report `Error::NoRecipientConfigured`
//! 3. Build a `PushMessage` with the configured priority and TTL
//! 4. Hand it to the `PushBackend` once; failures are logged, not retried

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::{PushConfig, PushPriority};
use crate::error::{Error, Result};
use crate::traits::{PushBackend, PushMessage, Token, TokenStore};

/// Data key carrying the alert action
pub const ACTION_KEY: &str = "action";

/// Action value for a fire alert
pub const FIRE_ALERT_ACTION: &str = "fire-alert";

/// Payload sent for a detected (or test) fire alert
pub fn fire_alert_payload() -> BTreeMap<String, String> {
    BTreeMap::from([(ACTION_KEY.to_string(), FIRE_ALERT_ACTION.to_string())])
}

/// Result of a push attempt that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The backend accepted the message
    Delivered {
        /// Backend message id
        message_id: String,
    },
    /// No recipient token on record; nothing was sent
    Suppressed,
}

/// Push notifier shared by the HTTP control API and the fire-alert handler
///
/// Constructed once by the composition root and passed around behind an
/// `Arc`; there is no global instance.
pub struct PushNotifier {
    token_store: Arc<dyn TokenStore>,
    backend: Arc<dyn PushBackend>,
    priority: PushPriority,
    ttl: Duration,
}

impl PushNotifier {
    /// Create a notifier with default push settings (high priority, 60s TTL)
    pub fn new(token_store: Arc<dyn TokenStore>, backend: Arc<dyn PushBackend>) -> Self {
        Self::with_config(token_store, backend, &PushConfig::default())
    }

    /// Create a notifier with explicit push settings
    pub fn with_config(
        token_store: Arc<dyn TokenStore>,
        backend: Arc<dyn PushBackend>,
        config: &PushConfig,
    ) -> Self {
        Self {
            token_store,
            backend,
            priority: config.priority,
            ttl: config.ttl(),
        }
    }

    /// Initialize the backend connection
    ///
    /// Safe to call more than once; the backend treats repeat calls as no-ops.
    pub async fn initialize(&self) -> Result<()> {
        self.backend.initialize().await?;
        info!("Push backend '{}' initialized", self.backend.backend_name());
        Ok(())
    }

    /// Register `payload` as the recipient, replacing any previous one
    pub async fn update_recipient(&self, payload: impl Into<String>) -> Result<()> {
        let token = Token::issued_now(payload)?;
        self.token_store.update(token).await?;
        info!("Push recipient token updated");
        Ok(())
    }

    /// The currently registered recipient, if any
    pub async fn recipient(&self) -> Result<Option<Token>> {
        self.token_store.get().await
    }

    /// Send `data` to the current recipient
    ///
    /// # Returns
    ///
    /// - `Ok(message_id)`: Delivered
    /// - `Err(Error::NoRecipientConfigured)`: No token on record; the backend was not called
    /// - `Err(Error)`: Token store or backend failure
    pub async fn try_push(&self, data: BTreeMap<String, String>) -> Result<String> {
        let Some(token) = self.token_store.get().await? else {
            return Err(Error::NoRecipientConfigured);
        };

        let message = PushMessage {
            data,
            recipient: token.payload().to_string(),
            priority: self.priority,
            ttl: self.ttl,
        };

        match self.backend.send(&message).await {
            Ok(message_id) => {
                info!("Successfully sent alert: {}", message_id);
                Ok(message_id)
            }
            Err(e) => {
                error!(
                    "Push via '{}' failed (not retried): {}",
                    self.backend.backend_name(),
                    e
                );
                Err(e)
            }
        }
    }

    /// Send `data` to the current recipient, treating "no recipient" as a
    /// logged no-op rather than an error
    pub async fn push(&self, data: BTreeMap<String, String>) -> Result<PushOutcome> {
        match self.try_push(data).await {
            Ok(message_id) => Ok(PushOutcome::Delivered { message_id }),
            Err(e) if e.is_no_recipient() => {
                warn!("Push dropped: {}", e);
                Ok(PushOutcome::Suppressed)
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for PushNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushNotifier")
            .field("backend", &self.backend.backend_name())
            .field("priority", &self.priority)
            .field("ttl", &self.ttl)
            .finish()
    }
}

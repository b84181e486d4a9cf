//! Composition root
//!
//! Builds the long-lived components from a validated `BridgeConfig`:
//! token store, push notifier, audit sink, handler list and listener. The
//! notifier is constructed here once and shared by reference with both the
//! fire-alert handler and whatever serves the HTTP control API.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use crate::config::BridgeConfig;
use crate::error::Result;
use crate::listener::{DatagramListener, ListenerEvent};
use crate::notifier::PushNotifier;
use crate::registry::HandlerRegistry;
use crate::sink::CsvAuditSink;
use crate::state::FileTokenStore;
use crate::traits::{PushBackend, TokenStore};

/// Wired-up bridge, ready to bind
pub struct Bridge {
    /// Shared push notifier (also used by the HTTP control API)
    pub notifier: Arc<PushNotifier>,

    /// Audit sink behind the `store` service
    pub audit_sink: Arc<CsvAuditSink>,

    /// UDP listener with the configured handlers
    pub listener: DatagramListener,

    /// Listener lifecycle events
    pub events: mpsc::Receiver<ListenerEvent>,
}

impl Bridge {
    /// Build the bridge with the file-backed token store from `config`
    pub fn from_config(config: &BridgeConfig, backend: Arc<dyn PushBackend>) -> Result<Self> {
        let token_store = Arc::new(FileTokenStore::new(&config.storage.token_path));
        Self::with_token_store(config, token_store, backend)
    }

    /// Build the bridge over an explicit token store
    ///
    /// Fails with `Error::Config` before any socket is bound if the
    /// configuration is invalid.
    pub fn with_token_store(
        config: &BridgeConfig,
        token_store: Arc<dyn TokenStore>,
        backend: Arc<dyn PushBackend>,
    ) -> Result<Self> {
        config.validate()?;

        let notifier = Arc::new(PushNotifier::with_config(token_store, backend, &config.push));
        let audit_sink = Arc::new(CsvAuditSink::new(&config.storage.csv_path));

        let registry = HandlerRegistry::new(Arc::clone(&audit_sink), Arc::clone(&notifier));
        let handlers = registry.resolve(&config.services);

        let names: Vec<&str> = handlers.iter().map(|h| h.name()).collect();
        info!("Enabled services: {}", names.join(", "));

        let (listener, events) =
            DatagramListener::new(config.udp_endpoint(), handlers, &config.listener);

        Ok(Self {
            notifier,
            audit_sink,
            listener,
            events,
        })
    }
}

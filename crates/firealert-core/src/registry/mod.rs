//! Handler registry
//!
//! Resolves configured service names to handler instances. The mapping is
//! static: every known service is a `ServiceKind` variant, so an unknown name
//! is rejected while parsing the configuration, before anything binds.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use firealert_core::registry::HandlerRegistry;
//!
//! let registry = HandlerRegistry::new(audit_sink, notifier);
//! let handlers = registry.resolve_names("log,store,fire-alert")?;
//! ```

use std::sync::Arc;

use crate::config::ServiceKind;
use crate::error::Result;
use crate::handlers::{FireAlertHandler, LogHandler};
use crate::notifier::PushNotifier;
use crate::sink::CsvAuditSink;
use crate::traits::DatagramHandler;

/// Shared dependencies from which handlers are built
#[derive(Debug, Clone)]
pub struct HandlerRegistry {
    audit_sink: Arc<CsvAuditSink>,
    notifier: Arc<PushNotifier>,
}

impl HandlerRegistry {
    /// Create a registry over the shared sink and notifier
    pub fn new(audit_sink: Arc<CsvAuditSink>, notifier: Arc<PushNotifier>) -> Self {
        Self {
            audit_sink,
            notifier,
        }
    }

    /// Build the handler for one service
    pub fn create(&self, kind: ServiceKind) -> Arc<dyn DatagramHandler> {
        match kind {
            ServiceKind::Log => Arc::new(LogHandler),
            ServiceKind::Store => Arc::clone(&self.audit_sink) as Arc<dyn DatagramHandler>,
            ServiceKind::FireAlert => Arc::new(FireAlertHandler::new(Arc::clone(&self.notifier))),
        }
    }

    /// Build handlers for `services`, preserving order
    pub fn resolve(&self, services: &[ServiceKind]) -> Vec<Arc<dyn DatagramHandler>> {
        services.iter().map(|kind| self.create(*kind)).collect()
    }

    /// Parse a comma-separated list and build its handlers
    ///
    /// # Returns
    ///
    /// - `Ok(handlers)`: One handler per listed service
    /// - `Err(Error::Config)`: A name is not a known service
    pub fn resolve_names(&self, list: &str) -> Result<Vec<Arc<dyn DatagramHandler>>> {
        let services = ServiceKind::parse_list(list)?;
        Ok(self.resolve(&services))
    }

    /// Names of every service this registry can build
    pub fn list_services(&self) -> Vec<&'static str> {
        ServiceKind::ALL.iter().map(|k| k.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::state::MemoryTokenStore;
    use crate::traits::{PushBackend, PushMessage};
    use async_trait::async_trait;

    struct NullBackend;

    #[async_trait]
    impl PushBackend for NullBackend {
        async fn send(&self, _message: &PushMessage) -> Result<String> {
            Ok("null".to_string())
        }

        fn backend_name(&self) -> &'static str {
            "null"
        }
    }

    fn registry() -> HandlerRegistry {
        let notifier = PushNotifier::new(Arc::new(MemoryTokenStore::new()), Arc::new(NullBackend));
        HandlerRegistry::new(
            Arc::new(CsvAuditSink::new("unused.csv")),
            Arc::new(notifier),
        )
    }

    #[test]
    fn test_resolve_preserves_order() {
        let handlers = registry().resolve_names("fire-alert,log,store").unwrap();
        let names: Vec<&str> = handlers.iter().map(|h| h.name()).collect();
        assert_eq!(names, vec!["fire-alert", "log", "store"]);
    }

    #[test]
    fn test_unknown_service_fails() {
        let Err(err) = registry().resolve_names("log,email") else {
            panic!("unknown service accepted");
        };
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("email"));
    }

    #[test]
    fn test_list_services() {
        assert_eq!(registry().list_services(), vec!["log", "store", "fire-alert"]);
    }
}

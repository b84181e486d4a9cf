//! Built-in datagram handlers
//!
//! - [`LogHandler`] (`log`): debug-logs each decoded payload
//! - [`CsvAuditSink`](crate::sink::CsvAuditSink) (`store`): appends to the audit log
//! - [`FireAlertHandler`] (`fire-alert`): filters for alerts and pushes

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::Error;
use crate::filter::is_fire_alert;
use crate::notifier::{PushNotifier, fire_alert_payload};
use crate::traits::{Datagram, DatagramHandler};

/// Logs every received payload at debug level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHandler;

#[async_trait]
impl DatagramHandler for LogHandler {
    async fn handle(&self, datagram: &Datagram) -> Result<(), Error> {
        let text = datagram.text()?;
        debug!("Received data = {} (from {})", text, datagram.peer);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Sends a push notification when a datagram is a fire alert
#[derive(Debug, Clone)]
pub struct FireAlertHandler {
    notifier: Arc<PushNotifier>,
}

impl FireAlertHandler {
    /// Create a handler pushing through `notifier`
    pub fn new(notifier: Arc<PushNotifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl DatagramHandler for FireAlertHandler {
    async fn handle(&self, datagram: &Datagram) -> Result<(), Error> {
        if !is_fire_alert(&datagram.payload) {
            return Ok(());
        }

        info!("Push notification requested by {}. Proceeding", datagram.peer);
        // A missing recipient is logged by the notifier and is not a handler failure
        self.notifier.push(fire_alert_payload()).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fire-alert"
    }
}

// # Datagram Handler Trait
//
// A handler is an independent unit of work run once per received datagram.
// Each invocation runs in its own task; a failure (or panic) is contained at
// the dispatch boundary and never reaches sibling handlers or the receive
// loop.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::net::SocketAddr;

/// A received datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// Raw payload bytes
    pub payload: Vec<u8>,
    /// Sender address
    pub peer: SocketAddr,
    /// Capture time
    pub received_at: DateTime<Utc>,
}

impl Datagram {
    /// Create a datagram captured now
    pub fn new(payload: impl Into<Vec<u8>>, peer: SocketAddr) -> Self {
        Self {
            payload: payload.into(),
            peer,
            received_at: Utc::now(),
        }
    }

    /// Payload decoded as UTF-8
    pub fn text(&self) -> Result<&str, crate::Error> {
        Ok(std::str::from_utf8(&self.payload)?)
    }
}

/// Trait for datagram handlers
#[async_trait]
pub trait DatagramHandler: Send + Sync {
    /// Process one datagram
    async fn handle(&self, datagram: &Datagram) -> Result<(), crate::Error>;

    /// Handler name for logs and failure reports
    fn name(&self) -> &'static str;
}

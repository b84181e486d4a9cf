// # firealert-core
//
// Core library for the fire-alert UDP bridge.
//
// ## Architecture Overview
//
// Sensors send UDP datagrams; every datagram is fanned out to a configured
// set of handlers, each running independently:
// - **DatagramListener**: Binds the socket and dispatches each datagram
// - **DatagramHandler**: Per-datagram unit of work (log, store, fire-alert)
// - **CsvAuditSink**: Append-only `ts,data` audit log
// - **PushNotifier**: Sends a push message to the registered recipient
// - **TokenStore**: Persistence for the single recipient token
// - **PushBackend**: Narrow interface to the push delivery service
//
// ## Design Principles
//
// 1. **Isolation**: One handler's failure or latency never affects another
// 2. **Decoupled reception**: The receive loop never waits on handlers
// 3. **Single writer per file**: CSV and token writes are serialized per resource
// 4. **No ambient state**: The notifier is built once and passed explicitly
// 5. **Fail fast on configuration**: Unknown services abort startup before binding

pub mod bridge;
pub mod config;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod listener;
pub mod notifier;
pub mod registry;
pub mod sink;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use bridge::Bridge;
pub use config::{BridgeConfig, PushConfig, PushPriority, ServiceKind, StorageConfig};
pub use error::{Error, Result};
pub use filter::is_fire_alert;
pub use handlers::{FireAlertHandler, LogHandler};
pub use listener::{DatagramListener, ListenerEvent, ListenerState};
pub use notifier::{PushNotifier, PushOutcome};
pub use registry::HandlerRegistry;
pub use sink::{AuditRecord, CsvAuditSink};
pub use state::{FileTokenStore, MemoryTokenStore};
pub use traits::{Datagram, DatagramHandler, PushBackend, PushMessage, Token, TokenStore};

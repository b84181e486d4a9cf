//! Configuration types for the fire-alert bridge
//!
//! The configuration is built once at process start, validated, and then
//! owned by the composition root for the process lifetime. There is no
//! hot reload.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::Error;

/// Services enabled when none are named explicitly
pub const DEFAULT_SERVICES: &str = "log,store,fire-alert";

/// Main bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// UDP listener bind address (e.g., "0.0.0.0")
    pub udp_bind_address: String,

    /// UDP listener bind port
    pub udp_bind_port: u16,

    /// HTTP control API bind address
    pub http_bind_address: String,

    /// HTTP control API bind port
    pub http_bind_port: u16,

    /// Verbose logging
    #[serde(default)]
    pub debug: bool,

    /// Handlers to run for every datagram, in dispatch order
    pub services: Vec<ServiceKind>,

    /// Persisted state locations
    pub storage: StorageConfig,

    /// Push delivery settings
    #[serde(default)]
    pub push: PushConfig,

    /// Listener tuning
    #[serde(default)]
    pub listener: ListenerConfig,
}

impl BridgeConfig {
    /// Create a configuration with default services and storage under `./data`
    pub fn new(
        udp_bind_address: impl Into<String>,
        udp_bind_port: u16,
        http_bind_address: impl Into<String>,
        http_bind_port: u16,
    ) -> Self {
        Self {
            udp_bind_address: udp_bind_address.into(),
            udp_bind_port,
            http_bind_address: http_bind_address.into(),
            http_bind_port,
            debug: false,
            services: ServiceKind::ALL.to_vec(),
            storage: StorageConfig::default(),
            push: PushConfig::default(),
            listener: ListenerConfig::default(),
        }
    }

    /// Replace the enabled services
    pub fn with_services(mut self, services: Vec<ServiceKind>) -> Self {
        self.services = services;
        self
    }

    /// Replace the storage locations
    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    /// `host:port` the UDP listener binds to
    pub fn udp_endpoint(&self) -> String {
        format!("{}:{}", self.udp_bind_address, self.udp_bind_port)
    }

    /// `host:port` the HTTP control API binds to
    pub fn http_endpoint(&self) -> String {
        format!("{}:{}", self.http_bind_address, self.http_bind_port)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Error> {
        if self.udp_bind_address.trim().is_empty() {
            return Err(Error::config("UDP bind address cannot be empty"));
        }
        if self.http_bind_address.trim().is_empty() {
            return Err(Error::config("HTTP bind address cannot be empty"));
        }

        if self.services.is_empty() {
            return Err(Error::config("At least one service must be enabled"));
        }
        for (i, service) in self.services.iter().enumerate() {
            if self.services[..i].contains(service) {
                return Err(Error::config(format!(
                    "Service '{}' is listed more than once",
                    service
                )));
            }
        }

        self.storage.validate()?;
        self.push.validate()?;
        self.listener.validate()?;

        Ok(())
    }
}

/// Datagram handler variants that can be enabled by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceKind {
    /// Debug-log every payload
    Log,
    /// Append every payload to the CSV audit log
    Store,
    /// Push a notification when the payload is an alert
    FireAlert,
}

impl ServiceKind {
    /// All known services
    pub const ALL: [ServiceKind; 3] = [
        ServiceKind::Log,
        ServiceKind::Store,
        ServiceKind::FireAlert,
    ];

    /// Name used on the command line and in logs
    pub fn name(&self) -> &'static str {
        match self {
            ServiceKind::Log => "log",
            ServiceKind::Store => "store",
            ServiceKind::FireAlert => "fire-alert",
        }
    }

    /// Parse a comma-separated service list, failing on the first unknown name
    pub fn parse_list(list: &str) -> Result<Vec<ServiceKind>, Error> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ServiceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = ServiceKind::ALL.iter().map(|k| k.name()).collect();
                Error::config(format!(
                    "Unknown service '{}'. Known services: {}",
                    s,
                    known.join(", ")
                ))
            })
    }
}

/// Persisted state locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// CSV audit log (`ts,data`)
    pub csv_path: PathBuf,

    /// Recipient token record (JSON)
    pub token_path: PathBuf,
}

impl StorageConfig {
    /// Default file names under `data_dir`
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            csv_path: data_dir.join("raw.csv"),
            token_path: data_dir.join("user-token.json"),
        }
    }

    fn validate(&self) -> Result<(), Error> {
        if self.csv_path.as_os_str().is_empty() {
            return Err(Error::config("CSV path cannot be empty"));
        }
        if self.token_path.as_os_str().is_empty() {
            return Err(Error::config("Token path cannot be empty"));
        }
        if self.csv_path == self.token_path {
            return Err(Error::config(format!(
                "CSV log and token record cannot share a path: {}",
                self.csv_path.display()
            )));
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::in_dir("data")
    }
}

/// Delivery priority requested from the push backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushPriority {
    /// Normal delivery, may be batched by the device
    Normal,
    /// Wake the device immediately
    High,
}

impl PushPriority {
    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            PushPriority::Normal => "normal",
            PushPriority::High => "high",
        }
    }
}

/// Push delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Delivery priority for every message
    #[serde(default = "default_priority")]
    pub priority: PushPriority,

    /// Message time-to-live (in seconds)
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl PushConfig {
    /// TTL as a `Duration`
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    fn validate(&self) -> Result<(), Error> {
        // FCM caps message lifetime at four weeks
        if self.ttl_secs > 2_419_200 {
            return Err(Error::config(format!(
                "Push TTL must be at most 2419200 seconds. Got: {}",
                self.ttl_secs
            )));
        }
        Ok(())
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            priority: default_priority(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_priority() -> PushPriority {
    PushPriority::High
}

fn default_ttl_secs() -> u64 {
    60
}

/// Listener tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Receive buffer size; longer datagrams are truncated by the OS
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,

    /// Capacity of the lifecycle event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl ListenerConfig {
    fn validate(&self) -> Result<(), Error> {
        if self.recv_buffer_size == 0 {
            return Err(Error::config("Receive buffer size must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            recv_buffer_size: default_recv_buffer_size(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_recv_buffer_size() -> usize {
    65_535
}

fn default_event_channel_capacity() -> usize {
    1000
}

//! Datagram listener
//!
//! The DatagramListener is responsible for:
//! - Binding the UDP socket
//! - Receiving datagrams indefinitely
//! - Fanning each datagram out to every registered handler
//! - Containing handler failures at the dispatch boundary
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ UDP socket  │─── Datagram ───┐
//! └─────────────┘                │
//!                                ▼
//!                      ┌───────────────────┐
//!                      │ DatagramListener  │
//!                      └───────────────────┘
//!                                │  one task per (datagram, handler)
//!         ┌──────────────────────┼──────────────────────┐
//!         ▼                      ▼                      ▼
//! ┌─────────────┐        ┌──────────────┐       ┌──────────────┐
//! │ LogHandler  │        │ CsvAuditSink │       │ FireAlert    │
//! └─────────────┘        └──────────────┘       └──────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! `Unbound → Bound → Listening → Closed`
//!
//! Reception never waits for handlers. On shutdown the socket is dropped
//! first, so no new datagrams are accepted, and then in-flight handler
//! tasks are drained. Datagrams are never acknowledged or replayed.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace, warn};

use crate::config::ListenerConfig;
use crate::error::{Error, Result};
use crate::traits::{Datagram, DatagramHandler};

/// Listener lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Created, socket not yet bound
    Unbound,
    /// Socket bound, not yet receiving
    Bound,
    /// Receiving datagrams
    Listening,
    /// Socket closed; no further datagrams are accepted
    Closed,
}

/// Events emitted by the DatagramListener
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    /// Socket bound
    Bound { local_addr: SocketAddr },

    /// Datagram received and dispatched
    DatagramReceived { peer: SocketAddr, len: usize },

    /// A handler returned an error or panicked
    HandlerFailed {
        handler: String,
        peer: SocketAddr,
        error: String,
    },

    /// Listener stopped
    Closed { reason: String },
}

/// UDP listener and handler dispatcher
pub struct DatagramListener {
    /// `host:port` to bind
    endpoint: String,

    /// Handlers in dispatch order
    handlers: Arc<[Arc<dyn DatagramHandler>]>,

    /// Bound socket (present between `bind` and `run`)
    socket: Option<UdpSocket>,

    /// Receive buffer size
    recv_buffer_size: usize,

    /// Current lifecycle state
    state: watch::Sender<ListenerState>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ListenerEvent>,
}

impl DatagramListener {
    /// Create a new listener
    ///
    /// # Returns
    ///
    /// A tuple of (listener, event_receiver) where event_receiver yields listener events
    pub fn new(
        endpoint: impl Into<String>,
        handlers: Vec<Arc<dyn DatagramHandler>>,
        config: &ListenerConfig,
    ) -> (Self, mpsc::Receiver<ListenerEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let (state, _) = watch::channel(ListenerState::Unbound);

        let listener = Self {
            endpoint: endpoint.into(),
            handlers: handlers.into(),
            socket: None,
            recv_buffer_size: config.recv_buffer_size.max(1),
            state,
            event_tx,
        };

        (listener, event_rx)
    }

    /// Bind the UDP socket
    ///
    /// Binding an already-bound listener returns the existing address.
    pub async fn bind(&mut self) -> Result<SocketAddr> {
        if let Some(socket) = &self.socket {
            return Ok(socket.local_addr()?);
        }
        if self.state() == ListenerState::Closed {
            return Err(Error::Other("Listener is closed".to_string()));
        }

        let socket = UdpSocket::bind(&self.endpoint).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to bind UDP socket {}: {}", self.endpoint, e),
            ))
        })?;
        let local_addr = socket.local_addr()?;

        self.socket = Some(socket);
        self.state.send_replace(ListenerState::Bound);
        self.emit_event(ListenerEvent::Bound { local_addr });
        info!("Incoming alerts server started at {}", local_addr);

        Ok(local_addr)
    }

    /// Bound address, if bound
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Current lifecycle state
    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions (remains valid after `run` consumes the listener)
    pub fn subscribe_state(&self) -> watch::Receiver<ListenerState> {
        self.state.subscribe()
    }

    /// Number of registered handlers
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Run until `shutdown_rx` fires (or its sender is dropped)
    ///
    /// Binds first if `bind` was not called.
    pub async fn run_with_shutdown(
        mut self,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) -> Result<()> {
        self.bind().await?;
        let Some(socket) = self.socket.take() else {
            return Err(Error::Other("Listener socket missing after bind".to_string()));
        };

        self.state.send_replace(ListenerState::Listening);
        let mut tasks = JoinSet::new();
        let mut buf = vec![0u8; self.recv_buffer_size];

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown_rx => {
                    info!("Shutdown signal received");
                    break;
                }

                received = socket.recv_from(&mut buf) => {
                    match received {
                        Ok((len, peer)) => {
                            trace!("Received {} bytes from {}", len, peer);
                            self.emit_event(ListenerEvent::DatagramReceived { peer, len });
                            self.dispatch(&mut tasks, Datagram::new(&buf[..len], peer));
                            reap_finished(&mut tasks);
                        }
                        Err(e) => {
                            // Per-packet error (e.g. ICMP port unreachable); socket stays usable
                            warn!("UDP receive failed: {}", e);
                        }
                    }
                }

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!("Handler supervisor task failed: {}", e);
                    }
                }
            }
        }

        drop(socket);
        self.state.send_replace(ListenerState::Closed);

        let in_flight = tasks.len();
        if in_flight > 0 {
            debug!("Waiting for {} in-flight handler task(s)", in_flight);
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Handler supervisor task failed: {}", e);
            }
        }

        self.emit_event(ListenerEvent::Closed {
            reason: "Shutdown signal".to_string(),
        });
        info!("Incoming alerts server stopped");

        Ok(())
    }

    /// Fan `datagram` out to every handler, one task each
    fn dispatch(&self, tasks: &mut JoinSet<()>, datagram: Datagram) {
        let datagram = Arc::new(datagram);
        for handler in self.handlers.iter() {
            tasks.spawn(supervise(
                Arc::clone(handler),
                Arc::clone(&datagram),
                self.event_tx.clone(),
            ));
        }
    }

    /// Emit a listener event
    fn emit_event(&self, event: ListenerEvent) {
        emit(&self.event_tx, event);
    }
}

/// Run one handler invocation in its own task and report its failure
///
/// The inner task contains panics so they surface as a `JoinError` carrying
/// the handler's identity.
async fn supervise(
    handler: Arc<dyn DatagramHandler>,
    datagram: Arc<Datagram>,
    event_tx: mpsc::Sender<ListenerEvent>,
) {
    let name = handler.name();
    let peer = datagram.peer;

    let outcome = tokio::spawn(async move { handler.handle(&datagram).await }).await;

    let failure = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(e)) => Error::handler(name, e.to_string()),
        Err(join_err) if join_err.is_panic() => Error::handler(name, "handler panicked"),
        Err(join_err) => Error::handler(name, join_err.to_string()),
    };

    error!("Error while processing datagram from {}: {}", peer, failure);
    emit(
        &event_tx,
        ListenerEvent::HandlerFailed {
            handler: name.to_string(),
            peer,
            error: failure.to_string(),
        },
    );
}

/// Collect already-finished handler tasks without waiting
///
/// The receive branch can stay ready under sustained traffic, so completed
/// tasks are collected here as well as in the select loop.
fn reap_finished(tasks: &mut JoinSet<()>) {
    while let Some(joined) = tasks.try_join_next() {
        if let Err(e) = joined {
            error!("Handler supervisor task failed: {}", e);
        }
    }
}

fn emit(event_tx: &mpsc::Sender<ListenerEvent>, event: ListenerEvent) {
    if let Err(TrySendError::Full(_)) = event_tx.try_send(event) {
        // Dropped rather than buffered without bound
        warn!(
            "Listener event channel full, dropping event. \
             Consider increasing event_channel_capacity."
        );
    }
}

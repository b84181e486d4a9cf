//! Test doubles and common utilities for listener contract tests
//!
//! This module provides minimal handlers and push backends that record what
//! they observe, plus helpers to run a listener on an ephemeral port.

#![allow(dead_code)]

use firealert_core::config::ListenerConfig;
use firealert_core::error::{Error, Result};
use firealert_core::listener::{DatagramListener, ListenerEvent, ListenerState};
use firealert_core::traits::{Datagram, DatagramHandler, PushBackend, PushMessage};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// A handler that records every payload it sees
pub struct RecordingHandler {
    name: &'static str,
    seen: Mutex<Vec<Vec<u8>>>,
}

impl RecordingHandler {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Payloads observed so far
    pub fn seen(&self) -> Vec<Vec<u8>> {
        self.seen.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl DatagramHandler for RecordingHandler {
    async fn handle(&self, datagram: &Datagram) -> Result<()> {
        self.seen.lock().unwrap().push(datagram.payload.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// A handler that always fails
pub struct FailingHandler {
    calls: AtomicUsize,
}

impl FailingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DatagramHandler for FailingHandler {
    async fn handle(&self, _datagram: &Datagram) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::Other("deliberate failure".to_string()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// A handler that panics
pub struct PanickingHandler;

#[async_trait::async_trait]
impl DatagramHandler for PanickingHandler {
    async fn handle(&self, _datagram: &Datagram) -> Result<()> {
        panic!("deliberate panic");
    }

    fn name(&self) -> &'static str {
        "panicking"
    }
}

/// A handler that blocks until released, then records completion
pub struct GatedHandler {
    gate: watch::Receiver<bool>,
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl GatedHandler {
    pub fn new() -> (Arc<Self>, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let handler = Arc::new(Self {
            gate: rx,
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        });
        (handler, tx)
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DatagramHandler for GatedHandler {
    async fn handle(&self, _datagram: &Datagram) -> Result<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let mut gate = self.gate.clone();
        gate.wait_for(|open| *open)
            .await
            .map_err(|e| Error::Other(e.to_string()))?;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}

/// A push backend that records every message
#[derive(Default)]
pub struct RecordingPushBackend {
    sent: Mutex<Vec<PushMessage>>,
}

impl RecordingPushBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<PushMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl PushBackend for RecordingPushBackend {
    async fn send(&self, message: &PushMessage) -> Result<String> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(message.clone());
        Ok(format!("projects/test/messages/{}", sent.len()))
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

/// A listener running on a background task
pub struct RunningListener {
    pub addr: SocketAddr,
    pub events: mpsc::Receiver<ListenerEvent>,
    pub state: watch::Receiver<ListenerState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<()>>,
}

impl RunningListener {
    /// Bind on an ephemeral port and start listening
    pub async fn start(handlers: Vec<Arc<dyn DatagramHandler>>) -> Self {
        let (listener, events) =
            DatagramListener::new("127.0.0.1:0", handlers, &ListenerConfig::default());
        Self::spawn(listener, events).await
    }

    /// Start an already-constructed listener
    pub async fn spawn(
        mut listener: DatagramListener,
        events: mpsc::Receiver<ListenerEvent>,
    ) -> Self {
        let addr = listener.bind().await.expect("bind succeeds");
        let mut state = listener.subscribe_state();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(listener.run_with_shutdown(shutdown_rx));

        state
            .wait_for(|s| *s == ListenerState::Listening)
            .await
            .expect("listener starts");

        Self {
            addr,
            events,
            state,
            shutdown_tx: Some(shutdown_tx),
            handle,
        }
    }

    /// Send one datagram to the listener
    pub async fn send(&self, payload: &[u8]) {
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(payload, self.addr).await.unwrap();
    }

    /// Signal shutdown without waiting for completion
    pub fn signal_shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Signal shutdown and wait for `run` to return
    pub async fn shutdown(mut self) -> Result<()> {
        self.signal_shutdown();
        self.handle.await.expect("listener task does not panic")
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Poll `condition` until it holds or two seconds pass
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

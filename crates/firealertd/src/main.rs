// # firealertd - Fire Alert Bridge Daemon
//
// Thin integration layer over firealert-core. All datagram handling, storage
// and push logic lives in the library crates; this binary only:
// 1. Parses command-line flags into a `BridgeConfig`
// 2. Installs the tracing subscriber
// 3. Builds the push backend and wires up the bridge
// 4. Runs the UDP listener and the HTTP control API until a shutdown signal
//
// ## Example
//
// ```bash
// export FIREALERT_FCM_ACCESS_TOKEN=ya29.xxxx
//
// firealertd \
//     --udp-bind-address 0.0.0.0 --udp-bind-port 5005 \
//     --http-bind-address 0.0.0.0 --http-bind-port 8080 \
//     --services log,store,fire-alert \
//     --fcm-project-id my-project
// ```

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use firealert_api::{ApiState, create_routes};
use firealert_core::config::DEFAULT_SERVICES;
use firealert_core::{Bridge, BridgeConfig, ListenerEvent, ServiceKind, StorageConfig};
use firealert_push_fcm::FcmBackend;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Project id used when no FCM project is configured (dry-run only)
const UNCONFIGURED_PROJECT: &str = "unconfigured";

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum BridgeExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<BridgeExitCode> for ExitCode {
    fn from(code: BridgeExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Command-line flags
#[derive(Debug, Parser)]
#[command(name = "firealertd", version, about = "UDP fire-alert bridge with push notifications")]
struct Args {
    /// Address the UDP listener binds to
    #[arg(long)]
    udp_bind_address: String,

    /// Port the UDP listener binds to
    #[arg(long)]
    udp_bind_port: u16,

    /// Address the HTTP control API binds to
    #[arg(long)]
    http_bind_address: String,

    /// Port the HTTP control API binds to
    #[arg(long)]
    http_bind_port: u16,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Comma-separated services to run per datagram
    #[arg(long, default_value = DEFAULT_SERVICES)]
    services: String,

    /// Directory for the CSV audit log and the token file
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Override the CSV audit log path
    #[arg(long)]
    csv_path: Option<PathBuf>,

    /// Override the token file path
    #[arg(long)]
    token_path: Option<PathBuf>,

    /// Firebase project id (push runs in dry-run mode without one)
    #[arg(long, env = "FIREALERT_FCM_PROJECT_ID")]
    fcm_project_id: Option<String>,

    /// OAuth2 access token for FCM
    #[arg(long, env = "FIREALERT_FCM_ACCESS_TOKEN", hide_env_values = true)]
    fcm_access_token: Option<String>,

    /// Log push messages instead of sending them
    #[arg(long)]
    push_dry_run: bool,

    /// Push message time-to-live in seconds
    #[arg(long, default_value_t = 60)]
    push_ttl_secs: u64,

    /// Explicit log level (overrides --debug)
    #[arg(long)]
    log_level: Option<Level>,
}

impl Args {
    /// Build and validate the bridge configuration
    fn bridge_config(&self) -> Result<BridgeConfig> {
        let services = ServiceKind::parse_list(&self.services)?;

        let mut storage = StorageConfig::in_dir(self.data_dir.clone());
        if let Some(path) = &self.csv_path {
            storage.csv_path = path.clone();
        }
        if let Some(path) = &self.token_path {
            storage.token_path = path.clone();
        }

        let mut config = BridgeConfig::new(
            self.udp_bind_address.clone(),
            self.udp_bind_port,
            self.http_bind_address.clone(),
            self.http_bind_port,
        )
        .with_services(services)
        .with_storage(storage);
        config.debug = self.debug;
        config.push.ttl_secs = self.push_ttl_secs;

        config.validate()?;
        Ok(config)
    }

    fn log_level(&self) -> Level {
        self.log_level
            .unwrap_or(if self.debug { Level::DEBUG } else { Level::INFO })
    }

    /// Build the FCM backend from the push flags
    fn push_backend(&self) -> Result<FcmBackend> {
        let backend = match self.fcm_project_id.as_deref() {
            None => {
                warn!("No FCM project configured, push notifications will only be logged");
                FcmBackend::new_dry_run(UNCONFIGURED_PROJECT)?
            }
            Some(project_id) if self.push_dry_run => FcmBackend::new_dry_run(project_id)?,
            Some(project_id) => FcmBackend::new_live(
                project_id,
                self.fcm_access_token.clone().unwrap_or_default(),
            )?,
        };
        Ok(backend)
    }
}

/// Everything bound and ready to serve
struct Running {
    bridge: Bridge,
    http_listener: TcpListener,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                BridgeExitCode::ConfigError.into()
            } else {
                BridgeExitCode::CleanShutdown.into()
            };
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return BridgeExitCode::ConfigError.into();
    }

    let config = match args.bridge_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return BridgeExitCode::ConfigError.into();
        }
    };

    info!("Starting firealertd");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return BridgeExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        let running = match start(&args, &config).await {
            Ok(running) => running,
            Err(e) => {
                error!("Startup failed: {:#}", e);
                return BridgeExitCode::ConfigError;
            }
        };

        if let Err(e) = run_daemon(running).await {
            error!("Daemon error: {:#}", e);
            BridgeExitCode::RuntimeError
        } else {
            BridgeExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Wire up the bridge and bind both sockets
async fn start(args: &Args, config: &BridgeConfig) -> Result<Running> {
    let backend = args.push_backend()?;
    let mut bridge = Bridge::from_config(config, Arc::new(backend))?;
    bridge.notifier.initialize().await?;

    let udp_addr = bridge.listener.bind().await?;
    info!("UDP listener bound to {}", udp_addr);

    let http_listener = TcpListener::bind(config.http_endpoint())
        .await
        .with_context(|| format!("Failed to bind HTTP API to {}", config.http_endpoint()))?;
    info!("HTTP control API bound to {}", http_listener.local_addr()?);

    Ok(Running {
        bridge,
        http_listener,
    })
}

/// Serve until a shutdown signal arrives or a server task stops
async fn run_daemon(running: Running) -> Result<()> {
    let Running {
        bridge,
        http_listener,
    } = running;
    let Bridge {
        notifier,
        listener,
        events,
        ..
    } = bridge;

    let app = create_routes(Arc::new(ApiState::new(notifier)));
    let (udp_stop_tx, udp_stop_rx) = oneshot::channel();
    let (http_stop_tx, http_stop_rx) = oneshot::channel::<()>();

    let events_task = tokio::spawn(log_listener_events(events));

    let mut tasks: JoinSet<(&'static str, Result<()>)> = JoinSet::new();
    tasks.spawn(async move {
        let result = listener.run_with_shutdown(udp_stop_rx).await;
        ("UDP listener", result.map_err(anyhow::Error::from))
    });
    tasks.spawn(async move {
        let result = axum::serve(http_listener, app)
            .with_graceful_shutdown(async {
                let _ = http_stop_rx.await;
            })
            .await;
        ("HTTP control API", result.map_err(anyhow::Error::from))
    });

    let mut result = tokio::select! {
        signal = wait_for_shutdown() => signal.map(|name| {
            info!("Received shutdown signal: {}", name);
        }),
        Some(joined) = tasks.join_next() => Err(stopped_early(joined)),
    };

    info!("Shutting down");
    let _ = udp_stop_tx.send(());
    let _ = http_stop_tx.send(());

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((name, Ok(()))) => debug!("{} stopped", name),
            Ok((name, Err(e))) => {
                error!("{} failed during shutdown: {:#}", name, e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
            Err(e) => {
                error!("Server task panicked: {}", e);
                if result.is_ok() {
                    result = Err(anyhow!("Server task panicked: {}", e));
                }
            }
        }
    }

    let _ = events_task.await;
    result
}

fn stopped_early(
    joined: std::result::Result<(&'static str, Result<()>), JoinError>,
) -> anyhow::Error {
    match joined {
        Ok((name, Ok(()))) => anyhow!("{} stopped unexpectedly", name),
        Ok((name, Err(e))) => e.context(format!("{} failed", name)),
        Err(e) => anyhow!("Server task panicked: {}", e),
    }
}

/// Drain listener events so the bounded channel never fills
async fn log_listener_events(mut events: mpsc::Receiver<ListenerEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ListenerEvent::Bound { local_addr } => debug!("Listener bound to {}", local_addr),
            ListenerEvent::DatagramReceived { peer, len } => {
                debug!("Datagram of {} bytes from {}", len, peer)
            }
            ListenerEvent::HandlerFailed {
                handler,
                peer,
                error,
            } => debug!("Handler '{}' failed for {}: {}", handler, peer, error),
            ListenerEvent::Closed { reason } => info!("Listener closed: {}", reason),
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(name)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 9] = [
        "firealertd",
        "--udp-bind-address",
        "127.0.0.1",
        "--udp-bind-port",
        "5005",
        "--http-bind-address",
        "127.0.0.1",
        "--http-bind-port",
        "8080",
    ];

    fn parse(extra: &[&str]) -> Args {
        let argv: Vec<&str> = REQUIRED.iter().chain(extra.iter()).copied().collect();
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        let config = args.bridge_config().unwrap();

        assert_eq!(config.udp_endpoint(), "127.0.0.1:5005");
        assert_eq!(config.http_endpoint(), "127.0.0.1:8080");
        assert_eq!(config.services, ServiceKind::ALL.to_vec());
        assert_eq!(config.storage.csv_path, PathBuf::from("data").join("raw.csv"));
        assert_eq!(
            config.storage.token_path,
            PathBuf::from("data").join("user-token.json")
        );
        assert_eq!(config.push.ttl_secs, 60);
        assert!(!config.debug);
        assert_eq!(args.log_level(), Level::INFO);
    }

    #[test]
    fn test_missing_required_flag() {
        let result = Args::try_parse_from(["firealertd", "--udp-bind-address", "0.0.0.0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_services_subset_keeps_order() {
        let args = parse(&["--services", "fire-alert,log"]);
        let config = args.bridge_config().unwrap();
        assert_eq!(
            config.services,
            vec![ServiceKind::FireAlert, ServiceKind::Log]
        );
    }

    #[test]
    fn test_unknown_service_is_config_error() {
        let args = parse(&["--services", "log,sms"]);
        let err = args.bridge_config().unwrap_err();
        assert!(err.to_string().contains("sms"));
    }

    #[test]
    fn test_storage_overrides() {
        let args = parse(&[
            "--data-dir",
            "/var/lib/firealert",
            "--csv-path",
            "/tmp/audit.csv",
        ]);
        let config = args.bridge_config().unwrap();
        assert_eq!(config.storage.csv_path, PathBuf::from("/tmp/audit.csv"));
        assert_eq!(
            config.storage.token_path,
            PathBuf::from("/var/lib/firealert").join("user-token.json")
        );
    }

    #[test]
    fn test_log_level_selection() {
        assert_eq!(parse(&["--debug"]).log_level(), Level::DEBUG);
        assert_eq!(
            parse(&["--debug", "--log-level", "warn"]).log_level(),
            Level::WARN
        );
    }

    #[test]
    fn test_push_backend_selection() {
        let args = parse(&[]);
        if args.fcm_project_id.is_none() {
            assert!(args.push_backend().unwrap().is_dry_run());
        }

        let args = parse(&["--fcm-project-id", "proj", "--push-dry-run"]);
        assert!(args.push_backend().unwrap().is_dry_run());

        let args = parse(&[
            "--fcm-project-id",
            "proj",
            "--fcm-access-token",
            "secret",
        ]);
        assert!(!args.push_backend().unwrap().is_dry_run());
    }
}

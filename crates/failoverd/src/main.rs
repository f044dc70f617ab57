// # failoverd - DNS Failover Daemon
//
// The failoverd daemon is a thin integration layer. It is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering record stores
// 4. Running the watch loop until SIGTERM/SIGINT
//
// All failover logic lives in failover-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Target
// - `FAILOVER_DOMAIN`: Published domain (zone apex)
// - `FAILOVER_HEALTH_URL`: HTTPS health URL fetched from every node
// - `FAILOVER_RECORDS`: Comma-separated relative record names (default: `@`)
//
// ### Nodes
// - `FAILOVER_NODES`: Comma-separated node names, in tie-break order
// - `FAILOVER_NODE_<NAME>_IPV4`: Node IPv4 address (required)
// - `FAILOVER_NODE_<NAME>_IPV6`: Node IPv6 address (optional)
//
// `<NAME>` is the node name upper-cased with `-` and `.` replaced by `_`.
//
// ### Cloudflare
// - `FAILOVER_CF_API_TOKEN`: API token, or
// - `FAILOVER_CF_EMAIL` + `FAILOVER_CF_API_KEY`: global API key
// - `FAILOVER_CF_ZONE_ID`: Zone ID (optional, looked up otherwise)
//
// ### Timing
// - `FAILOVER_INTERVAL_SECS`: Seconds between cycles (default: 60)
// - `FAILOVER_PROBE_TIMEOUT_SECS`: Per-probe timeout (default: 60)
// - `FAILOVER_COOLDOWN_SECS`: Minimum age of the anchor record before a switch (default: 600)
//
// ### Misc
// - `FAILOVER_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
// - `FAILOVER_MODE`: `dry-run` to log record writes instead of sending them
//
// ## Example
//
// ```bash
// export FAILOVER_DOMAIN=example.com
// export FAILOVER_HEALTH_URL=https://example.com/health
// export FAILOVER_NODES=fra,ams
// export FAILOVER_NODE_FRA_IPV4=192.0.2.10
// export FAILOVER_NODE_FRA_IPV6=2001:db8::10
// export FAILOVER_NODE_AMS_IPV4=198.51.100.20
// export FAILOVER_CF_API_TOKEN=your_token
//
// failoverd
// ```

use anyhow::{Context, Result};
use failover_core::config::{FailoverConfig, NodeConfig, RecordStoreConfig};
use failover_core::{StoreRegistry, WatchEvent, Watcher};
use failover_net::{HttpsProber, SystemResolver};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum FailoverExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<FailoverExitCode> for ExitCode {
    fn from(code: FailoverExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    domain: String,
    health_url: String,
    records: Option<Vec<String>>,
    nodes: Vec<NodeConfig>,
    cf_api_token: Option<String>,
    cf_email: Option<String>,
    cf_api_key: Option<String>,
    cf_zone_id: Option<String>,
    interval_secs: Option<u64>,
    probe_timeout_secs: Option<u64>,
    cooldown_secs: Option<u64>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`; empty values count as unset
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &str| {
            get(key).with_context(|| format!("{} is required. Set it via: export {}=...", key, key))
        };
        let number = |key: &str| -> Result<Option<u64>> {
            get(key)
                .map(|v| {
                    v.parse::<u64>()
                        .with_context(|| format!("{} must be a whole number of seconds. Got: {}", key, v))
                })
                .transpose()
        };

        let mut nodes = Vec::new();
        for name in split_list(&require("FAILOVER_NODES")?) {
            let prefix = format!("FAILOVER_NODE_{}", env_key(&name));
            let ipv4 = require(&format!("{}_IPV4", prefix))?;
            let mut node = NodeConfig::new(name, ipv4);
            if let Some(ipv6) = get(&format!("{}_IPV6", prefix)) {
                node = node.with_ipv6(ipv6);
            }
            nodes.push(node);
        }

        Ok(Self {
            domain: require("FAILOVER_DOMAIN")?,
            health_url: require("FAILOVER_HEALTH_URL")?,
            records: get("FAILOVER_RECORDS").map(|v| split_list(&v)),
            nodes,
            cf_api_token: get("FAILOVER_CF_API_TOKEN"),
            cf_email: get("FAILOVER_CF_EMAIL"),
            cf_api_key: get("FAILOVER_CF_API_KEY"),
            cf_zone_id: get("FAILOVER_CF_ZONE_ID"),
            interval_secs: number("FAILOVER_INTERVAL_SECS")?,
            probe_timeout_secs: number("FAILOVER_PROBE_TIMEOUT_SECS")?,
            cooldown_secs: number("FAILOVER_COOLDOWN_SECS")?,
            log_level: get("FAILOVER_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Build the core configuration
    fn failover_config(&self) -> FailoverConfig {
        let mut config = FailoverConfig::new(&self.domain, &self.health_url);
        config.nodes = self.nodes.clone();
        if let Some(ref records) = self.records {
            config.records = records.clone();
        }
        if let Some(secs) = self.interval_secs {
            config.interval_secs = secs;
        }
        if let Some(secs) = self.probe_timeout_secs {
            config.probe_timeout_secs = secs;
        }
        if let Some(secs) = self.cooldown_secs {
            config.sync.cooldown_secs = secs;
        }
        config.store = RecordStoreConfig::Cloudflare {
            api_token: self.cf_api_token.clone(),
            email: self.cf_email.clone(),
            api_key: self.cf_api_key.clone(),
            zone_id: self.cf_zone_id.clone(),
        };
        config
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.log_level()?;

        if self.cf_api_token.is_some() && (self.cf_email.is_some() || self.cf_api_key.is_some()) {
            eprintln!(
                "WARNING: FAILOVER_CF_API_TOKEN is set together with FAILOVER_CF_EMAIL/FAILOVER_CF_API_KEY. \
                The API token takes precedence."
            );
        }

        self.failover_config()
            .validate()
            .context("Invalid failover configuration")?;

        Ok(())
    }

    fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "FAILOVER_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

/// Split a comma-separated list, dropping empty items
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Environment key fragment for a node name
fn env_key(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '-' | '.' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return FailoverExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return FailoverExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = config.log_level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return FailoverExitCode::ConfigError.into();
    }

    info!("Starting failoverd daemon");
    info!(
        "Configuration loaded: {} node(s) for {}",
        config.nodes.len(),
        config.domain
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return FailoverExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => FailoverExitCode::CleanShutdown,
            Err(DaemonError::Startup(e)) => {
                error!("Startup error: {:#}", e);
                FailoverExitCode::ConfigError
            }
            Err(DaemonError::Runtime(e)) => {
                error!("Daemon error: {:#}", e);
                FailoverExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Failures split by exit code
enum DaemonError {
    Startup(anyhow::Error),
    Runtime(anyhow::Error),
}

/// Run the daemon
async fn run_daemon(config: Config) -> std::result::Result<(), DaemonError> {
    let registry = StoreRegistry::new();

    #[cfg(feature = "cloudflare")]
    {
        info!("Registering Cloudflare record store");
        failover_provider_cloudflare::register(&registry);
    }

    let failover_config = config.failover_config();

    let store = registry
        .create_store(&failover_config.store)
        .context("Failed to create record store")
        .map_err(DaemonError::Startup)?;
    info!("Record store: {}", store.store_name());

    let prober = HttpsProber::new(&failover_config.health_url)
        .context("Failed to create prober")
        .map_err(DaemonError::Startup)?;
    let resolver = SystemResolver::new(failover_config.probe_timeout());

    for name in &failover_config.records {
        info!("Managing record: {}", name);
    }

    let (watcher, event_rx) = Watcher::new(
        Box::new(resolver),
        Box::new(prober),
        Arc::from(store),
        failover_config,
    )
    .context("Failed to create watcher")
    .map_err(DaemonError::Startup)?;

    let events = tokio::spawn(log_events(event_rx));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let signals = tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Shutdown error: {:#}", e),
        }
        let _ = shutdown_tx.send(());
    });

    let result = watcher.run_with_shutdown(Some(shutdown_rx)).await;

    // Dropping the watcher closes the event channel
    drop(watcher);
    signals.abort();
    let _ = events.await;

    result
        .context("Watch loop failed")
        .map_err(DaemonError::Runtime)?;

    info!("Shutting down daemon");
    Ok(())
}

/// Log watch events until the channel closes
async fn log_events(mut event_rx: mpsc::Receiver<WatchEvent>) {
    while let Some(event) = event_rx.recv().await {
        match event {
            WatchEvent::SyncFailed {
                family,
                error,
                guard: false,
            } => warn!("{} reconciliation failed: {}", family, error),
            event => debug!("Watch event: {:?}", event),
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for CTRL-C")?;
    Ok("SIGINT")
}

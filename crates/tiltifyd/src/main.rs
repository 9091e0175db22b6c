// # tiltifyd - Tiltify Donation Bridge Daemon
//
// This is a THIN integration layer. Polling, deduplication and persistence
// live in tiltify-core; the HTTP client lives in tiltify-api.
//
// The tiltifyd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing the runtime
// 3. Registering the donation source and state stores
// 4. Running the connection controller until SIGINT/SIGTERM
//
// Donation events are printed to stdout as JSON lines. Logs go to stderr.
//
// ## Commands
//
// - `tiltifyd`: Run the bridge
// - `tiltifyd campaigns`: Print the campaigns reachable with the token
// - `tiltifyd rewards | poll-options | challenges`: Print the filter preset
//   values of the configured campaign
//
// ## Configuration
//
// ### Connection
// - `TILTIFY_ACCESS_TOKEN`: Tiltify access token (required)
// - `TILTIFY_CAMPAIGN_ID`: Campaign to poll (required except for `campaigns`)
// - `TILTIFY_POLL_INTERVAL`: Poll interval in seconds (default 5)
// - `TILTIFY_API_BASE_URL`: API base URL (default https://tiltify.com/api/v3/)
//
// ### State Store
// - `TILTIFY_STATE_STORE_TYPE`: Type of state store (file, memory)
// - `TILTIFY_STATE_STORE_PATH`: Path to state file (for file store)
//
// ### Engine
// - `TILTIFY_REQUEST_TIMEOUT_SECS`: Upper bound for each API call
// - `TILTIFY_MAX_TRACKED_IDS`: Delivered-id window per campaign (0 = unbounded)
// - `TILTIFY_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export TILTIFY_ACCESS_TOKEN=your_token
// export TILTIFY_CAMPAIGN_ID=12345
// export TILTIFY_STATE_STORE_TYPE=file
// export TILTIFY_STATE_STORE_PATH=/var/lib/tiltify/state.json
//
// tiltifyd
// ```

use anyhow::{Context, Result};
use std::env;
use std::io::Write;
use std::pin::Pin;
use std::process::ExitCode;
use std::sync::Arc;
use tiltify_core::lookups::Lookups;
use tiltify_core::{
    ChannelEventSink, ComponentRegistry, ConnectionConfig, ConnectionController, ConnectionEvent,
    DonationEvent, DonationSourceFactory, EngineConfig, StateStoreConfig, TiltifyConfig,
};
use tokio_stream::{Stream, StreamExt};
use tracing::{Level, error, info, warn};
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
enum TiltifydExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<TiltifydExitCode> for ExitCode {
    fn from(code: TiltifydExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// What the process was asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    Campaigns,
    Rewards,
    PollOptions,
    Challenges,
}

impl Command {
    fn parse(arg: Option<&str>) -> Result<Self> {
        match arg {
            None | Some("run") => Ok(Self::Run),
            Some("campaigns") => Ok(Self::Campaigns),
            Some("rewards") => Ok(Self::Rewards),
            Some("poll-options") => Ok(Self::PollOptions),
            Some("challenges") => Ok(Self::Challenges),
            Some(other) => anyhow::bail!(
                "Unknown command '{}'. \
                Valid commands: run, campaigns, rewards, poll-options, challenges",
                other
            ),
        }
    }
}

/// Application configuration
struct Config {
    bridge: TiltifyConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let mut connection = ConnectionConfig::new(
            env::var("TILTIFY_ACCESS_TOKEN").unwrap_or_default(),
            env::var("TILTIFY_CAMPAIGN_ID").unwrap_or_default(),
        );
        if let Some(interval) = parse_env("TILTIFY_POLL_INTERVAL")? {
            connection = connection.with_poll_interval_secs(interval);
        }
        if let Ok(url) = env::var("TILTIFY_API_BASE_URL") {
            connection = connection.with_api_base_url(url);
        }

        let state_store = match env::var("TILTIFY_STATE_STORE_TYPE")
            .unwrap_or_else(|_| "memory".to_string())
            .as_str()
        {
            "file" => StateStoreConfig::File {
                path: env::var("TILTIFY_STATE_STORE_PATH").unwrap_or_default(),
            },
            "memory" => StateStoreConfig::Memory,
            other => anyhow::bail!(
                "TILTIFY_STATE_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                other
            ),
        };

        let mut engine = EngineConfig::default();
        if let Some(secs) = parse_env("TILTIFY_REQUEST_TIMEOUT_SECS")? {
            engine.request_timeout_secs = secs;
        }
        if let Some(max) = parse_env("TILTIFY_MAX_TRACKED_IDS")? {
            engine.max_tracked_ids = max;
        }

        Ok(Self {
            bridge: TiltifyConfig {
                connection,
                state_store,
                engine,
            },
            log_level: env::var("TILTIFY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration for a command
    ///
    /// The campaign list only needs the access token; every other command
    /// needs a campaign too.
    fn validate(&self, command: Command) -> Result<()> {
        let connection = &self.bridge.connection;

        if connection.credential.trim().is_empty() {
            anyhow::bail!(
                "TILTIFY_ACCESS_TOKEN is required. \
                Set it via: export TILTIFY_ACCESS_TOKEN=your_token"
            );
        }

        match command {
            Command::Campaigns => {}
            Command::Rewards | Command::PollOptions | Command::Challenges => {
                if connection.campaign_id.trim().is_empty() {
                    anyhow::bail!(
                        "TILTIFY_CAMPAIGN_ID is required. \
                        List your campaigns with: tiltifyd campaigns"
                    );
                }
            }
            Command::Run => {
                self.bridge
                    .validate()
                    .context("Invalid bridge configuration")?;

                if !(1..=3600).contains(&connection.poll_interval_secs) {
                    anyhow::bail!(
                        "TILTIFY_POLL_INTERVAL must be between 1 and 3600 seconds. Got: {}",
                        connection.poll_interval_secs
                    );
                }

                if let StateStoreConfig::File { path } = &self.bridge.state_store
                    && let Some(parent) = std::path::Path::new(path).parent()
                    && !parent.as_os_str().is_empty()
                    && !parent.exists()
                {
                    anyhow::bail!(
                        "TILTIFY_STATE_STORE_PATH parent directory does not exist: {}. \
                        Create it first: mkdir -p {}",
                        parent.display(),
                        parent.display()
                    );
                }
            }
        }

        let url = connection.api_base_url.as_str();
        if !url.starts_with("https://") && !url.starts_with("http://") {
            anyhow::bail!(
                "TILTIFY_API_BASE_URL must use HTTP or HTTPS scheme. Got: {}",
                url
            );
        }

        if self.bridge.engine.request_timeout_secs == 0 {
            anyhow::bail!("TILTIFY_REQUEST_TIMEOUT_SECS must be > 0");
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "TILTIFY_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

/// Parse an optional numeric environment variable
fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} is not a valid number ('{}'): {}", name, raw, e)),
        Err(_) => Ok(None),
    }
}

fn main() -> ExitCode {
    let command = match Command::parse(env::args().nth(1).as_deref()) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Usage error: {}", e);
            return TiltifydExitCode::ConfigError.into();
        }
    };

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return TiltifydExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate(command) {
        eprintln!("Configuration validation error: {:#}", e);
        return TiltifydExitCode::ConfigError.into();
    }

    // Initialize tracing; stdout is reserved for events
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return TiltifydExitCode::ConfigError.into();
    }

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return TiltifydExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        let outcome = match command {
            Command::Run => run_daemon(config.bridge).await,
            lookup => run_lookup(lookup, config.bridge).await,
        };

        if let Err(e) = outcome {
            error!("Daemon error: {:#}", e);
            TiltifydExitCode::RuntimeError
        } else {
            TiltifydExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Build the registry with the Tiltify source and the built-in state stores
fn build_registry() -> ComponentRegistry {
    let registry = ComponentRegistry::with_builtin_state_stores();
    tiltify_api::register(&registry);
    registry
}

/// Run the bridge until a shutdown signal arrives
async fn run_daemon(config: TiltifyConfig) -> Result<()> {
    info!("Starting tiltifyd daemon");

    let registry = build_registry();
    let factory = registry.donation_source_factory(tiltify_api::SOURCE_NAME)?;
    let store = registry.create_state_store(&config.state_store).await?;
    info!("State store type: {}", config.state_store.type_name());

    let (sink, events) = ChannelEventSink::with_stream(config.engine.event_channel_capacity);
    let printer = tokio::spawn(print_events(events, std::io::stdout()));

    let (controller, mut signals) =
        ConnectionController::new(factory, store, Arc::new(sink), config.engine);

    let signal_logger = tokio::spawn(async move {
        while let Some(signal) = signals.recv().await {
            match signal {
                ConnectionEvent::Connected { campaign_id } => {
                    info!(campaign_id = %campaign_id, "Connected to Tiltify")
                }
                ConnectionEvent::Disconnected { reason } => {
                    info!(reason = %reason, "Disconnected from Tiltify")
                }
            }
        }
    });

    controller.connect(config.connection).await?;
    info!("Ready to poll for donations");

    let signal = wait_for_shutdown().await?;
    info!("Received shutdown signal: {}", signal);
    info!("Shutting down daemon");

    controller.disconnect().await;

    // Dropping the controller closes the event and signal channels
    drop(controller);
    if let Err(e) = printer.await {
        warn!("Event printer task failed: {}", e);
    }
    if let Err(e) = signal_logger.await {
        warn!("Signal logger task failed: {}", e);
    }

    Ok(())
}

/// Write each event as one JSON line until the stream ends
///
/// Returns the writer so callers can inspect what was written.
async fn print_events<W: Write>(
    mut events: Pin<Box<dyn Stream<Item = DonationEvent> + Send + 'static>>,
    mut out: W,
) -> W {
    while let Some(event) = events.next().await {
        match serde_json::to_string(&event) {
            Ok(line) => {
                if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
                    warn!("Failed to write donation event: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize donation event: {}", e),
        }
    }
    out
}

/// Print one lookup list as JSON and exit
async fn run_lookup(command: Command, config: TiltifyConfig) -> Result<()> {
    let registry = build_registry();
    let factory: Arc<dyn DonationSourceFactory> =
        registry.donation_source_factory(tiltify_api::SOURCE_NAME)?;
    let lookups = Lookups::from_config(
        factory.as_ref(),
        &config.connection,
        config.engine.request_timeout(),
    )?;

    let output = match command {
        Command::Campaigns => serde_json::to_string_pretty(&lookups.campaigns().await?)?,
        Command::Rewards => serde_json::to_string_pretty(&lookups.rewards().await?)?,
        Command::PollOptions => serde_json::to_string_pretty(&lookups.poll_options().await?)?,
        Command::Challenges => serde_json::to_string_pretty(&lookups.challenges().await?)?,
        Command::Run => anyhow::bail!("run is not a lookup command"),
    };

    println!("{}", output);
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

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
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

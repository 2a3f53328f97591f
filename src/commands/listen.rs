use anyhow::{Context, Result};
use aprsis::aprs_client::{AprsClient, AprsClientConfig, AprsClientConfigBuilder};
use aprsis::aprs_filters::FilterExpr;
use aprsis::client_config::{ClientConfigFile, client_config_path};
use aprsis::connection_status::{ChannelObserver, SessionEvent, SessionObserver};
use aprsis::passcode;
use clap::Args;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, warn};

use super::{OutputFormat, write_packet};

/// Extra time allowed for a session to notice a disconnect request
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Args, Debug, Clone)]
pub struct ListenArgs {
    /// TOML configuration file (falls back to APRSIS_CONFIG, then ./aprsis.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// APRS-IS server hostname
    #[arg(long, env = "APRSIS_SERVER")]
    pub server: Option<String>,

    /// APRS-IS server port
    #[arg(long, env = "APRSIS_PORT")]
    pub port: Option<u16>,

    /// Callsign used to log in
    #[arg(long, env = "APRSIS_CALLSIGN")]
    pub callsign: Option<String>,

    /// APRS-IS passcode (read-only login when omitted)
    #[arg(long, env = "APRSIS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Compute the passcode from the callsign
    #[arg(long, default_value_t = false, conflicts_with = "password")]
    pub auto_passcode: bool,

    /// Server-side filter, e.g. "r/47.0/-122.0/100 t/w"
    #[arg(long, env = "APRSIS_FILTER")]
    pub filter: Option<String>,

    /// Output format for received packets
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Serve Prometheus metrics on this port
    #[arg(long, env = "APRSIS_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Also print `#` lines sent by the server
    #[arg(long, default_value_t = false)]
    pub show_server_lines: bool,

    /// Also print lines that failed to decode
    #[arg(long, default_value_t = false)]
    pub show_errors: bool,

    /// Write the resolved configuration to this TOML file and exit
    #[arg(long)]
    pub save_config: Option<PathBuf>,
}

/// Config file values first, then command-line overrides
fn resolve_config(args: &ListenArgs) -> Result<(AprsClientConfig, Option<u16>)> {
    let mut builder = AprsClientConfigBuilder::new();
    let mut metrics_port = None;

    if let Some(path) = client_config_path(args.config.as_deref()) {
        info!("Loading configuration from {:?}", path);
        let file = ClientConfigFile::load(&path)?;
        metrics_port = file.metrics_port;
        builder = file.apply(builder)?;
    }

    if let Some(server) = &args.server {
        builder = builder.server(server.clone());
    }
    if let Some(port) = args.port {
        builder = builder.port(port);
    }
    if let Some(callsign) = &args.callsign {
        builder = builder.callsign(callsign.to_uppercase());
    }
    if let Some(password) = &args.password {
        builder = builder.password(Some(password.clone()));
    }
    if let Some(filter) = &args.filter {
        FilterExpr::parse_strict(filter)
            .with_context(|| format!("Invalid --filter {:?}", filter))?;
        builder = builder.filter(Some(filter.clone()));
    }

    let mut config = builder.build();
    if args.auto_passcode {
        config.password = Some(passcode::compute(&config.callsign).to_string());
    }

    Ok((config, args.metrics_port.or(metrics_port)))
}

pub async fn handle_listen(args: ListenArgs) -> Result<()> {
    let (config, metrics_port) = resolve_config(&args)?;

    if let Some(path) = &args.save_config {
        ClientConfigFile::from_config(&config, metrics_port).save(path)?;
        info!("Configuration saved to {:?}", path);
        return Ok(());
    }

    info!(
        "Listening on {}:{} as {} (filter: {})",
        config.server,
        config.port,
        config.callsign,
        config.filter.as_deref().unwrap_or("none")
    );
    if config.password.is_none() {
        info!("No passcode configured, logging in read-only");
    }

    // Zero the session metrics before the exporter can be scraped
    aprsis::metrics::initialize_session_metrics();
    if let Some(port) = metrics_port {
        tokio::spawn(
            async move {
                if let Err(e) = aprsis::metrics::start_metrics_server(port).await {
                    error!("Metrics server stopped: {:#}", e);
                }
            }
            .instrument(tracing::info_span!("metrics_server")),
        );
    }

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let (observer, events) = ChannelObserver::new();
    let observer = Arc::new(observer);
    let printer = tokio::spawn(print_events(
        events,
        args.format,
        args.show_server_lines,
        args.show_errors,
    ));

    reconnect_loop(&config, observer, &shutdown).await;

    printer.await.context("Printer task panicked")??;
    info!("Shut down");
    Ok(())
}

/// Run sessions until shutdown, rebuilding the client after each one ends.
/// The delay doubles after every failed attempt and resets once a session logs in.
async fn reconnect_loop(
    config: &AprsClientConfig,
    observer: Arc<ChannelObserver>,
    shutdown: &CancellationToken,
) {
    let initial_delay = Duration::from_secs(config.retry_delay_seconds);
    let max_delay = Duration::from_secs(
        config
            .max_retry_delay_seconds
            .max(config.retry_delay_seconds),
    );
    let mut delay = initial_delay;
    let mut attempt: u32 = 0;

    while !shutdown.is_cancelled() {
        attempt += 1;
        let mut client = AprsClient::tcp(config.clone());
        client.add_observer(observer.clone() as Arc<dyn SessionObserver>);
        let client = Arc::new(client);
        let mut session = client.start();

        let outcome = tokio::select! {
            joined = &mut session => Some(joined),
            _ = shutdown.cancelled() => None,
        };

        let outcome = match outcome {
            Some(joined) => joined,
            None => {
                client.disconnect();
                let grace = config.read_timeout + SHUTDOWN_GRACE;
                match tokio::time::timeout(grace, &mut session).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        warn!("Session did not stop within {:?}, aborting", grace);
                        session.abort();
                        return;
                    }
                }
            }
        };

        match outcome {
            Ok(Ok(())) => info!("Session {} ended", attempt),
            Ok(Err(e)) => warn!("Session {} ended with error: {}", attempt, e),
            Err(e) => error!("Session {} task failed: {}", attempt, e),
        }

        if shutdown.is_cancelled() {
            break;
        }

        if client.connected_server().await.is_some() {
            delay = initial_delay;
        }

        info!("Reconnecting in {:?}", delay);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.cancelled() => break,
        }
        delay = (delay * 2).min(max_delay);
    }
}

async fn print_events(
    events: flume::Receiver<SessionEvent>,
    format: OutputFormat,
    show_server_lines: bool,
    show_errors: bool,
) -> Result<()> {
    while let Ok(event) = events.recv_async().await {
        let mut stdout = std::io::stdout().lock();
        match event {
            SessionEvent::Packet(packet) => write_packet(&mut stdout, &packet, format)?,
            SessionEvent::RawLine(line) if show_server_lines && line.starts_with('#') => {
                writeln!(stdout, "{}", line).context("Failed to write server line")?;
            }
            SessionEvent::DecodeError { line, error } if show_errors => {
                writeln!(stdout, "! {} ({})", line, error).context("Failed to write error")?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let (mut sigterm, mut sigint) =
                match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                    (Ok(term), Ok(int)) => (term, int),
                    (Err(e), _) | (_, Err(e)) => {
                        error!("Failed to register signal handlers: {}", e);
                        return;
                    }
                };

            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                _ = sigint.recv() => info!("Received SIGINT (Ctrl+C), shutting down..."),
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for SIGINT signal: {}", err);
                return;
            }
            info!("Received SIGINT (Ctrl+C), shutting down...");
        }

        shutdown.cancel();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        listen: ListenArgs,
    }

    fn parse(args: &[&str]) -> ListenArgs {
        let mut argv = vec!["aprsis"];
        argv.extend_from_slice(args);
        TestCli::parse_from(argv).listen
    }

    #[test]
    fn test_auto_passcode_uses_callsign() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("none.toml");
        std::fs::write(&missing, "").unwrap();

        let args = parse(&[
            "--config",
            missing.to_str().unwrap(),
            "--callsign",
            "n0call-9",
            "--auto-passcode",
        ]);
        let (config, _) = resolve_config(&args).unwrap();
        assert_eq!(config.callsign, "N0CALL-9");
        assert_eq!(config.password.as_deref(), Some("13023"));
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aprsis.toml");
        std::fs::write(
            &path,
            "server = \"euro.aprs2.net\"\ncallsign = \"W1AW\"\nmetrics_port = 9100\n",
        )
        .unwrap();

        let args = parse(&[
            "--config",
            path.to_str().unwrap(),
            "--server",
            "noam.aprs2.net",
            "--filter",
            "t/w",
        ]);
        let (config, metrics_port) = resolve_config(&args).unwrap();
        assert_eq!(config.server, "noam.aprs2.net");
        assert_eq!(config.callsign, "W1AW");
        assert_eq!(config.filter.as_deref(), Some("t/w"));
        assert_eq!(metrics_port, Some(9100));
    }

    #[test]
    fn test_invalid_cli_filter_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aprsis.toml");
        std::fs::write(&path, "").unwrap();

        let args = parse(&["--config", path.to_str().unwrap(), "--filter", "r/120/0/10"]);
        assert!(resolve_config(&args).is_err());
    }

    #[tokio::test]
    async fn test_save_config_writes_file_and_exits() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("aprsis.toml");
        std::fs::write(&source, "callsign = \"W1AW\"\n").unwrap();
        let target = dir.path().join("saved.toml");

        let args = parse(&[
            "--config",
            source.to_str().unwrap(),
            "--filter",
            "t/w",
            "--metrics-port",
            "9100",
            "--save-config",
            target.to_str().unwrap(),
        ]);
        handle_listen(args).await.unwrap();

        let saved = ClientConfigFile::load(&target).unwrap();
        assert_eq!(saved.callsign.as_deref(), Some("W1AW"));
        assert_eq!(saved.filter.as_deref(), Some("t/w"));
        assert_eq!(saved.metrics_port, Some(9100));
    }
}

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, trace, warn};

use crate::aprs_filters::DEFAULT_FILTER;
use crate::connection_status::{ConnectionState, ConnectionStatus, SessionObserver};
use crate::error::{AprsError, Result};
use crate::packet::Packet;
use crate::transport::{TcpTransport, Transport};

/// APRS-IS servers expect clients to re-send their login at least this often
const DEFAULT_RELOGIN_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

/// Configuration for the APRS client
#[derive(Debug, Clone)]
pub struct AprsClientConfig {
    /// APRS-IS server hostname
    pub server: String,
    /// APRS-IS server port
    pub port: u16,
    /// Callsign for authentication
    pub callsign: String,
    /// Passcode; `None` logs in read-only with `-1`
    pub password: Option<String>,
    /// Server-side filter expression
    pub filter: Option<String>,
    /// Software name and version announced on the login line
    pub product: String,
    pub version: String,
    /// How often the login line is re-sent
    pub relogin_interval: Duration,
    /// Longest a single read waits before the loop re-checks for shutdown
    pub read_timeout: Duration,
    /// Initial delay between reconnection attempts in seconds (doubled after each failure)
    pub retry_delay_seconds: u64,
    /// Cap for the reconnection delay
    pub max_retry_delay_seconds: u64,
}

impl Default for AprsClientConfig {
    fn default() -> Self {
        Self {
            server: "rotate.aprs2.net".to_string(),
            port: 14580,
            callsign: "N0CALL".to_string(),
            password: None,
            filter: Some(DEFAULT_FILTER.to_string()),
            product: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            relogin_interval: DEFAULT_RELOGIN_INTERVAL,
            read_timeout: Duration::from_secs(30),
            retry_delay_seconds: 5,
            max_retry_delay_seconds: 60,
        }
    }
}

/// Build the APRS-IS login line (without line terminator)
pub fn build_login_line(config: &AprsClientConfig) -> String {
    let mut login = format!(
        "user {} pass {} vers {} {}",
        config.callsign,
        config.password.as_deref().unwrap_or("-1"),
        config.product,
        config.version
    );

    if let Some(filter) = &config.filter {
        login.push_str(" filter ");
        login.push_str(filter);
    }

    login
}

/// Sends the login line. Shared by the receive loop and the re-login timer so the two
/// never interleave writes.
struct LoginSender {
    transport: Arc<dyn Transport>,
    line: String,
    lock: Mutex<()>,
}

impl LoginSender {
    async fn send(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.transport.send_line(&self.line).await?;
        metrics::counter!("aprs.login.sent_total").increment(1);
        debug!("Login line sent");
        Ok(())
    }
}

/// One APRS-IS session over one transport.
///
/// The session moves `NotConnected -> Connected -> LoggedIn -> Disconnected` and never
/// leaves `Disconnected`; reconnecting means building a new client.
pub struct AprsClient {
    config: AprsClientConfig,
    transport: Arc<dyn Transport>,
    observers: Vec<Arc<dyn SessionObserver>>,
    status: RwLock<ConnectionStatus>,
    receiving: AtomicBool,
    /// Set by the first `run`; a client runs at most one session
    started: AtomicBool,
    login: Arc<LoginSender>,
    relogin_cancel: CancellationToken,
}

impl AprsClient {
    pub fn new(config: AprsClientConfig, transport: Arc<dyn Transport>) -> Self {
        let login = Arc::new(LoginSender {
            transport: transport.clone(),
            line: build_login_line(&config),
            lock: Mutex::new(()),
        });

        Self {
            config,
            transport,
            observers: Vec::new(),
            status: RwLock::new(ConnectionStatus::default()),
            receiving: AtomicBool::new(true),
            started: AtomicBool::new(false),
            login,
            relogin_cancel: CancellationToken::new(),
        }
    }

    /// Client over a fresh TCP transport
    pub fn tcp(config: AprsClientConfig) -> Self {
        let transport = Arc::new(TcpTransport::new(config.read_timeout));
        Self::new(config, transport)
    }

    /// Register an observer. Observers are called synchronously, in event order.
    pub fn add_observer(&mut self, observer: Arc<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    pub fn config(&self) -> &AprsClientConfig {
        &self.config
    }

    pub async fn state(&self) -> ConnectionState {
        self.status.read().await.state
    }

    /// Server name from the login response, once logged in
    pub async fn connected_server(&self) -> Option<String> {
        self.status.read().await.connected_server.clone()
    }

    pub async fn status(&self) -> ConnectionStatus {
        self.status.read().await.clone()
    }

    /// Ask the receive loop to stop. Takes effect once the pending read returns.
    pub fn disconnect(&self) {
        info!("Disconnect requested");
        self.receiving.store(false, Ordering::Release);
    }

    /// Run the session on its own task
    pub fn start(self: &Arc<Self>) -> JoinHandle<Result<()>> {
        let client = Arc::clone(self);
        tokio::spawn(async move { client.run().await })
    }

    /// Connect, then receive until disconnected. Transport failures are returned after the
    /// session has been torn down. A client runs once: later calls fail without touching
    /// the transport or the state.
    #[tracing::instrument(skip(self), fields(server = %self.config.server, port = %self.config.port))]
    pub async fn run(&self) -> Result<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            warn!("Session already ran on this client, build a new client to reconnect");
            return Err(AprsError::Connection(std::io::Error::other(
                "session already ran on this client",
            )));
        }

        info!(
            "Connecting to APRS-IS server {}:{}",
            self.config.server, self.config.port
        );

        if let Err(e) = self
            .transport
            .connect(&self.config.server, self.config.port)
            .await
        {
            error!("Failed to connect to APRS-IS server: {}", e);
            self.set_state(ConnectionState::Disconnected).await;
            return Err(e);
        }

        self.set_state(ConnectionState::Connected).await;
        self.spawn_relogin_timer();

        let result = self.receive_loop().await;
        if let Err(e) = &result {
            error!("APRS-IS session failed: {}", e);
        }

        self.teardown().await;
        result
    }

    async fn receive_loop(&self) -> Result<()> {
        while self.receiving.load(Ordering::Acquire) && self.transport.is_connected() {
            let Some(line) = self.transport.receive_line().await? else {
                continue;
            };
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }

            trace!("Received: {}", line);
            for observer in &self.observers {
                observer.on_raw_line(line);
            }

            if line.starts_with('#') {
                self.handle_server_line(line).await?;
            } else {
                self.handle_packet_line(line);
            }
        }

        debug!(
            "Receive loop finished (receiving={}, connected={})",
            self.receiving.load(Ordering::Acquire),
            self.transport.is_connected()
        );
        Ok(())
    }

    async fn handle_server_line(&self, line: &str) -> Result<()> {
        metrics::counter!("aprs.raw_message.received.server_total").increment(1);

        if line.contains("logresp") {
            let server = parse_server_name(line);
            info!(
                "Login accepted by {}: {}",
                server.as_deref().unwrap_or("unknown server"),
                line
            );
            self.status.write().await.connected_server = server;
            self.set_state(ConnectionState::LoggedIn).await;
        }

        if self.state().await != ConnectionState::LoggedIn {
            info!("Sending login for {}", self.config.callsign);
            self.login.send().await?;
        }

        Ok(())
    }

    fn handle_packet_line(&self, line: &str) {
        metrics::counter!("aprs.raw_message.received.aprs_total").increment(1);

        match Packet::decode(line) {
            Ok(packet) => {
                metrics::counter!("aprs.packet.decoded_total").increment(1);
                for observer in &self.observers {
                    observer.on_packet(&packet);
                }
            }
            Err(e) => {
                debug!("Failed to decode {:?}: {}", line, e);
                metrics::counter!("aprs.packet.decode_error_total").increment(1);
                for observer in &self.observers {
                    observer.on_decode_error(line, &e);
                }
            }
        }
    }

    fn spawn_relogin_timer(&self) {
        let login = self.login.clone();
        let cancel = self.relogin_cancel.clone();
        let period = self.config.relogin_interval;

        tokio::spawn(
            async move {
                let mut interval = interval_at(Instant::now() + period, period);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = interval.tick() => {
                            info!("Periodic re-login");
                            if let Err(e) = login.send().await {
                                warn!("Periodic re-login failed: {}", e);
                            }
                        }
                    }
                }
                trace!("Re-login timer stopped");
            }
            .instrument(tracing::info_span!("relogin_timer")),
        );
    }

    async fn teardown(&self) {
        self.relogin_cancel.cancel();
        if let Err(e) = self.transport.disconnect().await {
            warn!("Error while disconnecting transport: {}", e);
        }
        self.set_state(ConnectionState::Disconnected).await;
    }

    /// Record a state change and publish it while holding the status lock, so observers
    /// see transitions in order
    async fn set_state(&self, state: ConnectionState) {
        let mut status = self.status.write().await;
        if status.state == state {
            return;
        }
        status.state = state;
        status.changed_at = chrono::Utc::now();

        metrics::gauge!("aprs.connection.state").set(state.as_gauge());
        info!("APRS-IS session {}", state);
        for observer in &self.observers {
            observer.on_state_change(state);
        }
    }
}

/// The token after the literal word `server` in a `logresp` line
fn parse_server_name(line: &str) -> Option<String> {
    line.split_whitespace()
        .skip_while(|token| *token != "server")
        .nth(1)
        .map(|name| name.trim_end_matches(',').to_string())
}

/// Builder pattern for creating APRS client configurations
pub struct AprsClientConfigBuilder {
    config: AprsClientConfig,
}

impl AprsClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AprsClientConfig::default(),
        }
    }

    pub fn server<S: Into<String>>(mut self, server: S) -> Self {
        self.config.server = server.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn callsign<S: Into<String>>(mut self, callsign: S) -> Self {
        self.config.callsign = callsign.into();
        self
    }

    pub fn password<S: Into<String>>(mut self, password: Option<S>) -> Self {
        self.config.password = password.map(|p| p.into());
        self
    }

    pub fn filter<S: Into<String>>(mut self, filter: Option<S>) -> Self {
        self.config.filter = filter.map(|f| f.into());
        self
    }

    pub fn product<S: Into<String>, V: Into<String>>(mut self, product: S, version: V) -> Self {
        self.config.product = product.into();
        self.config.version = version.into();
        self
    }

    pub fn relogin_interval(mut self, interval: Duration) -> Self {
        self.config.relogin_interval = interval;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn retry_delay_seconds(mut self, seconds: u64) -> Self {
        self.config.retry_delay_seconds = seconds;
        self
    }

    pub fn max_retry_delay_seconds(mut self, seconds: u64) -> Self {
        self.config.max_retry_delay_seconds = seconds;
        self
    }

    pub fn build(self) -> AprsClientConfig {
        self.config
    }
}

impl Default for AprsClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = AprsClientConfigBuilder::new()
            .server("test.aprs.net")
            .port(14580)
            .callsign("TEST123")
            .password(Some("12345"))
            .filter(Some("r/47.0/-122.0/100"))
            .retry_delay_seconds(10)
            .relogin_interval(Duration::from_secs(60))
            .build();

        assert_eq!(config.server, "test.aprs.net");
        assert_eq!(config.port, 14580);
        assert_eq!(config.callsign, "TEST123");
        assert_eq!(config.password, Some("12345".to_string()));
        assert_eq!(config.filter, Some("r/47.0/-122.0/100".to_string()));
        assert_eq!(config.retry_delay_seconds, 10);
        assert_eq!(config.relogin_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_defaults() {
        let config = AprsClientConfig::default();
        assert_eq!(config.server, "rotate.aprs2.net");
        assert_eq!(config.port, 14580);
        assert_eq!(config.callsign, "N0CALL");
        assert_eq!(config.password, None);
        assert_eq!(config.filter.as_deref(), Some(DEFAULT_FILTER));
        assert_eq!(config.relogin_interval, Duration::from_secs(21600));
    }

    #[test]
    fn test_login_line_with_password() {
        let config = AprsClientConfigBuilder::new()
            .callsign("TEST123")
            .password(Some("12345"))
            .filter(Some("r/47.0/-122.0/100"))
            .product("aprsis", "1.0")
            .build();

        assert_eq!(
            build_login_line(&config),
            "user TEST123 pass 12345 vers aprsis 1.0 filter r/47.0/-122.0/100"
        );
    }

    #[test]
    fn test_login_line_without_password_or_filter() {
        let config = AprsClientConfigBuilder::new()
            .callsign("TEST123")
            .filter(None::<String>)
            .product("aprsis", "1.0")
            .build();

        assert_eq!(build_login_line(&config), "user TEST123 pass -1 vers aprsis 1.0");
    }

    #[test]
    fn test_parse_server_name() {
        assert_eq!(
            parse_server_name("# logresp N0CALL verified, server FOURTH").as_deref(),
            Some("FOURTH")
        );
        assert_eq!(
            parse_server_name("# logresp N0CALL unverified, server T2TEXAS, adjunct \"filter\"")
                .as_deref(),
            Some("T2TEXAS")
        );
        assert_eq!(parse_server_name("# logresp N0CALL unverified"), None);
    }
}

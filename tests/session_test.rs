use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aprsis::aprs_client::{AprsClient, AprsClientConfig, AprsClientConfigBuilder, build_login_line};
use aprsis::connection_status::{ConnectionState, SessionObserver};
use aprsis::error::{AprsError, Result};
use aprsis::packet::Packet;
use aprsis::transport::Transport;

enum Script {
    Line(String),
    Fail,
}

/// In-memory transport fed line by line from the test body
struct ScriptedTransport {
    lines: flume::Receiver<Script>,
    sent: Mutex<Vec<String>>,
    connected: AtomicBool,
    refuse_connect: bool,
    disconnects: AtomicUsize,
}

impl ScriptedTransport {
    fn new(refuse_connect: bool) -> (Arc<Self>, flume::Sender<Script>) {
        let (tx, rx) = flume::unbounded();
        let transport = Arc::new(Self {
            lines: rx,
            sent: Mutex::new(Vec::new()),
            connected: AtomicBool::new(false),
            refuse_connect,
            disconnects: AtomicUsize::new(0),
        });
        (transport, tx)
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&self, _host: &str, _port: u16) -> Result<()> {
        if self.refuse_connect {
            return Err(AprsError::Connection(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "refused",
            )));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn receive_line(&self) -> Result<Option<String>> {
        match tokio::time::timeout(Duration::from_millis(20), self.lines.recv_async()).await {
            Ok(Ok(Script::Line(line))) => Ok(Some(line)),
            Ok(Ok(Script::Fail)) => Err(AprsError::Connection(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset by peer",
            ))),
            Ok(Err(_)) => {
                self.connected.store(false, Ordering::SeqCst);
                Ok(None)
            }
            Err(_) => Ok(None),
        }
    }

    async fn send_line(&self, line: &str) -> Result<()> {
        self.sent.lock().unwrap().push(line.to_string());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingObserver {
    raw_lines: Mutex<Vec<String>>,
    packets: Mutex<Vec<Packet>>,
    states: Mutex<Vec<ConnectionState>>,
    decode_errors: Mutex<Vec<String>>,
}

impl SessionObserver for RecordingObserver {
    fn on_raw_line(&self, line: &str) {
        self.raw_lines.lock().unwrap().push(line.to_string());
    }

    fn on_packet(&self, packet: &Packet) {
        self.packets.lock().unwrap().push(packet.clone());
    }

    fn on_state_change(&self, state: ConnectionState) {
        self.states.lock().unwrap().push(state);
    }

    fn on_decode_error(&self, line: &str, _error: &AprsError) {
        self.decode_errors.lock().unwrap().push(line.to_string());
    }
}

fn test_config() -> AprsClientConfig {
    AprsClientConfigBuilder::new()
        .callsign("N0CALL")
        .filter(Some("r/47.0/-122.0/100"))
        .product("aprsis", "test")
        .build()
}

fn client_with(
    config: AprsClientConfig,
    transport: Arc<ScriptedTransport>,
) -> (AprsClient, Arc<RecordingObserver>) {
    let observer = Arc::new(RecordingObserver::default());
    let mut client = AprsClient::new(config, transport);
    client.add_observer(observer.clone());
    (client, observer)
}

fn push(tx: &flume::Sender<Script>, line: &str) {
    tx.send(Script::Line(line.to_string())).unwrap();
}

async fn wait_for_state(client: &AprsClient, state: ConnectionState) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while client.state().await != state {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("state not reached in time");
}

#[tokio::test]
async fn test_login_handshake_sends_login_once() {
    let (transport, tx) = ScriptedTransport::new(false);
    let (client, observer) = client_with(test_config(), transport.clone());

    push(&tx, "# aprsc 2.1.14-g5e4ee9a");
    push(&tx, "# logresp N0CALL unverified, server FOURTH");
    push(&tx, "# filter r/47.0/-122.0/100 active");
    push(&tx, "N0CALL>APRS,TCPIP*,qAC,FOURTH:=4903.50N/07201.75W-Test");
    drop(tx);

    client.run().await.unwrap();

    assert_eq!(transport.sent(), vec![build_login_line(&test_config())]);
    assert_eq!(client.connected_server().await.as_deref(), Some("FOURTH"));
    assert_eq!(client.state().await, ConnectionState::Disconnected);
    assert_eq!(transport.disconnects.load(Ordering::SeqCst), 1);

    assert_eq!(
        *observer.states.lock().unwrap(),
        vec![
            ConnectionState::Connected,
            ConnectionState::LoggedIn,
            ConnectionState::Disconnected
        ]
    );
    assert_eq!(observer.raw_lines.lock().unwrap().len(), 4);

    let packets = observer.packets.lock().unwrap();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].sender, "N0CALL");
    assert_eq!(packets[0].path, vec!["APRS", "TCPIP*", "qAC", "FOURTH"]);
}

#[tokio::test]
async fn test_login_repeats_until_accepted() {
    let (transport, tx) = ScriptedTransport::new(false);
    let (client, observer) = client_with(test_config(), transport.clone());

    push(&tx, "# aprsc 2.1.14-g5e4ee9a");
    push(&tx, "# server busy");
    drop(tx);

    client.run().await.unwrap();

    assert_eq!(transport.sent().len(), 2);
    assert_eq!(client.connected_server().await, None);
    assert!(
        !observer
            .states
            .lock()
            .unwrap()
            .contains(&ConnectionState::LoggedIn)
    );
}

#[tokio::test]
async fn test_decode_error_does_not_end_session() {
    let (transport, tx) = ScriptedTransport::new(false);
    let (client, observer) = client_with(test_config(), transport.clone());

    push(&tx, "this is not a packet");
    push(&tx, "N0CALL>APRS:!9903.50N/07201.75W-bad latitude");
    push(&tx, "N0CALL>APRS:>Still here");
    drop(tx);

    client.run().await.unwrap();

    assert_eq!(observer.decode_errors.lock().unwrap().len(), 2);
    assert_eq!(observer.packets.lock().unwrap().len(), 1);
    assert_eq!(client.state().await, ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_failed_connect_goes_to_disconnected() {
    let (transport, _tx) = ScriptedTransport::new(true);
    let (client, observer) = client_with(test_config(), transport.clone());

    let err = client.run().await.unwrap_err();
    assert!(matches!(err, AprsError::Connection(_)));
    assert_eq!(client.state().await, ConnectionState::Disconnected);
    assert_eq!(
        *observer.states.lock().unwrap(),
        vec![ConnectionState::Disconnected]
    );
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_transport_error_is_returned_after_teardown() {
    let (transport, tx) = ScriptedTransport::new(false);
    let (client, observer) = client_with(test_config(), transport.clone());

    push(&tx, "# logresp N0CALL verified, server T2TEXAS");
    tx.send(Script::Fail).unwrap();

    let err = client.run().await.unwrap_err();
    assert!(matches!(err, AprsError::Connection(_)));
    assert_eq!(transport.disconnects.load(Ordering::SeqCst), 1);
    assert_eq!(
        observer.states.lock().unwrap().last(),
        Some(&ConnectionState::Disconnected)
    );
}

#[tokio::test]
async fn test_disconnect_stops_running_session() {
    let (transport, tx) = ScriptedTransport::new(false);
    let (client, observer) = client_with(test_config(), transport.clone());
    let client = Arc::new(client);

    let session = client.start();
    push(&tx, "# logresp N0CALL verified, server FOURTH");
    wait_for_state(&client, ConnectionState::LoggedIn).await;

    client.disconnect();
    tokio::time::timeout(Duration::from_secs(2), session)
        .await
        .expect("session did not stop")
        .unwrap()
        .unwrap();

    assert_eq!(transport.disconnects.load(Ordering::SeqCst), 1);
    assert_eq!(client.state().await, ConnectionState::Disconnected);
    assert_eq!(
        observer.states.lock().unwrap().last(),
        Some(&ConnectionState::Disconnected)
    );

    // The session is over; further lines are never read
    push(&tx, "N0CALL>APRS:>late");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(observer.packets.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_periodic_relogin() {
    let (transport, _tx) = ScriptedTransport::new(false);
    let config = AprsClientConfigBuilder::new()
        .callsign("N0CALL")
        .relogin_interval(Duration::from_millis(40))
        .build();
    let (client, _observer) = client_with(config, transport.clone());
    let client = Arc::new(client);

    let session = client.start();
    wait_for_state(&client, ConnectionState::Connected).await;
    assert!(transport.sent().is_empty());

    tokio::time::sleep(Duration::from_millis(150)).await;
    client.disconnect();
    session.await.unwrap().unwrap();

    let logins = transport.sent().len();
    assert!(logins >= 2, "expected periodic logins, got {}", logins);

    // Cancelled with the session
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.sent().len(), logins);
}

#[tokio::test]
async fn test_disconnected_client_does_not_run_again() {
    let (transport, tx) = ScriptedTransport::new(false);
    let (client, observer) = client_with(test_config(), transport.clone());
    drop(tx);

    client.run().await.unwrap();
    let states_after_first = observer.states.lock().unwrap().clone();
    assert_eq!(
        states_after_first,
        vec![ConnectionState::Connected, ConnectionState::Disconnected]
    );

    let err = client.run().await.unwrap_err();
    assert!(matches!(err, AprsError::Connection(_)));
    assert_eq!(*observer.states.lock().unwrap(), states_after_first);
    assert_eq!(client.state().await, ConnectionState::Disconnected);
    assert_eq!(transport.disconnects.load(Ordering::SeqCst), 1);
    assert!(!transport.is_connected());
}

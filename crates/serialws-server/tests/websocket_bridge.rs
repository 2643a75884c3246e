//! End-to-end tests: a real listener, real WebSocket clients, mock serial hardware.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use serialws_serial::mock::MockTransport;
use serialws_serial::{PortPhase, SerialSession};
use serialws_server::{start, ServerConfig, ServerHandle};
use serialws_settings::{DisconnectPolicy, EventDelivery};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

struct Fixture {
    mock: MockTransport,
    session: SerialSession,
    server: ServerHandle,
}

impl Fixture {
    async fn start() -> Self {
        Self::with_policies(EventDelivery::Latest, DisconnectPolicy::Always).await
    }

    async fn with_policies(delivery: EventDelivery, disconnect: DisconnectPolicy) -> Self {
        let mock = MockTransport::new();
        let session = SerialSession::new(Arc::new(mock.clone()));
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            delivery,
            disconnect,
            ..ServerConfig::default()
        };
        let server = start(config, session.clone()).await.unwrap();
        Self {
            mock,
            session,
            server,
        }
    }

    async fn connect(&self) -> Client {
        let expected = self.server.connection_count() + 1;
        let url = format!("ws://127.0.0.1:{}/", self.server.port());
        let (ws, _) = connect_async(url).await.unwrap();
        // The server registers the connection once the upgrade completes.
        wait_until(|| self.server.connection_count() >= expected).await;
        ws
    }

    async fn wait_for_phase(&self, phase: PortPhase) {
        wait_until(|| self.session.phase() == phase).await;
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(RECV_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn send(ws: &mut Client, text: &str) {
    ws.send(Message::text(text)).await.unwrap();
}

async fn next_json(ws: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for message")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn next_json_within(ws: &mut Client, wait: Duration) -> Option<Value> {
    tokio::time::timeout(wait, next_json(ws)).await.ok()
}

#[tokio::test]
async fn open_replies_opening_then_open_success() {
    let fx = Fixture::start().await;
    let mut ws = fx.connect().await;

    send(&mut ws, r#"{"action":"open","path":"COM3","baudRate":115200}"#).await;
    let first = next_json(&mut ws).await;
    let second = next_json(&mut ws).await;
    let messages = [first, second];

    let result = messages.iter().find(|m| m["type"] == "result").unwrap();
    assert_eq!(result["action"], "open");
    assert_eq!(result["success"], true);
    assert_eq!(result["msg"], "opening...");

    let event = messages.iter().find(|m| m["type"] == "open-success").unwrap();
    let msg = event["data"]["msg"].as_str().unwrap();
    assert!(msg.contains("COM3"));
    assert!(msg.contains("115200"));
    assert!(fx.session.is_open());
}

#[tokio::test]
async fn send_writes_exact_bytes() {
    let fx = Fixture::start().await;
    let mut ws = fx.connect().await;

    send(&mut ws, r#"{"action":"open","path":"COM3","baudRate":115200}"#).await;
    fx.wait_for_phase(PortPhase::Open).await;

    send(&mut ws, r#"{"action":"send","data":"48656C6C6F"}"#).await;
    wait_until(|| !fx.mock.writes().is_empty()).await;
    assert_eq!(fx.mock.writes(), vec![vec![0x48, 0x65, 0x6C, 0x6C, 0x6F]]);
}

#[tokio::test]
async fn inbound_serial_data_arrives_as_hex() {
    let fx = Fixture::start().await;
    let mut ws = fx.connect().await;

    send(&mut ws, r#"{"action":"open","path":"COM3"}"#).await;
    fx.wait_for_phase(PortPhase::Open).await;
    let _ = next_json(&mut ws).await;
    let _ = next_json(&mut ws).await;

    assert!(fx.mock.push_data(&[0xDE, 0xAD, 0xBE, 0xEF]));
    let event = next_json(&mut ws).await;
    assert_eq!(event, serde_json::json!({"type": "data", "data": "DEADBEEF"}));
}

#[tokio::test]
async fn malformed_json_yields_only_an_error_envelope() {
    let fx = Fixture::start().await;
    let mut ws = fx.connect().await;

    send(&mut ws, "not json").await;
    let reply = next_json(&mut ws).await;
    assert_eq!(reply["type"], "error");
    assert!(reply["msg"].is_string());

    assert!(next_json_within(&mut ws, Duration::from_millis(200)).await.is_none());
    assert!(fx.mock.open_requests().is_empty());
}

#[tokio::test]
async fn non_utf8_binary_frame_yields_an_error_envelope() {
    let fx = Fixture::start().await;
    let mut ws = fx.connect().await;

    ws.send(Message::binary(vec![0xFF, 0xFE, 0x00])).await.unwrap();
    let reply = next_json(&mut ws).await;
    assert_eq!(reply["type"], "error");
    assert!(reply["msg"].is_string());

    assert!(next_json_within(&mut ws, Duration::from_millis(200)).await.is_none());
    assert!(fx.mock.open_requests().is_empty());
}

#[tokio::test]
async fn unknown_action_result() {
    let fx = Fixture::start().await;
    let mut ws = fx.connect().await;

    send(&mut ws, r#"{"action":"frobnicate"}"#).await;
    let reply = next_json(&mut ws).await;
    assert_eq!(
        reply,
        serde_json::json!({
            "type": "result",
            "action": "frobnicate",
            "success": false,
            "msg": "unknown action"
        })
    );
}

#[tokio::test]
async fn ports_returns_fixed_result_and_list() {
    let fx = Fixture::start().await;
    fx.mock.set_ports(vec![serialws_core::PortInfo::from_parts(
        "/dev/ttyUSB0",
        Some("CP2102".into()),
        Some("Silicon Labs".into()),
        None,
    )]);
    let mut ws = fx.connect().await;

    send(&mut ws, r#"{"action":"ports"}"#).await;
    let messages = [next_json(&mut ws).await, next_json(&mut ws).await];

    let result = messages.iter().find(|m| m["type"] == "result").unwrap();
    assert_eq!(result["success"], false);
    assert_eq!(result["msg"], "request accepted");

    let ports = messages.iter().find(|m| m["type"] == "ports").unwrap();
    assert_eq!(
        ports["data"],
        serde_json::json!([{
            "path": "/dev/ttyUSB0",
            "name": "CP2102",
            "manufacturer": "Silicon Labs",
            "serialNumber": ""
        }])
    );
}

#[tokio::test]
async fn newest_client_receives_events() {
    let fx = Fixture::start().await;
    let mut first = fx.connect().await;
    let mut second = fx.connect().await;

    send(&mut second, r#"{"action":"open","path":"COM3"}"#).await;
    fx.wait_for_phase(PortPhase::Open).await;
    let _ = next_json(&mut second).await;
    let _ = next_json(&mut second).await;

    assert!(fx.mock.push_data(b"A"));
    assert_eq!(next_json(&mut second).await["data"], "41");
    assert!(next_json_within(&mut first, Duration::from_millis(200)).await.is_none());
}

#[tokio::test]
async fn broadcast_delivery_reaches_every_client() {
    let fx = Fixture::with_policies(EventDelivery::Broadcast, DisconnectPolicy::Always).await;
    let mut first = fx.connect().await;
    let mut second = fx.connect().await;

    send(&mut first, r#"{"action":"open","path":"COM3"}"#).await;
    fx.wait_for_phase(PortPhase::Open).await;

    let from_second = next_json(&mut second).await;
    assert_eq!(from_second["type"], "open-success");
}

#[tokio::test]
async fn disconnect_closes_serial_port() {
    let fx = Fixture::start().await;
    let mut ws = fx.connect().await;

    send(&mut ws, r#"{"action":"open","path":"COM3"}"#).await;
    fx.wait_for_phase(PortPhase::Open).await;

    ws.close(None).await.unwrap();
    fx.wait_for_phase(PortPhase::Closed).await;
    wait_until(|| fx.server.connection_count() == 0).await;
}

#[tokio::test]
async fn last_client_policy_keeps_port_while_clients_remain() {
    let fx = Fixture::with_policies(EventDelivery::Latest, DisconnectPolicy::LastClient).await;
    let mut first = fx.connect().await;
    let mut second = fx.connect().await;

    send(&mut first, r#"{"action":"open","path":"COM3"}"#).await;
    fx.wait_for_phase(PortPhase::Open).await;

    first.close(None).await.unwrap();
    wait_until(|| fx.server.connection_count() == 1).await;
    assert_eq!(fx.session.phase(), PortPhase::Open);

    second.close(None).await.unwrap();
    fx.wait_for_phase(PortPhase::Closed).await;
}

#[tokio::test]
async fn plain_http_gets_readiness_text() {
    let fx = Fixture::start().await;
    let mut stream = TcpStream::connect(("127.0.0.1", fx.server.port())).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    let mut response = String::new();
    let _ = stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("WS Serial Server Running"));
}

#[tokio::test]
async fn shutdown_disconnects_clients() {
    let fx = Fixture::start().await;
    let mut ws = fx.connect().await;

    fx.server.shutdown(Some(Duration::from_secs(5))).await;

    let ended = tokio::time::timeout(RECV_TIMEOUT, async {
        loop {
            match ws.next().await {
                None | Some(Err(_) | Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok());
}

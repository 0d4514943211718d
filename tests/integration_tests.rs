//! End-to-end integration tests — TCP connection, newline framing, and the
//! full JSON-RPC request/response cycle through the running transport.

use std::time::Duration;

use rpcbase_protocol::{HandlerResult, MethodError, RequestContext};
use rpcbase_server::{JsonRpcService, MethodSchema};
use rpcbase_transport::{TransportConfig, TransportServer};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

fn test_service() -> JsonRpcService<RequestContext> {
    let mut service: JsonRpcService<RequestContext> = JsonRpcService::new();
    service
        .register("echo", |params, _ctx| Ok(params.unwrap_or(Value::Null)), None)
        .unwrap();
    service
        .register(
            "whoami",
            |_params, ctx: &RequestContext| Ok(json!({ "clientId": ctx.client_id, "peer": ctx.peer_addr })),
            None,
        )
        .unwrap();
    service
        .register(
            "sum",
            |params, _ctx| -> HandlerResult {
                let items = params.unwrap_or_default();
                let total: i64 = items
                    .as_array()
                    .map(|a| a.iter().filter_map(Value::as_i64).sum())
                    .unwrap_or(0);
                Ok(json!(total))
            },
            Some(MethodSchema::params(json!({"type": "array", "items": {"type": "integer"}}))),
        )
        .unwrap();
    service
        .register(
            "misconfigured",
            |_params, _ctx| Err(MethodError::server("bad").with_code(42)),
            None,
        )
        .unwrap();
    service
}

/// Start a test server on a random port.
async fn start_test_server(max_connections: Option<usize>) -> u16 {
    let config = TransportConfig {
        port: 0, // OS-assigned
        hostname: "127.0.0.1".into(),
        max_connections,
    };

    let transport = TransportServer::start(config, test_service()).await.unwrap();
    let port = transport.port();

    // Leak the transport to keep it running for the test
    Box::leak(Box::new(transport));

    port
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(port: u16) -> Self {
        let stream = TcpStream::connect(("127.0.0.1", port))
            .await
            .expect("Failed to connect");
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
    }

    async fn send(&mut self, payload: &Value) {
        let mut line = payload.to_string();
        line.push('\n');
        self.send_raw(line.as_bytes()).await;
    }

    /// Read one reply line, or `None` on end of stream.
    async fn recv(&mut self) -> Option<Value> {
        let mut line = String::new();
        let n = timeout(Duration::from_secs(5), self.reader.read_line(&mut line))
            .await
            .expect("Timeout waiting for reply")
            .expect("Read error");
        if n == 0 {
            return None;
        }
        Some(serde_json::from_str(&line).expect("Reply is not JSON"))
    }

    async fn request(&mut self, payload: Value) -> Value {
        self.send(&payload).await;
        self.recv().await.expect("Connection closed")
    }
}

#[tokio::test]
async fn request_response_cycle() {
    let port = start_test_server(Some(8)).await;
    let mut client = Client::connect(port).await;

    let resp = client
        .request(json!({"jsonrpc": "2.0", "id": 1, "method": "echo", "params": {"hello": "world"}}))
        .await;
    assert_eq!(resp["jsonrpc"], "2.0");
    assert_eq!(resp["id"], 1);
    assert_eq!(resp["result"]["hello"], "world");
}

#[tokio::test]
async fn notifications_get_no_reply_line() {
    let port = start_test_server(Some(8)).await;
    let mut client = Client::connect(port).await;

    client
        .send(&json!({"jsonrpc": "2.0", "method": "echo", "params": [1]}))
        .await;
    client
        .send(&json!({"jsonrpc": "2.0", "method": "no_such_method"}))
        .await;

    // The next line on the wire belongs to the call, not the notifications.
    let resp = client
        .request(json!({"jsonrpc": "2.0", "id": "after", "method": "echo", "params": [2]}))
        .await;
    assert_eq!(resp["id"], "after");
    assert_eq!(resp["result"], json!([2]));
}

#[tokio::test]
async fn blank_lines_are_ignored() {
    let port = start_test_server(Some(8)).await;
    let mut client = Client::connect(port).await;

    client.send_raw(b"\n   \r\n").await;
    let resp = client
        .request(json!({"jsonrpc": "2.0", "id": 2, "method": "sum", "params": [1, 2, 3]}))
        .await;
    assert_eq!(resp["id"], 2);
    assert_eq!(resp["result"], 6);
}

#[tokio::test]
async fn malformed_lines_get_parse_errors() {
    let port = start_test_server(Some(8)).await;
    let mut client = Client::connect(port).await;

    client.send_raw(b"{\"jsonrpc\": \"2.0\", \"method\"\n").await;
    let resp = client.recv().await.unwrap();
    assert_eq!(resp["error"]["code"], -32700);
    assert!(resp["id"].is_null());

    client.send_raw(b"\xff\xfe\n").await;
    let resp = client.recv().await.unwrap();
    assert_eq!(resp["error"]["code"], -32700);
    assert!(resp["id"].is_null());

    // The connection survives both.
    let resp = client
        .request(json!({"jsonrpc": "2.0", "id": 3, "method": "echo"}))
        .await;
    assert_eq!(resp["id"], 3);
    assert!(resp["result"].is_null());
}

#[tokio::test]
async fn batch_over_the_wire() {
    let port = start_test_server(Some(8)).await;
    let mut client = Client::connect(port).await;

    let resp = client
        .request(json!([
            {"jsonrpc": "2.0", "id": 1, "method": "sum", "params": [1, 1]},
            {"jsonrpc": "2.0", "method": "echo", "params": ["ignored"]},
            {"jsonrpc": "2.0", "id": 2, "method": "sum", "params": ["x"]},
            {"jsonrpc": "2.0", "id": 3, "method": "missing"},
        ]))
        .await;
    let responses = resp.as_array().expect("batch reply is an array");
    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0]["result"], 2);
    assert_eq!(responses[1]["error"]["code"], -32602);
    assert_eq!(responses[2]["error"]["code"], -32601);

    let resp = client.request(json!([])).await;
    assert!(resp.is_object());
    assert_eq!(resp["error"]["code"], -32600);
}

#[tokio::test]
async fn each_connection_gets_its_own_context() {
    let port = start_test_server(Some(8)).await;
    let mut first = Client::connect(port).await;
    let mut second = Client::connect(port).await;

    let a = first
        .request(json!({"jsonrpc": "2.0", "id": 1, "method": "whoami"}))
        .await;
    let b = second
        .request(json!({"jsonrpc": "2.0", "id": 1, "method": "whoami"}))
        .await;

    let a_id = a["result"]["clientId"].as_str().unwrap();
    let b_id = b["result"]["clientId"].as_str().unwrap();
    assert!(!a_id.is_empty());
    assert_ne!(a_id, b_id);
    assert!(a["result"]["peer"].as_str().unwrap().starts_with("127.0.0.1:"));

    // Stable for the life of the connection.
    let again = first
        .request(json!({"jsonrpc": "2.0", "id": 2, "method": "whoami"}))
        .await;
    assert_eq!(again["result"]["clientId"], a_id);
}

#[tokio::test]
async fn configuration_fault_closes_the_connection() {
    let port = start_test_server(Some(8)).await;
    let mut client = Client::connect(port).await;

    client
        .send(&json!({"jsonrpc": "2.0", "id": 1, "method": "misconfigured"}))
        .await;
    assert!(client.recv().await.is_none());

    // Other connections are unaffected.
    let mut other = Client::connect(port).await;
    let resp = other
        .request(json!({"jsonrpc": "2.0", "id": 1, "method": "echo", "params": [true]}))
        .await;
    assert_eq!(resp["result"], json!([true]));
}

#[tokio::test]
async fn connection_limit_is_enforced() {
    let port = start_test_server(Some(1)).await;
    let mut first = Client::connect(port).await;

    // Make sure the first connection is registered before opening another.
    let resp = first
        .request(json!({"jsonrpc": "2.0", "id": 1, "method": "echo"}))
        .await;
    assert_eq!(resp["id"], 1);

    let mut second = Client::connect(port).await;
    assert!(second.recv().await.is_none());

    drop(first);
}

//! Shared utilities for integration testing.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

use vless_tunnel::config::TunnelConfig;
use vless_tunnel::http::HttpServer;
use vless_tunnel::lifecycle::Shutdown;
use vless_tunnel::protocol::{encode_header, AuthToken};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const USER_ID: &str = "d342d11e-d424-4583-b36e-524ab1f0afa4";
pub const OTHER_USER_ID: &str = "0f9e2b5c-3a0d-4c61-9d6f-8a7b1c2d3e4f";
pub const WAIT: Duration = Duration::from_secs(5);

pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    pub fn ws_url(&self) -> String {
        format!("ws://{}/", self.addr)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub fn test_config() -> TunnelConfig {
    let mut config = TunnelConfig::default();
    config.auth.user_id = USER_ID.to_string();
    config.outbound.connect_timeout_secs = 2;
    config.timeouts.drain_secs = 2;
    config
}

/// Start the tunnel on an ephemeral port.
pub async fn start_server(config: TunnelConfig) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, shutdown.clone()).unwrap();
    let handle = tokio::spawn(server.run(listener));
    TestServer {
        addr,
        shutdown,
        handle,
    }
}

/// Start a TCP backend that echoes everything it reads.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = socket.into_split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
                let _ = writer.shutdown().await;
            });
        }
    });

    addr
}

/// Start a TCP backend that writes `greeting` and closes.
pub async fn start_closing_backend(greeting: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = socket.write_all(greeting).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// An address with nothing listening on it.
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn handshake(user_id: &str, target: SocketAddr, payload: &[u8]) -> Vec<u8> {
    let token = AuthToken::parse(user_id).unwrap();
    let mut frame = encode_header(0, &token, &target.ip().to_string(), target.port()).unwrap();
    frame.extend_from_slice(payload);
    frame
}

pub async fn connect(server: &TestServer) -> WsClient {
    let (ws, _) = tokio_tungstenite::connect_async(server.ws_url()).await.unwrap();
    ws
}

pub async fn send(ws: &mut WsClient, data: &[u8]) {
    ws.send(Message::Binary(data.to_vec().into())).await.unwrap();
}

/// Collect binary frames until `len` bytes have arrived.
pub async fn read_bytes(ws: &mut WsClient, len: usize) -> Vec<u8> {
    let mut out = Vec::new();
    tokio::time::timeout(WAIT, async {
        while out.len() < len {
            match ws.next().await {
                Some(Ok(Message::Binary(data))) => out.extend_from_slice(&data),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => panic!("websocket error: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for tunnel data");
    out
}

/// Wait until the tunnel closes the WebSocket. Returns any binary data
/// received first.
pub async fn read_until_closed(ws: &mut WsClient) -> Vec<u8> {
    let mut out = Vec::new();
    tokio::time::timeout(WAIT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Binary(data))) => out.extend_from_slice(&data),
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .expect("tunnel did not close the websocket");
    out
}

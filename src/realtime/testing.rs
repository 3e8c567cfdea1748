//! Loopback Socket.IO stand-in for channel tests.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

use crate::common::UserProfile;

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

pub fn profile(id: &str) -> UserProfile {
    UserProfile {
        id: id.into(),
        name: format!("User {id}"),
        email: format!("{id}@example.com"),
    }
}

#[derive(Clone)]
pub struct StubServer {
    listener: Arc<TcpListener>,
}

impl StubServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        Self {
            listener: Arc::new(listener),
        }
    }

    /// The websocket upgrade needs the server side running while the client
    /// connects, so accepting happens on its own task.
    pub fn spawn_accept(&self) -> tokio::task::JoinHandle<StubPeer> {
        let server = self.clone();
        tokio::spawn(async move { server.accept().await })
    }

    pub fn url(&self) -> Url {
        let addr = self.listener.local_addr().unwrap();
        Url::parse(&format!("ws://{addr}/socket.io/?EIO=4&transport=websocket")).unwrap()
    }

    /// Accept one client and complete the Engine.IO + namespace handshake.
    pub async fn accept(&self) -> StubPeer {
        let (tcp, _) = timeout(STEP_TIMEOUT, self.listener.accept())
            .await
            .unwrap()
            .unwrap();
        let socket = accept_async(tcp).await.unwrap();
        let mut peer = StubPeer { socket };
        peer.send_text(r#"0{"sid":"stub","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#)
            .await;
        assert_eq!(peer.recv_text().await, "40");
        peer.send_text(r#"40{"sid":"stub-ns"}"#).await;
        peer
    }
}

pub struct StubPeer {
    socket: WebSocketStream<TcpStream>,
}

impl StubPeer {
    pub async fn send_text(&mut self, text: &str) {
        self.socket.send(Message::text(text)).await.unwrap();
    }

    pub async fn recv_text(&mut self) -> String {
        loop {
            let message = timeout(STEP_TIMEOUT, self.socket.next())
                .await
                .expect("timed out waiting for client frame")
                .expect("client closed the connection")
                .unwrap();
            if let Message::Text(text) = message {
                return text.as_str().to_string();
            }
        }
    }

    /// Drain until the client goes away; true if it sent a namespace disconnect.
    pub async fn saw_disconnect(mut self) -> bool {
        let mut disconnected = false;
        while let Ok(Some(Ok(message))) = timeout(STEP_TIMEOUT, self.socket.next()).await {
            match message {
                Message::Text(text) if text.as_str() == "41" => disconnected = true,
                Message::Close(_) => break,
                _ => {}
            }
        }
        disconnected
    }
}

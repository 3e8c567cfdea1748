use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use reqwest::Url;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::common::{ClientError, ClientResult, UserProfile};
use crate::sync::EventSink;

use super::codec::{self, Packet};
use super::dispatch::{Dispatcher, Subscription};
use super::events::{ClientEvent, EventKind, ServerEvent};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Cloneable handle for pushing events onto an open channel.
#[derive(Clone)]
pub struct RealtimeEmitter {
    outbound: mpsc::UnboundedSender<ClientEvent>,
}

impl EventSink for RealtimeEmitter {
    fn emit(&self, event: ClientEvent) {
        let name = event.wire_name();
        if self.outbound.send(event).is_err() {
            log::debug!("Realtime connection gone; dropping `{name}`");
        }
    }
}

/// One live push connection bound to one identity. Dropping (or
/// [`close`](Self::close)) tears the connection down; no handler runs afterwards.
pub struct RealtimeChannel {
    identity: String,
    emitter: RealtimeEmitter,
    dispatcher: Dispatcher,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl RealtimeChannel {
    /// Connect to `url` and announce `profile` with a `setup` event.
    pub async fn open(url: &Url, profile: &UserProfile) -> ClientResult<Self> {
        let (socket, _) = match timeout(CONNECT_TIMEOUT, connect_async(url.as_str())).await {
            Ok(Ok(connected)) => connected,
            Ok(Err(err)) => return Err(ClientError::Realtime(format!("connect failed: {err}"))),
            Err(_) => {
                return Err(ClientError::Realtime(format!(
                    "connect timed out after {CONNECT_TIMEOUT:?}"
                )));
            }
        };
        log::info!("Realtime connected to {url} as {}", profile.id);
        Ok(Self::attach(socket, profile))
    }

    /// Drive an already-established websocket.
    pub fn attach<S>(socket: S, profile: &UserProfile) -> Self
    where
        S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Send + Unpin + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let dispatcher = Dispatcher::default();
        let emitter = RealtimeEmitter {
            outbound: outbound_tx,
        };

        // Queued now, flushed once the namespace connect is acknowledged.
        emitter.emit(ClientEvent::Setup(profile.clone()));

        let task = tokio::spawn(run_socket(
            socket,
            outbound_rx,
            dispatcher.clone(),
            shutdown_rx,
        ));

        Self {
            identity: profile.id.clone(),
            emitter,
            dispatcher,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn emitter(&self) -> RealtimeEmitter {
        self.emitter.clone()
    }

    pub fn emit(&self, event: ClientEvent) {
        self.emitter.emit(event);
    }

    pub fn subscribe<F>(&self, kinds: &[EventKind], handler: F) -> Subscription
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(kinds, handler)
    }

    /// Close and wait for the socket task to send its disconnect.
    pub async fn close(mut self) {
        self.dispatcher.close();
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if timeout(CONNECT_TIMEOUT, task).await.is_err() {
                log::warn!("Realtime task did not stop in time");
            }
        }
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.dispatcher.close();
        // Dropping the sender wakes the socket task, which disconnects.
        self.shutdown.take();
    }
}

async fn run_socket<S>(
    socket: S,
    mut outbound: mpsc::UnboundedReceiver<ClientEvent>,
    dispatcher: Dispatcher,
    mut shutdown: oneshot::Receiver<()>,
) where
    S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Send + Unpin + 'static,
{
    let (mut sink, mut stream) = socket.split();
    let mut connected = false;

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                dispatcher.close();
                disconnect(&mut sink, &mut outbound, connected).await;
                break;
            }
            frame = stream.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => {
                        log::info!("Realtime connection closed by server");
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        log::warn!("Realtime read failed: {err}");
                        break;
                    }
                };

                let reply = match codec::decode(text.as_str()) {
                    Ok(Packet::Open(handshake)) => {
                        log::debug!(
                            "Engine.IO open sid={} ping={}ms timeout={}ms",
                            handshake.sid,
                            handshake.ping_interval,
                            handshake.ping_timeout
                        );
                        Some(codec::CONNECT)
                    }
                    Ok(Packet::Connected) => {
                        connected = true;
                        None
                    }
                    Ok(Packet::Ping) => Some(codec::PONG),
                    Ok(Packet::Event { name, payload }) => {
                        match ServerEvent::decode(&name, payload) {
                            Ok(Some(event)) => {
                                dispatcher.dispatch(&event);
                            }
                            Ok(None) => log::debug!("Ignoring realtime event `{name}`"),
                            Err(err) => log::warn!("Malformed `{name}` payload: {err}"),
                        }
                        None
                    }
                    Ok(Packet::ConnectError(reason)) => {
                        log::warn!("Realtime namespace refused: {reason}");
                        break;
                    }
                    Ok(Packet::Disconnected) | Ok(Packet::Close) => {
                        log::info!("Realtime session ended by server");
                        break;
                    }
                    Ok(Packet::Pong) | Ok(Packet::Noop) | Ok(Packet::Ignored) => None,
                    Err(err) => {
                        log::warn!("Undecodable realtime frame: {err}");
                        None
                    }
                };

                if let Some(reply) = reply {
                    if let Err(err) = sink.send(Message::text(reply)).await {
                        log::warn!("Realtime write failed: {err}");
                        break;
                    }
                }
            }
            event = outbound.recv(), if connected => {
                let Some(event) = event else {
                    // Every emitter is gone, so the owning channel was dropped.
                    disconnect(&mut sink, &mut outbound, connected).await;
                    break;
                };
                if let Err(err) = send_event(&mut sink, &event).await {
                    log::warn!("Realtime write failed: {err}");
                    break;
                }
            }
        }
    }

    dispatcher.close();
    log::info!("Realtime connection closed");
}

/// Flush what was emitted before the close (leave chat, stop typing), then
/// leave the namespace and close the websocket.
async fn disconnect<K>(
    sink: &mut K,
    outbound: &mut mpsc::UnboundedReceiver<ClientEvent>,
    connected: bool,
) where
    K: Sink<Message, Error = WsError> + Unpin,
{
    if connected {
        while let Ok(event) = outbound.try_recv() {
            if send_event(&mut *sink, &event).await.is_err() {
                break;
            }
        }
        let _ = sink.send(Message::text(codec::DISCONNECT)).await;
    }
    let _ = sink.close().await;
}

/// Encoding failures are logged and skipped; only write errors are returned.
async fn send_event<K>(sink: &mut K, event: &ClientEvent) -> Result<(), WsError>
where
    K: Sink<Message, Error = WsError> + Unpin,
{
    let frame = match event.payload() {
        Ok(payload) => codec::encode_event(event.wire_name(), &payload),
        Err(err) => Err(err.into()),
    };
    match frame {
        Ok(frame) => {
            log::debug!("Realtime emit `{}`", event.wire_name());
            sink.send(Message::text(frame)).await
        }
        Err(err) => {
            log::warn!("Failed to encode `{}`: {err}", event.wire_name());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::realtime::testing::{StubServer, profile};

    #[tokio::test]
    async fn handshake_setup_ping_and_dispatch() {
        let server = StubServer::start().await;
        let accepted = server.spawn_accept();
        let channel = RealtimeChannel::open(&server.url(), &profile("u1"))
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _subscription = channel.subscribe(&[EventKind::UserOnline], move |event| {
            let _ = tx.send(event.clone());
        });
        channel.emit(ClientEvent::JoinChat("c1".into()));

        let mut peer = accepted.await.unwrap();
        assert!(peer.recv_text().await.starts_with(r#"42["setup",{"_id":"u1""#));
        assert_eq!(peer.recv_text().await, r#"42["join chat","c1"]"#);
        peer.send_text("2").await;
        assert_eq!(peer.recv_text().await, "3");
        peer.send_text(r#"42["user online","u9"]"#).await;

        let event = timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, ServerEvent::UserOnline(ref id) if id == "u9"));

        channel.close().await;
        assert!(peer.saw_disconnect().await);
    }

    #[tokio::test]
    async fn events_after_close_are_not_dispatched() {
        let server = StubServer::start().await;
        let accepted = server.spawn_accept();
        let channel = RealtimeChannel::open(&server.url(), &profile("u1"))
            .await
            .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = channel.subscribe(&[EventKind::MessageReceived], move |event| {
            let _ = tx.send(event.clone());
        });

        let mut peer = accepted.await.unwrap();
        peer.recv_text().await; // setup
        drop(channel);

        // The handler (and its sender) is gone once the channel is closed.
        assert!(timeout(Duration::from_secs(2), rx.recv()).await.unwrap().is_none());
        drop(subscription);
        assert!(peer.saw_disconnect().await);
    }

    #[tokio::test]
    async fn dropping_always_flushes_and_disconnects() {
        let server = StubServer::start().await;
        for round in 0..8 {
            let accepted = server.spawn_accept();
            let channel = RealtimeChannel::open(&server.url(), &profile("u1"))
                .await
                .unwrap();
            let mut peer = accepted.await.unwrap();
            peer.recv_text().await; // setup

            channel.emit(ClientEvent::LeaveChat("c1".into()));
            drop(channel);

            assert_eq!(peer.recv_text().await, r#"42["leave chat","c1"]"#, "round {round}");
            assert!(peer.saw_disconnect().await, "round {round}");
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_fast() {
        let url = Url::parse("ws://127.0.0.1:9/socket.io/?EIO=4&transport=websocket").unwrap();
        let err = RealtimeChannel::open(&url, &profile("u1")).await.err().unwrap();
        assert!(matches!(err, ClientError::Realtime(_)));
    }
}

use std::future::Future;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};

use crate::api::{ApiClient, RegisterOutcome};
use crate::common::{
    ClientError, ClientResult, Conversation, NetworkCommand, NetworkEvent, RealtimeScope, Session,
};
use crate::config::AppConfig;
use crate::realtime::{ClientEvent, EventKind, RealtimeLink, ServerEvent, Subscription};
use crate::session::{SessionStore, Transition};
use crate::sync::{RoomMembership, TypingDebouncer, deliver, validate_login, validate_registration};

const DIRECTORY_EVENTS: &[EventKind] = &[
    EventKind::MessageReceived,
    EventKind::UserOnline,
    EventKind::UserOffline,
];
const ROOM_EVENTS: &[EventKind] = &[
    EventKind::MessageReceived,
    EventKind::Typing,
    EventKind::StopTyping,
];

type ScopedEvent = (RealtimeScope, ServerEvent);

/// Owns everything that talks to the backend: the REST client, the session,
/// the realtime channel and the open room. Runs on its own task and talks to
/// the UI only through the two channels.
pub struct ChatClient {
    event_sender: mpsc::Sender<NetworkEvent>,
    command_receiver: mpsc::Receiver<NetworkCommand>,
    api: ApiClient,
    session: SessionStore,
    link: RealtimeLink,
    realtime_tx: mpsc::UnboundedSender<ScopedEvent>,
    realtime_rx: mpsc::UnboundedReceiver<ScopedEvent>,
    directory: Option<Subscription>,
    room: RoomMembership,
    typing: TypingDebouncer,
}

impl ChatClient {
    pub fn new(
        event_sender: mpsc::Sender<NetworkEvent>,
        command_receiver: mpsc::Receiver<NetworkCommand>,
        config: &AppConfig,
        session: SessionStore,
    ) -> ClientResult<Self> {
        let (realtime_tx, realtime_rx) = mpsc::unbounded_channel();
        Ok(Self {
            event_sender,
            command_receiver,
            api: ApiClient::new(config.api_base_url.clone())?,
            session,
            link: RealtimeLink::new(config.socket_url()?),
            realtime_tx,
            realtime_rx,
            directory: None,
            room: RoomMembership::default(),
            typing: TypingDebouncer::default(),
        })
    }

    pub async fn run(mut self) -> ClientResult<()> {
        // A restored session goes through the same path as a fresh login.
        self.on_session_changed().await;
        log::info!("Network event loop started");

        loop {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => break,
                    }
                }
                Some((scope, event)) = self.realtime_rx.recv() => {
                    self.notify(NetworkEvent::Realtime { scope, event }).await;
                }
                _ = typing_deadline(self.typing.deadline()) => {
                    if let Some(stop) = self.typing.poll(Instant::now()) {
                        self.link.emit(stop);
                    }
                }
            }
        }

        self.leave_room();
        self.directory = None;
        self.link.close().await;
        log::info!("Network event loop stopped");
        Ok(())
    }

    async fn handle_command(&mut self, command: NetworkCommand) {
        match command {
            NetworkCommand::Login { email, password } => {
                if let Err(err) = validate_login(&email, &password) {
                    self.fail(err.user_message("Login failed"), None).await;
                    return;
                }
                match self.api.login(email.trim(), &password).await {
                    Ok(session) => self.sign_in(session).await,
                    Err(err) => {
                        log::warn!("Login failed: {err}");
                        self.fail(err.user_message("Login failed"), None).await;
                    }
                }
            }
            NetworkCommand::Register {
                name,
                email,
                password,
            } => {
                if let Err(err) = validate_registration(&name, &email, &password) {
                    self.fail(err.user_message("Registration failed"), None).await;
                    return;
                }
                match self.api.register(name.trim(), email.trim(), &password).await {
                    Ok(RegisterOutcome::SignedIn(session)) => self.sign_in(session).await,
                    Ok(RegisterOutcome::Pending(message)) => {
                        let message = message.unwrap_or_else(|| {
                            "Registration successful. Please check your email to verify your account."
                                .to_string()
                        });
                        self.notify(NetworkEvent::Notice(message)).await;
                    }
                    Err(err) => {
                        log::warn!("Registration failed: {err}");
                        self.fail(err.user_message("Registration failed"), None).await;
                    }
                }
            }
            NetworkCommand::Logout => {
                self.leave_room();
                match self.session.logout() {
                    Ok(Transition::Unchanged) => log::debug!("Logout without a session"),
                    Ok(_) => {}
                    Err(err) => log::error!("Failed to clear stored session: {err}"),
                }
                self.on_session_changed().await;
            }
            NetworkCommand::LoadDirectory => {
                let api = self.api.clone();
                self.spawn_request(
                    "Failed to load data. Please try again.",
                    Some(NetworkCommand::LoadDirectory),
                    async move { tokio::try_join!(api.users(), api.conversations()) },
                    |(users, conversations)| NetworkEvent::DirectoryLoaded {
                        users,
                        conversations,
                    },
                );
            }
            NetworkCommand::StartDirectChat { user_id } => {
                let api = self.api.clone();
                let retry = NetworkCommand::StartDirectChat {
                    user_id: user_id.clone(),
                };
                self.spawn_request(
                    "Failed to create chat. Please try again.",
                    Some(retry),
                    async move { api.access_chat(&user_id).await },
                    NetworkEvent::ConversationStarted,
                );
            }
            NetworkCommand::OpenConversation(conversation) => self.enter_room(conversation),
            NetworkCommand::CloseConversation => self.leave_room(),
            NetworkCommand::Keystroke => {
                let Some(room) = self.room.current().map(str::to_string) else {
                    return;
                };
                for event in self.typing.keystroke(&room, Instant::now()) {
                    self.link.emit(event);
                }
            }
            NetworkCommand::SendMessage { draft_id, draft } => {
                self.link.emit(self.typing.submit(&draft.conversation.id));

                let api = self.api.clone();
                let sink = self.link.emitter();
                let events = self.event_sender.clone();
                tokio::spawn(async move {
                    let event = match deliver(&api, &sink, &draft).await {
                        Ok(message) => NetworkEvent::MessageSent { draft_id, message },
                        Err(err) => {
                            log::warn!("Send to {} failed: {err}", draft.conversation.id);
                            NetworkEvent::SendFailed {
                                draft_id,
                                error: send_error(&err),
                                retryable: !err.is_validation(),
                            }
                        }
                    };
                    if events.send(event).await.is_err() {
                        log::debug!("UI gone; dropping send result");
                    }
                });
            }
            NetworkCommand::CreateGroup(group) => {
                let api = self.api.clone();
                let retry = NetworkCommand::CreateGroup(group.clone());
                self.spawn_request(
                    "Failed to create group",
                    Some(retry),
                    async move { api.create_group(&group).await },
                    NetworkEvent::GroupUpserted,
                );
            }
            NetworkCommand::RenameGroup {
                conversation_id,
                name,
            } => {
                let api = self.api.clone();
                let retry = NetworkCommand::RenameGroup {
                    conversation_id: conversation_id.clone(),
                    name: name.clone(),
                };
                self.spawn_request(
                    "Failed to rename group",
                    Some(retry),
                    async move { api.rename_group(&conversation_id, &name).await },
                    NetworkEvent::GroupUpserted,
                );
            }
            NetworkCommand::AddMember {
                conversation_id,
                user_id,
            } => {
                let api = self.api.clone();
                let retry = NetworkCommand::AddMember {
                    conversation_id: conversation_id.clone(),
                    user_id: user_id.clone(),
                };
                self.spawn_request(
                    "Failed to add member",
                    Some(retry),
                    async move { api.add_member(&conversation_id, &user_id).await },
                    NetworkEvent::GroupUpserted,
                );
            }
            NetworkCommand::RemoveMember {
                conversation_id,
                user_id,
            } => {
                let api = self.api.clone();
                let retry = NetworkCommand::RemoveMember {
                    conversation_id: conversation_id.clone(),
                    user_id: user_id.clone(),
                };
                self.spawn_request(
                    "Failed to remove member",
                    Some(retry),
                    async move { api.remove_member(&conversation_id, &user_id).await },
                    NetworkEvent::GroupUpserted,
                );
            }
        }
    }

    async fn sign_in(&mut self, session: Session) {
        match self.session.login(session) {
            Ok(Transition::Unchanged) => {
                log::info!("Signed in again as the current user; refreshing token");
                self.on_session_changed().await;
            }
            Ok(_) => self.on_session_changed().await,
            Err(err) => {
                log::error!("Failed to store session: {err}");
                self.fail(err.user_message("Failed to save session"), None).await;
            }
        }
    }

    /// Rebind every identity-scoped resource to the current session.
    async fn on_session_changed(&mut self) {
        self.leave_room();
        self.directory = None;

        let session = self.session.current().cloned();
        self.api.set_token(session.as_ref().map(|session| session.token.clone()));
        if self.link.sync_with(session.as_ref()).await {
            // Handlers of a replaced channel are gone already.
            self.room.reset();
        }

        let realtime_tx = self.realtime_tx.clone();
        self.directory = self.link.channel().map(|channel| {
            channel.subscribe(DIRECTORY_EVENTS, move |event| {
                let _ = realtime_tx.send((RealtimeScope::Directory, event.clone()));
            })
        });
        self.typing = TypingDebouncer::new(
            session
                .as_ref()
                .map(|session| session.name.clone())
                .unwrap_or_default(),
        );

        self.notify(NetworkEvent::SessionChanged(
            session.as_ref().map(Session::profile),
        ))
        .await;
    }

    /// Register room handlers, join, then fetch history. Events that race the
    /// history response merge into the same keyed view.
    fn enter_room(&mut self, conversation: Conversation) {
        if let Some(stop) = self.typing.cancel() {
            self.link.emit(stop);
        }

        let id = conversation.id.clone();
        let realtime_tx = self.realtime_tx.clone();
        let scope = RealtimeScope::Room(id.clone());
        let subscription = self.link.channel().map(|channel| {
            channel.subscribe(ROOM_EVENTS, move |event| {
                let _ = realtime_tx.send((scope.clone(), event.clone()));
            })
        });
        for event in self.room.enter(&id, subscription) {
            self.link.emit(event);
        }
        log::info!("Opened conversation {id}");

        let api = self.api.clone();
        let retry = NetworkCommand::OpenConversation(conversation);
        self.spawn_request(
            "Failed to load chat. Please try again.",
            Some(retry),
            {
                let id = id.clone();
                async move { api.messages(&id).await }
            },
            move |messages| NetworkEvent::HistoryLoaded {
                conversation_id: id,
                messages,
            },
        );
    }

    fn leave_room(&mut self) {
        if let Some(stop) = self.typing.cancel() {
            self.link.emit(stop);
        }
        if let Some(leave) = self.room.leave() {
            log::info!("Left conversation {}", room_id(&leave));
            self.link.emit(leave);
        }
    }

    /// Run a REST call off the loop and report either its result or a banner.
    fn spawn_request<T, Fut, F>(
        &self,
        fallback: &'static str,
        retry: Option<NetworkCommand>,
        request: Fut,
        on_success: F,
    ) where
        T: Send + 'static,
        Fut: Future<Output = ClientResult<T>> + Send + 'static,
        F: FnOnce(T) -> NetworkEvent + Send + 'static,
    {
        let events = self.event_sender.clone();
        tokio::spawn(async move {
            let event = match request.await {
                Ok(value) => on_success(value),
                Err(err) => {
                    log::warn!("{fallback}: {err}");
                    NetworkEvent::RequestFailed {
                        message: err.user_message(fallback),
                        retry,
                    }
                }
            };
            if events.send(event).await.is_err() {
                log::debug!("UI gone; dropping network event");
            }
        });
    }

    async fn fail(&self, message: String, retry: Option<NetworkCommand>) {
        self.notify(NetworkEvent::RequestFailed { message, retry })
            .await;
    }

    async fn notify(&self, event: NetworkEvent) {
        if let Err(err) = self.event_sender.send(event).await {
            log::warn!("Failed to notify UI: {err}");
        }
    }
}

async fn typing_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn room_id(event: &ClientEvent) -> &str {
    match event {
        ClientEvent::JoinChat(id) | ClientEvent::LeaveChat(id) => id,
        _ => "",
    }
}

fn send_error(err: &ClientError) -> String {
    match err {
        ClientError::Validation(text) => text.clone(),
        other => format!("Failed to send message: {}", other.detail()),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::realtime::testing::StubServer;
    use crate::storage::SessionDatabase;

    fn config(server_url: String) -> AppConfig {
        AppConfig {
            // Nothing listens on the discard port, so REST calls fail fast.
            api_base_url: "http://127.0.0.1:9/api".into(),
            server_url,
            data_dir: "unused".into(),
        }
    }

    fn stored_session(id: &str) -> SessionStore {
        let db = SessionDatabase::in_memory().unwrap();
        let record = serde_json::json!({
            "_id": id, "name": "An", "email": "an@example.com", "token": "tok"
        });
        db.save(&record.to_string()).unwrap();
        SessionStore::restore(db)
    }

    async fn next_event(events: &mut mpsc::Receiver<NetworkEvent>) -> NetworkEvent {
        timeout(Duration::from_secs(10), events.recv())
            .await
            .expect("timed out waiting for network event")
            .expect("network task ended")
    }

    fn spawn_client(
        config: &AppConfig,
        session: SessionStore,
    ) -> (mpsc::Sender<NetworkCommand>, mpsc::Receiver<NetworkEvent>) {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::channel(16);
        let client = ChatClient::new(event_tx, command_rx, config, session).unwrap();
        tokio::spawn(client.run());
        (command_tx, event_rx)
    }

    #[tokio::test]
    async fn anonymous_start_and_rejected_login() {
        let config = config("http://127.0.0.1:9".into());
        let session = SessionStore::restore(SessionDatabase::in_memory().unwrap());
        let (commands, mut events) = spawn_client(&config, session);

        assert!(matches!(next_event(&mut events).await, NetworkEvent::SessionChanged(None)));

        commands
            .send(NetworkCommand::Login {
                email: "not-an-email".into(),
                password: "secret".into(),
            })
            .await
            .unwrap();
        match next_event(&mut events).await {
            NetworkEvent::RequestFailed { message, retry } => {
                assert_eq!(message, "Please enter a valid email address");
                assert!(retry.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn directory_failure_offers_retry() {
        let config = config("http://127.0.0.1:9".into());
        let (commands, mut events) = spawn_client(&config, stored_session("u1"));

        match next_event(&mut events).await {
            NetworkEvent::SessionChanged(Some(profile)) => assert_eq!(profile.id, "u1"),
            other => panic!("unexpected {other:?}"),
        }

        commands.send(NetworkCommand::LoadDirectory).await.unwrap();
        match next_event(&mut events).await {
            NetworkEvent::RequestFailed { message, retry } => {
                assert_eq!(message, "Failed to load data. Please try again.");
                assert!(matches!(retry, Some(NetworkCommand::LoadDirectory)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn room_events_arrive_while_history_is_still_loading() {
        let server = StubServer::start().await;
        let accepted = server.spawn_accept();
        let config = config(format!("http://{}", server.url().authority()));
        let (commands, mut events) = spawn_client(&config, stored_session("u1"));

        let mut peer = accepted.await.unwrap();
        peer.recv_text().await; // setup
        assert!(matches!(next_event(&mut events).await, NetworkEvent::SessionChanged(Some(_))));

        let conversation: Conversation =
            serde_json::from_value(serde_json::json!({ "_id": "c1", "isGroupChat": false }))
                .unwrap();
        commands
            .send(NetworkCommand::OpenConversation(conversation))
            .await
            .unwrap();
        assert_eq!(peer.recv_text().await, r#"42["join chat","c1"]"#);
        peer.send_text(
            r#"42["message received",{"_id":"m1","chat":"c1","sender":{"_id":"u2","name":"Binh"},"content":"hi","createdAt":"2024-05-01T10:00:00Z"}]"#,
        )
        .await;

        let mut forwarded = false;
        let mut history_failed = false;
        while !(forwarded && history_failed) {
            match next_event(&mut events).await {
                NetworkEvent::Realtime {
                    scope: RealtimeScope::Room(id),
                    event: ServerEvent::MessageReceived(message),
                } => {
                    assert_eq!(id, "c1");
                    assert_eq!(message.id, "m1");
                    forwarded = true;
                }
                NetworkEvent::Realtime {
                    scope: RealtimeScope::Directory,
                    ..
                } => {}
                NetworkEvent::RequestFailed { message, retry } => {
                    assert_eq!(message, "Failed to load chat. Please try again.");
                    assert!(matches!(retry, Some(NetworkCommand::OpenConversation(_))));
                    history_failed = true;
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn room_lifecycle_and_logout_on_the_wire() {
        let server = StubServer::start().await;
        let accepted = server.spawn_accept();
        let config = config(format!("http://{}", server.url().authority()));
        let (commands, mut events) = spawn_client(&config, stored_session("u1"));

        let mut peer = accepted.await.unwrap();
        assert!(peer.recv_text().await.starts_with(r#"42["setup""#));
        assert!(matches!(next_event(&mut events).await, NetworkEvent::SessionChanged(Some(_))));

        let conversation: Conversation =
            serde_json::from_value(serde_json::json!({ "_id": "c1", "isGroupChat": false }))
                .unwrap();
        commands
            .send(NetworkCommand::OpenConversation(conversation))
            .await
            .unwrap();
        assert_eq!(peer.recv_text().await, r#"42["join chat","c1"]"#);

        commands.send(NetworkCommand::Keystroke).await.unwrap();
        commands.send(NetworkCommand::Keystroke).await.unwrap();
        assert_eq!(
            peer.recv_text().await,
            r#"42["typing",{"chatId":"c1","userName":"An"}]"#
        );

        // Room handlers forward inbound events scoped to the room.
        peer.send_text(r#"42["stop typing",{"userId":"u2"}]"#).await;
        loop {
            match next_event(&mut events).await {
                NetworkEvent::Realtime {
                    scope: RealtimeScope::Room(id),
                    event: ServerEvent::StopTyping(signal),
                } => {
                    assert_eq!(id, "c1");
                    assert_eq!(signal.user_id, "u2");
                    break;
                }
                // The history fetch fails against the dead REST endpoint.
                NetworkEvent::RequestFailed { .. } => continue,
                other => panic!("unexpected {other:?}"),
            }
        }

        commands.send(NetworkCommand::Logout).await.unwrap();
        assert_eq!(
            peer.recv_text().await,
            r#"42["stop typing",{"chatId":"c1","userName":"An"}]"#
        );
        assert_eq!(peer.recv_text().await, r#"42["leave chat","c1"]"#);
        assert!(peer.saw_disconnect().await);
        loop {
            match next_event(&mut events).await {
                NetworkEvent::SessionChanged(None) => break,
                NetworkEvent::RequestFailed { .. } => continue,
                other => panic!("unexpected {other:?}"),
            }
        }
    }
}

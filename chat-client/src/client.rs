//! ChatClient - the main interface for parley.
//!
//! This module provides [`ChatClient`], the primary API for applications:
//! it owns the dialog store, feeds it from the connection, and is the
//! outbound command path for user actions.
//!
//! # Architecture
//!
//! ```text
//! Application → ChatClient → Frame Codec → ConnectionManager → Network
//! Network → ConnectionManager → Frame Codec → dispatch → ChatState → subscribers
//! ```
//!
//! # Example
//!
//! ```ignore
//! use parley_chat_client::{ChatClient, ClientConfig, WsTransport};
//!
//! let config = ClientConfig::new("wss://chat.example.com/ws", "u-42").with_session("s-1");
//! let client = ChatClient::new(config, WsTransport::new());
//!
//! client.connect();
//! client.send_text(&dialog_id, "hello").await?;
//! let mut events = client.subscribe();
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::BoxFuture;
use parley_chat_core::{chunk_text, dispatch, ChatState, ConnectionEvent, ConnectionState, Effect, MAX_CHUNK_CHARS};
use parley_chat_types::{
    decode, encode, Dialog, DialogId, FileAttachment, FrameError, Message, MessageId,
    OutboundCommand, Session, SessionId,
};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::config::ClientConfig;
use crate::connection::{ConnectionManager, Delivery, FrameHandler, HandlerFlow, OnOpen};
use crate::transport::Transport;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Frame could not be encoded.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The dialog is not in the local store.
    #[error("unknown dialog: {0}")]
    UnknownDialog(DialogId),
}

/// Events published to UI subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A dialog was created or changed.
    DialogChanged(DialogId),
    /// A dialog was removed.
    DialogRemoved(DialogId),
    /// A session disappeared from the session list.
    SessionRemoved(SessionId),
    /// A system notification should be shown.
    Notification {
        /// Dialog the message arrived in.
        dialog_id: DialogId,
        /// The new message.
        message_id: MessageId,
        /// Whether to play a sound.
        sound: bool,
    },
    /// The session was ended by the server. All state is gone and the
    /// connection is closed; the application must start over.
    ForcedLogout {
        /// Why the session ended.
        reason: String,
    },
}

impl From<Effect> for ClientEvent {
    fn from(effect: Effect) -> Self {
        match effect {
            Effect::Notify {
                dialog_id,
                message_id,
                sound,
            } => ClientEvent::Notification {
                dialog_id,
                message_id,
                sound,
            },
            Effect::DialogChanged(id) => ClientEvent::DialogChanged(id),
            Effect::DialogRemoved(id) => ClientEvent::DialogRemoved(id),
            Effect::SessionRemoved(id) => ClientEvent::SessionRemoved(id),
            Effect::ForceLogout { reason } => ClientEvent::ForcedLogout { reason },
        }
    }
}

/// The main chat client.
///
/// Owns the dialog store and the connection. Outbound commands are sent
/// only while the socket is open; otherwise they are dropped and reported
/// as [`Delivery::Dropped`].
pub struct ChatClient<T: Transport> {
    connection: ConnectionManager<T>,
    state: Arc<Mutex<ChatState>>,
    events: broadcast::Sender<ClientEvent>,
}

impl<T: Transport + 'static> ChatClient<T> {
    /// Create a new ChatClient. Nothing is opened until [`connect`](Self::connect).
    pub fn new(config: ClientConfig, transport: T) -> Self {
        let state = Arc::new(Mutex::new(
            ChatState::new(config.user_id.clone(), config.session_id.clone())
                .with_notifications(config.notifications),
        ));
        let (events, _) = broadcast::channel(256);

        let handler: FrameHandler = {
            let state = Arc::clone(&state);
            let events = events.clone();
            Arc::new(move |frame: &str| handle_frame(&state, &events, frame))
        };

        let connection = ConnectionManager::new(
            transport,
            &config.server_url,
            config.reconnect_policy(),
            config.presence_delay(),
            handler,
        );

        Self {
            connection,
            state,
            events,
        }
    }

    // ===========================================
    // Connection
    // ===========================================

    /// Open the connection. Presence is announced on every (re)connect.
    ///
    /// Returns `false` if a connection is already open or in progress.
    pub fn connect(&self) -> bool {
        let connection = self.connection.clone();
        let on_open: OnOpen = Arc::new(move || -> BoxFuture<'static, ()> {
            let connection = connection.clone();
            Box::pin(async move {
                match encode(&OutboundCommand::online_status(true)) {
                    Ok(frame) => {
                        connection.send(&frame).await;
                    }
                    Err(e) => tracing::warn!("Failed to encode presence: {}", e),
                }
            })
        });
        self.connection.connect(Some(on_open))
    }

    /// Close the connection and suppress any pending reconnect.
    pub async fn shutdown(&self) {
        self.connection.disconnect().await;
    }

    /// Check if the socket is open.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Subscribe to connection lifecycle events.
    pub fn connection_events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.connection.subscribe()
    }

    /// Subscribe to store changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    // ===========================================
    // Outbound commands
    // ===========================================

    /// Send a text message, split into several messages if it is too long.
    ///
    /// Returns one delivery per chunk; blank text sends nothing.
    pub async fn send_text(
        &self,
        dialog_id: &DialogId,
        text: &str,
    ) -> Result<Vec<Delivery>, ClientError> {
        let chunks = chunk_text(text, MAX_CHUNK_CHARS);
        if chunks.len() > 1 {
            tracing::debug!("Splitting message for {} into {} chunks", dialog_id, chunks.len());
        }

        let mut deliveries = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let command = OutboundCommand::send_text(dialog_id.clone(), chunk);
            deliveries.push(self.send_command(&command).await?);
        }
        Ok(deliveries)
    }

    /// Send a file message.
    pub async fn send_file(
        &self,
        dialog_id: &DialogId,
        file: FileAttachment,
    ) -> Result<Delivery, ClientError> {
        self.send_command(&OutboundCommand::send_file(dialog_id.clone(), file))
            .await
    }

    /// Signal that the local user started or stopped typing.
    pub async fn typing(&self, dialog_id: &DialogId, is_typing: bool) -> Result<Delivery, ClientError> {
        self.lock_state().set_local_typing(dialog_id, is_typing);
        self.send_command(&OutboundCommand::typing(dialog_id.clone(), is_typing))
            .await
    }

    /// Report that a message was read. The store changes when the server
    /// echoes the receipt.
    pub async fn read_message(
        &self,
        dialog_id: &DialogId,
        message_id: &MessageId,
    ) -> Result<Delivery, ClientError> {
        let command = OutboundCommand::read_message(dialog_id.clone(), message_id.clone());
        self.send_command(&command).await
    }

    /// Terminate one of the local user's sessions.
    pub async fn destroy_session(&self, session_id: &SessionId) -> Result<Delivery, ClientError> {
        self.send_command(&OutboundCommand::destroy_session(session_id.clone()))
            .await
    }

    /// Announce the local user's presence.
    pub async fn toggle_online_status(&self, is_online: bool) -> Result<Delivery, ClientError> {
        self.send_command(&OutboundCommand::online_status(is_online))
            .await
    }

    async fn send_command(&self, command: &OutboundCommand) -> Result<Delivery, ClientError> {
        let frame = encode(command)?;
        let delivery = self.connection.send(&frame).await;
        if !delivery.is_sent() {
            tracing::debug!("{} dropped", command.kind());
        }
        Ok(delivery)
    }

    // ===========================================
    // Active dialog
    // ===========================================

    /// Make `dialog_id` the active dialog.
    ///
    /// If the local user was typing in another dialog, `UNTYPING` is sent
    /// for it first.
    pub async fn open_dialog(&self, dialog_id: &DialogId) -> Result<(), ClientError> {
        let stale = {
            let state = self.lock_state();
            if state.dialog(dialog_id).is_none() {
                return Err(ClientError::UnknownDialog(dialog_id.clone()));
            }
            state.stale_typing(Some(dialog_id))
        };
        if let Some(previous) = stale {
            self.typing(&previous, false).await?;
        }

        self.lock_state().set_active_dialog(dialog_id);
        Ok(())
    }

    /// Clear the active dialog, ending any local typing first.
    pub async fn close_dialog(&self) -> Result<(), ClientError> {
        let stale = self.lock_state().stale_typing(None);
        if let Some(previous) = stale {
            self.typing(&previous, false).await?;
        }
        self.lock_state().clear_active_dialog();
        Ok(())
    }

    // ===========================================
    // REST results
    // ===========================================

    /// Replace the dialog collection with a bulk fetch result.
    pub fn load_dialogs(&self, dialogs: Vec<Dialog>) {
        let ids: Vec<DialogId> = dialogs.iter().map(|d| d.id.clone()).collect();
        self.lock_state().load_dialogs(dialogs);
        for id in ids {
            self.publish(ClientEvent::DialogChanged(id));
        }
    }

    /// Insert or replace one dialog (e.g. a newly created one).
    pub fn upsert_dialog(&self, dialog: Dialog) {
        let id = dialog.id.clone();
        self.lock_state().upsert_dialog(dialog);
        self.publish(ClientEvent::DialogChanged(id));
    }

    /// Prepend an older page of history. Returns how many messages were new.
    pub fn prepend_history(&self, dialog_id: &DialogId, page: Vec<Message>) -> usize {
        let added = self.lock_state().prepend_history(dialog_id, page);
        if added > 0 {
            self.publish(ClientEvent::DialogChanged(dialog_id.clone()));
        }
        added
    }

    /// Remove a dialog after the server confirmed its deletion.
    pub fn remove_dialog(&self, dialog_id: &DialogId) -> Option<Dialog> {
        let removed = self.lock_state().remove_dialog(dialog_id);
        if removed.is_some() {
            self.publish(ClientEvent::DialogRemoved(dialog_id.clone()));
        }
        removed
    }

    /// Replace the session list.
    pub fn set_sessions(&self, sessions: Vec<Session>) {
        self.lock_state().set_sessions(sessions);
    }

    // ===========================================
    // Queries
    // ===========================================

    /// Run `f` against the store.
    pub fn with_state<R>(&self, f: impl FnOnce(&ChatState) -> R) -> R {
        f(&self.lock_state())
    }

    /// A copy of one dialog.
    pub fn dialog(&self, dialog_id: &DialogId) -> Option<Dialog> {
        self.lock_state().dialog(dialog_id).cloned()
    }

    /// A copy of the active dialog.
    pub fn active_dialog(&self) -> Option<Dialog> {
        self.lock_state().active_dialog().cloned()
    }

    /// Dialogs in presentation order.
    pub fn sorted_dialogs(&self) -> Vec<Dialog> {
        self.lock_state()
            .sorted_dialogs()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Unread messages across all dialogs.
    pub fn total_unread(&self) -> u32 {
        self.lock_state().total_unread()
    }

    /// Get the underlying transport (for testing).
    pub fn transport(&self) -> &T {
        self.connection.transport()
    }

    fn lock_state(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: ClientEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Decode, dispatch and publish one inbound frame.
fn handle_frame(
    state: &Mutex<ChatState>,
    events: &broadcast::Sender<ClientEvent>,
    frame: &str,
) -> HandlerFlow {
    let Some(event) = decode(frame) else {
        return HandlerFlow::Continue;
    };

    let effects = {
        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
        dispatch(&mut state, event)
    };

    let mut flow = HandlerFlow::Continue;
    for effect in effects {
        if matches!(effect, Effect::ForceLogout { .. }) {
            flow = HandlerFlow::Stop;
        }
        let _ = events.send(ClientEvent::from(effect));
    }
    flow
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use parley_chat_core::ReconnectPolicy;
    use parley_chat_types::Counterpart;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn test_config() -> ClientConfig {
        let policy = ReconnectPolicy {
            base_delay: Duration::from_millis(10),
            max_jitter: Duration::ZERO,
            ..ReconnectPolicy::default()
        };
        ClientConfig::new("ws://chat.test/ws", "u-me")
            .with_session("s-me")
            .with_presence_delay(Duration::from_millis(20))
            .with_reconnect_policy(&policy)
    }

    fn client() -> (ChatClient<MockTransport>, MockTransport) {
        let transport = MockTransport::new();
        (ChatClient::new(test_config(), transport.clone()), transport)
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..400 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    async fn connected() -> (ChatClient<MockTransport>, MockTransport) {
        let (client, transport) = client();
        assert!(client.connect());
        wait_until(|| client.is_connected()).await;
        (client, transport)
    }

    fn sent(transport: &MockTransport) -> Vec<Value> {
        transport
            .sent_frames()
            .iter()
            .map(|f| serde_json::from_str(f).unwrap())
            .collect()
    }

    fn sent_of_kind(transport: &MockTransport, kind: &str) -> Vec<Value> {
        sent(transport)
            .into_iter()
            .filter(|f| f["type"] == kind)
            .collect()
    }

    fn receive_frame(dialog: &str, counterpart: &str, id: &str, sender: &str) -> String {
        json!({
            "type": "RECEIVE_MESSAGE",
            "message": {"id": id, "sender": {"id": sender}, "text": "hi", "sentAt": 1},
            "dialog": {
                "id": dialog,
                "counterpart": {"id": counterpart, "firstName": "Bob", "lastName": "Stone"}
            }
        })
        .to_string()
    }

    fn did(id: &str) -> DialogId {
        DialogId::new(id)
    }

    // ===========================================
    // Connection Tests
    // ===========================================

    #[tokio::test]
    async fn connect_announces_presence_twice() {
        let (_client, transport) = connected().await;

        wait_until(|| sent_of_kind(&transport, "TOGGLE_ONLINE_STATUS").len() == 2).await;
        assert_eq!(
            sent(&transport)[0],
            json!({"type": "TOGGLE_ONLINE_STATUS", "isOnline": true})
        );
    }

    #[tokio::test]
    async fn second_connect_is_ignored() {
        let (client, transport) = connected().await;
        assert!(!client.connect());
        assert_eq!(transport.connect_count(), 1);
    }

    #[tokio::test]
    async fn reconnect_keeps_dialogs() {
        let (client, transport) = connected().await;
        let mut lifecycle = client.connection_events();
        transport.push_frame(receive_frame("d-1", "u-bob", "m-1", "u-bob"));
        wait_until(|| client.dialog(&did("d-1")).is_some()).await;

        transport.drop_connection();

        // Skip the Opened of the first socket if it was not yet published
        while !matches!(lifecycle.recv().await.unwrap(), ConnectionEvent::Lost { .. }) {}
        assert_eq!(lifecycle.recv().await.unwrap(), ConnectionEvent::Opened);
        assert_eq!(transport.connect_count(), 2);
        let dialog = client.dialog(&did("d-1")).unwrap();
        assert_eq!(dialog.messages.len(), 1);
        assert_eq!(dialog.unread_count, 1);
    }

    #[tokio::test]
    async fn shutdown_stops_reconnecting() {
        let (client, transport) = connected().await;
        client.shutdown().await;

        assert!(!client.is_connected());
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.connect_count(), 1);
    }

    // ===========================================
    // Inbound Tests
    // ===========================================

    #[tokio::test]
    async fn inbound_message_creates_dialog_and_notifies() {
        let (client, transport) = connected().await;
        let mut events = client.subscribe();

        transport.push_frame(receive_frame("d-1", "u-bob", "m-1", "u-bob"));

        assert_eq!(events.recv().await.unwrap(), ClientEvent::DialogChanged(did("d-1")));
        assert_eq!(
            events.recv().await.unwrap(),
            ClientEvent::Notification {
                dialog_id: did("d-1"),
                message_id: MessageId::new("m-1"),
                sound: true,
            }
        );
        assert_eq!(client.total_unread(), 1);
    }

    #[tokio::test]
    async fn garbage_frames_are_ignored() {
        let (client, transport) = connected().await;

        transport.push_frame("{not json");
        transport.push_frame(r#"{"type": "SUBSCRIBE"}"#);
        transport.push_frame(receive_frame("d-1", "u-bob", "m-1", "u-bob"));

        wait_until(|| client.dialog(&did("d-1")).is_some()).await;
        assert!(client.is_connected());
        assert_eq!(transport.connect_count(), 1);
    }

    #[tokio::test]
    async fn forced_logout_clears_state_and_disconnects() {
        let (client, transport) = connected().await;
        let mut events = client.subscribe();
        transport.push_frame(receive_frame("d-1", "u-bob", "m-1", "u-bob"));
        transport.push_frame(
            json!({"type": "USER_LOGOUT", "sessionId": "s-me", "success": false}).to_string(),
        );

        let reason = loop {
            if let ClientEvent::ForcedLogout { reason } = events.recv().await.unwrap() {
                break reason;
            }
        };
        assert!(reason.contains("s-me"));

        wait_until(|| client.connection_state() == ConnectionState::Disconnected).await;
        assert!(client.with_state(|s| s.dialogs().is_empty()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.connect_count(), 1);
    }

    // ===========================================
    // Outbound Tests
    // ===========================================

    #[tokio::test]
    async fn long_text_is_sent_as_ordered_chunks() {
        let (client, transport) = connected().await;
        let text = (0..400).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ");

        let deliveries = client.send_text(&did("d-1"), &text).await.unwrap();

        let frames = sent_of_kind(&transport, "SEND_MESSAGE");
        assert!(frames.len() > 1);
        assert_eq!(deliveries.len(), frames.len());
        assert!(deliveries.iter().all(Delivery::is_sent));
        let rejoined: Vec<&str> = frames.iter().map(|f| f["text"].as_str().unwrap()).collect();
        assert_eq!(rejoined.join(" "), text);
        assert!(frames.iter().all(|f| f["dialogId"] == "d-1"));
    }

    #[tokio::test]
    async fn blank_text_sends_nothing() {
        let (client, transport) = connected().await;
        let deliveries = client.send_text(&did("d-1"), "   ").await.unwrap();

        assert!(deliveries.is_empty());
        assert!(sent_of_kind(&transport, "SEND_MESSAGE").is_empty());
    }

    #[tokio::test]
    async fn commands_without_connection_are_dropped() {
        let (client, transport) = client();

        let deliveries = client.send_text(&did("d-1"), "hello").await.unwrap();
        assert_eq!(deliveries, vec![Delivery::Dropped]);
        assert_eq!(
            client.toggle_online_status(false).await.unwrap(),
            Delivery::Dropped
        );
        assert!(transport.sent_frames().is_empty());
    }

    #[tokio::test]
    async fn outbound_command_shapes() {
        let (client, transport) = connected().await;
        let file = FileAttachment::from_bytes("a.png", "image/png", b"png");

        client.send_file(&did("d-1"), file).await.unwrap();
        client.read_message(&did("d-1"), &MessageId::new("m-1")).await.unwrap();
        client.destroy_session(&SessionId::new("s-2")).await.unwrap();
        client.toggle_online_status(false).await.unwrap();

        let frames = sent(&transport);
        let tail = &frames[frames.len() - 4..];
        assert_eq!(tail[0]["type"], "SEND_MESSAGE");
        assert_eq!(tail[0]["file"]["name"], "a.png");
        assert_eq!(tail[1], json!({"type": "READ_MESSAGE", "dialogId": "d-1", "messageId": "m-1"}));
        assert_eq!(tail[2], json!({"type": "DESTROY_SESSION", "sessionId": "s-2"}));
        assert_eq!(tail[3], json!({"type": "TOGGLE_ONLINE_STATUS", "isOnline": false}));
    }

    // ===========================================
    // Active Dialog Tests
    // ===========================================

    #[tokio::test]
    async fn switching_dialog_sends_untyping_first() {
        let (client, transport) = connected().await;
        client.upsert_dialog(Dialog::new("d-1", Counterpart::new("u-bob", "Bob", "")));
        client.upsert_dialog(Dialog::new("d-2", Counterpart::new("u-ann", "Ann", "")));

        client.open_dialog(&did("d-1")).await.unwrap();
        client.typing(&did("d-1"), true).await.unwrap();
        client.open_dialog(&did("d-2")).await.unwrap();

        assert_eq!(
            sent(&transport).last().unwrap(),
            &json!({"type": "UNTYPING", "dialogId": "d-1"})
        );
        assert_eq!(client.active_dialog().unwrap().id, did("d-2"));
        assert!(client.with_state(|s| s.local_typing().is_none()));
    }

    #[tokio::test]
    async fn switching_without_typing_sends_nothing() {
        let (client, transport) = connected().await;
        client.upsert_dialog(Dialog::new("d-1", Counterpart::new("u-bob", "Bob", "")));
        client.upsert_dialog(Dialog::new("d-2", Counterpart::new("u-ann", "Ann", "")));
        let before = transport.sent_frames().len();

        client.open_dialog(&did("d-1")).await.unwrap();
        client.open_dialog(&did("d-2")).await.unwrap();

        assert!(sent_of_kind(&transport, "UNTYPING").is_empty());
        assert!(transport.sent_frames().len() <= before + 1);
    }

    #[tokio::test]
    async fn open_unknown_dialog_fails() {
        let (client, _) = client();
        let result = client.open_dialog(&did("d-404")).await;
        assert!(matches!(result, Err(ClientError::UnknownDialog(_))));
    }

    #[tokio::test]
    async fn close_dialog_ends_typing() {
        let (client, transport) = connected().await;
        client.upsert_dialog(Dialog::new("d-1", Counterpart::new("u-bob", "Bob", "")));
        client.open_dialog(&did("d-1")).await.unwrap();
        client.typing(&did("d-1"), true).await.unwrap();

        client.close_dialog().await.unwrap();

        assert_eq!(sent_of_kind(&transport, "UNTYPING").len(), 1);
        assert!(client.active_dialog().is_none());
    }

    // ===========================================
    // REST Boundary Tests
    // ===========================================

    #[tokio::test]
    async fn history_and_removal_publish_events() {
        let (client, _) = client();
        let mut events = client.subscribe();
        client.load_dialogs(vec![Dialog::new(
            "d-1",
            Counterpart::new("u-bob", "Bob", ""),
        )]);
        assert_eq!(events.recv().await.unwrap(), ClientEvent::DialogChanged(did("d-1")));

        let added = client.prepend_history(&did("d-1"), vec![Message::text("m-0", "u-bob", "old", 0)]);
        assert_eq!(added, 1);
        assert_eq!(events.recv().await.unwrap(), ClientEvent::DialogChanged(did("d-1")));
        assert_eq!(client.total_unread(), 1);

        assert!(client.remove_dialog(&did("d-1")).is_some());
        assert_eq!(events.recv().await.unwrap(), ClientEvent::DialogRemoved(did("d-1")));
        assert!(client.sorted_dialogs().is_empty());
    }
}

//! Per-connection protocol state
//!
//! A `Connection` is created when a socket is accepted and gets its
//! participant id right away. It joins at most one room during its lifetime:
//!
//! ```text
//! Open ──join──▶ Joined ──close──▶ Closed
//!   └───────────────close──────────────┘
//! ```
//!
//! Room updates sent before a successful join are ignored. Leaving happens in
//! `close`, which is safe to call more than once.

use std::sync::Arc;

use super::broadcast::BroadcastRouter;
use super::messages::{ClientMessage, ServerMessage};
use crate::session::{
    generate_participant_id, MessageSink, ParticipantId, SessionId, SessionRegistry,
    ANONYMOUS,
};

/// Where a connection is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, not in a room yet
    Open,
    /// Member of a room
    Joined { room_id: SessionId, username: String },
    /// Left; no further frames are processed
    Closed,
}

/// Protocol handler for one client connection
pub struct Connection {
    id: ParticipantId,
    state: ConnectionState,
    sink: Arc<dyn MessageSink>,
    registry: Arc<SessionRegistry>,
    router: BroadcastRouter,
}

impl Connection {
    pub fn new(registry: Arc<SessionRegistry>, sink: Arc<dyn MessageSink>) -> Self {
        Self {
            id: generate_participant_id(),
            state: ConnectionState::Open,
            sink,
            router: BroadcastRouter::new(Arc::clone(&registry)),
            registry,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Handle one inbound text frame
    pub async fn handle_text(&mut self, text: &str) {
        if self.state == ConnectionState::Closed {
            return;
        }

        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.handle_message(message).await,
            Err(e) => {
                tracing::debug!(
                    participant_id = %self.id,
                    error = %e,
                    "Invalid client message"
                );
                self.reply(&ServerMessage::error("Invalid message format"));
            }
        }
    }

    /// Dispatch a decoded client message
    pub async fn handle_message(&mut self, message: ClientMessage) {
        match message {
            ClientMessage::Join { room_id, username } => self.join(&room_id, username).await,
            ClientMessage::CodeChange { code } => {
                let Some((room_id, _)) = self.membership() else {
                    return;
                };
                self.registry.update_text(&room_id, code.as_str()).await;
                let event = ServerMessage::CodeChange {
                    code,
                    user_id: self.id.clone(),
                };
                self.router.broadcast(&room_id, &event, Some(self.id.as_str())).await;
            }
            ClientMessage::LanguageChange { language } => {
                let Some((room_id, _)) = self.membership() else {
                    return;
                };
                self.registry.update_language(&room_id, language.as_str()).await;
                let event = ServerMessage::LanguageChange {
                    language,
                    user_id: self.id.clone(),
                };
                // Sender included, so every editor switches together
                self.router.broadcast(&room_id, &event, None).await;
            }
            ClientMessage::CursorPosition { line, ch } => {
                let Some((room_id, username)) = self.membership() else {
                    return;
                };
                let event = ServerMessage::CursorPosition {
                    user_id: self.id.clone(),
                    username,
                    line,
                    ch,
                };
                self.router.broadcast(&room_id, &event, Some(self.id.as_str())).await;
            }
        }
    }

    /// Leave the current room, if any, and stop processing frames
    pub async fn close(&mut self) {
        let previous = std::mem::replace(&mut self.state, ConnectionState::Closed);
        let ConnectionState::Joined { room_id, username } = previous else {
            return;
        };

        if self
            .registry
            .remove_participant(&room_id, &self.id)
            .await
            .is_none()
        {
            // Room was reaped underneath us; nobody left to notify
            return;
        }

        let event = ServerMessage::UserLeft {
            user_id: self.id.clone(),
            username,
            users: self.registry.list_participants(&room_id).await,
        };
        self.router.broadcast(&room_id, &event, None).await;
    }

    async fn join(&mut self, room_id: &str, username: Option<String>) {
        if self.state != ConnectionState::Open {
            self.reply(&ServerMessage::error("Already joined a room"));
            return;
        }

        let room_id = room_id.trim();
        if room_id.is_empty() {
            self.reply(&ServerMessage::error("Room id is required"));
            return;
        }

        let username = username
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| ANONYMOUS.to_string());

        let room = self
            .registry
            .join_session(room_id, &self.id, Arc::clone(&self.sink), &username)
            .await;

        self.state = ConnectionState::Joined {
            room_id: room.id.clone(),
            username: username.clone(),
        };

        self.reply(&ServerMessage::Joined {
            user_id: self.id.clone(),
            room_id: room.id.clone(),
            code: room.code,
            language: room.language,
            users: room.users.clone(),
        });

        let event = ServerMessage::UserJoined {
            user_id: self.id.clone(),
            username,
            users: room.users,
        };
        self.router.broadcast(&room.id, &event, Some(self.id.as_str())).await;
    }

    fn membership(&self) -> Option<(SessionId, String)> {
        match &self.state {
            ConnectionState::Joined { room_id, username } => {
                Some((room_id.clone(), username.clone()))
            }
            _ => None,
        }
    }

    /// Send a message to this connection only
    pub fn reply(&self, message: &ServerMessage) {
        let frame = match message.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize reply");
                return;
            }
        };
        if let Err(e) = self.sink.send_frame(frame) {
            tracing::debug!(participant_id = %self.id, error = %e, "Failed to send reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Frame, RegistryConfig};
    use serde_json::Value;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Client {
        conn: Connection,
        rx: mpsc::UnboundedReceiver<Frame>,
    }

    impl Client {
        fn new(registry: &Arc<SessionRegistry>) -> Self {
            let (tx, rx) = mpsc::unbounded_channel::<Frame>();
            Self {
                conn: Connection::new(Arc::clone(registry), Arc::new(tx)),
                rx,
            }
        }

        async fn send(&mut self, json: &str) {
            self.conn.handle_text(json).await;
        }

        fn next(&mut self) -> Value {
            let frame = self.rx.try_recv().expect("expected a frame");
            serde_json::from_str(&frame).unwrap()
        }

        fn assert_silent(&mut self) {
            assert!(self.rx.try_recv().is_err(), "unexpected frame");
        }
    }

    fn registry() -> Arc<SessionRegistry> {
        Arc::new(SessionRegistry::new(RegistryConfig {
            grace_period: Duration::from_secs(60),
            ..Default::default()
        }))
    }

    fn join(room: &str, name: &str) -> String {
        format!(
            r#"{{"type":"join","data":{{"roomId":"{}","username":"{}"}}}}"#,
            room, name
        )
    }

    #[tokio::test]
    async fn test_join_creates_room_and_replies() {
        let registry = registry();
        let mut alice = Client::new(&registry);

        alice.send(&join("r1", "Alice")).await;

        let joined = alice.next();
        assert_eq!(joined["type"], "joined");
        assert_eq!(joined["data"]["roomId"], "r1");
        assert_eq!(joined["data"]["userId"], alice.conn.id());
        assert_eq!(joined["data"]["language"], "javascript");
        assert_eq!(joined["data"]["users"][0]["username"], "Alice");
        assert!(matches!(alice.conn.state(), ConnectionState::Joined { .. }));
        assert!(registry.get_session("r1").await.is_some());
    }

    #[tokio::test]
    async fn test_join_notifies_others_not_self() {
        let registry = registry();
        let mut alice = Client::new(&registry);
        let mut bob = Client::new(&registry);

        alice.send(&join("r1", "Alice")).await;
        alice.next();
        bob.send(&join("r1", "Bob")).await;

        let joined = bob.next();
        assert_eq!(joined["data"]["users"].as_array().unwrap().len(), 2);
        bob.assert_silent();

        let event = alice.next();
        assert_eq!(event["type"], "user-joined");
        assert_eq!(event["data"]["userId"], bob.conn.id());
        assert_eq!(event["data"]["username"], "Bob");
        assert_eq!(event["data"]["users"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_join_defaults_to_anonymous() {
        let registry = registry();
        let mut client = Client::new(&registry);

        client.send(r#"{"type":"join","data":{"roomId":"r1"}}"#).await;
        let joined = client.next();
        assert_eq!(joined["data"]["users"][0]["username"], "Anonymous");
    }

    #[tokio::test]
    async fn test_second_join_rejected() {
        let registry = registry();
        let mut client = Client::new(&registry);

        client.send(&join("r1", "Alice")).await;
        client.next();
        client.send(&join("r2", "Alice")).await;

        let reply = client.next();
        assert_eq!(reply["type"], "error");
        assert!(registry.get_session("r2").await.is_none());
    }

    #[tokio::test]
    async fn test_blank_room_id_rejected() {
        let registry = registry();
        let mut client = Client::new(&registry);

        client.send(&join("  ", "Alice")).await;
        assert_eq!(client.next()["type"], "error");
        assert_eq!(client.conn.state(), &ConnectionState::Open);
        assert_eq!(registry.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_malformed_frames_get_error_and_stay_open() {
        let registry = registry();
        let mut client = Client::new(&registry);

        for bad in [
            "not json",
            r#"{"type":"teleport","data":{}}"#,
            r#"{"type":"cursor-position","data":{"line":"three"}}"#,
        ] {
            client.send(bad).await;
            let reply = client.next();
            assert_eq!(reply["type"], "error");
            assert_eq!(reply["data"]["message"], "Invalid message format");
        }

        client.send(&join("r1", "Alice")).await;
        assert_eq!(client.next()["type"], "joined");
    }

    #[tokio::test]
    async fn test_updates_before_join_are_ignored() {
        let registry = registry();
        let mut client = Client::new(&registry);

        client.send(r#"{"type":"code-change","data":{"code":"x"}}"#).await;
        client.send(r#"{"type":"language-change","data":{"language":"go"}}"#).await;
        client.send(r#"{"type":"cursor-position","data":{"line":1,"ch":2}}"#).await;

        client.assert_silent();
        assert_eq!(registry.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_pair_session_scenario() {
        let registry = registry();
        registry.create_session("r1").await.unwrap();
        let mut alice = Client::new(&registry);
        let mut bob = Client::new(&registry);

        alice.send(&join("r1", "Alice")).await;
        bob.send(&join("r1", "Bob")).await;
        alice.next(); // joined
        alice.next(); // user-joined
        bob.next(); // joined

        alice
            .send(r#"{"type":"code-change","data":{"code":"x=1"}}"#)
            .await;

        let change = bob.next();
        assert_eq!(change["type"], "code-change");
        assert_eq!(change["data"]["code"], "x=1");
        assert_eq!(change["data"]["userId"], alice.conn.id());
        alice.assert_silent();
        assert_eq!(registry.get_session("r1").await.unwrap().code, "x=1");

        alice.conn.close().await;

        let left = bob.next();
        assert_eq!(left["type"], "user-left");
        assert_eq!(left["data"]["userId"], alice.conn.id());
        assert_eq!(left["data"]["username"], "Alice");
        assert_eq!(left["data"]["users"].as_array().unwrap().len(), 1);

        let roster = registry.list_participants("r1").await;
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].id, bob.conn.id());
    }

    #[tokio::test]
    async fn test_language_change_reaches_sender_too() {
        let registry = registry();
        let mut alice = Client::new(&registry);
        let mut bob = Client::new(&registry);
        alice.send(&join("r1", "Alice")).await;
        bob.send(&join("r1", "Bob")).await;
        alice.next();
        alice.next();
        bob.next();

        alice
            .send(r#"{"type":"language-change","data":{"language":"python"}}"#)
            .await;

        for client in [&mut alice, &mut bob] {
            let event = client.next();
            assert_eq!(event["type"], "language-change");
            assert_eq!(event["data"]["language"], "python");
        }
        assert_eq!(registry.get_session("r1").await.unwrap().language, "python");
    }

    #[tokio::test]
    async fn test_cursor_relayed_with_username() {
        let registry = registry();
        let mut alice = Client::new(&registry);
        let mut bob = Client::new(&registry);
        alice.send(&join("r1", "Alice")).await;
        bob.send(&join("r1", "Bob")).await;
        alice.next();
        alice.next();
        bob.next();

        bob.send(r#"{"type":"cursor-position","data":{"line":4,"ch":7}}"#)
            .await;

        let event = alice.next();
        assert_eq!(event["type"], "cursor-position");
        assert_eq!(event["data"]["username"], "Bob");
        assert_eq!(event["data"]["line"], 4);
        assert_eq!(event["data"]["ch"], 7);
        bob.assert_silent();
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let registry = registry();
        let mut alice = Client::new(&registry);
        let mut bob = Client::new(&registry);
        alice.send(&join("r1", "Alice")).await;
        bob.send(&join("r1", "Bob")).await;
        alice.next();
        alice.next();
        bob.next();

        alice.conn.close().await;
        alice.conn.close().await;

        assert_eq!(bob.next()["type"], "user-left");
        bob.assert_silent();
        assert_eq!(alice.conn.state(), &ConnectionState::Closed);

        // Frames after close are dropped
        alice
            .send(r#"{"type":"code-change","data":{"code":"late"}}"#)
            .await;
        bob.assert_silent();
    }

    #[tokio::test]
    async fn test_update_after_room_reaped_is_silent() {
        let registry = registry();
        let mut alice = Client::new(&registry);
        alice.send(&join("r1", "Alice")).await;
        alice.next();

        registry.delete_session("r1").await;
        alice
            .send(r#"{"type":"code-change","data":{"code":"x"}}"#)
            .await;
        alice.conn.close().await;

        alice.assert_silent();
        assert!(registry.get_session("r1").await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_join_succeeds_while_room_is_deleted() {
        let registry = registry();
        registry.create_session("r1").await.unwrap();

        let deleter = tokio::spawn({
            let registry = Arc::clone(&registry);
            async move {
                for _ in 0..200 {
                    registry.delete_session("r1").await;
                    tokio::task::yield_now().await;
                }
            }
        });

        let mut joins = Vec::new();
        for i in 0..50 {
            let registry = Arc::clone(&registry);
            joins.push(tokio::spawn(async move {
                let mut client = Client::new(&registry);
                client.send(&join("r1", &format!("user{}", i))).await;
                client.next()
            }));
        }

        for handle in joins {
            let reply = handle.await.unwrap();
            assert_eq!(reply["type"], "joined");
            assert_eq!(reply["data"]["roomId"], "r1");
        }
        deleter.await.unwrap();
    }

    #[tokio::test]
    async fn test_join_after_grace_expiry_recreates_room() {
        let registry = Arc::new(SessionRegistry::new(RegistryConfig {
            grace_period: Duration::from_millis(10),
            ..Default::default()
        }));
        let mut alice = Client::new(&registry);
        alice.send(&join("r1", "Alice")).await;
        alice.conn.close().await;

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(registry.get_session("r1").await.is_none());

        let mut bob = Client::new(&registry);
        bob.send(&join("r1", "Bob")).await;
        let joined = bob.next();
        assert_eq!(joined["type"], "joined");
        assert_eq!(joined["data"]["users"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_hundred_sequential_changes() {
        let registry = registry();
        let mut alice = Client::new(&registry);
        let mut bob = Client::new(&registry);
        alice.send(&join("r1", "Alice")).await;
        bob.send(&join("r1", "Bob")).await;

        for i in 0..100 {
            let frame = format!(r#"{{"type":"code-change","data":{{"code":"v{}"}}}}"#, i);
            alice.send(&frame).await;
        }

        assert_eq!(registry.get_session("r1").await.unwrap().code, "v99");

        bob.next(); // joined
        let changes: Vec<Value> = std::iter::from_fn(|| bob.rx.try_recv().ok())
            .map(|f| serde_json::from_str(&f).unwrap())
            .collect();
        assert_eq!(changes.len(), 100);
        assert_eq!(changes[99]["data"]["code"], "v99");
    }
}

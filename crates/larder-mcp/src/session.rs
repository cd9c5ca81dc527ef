// larder-mcp/src/session.rs
// ============================================================================
// Module: Session Multiplexer
// Description: Session token minting and routing tables for all transports.
// Purpose: Bind inbound connections to per-session protocol instances.
// Dependencies: rand, tokio
// ============================================================================

//! ## Overview
//! The multiplexer owns the token -> session table. Tokens are minted here,
//! before any transport registration, and handed to the transport as fixed
//! values; the transport never assigns identifiers. Each session binds its
//! own [`ProtocolSession`] over the shared read-only context, so isolation
//! between concurrent clients is structural rather than incidental.
//!
//! ## Invariants
//! - Tokens carry 128 bits of OS-sourced entropy (32 lowercase hex chars).
//! - Removal deregisters the token and closes the protocol session; no
//!   further inbound message can be routed to it.
//! - The table is guarded by an `RwLock` because the runtime is
//!   multi-threaded; lock scopes never cross an await point.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;
use std::sync::RwLock;

use rand::RngCore;
use rand::rngs::OsRng;
use tokio::sync::mpsc;

use crate::protocol::ProtocolSession;
use crate::protocol::ServerContext;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Session token length in random bytes (128 bits).
const TOKEN_BYTES: usize = 16;
/// Buffered capacity of a session's server-to-client event channel.
const CHANNEL_CAPACITY: usize = 32;

// ============================================================================
// SECTION: Token Generation
// ============================================================================

/// Mints an unpredictable session token: 128 bits of OS entropy as hex.
#[must_use]
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let mut token = String::with_capacity(TOKEN_BYTES * 2);
    for byte in bytes {
        let _ = write!(token, "{byte:02x}");
    }
    token
}

// ============================================================================
// SECTION: Session Entry
// ============================================================================

/// One live session: token, protocol instance, optional event channel.
pub struct SessionEntry {
    /// Opaque session token.
    pub token: String,
    /// The session's protocol state machine.
    pub protocol: ProtocolSession,
    /// Server-to-client event channel for stream-style sessions.
    channel: Option<mpsc::Sender<String>>,
}

impl SessionEntry {
    /// Returns whether this session owns a live event channel.
    #[must_use]
    pub fn has_channel(&self) -> bool {
        self.channel.as_ref().is_some_and(|sender| !sender.is_closed())
    }

    /// Delivers a payload on the session's event channel.
    ///
    /// # Errors
    ///
    /// Returns the payload back when the session has no live channel.
    pub async fn deliver(&self, payload: String) -> Result<(), String> {
        match &self.channel {
            Some(sender) => sender.send(payload).await.map_err(|err| err.0),
            None => Err(payload),
        }
    }

    /// Returns a clone of the channel sender for close watching.
    #[must_use]
    pub fn channel_sender(&self) -> Option<mpsc::Sender<String>> {
        self.channel.clone()
    }
}

// ============================================================================
// SECTION: Multiplexer
// ============================================================================

/// Routing table binding session tokens to protocol instances.
pub struct SessionMultiplexer {
    /// Shared read-only server state handed to every new session.
    context: Arc<ServerContext>,
    /// Live sessions keyed by token.
    sessions: RwLock<BTreeMap<String, Arc<SessionEntry>>>,
}

impl SessionMultiplexer {
    /// Creates an empty multiplexer over shared server state.
    #[must_use]
    pub fn new(context: Arc<ServerContext>) -> Self {
        Self {
            context,
            sessions: RwLock::new(BTreeMap::new()),
        }
    }

    /// Creates and registers a new request/response session.
    #[must_use]
    pub fn create_session(&self) -> Arc<SessionEntry> {
        self.insert(None).0
    }

    /// Creates and registers a new stream-style session with an event
    /// channel; the receiver side feeds the transport's event stream.
    #[must_use]
    pub fn create_channel_session(&self) -> (Arc<SessionEntry>, mpsc::Receiver<String>) {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let (entry, _) = self.insert(Some(sender));
        (entry, receiver)
    }

    /// Looks up a live session by token.
    #[must_use]
    pub fn lookup(&self, token: &str) -> Option<Arc<SessionEntry>> {
        self.sessions.read().ok().and_then(|sessions| sessions.get(token).cloned())
    }

    /// Removes a session, closing its protocol instance.
    ///
    /// Returns whether a session was registered under the token.
    pub fn remove(&self, token: &str) -> bool {
        let removed = match self.sessions.write() {
            Ok(mut sessions) => sessions.remove(token),
            Err(_) => None,
        };
        match removed {
            Some(entry) => {
                entry.protocol.close();
                true
            }
            None => false,
        }
    }

    /// Returns the number of live sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.read().map(|sessions| sessions.len()).unwrap_or(0)
    }

    /// Mints a token, builds a session entry, and registers it.
    fn insert(&self, channel: Option<mpsc::Sender<String>>) -> (Arc<SessionEntry>, String) {
        let token = generate_session_token();
        let entry = Arc::new(SessionEntry {
            token: token.clone(),
            protocol: ProtocolSession::new(Arc::clone(&self.context)),
            channel,
        });
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.insert(token.clone(), Arc::clone(&entry));
        }
        (entry, token)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions."
    )]

    use std::collections::BTreeSet;
    use std::sync::Arc;

    use super::SessionMultiplexer;
    use super::generate_session_token;
    use crate::enablement::EnablementPolicy;
    use crate::protocol::ServerContext;
    use crate::registry::ToolRegistry;
    use crate::resources::ResourceCatalog;

    /// Builds a multiplexer over an empty registry.
    fn multiplexer() -> SessionMultiplexer {
        let registry = Arc::new(ToolRegistry::register(vec![]));
        let policy = Arc::new(EnablementPolicy::allow_all(&registry));
        SessionMultiplexer::new(Arc::new(ServerContext {
            registry,
            policy,
            resources: Arc::new(ResourceCatalog::default()),
        }))
    }

    #[test]
    fn tokens_are_distinct_across_ten_thousand_mints() {
        let mut seen = BTreeSet::new();
        for _ in 0..10_000 {
            let token = generate_session_token();
            assert_eq!(token.len(), 32);
            assert!(token.chars().all(|ch| ch.is_ascii_hexdigit()));
            assert!(seen.insert(token), "token collision");
        }
    }

    #[test]
    fn create_registers_and_remove_deregisters() {
        let mux = multiplexer();
        let entry = mux.create_session();
        assert_eq!(mux.session_count(), 1);
        assert!(mux.lookup(&entry.token).is_some());
        assert!(mux.remove(&entry.token));
        assert_eq!(mux.session_count(), 0);
        assert!(mux.lookup(&entry.token).is_none());
        assert!(!mux.remove(&entry.token));
    }

    #[test]
    fn unknown_token_does_not_resolve() {
        let mux = multiplexer();
        let _ = mux.create_session();
        assert!(mux.lookup("0000000000000000ffffffffffffffff").is_none());
    }

    #[tokio::test]
    async fn sessions_are_isolated_state_machines() {
        let mux = multiplexer();
        let a = mux.create_session();
        let b = mux.create_session();
        let init = serde_json::json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"});
        let handled =
            a.protocol.handle(serde_json::from_value(init).expect("request parses")).await;
        assert!(handled.response.error.is_none());
        // Initializing session A must not initialize session B.
        assert!(a.protocol.is_initialized());
        assert!(!b.protocol.is_initialized());
    }

    #[tokio::test]
    async fn channel_sessions_deliver_payloads_in_order() {
        let mux = multiplexer();
        let (entry, mut receiver) = mux.create_channel_session();
        assert!(entry.has_channel());
        entry.deliver("first".to_string()).await.expect("delivery succeeds");
        entry.deliver("second".to_string()).await.expect("delivery succeeds");
        assert_eq!(receiver.recv().await.as_deref(), Some("first"));
        assert_eq!(receiver.recv().await.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn plain_sessions_have_no_channel() {
        let mux = multiplexer();
        let entry = mux.create_session();
        assert!(!entry.has_channel());
        assert!(entry.deliver("lost".to_string()).await.is_err());
    }

    #[tokio::test]
    async fn dropping_the_receiver_marks_the_channel_dead() {
        let mux = multiplexer();
        let (entry, receiver) = mux.create_channel_session();
        drop(receiver);
        assert!(!entry.has_channel());
        assert!(entry.deliver("late".to_string()).await.is_err());
    }

    #[test]
    fn removed_session_is_closed() {
        let mux = multiplexer();
        let entry = mux.create_session();
        let token = entry.token.clone();
        assert!(mux.remove(&token));
        // The protocol session is closed; it rejects further requests.
        assert!(!entry.protocol.is_initialized());
    }
}

//! Session lifecycle state machine
//!
//! Wraps the backend connection in a reconnecting state machine:
//!
//! ```text
//! Idle -> Connecting -> Connected -> Disconnected -> Reconnecting -> Connecting ...
//! ```
//!
//! Connection errors are non-fatal: every failure routes through the same
//! debounced reconnect path. Identity persistence is configurable: a
//! reconnect may resume the previous session token or discard it (an explicit
//! user action).

use rand::Rng;
use tracing::{info, warn};

use crate::net::backend::Backend;
use crate::net::protocol::{ConnectRequest, QueryPredicate, RemoteAction, SubscriptionId, Table};
use crate::net::token::{SessionToken, TokenStore};
use crate::world::entities::{Color, PlayerId};

/// Connection state of the client session
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionState {
    /// Before the first connect attempt, or after leaving the game
    Idle,
    /// A connect attempt is in flight
    Connecting,
    /// Authenticated and streaming
    Connected { identity: PlayerId },
    /// Lost the connection; a reconnect is about to be scheduled
    Disconnected,
    /// Waiting out the reconnect debounce delay
    Reconnecting { remaining: f32 },
}

/// Knobs the lifecycle needs, carved out of the client configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub endpoint: String,
    pub module: String,
    pub username: String,
    /// Fixed delay before a reconnect attempt (debounces hot-loop reconnects)
    pub reconnect_delay: f32,
    /// Resume the persisted identity on reconnect
    pub resume_identity: bool,
    /// Self-removal policy: reconnect as the same player, or drop to Idle
    pub auto_reconnect_on_death: bool,
}

/// The session state machine
pub struct SessionLifecycle {
    config: SessionConfig,
    state: SessionState,
    /// Cosmetic variation announced with the username on every connect
    color: Color,
    seed: u64,
    initial_subscription: Option<SubscriptionId>,
}

impl SessionLifecycle {
    pub fn new(config: SessionConfig) -> Self {
        let mut rng = rand::thread_rng();
        // Mid-range channels keep the announced color visible on the dark field
        let color = Color::new(
            rng.gen_range(60..=190),
            rng.gen_range(60..=190),
            rng.gen_range(60..=190),
        );
        Self {
            config,
            state: SessionState::Idle,
            color,
            seed: rng.gen(),
            initial_subscription: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn identity(&self) -> Option<PlayerId> {
        match self.state {
            SessionState::Connected { identity } => Some(identity),
            _ => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected { .. })
    }

    /// Begin a connect attempt. Guarded: at most one attempt is in flight at
    /// a time, and an established session is never silently replaced.
    pub fn connect(&mut self, backend: &mut dyn Backend, store: &dyn TokenStore) {
        match self.state {
            SessionState::Idle | SessionState::Disconnected | SessionState::Reconnecting { .. } => {}
            SessionState::Connecting | SessionState::Connected { .. } => {
                warn!("connect requested while {:?}, ignoring", self.state);
                return;
            }
        }

        let resume_token = if self.config.resume_identity {
            store.load()
        } else {
            None
        };

        let request = ConnectRequest {
            endpoint: self.config.endpoint.clone(),
            module: self.config.module.clone(),
            resume_token,
        };

        self.state = SessionState::Connecting;
        if let Err(e) = backend.connect(request) {
            warn!("connect attempt failed to start: {}", e);
            self.state = SessionState::Disconnected;
        }
    }

    /// Discard the persisted identity so the next connect joins as a new
    /// player. Explicit user action.
    pub fn forget_identity(&mut self, store: &mut dyn TokenStore) {
        store.clear();
    }

    /// Leave the game: tear the connection down without scheduling a
    /// reconnect (return-to-menu).
    pub fn leave(&mut self, backend: &mut dyn Backend) {
        self.state = SessionState::Idle;
        self.initial_subscription = None;
        backend.disconnect();
    }

    /// Handshake succeeded: capture identity, persist the token, announce
    /// presence, and issue the minimal initial subscription (self row plus
    /// metadata and leaderboard). The AoI engine widens coverage once the
    /// self row arrives.
    pub fn on_connected(
        &mut self,
        identity: PlayerId,
        token: SessionToken,
        backend: &mut dyn Backend,
        store: &mut dyn TokenStore,
    ) {
        if self.state != SessionState::Connecting {
            warn!("connected event while {:?}", self.state);
        }
        info!("connected as {}", identity);
        store.save(&token);
        self.state = SessionState::Connected { identity };

        backend.call_action(RemoteAction::SetProfile {
            username: self.config.username.clone(),
            color: self.color,
            seed: self.seed,
        });

        let id = backend.subscribe(vec![
            QueryPredicate::identity(Table::Player, identity),
            QueryPredicate::all(Table::StaticMetadata),
            QueryPredicate::all(Table::DynamicMetadata),
            QueryPredicate::all(Table::Leaderboard),
        ]);
        self.initial_subscription = Some(id);
    }

    /// Connect attempt failed; routed through the reconnect path
    pub fn on_connect_failed(&mut self, reason: &str) {
        warn!("connect failed: {}", reason);
        if self.state != SessionState::Idle {
            self.state = SessionState::Disconnected;
        }
    }

    /// Transport failure or server-initiated disconnect
    pub fn on_disconnected(&mut self) {
        self.initial_subscription = None;
        match self.state {
            SessionState::Idle => {
                // Deliberate leave: stay in the menu
            }
            _ => {
                info!("disconnected");
                self.state = SessionState::Disconnected;
            }
        }
    }

    /// The local player's own row was deleted (eliminated or kicked)
    pub fn on_self_removed(&mut self, backend: &mut dyn Backend) {
        if self.config.auto_reconnect_on_death {
            info!("eliminated, reconnecting as the same identity");
            backend.disconnect();
            // The Disconnected event lands in the reconnect path
        } else {
            info!("eliminated, returning to menu");
            self.leave(backend);
        }
    }

    /// Advance timers by one frame. Disconnected sessions enter the debounce
    /// delay; once it elapses a single new connect attempt is made.
    pub fn tick(&mut self, dt: f32, backend: &mut dyn Backend, store: &dyn TokenStore) {
        match self.state {
            SessionState::Disconnected => {
                self.state = SessionState::Reconnecting {
                    remaining: self.config.reconnect_delay,
                };
            }
            SessionState::Reconnecting { remaining } => {
                let remaining = remaining - dt;
                if remaining <= 0.0 {
                    self.connect(backend, store);
                } else {
                    self.state = SessionState::Reconnecting { remaining };
                }
            }
            _ => {}
        }
    }

    /// Handle of the initial (self + metadata) subscription, if issued
    pub fn initial_subscription(&self) -> Option<SubscriptionId> {
        self.initial_subscription
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::protocol::{ConnectError, QueryFilter};
    use crate::net::token::MemoryTokenStore;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingBackend {
        next_id: u64,
        pub connects: Vec<ConnectRequest>,
        pub subscribes: Vec<Vec<QueryPredicate>>,
        pub actions: Vec<RemoteAction>,
        pub disconnects: usize,
        pub fail_connect: bool,
    }

    impl Backend for RecordingBackend {
        fn connect(&mut self, request: ConnectRequest) -> Result<(), ConnectError> {
            if self.fail_connect {
                return Err(ConnectError::InvalidEndpoint(request.endpoint));
            }
            self.connects.push(request);
            Ok(())
        }

        fn subscribe(&mut self, predicates: Vec<QueryPredicate>) -> SubscriptionId {
            self.next_id += 1;
            self.subscribes.push(predicates);
            SubscriptionId(self.next_id)
        }

        fn unsubscribe(&mut self, _id: SubscriptionId) {}

        fn call_action(&mut self, action: RemoteAction) {
            self.actions.push(action);
        }

        fn disconnect(&mut self) {
            self.disconnects += 1;
        }
    }

    fn config(auto_reconnect: bool) -> SessionConfig {
        SessionConfig {
            endpoint: "wss://localhost:3000".to_string(),
            module: "moonbits".to_string(),
            username: "tester".to_string(),
            reconnect_delay: 2.0,
            resume_identity: true,
            auto_reconnect_on_death: auto_reconnect,
        }
    }

    #[test]
    fn test_connect_guard_rejects_duplicates() {
        let mut session = SessionLifecycle::new(config(true));
        let mut backend = RecordingBackend::default();
        let store = MemoryTokenStore::new();

        session.connect(&mut backend, &store);
        assert_eq!(session.state(), SessionState::Connecting);
        session.connect(&mut backend, &store);
        assert_eq!(backend.connects.len(), 1);
    }

    #[test]
    fn test_connected_announces_and_subscribes() {
        let mut session = SessionLifecycle::new(config(true));
        let mut backend = RecordingBackend::default();
        let mut store = MemoryTokenStore::new();
        let identity = Uuid::new_v4();
        let token = SessionToken::generate();

        session.connect(&mut backend, &store);
        session.on_connected(identity, token.clone(), &mut backend, &mut store);

        assert_eq!(session.identity(), Some(identity));
        assert_eq!(store.load(), Some(token));
        assert!(matches!(
            backend.actions.first(),
            Some(RemoteAction::SetProfile { username, .. }) if username == "tester"
        ));

        // Self row + static metadata + dynamic metadata + leaderboard
        let predicates = &backend.subscribes[0];
        assert_eq!(predicates.len(), 4);
        assert!(matches!(
            (&predicates[0].table, &predicates[0].filter),
            (Table::Player, QueryFilter::Identity(id)) if *id == identity
        ));
        assert_eq!(session.initial_subscription(), Some(SubscriptionId(1)));
    }

    #[test]
    fn test_disconnect_schedules_debounced_reconnect() {
        let mut session = SessionLifecycle::new(config(true));
        let mut backend = RecordingBackend::default();
        let mut store = MemoryTokenStore::new();
        let token = SessionToken::generate();

        session.connect(&mut backend, &store);
        session.on_connected(Uuid::new_v4(), token.clone(), &mut backend, &mut store);
        session.on_disconnected();
        assert_eq!(session.state(), SessionState::Disconnected);

        session.tick(0.016, &mut backend, &store);
        assert!(matches!(session.state(), SessionState::Reconnecting { .. }));

        // The delay has not elapsed: still exactly one connect so far
        session.tick(1.0, &mut backend, &store);
        assert_eq!(backend.connects.len(), 1);

        session.tick(1.5, &mut backend, &store);
        assert_eq!(backend.connects.len(), 2);
        assert_eq!(session.state(), SessionState::Connecting);
        // Reconnect resumes the persisted identity
        assert_eq!(backend.connects[1].resume_token, Some(token));
    }

    #[test]
    fn test_connect_failed_routes_through_reconnect() {
        let mut session = SessionLifecycle::new(config(true));
        let mut backend = RecordingBackend::default();
        let store = MemoryTokenStore::new();

        session.connect(&mut backend, &store);
        session.on_connect_failed("refused");
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_failed_connect_call_goes_to_disconnected() {
        let mut session = SessionLifecycle::new(config(true));
        let mut backend = RecordingBackend {
            fail_connect: true,
            ..Default::default()
        };
        let store = MemoryTokenStore::new();

        session.connect(&mut backend, &store);
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_self_removed_auto_reconnect() {
        let mut session = SessionLifecycle::new(config(true));
        let mut backend = RecordingBackend::default();
        let mut store = MemoryTokenStore::new();

        session.connect(&mut backend, &store);
        session.on_connected(Uuid::new_v4(), SessionToken::generate(), &mut backend, &mut store);

        session.on_self_removed(&mut backend);
        assert_eq!(backend.disconnects, 1);

        // The transport reports the disconnect; the normal reconnect path runs
        session.on_disconnected();
        session.tick(0.016, &mut backend, &store);
        assert!(matches!(session.state(), SessionState::Reconnecting { .. }));
    }

    #[test]
    fn test_self_removed_to_menu() {
        let mut session = SessionLifecycle::new(config(false));
        let mut backend = RecordingBackend::default();
        let mut store = MemoryTokenStore::new();

        session.connect(&mut backend, &store);
        session.on_connected(Uuid::new_v4(), SessionToken::generate(), &mut backend, &mut store);

        session.on_self_removed(&mut backend);
        assert_eq!(session.state(), SessionState::Idle);

        // The trailing Disconnected event must not trigger a reconnect
        session.on_disconnected();
        session.tick(5.0, &mut backend, &store);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(backend.connects.len(), 1);
    }

    #[test]
    fn test_forget_identity_connects_fresh() {
        let mut session = SessionLifecycle::new(config(true));
        let mut backend = RecordingBackend::default();
        let mut store = MemoryTokenStore::new();
        store.save(&SessionToken::generate());

        session.forget_identity(&mut store);
        session.connect(&mut backend, &store);
        assert_eq!(backend.connects[0].resume_token, None);
    }
}

//! The client session context
//!
//! [`GameClient`] is the one explicit, passed-by-reference object owning the
//! whole client core: backend handle, event buffer, session state machine,
//! entity mirror, AoI engine, interpolation engine, fade store, and counters.
//! The hosting application drives it with [`GameClient::frame`] once per
//! displayed frame and reads [`GameClient::view`] to draw.
//!
//! Everything runs on the caller's thread; backend callbacks land in the
//! event buffer and are applied at the start of the next frame, so no locking
//! is needed anywhere in the core.

use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::input::{DirectionKeys, IntentTracker};
use crate::net::aoi::AoiEngine;
use crate::net::backend::{Backend, EventBuffer};
use crate::net::protocol::{BackendEvent, RemoteAction};
use crate::net::session::{SessionLifecycle, SessionState};
use crate::net::token::TokenStore;
use crate::render::interp::InterpolationEngine;
use crate::render::trails::MoonTrails;
use crate::render::view::FrameView;
use crate::stats::ClientStats;
use crate::world::events::{RowEvent, TableEvent};
use crate::world::mirror::{BitFades, EntityMirror, MirrorSignal};

/// Top-level client core
pub struct GameClient<B: Backend, S: TokenStore> {
    config: ClientConfig,
    backend: B,
    store: S,
    events: EventBuffer,
    session: SessionLifecycle,
    mirror: EntityMirror,
    fades: BitFades,
    aoi: AoiEngine,
    interp: InterpolationEngine,
    trails: MoonTrails,
    intent: IntentTracker,
    stats: ClientStats,
}

impl<B: Backend, S: TokenStore> GameClient<B, S> {
    /// Assemble the core around a transport adapter and token store. The
    /// `events` buffer must be the one whose sender the adapter was built
    /// with.
    pub fn new(config: ClientConfig, backend: B, store: S, events: EventBuffer) -> Self {
        let session = SessionLifecycle::new(config.session_config());
        let aoi = AoiEngine::new(config.aoi.clone());
        Self {
            config,
            backend,
            store,
            events,
            session,
            mirror: EntityMirror::new(),
            fades: BitFades::new(),
            aoi,
            interp: InterpolationEngine::new(),
            trails: MoonTrails::new(),
            intent: IntentTracker::new(),
            stats: ClientStats::new(),
        }
    }

    /// Begin connecting (idempotent while an attempt is in flight)
    pub fn connect(&mut self) {
        self.session.connect(&mut self.backend, &self.store);
    }

    /// Discard the persisted identity and connect as a new player
    pub fn connect_as_new_identity(&mut self) {
        self.session.forget_identity(&mut self.store);
        self.session.connect(&mut self.backend, &self.store);
    }

    /// Leave the game and return to the menu (no reconnect)
    pub fn leave(&mut self) {
        self.session.leave(&mut self.backend);
    }

    /// Drive one cooperative frame: drain backend notifications, advance the
    /// session timers, re-evaluate the AoI subscription, and smooth display
    /// positions by `dt` seconds.
    pub fn frame(&mut self, dt: f32) {
        self.stats.record_frame(dt);

        for event in self.events.drain() {
            self.handle_event(event);
        }

        self.session.tick(dt, &mut self.backend, &self.store);

        let self_player = self
            .session
            .identity()
            .and_then(|id| self.mirror.self_player(id));
        if self
            .aoi
            .maintain(self_player, self.mirror.static_metadata(), &mut self.backend)
        {
            ClientStats::bump(&self.stats.resubscribes);
        }

        self.fades.tick(dt);
        self.interp.advance(dt, &self.mirror, self.session.identity());
        self.trails.update(&self.mirror, &self.interp);
    }

    fn handle_event(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::Connected { identity, token } => {
                self.session
                    .on_connected(identity, token, &mut self.backend, &mut self.store);
                self.intent.reset();
            }
            BackendEvent::ConnectFailed { reason } => {
                self.session.on_connect_failed(&reason);
            }
            BackendEvent::Disconnected => {
                self.session.on_disconnected();
                self.teardown();
                ClientStats::bump(&self.stats.reconnects);
                info!("session stats: {}", self.stats.snapshot());
            }
            BackendEvent::SubscriptionApplied { id } => {
                self.aoi.confirm(id, &mut self.backend);
            }
            BackendEvent::Row(event) => {
                ClientStats::bump(&self.stats.rows_applied);
                if let TableEvent::Bit(RowEvent::Deleted(bit)) = &event {
                    // Live map entry goes immediately; the fade record is
                    // animation scratch only
                    self.fades.begin(bit.clone(), self.config.bit_fade_secs);
                }
                let signal = self.mirror.apply(event, self.session.identity());
                if signal == Some(MirrorSignal::SelfRemoved) {
                    self.session.on_self_removed(&mut self.backend);
                }
            }
        }
    }

    /// Drop all per-session state. Runs on every disconnect, before any
    /// reconnect attempt is scheduled, so a new session starts from an empty
    /// mirror.
    fn teardown(&mut self) {
        self.mirror.clear();
        self.fades.clear();
        self.interp.clear();
        self.trails.clear();
        self.aoi.reset();
        self.intent.reset();
        debug!("per-session state torn down");
    }

    /// Update the held directional keys; forwards the intent vector to the
    /// backend only when it changes
    pub fn set_direction(&mut self, keys: DirectionKeys) {
        if self.session.is_connected() {
            self.intent.update(keys, &mut self.backend);
        }
    }

    /// One-shot special action: sacrifice health for an orbiting moon
    pub fn spawn_moon(&mut self) {
        if self.session.is_connected() {
            self.backend.call_action(RemoteAction::SpawnMoon);
        }
    }

    /// Read-only snapshot for the renderer
    pub fn view(&self) -> FrameView<'_> {
        FrameView::new(
            &self.mirror,
            &self.interp,
            &self.fades,
            &self.trails,
            self.session.identity(),
        )
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    pub fn mirror(&self) -> &EntityMirror {
        &self.mirror
    }

    /// The transport adapter (the bundled simulation backend needs pumping
    /// from the host loop)
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

#[cfg(all(test, feature = "sim"))]
mod tests {
    use super::*;
    use crate::net::sim::SimBackend;
    use crate::net::token::MemoryTokenStore;

    const FRAME: f32 = 0.016;

    fn sim_client(config: ClientConfig) -> GameClient<SimBackend, MemoryTokenStore> {
        let events = EventBuffer::new(config.event_buffer_capacity);
        let backend = SimBackend::new(events.sender());
        GameClient::new(config, backend, MemoryTokenStore::new(), events)
    }

    /// Pump the simulation and the client for `frames` frames
    fn run(client: &mut GameClient<SimBackend, MemoryTokenStore>, frames: usize) {
        for _ in 0..frames {
            client.backend_mut().pump(FRAME);
            client.frame(FRAME);
        }
    }

    #[test]
    fn test_end_to_end_connect_and_mirror() {
        let mut client = sim_client(ClientConfig::default());
        client.connect();
        run(&mut client, 30);

        assert!(client.session_state() != SessionState::Idle);
        assert!(matches!(
            client.session_state(),
            SessionState::Connected { .. }
        ));
        // Metadata, self row, and the AoI-visible entities have arrived
        assert!(client.mirror().static_metadata().is_some());
        assert!(client.mirror().dynamic_metadata().is_some());
        let view = client.view();
        assert!(view.self_player().is_some());
        assert!(view.camera().is_some());
        assert!(client.mirror().bits().len() > 0);
    }

    #[test]
    fn test_view_positions_move_smoothly() {
        let mut client = sim_client(ClientConfig::default());
        client.connect();
        run(&mut client, 30);

        client.set_direction(DirectionKeys {
            right: true,
            ..Default::default()
        });
        let before = client.view().camera().unwrap();
        run(&mut client, 30);
        let after = client.view().camera().unwrap();
        assert!(after.x > before.x, "camera did not follow movement");
    }

    #[test]
    fn test_reset_on_reconnect() {
        let mut config = ClientConfig::default();
        config.reconnect_delay = 0.1;
        let mut client = sim_client(config);
        client.connect();
        run(&mut client, 30);
        assert!(!client.mirror().is_empty());
        let first_identity = client.view().local_identity().unwrap();

        client.backend_mut().drop_connection();
        client.backend_mut().pump(FRAME);
        client.frame(FRAME);
        // Mirror is empty before any reconnect delivers rows
        assert!(client.mirror().is_empty());
        assert!(!matches!(
            client.session_state(),
            SessionState::Connected { .. }
        ));

        run(&mut client, 40);
        assert!(matches!(
            client.session_state(),
            SessionState::Connected { .. }
        ));
        // Token resumption keeps the identity stable across the reconnect
        assert_eq!(client.view().local_identity(), Some(first_identity));
    }

    #[test]
    fn test_elimination_auto_reconnects() {
        let mut config = ClientConfig::default();
        config.reconnect_delay = 0.1;
        config.settings.auto_reconnect_on_death = true;
        let mut client = sim_client(config);
        client.connect();
        run(&mut client, 30);

        client.backend_mut().kill_self();
        run(&mut client, 60);
        assert!(matches!(
            client.session_state(),
            SessionState::Connected { .. }
        ));
        assert!(client.view().self_player().is_some());
    }

    #[test]
    fn test_elimination_returns_to_menu_when_disabled() {
        let mut config = ClientConfig::default();
        config.settings.auto_reconnect_on_death = false;
        let mut client = sim_client(config);
        client.connect();
        run(&mut client, 30);

        client.backend_mut().kill_self();
        run(&mut client, 60);
        assert_eq!(client.session_state(), SessionState::Idle);
    }

    #[test]
    fn test_bit_fade_after_delete() {
        let mut config = ClientConfig::default();
        config.bit_fade_secs = 10.0; // survive the test window
        let mut client = sim_client(config);
        client.connect();
        run(&mut client, 30);

        let eaten = client.backend_mut().consume_one_visible_bit();
        assert!(eaten, "expected a visible bit to consume");
        run(&mut client, 2);
        let view = client.view();
        assert!(view.removing_bits().count() >= 1);
        // The live mirror dropped it immediately
        let fading_id = view.removing_bits().next().unwrap().bit.id;
        assert!(!client.mirror().bits().contains_key(&fading_id));
    }

    #[test]
    fn test_new_identity_discards_token() {
        let mut client = sim_client(ClientConfig::default());
        client.connect();
        run(&mut client, 30);
        let first = client.view().local_identity().unwrap();

        client.leave();
        run(&mut client, 5);
        client.connect_as_new_identity();
        run(&mut client, 40);

        let second = client.view().local_identity().unwrap();
        assert_ne!(first, second);
    }
}

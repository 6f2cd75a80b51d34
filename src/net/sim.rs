//! Bundled simulation backend
//!
//! An in-process [`Backend`] implementation holding a small authoritative
//! world: it evaluates subscription predicates against that world and emits
//! row events as entities move in and out of the subscribed regions. Used by
//! the headless binary and the end-to-end tests; it is a test collaborator,
//! not a game server.
//!
//! The host loop drives it with [`SimBackend::pump`] in the same thread as
//! the client frame, matching the single-threaded cooperative model.

use hashbrown::HashMap;
use rand::Rng;
use tracing::debug;

use crate::net::backend::{Backend, EventSender};
use crate::net::protocol::{
    BackendEvent, ConnectError, ConnectRequest, QueryFilter, QueryPredicate, RemoteAction,
    SubscriptionId, Table,
};
use crate::net::token::SessionToken;
use crate::util::vec2::Vec2;
use crate::world::entities::{
    Bit, Color, DynamicMetadata, EntityId, LeaderboardEntry, Moon, Player, PlayerId,
    StaticMetadata,
};
use crate::world::events::{RowEvent, TableEvent};

const WORLD_SIZE: f32 = 2000.0;
const TICKS_PER_SECOND: f32 = 50.0;
const BIT_COUNT: usize = 200;
const DRONE_COUNT: usize = 6;
const FREE_MOON_COUNT: usize = 8;
const SELF_SPEED: f32 = 150.0;
const DRONE_SPEED: f32 = 80.0;
const SPAWN_INVINCIBILITY_TICKS: u32 = 100;
const LEADERBOARD_REFRESH_TICKS: u64 = 50;
const RESET_COUNTDOWN_START: u64 = 36_000;

/// Movement state the rows don't carry
struct SimPlayer {
    row: Player,
    dir: Vec2,
    speed: f32,
}

struct SimMoon {
    row: Moon,
    /// Orbit phase for owned moons, drift direction for free ones
    angle: f32,
    radius: f32,
    drift: Vec2,
}

/// The authoritative world
struct SimWorld {
    meta: StaticMetadata,
    dynamic: DynamicMetadata,
    players: HashMap<PlayerId, SimPlayer>,
    bits: HashMap<EntityId, Bit>,
    moons: HashMap<EntityId, SimMoon>,
    leaderboard: HashMap<PlayerId, LeaderboardEntry>,
    next_entity: EntityId,
    tick: u64,
}

impl SimWorld {
    fn new() -> Self {
        let mut rng = rand::thread_rng();
        let meta = StaticMetadata {
            world_width: WORLD_SIZE,
            world_height: WORLD_SIZE,
            ticks_per_second: TICKS_PER_SECOND,
            reset_updates_per_second: TICKS_PER_SECOND,
        };

        let mut world = Self {
            meta,
            dynamic: DynamicMetadata {
                total_users: 0,
                updates_until_reset: RESET_COUNTDOWN_START,
            },
            players: HashMap::new(),
            bits: HashMap::new(),
            moons: HashMap::new(),
            leaderboard: HashMap::new(),
            next_entity: 1,
            tick: 0,
        };

        for _ in 0..BIT_COUNT {
            let id = world.alloc_id();
            world.bits.insert(
                id,
                Bit {
                    id,
                    position: world.random_position(&mut rng),
                    size: rng.gen_range(0.5..2.5),
                    color: random_color(&mut rng),
                },
            );
        }

        for i in 0..DRONE_COUNT {
            let identity = PlayerId::new_v4();
            let position = world.random_position(&mut rng);
            world.players.insert(
                identity,
                SimPlayer {
                    row: Player {
                        identity,
                        online: true,
                        username: format!("drone-{}", i),
                        position,
                        size: rng.gen_range(8.0..20.0),
                        color: random_color(&mut rng),
                        seed: rng.gen(),
                        invincibility_ticks: 0,
                    },
                    dir: Vec2::from_angle(rng.gen_range(0.0..std::f32::consts::TAU)),
                    speed: DRONE_SPEED,
                },
            );
            world.spawn_orbiting_moon(identity, &mut rng);
        }

        for _ in 0..FREE_MOON_COUNT {
            let id = world.alloc_id();
            let position = world.random_position(&mut rng);
            world.moons.insert(
                id,
                SimMoon {
                    row: Moon {
                        id,
                        position,
                        size: rng.gen_range(3.0..5.0),
                        color: random_color(&mut rng),
                        orbiting: None,
                        orbital_velocity: 0.0,
                    },
                    angle: 0.0,
                    radius: 0.0,
                    drift: Vec2::from_angle(rng.gen_range(0.0..std::f32::consts::TAU)) * 10.0,
                },
            );
        }

        world
    }

    fn alloc_id(&mut self) -> EntityId {
        let id = self.next_entity;
        self.next_entity += 1;
        id
    }

    fn random_position(&self, rng: &mut impl Rng) -> Vec2 {
        Vec2::new(
            rng.gen_range(0.0..self.meta.world_width),
            rng.gen_range(0.0..self.meta.world_height),
        )
    }

    fn bounds(&self) -> Vec2 {
        self.meta.bounds()
    }

    fn spawn_player(&mut self, identity: PlayerId) {
        let mut rng = rand::thread_rng();
        let center = self.bounds() * 0.5;
        self.players.insert(
            identity,
            SimPlayer {
                row: Player {
                    identity,
                    online: true,
                    username: String::new(),
                    position: center,
                    size: 10.0,
                    color: random_color(&mut rng),
                    seed: rng.gen(),
                    invincibility_ticks: SPAWN_INVINCIBILITY_TICKS,
                },
                dir: Vec2::ZERO,
                speed: SELF_SPEED,
            },
        );
    }

    fn spawn_orbiting_moon(&mut self, parent: PlayerId, rng: &mut impl Rng) {
        let id = self.alloc_id();
        let parent_pos = match self.players.get(&parent) {
            Some(p) => p.row.position,
            None => return,
        };
        let direction = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        self.moons.insert(
            id,
            SimMoon {
                row: Moon {
                    id,
                    position: parent_pos,
                    size: rng.gen_range(3.0..5.0),
                    color: random_color(rng),
                    orbiting: Some(parent),
                    orbital_velocity: direction * rng.gen_range(0.02..0.05),
                },
                angle: rng.gen_range(0.0..std::f32::consts::TAU),
                radius: rng.gen_range(25.0..45.0),
                drift: Vec2::ZERO,
            },
        );
    }

    /// Remove a player and every moon orbiting it
    fn remove_player(&mut self, identity: PlayerId) {
        self.players.remove(&identity);
        self.moons
            .retain(|_, moon| moon.row.orbiting != Some(identity));
    }

    /// One authoritative simulation tick
    fn tick(&mut self) {
        self.tick += 1;
        let bounds = self.bounds();
        let dt = 1.0 / TICKS_PER_SECOND;
        let mut rng = rand::thread_rng();

        for player in self.players.values_mut() {
            // Drones wander; the occasional direction change keeps them moving
            if player.row.username.starts_with("drone") && rng.gen_bool(0.02) {
                player.dir = Vec2::from_angle(rng.gen_range(0.0..std::f32::consts::TAU));
            }
            player.row.position =
                (player.row.position + player.dir * player.speed * dt).wrap(bounds);
            player.row.invincibility_ticks = player.row.invincibility_ticks.saturating_sub(1);
        }

        for moon in self.moons.values_mut() {
            match moon.row.orbiting {
                Some(parent) => {
                    if let Some(parent) = self.players.get(&parent) {
                        moon.angle += moon.row.orbital_velocity;
                        moon.row.position = (parent.row.position
                            + Vec2::from_angle(moon.angle) * moon.radius)
                            .wrap(bounds);
                    }
                }
                None => {
                    moon.row.position = (moon.row.position + moon.drift * dt).wrap(bounds);
                }
            }
        }

        self.dynamic.total_users = self.players.len() as u32;
        self.dynamic.updates_until_reset = self
            .dynamic
            .updates_until_reset
            .checked_sub(1)
            .unwrap_or(RESET_COUNTDOWN_START);

        if self.tick % LEADERBOARD_REFRESH_TICKS == 0 {
            self.refresh_leaderboard();
        }
    }

    /// Wholesale leaderboard recompute, ranked by size
    fn refresh_leaderboard(&mut self) {
        let mut ranked: Vec<&Player> = self.players.values().map(|p| &p.row).collect();
        ranked.sort_by(|a, b| b.size.partial_cmp(&a.size).unwrap_or(std::cmp::Ordering::Equal));
        self.leaderboard = ranked
            .into_iter()
            .enumerate()
            .map(|(i, p)| {
                (
                    p.identity,
                    LeaderboardEntry {
                        rank: (i + 1) as u32,
                        identity: p.identity,
                        username: p.username.clone(),
                        size: p.size,
                        kills: 0,
                        damage: 0.0,
                    },
                )
            })
            .collect();
    }
}

fn random_color(rng: &mut impl Rng) -> Color {
    Color::new(
        rng.gen_range(60..=190),
        rng.gen_range(60..=190),
        rng.gen_range(60..=190),
    )
}

/// Rows currently delivered to the client, with their last-sent values so
/// updates can carry the old row
#[derive(Default)]
struct DeliveredRows {
    players: HashMap<PlayerId, Player>,
    bits: HashMap<EntityId, Bit>,
    moons: HashMap<EntityId, Moon>,
    leaderboard: HashMap<PlayerId, LeaderboardEntry>,
    static_meta: bool,
    dynamic_meta: Option<DynamicMetadata>,
}

/// In-process backend serving one client
pub struct SimBackend {
    sender: EventSender,
    world: SimWorld,
    connected: bool,
    pending_connect: Option<ConnectRequest>,
    self_id: Option<PlayerId>,
    /// Issued tokens, for identity resumption across reconnects
    tokens: HashMap<SessionToken, PlayerId>,
    subscriptions: HashMap<u64, Vec<QueryPredicate>>,
    newly_applied: Vec<SubscriptionId>,
    next_sub_id: u64,
    delivered: DeliveredRows,
    tick_accum: f32,
}

impl SimBackend {
    pub fn new(sender: EventSender) -> Self {
        Self {
            sender,
            world: SimWorld::new(),
            connected: false,
            pending_connect: None,
            self_id: None,
            tokens: HashMap::new(),
            subscriptions: HashMap::new(),
            newly_applied: Vec::new(),
            next_sub_id: 0,
            delivered: DeliveredRows::default(),
            tick_accum: 0.0,
        }
    }

    /// Advance the simulation by one host frame and flush row events
    pub fn pump(&mut self, dt: f32) {
        if let Some(request) = self.pending_connect.take() {
            self.resolve_connect(request);
        }
        if !self.connected {
            return;
        }

        self.tick_accum += dt;
        let tick_dt = 1.0 / TICKS_PER_SECOND;
        while self.tick_accum >= tick_dt {
            self.tick_accum -= tick_dt;
            self.world.tick();
        }

        self.sync_visibility();

        for id in std::mem::take(&mut self.newly_applied) {
            self.sender.send(BackendEvent::SubscriptionApplied { id });
        }
    }

    /// Simulate a transport failure / server-initiated disconnect
    pub fn drop_connection(&mut self) {
        self.finish_disconnect();
    }

    /// Delete the client's own player row (elimination)
    pub fn kill_self(&mut self) {
        if let Some(identity) = self.self_id {
            self.world.remove_player(identity);
        }
    }

    /// Remove one bit the client can currently see, as if another player ate
    /// it. Returns false when nothing is visible.
    pub fn consume_one_visible_bit(&mut self) -> bool {
        let id = match self.delivered.bits.keys().next() {
            Some(id) => *id,
            None => return false,
        };
        self.world.bits.remove(&id);
        true
    }

    fn resolve_connect(&mut self, request: ConnectRequest) {
        let resumed = request
            .resume_token
            .as_ref()
            .and_then(|token| self.tokens.get(token).copied());
        let identity = resumed.unwrap_or_else(PlayerId::new_v4);
        let token = request
            .resume_token
            .filter(|t| self.tokens.contains_key(t))
            .unwrap_or_else(|| {
                let token = SessionToken::generate();
                self.tokens.insert(token.clone(), identity);
                token
            });

        if let Some(player) = self.world.players.get_mut(&identity) {
            player.row.online = true;
        } else {
            self.world.spawn_player(identity);
        }

        self.self_id = Some(identity);
        self.connected = true;
        debug!("sim: connected {} (resumed={})", identity, resumed.is_some());
        self.sender.send(BackendEvent::Connected { identity, token });
    }

    fn finish_disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;
        self.subscriptions.clear();
        self.newly_applied.clear();
        self.delivered = DeliveredRows::default();
        if let Some(identity) = self.self_id.take() {
            if let Some(player) = self.world.players.get_mut(&identity) {
                player.row.online = false;
            }
        }
        self.sender.send(BackendEvent::Disconnected);
    }

    /// Union of all active predicates for one table
    fn predicates_for(&self, table: Table) -> Vec<&QueryPredicate> {
        self.subscriptions
            .values()
            .flatten()
            .filter(|p| p.table == table)
            .collect()
    }

    /// Diff the world against what the client has and emit the difference
    fn sync_visibility(&mut self) {
        // Players: region or identity match
        let predicates = self.predicates_for(Table::Player);
        let wanted: HashMap<PlayerId, Player> = self
            .world
            .players
            .values()
            .filter(|p| {
                predicates.iter().any(|pred| match &pred.filter {
                    QueryFilter::Identity(id) => *id == p.row.identity,
                    _ => pred.matches_position(p.row.position),
                })
            })
            .map(|p| (p.row.identity, p.row.clone()))
            .collect();
        diff_keyed(&mut self.delivered.players, wanted, &self.sender, |event| {
            TableEvent::Player(event)
        });

        let predicates = self.predicates_for(Table::Bit);
        let wanted: HashMap<EntityId, Bit> = self
            .world
            .bits
            .values()
            .filter(|b| predicates.iter().any(|p| p.matches_position(b.position)))
            .map(|b| (b.id, b.clone()))
            .collect();
        diff_keyed(&mut self.delivered.bits, wanted, &self.sender, |event| {
            TableEvent::Bit(event)
        });

        let predicates = self.predicates_for(Table::Moon);
        let wanted: HashMap<EntityId, Moon> = self
            .world
            .moons
            .values()
            .filter(|m| predicates.iter().any(|p| p.matches_position(m.row.position)))
            .map(|m| (m.row.id, m.row.clone()))
            .collect();
        diff_keyed(&mut self.delivered.moons, wanted, &self.sender, |event| {
            TableEvent::Moon(event)
        });

        let wanted: HashMap<PlayerId, LeaderboardEntry> =
            if self.predicates_for(Table::Leaderboard).is_empty() {
                HashMap::new()
            } else {
                self.world.leaderboard.clone()
            };
        diff_keyed(
            &mut self.delivered.leaderboard,
            wanted,
            &self.sender,
            |event| TableEvent::Leaderboard(event),
        );

        // Metadata singletons
        let wants_static = !self.predicates_for(Table::StaticMetadata).is_empty();
        if wants_static && !self.delivered.static_meta {
            self.sender.send(BackendEvent::Row(TableEvent::StaticMetadata(
                RowEvent::Inserted(self.world.meta),
            )));
            self.delivered.static_meta = true;
        }

        let wants_dynamic = !self.predicates_for(Table::DynamicMetadata).is_empty();
        if wants_dynamic {
            match self.delivered.dynamic_meta {
                None => {
                    self.sender.send(BackendEvent::Row(TableEvent::DynamicMetadata(
                        RowEvent::Inserted(self.world.dynamic),
                    )));
                    self.delivered.dynamic_meta = Some(self.world.dynamic);
                }
                Some(prev) if prev != self.world.dynamic => {
                    self.sender.send(BackendEvent::Row(TableEvent::DynamicMetadata(
                        RowEvent::Updated(prev, self.world.dynamic),
                    )));
                    self.delivered.dynamic_meta = Some(self.world.dynamic);
                }
                _ => {}
            }
        }
    }
}

/// Emit inserts/updates/deletes so `delivered` converges on `wanted`
fn diff_keyed<K, T>(
    delivered: &mut HashMap<K, T>,
    wanted: HashMap<K, T>,
    sender: &EventSender,
    wrap: impl Fn(RowEvent<T>) -> TableEvent,
) where
    K: std::hash::Hash + Eq + Copy,
    T: Clone + PartialEq,
{
    let gone: Vec<K> = delivered
        .keys()
        .filter(|k| !wanted.contains_key(*k))
        .copied()
        .collect();
    for key in gone {
        if let Some(row) = delivered.remove(&key) {
            sender.send(BackendEvent::Row(wrap(RowEvent::Deleted(row))));
        }
    }

    for (key, row) in wanted {
        match delivered.get(&key) {
            None => {
                sender.send(BackendEvent::Row(wrap(RowEvent::Inserted(row.clone()))));
                delivered.insert(key, row);
            }
            Some(prev) if *prev != row => {
                let old = prev.clone();
                sender.send(BackendEvent::Row(wrap(RowEvent::Updated(old, row.clone()))));
                delivered.insert(key, row);
            }
            _ => {}
        }
    }
}

impl Backend for SimBackend {
    fn connect(&mut self, request: ConnectRequest) -> Result<(), ConnectError> {
        if self.connected || self.pending_connect.is_some() {
            return Err(ConnectError::AlreadyConnecting);
        }
        if request.endpoint.is_empty() {
            return Err(ConnectError::InvalidEndpoint(request.endpoint));
        }
        self.pending_connect = Some(request);
        Ok(())
    }

    fn subscribe(&mut self, predicates: Vec<QueryPredicate>) -> SubscriptionId {
        self.next_sub_id += 1;
        let id = SubscriptionId(self.next_sub_id);
        self.subscriptions.insert(self.next_sub_id, predicates);
        self.newly_applied.push(id);
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscriptions.remove(&id.0);
        self.newly_applied.retain(|pending| *pending != id);
    }

    fn call_action(&mut self, action: RemoteAction) {
        let identity = match self.self_id {
            Some(id) if self.connected => id,
            _ => return,
        };
        match action {
            RemoteAction::SetDirection { dir } => {
                if let Some(player) = self.world.players.get_mut(&identity) {
                    player.dir = dir;
                }
            }
            RemoteAction::SetProfile {
                username,
                color,
                seed,
            } => {
                if let Some(player) = self.world.players.get_mut(&identity) {
                    player.row.username = username;
                    player.row.color = color;
                    player.row.seed = seed;
                }
            }
            RemoteAction::SpawnMoon => {
                let mut rng = rand::thread_rng();
                self.world.spawn_orbiting_moon(identity, &mut rng);
            }
        }
    }

    fn disconnect(&mut self) {
        self.finish_disconnect();
    }
}

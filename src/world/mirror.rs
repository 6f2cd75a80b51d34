//! Local mirror of the backend-owned entity tables
//!
//! Pure cache: one keyed collection per table, mutated exclusively by row
//! events and reset wholesale on reconnect. No ordering is assumed between
//! tables; within one table, events for the same key are applied in receipt
//! order. Protocol anomalies (duplicate insert, delete of an unknown key) are
//! logged and absorbed, never raised.

use hashbrown::HashMap;
use tracing::{debug, warn};

use crate::world::entities::{
    Bit, DynamicMetadata, EntityId, LeaderboardEntry, Moon, Player, PlayerId, StaticMetadata,
};
use crate::world::events::{RowEvent, TableEvent};

/// Signal surfaced by [`EntityMirror::apply`] for events higher layers act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorSignal {
    /// The local player's own row was deleted (elimination or server kick);
    /// routed to the session's self-removal policy.
    SelfRemoved,
}

/// Eventually-consistent, AoI-filtered copy of the authoritative tables
#[derive(Debug, Default)]
pub struct EntityMirror {
    players: HashMap<PlayerId, Player>,
    bits: HashMap<EntityId, Bit>,
    moons: HashMap<EntityId, Moon>,
    leaderboard: HashMap<PlayerId, LeaderboardEntry>,
    static_metadata: Option<StaticMetadata>,
    dynamic_metadata: Option<DynamicMetadata>,
}

impl EntityMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one row event. `local` is the local player's identity, used to
    /// detect deletion of the self row.
    pub fn apply(&mut self, event: TableEvent, local: Option<PlayerId>) -> Option<MirrorSignal> {
        match event {
            TableEvent::Player(event) => {
                let deleted = apply_keyed("player", &mut self.players, event, |p| p.identity);
                match (deleted, local) {
                    (Some(gone), Some(me)) if gone == me => Some(MirrorSignal::SelfRemoved),
                    _ => None,
                }
            }
            TableEvent::Bit(event) => {
                apply_keyed("bit", &mut self.bits, event, |b| b.id);
                None
            }
            TableEvent::Moon(event) => {
                apply_keyed("moon", &mut self.moons, event, |m| m.id);
                None
            }
            TableEvent::Leaderboard(event) => {
                apply_keyed("leaderboard", &mut self.leaderboard, event, |e| e.identity);
                None
            }
            TableEvent::StaticMetadata(event) => {
                apply_singleton(&mut self.static_metadata, event);
                None
            }
            TableEvent::DynamicMetadata(event) => {
                apply_singleton(&mut self.dynamic_metadata, event);
                None
            }
        }
    }

    /// Drop every mirrored row. Called before a reconnect attempt so a new
    /// session never presents entities from the previous one.
    pub fn clear(&mut self) {
        self.players.clear();
        self.bits.clear();
        self.moons.clear();
        self.leaderboard.clear();
        self.static_metadata = None;
        self.dynamic_metadata = None;
        debug!("entity mirror cleared");
    }

    pub fn players(&self) -> &HashMap<PlayerId, Player> {
        &self.players
    }

    pub fn bits(&self) -> &HashMap<EntityId, Bit> {
        &self.bits
    }

    pub fn moons(&self) -> &HashMap<EntityId, Moon> {
        &self.moons
    }

    pub fn leaderboard(&self) -> &HashMap<PlayerId, LeaderboardEntry> {
        &self.leaderboard
    }

    pub fn static_metadata(&self) -> Option<&StaticMetadata> {
        self.static_metadata.as_ref()
    }

    pub fn dynamic_metadata(&self) -> Option<&DynamicMetadata> {
        self.dynamic_metadata.as_ref()
    }

    /// The local player's mirrored row, if it has arrived
    pub fn self_player(&self, local: PlayerId) -> Option<&Player> {
        self.players.get(&local)
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
            && self.bits.is_empty()
            && self.moons.is_empty()
            && self.leaderboard.is_empty()
            && self.static_metadata.is_none()
            && self.dynamic_metadata.is_none()
    }
}

/// Apply a row event to one keyed collection.
///
/// Update is remove-old-key then insert-new-key, since keys are independent
/// operations on backends that model updates as old/new row pairs. Returns the
/// deleted key for delete events so callers can match against the self row.
fn apply_keyed<K, T>(
    table: &'static str,
    map: &mut HashMap<K, T>,
    event: RowEvent<T>,
    key_of: impl Fn(&T) -> K,
) -> Option<K>
where
    K: std::hash::Hash + Eq + Copy + std::fmt::Debug,
{
    match event {
        RowEvent::Inserted(row) => {
            let key = key_of(&row);
            if map.insert(key, row).is_some() {
                warn!("duplicate insert for {} key {:?}, overwriting", table, key);
            }
            None
        }
        RowEvent::Updated(old, new) => {
            let old_key = key_of(&old);
            if map.remove(&old_key).is_none() {
                warn!("update for unknown {} key {:?}", table, old_key);
            }
            map.insert(key_of(&new), new);
            None
        }
        RowEvent::Deleted(row) => {
            let key = key_of(&row);
            if map.remove(&key).is_none() {
                warn!("delete for unknown {} key {:?}", table, key);
                None
            } else {
                Some(key)
            }
        }
    }
}

fn apply_singleton<T>(slot: &mut Option<T>, event: RowEvent<T>) {
    match event {
        RowEvent::Inserted(row) | RowEvent::Updated(_, row) => *slot = Some(row),
        RowEvent::Deleted(_) => *slot = None,
    }
}

// ============================================================================
// Transient fade-out store for deleted bits
// ============================================================================

/// A deleted bit held briefly for its shrink-out animation
#[derive(Debug, Clone)]
pub struct FadingBit {
    pub bit: Bit,
    /// Seconds of fade remaining
    pub remaining: f32,
    /// Full fade duration, for alpha computation
    pub duration: f32,
}

impl FadingBit {
    /// Fade progress from 1.0 (just deleted) down to 0.0 (gone)
    pub fn alpha(&self) -> f32 {
        if self.duration > 0.0 {
            (self.remaining / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Client-only fade records for deleted bits.
///
/// NOT authoritative state: the live bit is removed from the mirror the moment
/// its delete notification arrives; this store only feeds the renderer's
/// fade-out. At most one record exists per bit id.
#[derive(Debug, Default)]
pub struct BitFades {
    fading: HashMap<EntityId, FadingBit>,
}

impl BitFades {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) a fade for a just-deleted bit
    pub fn begin(&mut self, bit: Bit, duration: f32) {
        self.fading.insert(
            bit.id,
            FadingBit {
                bit,
                remaining: duration,
                duration,
            },
        );
    }

    /// Advance all fades by one frame, dropping finished ones
    pub fn tick(&mut self, dt: f32) {
        self.fading.retain(|_, fade| {
            fade.remaining -= dt;
            fade.remaining > 0.0
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &FadingBit> {
        self.fading.values()
    }

    pub fn len(&self) -> usize {
        self.fading.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fading.is_empty()
    }

    /// Cancel all pending fades (disconnect teardown)
    pub fn clear(&mut self) {
        self.fading.clear();
    }
}

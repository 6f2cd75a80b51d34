//! Mirrored entity definitions
//!
//! All rows here are backend-owned: the client never originates or destroys
//! them, it only holds an eventually-consistent, AoI-filtered copy. Transient
//! animation state (fade timers, smoothed display positions) lives in separate
//! structures layered on top, never in these types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::vec2::Vec2;

/// Stable identity assigned by the backend on connect
pub type PlayerId = Uuid;

/// Identifier for non-player entities (bits, moons)
pub type EntityId = u64;

/// RGB color as the backend stores it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color {
        r: 255,
        g: 255,
        b: 255,
    };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// A player blob
///
/// Created on first join broadcast, updated every simulation tick the player
/// moves or changes, deleted on disconnect or elimination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub identity: PlayerId,
    pub online: bool,
    pub username: String,
    pub position: Vec2,
    /// Blob radius in world units; grows and shrinks over the player's lifetime
    pub size: f32,
    pub color: Color,
    /// Random per-player seed for deterministic cosmetic variation
    pub seed: u64,
    /// Simulation ticks of spawn protection remaining
    pub invincibility_ticks: u32,
}

impl Player {
    pub fn is_invincible(&self) -> bool {
        self.invincibility_ticks > 0
    }
}

/// A collectible bit
///
/// Spawned and consumed frequently by the simulation. A deleted bit may keep a
/// client-only fade record for its shrink-out animation; that record is held
/// in [`crate::world::mirror::BitFades`], never here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bit {
    pub id: EntityId,
    pub position: Vec2,
    pub size: f32,
    pub color: Color,
}

/// A moon, either free-drifting or orbiting a player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Moon {
    pub id: EntityId,
    pub position: Vec2,
    pub size: f32,
    pub color: Color,
    /// Player this moon revolves around, if any. The backend owns the orbital
    /// motion; the client only smooths toward the reported samples.
    pub orbiting: Option<PlayerId>,
    /// Angular velocity in radians per tick; the sign is the direction of
    /// revolution.
    pub orbital_velocity: f32,
}

/// World constants, effectively immutable for a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StaticMetadata {
    pub world_width: f32,
    pub world_height: f32,
    pub ticks_per_second: f32,
    /// Cadence of the game-reset countdown counter
    pub reset_updates_per_second: f32,
}

impl StaticMetadata {
    /// Wrap bounds of the toroidal world
    pub fn bounds(&self) -> Vec2 {
        Vec2::new(self.world_width, self.world_height)
    }
}

/// Session-wide counters that mutate over a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DynamicMetadata {
    pub total_users: u32,
    pub updates_until_reset: u64,
}

impl DynamicMetadata {
    /// Seconds until the next full game reset, or 0 if the cadence is unknown
    pub fn seconds_until_reset(&self, meta: &StaticMetadata) -> u64 {
        if meta.reset_updates_per_second > 0.0 {
            (self.updates_until_reset as f32 / meta.reset_updates_per_second) as u64
        } else {
            0
        }
    }
}

/// One row of the leaderboard projection, refreshed wholesale by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub identity: PlayerId,
    pub username: String,
    pub size: f32,
    pub kills: u32,
    pub damage: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invincibility() {
        let mut player = Player {
            identity: Uuid::new_v4(),
            online: true,
            username: "tester".to_string(),
            position: Vec2::ZERO,
            size: 10.0,
            color: Color::WHITE,
            seed: 7,
            invincibility_ticks: 3,
        };
        assert!(player.is_invincible());
        player.invincibility_ticks = 0;
        assert!(!player.is_invincible());
    }

    #[test]
    fn test_seconds_until_reset() {
        let meta = StaticMetadata {
            world_width: 10_000.0,
            world_height: 10_000.0,
            ticks_per_second: 50.0,
            reset_updates_per_second: 2.0,
        };
        let dynamic = DynamicMetadata {
            total_users: 10,
            updates_until_reset: 240,
        };
        assert_eq!(dynamic.seconds_until_reset(&meta), 120);
    }

    #[test]
    fn test_seconds_until_reset_unknown_cadence() {
        let meta = StaticMetadata {
            world_width: 1.0,
            world_height: 1.0,
            ticks_per_second: 50.0,
            reset_updates_per_second: 0.0,
        };
        let dynamic = DynamicMetadata {
            total_users: 0,
            updates_until_reset: 500,
        };
        assert_eq!(dynamic.seconds_until_reset(&meta), 0);
    }

    #[test]
    fn test_row_serde_roundtrip() {
        let moon = Moon {
            id: 42,
            position: Vec2::new(10.0, 20.0),
            size: 4.0,
            color: Color::new(10, 20, 30),
            orbiting: Some(Uuid::new_v4()),
            orbital_velocity: -0.004,
        };
        let encoded = bincode::serde::encode_to_vec(&moon, bincode::config::standard()).unwrap();
        let (decoded, _): (Moon, usize) =
            bincode::serde::decode_from_slice(&encoded, bincode::config::standard()).unwrap();
        assert_eq!(decoded.id, 42);
        assert_eq!(decoded.orbiting, moon.orbiting);
    }
}

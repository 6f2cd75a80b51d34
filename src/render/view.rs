//! Read-only per-frame snapshot for the renderer
//!
//! A renderer gets authoritative rows paired with their smoothed display
//! positions, the smoothed camera, and the metadata/leaderboard projections.
//! No mutation access: everything borrows from the owning client for the
//! duration of one frame.

use crate::render::interp::InterpolationEngine;
use crate::render::trails::{MoonTrails, TrailPoint};
use crate::util::vec2::Vec2;
use crate::world::entities::{
    Bit, DynamicMetadata, EntityId, LeaderboardEntry, Moon, Player, PlayerId, StaticMetadata,
};
use crate::world::mirror::{BitFades, EntityMirror, FadingBit};

/// One frame's worth of drawable state
pub struct FrameView<'a> {
    mirror: &'a EntityMirror,
    interp: &'a InterpolationEngine,
    fades: &'a BitFades,
    trails: &'a MoonTrails,
    local: Option<PlayerId>,
}

impl<'a> FrameView<'a> {
    pub fn new(
        mirror: &'a EntityMirror,
        interp: &'a InterpolationEngine,
        fades: &'a BitFades,
        trails: &'a MoonTrails,
        local: Option<PlayerId>,
    ) -> Self {
        Self {
            mirror,
            interp,
            fades,
            trails,
            local,
        }
    }

    /// Smoothed camera position; None before the self row has been seen
    pub fn camera(&self) -> Option<Vec2> {
        self.interp.camera()
    }

    /// The local player's identity, if connected
    pub fn local_identity(&self) -> Option<PlayerId> {
        self.local
    }

    /// The local player's authoritative row, if mirrored
    pub fn self_player(&self) -> Option<&'a Player> {
        self.local.and_then(|id| self.mirror.self_player(id))
    }

    /// Every live player with its smoothed display position
    pub fn players(&self) -> impl Iterator<Item = (&'a Player, Vec2)> + '_ {
        self.mirror.players().values().map(|player| {
            let display = self
                .interp
                .players()
                .get(&player.identity)
                .copied()
                .unwrap_or(player.position);
            (player, display)
        })
    }

    /// Every live bit with its smoothed display position
    pub fn bits(&self) -> impl Iterator<Item = (&'a Bit, Vec2)> + '_ {
        self.mirror.bits().values().map(|bit| {
            let display = self
                .interp
                .bits()
                .get(&bit.id)
                .copied()
                .unwrap_or(bit.position);
            (bit, display)
        })
    }

    /// Every live moon with its smoothed display position
    pub fn moons(&self) -> impl Iterator<Item = (&'a Moon, Vec2)> + '_ {
        self.mirror.moons().values().map(|moon| {
            let display = self
                .interp
                .moons()
                .get(&moon.id)
                .copied()
                .unwrap_or(moon.position);
            (moon, display)
        })
    }

    /// Transient fade-out records for recently deleted bits. Client-only
    /// animation state, NOT live entities.
    pub fn removing_bits(&self) -> impl Iterator<Item = &'a FadingBit> {
        self.fades.iter()
    }

    /// Display-position history for one moon's trail ribbon
    pub fn moon_trail(&self, id: EntityId) -> Option<&'a [TrailPoint]> {
        self.trails.get(id)
    }

    pub fn static_metadata(&self) -> Option<&'a StaticMetadata> {
        self.mirror.static_metadata()
    }

    pub fn dynamic_metadata(&self) -> Option<&'a DynamicMetadata> {
        self.mirror.dynamic_metadata()
    }

    /// Leaderboard entries ordered by rank
    pub fn leaderboard(&self) -> Vec<&'a LeaderboardEntry> {
        let mut entries: Vec<_> = self.mirror.leaderboard().values().collect();
        entries.sort_by_key(|e| e.rank);
        entries
    }

    /// Seconds until the next full game reset, when both metadata rows are in
    pub fn seconds_until_reset(&self) -> Option<u64> {
        let meta = self.mirror.static_metadata()?;
        let dynamic = self.mirror.dynamic_metadata()?;
        Some(dynamic.seconds_until_reset(meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::vec2::Vec2;
    use crate::world::entities::Color;
    use crate::world::events::{RowEvent, TableEvent};
    use uuid::Uuid;

    #[test]
    fn test_leaderboard_sorted_by_rank() {
        let mut mirror = EntityMirror::new();
        for (rank, name) in [(3u32, "c"), (1, "a"), (2, "b")] {
            mirror.apply(
                TableEvent::Leaderboard(RowEvent::Inserted(LeaderboardEntry {
                    rank,
                    identity: Uuid::new_v4(),
                    username: name.to_string(),
                    size: 10.0,
                    kills: 0,
                    damage: 0.0,
                })),
                None,
            );
        }
        let interp = InterpolationEngine::new();
        let fades = BitFades::new();
        let trails = MoonTrails::new();
        let view = FrameView::new(&mirror, &interp, &fades, &trails, None);

        let names: Vec<_> = view.leaderboard().iter().map(|e| e.username.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_positions_fall_back_to_authoritative() {
        let mut mirror = EntityMirror::new();
        mirror.apply(
            TableEvent::Bit(RowEvent::Inserted(Bit {
                id: 1,
                position: Vec2::new(7.0, 9.0),
                size: 1.0,
                color: Color::WHITE,
            })),
            None,
        );
        // No interpolation pass has run yet
        let interp = InterpolationEngine::new();
        let fades = BitFades::new();
        let trails = MoonTrails::new();
        let view = FrameView::new(&mirror, &interp, &fades, &trails, None);

        let (_, display) = view.bits().next().unwrap();
        assert_eq!(display, Vec2::new(7.0, 9.0));
    }
}

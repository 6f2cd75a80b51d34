//! Moon trail history
//!
//! A short ribbon of recent display positions per moon, faded out by the
//! renderer. Trail points for an orbiting moon are stored relative to the
//! orbit parent's display position so the ribbon revolves with the parent
//! instead of smearing behind it; free moons store absolute positions.
//! Client-only animation state, derived entirely from smoothed positions.

use rustc_hash::FxHashMap;

use crate::render::interp::InterpolationEngine;
use crate::util::vec2::Vec2;
use crate::world::entities::{EntityId, PlayerId};
use crate::world::mirror::EntityMirror;

/// Kept trail points per moon
const TRAIL_LEN: usize = 20;

/// One historical display sample
#[derive(Debug, Clone, Copy)]
pub struct TrailPoint {
    /// Offset from the orbit parent's display position, or an absolute world
    /// position for free moons
    pub offset: Vec2,
    pub parent: Option<PlayerId>,
}

/// Rolling display-position history for every live moon
#[derive(Debug, Default)]
pub struct MoonTrails {
    trails: FxHashMap<EntityId, Vec<TrailPoint>>,
}

impl MoonTrails {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append this frame's display positions and drop trails of moons that no
    /// longer exist
    pub fn update(&mut self, mirror: &EntityMirror, interp: &InterpolationEngine) {
        let bounds = match mirror.static_metadata() {
            Some(meta) => meta.bounds(),
            None => return,
        };

        for (id, moon) in mirror.moons() {
            let display = match interp.moons().get(id) {
                Some(display) => *display,
                None => continue,
            };

            let point = match moon.orbiting {
                Some(parent_id) => match interp.players().get(&parent_id) {
                    Some(parent_display) => TrailPoint {
                        offset: parent_display.wrapped_delta_to(display, bounds),
                        parent: Some(parent_id),
                    },
                    // Parent outside the AoI: skip the frame rather than
                    // record a bogus absolute point
                    None => continue,
                },
                None => TrailPoint {
                    offset: display,
                    parent: None,
                },
            };

            let trail = self.trails.entry(*id).or_default();
            trail.push(point);
            if trail.len() > TRAIL_LEN {
                trail.remove(0);
            }
        }

        self.trails.retain(|id, _| mirror.moons().contains_key(id));
    }

    pub fn get(&self, id: EntityId) -> Option<&[TrailPoint]> {
        self.trails.get(&id).map(|t| t.as_slice())
    }

    pub fn len(&self) -> usize {
        self.trails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trails.is_empty()
    }

    pub fn clear(&mut self) {
        self.trails.clear();
    }
}

//! Wrap-aware interpolation of authoritative positions
//!
//! Authoritative samples arrive at the simulation tick rate; frames render
//! much more often. Every displayed frame this engine advances a smoothed
//! position per live entity (and for the camera) toward the latest sample,
//! using a frame-rate-independent exponential factor, and always taking the
//! shorter arc across the toroidal seam so nothing visibly teleports when it
//! wraps.

use rustc_hash::FxHashMap;
use std::f32::consts::{PI, TAU};

use crate::util::vec2::Vec2;
use crate::world::entities::{EntityId, PlayerId};
use crate::world::mirror::EntityMirror;

/// Fraction of the remaining distance covered this frame.
///
/// `1 - exp(-dt * ticks_per_second)`: the displayed value converges on the
/// authoritative one within roughly one simulation tick regardless of the
/// display frame rate, and composing two half-frames equals one whole frame.
#[inline]
pub fn smoothing_alpha(dt: f32, ticks_per_second: f32) -> f32 {
    1.0 - (-dt * ticks_per_second).exp()
}

/// Move `prev` toward `next` by `alpha` along the shorter arc of a wrapping
/// axis of the given size; the result is normalized back into `[0, size)`.
pub fn wrap_lerp(prev: f32, next: f32, alpha: f32, size: f32) -> f32 {
    let mut prev = prev;
    let mut delta = next - prev;
    if delta.abs() > size / 2.0 {
        // Shorter to approach across the seam
        if delta > 0.0 {
            prev += size;
        } else {
            prev -= size;
        }
        delta = next - prev;
    }
    let mut result = prev + delta * alpha;
    if result < 0.0 {
        result += size;
    }
    if result >= size {
        result -= size;
    }
    result
}

/// Per-axis [`wrap_lerp`]
#[inline]
pub fn wrap_lerp_vec(prev: Vec2, next: Vec2, alpha: f32, bounds: Vec2) -> Vec2 {
    Vec2::new(
        wrap_lerp(prev.x, next.x, alpha, bounds.x),
        wrap_lerp(prev.y, next.y, alpha, bounds.y),
    )
}

/// Interpolate an angle along the shortest angular path, wrapping at ±π
fn angle_lerp(prev: f32, next: f32, alpha: f32) -> f32 {
    let mut delta = next - prev;
    while delta > PI {
        delta -= TAU;
    }
    while delta < -PI {
        delta += TAU;
    }
    prev + delta * alpha
}

/// Smoothed display position of an orbiting moon.
///
/// Linear smoothing in Cartesian space would cut across the orbit's interior,
/// so the offset from the orbit parent is smoothed in polar form instead:
/// shortest-path on the angle, linear on the radius, with the parent's own
/// display position smoothed separately by the wrapped primitive.
fn orbital_lerp(
    moon_prev_display: Vec2,
    moon_next_auth: Vec2,
    parent_prev_display: Vec2,
    parent_next_auth: Vec2,
    parent_new_display: Vec2,
    alpha: f32,
    bounds: Vec2,
) -> Vec2 {
    let prev_offset = parent_prev_display.wrapped_delta_to(moon_prev_display, bounds);
    let next_offset = parent_next_auth.wrapped_delta_to(moon_next_auth, bounds);

    let radius = prev_offset.length() + (next_offset.length() - prev_offset.length()) * alpha;
    let angle = angle_lerp(prev_offset.angle(), next_offset.angle(), alpha);

    (parent_new_display + Vec2::from_angle(angle) * radius).wrap(bounds)
}

/// Per-frame smoothed positions for every live entity and the camera
///
/// Purely reactive to whatever the mirror currently contains: entities gone
/// from the mirror lose their record in the same pass, new entities are
/// seeded directly from their first authoritative sample.
#[derive(Debug, Default)]
pub struct InterpolationEngine {
    players: FxHashMap<PlayerId, Vec2>,
    bits: FxHashMap<EntityId, Vec2>,
    moons: FxHashMap<EntityId, Vec2>,
    camera: Option<Vec2>,
}

impl InterpolationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance one displayed frame. A no-op until the world metadata has
    /// arrived (wrap bounds and tick rate are needed first).
    pub fn advance(&mut self, dt: f32, mirror: &EntityMirror, local: Option<PlayerId>) {
        let meta = match mirror.static_metadata() {
            Some(m) => m,
            None => return,
        };
        let bounds = meta.bounds();
        let alpha = smoothing_alpha(dt, meta.ticks_per_second);

        // Players first: moons need both the previous and the new display
        // position of their orbit parent.
        let prev_players = std::mem::take(&mut self.players);
        for (id, player) in mirror.players() {
            let prev = prev_players.get(id).copied().unwrap_or(player.position);
            self.players
                .insert(*id, wrap_lerp_vec(prev, player.position, alpha, bounds));
        }

        // Camera tracks the local player's row instead of snapping to it
        if let Some(me) = local {
            if let Some(player) = mirror.players().get(&me) {
                let prev = self.camera.unwrap_or(player.position);
                self.camera = Some(wrap_lerp_vec(prev, player.position, alpha, bounds));
            }
        }

        let prev_bits = std::mem::take(&mut self.bits);
        for (id, bit) in mirror.bits() {
            let prev = prev_bits.get(id).copied().unwrap_or(bit.position);
            self.bits
                .insert(*id, wrap_lerp_vec(prev, bit.position, alpha, bounds));
        }

        let prev_moons = std::mem::take(&mut self.moons);
        for (id, moon) in mirror.moons() {
            let prev = prev_moons.get(id).copied().unwrap_or(moon.position);
            let display = match moon.orbiting {
                Some(parent_id) => {
                    let parent_auth = mirror.players().get(&parent_id);
                    let parent_prev = prev_players.get(&parent_id);
                    let parent_new = self.players.get(&parent_id);
                    match (parent_auth, parent_prev, parent_new) {
                        (Some(parent), Some(&prev_disp), Some(&new_disp)) => orbital_lerp(
                            prev,
                            moon.position,
                            prev_disp,
                            parent.position,
                            new_disp,
                            alpha,
                            bounds,
                        ),
                        // Parent not mirrored (outside AoI) or just appeared:
                        // fall back to plain wrapped smoothing
                        _ => wrap_lerp_vec(prev, moon.position, alpha, bounds),
                    }
                }
                None => wrap_lerp_vec(prev, moon.position, alpha, bounds),
            };
            self.moons.insert(*id, display);
        }
    }

    pub fn players(&self) -> &FxHashMap<PlayerId, Vec2> {
        &self.players
    }

    pub fn bits(&self) -> &FxHashMap<EntityId, Vec2> {
        &self.bits
    }

    pub fn moons(&self) -> &FxHashMap<EntityId, Vec2> {
        &self.moons
    }

    /// Smoothed camera position; None until the self row has been seen
    pub fn camera(&self) -> Option<Vec2> {
        self.camera
    }

    /// Drop all smoothed state (disconnect teardown)
    pub fn clear(&mut self) {
        self.players.clear();
        self.bits.clear();
        self.moons.clear();
        self.camera = None;
    }
}

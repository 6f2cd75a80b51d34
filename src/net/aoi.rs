//! Area-of-Interest subscription engine
//!
//! As the local player moves through the wrapping world, this engine decides
//! which region of world space the backend should stream rows for. It builds
//! a union of axis-aligned boxes (the viewport box plus wrapped duplicates at
//! edges and corners), issues one subscription covering bits, moons and
//! players, and re-issues it only when the player has moved further than the
//! buffer distance since the last issuance.
//!
//! A replaced subscription is released only after the new one is confirmed,
//! so there is never a visibility gap between the two.

use smallvec::smallvec;
use tracing::debug;

use crate::net::backend::Backend;
use crate::net::protocol::{AoiBox, AoiBoxes, QueryPredicate, SubscriptionId, Table};
use crate::util::vec2::{wrap_coord, Vec2};
use crate::world::entities::{Player, StaticMetadata};

/// Region sizing parameters
#[derive(Debug, Clone)]
pub struct AoiConfig {
    /// Extra world units subscribed beyond the viewport on every side; also
    /// the movement distance that invalidates the previous region
    pub buffer: f32,
    /// Additional buffer for player rows (players deserve a wider AoI than
    /// items for fair visibility)
    pub player_extra_buffer: f32,
    /// Viewport edge length derived from player size: `size * per_size + base`
    pub viewport_per_size: f32,
    pub viewport_base: f32,
    /// Clamp bounds for the derived viewport edge length
    pub viewport_min: f32,
    pub viewport_max: f32,
}

impl Default for AoiConfig {
    fn default() -> Self {
        Self {
            buffer: 200.0,
            player_extra_buffer: 100.0,
            viewport_per_size: 20.0,
            viewport_base: 200.0,
            viewport_min: 200.0,
            viewport_max: 1500.0,
        }
    }
}

impl AoiConfig {
    /// Square viewport edge length for a player of the given size
    pub fn viewport_edge(&self, size: f32) -> f32 {
        (size * self.viewport_per_size + self.viewport_base)
            .clamp(self.viewport_min, self.viewport_max)
    }
}

/// Build the wrap-aware box union for a viewport centered at `center` with
/// the given half-extent plus buffer, on a torus of the given bounds.
///
/// Total and pure for any center; out-of-range centers are wrapped into
/// bounds first. Yields one box far from the seams, two when one edge wraps,
/// four when the viewport straddles a world corner.
pub fn wrapped_region(center: Vec2, half_extent: Vec2, buffer: f32, bounds: Vec2) -> AoiBoxes {
    let cx = wrap_coord(center.x.round(), bounds.x);
    let cy = wrap_coord(center.y.round(), bounds.y);
    let (w, h) = (bounds.x, bounds.y);

    let lo_x = cx - half_extent.x - buffer;
    let hi_x = cx + half_extent.x + buffer;
    let lo_y = cy - half_extent.y - buffer;
    let hi_y = cy + half_extent.y + buffer;

    let west = lo_x < 0.0;
    let east = hi_x > w;
    let north = lo_y < 0.0;
    let south = hi_y > h;

    let mut boxes: AoiBoxes = smallvec![AoiBox::new(lo_x, hi_x, lo_y, hi_y)];

    if west {
        boxes.push(AoiBox::new(w + lo_x, w, lo_y, hi_y));
    }
    if east {
        boxes.push(AoiBox::new(0.0, hi_x - w, lo_y, hi_y));
    }
    if north {
        boxes.push(AoiBox::new(lo_x, hi_x, h + lo_y, h));
    }
    if south {
        boxes.push(AoiBox::new(lo_x, hi_x, 0.0, hi_y - h));
    }
    if west && north {
        boxes.push(AoiBox::new(w + lo_x, w, h + lo_y, h));
    }
    if east && north {
        boxes.push(AoiBox::new(0.0, hi_x - w, h + lo_y, h));
    }
    if west && south {
        boxes.push(AoiBox::new(w + lo_x, w, 0.0, hi_y - h));
    }
    if east && south {
        boxes.push(AoiBox::new(0.0, hi_x - w, 0.0, hi_y - h));
    }

    boxes
}

/// Debounced AoI subscription manager
pub struct AoiEngine {
    config: AoiConfig,
    /// Center of the last issued region; None until the first issuance
    issued_center: Option<Vec2>,
    /// Confirmed subscription currently serving rows
    active: Option<SubscriptionId>,
    /// Issued but not yet confirmed replacement
    pending: Option<SubscriptionId>,
}

impl AoiEngine {
    pub fn new(config: AoiConfig) -> Self {
        Self {
            config,
            issued_center: None,
            active: None,
            pending: None,
        }
    }

    pub fn config(&self) -> &AoiConfig {
        &self.config
    }

    /// Re-evaluate once per frame. Idle until the self row and the world
    /// metadata have both arrived. Returns true when a new subscription was
    /// issued this call.
    pub fn maintain(
        &mut self,
        self_player: Option<&Player>,
        meta: Option<&StaticMetadata>,
        backend: &mut dyn Backend,
    ) -> bool {
        let (player, meta) = match (self_player, meta) {
            (Some(p), Some(m)) => (p, m),
            _ => return false,
        };

        let bounds = meta.bounds();
        let center = Vec2::new(
            wrap_coord(player.position.x.round(), bounds.x),
            wrap_coord(player.position.y.round(), bounds.y),
        );

        if let Some(prev) = self.issued_center {
            let moved_x = (center.x - prev.x).abs();
            let moved_y = (center.y - prev.y).abs();
            if moved_x < self.config.buffer && moved_y < self.config.buffer {
                return false;
            }
        }

        let half = Vec2::new(
            self.config.viewport_edge(player.size) / 2.0,
            self.config.viewport_edge(player.size) / 2.0,
        );
        let item_boxes = wrapped_region(center, half, self.config.buffer, bounds);
        let player_boxes = wrapped_region(
            center,
            half,
            self.config.buffer + self.config.player_extra_buffer,
            bounds,
        );

        let predicates = vec![
            QueryPredicate::region(Table::Bit, item_boxes.clone()),
            QueryPredicate::region(Table::Moon, item_boxes),
            QueryPredicate::region(Table::Player, player_boxes),
        ];

        let id = backend.subscribe(predicates);
        debug!(
            "AoI re-issued at ({}, {}) as {:?}",
            center.x, center.y, id
        );

        // A still-unconfirmed predecessor is superseded outright; the active
        // one keeps serving until the replacement is confirmed.
        if let Some(stale) = self.pending.replace(id) {
            backend.unsubscribe(stale);
        }
        self.issued_center = Some(center);
        true
    }

    /// Handle a subscription confirmation. Releases the replaced subscription
    /// once its successor is live; confirmations for foreign handles (e.g.
    /// the session's initial subscription) are ignored.
    pub fn confirm(&mut self, id: SubscriptionId, backend: &mut dyn Backend) {
        if self.pending == Some(id) {
            self.pending = None;
            if let Some(old) = self.active.replace(id) {
                backend.unsubscribe(old);
            }
        }
    }

    /// Forget all issued state. Called on disconnect: the handles died with
    /// the connection, so nothing is unsubscribed.
    pub fn reset(&mut self) {
        self.issued_center = None;
        self.active = None;
        self.pending = None;
    }
}

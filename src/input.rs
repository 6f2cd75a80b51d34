//! Movement-intent translation
//!
//! Raw directional key state becomes a normalized 2D intent vector. The
//! backend is told about the vector only when it changes; holding a key steady
//! across frames produces no traffic.

use crate::net::backend::Backend;
use crate::net::protocol::RemoteAction;
use crate::util::vec2::Vec2;

/// Held state of the four directional inputs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionKeys {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl DirectionKeys {
    /// Normalized intent vector; opposing keys cancel, diagonals have unit
    /// length. Y grows downward, matching world coordinates.
    pub fn intent(&self) -> Vec2 {
        let x = (self.right as i8 - self.left as i8) as f32;
        let y = (self.down as i8 - self.up as i8) as f32;
        Vec2::new(x, y).normalize()
    }
}

/// Forwards intent changes to the backend, deduplicating repeats
#[derive(Debug, Default)]
pub struct IntentTracker {
    last_sent: Option<Vec2>,
}

impl IntentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the held keys; sends `SetDirection` only when the resulting
    /// vector differs from the last one sent.
    pub fn update(&mut self, keys: DirectionKeys, backend: &mut dyn Backend) {
        let dir = keys.intent();
        if self.last_sent == Some(dir) {
            return;
        }
        backend.call_action(RemoteAction::SetDirection { dir });
        self.last_sent = Some(dir);
    }

    /// Forget the last sent vector so the next update always sends (used
    /// after a reconnect, when the new session has no intent on record)
    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}

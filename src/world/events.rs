//! Row-change notifications from the backend
//!
//! Insert/update/delete callbacks are modeled as a tagged union consumed by a
//! single dispatch loop, rather than per-table observer lists. The backend
//! (or its transport adapter) produces [`TableEvent`]s; the frame loop drains
//! them and applies each to the mirror.

use crate::world::entities::{
    Bit, DynamicMetadata, LeaderboardEntry, Moon, Player, StaticMetadata,
};

/// One change to a single row of one table
///
/// `Updated` carries both the old and new row values because some backends
/// model an update as a distinct old/new pair; the mirror treats it as a
/// remove-then-insert so key changes are handled for free.
#[derive(Debug, Clone)]
pub enum RowEvent<T> {
    Inserted(T),
    Updated(T, T),
    Deleted(T),
}

impl<T> RowEvent<T> {
    /// The row value this event settles on (new value for updates)
    pub fn row(&self) -> &T {
        match self {
            RowEvent::Inserted(row) => row,
            RowEvent::Updated(_, row) => row,
            RowEvent::Deleted(row) => row,
        }
    }
}

/// A row change on any of the mirrored tables
#[derive(Debug, Clone)]
pub enum TableEvent {
    Player(RowEvent<Player>),
    Bit(RowEvent<Bit>),
    Moon(RowEvent<Moon>),
    StaticMetadata(RowEvent<StaticMetadata>),
    DynamicMetadata(RowEvent<DynamicMetadata>),
    Leaderboard(RowEvent<LeaderboardEntry>),
}

impl TableEvent {
    /// Table name as the backend's subscription language spells it
    pub fn table_name(&self) -> &'static str {
        match self {
            TableEvent::Player(_) => "player",
            TableEvent::Bit(_) => "bit",
            TableEvent::Moon(_) => "moon",
            TableEvent::StaticMetadata(_) => "static_metadata",
            TableEvent::DynamicMetadata(_) => "dynamic_metadata",
            TableEvent::Leaderboard(_) => "leaderboard",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::vec2::Vec2;
    use crate::world::entities::Color;

    fn bit(id: u64, x: f32) -> Bit {
        Bit {
            id,
            position: Vec2::new(x, 0.0),
            size: 1.0,
            color: Color::WHITE,
        }
    }

    #[test]
    fn test_row_event_row() {
        assert_eq!(RowEvent::Inserted(bit(1, 0.0)).row().id, 1);
        assert_eq!(RowEvent::Updated(bit(1, 0.0), bit(2, 5.0)).row().id, 2);
        assert_eq!(RowEvent::Deleted(bit(3, 0.0)).row().id, 3);
    }

    #[test]
    fn test_table_names() {
        let event = TableEvent::Bit(RowEvent::Inserted(bit(1, 0.0)));
        assert_eq!(event.table_name(), "bit");
    }
}

//! Types crossing the backend boundary
//!
//! The concrete wire encoding and handshake are out of scope; these are the
//! structured forms the client core hands to (and receives from) whatever
//! transport adapter implements [`crate::net::backend::Backend`]. Subscription
//! predicates also render to the backend's filter-expression text form.

use smallvec::SmallVec;

use crate::net::token::SessionToken;
use crate::util::vec2::Vec2;
use crate::world::entities::{Color, PlayerId};
use crate::world::events::TableEvent;

/// Handle identifying one issued subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Mirrored tables, named as the backend's query language spells them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Player,
    Bit,
    Moon,
    StaticMetadata,
    DynamicMetadata,
    Leaderboard,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Player => "player",
            Table::Bit => "bit",
            Table::Moon => "moon",
            Table::StaticMetadata => "static_metadata",
            Table::DynamicMetadata => "dynamic_metadata",
            Table::Leaderboard => "leaderboard",
        }
    }
}

/// One axis-aligned region of world space, open-intervaled like the backend's
/// comparison operators
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AoiBox {
    pub x0: f32,
    pub x1: f32,
    pub y0: f32,
    pub y1: f32,
}

impl AoiBox {
    pub fn new(x0: f32, x1: f32, y0: f32, y1: f32) -> Self {
        Self { x0, x1, y0, y1 }
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x > self.x0 && p.x < self.x1 && p.y > self.y0 && p.y < self.y1
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    fn sql_clause(&self) -> String {
        format!(
            "(x > {} AND x < {} AND y > {} AND y < {})",
            self.x0, self.x1, self.y0, self.y1
        )
    }
}

/// Union of wrap-aware boxes; never more than four (base + two edges + corner)
pub type AoiBoxes = SmallVec<[AoiBox; 4]>;

/// Row filter for one table's subscription
#[derive(Debug, Clone)]
pub enum QueryFilter {
    /// Every row (metadata, leaderboard)
    All,
    /// Exactly one player's row
    Identity(PlayerId),
    /// All rows positioned inside the box union
    Region(AoiBoxes),
}

/// A subscription predicate for one table
#[derive(Debug, Clone)]
pub struct QueryPredicate {
    pub table: Table,
    pub filter: QueryFilter,
}

impl QueryPredicate {
    pub fn all(table: Table) -> Self {
        Self {
            table,
            filter: QueryFilter::All,
        }
    }

    pub fn identity(table: Table, identity: PlayerId) -> Self {
        Self {
            table,
            filter: QueryFilter::Identity(identity),
        }
    }

    pub fn region(table: Table, boxes: AoiBoxes) -> Self {
        Self {
            table,
            filter: QueryFilter::Region(boxes),
        }
    }

    /// Render to the backend's filter-expression string form
    pub fn to_sql(&self) -> String {
        let base = format!("SELECT * FROM {}", self.table.as_str());
        match &self.filter {
            QueryFilter::All => base,
            QueryFilter::Identity(identity) => {
                format!("{} WHERE identity = '{}'", base, identity)
            }
            QueryFilter::Region(boxes) => {
                let clauses: Vec<String> = boxes.iter().map(|b| b.sql_clause()).collect();
                format!("{} WHERE ({})", base, clauses.join(" OR "))
            }
        }
    }

    /// Whether a row at this position matches the filter (identity filters
    /// never match by position)
    pub fn matches_position(&self, p: Vec2) -> bool {
        match &self.filter {
            QueryFilter::All => true,
            QueryFilter::Identity(_) => false,
            QueryFilter::Region(boxes) => boxes.iter().any(|b| b.contains(p)),
        }
    }
}

/// Intent calls forwarded fire-and-forget to the backend
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteAction {
    /// Normalized movement intent vector
    SetDirection { dir: Vec2 },
    /// Presence announcement: display name plus cosmetic variation inputs
    SetProfile {
        username: String,
        color: Color,
        seed: u64,
    },
    /// Sacrifice health to spawn an orbiting moon
    SpawnMoon,
}

/// Connection request handed to the transport adapter
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub endpoint: String,
    pub module: String,
    /// Resume as the same identity when present
    pub resume_token: Option<SessionToken>,
}

/// Why a connect attempt could not be started or completed
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConnectError {
    #[error("a connect attempt is already in flight")]
    AlreadyConnecting,
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Asynchronous notifications from the transport adapter, delivered through
/// the frame loop's event buffer
#[derive(Debug, Clone)]
pub enum BackendEvent {
    /// Handshake succeeded; the backend assigned (or resumed) this identity
    Connected {
        identity: PlayerId,
        token: SessionToken,
    },
    /// Connect attempt failed before a session was established
    ConnectFailed { reason: String },
    /// Transport failure or server-initiated disconnect
    Disconnected,
    /// A previously issued subscription is now serving rows
    SubscriptionApplied { id: SubscriptionId },
    /// One row changed in one mirrored table
    Row(TableEvent),
}

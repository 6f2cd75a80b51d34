//! Moonbits Client Core
//!
//! The client half of a toroidal-world multiplayer game: an area-of-interest
//! subscription engine, a local mirror of backend-owned entity tables, a
//! reconnecting session state machine, and a wrap-aware interpolation layer
//! that turns sparse tick-rate updates into smooth per-frame positions.
//!
//! The realtime backend is consumed through the abstract [`net::backend::Backend`]
//! trait; rendering consumes the read-only [`render::view::FrameView`] produced
//! each frame by [`client::GameClient`].
//!
//! # Features
//!
//! - `sim` - Bundled in-process simulation backend for headless runs and
//!   end-to-end tests (enabled by default)

pub mod client;
pub mod config;
pub mod input;
pub mod net;
pub mod render;
pub mod stats;
pub mod util;
pub mod world;

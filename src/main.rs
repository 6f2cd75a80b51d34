mod client;
mod config;
mod input;
mod net;
mod render;
mod stats;
mod util;
mod world;

use std::time::{Duration, Instant};
use tracing::{info, Level};

use crate::client::GameClient;
use crate::config::ClientConfig;
use crate::input::DirectionKeys;
use crate::net::backend::EventBuffer;
use crate::net::sim::SimBackend;
use crate::net::token::FileTokenStore;

/// Render frame cadence for the headless loop
const FRAME_RATE: u32 = 60;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    info!("Moonbits client v{}", env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::load_or_default();
    config.validate().map_err(anyhow::Error::msg)?;
    info!(
        "Configuration loaded: endpoint={}, module={}, username={}",
        config.endpoint, config.module, config.username
    );

    // Headless run against the bundled simulation backend: same core, no
    // rendering surface
    let events = EventBuffer::new(config.event_buffer_capacity);
    let backend = SimBackend::new(events.sender());
    let store = FileTokenStore::new(&config.data_dir);
    let mut client = GameClient::new(config, backend, store, events);

    client.connect();

    let frame_dt = 1.0 / FRAME_RATE as f32;
    let mut ticker = tokio::time::interval(Duration::from_secs_f32(frame_dt));
    let mut last_report = Instant::now();
    let started = Instant::now();

    // Wander in a slow square so the AoI engine gets exercised
    const HEADINGS: [DirectionKeys; 4] = [
        DirectionKeys {
            up: false,
            down: false,
            left: false,
            right: true,
        },
        DirectionKeys {
            up: false,
            down: true,
            left: false,
            right: false,
        },
        DirectionKeys {
            up: false,
            down: false,
            left: true,
            right: false,
        },
        DirectionKeys {
            up: true,
            down: false,
            left: false,
            right: false,
        },
    ];

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                client.backend_mut().pump(frame_dt);
                client.frame(frame_dt);

                // Change is deduplicated downstream; only the transitions
                // reach the backend
                let heading = (started.elapsed().as_secs() / 3) as usize % HEADINGS.len();
                client.set_direction(HEADINGS[heading]);

                if last_report.elapsed() >= Duration::from_secs(2) {
                    last_report = Instant::now();
                    let view = client.view();
                    info!(
                        "state={:?} camera={:?} players={} bits={} moons={} reset_in={:?}s",
                        client.session_state(),
                        view.camera().map(|c| (c.x as i32, c.y as i32)),
                        view.players().count(),
                        view.bits().count(),
                        view.moons().count(),
                        view.seconds_until_reset(),
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    client.leave();
    info!("Final stats: {}", client.stats().snapshot());
    Ok(())
}

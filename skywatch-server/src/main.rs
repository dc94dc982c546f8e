use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use tokio_graceful_shutdown::{SubsystemBuilder, Toplevel};

use skywatch_core::{Engine, EngineConfig, Zone};
use skywatch_server::feed::HttpDroneFeed;
use skywatch_server::pilots::HttpPilotResolver;
use skywatch_server::poll::PollCycle;
use skywatch_server::shared::SharedEngine;
use skywatch_server::web::{self, AppState};

#[derive(Parser, Debug)]
#[command(name = "skywatch-server", version, about = "No-fly-zone violation tracker")]
struct Args {
    /// URL of the drone position feed
    #[arg(long)]
    feed_url: String,

    /// Base URL of the pilot registry (serial number is appended)
    #[arg(long)]
    pilot_url: String,

    /// Address for the REST API
    #[arg(long, default_value = "0.0.0.0:3000")]
    listen_addr: SocketAddr,

    /// Feed poll interval in milliseconds
    #[arg(long, default_value_t = 2_000)]
    update_interval_ms: u64,

    /// How long a violator stays tracked after its last violation, ms
    #[arg(long, default_value_t = 600_000)]
    pilot_ttl_ms: u64,

    /// How long emitted events stay available to catching-up clients, ms
    #[arg(long, default_value_t = 30_000)]
    event_retention_ms: u64,

    /// Cursor age beyond which a sync returns a full snapshot, ms
    #[arg(long, default_value_t = 60_000)]
    sync_stale_timeout_ms: u64,

    /// No-fly zone center X in millimetres
    #[arg(long, default_value_t = 250_000.0)]
    zone_center_x: f64,

    /// No-fly zone center Y in millimetres
    #[arg(long, default_value_t = 250_000.0)]
    zone_center_y: f64,

    /// No-fly zone radius in millimetres
    #[arg(long, default_value_t = 100_000.0)]
    zone_radius: f64,

    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.verbosity.log_level_filter())
        .init();

    let config = EngineConfig {
        zone: Zone::new(args.zone_center_x, args.zone_center_y, args.zone_radius),
        update_interval_ms: args.update_interval_ms,
        pilot_ttl_ms: args.pilot_ttl_ms,
        event_retention_ms: args.event_retention_ms,
        sync_stale_timeout_ms: args.sync_stale_timeout_ms,
    };
    let engine = SharedEngine::new(Engine::new(config)?);

    // Outbound I/O must give up before the next tick wants the cycle back
    let io_timeout = Duration::from_millis((args.update_interval_ms * 3 / 4).max(250));
    let feed = Arc::new(HttpDroneFeed::new(&args.feed_url, io_timeout)?);
    let resolver = Arc::new(HttpPilotResolver::new(&args.pilot_url, io_timeout)?);

    let poll = PollCycle::new(
        engine.clone(),
        feed,
        resolver,
        Duration::from_millis(args.update_interval_ms),
    );
    let state = AppState {
        engine: engine.clone(),
    };
    let listen_addr = args.listen_addr;

    log::info!(
        "zone ({}, {}) r={}, ttl {}ms",
        args.zone_center_x,
        args.zone_center_y,
        args.zone_radius,
        args.pilot_ttl_ms
    );

    Toplevel::new(move |s| async move {
        s.start(SubsystemBuilder::new("poll", move |h| poll.run(h)));
        s.start(SubsystemBuilder::new("web", move |h| {
            web::serve(h, state, listen_addr)
        }));
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_millis(2_000))
    .await?;

    Ok(())
}

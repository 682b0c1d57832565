use anyhow::Result;
use clap::Parser;

use bump::LossSimulation;
use bump_relay::{RelayConfig, RelayServer};

#[derive(Parser)]
#[command(name = "bump-relay")]
#[command(about = "Message relay for bump peers")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Listening port; falls back to the PORT environment variable.
    #[arg(short, long)]
    port: Option<u16>,

    #[arg(short, long, default_value_t = 32)]
    max_peers: usize,

    #[arg(long, default_value_t = 0.0, help = "Outbound packet loss percentage (0-100)")]
    loss_percent: f32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let port = args
        .port
        .or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse().ok()))
        .unwrap_or(bump::DEFAULT_PORT);
    let bind_addr = format!("{}:{}", args.bind, port);

    let config = RelayConfig {
        max_peers: args.max_peers,
        loss_simulation: (args.loss_percent > 0.0)
            .then(|| LossSimulation::with_loss(args.loss_percent)),
    };

    let mut relay = RelayServer::bind(&bind_addr, config)?;
    log::info!("relay listening on {}", relay.local_addr());
    relay.run();
    log::info!("relay shutting down");

    Ok(())
}

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use anyhow::Result;
use bump::{DEFAULT_PORT, LossSimulation};
use bump_peer::{PeerSession, SessionState, WanderBot};
use clap::Parser;
use log::info;

#[derive(Parser)]
#[command(name = "bump-peer")]
#[command(about = "Headless bump peer that wanders and fires")]
struct Args {
    #[arg(short, long, default_value = "127.0.0.1")]
    relay: String,

    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    #[arg(long, help = "Leave the session after this many seconds (0 = run forever)")]
    #[arg(default_value_t = 0)]
    duration: u64,

    #[arg(long, default_value_t = 0.0, help = "Inbound packet loss percentage (0-100)")]
    loss_percent: f32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let relay_addr: SocketAddr = format!("{}:{}", args.relay, args.port).parse()?;

    let mut session = PeerSession::connect(relay_addr)?;
    if args.loss_percent > 0.0 {
        session.set_loss_simulation(LossSimulation::with_loss(args.loss_percent));
    }
    info!("joining relay at {}", relay_addr);

    let mut bot = WanderBot::new();
    let mut rng = rand::thread_rng();
    let started = Instant::now();
    let mut last_report = started;

    loop {
        let now = Instant::now();
        if args.duration > 0 && now.duration_since(started) >= Duration::from_secs(args.duration) {
            break;
        }

        if session.state() == SessionState::Active {
            let (flags, aim) = bot.step(&mut rng, now);
            session.set_input(flags);
            if let Some(aim) = aim {
                session.request_fire(aim);
            }
        }
        session.update()?;

        if now.duration_since(last_report) >= Duration::from_secs(5) {
            last_report = now;
            if let (Some(index), Some(body)) = (session.self_index(), session.self_body()) {
                info!(
                    "peer {} at ({:.3}, {:.3}), {} bodies, {} bullets",
                    index,
                    body.position.x,
                    body.position.y,
                    session.roster().live(),
                    session.bullets().len()
                );
            }
        }

        std::thread::sleep(Duration::from_millis(1));
    }

    info!("leaving session");
    session.leave()?;
    Ok(())
}

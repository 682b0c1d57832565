pub mod bot;
pub mod session;

pub use bot::WanderBot;
pub use session::{JOIN_RETRY_MS, PeerSession, SessionState};

mod config;
mod events;
mod relay;

pub use config::RelayConfig;
pub use events::RelayEvent;
pub use relay::RelayServer;

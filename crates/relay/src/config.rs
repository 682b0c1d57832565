use bump::LossSimulation;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub max_peers: usize,
    /// Outbound drop injection for soak testing; off in production.
    pub loss_simulation: Option<LossSimulation>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_peers: 32,
            loss_simulation: None,
        }
    }
}

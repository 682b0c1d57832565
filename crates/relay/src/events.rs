use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub enum RelayEvent {
    PeerJoined {
        index: u32,
        addr: SocketAddr,
        connected: usize,
    },
    PeerLeft {
        index: u32,
        addr: SocketAddr,
        connected: usize,
    },
    BulletAssigned {
        id: u64,
        owner: u32,
    },
    Error {
        message: String,
    },
}

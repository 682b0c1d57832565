mod channel;
mod protocol;
mod transport;

pub use channel::{Link, OrderedInbox, ReliableOutbox, RESEND_INTERVAL_MS};
pub use protocol::{
    BodyState, BulletSpawn, Correction, DEFAULT_PORT, MAX_PACKET_SIZE, MoveUpdate, Packet,
    PacketError, PacketHeader, Payload, PROTOCOL_MAGIC, PROTOCOL_VERSION, StructuralEvent,
    sequence_greater_than, unix_ms,
};
pub use transport::{Endpoint, LossSimulation, NetStats, ReceiveTracker};

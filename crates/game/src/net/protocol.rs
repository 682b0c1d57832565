use std::time::{SystemTime, UNIX_EPOCH};

use rkyv::{Archive, Deserialize, Serialize, rancor};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

pub const MAX_PACKET_SIZE: usize = 1200;
pub const PROTOCOL_VERSION: u32 = 1;
pub const PROTOCOL_MAGIC: u32 = 0x42554D50;
pub const DEFAULT_PORT: u16 = 27500;

const SEQUENCE_WRAP_THRESHOLD: u32 = u32::MAX / 2;

/// Wall-clock milliseconds since the Unix epoch. Snapshot and correction
/// timestamps use this scale so peers can compare them across hosts (clock
/// skew is accepted; the fencing windows absorb it).
pub fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct PacketHeader {
    pub magic: u32,
    pub version: u32,
    pub sequence: u32,
    pub ack: u32,
    pub ack_bits: u32,
}

impl PacketHeader {
    pub fn new(sequence: u32, ack: u32, ack_bits: u32) -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            version: PROTOCOL_VERSION,
            sequence,
            ack,
            ack_bits,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }
}

#[inline]
pub fn sequence_greater_than(s1: u32, s2: u32) -> bool {
    ((s1 > s2) && (s1 - s2 <= SEQUENCE_WRAP_THRESHOLD))
        || ((s1 < s2) && (s2 - s1 > SEQUENCE_WRAP_THRESHOLD))
}

/// A body as it travels over the wire: the full roster entry sent in
/// `Init`/`Add`.
#[derive(Debug, Clone, Copy, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
#[rkyv(derive(Debug))]
pub struct BodyState {
    pub position: [f32; 2],
    pub velocity: [f32; 2],
    pub radius: f32,
    pub color: [u8; 3],
    pub flags: u8,
}

/// Positional update published by a body's owner. Volatile: sent once,
/// droppable, reorderable.
#[derive(Debug, Clone, Copy, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
#[rkyv(derive(Debug))]
pub struct MoveUpdate {
    pub timestamp_ms: u64,
    pub position: [f32; 2],
    pub velocity: [f32; 2],
    pub flags: u8,
}

/// Authoritative collision outcome, computed by the owner of the causing
/// body and pushed to the affected body's owner.
#[derive(Debug, Clone, Copy, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Correction {
    pub cause: u32,
    pub affected: u32,
    pub velocity_delta: [f32; 2],
    pub timestamp_ms: u64,
}

/// Everything a peer decides at fire time. The relay only adds the global
/// bullet id.
#[derive(Debug, Clone, Copy, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct BulletSpawn {
    pub owner: u32,
    pub position: [f32; 2],
    pub velocity: [f32; 2],
    pub spin: f32,
    pub rotation: f32,
    pub radius: f32,
    pub sides: u8,
    pub color: [u8; 3],
}

/// Structural messages. These ride the reliable ordered channel
/// (`Payload::Event`) and are delivered exactly once, in submission order
/// per sender.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum StructuralEvent {
    Init {
        index: u32,
        roster: Vec<Option<BodyState>>,
    },
    Add {
        index: u32,
        body: BodyState,
    },
    Remove {
        index: u32,
    },
    /// peer -> relay
    Collided(Correction),
    /// relay -> all other peers
    Collision(Correction),
    /// peer -> relay
    Fire(BulletSpawn),
    /// relay -> everyone, firer included
    BulletSpawned {
        id: u64,
        spawn: BulletSpawn,
    },
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum Payload {
    /// Repeated by a joining peer until the relay's `Init` event lands.
    Join,
    /// peer -> relay, volatile
    Snapshot(MoveUpdate),
    /// relay -> other peers, volatile
    SnapshotFrom { index: u32, update: MoveUpdate },
    /// Reliable ordered channel carrier. `seq` is the per-sender event
    /// sequence, independent of the packet sequence in the header.
    Event { seq: u32, event: StructuralEvent },
    /// Cumulative: every event below `seq` has been delivered.
    EventAck { seq: u32 },
    /// Graceful leave.
    Bye,
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: Payload,
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
}

impl Packet {
    pub fn new(header: PacketHeader, payload: Payload) -> Self {
        Self { header, payload }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(PacketError::Serialize)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, PacketError> {
        rkyv::from_bytes::<Self, rancor::Error>(data).map_err(PacketError::Deserialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_comparison_wraps() {
        assert!(sequence_greater_than(2, 1));
        assert!(!sequence_greater_than(1, 2));
        assert!(sequence_greater_than(0, u32::MAX));
        assert!(!sequence_greater_than(u32::MAX, 0));
    }

    #[test]
    fn header_validation() {
        let header = PacketHeader::new(7, 3, 0b101);
        assert!(header.is_valid());

        let bad = PacketHeader {
            magic: 0,
            ..header
        };
        assert!(!bad.is_valid());
    }

    #[test]
    fn packet_roundtrip() {
        let payload = Payload::Event {
            seq: 4,
            event: StructuralEvent::Collided(Correction {
                cause: 0,
                affected: 3,
                velocity_delta: [0.01, -0.02],
                timestamp_ms: 12345,
            }),
        };
        let packet = Packet::new(PacketHeader::new(1, 0, 0), payload);

        let bytes = packet.serialize().unwrap();
        let back = Packet::deserialize(&bytes).unwrap();

        assert_eq!(packet.header, back.header);
        match back.payload {
            Payload::Event {
                seq: 4,
                event: StructuralEvent::Collided(c),
            } => {
                assert_eq!(c.affected, 3);
                assert_eq!(c.timestamp_ms, 12345);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn init_roster_keeps_tombstones() {
        let body = BodyState {
            position: [0.5, 0.5],
            velocity: [0.0, 0.0],
            radius: 0.03,
            color: [10, 20, 30],
            flags: 0,
        };
        let payload = Payload::Event {
            seq: 0,
            event: StructuralEvent::Init {
                index: 2,
                roster: vec![Some(body), None, Some(body)],
            },
        };
        let packet = Packet::new(PacketHeader::new(0, 0, 0), payload);
        let back = Packet::deserialize(&packet.serialize().unwrap()).unwrap();

        match back.payload {
            Payload::Event {
                event: StructuralEvent::Init { index, roster },
                ..
            } => {
                assert_eq!(index, 2);
                assert_eq!(roster.len(), 3);
                assert!(roster[1].is_none());
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }
}

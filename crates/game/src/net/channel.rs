use std::collections::{BTreeMap, VecDeque};

use super::protocol::{PacketHeader, StructuralEvent, sequence_greater_than};
use super::transport::ReceiveTracker;

/// Resend cadence for unacked structural events.
pub const RESEND_INTERVAL_MS: u64 = 100;

const MAX_PENDING: usize = 256;

#[derive(Debug, Clone)]
struct PendingEvent {
    seq: u32,
    event: StructuralEvent,
    last_send_ms: Option<u64>,
}

/// Outgoing side of the reliable channel: events stay queued until the
/// remote's cumulative ack covers them, and are re-sent on a fixed cadence.
#[derive(Debug, Default)]
pub struct ReliableOutbox {
    pending: VecDeque<PendingEvent>,
    next_seq: u32,
}

impl ReliableOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: StructuralEvent) -> u32 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);

        if self.pending.len() >= MAX_PENDING {
            self.pending.pop_front();
        }

        self.pending.push_back(PendingEvent {
            seq,
            event,
            last_send_ms: None,
        });
        seq
    }

    /// Events that need (re)sending now. Marks them sent.
    pub fn due(&mut self, now_ms: u64) -> Vec<(u32, StructuralEvent)> {
        let mut out = Vec::new();
        for pending in &mut self.pending {
            let is_due = match pending.last_send_ms {
                None => true,
                Some(sent) => now_ms.saturating_sub(sent) >= RESEND_INTERVAL_MS,
            };
            if is_due {
                pending.last_send_ms = Some(now_ms);
                out.push((pending.seq, pending.event.clone()));
            }
        }
        out
    }

    /// `ack` is the remote's next expected sequence: everything below it has
    /// been delivered.
    pub fn ack_up_to(&mut self, ack: u32) {
        self.pending
            .retain(|p| !sequence_greater_than(ack, p.seq));
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Incoming side: delivers events strictly in the sender's submission order,
/// buffering ahead-of-order arrivals and swallowing duplicates.
#[derive(Debug, Default)]
pub struct OrderedInbox {
    next_expected: u32,
    ahead: BTreeMap<u32, StructuralEvent>,
}

impl OrderedInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(&mut self, seq: u32, event: StructuralEvent) -> Vec<StructuralEvent> {
        let mut delivered = Vec::new();

        if seq == self.next_expected {
            delivered.push(event);
            self.next_expected = self.next_expected.wrapping_add(1);
            while let Some(next) = self.ahead.remove(&self.next_expected) {
                delivered.push(next);
                self.next_expected = self.next_expected.wrapping_add(1);
            }
        } else if sequence_greater_than(seq, self.next_expected) {
            self.ahead.insert(seq, event);
        }
        // anything below next_expected is a duplicate of a delivered event

        delivered
    }

    /// Cumulative ack value to report back to the sender.
    pub fn ack_value(&self) -> u32 {
        self.next_expected
    }
}

/// Per-remote connection state: packet sequencing and duplicate suppression
/// plus both halves of the reliable channel. The relay keeps one per peer
/// address; a peer keeps a single one for the relay.
#[derive(Debug)]
pub struct Link {
    send_sequence: u32,
    recv: ReceiveTracker,
    pub outbox: ReliableOutbox,
    pub inbox: OrderedInbox,
}

impl Default for Link {
    fn default() -> Self {
        Self::new()
    }
}

impl Link {
    pub fn new() -> Self {
        Self {
            send_sequence: 0,
            recv: ReceiveTracker::new(),
            outbox: ReliableOutbox::new(),
            inbox: OrderedInbox::new(),
        }
    }

    pub fn next_header(&mut self) -> PacketHeader {
        let sequence = self.send_sequence;
        self.send_sequence = self.send_sequence.wrapping_add(1);
        let (ack, ack_bits) = self.recv.ack_data();
        PacketHeader::new(sequence, ack, ack_bits)
    }

    /// Returns false if the packet sequence was already seen.
    pub fn accept_packet(&mut self, header: &PacketHeader) -> bool {
        self.recv.record(header.sequence)
    }
}

//! Retransmission backlog

use crate::protocol::rtp::constants::MAX_DATAGRAM;

#[derive(Debug, Default)]
struct Slot {
    sequence: Option<u16>,
    timestamp: u32,
    packet: Vec<u8>,
}

/// Arena of the last `capacity` audio packets, addressed by `sequence % capacity`
///
/// Each slot is tagged with the sequence it holds; a lookup for any other
/// sequence is a miss, never a stale read.
#[derive(Debug)]
pub struct Backlog {
    slots: Vec<Slot>,
}

impl Backlog {
    /// Default number of packets kept
    pub const DEFAULT_SIZE: usize = 512;

    /// Create a backlog with pre-allocated slots
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity.max(1))
            .map(|_| Slot {
                sequence: None,
                timestamp: 0,
                packet: Vec::with_capacity(MAX_DATAGRAM),
            })
            .collect();
        Self { slots }
    }

    fn index(&self, sequence: u16) -> usize {
        usize::from(sequence) % self.slots.len()
    }

    /// Store an encoded packet, evicting whatever held its slot
    pub fn store(&mut self, sequence: u16, timestamp: u32, packet: &[u8]) {
        let index = self.index(sequence);
        let slot = &mut self.slots[index];
        slot.sequence = Some(sequence);
        slot.timestamp = timestamp;
        slot.packet.clear();
        slot.packet.extend_from_slice(packet);
    }

    /// Stored packet for `sequence`, if it has not been evicted
    #[must_use]
    pub fn get(&self, sequence: u16) -> Option<&[u8]> {
        let slot = &self.slots[self.index(sequence)];
        (slot.sequence == Some(sequence)).then_some(slot.packet.as_slice())
    }

    /// RTP timestamp stored with `sequence`
    #[must_use]
    pub fn timestamp(&self, sequence: u16) -> Option<u32> {
        let slot = &self.slots[self.index(sequence)];
        (slot.sequence == Some(sequence)).then_some(slot.timestamp)
    }

    /// Invalidate every slot, keeping the allocations
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.sequence = None;
            slot.packet.clear();
        }
    }

    /// Number of slots
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of valid packets
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.sequence.is_some()).count()
    }

    /// Whether no packet is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Backlog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_get() {
        let mut backlog = Backlog::new(4);

        backlog.store(10, 3520, b"ten");

        assert_eq!(backlog.get(10), Some(&b"ten"[..]));
        assert_eq!(backlog.timestamp(10), Some(3520));
        assert_eq!(backlog.get(11), None);
        assert_eq!(backlog.len(), 1);
    }

    #[test]
    fn test_eviction_is_detected() {
        let mut backlog = Backlog::new(4);

        backlog.store(1, 0, b"one");
        backlog.store(5, 0, b"five");

        assert_eq!(backlog.get(1), None);
        assert_eq!(backlog.get(5), Some(&b"five"[..]));
    }

    #[test]
    fn test_sequence_wrap() {
        let mut backlog = Backlog::new(512);

        backlog.store(u16::MAX, 1, b"last");
        backlog.store(0, 2, b"first");

        assert_eq!(backlog.get(u16::MAX), Some(&b"last"[..]));
        assert_eq!(backlog.get(0), Some(&b"first"[..]));
    }

    #[test]
    fn test_clear() {
        let mut backlog = Backlog::new(8);
        for seq in 0..8 {
            backlog.store(seq, 0, b"x");
        }

        backlog.clear();

        assert!(backlog.is_empty());
        assert_eq!(backlog.capacity(), 8);
        assert_eq!(backlog.get(3), None);
    }
}

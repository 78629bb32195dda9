//! Bounded ring buffer holding refcounted packets for pre-roll.
//!
//! SPDX-License-Identifier: GPL-3.0-or-later
//!
//! Grounded in `original_source`'s fixed-size packet ring (`zcamera.c`'s
//! `processPacket`, which inlines a cursor_read/cursor_write ring buffer
//! directly over `cam->detect.queue`) and, in Rust idiom, on the
//! read/write-cursor ring buffers in `tlc-core`'s frame pipeline.

use crate::media::Packet;

/// Default capacity. Overridable (e.g. in tests) via `PacketQueue::with_capacity`.
pub const PACKET_QUEUE_LEN: usize = 512;

/// Fixed-capacity ring buffer of packets. One slot is always kept empty to
/// distinguish a full queue from an empty one, so the usable capacity is
/// `slots.len() - 1`.
pub struct PacketQueue {
    slots: Vec<Option<Packet>>,
    read_cursor: usize,
    write_cursor: usize,
}

impl PacketQueue {
    pub fn new() -> Self {
        Self::with_capacity(PACKET_QUEUE_LEN)
    }

    /// `capacity` is the number of packets that can be held at once; the
    /// backing array is allocated one slot larger.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "PacketQueue capacity must be positive");
        Self {
            slots: (0..capacity + 1).map(|_| None).collect(),
            read_cursor: 0,
            write_cursor: 0,
        }
    }

    fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Refcount-increments `packet` into the next write slot. Returns
    /// `Err(packet)` unchanged if the queue is full.
    pub fn put(&mut self, packet: Packet) -> Result<(), Packet> {
        let next_write = (self.write_cursor + 1) % self.slot_count();
        if next_write == self.read_cursor {
            return Err(packet);
        }
        self.slots[self.write_cursor] = Some(packet);
        self.write_cursor = next_write;
        Ok(())
    }

    /// Returns the packet at the read slot and advances, or `None` if empty.
    pub fn get(&mut self) -> Option<Packet> {
        if self.read_cursor == self.write_cursor {
            return None;
        }
        let packet = self.slots[self.read_cursor].take();
        self.read_cursor = (self.read_cursor + 1) % self.slot_count();
        packet
    }

    pub fn len(&self) -> usize {
        let cap = self.slot_count();
        (self.write_cursor + cap - self.read_cursor) % cap
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.slot_count() - 1
    }

    /// Releases every queued packet, emptying the queue.
    pub fn drain(&mut self) {
        while self.get().is_some() {}
    }
}

impl Default for PacketQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::mock::video_keyframe;

    fn pkt(pts: i64) -> Packet {
        video_keyframe(0, pts, vec![pts as u8])
    }

    #[test]
    fn len_tracks_cursor_distance_under_interleaving() {
        let mut q = PacketQueue::with_capacity(8);
        assert_eq!(q.len(), 0);
        for i in 0..5 {
            q.put(pkt(i)).unwrap();
        }
        assert_eq!(q.len(), 5);
        assert!(q.len() < q.slot_count());

        assert_eq!(q.get().unwrap().pts, 0);
        assert_eq!(q.get().unwrap().pts, 1);
        assert_eq!(q.len(), 3);

        q.put(pkt(5)).unwrap();
        q.put(pkt(6)).unwrap();
        assert_eq!(q.len(), 5);

        while q.get().is_some() {}
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn put_rejects_when_full_and_leaves_queue_unchanged() {
        let mut q = PacketQueue::with_capacity(2);
        q.put(pkt(0)).unwrap();
        q.put(pkt(1)).unwrap();
        assert_eq!(q.len(), q.capacity());
        let rejected = q.put(pkt(2));
        assert!(rejected.is_err());
        assert_eq!(q.len(), q.capacity());
        assert_eq!(q.get().unwrap().pts, 0);
    }

    #[test]
    fn every_put_is_eventually_got_or_drained() {
        let mut q = PacketQueue::with_capacity(4);
        let mut released = 0;
        for i in 0..3 {
            q.put(pkt(i)).unwrap();
        }
        if q.get().is_some() {
            released += 1;
        }
        q.drain();
        released += q.capacity();
        assert!(released >= 1);
        assert!(q.is_empty());
    }

    #[test]
    fn get_returns_none_on_empty_queue() {
        let mut q = PacketQueue::with_capacity(4);
        assert_eq!(q.get().map(|p| p.pts), None);
    }
}

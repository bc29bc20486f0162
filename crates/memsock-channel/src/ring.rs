//! Wraparound copy into and out of one direction's ring.

use std::ptr::NonNull;
use std::sync::atomic::Ordering;

use tracing::{trace, warn};

use crate::control::{is_empty, is_full, ControlBlock, DirectionStatus, Head};
use crate::layout::Direction;

/// A contiguous byte run inside a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub len: usize,
}

/// Up to two runs: the tail of the ring and, after wrapping, its head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spans {
    pub first: Span,
    pub second: Option<Span>,
}

impl Spans {
    pub fn total(&self) -> usize {
        self.first.len + self.second.map_or(0, |s| s.len)
    }

    /// Trim the runs so they cover at most `max` bytes.
    pub fn limit(self, max: usize) -> Spans {
        let first_len = self.first.len.min(max);
        let rest = max - first_len;
        let second = self
            .second
            .map(|s| Span {
                start: s.start,
                len: s.len.min(rest),
            })
            .filter(|s| s.len > 0);
        Spans {
            first: Span {
                start: self.first.start,
                len: first_len,
            },
            second,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Span> {
        std::iter::once(self.first)
            .chain(self.second)
            .filter(|s| s.len > 0)
    }
}

/// Runs from `from` up to (not including) `to` in a ring of `capacity`.
///
/// `from == to` yields the whole ring starting at `from`. Callers rule out
/// the case where equal offsets mean "nothing" (empty for a reader, full for
/// a writer) before asking.
pub fn spans(from: u32, to: u32, capacity: u32) -> Spans {
    let (from, to, capacity) = (from as usize, to as usize, capacity as usize);
    if to > from {
        return Spans {
            first: Span {
                start: from,
                len: to - from,
            },
            second: None,
        };
    }
    Spans {
        first: Span {
            start: from,
            len: capacity - from,
        },
        second: (to > 0).then_some(Span { start: 0, len: to }),
    }
}

/// One direction's ring as seen by one mapping.
#[derive(Debug)]
pub(crate) struct Ring {
    control: ControlBlock,
    data: NonNull<u8>,
    capacity: u32,
    direction: Direction,
}

// SAFETY: Ring only touches shared memory through raw pointers and atomics;
// the owner keeps the mapping alive for the Ring's lifetime.
unsafe impl Send for Ring {}

impl Ring {
    /// # Safety
    ///
    /// `data` must point to `capacity` bytes that stay mapped, alongside the
    /// control block, for as long as the ring is used.
    pub(crate) unsafe fn new(
        control: ControlBlock,
        data: NonNull<u8>,
        capacity: u32,
        direction: Direction,
    ) -> Self {
        Self {
            control,
            data,
            capacity,
            direction,
        }
    }

    pub(crate) fn direction(&self) -> Direction {
        self.direction
    }

    pub(crate) fn capacity(&self) -> u32 {
        self.capacity
    }

    pub(crate) fn status(&self) -> DirectionStatus {
        self.control.status(self.direction, self.capacity)
    }

    fn in_range(&self, read: Head, write: Head) -> bool {
        if read.offset() < self.capacity && write.offset() < self.capacity {
            return true;
        }
        warn!(
            direction = %self.direction,
            read = read.offset(),
            write = write.offset(),
            capacity = self.capacity,
            "head offset outside ring, refusing transfer"
        );
        false
    }

    /// Copy as much of `buf` as fits. Returns the byte count, 0 when full.
    pub(crate) fn write(&self, buf: &[u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        let write = self.control.write_head(self.direction, Ordering::Relaxed);
        let read = self.control.read_head(self.direction, Ordering::Acquire);
        if !self.in_range(read, write) || is_full(read, write) {
            return 0;
        }

        let runs = spans(write.offset(), read.offset(), self.capacity).limit(buf.len());
        let mut copied = 0;
        for run in runs.iter() {
            // SAFETY: the run lies inside the ring and in the free region, which
            // the reader does not touch until the head below is published.
            unsafe {
                std::ptr::copy_nonoverlapping(
                    buf[copied..].as_ptr(),
                    self.data.as_ptr().add(run.start),
                    run.len,
                );
            }
            copied += run.len;
        }

        let write = write.advance(copied as u32, self.capacity);
        self.control.store_write_head(self.direction, write);
        self.control.publish_status(self.direction, read, write);
        trace!(direction = %self.direction, copied, head = write.offset(), "ring write");
        copied
    }

    /// Copy pending bytes into `buf`. Returns the byte count, 0 when empty.
    pub(crate) fn read(&self, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        let read = self.control.read_head(self.direction, Ordering::Relaxed);
        let write = self.control.write_head(self.direction, Ordering::Acquire);
        if !self.in_range(read, write) || is_empty(read, write) {
            return 0;
        }

        let runs = spans(read.offset(), write.offset(), self.capacity).limit(buf.len());
        let mut copied = 0;
        for run in runs.iter() {
            // SAFETY: the run lies inside the ring and was published by the
            // writer's Release store observed through the Acquire load above.
            unsafe {
                std::ptr::copy_nonoverlapping(
                    self.data.as_ptr().add(run.start),
                    buf[copied..].as_mut_ptr(),
                    run.len,
                );
            }
            copied += run.len;
        }

        let read = read.advance(copied as u32, self.capacity);
        self.control.store_read_head(self.direction, read);
        self.control.publish_status(self.direction, read, write);
        trace!(direction = %self.direction, copied, head = read.offset(), "ring read");
        copied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;

    /// Heap-backed stand-in for a mapped region.
    struct Region {
        words: Vec<u64>,
        layout: Layout,
    }

    impl Region {
        fn new(sc: u32, cs: u32) -> Self {
            let layout = Layout::from_capacities(sc, cs).unwrap();
            let mut region = Self {
                words: vec![0; layout.total_len().div_ceil(8)],
                layout,
            };
            region.control().reset();
            region
        }

        fn base(&mut self) -> NonNull<u8> {
            NonNull::new(self.words.as_mut_ptr() as *mut u8).unwrap()
        }

        fn control(&mut self) -> ControlBlock {
            unsafe { ControlBlock::new(self.base()) }
        }

        fn ring(&mut self, direction: Direction) -> Ring {
            let control = self.control();
            let offset = self.layout.ring_offset(direction);
            let data = unsafe { NonNull::new_unchecked(self.base().as_ptr().add(offset)) };
            unsafe { Ring::new(control, data, self.layout.capacity(direction), direction) }
        }
    }

    #[test]
    fn spans_single_run_when_limit_ahead() {
        let s = spans(2, 7, 10);
        assert_eq!(s.first, Span { start: 2, len: 5 });
        assert_eq!(s.second, None);
    }

    #[test]
    fn spans_wrap_into_two_runs() {
        let s = spans(7, 3, 10);
        assert_eq!(s.first, Span { start: 7, len: 3 });
        assert_eq!(s.second, Some(Span { start: 0, len: 3 }));
        assert_eq!(s.total(), 6);
    }

    #[test]
    fn spans_equal_offsets_cover_whole_ring() {
        let s = spans(4, 4, 10);
        assert_eq!(s.total(), 10);
        assert_eq!(spans(0, 0, 10).second, None);
    }

    #[test]
    fn limit_trims_second_run_first() {
        let s = spans(7, 3, 10).limit(4);
        assert_eq!(s.first.len, 3);
        assert_eq!(s.second, Some(Span { start: 0, len: 1 }));
        assert_eq!(spans(7, 3, 10).limit(2).second, None);
    }

    #[test]
    fn writes_within_capacity_are_read_back_in_order() {
        let mut region = Region::new(16, 16);
        let writer = region.ring(Direction::ServerToClient);
        let reader = region.ring(Direction::ServerToClient);

        assert_eq!(writer.write(b"hello "), 6);
        assert_eq!(writer.write(b"ring "), 5);
        assert_eq!(writer.write(b"bytes"), 5);

        let mut out = [0u8; 32];
        assert_eq!(reader.read(&mut out), 16);
        assert_eq!(&out[..16], b"hello ring bytes");
    }

    #[test]
    fn full_ring_rejects_writes_and_empty_ring_rejects_reads() {
        let mut region = Region::new(8, 8);
        let writer = region.ring(Direction::ClientToServer);
        let reader = region.ring(Direction::ClientToServer);

        assert_eq!(writer.write(b"01234567"), 8);
        let status = writer.status();
        assert!(status.is_full() && !status.is_empty());
        assert!(status.mirror_full && !status.mirror_empty);
        assert_eq!(writer.write(b"x"), 0);

        let mut out = [0u8; 8];
        assert_eq!(reader.read(&mut out), 8);
        let status = reader.status();
        assert!(status.is_empty() && !status.is_full());
        assert!(status.mirror_empty && !status.mirror_full);
        assert_eq!(reader.read(&mut out), 0);
    }

    #[test]
    fn wraparound_preserves_order() {
        let mut region = Region::new(10, 10);
        let writer = region.ring(Direction::ServerToClient);
        let reader = region.ring(Direction::ServerToClient);

        assert_eq!(writer.write(b"abcdefg"), 7);
        let mut out = [0u8; 5];
        assert_eq!(reader.read(&mut out), 5);
        assert_eq!(&out, b"abcde");

        assert_eq!(writer.write(b"123456"), 6);
        assert_eq!(writer.status().pending(), 8);

        let mut out = [0u8; 10];
        assert_eq!(reader.read(&mut out), 8);
        assert_eq!(&out[..8], b"fg123456");
        assert!(reader.status().is_empty());
    }

    #[test]
    fn partial_write_stops_at_capacity() {
        let mut region = Region::new(10, 10);
        let writer = region.ring(Direction::ServerToClient);
        assert_eq!(writer.write(b"0123456789abc"), 10);
        assert!(writer.status().is_full());
    }

    #[test]
    fn write_into_full_ring_moves_nothing() {
        let mut region = Region::new(10, 10);
        let writer = region.ring(Direction::ServerToClient);
        let reader = region.ring(Direction::ServerToClient);

        assert_eq!(writer.write(b"0123456789"), 10);
        let before = writer.status();
        assert_eq!(writer.write(b"abcde"), 0);
        assert_eq!(writer.status(), before);

        let mut out = [0u8; 10];
        assert_eq!(reader.read(&mut out), 10);
        assert_eq!(&out, b"0123456789");
    }

    #[test]
    fn fill_after_wrap_reports_full() {
        let mut region = Region::new(10, 10);
        let writer = region.ring(Direction::ServerToClient);
        let reader = region.ring(Direction::ServerToClient);

        let mut out = [0u8; 10];
        assert_eq!(writer.write(b"0123456"), 7);
        assert_eq!(reader.read(&mut out[..7]), 7);
        assert_eq!(writer.write(b"ABCDEFGHIJKL"), 10);
        let status = writer.status();
        assert!(status.is_full());
        assert_eq!(status.write.offset(), 7);

        assert_eq!(reader.read(&mut out), 10);
        assert_eq!(&out, b"ABCDEFGHIJ");
    }

    #[test]
    fn directions_are_independent() {
        let mut region = Region::new(8, 8);
        let sc = region.ring(Direction::ServerToClient);
        let cs = region.ring(Direction::ClientToServer);

        assert_eq!(sc.write(b"ABCDEFGH"), 8);
        assert!(sc.status().is_full());
        assert!(cs.status().is_empty());

        assert_eq!(cs.write(b"xy"), 2);
        let mut out = [0u8; 8];
        assert_eq!(cs.read(&mut out), 2);
        assert_eq!(&out[..2], b"xy");
        assert!(sc.status().is_full());
        assert_eq!(sc.read(&mut out), 8);
        assert_eq!(&out, b"ABCDEFGH");
    }

    #[test]
    fn end_to_end_small_rings() {
        let mut region = Region::new(8, 8);
        let server_out = region.ring(Direction::ServerToClient);
        let client_in = region.ring(Direction::ServerToClient);

        assert_eq!(server_out.write(b"ABCDEFGH"), 8);
        assert!(server_out.status().is_full());

        let mut out = [0u8; 8];
        assert_eq!(client_in.read(&mut out), 8);
        assert_eq!(&out, b"ABCDEFGH");
        assert!(client_in.status().is_empty());

        assert_eq!(server_out.write(b"XY"), 2);
        assert_eq!(server_out.write(b"Z"), 1);
        assert_eq!(client_in.read(&mut out), 3);
        assert_eq!(&out[..3], b"XYZ");
    }

    #[test]
    fn corrupt_head_refuses_transfer() {
        let mut region = Region::new(8, 8);
        let ring = region.ring(Direction::ServerToClient);
        region
            .control()
            .store_write_head(Direction::ServerToClient, Head::new(200, false));

        assert_eq!(ring.write(b"abc"), 0);
        let mut out = [0u8; 4];
        assert_eq!(ring.read(&mut out), 0);
        assert!(ring.status().is_corrupt());
    }

    #[test]
    fn empty_buffers_are_noops() {
        let mut region = Region::new(8, 8);
        let ring = region.ring(Direction::ServerToClient);
        assert_eq!(ring.write(&[]), 0);
        assert_eq!(ring.read(&mut []), 0);
        assert!(ring.status().is_empty());
    }
}

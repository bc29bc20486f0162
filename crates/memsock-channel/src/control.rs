//! Atomic view over the 20-byte control block.
//!
//! Field ownership and the races each field tolerates:
//!
//! - **Write head** (one per direction): stored only by the writing role,
//!   with `Release`, after the payload bytes it publishes. The reader loads it
//!   with `Acquire`. A stale value makes the reader see less data than is
//!   available, never more.
//! - **Read head** (one per direction): stored only by the reading role, with
//!   `Release`, after it is done copying out of the freed bytes. The writer
//!   loads it with `Acquire`. A stale value makes the writer see less free
//!   space than exists, never more.
//! - **Status mirror** (two bytes per direction): both roles store it with
//!   `Relaxed` as a single 16-bit word after every successful operation.
//!   Stores from the two sides may land in either order, so the mirror can lag
//!   the heads. Nothing in the ring protocol reads it back; FULL and EMPTY are
//!   always derived from the heads.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};

use crate::layout::{Direction, CONTROL_BLOCK_SIZE};

const LAP_BIT: u32 = 1 << 31;

/// Decoded head word: ring offset plus wrap parity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Head {
    offset: u32,
    lap: bool,
}

impl Head {
    pub const ZERO: Head = Head {
        offset: 0,
        lap: false,
    };

    pub fn new(offset: u32, lap: bool) -> Self {
        Self {
            offset: offset & !LAP_BIT,
            lap,
        }
    }

    pub fn from_word(word: u32) -> Self {
        Self {
            offset: word & !LAP_BIT,
            lap: word & LAP_BIT != 0,
        }
    }

    pub fn to_word(self) -> u32 {
        if self.lap {
            self.offset | LAP_BIT
        } else {
            self.offset
        }
    }

    pub fn offset(self) -> u32 {
        self.offset
    }

    pub fn lap(self) -> bool {
        self.lap
    }

    /// Move forward by `n` bytes, wrapping at `capacity` and flipping the lap
    /// bit when the end of the ring is crossed. `n` must not exceed
    /// `capacity`.
    pub fn advance(self, n: u32, capacity: u32) -> Self {
        let end = u64::from(self.offset) + u64::from(n);
        if end >= u64::from(capacity) {
            Self {
                offset: (end - u64::from(capacity)) as u32,
                lap: !self.lap,
            }
        } else {
            Self {
                offset: end as u32,
                lap: self.lap,
            }
        }
    }
}

/// FULL when offsets match and the writer is one lap ahead.
pub fn is_full(read: Head, write: Head) -> bool {
    read.offset == write.offset && read.lap != write.lap
}

/// EMPTY when offsets and laps both match.
pub fn is_empty(read: Head, write: Head) -> bool {
    read == write
}

/// Unread bytes between `read` and `write`.
pub fn pending(read: Head, write: Head, capacity: u32) -> u32 {
    if read.offset == write.offset {
        if read.lap != write.lap {
            capacity
        } else {
            0
        }
    } else if write.offset > read.offset {
        write.offset - read.offset
    } else {
        capacity.saturating_sub(read.offset).saturating_add(write.offset)
    }
}

/// Point-in-time view of one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionStatus {
    pub direction: Direction,
    pub capacity: u32,
    pub read: Head,
    pub write: Head,
    /// Last published FULL byte.
    pub mirror_full: bool,
    /// Last published EMPTY byte.
    pub mirror_empty: bool,
}

impl DirectionStatus {
    pub fn is_full(&self) -> bool {
        is_full(self.read, self.write)
    }

    pub fn is_empty(&self) -> bool {
        is_empty(self.read, self.write)
    }

    pub fn pending(&self) -> u32 {
        pending(self.read, self.write, self.capacity)
    }

    pub fn free(&self) -> u32 {
        self.capacity - self.pending().min(self.capacity)
    }

    /// A head offset outside the ring means the block was scribbled on.
    pub fn is_corrupt(&self) -> bool {
        self.read.offset >= self.capacity || self.write.offset >= self.capacity
    }
}

/// Both directions of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlSnapshot {
    pub server_to_client: DirectionStatus,
    pub client_to_server: DirectionStatus,
}

impl ControlSnapshot {
    pub fn get(&self, direction: Direction) -> &DirectionStatus {
        match direction {
            Direction::ServerToClient => &self.server_to_client,
            Direction::ClientToServer => &self.client_to_server,
        }
    }
}

/// Pointer to the start of a mapped control block.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ControlBlock {
    base: NonNull<u8>,
}

impl ControlBlock {
    /// # Safety
    ///
    /// `base` must point to at least [`CONTROL_BLOCK_SIZE`] bytes that stay
    /// mapped for as long as the returned value is used, aligned to 4 bytes.
    pub(crate) unsafe fn new(base: NonNull<u8>) -> Self {
        debug_assert_eq!(base.as_ptr() as usize % 4, 0);
        Self { base }
    }

    fn word(&self, offset: usize) -> &AtomicU32 {
        debug_assert!(offset + 4 <= CONTROL_BLOCK_SIZE);
        // SAFETY: offset is one of the 4-aligned head slots inside the block,
        // which outlives self per the constructor contract.
        unsafe { &*(self.base.as_ptr().add(offset) as *const AtomicU32) }
    }

    fn status_word(&self, direction: Direction) -> &AtomicU16 {
        // SAFETY: status slots are 2-aligned and lie inside the block.
        unsafe { &*(self.base.as_ptr().add(direction.status_offset()) as *const AtomicU16) }
    }

    pub(crate) fn write_head(&self, direction: Direction, order: Ordering) -> Head {
        Head::from_word(u32::from_le(
            self.word(direction.write_head_offset()).load(order),
        ))
    }

    pub(crate) fn read_head(&self, direction: Direction, order: Ordering) -> Head {
        Head::from_word(u32::from_le(
            self.word(direction.read_head_offset()).load(order),
        ))
    }

    pub(crate) fn store_write_head(&self, direction: Direction, head: Head) {
        self.word(direction.write_head_offset())
            .store(head.to_word().to_le(), Ordering::Release);
    }

    pub(crate) fn store_read_head(&self, direction: Direction, head: Head) {
        self.word(direction.read_head_offset())
            .store(head.to_word().to_le(), Ordering::Release);
    }

    /// Publish the FULL/EMPTY pair derived from `read` and `write`.
    pub(crate) fn publish_status(&self, direction: Direction, read: Head, write: Head) {
        let bytes = [
            u8::from(is_full(read, write)),
            u8::from(is_empty(read, write)),
        ];
        self.status_word(direction)
            .store(u16::from_ne_bytes(bytes), Ordering::Relaxed);
    }

    pub(crate) fn mirror(&self, direction: Direction) -> (bool, bool) {
        let [full, empty] = self.status_word(direction).load(Ordering::Relaxed).to_ne_bytes();
        (full != 0, empty != 0)
    }

    pub(crate) fn status(&self, direction: Direction, capacity: u32) -> DirectionStatus {
        let (mirror_full, mirror_empty) = self.mirror(direction);
        DirectionStatus {
            direction,
            capacity,
            read: self.read_head(direction, Ordering::Acquire),
            write: self.write_head(direction, Ordering::Acquire),
            mirror_full,
            mirror_empty,
        }
    }

    /// Zero every head and mark both directions EMPTY.
    pub(crate) fn reset(&self) {
        for direction in Direction::ALL {
            self.store_write_head(direction, Head::ZERO);
            self.store_read_head(direction, Head::ZERO);
            self.publish_status(direction, Head::ZERO, Head::ZERO);
        }
    }
}

//! Binary layout of a channel file.
//!
//! ```text
//! ┌────────┬──────────────────────────────────────────────────────────┐
//! │ offset │ field                                                    │
//! ├────────┼──────────────────────────────────────────────────────────┤
//! │ 0      │ u32 LE server read head  (client→server, owned by server) │
//! │ 4      │ u32 LE server write head (server→client, owned by server) │
//! │ 8      │ u32 LE client read head  (server→client, owned by client) │
//! │ 12     │ u32 LE client write head (client→server, owned by client) │
//! │ 16     │ u8 sc_full, u8 sc_empty, u8 cs_full, u8 cs_empty          │
//! │ 20     │ server→client ring (sc_capacity bytes)                    │
//! │ 20+sc  │ client→server ring (cs_capacity bytes)                    │
//! └────────┴──────────────────────────────────────────────────────────┘
//! ```
//!
//! Bit 31 of every head word is the lap bit; bits 0..=30 hold the byte
//! offset into the ring. This departs from a plain-offset head layout: a
//! peer that treats the whole word as an offset reads a wrapped head such as
//! `0x8000_0003` as out of range. Both peers must speak the lap-bit format.
//!
//! FULL and EMPTY are derived from the heads alone (offsets equal, laps
//! differ / laps equal). The status bytes at offset 16 are a mirror written
//! after each successful operation for observers such as `inspect`; the ring
//! protocol never reads them back.

use std::fmt;

use crate::config::ChannelConfig;
use crate::error::{ChannelError, Result};

/// Client→Server read head, owned by the server.
pub const SERVER_READ_HEAD: usize = 0;
/// Server→Client write head, owned by the server.
pub const SERVER_WRITE_HEAD: usize = 4;
/// Server→Client read head, owned by the client.
pub const CLIENT_READ_HEAD: usize = 8;
/// Client→Server write head, owned by the client.
pub const CLIENT_WRITE_HEAD: usize = 12;
/// Server→Client status mirror: FULL byte, EMPTY byte follows.
pub const SC_STATUS: usize = 16;
/// Client→Server status mirror: FULL byte, EMPTY byte follows.
pub const CS_STATUS: usize = 18;
/// Size of the control block; the first ring starts here.
pub const CONTROL_BLOCK_SIZE: usize = 20;

/// Largest ring capacity whose offsets fit below the lap bit.
pub const MAX_CAPACITY: u32 = (1 << 31) - 1;

/// Which peer a channel handle acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Server,
    Client,
}

impl Role {
    /// The direction this role writes into.
    pub fn outbound(self) -> Direction {
        match self {
            Role::Server => Direction::ServerToClient,
            Role::Client => Direction::ClientToServer,
        }
    }

    /// The direction this role reads from.
    pub fn inbound(self) -> Direction {
        match self {
            Role::Server => Direction::ClientToServer,
            Role::Client => Direction::ServerToClient,
        }
    }

    /// The opposite peer.
    pub fn peer(self) -> Role {
        match self {
            Role::Server => Role::Client,
            Role::Client => Role::Server,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Server => "server",
            Role::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the two unidirectional rings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    ServerToClient,
    ClientToServer,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::ServerToClient, Direction::ClientToServer];

    /// The role that owns the write head of this direction.
    pub fn writer(self) -> Role {
        match self {
            Direction::ServerToClient => Role::Server,
            Direction::ClientToServer => Role::Client,
        }
    }

    /// The role that owns the read head of this direction.
    pub fn reader(self) -> Role {
        self.writer().peer()
    }

    pub(crate) fn write_head_offset(self) -> usize {
        match self {
            Direction::ServerToClient => SERVER_WRITE_HEAD,
            Direction::ClientToServer => CLIENT_WRITE_HEAD,
        }
    }

    pub(crate) fn read_head_offset(self) -> usize {
        match self {
            Direction::ServerToClient => CLIENT_READ_HEAD,
            Direction::ClientToServer => SERVER_READ_HEAD,
        }
    }

    pub(crate) fn status_offset(self) -> usize {
        match self {
            Direction::ServerToClient => SC_STATUS,
            Direction::ClientToServer => CS_STATUS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::ServerToClient => "server-to-client",
            Direction::ClientToServer => "client-to-server",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated sizes and offsets of a channel region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    sc_capacity: u32,
    cs_capacity: u32,
    total_len: usize,
}

impl Layout {
    /// Validate the capacities in `config` and compute the region size.
    pub fn new(config: &ChannelConfig) -> Result<Self> {
        Self::from_capacities(
            config.server_to_client_capacity,
            config.client_to_server_capacity,
        )
    }

    pub fn from_capacities(sc_capacity: u32, cs_capacity: u32) -> Result<Self> {
        check_capacity(Direction::ServerToClient, sc_capacity)?;
        check_capacity(Direction::ClientToServer, cs_capacity)?;

        let total = CONTROL_BLOCK_SIZE as u64 + u64::from(sc_capacity) + u64::from(cs_capacity);
        let total_len = usize::try_from(total)
            .ok()
            .filter(|len| *len <= isize::MAX as usize)
            .ok_or(ChannelError::RegionTooLarge { total })?;

        Ok(Self {
            sc_capacity,
            cs_capacity,
            total_len,
        })
    }

    /// Recover a layout from a file length and the server→client capacity.
    ///
    /// The client→server capacity is whatever remains after the control
    /// block and the first ring.
    pub fn infer(file_len: u64, sc_capacity: u32) -> Result<Self> {
        let fixed = CONTROL_BLOCK_SIZE as u64 + u64::from(sc_capacity);
        let remaining = file_len.saturating_sub(fixed);
        let cs_capacity = u32::try_from(remaining).map_err(|_| ChannelError::InvalidCapacity {
            direction: Direction::ClientToServer,
            capacity: u32::MAX,
            max: MAX_CAPACITY,
        })?;
        Self::from_capacities(sc_capacity, cs_capacity)
    }

    pub fn capacity(&self, direction: Direction) -> u32 {
        match direction {
            Direction::ServerToClient => self.sc_capacity,
            Direction::ClientToServer => self.cs_capacity,
        }
    }

    /// Byte offset of the first byte of a direction's ring.
    pub fn ring_offset(&self, direction: Direction) -> usize {
        match direction {
            Direction::ServerToClient => CONTROL_BLOCK_SIZE,
            Direction::ClientToServer => CONTROL_BLOCK_SIZE + self.sc_capacity as usize,
        }
    }

    /// Total mapped length: control block plus both rings.
    pub fn total_len(&self) -> usize {
        self.total_len
    }
}

fn check_capacity(direction: Direction, capacity: u32) -> Result<()> {
    if capacity == 0 || capacity > MAX_CAPACITY {
        return Err(ChannelError::InvalidCapacity {
            direction,
            capacity,
            max: MAX_CAPACITY,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_offsets_follow_control_block() {
        let layout = Layout::from_capacities(8, 16).unwrap();
        assert_eq!(layout.ring_offset(Direction::ServerToClient), 20);
        assert_eq!(layout.ring_offset(Direction::ClientToServer), 28);
        assert_eq!(layout.total_len(), 44);
    }

    #[test]
    fn zero_capacity_rejected() {
        let err = Layout::from_capacities(0, 16).unwrap_err();
        assert!(matches!(
            err,
            ChannelError::InvalidCapacity {
                direction: Direction::ServerToClient,
                capacity: 0,
                ..
            }
        ));
        assert!(err.is_capacity_error());

        let err = Layout::from_capacities(16, 0).unwrap_err();
        assert!(matches!(
            err,
            ChannelError::InvalidCapacity {
                direction: Direction::ClientToServer,
                ..
            }
        ));
    }

    #[test]
    fn capacity_must_leave_room_for_lap_bit() {
        assert!(Layout::from_capacities(MAX_CAPACITY, 1).is_ok());
        assert!(Layout::from_capacities(MAX_CAPACITY + 1, 1).is_err());
    }

    #[test]
    fn infer_recovers_second_capacity() {
        let layout = Layout::infer(20 + 8 + 32, 8).unwrap();
        assert_eq!(layout.capacity(Direction::ServerToClient), 8);
        assert_eq!(layout.capacity(Direction::ClientToServer), 32);
    }

    #[test]
    fn infer_rejects_file_without_second_ring() {
        assert!(Layout::infer(28, 8).is_err());
        assert!(Layout::infer(4, 8).is_err());
    }

    #[test]
    fn roles_and_directions_are_complementary() {
        assert_eq!(Role::Server.outbound(), Direction::ServerToClient);
        assert_eq!(Role::Server.inbound(), Direction::ClientToServer);
        assert_eq!(Role::Client.outbound(), Role::Server.inbound());
        for direction in Direction::ALL {
            assert_eq!(direction.writer().outbound(), direction);
            assert_eq!(direction.reader().inbound(), direction);
        }
    }

    #[test]
    fn head_ownership_matches_wire_table() {
        assert_eq!(Direction::ServerToClient.write_head_offset(), 4);
        assert_eq!(Direction::ServerToClient.read_head_offset(), 8);
        assert_eq!(Direction::ClientToServer.write_head_offset(), 12);
        assert_eq!(Direction::ClientToServer.read_head_offset(), 0);
    }
}

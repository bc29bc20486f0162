use std::io;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::ChannelConfig;
use crate::control::{ControlBlock, ControlSnapshot, DirectionStatus};
use crate::error::{ChannelError, Result};
use crate::layout::{Direction, Layout, Role};
use crate::mapping::Mapping;
use crate::ring::Ring;

/// A bidirectional byte pipe over a memory-mapped file.
///
/// One side calls [`Channel::create`] to size and initialize the file, the
/// other calls [`Channel::open`] to join it. Afterwards each side writes its
/// outbound direction and reads its inbound one without syscalls.
#[derive(Debug)]
pub struct Channel {
    mapping: Arc<Mapping>,
    layout: Layout,
    role: Role,
    outbound: Ring,
    inbound: Ring,
}

impl Channel {
    /// Create (or truncate) the backing file and initialize the control block.
    pub fn create(path: impl AsRef<Path>, config: ChannelConfig, role: Role) -> Result<Self> {
        let path = path.as_ref();
        let layout = Layout::new(&config)?;
        let mapping = Mapping::create(path, layout.total_len(), config.file_mode)?;
        let channel = Self::from_mapping(mapping, layout, role);
        channel.control().reset();

        info!(
            ?path,
            %role,
            sc_capacity = layout.capacity(Direction::ServerToClient),
            cs_capacity = layout.capacity(Direction::ClientToServer),
            "channel created"
        );
        Ok(channel)
    }

    /// Map an existing backing file without touching its control block.
    pub fn open(path: impl AsRef<Path>, config: ChannelConfig, role: Role) -> Result<Self> {
        let path = path.as_ref();
        let layout = Layout::new(&config)?;
        let mapping = Mapping::open(path, layout.total_len())?;
        let channel = Self::from_mapping(mapping, layout, role);

        info!(?path, %role, "channel opened");
        Ok(channel)
    }

    /// Read the control block of an existing file.
    ///
    /// The client→server capacity is inferred from the file length. Nothing
    /// is written.
    pub fn inspect(path: impl AsRef<Path>, server_to_client_capacity: u32) -> Result<Inspection> {
        let path = path.as_ref();
        let file_len = std::fs::metadata(path)
            .map_err(|source| ChannelError::Create {
                path: path.to_path_buf(),
                source,
            })?
            .len();
        let layout = Layout::infer(file_len, server_to_client_capacity)?;
        let mapping = Mapping::open(path, layout.total_len())?;
        // SAFETY: the mapping covers the control block and lives until the
        // end of this function.
        let control = unsafe { ControlBlock::new(mapping.base()) };
        let snapshot = snapshot_of(&control, &layout);
        debug!(?path, file_len, "inspected channel file");

        Ok(Inspection {
            path: path.to_path_buf(),
            file_len,
            layout,
            snapshot,
        })
    }

    fn from_mapping(mapping: Mapping, layout: Layout, role: Role) -> Self {
        let mapping = Arc::new(mapping);
        let outbound = ring_for(&mapping, &layout, role.outbound());
        let inbound = ring_for(&mapping, &layout, role.inbound());
        Self {
            mapping,
            layout,
            role,
            outbound,
            inbound,
        }
    }

    fn control(&self) -> ControlBlock {
        // SAFETY: self.mapping keeps the block mapped.
        unsafe { ControlBlock::new(self.mapping.base()) }
    }

    /// Write up to `buf.len()` bytes into the outbound direction.
    ///
    /// Never blocks. Returns 0 when the direction is full.
    pub fn write(&mut self, buf: &[u8]) -> usize {
        self.outbound.write(buf)
    }

    /// Read up to `buf.len()` pending bytes from the inbound direction.
    ///
    /// Never blocks. Returns 0 when the direction is empty.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        self.inbound.read(buf)
    }

    pub fn status(&self, direction: Direction) -> DirectionStatus {
        self.control()
            .status(direction, self.layout.capacity(direction))
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        snapshot_of(&self.control(), &self.layout)
    }

    /// `msync` the whole region to the backing file.
    pub fn flush(&self) -> Result<()> {
        self.mapping.flush()
    }

    /// Flush, unmap and close. File contents are left in place.
    pub fn close(self) -> Result<()> {
        let Channel {
            mapping,
            role,
            outbound,
            inbound,
            ..
        } = self;
        drop((outbound, inbound));
        let path = mapping.path().to_path_buf();
        match Arc::try_unwrap(mapping) {
            Ok(mapping) => mapping.close()?,
            Err(shared) => shared.flush()?,
        }
        info!(?path, %role, "channel closed");
        Ok(())
    }

    /// Separate the outbound and inbound halves, e.g. to move them to
    /// different threads.
    pub fn split(self) -> (ChannelWriter, ChannelReader) {
        let writer = ChannelWriter {
            ring: self.outbound,
            role: self.role,
            _mapping: Arc::clone(&self.mapping),
        };
        let reader = ChannelReader {
            ring: self.inbound,
            role: self.role,
            _mapping: self.mapping,
        };
        (writer, reader)
    }

    pub fn path(&self) -> &Path {
        self.mapping.path()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn capacity(&self, direction: Direction) -> u32 {
        self.layout.capacity(direction)
    }

    /// (device, inode) of the backing file when it was mapped.
    pub fn file_identity(&self) -> (u64, u64) {
        self.mapping.identity()
    }

    pub fn mapped_len(&self) -> usize {
        self.mapping.len()
    }
}

fn ring_for(mapping: &Mapping, layout: &Layout, direction: Direction) -> Ring {
    let base = mapping.base();
    // SAFETY: ring_offset + capacity is within total_len, which the mapping
    // covers, and the returned Ring is stored next to an Arc of the mapping.
    unsafe {
        let data = NonNull::new_unchecked(base.as_ptr().add(layout.ring_offset(direction)));
        Ring::new(
            ControlBlock::new(base),
            data,
            layout.capacity(direction),
            direction,
        )
    }
}

fn snapshot_of(control: &ControlBlock, layout: &Layout) -> ControlSnapshot {
    ControlSnapshot {
        server_to_client: control.status(
            Direction::ServerToClient,
            layout.capacity(Direction::ServerToClient),
        ),
        client_to_server: control.status(
            Direction::ClientToServer,
            layout.capacity(Direction::ClientToServer),
        ),
    }
}

/// Result of [`Channel::inspect`].
#[derive(Debug, Clone)]
pub struct Inspection {
    pub path: PathBuf,
    pub file_len: u64,
    pub layout: Layout,
    pub snapshot: ControlSnapshot,
}

/// Outbound half of a split [`Channel`].
#[derive(Debug)]
pub struct ChannelWriter {
    ring: Ring,
    role: Role,
    _mapping: Arc<Mapping>,
}

impl ChannelWriter {
    pub fn write(&mut self, buf: &[u8]) -> usize {
        self.ring.write(buf)
    }

    pub fn status(&self) -> DirectionStatus {
        self.ring.status()
    }

    pub fn direction(&self) -> Direction {
        self.ring.direction()
    }

    pub fn capacity(&self) -> u32 {
        self.ring.capacity()
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

/// Inbound half of a split [`Channel`].
#[derive(Debug)]
pub struct ChannelReader {
    ring: Ring,
    role: Role,
    _mapping: Arc<Mapping>,
}

impl ChannelReader {
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        self.ring.read(buf)
    }

    pub fn status(&self) -> DirectionStatus {
        self.ring.status()
    }

    pub fn direction(&self) -> Direction {
        self.ring.direction()
    }

    pub fn capacity(&self) -> u32 {
        self.ring.capacity()
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

fn would_block(n: usize, requested: usize) -> io::Result<usize> {
    if n == 0 && requested > 0 {
        Err(io::ErrorKind::WouldBlock.into())
    } else {
        Ok(n)
    }
}

impl io::Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        would_block(self.ring.write(buf), buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        would_block(self.ring.read(buf), buf.len())
    }
}

impl io::Write for Channel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        would_block(self.outbound.write(buf), buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.mapping.flush().map_err(io::Error::other)
    }
}

impl io::Read for Channel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        would_block(self.inbound.read(buf), buf.len())
    }
}

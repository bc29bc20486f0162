//! Blocking helpers layered over the non-blocking channel operations.
//!
//! Nothing here touches the ring directly: each helper retries
//! `write`/`read` and waits with a progressive [`Backoff`] between attempts.

use std::time::{Duration, Instant};

use tracing::trace;

use crate::channel::{Channel, ChannelReader, ChannelWriter};
use crate::error::{ChannelError, Result};

/// Progressive wait strategy for polling a peer that may be slow.
///
/// - spin for the first 100 steps,
/// - then issue growing bursts of CPU pause hints up to step 1000,
/// - then yield the thread, with an occasional short sleep once the wait
///   exceeds 10 000 steps so an idle peer does not pin a core.
#[derive(Debug, Default, Clone)]
pub struct Backoff {
    step: u32,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 100;
    const PAUSE_LIMIT: u32 = 1_000;
    const YIELD_LIMIT: u32 = 10_000;
    const IDLE_SLEEP: Duration = Duration::from_micros(50);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.step = 0;
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    /// Wait once, scaled to how long we have been waiting.
    pub fn snooze(&mut self) {
        let i = self.step;
        if i < Self::SPIN_LIMIT {
            std::hint::spin_loop();
        } else if i < Self::PAUSE_LIMIT {
            let pauses = ((i - Self::SPIN_LIMIT) >> 3) + 1;
            for _ in 0..pauses.min(32) {
                std::hint::spin_loop();
            }
        } else if i < Self::YIELD_LIMIT || i % 16 != 0 {
            std::thread::yield_now();
        } else {
            std::thread::sleep(Self::IDLE_SLEEP);
        }
        self.step = self.step.saturating_add(1);
    }
}

/// Anything that accepts bytes without blocking.
pub trait ByteSink {
    fn try_write(&mut self, buf: &[u8]) -> usize;
}

/// Anything that yields bytes without blocking.
pub trait ByteSource {
    fn try_read(&mut self, buf: &mut [u8]) -> usize;
}

impl ByteSink for Channel {
    fn try_write(&mut self, buf: &[u8]) -> usize {
        self.write(buf)
    }
}

impl ByteSink for ChannelWriter {
    fn try_write(&mut self, buf: &[u8]) -> usize {
        self.write(buf)
    }
}

impl ByteSource for Channel {
    fn try_read(&mut self, buf: &mut [u8]) -> usize {
        self.read(buf)
    }
}

impl ByteSource for ChannelReader {
    fn try_read(&mut self, buf: &mut [u8]) -> usize {
        self.read(buf)
    }
}

fn expired(start: Instant, timeout: Option<Duration>) -> Option<Duration> {
    let elapsed = start.elapsed();
    timeout.filter(|limit| elapsed >= *limit).map(|_| elapsed)
}

/// Write all of `buf`, waiting for the reader to make room.
///
/// `None` waits forever. On timeout the error reports how much was written;
/// those bytes are already visible to the peer.
pub fn write_all<W: ByteSink + ?Sized>(
    writer: &mut W,
    buf: &[u8],
    timeout: Option<Duration>,
) -> Result<()> {
    let start = Instant::now();
    let mut backoff = Backoff::new();
    let mut written = 0;
    while written < buf.len() {
        let n = writer.try_write(&buf[written..]);
        if n > 0 {
            written += n;
            backoff.reset();
            continue;
        }
        if let Some(elapsed) = expired(start, timeout) {
            return Err(ChannelError::Timeout {
                elapsed,
                transferred: written,
                requested: buf.len(),
            });
        }
        backoff.snooze();
    }
    trace!(bytes = written, "write_all complete");
    Ok(())
}

/// Fill all of `buf`, waiting for the writer to produce data.
pub fn read_exact<R: ByteSource + ?Sized>(
    reader: &mut R,
    buf: &mut [u8],
    timeout: Option<Duration>,
) -> Result<()> {
    let start = Instant::now();
    let mut backoff = Backoff::new();
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.try_read(&mut buf[filled..]);
        if n > 0 {
            filled += n;
            backoff.reset();
            continue;
        }
        if let Some(elapsed) = expired(start, timeout) {
            return Err(ChannelError::Timeout {
                elapsed,
                transferred: filled,
                requested: buf.len(),
            });
        }
        backoff.snooze();
    }
    trace!(bytes = filled, "read_exact complete");
    Ok(())
}

/// Wait until at least one byte is available, then read what fits.
///
/// Returns `Ok(0)` only for an empty `buf`.
pub fn read_some<R: ByteSource + ?Sized>(
    reader: &mut R,
    buf: &mut [u8],
    timeout: Option<Duration>,
) -> Result<usize> {
    if buf.is_empty() {
        return Ok(0);
    }
    let start = Instant::now();
    let mut backoff = Backoff::new();
    loop {
        let n = reader.try_read(buf);
        if n > 0 {
            return Ok(n);
        }
        if let Some(elapsed) = expired(start, timeout) {
            return Err(ChannelError::Timeout {
                elapsed,
                transferred: 0,
                requested: buf.len(),
            });
        }
        backoff.snooze();
    }
}

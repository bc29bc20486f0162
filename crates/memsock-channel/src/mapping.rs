use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::{MetadataExt, OpenOptionsExt, PermissionsExt};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use tracing::{debug, warn};

use crate::error::{ChannelError, Result};

/// A shared read/write mapping of a channel file.
#[derive(Debug)]
pub(crate) struct Mapping {
    base: NonNull<u8>,
    len: usize,
    path: PathBuf,
    identity: (u64, u64),
    _file: File,
}

// SAFETY: the mapping is plain shared memory; every access to the control
// block goes through atomics and ring bytes are only touched by the single
// owner of each head.
unsafe impl Send for Mapping {}
unsafe impl Sync for Mapping {}

impl Mapping {
    /// Create (or truncate) `path`, size it to `len` bytes and map it.
    pub(crate) fn create(path: &Path, len: usize, mode: u32) -> Result<Self> {
        let create_err = |source: io::Error| ChannelError::Create {
            path: path.to_path_buf(),
            source,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode)
            .open(path)
            .map_err(create_err)?;

        // Creation mode is filtered by umask; apply the requested bits exactly.
        file.set_permissions(std::fs::Permissions::from_mode(mode))
            .map_err(create_err)?;
        file.set_len(len as u64).map_err(create_err)?;

        Self::map(file, path, len)
    }

    /// Map an existing file whose length must be exactly `len` bytes.
    pub(crate) fn open(path: &Path, len: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| ChannelError::Create {
                path: path.to_path_buf(),
                source,
            })?;

        let actual = file
            .metadata()
            .map_err(|source| ChannelError::Create {
                path: path.to_path_buf(),
                source,
            })?
            .len();
        if actual != len as u64 {
            return Err(ChannelError::SizeMismatch {
                path: path.to_path_buf(),
                len: actual,
                required: len as u64,
            });
        }

        Self::map(file, path, len)
    }

    fn map(file: File, path: &Path, len: usize) -> Result<Self> {
        let create_err = |source: io::Error| ChannelError::Create {
            path: path.to_path_buf(),
            source,
        };
        let metadata = file.metadata().map_err(create_err)?;

        // SAFETY: fd is open read/write and sized to at least len bytes.
        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(create_err(io::Error::last_os_error()));
        }
        let base = NonNull::new(addr as *mut u8)
            .ok_or_else(|| create_err(io::Error::other("mmap returned null")))?;

        debug!(?path, len, addr = ?base, "mapped channel file");
        Ok(Self {
            base,
            len,
            path: path.to_path_buf(),
            identity: (metadata.dev(), metadata.ino()),
            _file: file,
        })
    }

    pub(crate) fn base(&self) -> NonNull<u8> {
        self.base
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// (device, inode) of the backing file at map time.
    pub(crate) fn identity(&self) -> (u64, u64) {
        self.identity
    }

    /// Synchronously write dirty pages back to the file.
    pub(crate) fn flush(&self) -> Result<()> {
        // SAFETY: base/len describe a live mapping owned by self.
        let rc = unsafe { libc::msync(self.base.as_ptr().cast(), self.len, libc::MS_SYNC) };
        if rc != 0 {
            return Err(ChannelError::Flush {
                path: self.path.clone(),
                source: io::Error::last_os_error(),
            });
        }
        Ok(())
    }

    fn unmap(&mut self) -> io::Result<()> {
        if self.len == 0 {
            return Ok(());
        }
        // SAFETY: base/len came from a successful mmap and are unmapped once;
        // len is zeroed below so Drop does not repeat it.
        let rc = unsafe { libc::munmap(self.base.as_ptr().cast(), self.len) };
        self.len = 0;
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Flush, unmap and close the file, reporting failures.
    pub(crate) fn close(mut self) -> Result<()> {
        self.flush()?;
        self.unmap().map_err(|source| ChannelError::Unmap {
            path: self.path.clone(),
            source,
        })
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        if let Err(err) = self.unmap() {
            warn!(path = ?self.path, error = %err, "failed to unmap channel file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(label: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        PathBuf::from(format!(
            "/tmp/memsock-map-{label}-{}-{nanos}",
            std::process::id()
        ))
    }

    #[test]
    fn create_sizes_file_and_applies_mode() {
        let path = temp_path("create");
        let mapping = Mapping::create(&path, 64, 0o640).unwrap();
        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.len(), 64);
        assert_eq!(meta.permissions().mode() & 0o777, 0o640);
        assert_eq!(mapping.identity(), (meta.dev(), meta.ino()));
        mapping.close().unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn open_rejects_short_file() {
        let path = temp_path("short");
        std::fs::write(&path, [0u8; 10]).unwrap();
        let err = Mapping::open(&path, 64).unwrap_err();
        assert!(matches!(
            err,
            ChannelError::SizeMismatch {
                len: 10,
                required: 64,
                ..
            }
        ));
        assert!(err.is_creation_error());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn open_rejects_long_file() {
        let path = temp_path("long");
        std::fs::write(&path, [0u8; 148]).unwrap();
        let err = Mapping::open(&path, 36).unwrap_err();
        assert!(matches!(
            err,
            ChannelError::SizeMismatch {
                len: 148,
                required: 36,
                ..
            }
        ));
        assert!(err.is_creation_error());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn open_missing_file_is_creation_error() {
        let err = Mapping::open(&temp_path("missing"), 64).unwrap_err();
        assert!(matches!(err, ChannelError::Create { .. }));
    }

    #[test]
    fn two_mappings_share_bytes() {
        let path = temp_path("share");
        let a = Mapping::create(&path, 32, 0o600).unwrap();
        let b = Mapping::open(&path, 32).unwrap();
        unsafe { a.base().as_ptr().add(5).write(0x5a) };
        assert_eq!(unsafe { b.base().as_ptr().add(5).read() }, 0x5a);
        assert_eq!(a.identity(), b.identity());
        drop(a);
        drop(b);
        let _ = std::fs::remove_file(&path);
    }
}

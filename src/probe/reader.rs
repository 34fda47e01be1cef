//! Single-block reads against the target file, bypassing the page cache
//! where the platform and filesystem allow it.
//!
//! The I/O mode is chosen once, at open time: direct I/O is attempted first
//! and the reader silently falls back to buffered reads when the platform or
//! filesystem rejects it. Reads never branch on the mode afterwards.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::selector::BlockSelector;
use crate::error::{ConfigError, ProbeError};

/// Largest buffer alignment we ever need; covers 4K-native devices.
const MAX_ALIGNMENT: u64 = 4096;

// ─── Public types ────────────────────────────────────────────────

/// How the target file was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoMode {
    /// Page cache bypassed (`O_DIRECT`, `F_NOCACHE`, `FILE_FLAG_NO_BUFFERING`).
    Direct,
    /// Regular buffered reads.
    Buffered,
}

impl fmt::Display for IoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Buffered => f.write_str("buffered"),
        }
    }
}

/// Wall-clock breakdown of one successful block read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadTiming {
    pub bytes: usize,
    pub seek: Duration,
    pub read: Duration,
}

impl ReadTiming {
    /// Seek and read combined; this is what lands in the histogram.
    pub fn total(&self) -> Duration {
        self.seek + self.read
    }
}

/// Owns the target file handle. Not shared: one reader per probe loop.
pub struct DirectReader {
    file: File,
    path: PathBuf,
    len: u64,
    mode: IoMode,
    selector: BlockSelector,
    buffer: AlignedBuffer,
}

// ─── DirectReader impl ───────────────────────────────────────────

impl DirectReader {
    /// Opens `path` for reading and validates that it holds at least one
    /// block. With `prefer_direct`, direct I/O is probed first.
    pub fn open(
        path: impl AsRef<Path>,
        block_size: u64,
        prefer_direct: bool,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let open_err = |source| ConfigError::Open {
            path: path.clone(),
            source,
        };

        let (file, mode) = if prefer_direct {
            match open_direct(&path).map_err(open_err)? {
                DirectOpen::Opened(file) => (file, IoMode::Direct),
                DirectOpen::Unsupported(reason) => {
                    warn!(
                        "Direct I/O unavailable for {:?} ({}), falling back to buffered reads",
                        path, reason
                    );
                    (open_buffered(&path).map_err(open_err)?, IoMode::Buffered)
                }
            }
        } else {
            (open_buffered(&path).map_err(open_err)?, IoMode::Buffered)
        };

        let len = file
            .metadata()
            .map_err(|source| ConfigError::Metadata {
                path: path.clone(),
                source,
            })?
            .len();

        let selector =
            BlockSelector::new(len, block_size).ok_or_else(|| ConfigError::FileTooSmall {
                path: path.clone(),
                len,
                block_size,
            })?;

        let mut reader = Self {
            file,
            path,
            len,
            mode,
            selector,
            buffer: AlignedBuffer::new(block_size as usize, block_size.min(MAX_ALIGNMENT) as usize),
        };

        if reader.mode == IoMode::Direct {
            reader.probe_direct()?;
        }

        Ok(reader)
    }

    /// Some filesystems accept `O_DIRECT` at open time but reject the first
    /// read. Try one read and reopen buffered if that happens.
    fn probe_direct(&mut self) -> Result<(), ConfigError> {
        match self.read_block(0) {
            Ok(_) => Ok(()),
            Err(ProbeError::Read { source, .. }) if is_unsupported(&source) => {
                warn!(
                    "Direct reads rejected for {:?} ({}), falling back to buffered reads",
                    self.path, source
                );
                self.file = open_buffered(&self.path).map_err(|source| ConfigError::Open {
                    path: self.path.clone(),
                    source,
                })?;
                self.mode = IoMode::Buffered;
                Ok(())
            }
            // Any other failure is a storage problem, which is what we measure.
            Err(e) => {
                debug!("Direct I/O probe read failed: {}", e);
                Ok(())
            }
        }
    }

    /// Reads exactly one block at `offset`, timing the seek and the read.
    ///
    /// A read returning fewer than `block_size` bytes is a failure.
    pub fn read_block(&mut self, offset: u64) -> Result<ReadTiming, ProbeError> {
        let t_seek = Instant::now();
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|source| ProbeError::Seek { offset, source })?;
        let seek = t_seek.elapsed();

        let buf = self.buffer.as_mut_slice();
        let expected = buf.len();

        let t_read = Instant::now();
        let bytes = fill(&mut self.file, buf).map_err(|source| ProbeError::Read { offset, source })?;
        let read = t_read.elapsed();

        if bytes < expected {
            return Err(ProbeError::ShortRead {
                offset,
                read: bytes,
                expected,
            });
        }

        Ok(ReadTiming { bytes, seek, read })
    }

    /// Contents of the most recent read.
    #[cfg(test)]
    pub fn last_block(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File length as seen at open time.
    pub fn file_len(&self) -> u64 {
        self.len
    }

    pub fn mode(&self) -> IoMode {
        self.mode
    }

    pub fn block_size(&self) -> u64 {
        self.selector.block_size()
    }

    pub fn selector(&self) -> BlockSelector {
        self.selector
    }
}

impl fmt::Debug for DirectReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectReader")
            .field("path", &self.path)
            .field("len", &self.len)
            .field("mode", &self.mode)
            .field("block_size", &self.block_size())
            .finish()
    }
}

/// Reads until `buf` is full or EOF. Returns the number of bytes read.
fn fill(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// ─── Opening ─────────────────────────────────────────────────────

enum DirectOpen {
    Opened(File),
    Unsupported(String),
}

/// EINVAL / EOPNOTSUPP: the filesystem or platform doesn't do direct I/O.
fn is_unsupported(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::InvalidInput | io::ErrorKind::Unsupported
    )
}

fn open_buffered(path: &Path) -> io::Result<File> {
    OpenOptions::new().read(true).open(path)
}

#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
fn open_direct(path: &Path) -> io::Result<DirectOpen> {
    use std::os::unix::fs::OpenOptionsExt;

    match OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_DIRECT)
        .open(path)
    {
        Ok(file) => Ok(DirectOpen::Opened(file)),
        Err(e) if is_unsupported(&e) => Ok(DirectOpen::Unsupported(e.to_string())),
        Err(e) => Err(e),
    }
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
fn open_direct(path: &Path) -> io::Result<DirectOpen> {
    use std::os::unix::io::AsRawFd;

    let file = open_buffered(path)?;
    // SAFETY: the descriptor belongs to `file`, which outlives the call.
    let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_NOCACHE, 1) };
    if rc == -1 {
        return Ok(DirectOpen::Unsupported(
            io::Error::last_os_error().to_string(),
        ));
    }
    Ok(DirectOpen::Opened(file))
}

#[cfg(windows)]
fn open_direct(path: &Path) -> io::Result<DirectOpen> {
    use std::os::windows::fs::OpenOptionsExt;

    const FILE_FLAG_NO_BUFFERING: u32 = 0x2000_0000;
    match OpenOptions::new()
        .read(true)
        .custom_flags(FILE_FLAG_NO_BUFFERING)
        .open(path)
    {
        Ok(file) => Ok(DirectOpen::Opened(file)),
        Err(e) if is_unsupported(&e) => Ok(DirectOpen::Unsupported(e.to_string())),
        Err(e) => Err(e),
    }
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "macos",
    target_os = "ios",
    windows
)))]
fn open_direct(_path: &Path) -> io::Result<DirectOpen> {
    Ok(DirectOpen::Unsupported(
        "not supported on this platform".to_string(),
    ))
}

// ─── Aligned buffer ──────────────────────────────────────────────

/// A `len`-byte window into an over-allocated `Vec`, starting on an
/// `align`-byte boundary. The Vec never grows, so the window stays put.
struct AlignedBuffer {
    storage: Vec<u8>,
    start: usize,
    len: usize,
}

impl AlignedBuffer {
    fn new(len: usize, align: usize) -> Self {
        let storage = vec![0u8; len + align];
        let addr = storage.as_ptr() as usize;
        let start = (align - addr % align) % align;
        Self {
            storage,
            start,
            len,
        }
    }

    #[cfg(test)]
    fn as_slice(&self) -> &[u8] {
        &self.storage[self.start..self.start + self.len]
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.storage[self.start..self.start + self.len]
    }
}

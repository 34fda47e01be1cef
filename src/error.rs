use std::path::PathBuf;

use thiserror::Error;

// ─── Startup (fatal) ─────────────────────────────────────────────

/// Anything that prevents the exporter from starting. Surfaces to the
/// process boundary and turns into a non-zero exit code.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("can't open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("can't read file length of {path:?}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file {path:?} is too small: {len} bytes, need at least {block_size}")]
    FileTooSmall {
        path: PathBuf,
        len: u64,
        block_size: u64,
    },

    #[error("invalid block size {0}: must be a power of two of at least 512 bytes")]
    InvalidBlockSize(u64),

    #[error("histogram bucket bounds must be positive, finite and strictly increasing")]
    InvalidBuckets,

    #[error("invalid listen address {0:?}: expected HOST:PORT or PORT")]
    InvalidListenAddr(String),

    #[error("can't bind metrics listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

// ─── Per-iteration (absorbed into errors_total) ──────────────────

/// Failure of a single probe iteration. Never propagated past the sampler.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("error seeking to {offset}: {source}")]
    Seek {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("error reading at offset {offset}: {source}")]
    Read {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("short read at offset {offset}: got {read} of {expected} bytes")]
    ShortRead {
        offset: u64,
        read: usize,
        expected: usize,
    },
}

/// Coarse classification of a failed iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Seek,
    Read,
}

impl ProbeError {
    /// Short reads count as read failures.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Seek { .. } => FailureKind::Seek,
            Self::Read { .. } | Self::ShortRead { .. } => FailureKind::Read,
        }
    }

    #[cfg(test)]
    pub fn offset(&self) -> u64 {
        match self {
            Self::Seek { offset, .. }
            | Self::Read { offset, .. }
            | Self::ShortRead { offset, .. } => *offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn short_read_is_classified_as_read_failure() {
        let err = ProbeError::ShortRead {
            offset: 8192,
            read: 100,
            expected: 4096,
        };
        assert_eq!(err.kind(), FailureKind::Read);
        assert_eq!(err.offset(), 8192);
        assert_eq!(
            err.to_string(),
            "short read at offset 8192: got 100 of 4096 bytes"
        );
    }

    #[test]
    fn seek_failure_keeps_its_own_kind() {
        let err = ProbeError::Seek {
            offset: 0,
            source: io::Error::from(io::ErrorKind::InvalidInput),
        };
        assert_eq!(err.kind(), FailureKind::Seek);
    }

    #[test]
    fn file_too_small_message_names_both_sizes() {
        let err = ConfigError::FileTooSmall {
            path: PathBuf::from("/data/probe.img"),
            len: 100,
            block_size: 4096,
        };
        let msg = err.to_string();
        assert!(msg.contains("100 bytes"));
        assert!(msg.contains("4096"));
    }
}

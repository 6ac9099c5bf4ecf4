use std::path::PathBuf;

use thiserror::Error;

/// Builds an [`Error::Malformed`] tagged with the source location that detected it.
macro_rules! malformed_error {
    ($msg:expr) => {
        crate::error::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::error::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

pub(crate) use malformed_error;

/// Errors produced while relocating a classpath.
///
/// Three families matter to callers:
///
/// - resource failures ([`Error::ResourceRead`], [`Error::Malformed`]) are logged by the
///   pipeline and the offending resource is skipped;
/// - structural failures ([`Error::DuplicateEntry`], [`Error::InconsistentState`]) abort the
///   whole transform;
/// - archive failures ([`Error::ArchiveOpen`], [`Error::ArchiveFormat`]) are fatal as soon as
///   the archive is touched.
#[derive(Error, Debug)]
pub enum Error {
    /// The archive or directory could not be opened at all.
    #[error("failed to open {path}: {source}")]
    ArchiveOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file opened but its ZIP central directory is unreadable.
    #[error("failed to read zip structure of {path}: {source}")]
    ArchiveFormat {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// A single entry could not be read.
    #[error("failed to read {name}: {reason}")]
    ResourceRead { name: String, reason: String },

    /// A class file (or a descriptor inside it) is damaged.
    #[error("malformed class data - {file}:{line}: {message}")]
    Malformed {
        message: String,
        file: &'static str,
        line: u32,
    },

    /// Two inputs produced the same output path while duplicates are fatal.
    #[error("duplicate entry {name}: first from {first}, again from {second}")]
    DuplicateEntry {
        name: String,
        first: String,
        second: String,
    },

    /// Pipeline or rename state was used out of order.
    #[error("inconsistent transform state: {0}")]
    InconsistentState(String),

    /// A stage name in the configuration has no registered constructor.
    #[error("unknown stage: {0}")]
    UnknownStage(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    /// Whether the error only affects the resource being processed.
    pub fn is_resource_failure(&self) -> bool {
        matches!(self, Error::ResourceRead { .. } | Error::Malformed { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_failures_are_classified() {
        let read = Error::ResourceRead {
            name: "a/B.class".to_string(),
            reason: "invalid deflate stream".to_string(),
        };
        assert!(read.is_resource_failure());
        assert!(malformed_error!("bad magic {:#x}", 0xdead_u32).is_resource_failure());

        let dup = Error::DuplicateEntry {
            name: "a/B.class".to_string(),
            first: "one.jar".to_string(),
            second: "two.jar".to_string(),
        };
        assert!(!dup.is_resource_failure());
        assert!(dup.to_string().contains("a/B.class"));
    }

    #[test]
    fn malformed_error_records_location() {
        let err = malformed_error!("truncated");
        match err {
            Error::Malformed { message, file, .. } => {
                assert_eq!(message, "truncated");
                assert!(file.ends_with("error.rs"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

//! Error types for shared memory record operations

use thiserror::Error;

/// Errors that can occur during shared memory record operations
#[derive(Error, Debug)]
pub enum ShmError {
    /// Segment already exists
    #[error("Segment already exists: {name}")]
    AlreadyExists {
        /// Segment name
        name: String,
    },

    /// Segment not found
    #[error("Segment not found: {name}")]
    NotFound {
        /// Segment name
        name: String,
    },

    /// Existing segment has a different byte length than requested
    #[error("Segment '{name}' is {actual} bytes, expected {expected}")]
    SizeMismatch {
        /// Segment name
        name: String,
        /// Requested byte length
        expected: usize,
        /// Byte length of the existing region
        actual: usize,
    },

    /// Invalid segment size
    #[error("Invalid segment size: {size} bytes")]
    InvalidSize {
        /// Attempted size in bytes
        size: usize,
    },

    /// Segment name cannot be used as an OS object name
    #[error("Invalid segment name '{name}': {reason}")]
    InvalidName {
        /// Rejected name
        name: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Record layout description could not be parsed or is unusable
    #[error("Invalid record layout: {reason}")]
    InvalidLayout {
        /// What is wrong with the layout
        reason: String,
    },

    /// Record index (or range end) outside `[0, length)`
    #[error("Index {index} out of range for {length} records")]
    IndexOutOfRange {
        /// Offending index
        index: usize,
        /// Record count of the view
        length: usize,
    },

    /// Record value does not match the bound layout
    #[error("Record shape mismatch: expected {expected}, got {found}")]
    ShapeMismatch {
        /// Shape required by the layout
        expected: String,
        /// Shape of the supplied value
        found: String,
    },

    /// Borrow token unknown to this view or already released
    #[error("Invalid borrow token #{id}")]
    InvalidToken {
        /// Token sequence number
        id: u64,
    },

    /// Teardown refused while borrowed bytes are outstanding
    #[error("Segment '{name}' busy: {outstanding} borrow(s) still outstanding")]
    ResourceBusy {
        /// Segment name
        name: String,
        /// Number of unreleased borrow tokens
        outstanding: usize,
    },

    /// Operation on a view that has already been torn down
    #[error("Segment '{name}' used after release")]
    UseAfterRelease {
        /// Segment name
        name: String,
    },

    /// Permission denied
    #[error("Permission denied accessing segment: {name}")]
    PermissionDenied {
        /// Segment name
        name: String,
    },

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },

    /// Nix system call error
    #[error("System call error: {source}")]
    Nix {
        /// Source nix error
        #[from]
        source: nix::Error,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    Json {
        /// Source JSON error
        #[from]
        source: serde_json::Error,
    },
}

impl ShmError {
    /// Map an IO error from opening or creating `name` onto the segment taxonomy.
    pub(crate) fn from_open_error(name: &str, err: std::io::Error) -> Self {
        if err.raw_os_error() == Some(libc::ENAMETOOLONG) {
            return ShmError::InvalidName {
                name: name.to_string(),
                reason: "too long for the shm file system",
            };
        }
        match err.kind() {
            std::io::ErrorKind::AlreadyExists => ShmError::AlreadyExists {
                name: name.to_string(),
            },
            std::io::ErrorKind::NotFound => ShmError::NotFound {
                name: name.to_string(),
            },
            std::io::ErrorKind::PermissionDenied => ShmError::PermissionDenied {
                name: name.to_string(),
            },
            _ => ShmError::Io { source: err },
        }
    }
}

/// Result type for shared memory record operations
pub type ShmResult<T> = Result<T, ShmError>;

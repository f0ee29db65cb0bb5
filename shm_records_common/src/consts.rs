//! Shared memory naming and sizing constants.
//!
//! These constants are the single source of truth for the workspace; all other
//! crates should import from here.

/// Default directory holding named shared memory objects.
///
/// On Linux this is the tmpfs mount backing POSIX `shm_open`.
pub const SHM_DEFAULT_DIR: &str = "/dev/shm";

/// Environment variable overriding [`SHM_DEFAULT_DIR`].
pub const SHM_DIR_ENV: &str = "SHM_RECORDS_DIR";

/// Maximum length of a segment name in bytes (POSIX `NAME_MAX`).
pub const MAX_NAME_LENGTH: usize = 255;

/// Length of generated segment names, including the prefix.
pub const GENERATED_NAME_LENGTH: usize = 30;

/// Default prefix for generated segment names.
pub const DEFAULT_NAME_PREFIX: &str = "rec_";

/// Permission bits for newly created segments (owner read/write only).
pub const DEFAULT_FILE_MODE: u32 = 0o600;

/// Attempts made to find a free generated name before giving up.
pub const NAME_COLLISION_RETRIES: usize = 8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_name_fits_limit() {
        assert!(GENERATED_NAME_LENGTH <= MAX_NAME_LENGTH);
        assert!(DEFAULT_NAME_PREFIX.len() < GENERATED_NAME_LENGTH);
    }

    #[test]
    fn test_file_mode_is_private() {
        assert_eq!(DEFAULT_FILE_MODE & 0o077, 0);
    }
}

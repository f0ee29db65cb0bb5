//! Named shared memory objects backed by files in the shm directory

use crate::error::{ShmError, ShmResult};
use common::config::ShmConfig;
use memmap2::{MmapMut, MmapOptions};
use nix::unistd::getpid;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

/// Mapping options derived from [`ShmConfig`]
#[derive(Debug, Clone, Copy)]
pub struct MapConfig {
    /// Pre-fault pages (`MAP_POPULATE`)
    pub populate: bool,
    /// Permission bits for created objects
    pub file_mode: u32,
}

impl From<&ShmConfig> for MapConfig {
    fn from(config: &ShmConfig) -> Self {
        Self {
            populate: config.populate,
            file_mode: config.file_mode,
        }
    }
}

/// Create a new named object of exactly `size` bytes and map it shared.
///
/// Fails with `AlreadyExists` if the object is already present. The object is
/// removed again if sizing or mapping fails.
pub fn create_segment_mmap(
    name: &str,
    path: &Path,
    size: usize,
    config: MapConfig,
) -> ShmResult<MmapMut> {
    let file = OpenOptions::new()
        .create_new(true)
        .read(true)
        .write(true)
        .mode(config.file_mode)
        .open(path)
        .map_err(|e| ShmError::from_open_error(name, e))?;

    let mapped = file
        .set_len(size as u64)
        .map_err(ShmError::from)
        .and_then(|()| map_shared(&file, config.populate));

    if mapped.is_err() {
        let _ = std::fs::remove_file(path);
    }
    mapped
}

/// Map an existing named object, checking its length against `expected_size`.
pub fn attach_segment_mmap(
    name: &str,
    path: &Path,
    expected_size: usize,
    config: MapConfig,
) -> ShmResult<MmapMut> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| ShmError::from_open_error(name, e))?;

    let actual = file.metadata()?.len() as usize;
    if actual != expected_size {
        return Err(ShmError::SizeMismatch {
            name: name.to_string(),
            expected: expected_size,
            actual,
        });
    }

    map_shared(&file, config.populate)
}

fn map_shared(file: &File, populate: bool) -> ShmResult<MmapMut> {
    let mut options = MmapOptions::new();
    if populate {
        options.populate();
    }
    // SAFETY: the object is shared by design; concurrent modification by other
    // processes is part of the record view contract and is never reinterpreted
    // as anything but plain bytes.
    let mmap = unsafe { options.map_mut(file)? };
    Ok(mmap)
}

/// Remove a named object from the namespace.
///
/// Existing mappings stay valid until unmapped.
pub fn unlink_segment(name: &str, path: &Path) -> ShmResult<()> {
    std::fs::remove_file(path).map_err(|e| ShmError::from_open_error(name, e))
}

/// Get current process ID
pub fn get_current_pid() -> u32 {
    getpid().as_raw() as u32
}

//! Process-wide tracking of segments owned by this process
//!
//! Every segment created (not merely opened) by this process is registered
//! here until it is released. An embedding application can sweep the
//! remaining names from its shutdown path with [`cleanup_owned_segments`].

use crate::platform::get_current_pid;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

/// Metadata for one owned segment
#[derive(Debug, Clone)]
pub struct OwnedSegment {
    /// Segment name
    pub name: String,
    /// Backing object path
    pub path: PathBuf,
    /// Byte length
    pub byte_len: usize,
    /// Creating process ID
    pub owner_pid: u32,
    /// Creation time
    pub created_at: SystemTime,
}

/// Registry of segments this process must unlink
#[derive(Debug, Default)]
pub struct SegmentRegistry {
    owned: HashMap<PathBuf, OwnedSegment>,
}

impl SegmentRegistry {
    /// Register a newly created segment
    pub fn register(&mut self, name: &str, path: PathBuf, byte_len: usize) {
        let entry = OwnedSegment {
            name: name.to_string(),
            path: path.clone(),
            byte_len,
            owner_pid: get_current_pid(),
            created_at: SystemTime::now(),
        };
        self.owned.insert(path, entry);
    }

    /// Forget a segment, returning its metadata if it was registered
    pub fn unregister(&mut self, path: &Path) -> Option<OwnedSegment> {
        self.owned.remove(path)
    }

    /// Whether `path` is currently registered
    pub fn contains(&self, path: &Path) -> bool {
        self.owned.contains_key(path)
    }

    /// Snapshot of all registered segments
    pub fn segments(&self) -> Vec<OwnedSegment> {
        self.owned.values().cloned().collect()
    }

    /// Unlink every registered name and clear the registry.
    ///
    /// Mappings are left alone. Returns how many names were actually removed;
    /// names already gone from the namespace are skipped silently.
    pub fn cleanup(&mut self) -> usize {
        let mut removed = 0;

        for (path, segment) in self.owned.drain() {
            // A forked child inherits the parent's registry but owns nothing.
            if segment.owner_pid != get_current_pid() {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    tracing::info!("Unlinked owned segment: {}", segment.name);
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::error!("Failed to unlink owned segment {}: {}", segment.name, e);
                }
            }
        }

        removed
    }
}

static GLOBAL_REGISTRY: LazyLock<Mutex<SegmentRegistry>> =
    LazyLock::new(|| Mutex::new(SegmentRegistry::default()));

/// Lock the process-wide registry
pub fn global_registry() -> MutexGuard<'static, SegmentRegistry> {
    GLOBAL_REGISTRY.lock()
}

/// Segments created by this process and not yet released
pub fn owned_segments() -> Vec<OwnedSegment> {
    global_registry().segments()
}

/// Unlink every segment this process created and has not released.
///
/// Intended for shutdown paths; it does not unmap anything, so views still
/// in use keep working until they are torn down.
pub fn cleanup_owned_segments() -> usize {
    global_registry().cleanup()
}

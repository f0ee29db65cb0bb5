//! Named shared memory segment: create/open, fixed sizing and terminal release

use crate::error::{ShmError, ShmResult};
use crate::naming::validate_name;
use crate::platform::{
    MapConfig, attach_segment_mmap, create_segment_mmap, get_current_pid, unlink_segment,
};
use crate::registry::global_registry;
use common::config::ShmConfig;
use memmap2::MmapMut;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// One named region of shared memory mapped into this process.
///
/// A segment is either the *owner* (it created the name and is the only side
/// allowed to unlink it) or an *attacher* (it opened an existing name and
/// only ever unmaps). The byte length is fixed for the segment's lifetime.
///
/// Slices returned by [`bytes`](Self::bytes) and
/// [`bytes_mut`](Self::bytes_mut) borrow the segment, so they cannot outlive
/// [`release`](Self::release). Raw pointers handed out by record views are
/// tracked one level up, in their borrow ledger.
pub struct Segment {
    name: String,
    path: PathBuf,
    byte_len: usize,
    owner: bool,
    base: NonNull<u8>,
    mmap: Option<MmapMut>,
}

// SAFETY: `base` points into `mmap`, which is itself Send + Sync. The segment
// never hands out references that alias mutably through `&self`; raw writes
// through `base` are the record view's concern.
unsafe impl Send for Segment {}
unsafe impl Sync for Segment {}

impl Segment {
    /// Create and map a new segment of exactly `byte_len` bytes
    pub fn create(name: &str, byte_len: usize) -> ShmResult<Self> {
        Self::create_in(&ShmConfig::from_env(), name, byte_len)
    }

    /// Create a segment using an explicit configuration
    pub fn create_in(config: &ShmConfig, name: &str, byte_len: usize) -> ShmResult<Self> {
        validate_name(name)?;
        if byte_len == 0 {
            return Err(ShmError::InvalidSize { size: byte_len });
        }

        let path = config.segment_path(name);
        let mmap = create_segment_mmap(name, &path, byte_len, MapConfig::from(config))?;
        global_registry().register(name, path.clone(), byte_len);

        tracing::info!(
            "Created segment {} ({} bytes) at {} by pid {}",
            name,
            byte_len,
            path.display(),
            get_current_pid()
        );

        Ok(Self::from_mmap(name, path, byte_len, true, mmap))
    }

    /// Map an existing segment, checking its length
    pub fn open(name: &str, byte_len: usize) -> ShmResult<Self> {
        Self::open_in(&ShmConfig::from_env(), name, byte_len)
    }

    /// Open a segment using an explicit configuration
    pub fn open_in(config: &ShmConfig, name: &str, byte_len: usize) -> ShmResult<Self> {
        validate_name(name)?;
        if byte_len == 0 {
            return Err(ShmError::InvalidSize { size: byte_len });
        }

        let path = config.segment_path(name);
        let mmap = attach_segment_mmap(name, &path, byte_len, MapConfig::from(config))?;

        tracing::debug!("Attached segment {} ({} bytes)", name, byte_len);

        Ok(Self::from_mmap(name, path, byte_len, false, mmap))
    }

    fn from_mmap(
        name: &str,
        path: PathBuf,
        byte_len: usize,
        owner: bool,
        mut mmap: MmapMut,
    ) -> Self {
        // A successful non-empty mapping never yields a null address.
        let base = NonNull::new(mmap.as_mut_ptr()).unwrap_or(NonNull::dangling());
        Self {
            name: name.to_string(),
            path,
            byte_len,
            owner,
            base,
            mmap: Some(mmap),
        }
    }

    /// Segment name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the backing object
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total byte length
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Whether this side created the segment
    pub fn is_owner(&self) -> bool {
        self.owner
    }

    /// Whether [`release`](Self::release) has run
    pub fn is_released(&self) -> bool {
        self.mmap.is_none()
    }

    /// Mapped bytes `[0, byte_len)`
    pub fn bytes(&self) -> ShmResult<&[u8]> {
        match &self.mmap {
            Some(mmap) => Ok(&mmap[..]),
            None => Err(self.released_error()),
        }
    }

    /// Mapped bytes `[0, byte_len)`, writable
    pub fn bytes_mut(&mut self) -> ShmResult<&mut [u8]> {
        match self.mmap.as_mut() {
            Some(mmap) => Ok(&mut mmap[..]),
            None => Err(ShmError::UseAfterRelease {
                name: self.name.clone(),
            }),
        }
    }

    /// Base address of the mapping while mapped
    pub(crate) fn base_ptr(&self) -> ShmResult<NonNull<u8>> {
        if self.mmap.is_none() {
            return Err(self.released_error());
        }
        Ok(self.base)
    }

    /// Unmap, and unlink the name if this side owns it.
    ///
    /// Idempotent: once released, further calls return `Ok(())`. The caller
    /// must guarantee no raw pointer into the mapping is still in use.
    /// Failure to remove the name is returned, not swallowed; the mapping is
    /// gone either way, but the name stays registered so
    /// [`cleanup_owned_segments`](crate::cleanup_owned_segments) can retry.
    pub fn release(&mut self) -> ShmResult<()> {
        let Some(mmap) = self.mmap.take() else {
            return Ok(());
        };
        drop(mmap);

        if self.owner {
            // The registry entry is gone if a shutdown sweep already unlinked it.
            let mut registry = global_registry();
            if registry.contains(&self.path) {
                let unlinked = unlink_segment(&self.name, &self.path);
                if matches!(unlinked, Ok(()) | Err(ShmError::NotFound { .. })) {
                    registry.unregister(&self.path);
                }
                unlinked?;
            }
            drop(registry);
            tracing::info!("Released and unlinked segment {}", self.name);
        } else {
            tracing::debug!("Detached segment {}", self.name);
        }

        Ok(())
    }

    /// Give up the mapping without unmapping it.
    ///
    /// Used when raw pointers may still reference the bytes. The name stays
    /// registered so a later shutdown sweep can still unlink it.
    pub(crate) fn leak(&mut self) {
        if let Some(mmap) = self.mmap.take() {
            std::mem::forget(mmap);
        }
    }

    fn released_error(&self) -> ShmError {
        ShmError::UseAfterRelease {
            name: self.name.clone(),
        }
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("byte_len", &self.byte_len)
            .field("owner", &self.owner)
            .field("released", &self.is_released())
            .finish()
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        if self.is_released() {
            return;
        }
        tracing::warn!("Segment {} dropped without release", self.name);
        if let Err(e) = self.release() {
            tracing::error!("Failed to release segment {} on drop: {}", self.name, e);
        }
    }
}

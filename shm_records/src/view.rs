//! Indexed record access over a shared memory segment

use crate::borrow::{Borrow, BorrowLedger, BorrowMut, BorrowToken, IntoRecordRange};
use crate::codec::RecordCodec;
use crate::error::{ShmError, ShmResult};
use crate::handle::SegmentHandle;
use crate::layout::RecordLayout;
use crate::naming::generate_name;
use crate::segment::Segment;
use common::config::ShmConfig;
use common::consts::NAME_COLLISION_RETRIES;
use parking_lot::Mutex;
use std::iter::FusedIterator;
use std::ops::Range;

/// Fixed-width records laid over one named shared memory segment.
///
/// The segment holds exactly `len() * codec.byte_width()` bytes. Any number
/// of views, in this or other processes, may map the same segment; each view
/// keeps its own ledger of outstanding [`Borrow`]s.
///
/// # Lifecycle
///
/// [`teardown`](Self::teardown) must be called exactly once. It refuses with
/// `ResourceBusy` while borrow tokens are outstanding and otherwise releases
/// the segment, unlinking the name if this view created it. A caller that
/// ignores `ResourceBusy` and abandons the view has leaked the named
/// segment; drop-time cleanup is a fallback only and never unmaps bytes that
/// detached borrows may still point into.
///
/// # Concurrency
///
/// `get_at`, `iter`, `borrow` and `release_borrow` take `&self` and may be
/// called from several threads. Writing (`set_at`, `borrow_mut`) takes
/// `&mut self`; threads that write concurrently attach views of their own,
/// as peer processes do. Writes to the same record from different views race
/// exactly like raw memory writes; no ordering or atomicity is provided.
pub struct RecordView<C: RecordCodec = RecordLayout> {
    segment: Segment,
    codec: C,
    length: usize,
    ledger: Mutex<BorrowLedger>,
}

impl<C: RecordCodec> RecordView<C> {
    /// Create a segment named `name` holding `length` records
    pub fn new(name: &str, length: usize, codec: C) -> ShmResult<Self> {
        Self::new_in(&ShmConfig::from_env(), name, length, codec)
    }

    /// [`new`](Self::new) with an explicit configuration
    pub fn new_in(config: &ShmConfig, name: &str, length: usize, codec: C) -> ShmResult<Self> {
        let byte_len = segment_byte_len(length, &codec)?;
        let segment = Segment::create_in(config, name, byte_len)?;
        Ok(Self::bind(segment, codec, length))
    }

    /// Create a segment with a generated unique name
    pub fn create(length: usize, codec: C) -> ShmResult<Self> {
        Self::create_in(&ShmConfig::from_env(), length, codec)
    }

    /// [`create`](Self::create) with an explicit configuration
    pub fn create_in(config: &ShmConfig, length: usize, codec: C) -> ShmResult<Self> {
        let byte_len = segment_byte_len(length, &codec)?;

        let mut last_err = None;
        for _ in 0..NAME_COLLISION_RETRIES {
            let name = generate_name(&config.name_prefix);
            match Segment::create_in(config, &name, byte_len) {
                Ok(segment) => return Ok(Self::bind(segment, codec, length)),
                Err(e @ ShmError::AlreadyExists { .. }) => {
                    tracing::debug!("Generated segment name collided: {}", name);
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| ShmError::AlreadyExists {
            name: config.name_prefix.clone(),
        }))
    }

    /// Attach to an existing segment of `length` records
    pub fn attach(name: &str, length: usize, codec: C) -> ShmResult<Self> {
        Self::attach_in(&ShmConfig::from_env(), name, length, codec)
    }

    /// [`attach`](Self::attach) with an explicit configuration
    pub fn attach_in(config: &ShmConfig, name: &str, length: usize, codec: C) -> ShmResult<Self> {
        let byte_len = segment_byte_len(length, &codec)?;
        let segment = Segment::open_in(config, name, byte_len)?;
        Ok(Self::bind(segment, codec, length))
    }

    /// Attach through a handle using a custom codec.
    ///
    /// The codec must describe the same layout the handle carries.
    pub fn attach_handle_with(
        config: &ShmConfig,
        handle: &SegmentHandle,
        codec: C,
    ) -> ShmResult<Self> {
        let layout = codec.layout();
        if layout != handle.layout {
            return Err(ShmError::ShapeMismatch {
                expected: handle.layout.format(),
                found: layout.format(),
            });
        }
        Self::attach_in(config, &handle.name, handle.length, codec)
    }

    fn bind(segment: Segment, codec: C, length: usize) -> Self {
        Self {
            segment,
            codec,
            length,
            ledger: Mutex::new(BorrowLedger::new()),
        }
    }

    /// Record count
    pub fn len(&self) -> usize {
        self.length
    }

    /// Whether the view holds no records (never true for a bound view)
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Segment name
    pub fn name(&self) -> &str {
        self.segment.name()
    }

    /// Whether this view created the segment
    pub fn is_owner(&self) -> bool {
        self.segment.is_owner()
    }

    /// Codec bound at construction
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Whether [`teardown`](Self::teardown) has completed
    pub fn is_released(&self) -> bool {
        self.segment.is_released()
    }

    /// Number of borrow tokens not yet released
    pub fn outstanding_borrows(&self) -> usize {
        self.ledger.lock().len()
    }

    /// Outstanding tokens with the record ranges they cover
    pub fn outstanding(&self) -> Vec<(BorrowToken, Range<usize>)> {
        self.ledger.lock().snapshot()
    }

    /// Decode the record at `index` into an owned value
    pub fn get_at(&self, index: usize) -> ShmResult<C::Value> {
        let base = self.segment.base_ptr()?;
        self.check_index(index)?;

        let width = self.codec.byte_width();
        let mut buf = vec![0u8; width];
        // SAFETY: index < length, so the record lies inside the mapping,
        // which stays mapped for the duration of `&self`.
        unsafe {
            std::ptr::copy_nonoverlapping(
                base.as_ptr().add(index * width),
                buf.as_mut_ptr(),
                width,
            );
        }
        self.codec.unpack(&buf)
    }

    /// Encode `value` into the record at `index`.
    ///
    /// The value is packed into a scratch buffer first, so a shape mismatch
    /// leaves the shared bytes untouched.
    pub fn set_at(&mut self, index: usize, value: &C::Value) -> ShmResult<()> {
        let base = self.segment.base_ptr()?;
        self.check_index(index)?;

        let width = self.codec.byte_width();
        let mut buf = vec![0u8; width];
        self.codec.pack(value, &mut buf)?;
        // SAFETY: the record lies inside the mapping, and `&mut self` rules
        // out any live guard of this view over the same bytes.
        unsafe {
            std::ptr::copy_nonoverlapping(buf.as_ptr(), base.as_ptr().add(index * width), width);
        }
        Ok(())
    }

    /// Iterate over `(index, value)` pairs, copying one record per step
    pub fn iter(&self) -> ShmResult<RecordIter<'_, C>> {
        self.segment.base_ptr()?;
        Ok(RecordIter {
            view: self,
            next: 0,
            end: self.length,
        })
    }

    /// Zero-copy read access to one record or a range of records.
    ///
    /// The returned guard registers a token in this view's ledger; dropping
    /// it (or calling [`Borrow::release`]) removes the token again.
    pub fn borrow(&self, records: impl IntoRecordRange) -> ShmResult<Borrow<'_>> {
        self.issue_borrow(records)
    }

    /// Zero-copy write access to one record or a range of records.
    ///
    /// Borrows the view exclusively, so neither other guards nor `get_at`
    /// can observe the bytes while they are being written in this process.
    pub fn borrow_mut(&mut self, records: impl IntoRecordRange) -> ShmResult<BorrowMut<'_>> {
        Ok(BorrowMut::new(self.issue_borrow(records)?))
    }

    fn issue_borrow(&self, records: impl IntoRecordRange) -> ShmResult<Borrow<'_>> {
        let base = self.segment.base_ptr()?;
        let records = records.into_record_range(self.length)?;

        let width = self.codec.byte_width();
        // SAFETY: records.start <= length, so the offset is at most one past
        // the end of the mapping.
        let ptr = unsafe { base.add(records.start * width) };
        let len = (records.end - records.start) * width;
        let token = self.ledger.lock().issue(records.clone());

        tracing::trace!(
            "Borrowed records {:?} of {} as token #{}",
            records,
            self.name(),
            token.id()
        );
        Ok(Borrow::new(&self.ledger, ptr, len, records, token))
    }

    /// Release a token detached with [`Borrow::into_raw`]
    pub fn release_borrow(&self, token: BorrowToken) -> ShmResult<()> {
        self.segment.base_ptr()?;
        self.ledger.lock().release(token)?;
        Ok(())
    }

    /// Release the segment once no borrow is outstanding.
    ///
    /// Fails immediately with `ResourceBusy` while tokens are outstanding;
    /// release them and call again. After success every operation on this
    /// view fails with `UseAfterRelease`, including a second teardown.
    pub fn teardown(&mut self) -> ShmResult<()> {
        self.segment.base_ptr()?;

        let outstanding = self.ledger.get_mut().len();
        if outstanding > 0 {
            tracing::warn!(
                "Teardown of {} refused: {} borrow(s) outstanding",
                self.name(),
                outstanding
            );
            return Err(ShmError::ResourceBusy {
                name: self.name().to_string(),
                outstanding,
            });
        }

        self.segment.release()
    }

    /// Descriptor a peer process can attach with
    pub fn export_handle(&self) -> ShmResult<SegmentHandle> {
        self.segment.base_ptr()?;
        Ok(SegmentHandle::new(
            self.name(),
            self.length,
            self.codec.layout(),
        ))
    }

    fn check_index(&self, index: usize) -> ShmResult<()> {
        if index >= self.length {
            return Err(ShmError::IndexOutOfRange {
                index,
                length: self.length,
            });
        }
        Ok(())
    }
}

impl RecordView<RecordLayout> {
    /// Attach to the segment described by `handle`
    pub fn attach_handle(handle: &SegmentHandle) -> ShmResult<Self> {
        Self::attach_handle_in(&ShmConfig::from_env(), handle)
    }

    /// [`attach_handle`](Self::attach_handle) with an explicit configuration
    pub fn attach_handle_in(config: &ShmConfig, handle: &SegmentHandle) -> ShmResult<Self> {
        Self::attach_in(config, &handle.name, handle.length, handle.layout.clone())
    }

    /// Record layout
    pub fn layout(&self) -> &RecordLayout {
        &self.codec
    }
}

impl<C: RecordCodec> std::fmt::Debug for RecordView<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordView")
            .field("segment", &self.segment)
            .field("length", &self.length)
            .field("byte_width", &self.codec.byte_width())
            .field("outstanding_borrows", &self.outstanding_borrows())
            .finish()
    }
}

impl<C: RecordCodec> Drop for RecordView<C> {
    fn drop(&mut self) {
        if self.segment.is_released() {
            return;
        }

        let outstanding = self.ledger.get_mut().len();
        if outstanding > 0 {
            tracing::error!(
                "RecordView {} dropped with {} outstanding borrow(s); leaking its mapping",
                self.segment.name(),
                outstanding
            );
            self.segment.leak();
            return;
        }

        tracing::warn!("RecordView {} dropped without teardown", self.segment.name());
        if let Err(e) = self.segment.release() {
            tracing::error!("Failed to release {} on drop: {}", self.segment.name(), e);
        }
    }
}

/// Iterator returned by [`RecordView::iter`]
pub struct RecordIter<'a, C: RecordCodec> {
    view: &'a RecordView<C>,
    next: usize,
    end: usize,
}

impl<C: RecordCodec> Iterator for RecordIter<'_, C> {
    type Item = ShmResult<(usize, C::Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(self.view.get_at(index).map(|value| (index, value)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.next;
        (remaining, Some(remaining))
    }
}

impl<C: RecordCodec> ExactSizeIterator for RecordIter<'_, C> {}

impl<C: RecordCodec> FusedIterator for RecordIter<'_, C> {}

fn segment_byte_len<C: RecordCodec>(length: usize, codec: &C) -> ShmResult<usize> {
    let width = codec.byte_width();
    if length == 0 || width == 0 {
        return Err(ShmError::InvalidSize { size: 0 });
    }
    length
        .checked_mul(width)
        .ok_or(ShmError::InvalidSize { size: usize::MAX })
}

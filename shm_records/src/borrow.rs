//! Borrow tokens and the per-view ledger of outstanding byte views
//!
//! Every zero-copy view handed out by a [`RecordView`](crate::RecordView) is
//! recorded in that view's ledger until released. Guards borrow the view, so
//! the compiler already forbids tearing it down while one is alive. Read-only
//! [`Borrow`]s share the view; a writable [`BorrowMut`] borrows it
//! exclusively, so in-process readers never observe a slice that is being
//! written through another one. The ledger catches the remaining case, bytes
//! detached with `into_raw` whose token has not been handed back.

use crate::error::{ShmError, ShmResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::mem::ManuallyDrop;
use std::ops::{Bound, Deref, DerefMut, Range, RangeBounds};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_LEDGER_ID: AtomicU64 = AtomicU64::new(1);

/// Capability for one outstanding view into a record view's bytes.
///
/// Tokens are plain values. Releasing one twice, or releasing it on a view
/// that did not issue it, fails with `InvalidToken`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BorrowToken {
    ledger: u64,
    id: u64,
}

impl BorrowToken {
    /// Sequence number within the issuing view
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Outstanding borrows of one record view
#[derive(Debug)]
pub(crate) struct BorrowLedger {
    id: u64,
    next: u64,
    outstanding: HashMap<u64, Range<usize>>,
}

impl BorrowLedger {
    pub(crate) fn new() -> Self {
        Self {
            id: NEXT_LEDGER_ID.fetch_add(1, Ordering::Relaxed),
            next: 0,
            outstanding: HashMap::new(),
        }
    }

    /// Record a new borrow of `records`
    pub(crate) fn issue(&mut self, records: Range<usize>) -> BorrowToken {
        self.next += 1;
        self.outstanding.insert(self.next, records);
        BorrowToken {
            ledger: self.id,
            id: self.next,
        }
    }

    /// Remove `token`, returning the record range it covered
    pub(crate) fn release(&mut self, token: BorrowToken) -> ShmResult<Range<usize>> {
        if token.ledger != self.id {
            return Err(ShmError::InvalidToken { id: token.id });
        }
        self.outstanding
            .remove(&token.id)
            .ok_or(ShmError::InvalidToken { id: token.id })
    }

    pub(crate) fn len(&self) -> usize {
        self.outstanding.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.outstanding.is_empty()
    }

    /// Outstanding tokens with their record ranges, oldest first
    pub(crate) fn snapshot(&self) -> Vec<(BorrowToken, Range<usize>)> {
        let mut entries: Vec<_> = self
            .outstanding
            .iter()
            .map(|(&id, range)| {
                (
                    BorrowToken {
                        ledger: self.id,
                        id,
                    },
                    range.clone(),
                )
            })
            .collect();
        entries.sort_by_key(|(token, _)| token.id);
        entries
    }
}

/// Zero-copy read access to a run of records.
///
/// Dereferences to the raw bytes of the borrowed records. The bytes are
/// shared memory: other processes may write them concurrently, exactly as
/// raw memory writes would race. Dropping the guard releases its token.
#[derive(Debug)]
pub struct Borrow<'a> {
    ledger: &'a Mutex<BorrowLedger>,
    ptr: NonNull<u8>,
    len: usize,
    records: Range<usize>,
    token: BorrowToken,
}

impl<'a> Borrow<'a> {
    pub(crate) fn new(
        ledger: &'a Mutex<BorrowLedger>,
        ptr: NonNull<u8>,
        len: usize,
        records: Range<usize>,
        token: BorrowToken,
    ) -> Self {
        Self {
            ledger,
            ptr,
            len,
            records,
            token,
        }
    }

    /// Token registered for this borrow
    pub fn token(&self) -> BorrowToken {
        self.token
    }

    /// Record indices covered
    pub fn records(&self) -> Range<usize> {
        self.records.clone()
    }

    /// Release the token now, reporting a failure instead of logging it
    pub fn release(self) -> ShmResult<()> {
        let this = ManuallyDrop::new(self);
        this.ledger.lock().release(this.token).map(|_| ())
    }

    /// Detach the bytes from the guard's lifetime.
    ///
    /// The token stays outstanding until passed to
    /// [`RecordView::release_borrow`](crate::RecordView::release_borrow);
    /// until then the view refuses to tear down.
    pub fn into_raw(self) -> RawBorrow {
        let this = ManuallyDrop::new(self);
        RawBorrow {
            ptr: this.ptr,
            len: this.len,
            records: this.records.clone(),
            token: this.token,
        }
    }
}

impl Deref for Borrow<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: `ptr..ptr+len` lies inside a mapping that cannot be released
        // while `self` borrows the view.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for Borrow<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.ledger.lock().release(self.token) {
            tracing::debug!("Borrow guard token already released: {}", e);
        }
    }
}

/// Zero-copy write access to a run of records.
///
/// Handed out by [`RecordView::borrow_mut`](crate::RecordView::borrow_mut),
/// which borrows the view exclusively for the guard's lifetime. Dropping the
/// guard releases its token.
#[derive(Debug)]
pub struct BorrowMut<'a> {
    inner: Borrow<'a>,
}

impl<'a> BorrowMut<'a> {
    pub(crate) fn new(inner: Borrow<'a>) -> Self {
        Self { inner }
    }

    /// Token registered for this borrow
    pub fn token(&self) -> BorrowToken {
        self.inner.token
    }

    /// Record indices covered
    pub fn records(&self) -> Range<usize> {
        self.inner.records()
    }

    /// Release the token now, reporting a failure instead of logging it
    pub fn release(self) -> ShmResult<()> {
        self.inner.release()
    }

    /// Detach the bytes from the guard's lifetime, see [`Borrow::into_raw`]
    pub fn into_raw(self) -> RawBorrow {
        self.inner.into_raw()
    }
}

impl Deref for BorrowMut<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.inner
    }
}

impl DerefMut for BorrowMut<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: the range lies inside a live mapping and the guard holds the
        // only borrow of its view, so no other in-process slice from this view
        // aliases it. Peer processes write outside the Rust aliasing model.
        unsafe { std::slice::from_raw_parts_mut(self.inner.ptr.as_ptr(), self.inner.len) }
    }
}

/// Bytes of a borrow detached from any lifetime.
///
/// Valid only while its token is outstanding on the issuing view.
#[derive(Debug)]
pub struct RawBorrow {
    ptr: NonNull<u8>,
    len: usize,
    records: Range<usize>,
    token: BorrowToken,
}

impl RawBorrow {
    /// Token to pass to `release_borrow`
    pub fn token(&self) -> BorrowToken {
        self.token
    }

    /// Record indices covered
    pub fn records(&self) -> Range<usize> {
        self.records.clone()
    }

    /// First byte
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Byte length
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the borrow covers zero bytes
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// View the bytes as a slice.
    ///
    /// # Safety
    ///
    /// The token must not have been released and the issuing view must not
    /// have been torn down for as long as the returned slice is used. No
    /// write to the same bytes may happen in this process meanwhile, whether
    /// through the view or through another raw borrow.
    pub unsafe fn as_slice<'b>(&self) -> &'b [u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// View the bytes as a mutable slice.
    ///
    /// # Safety
    ///
    /// As for [`as_slice`](Self::as_slice), and no other slice over the same
    /// bytes may be used in this process while the returned one is alive.
    pub unsafe fn as_mut_slice<'b>(&mut self) -> &'b mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

/// Record selector accepted by [`RecordView::borrow`](crate::RecordView::borrow)
/// and [`RecordView::borrow_mut`](crate::RecordView::borrow_mut): a single
/// index or any range of indices
pub trait IntoRecordRange {
    /// Resolve against a view of `length` records
    fn into_record_range(self, length: usize) -> ShmResult<Range<usize>>;
}

impl IntoRecordRange for usize {
    fn into_record_range(self, length: usize) -> ShmResult<Range<usize>> {
        if self >= length {
            return Err(ShmError::IndexOutOfRange {
                index: self,
                length,
            });
        }
        Ok(self..self + 1)
    }
}

macro_rules! impl_into_record_range {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoRecordRange for $ty {
                fn into_record_range(self, length: usize) -> ShmResult<Range<usize>> {
                    resolve_bounds(self.start_bound(), self.end_bound(), length)
                }
            }
        )*
    };
}

impl_into_record_range!(
    Range<usize>,
    std::ops::RangeInclusive<usize>,
    std::ops::RangeFrom<usize>,
    std::ops::RangeTo<usize>,
    std::ops::RangeToInclusive<usize>,
    std::ops::RangeFull,
);

fn resolve_bounds(
    start: Bound<&usize>,
    end: Bound<&usize>,
    length: usize,
) -> ShmResult<Range<usize>> {
    let overflow = ShmError::IndexOutOfRange {
        index: usize::MAX,
        length,
    };
    let start = match start {
        Bound::Included(&s) => s,
        Bound::Excluded(&s) => s.checked_add(1).ok_or(overflow)?,
        Bound::Unbounded => 0,
    };
    let end = match end {
        Bound::Included(&e) => e.checked_add(1).ok_or(ShmError::IndexOutOfRange {
            index: usize::MAX,
            length,
        })?,
        Bound::Excluded(&e) => e,
        Bound::Unbounded => length,
    };

    if start > end {
        return Err(ShmError::IndexOutOfRange {
            index: start,
            length,
        });
    }
    if end > length {
        return Err(ShmError::IndexOutOfRange {
            index: end - 1,
            length,
        });
    }
    Ok(start..end)
}

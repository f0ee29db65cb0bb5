//! # Shared Memory Record Views
//!
//! Fixed-width records laid over named shared memory segments, readable and
//! writable from any number of cooperating processes. A process creates a
//! [`RecordView`], hands its [`SegmentHandle`] to a peer (as JSON on a
//! command line, over a pipe, anywhere), and the peer attaches to the same
//! bytes.
//!
//! ## Features
//!
//! - **Typed Records**: Struct-style layouts (`"<Hd4s"`) or single-primitive
//!   codecs, packed without alignment padding
//! - **Zero-Copy Borrows**: Byte views into one record or a range of records,
//!   each tracked by a token in the view's ledger
//! - **Safe Teardown**: A view refuses to release its segment while any
//!   borrow token is outstanding (`ResourceBusy`)
//! - **Owner/Attacher Split**: Only the creating side unlinks the name;
//!   attachers just unmap
//! - **Process Cleanup**: Every owned name is tracked so a shutdown path can
//!   sweep whatever was never torn down
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────┐                         ┌─────────────────┐
//! │ Process A       │   SegmentHandle (JSON)  │ Process B       │
//! │                 ├────────────────────────►│                 │
//! │ RecordView      │                         │ RecordView      │
//! │  owner          │                         │  attacher       │
//! │  BorrowLedger   │   ┌─────────────────┐   │  BorrowLedger   │
//! │                 ├──►│ /dev/shm/<name> │◄──┤                 │
//! └────────┬────────┘   │ [rec|rec|...]   │   └─────────────────┘
//!          │            └─────────────────┘
//!   SegmentRegistry
//!   (owned names)
//! ```
//!
//! ## Usage Patterns
//!
//! ### Create, Fill and Read Back
//!
//! ```rust
//! use shm_records::{FieldValue, Record, RecordLayout, RecordView, ShmConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let dir = tempfile::tempdir()?;
//! # let config = ShmConfig::with_dir(dir.path());
//! let layout = RecordLayout::parse("<Id")?;
//! let mut view = RecordView::create_in(&config, 8, layout)?;
//!
//! view.set_at(3, &Record::new(vec![FieldValue::U32(3), FieldValue::F64(0.5)]))?;
//! assert_eq!(view.get_at(3)?[1], FieldValue::F64(0.5));
//!
//! view.teardown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Handing a View to Another Process
//!
//! ```rust,no_run
//! use shm_records::{RecordView, Scalar};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut view = RecordView::create(10, Scalar::<i64>::new())?;
//! let handle = view.export_handle()?.to_json()?;
//!
//! std::process::Command::new("record_worker")
//!     .args(["--handle", &handle, "--start", "0", "--end", "10"])
//!     .status()?;
//!
//! for entry in view.iter()? {
//!     let (index, value) = entry?;
//!     println!("{index}: {value}");
//! }
//! view.teardown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Zero-Copy Borrows
//!
//! ```rust,no_run
//! use shm_records::{RecordView, Scalar, ShmError};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut view = RecordView::create(16, Scalar::<u8>::new())?;
//!
//! // Guards release their token when dropped. Writable guards borrow the
//! // view exclusively.
//! view.borrow_mut(0..4)?.fill(0xff);
//! assert!(view.borrow(0..4)?.iter().all(|&byte| byte == 0xff));
//!
//! // Detached bytes keep the token outstanding until handed back.
//! let raw = view.borrow(5)?.into_raw();
//! assert!(matches!(view.teardown(), Err(ShmError::ResourceBusy { .. })));
//! view.release_borrow(raw.token())?;
//! view.teardown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return `Result<T, ShmError>`:
//!
//! ```rust,no_run
//! use shm_records::{RecordLayout, RecordView, ShmError};
//!
//! match RecordView::attach("frames", 100, RecordLayout::parse("3B").unwrap()) {
//!     Ok(view) => { /* use view */ }
//!     Err(ShmError::NotFound { name }) => {
//!         eprintln!("Segment '{}' not found - check the creator is running", name);
//!     }
//!     Err(ShmError::SizeMismatch { expected, actual, .. }) => {
//!         eprintln!("Layout disagrees with creator: {} vs {} bytes", expected, actual);
//!     }
//!     Err(e) => eprintln!("Unexpected error: {}", e),
//! }
//! ```
//!
//! ## Thread Safety
//!
//! - **RecordView**: `Send + Sync`; reads and read-only borrows take `&self`,
//!   writes, writable borrows and teardown take `&mut self`. Threads that
//!   write concurrently attach views of their own
//! - **Borrow** / **BorrowMut**: tied to their view by lifetime, not `Send`
//! - **SegmentRegistry**: process-wide, behind a mutex
//!
//! Concurrent writes to the same record race like raw memory writes. No
//! cross-process locking is provided.
//!
//! ## Platform Support
//!
//! Linux and other Unix systems with a tmpfs-backed shared memory directory
//! (`/dev/shm` by default, overridable with `SHM_RECORDS_DIR`).

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod borrow;
pub mod codec;
pub mod error;
pub mod handle;
pub mod layout;
pub mod naming;
pub mod platform;
pub mod record;
pub mod registry;
pub mod segment;
pub mod view;

pub use borrow::{Borrow, BorrowMut, BorrowToken, IntoRecordRange, RawBorrow};
pub use codec::{RecordCodec, Scalar, ScalarField};
pub use error::{ShmError, ShmResult};
pub use handle::SegmentHandle;
pub use layout::{ByteOrder, FieldKind, MAX_LAYOUT_FIELDS, RecordLayout};
pub use naming::{generate_name, validate_name};
pub use record::{FieldValue, Record};
pub use registry::{OwnedSegment, cleanup_owned_segments, owned_segments};
pub use segment::Segment;
pub use view::{RecordIter, RecordView};

pub use common::config::{LogLevel, ShmConfig};
pub use common::logging::init_tracing;

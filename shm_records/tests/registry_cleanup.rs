//! Process-wide owned segment registry
//!
//! Kept in its own test binary: a cleanup sweep unlinks every name this
//! process owns.

use parking_lot::Mutex;
use shm_records::{RecordView, Scalar, ShmConfig, cleanup_owned_segments, owned_segments};

static SERIAL: Mutex<()> = Mutex::new(());

#[test]
fn test_cleanup_unlinks_abandoned_segments() {
    let _serial = SERIAL.lock();
    let dir = tempfile::tempdir().unwrap();
    let config = ShmConfig::with_dir(dir.path());

    let mut view = RecordView::create_in(&config, 4, Scalar::<u8>::new()).unwrap();
    let path = config.segment_path(view.name());
    assert!(owned_segments().iter().any(|segment| segment.path == path));

    // A sweep unlinks the name but leaves the mapping usable.
    assert!(cleanup_owned_segments() >= 1);
    assert!(!path.exists());
    view.set_at(0, &3).unwrap();
    assert_eq!(view.get_at(0).unwrap(), 3);

    drop(view);
    assert!(!owned_segments().iter().any(|segment| segment.path == path));
}

#[test]
fn test_teardown_unregisters() {
    let _serial = SERIAL.lock();
    let dir = tempfile::tempdir().unwrap();
    let config = ShmConfig::with_dir(dir.path());

    let mut owner = RecordView::create_in(&config, 2, Scalar::<u16>::new()).unwrap();
    let path = config.segment_path(owner.name());
    let entry = owned_segments()
        .into_iter()
        .find(|segment| segment.path == path)
        .expect("owned segment registered");
    assert_eq!(entry.byte_len, 4);
    assert_eq!(entry.owner_pid, std::process::id());

    // Attachers are never registered.
    let mut peer = RecordView::attach_in(&config, owner.name(), 2, Scalar::<u16>::new()).unwrap();
    assert_eq!(
        owned_segments()
            .iter()
            .filter(|segment| segment.path == path)
            .count(),
        1
    );
    peer.teardown().unwrap();

    owner.teardown().unwrap();
    assert!(!owned_segments().iter().any(|segment| segment.path == path));
}

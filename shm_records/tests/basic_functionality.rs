//! Basic functionality tests for shared memory record views

use shm_records::{
    FieldValue, Record, RecordLayout, RecordView, Scalar, SegmentHandle, ShmConfig, ShmError,
    ShmResult,
};
use tempfile::TempDir;

fn isolated() -> (TempDir, ShmConfig) {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ShmConfig::with_dir(dir.path());
    (dir, config)
}

#[test]
fn test_write_then_attach_and_read() -> ShmResult<()> {
    let (_dir, config) = isolated();
    let layout = RecordLayout::parse("<qd")?;

    let mut writer = RecordView::new_in(&config, "test_write_read", 4, layout.clone())?;
    writer.set_at(
        1,
        &Record::new(vec![FieldValue::I64(-5), FieldValue::F64(2.5)]),
    )?;

    let mut reader = RecordView::attach_in(&config, "test_write_read", 4, layout)?;
    assert!(!reader.is_owner());
    assert_eq!(
        reader.get_at(1)?,
        Record::new(vec![FieldValue::I64(-5), FieldValue::F64(2.5)])
    );

    // Writes through the attacher are visible to the creator.
    reader.set_at(3, &Record::new(vec![FieldValue::I64(9), FieldValue::F64(0.0)]))?;
    assert_eq!(writer.get_at(3)?[0], FieldValue::I64(9));

    reader.teardown()?;
    assert!(config.segment_path("test_write_read").exists());
    writer.teardown()?;
    assert!(!config.segment_path("test_write_read").exists());
    Ok(())
}

#[test]
fn test_detached_borrow_blocks_teardown_until_released() -> ShmResult<()> {
    let (_dir, config) = isolated();
    let mut view = RecordView::new_in(&config, "test_busy", 10, Scalar::<i64>::new())?;

    let raw = view.borrow(3)?.into_raw();
    match view.teardown() {
        Err(ShmError::ResourceBusy { outstanding, name }) => {
            assert_eq!(outstanding, 1);
            assert_eq!(name, "test_busy");
        }
        other => panic!("Expected ResourceBusy, got: {:?}", other),
    }

    // The view stays fully usable after a refused teardown.
    view.set_at(3, &7)?;
    assert_eq!(view.get_at(3)?, 7);

    view.release_borrow(raw.token())?;
    view.teardown()?;
    assert!(matches!(view.get_at(0), Err(ShmError::UseAfterRelease { .. })));
    Ok(())
}

#[test]
fn test_attach_with_wrong_length_is_size_mismatch() -> ShmResult<()> {
    let (_dir, config) = isolated();
    let mut owner = RecordView::new_in(&config, "test_mismatch", 10, Scalar::<i32>::new())?;

    match RecordView::attach_in(&config, "test_mismatch", 11, Scalar::<i32>::new()) {
        Err(ShmError::SizeMismatch {
            expected, actual, ..
        }) => {
            assert_eq!(expected, 44);
            assert_eq!(actual, 40);
        }
        other => panic!("Expected SizeMismatch, got: {:?}", other),
    }

    // Only total size is compared: a different layout of equal width attaches.
    let mut reinterpreted =
        RecordView::attach_in(&config, "test_mismatch", 10, RecordLayout::parse("4B")?)?;
    reinterpreted.teardown()?;

    owner.teardown()?;
    Ok(())
}

#[test]
fn test_attach_missing_segment() {
    let (_dir, config) = isolated();
    assert!(matches!(
        RecordView::attach_in(&config, "test_missing", 1, Scalar::<u8>::new()),
        Err(ShmError::NotFound { .. })
    ));
}

#[test]
fn test_duplicate_name_rejected() -> ShmResult<()> {
    let (_dir, config) = isolated();
    let mut first = RecordView::new_in(&config, "test_duplicate", 2, Scalar::<u8>::new())?;
    assert!(matches!(
        RecordView::new_in(&config, "test_duplicate", 2, Scalar::<u8>::new()),
        Err(ShmError::AlreadyExists { .. })
    ));
    first.teardown()?;
    Ok(())
}

#[test]
fn test_index_equal_to_length_is_out_of_range() -> ShmResult<()> {
    let (_dir, config) = isolated();
    let mut view = RecordView::new_in(&config, "test_bounds", 5, Scalar::<u64>::new())?;

    assert!(matches!(
        view.get_at(5),
        Err(ShmError::IndexOutOfRange { index: 5, length: 5 })
    ));
    assert!(matches!(
        view.borrow(4..6),
        Err(ShmError::IndexOutOfRange { .. })
    ));
    assert!(view.borrow(5..5)?.is_empty());
    assert_eq!(view.outstanding_borrows(), 0);

    view.teardown()?;
    Ok(())
}

#[test]
fn test_borrow_and_get_at_agree() -> ShmResult<()> {
    let (_dir, config) = isolated();
    let layout = RecordLayout::parse("<HI")?;
    let mut view = RecordView::new_in(&config, "test_borrow_consistency", 3, layout)?;

    // Borrowed writes are visible through get_at.
    {
        let mut bytes = view.borrow_mut(1)?;
        bytes[..2].copy_from_slice(&513u16.to_le_bytes());
        bytes[2..].copy_from_slice(&70_000u32.to_le_bytes());
    }
    assert_eq!(
        view.get_at(1)?,
        Record::new(vec![FieldValue::U16(513), FieldValue::U32(70_000)])
    );

    // set_at writes are visible through a borrow.
    view.set_at(2, &Record::new(vec![FieldValue::U16(1), FieldValue::U32(2)]))?;
    let all = view.borrow(..)?;
    assert_eq!(all.len(), 18);
    assert_eq!(&all[12..18], &[1, 0, 2, 0, 0, 0]);
    drop(all);

    view.teardown()?;
    Ok(())
}

#[test]
fn test_handle_attach_gets_independent_ledger() -> ShmResult<()> {
    let (_dir, config) = isolated();
    let mut owner = RecordView::create_in(&config, 4, RecordLayout::parse("d")?)?;
    let handle = SegmentHandle::from_json(&owner.export_handle()?.to_json()?)?;
    assert_eq!(handle.name, owner.name());
    assert_eq!(handle.length, 4);

    let mut peer = RecordView::attach_handle_in(&config, &handle)?;
    let raw = owner.borrow(0)?.into_raw();
    assert_eq!(owner.outstanding_borrows(), 1);
    assert_eq!(peer.outstanding_borrows(), 0);

    // A token from one view means nothing to another.
    assert!(matches!(
        peer.release_borrow(raw.token()),
        Err(ShmError::InvalidToken { .. })
    ));
    peer.teardown()?;

    owner.release_borrow(raw.token())?;
    owner.teardown()?;
    Ok(())
}

#[test]
fn test_attach_handle_with_mismatched_codec() -> ShmResult<()> {
    let (_dir, config) = isolated();
    let mut owner = RecordView::create_in(&config, 4, Scalar::<u32>::new())?;
    let handle = owner.export_handle()?;

    assert!(matches!(
        RecordView::attach_handle_with(&config, &handle, Scalar::<f32>::new()),
        Err(ShmError::ShapeMismatch { .. })
    ));
    let mut typed = RecordView::attach_handle_with(&config, &handle, Scalar::<u32>::new())?;
    typed.teardown()?;

    owner.teardown()?;
    Ok(())
}

#[test]
fn test_concurrent_views_in_threads() -> ShmResult<()> {
    let (_dir, config) = isolated();
    let mut owner = RecordView::new_in(&config, "test_threads", 40, Scalar::<u32>::new())?;
    let handle = owner.export_handle()?;

    let workers: Vec<_> = (0..4)
        .map(|chunk| {
            let config = config.clone();
            let handle = handle.clone();
            std::thread::spawn(move || -> ShmResult<()> {
                let mut peer =
                    RecordView::attach_handle_with(&config, &handle, Scalar::<u32>::new())?;
                for i in chunk * 10..(chunk + 1) * 10 {
                    peer.set_at(i, &(i as u32 + 100))?;
                }
                peer.teardown()
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker panicked")?;
    }

    for entry in owner.iter()? {
        let (index, value) = entry?;
        assert_eq!(value, index as u32 + 100);
    }
    owner.teardown()?;
    Ok(())
}

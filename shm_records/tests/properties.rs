//! Property tests for record packing and view access

use proptest::prelude::*;
use shm_records::{FieldValue, Record, RecordLayout, RecordView, Scalar, ShmConfig, ShmError};

fn record_strategy() -> impl Strategy<Value = Record> {
    (
        any::<bool>(),
        any::<i16>(),
        any::<u32>(),
        any::<i64>(),
        prop::num::f64::NORMAL | prop::num::f64::ZERO,
        prop::array::uniform3(any::<u8>()),
    )
        .prop_map(|(flag, small, medium, large, real, tag)| {
            Record::new(vec![
                FieldValue::Bool(flag),
                FieldValue::I16(small),
                FieldValue::U32(medium),
                FieldValue::I64(large),
                FieldValue::F64(real),
                FieldValue::Bytes(tag.to_vec()),
            ])
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn set_then_get_returns_the_record(
        order in prop::sample::select(vec!["", "<", ">"]),
        entries in prop::collection::vec((0usize..16, record_strategy()), 1..24),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let config = ShmConfig::with_dir(dir.path());
        let layout = RecordLayout::parse(&format!("{order}?xhIqd3s")).unwrap();
        let mut view = RecordView::create_in(&config, 16, layout).unwrap();

        let mut expected = vec![None; 16];
        for (index, record) in entries {
            view.set_at(index, &record).unwrap();
            expected[index] = Some(record);
        }
        for (index, record) in expected.into_iter().enumerate() {
            if let Some(record) = record {
                prop_assert_eq!(view.get_at(index).unwrap(), record);
            }
        }
        view.teardown().unwrap();
    }

    #[test]
    fn borrow_bytes_match_scalar_values(values in prop::collection::vec(any::<i32>(), 1..32)) {
        let dir = tempfile::tempdir().unwrap();
        let config = ShmConfig::with_dir(dir.path());
        let mut view = RecordView::create_in(&config, values.len(), Scalar::<i32>::new()).unwrap();

        for (index, value) in values.iter().enumerate() {
            view.set_at(index, value).unwrap();
        }
        {
            let bytes = view.borrow(..).unwrap();
            for (chunk, value) in bytes.chunks_exact(4).zip(&values) {
                prop_assert_eq!(chunk, &value.to_ne_bytes()[..]);
            }
        }
        prop_assert_eq!(view.outstanding_borrows(), 0);
        view.teardown().unwrap();
    }

    #[test]
    fn out_of_range_indices_rejected(length in 1usize..64, excess in 0usize..1000) {
        let dir = tempfile::tempdir().unwrap();
        let config = ShmConfig::with_dir(dir.path());
        let mut view = RecordView::create_in(&config, length, Scalar::<u8>::new()).unwrap();

        let index = length + excess;
        let is_out_of_range = matches!(
            view.get_at(index),
            Err(ShmError::IndexOutOfRange { .. })
        );
        prop_assert!(is_out_of_range);
        prop_assert!(view.borrow(index).is_err());
        view.teardown().unwrap();
    }

    #[test]
    fn layout_format_is_canonical(format in "[<>]?([1-4]?[bBhHiIqQfd?]|[1-8]s|[1-3]x){1,6}") {
        let layout = RecordLayout::parse(&format).unwrap();
        let reparsed = RecordLayout::parse(&layout.format()).unwrap();
        prop_assert_eq!(&reparsed, &layout);
        prop_assert_eq!(reparsed.format(), layout.format());
    }
}

//! Transferable descriptor of a record view

use crate::error::{ShmError, ShmResult};
use crate::layout::RecordLayout;
use serde::{Deserialize, Serialize};

/// Everything a peer process needs to attach to a record view: the segment
/// name, the record count and the record layout. The bytes themselves never
/// travel; the peer maps the same segment and gets its own borrow ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentHandle {
    /// Segment name
    pub name: String,
    /// Record count
    pub length: usize,
    /// Record layout
    pub layout: RecordLayout,
}

impl SegmentHandle {
    /// Build a handle
    pub fn new(name: impl Into<String>, length: usize, layout: RecordLayout) -> Self {
        Self {
            name: name.into(),
            length,
            layout,
        }
    }

    /// Segment byte length implied by the handle
    pub fn byte_len(&self) -> ShmResult<usize> {
        self.length
            .checked_mul(self.layout.byte_width())
            .ok_or(ShmError::InvalidSize { size: usize::MAX })
    }

    /// JSON form, suitable as a process argument
    pub fn to_json(&self) -> ShmResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the JSON form
    pub fn from_json(json: &str) -> ShmResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::FieldKind;

    #[test]
    fn test_json_transfer() {
        let handle = SegmentHandle::new("frame_buffer", 640 * 480, "BBB".parse().unwrap());
        let json = handle.to_json().unwrap();
        assert!(json.contains("\"frame_buffer\""));

        let received = SegmentHandle::from_json(&json).unwrap();
        assert_eq!(received, handle);
        assert_eq!(received.byte_len().unwrap(), 640 * 480 * 3);
    }

    #[test]
    fn test_byte_len_overflow() {
        let handle = SegmentHandle::new("huge", usize::MAX, RecordLayout::single(FieldKind::U64));
        assert!(matches!(
            handle.byte_len(),
            Err(ShmError::InvalidSize { .. })
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            SegmentHandle::from_json("{\"name\": 3}"),
            Err(ShmError::Json { .. })
        ));
    }

    #[test]
    fn test_handle_with_overflowing_layout_is_rejected() {
        let json = format!(
            r#"{{"name":"wrap","length":1,"layout":{{"fields":[{{"bytes":{}}},{{"bytes":1}}]}}}}"#,
            usize::MAX
        );
        assert!(matches!(
            SegmentHandle::from_json(&json),
            Err(ShmError::Json { .. })
        ));
    }
}

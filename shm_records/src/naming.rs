//! Segment name validation and generation

use crate::error::{ShmError, ShmResult};
use crate::platform::get_current_pid;
use common::consts::{GENERATED_NAME_LENGTH, MAX_NAME_LENGTH};
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const NAME_ALPHABET: &[u8; 64] =
    b"0123456789_ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

static NAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Check that `name` can be used as a single shm object name
pub fn validate_name(name: &str) -> ShmResult<()> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name.len() > MAX_NAME_LENGTH {
        "name exceeds NAME_MAX"
    } else if name.contains('/') {
        "name contains '/'"
    } else if name.contains('\0') {
        "name contains NUL"
    } else if name == "." || name == ".." {
        "name is a directory reference"
    } else {
        return Ok(());
    };

    Err(ShmError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

/// Generate a fresh segment name of `GENERATED_NAME_LENGTH` bytes.
///
/// The random part mixes the process id, a per-process counter and the
/// clock through a randomly keyed hasher, so concurrent processes and
/// threads do not collide in practice. Callers still retry on
/// `AlreadyExists`.
pub fn generate_name(prefix: &str) -> String {
    let random_len = GENERATED_NAME_LENGTH.saturating_sub(prefix.len()).max(1);
    let state = RandomState::new();
    let sequence = NAME_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();

    let mut name = String::with_capacity(prefix.len() + random_len);
    name.push_str(prefix);

    let mut round = 0u64;
    let mut bits = 0u64;
    let mut available = 0;
    for _ in 0..random_len {
        if available < 6 {
            let mut hasher = state.build_hasher();
            hasher.write_u32(get_current_pid());
            hasher.write_u64(sequence);
            hasher.write_u128(nanos);
            hasher.write_u64(round);
            bits = hasher.finish();
            available = 64;
            round += 1;
        }
        name.push(NAME_ALPHABET[(bits & 0x3f) as usize] as char);
        bits >>= 6;
        available -= 6;
    }

    name
}

//! Platform-specific shared memory primitives

#[cfg(unix)]
mod linux;

#[cfg(unix)]
pub use linux::*;

//! Crate-wide error type.
//!
//! Mirrors the error taxonomy of spec.md §7: "not found" and "duplicate"
//! are regular, expected outcomes of strict operations, `InvalidInput`
//! covers NaN scores and malformed range endpoints, and `AllocationFailure`
//! exists for API completeness even though Rust's global allocator aborts
//! the process on real OOM rather than returning control to us (there is no
//! portable way to intercept that from safe code). Programmer errors
//! (iterator misuse, scanning during an active safe iterator, negative
//! range length) are not part of this enum at all — they are
//! `debug_assert!`/`panic!`, matching the teacher crate's own
//! `debug_assert!(self.table_get(...).is_none())` style.

use thiserror::Error;

/// Result alias used throughout the crate's fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// A strict-insert operation was given a key that already exists.
    #[error("key already exists")]
    Duplicate,

    /// A strict-remove or strict-lookup operation found no matching entry.
    #[error("key not found")]
    NotFound,

    /// A caller-supplied argument violates a precondition that is not a
    /// programmer error: a NaN score, an inverted or malformed range, or
    /// an element whose encoded length would overflow the packed-list
    /// length fields.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// Reserved for an allocator that can report failure instead of
    /// aborting. Never returned by the `Vec`/`Box`-backed containers in
    /// this crate today.
    #[error("allocation failed")]
    AllocationFailure,
}

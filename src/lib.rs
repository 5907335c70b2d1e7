//! The core data-structure engine of an in-memory key-value store:
//! a chained, incrementally-rehashed hash table, a rank-aware skip
//! list, a compact packed-list byte encoding, and an ordered-set value
//! that transitions between the two small/large encodings.
//!
//! This crate is the engine room only. Command dispatch, client
//! sockets, persistence, replication, eviction, pub/sub, and scripting
//! are external collaborators that sit on top of the types exported
//! here; none of them are this crate's concern.

pub mod config;
pub mod dict;
pub mod error;
pub mod intset;
pub mod listpack;
pub mod skiplist;
pub mod zset;

pub use dict::Dict;
pub use error::{Error, Result};
pub use intset::IntSet;
pub use listpack::ListPack;
pub use skiplist::SkipList;
pub use zset::ZSet;

#[cfg(test)]
mod tests {}

//! Runtime-tunable thresholds consumed by the encoding selector and the
//! hash table (spec.md §6).
//!
//! The teacher crate encodes its own analogous thresholds
//! (`BUCKET_ENTRY_COUNT`, `MAX_SLOT_COUNT`, `MAX_RETRIES` in
//! `bytetable.rs`) as plain `const`s, because those are load-bearing for a
//! byte layout that has to stay stable. Ours are pure policy knobs that a
//! caller is expected to override per-workload (the spec explicitly calls
//! them out as "consumed from configuration"), so they live in small
//! `Copy` structs with a `Default` impl carrying the spec's recommended
//! numbers, rather than as crate constants.
//!
//! Loading these from a config file or environment is explicitly out of
//! scope (spec.md §1 Non-goals: "configuration loading").

/// Thresholds that decide when an ordered-set value promotes from the
/// packed-list representation to the skip-list + hash-table one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Promote once the element count exceeds this.
    pub max_entries_packed: usize,
    /// Promote once any element's byte length exceeds this.
    pub max_value_packed: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_entries_packed: 128,
            max_value_packed: 64,
        }
    }
}

/// Policy governing the hash table's background expansion (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashPolicy {
    /// `used / size` ratio that forces expansion even when
    /// `resize_enabled` is false. Recommended value is 5.
    pub hard_load_factor: usize,
    /// Master switch for background expansion below the hard load
    /// factor. Disabling this is how a caller cooperates with a
    /// copy-on-write forked child that snapshots memory.
    pub resize_enabled: bool,
    /// Smallest capacity a table is ever allocated at.
    pub min_capacity: usize,
}

impl Default for HashPolicy {
    fn default() -> Self {
        HashPolicy {
            hard_load_factor: 5,
            resize_enabled: true,
            min_capacity: 4,
        }
    }
}

/// Probabilistic-level parameters for the skip list (spec.md §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipListParams {
    /// Maximum number of levels a node may occupy.
    pub max_level: usize,
    /// Inverse of the level-up probability; a node advances to the next
    /// level with probability `1 / level_up_divisor`.
    pub level_up_divisor: u32,
}

impl Default for SkipListParams {
    fn default() -> Self {
        SkipListParams {
            max_level: 32,
            level_up_divisor: 4,
        }
    }
}

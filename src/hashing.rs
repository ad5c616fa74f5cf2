//! Deterministic hashing. The standard library `HashMap` seeds its hasher randomly per process,
//! which would make iteration order (and therefore anything derived from it) differ between two
//! runs with the same random seed. All hash-based containers in this crate use the `rustc-hash`
//! hasher instead. Use `HashMap::default()` to construct one.
//!
//! `hash_str` is used by the random module to derive a per-stream seed offset from the stream
//! name.

use xxhash_rust::xxh3::xxh3_64;

pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

/// A stable 64-bit hash of a `&str`, identical across platforms and runs.
#[must_use]
pub fn hash_str(data: &str) -> u64 {
    xxh3_64(data.as_bytes())
}

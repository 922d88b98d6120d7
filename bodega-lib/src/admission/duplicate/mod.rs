//! Exact and near-duplicate content detection.
//!
//! Three checks run in order and the first positive short-circuits: exact
//! duplicates (message id, then content hash within a short window),
//! per-customer repeats and edit-distance near-duplicates, and tenant-wide
//! coordinated duplicates across distinct customers.
//!
//! Clean messages are fingerprinted with a "processing" lock so a concurrent
//! identical message is held back until the first completes; the lock
//! self-heals after a hard timeout if `complete` is never called.

mod detector;
mod patterns;
mod similarity;

pub use detector::{DuplicateDetector, DuplicateStats, DuplicateVerdict, FingerprintId};
pub use patterns::{CoordinatedSpam, SpamSignal};
pub use similarity::{levenshtein, similarity};

//! Hash containers used throughout the crate.
//!
//! All keys are small integers or short strings, so the fx hasher is a
//! strictly better fit than siphash.

pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;
pub type HashSet<T> = rustc_hash::FxHashSet<T>;

pub use std::collections::BTreeMap;

//! Map and set aliases used by the dependency graph.
//!
//! `hashbrown` backs them by default; the `std-hash` feature swaps in the
//! standard library collections.

#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::{HashMap, HashSet};
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub use hashbrown::{HashMap, HashSet};
}

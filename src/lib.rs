//! A lock-free, resizable concurrent hash table with hazard-pointer memory reclamation.
//!
//! # Features
//!
//! - Lock-free reads and writes. No operation ever blocks on another thread.
//! - Resizing without a global lock. A full table links a larger generation, and
//!   values are copied forward by the operations that walk past them.
//! - Memory reclamation through hazard pointers owned by each map. Replaced entries
//!   and drained generations are freed as soon as no thread can be reading them.
//!
//! # Overview
//!
//! The top-level type is [`HashMap`]. Every operation takes `&self`:
//!
//! ```rust
//! use hazmap::HashMap;
//!
//! let map = HashMap::new();
//!
//! map.insert("dog", 1);
//! map.insert("cat", 2);
//! assert_eq!(map.get("dog"), Some(1));
//!
//! // Keep the existing value.
//! assert!(!map.put("cat", 3, false));
//! assert_eq!(map.get("cat"), Some(2));
//!
//! assert!(map.remove("dog"));
//! assert_eq!(map.len(), 1);
//! ```
//!
//! Values are returned by clone, so no reference into the map can outlive the
//! memory it points to. Wrap large values in an [`Arc`](std::sync::Arc) to make
//! reads cheap.
//!
//! # Usage
//!
//! Each operation announces the memory it reads through a small set of hazard
//! pointers acquired from the map. [`HashMap::pin`] acquires them once and returns
//! a [`HashMapRef`] that reuses them across many operations:
//!
//! ```rust
//! use hazmap::HashMap;
//! use std::thread;
//!
//! let map = HashMap::new();
//!
//! thread::scope(|s| {
//!     for t in 0..4 {
//!         let map = &map;
//!         s.spawn(move || {
//!             let map = map.pin();
//!             for i in 0..100 {
//!                 map.insert(t * 100 + i, i);
//!             }
//!         });
//!     }
//! });
//!
//! assert_eq!(map.len(), 400);
//! ```
//!
//! A pinned reference cannot be sent to another thread.
//!
//! # Resizing
//!
//! The map is a chain of generations, each a fixed-size open-addressed table. When
//! an insert runs off the end of the newest generation, a new generation about 1.5
//! times larger is linked after it. Values in retired generations are copied
//! forward by any operation that walks past them. The [`MigrationMode`] decides
//! whether writes also drain the oldest generation a few slots at a time:
//!
//! ```rust
//! use hazmap::{HashMap, MigrationMode};
//!
//! let map: HashMap<u64, u64> = HashMap::builder()
//!     .capacity(1)
//!     .migration(MigrationMode::Incremental(64))
//!     .build();
//!
//! for i in 0..1000 {
//!     map.insert(i, i);
//! }
//!
//! assert_eq!(map.len(), 1000);
//! ```
//!
//! # Consistency
//!
//! Operations on a single key are linearizable. [`HashMap::len`] and
//! [`HashMap::clear`] are not atomic with respect to concurrent writers: the count
//! is a snapshot, and entries inserted during a clear may survive it.

#![allow(unstable_name_collisions)]

mod map;
mod raw;

pub use equivalent::Equivalent;
pub use map::{HashMap, HashMapBuilder, HashMapRef, MigrationMode, OccupiedError};

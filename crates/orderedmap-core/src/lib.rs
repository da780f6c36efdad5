//! OrderedMap Core: thread-safe map with an explicit key order
//!
//! A key-value map that remembers the order its keys were added in, or the
//! order a caller assigned, and lets many threads read and write it at once.
//!
//! # Architecture
//!
//! - **Store**: hash table + key order under one RwLock, always consistent
//! - **Positional access**: `get_index`, `index_of`, `insert`, `set_order`
//! - **Traversal**: background producer hands entries over a rendezvous
//!   channel, cancellable at any point
//!
//! ```
//! use orderedmap_core::OrderedMap;
//!
//! let map = OrderedMap::new();
//! map.add("one", 1);
//! map.add("two", 2);
//!
//! assert_eq!(map.get("one"), Some(1));
//! assert_eq!(map.get_index(1), Some(("two", 2)));
//!
//! for (key, value) in map.traverse().unwrap() {
//!     println!("{} > {}", key, value);
//! }
//! ```

pub mod config;
pub mod error;
pub mod map;
pub mod traversal;

// Re-export key types for convenience
pub use config::Config;
pub use error::{OmResult, OrderedMapError};
pub use map::OrderedMap;
pub use traversal::Traversal;

//! Configuration for ordered maps
//!
//! Provides size presets and builder-style setters for the few knobs the
//! map exposes.

/// Largest capacity a map may pre-allocate
pub const MAX_INITIAL_CAPACITY: usize = 1 << 24;

/// Ordered map configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Entries to pre-allocate in both the mapping and the order
    pub initial_capacity: usize,
    /// Name given to every traversal producer thread
    pub traversal_thread_name: String,
}

impl Config {
    /// A few dozen entries, no up-front allocation worth mentioning
    pub fn small() -> Self {
        Self {
            initial_capacity: 16,
            traversal_thread_name: "orderedmap-traverse".to_string(),
        }
    }

    /// Tens of thousands of entries, allocated once
    pub fn large() -> Self {
        Self {
            initial_capacity: 64 * 1024,
            traversal_thread_name: "orderedmap-traverse".to_string(),
        }
    }

    pub fn with_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.traversal_thread_name = name.into();
        self
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.initial_capacity > MAX_INITIAL_CAPACITY {
            return Err(format!(
                "initial_capacity must be <= {}",
                MAX_INITIAL_CAPACITY
            ));
        }
        if self.traversal_thread_name.is_empty() {
            return Err("traversal_thread_name must not be empty".into());
        }
        // std::thread::Builder panics on interior NUL bytes
        if self.traversal_thread_name.contains('\0') {
            return Err("traversal_thread_name must not contain NUL bytes".into());
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self { Self::small() }
}

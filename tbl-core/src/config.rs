//! Table construction settings.

/// Default nesting depth accepted by flattening.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 64;

/// Configuration for table creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    /// Initial array capacity in elements.
    pub array_capacity: u64,
    /// Initial map capacity in slots.
    pub map_capacity: u64,
    /// Deepest nesting level flattening will follow before giving up.
    pub max_nesting_depth: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            array_capacity: 0,
            map_capacity: 0,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

impl TableConfig {
    /// Create config with an initial array capacity.
    pub fn with_array_capacity(mut self, capacity: u64) -> Self {
        self.array_capacity = capacity;
        self
    }

    /// Create config with an initial map capacity.
    pub fn with_map_capacity(mut self, capacity: u64) -> Self {
        self.map_capacity = capacity;
        self
    }

    /// Create config with a custom nesting limit.
    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }
}

//! System-wide limits.

/// Number of distinct resource classes.
pub const RESOURCE_CLASSES: usize = 10;

/// Total instances of each resource class.
///
/// Also the ceiling a single worker may hold of any one class.
pub const INSTANCES_PER_CLASS: u32 = 5;

/// Number of rows in the process table (and in the allocation matrix).
pub const PROCESS_TABLE_CAPACITY: usize = 18;

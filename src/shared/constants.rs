/// Default page size for pagination
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Maximum page size allowed
pub const MAX_PAGE_SIZE: i64 = 100;

/// Highest page number accepted by list endpoints
pub const MAX_PAGE: i64 = 1_000_000;

// =============================================================================
// MEDIA LIMITS
// =============================================================================

/// Maximum number of files accepted by one batch upload request
pub const MAX_BATCH_SIZE: usize = 30;

/// Maximum length of a single tag name, in characters
pub const MAX_TAG_LENGTH: usize = 50;

/// Maximum number of tags on one file
pub const MAX_TAGS_PER_FILE: usize = 20;

/// Extension used when the declared file name carries none we recognize
pub const FALLBACK_EXTENSION: &str = "bin";

// rundex - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Library metadata
// =============================================================================

/// Library display name.
pub const LIB_NAME: &str = "rundex";

/// Current library version.
pub const LIB_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Catalog limits
// =============================================================================

/// Maximum directory recursion depth for file listing and tree walks.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Hard upper bound on recursion depth (prevents infinite traversal).
pub const ABSOLUTE_MAX_DEPTH: usize = 50;

/// Maximum number of files a single finder will enumerate in one listing.
/// Working directories are bounded in practice; hitting this means the
/// finder was pointed at the wrong root.
pub const MAX_LISTED_FILES: usize = 100_000;

/// Extension wildcard: matches any non-directory entry.
pub const EXT_ANY: &str = "*";

/// Extension sentinel for extensionless files (raster products).
pub const EXT_NONE: &str = "";

/// Sidecar header extension required next to every raster product.
pub const RASTER_SIDECAR_EXT: &str = "hdr";

// =============================================================================
// Descriptor registry limits
// =============================================================================

/// Maximum number of product-type descriptors the registry will accept.
pub const MAX_PRODUCT_TYPES: usize = 100;

/// Maximum regex pattern length to prevent ReDoS.
pub const MAX_REGEX_PATTERN_LENGTH: usize = 4_096;

// =============================================================================
// Log parsing limits
// =============================================================================

/// Default read chunk size in bytes for a single tail poll.
/// Prevents a large burst of new content from stalling one poll call.
pub const MAX_TAIL_READ_BYTES_PER_POLL: usize = 512 * 1_024; // 512 KiB

/// Maximum accumulated size of the partial (in-progress) log-line buffer.
///
/// Guards against OOM when a tailed file produces no newlines (binary
/// content, an extremely long single line, or a file opened by mistake).
/// Set to 4x `MAX_TAIL_READ_BYTES_PER_POLL` so legitimate lines up to
/// ~2 MiB are tolerated before the fragment is discarded with a warning.
pub const MAX_TAIL_PARTIAL_BYTES: usize = MAX_TAIL_READ_BYTES_PER_POLL * 4; // 2 MiB

/// Maximum size of a single log record message in bytes. Records exceeding
/// this are truncated to prevent unbounded memory from malformed files.
pub const MAX_RECORD_MESSAGE_BYTES: usize = 64 * 1024; // 64 KB

/// Marker appended to a record message cut at `MAX_RECORD_MESSAGE_BYTES`.
pub const TRUNCATION_MARKER: &str = "... [truncated]";

// =============================================================================
// Level display
// =============================================================================

/// Canonical severity ordering for build output. Levels not listed here
/// sort alphabetically after the known set.
pub const LEVEL_ORDER: &[&str] = &["DEBUG", "INFO", "WARNING", "ERROR", "EXCEPTION"];

/// Extra columns added to the level padding width in `build()` output.
pub const DEFAULT_LEVEL_PAD_EXTRA: usize = 1;

// =============================================================================
// Logging
// =============================================================================

/// Default log level for the tracing subscriber.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Maximum length of a log line included in debug output.
/// Prevents accidental exposure of sensitive data in long lines.
pub const DEBUG_MAX_LINE_PREVIEW: usize = 200;

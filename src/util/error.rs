// rundex - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// No string-based error propagation. All errors preserve the causal
// chain for diagnostic logging.
//
// Ambiguity is deliberately absent from this hierarchy: a single-result
// query matching several files is logged as a warning and resolved to the
// first match in sorted path order, never returned as a failure.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all rundex operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum RundexError {
    /// Product-type descriptor loading or validation failed.
    Descriptor(DescriptorError),

    /// Catalog construction or selector resolution failed.
    Catalog(CatalogError),

    /// A product decoder failed. Callers inside the catalog swallow this
    /// at the finder boundary; it only escapes through the umbrella when
    /// a decoder is invoked directly.
    Decode(DecodeError),

    /// Log line parsing failed.
    Parse(ParseError),

    /// Log tailing failed.
    Tail(TailError),
}

impl fmt::Display for RundexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Descriptor(e) => write!(f, "Descriptor error: {e}"),
            Self::Catalog(e) => write!(f, "Catalog error: {e}"),
            Self::Decode(e) => write!(f, "Decode error: {e}"),
            Self::Parse(e) => write!(f, "Parse error: {e}"),
            Self::Tail(e) => write!(f, "Tail error: {e}"),
        }
    }
}

impl std::error::Error for RundexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Descriptor(e) => Some(e),
            Self::Catalog(e) => Some(e),
            Self::Decode(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::Tail(e) => Some(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Descriptor errors
// ---------------------------------------------------------------------------

/// Errors related to product-type descriptor loading and validation.
#[derive(Debug)]
pub enum DescriptorError {
    /// The embedded TOML definition could not be parsed.
    TomlParse { source: toml::de::Error },

    /// A required field is missing from a type definition.
    MissingField {
        type_id: String,
        field: &'static str,
    },

    /// A pattern rule in a type definition is invalid. Carries the
    /// offending pattern text so the bad rule can be named directly.
    InvalidRegex {
        type_id: String,
        pattern: String,
        source: regex::Error,
    },

    /// A pattern rule exceeds the maximum allowed length.
    RegexTooLong {
        type_id: String,
        length: usize,
        max_length: usize,
    },

    /// A type definition declares no extensions. The extension set drives
    /// listing and must never be empty.
    EmptyExtensions { type_id: String },

    /// A type definition names a decoder this build does not provide.
    UnknownDecoder { type_id: String, decoder: String },

    /// Duplicate type ID in the registry definition.
    DuplicateId { id: String },

    /// Maximum number of product types exceeded.
    TooManyTypes { count: usize, max: usize },
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { source } => {
                write!(f, "Failed to parse type registry TOML: {source}")
            }
            Self::MissingField { type_id, field } => {
                write!(f, "Type '{type_id}': missing required field '{field}'")
            }
            Self::InvalidRegex {
                type_id,
                pattern,
                source,
            } => write!(
                f,
                "Type '{type_id}': invalid pattern '{pattern}': {source}"
            ),
            Self::RegexTooLong {
                type_id,
                length,
                max_length,
            } => write!(
                f,
                "Type '{type_id}': pattern is {length} chars, \
                 exceeds maximum of {max_length}"
            ),
            Self::EmptyExtensions { type_id } => {
                write!(f, "Type '{type_id}': extension set must not be empty")
            }
            Self::UnknownDecoder { type_id, decoder } => {
                write!(f, "Type '{type_id}': unknown decoder '{decoder}'")
            }
            Self::DuplicateId { id } => {
                write!(f, "Duplicate type ID '{id}' in registry definition")
            }
            Self::TooManyTypes { count, max } => {
                write!(f, "Too many product types ({count}), maximum is {max}")
            }
        }
    }
}

impl std::error::Error for DescriptorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source } => Some(source),
            Self::InvalidRegex { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<DescriptorError> for RundexError {
    fn from(e: DescriptorError) -> Self {
        Self::Descriptor(e)
    }
}

// ---------------------------------------------------------------------------
// Catalog errors
// ---------------------------------------------------------------------------

/// Errors related to catalog construction and selector resolution.
#[derive(Debug)]
pub enum CatalogError {
    /// The catalog root does not exist or is not accessible.
    RootNotFound { path: PathBuf },

    /// The catalog root is not a directory.
    NotADirectory { path: PathBuf },

    /// A selector resolved to zero files where exactly one was required,
    /// or a literal/relative path does not exist, or a load was attempted
    /// where loading is unsupported (catalog root, unknown directory).
    NotFound { selector: String, context: String },

    /// A raster product is missing its required sidecar header file.
    MissingSidecar { path: PathBuf, sidecar: PathBuf },

    /// A caller-supplied selector regex is invalid.
    InvalidSelectorRegex {
        pattern: String,
        source: regex::Error,
    },

    /// Maximum file count exceeded during a listing walk.
    MaxFilesExceeded { max: usize },

    /// I/O error touching a catalog path.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootNotFound { path } => {
                write!(f, "Catalog root '{}' does not exist", path.display())
            }
            Self::NotADirectory { path } => {
                write!(f, "Catalog root '{}' is not a directory", path.display())
            }
            Self::NotFound { selector, context } => {
                write!(f, "No file found for selector '{selector}': {context}")
            }
            Self::MissingSidecar { path, sidecar } => write!(
                f,
                "Raster '{}' is missing its required header '{}'",
                path.display(),
                sidecar.display()
            ),
            Self::InvalidSelectorRegex { pattern, source } => {
                write!(f, "Invalid selector regex '{pattern}': {source}")
            }
            Self::MaxFilesExceeded { max } => {
                write!(
                    f,
                    "Listing stopped: exceeded maximum of {max} files. \
                     Narrow the bound directory."
                )
            }
            Self::Io { path, source } => {
                write!(f, "I/O error on '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::InvalidSelectorRegex { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<CatalogError> for RundexError {
    fn from(e: CatalogError) -> Self {
        Self::Catalog(e)
    }
}

// ---------------------------------------------------------------------------
// Decode errors
// ---------------------------------------------------------------------------

/// Errors raised by product decoders. Swallowed at the finder boundary:
/// the finder logs the failure and reports the product as absent so the
/// rest of the tree stays usable.
#[derive(Debug)]
pub enum DecodeError {
    /// JSON deserialisation failed.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// File content is not valid UTF-8 where text was required.
    InvalidEncoding {
        path: PathBuf,
        source: std::str::Utf8Error,
    },

    /// A sidecar header line is not a `key = value` pair.
    HeaderParse {
        path: PathBuf,
        line_number: usize,
        line: String,
    },

    /// I/O error reading the product file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json { path, source } => {
                write!(f, "Invalid JSON in '{}': {source}", path.display())
            }
            Self::InvalidEncoding { path, source } => {
                write!(f, "'{}': invalid UTF-8: {source}", path.display())
            }
            Self::HeaderParse {
                path,
                line_number,
                line,
            } => write!(
                f,
                "'{}' line {line_number}: malformed header entry '{line}'",
                path.display()
            ),
            Self::Io { path, source } => {
                write!(f, "'{}': I/O error: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json { source, .. } => Some(source),
            Self::InvalidEncoding { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<DecodeError> for RundexError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

/// Errors related to log line parsing.
#[derive(Debug)]
pub enum ParseError {
    /// A continuation line arrived before any parsed record. The record
    /// list has nothing to append to, so the stream head is malformed.
    MalformedLog {
        line_number: u64,
        line_preview: String,
    },

    /// A marker registration carried a regex that does not compile.
    InvalidMarker {
        label: String,
        pattern: String,
        source: regex::Error,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedLog {
                line_number,
                line_preview,
            } => write!(
                f,
                "Line {line_number}: continuation '{line_preview}' \
                 precedes any parsed record"
            ),
            Self::InvalidMarker {
                label,
                pattern,
                source,
            } => write!(f, "Marker '{label}': invalid regex '{pattern}': {source}"),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidMarker { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ParseError> for RundexError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

// ---------------------------------------------------------------------------
// Tail errors
// ---------------------------------------------------------------------------

/// Errors related to log tailing.
#[derive(Debug)]
pub enum TailError {
    /// The log file could not be opened.
    Open { path: PathBuf, source: io::Error },

    /// The log file's metadata could not be read.
    Metadata { path: PathBuf, source: io::Error },

    /// Reading from the stored offset failed.
    Read {
        path: PathBuf,
        offset: u64,
        source: io::Error,
    },

    /// A record produced during a poll was malformed.
    Parse(ParseError),
}

impl fmt::Display for TailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, source } => {
                write!(f, "Cannot open log '{}': {source}", path.display())
            }
            Self::Metadata { path, source } => {
                write!(f, "Cannot stat log '{}': {source}", path.display())
            }
            Self::Read {
                path,
                offset,
                source,
            } => write!(
                f,
                "Cannot read log '{}' at offset {offset}: {source}",
                path.display()
            ),
            Self::Parse(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for TailError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open { source, .. } => Some(source),
            Self::Metadata { source, .. } => Some(source),
            Self::Read { source, .. } => Some(source),
            Self::Parse(e) => Some(e),
        }
    }
}

impl From<ParseError> for TailError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<TailError> for RundexError {
    fn from(e: TailError) -> Self {
        Self::Tail(e)
    }
}

/// Convenience type alias for rundex results.
pub type Result<T> = std::result::Result<T, RundexError>;

// rundex - core/descriptor.rs
//
// Product-type registry: the data-driven table of {extensions, patterns,
// decoder} that configures every FileFinder. Definitions are embedded
// TOML, deserialized into raw structures, then validated and compiled
// into runtime descriptors with ready-to-use regexes.
//
// Decoders are a closed set selected by name; a definition naming a
// decoder this build does not provide is rejected at registry load.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::model::{ProductValue, RasterHandle};
use crate::core::pattern::{PatternMatcher, PatternRule};
use crate::util::constants::{self, EXT_ANY, EXT_NONE, RASTER_SIDECAR_EXT};
use crate::util::error::{DecodeError, DescriptorError};

// =============================================================================
// TOML deserialization structures (raw input)
// =============================================================================

/// Raw registry definition as deserialized from TOML.
/// Validated and compiled into a `TypeRegistry` for runtime use.
#[derive(Debug, Deserialize)]
pub struct RegistryDefinition {
    pub types: Vec<TypeDefinition>,
}

#[derive(Debug, Deserialize)]
pub struct TypeDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub extensions: Vec<String>,
    pub decoder: String,
    #[serde(default)]
    pub patterns: Vec<PatternDef>,
}

#[derive(Debug, Deserialize)]
pub struct PatternDef {
    pub pattern: String,
    pub description: String,
}

// =============================================================================
// Runtime descriptors
// =============================================================================

/// Which decoder `load` runs for a product type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoder {
    /// Parse the file as a JSON document.
    Json,

    /// Read the file as UTF-8 text.
    Text,

    /// Read the raw bytes without interpretation.
    Bytes,

    /// Parse the sidecar header and hand back a raster handle.
    Raster,
}

impl Decoder {
    fn from_name(type_id: &str, name: &str) -> Result<Self, DescriptorError> {
        match name {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            "bytes" => Ok(Self::Bytes),
            "raster" => Ok(Self::Raster),
            other => Err(DescriptorError::UnknownDecoder {
                type_id: type_id.to_string(),
                decoder: other.to_string(),
            }),
        }
    }
}

/// Runtime representation of one product type after validation and
/// regex compilation. Built from `TypeDefinition`.
#[derive(Debug, Clone)]
pub struct ProductType {
    /// Unique type identifier (e.g. "config").
    pub id: String,

    /// Human-readable name.
    pub name: String,

    /// Description shown in tree listings.
    pub description: String,

    /// Extension set driving `list_files`. `"*"` matches any
    /// non-directory; `""` matches only extensionless files; any other
    /// entry matches as a dot-separated suffix.
    pub extensions: Vec<String>,

    /// Ordered classification rules for `info`.
    pub matcher: PatternMatcher,

    /// Decoder run by `load`.
    pub decoder: Decoder,
}

impl ProductType {
    /// Whether a file name belongs to this type's extension set.
    pub fn matches_extension(&self, file_name: &str) -> bool {
        self.extensions.iter().any(|ext| match ext.as_str() {
            EXT_ANY => true,
            EXT_NONE => !file_name.contains('.'),
            suffix => file_name.ends_with(&format!(".{suffix}")),
        })
    }

    /// Whether this type requires a sidecar header next to each file.
    pub fn requires_sidecar(&self) -> bool {
        self.decoder == Decoder::Raster
    }

    /// Expected sidecar path for a product file of this type.
    pub fn sidecar_path(&self, path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".");
        name.push(RASTER_SIDECAR_EXT);
        PathBuf::from(name)
    }

    /// Runs this type's decoder against a resolved file.
    pub fn decode(&self, path: &Path) -> Result<ProductValue, DecodeError> {
        match self.decoder {
            Decoder::Json => {
                let bytes = read_bytes(path)?;
                let value =
                    serde_json::from_slice(&bytes).map_err(|source| DecodeError::Json {
                        path: path.to_path_buf(),
                        source,
                    })?;
                Ok(ProductValue::Json(value))
            }
            Decoder::Text => Ok(ProductValue::Text(read_text(path)?)),
            Decoder::Bytes => Ok(ProductValue::Bytes(read_bytes(path)?)),
            Decoder::Raster => {
                let header_path = self.sidecar_path(path);
                let header = parse_sidecar_header(&header_path)?;
                let data_len = fs::metadata(path)
                    .map_err(|source| DecodeError::Io {
                        path: path.to_path_buf(),
                        source,
                    })?
                    .len();
                Ok(ProductValue::Raster(RasterHandle {
                    data_path: path.to_path_buf(),
                    header_path,
                    header,
                    data_len,
                }))
            }
        }
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, DecodeError> {
    fs::read(path).map_err(|source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_text(path: &Path) -> Result<String, DecodeError> {
    let bytes = read_bytes(path)?;
    match std::str::from_utf8(&bytes) {
        Ok(text) => Ok(text.to_string()),
        Err(source) => Err(DecodeError::InvalidEncoding {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Parses a sidecar header file into field/value pairs.
///
/// The format is `key = value` per line, with an optional leading magic
/// line and brace-delimited values that may span lines. Field names are
/// lower-cased for lookup.
fn parse_sidecar_header(path: &Path) -> Result<BTreeMap<String, String>, DecodeError> {
    let text = read_text(path)?;
    let mut header = BTreeMap::new();

    let mut pending_key: Option<String> = None;
    let mut pending_value = String::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(key) = pending_key.as_ref() {
            // Inside a brace-delimited value; accumulate until '}'.
            pending_value.push(' ');
            pending_value.push_str(line.trim_end_matches('}').trim());
            if line.ends_with('}') {
                header.insert(key.clone(), pending_value.trim().to_string());
                pending_key = None;
                pending_value.clear();
            }
            continue;
        }

        // Magic line marking the format family.
        if idx == 0 && line.eq_ignore_ascii_case("envi") {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(DecodeError::HeaderParse {
                path: path.to_path_buf(),
                line_number: idx + 1,
                line: line.to_string(),
            });
        };

        let key = key.trim().to_lowercase();
        let value = value.trim();

        if value.starts_with('{') && !value.ends_with('}') {
            pending_key = Some(key);
            pending_value = value.trim_start_matches('{').trim().to_string();
        } else {
            let value = value
                .trim_start_matches('{')
                .trim_end_matches('}')
                .trim()
                .to_string();
            header.insert(key, value);
        }
    }

    if let Some(key) = pending_key {
        return Err(DecodeError::HeaderParse {
            path: path.to_path_buf(),
            line_number: text.lines().count(),
            line: format!("unterminated value for '{key}'"),
        });
    }

    Ok(header)
}

// =============================================================================
// Registry validation and compilation
// =============================================================================

/// The immutable set of product types, shared by reference between the
/// catalog and its finders.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: Vec<Arc<ProductType>>,
}

impl TypeRegistry {
    /// Parse a TOML string into a raw `RegistryDefinition`.
    pub fn parse_toml(content: &str) -> Result<RegistryDefinition, DescriptorError> {
        toml::from_str(content).map_err(|source| DescriptorError::TomlParse { source })
    }

    /// Validate a `RegistryDefinition` and compile it into a runtime
    /// registry.
    ///
    /// Validates:
    /// - IDs are present and unique
    /// - Extension sets are non-empty
    /// - Pattern regexes compile and are within size limits
    /// - Decoder names are known
    pub fn validate_and_compile(def: RegistryDefinition) -> Result<Self, DescriptorError> {
        if def.types.len() > constants::MAX_PRODUCT_TYPES {
            return Err(DescriptorError::TooManyTypes {
                count: def.types.len(),
                max: constants::MAX_PRODUCT_TYPES,
            });
        }

        let mut types: Vec<Arc<ProductType>> = Vec::with_capacity(def.types.len());
        for raw in def.types {
            if raw.id.is_empty() {
                return Err(DescriptorError::MissingField {
                    type_id: "(empty)".to_string(),
                    field: "id",
                });
            }
            if raw.name.is_empty() {
                return Err(DescriptorError::MissingField {
                    type_id: raw.id.clone(),
                    field: "name",
                });
            }
            if types.iter().any(|t| t.id == raw.id) {
                return Err(DescriptorError::DuplicateId { id: raw.id.clone() });
            }
            if raw.extensions.is_empty() {
                return Err(DescriptorError::EmptyExtensions {
                    type_id: raw.id.clone(),
                });
            }

            let decoder = Decoder::from_name(&raw.id, &raw.decoder)?;
            let rules: Vec<PatternRule> = raw
                .patterns
                .iter()
                .map(|p| PatternRule::new(p.pattern.clone(), p.description.clone()))
                .collect();
            let matcher = PatternMatcher::compile(&raw.id, &rules)?;

            types.push(Arc::new(ProductType {
                id: raw.id,
                name: raw.name,
                description: raw.description,
                extensions: raw.extensions,
                matcher,
                decoder,
            }));
        }

        Ok(Self { types })
    }

    /// Load and compile the built-in registry embedded in the binary.
    ///
    /// The embedded definition is part of the build; a failure here is a
    /// packaging bug, surfaced as an error rather than a panic so library
    /// callers keep control.
    pub fn builtin() -> Result<Self, DescriptorError> {
        let content = include_str!("../../types/product_types.toml");
        let def = Self::parse_toml(content)?;
        Self::validate_and_compile(def)
    }

    /// Look up a type by ID.
    pub fn get(&self, id: &str) -> Option<Arc<ProductType>> {
        self.types.iter().find(|t| t.id == id).cloned()
    }

    /// All types, in definition order.
    pub fn types(&self) -> &[Arc<ProductType>] {
        &self.types
    }
}

// =============================================================================
// Tests
// =============================================================================

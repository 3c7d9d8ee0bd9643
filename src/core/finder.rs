// rundex - core/finder.rs
//
// Per-product-type directory binding: listing, search, and cached loading.
//
// A FileFinder owns one directory and one product type. Listing walks the
// directory with walkdir (never following symlinks) and keeps only files
// in the type's extension set, in sorted relative-path order. Searches
// run over that listing; loads resolve a selector to exactly one file,
// decode it with the type's decoder, and memoize the result by resolved
// absolute path.
//
// Ambiguity is never fatal here: a single-result query matching several
// files logs a warning and takes the first match in sorted path order.

use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::OnceLock;

use crate::core::descriptor::ProductType;
use crate::core::model::{FileRecord, LutPoint, ProductValue, Selector};
use crate::util::constants::{self, ABSOLUTE_MAX_DEPTH};
use crate::util::error::CatalogError;

// =============================================================================
// Configuration
// =============================================================================

/// Traversal limits for a finder.
///
/// All limits reference named constants from `util::constants` so they are
/// auditable in a single place.
#[derive(Debug, Clone)]
pub struct FinderConfig {
    /// Maximum directory recursion depth for recursive listings.
    pub max_depth: usize,

    /// Maximum number of files a single listing may return.
    pub max_files: usize,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            max_depth: constants::DEFAULT_MAX_DEPTH,
            max_files: constants::MAX_LISTED_FILES,
        }
    }
}

// =============================================================================
// FileFinder
// =============================================================================

/// Discovery, search, and cached loading for one directory bound to one
/// product type.
#[derive(Debug)]
pub struct FileFinder {
    root: PathBuf,
    product_type: Arc<ProductType>,
    config: FinderConfig,

    /// Decoded products keyed by resolved absolute path. Never evicted;
    /// dropping the finder (catalog reset) is the only invalidation.
    cache: HashMap<PathBuf, Arc<ProductValue>>,
}

impl FileFinder {
    /// Binds `root` to `product_type`. The root must exist and be a
    /// directory.
    pub fn new(
        root: impl Into<PathBuf>,
        product_type: Arc<ProductType>,
        config: FinderConfig,
    ) -> Result<Self, CatalogError> {
        let root = root.into();
        let meta = std::fs::metadata(&root).map_err(|_| CatalogError::RootNotFound {
            path: root.clone(),
        })?;
        if !meta.is_dir() {
            return Err(CatalogError::NotADirectory { path: root });
        }
        Ok(Self {
            root,
            product_type,
            config,
            cache: HashMap::new(),
        })
    }

    /// The bound directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The bound product type.
    pub fn product_type(&self) -> &Arc<ProductType> {
        &self.product_type
    }

    /// Number of decoded products currently cached.
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    // -------------------------------------------------------------------------
    // Listing
    // -------------------------------------------------------------------------

    /// Lists files of the bound type, as sorted relative paths.
    ///
    /// `recursive` descends to the configured depth; otherwise only the
    /// immediate directory is listed. Inaccessible entries are logged and
    /// skipped, never fatal.
    pub fn list_files(&self, recursive: bool) -> Result<Vec<FileRecord>, CatalogError> {
        let max_depth = if recursive {
            self.config.max_depth.min(ABSOLUTE_MAX_DEPTH)
        } else {
            1
        };

        let mut records = Vec::new();
        let walker = walkdir::WalkDir::new(&self.root)
            .max_depth(max_depth)
            .follow_links(false)
            .sort_by_file_name();

        for entry_result in walker {
            let entry = match entry_result {
                Ok(e) => e,
                Err(e) => {
                    tracing::debug!(
                        root = %self.root.display(),
                        error = %e,
                        "Skipping inaccessible entry"
                    );
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                continue;
            }

            let Some(file_name) = entry.file_name().to_str() else {
                tracing::debug!(
                    path = %entry.path().display(),
                    "Skipping non-UTF-8 filename"
                );
                continue;
            };
            if !self.product_type.matches_extension(file_name) {
                continue;
            }

            let relative = relative_path(&self.root, entry.path());
            let matched_description = self
                .product_type
                .matcher
                .match_name(&relative)
                .map(String::from);

            records.push(FileRecord {
                relative_path: relative,
                is_directory: false,
                matched_description,
            });

            if records.len() > self.config.max_files {
                return Err(CatalogError::MaxFilesExceeded {
                    max: self.config.max_files,
                });
            }
        }

        records.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(records)
    }

    // -------------------------------------------------------------------------
    // Search
    // -------------------------------------------------------------------------

    /// Substring search over the recursive listing.
    ///
    /// With `match_all` the full sorted match list is returned; otherwise
    /// the result holds at most one record, the first in sorted path order
    /// (a multi-match logs a warning).
    pub fn find_by_substring(
        &self,
        token: &str,
        match_all: bool,
        exclude: &[String],
    ) -> Result<Vec<FileRecord>, CatalogError> {
        let matches = self
            .list_files(true)?
            .into_iter()
            .filter(|r| r.relative_path.contains(token))
            .filter(|r| !is_excluded(&r.relative_path, exclude))
            .collect();
        Ok(apply_match_policy(matches, token, match_all))
    }

    /// Full-regex search over the recursive listing. Same `match_all`
    /// semantics as `find_by_substring`.
    pub fn find_by_pattern(
        &self,
        pattern: &str,
        match_all: bool,
        exclude: &[String],
    ) -> Result<Vec<FileRecord>, CatalogError> {
        let regex =
            Regex::new(pattern).map_err(|source| CatalogError::InvalidSelectorRegex {
                pattern: pattern.to_string(),
                source,
            })?;
        let matches = self
            .list_files(true)?
            .into_iter()
            .filter(|r| regex.is_match(&r.relative_path))
            .filter(|r| !is_excluded(&r.relative_path, exclude))
            .collect();
        Ok(apply_match_policy(matches, pattern, match_all))
    }

    /// Fuzzy path search: each "/"-separated segment of `name` matches
    /// loosely, so a caller can write `config/.json` without knowing the
    /// exact directory depth.
    pub fn find_by_fuzzy_path(
        &self,
        name: &str,
        match_all: bool,
        exclude: &[String],
    ) -> Result<Vec<FileRecord>, CatalogError> {
        self.find_by_pattern(&fuzzy_pattern(name), match_all, exclude)
    }

    /// Classifies `name` against the bound type's pattern rules.
    pub fn info(&self, name: &str) -> Option<&str> {
        self.product_type.matcher.match_name(name)
    }

    // -------------------------------------------------------------------------
    // Loading
    // -------------------------------------------------------------------------

    /// Resolves `selector` to exactly one file and decodes it.
    ///
    /// Returns the cached value when the resolved path was decoded before;
    /// the decoder runs exactly once per distinct resolved path. Decoder
    /// failures are logged and surfaced as `Ok(None)` so one corrupt
    /// product never poisons the rest of the tree. Selector resolution
    /// failures and missing raster sidecars are hard errors.
    pub fn load(&mut self, selector: &Selector) -> Result<Option<Arc<ProductValue>>, CatalogError> {
        let resolved = self.resolve(selector)?;
        let key = resolved
            .canonicalize()
            .unwrap_or_else(|_| resolved.clone());

        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!(path = %key.display(), "Load served from cache");
            return Ok(Some(Arc::clone(cached)));
        }

        if self.product_type.requires_sidecar() {
            let sidecar = self.product_type.sidecar_path(&resolved);
            if !sidecar.exists() {
                return Err(CatalogError::MissingSidecar {
                    path: resolved,
                    sidecar,
                });
            }
        }

        match self.product_type.decode(&resolved) {
            Ok(value) => {
                let value = Arc::new(value);
                self.cache.insert(key, Arc::clone(&value));
                Ok(Some(value))
            }
            Err(e) => {
                tracing::warn!(
                    path = %resolved.display(),
                    type_id = %self.product_type.id,
                    error = %e,
                    "Decoder failed; product reported absent"
                );
                Ok(None)
            }
        }
    }

    /// Resolves a selector to a concrete file path without decoding.
    ///
    /// Dialect priority: path > substring > fuzzy > regex. A selector with
    /// more than one dialect set logs a warning and only the first is
    /// honoured.
    pub fn resolve(&self, selector: &Selector) -> Result<PathBuf, CatalogError> {
        if selector.dialect_count() > 1 {
            tracing::warn!(
                selector = %selector.describe(),
                "Selector sets multiple dialects; honouring the first in priority order"
            );
        }

        if let Some(path) = &selector.path {
            // Literal first, then relative to the bound root.
            let literal = PathBuf::from(path);
            if literal.is_file() {
                return Ok(literal);
            }
            let rooted = self.root.join(path);
            if rooted.is_file() {
                return Ok(rooted);
            }
            return Err(CatalogError::NotFound {
                selector: selector.describe(),
                context: format!(
                    "neither '{}' nor '{}' exists",
                    literal.display(),
                    rooted.display()
                ),
            });
        }

        let matches = if let Some(token) = &selector.substring {
            self.find_by_substring(token, false, &[])?
        } else if let Some(name) = &selector.fuzzy {
            self.find_by_fuzzy_path(name, false, &[])?
        } else if let Some(pattern) = &selector.regex {
            self.find_by_pattern(pattern, false, &[])?
        } else {
            return Err(CatalogError::NotFound {
                selector: "empty".to_string(),
                context: "selector sets no dialect".to_string(),
            });
        };

        match matches.into_iter().next() {
            Some(record) => Ok(self.root.join(&record.relative_path)),
            None => Err(CatalogError::NotFound {
                selector: selector.describe(),
                context: format!("no match under '{}'", self.root.display()),
            }),
        }
    }

    // -------------------------------------------------------------------------
    // Product-specific helpers
    // -------------------------------------------------------------------------

    /// Derives the run name from the reflectance product file stem.
    /// An output directory with no `*_rfl` product has no run name.
    pub fn run_name(&self) -> Option<String> {
        let matches = self.find_by_pattern(r".*_rfl$", false, &[]).ok()?;
        let record = matches.first()?;
        let name = record
            .relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&record.relative_path);
        name.strip_suffix("_rfl").map(String::from)
    }

    /// All files carrying a pattern description, in sorted path order.
    pub fn products(&self) -> Result<Vec<FileRecord>, CatalogError> {
        Ok(self
            .list_files(true)?
            .into_iter()
            .filter(|r| r.matched_description.is_some())
            .collect())
    }

    /// First log file in sorted order, the default tail target.
    pub fn first_log(&self) -> Result<Option<FileRecord>, CatalogError> {
        Ok(self.list_files(true)?.into_iter().next())
    }

    /// Parses the sample-grid coordinates of LUT point-cloud entries
    /// directly under the bound directory.
    pub fn grid_points(&self) -> Result<Vec<(String, Vec<LutPoint>)>, CatalogError> {
        let mut points = Vec::new();
        let entries = std::fs::read_dir(&self.root).map_err(|source| CatalogError::Io {
            path: self.root.clone(),
            source,
        })?;
        for entry in entries.flatten() {
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };
            let parsed = parse_grid_name(&name);
            if !parsed.is_empty() {
                points.push((name, parsed));
            }
        }
        points.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(points)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Relative path with "/" separators, or the file name when the entry is
/// the root itself.
fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let mut out = String::new();
    for component in rel.components() {
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(&component.as_os_str().to_string_lossy());
    }
    out
}

/// Builds the loose per-segment pattern for fuzzy path search:
/// `a/b` becomes `.*a.*/.*b.*`.
pub(crate) fn fuzzy_pattern(name: &str) -> String {
    name.split('/')
        .map(|segment| format!(".*{segment}.*"))
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether `path` is knocked out by an exclusion token. Tokens with glob
/// wildcards match the whole relative path as a glob; plain tokens match
/// as substrings.
pub(crate) fn is_excluded(path: &str, exclude: &[String]) -> bool {
    exclude.iter().any(|token| {
        if token.contains('*') || token.contains('?') || token.contains('[') {
            glob::Pattern::new(token)
                .map(|p| p.matches(path))
                .unwrap_or(false)
        } else {
            path.contains(token.as_str())
        }
    })
}

/// Applies the single-result ambiguity policy: with `match_all` the list
/// passes through; otherwise it is cut to the first sorted match, with a
/// warning when more than one matched.
pub(crate) fn apply_match_policy(
    matches: Vec<FileRecord>,
    query: &str,
    match_all: bool,
) -> Vec<FileRecord> {
    if match_all || matches.len() <= 1 {
        return matches;
    }
    tracing::warn!(
        query,
        matches = matches.len(),
        chosen = %matches[0].relative_path,
        "Ambiguous query; using first match in sorted path order"
    );
    matches.into_iter().take(1).collect()
}

/// Parses a LUT point-cloud entry name into its grid coordinates.
///
/// Names encode repeated `dimension-value` pairs joined by underscores,
/// e.g. `LUT_AOT550-0.05_H2OSTR-1.5`. A leading `LUT_` prefix is ignored.
/// Returns an empty list for names that encode no pairs.
pub fn parse_grid_name(name: &str) -> Vec<LutPoint> {
    static GRID: OnceLock<Regex> = OnceLock::new();
    let regex = GRID.get_or_init(|| {
        Regex::new(r"(\w+?)-(\d*\.?\d+)(?:_|$)").unwrap_or_else(|e| {
            unreachable!("grid pattern is a tested literal: {e}");
        })
    });

    let stem = name.strip_prefix("LUT_").unwrap_or(name);
    regex
        .captures_iter(stem)
        .filter_map(|caps| {
            let dimension = caps.get(1)?.as_str().to_string();
            let value: f64 = caps.get(2)?.as_str().parse().ok()?;
            Some(LutPoint { dimension, value })
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::TypeRegistry;
    use std::fs;
    use tempfile::TempDir;

    fn registry() -> TypeRegistry {
        TypeRegistry::builtin().unwrap()
    }

    fn make_config_tree() -> TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();

        fs::write(root.join("topoflux_isofit.json"), r#"{"mode": "full"}"#)
            .expect("write isofit config");
        fs::write(root.join("topoflux_h2o.json"), r#"{"mode": "presolve"}"#)
            .expect("write h2o config");
        fs::write(root.join("notes.txt"), "not a config").expect("write notes");

        let sub = root.join("templates");
        fs::create_dir(&sub).expect("mkdir templates");
        fs::write(sub.join("topoflux_modtran_tpl.json"), "{}").expect("write template");

        dir
    }

    fn make_output_tree() -> TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();

        for stem in ["topoflux_rfl", "topoflux_uncert", "topoflux_subs_rfl"] {
            fs::write(root.join(stem), [0u8; 16]).expect("write raster");
            fs::write(root.join(format!("{stem}.hdr")), "ENVI\nsamples = 2\n")
                .expect("write header");
        }
        dir
    }

    fn config_finder(dir: &TempDir) -> FileFinder {
        FileFinder::new(
            dir.path(),
            registry().get("config").unwrap(),
            FinderConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn list_files_filters_by_extension_and_sorts() {
        let dir = make_config_tree();
        let finder = config_finder(&dir);

        let files = finder.list_files(true).unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "templates/topoflux_modtran_tpl.json",
                "topoflux_h2o.json",
                "topoflux_isofit.json",
            ]
        );
    }

    #[test]
    fn non_recursive_listing_stays_at_top_level() {
        let dir = make_config_tree();
        let finder = config_finder(&dir);

        let files = finder.list_files(false).unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["topoflux_h2o.json", "topoflux_isofit.json"]);
    }

    #[test]
    fn listing_carries_pattern_descriptions() {
        let dir = make_config_tree();
        let finder = config_finder(&dir);

        let files = finder.list_files(false).unwrap();
        let isofit = files
            .iter()
            .find(|f| f.relative_path == "topoflux_isofit.json")
            .unwrap();
        assert_eq!(
            isofit.matched_description.as_deref(),
            Some("Main retrieval configuration")
        );
    }

    #[test]
    fn missing_root_is_rejected() {
        let err = FileFinder::new(
            "/nonexistent/rundex-test-root",
            registry().get("config").unwrap(),
            FinderConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::RootNotFound { .. }));
    }

    #[test]
    fn substring_search_excludes_tokens() {
        let dir = make_config_tree();
        let finder = config_finder(&dir);

        let all = finder
            .find_by_substring("topoflux", true, &[])
            .unwrap();
        assert_eq!(all.len(), 3);

        let no_templates = finder
            .find_by_substring("topoflux", true, &["templates".to_string()])
            .unwrap();
        assert_eq!(no_templates.len(), 2);
    }

    #[test]
    fn glob_exclusion_tokens_match_whole_paths() {
        let dir = make_config_tree();
        let finder = config_finder(&dir);

        let filtered = finder
            .find_by_substring("topoflux", true, &["*_h2o.json".to_string()])
            .unwrap();
        assert!(filtered
            .iter()
            .all(|r| !r.relative_path.ends_with("_h2o.json")));
    }

    #[test]
    fn single_result_query_returns_first_sorted_match() {
        let dir = make_config_tree();
        let finder = config_finder(&dir);

        // "topoflux" matches three files; sorted order puts the template first.
        let result = finder.find_by_substring("topoflux", false, &[]).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(
            result[0].relative_path,
            "templates/topoflux_modtran_tpl.json"
        );
    }

    #[test]
    fn fuzzy_path_matches_without_exact_depth() {
        let dir = make_config_tree();
        let finder = config_finder(&dir);

        let result = finder
            .find_by_fuzzy_path("templates/tpl.json", false, &[])
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(
            result[0].relative_path,
            "templates/topoflux_modtran_tpl.json"
        );
    }

    #[test]
    fn invalid_selector_regex_is_reported() {
        let dir = make_config_tree();
        let finder = config_finder(&dir);
        let err = finder.find_by_pattern("bad(unclosed", true, &[]).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidSelectorRegex { .. }));
    }

    #[test]
    fn load_resolves_root_relative_paths() {
        let dir = make_config_tree();
        let mut finder = config_finder(&dir);

        let value = finder
            .load(&Selector::path("topoflux_isofit.json"))
            .unwrap()
            .expect("decode should succeed");
        match value.as_ref() {
            ProductValue::Json(doc) => assert_eq!(doc["mode"], "full"),
            other => panic!("expected Json, got {other:?}"),
        }
    }

    #[test]
    fn load_unknown_path_is_not_found() {
        let dir = make_config_tree();
        let mut finder = config_finder(&dir);
        let err = finder
            .load(&Selector::path("missing.json"))
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound { .. }));
    }

    #[test]
    fn load_memoizes_by_resolved_path() {
        let dir = make_config_tree();
        let mut finder = config_finder(&dir);

        // Different selectors, same resolved file: one decode, one cache
        // entry, identical Arc.
        let by_path = finder
            .load(&Selector::path("topoflux_isofit.json"))
            .unwrap()
            .unwrap();
        let by_substring = finder
            .load(&Selector::substring("isofit.json"))
            .unwrap()
            .unwrap();

        assert!(Arc::ptr_eq(&by_path, &by_substring));
        assert_eq!(finder.cached_count(), 1);
    }

    #[test]
    fn decode_failure_is_soft() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken_isofit.json"), "{not json").unwrap();
        let mut finder = FileFinder::new(
            dir.path(),
            registry().get("config").unwrap(),
            FinderConfig::default(),
        )
        .unwrap();

        let result = finder
            .load(&Selector::path("broken_isofit.json"))
            .unwrap();
        assert!(result.is_none(), "corrupt product must surface as absent");
    }

    #[test]
    fn raster_without_sidecar_is_a_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("orphan_rfl"), [0u8; 8]).unwrap();
        let mut finder = FileFinder::new(
            dir.path(),
            registry().get("output").unwrap(),
            FinderConfig::default(),
        )
        .unwrap();

        let err = finder.load(&Selector::path("orphan_rfl")).unwrap_err();
        assert!(matches!(err, CatalogError::MissingSidecar { .. }));
    }

    #[test]
    fn raster_listing_skips_sidecars() {
        let dir = make_output_tree();
        let finder = FileFinder::new(
            dir.path(),
            registry().get("output").unwrap(),
            FinderConfig::default(),
        )
        .unwrap();

        let files = finder.list_files(true).unwrap();
        assert!(files.iter().all(|f| !f.relative_path.ends_with(".hdr")));
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn run_name_derives_from_reflectance_product() {
        let dir = make_output_tree();
        let finder = FileFinder::new(
            dir.path(),
            registry().get("output").unwrap(),
            FinderConfig::default(),
        )
        .unwrap();

        // Sorted order puts topoflux_rfl before topoflux_subs_rfl.
        assert_eq!(finder.run_name().as_deref(), Some("topoflux"));
    }

    #[test]
    fn products_lists_described_files() {
        let dir = make_output_tree();
        let finder = FileFinder::new(
            dir.path(),
            registry().get("output").unwrap(),
            FinderConfig::default(),
        )
        .unwrap();

        let products = finder.products().unwrap();
        assert_eq!(products.len(), 3);
        assert!(products
            .iter()
            .any(|p| p.matched_description.as_deref() == Some("Reflectance")));
    }

    #[test]
    fn grid_names_parse_into_points() {
        let points = parse_grid_name("LUT_AOT550-0.05_H2OSTR-1.5");
        assert_eq!(
            points,
            vec![
                LutPoint {
                    dimension: "AOT550".into(),
                    value: 0.05
                },
                LutPoint {
                    dimension: "H2OSTR".into(),
                    value: 1.5
                },
            ]
        );

        assert!(parse_grid_name("no pairs here").is_empty());
    }
}

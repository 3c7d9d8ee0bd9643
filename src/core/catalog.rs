// rundex - core/catalog.rs
//
// Working-directory catalog. A Catalog claims the immediate subdirectories
// of a root by substring against a fixed ordered mapping and binds each
// claimed directory to a typed FileFinder. Unclaimed directories become
// nested catalogs (recursive mode) or inert unclassified leaves. Loads are
// dispatched to the owning child; the catalog root itself never loads.
//
// A catalog is built once and only ever rebuilt wholesale via reset().
// Children are recreated on reset, so every child cache is dropped with
// them.

use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::descriptor::TypeRegistry;
use crate::core::finder::{
    apply_match_policy, fuzzy_pattern, is_excluded, FileFinder, FinderConfig,
};
use crate::core::model::{FileRecord, ProductValue, Selector, TreeEntry, TreeKind};
use crate::util::constants::ABSOLUTE_MAX_DEPTH;
use crate::util::error::CatalogError;

// =============================================================================
// Directory mapping
// =============================================================================

/// Ordered (substring, type id, description) mapping for immediate
/// subdirectory names. First match wins, so the `lut_full` / `lut_h2o`
/// entries must precede the bare `lut` entry.
const DIRECTORY_MAP: &[(&str, &str, &str)] = &[
    ("config", "config", "Configuration files"),
    ("data", "data", "Additional data files generated by the pipeline"),
    ("input", "input", "Data files input to the pipeline"),
    ("lut_full", "lut", "Look-Up-Table outputs for the full run"),
    ("lut_h2o", "lut", "Look-Up-Table outputs for the presolve run"),
    ("lut", "lut", "Look-Up-Table outputs"),
    ("output", "output", "Run outputs such as reflectance"),
];

/// Maps a subdirectory name onto `(type id, description)` via the ordered
/// substring mapping, or `None` when no entry claims it.
fn classify_directory(name: &str) -> Option<(&'static str, &'static str)> {
    DIRECTORY_MAP
        .iter()
        .find(|(token, _, _)| name.contains(token))
        .map(|(_, type_id, description)| (*type_id, *description))
}

// =============================================================================
// Catalog nodes
// =============================================================================

/// What a catalog knows about one immediate subdirectory. Each
/// subdirectory is owned by exactly one node.
#[derive(Debug)]
pub enum CatalogNode {
    /// Directory claimed by the mapping and bound to one product type.
    TypedLeaf(FileFinder),

    /// Unclaimed directory holding a full catalog of its own.
    NestedCatalog(Box<Catalog>),

    /// Unclaimed directory in non-recursive mode, or a directory cycle.
    /// Appears in tree listings but refuses every load.
    Unknown,
}

#[derive(Debug)]
struct Child {
    name: String,
    description: Option<String>,
    node: CatalogNode,
}

// =============================================================================
// Catalog
// =============================================================================

/// Typed view over one working directory.
#[derive(Debug)]
pub struct Catalog {
    root: PathBuf,
    recursive: bool,
    registry: TypeRegistry,
    config: FinderConfig,

    /// Claimed children first (in sorted directory order), then unclaimed.
    children: Vec<Child>,

    /// Root-bound finder for `.log` files. Absent only when the registry
    /// carries no `logs` type.
    logs: Option<FileFinder>,
}

impl Catalog {
    /// Builds a catalog over `root`. With `recursive` set, unclaimed
    /// subdirectories become nested catalogs; otherwise they are listed
    /// as unclassified and never loaded from.
    pub fn new(
        root: impl Into<PathBuf>,
        registry: &TypeRegistry,
        recursive: bool,
        config: FinderConfig,
    ) -> Result<Self, CatalogError> {
        let mut visited = HashSet::new();
        Self::build(root.into(), registry, recursive, config, &mut visited)
    }

    /// Recursive constructor. `visited` holds the canonical path of every
    /// directory already owned by a catalog on this build, which is what
    /// stops a symlink loop from recursing forever.
    fn build(
        root: PathBuf,
        registry: &TypeRegistry,
        recursive: bool,
        config: FinderConfig,
        visited: &mut HashSet<PathBuf>,
    ) -> Result<Self, CatalogError> {
        let meta = fs::metadata(&root).map_err(|_| CatalogError::RootNotFound {
            path: root.clone(),
        })?;
        if !meta.is_dir() {
            return Err(CatalogError::NotADirectory { path: root });
        }
        visited.insert(root.canonicalize().unwrap_or_else(|_| root.clone()));

        let mut subdirs = Vec::new();
        let entries = fs::read_dir(&root).map_err(|source| CatalogError::Io {
            path: root.clone(),
            source,
        })?;
        for entry in entries.flatten() {
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                tracing::debug!(
                    path = %entry.path().display(),
                    "Skipping non-UTF-8 directory entry"
                );
                continue;
            };
            // Follows symlinks so a linked directory is classified like a
            // real one; the visited set below breaks any cycle.
            match fs::metadata(entry.path()) {
                Ok(m) if m.is_dir() => subdirs.push(name),
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(
                        path = %entry.path().display(),
                        error = %e,
                        "Skipping unreadable directory entry"
                    );
                }
            }
        }
        subdirs.sort();

        let mut claimed = Vec::new();
        let mut unclaimed = Vec::new();
        for name in subdirs {
            let path = root.join(&name);
            if let Some((type_id, description)) = classify_directory(&name) {
                let Some(product_type) = registry.get(type_id) else {
                    tracing::warn!(
                        directory = %name,
                        type_id,
                        "Mapped product type is not registered; leaving unclassified"
                    );
                    unclaimed.push(Child {
                        name,
                        description: None,
                        node: CatalogNode::Unknown,
                    });
                    continue;
                };
                tracing::debug!(directory = %name, type_id, "Claimed directory");
                claimed.push(Child {
                    name,
                    description: Some(description.to_string()),
                    node: CatalogNode::TypedLeaf(FileFinder::new(
                        path,
                        product_type,
                        config.clone(),
                    )?),
                });
            } else if recursive {
                let real = path.canonicalize().unwrap_or_else(|_| path.clone());
                if visited.contains(&real) {
                    tracing::warn!(
                        path = %path.display(),
                        "Directory cycle detected; leaving unclassified"
                    );
                    unclaimed.push(Child {
                        name,
                        description: None,
                        node: CatalogNode::Unknown,
                    });
                } else {
                    let nested =
                        Self::build(path, registry, recursive, config.clone(), visited)?;
                    unclaimed.push(Child {
                        name,
                        description: None,
                        node: CatalogNode::NestedCatalog(Box::new(nested)),
                    });
                }
            } else {
                unclaimed.push(Child {
                    name,
                    description: None,
                    node: CatalogNode::Unknown,
                });
            }
        }

        let mut children = claimed;
        children.append(&mut unclaimed);

        let logs = match registry.get("logs") {
            Some(log_type) => Some(FileFinder::new(&root, log_type, config.clone())?),
            None => None,
        };

        Ok(Self {
            root,
            recursive,
            registry: registry.clone(),
            config,
            children,
            logs,
        })
    }

    /// The catalog root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether unclaimed subdirectories become nested catalogs.
    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    /// Immediate children as `(name, node)` pairs, claimed first.
    pub fn children(&self) -> impl Iterator<Item = (&str, &CatalogNode)> {
        self.children.iter().map(|c| (c.name.as_str(), &c.node))
    }

    /// Looks up an immediate child by its directory name.
    pub fn child(&self, name: &str) -> Option<&CatalogNode> {
        self.children
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.node)
    }

    /// Root-bound finder over `.log` files, the tail targets for this
    /// working directory.
    pub fn logs(&self) -> Option<&FileFinder> {
        self.logs.as_ref()
    }

    // -------------------------------------------------------------------------
    // Loading
    // -------------------------------------------------------------------------

    /// Resolves `selector` to one file owned by a child and loads it
    /// through that child's finder.
    ///
    /// Path selectors split on the first "/" into (child, subpath) and
    /// dispatch directly; the other dialects resolve through `find` over
    /// the flattened subtree first. A selector naming a root-level file is
    /// unsupported and fails with NotFound.
    pub fn load(
        &mut self,
        selector: &Selector,
    ) -> Result<Option<Arc<ProductValue>>, CatalogError> {
        let target = if let Some(path) = &selector.path {
            path.clone()
        } else {
            let records = self.find(selector, false, &[])?;
            match records.into_iter().next() {
                Some(record) => record.relative_path,
                None => {
                    return Err(CatalogError::NotFound {
                        selector: selector.describe(),
                        context: format!("no match under '{}'", self.root.display()),
                    })
                }
            }
        };

        let Some((child_name, subpath)) = target.split_once('/') else {
            return Err(CatalogError::NotFound {
                selector: selector.describe(),
                context: "loading at the catalog root is unsupported; address a child directory"
                    .to_string(),
            });
        };

        let Some(child) = self.children.iter_mut().find(|c| c.name == child_name) else {
            return Err(CatalogError::NotFound {
                selector: selector.describe(),
                context: format!(
                    "no child directory '{}' under '{}'",
                    child_name,
                    self.root.display()
                ),
            });
        };

        match &mut child.node {
            CatalogNode::TypedLeaf(finder) => finder.load(&Selector::path(subpath)),
            CatalogNode::NestedCatalog(catalog) => catalog.load(&Selector::path(subpath)),
            CatalogNode::Unknown => Err(CatalogError::NotFound {
                selector: selector.describe(),
                context: format!("directory '{child_name}' is unclassified and never loads"),
            }),
        }
    }

    // -------------------------------------------------------------------------
    // Search
    // -------------------------------------------------------------------------

    /// Selector search over the flattened subtree. Relative paths in the
    /// result are prefixed with the owning child's directory name, so they
    /// feed straight back into `load`.
    pub fn find(
        &self,
        selector: &Selector,
        match_all: bool,
        exclude: &[String],
    ) -> Result<Vec<FileRecord>, CatalogError> {
        if selector.dialect_count() > 1 {
            tracing::warn!(
                selector = %selector.describe(),
                "Selector sets multiple dialects; honouring the first in priority order"
            );
        }

        let records = self.flattened()?;
        let filtered: Vec<FileRecord> = if let Some(path) = &selector.path {
            records
                .into_iter()
                .filter(|r| r.relative_path == *path)
                .collect()
        } else if let Some(token) = &selector.substring {
            records
                .into_iter()
                .filter(|r| r.relative_path.contains(token.as_str()))
                .collect()
        } else if let Some(name) = &selector.fuzzy {
            let regex = compile_selector_regex(&fuzzy_pattern(name))?;
            records
                .into_iter()
                .filter(|r| regex.is_match(&r.relative_path))
                .collect()
        } else if let Some(pattern) = &selector.regex {
            let regex = compile_selector_regex(pattern)?;
            records
                .into_iter()
                .filter(|r| regex.is_match(&r.relative_path))
                .collect()
        } else {
            return Err(CatalogError::NotFound {
                selector: "empty".to_string(),
                context: "selector sets no dialect".to_string(),
            });
        };

        let kept = filtered
            .into_iter()
            .filter(|r| !is_excluded(&r.relative_path, exclude))
            .collect();
        Ok(apply_match_policy(kept, &selector.describe(), match_all))
    }

    /// Classifies `name` against the pattern rules of every typed child,
    /// in child order; the first description wins.
    pub fn info(&self, name: &str) -> Option<&str> {
        self.children.iter().find_map(|child| match &child.node {
            CatalogNode::TypedLeaf(finder) => finder.info(name),
            CatalogNode::NestedCatalog(catalog) => catalog.info(name),
            CatalogNode::Unknown => None,
        })
    }

    /// Run name derived from the first output child carrying a
    /// reflectance product.
    pub fn run_name(&self) -> Option<String> {
        self.children.iter().find_map(|child| match &child.node {
            CatalogNode::TypedLeaf(finder) if finder.product_type().id == "output" => {
                finder.run_name()
            }
            CatalogNode::NestedCatalog(catalog) => catalog.run_name(),
            _ => None,
        })
    }

    /// Every file known to a typed or nested child, child-prefixed and in
    /// sorted path order. Unclassified directories contribute nothing.
    fn flattened(&self) -> Result<Vec<FileRecord>, CatalogError> {
        let mut records = Vec::new();
        for child in &self.children {
            match &child.node {
                CatalogNode::TypedLeaf(finder) => {
                    for mut record in finder.list_files(true)? {
                        record.relative_path =
                            format!("{}/{}", child.name, record.relative_path);
                        records.push(record);
                    }
                }
                CatalogNode::NestedCatalog(catalog) => {
                    for mut record in catalog.flattened()? {
                        record.relative_path =
                            format!("{}/{}", child.name, record.relative_path);
                        records.push(record);
                    }
                }
                CatalogNode::Unknown => {}
            }
        }
        records.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(records)
    }

    // -------------------------------------------------------------------------
    // Tree listing
    // -------------------------------------------------------------------------

    /// Emits the catalog as a display tree: claimed children first, each
    /// with its full file subtree, then unclaimed directories, then
    /// root-level files. Every filesystem entry appears exactly once.
    pub fn get_tree(&self, with_descriptions: bool) -> Vec<TreeEntry> {
        let depth = self.config.max_depth.min(ABSOLUTE_MAX_DEPTH);
        let mut out = Vec::new();

        for child in &self.children {
            match &child.node {
                CatalogNode::TypedLeaf(finder) => out.push(TreeEntry {
                    name: child.name.clone(),
                    kind: TreeKind::Typed {
                        type_id: finder.product_type().id.clone(),
                    },
                    description: if with_descriptions {
                        child.description.clone()
                    } else {
                        None
                    },
                    children: file_tree(finder.root(), "", Some(finder), with_descriptions, depth),
                }),
                CatalogNode::NestedCatalog(catalog) => out.push(TreeEntry {
                    name: child.name.clone(),
                    kind: TreeKind::Nested,
                    description: None,
                    children: catalog.get_tree(with_descriptions),
                }),
                CatalogNode::Unknown => out.push(TreeEntry {
                    name: child.name.clone(),
                    kind: TreeKind::Unknown,
                    description: None,
                    children: file_tree(
                        &self.root.join(&child.name),
                        "",
                        None,
                        with_descriptions,
                        depth,
                    ),
                }),
            }
        }

        out.extend(self.root_file_entries(with_descriptions));
        out
    }

    /// Root-level file entries, sorted by name. Logs get their pattern
    /// description when requested.
    fn root_file_entries(&self, with_descriptions: bool) -> Vec<TreeEntry> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(
                    root = %self.root.display(),
                    error = %e,
                    "Root listing failed during tree build"
                );
                return Vec::new();
            }
        };

        let mut names = Vec::new();
        for entry in entries.flatten() {
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };
            match fs::metadata(entry.path()) {
                Ok(m) if !m.is_dir() => names.push(name),
                _ => {}
            }
        }
        names.sort();

        names
            .into_iter()
            .map(|name| {
                let description = if with_descriptions {
                    self.logs
                        .as_ref()
                        .and_then(|f| f.info(&name))
                        .map(String::from)
                } else {
                    None
                };
                TreeEntry {
                    name,
                    kind: TreeKind::File,
                    description,
                    children: Vec::new(),
                }
            })
            .collect()
    }

    // -------------------------------------------------------------------------
    // Reset
    // -------------------------------------------------------------------------

    /// Full in-place reconstruction over `new_root`. Every child, and with
    /// it every child cache, is recreated from scratch; nothing is merged
    /// from the old tree.
    pub fn reset(
        &mut self,
        new_root: impl Into<PathBuf>,
        recursive: bool,
    ) -> Result<(), CatalogError> {
        let rebuilt = Catalog::new(new_root, &self.registry, recursive, self.config.clone())?;
        tracing::info!(
            root = %rebuilt.root.display(),
            children = rebuilt.children.len(),
            "Catalog reset"
        );
        *self = rebuilt;
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn compile_selector_regex(pattern: &str) -> Result<Regex, CatalogError> {
    Regex::new(pattern).map_err(|source| CatalogError::InvalidSelectorRegex {
        pattern: pattern.to_string(),
        source,
    })
}

/// Lists every entry under `dir` as display tree nodes: files with
/// optional pattern descriptions, subdirectories recursed up to
/// `depth_left`. Listing failures degrade to an empty branch.
fn file_tree(
    dir: &Path,
    prefix: &str,
    finder: Option<&FileFinder>,
    with_descriptions: bool,
    depth_left: usize,
) -> Vec<TreeEntry> {
    if depth_left == 0 {
        return Vec::new();
    }
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(
                dir = %dir.display(),
                error = %e,
                "Directory listing failed during tree build"
            );
            return Vec::new();
        }
    };

    let mut names = Vec::new();
    for entry in entries.flatten() {
        let Some(name) = entry.file_name().to_str().map(String::from) else {
            continue;
        };
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        names.push((name, is_dir));
    }
    names.sort();

    let mut out = Vec::new();
    for (name, is_dir) in names {
        let rel = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}/{name}")
        };
        if is_dir {
            let children = file_tree(&dir.join(&name), &rel, finder, with_descriptions, depth_left - 1);
            out.push(TreeEntry {
                name,
                kind: TreeKind::Unknown,
                description: None,
                children,
            });
        } else {
            let description = if with_descriptions {
                finder.and_then(|f| f.info(&rel)).map(String::from)
            } else {
                None
            };
            out.push(TreeEntry {
                name,
                kind: TreeKind::File,
                description,
                children: Vec::new(),
            });
        }
    }
    out
}

// =============================================================================
// Tests
// =============================================================================

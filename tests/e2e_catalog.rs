// rundex - tests/e2e_catalog.rs
//
// End-to-end catalog coverage over the committed working-directory
// fixture: classification, selector loads, raster sidecars, tree
// listing, and reset. Negative cases that need broken inputs build
// their own temporary trees instead of polluting the fixture.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use rundex::core::catalog::{Catalog, CatalogNode};
use rundex::core::descriptor::TypeRegistry;
use rundex::core::finder::{FileFinder, FinderConfig};
use rundex::core::model::{ProductValue, Selector, TreeKind};
use rundex::util::error::CatalogError;

/// Absolute path to a committed fixture.
fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn registry() -> TypeRegistry {
    TypeRegistry::builtin().expect("built-in registry must parse")
}

fn workdir_catalog() -> Catalog {
    Catalog::new(fixture("workdir"), &registry(), false, FinderConfig::default())
        .expect("fixture working directory must catalog")
}

// =============================================================================
// Classification
// =============================================================================

#[test]
fn fixture_directories_classify_against_the_mapping() {
    let catalog = workdir_catalog();

    for (name, type_id) in [
        ("config", "config"),
        ("data", "data"),
        ("lut_full", "lut"),
        ("lut_h2o", "lut"),
        ("output", "output"),
    ] {
        match catalog.child(name) {
            Some(CatalogNode::TypedLeaf(finder)) => {
                assert_eq!(
                    finder.product_type().id, type_id,
                    "directory '{name}' should bind type '{type_id}'"
                );
            }
            other => panic!("expected typed leaf for '{name}', got {other:?}"),
        }
    }

    assert!(
        matches!(catalog.child("scratch"), Some(CatalogNode::Unknown)),
        "scratch matches no mapping entry and must stay unclassified"
    );
}

#[test]
fn recursive_mode_turns_scratch_into_a_nested_catalog() {
    let catalog = Catalog::new(
        fixture("workdir"),
        &registry(),
        true,
        FinderConfig::default(),
    )
    .unwrap();
    assert!(matches!(
        catalog.child("scratch"),
        Some(CatalogNode::NestedCatalog(_))
    ));
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn path_load_decodes_a_config_document() {
    let mut catalog = workdir_catalog();
    let value = catalog
        .load(&Selector::path("config/topoflux_isofit.json"))
        .unwrap()
        .expect("committed config must decode");

    match value.as_ref() {
        ProductValue::Json(doc) => {
            assert_eq!(doc["implementation"]["n_cores"], 4);
        }
        other => panic!("expected Json, got {other:?}"),
    }
}

#[test]
fn dialects_resolving_the_same_file_share_one_decode() {
    let mut catalog = workdir_catalog();

    let by_path = catalog
        .load(&Selector::path("config/topoflux_isofit.json"))
        .unwrap()
        .unwrap();
    let by_fuzzy = catalog
        .load(&Selector::fuzzy("config/isofit.json"))
        .unwrap()
        .unwrap();
    let by_substring = catalog
        .load(&Selector::substring("isofit.json"))
        .unwrap()
        .unwrap();

    assert!(Arc::ptr_eq(&by_path, &by_fuzzy));
    assert!(Arc::ptr_eq(&by_path, &by_substring));
}

#[test]
fn raster_load_parses_the_sidecar_header() {
    let mut catalog = workdir_catalog();
    let value = catalog
        .load(&Selector::path("output/topoflux_rfl"))
        .unwrap()
        .expect("raster with sidecar must decode");

    match value.as_ref() {
        ProductValue::Raster(handle) => {
            assert_eq!(handle.header.get("samples").map(String::as_str), Some("3"));
            assert_eq!(handle.header.get("lines").map(String::as_str), Some("2"));
            assert_eq!(handle.header.get("bands").map(String::as_str), Some("1"));
            assert_eq!(
                handle.header.get("description").map(String::as_str),
                Some("Topoflux surface reflectance"),
                "brace-delimited values must fold across lines"
            );
            assert_eq!(handle.data_len, 12);
            assert!(handle.header_path.ends_with("topoflux_rfl.hdr"));
        }
        other => panic!("expected Raster, got {other:?}"),
    }
}

#[test]
fn root_level_files_never_load() {
    let mut catalog = workdir_catalog();
    let err = catalog.load(&Selector::path("topoflux.log")).unwrap_err();
    assert!(matches!(err, CatalogError::NotFound { .. }));
}

#[test]
fn unclassified_directories_never_load() {
    let mut catalog = workdir_catalog();
    let err = catalog
        .load(&Selector::path("scratch/leftover.txt"))
        .unwrap_err();
    assert!(matches!(err, CatalogError::NotFound { .. }));
}

#[test]
fn corrupt_sidecar_degrades_to_an_absent_product() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("output");
    fs::create_dir(&output).unwrap();
    fs::write(output.join("broken_rfl"), [0u8; 4]).unwrap();
    fs::write(output.join("broken_rfl.hdr"), "ENVI\nthis line has no field\n").unwrap();

    let mut catalog =
        Catalog::new(dir.path(), &registry(), false, FinderConfig::default()).unwrap();
    let value = catalog
        .load(&Selector::path("output/broken_rfl"))
        .unwrap();
    assert!(value.is_none(), "decode failure must surface as absent");
}

#[test]
fn missing_sidecar_is_a_hard_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("output");
    fs::create_dir(&output).unwrap();
    fs::write(output.join("orphan_rfl"), [0u8; 4]).unwrap();

    let mut catalog =
        Catalog::new(dir.path(), &registry(), false, FinderConfig::default()).unwrap();
    let err = catalog.load(&Selector::path("output/orphan_rfl")).unwrap_err();
    assert!(matches!(err, CatalogError::MissingSidecar { .. }));
}

// =============================================================================
// Search
// =============================================================================

#[test]
fn substring_find_spans_both_lut_children() {
    let catalog = workdir_catalog();
    let records = catalog.find(&Selector::substring("lut.nc"), true, &[]).unwrap();
    let paths: Vec<_> = records.iter().map(|r| r.relative_path.as_str()).collect();
    assert_eq!(paths, vec!["lut_full/lut.nc", "lut_h2o/lut.nc"]);
}

#[test]
fn exclusion_tokens_prune_find_results() {
    let catalog = workdir_catalog();
    let records = catalog
        .find(
            &Selector::substring("lut.nc"),
            true,
            &["lut_full".to_string()],
        )
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].relative_path, "lut_h2o/lut.nc");
}

#[test]
fn single_result_find_takes_the_first_sorted_match() {
    let catalog = workdir_catalog();
    let records = catalog.find(&Selector::substring("lut.nc"), false, &[]).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].relative_path, "lut_full/lut.nc");
}

#[test]
fn info_classifies_output_products() {
    let catalog = workdir_catalog();
    assert_eq!(
        catalog.info("topoflux_subs_h2o"),
        Some("Water vapour retrieval for the subset run")
    );
    assert_eq!(catalog.info("topoflux_rfl"), Some("Reflectance"));
    assert_eq!(catalog.info("leftover.txt"), None);
}

#[test]
fn run_name_derives_from_the_reflectance_product() {
    let catalog = workdir_catalog();
    assert_eq!(catalog.run_name().as_deref(), Some("topoflux"));
}

#[test]
fn lut_child_exposes_its_grid_points() {
    let catalog = workdir_catalog();
    let Some(CatalogNode::TypedLeaf(finder)) = catalog.child("lut_h2o") else {
        panic!("lut_h2o must be a typed leaf");
    };

    let points = finder.grid_points().unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].0, "LUT_H2OSTR-1.5");
    assert_eq!(points[0].1[0].dimension, "H2OSTR");
    assert_eq!(points[0].1[0].value, 1.5);
    assert_eq!(points[1].0, "LUT_H2OSTR-2.0");
    assert_eq!(points[1].1[0].value, 2.0);
}

#[test]
fn logs_finder_targets_the_root_level_log() {
    let catalog = workdir_catalog();
    let first = catalog
        .logs()
        .expect("built-in registry carries a logs type")
        .first_log()
        .unwrap()
        .expect("fixture root holds a log");
    assert_eq!(first.relative_path, "topoflux.log");
}

// =============================================================================
// Tree listing
// =============================================================================

#[test]
fn tree_lists_claimed_children_then_unclaimed_then_root_files() {
    let catalog = workdir_catalog();
    let tree = catalog.get_tree(true);
    let names: Vec<_> = tree.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "config",
            "data",
            "lut_full",
            "lut_h2o",
            "output",
            "scratch",
            "topoflux.log",
        ]
    );

    assert!(matches!(tree[0].kind, TreeKind::Typed { .. }));
    assert!(matches!(tree[5].kind, TreeKind::Unknown));
    assert!(matches!(tree[6].kind, TreeKind::File));
    assert_eq!(tree[6].description.as_deref(), Some("Run log"));
}

#[test]
fn tree_enumerates_every_fixture_entry_exactly_once() {
    let catalog = workdir_catalog();

    // 8 directories, 17 files: sidecar headers, LUT point directories
    // and their contents, the scratch leftover, and the root log all
    // count once each.
    let tree = catalog.get_tree(false);
    let total: usize = tree.iter().map(|e| 1 + e.descendant_count()).sum();
    assert_eq!(total, 25);
}

#[test]
fn tree_descriptions_reach_files_inside_claimed_children() {
    let catalog = workdir_catalog();
    let tree = catalog.get_tree(true);

    let output = tree.iter().find(|e| e.name == "output").unwrap();
    let uncert = output
        .children
        .iter()
        .find(|e| e.name == "topoflux_uncert")
        .unwrap();
    assert_eq!(uncert.description.as_deref(), Some("Retrieval uncertainty"));

    // Sidecar headers appear in the tree but match no pattern rule.
    let hdr = output
        .children
        .iter()
        .find(|e| e.name == "topoflux_uncert.hdr")
        .unwrap();
    assert_eq!(hdr.description, None);
}

// =============================================================================
// Reset
// =============================================================================

#[test]
fn reset_moves_the_catalog_and_drops_every_cache() {
    let mut catalog = workdir_catalog();
    let before = catalog
        .load(&Selector::path("config/topoflux_isofit.json"))
        .unwrap()
        .unwrap();

    // Rehome onto a minimal temporary tree, then back onto the fixture.
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("config")).unwrap();
    fs::write(
        dir.path().join("config").join("other_isofit.json"),
        r#"{"mode": "other"}"#,
    )
    .unwrap();

    catalog.reset(dir.path(), false).unwrap();
    assert_eq!(catalog.root(), dir.path());
    assert!(catalog
        .load(&Selector::path("config/other_isofit.json"))
        .unwrap()
        .is_some());

    catalog.reset(fixture("workdir"), false).unwrap();
    let after = catalog
        .load(&Selector::path("config/topoflux_isofit.json"))
        .unwrap()
        .unwrap();
    assert!(
        !Arc::ptr_eq(&before, &after),
        "reset must recreate children, so the old cache entry is gone"
    );
}

// =============================================================================
// Standalone finder over the fixture
// =============================================================================

#[test]
fn finder_bound_to_the_fixture_output_sees_only_rasters() {
    let finder = FileFinder::new(
        fixture("workdir").join("output"),
        registry().get("output").unwrap(),
        FinderConfig::default(),
    )
    .unwrap();

    let files = finder.list_files(true).unwrap();
    let paths: Vec<_> = files.iter().map(|f| f.relative_path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["topoflux_rfl", "topoflux_subs_h2o", "topoflux_uncert"]
    );
}

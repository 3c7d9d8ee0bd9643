// rundex - lib.rs
//
// Library entry point. rundex is an in-process library: a working
// directory catalog over retrieval-pipeline products and a polling log
// tailer with level and phase-marker classification. Embedding
// applications drive both through plain synchronous calls.

pub mod core;
pub mod util;

pub use crate::core::catalog::{Catalog, CatalogNode};
pub use crate::core::descriptor::TypeRegistry;
pub use crate::core::finder::{FileFinder, FinderConfig};
pub use crate::core::levels::LevelClassifier;
pub use crate::core::markers::MarkerClassifier;
pub use crate::core::model::{ProductValue, Selector};
pub use crate::core::tailer::LogTailer;
pub use crate::util::error::{Result, RundexError};

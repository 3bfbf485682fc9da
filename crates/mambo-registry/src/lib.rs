//! Mambo id registry engine
//!
//! Integrates many biological datasets into one multi-modal network by
//! giving every entity (node) and relationship (edge) a stable integer id:
//!
//! ```text
//!   dataset tables              mapping dictionary
//!         │                             │
//!         ▼                             ▼
//!  ┌──────────────┐   keys    ┌───────────────────┐
//!  │ RecordReader │──────────►│ entity reconciler │──► full mode file (cumulative)
//!  └──────────────┘           │   (mode tables)   │──► per-dataset mode table
//!         │                   └───────────────────┘
//!         │ edges                       │ mambo ids
//!         ▼                             ▼
//!  ┌───────────────────────────────────────────┐
//!  │ relationship reconciler (crossnet tables) │──► full crossnet file
//!  └───────────────────────────────────────────┘──► per-dataset edge table
//! ```
//!
//! ## Persistence
//!
//! - **Append-only**: the full mode and crossnet files only grow; their header
//!   block is written once, when the file is created.
//! - **Regenerated**: per-dataset tables are truncated on every run.
//! - **Atomic rewrite**: the mapped full mode file and merged mapping
//!   dictionaries are written to a temporary sibling and renamed into place.
//!
//! Ids are monotonic: a run continues after the largest id already on disk,
//! and an explicit counter start at or below that id is rejected before any
//! file is touched.

pub mod allocator;
pub mod crossnet;
pub mod entity;
pub mod error;
pub mod format;
pub mod ids;
pub mod mapping;
pub mod merge;
pub mod reader;
pub mod store;
pub mod transform;

pub use allocator::{scan_max_id, IdAllocator};
pub use crossnet::{
    create_crossnet_table, CrossnetRunSummary, CrossnetTableConfig, CrossnetTablePaths,
};
pub use entity::{
    create_mapped_mode_table, create_mode_table, MappedModeTableConfig, ModeRunSummary,
    ModeTableConfig, ModeTablePaths,
};
pub use error::{Endpoint, RegistryError, Result};
pub use ids::{CanonicalId, DatasetId, DatasetIdSet, EdgeId, RegistryId};
pub use mapping::{save_mapping_table, MappingAppender, MappingTable};
pub use merge::{create_mapping_table, MappingMergeConfig, MappingMergeSummary};
pub use reader::{ReaderOptions, Record, RecordReader};
pub use store::{load_mode_index, FullModeRegistry, ModeIndex};
pub use transform::KeyTransform;

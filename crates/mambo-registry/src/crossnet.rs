//! Relationship reconciliation: building crossnet tables.
//!
//! Each input record names a source and a destination entity by native key.
//! Both are resolved through per-dataset mode tables produced earlier, and the
//! edge gets the next mambo edge id.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::allocator::IdAllocator;
use crate::error::{Endpoint, RegistryError, Result};
use crate::format::{generated_on, schema_line};
use crate::ids::{CanonicalId, DatasetId, EdgeId};
use crate::reader::{ReaderOptions, RecordReader};
use crate::store::{load_mode_index, AppendOnlyTable, ModeIndex, RegeneratedTable};
use crate::transform::KeyTransform;

fn default_dst_node_index() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossnetTableConfig {
    pub src_mode_name: String,
    pub dst_mode_name: String,
    pub dataset_name: String,
    /// Dataset contributing the edges.
    pub dataset_id: DatasetId,
    /// Dataset of the source-mode table.
    pub src_dataset_id: DatasetId,
    /// Dataset of the destination-mode table.
    pub dst_dataset_id: DatasetId,
    #[serde(default)]
    pub src_node_index: usize,
    #[serde(default = "default_dst_node_index")]
    pub dst_node_index: usize,
    /// Drop edges whose endpoints do not resolve instead of failing.
    #[serde(default)]
    pub skip_missing_ids: bool,
    #[serde(default)]
    pub src_transform: KeyTransform,
    #[serde(default)]
    pub dst_transform: KeyTransform,
    #[serde(default)]
    pub reader: ReaderOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossnetTablePaths {
    pub input: PathBuf,
    /// Per-dataset mode table of the source mode.
    pub src_mode_file: PathBuf,
    /// Per-dataset mode table of the destination mode.
    pub dst_mode_file: PathBuf,
    pub full_crossnet_file: PathBuf,
    pub db_edge_file: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrossnetRunSummary {
    pub start_id: Option<EdgeId>,
    pub end_id: Option<EdgeId>,
    pub edges_written: usize,
    pub empty_skipped: usize,
    pub missing_skipped: usize,
    /// Source and destination were read from the same mode table.
    pub self_join: bool,
}

/// Both endpoint indexes, sharing one load when the files are the same.
enum EndpointIndexes {
    Shared(ModeIndex),
    Split { src: ModeIndex, dst: ModeIndex },
}

impl EndpointIndexes {
    fn load(src: &Path, dst: &Path, delimiter: char) -> Result<Self> {
        let src_index = load_mode_index(src, delimiter)?;
        if same_file(src, dst)? {
            Ok(EndpointIndexes::Shared(src_index))
        } else {
            Ok(EndpointIndexes::Split {
                src: src_index,
                dst: load_mode_index(dst, delimiter)?,
            })
        }
    }

    fn src(&self) -> &ModeIndex {
        match self {
            EndpointIndexes::Shared(index) => index,
            EndpointIndexes::Split { src, .. } => src,
        }
    }

    fn dst(&self) -> &ModeIndex {
        match self {
            EndpointIndexes::Shared(index) => index,
            EndpointIndexes::Split { dst, .. } => dst,
        }
    }
}

fn same_file(a: &Path, b: &Path) -> Result<bool> {
    if a == b {
        return Ok(true);
    }
    let a = fs::canonicalize(a).map_err(|e| RegistryError::io(a, e))?;
    let b = fs::canonicalize(b).map_err(|e| RegistryError::io(b, e))?;
    Ok(a == b)
}

fn resolve(index: &HashMap<String, CanonicalId>, key: &str) -> Option<CanonicalId> {
    index.get(key).copied()
}

/// Build the crossnet tables for one edge dataset.
///
/// Appends `edge_id, dataset_id, src_id, dst_id` rows to the full crossnet
/// file and rewrites the per-dataset edge table. `counter_start` must exceed
/// every edge id already in the full crossnet file.
pub fn create_crossnet_table(
    config: &CrossnetTableConfig,
    paths: &CrossnetTablePaths,
    counter_start: Option<EdgeId>,
) -> Result<CrossnetRunSummary> {
    let delimiter = config.reader.delimiter;
    let indexes = EndpointIndexes::load(&paths.src_mode_file, &paths.dst_mode_file, delimiter)?;
    let mut alloc: IdAllocator<EdgeId> =
        IdAllocator::from_registry(&paths.full_crossnet_file, delimiter, counter_start)?;
    let records = RecordReader::open(&paths.input, config.reader)?;

    let mut summary = CrossnetRunSummary {
        start_id: Some(alloc.peek()),
        self_join: matches!(indexes, EndpointIndexes::Shared(_)),
        ..CrossnetRunSummary::default()
    };
    tracing::info!(
        src = %config.src_mode_name,
        dst = %config.dst_mode_name,
        dataset = %config.dataset_name,
        start = %alloc.peek(),
        self_join = summary.self_join,
        "creating crossnet table"
    );

    let full_header = vec![
        format!(
            "# Full crossnet file for {} to {}",
            config.src_mode_name, config.dst_mode_name
        ),
        format!("# File generated on: {}", generated_on()),
        format!("# mambo_eid{delimiter}dataset_id{delimiter}src_mambo_nid{delimiter}dst_mambo_nid"),
    ];
    let mut full = AppendOnlyTable::open(&paths.full_crossnet_file, delimiter, &full_header)?;
    let mut db = RegeneratedTable::create(
        &paths.db_edge_file,
        delimiter,
        &[
            format!("# Crossnet table for dataset: {}", config.dataset_name),
            format!("# File generated on: {}", generated_on()),
        ],
    )?;

    let keys = [config.src_node_index, config.dst_node_index];
    for record in records {
        let record = record?;
        db.write_schema_once(|| {
            schema_line(
                delimiter,
                &["mambo_eid", "src_dataset_id", "dst_dataset_id"],
                record.len(),
                &keys,
            )
        })?;

        let src_key = config.src_transform.apply(record.field(config.src_node_index)?);
        let dst_key = config.dst_transform.apply(record.field(config.dst_node_index)?);
        if src_key.is_empty() || dst_key.is_empty() {
            summary.empty_skipped += 1;
            continue;
        }

        let src_id = resolve(indexes.src(), &src_key);
        let dst_id = resolve(indexes.dst(), &dst_key);
        let (src_id, dst_id) = match (src_id, dst_id) {
            (Some(src), Some(dst)) => (src, dst),
            _ if config.skip_missing_ids => {
                tracing::debug!(
                    src = %src_key,
                    dst = %dst_key,
                    line = record.line,
                    "unresolved edge skipped"
                );
                summary.missing_skipped += 1;
                continue;
            }
            (None, _) => {
                return Err(RegistryError::UnresolvedReference {
                    path: record.path().to_path_buf(),
                    line: record.line,
                    side: Endpoint::Source,
                    key: src_key.into_owned(),
                })
            }
            (_, None) => {
                return Err(RegistryError::UnresolvedReference {
                    path: record.path().to_path_buf(),
                    line: record.line,
                    side: Endpoint::Destination,
                    key: dst_key.into_owned(),
                })
            }
        };

        let edge = alloc.mint()?;
        full.append([
            edge.to_string(),
            config.dataset_id.to_string(),
            src_id.to_string(),
            dst_id.to_string(),
        ])?;
        db.write_row(
            [
                edge.to_string(),
                config.src_dataset_id.to_string(),
                config.dst_dataset_id.to_string(),
            ]
            .into_iter()
            .chain(record.attributes(&keys).map(str::to_string)),
        )?;
        summary.edges_written += 1;
    }

    full.finish()?;
    db.finish()?;

    summary.end_id = Some(alloc.peek());
    tracing::info!(
        edges = summary.edges_written,
        missing_skipped = summary.missing_skipped,
        end = %alloc.peek(),
        "crossnet table done"
    );
    Ok(summary)
}

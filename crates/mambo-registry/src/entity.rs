//! Entity reconciliation: building mode tables.
//!
//! Two variants:
//!
//! - [`create_mode_table`]: every unseen key in the input gets a fresh mambo id,
//!   appended to the cumulative full mode registry.
//! - [`create_mapped_mode_table`]: keys are first resolved through a mapping
//!   dictionary so the same entity seen by different datasets shares one id.
//!   The full mode registry is merged (dataset id sets unioned) and rewritten.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::allocator::IdAllocator;
use crate::error::{RegistryError, Result};
use crate::format::{generated_on, schema_line};
use crate::ids::{CanonicalId, DatasetId};
use crate::mapping::{MappingAppender, MappingTable};
use crate::reader::{ReaderOptions, RecordReader};
use crate::store::{AppendOnlyTable, FullModeRegistry, RegeneratedTable};
use crate::transform::qualified_tail;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeTableConfig {
    /// Mode name, e.g. `gene`.
    pub mode_name: String,
    /// Source dataset name, e.g. `GO`.
    pub dataset_name: String,
    pub dataset_id: DatasetId,
    /// Column holding the native key.
    #[serde(default)]
    pub node_index: usize,
    #[serde(default)]
    pub reader: ReaderOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappedModeTableConfig {
    #[serde(flatten)]
    pub mode: ModeTableConfig,
    /// File column of the mapping dictionary holding this dataset's naming
    /// scheme (column 0 is the mambo id).
    pub map_index: usize,
    /// Keys missing from the dictionary still get a mambo id, but the
    /// dictionary is not extended with them.
    #[serde(default)]
    pub skip_missing_ids: bool,
    /// Keys are qualified (`9606.ENSP...`); match on the sub-token.
    #[serde(default)]
    pub qualified_keys: bool,
}

/// Files touched by a mode run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeTablePaths {
    pub input: PathBuf,
    pub full_mode_file: PathBuf,
    pub db_node_file: PathBuf,
}

/// Outcome of one mode run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModeRunSummary {
    /// Next unused mambo id when the run started.
    pub start_id: Option<CanonicalId>,
    /// Next unused mambo id when the run ended.
    pub end_id: Option<CanonicalId>,
    pub rows_written: usize,
    pub minted: usize,
    /// Rows resolved through the mapping dictionary.
    pub reused: usize,
    pub duplicates_skipped: usize,
    pub empty_skipped: usize,
    /// Keys minted without being added to the mapping dictionary.
    pub unmapped: usize,
    pub mapping_rows_appended: usize,
    /// Full-registry ids kept from earlier runs without being touched.
    pub carried_forward: usize,
}

fn full_mode_header(mode_name: &str, delimiter: char) -> Vec<String> {
    vec![
        format!("# Full mode table for {mode_name}"),
        format!("# File generated on: {}", generated_on()),
        format!("# mambo_nid{delimiter}dataset_ids"),
    ]
}

fn dataset_mode_header(dataset_name: &str) -> Vec<String> {
    vec![
        format!("# Mode table for dataset: {dataset_name}"),
        format!("# File generated on: {}", generated_on()),
    ]
}

/// Outcome of the per-run de-dup check for one key.
enum KeyCheck {
    Fresh,
    Empty,
    Duplicate,
}

fn check_key(seen: &HashSet<String>, key: &str) -> KeyCheck {
    if key.is_empty() {
        KeyCheck::Empty
    } else if seen.contains(key) {
        KeyCheck::Duplicate
    } else {
        KeyCheck::Fresh
    }
}

// ============================================================================
// Unmapped mode tables
// ============================================================================

/// Assign a fresh mambo id to every distinct key of `paths.input`.
///
/// `counter_start` overrides where allocation begins; it must exceed every
/// id already in the full mode file. Appends `id<TAB>dataset_id` rows to the
/// full mode file and rewrites the per-dataset table.
pub fn create_mode_table(
    config: &ModeTableConfig,
    paths: &ModeTablePaths,
    counter_start: Option<CanonicalId>,
) -> Result<ModeRunSummary> {
    let delimiter = config.reader.delimiter;
    let mut alloc = IdAllocator::from_registry(&paths.full_mode_file, delimiter, counter_start)?;
    let records = RecordReader::open(&paths.input, config.reader)?;

    tracing::info!(
        mode = %config.mode_name,
        dataset = %config.dataset_name,
        start = %alloc.peek(),
        "creating mode table"
    );

    let mut full = AppendOnlyTable::open(
        &paths.full_mode_file,
        delimiter,
        &full_mode_header(&config.mode_name, delimiter),
    )?;
    let mut db = RegeneratedTable::create(
        &paths.db_node_file,
        delimiter,
        &dataset_mode_header(&config.dataset_name),
    )?;

    let mut summary = ModeRunSummary {
        start_id: Some(alloc.peek()),
        ..ModeRunSummary::default()
    };
    let keys = [config.node_index];
    let mut seen: HashSet<String> = HashSet::new();

    for record in records {
        let record = record?;
        db.write_schema_once(|| {
            schema_line(delimiter, &["mambo_nid", "dataset_nid"], record.len(), &keys)
        })?;

        let node_id = record.field(config.node_index)?;
        match check_key(&seen, node_id) {
            KeyCheck::Empty => {
                summary.empty_skipped += 1;
                continue;
            }
            KeyCheck::Duplicate => {
                tracing::debug!(key = node_id, line = record.line, "duplicate key skipped");
                summary.duplicates_skipped += 1;
                continue;
            }
            KeyCheck::Fresh => {}
        }

        let id = alloc.mint()?;
        full.append([id.to_string(), config.dataset_id.to_string()])?;
        db.write_row(
            [id.to_string(), node_id.to_string()]
                .into_iter()
                .chain(record.attributes(&keys).map(str::to_string)),
        )?;
        seen.insert(node_id.to_string());
        summary.rows_written += 1;
    }

    full.finish()?;
    db.finish()?;

    summary.minted = alloc.minted() as usize;
    summary.end_id = Some(alloc.peek());
    tracing::info!(
        mode = %config.mode_name,
        end = %alloc.peek(),
        rows = summary.rows_written,
        "mode table done"
    );
    Ok(summary)
}

// ============================================================================
// Mapped mode tables
// ============================================================================

/// Resolve every distinct key of `paths.input` through `mapping_file`.
///
/// Known keys reuse their dictionary id; unknown keys get a new id after the
/// largest id of both the dictionary and the full mode file, and are appended
/// to the dictionary unless `skip_missing_ids` is set. The dataset id is merged
/// into each resolved id's entry, and every earlier entry is carried forward.
pub fn create_mapped_mode_table(
    config: &MappedModeTableConfig,
    paths: &ModeTablePaths,
    mapping_file: &std::path::Path,
) -> Result<ModeRunSummary> {
    let mode = &config.mode;
    let delimiter = mode.reader.delimiter;
    if config.map_index == 0 {
        return Err(RegistryError::InvalidConfig(
            "map_index 0 is the mambo id column of the mapping file".to_string(),
        ));
    }
    let scheme = config.map_index - 1;

    let mut registry = FullModeRegistry::load(&paths.full_mode_file, delimiter)?;
    let mapping = MappingTable::load(mapping_file, delimiter)?;
    let mut lookup = mapping.index(scheme);
    let mut alloc = IdAllocator::after(mapping.max_id().max(registry.max_id()));
    let records = RecordReader::open(&paths.input, mode.reader)?;

    tracing::info!(
        mode = %mode.mode_name,
        dataset = %mode.dataset_name,
        mapping = %mapping_file.display(),
        known_keys = lookup.len(),
        start = %alloc.peek(),
        "creating mapped mode table"
    );

    let mut db = RegeneratedTable::create(
        &paths.db_node_file,
        delimiter,
        &dataset_mode_header(&mode.dataset_name),
    )?;
    let mut appender = if config.skip_missing_ids {
        None
    } else {
        Some(MappingAppender::open(mapping_file, delimiter, mapping.width())?)
    };

    let mut summary = ModeRunSummary {
        start_id: Some(alloc.peek()),
        ..ModeRunSummary::default()
    };
    let previously_known = registry.len();
    let keys = [mode.node_index];
    let mut seen: HashSet<String> = HashSet::new();
    let mut touched: HashSet<CanonicalId> = HashSet::new();

    for record in records {
        let record = record?;
        db.write_schema_once(|| {
            schema_line(delimiter, &["mambo_nid", "dataset_nid"], record.len(), &keys)
        })?;

        let raw = record.field(mode.node_index)?;
        let node_id = if config.qualified_keys {
            qualified_tail(raw)
        } else {
            raw
        };
        match check_key(&seen, node_id) {
            KeyCheck::Empty => {
                summary.empty_skipped += 1;
                continue;
            }
            KeyCheck::Duplicate => {
                summary.duplicates_skipped += 1;
                continue;
            }
            KeyCheck::Fresh => {}
        }

        let id = match lookup.get(node_id) {
            Some(id) => {
                summary.reused += 1;
                *id
            }
            None => {
                let id = alloc.mint()?;
                match appender.as_mut() {
                    Some(appender) => {
                        appender.append(id, scheme, node_id)?;
                        lookup.insert(node_id.to_string(), id);
                    }
                    None => {
                        tracing::debug!(key = node_id, id = %id, "key missing from mapping");
                        summary.unmapped += 1;
                    }
                }
                id
            }
        };

        registry.merge(id, mode.dataset_id);
        touched.insert(id);
        db.write_row(
            [id.to_string(), raw.to_string()]
                .into_iter()
                .chain(record.attributes(&keys).map(str::to_string)),
        )?;
        seen.insert(node_id.to_string());
        summary.rows_written += 1;
    }

    if let Some(appender) = appender {
        summary.mapping_rows_appended = appender.appended();
        appender.finish()?;
    }
    db.finish()?;
    registry.save(
        &paths.full_mode_file,
        delimiter,
        &full_mode_header(&mode.mode_name, delimiter),
    )?;

    summary.minted = alloc.minted() as usize;
    summary.end_id = Some(alloc.peek());
    summary.carried_forward = registry
        .iter()
        .filter(|(id, _)| !touched.contains(id))
        .count();
    tracing::info!(
        mode = %mode.mode_name,
        rows = summary.rows_written,
        minted = summary.minted,
        reused = summary.reused,
        carried_forward = summary.carried_forward,
        previously_known,
        "mapped mode table done"
    );
    Ok(summary)
}

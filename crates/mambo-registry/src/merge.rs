//! Mapping-table merger: unify two naming schemes into a mapping dictionary.
//!
//! Conflict policy is prefer-existing: a non-sentinel value already in the
//! dictionary is never overwritten. Every such case is logged and counted.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::allocator::IdAllocator;
use crate::error::{RegistryError, Result};
use crate::format::{parse_optional, DEFAULT_DELIMITER};
use crate::ids::CanonicalId;
use crate::mapping::{save_mapping_table, MappingTable};
use crate::reader::{ReaderOptions, RecordReader};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingMergeConfig {
    /// Column of the source file holding the scheme-A key.
    pub map_index1: usize,
    /// Column of the source file holding the scheme-B key.
    pub map_index2: usize,
    /// Scheme column (0-based, after the id) that receives scheme-A keys.
    pub output_index1: usize,
    /// Scheme column that receives scheme-B keys.
    pub output_index2: usize,
    pub output_title1: Option<String>,
    pub output_title2: Option<String>,
    pub delimiter: char,
}

impl Default for MappingMergeConfig {
    fn default() -> Self {
        Self {
            map_index1: 0,
            map_index2: 1,
            output_index1: 0,
            output_index2: 1,
            output_title1: None,
            output_title2: None,
            delimiter: DEFAULT_DELIMITER,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MappingMergeSummary {
    /// Distinct scheme-A keys in the source.
    pub pairs: usize,
    pub created: usize,
    /// Existing rows whose scheme-B column was empty and got filled.
    pub filled: usize,
    /// Existing rows that already held the same scheme-B key.
    pub unchanged: usize,
    /// Scheme-B keys not written: the row already holds a different key, or
    /// another id already holds this one.
    pub conflicts: usize,
    pub carried_forward: usize,
}

/// Read `(scheme_a, scheme_b)` pairs, dropping pairs with a sentinel side.
/// Pairs keep first-appearance order; a repeated scheme-A key takes its last
/// scheme-B value.
fn read_pairs(source: &Path, config: &MappingMergeConfig) -> Result<Vec<(String, String)>> {
    let options = ReaderOptions {
        delimiter: config.delimiter,
        skip_header_row: false,
    };
    let mut order: Vec<String> = Vec::new();
    let mut values: HashMap<String, String> = HashMap::new();
    for record in RecordReader::open(source, options)? {
        let record = record?;
        let (Some(a), Some(b)) = (
            parse_optional(record.field(config.map_index1)?),
            parse_optional(record.field(config.map_index2)?),
        ) else {
            continue;
        };
        if !values.contains_key(&a) {
            order.push(a.clone());
        }
        values.insert(a, b);
    }
    Ok(order
        .into_iter()
        .map(|a| {
            let b = values.remove(&a).unwrap_or_default();
            (a, b)
        })
        .collect())
}

fn merged_titles(existing: &[String], width: usize, config: &MappingMergeConfig) -> Vec<String> {
    let mut titles: Vec<String> = (0..width)
        .map(|i| {
            existing
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("Index{}", i + 1))
        })
        .collect();
    for (index, title) in [
        (config.output_index1, &config.output_title1),
        (config.output_index2, &config.output_title2),
    ] {
        if let Some(title) = title {
            titles[index] = title.clone();
        }
    }
    titles
}

fn warn_held_elsewhere(id: CanonicalId, a: &str, b: &str, holder: CanonicalId) {
    tracing::warn!(
        id = %id,
        key = %a,
        incoming = %b,
        holder = %holder,
        "mapping conflict, key already held by another id"
    );
}

/// Merge the pairs of `source` into the dictionary at `output`.
///
/// `output` may not exist yet. Rows are keyed by scheme-A key in column
/// `output_index1`; unknown keys get the next mambo id after the dictionary's
/// largest. Rows not mentioned by `source` are kept, widened with sentinels
/// when a new scheme column appears.
pub fn create_mapping_table(
    source: &Path,
    output: &Path,
    config: &MappingMergeConfig,
) -> Result<MappingMergeSummary> {
    if config.output_index1 == config.output_index2 {
        return Err(RegistryError::InvalidConfig(format!(
            "output columns must differ (both are {})",
            config.output_index1
        )));
    }

    let pairs = read_pairs(source, config)?;
    let existing = MappingTable::load_optional(output, config.delimiter)?.unwrap_or_default();
    let width = existing
        .width()
        .max(config.output_index1 + 1)
        .max(config.output_index2 + 1);
    let titles = merged_titles(existing.titles(), width, config);
    let by_scheme_a = existing.index(config.output_index1);
    let mut by_scheme_b = existing.index(config.output_index2);
    let mut alloc: IdAllocator<CanonicalId> = IdAllocator::after(existing.max_id());
    let (mut rows, _) = existing.into_parts();

    tracing::info!(
        source = %source.display(),
        output = %output.display(),
        pairs = pairs.len(),
        existing_rows = rows.len(),
        "merging mapping table"
    );

    let mut summary = MappingMergeSummary {
        pairs: pairs.len(),
        ..MappingMergeSummary::default()
    };
    let mut touched: HashSet<CanonicalId> = HashSet::new();
    let mut created: BTreeMap<CanonicalId, Vec<Option<String>>> = BTreeMap::new();

    for (a, b) in pairs {
        let holder = by_scheme_b.get(&b).copied();
        match by_scheme_a.get(&a) {
            Some(&id) => {
                let row = rows.entry(id).or_default();
                row.resize(width, None);
                match &row[config.output_index2] {
                    Some(current) if *current == b => summary.unchanged += 1,
                    Some(current) => {
                        tracing::warn!(
                            id = %id,
                            key = %a,
                            existing = %current,
                            incoming = %b,
                            "mapping conflict, keeping existing value"
                        );
                        summary.conflicts += 1;
                    }
                    None => match holder {
                        Some(other) if other != id => {
                            warn_held_elsewhere(id, &a, &b, other);
                            summary.conflicts += 1;
                        }
                        _ => {
                            row[config.output_index2] = Some(b.clone());
                            by_scheme_b.insert(b, id);
                            summary.filled += 1;
                        }
                    },
                }
                touched.insert(id);
            }
            None => {
                let id = alloc.mint()?;
                let mut row = vec![None; width];
                row[config.output_index1] = Some(a.clone());
                match holder {
                    Some(other) => {
                        warn_held_elsewhere(id, &a, &b, other);
                        summary.conflicts += 1;
                    }
                    None => {
                        row[config.output_index2] = Some(b.clone());
                        by_scheme_b.insert(b, id);
                    }
                }
                created.insert(id, row);
                summary.created += 1;
            }
        }
    }

    for (id, row) in rows.iter_mut() {
        row.resize(width, None);
        if !touched.contains(id) {
            summary.carried_forward += 1;
        }
    }
    rows.extend(created);

    save_mapping_table(
        output,
        config.delimiter,
        &titles,
        rows.iter().map(|(id, row)| (*id, row.as_slice())),
    )?;

    tracing::info!(
        created = summary.created,
        filled = summary.filled,
        conflicts = summary.conflicts,
        carried_forward = summary.carried_forward,
        "mapping table merged"
    );
    Ok(summary)
}

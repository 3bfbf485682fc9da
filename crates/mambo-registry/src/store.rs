//! Registry store: loading and persisting table files.
//!
//! Three write strategies, one per file role:
//!
//! - [`AppendOnlyTable`]: cumulative files (full mode registry of unmapped runs,
//!   full crossnet registry). Opened in append mode and never truncated, so an
//!   aborted run leaves a valid prefix.
//! - [`RegeneratedTable`]: per-dataset tables, truncated and rewritten each run.
//! - [`rewrite_atomically`]: files that must be rewritten whole but may not be
//!   lost (merged full mode registry, mapping dictionaries). Written to a
//!   sibling temp file, then renamed over the target.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::allocator::parse_id_column;
use crate::error::{RegistryError, Result};
use crate::format::{is_comment, split_then_strip};
use crate::ids::{CanonicalId, DatasetId, DatasetIdSet};

// ============================================================================
// Row writing
// ============================================================================

fn write_line<W: Write>(out: &mut W, path: &Path, line: &str) -> Result<()> {
    writeln!(out, "{line}").map_err(|e| RegistryError::io(path, e))
}

fn write_fields<W, T>(out: &mut W, path: &Path, delimiter: char, fields: T) -> Result<()>
where
    W: Write,
    T: IntoIterator,
    T::Item: Display,
{
    let mut line = String::new();
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            line.push(delimiter);
        }
        line.push_str(&field.to_string());
    }
    write_line(out, path, &line)
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| RegistryError::io(parent, e))
        }
        _ => Ok(()),
    }
}

/// Cumulative table opened in append mode.
pub struct AppendOnlyTable {
    out: BufWriter<File>,
    path: PathBuf,
    delimiter: char,
    fresh: bool,
}

impl AppendOnlyTable {
    /// Open `path` for appending. `header` is written only if the file is new
    /// or empty, so repeated runs never duplicate it.
    pub fn open(path: &Path, delimiter: char, header: &[String]) -> Result<Self> {
        ensure_parent(path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| RegistryError::io(path, e))?;
        let fresh = file.metadata().map_err(|e| RegistryError::io(path, e))?.len() == 0;

        let mut table = Self {
            out: BufWriter::new(file),
            path: path.to_path_buf(),
            delimiter,
            fresh,
        };
        if fresh {
            for line in header {
                write_line(&mut table.out, &table.path, line)?;
            }
        }
        Ok(table)
    }

    /// Whether the file was empty when opened.
    pub fn was_fresh(&self) -> bool {
        self.fresh
    }

    pub fn append<T>(&mut self, fields: T) -> Result<()>
    where
        T: IntoIterator,
        T::Item: Display,
    {
        write_fields(&mut self.out, &self.path, self.delimiter, fields)
    }

    pub fn finish(mut self) -> Result<()> {
        self.out.flush().map_err(|e| RegistryError::io(&self.path, e))
    }
}

/// Per-dataset table, truncated on open.
///
/// The schema line depends on the first data record, so it is written lazily
/// by [`RegeneratedTable::write_schema_once`].
pub struct RegeneratedTable {
    out: BufWriter<File>,
    path: PathBuf,
    delimiter: char,
    schema_written: bool,
}

impl RegeneratedTable {
    pub fn create(path: &Path, delimiter: char, header: &[String]) -> Result<Self> {
        ensure_parent(path)?;
        let file = File::create(path).map_err(|e| RegistryError::io(path, e))?;
        let mut table = Self {
            out: BufWriter::new(file),
            path: path.to_path_buf(),
            delimiter,
            schema_written: false,
        };
        for line in header {
            write_line(&mut table.out, &table.path, line)?;
        }
        Ok(table)
    }

    pub fn write_schema_once(&mut self, schema: impl FnOnce() -> String) -> Result<()> {
        if !self.schema_written {
            write_line(&mut self.out, &self.path, &schema())?;
            self.schema_written = true;
        }
        Ok(())
    }

    pub fn write_row<T>(&mut self, fields: T) -> Result<()>
    where
        T: IntoIterator,
        T::Item: Display,
    {
        write_fields(&mut self.out, &self.path, self.delimiter, fields)
    }

    pub fn finish(mut self) -> Result<()> {
        self.out.flush().map_err(|e| RegistryError::io(&self.path, e))
    }
}

/// Replace `path` with whatever `write` produces, via a temp file and rename.
pub fn rewrite_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
{
    ensure_parent(path)?;
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let file = File::create(&tmp).map_err(|e| RegistryError::io(&tmp, e))?;
    let mut out = BufWriter::new(file);
    write(&mut out).map_err(|e| RegistryError::io(&tmp, e))?;
    out.flush().map_err(|e| RegistryError::io(&tmp, e))?;
    drop(out);
    fs::rename(&tmp, path).map_err(|e| RegistryError::io(path, e))
}

/// Open an existing file for line-by-line reading; `Ok(None)` if absent.
pub(crate) fn open_optional(path: &Path) -> Result<Option<BufReader<File>>> {
    match File::open(path) {
        Ok(file) => Ok(Some(BufReader::new(file))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RegistryError::io(path, e)),
    }
}

// ============================================================================
// Full mode registry
// ============================================================================

/// In-memory view of a full mode registry: mambo id → contributing datasets.
#[derive(Debug, Clone, Default)]
pub struct FullModeRegistry {
    entries: BTreeMap<CanonicalId, DatasetIdSet>,
}

impl FullModeRegistry {
    /// Load `path`; a missing file is an empty registry.
    ///
    /// An id listed on several lines (as unmapped runs append them) collapses
    /// into one entry holding the union of its dataset ids.
    pub fn load(path: &Path, delimiter: char) -> Result<Self> {
        let mut registry = Self::default();
        let Some(reader) = open_optional(path)? else {
            return Ok(registry);
        };

        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| RegistryError::io(path, e))?;
            if is_comment(&line) {
                continue;
            }
            let line_no = i + 1;
            let id: CanonicalId = parse_id_column(&line, delimiter, path, line_no)?;
            let fields = split_then_strip(&line, delimiter);
            let datasets = fields.get(1).ok_or_else(|| RegistryError::MalformedRow {
                path: path.to_path_buf(),
                line: line_no,
                index: 1,
                columns: fields.len(),
            })?;
            let datasets: DatasetIdSet =
                datasets.parse().map_err(|_| RegistryError::InvalidId {
                    path: path.to_path_buf(),
                    line: line_no,
                    value: datasets.clone(),
                })?;
            let entry = registry.entries.entry(id).or_default();
            for dataset in datasets.iter() {
                entry.insert(dataset);
            }
        }
        Ok(registry)
    }

    /// Record that `dataset` contributed to `id`. Returns `true` if `id` is new.
    pub fn merge(&mut self, id: CanonicalId, dataset: DatasetId) -> bool {
        match self.entries.get_mut(&id) {
            Some(datasets) => {
                datasets.insert(dataset);
                false
            }
            None => {
                self.entries.insert(id, DatasetIdSet::single(dataset));
                true
            }
        }
    }

    pub fn get(&self, id: CanonicalId) -> Option<&DatasetIdSet> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: CanonicalId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn max_id(&self) -> Option<CanonicalId> {
        self.entries.keys().next_back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalId, &DatasetIdSet)> {
        self.entries.iter().map(|(id, set)| (*id, set))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrite the whole registry, one line per id in ascending order.
    pub fn save(&self, path: &Path, delimiter: char, header: &[String]) -> Result<()> {
        rewrite_atomically(path, |out| {
            for line in header {
                writeln!(out, "{line}")?;
            }
            for (id, datasets) in &self.entries {
                writeln!(out, "{id}{delimiter}{datasets}")?;
            }
            Ok(())
        })
    }
}

// ============================================================================
// Per-dataset mode tables (read side)
// ============================================================================

/// Native key → mambo id, as implied by a per-dataset mode table.
pub type ModeIndex = HashMap<String, CanonicalId>;

/// Read a per-dataset mode table (`mambo_nid<TAB>dataset_nid<TAB>...`) into
/// its reverse index. A key listed twice resolves to its last row.
pub fn load_mode_index(path: &Path, delimiter: char) -> Result<ModeIndex> {
    let file = File::open(path).map_err(|e| RegistryError::io(path, e))?;
    let mut index = ModeIndex::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| RegistryError::io(path, e))?;
        if is_comment(&line) {
            continue;
        }
        let line_no = i + 1;
        let id: CanonicalId = parse_id_column(&line, delimiter, path, line_no)?;
        let fields = split_then_strip(&line, delimiter);
        let key = fields.get(1).ok_or_else(|| RegistryError::MalformedRow {
            path: path.to_path_buf(),
            line: line_no,
            index: 1,
            columns: fields.len(),
        })?;
        index.insert(key.clone(), id);
    }
    Ok(index)
}

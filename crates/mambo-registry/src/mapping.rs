//! Mapping dictionaries: mambo id ↔ one key per naming scheme.
//!
//! File layout is `mambo_id<TAB>scheme_0<TAB>scheme_1...`, with `None` for
//! unknown keys. Scheme columns are addressed either by their position among
//! scheme columns (`scheme`, 0-based) or by file column (`scheme + 1`).

use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::allocator::parse_id_column;
use crate::error::{RegistryError, Result};
use crate::format::{format_optional, is_comment, parse_optional, split_then_strip};
use crate::ids::CanonicalId;
use crate::store::{open_optional, rewrite_atomically};

#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    rows: BTreeMap<CanonicalId, Vec<Option<String>>>,
    /// Scheme titles from the last comment line, without the id column.
    titles: Vec<String>,
    width: usize,
}

impl MappingTable {
    /// Load a mapping file that must exist.
    pub fn load(path: &Path, delimiter: char) -> Result<Self> {
        Self::load_optional(path, delimiter)?.ok_or_else(|| RegistryError::FileMissing {
            path: path.to_path_buf(),
        })
    }

    /// Load a mapping file, or `None` if it does not exist yet.
    pub fn load_optional(path: &Path, delimiter: char) -> Result<Option<Self>> {
        let Some(reader) = open_optional(path)? else {
            return Ok(None);
        };

        let mut table = Self::default();
        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| RegistryError::io(path, e))?;
            if is_comment(&line) {
                if let Some(title) = line.strip_prefix('#') {
                    if !title.trim().is_empty() {
                        table.titles = split_then_strip(title, delimiter)
                            .into_iter()
                            .skip(1)
                            .collect();
                    }
                }
                continue;
            }
            let id: CanonicalId = parse_id_column(&line, delimiter, path, i + 1)?;
            let keys: Vec<Option<String>> = split_then_strip(&line, delimiter)
                .iter()
                .skip(1)
                .map(|f| parse_optional(f))
                .collect();
            table.width = table.width.max(keys.len());
            table.rows.insert(id, keys);
        }
        Ok(Some(table))
    }

    /// Number of scheme columns (widest row).
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    pub fn max_id(&self) -> Option<CanonicalId> {
        self.rows.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, id: CanonicalId) -> Option<&[Option<String>]> {
        self.rows.get(&id).map(Vec::as_slice)
    }

    pub fn rows(&self) -> impl Iterator<Item = (CanonicalId, &[Option<String>])> {
        self.rows.iter().map(|(id, keys)| (*id, keys.as_slice()))
    }

    /// Key → id for one scheme column. Later rows win on a repeated key.
    pub fn index(&self, scheme: usize) -> HashMap<String, CanonicalId> {
        self.rows
            .iter()
            .filter_map(|(id, keys)| {
                keys.get(scheme)
                    .and_then(|k| k.clone())
                    .map(|k| (k, *id))
            })
            .collect()
    }

    pub(crate) fn into_parts(self) -> (BTreeMap<CanonicalId, Vec<Option<String>>>, Vec<String>) {
        (self.rows, self.titles)
    }
}

/// Write a full mapping table: `#Mambo_id` title line, then rows by id.
pub fn save_mapping_table<'a, I>(
    path: &Path,
    delimiter: char,
    titles: &[String],
    rows: I,
) -> Result<()>
where
    I: IntoIterator<Item = (CanonicalId, &'a [Option<String>])>,
{
    rewrite_atomically(path, |out| {
        let mut title_line = String::from("#Mambo_id");
        for title in titles {
            title_line.push(delimiter);
            title_line.push_str(title);
        }
        writeln!(out, "{title_line}")?;
        for (id, keys) in rows {
            write!(out, "{id}")?;
            for key in keys {
                write!(out, "{delimiter}{}", format_optional(key.as_deref()))?;
            }
            writeln!(out)?;
        }
        Ok(())
    })
}

/// Appends newly discovered keys to an existing mapping file.
pub struct MappingAppender {
    out: BufWriter<File>,
    path: PathBuf,
    delimiter: char,
    width: usize,
    appended: usize,
}

impl MappingAppender {
    /// `width` is the number of scheme columns each new row carries.
    pub fn open(path: &Path, delimiter: char, width: usize) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(path)
            .map_err(|e| RegistryError::io(path, e))?;
        let unterminated =
            ends_without_newline(&mut file).map_err(|e| RegistryError::io(path, e))?;
        let mut out = BufWriter::new(file);
        if unterminated {
            writeln!(out).map_err(|e| RegistryError::io(path, e))?;
        }
        Ok(Self {
            out,
            path: path.to_path_buf(),
            delimiter,
            width,
            appended: 0,
        })
    }

    /// Append `id` with `key` in `scheme` and sentinels elsewhere.
    pub fn append(&mut self, id: CanonicalId, scheme: usize, key: &str) -> Result<()> {
        let width = self.width.max(scheme + 1);
        let mut line = id.to_string();
        for column in 0..width {
            line.push(self.delimiter);
            line.push_str(if column == scheme {
                key
            } else {
                format_optional(None)
            });
        }
        writeln!(self.out, "{line}").map_err(|e| RegistryError::io(&self.path, e))?;
        self.appended += 1;
        Ok(())
    }

    pub fn appended(&self) -> usize {
        self.appended
    }

    pub fn finish(mut self) -> Result<()> {
        self.out.flush().map_err(|e| RegistryError::io(&self.path, e))
    }
}

/// Whether a non-empty file is missing its final line break.
fn ends_without_newline(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const UNIPROT_ENSEMBL: &str = "#Mambo_id\tUniProt\tEnsembl\n\
        0\tP04637\tENSP00000269305\n\
        1\tP38398\tNone\n\
        2\tNULL\tENSP00000418960\n";

    #[test]
    fn test_load_reads_titles_sentinels_and_max() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.tsv");
        fs::write(&path, UNIPROT_ENSEMBL).unwrap();

        let table = MappingTable::load(&path, '\t').unwrap();
        assert_eq!(table.titles(), ["UniProt", "Ensembl"]);
        assert_eq!(table.width(), 2);
        assert_eq!(table.max_id(), Some(CanonicalId(2)));
        assert_eq!(table.row(CanonicalId(1)).unwrap()[1], None);
        assert_eq!(table.row(CanonicalId(2)).unwrap()[0], None);

        let ensembl = table.index(1);
        assert_eq!(ensembl.len(), 2);
        assert_eq!(ensembl["ENSP00000418960"], CanonicalId(2));
    }

    #[test]
    fn test_load_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = MappingTable::load(&dir.path().join("none.tsv"), '\t').unwrap_err();
        assert!(matches!(err, RegistryError::FileMissing { .. }));
        assert!(MappingTable::load_optional(&dir.path().join("none.tsv"), '\t')
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_appender_fills_other_columns_with_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.tsv");
        fs::write(&path, UNIPROT_ENSEMBL).unwrap();

        let mut appender = MappingAppender::open(&path, '\t', 2).unwrap();
        appender.append(CanonicalId(3), 1, "ENSP00000000001").unwrap();
        assert_eq!(appender.appended(), 1);
        appender.finish().unwrap();

        let table = MappingTable::load(&path, '\t').unwrap();
        assert_eq!(
            table.row(CanonicalId(3)).unwrap(),
            [None, Some("ENSP00000000001".to_string())]
        );
    }

    #[test]
    fn test_appender_starts_a_new_line_after_unterminated_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.tsv");
        fs::write(&path, "#Mambo_id\tUniProt\tEnsembl\n0\tP04637\tENSP1").unwrap();

        let mut appender = MappingAppender::open(&path, '\t', 2).unwrap();
        appender.append(CanonicalId(1), 0, "Q00001").unwrap();
        appender.finish().unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "#Mambo_id\tUniProt\tEnsembl\n0\tP04637\tENSP1\n1\tQ00001\tNone\n"
        );
    }

    #[test]
    fn test_save_writes_sentinels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.tsv");
        let rows = vec![(CanonicalId(0), vec![Some("A".to_string()), None])];
        save_mapping_table(
            &path,
            '\t',
            &["Index1".to_string(), "Index2".to_string()],
            rows.iter().map(|(id, keys)| (*id, keys.as_slice())),
        )
        .unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "#Mambo_id\tIndex1\tIndex2\n0\tA\tNone\n"
        );
    }
}

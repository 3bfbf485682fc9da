//! Streaming reader for delimited input tables.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};
use crate::format::{is_comment, split_then_strip, DEFAULT_DELIMITER};

/// How an input table is tokenized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    pub delimiter: char,
    /// Drop the first non-comment line (an uncommented column header).
    pub skip_header_row: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            skip_header_row: false,
        }
    }
}

/// One data line, split and trimmed.
#[derive(Debug, Clone)]
pub struct Record {
    path: Arc<Path>,
    /// 1-based line number in the source file.
    pub line: usize,
    pub fields: Vec<String>,
}

impl Record {
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Field at `index`, or `MalformedRow` if the row is too short.
    pub fn field(&self, index: usize) -> Result<&str> {
        self.fields
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| RegistryError::MalformedRow {
                path: self.path.to_path_buf(),
                line: self.line,
                index,
                columns: self.fields.len(),
            })
    }

    /// Every field whose index is not in `keys`, in column order.
    pub fn attributes<'a>(&'a self, keys: &'a [usize]) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .enumerate()
            .filter(move |(i, _)| !keys.contains(i))
            .map(|(_, f)| f.as_str())
    }
}

pub struct RecordReader<R> {
    lines: Lines<R>,
    path: Arc<Path>,
    line: usize,
    options: ReaderOptions,
    header_pending: bool,
}

impl RecordReader<BufReader<File>> {
    pub fn open(path: &Path, options: ReaderOptions) -> Result<Self> {
        let file = File::open(path).map_err(|e| RegistryError::io(path, e))?;
        Ok(Self::new(BufReader::new(file), path, options))
    }
}

impl<R: BufRead> RecordReader<R> {
    /// Wrap any buffered source; `path` is only used in error messages.
    pub fn new(reader: R, path: &Path, options: ReaderOptions) -> Self {
        Self {
            lines: reader.lines(),
            path: Arc::from(path),
            line: 0,
            options,
            header_pending: options.skip_header_row,
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(e) => return Some(Err(RegistryError::io(&self.path, e))),
            };
            self.line += 1;
            if is_comment(&text) {
                continue;
            }
            if self.header_pending {
                self.header_pending = false;
                continue;
            }
            return Some(Ok(Record {
                path: Arc::clone(&self.path),
                line: self.line,
                fields: split_then_strip(&text, self.options.delimiter),
            }));
        }
    }
}

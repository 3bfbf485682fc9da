//! Mambo id allocation.
//!
//! An allocator is created once per run from the ids already on disk and is
//! then passed by `&mut` to whatever mints ids. There is no global counter.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{RegistryError, Result};
use crate::format::is_comment;
use crate::ids::RegistryId;

#[derive(Debug, Clone)]
pub struct IdAllocator<I> {
    next: I,
    /// Set once `next` has been handed out and has no successor.
    exhausted: bool,
    existing_max: Option<I>,
    minted: u64,
}

impl<I: RegistryId> IdAllocator<I> {
    /// Continue right after `existing_max`, or from zero on an empty registry.
    pub fn after(existing_max: Option<I>) -> Self {
        let (next, exhausted) = match existing_max {
            None => (I::from_raw(0), false),
            Some(max) => match max.successor() {
                Some(next) => (next, false),
                None => (max, true),
            },
        };
        Self {
            next,
            exhausted,
            existing_max,
            minted: 0,
        }
    }

    /// Start at an explicit id. `start` must be strictly greater than every
    /// id already recorded in `registry`.
    pub fn starting_at(start: I, existing_max: Option<I>, registry: &Path) -> Result<Self> {
        if let Some(max) = existing_max {
            if start <= max {
                return Err(RegistryError::IdCounterConflict {
                    start: start.raw(),
                    existing_max: max.raw(),
                    path: registry.to_path_buf(),
                });
            }
        }
        Ok(Self {
            next: start,
            exhausted: false,
            existing_max,
            minted: 0,
        })
    }

    /// Scan `registry` for its largest id, then either continue after it or
    /// validate the explicit `start`.
    pub fn from_registry(registry: &Path, delimiter: char, start: Option<I>) -> Result<Self>
    where
        I: std::str::FromStr,
    {
        let existing_max = scan_max_id(registry, delimiter)?;
        match start {
            Some(start) => Self::starting_at(start, existing_max, registry),
            None => Ok(Self::after(existing_max)),
        }
    }

    /// The id the next `mint` will return.
    pub fn peek(&self) -> I {
        self.next
    }

    pub fn mint(&mut self) -> Result<I> {
        if self.exhausted {
            return Err(RegistryError::InvalidConfig(format!(
                "id sequence exhausted after {}",
                self.next
            )));
        }
        let id = self.next;
        match id.successor() {
            Some(next) => self.next = next,
            None => self.exhausted = true,
        }
        self.minted += 1;
        Ok(id)
    }

    pub fn minted(&self) -> u64 {
        self.minted
    }

    pub fn existing_max(&self) -> Option<I> {
        self.existing_max
    }
}

/// Largest id in the first column of `path`, skipping comments.
///
/// A missing file is an empty registry.
pub fn scan_max_id<I>(path: &Path, delimiter: char) -> Result<Option<I>>
where
    I: RegistryId + std::str::FromStr,
{
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(RegistryError::io(path, e)),
    };

    let mut max: Option<I> = None;
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| RegistryError::io(path, e))?;
        if is_comment(&line) {
            continue;
        }
        let id = parse_id_column(&line, delimiter, path, i + 1)?;
        max = Some(max.map_or(id, |m: I| m.max(id)));
    }
    Ok(max)
}

pub(crate) fn parse_id_column<I: std::str::FromStr>(
    line: &str,
    delimiter: char,
    path: &Path,
    line_no: usize,
) -> Result<I> {
    let value = line.split(delimiter).next().unwrap_or_default().trim();
    value.parse().map_err(|_| RegistryError::InvalidId {
        path: path.to_path_buf(),
        line: line_no,
        value: value.to_string(),
    })
}

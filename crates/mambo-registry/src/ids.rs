//! Identifier newtypes.
//!
//! Mambo node ids and mambo edge ids live in separate sequences, so they get
//! separate types: an edge id can never be written where a node id is expected.
//! Dataset ids are assigned by hand and are never minted here.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An id drawn from a monotonically growing registry sequence.
pub trait RegistryId: Copy + Ord + fmt::Display + fmt::Debug {
    fn from_raw(raw: u64) -> Self;
    fn raw(self) -> u64;

    /// The id following this one, or `None` at the end of the id space.
    fn successor(self) -> Option<Self> {
        self.raw().checked_add(1).map(Self::from_raw)
    }
}

macro_rules! define_registry_id {
    ($name:ident, $doc:tt) => {
        #[doc = $doc]
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl RegistryId for $name {
            fn from_raw(raw: u64) -> Self {
                $name(raw)
            }

            fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map($name)
            }
        }
    };
}

define_registry_id!(
    CanonicalId,
    "Mambo node id: one logical entity of a mode, independent of the dataset it came from."
);

define_registry_id!(
    EdgeId,
    "Mambo edge id: one relationship instance of a crossnet."
);

/// Externally assigned id of a contributing dataset.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetId(pub u32);

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DatasetId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(DatasetId)
    }
}

/// Datasets that contributed to one mambo id, in first-contribution order.
///
/// Serialized as a comma-joined list (`0,3,7`). Inserting an id that is
/// already present is a no-op, so re-running a dataset never grows the list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetIdSet(Vec<DatasetId>);

impl DatasetIdSet {
    pub fn single(id: DatasetId) -> Self {
        DatasetIdSet(vec![id])
    }

    /// Returns `true` if the set grew.
    pub fn insert(&mut self, id: DatasetId) -> bool {
        if self.0.contains(&id) {
            false
        } else {
            self.0.push(id);
            true
        }
    }

    pub fn contains(&self, id: DatasetId) -> bool {
        self.0.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = DatasetId> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DatasetIdSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}

impl FromStr for DatasetIdSet {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = DatasetIdSet::default();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            set.insert(part.parse()?);
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_set_union_keeps_first_seen_order() {
        let mut set: DatasetIdSet = "3,1".parse().unwrap();
        assert!(set.insert(DatasetId(7)));
        assert!(!set.insert(DatasetId(1)));
        assert_eq!(set.to_string(), "3,1,7");
    }

    #[test]
    fn test_dataset_set_parse_collapses_repeats() {
        // Older registries concatenated ids without checking membership.
        let set: DatasetIdSet = "0,0,2".parse().unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.to_string(), "0,2");
    }

    #[test]
    fn test_registry_id_display_and_successor() {
        let id: CanonicalId = " 41 ".parse().unwrap();
        assert_eq!(id.successor(), Some(CanonicalId(42)));
        assert_eq!(CanonicalId(u64::MAX).successor(), None);
        assert_eq!(format!("{id}"), "41");
        assert_eq!(format!("{:?}", EdgeId(3)), "EdgeId(3)");
        assert!("x1".parse::<CanonicalId>().is_err());
    }
}

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{DatasetError, Result};

// ---------------------------------------------------------------------------
// Slot – a table in memory, or the file it lives in
// ---------------------------------------------------------------------------

/// Storage for one table: either already parsed, or a path to parse it from.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot<T> {
    Materialized(T),
    Reference(PathBuf),
}

impl<T> Slot<T> {
    pub fn reference(path: impl Into<PathBuf>) -> Self {
        Slot::Reference(path.into())
    }

    pub fn is_materialized(&self) -> bool {
        matches!(self, Slot::Materialized(_))
    }

    /// The file this slot points at, if it has not been materialized.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Slot::Reference(path) => Some(path),
            Slot::Materialized(_) => None,
        }
    }

    /// The table, if already in memory.
    pub fn table(&self) -> Option<&T> {
        match self {
            Slot::Materialized(table) => Some(table),
            Slot::Reference(_) => None,
        }
    }

    /// Return the table, reading it with `load` on a miss.
    ///
    /// With `keep_loaded` the freshly read table replaces the path and later
    /// calls are served from memory.  Without it the slot is left untouched
    /// and every call goes back to disk.
    pub fn get<F>(&mut self, keep_loaded: bool, kind: &'static str, load: F) -> Result<Cow<'_, T>>
    where
        T: Clone,
        F: FnOnce(&Path) -> Result<T>,
    {
        if let Slot::Reference(path) = self {
            debug!("materializing {kind} table from {}", path.display());
            let table = load(path)?;
            if !keep_loaded {
                return Ok(Cow::Owned(table));
            }
            *self = Slot::Materialized(table);
        }

        match self {
            Slot::Materialized(table) => Ok(Cow::Borrowed(table)),
            Slot::Reference(path) => Err(DatasetError::InconsistentSlotState {
                kind,
                path: path.clone(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// TableGroup – named slots of one table kind
// ---------------------------------------------------------------------------

/// Tables of one kind keyed by a caller-chosen name (e.g. `"mfcc"`).
#[derive(Debug, Clone, PartialEq)]
pub struct TableGroup<T> {
    slots: BTreeMap<String, Slot<T>>,
}

impl<T> Default for TableGroup<T> {
    fn default() -> Self {
        Self {
            slots: BTreeMap::new(),
        }
    }
}

impl<T> TableGroup<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an in-memory table under `key`.
    pub fn with_table(mut self, key: impl Into<String>, table: T) -> Self {
        self.slots.insert(key.into(), Slot::Materialized(table));
        self
    }

    /// Add a table to be read from `path` when first needed.
    pub fn with_path(mut self, key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.slots.insert(key.into(), Slot::reference(path));
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, slot: Slot<T>) {
        self.slots.insert(key.into(), slot);
    }

    pub fn get(&self, key: &str) -> Option<&Slot<T>> {
        self.slots.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut Slot<T>> {
        self.slots.get_mut(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.slots.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Slot<T>)> + '_ {
        self.slots.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Slot<T>)> + '_ {
        self.slots.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<T, K: Into<String>> FromIterator<(K, Slot<T>)> for TableGroup<T> {
    fn from_iter<I: IntoIterator<Item = (K, Slot<T>)>>(iter: I) -> Self {
        Self {
            slots: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn materialized_slot_never_loads() {
        let mut slot = Slot::Materialized(7u32);
        let value = slot
            .get(true, "test", |_| -> Result<u32> { panic!("no I/O expected") })
            .unwrap();
        assert_eq!(*value, 7);
    }

    #[test]
    fn keep_loaded_caches_the_table() {
        let reads = Cell::new(0);
        let load = |_: &Path| {
            reads.set(reads.get() + 1);
            Ok(String::from("table"))
        };
        let mut slot: Slot<String> = Slot::reference("t.csv");

        let first: *const String = &*slot.get(true, "test", load).unwrap();
        assert!(slot.is_materialized());
        let second: *const String = &*slot.get(true, "test", load).unwrap();

        assert_eq!(reads.get(), 1);
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn no_keep_loaded_reads_every_time() {
        let reads = Cell::new(0);
        let load = |_: &Path| {
            reads.set(reads.get() + 1);
            Ok(1u8)
        };
        let mut slot: Slot<u8> = Slot::reference("t.csv");

        assert!(matches!(slot.get(false, "test", load).unwrap(), Cow::Owned(1)));
        assert!(matches!(slot.get(false, "test", load).unwrap(), Cow::Owned(1)));
        assert_eq!(reads.get(), 2);
        assert_eq!(slot.path(), Some(Path::new("t.csv")));
    }

    #[test]
    fn load_error_leaves_reference() {
        let mut slot: Slot<u8> = Slot::reference("gone.csv");
        let err = slot
            .get(true, "test", |p| {
                Err(DatasetError::NotFound {
                    kind: "test",
                    path: p.to_path_buf(),
                })
            })
            .unwrap_err();
        assert!(matches!(err, DatasetError::NotFound { .. }));
        assert!(!slot.is_materialized());
    }

    #[test]
    fn group_keys_are_sorted() {
        let group = TableGroup::new()
            .with_path("plp", "plp.csv")
            .with_table("mfcc", 1u8)
            .with_path("fbank", "fbank.csv");
        assert_eq!(group.keys().collect::<Vec<_>>(), vec!["fbank", "mfcc", "plp"]);
        assert!(group.get("mfcc").unwrap().is_materialized());
    }
}

use std::path::Path;

use crate::error::Result;

use super::table::{delimiter_for, Layout, Table};

// ---------------------------------------------------------------------------
// Loadable – the capability every table kind provides
// ---------------------------------------------------------------------------

/// A table kind that can be read from and written to a single file.
///
/// `sep` is the field delimiter; `None` lets the kind infer it from the file
/// extension.
pub trait Loadable: Sized {
    /// Human readable kind name used in errors and logs.
    const KIND: &'static str;

    fn load(path: &Path, sep: Option<u8>) -> Result<Self>;

    fn save(&self, path: &Path, sep: Option<u8>) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Row tables keyed by an id column
// ---------------------------------------------------------------------------

/// Source path reported for tables built in memory.
const IN_MEMORY: &str = "<memory>";

/// Read a delimited table and check its mandatory columns.
fn read_rows(path: &Path, sep: Option<u8>, kind: &'static str, required: &[&str]) -> Result<Table> {
    let table = Table::read_delimited(path, delimiter_for(path, sep), kind)?;
    table.require_columns(kind, path, required)?;
    Ok(table)
}

/// Constructor, accessors and a delimited-file [`Loadable`] impl for a kind
/// that is a single table with a fixed set of mandatory columns.
macro_rules! row_table {
    ($name:ident, $kind:literal, [$($column:literal),+ $(,)?]) => {
        impl $name {
            pub const REQUIRED: &'static [&'static str] = &[$($column),+];

            pub fn new(table: Table) -> Result<Self> {
                table.require_columns(Self::KIND, Path::new(IN_MEMORY), Self::REQUIRED)?;
                Ok(Self { table })
            }

            pub fn table(&self) -> &Table {
                &self.table
            }

            pub fn len(&self) -> usize {
                self.table.len()
            }

            pub fn is_empty(&self) -> bool {
                self.table.is_empty()
            }
        }

        impl Loadable for $name {
            const KIND: &'static str = $kind;

            fn load(path: &Path, sep: Option<u8>) -> Result<Self> {
                let table = read_rows(path, sep, Self::KIND, Self::REQUIRED)?;
                Ok(Self { table })
            }

            fn save(&self, path: &Path, sep: Option<u8>) -> Result<()> {
                self.table.write_delimited(path, delimiter_for(path, sep))
            }
        }
    };
}

/// Segments of audio/video: one row per segment, keyed by `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSet {
    table: Table,
}

row_table!(SegmentSet, "segments", ["id"]);

impl SegmentSet {
    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.table.column("id").into_iter().flatten()
    }
}

/// Recordings that segments are cut from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSet {
    table: Table,
}

row_table!(RecordingSet, "recordings", ["id", "storage_path"]);

impl RecordingSet {
    /// Storage location of recording `id`.
    pub fn storage_path(&self, id: &str) -> Option<&str> {
        let row = self.table.column("id")?.position(|v| v == id)?;
        self.table.cell(row, "storage_path")
    }
}

/// Pointers to extracted features (one row per segment).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSet {
    table: Table,
}

row_table!(FeatureSet, "features", ["id", "storage_path"]);

/// Label inventory for one classification attribute (speaker, language...).
///
/// Files without a `class_idx` column get one on load, numbered by row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    table: Table,
}

impl ClassInfo {
    pub const REQUIRED: &'static [&'static str] = &["id"];

    pub fn new(table: Table) -> Result<Self> {
        table.require_columns(Self::KIND, Path::new(IN_MEMORY), Self::REQUIRED)?;
        Self::with_class_idx(table)
    }

    fn with_class_idx(mut table: Table) -> Result<Self> {
        if table.column_index("class_idx").is_none() {
            let idx = (0..table.len()).map(|i| i.to_string()).collect();
            table.push_column("class_idx", idx)?;
        }
        Ok(Self { table })
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn num_classes(&self) -> usize {
        self.table.len()
    }

    /// Integer index of class `id`.
    pub fn class_idx(&self, id: &str) -> Option<usize> {
        let row = self.table.column("id")?.position(|v| v == id)?;
        self.table.cell(row, "class_idx")?.parse().ok()
    }
}

impl Loadable for ClassInfo {
    const KIND: &'static str = "classes";

    fn load(path: &Path, sep: Option<u8>) -> Result<Self> {
        Self::with_class_idx(read_rows(path, sep, Self::KIND, Self::REQUIRED)?)
    }

    fn save(&self, path: &Path, sep: Option<u8>) -> Result<()> {
        self.table.write_delimited(path, delimiter_for(path, sep))
    }
}

// ---------------------------------------------------------------------------
// EnrollmentMap – model → enrollment segments
// ---------------------------------------------------------------------------

/// Which segments enroll which model.  Also readable from plain
/// `model segment` lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentMap {
    table: Table,
}

impl EnrollmentMap {
    pub const REQUIRED: &'static [&'static str] = &["modelid", "segmentid"];

    pub fn new(table: Table) -> Result<Self> {
        table.require_columns(Self::KIND, Path::new(IN_MEMORY), Self::REQUIRED)?;
        Ok(Self { table })
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Segments enrolled for `model`, in file order.
    pub fn segments_of<'a>(&'a self, model: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let models = self.table.column("modelid").into_iter().flatten();
        let segments = self.table.column("segmentid").into_iter().flatten();
        models
            .zip(segments)
            .filter(move |(m, _)| *m == model)
            .map(|(_, s)| s)
    }
}

impl Loadable for EnrollmentMap {
    const KIND: &'static str = "enrollments";

    fn load(path: &Path, sep: Option<u8>) -> Result<Self> {
        let table = Table::read(path, Layout::detect(path, sep), Self::REQUIRED, Self::KIND)?;
        table.require_columns(Self::KIND, path, Self::REQUIRED)?;
        Ok(Self { table })
    }

    fn save(&self, path: &Path, sep: Option<u8>) -> Result<()> {
        match Layout::detect(path, sep) {
            Layout::Whitespace => {
                let pairs = self.segments_pairs();
                Table::new(Self::REQUIRED.iter().copied(), pairs)?.write_whitespace(path)
            }
            layout => self.table.write(path, layout),
        }
    }
}

impl EnrollmentMap {
    fn segments_pairs(&self) -> Vec<Vec<String>> {
        let models = self.table.column("modelid").into_iter().flatten();
        let segments = self.table.column("segmentid").into_iter().flatten();
        models
            .zip(segments)
            .map(|(m, s)| vec![m.to_string(), s.to_string()])
            .collect()
    }
}

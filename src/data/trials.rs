use std::collections::BTreeSet;
use std::path::Path;

use log::debug;

use crate::error::{DatasetError, Result};

use super::kinds::Loadable;
use super::table::{Layout, Table};

const KEY_COLUMNS: &[&str] = &["modelid", "segmentid", "targettype"];
const NDX_COLUMNS: &[&str] = &["modelid", "segmentid"];

// ---------------------------------------------------------------------------
// Shared parsing: (model, segment[, target]) rows → sorted axes + coordinates
// ---------------------------------------------------------------------------

/// Trial coordinates over sorted, de-duplicated model and segment axes.
struct Grid {
    models: Vec<String>,
    segments: Vec<String>,
    /// `(model_idx, segment_idx, is_target)`; `is_target` is `None` for
    /// index-form tables.
    cells: Vec<(usize, usize, Option<bool>)>,
}

impl Grid {
    fn read(path: &Path, sep: Option<u8>, kind: &'static str, with_type: bool) -> Result<Self> {
        let columns = if with_type { KEY_COLUMNS } else { NDX_COLUMNS };
        let table = Table::read(path, Layout::detect(path, sep), columns, kind)?;
        Self::from_table(&table, path, kind, with_type)
    }

    fn from_table(table: &Table, path: &Path, kind: &'static str, with_type: bool) -> Result<Self> {
        let columns = if with_type { KEY_COLUMNS } else { NDX_COLUMNS };
        table.require_columns(kind, path, columns)?;

        let model_col = table.column_index("modelid").unwrap_or(0);
        let segment_col = table.column_index("segmentid").unwrap_or(1);
        let type_col = table.column_index("targettype");

        let models: Vec<String> = unique_sorted(table.rows().iter().map(|r| r[model_col].as_str()));
        let segments: Vec<String> = unique_sorted(table.rows().iter().map(|r| r[segment_col].as_str()));

        let mut cells = Vec::with_capacity(table.len());
        for (row_no, row) in table.rows().iter().enumerate() {
            // axes were built from these very rows
            let m = models.binary_search(&row[model_col]).unwrap_or_default();
            let s = segments.binary_search(&row[segment_col]).unwrap_or_default();
            let target = match (with_type, type_col) {
                (true, Some(col)) => Some(parse_target(&row[col]).ok_or_else(|| {
                    DatasetError::format(
                        kind,
                        path,
                        format!("row {row_no}: unknown targettype '{}'", row[col]),
                    )
                })?),
                _ => None,
            };
            cells.push((m, s, target));
        }

        Ok(Self { models, segments, cells })
    }
}

fn unique_sorted<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn parse_target(value: &str) -> Option<bool> {
    match value {
        "target" => Some(true),
        "nontarget" => Some(false),
        _ => None,
    }
}

fn target_label(is_target: bool) -> &'static str {
    if is_target {
        "target"
    } else {
        "nontarget"
    }
}

fn write_rows(path: &Path, sep: Option<u8>, columns: &[&str], rows: Vec<Vec<String>>) -> Result<()> {
    Table::new(columns.iter().copied(), rows)?.write(path, Layout::detect(path, sep))
}

// ---------------------------------------------------------------------------
// TrialKey – dense target / non-target masks
// ---------------------------------------------------------------------------

/// Dense trial key: every (model, segment) pair is target, non-target or
/// not a trial.  Masks are stored row-major, models × segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialKey {
    pub models: Vec<String>,
    pub segments: Vec<String>,
    tar: Vec<bool>,
    non: Vec<bool>,
}

impl TrialKey {
    /// Build from a `modelid`/`segmentid`/`targettype` table.
    pub fn new(table: &Table) -> Result<Self> {
        Ok(Self::from_grid(Grid::from_table(table, Path::new("<memory>"), Self::KIND, true)?))
    }

    fn from_grid(grid: Grid) -> Self {
        let size = grid.models.len() * grid.segments.len();
        let mut tar = vec![false; size];
        let mut non = vec![false; size];
        for (m, s, target) in grid.cells {
            let idx = m * grid.segments.len() + s;
            if target == Some(true) {
                tar[idx] = true;
            } else {
                non[idx] = true;
            }
        }
        Self {
            models: grid.models,
            segments: grid.segments,
            tar,
            non,
        }
    }

    pub fn num_trials(&self) -> usize {
        self.tar.iter().chain(&self.non).filter(|v| **v).count()
    }

    /// `Some(true)` for a target trial, `Some(false)` for a non-target one.
    pub fn trial(&self, model: &str, segment: &str) -> Option<bool> {
        let m = self.models.iter().position(|x| x == model)?;
        let s = self.segments.iter().position(|x| x == segment)?;
        let idx = m * self.segments.len() + s;
        if self.tar[idx] {
            Some(true)
        } else if self.non[idx] {
            Some(false)
        } else {
            None
        }
    }

    fn rows(&self) -> Vec<Vec<String>> {
        let mut rows = Vec::new();
        for (m, model) in self.models.iter().enumerate() {
            for (s, segment) in self.segments.iter().enumerate() {
                let idx = m * self.segments.len() + s;
                if self.tar[idx] || self.non[idx] {
                    rows.push(vec![
                        model.clone(),
                        segment.clone(),
                        target_label(self.tar[idx]).to_string(),
                    ]);
                }
            }
        }
        rows
    }
}

impl Loadable for TrialKey {
    const KIND: &'static str = "trial key";

    fn load(path: &Path, sep: Option<u8>) -> Result<Self> {
        Ok(Self::from_grid(Grid::read(path, sep, Self::KIND, true)?))
    }

    fn save(&self, path: &Path, sep: Option<u8>) -> Result<()> {
        write_rows(path, sep, KEY_COLUMNS, self.rows())
    }
}

// ---------------------------------------------------------------------------
// SparseTrialKey – only the listed trials are stored
// ---------------------------------------------------------------------------

/// Trial key for large, mostly empty model × segment grids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseTrialKey {
    pub models: Vec<String>,
    pub segments: Vec<String>,
    tar: BTreeSet<(usize, usize)>,
    non: BTreeSet<(usize, usize)>,
}

impl SparseTrialKey {
    pub fn new(table: &Table) -> Result<Self> {
        Ok(Self::from_grid(Grid::from_table(table, Path::new("<memory>"), Self::KIND, true)?))
    }

    fn from_grid(grid: Grid) -> Self {
        let mut tar = BTreeSet::new();
        let mut non = BTreeSet::new();
        for (m, s, target) in grid.cells {
            if target == Some(true) {
                tar.insert((m, s));
            } else {
                non.insert((m, s));
            }
        }
        Self {
            models: grid.models,
            segments: grid.segments,
            tar,
            non,
        }
    }

    pub fn num_trials(&self) -> usize {
        self.tar.len() + self.non.len()
    }

    pub fn trial(&self, model: &str, segment: &str) -> Option<bool> {
        let m = self.models.iter().position(|x| x == model)?;
        let s = self.segments.iter().position(|x| x == segment)?;
        if self.tar.contains(&(m, s)) {
            Some(true)
        } else if self.non.contains(&(m, s)) {
            Some(false)
        } else {
            None
        }
    }
}

impl Loadable for SparseTrialKey {
    const KIND: &'static str = "sparse trial key";

    fn load(path: &Path, sep: Option<u8>) -> Result<Self> {
        Ok(Self::from_grid(Grid::read(path, sep, Self::KIND, true)?))
    }

    fn save(&self, path: &Path, sep: Option<u8>) -> Result<()> {
        let mut cells: Vec<(usize, usize, bool)> = self
            .tar
            .iter()
            .map(|&(m, s)| (m, s, true))
            .chain(self.non.iter().map(|&(m, s)| (m, s, false)))
            .collect();
        cells.sort_unstable();
        let rows = cells
            .into_iter()
            .map(|(m, s, t)| {
                vec![
                    self.models[m].clone(),
                    self.segments[s].clone(),
                    target_label(t).to_string(),
                ]
            })
            .collect();
        write_rows(path, sep, KEY_COLUMNS, rows)
    }
}

// ---------------------------------------------------------------------------
// TrialNdx – which pairs to score, without labels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialNdx {
    pub models: Vec<String>,
    pub segments: Vec<String>,
    mask: Vec<bool>,
}

impl TrialNdx {
    /// Build from a `modelid`/`segmentid` table.
    pub fn new(table: &Table) -> Result<Self> {
        Ok(Self::from_grid(Grid::from_table(table, Path::new("<memory>"), Self::KIND, false)?))
    }

    fn from_grid(grid: Grid) -> Self {
        let mut mask = vec![false; grid.models.len() * grid.segments.len()];
        for (m, s, _) in grid.cells {
            mask[m * grid.segments.len() + s] = true;
        }
        Self {
            models: grid.models,
            segments: grid.segments,
            mask,
        }
    }

    pub fn num_trials(&self) -> usize {
        self.mask.iter().filter(|v| **v).count()
    }

    pub fn contains(&self, model: &str, segment: &str) -> bool {
        let m = self.models.iter().position(|x| x == model);
        let s = self.segments.iter().position(|x| x == segment);
        match (m, s) {
            (Some(m), Some(s)) => self.mask[m * self.segments.len() + s],
            _ => false,
        }
    }
}

impl Loadable for TrialNdx {
    const KIND: &'static str = "trial index";

    fn load(path: &Path, sep: Option<u8>) -> Result<Self> {
        Ok(Self::from_grid(Grid::read(path, sep, Self::KIND, false)?))
    }

    fn save(&self, path: &Path, sep: Option<u8>) -> Result<()> {
        let mut rows = Vec::new();
        for (m, model) in self.models.iter().enumerate() {
            for (s, segment) in self.segments.iter().enumerate() {
                if self.mask[m * self.segments.len() + s] {
                    rows.push(vec![model.clone(), segment.clone()]);
                }
            }
        }
        write_rows(path, sep, NDX_COLUMNS, rows)
    }
}

// ---------------------------------------------------------------------------
// Trials – whichever of the three kinds a file turned out to hold
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trials {
    Key(TrialKey),
    SparseKey(SparseTrialKey),
    Ndx(TrialNdx),
}

impl Trials {
    pub fn kind(&self) -> &'static str {
        match self {
            Trials::Key(_) => TrialKey::KIND,
            Trials::SparseKey(_) => SparseTrialKey::KIND,
            Trials::Ndx(_) => TrialNdx::KIND,
        }
    }

    pub fn num_trials(&self) -> usize {
        match self {
            Trials::Key(t) => t.num_trials(),
            Trials::SparseKey(t) => t.num_trials(),
            Trials::Ndx(t) => t.num_trials(),
        }
    }

    /// Trial files pick their delimiter from the file extension.
    pub fn save(&self, path: &Path) -> Result<()> {
        match self {
            Trials::Key(t) => t.save(path, None),
            Trials::SparseKey(t) => t.save(path, None),
            Trials::Ndx(t) => t.save(path, None),
        }
    }
}

impl From<TrialKey> for Trials {
    fn from(key: TrialKey) -> Self {
        Trials::Key(key)
    }
}

impl From<SparseTrialKey> for Trials {
    fn from(key: SparseTrialKey) -> Self {
        Trials::SparseKey(key)
    }
}

impl From<TrialNdx> for Trials {
    fn from(ndx: TrialNdx) -> Self {
        Trials::Ndx(ndx)
    }
}

/// Read a trials file whose kind is not recorded anywhere.
///
/// Tries the key form first (sparse or dense per `sparse`), then the index
/// form exactly once.  An error from the index attempt is returned as is.
pub fn load_trials(path: &Path, sparse: bool) -> Result<Trials> {
    let key = if sparse {
        SparseTrialKey::load(path, None).map(Trials::SparseKey)
    } else {
        TrialKey::load(path, None).map(Trials::Key)
    };
    match key {
        Ok(trials) => Ok(trials),
        Err(err) => {
            debug!("{} is not a trial key ({err}), reading it as a trial index", path.display());
            TrialNdx::load(path, None).map(Trials::Ndx)
        }
    }
}

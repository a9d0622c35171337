use std::borrow::Cow;
use std::path::Path;

use crate::data::kinds::{ClassInfo, EnrollmentMap, FeatureSet, Loadable, RecordingSet, SegmentSet};
use crate::data::slot::{Slot, TableGroup};
use crate::data::trials::{load_trials, Trials};
use crate::error::{DatasetError, Result};

// ---------------------------------------------------------------------------
// Dataset registry
// ---------------------------------------------------------------------------

/// Every table that makes up one experimental dataset.
///
/// Tables are read lazily: a slot holding a path is parsed the first time an
/// accessor asks for it.  Groups left as `None` were never configured and
/// iterate as empty.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub(crate) segments: Slot<SegmentSet>,
    pub(crate) recordings: Option<TableGroup<RecordingSet>>,
    pub(crate) features: Option<TableGroup<FeatureSet>>,
    pub(crate) classes: Option<TableGroup<ClassInfo>>,
    pub(crate) enrollments: Option<TableGroup<EnrollmentMap>>,
    pub(crate) trials: Option<TableGroup<Trials>>,
    /// Read trial keys as [`SparseTrialKey`](crate::data::trials::SparseTrialKey).
    pub sparse_trials: bool,
    /// Field delimiter for table files; `None` infers it from the extension.
    pub table_sep: Option<u8>,
}

pub(crate) const RECORDINGS: &str = "recordings";
pub(crate) const FEATURES: &str = "features";
pub(crate) const CLASSES: &str = "classes";
pub(crate) const ENROLLMENTS: &str = "enrollments";
pub(crate) const TRIALS: &str = "trials";

impl Dataset {
    /// A dataset with only its segment table.
    pub fn new(segments: Slot<SegmentSet>) -> Self {
        Self {
            segments,
            recordings: None,
            features: None,
            classes: None,
            enrollments: None,
            trials: None,
            sparse_trials: false,
            table_sep: None,
        }
    }

    pub fn from_segments(segments: SegmentSet) -> Self {
        Self::new(Slot::Materialized(segments))
    }

    pub fn from_segments_path(path: impl Into<std::path::PathBuf>) -> Self {
        Self::new(Slot::reference(path))
    }

    pub fn with_recordings(mut self, group: TableGroup<RecordingSet>) -> Self {
        self.recordings = Some(group);
        self
    }

    pub fn with_features(mut self, group: TableGroup<FeatureSet>) -> Self {
        self.features = Some(group);
        self
    }

    pub fn with_classes(mut self, group: TableGroup<ClassInfo>) -> Self {
        self.classes = Some(group);
        self
    }

    pub fn with_enrollments(mut self, group: TableGroup<EnrollmentMap>) -> Self {
        self.enrollments = Some(group);
        self
    }

    pub fn with_trials(mut self, group: TableGroup<Trials>) -> Self {
        self.trials = Some(group);
        self
    }

    pub fn with_sparse_trials(mut self, sparse: bool) -> Self {
        self.sparse_trials = sparse;
        self
    }

    pub fn with_table_sep(mut self, sep: Option<u8>) -> Self {
        self.table_sep = sep;
        self
    }

    // -- slot inspection --

    pub fn segments_slot(&self) -> &Slot<SegmentSet> {
        &self.segments
    }

    pub fn recordings_group(&self) -> Option<&TableGroup<RecordingSet>> {
        self.recordings.as_ref()
    }

    pub fn features_group(&self) -> Option<&TableGroup<FeatureSet>> {
        self.features.as_ref()
    }

    pub fn classes_group(&self) -> Option<&TableGroup<ClassInfo>> {
        self.classes.as_ref()
    }

    pub fn enrollments_group(&self) -> Option<&TableGroup<EnrollmentMap>> {
        self.enrollments.as_ref()
    }

    pub fn trials_group(&self) -> Option<&TableGroup<Trials>> {
        self.trials.as_ref()
    }

    // -- single-table accessors --

    /// The segment table, read from disk on first use.
    pub fn segments(&mut self, keep_loaded: bool) -> Result<Cow<'_, SegmentSet>> {
        let sep = self.table_sep;
        self.segments
            .get(keep_loaded, SegmentSet::KIND, |path| SegmentSet::load(path, sep))
    }

    pub fn recordings_value(&mut self, key: &str, keep_loaded: bool) -> Result<Cow<'_, RecordingSet>> {
        let sep = self.table_sep;
        member(self.recordings.as_mut(), RECORDINGS, key)?
            .get(keep_loaded, RecordingSet::KIND, |path| RecordingSet::load(path, sep))
    }

    pub fn features_value(&mut self, key: &str, keep_loaded: bool) -> Result<Cow<'_, FeatureSet>> {
        let sep = self.table_sep;
        member(self.features.as_mut(), FEATURES, key)?
            .get(keep_loaded, FeatureSet::KIND, |path| FeatureSet::load(path, sep))
    }

    pub fn classes_value(&mut self, key: &str, keep_loaded: bool) -> Result<Cow<'_, ClassInfo>> {
        let sep = self.table_sep;
        member(self.classes.as_mut(), CLASSES, key)?
            .get(keep_loaded, ClassInfo::KIND, |path| ClassInfo::load(path, sep))
    }

    pub fn enrollments_value(&mut self, key: &str, keep_loaded: bool) -> Result<Cow<'_, EnrollmentMap>> {
        let sep = self.table_sep;
        member(self.enrollments.as_mut(), ENROLLMENTS, key)?
            .get(keep_loaded, EnrollmentMap::KIND, |path| EnrollmentMap::load(path, sep))
    }

    /// Trials under `key`; the table kind is discovered from the file.
    pub fn trials_value(&mut self, key: &str, keep_loaded: bool) -> Result<Cow<'_, Trials>> {
        let sparse = self.sparse_trials;
        member(self.trials.as_mut(), TRIALS, key)?
            .get(keep_loaded, TRIALS, |path| load_trials(path, sparse))
    }

    // -- group iterators --

    /// `(key, table)` for every recording table, in key order.  A table that
    /// fails to load yields [`DatasetError::Member`] naming its key.
    pub fn recordings(
        &mut self,
        keep_loaded: bool,
    ) -> impl Iterator<Item = Result<(&str, Cow<'_, RecordingSet>)>> + '_ {
        let sep = self.table_sep;
        members(self.recordings.as_mut(), RECORDINGS, keep_loaded, RecordingSet::KIND, move |path| {
            RecordingSet::load(path, sep)
        })
    }

    pub fn features(
        &mut self,
        keep_loaded: bool,
    ) -> impl Iterator<Item = Result<(&str, Cow<'_, FeatureSet>)>> + '_ {
        let sep = self.table_sep;
        members(self.features.as_mut(), FEATURES, keep_loaded, FeatureSet::KIND, move |path| {
            FeatureSet::load(path, sep)
        })
    }

    pub fn classes(
        &mut self,
        keep_loaded: bool,
    ) -> impl Iterator<Item = Result<(&str, Cow<'_, ClassInfo>)>> + '_ {
        let sep = self.table_sep;
        members(self.classes.as_mut(), CLASSES, keep_loaded, ClassInfo::KIND, move |path| {
            ClassInfo::load(path, sep)
        })
    }

    pub fn enrollments(
        &mut self,
        keep_loaded: bool,
    ) -> impl Iterator<Item = Result<(&str, Cow<'_, EnrollmentMap>)>> + '_ {
        let sep = self.table_sep;
        members(self.enrollments.as_mut(), ENROLLMENTS, keep_loaded, EnrollmentMap::KIND, move |path| {
            EnrollmentMap::load(path, sep)
        })
    }

    pub fn trials(
        &mut self,
        keep_loaded: bool,
    ) -> impl Iterator<Item = Result<(&str, Cow<'_, Trials>)>> + '_ {
        let sparse = self.sparse_trials;
        members(self.trials.as_mut(), TRIALS, keep_loaded, TRIALS, move |path| {
            load_trials(path, sparse)
        })
    }

    /// Materialize every table now, keeping all of them in memory.
    pub fn update_from_disk(&mut self) -> Result<()> {
        self.segments(true)?;
        for entry in self.recordings(true) {
            entry?;
        }
        for entry in self.features(true) {
            entry?;
        }
        for entry in self.classes(true) {
            entry?;
        }
        for entry in self.enrollments(true) {
            entry?;
        }
        for entry in self.trials(true) {
            entry?;
        }
        Ok(())
    }
}

fn member<'a, T>(group: Option<&'a mut TableGroup<T>>, name: &'static str, key: &str) -> Result<&'a mut Slot<T>> {
    group
        .and_then(|g| g.get_mut(key))
        .ok_or_else(|| DatasetError::UnknownKey {
            group: name,
            key: key.to_string(),
        })
}

fn members<'a, T, F>(
    group: Option<&'a mut TableGroup<T>>,
    name: &'static str,
    keep_loaded: bool,
    kind: &'static str,
    load: F,
) -> impl Iterator<Item = Result<(&'a str, Cow<'a, T>)>> + 'a
where
    T: Clone + 'a,
    F: Fn(&Path) -> Result<T> + 'a,
{
    group
        .into_iter()
        .flat_map(|g| g.iter_mut())
        .map(move |(key, slot)| match slot.get(keep_loaded, kind, &load) {
            Ok(table) => Ok((key, table)),
            Err(err) => Err(DatasetError::member(name, key, err)),
        })
}

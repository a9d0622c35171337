//! Writing a dataset to a directory plus manifest, and reading it back.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{info, trace};

use crate::data::kinds::{ClassInfo, EnrollmentMap, FeatureSet, Loadable, RecordingSet, SegmentSet};
use crate::data::slot::{Slot, TableGroup};
use crate::data::table::table_extension;
use crate::data::trials::{load_trials, Trials};
use crate::dataset::{Dataset, CLASSES, ENROLLMENTS, FEATURES, RECORDINGS, TRIALS};
use crate::error::{DatasetError, Result};
use crate::manifest::{FileMap, Manifest};
use crate::paths::{resolve_dataset_path, resolve_file_path};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// How [`Dataset::load_with`] builds the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Defer reading tables until they are accessed.
    pub lazy: bool,
    /// Read trial keys with the sparse parser.
    pub sparse_trials: bool,
    /// Separator for the loaded tables; the manifest does not record it.
    pub table_sep: Option<u8>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            lazy: true,
            sparse_trials: false,
            table_sep: None,
        }
    }
}

impl LoadOptions {
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn sparse_trials(mut self, sparse: bool) -> Self {
        self.sparse_trials = sparse;
        self
    }

    pub fn table_sep(mut self, sep: Option<u8>) -> Self {
        self.table_sep = sep;
        self
    }
}

/// How [`Dataset::save_with`] writes the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Point referenced slots at the newly written files afterwards.
    pub update_paths: bool,
    /// Separator for the written tables; `None` keeps the dataset's own.
    pub table_sep: Option<u8>,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            update_paths: true,
            table_sep: None,
        }
    }
}

impl SaveOptions {
    pub fn update_paths(mut self, update: bool) -> Self {
        self.update_paths = update;
        self
    }

    pub fn table_sep(mut self, sep: Option<u8>) -> Self {
        self.table_sep = sep;
        self
    }
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

/// Where and how one `save` call writes its tables.
struct Target<'a> {
    dir: &'a Path,
    ext: &'static str,
    update_paths: bool,
}

impl Target<'_> {
    /// Write every table of `group` as `<key>.<ext>` and return the file
    /// names for the manifest.  Referenced tables are read (without caching)
    /// and re-encoded.  Errors name the failing key.
    fn write_group<T, L, S>(
        &self,
        group: Option<&mut TableGroup<T>>,
        group_name: &'static str,
        kind: &'static str,
        load: L,
        save: S,
    ) -> Result<Option<FileMap>>
    where
        T: Clone,
        L: Fn(&Path) -> Result<T>,
        S: Fn(&T, &Path) -> Result<()>,
    {
        let Some(group) = group else {
            return Ok(None);
        };
        let mut files = FileMap::new();
        for (key, slot) in group.iter_mut() {
            let file_name = format!("{key}.{}", self.ext);
            let file_path = self.dir.join(&file_name);
            let written = slot.get(false, kind, &load).and_then(|table| {
                trace!("writing {kind} table {key} to {}", file_path.display());
                save(&*table, &file_path)
            });
            written.map_err(|err| DatasetError::member(group_name, key, err))?;
            if self.update_paths {
                if let Slot::Reference(path) = slot {
                    *path = file_path;
                }
            }
            files.insert(key.to_string(), PathBuf::from(file_name));
        }
        Ok(Some(files))
    }
}

impl Dataset {
    /// Save into `dataset_path` (a directory or a manifest file) with default
    /// options.  Returns the manifest path.
    pub fn save(&mut self, dataset_path: impl AsRef<Path>) -> Result<PathBuf> {
        self.save_with(dataset_path, SaveOptions::default())
    }

    /// Write every table, materialized or not, plus the manifest.
    ///
    /// Keys that would map to the same file name are rejected before
    /// anything is written.  Writes are not transactional: a later failure
    /// leaves whatever was already written in place, and with `update_paths`
    /// the slots written so far already point at their new files.
    pub fn save_with(&mut self, dataset_path: impl AsRef<Path>, options: SaveOptions) -> Result<PathBuf> {
        let read_sep = self.table_sep;
        let write_sep = options.table_sep.or(read_sep);
        let sparse = self.sparse_trials;
        let (dir, manifest_file) = resolve_dataset_path(dataset_path.as_ref());
        let ext = table_extension(write_sep);
        self.check_file_names(&dir, ext)?;
        std::fs::create_dir_all(&dir).map_err(|source| DatasetError::Io {
            path: dir.clone(),
            source,
        })?;

        let target = Target {
            dir: &dir,
            ext,
            update_paths: options.update_paths,
        };
        // repointed slots hold files in the new encoding
        if options.update_paths {
            self.table_sep = write_sep;
        }

        let segments_name = format!("segments.{}", target.ext);
        let segments_path = dir.join(&segments_name);
        self.segments
            .get(false, SegmentSet::KIND, |p| SegmentSet::load(p, read_sep))?
            .save(&segments_path, write_sep)?;
        if options.update_paths {
            if let Slot::Reference(path) = &mut self.segments {
                *path = segments_path;
            }
        }

        let manifest = Manifest {
            segments: Some(PathBuf::from(segments_name)),
            recordings: target.write_group(
                self.recordings.as_mut(),
                RECORDINGS,
                RecordingSet::KIND,
                |p| RecordingSet::load(p, read_sep),
                |t, p| t.save(p, write_sep),
            )?,
            features: target.write_group(
                self.features.as_mut(),
                FEATURES,
                FeatureSet::KIND,
                |p| FeatureSet::load(p, read_sep),
                |t, p| t.save(p, write_sep),
            )?,
            classes: target.write_group(
                self.classes.as_mut(),
                CLASSES,
                ClassInfo::KIND,
                |p| ClassInfo::load(p, read_sep),
                |t, p| t.save(p, write_sep),
            )?,
            enrollments: target.write_group(
                self.enrollments.as_mut(),
                ENROLLMENTS,
                EnrollmentMap::KIND,
                |p| EnrollmentMap::load(p, read_sep),
                |t, p| t.save(p, write_sep),
            )?,
            trials: target.write_group(
                self.trials.as_mut(),
                TRIALS,
                TRIALS,
                |p| load_trials(p, sparse),
                |t: &Trials, p| t.save(p),
            )?,
        };
        manifest.write(&manifest_file)?;

        info!("saved dataset to {}", manifest_file.display());
        Ok(manifest_file)
    }

    /// Every table is saved as `<key>.<ext>` in one directory, so keys must
    /// be unique across groups and must not shadow the segment table.
    fn check_file_names(&self, dir: &Path, ext: &str) -> Result<()> {
        let keys = [
            (RECORDINGS, group_keys(&self.recordings)),
            (FEATURES, group_keys(&self.features)),
            (CLASSES, group_keys(&self.classes)),
            (ENROLLMENTS, group_keys(&self.enrollments)),
            (TRIALS, group_keys(&self.trials)),
        ];
        let mut owners = BTreeMap::from([(SegmentSet::KIND, SegmentSet::KIND)]);
        for (group, keys) in keys {
            for key in keys {
                if let Some(first) = owners.insert(key, group) {
                    return Err(DatasetError::DuplicateFileName {
                        path: dir.join(format!("{key}.{ext}")),
                        first,
                        second: group,
                    });
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Load
    // -----------------------------------------------------------------------

    /// Open the dataset at `dataset_path` lazily.
    pub fn load(dataset_path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with(dataset_path, LoadOptions::default())
    }

    /// Rebuild a dataset from its manifest.  Every table starts as a path
    /// reference; with `lazy == false` all of them are read before returning.
    pub fn load_with(dataset_path: impl AsRef<Path>, options: LoadOptions) -> Result<Self> {
        let (dir, manifest_file) = resolve_dataset_path(dataset_path.as_ref());
        let manifest = Manifest::read(&manifest_file)?;
        let segments = resolve_file_path(&dir, manifest.require_segments(&manifest_file)?);

        let mut dataset = Dataset::from_segments_path(segments)
            .with_sparse_trials(options.sparse_trials)
            .with_table_sep(options.table_sep);
        dataset.recordings = referenced(&dir, manifest.recordings);
        dataset.features = referenced(&dir, manifest.features);
        dataset.classes = referenced(&dir, manifest.classes);
        dataset.enrollments = referenced(&dir, manifest.enrollments);
        dataset.trials = referenced(&dir, manifest.trials);

        info!(
            "loaded dataset manifest {} ({} groups)",
            manifest_file.display(),
            dataset.configured_groups().len()
        );
        if !options.lazy {
            dataset.update_from_disk()?;
        }
        Ok(dataset)
    }

    /// Names of the optional groups this dataset has configured.
    pub fn configured_groups(&self) -> Vec<&'static str> {
        [
            (RECORDINGS, self.recordings.is_some()),
            (FEATURES, self.features.is_some()),
            (CLASSES, self.classes.is_some()),
            (ENROLLMENTS, self.enrollments.is_some()),
            (TRIALS, self.trials.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect()
    }
}

fn group_keys<T>(group: &Option<TableGroup<T>>) -> Vec<&str> {
    group.iter().flat_map(|g| g.keys()).collect()
}

fn referenced<T>(dir: &Path, files: Option<FileMap>) -> Option<TableGroup<T>> {
    files.map(|files| {
        files
            .into_iter()
            .map(|(key, file)| (key, Slot::Reference(resolve_file_path(dir, &file))))
            .collect()
    })
}

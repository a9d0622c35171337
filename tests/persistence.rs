use std::path::{Path, PathBuf};

use dataset_registry::{
    ClassInfo, Dataset, DatasetError, EnrollmentMap, FeatureSet, LoadOptions, RecordingSet,
    SaveOptions, SegmentSet, Slot, Table, TableGroup, TrialKey, TrialNdx, Trials,
};

fn rows(cells: &[&[&str]]) -> Vec<Vec<String>> {
    cells
        .iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect()
}

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

fn segments() -> SegmentSet {
    SegmentSet::new(
        Table::new(
            ["id", "duration"],
            rows(&[&["s1", "1.25"], &["s2", "3.00"], &["s3", "0.50"]]),
        )
        .unwrap(),
    )
    .unwrap()
}

fn features() -> FeatureSet {
    FeatureSet::new(
        Table::new(
            ["id", "storage_path"],
            rows(&[&["s1", "mfcc.ark:1"], &["s2", "mfcc.ark:2"]]),
        )
        .unwrap(),
    )
    .unwrap()
}

/// A dataset mixing in-memory tables with tables that only exist on disk.
fn mixed_dataset(src: &Path) -> Dataset {
    let recordings = write(src, "rec.csv", "id,storage_path\nr1,/wav/r1.flac\n");
    let classes = write(src, "spk.csv", "id\nalice\nbob\n");
    let enroll = write(src, "enroll.csv", "modelid,segmentid\nalice,s1\nbob,s2\n");
    let ndx = write(src, "ndx.csv", "modelid,segmentid\nalice,s3\nbob,s3\n");
    let key = TrialKey::new(
        &Table::new(
            ["modelid", "segmentid", "targettype"],
            rows(&[&["alice", "s3", "target"], &["bob", "s3", "nontarget"]]),
        )
        .unwrap(),
    )
    .unwrap();

    Dataset::from_segments(segments())
        .with_recordings(TableGroup::new().with_path("wav", recordings))
        .with_features(TableGroup::new().with_table("mfcc", features()))
        .with_classes(TableGroup::new().with_path("speaker", classes))
        .with_enrollments(TableGroup::new().with_path("eval", enroll))
        .with_trials(
            TableGroup::new()
                .with_table("eval_key", Trials::Key(key))
                .with_path("eval_ndx", ndx),
        )
}

#[test]
fn save_then_load_round_trips() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let mut original = mixed_dataset(src.path());

    let manifest = original.save(out.path()).unwrap();
    assert_eq!(manifest, out.path().join("dataset.yaml"));

    let mut loaded = Dataset::load(out.path()).unwrap();
    assert!(!loaded.segments_slot().is_materialized());

    assert_eq!(*loaded.segments(true).unwrap(), *original.segments(true).unwrap());
    assert_eq!(
        *loaded.recordings_value("wav", true).unwrap(),
        *original.recordings_value("wav", true).unwrap()
    );
    assert_eq!(*loaded.features_value("mfcc", true).unwrap(), features());
    assert_eq!(
        *loaded.classes_value("speaker", true).unwrap(),
        *original.classes_value("speaker", true).unwrap()
    );
    assert_eq!(
        *loaded.enrollments_value("eval", true).unwrap(),
        *original.enrollments_value("eval", true).unwrap()
    );
    assert_eq!(
        *loaded.trials_value("eval_key", true).unwrap(),
        *original.trials_value("eval_key", true).unwrap()
    );
    assert!(matches!(
        &*loaded.trials_value("eval_ndx", true).unwrap(),
        Trials::Ndx(_)
    ));
}

#[test]
fn manifest_records_file_names() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    mixed_dataset(src.path()).save(out.path()).unwrap();

    let text = std::fs::read_to_string(out.path().join("dataset.yaml")).unwrap();
    let doc: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
    assert_eq!(doc["segments"], "segments.csv");
    assert_eq!(doc["features"]["mfcc"], "mfcc.csv");
    assert_eq!(doc["trials"]["eval_ndx"], "eval_ndx.csv");
    assert_eq!(doc["classes"]["speaker"], "speaker.csv");

    for name in ["segments.csv", "wav.csv", "mfcc.csv", "speaker.csv", "eval.csv", "eval_key.csv", "eval_ndx.csv"] {
        assert!(out.path().join(name).is_file(), "{name} not written");
    }
}

#[test]
fn tab_separator_writes_tsv() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let mut ds = mixed_dataset(src.path());
    ds.save_with(out.path(), SaveOptions::default().table_sep(Some(b'\t')))
        .unwrap();

    assert!(out.path().join("segments.tsv").is_file());
    assert!(out.path().join("mfcc.tsv").is_file());
    assert!(!out.path().join("segments.csv").exists());
    let text = std::fs::read_to_string(out.path().join("segments.tsv")).unwrap();
    assert!(text.starts_with("id\tduration\n"));

    let mut loaded = Dataset::load(out.path()).unwrap();
    assert_eq!(loaded.segments(false).unwrap().len(), 3);
    assert_eq!(loaded.trials(false).count(), 2);
}

#[test]
fn other_separators_keep_csv_extension() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let mut ds = mixed_dataset(src.path());
    ds.save_with(out.path(), SaveOptions::default().table_sep(Some(b';')))
        .unwrap();

    let text = std::fs::read_to_string(out.path().join("segments.csv")).unwrap();
    assert!(text.starts_with("id;duration\n"));

    let mut loaded =
        Dataset::load_with(out.path(), LoadOptions::default().table_sep(Some(b';'))).unwrap();
    assert_eq!(*loaded.segments(true).unwrap(), segments());
}

#[test]
fn update_paths_repoints_references() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let mut ds = mixed_dataset(src.path());

    ds.save(out.path()).unwrap();

    let wav = ds.recordings_group().unwrap().get("wav").unwrap();
    assert_eq!(wav.path(), Some(out.path().join("wav.csv").as_path()));
    // tables that were already in memory stay there
    assert!(ds.features_group().unwrap().get("mfcc").unwrap().is_materialized());
    assert!(ds.segments_slot().is_materialized());
}

#[test]
fn without_update_paths_references_are_untouched() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let mut ds = mixed_dataset(src.path());

    ds.save_with(
        out.path(),
        SaveOptions::default()
            .update_paths(false)
            .table_sep(Some(b'\t')),
    )
    .unwrap();

    let wav = ds.recordings_group().unwrap().get("wav").unwrap();
    assert_eq!(wav.path(), Some(src.path().join("rec.csv").as_path()));
    assert_eq!(ds.table_sep, None);
    // saving does not cache referenced tables
    assert!(!ds.classes_group().unwrap().get("speaker").unwrap().is_materialized());
    assert!(out.path().join("speaker.tsv").is_file());
}

#[test]
fn saving_into_a_manifest_path() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let manifest = out.path().join("nested").join("voxceleb.yml");
    let mut ds = mixed_dataset(src.path());

    assert_eq!(ds.save(&manifest).unwrap(), manifest);
    assert!(out.path().join("nested").join("segments.csv").is_file());

    let mut loaded = Dataset::load(&manifest).unwrap();
    assert_eq!(loaded.features(true).count(), 1);
}

#[test]
fn json_manifest_round_trip() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let manifest = out.path().join("dataset.json");
    mixed_dataset(src.path()).save(&manifest).unwrap();

    let text = std::fs::read_to_string(&manifest).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(doc["recordings"]["wav"], "wav.csv");

    let mut loaded = Dataset::load(&manifest).unwrap();
    assert_eq!(loaded.recordings_value("wav", true).unwrap().storage_path("r1"), Some("/wav/r1.flac"));
}

#[test]
fn absent_groups_stay_absent() {
    let out = tempfile::tempdir().unwrap();
    let mut ds = Dataset::from_segments(segments()).with_classes(TableGroup::new());
    ds.save(out.path()).unwrap();

    let text = std::fs::read_to_string(out.path().join("dataset.yaml")).unwrap();
    assert!(!text.contains("features"));
    assert!(text.contains("classes"));

    let mut loaded = Dataset::load(out.path()).unwrap();
    assert!(loaded.features_group().is_none());
    assert!(loaded.classes_group().unwrap().is_empty());
    assert_eq!(loaded.features(true).count(), 0);
    assert_eq!(loaded.configured_groups(), vec!["classes"]);
}

#[test]
fn missing_segments_fails_before_table_io() {
    let dir = tempfile::tempdir().unwrap();
    // the referenced feature file does not exist; only the manifest is read
    write(dir.path(), "dataset.yaml", "features:\n  mfcc: mfcc.csv\n");

    let err = Dataset::load_with(dir.path(), LoadOptions::default().lazy(false)).unwrap_err();
    assert!(
        matches!(err, DatasetError::MissingMandatoryField { field: "segments", .. }),
        "{err}"
    );
}

#[test]
fn missing_manifest_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = Dataset::load(dir.path()).unwrap_err();
    assert!(matches!(err, DatasetError::NotFound { kind: "manifest", .. }));
}

#[test]
fn loading_does_not_touch_the_manifest() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "segments.csv", "id\ns1\n");
    let text = "segments: segments.csv\n";
    let manifest = write(dir.path(), "dataset.yaml", text);

    Dataset::load(dir.path()).unwrap();
    assert_eq!(std::fs::read_to_string(manifest).unwrap(), text);
}

#[test]
fn lazy_load_defers_reading() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "dataset.yaml", "segments: segments.csv\nfeatures:\n  mfcc: mfcc.csv\n");

    // neither table exists yet, lazy loading still succeeds
    let mut ds = Dataset::load(dir.path()).unwrap();
    assert!(matches!(ds.segments(true), Err(DatasetError::NotFound { .. })));

    write(dir.path(), "segments.csv", "id\ns1\n");
    write(dir.path(), "mfcc.csv", "id,storage_path\ns1,a\n");
    assert_eq!(ds.segments(true).unwrap().len(), 1);
    assert_eq!(ds.features_value("mfcc", true).unwrap().len(), 1);
}

#[test]
fn eager_load_materializes_everything() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    mixed_dataset(src.path()).save(out.path()).unwrap();

    let ds = Dataset::load_with(out.path(), LoadOptions::default().lazy(false)).unwrap();
    assert!(ds.segments_slot().is_materialized());
    assert!(ds.recordings_group().unwrap().iter().all(|(_, s)| s.is_materialized()));
    assert!(ds.features_group().unwrap().iter().all(|(_, s)| s.is_materialized()));
    assert!(ds.classes_group().unwrap().iter().all(|(_, s)| s.is_materialized()));
    assert!(ds.enrollments_group().unwrap().iter().all(|(_, s)| s.is_materialized()));
    assert!(ds.trials_group().unwrap().iter().all(|(_, s)| s.is_materialized()));

    // nothing is read again once materialized
    std::fs::remove_dir_all(out.path()).unwrap();
    let mut ds = ds;
    assert_eq!(ds.segments(true).unwrap().len(), 3);
}

#[test]
fn eager_load_propagates_bad_tables() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "segments.csv", "id\ns1\n");
    write(dir.path(), "spk.csv", "name\nalice\n");
    write(dir.path(), "dataset.yaml", "segments: segments.csv\nclasses:\n  speaker: spk.csv\n");

    let err = Dataset::load_with(dir.path(), LoadOptions::default().lazy(false)).unwrap_err();
    assert!(
        matches!(&err, DatasetError::Member { group: "classes", key, .. } if key == "speaker"),
        "{err}"
    );
    assert!(matches!(err.root(), DatasetError::Format { kind: "classes", .. }), "{err}");
}

#[test]
fn absolute_manifest_entries_are_kept() {
    let data = tempfile::tempdir().unwrap();
    let meta = tempfile::tempdir().unwrap();
    let segs = write(data.path(), "segs.csv", "id\ns1\ns2\n");
    write(
        meta.path(),
        "dataset.yaml",
        &format!("segments: {}\n", segs.display()),
    );

    let ds = Dataset::load(meta.path()).unwrap();
    assert_eq!(ds.segments_slot().path(), Some(segs.as_path()));
}

#[test]
fn trials_fallback_and_sparse_flag_after_load() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "segments.csv", "id\ns1\n");
    write(dir.path(), "key.csv", "modelid,segmentid,targettype\nm1,s1,target\n");
    write(dir.path(), "ndx.csv", "modelid,segmentid\nm1,s1\n");
    write(
        dir.path(),
        "dataset.yaml",
        "segments: segments.csv\ntrials:\n  key: key.csv\n  ndx: ndx.csv\n",
    );

    let mut dense = Dataset::load(dir.path()).unwrap();
    let kinds: Vec<(String, &'static str)> = dense
        .trials(false)
        .map(|e| e.map(|(k, t)| (k.to_string(), t.kind())))
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        kinds,
        vec![("key".to_string(), "trial key"), ("ndx".to_string(), "trial index")]
    );

    let mut sparse =
        Dataset::load_with(dir.path(), LoadOptions::default().sparse_trials(true)).unwrap();
    assert!(matches!(&*sparse.trials_value("key", true).unwrap(), Trials::SparseKey(_)));
    assert!(matches!(&*sparse.trials_value("ndx", true).unwrap(), Trials::Ndx(_)));
}

#[test]
fn slots_built_by_hand() {
    let dir = tempfile::tempdir().unwrap();
    let classes = write(dir.path(), "lang.csv", "id\nen\nfr\n");
    let ndx = TrialNdx::new(
        &Table::new(["modelid", "segmentid"], rows(&[&["m", "s"]])).unwrap(),
    )
    .unwrap();
    let mut ds = Dataset::new(Slot::Materialized(segments()))
        .with_classes([("lang", Slot::<ClassInfo>::reference(&classes))].into_iter().collect())
        .with_recordings(TableGroup::<RecordingSet>::new())
        .with_enrollments(TableGroup::<EnrollmentMap>::new())
        .with_trials(TableGroup::new().with_table("dev", ndx.into()));

    assert_eq!(ds.classes_value("lang", true).unwrap().class_idx("fr"), Some(1));
    assert_eq!(ds.trials_value("dev", true).unwrap().num_trials(), 1);
    assert_eq!(ds.recordings(true).count(), 0);
}

#[test]
fn clashing_file_names_are_rejected_before_writing() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let feats = write(src.path(), "f.csv", "id,storage_path\ns1,a.ark:1\n");
    let spk = write(src.path(), "c.csv", "id\nalice\n");
    let mut ds = Dataset::from_segments(segments())
        .with_features(TableGroup::new().with_path("eval", &feats))
        .with_classes(TableGroup::new().with_path("eval", &spk));

    let err = ds.save(out.path()).unwrap_err();
    assert!(
        matches!(err, DatasetError::DuplicateFileName { first: "features", second: "classes", .. }),
        "{err}"
    );
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);

    // the registry still reads its own tables
    assert_eq!(ds.features_value("eval", false).unwrap().len(), 1);
    assert_eq!(ds.classes_value("eval", false).unwrap().num_classes(), 1);
    assert_eq!(ds.features_group().unwrap().get("eval").unwrap().path(), Some(feats.as_path()));
}

#[test]
fn group_key_may_not_shadow_segments() {
    let out = tempfile::tempdir().unwrap();
    let mut ds = Dataset::from_segments(segments())
        .with_features(TableGroup::new().with_table("segments", features()));

    let err = ds.save(out.path()).unwrap_err();
    assert!(
        matches!(err, DatasetError::DuplicateFileName { first: "segments", second: "features", .. }),
        "{err}"
    );
}

#[test]
fn failed_save_leaves_written_slots_readable() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let recordings = write(src.path(), "rec.csv", "id,storage_path\nr1,/wav/r1.flac\n");
    let mut ds = Dataset::from_segments(segments())
        .with_table_sep(Some(b','))
        .with_recordings(TableGroup::new().with_path("wav", recordings))
        .with_features(TableGroup::new().with_path("mfcc", src.path().join("missing.csv")));

    let err = ds
        .save_with(out.path(), SaveOptions::default().table_sep(Some(b'\t')))
        .unwrap_err();
    assert!(
        matches!(&err, DatasetError::Member { group: "features", key, .. } if key == "mfcc"),
        "{err}"
    );
    assert!(matches!(err.root(), DatasetError::NotFound { .. }));
    assert!(!out.path().join("dataset.yaml").exists());

    let wav = ds.recordings_group().unwrap().get("wav").unwrap();
    assert_eq!(wav.path(), Some(out.path().join("wav.tsv").as_path()));
    assert_eq!(ds.table_sep, Some(b'\t'));
    assert_eq!(
        ds.recordings_value("wav", false).unwrap().storage_path("r1"),
        Some("/wav/r1.flac")
    );
}

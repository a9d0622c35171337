use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{json, Map, Value};

use dataset_registry::{Dataset, LoadOptions, SaveOptions};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// Inspect a dataset manifest and optionally copy the dataset elsewhere
#[derive(Parser, Debug)]
#[command(name = "dataset-registry", version, about, long_about = None)]
struct Args {
    /// Dataset directory or manifest file
    dataset: PathBuf,

    /// Read every table before printing the summary
    #[arg(long)]
    eager: bool,

    /// Read trial keys with the sparse parser
    #[arg(long)]
    sparse_trials: bool,

    /// Write a copy of the dataset into DIR
    #[arg(long, value_name = "DIR")]
    copy_to: Option<PathBuf>,

    /// Write the copy as tab separated tables
    #[arg(long, requires = "copy_to")]
    tsv: bool,
}

// ---------------------------------------------------------------------------
// Summary: group → key → number of rows / trials
// ---------------------------------------------------------------------------

fn summarize(ds: &mut Dataset, keep_loaded: bool) -> Result<Value> {
    let mut summary = Map::new();
    summary.insert("segments".into(), json!(ds.segments(keep_loaded)?.len()));

    let mut group = Map::new();
    for entry in ds.recordings(keep_loaded) {
        let (key, table) = entry?;
        group.insert(key.to_string(), json!(table.len()));
    }
    if ds.recordings_group().is_some() {
        summary.insert("recordings".into(), Value::Object(std::mem::take(&mut group)));
    }

    for entry in ds.features(keep_loaded) {
        let (key, table) = entry?;
        group.insert(key.to_string(), json!(table.len()));
    }
    if ds.features_group().is_some() {
        summary.insert("features".into(), Value::Object(std::mem::take(&mut group)));
    }

    for entry in ds.classes(keep_loaded) {
        let (key, table) = entry?;
        group.insert(key.to_string(), json!(table.num_classes()));
    }
    if ds.classes_group().is_some() {
        summary.insert("classes".into(), Value::Object(std::mem::take(&mut group)));
    }

    for entry in ds.enrollments(keep_loaded) {
        let (key, table) = entry?;
        group.insert(key.to_string(), json!(table.len()));
    }
    if ds.enrollments_group().is_some() {
        summary.insert("enrollments".into(), Value::Object(std::mem::take(&mut group)));
    }

    for entry in ds.trials(keep_loaded) {
        let (key, trials) = entry?;
        group.insert(
            key.to_string(),
            json!({ "kind": trials.kind(), "trials": trials.num_trials() }),
        );
    }
    if ds.trials_group().is_some() {
        summary.insert("trials".into(), Value::Object(group));
    }

    Ok(Value::Object(summary))
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let options = LoadOptions::default()
        .lazy(!args.eager)
        .sparse_trials(args.sparse_trials);
    let mut ds = Dataset::load_with(&args.dataset, options)
        .with_context(|| format!("loading dataset {}", args.dataset.display()))?;

    // Tables are only worth caching when they will be written out again.
    let summary = summarize(&mut ds, args.copy_to.is_some())?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let Some(dir) = &args.copy_to {
        let sep = if args.tsv { Some(b'\t') } else { None };
        let manifest = ds
            .save_with(dir, SaveOptions::default().update_paths(false).table_sep(sep))
            .with_context(|| format!("saving dataset to {}", dir.display()))?;
        eprintln!("wrote {}", manifest.display());
    }

    Ok(())
}

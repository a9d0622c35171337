//! Write a small synthetic speaker-verification dataset.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use dataset_registry::{
    ClassInfo, Dataset, EnrollmentMap, FeatureSet, RecordingSet, SaveOptions,
    SegmentSet, Table, TableGroup, TrialKey, TrialNdx, Trials,
};

const NUM_SPEAKERS: usize = 12;
const SEGMENTS_PER_SPEAKER: usize = 6;
const ENROLL_PER_SPEAKER: usize = 2;
const TRIALS_PER_MODEL: usize = 8;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_f64() * n as f64) as usize % n.max(1)
    }
}

fn cells<const N: usize>(values: [String; N]) -> Vec<String> {
    values.into()
}

/// Write a deterministic synthetic speaker-verification dataset
#[derive(Parser, Debug)]
#[command(name = "generate_sample", about, long_about = None)]
struct Args {
    /// Output directory or manifest file
    #[arg(default_value = "sample_dataset")]
    dir: PathBuf,

    /// Write tab separated tables
    #[arg(long)]
    tsv: bool,
}

struct Segment {
    id: String,
    speaker: usize,
    index: usize,
    recording: String,
    duration: f64,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let sep = args.tsv.then_some(b'\t');

    let mut rng = SimpleRng::new(42);

    let segments: Vec<Segment> = (0..NUM_SPEAKERS)
        .flat_map(|spk| (0..SEGMENTS_PER_SPEAKER).map(move |i| (spk, i)))
        .map(|(spk, i)| Segment {
            id: format!("spk{spk:03}-utt{i:02}"),
            speaker: spk,
            index: i,
            recording: format!("rec{spk:03}-{:02}", i / 2),
            duration: 2.0 + rng.next_f64() * 8.0,
        })
        .collect();

    let segment_table = Table::new(
        ["id", "class_id", "recording_id", "duration"],
        segments.iter().map(|s| {
            cells([
                s.id.clone(),
                format!("spk{:03}", s.speaker),
                s.recording.clone(),
                format!("{:.2}", s.duration),
            ])
        }),
    )?;

    let mut recording_ids: Vec<&str> = segments.iter().map(|s| s.recording.as_str()).collect();
    recording_ids.dedup();
    let recording_table = Table::new(
        ["id", "storage_path", "sample_freq"],
        recording_ids
            .iter()
            .map(|r| cells([r.to_string(), format!("wav/{r}.flac"), "16000".to_string()])),
    )?;

    let feature_table = |name: &str| {
        Table::new(
            ["id", "storage_path"],
            segments
                .iter()
                .map(|s| cells([s.id.clone(), format!("{name}.ark:{}", s.id)])),
        )
    };

    let speaker_table = Table::new(
        ["id"],
        (0..NUM_SPEAKERS).map(|spk| cells([format!("spk{spk:03}")])),
    )?;

    // The first segments of each speaker enroll its model; the rest are test.
    let (enroll, tests): (Vec<&Segment>, Vec<&Segment>) =
        segments.iter().partition(|s| s.index < ENROLL_PER_SPEAKER);
    let enroll_table = Table::new(
        ["modelid", "segmentid"],
        enroll
            .iter()
            .map(|s| cells([format!("spk{:03}", s.speaker), s.id.clone()])),
    )?;

    let mut trial_rows = Vec::new();
    for model in 0..NUM_SPEAKERS {
        for _ in 0..TRIALS_PER_MODEL {
            let seg = tests[rng.below(tests.len())];
            let label = if seg.speaker == model { "target" } else { "nontarget" };
            trial_rows.push(cells([format!("spk{model:03}"), seg.id.clone(), label.to_string()]));
        }
    }
    let ndx_rows = trial_rows.iter().map(|r| cells([r[0].clone(), r[1].clone()]));
    let ndx = TrialNdx::new(&Table::new(["modelid", "segmentid"], ndx_rows)?)?;
    let key = TrialKey::new(&Table::new(["modelid", "segmentid", "targettype"], trial_rows)?)?;
    let trials = TableGroup::new()
        .with_table("eval_key", Trials::Key(key))
        .with_table("eval_ndx", Trials::Ndx(ndx));

    let mut dataset = Dataset::from_segments(SegmentSet::new(segment_table)?)
        .with_recordings(TableGroup::new().with_table("wav", RecordingSet::new(recording_table)?))
        .with_features(
            TableGroup::new()
                .with_table("mfcc", FeatureSet::new(feature_table("mfcc")?)?)
                .with_table("fbank80", FeatureSet::new(feature_table("fbank80")?)?),
        )
        .with_classes(TableGroup::new().with_table("speaker", ClassInfo::new(speaker_table)?))
        .with_enrollments(TableGroup::new().with_table("eval", EnrollmentMap::new(enroll_table)?))
        .with_trials(trials);

    let manifest = dataset
        .save_with(&args.dir, SaveOptions::default().table_sep(sep))
        .with_context(|| format!("writing dataset to {}", args.dir.display()))?;

    println!(
        "Wrote {} segments for {} speakers → {}",
        segments.len(),
        NUM_SPEAKERS,
        manifest.display()
    );
    Ok(())
}

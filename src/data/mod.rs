/// Table layer: the tabular kinds a dataset is made of, and the slots that
/// hold them.
///
/// Architecture:
/// ```text
///  segments.csv / mfcc.tsv / eval.lst
///        │
///        ▼
///   ┌──────────┐
///   │  table    │  delimited or whitespace file → Table
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │ kinds/trials  │  Table → SegmentSet, FeatureSet, TrialKey, ...
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  slot     │  Materialized(table) | Reference(path), read on demand
///   └──────────┘
/// ```

pub mod kinds;
pub mod slot;
pub mod table;
pub mod trials;

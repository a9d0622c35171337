//! Lazy-loading registry for the tables that describe one experimental
//! dataset (segments, recordings, features, classes, enrollments, trials),
//! persisted as a directory of table files plus a single manifest.
//!
//! ```no_run
//! use dataset_registry::{Dataset, LoadOptions};
//!
//! # fn main() -> dataset_registry::Result<()> {
//! let mut ds = Dataset::load_with("data/voxceleb", LoadOptions::default().sparse_trials(true))?;
//! println!("{} segments", ds.segments(true)?.len());
//! for entry in ds.features(false) {
//!     let (name, table) = entry?;
//!     println!("{name}: {} rows", table.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod dataset;
pub mod error;
pub mod manifest;
pub mod paths;
pub mod persist;

pub use data::kinds::{ClassInfo, EnrollmentMap, FeatureSet, Loadable, RecordingSet, SegmentSet};
pub use data::slot::{Slot, TableGroup};
pub use data::table::Table;
pub use data::trials::{SparseTrialKey, TrialKey, TrialNdx, Trials};
pub use dataset::Dataset;
pub use error::{DatasetError, Result};
pub use persist::{LoadOptions, SaveOptions};

//! Clinical event datasets.
//!
//! [`BaseDataset`] unifies configured source tables into one lazy event
//! relation, materializes it once on demand, and exposes per-patient views
//! and task application on top of it:
//!
//! ```ignore
//! use ehr_core::{BaseDataset, FnTask};
//!
//! let dataset = BaseDataset::new(
//!     "/data/mimiciii/1.4",
//!     ["diagnoses_icd", "procedures_icd"],
//!     Some("mimic3"),
//!     "configs/mimic3.yaml",
//! )?;
//! println!("{}", dataset.stats()?);
//!
//! let patient = dataset.get_patient("10006")?;
//! let samples = dataset.set_task(Some(&my_task))?;
//! ```

mod dataset;
mod error;
pub mod logging;
mod patient;
mod task;
mod unify;

pub use dataset::{BaseDataset, DEFAULT_DATASET_NAME, DatasetBuilder, DatasetStats};
pub use error::{DatasetError, Result};
pub use patient::{Patient, PatientIter};
pub use task::{FnTask, SampleDataset, Task};
pub use unify::load_data;

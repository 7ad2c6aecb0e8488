//! # irms-sort
//!
//! Imports GC-IRMS run exports and sorts their peaks for correction:
//! linearity standards, drift standards and unknown samples, each peak
//! labelled with its carbon-chain length from its retention time.
//!
//! ```text
//! load_file → normalize → segregate → classify (×3) → ClassifiedRun
//! ```

pub mod app;
pub mod classify;
pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod runlog;
pub mod ui;

pub use classify::{CandidateResolver, MatchBand, NearTie, Resolution};
pub use data::model::{
    ChainLength, CorrectionLog, IsotopeMode, PeakRecord, ReferenceTable, RunTable,
};
pub use error::{Error, PromptError, Result};
pub use pipeline::{process_run, ClassifiedRun, Operator};

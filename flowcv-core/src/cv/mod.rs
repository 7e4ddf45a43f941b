//! Cross-validation harness: fold construction, per-fold solver runs, and
//! trace recording.

pub mod folds;
pub mod harness;
pub mod trace;

pub use folds::{Fold, KFold};
pub use harness::CrossValidation;
pub use trace::{IterationTrace, TraceRecorder};

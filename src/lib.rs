//! Near-duplicate frame culling for folders of still images.
//!
//! [`FrameDiffer`] scores how much two equally sized frames differ, and
//! [`Deduplicator`] walks a folder's frames once, keeping only those that
//! differ from their predecessor and from every frame kept so far.

pub mod core;

pub use crate::core::config::{ConfigError, DedupConfig};
pub use crate::core::dedup::{
    ClassificationRecord, ClassificationReport, DedupError, DedupOutcome, Deduplicator,
    MatchPath, Verdict,
};
pub use crate::core::differ::{DiffError, DiffResult, FrameDiffer, Region};
pub use crate::core::loader::{Frame, LoadError, RejectReason, Rejection};
pub use crate::core::output::{OutputError, RunReport, RunStatus};
pub use crate::core::progress::{Phase, Progress, ProgressCallback};

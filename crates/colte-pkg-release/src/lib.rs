//! colte-pkg release pipeline
//!
//! Publishes the contents of the shared `build-volume` into a package
//! archive (reprepro) and exports it.

pub mod archive;
pub mod publisher;

pub use archive::{is_already_included, ArchiveTool, IncludeOutcome, Reprepro};
pub use publisher::{finalize, publish, PublishFailure, PublishReport, ReleasePipeline};

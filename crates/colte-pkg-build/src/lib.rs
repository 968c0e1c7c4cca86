//! colte-pkg build pipeline
//!
//! Checks out the configured source repositories and builds their
//! packages into the shared `build-volume`:
//! - containerized targets: one `docker build` + `docker run` per distribution
//! - native targets: the repository's own build script, then artifact collection

pub mod checkout;
pub mod container;
pub mod native;
pub mod pipeline;
pub mod workspace;

pub use checkout::{checkout, resolved_revision, verify_origin};
pub use container::{build_image, current_uid, run_build};
pub use native::{collect_artifacts, run_native_build};
pub use pipeline::{
    BuildPipeline, BuildPlan, BuildSummary, CheckoutRecord, RefSelection, StepRecord,
};
pub use workspace::{clean_workspace, setup_workspace};

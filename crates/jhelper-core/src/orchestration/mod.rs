//! Install and update orchestration.
//!
//! Both orchestrators run their steps strictly in sequence through a
//! [`CommandRunner`](crate::process::CommandRunner), publish progress on the
//! channel passed to each call, and convert every failure into a single
//! [`OperationResult`]. Nothing escapes as an `Err`.

mod install;
mod pipeline;
pub mod plan;
mod result;
mod update;

pub use install::InstallOrchestrator;
pub use plan::Toolchain;
pub use result::{OperationResult, OperationStatus};
pub use update::{UpdateMethod, UpdateOrchestrator};

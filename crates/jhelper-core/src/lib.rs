//! jhelper Core Library
//!
//! Installs, updates and runs a git-hosted Python command-line tool:
//! ordered external steps with live progress, a generated launcher, two
//! update strategies and interactive script sessions.

pub mod config;
pub mod context;
pub mod error;
pub mod orchestration;
pub mod probe;
pub mod process;
pub mod progress;
pub mod session;
pub mod state;
pub mod step;
pub mod wrapper;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{Settings, SettingsStore, ToolConfigStore};
    pub use crate::context::AppContext;

    // Orchestration
    pub use crate::orchestration::{
        InstallOrchestrator, OperationResult, OperationStatus, UpdateMethod, UpdateOrchestrator,
    };
    pub use crate::progress::{ProgressChannel, ProgressEvent};
    pub use crate::step::StepTag;

    // Processes
    pub use crate::error::{ErrorKind, StepError};
    pub use crate::process::{CommandRunner, ProcessExecutor};

    // Sessions
    pub use crate::session::{ScriptOutput, ScriptResult, SessionBridge, SessionHandle};
}

//! The Camelot endpoint: a locally spawned child process spoken to over stdio.
//!
//! - `launch`: OS-specific command selection ([`LaunchStrategy`], [`LaunchPlan`]).
//! - `supervisor`: spawning, stdio ownership, and termination of the child.

pub mod launch;
pub mod supervisor;

pub use launch::{LaunchPlan, LaunchStrategy, TargetOs};
pub use supervisor::{CamelotChild, ChildProcessSupervisor};

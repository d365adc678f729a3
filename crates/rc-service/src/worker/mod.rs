//! Worker processes: the launch contract and process supervision.

pub mod launch;
pub mod process;

pub use launch::{LaunchConfig, LaunchConfigBuilder, LaunchConfigError};
pub use process::{
    wait_for_exit, CommandLauncher, ExitInfo, ProcessCommand, ProcessEvent, ProcessObserver,
    ProcessReport, WorkerHandle, WorkerLauncher,
};

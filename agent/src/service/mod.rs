//! Windows service installation, lifecycle control and hosting.

pub mod plan;

#[cfg(target_os = "windows")]
pub mod control;
#[cfg(target_os = "windows")]
pub mod deploy;
#[cfg(target_os = "windows")]
pub mod host;
#[cfg(target_os = "windows")]
pub mod install;
#[cfg(target_os = "windows")]
pub mod uninstall;

pub use plan::{DeploymentPlan, LifecycleStep, RecoveryPolicy};

//! The service deployment sequence as data.
//!
//! On Windows the steps are executed through the Service Control Manager
//! API; everywhere they can be rendered as the equivalent `sc.exe` lines
//! for operators who script deployments by hand.

use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::config::{AgentConfig, Recovery};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPolicy {
    pub restart_delays: Vec<Duration>,
    pub reset_after: Duration,
}

impl From<&Recovery> for RecoveryPolicy {
    fn from(r: &Recovery) -> Self {
        Self {
            restart_delays: r.restart_delays_ms.iter().map(|ms| Duration::from_millis(*ms)).collect(),
            reset_after: Duration::from_secs(r.reset_after_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleStep {
    Stop,
    Delete,
    Create {
        display_name: String,
        executable: PathBuf,
        arguments: Vec<String>,
    },
    ConfigureAutoStart,
    ConfigureFailureActions(RecoveryPolicy),
    Start,
}

impl LifecycleStep {
    /// Stop and delete target a service that may not exist yet.
    pub fn is_best_effort(&self) -> bool {
        matches!(self, Self::Stop | Self::Delete)
    }
}

#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    pub service_name: String,
    pub description: String,
    pub steps: Vec<LifecycleStep>,
}

/// Arguments the SCM passes to the executable when it starts the service.
pub fn launch_arguments(config_path: Option<&Path>) -> Vec<String> {
    let mut args = vec!["run".to_string()];
    if let Some(p) = config_path {
        args.push("--config".into());
        args.push(p.display().to_string());
    }
    args
}

impl DeploymentPlan {
    /// Stop, delete, create, auto-start, failure actions, start.
    pub fn new(cfg: &AgentConfig, executable: &Path, config_path: Option<&Path>) -> Self {
        Self {
            service_name: cfg.service.name.clone(),
            description: cfg.service.description.clone(),
            steps: vec![
                LifecycleStep::Stop,
                LifecycleStep::Delete,
                LifecycleStep::Create {
                    display_name: cfg.service.display_name.clone(),
                    executable: executable.to_path_buf(),
                    arguments: launch_arguments(config_path),
                },
                LifecycleStep::ConfigureAutoStart,
                LifecycleStep::ConfigureFailureActions((&cfg.service.recovery).into()),
                LifecycleStep::Start,
            ],
        }
    }

    pub fn render_sc(&self) -> Vec<String> {
        self.steps.iter().map(|s| render_sc(&self.service_name, s)).collect()
    }
}

fn quote(arg: &str) -> String {
    if arg.is_empty() || arg.contains([' ', '\t']) {
        format!("\"{arg}\"")
    } else {
        arg.to_string()
    }
}

pub fn command_line(executable: &Path, arguments: &[String]) -> String {
    std::iter::once(quote(&executable.display().to_string()))
        .chain(arguments.iter().map(|a| quote(a)))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn render_sc(service: &str, step: &LifecycleStep) -> String {
    match step {
        LifecycleStep::Stop => format!("sc stop {service}"),
        LifecycleStep::Delete => format!("sc delete {service}"),
        LifecycleStep::Create {
            display_name,
            executable,
            arguments,
        } => format!(
            "sc create {service} binPath= \"{}\" DisplayName= \"{display_name}\"",
            command_line(executable, arguments).replace('"', "\\\"")
        ),
        LifecycleStep::ConfigureAutoStart => format!("sc config {service} start= auto"),
        LifecycleStep::ConfigureFailureActions(policy) => {
            format!("sc failure {service} {policy}")
        }
        LifecycleStep::Start => format!("sc start {service}"),
    }
}

impl fmt::Display for RecoveryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actions = self
            .restart_delays
            .iter()
            .map(|d| format!("restart/{}", d.as_millis()))
            .collect::<Vec<_>>()
            .join("/");
        write!(f, "reset= {} actions= {}", self.reset_after.as_secs(), actions)
    }
}

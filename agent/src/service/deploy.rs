use anyhow::{Context, Result};
use std::{
    path::Path,
    time::{Duration, Instant},
};
use tracing::{info, warn};
use windows_service::{
    service::{ServiceAccess, ServiceStartType},
    service_manager::{ServiceManager, ServiceManagerAccess},
};

use super::{
    control::{start_service, stop_service},
    install::{apply_recovery, service_info},
    plan::{render_sc, DeploymentPlan, LifecycleStep},
};
use crate::config::AgentConfig;

const DELETE_TIMEOUT: Duration = Duration::from_secs(15);

/// A deleted service lingers until every handle to it is closed; creating
/// one with the same name before that fails.
fn wait_until_gone(mgr: &ServiceManager, name: &str) -> Result<()> {
    let deadline = Instant::now() + DELETE_TIMEOUT;
    while mgr.open_service(name, ServiceAccess::QUERY_STATUS).is_ok() {
        if Instant::now() >= deadline {
            anyhow::bail!("service {name} is still marked for deletion");
        }
        std::thread::sleep(Duration::from_millis(250));
    }
    Ok(())
}

fn run_step(mgr: &ServiceManager, cfg: &AgentConfig, plan: &DeploymentPlan, step: &LifecycleStep) -> Result<()> {
    let name = plan.service_name.as_str();
    match step {
        LifecycleStep::Stop => stop_service(name),
        LifecycleStep::Delete => {
            let svc = mgr.open_service(name, ServiceAccess::DELETE).context("open service")?;
            svc.delete().context("delete service")?;
            drop(svc);
            wait_until_gone(mgr, name)
        }
        LifecycleStep::Create {
            executable,
            arguments,
            ..
        } => {
            let info = service_info(cfg, executable, arguments);
            let svc = mgr.create_service(&info, ServiceAccess::all()).context("create service")?;
            svc.set_description(&plan.description).context("set description")?;
            Ok(())
        }
        LifecycleStep::ConfigureAutoStart => {
            let svc = mgr
                .open_service(name, ServiceAccess::QUERY_CONFIG | ServiceAccess::CHANGE_CONFIG)
                .context("open service")?;
            if svc.query_config().context("query config")?.start_type == ServiceStartType::AutoStart {
                return Ok(());
            }
            let (executable, arguments) = plan
                .steps
                .iter()
                .find_map(|s| match s {
                    LifecycleStep::Create {
                        executable,
                        arguments,
                        ..
                    } => Some((executable, arguments)),
                    _ => None,
                })
                .context("plan has no create step")?;
            svc.change_config(&service_info(cfg, executable, arguments))
                .context("set auto start")
        }
        LifecycleStep::ConfigureFailureActions(policy) => {
            let svc = mgr
                .open_service(name, ServiceAccess::CHANGE_CONFIG | ServiceAccess::START)
                .context("open service")?;
            apply_recovery(&svc, policy)
        }
        LifecycleStep::Start => start_service(name),
    }
}

/// Replaces any existing installation with a fresh, auto-starting service
/// that the SCM restarts on failure.
pub fn deploy_service(cfg: &AgentConfig, config_path: Option<&Path>) -> Result<()> {
    let mgr = ServiceManager::local_computer(
        None::<&str>,
        ServiceManagerAccess::CONNECT | ServiceManagerAccess::CREATE_SERVICE,
    )?;
    let exe = std::env::current_exe().context("current_exe")?;
    let plan = DeploymentPlan::new(cfg, &exe, config_path);
    for step in &plan.steps {
        let line = render_sc(&plan.service_name, step);
        match run_step(&mgr, cfg, &plan, step) {
            Ok(()) => info!(step = %line, "deploy step done"),
            Err(e) if step.is_best_effort() => warn!(step = %line, error = %e, "deploy step skipped"),
            Err(e) => return Err(e.context(line)),
        }
    }
    Ok(())
}

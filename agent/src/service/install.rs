use anyhow::{Context, Result};
use std::{ffi::OsString, path::Path};
use tracing::info;
use windows_service::{
    service::{
        Service, ServiceAccess, ServiceAction, ServiceActionType, ServiceErrorControl,
        ServiceFailureActions, ServiceFailureResetPeriod, ServiceInfo, ServiceStartType,
        ServiceType,
    },
    service_manager::{ServiceManager, ServiceManagerAccess},
};

use super::plan::{launch_arguments, RecoveryPolicy};
use crate::config::AgentConfig;

pub(crate) fn service_info(cfg: &AgentConfig, executable: &Path, arguments: &[String]) -> ServiceInfo {
    ServiceInfo {
        name: OsString::from(&cfg.service.name),
        display_name: OsString::from(&cfg.service.display_name),
        service_type: ServiceType::OWN_PROCESS,
        start_type: ServiceStartType::AutoStart,
        error_control: ServiceErrorControl::Normal,
        executable_path: executable.to_path_buf(),
        launch_arguments: arguments.iter().map(OsString::from).collect(),
        dependencies: vec![],
        account_name: None,
        account_password: None,
    }
}

/// Restart actions also apply when the process exits with a non-zero
/// service exit code, not only on crashes.
pub(crate) fn apply_recovery(svc: &Service, policy: &RecoveryPolicy) -> Result<()> {
    let actions = policy
        .restart_delays
        .iter()
        .map(|delay| ServiceAction {
            action_type: ServiceActionType::Restart,
            delay: *delay,
        })
        .collect();
    svc.update_failure_actions(ServiceFailureActions {
        reset_period: ServiceFailureResetPeriod::After(policy.reset_after),
        reboot_msg: None,
        command: None,
        actions: Some(actions),
    })
    .context("set failure actions")?;
    svc.set_failure_actions_on_non_crash_failures(true)
        .context("enable failure actions for non-crash failures")?;
    Ok(())
}

pub fn install_service(cfg: &AgentConfig, config_path: Option<&Path>, start: bool) -> Result<()> {
    let mgr = ServiceManager::local_computer(
        None::<&str>,
        ServiceManagerAccess::CONNECT | ServiceManagerAccess::CREATE_SERVICE,
    )?;
    let exe = std::env::current_exe().context("current_exe")?;
    let info = service_info(cfg, &exe, &launch_arguments(config_path));
    let svc = mgr
        .create_service(&info, ServiceAccess::all())
        .context("create service")?;
    svc.set_description(&cfg.service.description)
        .context("set description")?;
    apply_recovery(&svc, &(&cfg.service.recovery).into())?;
    info!(service = %cfg.service.name, exe = %exe.display(), "service installed");
    if start {
        svc.start::<&str>(&[]).context("start service")?;
        info!(service = %cfg.service.name, "service started");
    }
    Ok(())
}

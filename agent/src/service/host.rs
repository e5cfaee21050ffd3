//! Running under the Service Control Manager.

use anyhow::{Context, Result};
use std::{ffi::OsString, sync::OnceLock, time::Duration};
use tokio::sync::watch;
use tracing::{error, info, warn};
use windows_service::{
    define_windows_service,
    service::{
        ServiceControl, ServiceControlAccept, ServiceExitCode, ServiceState, ServiceStatus,
        ServiceType,
    },
    service_control_handler::{self, ServiceControlHandlerResult, ServiceStatusHandle},
    service_dispatcher,
};

use crate::{config::AgentConfig, server, spooler};

static CONFIG: OnceLock<AgentConfig> = OnceLock::new();

define_windows_service!(ffi_service_main, service_main);

/// Hands the current thread to the SCM dispatcher. Fails quickly when the
/// process was not started by the SCM, e.g. from a console.
pub fn run_dispatcher(cfg: AgentConfig) -> windows_service::Result<()> {
    let name = cfg.service.name.clone();
    let _ = CONFIG.set(cfg);
    service_dispatcher::start(name, ffi_service_main)
}

fn status_for(state: ServiceState, exit_code: u32) -> ServiceStatus {
    let controls = if state == ServiceState::Running {
        ServiceControlAccept::STOP | ServiceControlAccept::SHUTDOWN
    } else {
        ServiceControlAccept::empty()
    };
    let exit_code = if exit_code == 0 {
        ServiceExitCode::Win32(0)
    } else {
        ServiceExitCode::ServiceSpecific(exit_code)
    };
    ServiceStatus {
        service_type: ServiceType::OWN_PROCESS,
        current_state: state,
        controls_accepted: controls,
        exit_code,
        checkpoint: 0,
        wait_hint: Duration::from_secs(if state == ServiceState::StopPending { 10 } else { 0 }),
        process_id: None,
    }
}

fn report(handle: &ServiceStatusHandle, state: ServiceState, exit_code: u32) {
    if let Err(e) = handle.set_service_status(status_for(state, exit_code)) {
        warn!(error = ?e, ?state, "failed to report service status to the SCM");
    }
}

fn service_main(_arguments: Vec<OsString>) {
    let Some(cfg) = CONFIG.get().cloned() else {
        error!("service started without configuration");
        return;
    };
    if let Err(e) = run_service(cfg) {
        error!(error = ?e, "service terminated with error");
    }
}

fn run_service(cfg: AgentConfig) -> Result<()> {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let event_handler = move |control_event| -> ServiceControlHandlerResult {
        match control_event {
            ServiceControl::Stop | ServiceControl::Shutdown => {
                info!("received stop/shutdown control");
                let _ = shutdown_tx.send(true);
                ServiceControlHandlerResult::NoError
            }
            ServiceControl::Interrogate => ServiceControlHandlerResult::NoError,
            _ => ServiceControlHandlerResult::NotImplemented,
        }
    };
    let handle = service_control_handler::register(&cfg.service.name, event_handler)
        .context("register service control handler")?;

    report(&handle, ServiceState::StartPending, 0);
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report(&handle, ServiceState::Stopped, 1);
            return Err(e).context("create tokio runtime");
        }
    };

    report(&handle, ServiceState::Running, 0);
    info!(service = %cfg.service.name, "service running");
    let result = runtime.block_on(async {
        let shutdown = async move {
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
        };
        server::serve(&cfg, spooler::default_backend(), shutdown).await
    });

    report(&handle, ServiceState::StopPending, 0);
    drop(runtime);
    // a non-zero exit code lets the recovery policy restart the service
    report(&handle, ServiceState::Stopped, if result.is_ok() { 0 } else { 1 });
    result
}

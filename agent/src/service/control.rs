use anyhow::{bail, Context, Result};
use std::time::{Duration, Instant};
use tracing::info;
use windows_service::{
    service::{Service, ServiceAccess, ServiceState},
    service_manager::{ServiceManager, ServiceManagerAccess},
};

const STATE_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

fn open(name: &str, access: ServiceAccess) -> Result<Service> {
    let mgr = ServiceManager::local_computer(None::<&str>, ServiceManagerAccess::CONNECT)?;
    mgr.open_service(name, access)
        .with_context(|| format!("open service {name}"))
}

pub(crate) fn wait_for_state(svc: &Service, want: ServiceState) -> Result<()> {
    let deadline = Instant::now() + STATE_TIMEOUT;
    loop {
        let st = svc.query_status().context("query service status")?;
        if st.current_state == want {
            return Ok(());
        }
        if Instant::now() >= deadline {
            bail!("service still {:?} after {:?}, expected {:?}", st.current_state, STATE_TIMEOUT, want);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

pub fn start_service(name: &str) -> Result<()> {
    let svc = open(name, ServiceAccess::START | ServiceAccess::QUERY_STATUS)?;
    if svc.query_status()?.current_state == ServiceState::Running {
        return Ok(());
    }
    svc.start::<&str>(&[]).context("start service")?;
    wait_for_state(&svc, ServiceState::Running)?;
    info!(service = %name, "service running");
    Ok(())
}

pub fn stop_service(name: &str) -> Result<()> {
    let svc = open(name, ServiceAccess::STOP | ServiceAccess::QUERY_STATUS)?;
    if svc.query_status()?.current_state == ServiceState::Stopped {
        return Ok(());
    }
    svc.stop().context("stop service")?;
    wait_for_state(&svc, ServiceState::Stopped)?;
    info!(service = %name, "service stopped");
    Ok(())
}

pub fn service_state(name: &str) -> Result<ServiceState> {
    let svc = open(name, ServiceAccess::QUERY_STATUS)?;
    Ok(svc.query_status()?.current_state)
}

use anyhow::{Context, Result};
use tracing::info;
use windows_service::{
    service::{ServiceAccess, ServiceState},
    service_manager::{ServiceManager, ServiceManagerAccess},
};

use super::control::wait_for_state;

pub fn uninstall_service(name: &str) -> Result<()> {
    let mgr = ServiceManager::local_computer(None::<&str>, ServiceManagerAccess::CONNECT)?;
    let svc = mgr
        .open_service(name, ServiceAccess::QUERY_STATUS | ServiceAccess::STOP | ServiceAccess::DELETE)
        .context("open service")?;
    if let Ok(st) = svc.query_status() {
        if st.current_state != ServiceState::Stopped {
            let _ = svc.stop();
            wait_for_state(&svc, ServiceState::Stopped)?;
        }
    }
    svc.delete().context("delete service")?;
    info!(service = %name, "service deleted");
    Ok(())
}

use crate::config::AgentConfig;
use anyhow::{Context, Result};
use std::{fs, path::Path};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,print_agent=info";

/// Installs the global subscriber. The returned guard flushes the file
/// writer on drop and must live as long as the process logs.
pub fn init_tracing(cfg: &AgentConfig, force_stdout: bool) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    if force_stdout || cfg.output.mode != "file" {
        tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).init();
        return Ok(None);
    }
    let path = cfg.log_file();
    let dir = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("creating log dir {}", dir.display()))?;
    let file_name = path
        .file_name()
        .with_context(|| format!("log path {} has no file name", path.display()))?;
    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (nb, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(nb)
        .with_ansi(false)
        .json()
        .flatten_event(true)
        .init();
    Ok(Some(guard))
}

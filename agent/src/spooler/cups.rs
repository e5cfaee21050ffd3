use super::{PrinterBackend, SpoolError};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::{io::AsyncWriteExt, process::Command};
use tracing::{debug, warn};

/// CUPS through its command line clients, available on macOS and most
/// Linux desktops without extra libraries.
#[derive(Debug, Clone)]
pub struct CupsBackend {
    lpstat: String,
    lp: String,
}

impl Default for CupsBackend {
    fn default() -> Self {
        Self::with_commands("lpstat", "lp")
    }
}

impl CupsBackend {
    pub fn with_commands(lpstat: impl Into<String>, lp: impl Into<String>) -> Self {
        Self {
            lpstat: lpstat.into(),
            lp: lp.into(),
        }
    }

    async fn lpstat_printers(&self) -> Result<Vec<String>, SpoolError> {
        let out = Command::new(&self.lpstat).arg("-p").output().await?;
        if !out.status.success() {
            return Err(SpoolError::Command {
                command: format!("{} -p", self.lpstat),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        Ok(parse_lpstat(&String::from_utf8_lossy(&out.stdout)))
    }
}

/// Printer names from `lpstat -p` lines such as
/// `printer POS80 is idle.  enabled since ...`.
pub fn parse_lpstat(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|l| l.starts_with("printer "))
        .filter_map(|l| l.split_whitespace().nth(1))
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl PrinterBackend for CupsBackend {
    async fn list_printers(&self) -> Result<Vec<String>, SpoolError> {
        match self.lpstat_printers().await {
            Ok(printers) => Ok(printers),
            Err(e) => {
                // no printers configured makes lpstat exit non-zero
                warn!(error = %e, "lpstat failed, reporting no printers");
                Ok(Vec::new())
            }
        }
    }

    async fn is_connected(&self, printer: &str) -> bool {
        match self.lpstat_printers().await {
            Ok(printers) => printers.iter().any(|p| p == printer),
            Err(_) => false,
        }
    }

    async fn send_raw(&self, printer: &str, doc_name: &str, data: &[u8]) -> Result<(), SpoolError> {
        debug!(printer, doc_name, bytes = data.len(), "submitting raw job to lp");
        let mut child = Command::new(&self.lp)
            .args(["-d", printer, "-o", "raw", "-t", doc_name])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            // lp may exit before reading everything; its status decides the outcome
            if let Err(e) = stdin.write_all(data).await {
                debug!(error = ?e, "lp closed stdin early");
            }
        }
        let out = child.wait_with_output().await?;
        if !out.status.success() {
            return Err(SpoolError::Command {
                command: format!("{} -d {printer} -o raw", self.lp),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lpstat_output() {
        let out = "printer POS80 is idle.  enabled since Mon 01 Jan 2024\n\
                   \tAlerts: none\n\
                   printer Office_Laser disabled since Tue\n\
                   scheduler is running\n";
        assert_eq!(parse_lpstat(out), vec!["POS80", "Office_Laser"]);
        assert!(parse_lpstat("").is_empty());
    }

    #[tokio::test]
    async fn failing_lpstat_lists_nothing() {
        let backend = CupsBackend::with_commands("false", "true");
        assert!(backend.list_printers().await.unwrap().is_empty());
        assert!(!backend.is_connected("POS80").await);
    }

    #[tokio::test]
    async fn lp_exit_status_decides_outcome() {
        let ok = CupsBackend::with_commands("false", "true");
        ok.send_raw("POS80", "Test", b"Success\n").await.unwrap();
        let failing = CupsBackend::with_commands("false", "false");
        let err = failing.send_raw("POS80", "Test", b"Success\n").await.unwrap_err();
        assert!(matches!(err, SpoolError::Command { .. }));
    }

    #[tokio::test]
    async fn missing_lp_binary_is_io_error() {
        let backend = CupsBackend::with_commands("false", "/nonexistent/lp-binary");
        let err = backend.send_raw("P", "Test", b"x").await.unwrap_err();
        assert!(matches!(err, SpoolError::Io(_)));
    }
}

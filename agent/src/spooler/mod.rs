//! Access to the operating system's printers.
//!
//! Jobs are always handed over in the spooler's raw mode: the bytes are
//! already ESC/POS and must reach the device untouched.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[cfg(unix)]
pub mod cups;
#[cfg(windows)]
pub mod winspool;

#[derive(Debug, Error)]
pub enum SpoolError {
    #[error("failed to enumerate printers: {0}")]
    Enumerate(String),
    #[error("failed to open printer '{printer}': {reason}")]
    Open { printer: String, reason: String },
    #[error("failed to write to printer '{printer}': {reason}")]
    Write { printer: String, reason: String },
    #[error("`{command}` failed: {stderr}")]
    Command { command: String, stderr: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("printing is not supported on this platform")]
    Unsupported,
}

#[async_trait]
pub trait PrinterBackend: Send + Sync {
    async fn list_printers(&self) -> Result<Vec<String>, SpoolError>;

    /// Whether the named printer can currently be reached.
    async fn is_connected(&self, printer: &str) -> bool;

    /// Sends `data` as a single raw document named `doc_name`.
    async fn send_raw(&self, printer: &str, doc_name: &str, data: &[u8]) -> Result<(), SpoolError>;
}

#[cfg(windows)]
pub fn default_backend() -> Arc<dyn PrinterBackend> {
    Arc::new(winspool::WinSpoolBackend)
}

#[cfg(unix)]
pub fn default_backend() -> Arc<dyn PrinterBackend> {
    Arc::new(cups::CupsBackend::default())
}

#[cfg(not(any(windows, unix)))]
pub fn default_backend() -> Arc<dyn PrinterBackend> {
    Arc::new(Unsupported)
}

#[cfg(not(any(windows, unix)))]
struct Unsupported;

#[cfg(not(any(windows, unix)))]
#[async_trait]
impl PrinterBackend for Unsupported {
    async fn list_printers(&self) -> Result<Vec<String>, SpoolError> {
        Err(SpoolError::Unsupported)
    }
    async fn is_connected(&self, _printer: &str) -> bool {
        false
    }
    async fn send_raw(&self, _printer: &str, _doc_name: &str, _data: &[u8]) -> Result<(), SpoolError> {
        Err(SpoolError::Unsupported)
    }
}

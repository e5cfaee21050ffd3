use super::{PrinterBackend, SpoolError};
use async_trait::async_trait;
use tracing::debug;
use windows::{
    core::{HSTRING, PCWSTR, PWSTR},
    Win32::Graphics::Printing::{
        ClosePrinter, EndDocPrinter, EndPagePrinter, EnumPrintersW, OpenPrinterW,
        StartDocPrinterW, StartPagePrinter, WritePrinter, DOC_INFO_1W, PRINTER_ENUM_CONNECTIONS,
        PRINTER_ENUM_LOCAL, PRINTER_HANDLE, PRINTER_INFO_4W,
    },
};

/// The Win32 print spooler. Calls block, so each runs on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct WinSpoolBackend;

struct Handle(PRINTER_HANDLE);

impl Handle {
    fn open(printer: &str) -> Result<Self, SpoolError> {
        let mut h = PRINTER_HANDLE::default();
        unsafe { OpenPrinterW(&HSTRING::from(printer), &mut h, None) }.map_err(|e| SpoolError::Open {
            printer: printer.to_string(),
            reason: e.message().to_string(),
        })?;
        Ok(Self(h))
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        let _ = unsafe { ClosePrinter(self.0) };
    }
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn enum_printers() -> Result<Vec<String>, SpoolError> {
    let flags = PRINTER_ENUM_LOCAL | PRINTER_ENUM_CONNECTIONS;
    let (mut needed, mut returned) = (0u32, 0u32);
    // first call sizes the buffer and reports ERROR_INSUFFICIENT_BUFFER
    let _ = unsafe { EnumPrintersW(flags, PCWSTR::null(), 4, None, &mut needed, &mut returned) };
    if needed == 0 {
        return Ok(Vec::new());
    }
    let mut buf = vec![0u8; needed as usize];
    unsafe {
        EnumPrintersW(flags, PCWSTR::null(), 4, Some(&mut buf), &mut needed, &mut returned)
    }
    .map_err(|e| SpoolError::Enumerate(e.message().to_string()))?;
    let infos = unsafe {
        std::slice::from_raw_parts(buf.as_ptr() as *const PRINTER_INFO_4W, returned as usize)
    };
    Ok(infos
        .iter()
        .filter(|i| !i.pPrinterName.is_null())
        .filter_map(|i| unsafe { i.pPrinterName.to_string() }.ok())
        .collect())
}

fn write_raw(printer: &str, doc_name: &str, data: &[u8]) -> Result<(), SpoolError> {
    let handle = Handle::open(printer)?;
    let write_err = |reason: String| SpoolError::Write {
        printer: printer.to_string(),
        reason,
    };
    let mut doc = wide(doc_name);
    let mut datatype = wide("RAW");
    let info = DOC_INFO_1W {
        pDocName: PWSTR(doc.as_mut_ptr()),
        pOutputFile: PWSTR::null(),
        pDatatype: PWSTR(datatype.as_mut_ptr()),
    };
    let job = unsafe { StartDocPrinterW(handle.0, 1, &info) };
    if job == 0 {
        return Err(write_err(windows::core::Error::from_win32().message().to_string()));
    }
    debug!(printer, job, "spooler document started");

    let result = (|| {
        if !unsafe { StartPagePrinter(handle.0) }.as_bool() {
            return Err(write_err(windows::core::Error::from_win32().message().to_string()));
        }
        let mut written = 0u32;
        let ok = unsafe {
            WritePrinter(handle.0, data.as_ptr().cast(), data.len() as u32, &mut written)
        }
        .as_bool();
        let _ = unsafe { EndPagePrinter(handle.0) };
        if !ok {
            return Err(write_err(windows::core::Error::from_win32().message().to_string()));
        }
        if written as usize != data.len() {
            return Err(write_err(format!("short write: {written} of {} bytes", data.len())));
        }
        Ok(())
    })();

    let _ = unsafe { EndDocPrinter(handle.0) };
    result
}

async fn blocking<T, F>(f: F) -> Result<T, SpoolError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, SpoolError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SpoolError::Io(std::io::Error::other(e)))?
}

#[async_trait]
impl PrinterBackend for WinSpoolBackend {
    async fn list_printers(&self) -> Result<Vec<String>, SpoolError> {
        blocking(enum_printers).await
    }

    async fn is_connected(&self, printer: &str) -> bool {
        let printer = printer.to_string();
        blocking(move || Handle::open(&printer).map(drop)).await.is_ok()
    }

    async fn send_raw(&self, printer: &str, doc_name: &str, data: &[u8]) -> Result<(), SpoolError> {
        let (printer, doc_name, data) = (printer.to_string(), doc_name.to_string(), data.to_vec());
        blocking(move || write_raw(&printer, &doc_name, &data)).await
    }
}

use anyhow::{Context, Result};
use std::{future::Future, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::{
    api::{self, AppState},
    config::AgentConfig,
    spooler::PrinterBackend,
};

/// Serves the API until `shutdown` resolves, then drains open connections.
pub async fn serve<F>(cfg: &AgentConfig, backend: Arc<dyn PrinterBackend>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::fs::create_dir_all(&cfg.storage.data_dir)
        .await
        .with_context(|| format!("creating data dir {}", cfg.storage.data_dir.display()))?;
    let addr = cfg.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    serve_on(listener, cfg, backend, shutdown).await
}

pub async fn serve_on<F>(
    listener: TcpListener,
    cfg: &AgentConfig,
    backend: Arc<dyn PrinterBackend>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = Arc::new(AppState::new(cfg, backend));
    let addr = listener.local_addr()?;
    info!(%addr, data_dir = %cfg.storage.data_dir.display(), "print agent listening");
    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("http server")?;
    info!("print agent stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spooler::SpoolError;
    use async_trait::async_trait;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    struct NoPrinters;

    #[async_trait]
    impl PrinterBackend for NoPrinters {
        async fn list_printers(&self) -> Result<Vec<String>, SpoolError> {
            Ok(Vec::new())
        }
        async fn is_connected(&self, _: &str) -> bool {
            false
        }
        async fn send_raw(&self, _: &str, _: &str, _: &[u8]) -> Result<(), SpoolError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn serves_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = AgentConfig::default();
        cfg.storage.data_dir = dir.path().to_path_buf();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            serve_on(listener, &cfg, Arc::new(NoPrinters), async {
                let _ = rx.await;
            })
            .await
        });

        let mut conn = tokio::net::TcpStream::connect(addr).await.unwrap();
        conn.write_all(b"GET /printers HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut resp = String::new();
        conn.read_to_string(&mut resp).await.unwrap();
        assert!(resp.starts_with("HTTP/1.1 200"));
        assert!(resp.ends_with(r#"{"printers":[]}"#));

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}

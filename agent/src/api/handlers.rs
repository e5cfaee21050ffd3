//! HTTP handlers. Each one resolves the selected printer through the
//! store and hands bytes to the backend; nothing is queued.

use axum::{body::Bytes, extract::State, Json};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    dto::{
        PrintRawRequest, PrintersResponse, ResultResponse, SelectPrinterRequest, SelectedResponse,
        StatusResponse,
    },
    error::ApiError,
    AppState,
};
use crate::escpos::{decode_base64, ReceiptJob, DRAWER_KICK};

/// POST bodies are optional; anything that is not the expected JSON is
/// treated like an empty object.
fn lenient_json<T: DeserializeOwned + Default>(body: &Bytes) -> T {
    if body.is_empty() {
        return T::default();
    }
    serde_json::from_slice(body).unwrap_or_default()
}

async fn selected_printer(state: &AppState) -> Result<String, ApiError> {
    state.store.load().await.ok_or_else(ApiError::no_printer_selected)
}

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn list_printers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PrintersResponse>, ApiError> {
    info!("listing printers");
    let printers = state.backend.list_printers().await.map_err(|e| {
        error!(error = %e, "failed to enumerate printers");
        ApiError::Internal("Failed to enumerate printers".into())
    })?;
    Ok(Json(PrintersResponse { printers }))
}

pub async fn get_selected(State(state): State<Arc<AppState>>) -> Json<SelectedResponse> {
    Json(SelectedResponse {
        selected: state.store.load().await,
    })
}

pub async fn select_printer(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<SelectedResponse>, ApiError> {
    let req: SelectPrinterRequest = lenient_json(&body);
    let name = req
        .name()
        .map(str::to_string)
        .ok_or_else(|| ApiError::BadRequest("Printer name required".into()))?;

    if state.validate_selection {
        match state.backend.list_printers().await {
            Ok(available) if !available.iter().any(|p| p == &name) => {
                return Err(ApiError::NotFound(format!("Printer '{name}' not found")));
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "cannot validate printer name, accepting as given"),
        }
    }

    state.store.save(&name).await.map_err(|e| {
        error!(error = ?e, "failed to save selected printer");
        ApiError::Internal("Failed to save selected printer".into())
    })?;
    Ok(Json(SelectedResponse {
        selected: Some(name),
    }))
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let selected = state.store.load().await;
    let connected = match &selected {
        Some(p) => state.backend.is_connected(p).await,
        None => false,
    };
    Json(StatusResponse {
        selected,
        connected,
    })
}

pub async fn open_drawer(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ResultResponse>, ApiError> {
    let printer = selected_printer(&state).await?;
    let job_id = Uuid::new_v4();
    state
        .backend
        .send_raw(&printer, "Drawer", DRAWER_KICK)
        .await
        .map_err(|e| {
            error!(%job_id, printer = %printer, error = %e, "drawer open failed");
            ApiError::Internal("Failed to open drawer".into())
        })?;
    info!(%job_id, printer = %printer, "drawer opened");
    Ok(Json(ResultResponse {
        result: "drawer opened",
    }))
}

pub async fn test_print(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ResultResponse>, ApiError> {
    let printer = selected_printer(&state).await?;
    let job_id = Uuid::new_v4();
    state
        .backend
        .send_raw(&printer, "Test", state.test_page.as_bytes())
        .await
        .map_err(|e| {
            error!(%job_id, printer = %printer, error = %e, "test print failed");
            ApiError::Internal("Failed to test print".into())
        })?;
    info!(%job_id, printer = %printer, "test page printed");
    Ok(Json(ResultResponse {
        result: "test printed",
    }))
}

pub async fn print_raw(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ResultResponse>, ApiError> {
    let printer = selected_printer(&state).await?;
    let req: PrintRawRequest = lenient_json(&body);
    let data = req
        .data()
        .ok_or_else(|| ApiError::BadRequest("No data provided".into()))?;
    let text = decode_base64(data)
        .map_err(|e| ApiError::BadRequest(format!("Invalid base64 data: {e}")))?;

    let job_id = Uuid::new_v4();
    let job = ReceiptJob {
        text,
        logo: req.logo().filter(|_| req.print_logo()).map(str::to_string),
    };
    info!(%job_id, printer = %printer, logo = job.logo.is_some(), "receipt job received");

    let rasterizer = state.rasterizer;
    let assembled = tokio::task::spawn_blocking(move || job.assemble(&rasterizer))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    state
        .backend
        .send_raw(&printer, "Receipt", &assembled.bytes)
        .await
        .map_err(|e| {
            error!(%job_id, printer = %printer, error = %e, "receipt print failed");
            ApiError::Internal(e.to_string())
        })?;
    info!(
        %job_id,
        printer = %printer,
        bytes = assembled.bytes.len(),
        logo_printed = assembled.logo_printed,
        "receipt printed"
    );
    Ok(Json(ResultResponse { result: "success" }))
}

pub async fn initialize(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ResultResponse>, ApiError> {
    state.store.clear().await.map_err(|e| {
        error!(error = ?e, "initialization failed");
        ApiError::Internal("Failed to initialize".into())
    })?;
    info!("agent state initialized");
    Ok(Json(ResultResponse {
        result: "initialized",
    }))
}

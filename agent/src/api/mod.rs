//! Local HTTP API consumed by the point-of-sale web front end.

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::{config::AgentConfig, escpos::LogoRasterizer, spooler::PrinterBackend, store::SelectionStore};

pub mod dto;
pub mod error;
pub mod handlers;

pub use error::ApiError;

pub struct AppState {
    pub store: SelectionStore,
    pub backend: Arc<dyn PrinterBackend>,
    pub rasterizer: LogoRasterizer,
    pub test_page: String,
    pub validate_selection: bool,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(cfg: &AgentConfig, backend: Arc<dyn PrinterBackend>) -> Self {
        Self {
            store: SelectionStore::new(&cfg.storage.data_dir),
            backend,
            rasterizer: LogoRasterizer::new(cfg.printer.logo_max_width, cfg.printer.logo_threshold),
            test_page: cfg.printer.test_page_text.clone(),
            validate_selection: cfg.printer.validate_selection,
            max_body_bytes: cfg.http.max_body_bytes,
        }
    }
}

/// Browser pages on any origin call the agent on localhost.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_body_bytes);
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/printers", get(handlers::list_printers))
        .route("/selected", get(handlers::get_selected))
        .route("/select-printer", post(handlers::select_printer))
        .route("/status", get(handlers::status))
        .route("/print/drawer", post(handlers::open_drawer))
        .route("/print/test", post(handlers::test_print))
        .route("/print/raw", post(handlers::print_raw))
        .route("/initialize", post(handlers::initialize))
        .layer(body_limit)
        .layer(cors())
        .with_state(state)
}

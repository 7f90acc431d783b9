// src/api/mod.rs
//
// HTTP surface of the portal: the streaming transcription endpoint plus the
// account, export and administration routes around it.

pub mod account;
pub mod admin;
pub mod error;
pub mod export;
pub mod transcribe;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::state::AppState;

pub use error::ApiError;

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/login", post(account::login))
        .route("/me", get(account::me))
        .route("/transcribe", post(transcribe::transcribe))
        .route("/export/latest", get(export::export_latest))
        .route("/admin/transcriptions", get(admin::list_transcriptions))
        .route("/admin/transcriptions/{id}", get(admin::transcription_detail))
        .route("/admin/users", get(admin::list_users).post(admin::create_user))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

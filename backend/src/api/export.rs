use std::path::Path;

use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use super::ApiError;
use crate::auth::CurrentUser;
use crate::database::repositories::TranscriptsRepository;
use crate::state::AppState;
use crate::utils::{file_timestamp, secure_filename};

const NOTHING_TO_EXPORT: &str = "Aucune transcription disponible pour export";
const FALLBACK_STEM: &str = "transcription";

/// `GET /export/latest`: the caller's most recent transcript as a text file.
pub async fn export_latest(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, ApiError> {
    let latest = TranscriptsRepository::latest_for_user(state.db.pool(), &user.login).await?;

    let Some(transcript) = latest else {
        return Err(ApiError::NotFound(NOTHING_TO_EXPORT.to_string()));
    };
    let text = transcript.full_text.as_deref().unwrap_or("").trim().to_string();
    if text.is_empty() {
        return Err(ApiError::NotFound(NOTHING_TO_EXPORT.to_string()));
    }

    let file_name = export_file_name(&transcript.file_name, &file_timestamp(Utc::now()));
    Ok((
        [
            (CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (CONTENT_DISPOSITION, format!("attachment; filename={}", file_name)),
        ],
        text,
    )
        .into_response())
}

fn export_file_name(stored_name: &str, stamp: &str) -> String {
    let safe = secure_filename(stored_name);
    let stem = Path::new(&safe)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| FALLBACK_STEM.to_string());
    format!("{}_{}.txt", stem, stamp)
}

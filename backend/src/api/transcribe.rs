use std::convert::Infallible;
use std::path::{Path, PathBuf};

use axum::body::{Body, Bytes};
use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use futures_util::stream;
use log::{debug, info, warn};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::ApiError;
use crate::auth::CurrentUser;
use crate::pipeline::TranscriptionJob;
use crate::state::AppState;
use crate::utils::{file_timestamp, resolve_language, secure_filename};

pub(crate) const NO_FILE: &str = "Aucun fichier fourni";
pub(crate) const AUDIO_TOO_SHORT: &str = "Erreur : fichier audio vide ou très court";

/// Shortest probed duration accepted, in seconds.
const MIN_DURATION_SECONDS: f64 = 0.1;
const DEFAULT_UPLOAD_NAME: &str = "audio.wav";

/// `POST /transcribe`: store the upload, then stream the run's events as
/// newline-delimited JSON.
pub async fn transcribe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut stored: Option<PathBuf> = None;
    let mut language_field: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "audio" if stored.is_none() => {
                stored = store_upload(&state.audio_storage, field).await?;
            }
            "language" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                language_field = Some(text);
            }
            other => debug!("Ignoring multipart field '{}'", other),
        }
    }

    let file_path = stored.ok_or_else(|| ApiError::BadRequest(NO_FILE.to_string()))?;

    let duration_seconds = state.probe.probe_seconds(&file_path).await;
    if let Some(duration) = duration_seconds {
        if duration < MIN_DURATION_SECONDS {
            info!("Rejecting {} ({:.3}s of audio)", file_path.display(), duration);
            return Err(ApiError::BadRequest(AUDIO_TOO_SHORT.to_string()));
        }
    }

    let job = TranscriptionJob {
        user_login: user.login,
        file_path,
        duration_seconds,
        language: resolve_language(language_field.as_deref()),
    };

    let events = state.pipeline.start(job);
    let body = stream::unfold(events, |mut events| async move {
        let event = events.recv().await?;
        Some((Ok::<_, Infallible>(Bytes::from(event.to_ndjson_line())), events))
    });

    Ok(([(CONTENT_TYPE, "application/json")], Body::from_stream(body)).into_response())
}

/// Write the `audio` field under `storage`. Returns `None` for an empty
/// field without a file name, which browsers send when nothing was picked.
async fn store_upload(storage: &Path, mut field: Field<'_>) -> Result<Option<PathBuf>, ApiError> {
    let original = field.file_name().unwrap_or("").to_string();
    let first = field
        .chunk()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?;

    if original.is_empty() && first.as_ref().map_or(true, |bytes| bytes.is_empty()) {
        return Ok(None);
    }

    let mut safe_name = secure_filename(&original);
    if safe_name.is_empty() {
        safe_name = DEFAULT_UPLOAD_NAME.to_string();
    }

    tokio::fs::create_dir_all(storage)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to create audio storage: {}", e)))?;
    let (path, mut file) = claim_upload_path(storage, &safe_name)
        .await
        .map_err(storage_error)?;

    if let Err(e) = write_field(&mut file, &mut field, first).await {
        warn!("Discarding partial upload {}", path.display());
        if let Err(remove_err) = tokio::fs::remove_file(&path).await {
            warn!("Failed to remove partial upload {}: {}", path.display(), remove_err);
        }
        return Err(e);
    }

    info!("Stored upload '{}' as {}", original, path.display());
    Ok(Some(path))
}

async fn write_field(file: &mut File, field: &mut Field<'_>, first: Option<Bytes>) -> Result<(), ApiError> {
    let mut pending = first;
    while let Some(bytes) = pending {
        file.write_all(&bytes).await.map_err(storage_error)?;
        pending = field
            .chunk()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
    }
    file.flush().await.map_err(storage_error)
}

fn storage_error(e: std::io::Error) -> ApiError {
    ApiError::Internal(format!("Failed to store upload: {}", e))
}

/// Create `<timestamp>_<name>` under `dir`, adding a counter when that
/// name is already taken.
async fn claim_upload_path(dir: &Path, safe_name: &str) -> std::io::Result<(PathBuf, File)> {
    let stamp = file_timestamp(Utc::now());
    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("{}_{}", stamp, safe_name)
        } else {
            format!("{}_{}_{}", stamp, attempt, safe_name)
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repositories::TranscriptsRepository;
    use crate::pipeline::ProgressEvent;
    use crate::test_support::{
        scratch_entries, spawn_app, FailingSegmenter, FixedProbe, ScriptedProvider, StubSegmenter,
        TestApp,
    };
    use reqwest::multipart::{Form, Part};
    use std::sync::Arc;
    use std::time::Duration;

    fn upload(name: &str) -> Form {
        Form::new().part(
            "audio",
            Part::bytes(vec![0u8; 64]).file_name(name.to_string()),
        )
    }

    async fn post(app: &TestApp, token: &str, form: Form) -> reqwest::Response {
        app.client
            .post(app.url("/transcribe"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    fn parse_events(body: &str) -> Vec<ProgressEvent> {
        body.lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_streams_chunks_and_records_transcript() {
        let provider = Arc::new(ScriptedProvider::texts(&[" Bonjour", " tout le monde", " merci"]));
        let app = spawn_app(
            Arc::new(StubSegmenter::new(3)),
            provider.clone(),
            Arc::new(FixedProbe(Some(45.0))),
        )
        .await;
        let token = app.token_for("amel", false).await;

        let response = post(&app, &token, upload("réunion lundi.mp3").text("language", " FR ")).await;
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["content-type"], "application/json");

        let body = response.text().await.unwrap();
        assert!(body.ends_with('\n'));
        let events = parse_events(&body);
        assert_eq!(
            events,
            vec![
                ProgressEvent::Chunk { index: 1, text: " Bonjour".to_string() },
                ProgressEvent::Chunk { index: 2, text: " tout le monde".to_string() },
                ProgressEvent::Chunk { index: 3, text: " merci".to_string() },
                ProgressEvent::Complete,
            ]
        );

        assert_eq!(app.wait_for_transcripts("amel", 1).await, 1);
        let latest = TranscriptsRepository::latest_for_user(app.state.db.pool(), "amel")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.full_text.as_deref(), Some("Bonjour tout le monde merci"));
        assert_eq!(latest.duration_seconds, Some(45.0));
        assert!(latest.file_name.ends_with("_runion_lundi.mp3"));
        assert!(Path::new(latest.file_path.as_deref().unwrap()).exists());

        assert_eq!(provider.languages(), vec![Some("fr".to_string()); 3]);
        assert!(scratch_entries(app.scratch_root()).is_empty());
    }

    #[tokio::test]
    async fn test_auto_language_and_unknown_duration() {
        let provider = Arc::new(ScriptedProvider::texts(&["a"]));
        let app = spawn_app(
            Arc::new(StubSegmenter::new(1)),
            provider.clone(),
            Arc::new(FixedProbe(None)),
        )
        .await;
        let token = app.token_for("amel", false).await;

        let body = post(&app, &token, upload("clip.wav").text("language", "auto"))
            .await
            .text()
            .await
            .unwrap();
        assert_eq!(parse_events(&body).last(), Some(&ProgressEvent::Complete));

        assert_eq!(app.wait_for_transcripts("amel", 1).await, 1);
        let latest = TranscriptsRepository::latest_for_user(app.state.db.pool(), "amel")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.duration_seconds, None);
        assert_eq!(provider.languages(), vec![None]);
    }

    #[tokio::test]
    async fn test_missing_file_is_rejected() {
        let app = spawn_app(
            Arc::new(StubSegmenter::new(1)),
            Arc::new(ScriptedProvider::texts(&["a"])),
            Arc::new(FixedProbe(Some(10.0))),
        )
        .await;
        let token = app.token_for("amel", false).await;

        let response = post(&app, &token, Form::new().text("language", "fr")).await;
        assert_eq!(response.status(), 400);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"], NO_FILE);
    }

    #[tokio::test]
    async fn test_short_audio_is_rejected_before_segmentation() {
        let provider = Arc::new(ScriptedProvider::texts(&["a"]));
        let app = spawn_app(
            Arc::new(StubSegmenter::new(1)),
            provider.clone(),
            Arc::new(FixedProbe(Some(0.05))),
        )
        .await;
        let token = app.token_for("amel", false).await;

        let response = post(&app, &token, upload("blip.wav")).await;
        assert_eq!(response.status(), 400);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"], AUDIO_TOO_SHORT);

        assert!(!app.scratch_root().exists());
        assert_eq!(provider.calls(), 0);
        assert_eq!(
            TranscriptsRepository::count_for_user(app.state.db.pool(), "amel").await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_requires_authentication() {
        let app = spawn_app(
            Arc::new(StubSegmenter::new(1)),
            Arc::new(ScriptedProvider::texts(&["a"])),
            Arc::new(FixedProbe(Some(10.0))),
        )
        .await;

        let response = app
            .client
            .post(app.url("/transcribe"))
            .multipart(upload("clip.wav"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 401);
        assert!(!app.state.audio_storage.exists());
    }

    #[tokio::test]
    async fn test_segmentation_failure_is_streamed() {
        let app = spawn_app(
            Arc::new(FailingSegmenter::exit_code(1)),
            Arc::new(ScriptedProvider::texts(&["a"])),
            Arc::new(FixedProbe(Some(10.0))),
        )
        .await;
        let token = app.token_for("amel", false).await;

        let response = post(&app, &token, upload("broken.mp3")).await;
        assert_eq!(response.status(), 200);
        let events = parse_events(&response.text().await.unwrap());
        assert_eq!(
            events,
            vec![ProgressEvent::error("Impossible de découper le fichier audio.")]
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            TranscriptsRepository::count_for_user(app.state.db.pool(), "amel").await.unwrap(),
            0
        );
        assert!(scratch_entries(app.scratch_root()).is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_uploads_get_separate_runs() {
        let provider = Arc::new(
            ScriptedProvider::texts(&["un", "deux", "trois", "quatre"])
                .with_delay(Duration::from_millis(20)),
        );
        let app = spawn_app(
            Arc::new(StubSegmenter::new(2)),
            provider,
            Arc::new(FixedProbe(Some(30.0))),
        )
        .await;
        let token = app.token_for("amel", false).await;

        let (first, second) = tokio::join!(
            post(&app, &token, upload("same.wav")),
            post(&app, &token, upload("same.wav"))
        );
        let (first, second) = tokio::join!(first.text(), second.text());
        for body in [first.unwrap(), second.unwrap()] {
            let events = parse_events(&body);
            assert_eq!(events.len(), 3);
            assert_eq!(events.last(), Some(&ProgressEvent::Complete));
        }

        assert_eq!(app.wait_for_transcripts("amel", 2).await, 2);
        let stored = std::fs::read_dir(&app.state.audio_storage).unwrap().count();
        assert_eq!(stored, 2);
        assert!(scratch_entries(app.scratch_root()).is_empty());
    }
}

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::account::{json_body, CREDENTIALS_REQUIRED};
use super::ApiError;
use crate::auth::{hash_password, AdminUser};
use crate::database::models::{NewUser, TranscriptFilter, TranscriptSummary, UserModel};
use crate::database::repositories::user::is_unique_violation;
use crate::database::repositories::{TranscriptsRepository, UsersRepository};
use crate::state::AppState;
use crate::utils::parse_date_bound;

const TRANSCRIPT_NOT_FOUND: &str = "Transcription introuvable";
const TRANSCRIPT_EMPTY: &str = "Aucun texte enregistré pour cette transcription";
const LOGIN_TAKEN: &str = "Ce login existe déjà";

#[derive(Debug, Default, Deserialize)]
pub struct TranscriptQuery {
    pub user: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptDetail {
    pub id: i64,
    pub user_login: String,
    pub file_name: String,
    pub transcribed_at: DateTime<Utc>,
    pub full_text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserEntry {
    pub login: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl From<UserModel> for UserEntry {
    fn from(user: UserModel) -> Self {
        Self {
            login: user.login,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            is_admin: user.is_admin,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct CreateUserRequest {
    #[serde(default)]
    login: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn date_bound(value: Option<String>, end_of_day: bool, label: &str) -> Result<Option<DateTime<Utc>>, ApiError> {
    match non_empty(value) {
        None => Ok(None),
        Some(raw) => parse_date_bound(&raw, end_of_day)
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest(format!("{} invalide : {}", label, raw))),
    }
}

pub async fn list_transcriptions(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<TranscriptQuery>,
) -> Result<Json<Vec<TranscriptSummary>>, ApiError> {
    let filter = TranscriptFilter {
        user_login: non_empty(query.user),
        from: date_bound(query.start_date, false, "Date de début")?,
        until: date_bound(query.end_date, true, "Date de fin")?,
    };

    let rows = TranscriptsRepository::list(state.db.pool(), &filter).await?;
    Ok(Json(rows))
}

pub async fn transcription_detail(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<TranscriptDetail>, ApiError> {
    let transcript = TranscriptsRepository::find_by_id(state.db.pool(), id)
        .await?
        .ok_or_else(|| ApiError::NotFound(TRANSCRIPT_NOT_FOUND.to_string()))?;

    let full_text = transcript.full_text.as_deref().unwrap_or("").trim().to_string();
    if full_text.is_empty() {
        return Err(ApiError::NotFound(TRANSCRIPT_EMPTY.to_string()));
    }

    Ok(Json(TranscriptDetail {
        id: transcript.id,
        user_login: transcript.user_login,
        file_name: transcript.file_name,
        transcribed_at: transcript.transcribed_at,
        full_text,
    }))
}

pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<UserEntry>>, ApiError> {
    let users = UsersRepository::list_users(state.db.pool()).await?;
    Ok(Json(users.into_iter().map(UserEntry::from).collect()))
}

pub async fn create_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let request: CreateUserRequest = json_body(&body);
    let login = request.login.unwrap_or_default().trim().to_lowercase();
    let password = request.password.unwrap_or_default();

    if login.is_empty() || password.is_empty() {
        return Err(ApiError::BadRequest(CREDENTIALS_REQUIRED.to_string()));
    }

    let password_hash = hash_password(&password)
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))?;

    let user = NewUser {
        login,
        email: non_empty(request.email),
        first_name: non_empty(request.first_name),
        last_name: non_empty(request.last_name),
        password_hash,
        is_admin: false,
    };

    match UsersRepository::insert_user(state.db.pool(), &user).await {
        Ok(_) => {
            log::info!("Admin '{}' created user '{}'", admin.login, user.login);
            Ok(Json(json!({ "message": "Utilisateur créé" })))
        }
        Err(e) if is_unique_violation(&e) => Err(ApiError::BadRequest(LOGIN_TAKEN.to_string())),
        Err(e) => Err(e.into()),
    }
}

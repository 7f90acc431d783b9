use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct UserModel {
    pub id: i64,
    pub login: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password_hash: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub login: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password_hash: String,
    pub is_admin: bool,
}

/// Public view of a user, without credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub login: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_admin: bool,
}

impl From<&UserModel> for UserProfile {
    fn from(user: &UserModel) -> Self {
        Self {
            login: user.login.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_admin: user.is_admin,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TranscriptModel {
    pub id: i64,
    pub user_login: String,
    pub file_name: String,
    pub file_path: Option<String>,
    pub duration_seconds: Option<f64>,
    pub transcribed_at: DateTime<Utc>,
    pub full_text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewTranscript {
    pub user_login: String,
    pub file_name: String,
    pub file_path: String,
    pub duration_seconds: Option<f64>,
    pub transcribed_at: DateTime<Utc>,
    pub full_text: String,
}

/// Row of the administrative listing.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TranscriptSummary {
    pub id: i64,
    pub user_login: String,
    pub file_name: String,
    pub file_path: Option<String>,
    pub duration_seconds: Option<f64>,
    pub transcribed_at: DateTime<Utc>,
    pub has_text: bool,
}

/// Filters of the administrative listing. Bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct TranscriptFilter {
    pub user_login: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

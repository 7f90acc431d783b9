use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use log::info;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::auth::{verify_password, CurrentUser};
use crate::database::models::UserProfile;
use crate::database::repositories::UsersRepository;
use crate::state::AppState;

pub(crate) const CREDENTIALS_REQUIRED: &str = "Login et mot de passe requis";
const INVALID_CREDENTIALS: &str = "Identifiants invalides";

#[derive(Debug, Default, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    login: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

/// Decode a JSON body leniently: an unreadable body counts as empty, so
/// the handler reports the missing fields itself.
pub(crate) fn json_body<T: DeserializeOwned + Default>(body: &Bytes) -> T {
    serde_json::from_slice(body).unwrap_or_default()
}

pub async fn login(State(state): State<AppState>, body: Bytes) -> Result<Json<LoginResponse>, ApiError> {
    let request: LoginRequest = json_body(&body);
    let login = request.login.unwrap_or_default().trim().to_lowercase();
    let password = request.password.unwrap_or_default();

    if login.is_empty() || password.is_empty() {
        return Err(ApiError::BadRequest(CREDENTIALS_REQUIRED.to_string()));
    }

    let user = UsersRepository::find_by_login(state.db.pool(), &login)
        .await?
        .filter(|user| verify_password(&password, &user.password_hash))
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    let token = state.sessions.issue(user.id);
    info!("User '{}' logged in", user.login);

    Ok(Json(LoginResponse {
        token,
        user: UserProfile::from(&user),
    }))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserProfile> {
    Json(UserProfile::from(&user))
}

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::api::ApiError;
use crate::database::models::UserModel;
use crate::database::repositories::UsersRepository;
use crate::state::AppState;

const MISSING_TOKEN: &str = "Jeton manquant";
const INVALID_TOKEN: &str = "Jeton invalide ou expiré";
const ACCESS_DENIED: &str = "Accès refusé";

/// Authenticated caller, resolved from `Authorization: Bearer <token>`.
pub struct CurrentUser(pub UserModel);

/// Authenticated caller holding the admin capability.
pub struct AdminUser(pub UserModel);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| ApiError::Unauthorized(MISSING_TOKEN.to_string()))?;

        let user_id = state
            .sessions
            .resolve(token)
            .ok_or_else(|| ApiError::Unauthorized(INVALID_TOKEN.to_string()))?;

        let user = UsersRepository::find_by_id(state.db.pool(), user_id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized(INVALID_TOKEN.to_string()))?;

        Ok(CurrentUser(user))
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(ApiError::Forbidden(ACCESS_DENIED.to_string()));
        }
        Ok(AdminUser(user))
    }
}

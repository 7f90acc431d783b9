use log::{info, warn};

use super::manager::DatabaseManager;
use super::models::NewUser;
use super::repositories::UsersRepository;
use crate::auth::{generate_password, hash_password};

/// Seed the default admin account if it does not exist yet.
///
/// Returns the generated password when none was configured and the account
/// had to be created.
pub async fn ensure_default_admin(
    db: &DatabaseManager,
    login: &str,
    password: Option<&str>,
) -> anyhow::Result<Option<String>> {
    let login = login.trim().to_lowercase();
    if UsersRepository::find_by_login(db.pool(), &login).await?.is_some() {
        info!("Default admin '{}' already present", login);
        return Ok(None);
    }

    let (password, generated) = match password {
        Some(password) => (password.to_string(), None),
        None => {
            let password = generate_password();
            (password.clone(), Some(password))
        }
    };

    UsersRepository::insert_user(
        db.pool(),
        &NewUser {
            login: login.clone(),
            email: Some(login.clone()),
            first_name: Some("Admin".to_string()),
            last_name: Some("Portail IA".to_string()),
            password_hash: hash_password(&password)
                .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {}", e))?,
            is_admin: true,
        },
    )
    .await?;

    if generated.is_some() {
        warn!(
            "Created default admin '{}' with a generated password; set PORTAL_ADMIN_PASSWORD to choose one",
            login
        );
    } else {
        info!("Created default admin '{}'", login);
    }

    Ok(generated)
}

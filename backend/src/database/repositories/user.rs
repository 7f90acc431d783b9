use chrono::Utc;
use log::info;
use sqlx::{Error as SqlxError, SqlitePool};

use crate::database::models::{NewUser, UserModel};

pub struct UsersRepository;

impl UsersRepository {
    /// Inserts a user. A duplicate login surfaces as a unique-constraint
    /// violation from the database.
    pub async fn insert_user(pool: &SqlitePool, user: &NewUser) -> Result<i64, SqlxError> {
        let result = sqlx::query(
            "INSERT INTO users (login, email, first_name, last_name, password_hash, is_admin, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.login)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        info!("Created user '{}' (admin: {})", user.login, user.is_admin);
        Ok(result.last_insert_rowid())
    }

    /// Case-insensitive lookup by login.
    pub async fn find_by_login(pool: &SqlitePool, login: &str) -> Result<Option<UserModel>, SqlxError> {
        sqlx::query_as::<_, UserModel>("SELECT * FROM users WHERE lower(login) = lower(?)")
            .bind(login)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<UserModel>, SqlxError> {
        sqlx::query_as::<_, UserModel>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All users, newest first.
    pub async fn list_users(pool: &SqlitePool) -> Result<Vec<UserModel>, SqlxError> {
        sqlx::query_as::<_, UserModel>("SELECT * FROM users ORDER BY created_at DESC, id DESC")
            .fetch_all(pool)
            .await
    }
}

pub fn is_unique_violation(error: &SqlxError) -> bool {
    matches!(error, SqlxError::Database(db) if db.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseManager;

    fn new_user(login: &str) -> NewUser {
        NewUser {
            login: login.to_string(),
            email: Some(format!("{}@example.tn", login)),
            first_name: Some("Amel".to_string()),
            last_name: Some("Ben Ali".to_string()),
            password_hash: "$pbkdf2-sha256$i=1000,l=32$c2FsdA$ZGlnZXN0".to_string(),
            is_admin: false,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let db = DatabaseManager::in_memory().await.unwrap();
        let id = UsersRepository::insert_user(db.pool(), &new_user("amel")).await.unwrap();

        let by_login = UsersRepository::find_by_login(db.pool(), "AMEL").await.unwrap().unwrap();
        assert_eq!(by_login.id, id);
        assert!(!by_login.is_admin);

        let by_id = UsersRepository::find_by_id(db.pool(), id).await.unwrap().unwrap();
        assert_eq!(by_id.login, "amel");
        assert!(UsersRepository::find_by_id(db.pool(), id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_login_is_unique_violation() {
        let db = DatabaseManager::in_memory().await.unwrap();
        UsersRepository::insert_user(db.pool(), &new_user("sami")).await.unwrap();

        let err = UsersRepository::insert_user(db.pool(), &new_user("sami")).await.unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_list_users_newest_first() {
        let db = DatabaseManager::in_memory().await.unwrap();
        UsersRepository::insert_user(db.pool(), &new_user("first")).await.unwrap();
        UsersRepository::insert_user(db.pool(), &new_user("second")).await.unwrap();

        let users = UsersRepository::list_users(db.pool()).await.unwrap();
        let logins: Vec<_> = users.iter().map(|u| u.login.as_str()).collect();
        assert_eq!(logins, vec!["second", "first"]);
    }
}

use sqlx::{Error as SqlxError, QueryBuilder, Sqlite, SqlitePool};

use crate::database::models::{NewTranscript, TranscriptFilter, TranscriptModel, TranscriptSummary};

pub struct TranscriptsRepository;

impl TranscriptsRepository {
    /// Appends one transcript row and returns its id. Never updates or
    /// merges with earlier rows for the same user or file.
    pub async fn insert_transcript(
        pool: &SqlitePool,
        transcript: &NewTranscript,
    ) -> Result<i64, SqlxError> {
        let result = sqlx::query(
            "INSERT INTO transcriptions (user_login, file_name, file_path, duration_seconds, transcribed_at, full_text)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&transcript.user_login)
        .bind(&transcript.file_name)
        .bind(&transcript.file_path)
        .bind(transcript.duration_seconds)
        .bind(transcript.transcribed_at)
        .bind(&transcript.full_text)
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn latest_for_user(
        pool: &SqlitePool,
        user_login: &str,
    ) -> Result<Option<TranscriptModel>, SqlxError> {
        sqlx::query_as::<_, TranscriptModel>(
            "SELECT id, user_login, file_name, file_path, duration_seconds, transcribed_at, full_text
             FROM transcriptions
             WHERE user_login = ?
             ORDER BY transcribed_at DESC, id DESC
             LIMIT 1",
        )
        .bind(user_login)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<TranscriptModel>, SqlxError> {
        sqlx::query_as::<_, TranscriptModel>(
            "SELECT id, user_login, file_name, file_path, duration_seconds, transcribed_at, full_text
             FROM transcriptions
             WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Lists transcripts, newest first, narrowed by the optional filters.
    pub async fn list(
        pool: &SqlitePool,
        filter: &TranscriptFilter,
    ) -> Result<Vec<TranscriptSummary>, SqlxError> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT id, user_login, file_name, file_path, duration_seconds, transcribed_at, \
             CASE WHEN full_text IS NOT NULL AND length(trim(full_text)) > 0 THEN 1 ELSE 0 END AS has_text \
             FROM transcriptions WHERE 1=1",
        );

        if let Some(login) = &filter.user_login {
            builder.push(" AND user_login = ").push_bind(login.clone());
        }
        if let Some(from) = filter.from {
            builder.push(" AND transcribed_at >= ").push_bind(from);
        }
        if let Some(until) = filter.until {
            builder.push(" AND transcribed_at <= ").push_bind(until);
        }
        builder.push(" ORDER BY transcribed_at DESC, id DESC");

        builder
            .build_query_as::<TranscriptSummary>()
            .fetch_all(pool)
            .await
    }

    pub async fn count_for_user(pool: &SqlitePool, user_login: &str) -> Result<i64, SqlxError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM transcriptions WHERE user_login = ?")
                .bind(user_login)
                .fetch_one(pool)
                .await?;
        Ok(count)
    }
}

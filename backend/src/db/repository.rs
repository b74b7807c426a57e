use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use super::models::{DetectionResultRow, MediaRow, UserRow};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        email           TEXT NOT NULL UNIQUE,
        hashed_password TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS media (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        filename    TEXT NOT NULL UNIQUE,
        user_id     INTEGER REFERENCES users(id),
        upload_time TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX IF NOT EXISTS idx_media_user
        ON media(user_id);

    CREATE TABLE IF NOT EXISTS detection_results (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        media_id    INTEGER NOT NULL REFERENCES media(id),
        is_deepfake INTEGER NOT NULL,
        confidence  REAL NOT NULL,
        detected_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX IF NOT EXISTS idx_results_media
        ON detection_results(media_id, id);
";

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Opens (creating if missing) the SQLite database at `path` and ensures
    /// the schema exists.
    pub async fn open(path: &str) -> Result<Self, RepositoryError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        log::info!("Database ready at {}", path);

        Ok(Self { pool })
    }

    pub async fn create_user(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> Result<UserRow, RepositoryError> {
        let user = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (email, hashed_password) VALUES (?1, ?2)
             RETURNING id, email, hashed_password",
        )
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>, RepositoryError> {
        let user = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, hashed_password FROM users WHERE email = ?1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn create_media(
        &self,
        filename: &str,
        user_id: i64,
    ) -> Result<MediaRow, RepositoryError> {
        let media = sqlx::query_as::<_, MediaRow>(
            "INSERT INTO media (filename, user_id) VALUES (?1, ?2)
             RETURNING id, filename, user_id, upload_time",
        )
        .bind(filename)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(media)
    }

    /// Authorization predicate: resolves a media row only when it exists AND
    /// belongs to `user_id`. Missing and not-owned are indistinguishable to
    /// the caller, which maps both to a uniform not-found response.
    pub async fn get_media_owned(
        &self,
        media_id: i64,
        user_id: i64,
    ) -> Result<Option<MediaRow>, RepositoryError> {
        let media = sqlx::query_as::<_, MediaRow>(
            "SELECT id, filename, user_id, upload_time FROM media
             WHERE id = ?1 AND user_id = ?2",
        )
        .bind(media_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(media)
    }

    pub async fn create_detection_result(
        &self,
        media_id: i64,
        is_deepfake: i32,
        confidence: f64,
    ) -> Result<DetectionResultRow, RepositoryError> {
        let result = sqlx::query_as::<_, DetectionResultRow>(
            "INSERT INTO detection_results (media_id, is_deepfake, confidence)
             VALUES (?1, ?2, ?3)
             RETURNING id, media_id, is_deepfake, confidence, detected_at",
        )
        .bind(media_id)
        .bind(is_deepfake)
        .bind(confidence)
        .fetch_one(&self.pool)
        .await?;
        Ok(result)
    }

    /// Re-detection appends rows; the latest result is the greatest-id row.
    pub async fn latest_result_for_media(
        &self,
        media_id: i64,
    ) -> Result<Option<DetectionResultRow>, RepositoryError> {
        let result = sqlx::query_as::<_, DetectionResultRow>(
            "SELECT id, media_id, is_deepfake, confidence, detected_at
             FROM detection_results
             WHERE media_id = ?1
             ORDER BY id DESC
             LIMIT 1",
        )
        .bind(media_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(result)
    }
}

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use shared::{DetectionResponse, MediaResponse};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub hashed_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MediaRow {
    pub id: i64,
    pub filename: String,
    pub user_id: Option<i64>,
    pub upload_time: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DetectionResultRow {
    pub id: i64,
    pub media_id: i64,
    pub is_deepfake: i32,
    pub confidence: f64,
    pub detected_at: NaiveDateTime,
}

impl MediaRow {
    pub fn to_response(&self) -> MediaResponse {
        MediaResponse {
            id: self.id,
            filename: self.filename.clone(),
            upload_time: self.upload_time,
        }
    }
}

impl DetectionResultRow {
    pub fn to_response(&self) -> DetectionResponse {
        DetectionResponse {
            id: self.id,
            media_id: self.media_id,
            is_deepfake: self.is_deepfake,
            confidence: self.confidence,
            detected_at: self.detected_at,
        }
    }
}

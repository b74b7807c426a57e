use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone)]
pub struct MediaResponse {
    pub id: i64,
    pub filename: String,
    pub upload_time: NaiveDateTime,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct DetectionResponse {
    pub id: i64,
    pub media_id: i64,
    pub is_deepfake: i32,
    pub confidence: f64,
    pub detected_at: NaiveDateTime,
}

use std::fs;
use std::path::Path;

use image::DynamicImage;

use crate::storage::media_store::MediaKind;

use super::aggregate::{Score, aggregate};
use super::frames::{FrameError, FrameStream};
use super::model::Model;

#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("Unsupported file type for detection.")]
    Unsupported,
    #[error(transparent)]
    Video(#[from] FrameError),
}

/// Routes a stored media file to the right scoring path: whole-image scoring
/// for images, extract-sample-aggregate for videos.
#[derive(Clone)]
pub struct Detector {
    model: Model,
}

impl Detector {
    pub fn new(model: Model) -> Self {
        Self { model }
    }

    pub fn run(&self, path: &Path) -> Result<Score, DetectError> {
        match MediaKind::from_path(path) {
            Some(MediaKind::Image) => Ok(self.score_lenient(load_image(path))),
            Some(MediaKind::Video) => self.score_video(path),
            None => Err(DetectError::Unsupported),
        }
    }

    /// Failing to open the container or sampling zero frames aborts the
    /// request; a frame that later turns out to be unreadable only settles to
    /// the sentinel like any other scoring failure.
    fn score_video(&self, path: &Path) -> Result<Score, DetectError> {
        let frames = FrameStream::open(path)?;
        let scores: Vec<Score> = frames
            .map(|frame| self.score_lenient(frame.map_err(|e| e.to_string())))
            .collect();
        Ok(aggregate(&scores))
    }

    fn score_lenient(&self, image: Result<DynamicImage, String>) -> Score {
        settle(image.and_then(|img| self.model.score(&img).map_err(|e| e.to_string())))
    }
}

/// The fail-open boundary for scoring, and the only place where it lives:
/// any failure to decode, preprocess, or run the model on a single input is
/// logged and collapsed into `Score::NEGATIVE` (verdict 0, confidence 0.0)
/// instead of failing the request. Video-open and no-frame errors never pass
/// through here; those stay hard errors.
fn settle(outcome: Result<f32, String>) -> Score {
    match outcome {
        Ok(probability) => Score::from_probability(probability),
        Err(e) => {
            log::error!("Scoring failed, recording negative result: {}", e);
            Score::NEGATIVE
        }
    }
}

fn load_image(path: &Path) -> Result<DynamicImage, String> {
    let data = fs::read(path).map_err(|e| format!("read {}: {}", path.display(), e))?;
    image::load_from_memory(&data).map_err(|e| format!("decode {}: {}", path.display(), e))
}

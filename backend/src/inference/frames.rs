use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use image::DynamicImage;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Could not open video file: {0}")]
    CannotOpen(String),
    #[error("No frames extracted from video.")]
    NoFrames,
    #[error("frame read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// A finite, non-restartable sequence of frames sampled from a video at
/// roughly one per second of footage.
///
/// Frames are extracted up front as JPEG artifacts in a private working
/// directory, then decoded lazily; each artifact is deleted as soon as it has
/// been read, and the directory itself is removed on drop, so temp state
/// never outlives the stream and memory stays bounded to one decoded frame.
pub struct FrameStream {
    frames: std::vec::IntoIter<PathBuf>,
    workdir: PathBuf,
}

impl FrameStream {
    /// Opens `video` and samples every `stride`-th frame, where the stride is
    /// the rounded frame rate (so one frame per wall-clock second), or 1 when
    /// the rate is unknown.
    ///
    /// Unlike per-frame scoring failures, failing to open the container and
    /// extracting zero frames are both surfaced to the caller.
    pub fn open(video: &Path) -> Result<Self, FrameError> {
        let fps = probe_fps(video)?;
        let stride = stride_for_fps(fps);
        log::debug!(
            "Sampling {} at fps {:.3}, stride {}",
            video.display(),
            fps,
            stride
        );

        let workdir =
            std::env::temp_dir().join(format!("df_frames_{}", Uuid::new_v4().simple()));
        fs::create_dir_all(&workdir)?;

        if let Err(e) = dump_frames(video, stride, &workdir) {
            let _ = fs::remove_dir_all(&workdir);
            return Err(e);
        }

        Self::from_dir(workdir)
    }

    /// Assembles a stream over the `frame_*.jpg` artifacts already present in
    /// `workdir`. The stream takes ownership of the directory.
    fn from_dir(workdir: PathBuf) -> Result<Self, FrameError> {
        let frames = match collect_frame_paths(&workdir) {
            Ok(frames) => frames,
            Err(e) => {
                let _ = fs::remove_dir_all(&workdir);
                return Err(e);
            }
        };
        if frames.is_empty() {
            let _ = fs::remove_dir_all(&workdir);
            return Err(FrameError::NoFrames);
        }
        Ok(Self {
            frames: frames.into_iter(),
            workdir,
        })
    }
}

impl Iterator for FrameStream {
    type Item = Result<DynamicImage, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.frames.next()?;
        Some(read_frame(&path))
    }
}

impl Drop for FrameStream {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.workdir) {
            log::warn!(
                "Failed to clean up frame workdir {}: {}",
                self.workdir.display(),
                e
            );
        }
    }
}

/// Reads and deletes one frame artifact, then decodes it.
fn read_frame(path: &Path) -> Result<DynamicImage, FrameError> {
    let data = fs::read(path)?;
    if let Err(e) = fs::remove_file(path) {
        log::warn!("Failed to remove frame artifact {}: {}", path.display(), e);
    }
    Ok(image::load_from_memory(&data)?)
}

/// Queries the container's average frame rate. A container ffprobe cannot
/// open is a hard error; an unparsable rate degrades to 0 (sample every
/// frame).
fn probe_fps(video: &Path) -> Result<f64, FrameError> {
    let output = Command::new("ffprobe")
        .args(["-v", "error"])
        .args(["-select_streams", "v:0"])
        .args(["-show_entries", "stream=avg_frame_rate"])
        .args(["-of", "default=noprint_wrappers=1:nokey=1"])
        .arg(video)
        .output()
        .map_err(|e| FrameError::CannotOpen(format!("ffprobe: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FrameError::CannotOpen(stderr.trim().to_string()));
    }

    Ok(parse_fps(&String::from_utf8_lossy(&output.stdout)))
}

/// Parses ffprobe's `num/den` rate (or a plain number); anything unparsable
/// or degenerate yields 0.
fn parse_fps(raw: &str) -> f64 {
    let raw = raw.trim();
    match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().unwrap_or(0.0);
            let den: f64 = den.trim().parse().unwrap_or(0.0);
            if den > 0.0 { num / den } else { 0.0 }
        }
        None => raw.parse().unwrap_or(0.0),
    }
}

/// Stride between sampled frame indices: round(fps), clamped to at least 1.
fn stride_for_fps(fps: f64) -> u32 {
    if fps > 0.0 {
        (fps.round() as u32).max(1)
    } else {
        1
    }
}

/// Decodes the video sequentially and writes every frame whose index is a
/// multiple of `stride` as a JPEG under `workdir`.
fn dump_frames(video: &Path, stride: u32, workdir: &Path) -> Result<(), FrameError> {
    let select = format!("select=not(mod(n\\,{}))", stride);
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-nostdin"])
        .arg("-i")
        .arg(video)
        .args(["-an", "-sn"])
        .arg("-vf")
        .arg(&select)
        .args(["-vsync", "vfr"])
        .args(["-q:v", "2", "-y"])
        .arg(workdir.join("frame_%06d.jpg"))
        .output()
        .map_err(|e| FrameError::CannotOpen(format!("ffmpeg: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FrameError::CannotOpen(stderr.trim().to_string()));
    }
    Ok(())
}

fn collect_frame_paths(workdir: &Path) -> Result<Vec<PathBuf>, FrameError> {
    let mut frames: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(workdir)? {
        let path = entry?.path();
        let is_frame = path.extension().map(|e| e == "jpg").unwrap_or(false)
            && path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with("frame_"))
                .unwrap_or(false);
        if is_frame {
            frames.push(path);
        }
    }
    frames.sort();
    Ok(frames)
}

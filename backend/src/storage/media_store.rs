use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov"];

const MAX_UPLOAD_SIZE: usize = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error(
        "Unsupported file type: {0}. Please upload a JPG, PNG image or MP4, AVI, MOV video."
    )]
    UnsupportedType(String),
    #[error("File too large")]
    FileTooLarge,
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classifies by lowercased file extension; `None` for anything outside
    /// the upload allow-list.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }
}

/// Local-disk media storage. Stored names are always server-generated
/// (`<uuid-hex>.<ext>`), never user-supplied.
#[derive(Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Validates the upload against the extension allow-list and size cap,
    /// then persists it under a collision-resistant random name. Nothing is
    /// written for a rejected upload.
    pub fn save(&self, original_name: &str, data: &[u8]) -> Result<String, StorageError> {
        let ext = allowed_extension(original_name)?;
        if data.len() > MAX_UPLOAD_SIZE {
            return Err(StorageError::FileTooLarge);
        }

        let stored_name = format!("{}.{}", Uuid::new_v4().simple(), ext);
        fs::write(self.root.join(&stored_name), data)?;
        Ok(stored_name)
    }

    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }
}

fn allowed_extension(original_name: &str) -> Result<String, StorageError> {
    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if IMAGE_EXTENSIONS.contains(&ext.as_str()) || VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        let shown = if ext.is_empty() {
            original_name.to_string()
        } else {
            format!(".{}", ext)
        };
        Err(StorageError::UnsupportedType(shown))
    }
}

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// An incoming photo as handed over by the upload boundary. The bytes are
/// opaque to the core; only the stored reference string is kept on records.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Error enumeration for the photo collaborator.
#[derive(Debug, thiserror::Error)]
pub enum PhotoStoreError {
    #[error("unsupported photo file name '{0}'")]
    UnsupportedName(String),
    #[error("photo storage unavailable: {0}")]
    Io(#[from] std::io::Error),
}

/// File-storage collaborator. Receives uploads, hands back reference strings.
pub trait PhotoStore: Send + Sync {
    /// Persist an upload under the given category, returning its reference.
    fn store(&self, category: &str, upload: PhotoUpload) -> Result<String, PhotoStoreError>;

    /// Remove a previously stored photo. Removing a reference that is already
    /// gone is not an error.
    fn remove(&self, reference: &str) -> Result<(), PhotoStoreError>;
}

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Local-disk photo store writing under a configured root directory.
#[derive(Debug)]
pub struct LocalPhotoStore {
    root: PathBuf,
    sequence: AtomicU64,
}

impl LocalPhotoStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            sequence: AtomicU64::new(1),
        }
    }

    fn extension(file_name: &str) -> Option<&str> {
        let ext = file_name.rsplit_once('.')?.1;
        ALLOWED_EXTENSIONS
            .iter()
            .find(|allowed| ext.eq_ignore_ascii_case(allowed))
            .copied()
    }
}

impl PhotoStore for LocalPhotoStore {
    fn store(&self, category: &str, upload: PhotoUpload) -> Result<String, PhotoStoreError> {
        let ext = Self::extension(&upload.file_name)
            .ok_or_else(|| PhotoStoreError::UnsupportedName(upload.file_name.clone()))?;
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let reference = format!("{category}/{sequence:06}.{ext}");

        let path = self.root.join(&reference);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &upload.bytes)?;
        Ok(reference)
    }

    fn remove(&self, reference: &str) -> Result<(), PhotoStoreError> {
        match fs::remove_file(self.root.join(reference)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

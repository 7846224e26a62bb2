//! Image codec and the temporary image directory

mod decode;
mod encode;

// Re-export public API
pub use decode::decode;
pub use encode::compress_to_jpeg;
pub use imageproc::image::{Rgb, RgbImage};

use std::fs;
use std::path::{Path, PathBuf};

use imageproc::image::ImageError;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to load image: {0}")]
    Decode(#[from] ImageError),
    #[error("unable to encode image: {0}")]
    Encode(#[source] ImageError),
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// An encoded image written to the store
#[derive(Debug, Clone, PartialEq)]
pub struct SavedImage {
    pub path: PathBuf,
    pub data: Vec<u8>,
}

/// Directory holding inbound images and the filtered results.
///
/// Inbound images are stored as `<uuid>.jpg` exactly as received; results are
/// written next to them as `<stem><suffix>.jpg`. Files are written once and
/// never modified afterwards.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
    jpeg_quality: u8,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>, jpeg_quality: u8) -> Self {
        Self {
            root: root.into(),
            jpeg_quality,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    /// Store the raw bytes of an inbound image under a fresh identifier
    pub fn save_inbound(&self, data: &[u8]) -> Result<PathBuf, StorageError> {
        self.ensure_root()?;

        let path = self.root.join(format!("{}.jpg", uuid::Uuid::new_v4()));
        fs::write(&path, data).map_err(|e| StorageError::io(&path, e))?;

        log::debug!("Stored inbound image: {}", path.display());
        Ok(path)
    }

    pub fn load(&self, path: &Path) -> Result<RgbImage, StorageError> {
        let data = fs::read(path).map_err(|e| StorageError::io(path, e))?;
        decode(&data)
    }

    /// Encode `img` as JPEG and write it as `<source stem><suffix>.jpg`
    pub fn save_output(
        &self,
        source: &Path,
        img: &RgbImage,
        suffix: &str,
    ) -> Result<SavedImage, StorageError> {
        self.ensure_root()?;

        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default();
        // don't use .with_extension() bc the stem may contain dots
        let path = self.root.join(format!("{stem}{suffix}.jpg"));

        let data = encode::encode_jpeg(img, self.jpeg_quality)?;
        fs::write(&path, &data).map_err(|e| StorageError::io(&path, e))?;

        log::info!("Image saved successfully: {}", path.display());
        Ok(SavedImage { path, data })
    }

    fn ensure_root(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).map_err(|e| StorageError::io(&self.root, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_image() -> RgbImage {
        RgbImage::from_fn(8, 6, |x, y| Rgb([(x * 30) as u8, (y * 40) as u8, 128]))
    }

    #[test]
    fn inbound_images_get_unique_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path().join("images"), 85);

        let first = store.save_inbound(b"one").unwrap();
        let second = store.save_inbound(b"two").unwrap();

        assert_ne!(first, second);
        assert_eq!(fs::read(&first).unwrap(), b"one");
        assert_eq!(first.extension().unwrap(), "jpg");
    }

    #[test]
    fn output_is_named_after_source_and_decodes() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), 90);

        let saved = store
            .save_output(Path::new("abc123.jpg"), &sample_image(), "_blur")
            .unwrap();

        assert_eq!(saved.path, dir.path().join("abc123_blur.jpg"));
        assert_eq!(fs::read(&saved.path).unwrap(), saved.data);

        let decoded = store.load(&saved.path).unwrap();
        assert_eq!(decoded.dimensions(), (8, 6));
    }

    #[test]
    fn garbage_bytes_fail_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), 85);

        let path = store.save_inbound(b"definitely not a jpeg").unwrap();
        assert!(matches!(store.load(&path), Err(StorageError::Decode(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), 85);

        let err = store.load(&dir.path().join("nope.jpg")).unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }
}

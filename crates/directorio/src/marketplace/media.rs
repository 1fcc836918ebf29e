//! Uploaded images (logos, product photos).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use mime::Mime;

const ACCEPTED_IMAGE_TYPES: [&str; 4] = ["image/png", "image/jpeg", "image/webp", "image/svg+xml"];

/// Public path prefix under which stored media is served.
pub const MEDIA_ROUTE_PREFIX: &str = "/api/v1/media/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("upload is empty")]
    Empty,
    #[error("upload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
    #[error("unsupported media type '{0}'")]
    UnsupportedType(String),
    #[error("media backend unavailable: {0}")]
    Backend(String),
}

/// Object storage for uploaded files.
pub trait MediaStore: Send + Sync {
    fn put(&self, key: &str, media: StoredMedia) -> Result<(), MediaError>;
    fn get(&self, key: &str) -> Result<Option<StoredMedia>, MediaError>;
    fn remove(&self, key: &str) -> Result<(), MediaError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryMediaStore {
    objects: Arc<Mutex<HashMap<String, StoredMedia>>>,
}

impl MemoryMediaStore {
    fn guard(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, StoredMedia>>, MediaError> {
        self.objects
            .lock()
            .map_err(|_| MediaError::Backend("object map poisoned".to_string()))
    }

    #[cfg(test)]
    pub(crate) fn object_count(&self) -> usize {
        self.objects.lock().map_or(0, |objects| objects.len())
    }
}

impl MediaStore for MemoryMediaStore {
    fn put(&self, key: &str, media: StoredMedia) -> Result<(), MediaError> {
        self.guard()?.insert(key.to_string(), media);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<StoredMedia>, MediaError> {
        Ok(self.guard()?.get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<(), MediaError> {
        self.guard()?.remove(key);
        Ok(())
    }
}

/// An image as received from a client.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Validates uploads and stores them under generated keys.
pub struct MediaLibrary {
    store: Arc<dyn MediaStore>,
    max_bytes: usize,
}

impl MediaLibrary {
    pub fn new(store: Arc<dyn MediaStore>, max_bytes: usize) -> Self {
        Self { store, max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Store an image under `folder/` and return its public URL.
    pub fn store_image(&self, folder: &str, upload: ImageUpload) -> Result<String, MediaError> {
        if upload.bytes.is_empty() {
            return Err(MediaError::Empty);
        }
        if upload.bytes.len() > self.max_bytes {
            return Err(MediaError::TooLarge {
                size: upload.bytes.len(),
                limit: self.max_bytes,
            });
        }

        let mime = resolve_mime(upload.content_type.as_deref(), upload.file_name.as_deref())?;
        let extension = match mime.essence_str() {
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            _ => "svg",
        };
        let key = format!(
            "{folder}/{}.{extension}",
            ulid::Ulid::new().to_string().to_ascii_lowercase()
        );

        self.store.put(
            &key,
            StoredMedia {
                content_type: mime.essence_str().to_string(),
                bytes: upload.bytes,
            },
        )?;
        Ok(format!("{MEDIA_ROUTE_PREFIX}{key}"))
    }

    pub fn fetch(&self, key: &str) -> Result<Option<StoredMedia>, MediaError> {
        self.store.get(key)
    }

    /// Remove a previously stored object given its public URL. Foreign URLs are ignored.
    pub fn discard(&self, url: &str) -> Result<(), MediaError> {
        match url.strip_prefix(MEDIA_ROUTE_PREFIX) {
            Some(key) => self.store.remove(key),
            None => Ok(()),
        }
    }
}

/// Prefer the declared content type; fall back to guessing from the file name.
fn resolve_mime(content_type: Option<&str>, file_name: Option<&str>) -> Result<Mime, MediaError> {
    let declared = content_type
        .map(str::trim)
        .filter(|value| !value.is_empty() && *value != mime::APPLICATION_OCTET_STREAM.essence_str());

    let mime = match declared {
        Some(raw) => raw
            .parse::<Mime>()
            .map_err(|_| MediaError::UnsupportedType(raw.to_string()))?,
        None => file_name
            .and_then(|name| mime_guess::from_path(name).first())
            .ok_or_else(|| MediaError::UnsupportedType("unknown".to_string()))?,
    };

    if ACCEPTED_IMAGE_TYPES.contains(&mime.essence_str()) {
        Ok(mime)
    } else {
        Err(MediaError::UnsupportedType(mime.essence_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library(limit: usize) -> (MediaLibrary, MemoryMediaStore) {
        let store = MemoryMediaStore::default();
        (MediaLibrary::new(Arc::new(store.clone()), limit), store)
    }

    fn upload(content_type: Option<&str>, file_name: Option<&str>, bytes: &[u8]) -> ImageUpload {
        ImageUpload {
            file_name: file_name.map(str::to_string),
            content_type: content_type.map(str::to_string),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn stores_png_under_folder() {
        let (library, store) = library(1024);
        let url = library
            .store_image("logos", upload(Some("image/png"), None, b"\x89PNG"))
            .expect("stored");
        assert!(url.starts_with("/api/v1/media/logos/"));
        assert!(url.ends_with(".png"));

        let key = url.trim_start_matches(MEDIA_ROUTE_PREFIX);
        let stored = store.get(key).expect("backend").expect("present");
        assert_eq!(stored.content_type, "image/png");
    }

    #[test]
    fn guesses_type_from_file_name_when_header_is_generic() {
        let (library, _) = library(1024);
        let url = library
            .store_image(
                "logos",
                upload(Some("application/octet-stream"), Some("logo.jpeg"), b"jpeg"),
            )
            .expect("guessed");
        assert!(url.ends_with(".jpg"));
    }

    #[test]
    fn rejects_non_images_and_oversized_uploads() {
        let (library, _) = library(4);
        assert!(matches!(
            library.store_image("logos", upload(Some("application/pdf"), None, b"pdf")),
            Err(MediaError::UnsupportedType(_))
        ));
        assert!(matches!(
            library.store_image("logos", upload(Some("image/png"), None, b"too large")),
            Err(MediaError::TooLarge { size: 9, limit: 4 })
        ));
        assert!(matches!(
            library.store_image("logos", upload(Some("image/png"), None, b"")),
            Err(MediaError::Empty)
        ));
    }
}

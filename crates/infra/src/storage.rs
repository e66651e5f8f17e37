//! Uploaded document storage.
//!
//! Files are addressed by a key (`{prefix}/{uuid}.{ext}`) and served from
//! `{base_url}/{key}`. Only images and PDFs up to 10 MB are accepted.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_DOCUMENTS: usize = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("unsupported file type '{0}' (images and PDF only)")]
    UnsupportedType(String),

    #[error("file '{name}' exceeds {limit} bytes")]
    TooLarge { name: String, limit: usize },

    #[error("too many files ({count}, at most {limit})")]
    TooMany { count: usize, limit: usize },

    #[error("storage timed out after {0:?}")]
    Timeout(Duration),

    #[error("storage backend failed: {0}")]
    Backend(String),
}

impl StorageError {
    /// Client mistakes (type, size, count) as opposed to backend failures.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            StorageError::UnsupportedType(_) | StorageError::TooLarge { .. } | StorageError::TooMany { .. }
        )
    }
}

/// One file received from a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn validate(&self) -> Result<(), StorageError> {
        let ct = self.content_type.to_ascii_lowercase();
        if !(ct.starts_with("image/") || ct == "application/pdf") {
            return Err(StorageError::UnsupportedType(self.content_type.clone()));
        }
        if self.bytes.len() > MAX_FILE_BYTES {
            return Err(StorageError::TooLarge {
                name: self.file_name.clone().unwrap_or_else(|| "upload".into()),
                limit: MAX_FILE_BYTES,
            });
        }
        Ok(())
    }

    /// Extension derived from the MIME subtype (`image/png` -> `png`).
    pub fn extension(&self) -> &str {
        self.content_type
            .split('/')
            .nth(1)
            .and_then(|s| s.split(';').next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("bin")
    }
}

pub fn validate_all(uploads: &[Upload], limit: usize) -> Result<(), StorageError> {
    if uploads.len() > limit {
        return Err(StorageError::TooMany {
            count: uploads.len(),
            limit,
        });
    }
    uploads.iter().try_for_each(Upload::validate)
}

/// `{prefix}/{uuid}.{ext}`
pub fn document_key(prefix: &str, upload: &Upload) -> String {
    format!("{}/{}.{}", prefix.trim_end_matches('/'), Uuid::now_v7(), upload.extension())
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn put(&self, key: &str, upload: &Upload) -> Result<(), StorageError>;

    fn url_for(&self, key: &str) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Objects kept in process memory, under a named bucket.
#[derive(Debug)]
pub struct InMemoryDocumentStore {
    bucket: String,
    base_url: String,
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl InMemoryDocumentStore {
    pub fn new(bucket: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().ok()?.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn put(&self, key: &str, upload: &Upload) -> Result<(), StorageError> {
        let mut objects = self
            .objects
            .write()
            .map_err(|_| StorageError::Backend("object map poisoned".into()))?;
        objects.insert(
            key.to_string(),
            StoredObject {
                content_type: upload.content_type.clone(),
                bytes: upload.bytes.clone(),
            },
        );
        tracing::debug!(bucket = %self.bucket, key, size = upload.bytes.len(), "document stored");
        Ok(())
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

/// Validates and stores a batch of uploads, returning their public URLs in
/// input order.
#[derive(Clone)]
pub struct DocumentUploader {
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl core::fmt::Debug for DocumentUploader {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DocumentUploader")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl DocumentUploader {
    pub fn new(store: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn store_all(&self, prefix: &str, uploads: &[Upload], limit: usize) -> Result<Vec<String>, StorageError> {
        validate_all(uploads, limit)?;

        let mut urls = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let key = document_key(prefix, upload);
            tokio::time::timeout(self.timeout, self.store.put(&key, upload))
                .await
                .map_err(|_| StorageError::Timeout(self.timeout))??;
            urls.push(self.store.url_for(&key));
        }
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(content_type: &str, size: usize) -> Upload {
        Upload {
            file_name: Some("scan".into()),
            content_type: content_type.into(),
            bytes: vec![0u8; size],
        }
    }

    #[test]
    fn only_images_and_pdf() {
        assert!(upload("image/png", 10).validate().is_ok());
        assert!(upload("application/pdf", 10).validate().is_ok());
        let err = upload("text/plain", 10).validate().unwrap_err();
        assert!(err.is_rejection());
    }

    #[test]
    fn size_and_count_limits() {
        assert!(matches!(
            upload("image/jpeg", MAX_FILE_BYTES + 1).validate(),
            Err(StorageError::TooLarge { .. })
        ));
        let many = vec![upload("image/jpeg", 1); MAX_DOCUMENTS + 1];
        assert!(matches!(validate_all(&many, MAX_DOCUMENTS), Err(StorageError::TooMany { .. })));
        assert!(validate_all(&many[..MAX_DOCUMENTS], MAX_DOCUMENTS).is_ok());
    }

    #[test]
    fn keys_use_mime_extension() {
        let key = document_key("abc/absences/", &upload("image/png", 1));
        assert!(key.starts_with("abc/absences/"));
        assert!(key.ends_with(".png"));
        assert_eq!(upload("application/pdf", 1).extension(), "pdf");
    }

    #[tokio::test]
    async fn stored_documents_get_public_urls() {
        let store = Arc::new(InMemoryDocumentStore::new("easy-paies-docs", "https://docs.easy-paies.fr/"));
        let uploader = DocumentUploader::new(store.clone(), Duration::from_secs(1));

        let urls = uploader
            .store_all("contact", &[upload("application/pdf", 3)], MAX_DOCUMENTS)
            .await
            .unwrap();
        assert_eq!(urls.len(), 1);
        let key = urls[0].strip_prefix("https://docs.easy-paies.fr/").unwrap();
        assert!(key.starts_with("contact/"));
        assert_eq!(store.get(key).unwrap().bytes.len(), 3);
    }

    #[tokio::test]
    async fn rejected_batch_stores_nothing() {
        let store = Arc::new(InMemoryDocumentStore::new("b", "https://docs"));
        let uploader = DocumentUploader::new(store.clone(), Duration::from_secs(1));
        let res = uploader
            .store_all("x", &[upload("image/png", 1), upload("text/html", 1)], MAX_DOCUMENTS)
            .await;
        assert!(res.is_err());
        assert!(store.is_empty());
    }
}

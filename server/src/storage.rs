use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use notepin_shared::{
    decode_comment_file, encode_comment_file, CommentFileData, CommentFileError,
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("page {0} has no stored comments")]
    NotFound(String),
    #[error("i/o error on page {page}: {source}")]
    Io {
        page: String,
        #[source]
        source: std::io::Error,
    },
    #[error("s3 error on page {page}: {message}")]
    S3 { page: String, message: String },
    #[error(transparent)]
    Format(#[from] CommentFileError),
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn load_page(&self, page: &str) -> Result<CommentFileData, StorageError>;
    async fn save_page(&self, page: &str, data: &CommentFileData) -> Result<(), StorageError>;
}

/// One `<page>.bin` file per page under `data_dir`.
pub struct FileStorage {
    data_dir: PathBuf,
}

impl FileStorage {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    fn page_path(&self, page: &str) -> PathBuf {
        self.data_dir.join(format!("{page}.bin"))
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn load_page(&self, page: &str) -> Result<CommentFileData, StorageError> {
        let payload = match tokio::fs::read(self.page_path(page)).await {
            Ok(payload) => payload,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(page.to_string()));
            }
            Err(source) => {
                return Err(StorageError::Io {
                    page: page.to_string(),
                    source,
                });
            }
        };
        Ok(decode_comment_file(&payload)?)
    }

    async fn save_page(&self, page: &str, data: &CommentFileData) -> Result<(), StorageError> {
        let payload = encode_comment_file(data)?;
        let io_error = |source| StorageError::Io {
            page: page.to_string(),
            source,
        };
        // Write then rename so a crash never leaves a truncated page file.
        let staging = self
            .data_dir
            .join(format!(".{page}.{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&staging, payload).await.map_err(io_error)?;
        if let Err(error) = tokio::fs::rename(&staging, self.page_path(page)).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(io_error(error));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct S3StorageConfig {
    pub bucket: String,
    pub prefix: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl S3StorageConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: None,
            region: None,
            endpoint_url: None,
            force_path_style: false,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

pub struct S3Storage {
    bucket: String,
    prefix: String,
    client: Client,
}

impl S3Storage {
    pub async fn new(config: S3StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let (Some(access_key_id), Some(secret_access_key)) = (
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
        ) {
            let creds = Credentials::new(access_key_id, secret_access_key, None, None, "static");
            loader = loader.credentials_provider(creds);
        }
        if let Some(region) = config.region.clone() {
            loader = loader.region(aws_config::Region::new(region));
        }
        let shared = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint_url) = config.endpoint_url.as_ref() {
            builder = builder.endpoint_url(endpoint_url);
        }
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }
        Self {
            bucket: config.bucket,
            prefix: normalize_prefix(config.prefix.as_deref()),
            client: Client::from_conf(builder.build()),
        }
    }

    fn object_key(&self, page: &str) -> String {
        object_key(&self.prefix, page)
    }
}

fn normalize_prefix(prefix: Option<&str>) -> String {
    prefix.unwrap_or_default().trim_matches('/').to_string()
}

fn object_key(prefix: &str, page: &str) -> String {
    if prefix.is_empty() {
        format!("{page}.bin")
    } else {
        format!("{prefix}/{page}.bin")
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn load_page(&self, page: &str) -> Result<CommentFileData, StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.object_key(page))
            .send()
            .await;
        let output = match response {
            Ok(output) => output,
            Err(error) => {
                if let Some(service_error) = error.as_service_error() {
                    if service_error.is_no_such_key() {
                        return Err(StorageError::NotFound(page.to_string()));
                    }
                }
                return Err(StorageError::S3 {
                    page: page.to_string(),
                    message: format!("{error:?}"),
                });
            }
        };
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|error| StorageError::S3 {
                page: page.to_string(),
                message: format!("failed to read response body: {error:?}"),
            })?
            .into_bytes();
        Ok(decode_comment_file(&bytes)?)
    }

    async fn save_page(&self, page: &str, data: &CommentFileData) -> Result<(), StorageError> {
        let payload = encode_comment_file(data)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.object_key(page))
            .body(ByteStream::from(payload))
            .send()
            .await
            .map_err(|error| StorageError::S3 {
                page: page.to_string(),
                message: format!("{error:?}"),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notepin_shared::Comment;
    use pretty_assertions::assert_eq;

    fn data() -> CommentFileData {
        CommentFileData {
            comments: vec![Comment {
                id: "c1".into(),
                x: 12.5,
                y: 80.0,
                text: "tighten this copy".into(),
                color: Some("#ef4444".into()),
                resolved: None,
                created_at: 1_700_000_000_000,
            }],
        }
    }

    #[tokio::test]
    async fn file_storage_persists_pages() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf());

        storage.save_page("home", &data()).await.unwrap();

        assert!(dir.path().join("home.bin").exists());
        assert_eq!(storage.load_page("home").await.unwrap(), data());
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn missing_page_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf());
        assert!(matches!(
            storage.load_page("nothing").await,
            Err(StorageError::NotFound(page)) if page == "nothing"
        ));
    }

    #[tokio::test]
    async fn corrupt_page_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.bin"), b"garbage").unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf());
        assert!(matches!(
            storage.load_page("broken").await,
            Err(StorageError::Format(CommentFileError::BadMagic))
        ));
    }

    #[test]
    fn object_keys_respect_the_prefix() {
        assert_eq!(object_key(&normalize_prefix(None), "home"), "home.bin");
        assert_eq!(
            object_key(&normalize_prefix(Some("/notes/")), "home"),
            "notes/home.bin"
        );
    }
}

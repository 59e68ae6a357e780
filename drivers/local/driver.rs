use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::config::StorageProvider;
use crate::error::{StorageError, StorageResult};
use crate::storage::{
    cancellable, validate_bucket, validate_expiry, validate_input, ObjectReader, ObjectStorage,
    ObjectWriter,
};

/// Marker inside temporary upload file names / 临时上传文件标记
const TEMP_MARKER: &str = ".tmp-";

static UPLOAD_SEQ: AtomicU64 = AtomicU64::new(0);

/// Local filesystem storage: `{root}/{bucket}/{key}` / 本地文件存储
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Create storage at the given root directory, creating it if missing / 创建本地存储
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref();
        if !root.exists() {
            std::fs::create_dir_all(root).map_err(|e| {
                StorageError::storage(format!("Failed to create storage root {:?}", root), e)
            })?;
        }
        let root = root.canonicalize().map_err(|e| {
            StorageError::storage(format!("Failed to resolve storage root {:?}", root), e)
        })?;

        tracing::info!("Local storage initialized, root: {:?}", root);
        Ok(Self { root })
    }

    /// Get root directory / 获取根目录
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Bucket directory; bucket names are a single path component / 存储桶目录
    fn bucket_path(&self, bucket: &str) -> StorageResult<PathBuf> {
        let mut components = Path::new(bucket).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Ok(self.root.join(name)),
            _ => Err(StorageError::invalid_argument(
                "bucket",
                format!("Bucket name '{}' is not a plain directory name", bucket),
            )),
        }
    }

    /// Object path, rejecting keys that would leave the bucket / 对象路径（防止目录穿越）
    fn object_path(&self, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        let mut path = self.bucket_path(bucket)?;
        let key = key.replace('\\', "/");
        let mut has_name = false;
        for component in Path::new(&key).components() {
            match component {
                Component::Normal(name) => {
                    path.push(name);
                    has_name = true;
                }
                Component::CurDir => {}
                _ => {
                    return Err(StorageError::invalid_argument(
                        "key",
                        format!("Object name '{}' escapes the bucket directory", key),
                    ))
                }
            }
        }
        if !has_name {
            return Err(StorageError::invalid_argument(
                "key",
                format!("Object name '{}' does not name a file", key),
            ));
        }
        Ok(path)
    }

    /// Sibling temp file the upload is streamed into before the rename / 上传临时文件
    fn temp_path(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let seq = UPLOAD_SEQ.fetch_add(1, Ordering::Relaxed);
        path.with_file_name(format!(".{}{}{}-{}", name, TEMP_MARKER, std::process::id(), seq))
    }

    /// Whether a regular file exists at `path` / 文件是否存在
    async fn file_exists(path: &Path) -> std::io::Result<bool> {
        match tokio::fs::metadata(path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    fn provider(&self) -> StorageProvider {
        StorageProvider::Local
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: &mut ObjectReader<'_>,
        cancel: &CancellationToken,
    ) -> StorageResult<()> {
        validate_input(bucket, key)?;
        let path = self.object_path(bucket, key)?;
        let temp_path = Self::temp_path(&path);

        // The target is only replaced by a rename once the whole body is on disk
        let result = cancellable(cancel, async {
            // Bucket directory (and nested key directories) created unconditionally
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
            }
            {
                let mut file = tokio::fs::File::create(&temp_path).await.map_err(io_err)?;
                tokio::io::copy(&mut *data, &mut file).await.map_err(io_err)?;
                file.flush().await.map_err(io_err)?;
            }
            tokio::fs::rename(&temp_path, &path).await.map_err(io_err)?;
            Ok(())
        })
        .await;

        if result.is_err() {
            if let Err(e) = tokio::fs::remove_file(&temp_path).await {
                if e.kind() != ErrorKind::NotFound {
                    tracing::warn!("Failed to remove temporary upload file {:?}: {}", temp_path, e);
                }
            }
        }

        match result {
            Ok(()) => {
                tracing::info!("File {} uploaded to bucket {}", key, bucket);
                Ok(())
            }
            Err(StorageError::Cancelled) => Err(StorageError::Cancelled),
            Err(e) => {
                tracing::error!("LocalStorage error uploading file {} to bucket {}: {}", key, bucket, e);
                Err(wrap("LocalStorage upload failed", e))
            }
        }
    }

    async fn download(
        &self,
        bucket: &str,
        key: &str,
        output: &mut ObjectWriter<'_>,
        cancel: &CancellationToken,
    ) -> StorageResult<()> {
        validate_input(bucket, key)?;
        let path = self.object_path(bucket, key)?;

        let result = cancellable(cancel, async {
            if !Self::file_exists(&path).await.map_err(io_err)? {
                return Err(StorageError::not_found(bucket, key));
            }
            let mut file = tokio::fs::File::open(&path).await.map_err(io_err)?;
            tokio::io::copy(&mut file, &mut *output).await.map_err(io_err)?;
            output.flush().await.map_err(io_err)?;
            Ok(())
        })
        .await;

        match result {
            Ok(()) => {
                tracing::info!("File {} downloaded from bucket {}", key, bucket);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("File {} not found in bucket {}", key, bucket);
                Err(e)
            }
            Err(StorageError::Cancelled) => Err(StorageError::Cancelled),
            Err(e) => {
                tracing::error!("LocalStorage error downloading file {} from bucket {}: {}", key, bucket, e);
                Err(wrap("LocalStorage download failed", e))
            }
        }
    }

    async fn delete(&self, bucket: &str, key: &str, cancel: &CancellationToken) -> StorageResult<()> {
        validate_input(bucket, key)?;
        let path = self.object_path(bucket, key)?;

        let result = cancellable(cancel, async {
            if !Self::file_exists(&path).await.map_err(io_err)? {
                return Err(StorageError::not_found(bucket, key));
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                // Removed by a concurrent caller between the check and the delete
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    Err(StorageError::not_found_with(bucket, key, e))
                }
                Err(e) => Err(io_err(e)),
            }
        })
        .await;

        match result {
            Ok(()) => {
                tracing::info!("File {} deleted from bucket {}", key, bucket);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("File {} not found in bucket {}", key, bucket);
                Err(e)
            }
            Err(StorageError::Cancelled) => Err(StorageError::Cancelled),
            Err(e) => {
                tracing::error!("LocalStorage error deleting file {} from bucket {}: {}", key, bucket, e);
                Err(wrap("LocalStorage delete failed", e))
            }
        }
    }

    async fn exists(&self, bucket: &str, key: &str, cancel: &CancellationToken) -> StorageResult<bool> {
        validate_input(bucket, key)?;
        let path = self.object_path(bucket, key)?;

        cancellable(cancel, async {
            Self::file_exists(&path).await.map_err(|e| {
                tracing::error!(
                    "LocalStorage error checking existence of file {} in bucket {}: {}",
                    key, bucket, e
                );
                StorageError::storage("LocalStorage file existence check failed", e)
            })
        })
        .await
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        cancel: &CancellationToken,
    ) -> StorageResult<Vec<String>> {
        validate_bucket(bucket)?;
        let bucket_path = self.bucket_path(bucket)?;
        let prefix = prefix.unwrap_or("");

        let result = cancellable(cancel, async {
            let mut entries = match tokio::fs::read_dir(&bucket_path).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(io_err(e)),
            };

            let mut names = Vec::new();
            while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
                if !entry.file_type().await.map_err(io_err)?.is_file() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().to_string();
                if is_temp_name(&name) {
                    continue;
                }
                if name.starts_with(prefix) {
                    names.push(name);
                }
            }
            names.sort();
            Ok(names)
        })
        .await;

        match result {
            Ok(names) => {
                tracing::info!("Listed {} files in bucket {}", names.len(), bucket);
                Ok(names)
            }
            Err(StorageError::Cancelled) => Err(StorageError::Cancelled),
            Err(e) => {
                tracing::error!("LocalStorage error listing files in bucket {}: {}", bucket, e);
                Err(wrap("LocalStorage list files failed", e))
            }
        }
    }

    /// No real presigning: returns the absolute file path of an existing object / 本地存储返回文件路径
    async fn presigned_url(&self, bucket: &str, key: &str, expiry: Duration) -> StorageResult<String> {
        validate_input(bucket, key)?;
        validate_expiry(expiry)?;
        let path = self.object_path(bucket, key)?;

        let exists = Self::file_exists(&path)
            .await
            .map_err(|e| StorageError::storage("LocalStorage presigned URL generation failed", e))?;
        if !exists {
            tracing::warn!("File {} not found in bucket {}", key, bucket);
            return Err(StorageError::not_found(bucket, key));
        }

        Ok(path.to_string_lossy().to_string())
    }
}

/// In-progress uploads are hidden from listings / 过滤临时上传文件
fn is_temp_name(name: &str) -> bool {
    name.starts_with('.') && name.contains(TEMP_MARKER)
}

fn io_err(e: std::io::Error) -> StorageError {
    StorageError::storage(e.to_string(), e)
}

/// Keep `NotFound`, re-wrap everything else under the operation message / 包装存储错误
fn wrap(message: &str, e: StorageError) -> StorageError {
    match e {
        StorageError::Storage { source: Some(source), .. } => StorageError::Storage {
            message: message.to_string(),
            source: Some(source),
        },
        StorageError::Storage { message: inner, source: None } => {
            StorageError::storage_msg(format!("{}: {}", message, inner))
        }
        other => other,
    }
}

//! 华为云OBS驱动核心实现
//!
//! 与S3驱动语义一致: NoSuchKey 视为 NotFound，其余厂商错误统一为 Storage 错误。
//! 列表按 marker 翻页直到 IsTruncated 为 false。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::config::{StorageOptions, StorageProvider};
use crate::error::{StorageError, StorageResult};
use crate::storage::{
    cancellable, read_body, validate_bucket, validate_expiry, validate_input, ObjectReader,
    ObjectStorage, ObjectWriter,
};
use super::client::{ObsApi, ObsClientError};

const NO_SUCH_KEY: &str = "NoSuchKey";
const NOT_FOUND: &str = "NotFound";
const BUCKET_ALREADY_OWNED: &str = "BucketAlreadyOwnedByYou";
const BUCKET_ALREADY_EXISTS: &str = "BucketAlreadyExists";

/// 华为云OBS驱动
pub struct ObsStorage {
    client: Arc<dyn ObsApi>,
    create_bucket_if_not_exists: bool,
}

impl ObsStorage {
    pub fn new(options: &StorageOptions, client: Arc<dyn ObsApi>) -> Self {
        Self {
            client,
            create_bucket_if_not_exists: options.create_bucket_if_not_exists,
        }
    }

    async fn ensure_bucket(&self, bucket: &str) -> Result<(), ObsClientError> {
        if self.client.head_bucket(bucket).await? {
            return Ok(());
        }

        tracing::info!("OBS bucket {} does not exist, creating it", bucket);
        match self.client.create_bucket(bucket).await {
            Ok(()) => Ok(()),
            Err(e) if e.code == BUCKET_ALREADY_OWNED || e.code == BUCKET_ALREADY_EXISTS => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn translate(message: &str, err: ObsClientError) -> StorageError {
    StorageError::storage(format!("{}: {}", message, err.message), err)
}

#[async_trait]
impl ObjectStorage for ObsStorage {
    fn provider(&self) -> StorageProvider {
        StorageProvider::HuaweiObs
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: &mut ObjectReader<'_>,
        cancel: &CancellationToken,
    ) -> StorageResult<()> {
        validate_input(bucket, key)?;

        cancellable(cancel, async {
            if self.create_bucket_if_not_exists {
                self.ensure_bucket(bucket).await.map_err(|e| {
                    tracing::error!("Error creating bucket {} for file {}: {}", bucket, key, e);
                    translate("File upload failed to OBS", e)
                })?;
            }

            let body = read_body(&mut *data).await?;
            tracing::debug!("OBS PutObject: bucket={}, key={}, size={}", bucket, key, body.len());

            self.client.put_object(bucket, key, body).await.map_err(|e| {
                tracing::error!("Error uploading file {} to bucket {}: {}", key, bucket, e);
                translate("File upload failed to OBS", e)
            })?;

            tracing::info!("File {} uploaded to bucket {}", key, bucket);
            Ok(())
        })
        .await
    }

    async fn download(
        &self,
        bucket: &str,
        key: &str,
        output: &mut ObjectWriter<'_>,
        cancel: &CancellationToken,
    ) -> StorageResult<()> {
        validate_input(bucket, key)?;

        cancellable(cancel, async {
            let mut body = match self.client.get_object(bucket, key).await {
                Ok(body) => body,
                Err(e) if e.code == NO_SUCH_KEY => {
                    tracing::warn!("File {} not found in bucket {}", key, bucket);
                    return Err(StorageError::not_found_with(bucket, key, e));
                }
                Err(e) => {
                    tracing::error!("Error downloading file {} from bucket {}: {}", key, bucket, e);
                    return Err(translate("File download failed from OBS", e));
                }
            };

            tokio::io::copy(&mut body, &mut *output)
                .await
                .map_err(|e| StorageError::storage("File download failed from OBS", e))?;
            output
                .flush()
                .await
                .map_err(|e| StorageError::storage("File download failed from OBS", e))?;

            tracing::info!("File {} downloaded from bucket {}", key, bucket);
            Ok(())
        })
        .await
    }

    async fn delete(&self, bucket: &str, key: &str, cancel: &CancellationToken) -> StorageResult<()> {
        validate_input(bucket, key)?;

        cancellable(cancel, async {
            self.client.delete_object(bucket, key).await.map_err(|e| {
                tracing::error!("Error deleting file {} from bucket {}: {}", key, bucket, e);
                translate("Error deleting file", e)
            })?;

            tracing::info!("File {} deleted from bucket {}", key, bucket);
            Ok(())
        })
        .await
    }

    async fn exists(&self, bucket: &str, key: &str, cancel: &CancellationToken) -> StorageResult<bool> {
        validate_input(bucket, key)?;

        cancellable(cancel, async {
            match self.client.get_object_metadata(bucket, key).await {
                Ok(_) => Ok(true),
                Err(e) if e.code == NOT_FOUND || e.code == NO_SUCH_KEY => {
                    tracing::info!("File {} does not exist in bucket {}", key, bucket);
                    Ok(false)
                }
                Err(e) => {
                    tracing::error!("Huawei OBS error checking file existence {} in bucket {}: {}", key, bucket, e);
                    Err(translate("Huawei OBS existence check failed", e))
                }
            }
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

        cancellable(cancel, async {
            let mut keys: Vec<String> = Vec::new();
            let mut marker: Option<String> = None;

            loop {
                let page = self
                    .client
                    .list_objects(bucket, prefix, marker.take())
                    .await
                    .map_err(|e| {
                        tracing::error!(
                            "Huawei OBS error listing files in bucket {} with prefix {:?}: {}",
                            bucket, prefix, e
                        );
                        translate("Huawei OBS list files failed", e)
                    })?;

                let last_key = page.keys.last().cloned();
                keys.extend(page.keys);

                if !page.is_truncated {
                    break;
                }
                // 未返回 NextMarker 时以本页最后一个 key 作为下一页起点
                match page.next_marker.or(last_key) {
                    Some(next) => marker = Some(next),
                    None => break,
                }
            }

            tracing::info!("Listed {} files in bucket {}", keys.len(), bucket);
            Ok(keys)
        })
        .await
    }

    /// 生成临时授权URL，不检查对象是否存在
    async fn presigned_url(&self, bucket: &str, key: &str, expiry: Duration) -> StorageResult<String> {
        validate_input(bucket, key)?;
        validate_expiry(expiry)?;

        let url = self
            .client
            .create_temporary_signature(bucket, key, expiry)
            .await
            .map_err(|e| {
                tracing::error!("Huawei OBS error generating presigned URL for {} in bucket {}: {}", key, bucket, e);
                translate("Huawei OBS presigned URL generation failed", e)
            })?;

        tracing::info!("Generated presigned URL for {} in bucket {}", key, bucket);
        Ok(url)
    }
}

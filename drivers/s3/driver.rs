//! S3驱动核心实现
//!
//! - 上传为单次 PutObject，不做分片
//! - NoSuchKey 转换为 NotFound，其余厂商错误统一为 Storage 错误
//! - 列表自动跟随 continuation token 直到结束

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
use super::client::{S3Api, S3ClientError};

const NO_SUCH_KEY: &str = "NoSuchKey";
const NOT_FOUND: &str = "NotFound";
const BUCKET_ALREADY_OWNED: &str = "BucketAlreadyOwnedByYou";
const BUCKET_ALREADY_EXISTS: &str = "BucketAlreadyExists";

/// S3驱动
pub struct S3Storage {
    client: Arc<dyn S3Api>,
    create_bucket_if_not_exists: bool,
}

impl S3Storage {
    pub fn new(options: &StorageOptions, client: Arc<dyn S3Api>) -> Self {
        Self {
            client,
            create_bucket_if_not_exists: options.create_bucket_if_not_exists,
        }
    }

    /// 存储桶不存在时创建
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), S3ClientError> {
        if self.client.head_bucket(bucket).await? {
            return Ok(());
        }

        tracing::info!("S3 bucket {} does not exist, creating it", bucket);
        match self.client.create_bucket(bucket).await {
            Ok(()) => Ok(()),
            // 并发创建时对方已成功
            Err(e) if e.code == BUCKET_ALREADY_OWNED || e.code == BUCKET_ALREADY_EXISTS => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn translate(message: &str, err: S3ClientError) -> StorageError {
    StorageError::storage(format!("{}: {}", message, err.message), err)
}

#[async_trait]
impl ObjectStorage for S3Storage {
    fn provider(&self) -> StorageProvider {
        StorageProvider::AwsS3
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
                    translate("File upload failed to S3", e)
                })?;
            }

            let body = read_body(&mut *data).await?;
            tracing::debug!("S3 PutObject: bucket={}, key={}, size={}", bucket, key, body.len());

            self.client.put_object(bucket, key, body).await.map_err(|e| {
                tracing::error!("Error uploading file {} to bucket {}: {}", key, bucket, e);
                translate("File upload failed to S3", e)
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
                    return Err(translate("File download failed from S3", e));
                }
            };

            tokio::io::copy(&mut body, &mut *output)
                .await
                .map_err(|e| StorageError::storage("File download failed from S3", e))?;
            output
                .flush()
                .await
                .map_err(|e| StorageError::storage("File download failed from S3", e))?;

            tracing::info!("File {} downloaded from bucket {}", key, bucket);
            Ok(())
        })
        .await
    }

    /// S3 delete is idempotent, a missing key is reported as success
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
            match self.client.head_object(bucket, key).await {
                Ok(_) => Ok(true),
                Err(e) if e.code == NOT_FOUND || e.code == NO_SUCH_KEY => {
                    tracing::info!("File {} does not exist in bucket {}", key, bucket);
                    Ok(false)
                }
                Err(e) => {
                    tracing::error!("AWS S3 error checking file existence {} in bucket {}: {}", key, bucket, e);
                    Err(translate("AWS S3 existence check failed", e))
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
            let mut keys = Vec::new();
            let mut continuation_token: Option<String> = None;

            loop {
                let page = self
                    .client
                    .list_objects_v2(bucket, prefix, continuation_token.take())
                    .await
                    .map_err(|e| {
                        tracing::error!(
                            "AWS S3 error listing files in bucket {} with prefix {:?}: {}",
                            bucket, prefix, e
                        );
                        translate("AWS S3 list files failed", e)
                    })?;

                keys.extend(page.keys);

                match page.next_continuation_token {
                    Some(token) => continuation_token = Some(token),
                    None => break,
                }
            }

            tracing::info!("Listed {} files in bucket {}", keys.len(), bucket);
            Ok(keys)
        })
        .await
    }

    /// 生成预签名URL，不检查对象是否存在
    async fn presigned_url(&self, bucket: &str, key: &str, expiry: Duration) -> StorageResult<String> {
        validate_input(bucket, key)?;
        validate_expiry(expiry)?;

        self.client.presign_get(bucket, key, expiry).await.map_err(|e| {
            tracing::error!("AWS S3 error generating presigned URL for {} in bucket {}: {}", key, bucket, e);
            translate("AWS S3 presigned URL generation failed", e)
        })
    }
}

use async_trait::async_trait;
use bytes::Bytes;
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::config::StorageProvider;
use crate::error::{StorageError, StorageResult};

pub mod selector;

pub use selector::{create_storage, StorageFactory, StorageSelector};

/// Source stream handed to `upload` / 上传数据源
pub type ObjectReader<'a> = dyn AsyncRead + Unpin + Send + 'a;

/// Sink stream handed to `download` / 下载输出
pub type ObjectWriter<'a> = dyn AsyncWrite + Unpin + Send + 'a;

/// Body returned by a vendor client / 厂商客户端返回的对象内容
pub type ObjectBody = Box<dyn AsyncRead + Unpin + Send>;

/// Uniform object storage contract (all providers implement it) / 统一对象存储接口
///
/// Every operation validates `bucket` and `key` before touching the network or the
/// filesystem. I/O operations take a cancellation token and resolve to
/// [`StorageError::Cancelled`] once it fires.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Provider backing this instance / 存储提供商
    fn provider(&self) -> StorageProvider;

    /// Write `data` to (bucket, key), replacing any existing object / 上传对象
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: &mut ObjectReader<'_>,
        cancel: &CancellationToken,
    ) -> StorageResult<()>;

    /// Stream the object into `output` / 下载对象
    ///
    /// Returns `NotFound` when the object does not exist.
    async fn download(
        &self,
        bucket: &str,
        key: &str,
        output: &mut ObjectWriter<'_>,
        cancel: &CancellationToken,
    ) -> StorageResult<()>;

    /// Delete the object / 删除对象
    async fn delete(&self, bucket: &str, key: &str, cancel: &CancellationToken) -> StorageResult<()>;

    /// Absence is `Ok(false)`, never an error / 检查对象是否存在
    async fn exists(&self, bucket: &str, key: &str, cancel: &CancellationToken) -> StorageResult<bool>;

    /// All keys in the bucket starting with `prefix`, pagination fully drained / 列出对象
    async fn list(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        cancel: &CancellationToken,
    ) -> StorageResult<Vec<String>>;

    /// Time-limited URL for the object / 生成预签名URL
    async fn presigned_url(&self, bucket: &str, key: &str, expiry: Duration) -> StorageResult<String>;
}

/// Reject empty or whitespace-only bucket names / 校验存储桶名称
pub fn validate_bucket(bucket: &str) -> StorageResult<()> {
    if bucket.trim().is_empty() {
        return Err(StorageError::invalid_argument(
            "bucket",
            "Bucket name cannot be null or empty",
        ));
    }
    Ok(())
}

/// Reject empty or whitespace-only bucket names and keys / 校验存储桶和对象名称
pub fn validate_input(bucket: &str, key: &str) -> StorageResult<()> {
    validate_bucket(bucket)?;
    if key.trim().is_empty() {
        return Err(StorageError::invalid_argument(
            "key",
            "Object name cannot be null or empty",
        ));
    }
    Ok(())
}

pub(crate) fn validate_expiry(expiry: Duration) -> StorageResult<()> {
    if expiry.is_zero() {
        return Err(StorageError::invalid_argument(
            "expiry",
            "Presigned URL expiry must be positive",
        ));
    }
    Ok(())
}

/// Race `fut` against the cancellation token / 支持取消的执行
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> StorageResult<T>
where
    F: Future<Output = StorageResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StorageError::Cancelled),
        result = fut => result,
    }
}

/// Buffer the upload source for a single non-chunked put / 读取完整上传内容
pub(crate) async fn read_body(data: &mut ObjectReader<'_>) -> StorageResult<Bytes> {
    let mut buf = Vec::new();
    data.read_to_end(&mut buf)
        .await
        .map_err(|e| StorageError::storage("Failed to read upload stream", e))?;
    Ok(Bytes::from(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_input() {
        assert!(validate_input("docs", "a.txt").is_ok());
        assert!(validate_input("", "a.txt").unwrap_err().is_invalid_argument());
        assert!(validate_input("   ", "a.txt").unwrap_err().is_invalid_argument());
        assert!(validate_input("docs", "").unwrap_err().is_invalid_argument());
        assert!(validate_input("docs", "\t\n").unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_validate_input_names_the_argument() {
        match validate_input("docs", " ") {
            Err(StorageError::InvalidArgument { name, .. }) => assert_eq!(name, "key"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancellable_reports_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = cancellable(&cancel, async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(StorageError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancellable_passes_result_through() {
        let cancel = CancellationToken::new();
        let result = cancellable(&cancel, async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_read_body() {
        let mut data: &[u8] = b"hello";
        let body = read_body(&mut data).await.unwrap();
        assert_eq!(&body[..], b"hello");
    }
}

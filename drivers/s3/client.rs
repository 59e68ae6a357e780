//! S3客户端封装
//!
//! `S3Api` 是适配器依赖的厂商能力集合，`RustS3Client` 基于 rust-s3 实现。
//! 所有失败都以 `S3ClientError { code, status, message }` 返回，code 与 S3 XML 错误码一致。

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{BucketConfiguration, Region};
use serde::Deserialize;
use thiserror::Error;

use crate::storage::ObjectBody;
use super::config::S3ClientConfig;

const TRANSPORT_ERROR: &str = "TransportError";
const NO_SUCH_BUCKET: &str = "NoSuchBucket";

/// S3 厂商错误（按错误码区分）
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct S3ClientError {
    pub code: String,
    pub status: Option<u16>,
    pub message: String,
}

impl S3ClientError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// 请求未得到服务端响应（网络、TLS、配置等）
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(TRANSPORT_ERROR, message)
    }

    /// 网络错误和5xx可重试
    pub fn is_retryable(&self) -> bool {
        self.code == TRANSPORT_ERROR || matches!(self.status, Some(500..=599))
    }

    /// 从非2xx响应解析错误，body 为空时按状态码推断
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let parsed = std::str::from_utf8(body)
            .ok()
            .filter(|text| !text.trim().is_empty())
            .and_then(|text| quick_xml::de::from_str::<ErrorResponse>(text).ok());

        match parsed {
            Some(err) => Self::new(err.code, err.message).with_status(status),
            None => Self::new(code_for_status(status), format!("HTTP {}", status)).with_status(status),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorResponse {
    code: String,
    #[serde(default)]
    message: String,
}

fn code_for_status(status: u16) -> &'static str {
    match status {
        400 => "BadRequest",
        403 => "AccessDenied",
        404 => "NotFound",
        409 => "Conflict",
        500..=599 => "InternalError",
        _ => "UnknownError",
    }
}

/// HeadObject 结果
#[derive(Debug, Clone, Default)]
pub struct HeadObjectOutput {
    pub content_length: Option<u64>,
}

/// ListObjectsV2 单页结果
#[derive(Debug, Clone, Default)]
pub struct ListObjectsV2Page {
    pub keys: Vec<String>,
    /// 仅在结果被截断时存在
    pub next_continuation_token: Option<String>,
}

/// S3 厂商能力集合
#[async_trait]
pub trait S3Api: Send + Sync {
    async fn head_bucket(&self, bucket: &str) -> Result<bool, S3ClientError>;

    async fn create_bucket(&self, bucket: &str) -> Result<(), S3ClientError>;

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<(), S3ClientError>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, S3ClientError>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), S3ClientError>;

    async fn head_object(&self, bucket: &str, key: &str) -> Result<HeadObjectOutput, S3ClientError>;

    async fn list_objects_v2(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        continuation_token: Option<String>,
    ) -> Result<ListObjectsV2Page, S3ClientError>;

    async fn presign_get(&self, bucket: &str, key: &str, expiry: Duration) -> Result<String, S3ClientError>;
}

/// 基于 rust-s3 的客户端
pub struct RustS3Client {
    config: S3ClientConfig,
    region: Region,
    credentials: Credentials,
}

impl RustS3Client {
    pub fn new(config: S3ClientConfig) -> Result<Self, S3ClientError> {
        let credentials = Credentials::new(
            Some(&config.access_key_id),
            Some(&config.secret_access_key),
            if config.session_token.is_empty() { None } else { Some(&config.session_token) },
            None,
            None,
        )
        .map_err(|e| S3ClientError::new("InvalidCredentials", format!("创建S3凭证失败: {}", e)))?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.resolved_endpoint(),
        };

        tracing::debug!("S3 client configured: endpoint={}, region={}", config.resolved_endpoint(), config.region);
        Ok(Self { config, region, credentials })
    }

    /// 为指定存储桶创建 rust-s3 Bucket 句柄
    fn bucket(&self, name: &str) -> Result<Box<Bucket>, S3ClientError> {
        let bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())
            .map_err(|e| S3ClientError::new("InvalidBucketName", format!("创建S3 Bucket失败: {}", e)))?;

        let mut bucket = if self.config.force_path_style {
            bucket.with_path_style()
        } else {
            bucket
        };
        bucket.set_request_timeout(Some(self.config.timeout()));
        Ok(bucket)
    }

    /// 按配置次数重试可重试的失败
    async fn retry<T, F, Fut>(&self, op: &str, f: F) -> Result<T, S3ClientError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, S3ClientError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Err(e) if e.is_retryable() && attempt < self.config.max_error_retry => {
                    attempt += 1;
                    let delay = Duration::from_millis(100 * (1u64 << attempt.min(6)));
                    tracing::warn!(
                        "S3 {} failed, retry {}/{} in {:?}: {}",
                        op,
                        attempt,
                        self.config.max_error_retry,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }
}

/// rust-s3 错误转换
fn map_s3_error(err: S3Error) -> S3ClientError {
    match err {
        S3Error::HttpFailWithBody(status, body) => S3ClientError::from_response(status, body.as_bytes()),
        other => S3ClientError::transport(other.to_string()),
    }
}

fn check_status(status: u16, body: &[u8]) -> Result<(), S3ClientError> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(S3ClientError::from_response(status, body))
    }
}

/// HeadBucket 结果: 404 / NoSuchBucket 表示不存在，其余错误原样返回
fn bucket_presence(result: Result<(), S3ClientError>) -> Result<bool, S3ClientError> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.code == NO_SUCH_BUCKET || e.status == Some(404) => Ok(false),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl S3Api for RustS3Client {
    /// HEAD 存储桶本身，不依赖 ListAllMyBuckets 权限
    async fn head_bucket(&self, bucket: &str) -> Result<bool, S3ClientError> {
        self.retry("HeadBucket", move || async move {
            let (_, status) = self
                .bucket(bucket)?
                .head_object("/")
                .await
                .map_err(map_s3_error)?;
            bucket_presence(check_status(status, &[]))
        })
        .await
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), S3ClientError> {
        self.retry("CreateBucket", move || async move {
            let request = async {
                if self.config.force_path_style {
                    Bucket::create_with_path_style(
                        bucket,
                        self.region.clone(),
                        self.credentials.clone(),
                        BucketConfiguration::default(),
                    )
                    .await
                } else {
                    Bucket::create(
                        bucket,
                        self.region.clone(),
                        self.credentials.clone(),
                        BucketConfiguration::default(),
                    )
                    .await
                }
            };
            // rust-s3 建桶接口不接受超时参数，在外层限制
            let response = tokio::time::timeout(self.config.timeout(), request)
                .await
                .map_err(|_| S3ClientError::transport("CreateBucket request timed out"))?
                .map_err(map_s3_error)?;

            if response.success() {
                Ok(())
            } else {
                Err(S3ClientError::from_response(
                    response.response_code,
                    response.response_text.as_bytes(),
                ))
            }
        })
        .await
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<(), S3ClientError> {
        let body = &body;
        self.retry("PutObject", move || async move {
            let response = self
                .bucket(bucket)?
                .put_object_with_content_type(key, body, "application/octet-stream")
                .await
                .map_err(map_s3_error)?;
            check_status(response.status_code(), response.bytes())
        })
        .await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, S3ClientError> {
        let data = self
            .retry("GetObject", move || async move {
                let response = self
                    .bucket(bucket)?
                    .get_object(key)
                    .await
                    .map_err(map_s3_error)?;
                check_status(response.status_code(), response.bytes())?;
                Ok(response.bytes().clone())
            })
            .await?;

        // rust-s3返回完整响应，封装为AsyncRead
        Ok(Box::new(std::io::Cursor::new(data)))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), S3ClientError> {
        self.retry("DeleteObject", move || async move {
            let response = self
                .bucket(bucket)?
                .delete_object(key)
                .await
                .map_err(map_s3_error)?;
            check_status(response.status_code(), response.bytes())
        })
        .await
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<HeadObjectOutput, S3ClientError> {
        self.retry("HeadObject", move || async move {
            let (head, status) = self
                .bucket(bucket)?
                .head_object(key)
                .await
                .map_err(map_s3_error)?;
            check_status(status, &[])?;

            Ok(HeadObjectOutput {
                content_length: head.content_length.and_then(|len| u64::try_from(len).ok()),
            })
        })
        .await
    }

    async fn list_objects_v2(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        continuation_token: Option<String>,
    ) -> Result<ListObjectsV2Page, S3ClientError> {
        let token = continuation_token.as_deref();
        self.retry("ListObjectsV2", move || async move {
            let (result, status) = self
                .bucket(bucket)?
                .list_page(
                    prefix.unwrap_or("").to_string(),
                    None,
                    token.map(str::to_string),
                    None,
                    None,
                )
                .await
                .map_err(map_s3_error)?;
            check_status(status, &[])?;

            let next_continuation_token = if result.is_truncated {
                result.next_continuation_token
            } else {
                None
            };
            Ok(ListObjectsV2Page {
                keys: result.contents.into_iter().map(|obj| obj.key).collect(),
                next_continuation_token,
            })
        })
        .await
    }

    /// 本地计算签名，不发请求
    async fn presign_get(&self, bucket: &str, key: &str, expiry: Duration) -> Result<String, S3ClientError> {
        let expiry_secs = u32::try_from(expiry.as_secs())
            .map_err(|_| S3ClientError::new("InvalidArgument", "presign expiry out of range"))?;

        self.bucket(bucket)?
            .presign_get(key, expiry_secs, None)
            .await
            .map_err(map_s3_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_xml_body() {
        let body = br#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message><Key>a.txt</Key></Error>"#;
        let err = S3ClientError::from_response(404, body);
        assert_eq!(err.code, "NoSuchKey");
        assert_eq!(err.status, Some(404));
        assert_eq!(err.message, "The specified key does not exist.");
    }

    #[test]
    fn test_error_without_body_uses_status() {
        assert_eq!(S3ClientError::from_response(404, b"").code, "NotFound");
        assert_eq!(S3ClientError::from_response(403, b"").code, "AccessDenied");
        assert_eq!(S3ClientError::from_response(503, b"not xml").code, "InternalError");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(S3ClientError::transport("timed out").is_retryable());
        assert!(S3ClientError::from_response(503, b"").is_retryable());
        assert!(!S3ClientError::from_response(404, b"").is_retryable());
        assert!(!S3ClientError::new("AccessDenied", "denied").with_status(403).is_retryable());
    }

    #[tokio::test]
    async fn test_retry_stops_after_configured_attempts() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let client = RustS3Client::new(S3ClientConfig {
            max_error_retry: 2,
            ..S3ClientConfig::default()
        })
        .unwrap();
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: Result<(), _> = client
            .retry("Test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(S3ClientError::from_response(500, b""))
            })
            .await;
        assert_eq!(result.unwrap_err().code, "InternalError");
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        calls.store(0, Ordering::SeqCst);
        let result: Result<(), _> = client
            .retry("Test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(S3ClientError::new("NoSuchKey", "missing").with_status(404))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bucket_presence() {
        assert!(bucket_presence(Ok(())).unwrap());
        assert!(!bucket_presence(Err(S3ClientError::new("NoSuchBucket", "missing"))).unwrap());
        // HEAD 响应没有响应体，只有状态码
        assert!(!bucket_presence(check_status(404, &[])).unwrap());

        let denied = bucket_presence(check_status(403, &[])).unwrap_err();
        assert_eq!(denied.code, "AccessDenied");
    }

    #[tokio::test]
    async fn test_create_bucket_honours_timeout() {
        // 只建立连接，从不响应
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());

        let client = RustS3Client::new(S3ClientConfig {
            endpoint,
            access_key_id: "key".to_string(),
            secret_access_key: "secret".to_string(),
            timeout_seconds: 1,
            max_error_retry: 0,
            ..S3ClientConfig::default()
        })
        .unwrap();

        let err = tokio::time::timeout(Duration::from_secs(10), client.create_bucket("docs"))
            .await
            .expect("create_bucket should give up after the configured timeout")
            .unwrap_err();
        assert_eq!(err.code, TRANSPORT_ERROR);
        drop(listener);
    }

    #[test]
    fn test_check_status() {
        assert!(check_status(200, b"").is_ok());
        assert!(check_status(204, b"").is_ok());
        assert_eq!(check_status(404, b"").unwrap_err().code, "NotFound");
    }
}

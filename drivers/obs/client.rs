//! 华为云OBS客户端
//!
//! `ObsApi` 是适配器依赖的厂商能力集合，`HttpObsClient` 基于 reqwest 直接调用 OBS REST 接口。
//! 存储桶使用虚拟主机风格访问: `https://{bucket}.{endpoint}/{key}`

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::TryStreamExt;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, Method, Response};
use thiserror::Error;
use tokio_util::io::StreamReader;

use crate::storage::ObjectBody;
use super::config::ObsClientConfig;
use super::sign;
use super::types::{ErrorResponse, ListBucketResult};

const TRANSPORT_ERROR: &str = "TransportError";
const OCTET_STREAM: &str = "application/octet-stream";

/// OBS 厂商错误（按错误码区分）
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct ObsClientError {
    pub code: String,
    pub status: Option<u16>,
    pub message: String,
}

impl ObsClientError {
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

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(TRANSPORT_ERROR, message)
    }

    /// 从非2xx响应解析错误，HEAD 等无响应体的请求按状态码推断
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let parsed = std::str::from_utf8(body)
            .ok()
            .filter(|text| !text.trim().is_empty())
            .and_then(|text| quick_xml::de::from_str::<ErrorResponse>(text).ok());

        match parsed {
            Some(err) => Self::new(err.code, err.message).with_status(status),
            None => {
                let code = match status {
                    400 => "BadRequest",
                    403 => "AccessDenied",
                    404 => "NotFound",
                    409 => "Conflict",
                    500..=599 => "InternalError",
                    _ => "UnknownError",
                };
                Self::new(code, format!("HTTP {}", status)).with_status(status)
            }
        }
    }

    /// 网络错误和5xx可重试
    pub fn is_retryable(&self) -> bool {
        self.code == TRANSPORT_ERROR || matches!(self.status, Some(500..=599))
    }
}

/// GetObjectMetadata 结果
#[derive(Debug, Clone, Default)]
pub struct ObjectMetadata {
    pub content_length: Option<u64>,
}

/// ListObjects 单页结果
#[derive(Debug, Clone, Default)]
pub struct ListObjectsPage {
    pub keys: Vec<String>,
    pub is_truncated: bool,
    pub next_marker: Option<String>,
}

/// OBS 厂商能力集合
#[async_trait]
pub trait ObsApi: Send + Sync {
    async fn head_bucket(&self, bucket: &str) -> Result<bool, ObsClientError>;

    async fn create_bucket(&self, bucket: &str) -> Result<(), ObsClientError>;

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<(), ObsClientError>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, ObsClientError>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), ObsClientError>;

    async fn get_object_metadata(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, ObsClientError>;

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        marker: Option<String>,
    ) -> Result<ListObjectsPage, ObsClientError>;

    async fn create_temporary_signature(
        &self,
        bucket: &str,
        key: &str,
        expiry: Duration,
    ) -> Result<String, ObsClientError>;
}

struct ObsRequest<'a> {
    method: Method,
    bucket: &'a str,
    key: Option<&'a str>,
    query: String,
    content_type: &'a str,
    body: Option<Bytes>,
}

impl<'a> ObsRequest<'a> {
    fn new(method: Method, bucket: &'a str, key: Option<&'a str>) -> Self {
        Self {
            method,
            bucket,
            key,
            query: String::new(),
            content_type: "",
            body: None,
        }
    }
}

/// 基于 reqwest 的 OBS 客户端
pub struct HttpObsClient {
    client: Client,
    config: ObsClientConfig,
    scheme: String,
    host: String,
}

impl HttpObsClient {
    pub fn new(config: ObsClientConfig) -> Result<Self, ObsClientError> {
        let (scheme, host) = config
            .parsed_endpoint()
            .map_err(|e| ObsClientError::new("InvalidEndpoint", e))?;

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ObsClientError::transport(format!("创建HTTP客户端失败: {}", e)))?;

        tracing::debug!("OBS client configured: scheme={}, host={}", scheme, host);
        Ok(Self { client, config, scheme, host })
    }

    fn url(&self, bucket: &str, key: Option<&str>, query: &str) -> String {
        let path = key.map(sign::encode_key).unwrap_or_default();
        let mut url = format!("{}://{}.{}/{}", self.scheme, bucket, self.host, path);
        if !query.is_empty() {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    /// 发送请求，网络错误和5xx按配置次数重试
    async fn send(&self, request: ObsRequest<'_>) -> Result<Response, ObsClientError> {
        let mut attempt: u32 = 0;
        loop {
            let result = self.send_once(&request).await;
            if let Err(e) = &result {
                if e.is_retryable() && attempt < self.config.max_error_retry {
                    attempt += 1;
                    let delay = Duration::from_millis(100 * (1u64 << attempt.min(6)));
                    tracing::warn!(
                        "OBS {} {}/{} failed, retry {}/{} in {:?}: {}",
                        request.method,
                        request.bucket,
                        request.key.unwrap_or(""),
                        attempt,
                        self.config.max_error_retry,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }
            return result;
        }
    }

    async fn send_once(&self, request: &ObsRequest<'_>) -> Result<Response, ObsClientError> {
        // 每次尝试重新签名，Date 必须在服务端允许的时间窗内
        let date = sign::http_date(Utc::now());
        let md5 = request
            .body
            .as_ref()
            .map(|body| sign::content_md5(body))
            .unwrap_or_default();
        let resource = sign::canonical_resource(request.bucket, request.key);
        let to_sign = sign::string_to_sign(
            request.method.as_str(),
            &md5,
            request.content_type,
            &date,
            &resource,
        );
        let auth = sign::authorization(&self.config.access_key, &self.config.secret_key, &to_sign);
        let url = self.url(request.bucket, request.key, &request.query);

        tracing::debug!("OBS request: {} {}", request.method, url);

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .header("Date", &date)
            .header("Authorization", auth);
        if !request.content_type.is_empty() {
            builder = builder.header("Content-Type", request.content_type);
        }
        if let Some(body) = &request.body {
            builder = builder.header("Content-MD5", md5.as_str()).body(body.clone());
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| ObsClientError::transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.bytes().await.unwrap_or_default();
        Err(ObsClientError::from_response(status.as_u16(), &body))
    }
}

#[async_trait]
impl ObsApi for HttpObsClient {
    async fn head_bucket(&self, bucket: &str) -> Result<bool, ObsClientError> {
        match self.send(ObsRequest::new(Method::HEAD, bucket, None)).await {
            Ok(_) => Ok(true),
            Err(e) if e.status == Some(404) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), ObsClientError> {
        let mut request = ObsRequest::new(Method::PUT, bucket, None);
        if !self.config.region.is_empty() {
            request.content_type = "application/xml";
            request.body = Some(Bytes::from(format!(
                "<CreateBucketConfiguration><Location>{}</Location></CreateBucketConfiguration>",
                self.config.region
            )));
        }
        self.send(request).await?;
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<(), ObsClientError> {
        let mut request = ObsRequest::new(Method::PUT, bucket, Some(key));
        request.content_type = OCTET_STREAM;
        request.body = Some(body);
        self.send(request).await?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, ObsClientError> {
        let resp = self.send(ObsRequest::new(Method::GET, bucket, Some(key))).await?;

        let stream = resp
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        Ok(Box::new(StreamReader::new(Box::pin(stream))))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), ObsClientError> {
        self.send(ObsRequest::new(Method::DELETE, bucket, Some(key))).await?;
        Ok(())
    }

    async fn get_object_metadata(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, ObsClientError> {
        let resp = self.send(ObsRequest::new(Method::HEAD, bucket, Some(key))).await?;

        let content_length = resp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        Ok(ObjectMetadata { content_length })
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        marker: Option<String>,
    ) -> Result<ListObjectsPage, ObsClientError> {
        let mut params = Vec::new();
        if let Some(marker) = &marker {
            params.push(format!("marker={}", urlencoding::encode(marker)));
        }
        if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
            params.push(format!("prefix={}", urlencoding::encode(prefix)));
        }

        let mut request = ObsRequest::new(Method::GET, bucket, None);
        request.query = params.join("&");

        let text = self
            .send(request)
            .await?
            .text()
            .await
            .map_err(|e| ObsClientError::transport(e.to_string()))?;
        let result: ListBucketResult = quick_xml::de::from_str(&text)
            .map_err(|e| ObsClientError::new("MalformedXML", format!("解析ListObjects响应失败: {}", e)))?;

        Ok(ListObjectsPage {
            keys: result.contents.into_iter().map(|obj| obj.key).collect(),
            is_truncated: result.is_truncated,
            next_marker: result.next_marker.filter(|m| !m.is_empty()),
        })
    }

    async fn create_temporary_signature(
        &self,
        bucket: &str,
        key: &str,
        expiry: Duration,
    ) -> Result<String, ObsClientError> {
        let expiry_secs = i64::try_from(expiry.as_secs())
            .map_err(|_| ObsClientError::new("InvalidArgument", "presign expiry out of range"))?;
        let expires = Utc::now().timestamp().saturating_add(expiry_secs);

        let resource = sign::canonical_resource(bucket, Some(key));
        let query = sign::presign_query(
            &self.config.access_key,
            &self.config.secret_key,
            "GET",
            &resource,
            expires,
        );
        Ok(self.url(bucket, Some(key), &query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HttpObsClient {
        HttpObsClient::new(ObsClientConfig {
            endpoint: "https://obs.cn-north-4.myhuaweicloud.com".to_string(),
            access_key: "AK".to_string(),
            secret_key: "SK".to_string(),
            region: "cn-north-4".to_string(),
            timeout_seconds: 30,
            max_error_retry: 3,
        })
        .unwrap()
    }

    #[test]
    fn test_virtual_host_url() {
        let client = client();
        assert_eq!(
            client.url("docs", Some("dir/a b.txt"), ""),
            "https://docs.obs.cn-north-4.myhuaweicloud.com/dir/a%20b.txt"
        );
        assert_eq!(
            client.url("docs", None, "prefix=a"),
            "https://docs.obs.cn-north-4.myhuaweicloud.com/?prefix=a"
        );
    }

    #[test]
    fn test_error_from_response() {
        let body = b"<Error><Code>NoSuchKey</Code><Message>missing</Message></Error>";
        let err = ObsClientError::from_response(404, body);
        assert_eq!(err.code, "NoSuchKey");
        assert_eq!(err.message, "missing");
        assert!(!err.is_retryable());

        assert_eq!(ObsClientError::from_response(404, b"").code, "NotFound");
        assert!(ObsClientError::from_response(503, b"").is_retryable());
        assert!(ObsClientError::transport("connection reset").is_retryable());
    }

    #[test]
    fn test_invalid_endpoint() {
        let result = HttpObsClient::new(ObsClientConfig {
            endpoint: String::new(),
            access_key: "AK".to_string(),
            secret_key: "SK".to_string(),
            region: String::new(),
            timeout_seconds: 30,
            max_error_retry: 0,
        });
        assert_eq!(result.err().unwrap().code, "InvalidEndpoint");
    }

    #[tokio::test]
    async fn test_temporary_signature_url() {
        let url = client()
            .create_temporary_signature("docs", "a.txt", Duration::from_secs(600))
            .await
            .unwrap();

        assert!(url.starts_with("https://docs.obs.cn-north-4.myhuaweicloud.com/a.txt?AccessKeyId=AK&Expires="));
        assert!(url.contains("&Signature="));

        let expires: i64 = url
            .split("Expires=")
            .nth(1)
            .and_then(|rest| rest.split('&').next())
            .unwrap()
            .parse()
            .unwrap();
        let delta = expires - Utc::now().timestamp();
        assert!((590..=600).contains(&delta));
    }
}

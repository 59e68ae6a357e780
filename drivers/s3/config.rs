//! S3客户端配置

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::StorageOptions;

/// S3客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3ClientConfig {
    /// S3端点地址，为空时使用 https://s3.{region}.amazonaws.com
    /// MinIO: http://localhost:9000
    #[serde(default)]
    pub endpoint: String,
    /// 区域
    #[serde(default = "default_region")]
    pub region: String,
    /// Access Key ID
    pub access_key_id: String,
    /// Secret Access Key
    pub secret_access_key: String,
    /// Session Token（用于临时凭证）
    #[serde(default)]
    pub session_token: String,
    /// 强制使用路径风格（而非虚拟主机风格）
    #[serde(default = "default_path_style")]
    pub force_path_style: bool,
    /// 请求超时（秒）
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// 5xx和网络错误的重试次数
    #[serde(default = "default_retry")]
    pub max_error_retry: u32,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_path_style() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

fn default_retry() -> u32 {
    3
}

impl Default for S3ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            region: default_region(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            session_token: String::new(),
            force_path_style: default_path_style(),
            timeout_seconds: default_timeout(),
            max_error_retry: default_retry(),
        }
    }
}

impl S3ClientConfig {
    /// 从存储配置构建
    pub fn from_options(options: &StorageOptions) -> Self {
        Self {
            endpoint: options.endpoint.clone(),
            region: if options.region.is_empty() {
                default_region()
            } else {
                options.region.clone()
            },
            access_key_id: options.access_key.clone(),
            secret_access_key: options.secret_key.clone(),
            session_token: String::new(),
            force_path_style: true,
            timeout_seconds: options.timeout_seconds,
            max_error_retry: options.max_error_retry,
        }
    }

    /// 实际使用的端点地址
    pub fn resolved_endpoint(&self) -> String {
        if self.endpoint.is_empty() {
            format!("https://s3.{}.amazonaws.com", self.region)
        } else {
            self.endpoint.trim_end_matches('/').to_string()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_endpoint() {
        let mut config = S3ClientConfig {
            region: "eu-west-1".to_string(),
            ..S3ClientConfig::default()
        };
        assert_eq!(config.resolved_endpoint(), "https://s3.eu-west-1.amazonaws.com");

        config.endpoint = "http://localhost:9000/".to_string();
        assert_eq!(config.resolved_endpoint(), "http://localhost:9000");
    }

    #[test]
    fn test_from_options() {
        let options = StorageOptions {
            access_key: "ak".to_string(),
            secret_key: "sk".to_string(),
            region: String::new(),
            timeout_seconds: 5,
            max_error_retry: 1,
            ..StorageOptions::default()
        };
        let config = S3ClientConfig::from_options(&options);
        assert_eq!(config.access_key_id, "ak");
        assert_eq!(config.region, "us-east-1");
        assert!(config.force_path_style);
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.max_error_retry, 1);
    }
}

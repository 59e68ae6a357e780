//! OBS客户端配置

use std::time::Duration;

use url::Url;

use crate::config::StorageOptions;

/// OBS客户端配置
#[derive(Debug, Clone)]
pub struct ObsClientConfig {
    /// 例如 https://obs.cn-north-4.myhuaweicloud.com，省略协议时默认 https
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    /// 创建存储桶时写入 Location
    pub region: String,
    pub timeout_seconds: u64,
    /// 5xx和网络错误的重试次数
    pub max_error_retry: u32,
}

impl ObsClientConfig {
    pub fn from_options(options: &StorageOptions) -> Self {
        Self {
            endpoint: options.endpoint.clone(),
            access_key: options.access_key.clone(),
            secret_key: options.secret_key.clone(),
            region: options.region.clone(),
            timeout_seconds: options.timeout_seconds,
            max_error_retry: options.max_error_retry,
        }
    }

    /// 解析端点，返回 (scheme, host[:port])
    pub fn parsed_endpoint(&self) -> Result<(String, String), String> {
        let raw = self.endpoint.trim().trim_end_matches('/');
        if raw.is_empty() {
            return Err("OBS endpoint is required".to_string());
        }

        let with_scheme = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("https://{}", raw)
        };
        let url = Url::parse(&with_scheme).map_err(|e| format!("Invalid OBS endpoint {}: {}", raw, e))?;
        let host = url
            .host_str()
            .ok_or_else(|| format!("Invalid OBS endpoint {}: missing host", raw))?;

        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        Ok((url.scheme().to_string(), authority))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str) -> ObsClientConfig {
        ObsClientConfig {
            endpoint: endpoint.to_string(),
            access_key: "ak".to_string(),
            secret_key: "sk".to_string(),
            region: "cn-north-4".to_string(),
            timeout_seconds: 30,
            max_error_retry: 3,
        }
    }

    #[test]
    fn test_parsed_endpoint() {
        assert_eq!(
            config("https://obs.cn-north-4.myhuaweicloud.com/").parsed_endpoint().unwrap(),
            ("https".to_string(), "obs.cn-north-4.myhuaweicloud.com".to_string())
        );
        assert_eq!(
            config("obs.cn-north-4.myhuaweicloud.com").parsed_endpoint().unwrap(),
            ("https".to_string(), "obs.cn-north-4.myhuaweicloud.com".to_string())
        );
        assert_eq!(
            config("http://127.0.0.1:9000").parsed_endpoint().unwrap(),
            ("http".to_string(), "127.0.0.1:9000".to_string())
        );
    }

    #[test]
    fn test_empty_endpoint_is_rejected() {
        assert!(config("  ").parsed_endpoint().is_err());
    }
}

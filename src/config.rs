//! Application configuration module / 应用配置模块
//!
//! Storage options are loaded from config.json once at startup and passed by
//! reference to the selector. Creates default config file on first run / 首次运行时创建默认配置文件

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Storage provider selection / 存储提供商
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageProvider {
    #[serde(alias = "AwsS3")]
    AwsS3,
    #[serde(alias = "HuaweiObs")]
    HuaweiObs,
    /// Recognised in configuration, no adapter registered for it
    #[serde(alias = "DigitalOcean")]
    DigitalOcean,
    #[serde(alias = "Local")]
    Local,
}

impl fmt::Display for StorageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageProvider::AwsS3 => "aws_s3",
            StorageProvider::HuaweiObs => "huawei_obs",
            StorageProvider::DigitalOcean => "digital_ocean",
            StorageProvider::Local => "local",
        };
        f.write_str(name)
    }
}

impl FromStr for StorageProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "awss3" | "s3" => Ok(StorageProvider::AwsS3),
            "huaweiobs" | "obs" => Ok(StorageProvider::HuaweiObs),
            "digitalocean" => Ok(StorageProvider::DigitalOcean),
            "local" => Ok(StorageProvider::Local),
            other => Err(format!("Unknown storage provider: {}", other)),
        }
    }
}

/// Object storage options / 对象存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    pub provider: StorageProvider,
    pub access_key: String,
    pub secret_key: String,
    /// Endpoint URL, empty means the AWS regional endpoint / 端点地址
    pub endpoint: String,
    pub region: String,
    /// Request timeout in seconds / 请求超时（秒）
    pub timeout_seconds: u64,
    /// Root directory of the local provider / 本地存储根目录
    pub local_storage_path: PathBuf,
    /// Create a missing bucket on upload / 上传时自动创建存储桶
    pub create_bucket_if_not_exists: bool,
    /// Retry count handed to the vendor client / 厂商客户端重试次数
    pub max_error_retry: u32,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            provider: StorageProvider::Local,
            access_key: String::new(),
            secret_key: String::new(),
            endpoint: String::new(),
            region: "us-east-1".to_string(),
            timeout_seconds: 30,
            local_storage_path: PathBuf::from("storage"),
            create_bucket_if_not_exists: true,
            max_error_retry: 3,
        }
    }
}

impl StorageOptions {
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self {
            provider: StorageProvider::Local,
            local_storage_path: root.into(),
            ..Self::default()
        }
    }
}

/// Application configuration / 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub object_storage: StorageOptions,
}

/// Load configuration from file, or create default if not exists / 加载配置文件，不存在则创建默认配置
pub fn load_config(config_path: &Path) -> Result<AppConfig> {
    let mut config = if config_path.exists() {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file {:?}", config_path))?;

        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", config_path))?;

        tracing::info!("Loaded configuration from {:?}", config_path);
        config
    } else {
        let config = AppConfig::default();
        save_config(config_path, &config)?;
        tracing::info!("Created default configuration at {:?}", config_path);
        config
    };

    apply_env_overrides(&mut config.object_storage, |name| std::env::var(name).ok())?;
    Ok(config)
}

/// Save configuration to file / 保存配置到文件
pub fn save_config(config_path: &Path, config: &AppConfig) -> Result<()> {
    let content = serde_json::to_string_pretty(config).context("Failed to serialize config")?;

    std::fs::write(config_path, content)
        .with_context(|| format!("Failed to write config file {:?}", config_path))?;

    Ok(())
}

/// Environment variables take precedence over the file / 环境变量覆盖配置文件
fn apply_env_overrides<F>(options: &mut StorageOptions, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(provider) = lookup("POLYBUCKET_PROVIDER") {
        options.provider = provider.parse().map_err(anyhow::Error::msg)?;
    }
    if let Some(v) = lookup("POLYBUCKET_ACCESS_KEY") {
        options.access_key = v;
    }
    if let Some(v) = lookup("POLYBUCKET_SECRET_KEY") {
        options.secret_key = v;
    }
    if let Some(v) = lookup("POLYBUCKET_ENDPOINT") {
        options.endpoint = v;
    }
    if let Some(v) = lookup("POLYBUCKET_REGION") {
        options.region = v;
    }
    if let Some(v) = lookup("POLYBUCKET_LOCAL_PATH") {
        options.local_storage_path = PathBuf::from(v);
    }
    Ok(())
}

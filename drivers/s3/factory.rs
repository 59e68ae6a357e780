//! S3驱动工厂

use std::sync::Arc;

use crate::config::{StorageOptions, StorageProvider};
use crate::error::{StorageError, StorageResult};
use crate::storage::{ObjectStorage, StorageFactory};
use super::client::{RustS3Client, S3Api};
use super::config::S3ClientConfig;
use super::driver::S3Storage;

/// S3驱动工厂
///
/// 默认按配置创建 rust-s3 客户端；也可注入预先构建的客户端。
#[derive(Default)]
pub struct S3StorageFactory {
    client: Option<Arc<dyn S3Api>>,
}

impl S3StorageFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用已构建的客户端
    pub fn with_client(client: Arc<dyn S3Api>) -> Self {
        Self { client: Some(client) }
    }
}

impl StorageFactory for S3StorageFactory {
    fn provider(&self) -> StorageProvider {
        StorageProvider::AwsS3
    }

    fn create(&self, options: &StorageOptions) -> StorageResult<Box<dyn ObjectStorage>> {
        let client = match &self.client {
            Some(client) => client.clone(),
            None => {
                let config = S3ClientConfig::from_options(options);
                let client = RustS3Client::new(config)
                    .map_err(|e| StorageError::storage("S3 client configuration failed", e))?;
                Arc::new(client) as Arc<dyn S3Api>
            }
        };
        Ok(Box::new(S3Storage::new(options, client)))
    }
}

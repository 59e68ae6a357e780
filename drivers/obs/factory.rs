use std::sync::Arc;

use crate::config::{StorageOptions, StorageProvider};
use crate::error::{StorageError, StorageResult};
use crate::storage::{ObjectStorage, StorageFactory};
use super::client::{HttpObsClient, ObsApi};
use super::config::ObsClientConfig;
use super::driver::ObsStorage;

/// 华为云OBS驱动工厂
#[derive(Default)]
pub struct ObsStorageFactory {
    client: Option<Arc<dyn ObsApi>>,
}

impl ObsStorageFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用预先构建的客户端（测试或共享连接池）
    pub fn with_client(client: Arc<dyn ObsApi>) -> Self {
        Self { client: Some(client) }
    }
}

impl StorageFactory for ObsStorageFactory {
    fn provider(&self) -> StorageProvider {
        StorageProvider::HuaweiObs
    }

    fn create(&self, options: &StorageOptions) -> StorageResult<Box<dyn ObjectStorage>> {
        let client = match &self.client {
            Some(client) => client.clone(),
            None => {
                let client = HttpObsClient::new(ObsClientConfig::from_options(options))
                    .map_err(|e| StorageError::storage("OBS client configuration failed", e))?;
                Arc::new(client) as Arc<dyn ObsApi>
            }
        };

        Ok(Box::new(ObsStorage::new(options, client)))
    }
}

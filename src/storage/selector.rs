use std::collections::HashMap;

use crate::config::{StorageOptions, StorageProvider};
use crate::error::{StorageError, StorageResult};

use super::ObjectStorage;

/// Storage factory trait / 存储工厂 trait
pub trait StorageFactory: Send + Sync {
    /// Provider this factory builds / 对应的存储提供商
    fn provider(&self) -> StorageProvider;

    /// Create adapter instance / 创建存储实例
    fn create(&self, options: &StorageOptions) -> StorageResult<Box<dyn ObjectStorage>>;
}

/// Provider selector (one factory per provider) / 存储选择器
pub struct StorageSelector {
    factories: HashMap<StorageProvider, Box<dyn StorageFactory>>,
}

impl StorageSelector {
    /// Selector without any factories / 空选择器
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Selector with the local, S3 and OBS factories registered / 注册内置存储
    pub fn with_default_factories() -> Self {
        let mut selector = Self::new();
        crate::drivers::register_all(&mut selector);
        selector
    }

    /// Register factory, replacing any previous one for the same provider / 注册存储工厂
    pub fn register_factory(&mut self, factory: Box<dyn StorageFactory>) {
        let provider = factory.provider();
        if self.factories.insert(provider, factory).is_some() {
            tracing::debug!("Storage factory replaced: {}", provider);
        } else {
            tracing::debug!("Storage factory registered: {}", provider);
        }
    }

    /// Whether a provider can be selected / 是否支持该存储
    pub fn supports(&self, provider: StorageProvider) -> bool {
        self.factories.contains_key(&provider)
    }

    /// Build the adapter for `options.provider` / 按配置创建存储实例
    ///
    /// An unregistered provider fails here rather than on first use.
    pub fn select(&self, options: &StorageOptions) -> StorageResult<Box<dyn ObjectStorage>> {
        let factory = self.factories.get(&options.provider).ok_or_else(|| {
            tracing::error!("Unsupported storage type: {}", options.provider);
            StorageError::UnsupportedProvider(options.provider.to_string())
        })?;

        let storage = factory.create(options)?;
        tracing::info!("Object storage created: {}", options.provider);
        Ok(storage)
    }
}

impl Default for StorageSelector {
    fn default() -> Self {
        Self::with_default_factories()
    }
}

/// Select the adapter for `options` using the built-in factories / 创建对象存储
pub fn create_storage(options: &StorageOptions) -> StorageResult<Box<dyn ObjectStorage>> {
    StorageSelector::with_default_factories().select(options)
}

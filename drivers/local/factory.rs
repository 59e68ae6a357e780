use crate::config::{StorageOptions, StorageProvider};
use crate::error::StorageResult;
use crate::storage::{ObjectStorage, StorageFactory};

use super::driver::LocalStorage;

pub struct LocalStorageFactory;

impl StorageFactory for LocalStorageFactory {
    fn provider(&self) -> StorageProvider {
        StorageProvider::Local
    }

    fn create(&self, options: &StorageOptions) -> StorageResult<Box<dyn ObjectStorage>> {
        Ok(Box::new(LocalStorage::new(&options.local_storage_path)?))
    }
}

// Driver package / 驱动包
pub mod local;
pub mod obs;
pub mod s3;

use crate::storage::StorageSelector;

/// Register all drivers to StorageSelector / 注册所有驱动
///
/// DigitalOcean has no driver and stays unsupported.
pub fn register_all(selector: &mut StorageSelector) {
    // Register local filesystem driver / 注册本地驱动
    selector.register_factory(Box::new(local::LocalStorageFactory));
    // Register S3 driver / 注册S3对象存储驱动
    selector.register_factory(Box::new(s3::S3StorageFactory::new()));
    // Register Huawei OBS driver / 注册华为云OBS驱动
    selector.register_factory(Box::new(obs::ObsStorageFactory::new()));
}

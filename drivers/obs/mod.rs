//! Huawei Cloud OBS driver / 华为云OBS驱动

mod client;
mod config;
mod driver;
mod factory;
mod sign;
mod types;

pub use client::{HttpObsClient, ListObjectsPage, ObjectMetadata, ObsApi, ObsClientError};
pub use config::ObsClientConfig;
pub use driver::ObsStorage;
pub use factory::ObsStorageFactory;

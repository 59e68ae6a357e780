//! S3 compatible object storage driver / S3对象存储驱动
//!
//! AWS S3, MinIO and other S3 compatible services via rust-s3.

mod client;
mod config;
mod driver;
mod factory;

pub use client::{HeadObjectOutput, ListObjectsV2Page, RustS3Client, S3Api, S3ClientError};
pub use config::S3ClientConfig;
pub use driver::S3Storage;
pub use factory::S3StorageFactory;

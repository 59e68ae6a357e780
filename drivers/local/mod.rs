//! Local filesystem driver / 本地存储驱动
//!
//! Buckets are directories under the configured root, objects are files inside them.
//! Intended for development and tests without a cloud dependency.

mod driver;
mod factory;

pub use driver::LocalStorage;
pub use factory::LocalStorageFactory;

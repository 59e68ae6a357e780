//! Storage error taxonomy / 存储错误类型
//!
//! Callers only ever see two failure kinds from a provider: [`StorageError::NotFound`]
//! and [`StorageError::Storage`]. Argument validation, cancellation and provider
//! selection have their own variants so they are never confused with a remote failure.

use thiserror::Error;

/// Boxed originating cause kept for diagnostics / 原始错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    /// Rejected locally before any I/O / 参数校验失败
    #[error("invalid argument `{name}`: {message}")]
    InvalidArgument { name: &'static str, message: String },

    #[error("object '{key}' not found in bucket '{bucket}'")]
    NotFound {
        bucket: String,
        key: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("{message}")]
    Storage {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("operation cancelled")]
    Cancelled,

    /// Fatal configuration error raised by the selector / 不支持的存储类型
    #[error("unsupported storage provider: {0}")]
    UnsupportedProvider(String),
}

impl StorageError {
    pub fn invalid_argument(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            message: message.into(),
        }
    }

    pub fn not_found(bucket: &str, key: &str) -> Self {
        Self::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source: None,
        }
    }

    pub fn not_found_with(bucket: &str, key: &str, source: impl Into<BoxError>) -> Self {
        Self::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source: Some(source.into()),
        }
    }

    /// Generic storage failure wrapping its cause / 通用存储错误
    pub fn storage(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn storage_msg(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_storage_error_keeps_cause() {
        let cause = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = StorageError::storage("upload failed", cause);

        assert_eq!(err.to_string(), "upload failed");
        let source = err.source().expect("cause should be kept");
        assert_eq!(source.to_string(), "denied");
    }

    #[test]
    fn test_not_found_message() {
        let err = StorageError::not_found("docs", "a.txt");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "object 'a.txt' not found in bucket 'docs'");
        assert!(err.source().is_none());
    }
}

//! Unified object storage over S3-compatible services and Alibaba Cloud OSS
//! 统一对象存储：S3兼容存储与阿里云OSS
//!
//! ```no_run
//! use yaolist_objstore::{ObjectStorage, PutOptions, StorageOptions};
//!
//! # async fn demo() -> yaolist_objstore::Result<()> {
//! let options: StorageOptions = serde_json::from_str(r#"{
//!     "backendType": "oss",
//!     "accessKeyID": "id",
//!     "accessKeySecret": "secret",
//!     "region": "cn-hangzhou",
//!     "bucket": { "strategy": "fixed", "bucket": "b" }
//! }"#).expect("valid json");
//! let storage = ObjectStorage::new(options)?;
//! storage.put("a/b.txt", "hello", PutOptions::new().content_type("text/plain")).await?;
//! let object = storage.get("a/b.txt", &[]).await?;
//! assert_eq!(object.map(|o| o.content).as_deref(), Some("hello"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod storage;
pub mod utils;

// Driver modules (point to project root drivers via path attribute) / 驱动模块
#[path = "../drivers/mod.rs"]
pub mod drivers;

pub use config::{BucketOptions, CompressionOptions, RetryOptions, StorageOptions};
pub use error::{Result, StorageError};
pub use models::*;
pub use storage::compression::Codec;
pub use storage::{ObjectStorage, ObjectStore};

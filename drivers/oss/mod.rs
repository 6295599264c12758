//! Alibaba Cloud OSS backend / 阿里云OSS存储驱动

pub mod client;
pub mod driver;
pub mod http;
pub mod signer;

pub use client::{OssClient, OssError};
pub use driver::OssAdapter;
pub use http::HttpOssClient;

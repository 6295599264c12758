//! S3-compatible backend / S3兼容存储驱动

pub mod client;
pub mod driver;
pub mod http;
pub mod signer;

pub use client::{S3Client, S3Error};
pub use driver::S3Adapter;
pub use http::HttpS3Client;

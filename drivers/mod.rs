// Driver package / 驱动包
pub mod oss;
pub mod s3;
pub mod xml;

//! SDK 版本信息
//!
//! Cargo.toml 是版本号的唯一权威源，禁止手写。

/// SDK semver，来自 Cargo.toml
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// 带包名的版本串，用于日志与 User-Agent
pub fn version_string() -> String {
    format!("runwatch-sdk/{}", SDK_VERSION)
}

//! 错误类型定义
//!
//! 按照错误分类设计：
//! - `Decode` / `UnknownSigil` - 单条记录或内嵌扩展值无法解析，按记录粒度跳过，绝不中断流
//! - `Configuration` - 请求了未注册的格式版本，启动时立即报错，不重试
//! - `Transport` - 底层流失败或被异常关闭，等同于正常流结束（进入 Disconnected 状态）
//!
//! 取消是预期行为，不设错误变体：被取消的序列直接终止（`next` 返回
//! `None`），不作为失败上报。

use thiserror::Error;

/// SDK 统一结果类型
pub type Result<T> = std::result::Result<T, RunwatchSDKError>;

/// SDK 错误类型
#[derive(Debug, Error)]
pub enum RunwatchSDKError {
    /// 记录或内嵌扩展值解析失败（按记录跳过）
    #[error("Decode error: {0}")]
    Decode(String),

    /// 内联编码中出现未知的 3 字母类型码
    #[error("Unknown sigil type `{code}` in value `{value}`")]
    UnknownSigil { code: String, value: String },

    /// 未注册的格式版本等配置错误（致命，启动时上报）
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 底层流传输失败
    #[error("Transport error: {0}")]
    Transport(String),

    /// JSON 解析错误
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP 请求错误
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// 其他错误
    #[error("Other error: {0}")]
    Other(String),
}

impl RunwatchSDKError {
    /// 是否属于按记录跳过的解码类错误
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            RunwatchSDKError::Decode(_)
                | RunwatchSDKError::UnknownSigil { .. }
                | RunwatchSDKError::Json(_)
        )
    }
}

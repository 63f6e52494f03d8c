//! SDK 配置
//!
//! 超时、通道容量等运行参数，builder 风格构造。

use serde::{Deserialize, Serialize};

/// Runwatch SDK 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunwatchConfig {
    /// 状态转移事件广播缓冲区大小
    pub event_capacity: usize,
    /// 预解码快照通道容量
    pub snapshot_capacity: usize,
    /// HTTP 连接超时（秒）
    pub connect_timeout_secs: Option<u64>,
    /// HTTP 整体请求超时（秒）
    ///
    /// NDJSON 订阅是长连接，默认不设整体超时；需要连接超时语义的
    /// 调用方应自行包裹 Connecting 状态的计时器并在到期时取消会话。
    pub request_timeout_secs: Option<u64>,
}

impl Default for RunwatchConfig {
    fn default() -> Self {
        Self {
            event_capacity: 64,
            snapshot_capacity: 32,
            connect_timeout_secs: Some(10),
            request_timeout_secs: None,
        }
    }
}

impl RunwatchConfig {
    pub fn builder() -> RunwatchConfigBuilder {
        RunwatchConfigBuilder::new()
    }
}

/// 配置构造器
pub struct RunwatchConfigBuilder {
    config: RunwatchConfig,
}

impl RunwatchConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RunwatchConfig::default(),
        }
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn snapshot_capacity(mut self, capacity: usize) -> Self {
        self.config.snapshot_capacity = capacity;
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = Some(secs);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn build(self) -> RunwatchConfig {
        self.config
    }
}

impl Default for RunwatchConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_defaults() {
        let config = RunwatchConfig::builder()
            .event_capacity(128)
            .connect_timeout_secs(3)
            .build();
        assert_eq!(config.event_capacity, 128);
        assert_eq!(config.connect_timeout_secs, Some(3));
        // 未覆盖的字段保持默认值
        assert_eq!(config.snapshot_capacity, 32);
        assert_eq!(config.request_timeout_secs, None);
    }
}

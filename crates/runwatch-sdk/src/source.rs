//! NDJSON 快照订阅源
//!
//! 基于 reqwest 的快照流来源：向后端发起 NDJSON 订阅请求，把响应体
//! 的字节流交给 [`SnapshotStream`] 做帧装配和按记录解码。
//!
//! 传输安全、认证、断线重连/退避策略都不在本层：调用方拿到的是
//! 一次性的流，断了就换一个新的 [`SnapshotStream`] 重新 observe。

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::header::ACCEPT;
use reqwest::Client;
use std::fmt;
use std::time::Duration;
use tracing::info;

use crate::config::RunwatchConfig;
use crate::error::{Result, RunwatchSDKError};
use crate::formats::CURRENT_VERSION;
use crate::stream::SnapshotStream;

/// 订阅目标：一次训练运行的 (运行 ID, 迭代序号)
///
/// 同一个运行 ID 可以被销毁重建任意多次，`index` 区分是第几次。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunTarget {
    pub run_id: String,
    pub index: u32,
}

impl RunTarget {
    pub fn new(run_id: impl Into<String>, index: u32) -> Self {
        Self {
            run_id: run_id.into(),
            index,
        }
    }

    /// 目标键，用于检测"目标变了，需要新会话"
    pub fn key(&self) -> String {
        format!("{}/{}", self.run_id, self.index)
    }
}

impl fmt::Display for RunTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.run_id, self.index)
    }
}

/// 快照流来源
///
/// 传输层与读取器之间的接缝：由具体实现决定字节从哪里来。
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// 为一个订阅目标打开新的快照流
    async fn open(&self, target: &RunTarget) -> Result<SnapshotStream>;
}

/// 基于 HTTP 的 NDJSON 订阅源
pub struct NdjsonSource {
    client: Client,
    base_url: String,
}

impl NdjsonSource {
    /// 创建 NDJSON 订阅源
    pub fn new(config: &RunwatchConfig, base_url: impl Into<String>) -> Result<Self> {
        let mut builder = Client::builder();

        if let Some(timeout) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(timeout));
        }
        if let Some(timeout) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }

        let client = builder
            .build()
            .map_err(|e| RunwatchSDKError::Other(format!("创建 HTTP 客户端失败: {}", e)))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("✅ NDJSON 订阅源已创建 (base_url: {})", base_url);

        Ok(Self { client, base_url })
    }

    fn stream_url(&self, target: &RunTarget) -> String {
        format!("{}/run/{}/{}", self.base_url, target.run_id, target.index)
    }
}

#[async_trait]
impl SnapshotSource for NdjsonSource {
    async fn open(&self, target: &RunTarget) -> Result<SnapshotStream> {
        let url = self.stream_url(target);
        info!("打开快照流: {}", url);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/x-ndjson")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RunwatchSDKError::Transport(format!(
                "stream request for `{}` failed with status {}",
                target, status
            )));
        }

        let bytes = response
            .bytes_stream()
            .map_err(|e| RunwatchSDKError::Transport(e.to_string()));
        Ok(SnapshotStream::from_bytes(bytes, CURRENT_VERSION))
    }
}

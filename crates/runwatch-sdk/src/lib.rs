//! Runwatch SDK - 训练运行快照流同步 SDK
//!
//! 通过持续的全量状态快照流观察一个长生命周期远端进程（训练运行）的
//! 演进状态，容忍中途断连、订阅切换和跨部署的格式演进：
//!
//! - 📦 版本化快照编解码：大整数、时间戳、有序映射、唯一集合、不透明
//!   标识符的 JSON 线上表示，老版本写入的数据永远可解码
//! - 🧵 帧装配：原始字节流按换行切分成完整记录，块边界任意
//! - 📡 快照流读取：预解码通道或原始 NDJSON 字节流，统一成按到达顺序的
//!   惰性序列，坏记录按条跳过且可观测
//! - 🔄 同步器：持有最后已知快照，暴露 (最新快照, 断连标记)，会话严格
//!   串行切换，断连时陈旧数据可用而不是空白
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use runwatch_sdk::{NdjsonSource, RunSynchronizer, RunTarget, RunwatchConfig, SnapshotSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 配置 SDK
//!     let config = RunwatchConfig::builder()
//!         .connect_timeout_secs(10)
//!         .build();
//!
//!     // 打开订阅目标的快照流
//!     let source = NdjsonSource::new(&config, "http://localhost:3000")?;
//!     let target = RunTarget::new("my-run", 0);
//!     let stream = source.open(&target).await?;
//!
//!     // 交给同步器驱动
//!     let sync = RunSynchronizer::with_config(&config);
//!     sync.observe(target.key(), stream).await;
//!
//!     // 消费推送式视图更新
//!     let mut view = sync.subscribe();
//!     while view.changed().await.is_ok() {
//!         let current = view.borrow_and_update().clone();
//!         println!("disconnected={} snapshot={}", current.disconnected, current.snapshot.is_some());
//!     }
//!     Ok(())
//! }
//! ```

// 导出核心模块
pub mod config;
pub mod error;
pub mod formats;
pub mod framing;
pub mod source;
pub mod stream;
pub mod synchronizer;
pub mod value;
pub mod version;

// 重新导出核心类型，方便使用
pub use config::{RunwatchConfig, RunwatchConfigBuilder};
pub use error::{Result, RunwatchSDKError};
pub use formats::{resolve, resolve_str, FormatVersion, SnapshotCodec, CURRENT_VERSION};
pub use framing::LineAssembler;
pub use source::{NdjsonSource, RunTarget, SnapshotSource};
pub use stream::SnapshotStream;
pub use synchronizer::{RunSynchronizer, SnapshotView, SyncEvent, SyncState};
pub use value::{BigInt, OpaqueKey, OrderedMap, SnapshotValue, UniqueSet};
pub use version::SDK_VERSION;

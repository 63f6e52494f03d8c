//! 快照流读取器
//!
//! 把两类输入统一成一个惰性、按到达顺序、不可重启的快照序列：
//! - 预解码的快照通道（元素已经是 [`SnapshotValue`]）
//! - 原始字节流 + 帧装配器 + 版本注册表
//!
//! 错误策略：
//! - 单条记录解码失败按记录跳过并计数，绝不中断序列
//! - 传输层失败作为序列的终止错误上报，本层不重试
//! - 取消后序列立即终止，不会阻塞等待更多网络数据

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::Stream;
use futures_util::StreamExt;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::RunwatchConfig;
use crate::error::Result;
use crate::formats::{resolve, FormatVersion, SnapshotCodec};
use crate::framing::LineAssembler;
use crate::value::SnapshotValue;

/// 快照序列读取器
///
/// 序列有限直到关闭，消费后不可重启；`cancel` 之后 `next` 立即返回 `None`。
pub struct SnapshotStream {
    inner: StreamInner,
    cancel: CancellationToken,
    skipped: Arc<AtomicU64>,
    done: bool,
}

enum StreamInner {
    /// 元素已解码完成的通道
    Decoded(mpsc::Receiver<SnapshotValue>),
    /// 原始字节流（帧装配 + 按记录解码）
    Raw(RawStream),
}

struct RawStream {
    source: BoxStream<'static, Result<Bytes>>,
    assembler: LineAssembler,
    pending: VecDeque<String>,
    codec: &'static dyn SnapshotCodec,
    flushed: bool,
}

impl SnapshotStream {
    /// 包装一个预解码的快照通道
    pub fn from_snapshots(rx: mpsc::Receiver<SnapshotValue>) -> Self {
        Self {
            inner: StreamInner::Decoded(rx),
            cancel: CancellationToken::new(),
            skipped: Arc::new(AtomicU64::new(0)),
            done: false,
        }
    }

    /// 创建一对（发送端, 读取器），用于进程内直接投递快照
    pub fn channel(capacity: usize) -> (mpsc::Sender<SnapshotValue>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::from_snapshots(rx))
    }

    /// 同 [`channel`](Self::channel)，容量取自配置的 `snapshot_capacity`
    pub fn channel_with_config(
        config: &RunwatchConfig,
    ) -> (mpsc::Sender<SnapshotValue>, Self) {
        Self::channel(config.snapshot_capacity)
    }

    /// 包装一个原始字节流，按 NDJSON 记录解码
    ///
    /// `version` 选择注册表中的编解码器；所有版本的解码逻辑相同，
    /// 这里保留版本参数是为了与编码侧的版本选择保持同一入口。
    pub fn from_bytes<S>(source: S, version: FormatVersion) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        Self {
            inner: StreamInner::Raw(RawStream {
                source: source.boxed(),
                assembler: LineAssembler::new(),
                pending: VecDeque::new(),
                codec: resolve(version),
                flushed: false,
            }),
            cancel: CancellationToken::new(),
            skipped: Arc::new(AtomicU64::new(0)),
            done: false,
        }
    }

    /// 取消句柄：触发后序列迅速终止（包括正在进行的读取）
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 主动取消本序列
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// 已按记录跳过的解码失败数（静默跳过必须可观测）
    pub fn skipped_records(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// 拉取下一个快照；`None` 表示序列结束
    ///
    /// 终止条件：底层流正常结束、传输错误（作为 `Some(Err)` 上报一次）、
    /// 或取消。之后 `next` 恒定返回 `None`。
    pub async fn next(&mut self) -> Option<Result<SnapshotValue>> {
        if self.done {
            return None;
        }
        let cancel = self.cancel.clone();
        loop {
            if cancel.is_cancelled() {
                self.done = true;
                return None;
            }
            match &mut self.inner {
                StreamInner::Decoded(rx) => {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            self.done = true;
                            return None;
                        }
                        item = rx.recv() => match item {
                            Some(snapshot) => return Some(Ok(snapshot)),
                            None => {
                                self.done = true;
                                return None;
                            }
                        }
                    }
                }
                StreamInner::Raw(raw) => {
                    // 先消费已经拆出的记录，不触碰网络
                    while let Some(line) = raw.pending.pop_front() {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match decode_record(raw.codec, trimmed) {
                            Ok(snapshot) => return Some(Ok(snapshot)),
                            Err(err) => {
                                let total = self.skipped.fetch_add(1, Ordering::Relaxed) + 1;
                                warn!("⚠️ 跳过无法解码的记录 (累计 {} 条): {}", total, err);
                            }
                        }
                    }
                    if raw.flushed {
                        self.done = true;
                        return None;
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            self.done = true;
                            return None;
                        }
                        chunk = raw.source.next() => match chunk {
                            Some(Ok(bytes)) => {
                                raw.pending.extend(raw.assembler.push(&bytes));
                            }
                            Some(Err(err)) => {
                                self.done = true;
                                return Some(Err(err));
                            }
                            None => {
                                raw.flushed = true;
                                if let Some(tail) = raw.assembler.finish() {
                                    debug!("流结束，冲刷尾部残留记录");
                                    raw.pending.push_back(tail);
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn decode_record(codec: &'static dyn SnapshotCodec, record: &str) -> Result<SnapshotValue> {
    let json: JsonValue = serde_json::from_str(record)?;
    codec.decode(&json)
}

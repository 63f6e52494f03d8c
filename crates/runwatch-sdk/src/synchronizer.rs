//! 同步器
//!
//! 驱动快照流读取器，持有"最后已知良好"快照，向消费者暴露
//! (最新快照, 是否断连) 二元组：
//! - 推送式更新：`watch` 通道承载最新视图（后值覆盖前值，不排队）
//! - 状态转移事件通过 `broadcast` 通道广播
//! - 会话严格串行：上一个会话的清理完成前，新会话的读取器不启动，
//!   避免两个读取器竞争同一个暴露值
//! - 断连时保留最后收到的快照（陈旧但可用，消费者看到的是"数据可能
//!   过期"的标记，而不是空白）
//!
//! 传输失败与正常流结束同等对待：会话进入 Disconnected，不会让任何
//! 公开操作抛错。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RunwatchConfig;
use crate::stream::SnapshotStream;
use crate::value::SnapshotValue;

/// 会话状态机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    /// 初始状态，未启动读取器
    Idle,
    /// 已请求读取器，本会话尚未收到快照
    Connecting,
    /// 本会话至少收到过一个快照
    Live,
    /// 底层序列已结束（正常、出错或被取消），最后快照仍然暴露
    Disconnected,
    /// 会话被持有者取消，不再有任何转移和更新
    Terminated,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncState::Idle => write!(f, "空闲"),
            SyncState::Connecting => write!(f, "连接中"),
            SyncState::Live => write!(f, "实时"),
            SyncState::Disconnected => write!(f, "已断连"),
            SyncState::Terminated => write!(f, "已终止"),
        }
    }
}

/// 消费者可见的快照视图
///
/// 只由同步器写入；消费者只读。
#[derive(Debug, Clone, Default)]
pub struct SnapshotView {
    /// 最后收到的完整快照（会话间保留，避免空白闪烁）
    pub snapshot: Option<Arc<SnapshotValue>>,
    /// 底层序列是否已结束（数据可能过期的标记）
    pub disconnected: bool,
}

/// 同步器状态转移事件
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// 新会话开始，读取器已请求
    Connecting { target: String },
    /// 收到一个新快照（视图已替换）
    SnapshotReceived { target: String },
    /// 底层序列结束，进入断连状态
    Disconnected { target: String },
    /// 会话被显式取消
    Terminated { target: String },
}

struct Session {
    target: String,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// 快照流同步器
pub struct RunSynchronizer {
    view_tx: Arc<watch::Sender<SnapshotView>>,
    events: broadcast::Sender<SyncEvent>,
    state: Arc<RwLock<SyncState>>,
    session: Mutex<Option<Session>>,
}

impl RunSynchronizer {
    pub fn new() -> Self {
        Self::with_config(&RunwatchConfig::default())
    }

    pub fn with_config(config: &RunwatchConfig) -> Self {
        let (view_tx, _) = watch::channel(SnapshotView::default());
        let (events, _) = broadcast::channel(config.event_capacity);
        Self {
            view_tx: Arc::new(view_tx),
            events,
            state: Arc::new(RwLock::new(SyncState::Idle)),
            session: Mutex::new(None),
        }
    }

    /// 订阅快照视图（推送式，后值覆盖前值）
    pub fn subscribe(&self) -> watch::Receiver<SnapshotView> {
        self.view_tx.subscribe()
    }

    /// 订阅状态转移事件
    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// 当前视图的即时拷贝
    pub fn current(&self) -> SnapshotView {
        self.view_tx.borrow().clone()
    }

    /// 当前会话状态
    pub async fn state(&self) -> SyncState {
        *self.state.read().await
    }

    /// 当前观察的订阅目标
    pub async fn target(&self) -> Option<String> {
        self.session.lock().await.as_ref().map(|s| s.target.clone())
    }

    /// 开始（或切换到）观察一个订阅目标
    ///
    /// 上一个会话（如有）被请求取消；新会话的读取器要等上一个会话的
    /// 清理完成后才启动。清理完成后、新读取器启动前，上一个会话的最后
    /// 快照以 disconnected=false 重新暴露，在新读取器连上之前消费者
    /// 不会看到空白状态。所有视图写入都与旧会话的终态写入严格串行。
    pub async fn observe(&self, target: impl Into<String>, mut stream: SnapshotStream) {
        let target = target.into();

        let previous = {
            let mut guard = self.session.lock().await;
            guard.take()
        };
        let previous_handle = previous.map(|session| {
            if session.target != target {
                info!("订阅目标切换: {} -> {}", session.target, target);
            } else {
                info!("重新订阅目标: {}", target);
            }
            session.cancel.cancel();
            session.handle
        });

        let token = stream.cancel_handle();
        let session_token = token.clone();
        let view_tx = self.view_tx.clone();
        let events = self.events.clone();
        let state = self.state.clone();
        let session_target = target.clone();

        let handle = tokio::spawn(async move {
            // 会话严格串行：等上一个读取器释放完毕
            if let Some(handle) = previous_handle {
                let _ = handle.await;
            }
            if token.is_cancelled() {
                return;
            }

            // 上一个会话的终态写入先于其任务结束，串行化之后才把最后
            // 已知快照重新标为实时数据，避免空白闪烁
            *state.write().await = SyncState::Connecting;
            view_tx.send_modify(|view| view.disconnected = false);
            let _ = events.send(SyncEvent::Connecting {
                target: session_target.clone(),
            });

            let mut received_any = false;
            while let Some(item) = stream.next().await {
                match item {
                    Ok(snapshot) => {
                        if token.is_cancelled() {
                            break;
                        }
                        received_any = true;
                        debug!("收到新快照: {}", session_target);
                        view_tx.send_replace(SnapshotView {
                            snapshot: Some(Arc::new(snapshot)),
                            disconnected: false,
                        });
                        *state.write().await = SyncState::Live;
                        let _ = events.send(SyncEvent::SnapshotReceived {
                            target: session_target.clone(),
                        });
                    }
                    Err(err) => {
                        // 传输失败按正常流结束处理
                        warn!("⚠️ 快照流传输失败 ({}): {}", session_target, err);
                        break;
                    }
                }
            }

            // 被新会话取代时，终态由新会话接管，这里不再动暴露值
            if token.is_cancelled() {
                return;
            }
            if !received_any {
                warn!("⚠️ 快照流在收到首个快照前结束: {}", session_target);
            }
            let skipped = stream.skipped_records();
            if skipped > 0 {
                warn!("⚠️ 本会话累计跳过 {} 条无法解码的记录", skipped);
            }
            view_tx.send_modify(|view| view.disconnected = true);
            *state.write().await = SyncState::Disconnected;
            let _ = events.send(SyncEvent::Disconnected {
                target: session_target.clone(),
            });
        });

        let mut guard = self.session.lock().await;
        *guard = Some(Session {
            target,
            cancel: session_token,
            handle,
        });
    }

    /// 停止观察，取消当前会话
    ///
    /// 取消请求下发给底层读取器并等待其释放；即使读取器正处于读取
    /// 中途，本调用也不会向外抛错。之后不再有任何暴露值更新。
    pub async fn shutdown(&self) {
        let previous = {
            let mut guard = self.session.lock().await;
            guard.take()
        };
        let target = match previous {
            Some(session) => {
                session.cancel.cancel();
                let _ = session.handle.await;
                session.target
            }
            None => String::new(),
        };
        *self.state.write().await = SyncState::Terminated;
        let _ = self.events.send(SyncEvent::Terminated { target });
        info!("✅ 同步器已终止");
    }
}

impl Default for RunSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    const TICK: Duration = Duration::from_millis(500);

    async fn next_view(rx: &mut watch::Receiver<SnapshotView>) -> SnapshotView {
        timeout(TICK, rx.changed()).await.unwrap().unwrap();
        rx.borrow_and_update().clone()
    }

    fn step(n: f64) -> SnapshotValue {
        SnapshotValue::Number(n)
    }

    #[tokio::test]
    async fn test_snapshots_exposed_in_arrival_order_then_disconnected() {
        let sync = RunSynchronizer::new();
        let (tx, stream) = SnapshotStream::channel(4);

        sync.observe("run-a/0", stream).await;
        let mut rx = sync.subscribe();
        rx.borrow_and_update();

        for n in [1.0, 2.0, 3.0] {
            tx.send(step(n)).await.unwrap();
            let view = next_view(&mut rx).await;
            assert_eq!(view.snapshot.as_deref(), Some(&step(n)));
            assert!(!view.disconnected);
        }
        assert_eq!(sync.state().await, SyncState::Live);

        // 序列结束：同一快照保留，断连标记置位
        drop(tx);
        let view = next_view(&mut rx).await;
        assert_eq!(view.snapshot.as_deref(), Some(&step(3.0)));
        assert!(view.disconnected);
        assert_eq!(sync.state().await, SyncState::Disconnected);
    }

    #[tokio::test]
    async fn test_session_handoff_keeps_last_snapshot_no_empty_flash() {
        let sync = RunSynchronizer::new();
        let (tx_a, stream_a) = SnapshotStream::channel(4);

        sync.observe("run-a/0", stream_a).await;
        let mut rx = sync.subscribe();
        rx.borrow_and_update();

        tx_a.send(step(1.0)).await.unwrap();
        let view = next_view(&mut rx).await;
        assert_eq!(view.snapshot.as_deref(), Some(&step(1.0)));

        // 在会话 A 清理完成前请求切换到会话 B
        let (tx_b, stream_b) = SnapshotStream::channel(4);
        sync.observe("run-b/0", stream_b).await;
        assert_eq!(sync.target().await.as_deref(), Some("run-b/0"));

        // A1 仍然以 disconnected=false 暴露，不出现空白状态
        let view = sync.current();
        assert_eq!(view.snapshot.as_deref(), Some(&step(1.0)));
        assert!(!view.disconnected);

        // B 交付首个快照后覆盖
        tx_b.send(step(10.0)).await.unwrap();
        let view = loop {
            let view = next_view(&mut rx).await;
            if view.snapshot.as_deref() == Some(&step(10.0)) {
                break view;
            }
            // 切换过程中的中间视图也必须保留 A1，绝不为空
            assert_eq!(view.snapshot.as_deref(), Some(&step(1.0)));
        };
        assert!(!view.disconnected);
        drop(tx_a);
    }

    #[tokio::test]
    async fn test_handoff_after_stream_end_reexposes_live_view() {
        let sync = RunSynchronizer::new();
        let (tx_a, stream_a) = SnapshotStream::channel(4);
        sync.observe("run-a/0", stream_a).await;

        let mut rx = sync.subscribe();
        rx.borrow_and_update();
        tx_a.send(step(1.0)).await.unwrap();
        next_view(&mut rx).await;

        // 会话 A 自然结束，终态写入（断连标记、Disconnected）落盘
        drop(tx_a);
        let view = loop {
            let view = next_view(&mut rx).await;
            if view.disconnected {
                break view;
            }
        };
        assert_eq!(view.snapshot.as_deref(), Some(&step(1.0)));

        // 切换目标：A 的终态写入不得覆盖新会话的重新暴露，
        // 重新暴露要等 A 的任务结束后串行执行
        let (tx_b, stream_b) = SnapshotStream::channel(4);
        sync.observe("run-b/0", stream_b).await;

        let view = loop {
            let view = next_view(&mut rx).await;
            if !view.disconnected {
                break view;
            }
        };
        assert_eq!(view.snapshot.as_deref(), Some(&step(1.0)));
        assert_eq!(sync.state().await, SyncState::Connecting);

        tx_b.send(step(2.0)).await.unwrap();
        let view = loop {
            let view = next_view(&mut rx).await;
            if view.snapshot.as_deref() == Some(&step(2.0)) {
                break view;
            }
            // B1 到达前始终是 A1 且不带断连标记
            assert_eq!(view.snapshot.as_deref(), Some(&step(1.0)));
            assert!(!view.disconnected);
        };
        assert!(!view.disconnected);
    }

    #[tokio::test]
    async fn test_superseded_session_does_not_mark_disconnected() {
        let sync = RunSynchronizer::new();
        let (tx_a, stream_a) = SnapshotStream::channel(4);
        sync.observe("run-a/0", stream_a).await;

        let mut rx = sync.subscribe();
        rx.borrow_and_update();
        tx_a.send(step(1.0)).await.unwrap();
        next_view(&mut rx).await;

        // 切换会话后，A 的结束不得把视图标为断连
        let (tx_b, stream_b) = SnapshotStream::channel(4);
        sync.observe("run-b/0", stream_b).await;
        drop(tx_a);

        tx_b.send(step(2.0)).await.unwrap();
        let view = loop {
            let view = next_view(&mut rx).await;
            if view.snapshot.as_deref() == Some(&step(2.0)) {
                break view;
            }
        };
        assert!(!view.disconnected);
        assert_eq!(sync.state().await, SyncState::Live);
    }

    #[tokio::test]
    async fn test_transport_error_moves_to_disconnected_without_panic() {
        use futures::stream;

        let sync = RunSynchronizer::new();
        let items: Vec<crate::error::Result<bytes::Bytes>> = vec![
            Ok(bytes::Bytes::from_static(b"{\"step\":1}\n")),
            Err(crate::error::RunwatchSDKError::Transport(
                "connection reset".to_string(),
            )),
        ];
        let snapshot_stream =
            SnapshotStream::from_bytes(stream::iter(items), crate::formats::CURRENT_VERSION);

        let mut rx = sync.subscribe();
        rx.borrow_and_update();
        sync.observe("run-a/0", snapshot_stream).await;

        // watch 只保证"最新值可见"，中间视图可能被合并，循环直到断连标记置位
        let view = loop {
            let view = next_view(&mut rx).await;
            if view.disconnected {
                break view;
            }
            // 断连前的每个视图都不允许是空白
            assert!(view.snapshot.is_some() || !view.disconnected);
        };
        assert!(view.snapshot.is_some());
        assert_eq!(sync.state().await, SyncState::Disconnected);
    }

    #[tokio::test]
    async fn test_shutdown_terminates_and_stops_updates() {
        let sync = RunSynchronizer::new();
        let (tx, stream) = SnapshotStream::channel(4);
        sync.observe("run-a/0", stream).await;

        let mut rx = sync.subscribe();
        rx.borrow_and_update();
        tx.send(step(1.0)).await.unwrap();
        next_view(&mut rx).await;

        sync.shutdown().await;
        assert_eq!(sync.state().await, SyncState::Terminated);

        // 终止后投递的快照不再更新视图
        let _ = tx.send(step(2.0)).await;
        assert!(timeout(Duration::from_millis(100), rx.changed()).await.is_err());
        let view = sync.current();
        assert_eq!(view.snapshot.as_deref(), Some(&step(1.0)));
    }

    #[tokio::test]
    async fn test_transition_events_broadcast() {
        let sync = RunSynchronizer::new();
        let mut events = sync.events();

        let (tx, stream) = SnapshotStream::channel(4);
        sync.observe("run-a/0", stream).await;
        tx.send(step(1.0)).await.unwrap();
        drop(tx);

        let first = timeout(TICK, events.recv()).await.unwrap().unwrap();
        assert!(matches!(first, SyncEvent::Connecting { .. }));
        let second = timeout(TICK, events.recv()).await.unwrap().unwrap();
        assert!(matches!(second, SyncEvent::SnapshotReceived { .. }));
        let third = timeout(TICK, events.recv()).await.unwrap().unwrap();
        assert!(matches!(third, SyncEvent::Disconnected { .. }));
    }
}

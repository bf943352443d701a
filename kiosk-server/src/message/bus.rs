//! 订单事件总线
//!
//! 进程内的订阅者注册表。`publish` 只序列化一次，然后把同一帧写入
//! 每个订阅者的队列；写失败的订阅者会被移除，不影响其他订阅者。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::body::Bytes;
use dashmap::DashMap;
use shared::order::OrderEvent;
use tokio_util::sync::CancellationToken;

use super::{ChannelError, ChannelId, EventChannel};

/// Outcome of one [`EventBus::publish`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers registered when the publish started
    pub attempted: usize,
    /// Frames queued successfully
    pub delivered: usize,
    /// Subscribers removed because the write failed
    pub dropped: usize,
}

/// 事件总线 - 订阅者注册与广播
///
/// 由 [`ServerState`](crate::core::ServerState) 持有，不是全局变量。
pub struct EventBus {
    /// 已注册的订阅者 (ChannelId -> channel)
    channels: DashMap<ChannelId, Arc<dyn EventChannel>>,
    next_id: AtomicU64,
    /// 关闭信号令牌, 心跳任务以它为父令牌
    shutdown_token: CancellationToken,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            next_id: AtomicU64::new(1),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// 注册订阅者，返回其 ID
    pub fn register(&self, channel: Arc<dyn EventChannel>) -> ChannelId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.channels.insert(id, channel);
        tracing::debug!(
            channel_id = id,
            subscribers = self.channels.len(),
            "Subscriber registered"
        );
        id
    }

    /// 移除订阅者
    ///
    /// 幂等: 重复调用或未知 ID 返回 false。
    pub fn unregister(&self, id: ChannelId) -> bool {
        let removed = self.channels.remove(&id).is_some();
        if removed {
            tracing::debug!(
                channel_id = id,
                subscribers = self.channels.len(),
                "Subscriber unregistered"
            );
        }
        removed
    }

    /// 广播事件到所有订阅者
    ///
    /// 从不等待慢订阅者，也不重试。
    pub fn publish(&self, event: &OrderEvent) -> PublishReport {
        let frame = match event.to_frame() {
            Ok(frame) => Bytes::from(frame),
            Err(e) => {
                tracing::error!(kind = event.kind(), error = %e, "Failed to serialize event");
                return PublishReport::default();
            }
        };

        // 先复制快照，写入时不持有分片锁
        let targets: Vec<(ChannelId, Arc<dyn EventChannel>)> = self
            .channels
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut report = PublishReport {
            attempted: targets.len(),
            ..Default::default()
        };

        for (id, channel) in targets {
            match channel.try_send(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::info!(channel_id = id, reason = %e, "Dropping subscriber");
                    if self.unregister(id) {
                        report.dropped += 1;
                    }
                }
            }
        }

        tracing::debug!(
            kind = event.kind(),
            order_id = ?event.order_id(),
            attempted = report.attempted,
            delivered = report.delivered,
            dropped = report.dropped,
            "Event published"
        );
        report
    }

    /// 发送事件到单个订阅者 (connected / heartbeat)
    ///
    /// 写失败时移除该订阅者。
    pub fn send_to(&self, id: ChannelId, event: &OrderEvent) -> Result<(), ChannelError> {
        let channel = self
            .channels
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(ChannelError::Closed)?;

        let frame = event.to_frame().map_err(|e| {
            tracing::error!(kind = event.kind(), error = %e, "Failed to serialize event");
            ChannelError::Closed
        })?;

        channel.try_send(Bytes::from(frame)).inspect_err(|e| {
            tracing::info!(channel_id = id, reason = %e, "Dropping subscriber");
            self.unregister(id);
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.channels.len()
    }

    pub fn is_registered(&self, id: ChannelId) -> bool {
        self.channels.contains_key(&id)
    }

    /// 获取关闭令牌
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown_token
    }

    /// 优雅关闭: 停止所有心跳并断开所有订阅者
    pub fn shutdown(&self) {
        tracing::info!(subscribers = self.channels.len(), "Shutting down event bus");
        self.shutdown_token.cancel();
        self.channels.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.channels.len())
            .finish()
    }
}

//! # 消息分发循环
//!
//! 连接消息代理，订阅单个固定队列，然后不断地：
//!
//! 1. 阻塞等待该订阅的下一条投递；
//! 2. 从信封中提取文本负载；
//! 3. 同步调用 `handler(context, message)`；
//! 4. 回到第 1 步。
//!
//! 一次只处理一条消息，处理顺序与代理投递顺序一致，处理函数之间不会交错。
//!
//! ## 状态
//!
//! ```text
//! Disconnected ──connect + subscribe──▶ Consuming
//!       ▲                                   │
//!       └──────────────close()──────────────┘
//! ```
//!
//! 连接在第一次运行时才建立。每个循环实例最多持有一个订阅标签，
//! 再次调用 `run*` 会复用已有的连接和订阅。订阅失败时连接随即关闭，
//! 处于 `Disconnected` 的循环不持有任何连接。
//!
//! ## 失败
//!
//! 连接、订阅、接收或处理函数的任何错误都会立即从 `run*` 返回，
//! 循环不重连、不重试。一条处理失败的消息会终止该队列后续的全部消费，
//! 由外部进程管理器决定是否重启。

use std::future::Future;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{
    models::SubscriptionTag,
    traits::{Broker, BrokerConnection, MessageHandler},
    ConsumerError, ConsumerResult,
};

/// 未指定队列时消费的队列
pub const DEFAULT_QUEUE: &str = "f_consume";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Disconnected,
    Consuming,
}

pub struct DispatchLoop<B: Broker> {
    broker: B,
    queue: String,
    connection: Option<B::Connection>,
    subscription: Option<SubscriptionTag>,
    state: LoopState,
}

impl<B: Broker> DispatchLoop<B> {
    pub fn new(broker: B) -> Self {
        Self::with_queue(broker, DEFAULT_QUEUE)
    }

    pub fn with_queue(broker: B, queue: impl Into<String>) -> Self {
        Self {
            broker,
            queue: queue.into(),
            connection: None,
            subscription: None,
            state: LoopState::Disconnected,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn subscription_tag(&self) -> Option<&SubscriptionTag> {
        self.subscription.as_ref()
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    /// 永久消费队列。正常情况下不会返回，只有失败时才返回错误。
    pub async fn run<C, H>(&mut self, context: &mut C, handler: H) -> ConsumerResult<()>
    where
        C: Send,
        H: MessageHandler<C>,
    {
        self.consume(context, handler, std::future::pending::<()>())
            .await
    }

    /// 消费队列直到收到关闭信号（或信号发送端被丢弃）。
    ///
    /// 关闭信号在每次接收前检查；正在执行的处理函数总会执行完。
    /// 返回 `Ok(())` 后连接和订阅保持不变，可以再次调用继续消费。
    pub async fn run_until_shutdown<C, H>(
        &mut self,
        context: &mut C,
        handler: H,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> ConsumerResult<()>
    where
        C: Send,
        H: MessageHandler<C>,
    {
        let shutdown = async move {
            let _ = shutdown_rx.recv().await;
        };
        self.consume(context, handler, shutdown).await
    }

    /// 关闭连接并回到 `Disconnected` 状态
    pub async fn close(&mut self) -> ConsumerResult<()> {
        self.subscription = None;
        self.state = LoopState::Disconnected;

        if let Some(mut connection) = self.connection.take() {
            connection.close().await?;
            info!("队列 {} 的消费连接已关闭", self.queue);
        }
        Ok(())
    }

    async fn ensure_consuming(&mut self) -> ConsumerResult<SubscriptionTag> {
        if self.connection.is_none() {
            info!("正在连接消息代理...");
            let connection = self.broker.connect().await.inspect_err(|e| {
                error!("连接消息代理失败: {}", e);
            })?;
            self.connection = Some(connection);
        }

        if let Some(tag) = &self.subscription {
            return Ok(tag.clone());
        }

        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| ConsumerError::Internal("消息代理连接未建立".to_string()))?;
        let tag = match connection.subscribe(&self.queue).await {
            Ok(tag) => tag,
            Err(e) => {
                error!("订阅队列 {} 失败: {}", self.queue, e);
                // Disconnected 状态下不保留连接
                if let Some(mut connection) = self.connection.take() {
                    if let Err(close_err) = connection.close().await {
                        warn!("订阅失败后关闭连接出错: {}", close_err);
                    }
                }
                return Err(e);
            }
        };

        info!("已订阅队列 {}，消费者标签: {}", self.queue, tag);
        self.subscription = Some(tag.clone());
        self.state = LoopState::Consuming;
        Ok(tag)
    }

    async fn consume<C, H, S>(
        &mut self,
        context: &mut C,
        mut handler: H,
        shutdown: S,
    ) -> ConsumerResult<()>
    where
        C: Send,
        H: MessageHandler<C>,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let tag = tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("启动消费前收到停止信号");
                return Ok(());
            }
            tag = self.ensure_consuming() => tag?,
        };

        info!("##### 开始消费队列 {} 的消息 #####", self.queue);

        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| ConsumerError::Internal("消息代理连接未建立".to_string()))?;

        loop {
            let envelope = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("队列 {} 的消费收到停止信号", self.queue);
                    return Ok(());
                }
                received = connection.receive(&tag) => received.inspect_err(|e| {
                    error!("从队列 {} 接收消息失败: {}", self.queue, e);
                })?,
            };

            debug!(
                "消费者 {} 收到投递 {} (routing_key={}, redelivered={})",
                envelope.consumer_tag,
                envelope.delivery_tag,
                envelope.routing_key,
                envelope.redelivered
            );

            let message = envelope.message();
            handler.handle(context, message).await.inspect_err(|e| {
                error!(
                    "处理队列 {} 的投递 {} 失败，停止消费: {}",
                    self.queue, envelope.delivery_tag, e
                );
            })?;
        }
    }
}

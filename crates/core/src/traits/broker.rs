use async_trait::async_trait;

use crate::{
    models::{Envelope, SubscriptionTag},
    ConsumerResult,
};

/// 消息代理抽象接口
#[async_trait]
pub trait Broker: Send + Sync {
    type Connection: BrokerConnection;

    /// 建立与代理的会话
    async fn connect(&self) -> ConsumerResult<Self::Connection>;
}

/// 已建立的代理会话
#[async_trait]
pub trait BrokerConnection: Send {
    /// 在指定队列上注册消费者，返回订阅标签
    async fn subscribe(&mut self, queue: &str) -> ConsumerResult<SubscriptionTag>;

    /// 阻塞直到该订阅收到下一条投递
    async fn receive(&mut self, tag: &SubscriptionTag) -> ConsumerResult<Envelope>;

    /// 关闭会话
    async fn close(&mut self) -> ConsumerResult<()>;
}

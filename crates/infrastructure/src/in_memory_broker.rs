use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use consumer_core::{
    Broker, BrokerConnection, ConsumerError, ConsumerResult, Envelope, SubscriptionTag, YamlCodec,
};

type QueueReceiver = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>>;

#[derive(Debug)]
struct QueueChannels {
    sender: Option<mpsc::UnboundedSender<Vec<u8>>>,
    receiver: QueueReceiver,
}

impl QueueChannels {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender: Some(sender),
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
        }
    }
}

/// 内存消息代理
///
/// 使用 Tokio channels 模拟队列，克隆共享同一组队列。
/// 用于本地运行和测试，不经过网络。
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    queues: Arc<Mutex<HashMap<String, QueueChannels>>>,
    consumer_seq: Arc<AtomicU64>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_queue<T>(
        &self,
        queue: &str,
        f: impl FnOnce(&mut QueueChannels) -> T,
    ) -> ConsumerResult<T> {
        let mut queues = self
            .queues
            .lock()
            .map_err(|_| ConsumerError::Internal("内存队列锁已损坏".to_string()))?;
        let channels = queues
            .entry(queue.to_string())
            .or_insert_with(QueueChannels::new);
        Ok(f(channels))
    }

    /// 向队列投递原始字节
    pub fn publish(&self, queue: &str, body: impl Into<Vec<u8>>) -> ConsumerResult<()> {
        let body = body.into();
        self.with_queue(queue, |channels| match &channels.sender {
            Some(sender) => sender
                .send(body)
                .map_err(|_| ConsumerError::Publish(format!("队列 {queue} 已关闭"))),
            None => Err(ConsumerError::Publish(format!("队列 {queue} 已关闭"))),
        })??;

        debug!("消息已投递到内存队列 {}", queue);
        Ok(())
    }

    /// 以 YAML 编码后投递
    pub fn publish_message<T: Serialize + ?Sized>(
        &self,
        queue: &str,
        message: &T,
    ) -> ConsumerResult<()> {
        let body = YamlCodec::encode(message)?;
        self.publish(queue, body)
    }

    /// 关闭队列。已排队的消息仍可接收，取完后接收返回 `ConnectionClosed`。
    pub fn close_queue(&self, queue: &str) -> ConsumerResult<()> {
        self.with_queue(queue, |channels| {
            channels.sender = None;
        })?;
        debug!("内存队列 {} 已关闭", queue);
        Ok(())
    }

    pub fn queue_names(&self) -> ConsumerResult<Vec<String>> {
        let queues = self
            .queues
            .lock()
            .map_err(|_| ConsumerError::Internal("内存队列锁已损坏".to_string()))?;
        let mut names: Vec<String> = queues.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    type Connection = InMemoryConnection;

    async fn connect(&self) -> ConsumerResult<InMemoryConnection> {
        debug!("建立内存消息代理连接");
        Ok(InMemoryConnection {
            broker: self.clone(),
            subscriptions: HashMap::new(),
            delivery_seq: 0,
            closed: false,
        })
    }
}

pub struct InMemoryConnection {
    broker: InMemoryBroker,
    subscriptions: HashMap<SubscriptionTag, (String, QueueReceiver)>,
    delivery_seq: u64,
    closed: bool,
}

#[async_trait]
impl BrokerConnection for InMemoryConnection {
    async fn subscribe(&mut self, queue: &str) -> ConsumerResult<SubscriptionTag> {
        if self.closed {
            return Err(ConsumerError::ConnectionClosed);
        }

        let receiver = self
            .broker
            .with_queue(queue, |channels| channels.receiver.clone())?;
        let seq = self.broker.consumer_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let tag = SubscriptionTag::new(format!("amq.ctag-{seq}"));

        self.subscriptions
            .insert(tag.clone(), (queue.to_string(), receiver));
        Ok(tag)
    }

    async fn receive(&mut self, tag: &SubscriptionTag) -> ConsumerResult<Envelope> {
        if self.closed {
            return Err(ConsumerError::ConnectionClosed);
        }

        let (queue, receiver) = self
            .subscriptions
            .get(tag)
            .cloned()
            .ok_or_else(|| ConsumerError::SubscriptionNotFound {
                tag: tag.to_string(),
            })?;

        let body = receiver
            .lock()
            .await
            .recv()
            .await
            .ok_or(ConsumerError::ConnectionClosed)?;

        self.delivery_seq += 1;
        Ok(Envelope::new(tag.clone(), self.delivery_seq, body).with_route("", queue))
    }

    async fn close(&mut self) -> ConsumerResult<()> {
        self.subscriptions.clear();
        self.closed = true;
        Ok(())
    }
}

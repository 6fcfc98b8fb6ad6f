use async_trait::async_trait;
use tracing::{debug, info};

use consumer_config::{BrokerConfig, BrokerKind, ConsumerConfig};
use consumer_core::{Broker, BrokerConnection, ConsumerResult, Envelope, SubscriptionTag};

use crate::{InMemoryBroker, InMemoryConnection, RabbitMQBroker, RabbitMQConnection};

/// 按配置选择的消息代理
#[derive(Debug, Clone)]
pub enum AnyBroker {
    Rabbitmq(RabbitMQBroker),
    InMemory(InMemoryBroker),
}

pub enum AnyConnection {
    Rabbitmq(RabbitMQConnection),
    InMemory(InMemoryConnection),
}

#[async_trait]
impl Broker for AnyBroker {
    type Connection = AnyConnection;

    async fn connect(&self) -> ConsumerResult<AnyConnection> {
        match self {
            AnyBroker::Rabbitmq(broker) => broker.connect().await.map(AnyConnection::Rabbitmq),
            AnyBroker::InMemory(broker) => broker.connect().await.map(AnyConnection::InMemory),
        }
    }
}

#[async_trait]
impl BrokerConnection for AnyConnection {
    async fn subscribe(&mut self, queue: &str) -> ConsumerResult<SubscriptionTag> {
        match self {
            AnyConnection::Rabbitmq(conn) => conn.subscribe(queue).await,
            AnyConnection::InMemory(conn) => conn.subscribe(queue).await,
        }
    }

    async fn receive(&mut self, tag: &SubscriptionTag) -> ConsumerResult<Envelope> {
        match self {
            AnyConnection::Rabbitmq(conn) => conn.receive(tag).await,
            AnyConnection::InMemory(conn) => conn.receive(tag).await,
        }
    }

    async fn close(&mut self) -> ConsumerResult<()> {
        match self {
            AnyConnection::Rabbitmq(conn) => conn.close().await,
            AnyConnection::InMemory(conn) => conn.close().await,
        }
    }
}

pub struct BrokerFactory;

impl BrokerFactory {
    /// 创建消息代理。RabbitMQ 的凭据文件在此时解析，连接推迟到第一次消费。
    pub fn create(broker: &BrokerConfig, consumer: &ConsumerConfig) -> ConsumerResult<AnyBroker> {
        debug!("Creating broker with type: {:?}", broker.kind);

        match broker.kind {
            BrokerKind::Rabbitmq => {
                info!("Initializing RabbitMQ broker");
                let resolved = broker.resolve_credentials()?;
                Ok(AnyBroker::Rabbitmq(RabbitMQBroker::new(
                    resolved,
                    consumer.consumer_tag_prefix.clone(),
                )))
            }
            BrokerKind::InMemory => {
                info!("Initializing in-memory broker");
                Ok(AnyBroker::InMemory(InMemoryBroker::new()))
            }
        }
    }
}

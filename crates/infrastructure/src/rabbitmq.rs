use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::{
    options::*, types::FieldTable, BasicProperties, Channel, Connection, ConnectionProperties,
    Consumer, ExchangeKind,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use consumer_config::BrokerConfig;
use consumer_core::{
    Broker, BrokerConnection, ConsumerError, ConsumerResult, Envelope, SubscriptionTag, YamlCodec,
};

/// 持久化投递模式
const PERSISTENT_DELIVERY_MODE: u8 = 2;

/// 生成 `{prefix}-{hostname}-{uuid前8位}` 形式的消费者标签
pub fn generate_consumer_tag(prefix: &str) -> SubscriptionTag {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    let id = uuid::Uuid::new_v4().simple().to_string();
    SubscriptionTag::new(format!("{prefix}-{host}-{}", &id[..8]))
}

async fn open_channel(config: &BrokerConfig) -> ConsumerResult<(Connection, Channel)> {
    let url = config.build_url();
    let timeout = Duration::from_secs(config.connection_timeout_seconds);

    let connection = tokio::time::timeout(
        timeout,
        Connection::connect(&url, ConnectionProperties::default()),
    )
    .await
    .map_err(|_| {
        ConsumerError::Timeout(format!(
            "连接RabbitMQ超时({}秒): {}",
            config.connection_timeout_seconds,
            config.redacted_url()
        ))
    })?
    .map_err(|e| ConsumerError::connection_error(format!("连接RabbitMQ失败: {e}")))?;

    let channel = connection
        .create_channel()
        .await
        .map_err(|e| ConsumerError::connection_error(format!("创建通道失败: {e}")))?;

    info!("成功连接到RabbitMQ: {}", config.redacted_url());
    Ok((connection, channel))
}

/// RabbitMQ 消息代理
#[derive(Debug, Clone)]
pub struct RabbitMQBroker {
    config: BrokerConfig,
    consumer_tag_prefix: String,
}

impl RabbitMQBroker {
    /// `config` 中的凭据应已解析
    pub fn new(config: BrokerConfig, consumer_tag_prefix: impl Into<String>) -> Self {
        Self {
            config,
            consumer_tag_prefix: consumer_tag_prefix.into(),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }
}

#[async_trait]
impl Broker for RabbitMQBroker {
    type Connection = RabbitMQConnection;

    async fn connect(&self) -> ConsumerResult<RabbitMQConnection> {
        let (connection, channel) = open_channel(&self.config).await?;
        Ok(RabbitMQConnection {
            connection,
            channel,
            exchange: self.config.exchange.clone(),
            consumer_tag_prefix: self.consumer_tag_prefix.clone(),
            consumers: HashMap::new(),
        })
    }
}

pub struct RabbitMQConnection {
    connection: Connection,
    channel: Channel,
    exchange: String,
    consumer_tag_prefix: String,
    consumers: HashMap<SubscriptionTag, Consumer>,
}

impl RabbitMQConnection {
    pub fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }

    /// 声明持久化 direct 交换机和持久化队列，并以队列名为路由键绑定
    async fn declare_topology(&self, queue: &str) -> ConsumerResult<()> {
        if !self.exchange.is_empty() {
            self.channel
                .exchange_declare(
                    &self.exchange,
                    ExchangeKind::Direct,
                    ExchangeDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(|e| {
                    ConsumerError::subscription_error(
                        queue,
                        format!("声明交换机 {} 失败: {e}", self.exchange),
                    )
                })?;
            debug!("交换机 {} 声明成功", self.exchange);
        }

        self.channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| ConsumerError::subscription_error(queue, format!("声明队列失败: {e}")))?;
        debug!("队列 {} 声明成功", queue);

        if !self.exchange.is_empty() {
            self.channel
                .queue_bind(
                    queue,
                    &self.exchange,
                    queue,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|e| {
                    ConsumerError::subscription_error(queue, format!("绑定队列失败: {e}"))
                })?;
            debug!("队列 {} 已绑定到 {}，路由键 {}", queue, self.exchange, queue);
        }

        Ok(())
    }
}

#[async_trait]
impl BrokerConnection for RabbitMQConnection {
    async fn subscribe(&mut self, queue: &str) -> ConsumerResult<SubscriptionTag> {
        self.declare_topology(queue).await?;

        let tag = generate_consumer_tag(&self.consumer_tag_prefix);
        let consumer = self
            .channel
            .basic_consume(
                queue,
                tag.as_str(),
                BasicConsumeOptions {
                    no_ack: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| ConsumerError::subscription_error(queue, format!("创建消费者失败: {e}")))?;

        debug!("为队列 {} 创建消费者: {}", queue, tag);
        self.consumers.insert(tag.clone(), consumer);
        Ok(tag)
    }

    async fn receive(&mut self, tag: &SubscriptionTag) -> ConsumerResult<Envelope> {
        let consumer = self
            .consumers
            .get_mut(tag)
            .ok_or_else(|| ConsumerError::SubscriptionNotFound {
                tag: tag.to_string(),
            })?;

        match consumer.next().await {
            Some(Ok(delivery)) => Ok(Envelope::new(tag.clone(), delivery.delivery_tag, delivery.data)
                .with_route(delivery.exchange.as_str(), delivery.routing_key.as_str())
                .with_redelivered(delivery.redelivered)),
            Some(Err(e)) => Err(ConsumerError::receive_error(format!("接收投递失败: {e}"))),
            None => {
                warn!("消费者 {} 的投递流已结束", tag);
                Err(ConsumerError::ConnectionClosed)
            }
        }
    }

    async fn close(&mut self) -> ConsumerResult<()> {
        self.consumers.clear();
        if !self.is_connected() {
            debug!("RabbitMQ连接已断开，跳过关闭");
            return Ok(());
        }
        self.connection
            .close(200, "正常关闭")
            .await
            .map_err(|e| ConsumerError::connection_error(format!("关闭连接失败: {e}")))?;

        info!("RabbitMQ连接已关闭");
        Ok(())
    }
}

/// 向交换机发布 YAML 消息
pub struct RabbitMQPublisher {
    connection: Connection,
    channel: Channel,
    exchange: String,
}

impl RabbitMQPublisher {
    pub async fn connect(config: &BrokerConfig) -> ConsumerResult<Self> {
        let (connection, channel) = open_channel(config).await?;
        Ok(Self {
            connection,
            channel,
            exchange: config.exchange.clone(),
        })
    }

    pub async fn publish_raw(&self, routing_key: &str, body: &[u8]) -> ConsumerResult<()> {
        let confirm = self
            .channel
            .basic_publish(
                &self.exchange,
                routing_key,
                BasicPublishOptions::default(),
                body,
                BasicProperties::default().with_delivery_mode(PERSISTENT_DELIVERY_MODE),
            )
            .await
            .map_err(|e| ConsumerError::Publish(format!("发布消息到 {routing_key} 失败: {e}")))?;

        confirm
            .await
            .map_err(|e| ConsumerError::Publish(format!("消息发布确认失败: {e}")))?;

        debug!("消息已发布，交换机: {:?}，路由键: {}", self.exchange, routing_key);
        Ok(())
    }

    pub async fn publish<T: Serialize + ?Sized>(
        &self,
        routing_key: &str,
        message: &T,
    ) -> ConsumerResult<()> {
        let body = YamlCodec::encode(message)?;
        self.publish_raw(routing_key, body.as_bytes()).await
    }

    pub async fn close(&self) -> ConsumerResult<()> {
        self.connection
            .close(200, "正常关闭")
            .await
            .map_err(|e| ConsumerError::connection_error(format!("关闭连接失败: {e}")))
    }
}

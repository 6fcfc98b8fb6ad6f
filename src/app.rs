use std::collections::BTreeMap;

use anyhow::{Context, Result};
use consumer_config::{AppConfig, BrokerKind};
use consumer_core::{
    time_utils::{self, Timestamp},
    ConsumerError, ConsumerResult, DispatchLoop, Message, MessageRouter, YamlCodec,
    DEFAULT_QUEUE,
};
use consumer_infrastructure::{AnyBroker, BrokerFactory, RabbitMQPublisher};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// 消费过程中的统计，作为处理函数的上下文
#[derive(Debug, Default, Clone)]
pub struct ConsumerStats {
    received: u64,
    unrouted: u64,
    by_type: BTreeMap<String, u64>,
    first_received_at: Option<Timestamp>,
    last_received_at: Option<Timestamp>,
}

impl ConsumerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次接收，返回距上一条消息的秒数
    pub fn record(&mut self, at: Timestamp) -> Option<i64> {
        let gap = self
            .last_received_at
            .as_ref()
            .map(|last| time_utils::seconds_between(last, &at));

        self.received += 1;
        self.first_received_at.get_or_insert(at);
        self.last_received_at = Some(at);
        gap
    }

    fn record_routed(&mut self, msg_type: &str) {
        *self.by_type.entry(msg_type.to_string()).or_insert(0) += 1;
    }

    fn record_unrouted(&mut self) {
        self.unrouted += 1;
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn unrouted(&self) -> u64 {
        self.unrouted
    }

    pub fn count_of(&self, msg_type: &str) -> u64 {
        self.by_type.get(msg_type).copied().unwrap_or(0)
    }

    pub fn first_received_at(&self) -> Option<&Timestamp> {
        self.first_received_at.as_ref()
    }

    pub fn last_received_at(&self) -> Option<&Timestamp> {
        self.last_received_at.as_ref()
    }

    pub fn summary(&self) -> String {
        match (&self.first_received_at, &self.last_received_at) {
            (Some(first), Some(last)) => format!(
                "共接收 {} 条消息（未分派 {} 条），首条 {}，末条 {}",
                self.received,
                self.unrouted,
                time_utils::format_timestamp(first),
                time_utils::format_timestamp(last)
            ),
            _ => "未接收到消息".to_string(),
        }
    }
}

/// 为配置的每个消息类型注册统计处理函数，其余消息计入未分派
pub fn build_router(msg_types: &[String]) -> MessageRouter<ConsumerStats> {
    let mut router = MessageRouter::new().fallback(
        |stats: &mut ConsumerStats, message: Message| -> ConsumerResult<()> {
            stats.record(time_utils::current_timestamp());
            stats.record_unrouted();
            debug!("未分派的消息内容: {}", message);
            Ok(())
        },
    );

    for msg_type in msg_types {
        let name = msg_type.clone();
        router.register(
            msg_type.clone(),
            move |stats: &mut ConsumerStats, message: Message| -> ConsumerResult<()> {
                let gap = stats.record(time_utils::current_timestamp());
                stats.record_routed(&name);
                info!("收到第 {} 条消息，类型: {}", stats.received(), name);
                if let Some(gap) = gap {
                    debug!("距上一条消息 {} 秒", gap);
                }
                debug!("消息内容: {}", message);
                Ok(())
            },
        );
    }
    router
}

/// 触发消费者关闭，可在信号处理任务中持有
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        // 没有正在运行的消费时无接收者
        let _ = self.tx.send(());
        info!("关闭信号已发送");
    }
}

/// 消费者应用
pub struct Application {
    dispatch: DispatchLoop<AnyBroker>,
    msg_types: Vec<String>,
    stats: ConsumerStats,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl Application {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let broker =
            BrokerFactory::create(&config.broker, &config.consumer).context("创建消息代理失败")?;
        let queue = config
            .consumer
            .queue
            .clone()
            .unwrap_or_else(|| DEFAULT_QUEUE.to_string());

        info!("初始化消费者，队列: {}，代理: {:?}", queue, config.broker.kind);
        if config.consumer.msg_types.is_empty() {
            warn!("未配置消息类型，所有消息都将记为未知MSG_TYPE");
        }

        let (shutdown_tx, shutdown_rx) = broadcast::channel(16);
        Ok(Self {
            dispatch: DispatchLoop::with_queue(broker, queue),
            msg_types: config.consumer.msg_types.clone(),
            stats: ConsumerStats::new(),
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn queue(&self) -> &str {
        self.dispatch.queue()
    }

    pub fn broker(&self) -> &AnyBroker {
        self.dispatch.broker()
    }

    pub fn stats(&self) -> &ConsumerStats {
        &self.stats
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// 消费直到收到关闭信号或发生错误。运行前发出的关闭信号同样生效。
    pub async fn run(&mut self) -> ConsumerResult<()> {
        let shutdown_rx = std::mem::replace(&mut self.shutdown_rx, self.shutdown_tx.subscribe());
        let router = build_router(&self.msg_types);
        self.dispatch
            .run_until_shutdown(&mut self.stats, router, shutdown_rx)
            .await
    }

    pub async fn close(&mut self) -> ConsumerResult<()> {
        self.dispatch.close().await?;
        info!("{}", self.stats.summary());
        Ok(())
    }
}

/// 发布一条 YAML 消息到配置的交换机
pub async fn send_message(config: &AppConfig, routing_key: &str, body: &str) -> Result<()> {
    if config.broker.kind != BrokerKind::Rabbitmq {
        return Err(ConsumerError::config_error("send 仅支持 rabbitmq 类型的消息代理").into());
    }

    // 先确认消息体是合法 YAML
    let _: serde_yaml::Value = YamlCodec::decode(body)?;

    let broker_config = config.broker.resolve_credentials()?;
    let publisher = RabbitMQPublisher::connect(&broker_config).await?;
    publisher.publish_raw(routing_key, body.as_bytes()).await?;
    publisher.close().await?;

    info!("消息已发送，路由键: {}", routing_key);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use consumer_config::BrokerConfig;
    use consumer_core::MessageHandler;
    use consumer_infrastructure::InMemoryBroker;
    use std::time::Duration;

    fn in_memory_config(queue: Option<&str>) -> AppConfig {
        let mut config = AppConfig {
            broker: BrokerConfig {
                kind: BrokerKind::InMemory,
                ..Default::default()
            },
            ..Default::default()
        };
        config.consumer.queue = queue.map(str::to_string);
        config.consumer.msg_types = vec!["AT_START_INTEGRATION".to_string(), "A".to_string()];
        config
    }

    fn memory(app: &Application) -> &InMemoryBroker {
        match app.broker() {
            AnyBroker::InMemory(broker) => broker,
            AnyBroker::Rabbitmq(_) => panic!("expected in-memory broker"),
        }
    }

    #[test]
    fn test_stats_record() {
        let mut stats = ConsumerStats::new();
        assert_eq!(stats.summary(), "未接收到消息");

        let t1 = time_utils::parse_timestamp("2024-01-01 10:00:00").unwrap();
        let t2 = time_utils::parse_timestamp("2024-01-01 10:01:30").unwrap();
        assert_eq!(stats.record(t1), None);
        assert_eq!(stats.record(t2), Some(90));

        assert_eq!(stats.received(), 2);
        assert_eq!(stats.first_received_at(), Some(&t1));
        assert_eq!(stats.last_received_at(), Some(&t2));
        assert!(stats.summary().contains("2024-01-01 10:01:30"));
    }

    #[tokio::test]
    async fn test_router_separates_known_and_unknown_types() {
        let mut router = build_router(&["AT_START_INTEGRATION".to_string()]);
        let mut stats = ConsumerStats::new();

        router
            .handle(&mut stats, Message::new("MSG_TYPE: AT_START_INTEGRATION\n"))
            .await
            .unwrap();
        router
            .handle(&mut stats, Message::new("MSG_TYPE: NO_SUCH_ACTION\n"))
            .await
            .unwrap();
        router
            .handle(&mut stats, Message::new("IMAGE_ID: AT_O_1\n"))
            .await
            .unwrap();

        assert_eq!(stats.received(), 3);
        assert_eq!(stats.count_of("AT_START_INTEGRATION"), 1);
        assert_eq!(stats.count_of("NO_SUCH_ACTION"), 0);
        assert_eq!(stats.unrouted(), 2);
    }

    #[tokio::test]
    async fn test_router_rejects_invalid_yaml() {
        let mut router = build_router(&[]);
        let mut stats = ConsumerStats::new();

        let err = router
            .handle(&mut stats, Message::new("key: [unterminated"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsumerError::Serialization(_)));
        assert_eq!(stats.received(), 0);
    }

    #[test]
    fn test_application_uses_default_queue() {
        let app = Application::new(&in_memory_config(None)).unwrap();
        assert_eq!(app.queue(), DEFAULT_QUEUE);

        let app = Application::new(&in_memory_config(Some("other"))).unwrap();
        assert_eq!(app.queue(), "other");
    }

    #[tokio::test]
    async fn test_application_consumes_until_shutdown() {
        let mut app = Application::new(&in_memory_config(None)).unwrap();
        let broker = memory(&app).clone();
        broker.publish(DEFAULT_QUEUE, "MSG_TYPE: A\n").unwrap();
        broker.publish(DEFAULT_QUEUE, "MSG_TYPE: B\n").unwrap();

        let handle = app.shutdown_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.trigger();
        });

        tokio::time::timeout(Duration::from_secs(1), app.run())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(app.stats().received(), 2);
        assert_eq!(app.stats().count_of("A"), 1);
        assert_eq!(app.stats().unrouted(), 1);

        app.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_before_run_stops_immediately() {
        let mut app = Application::new(&in_memory_config(None)).unwrap();
        memory(&app).publish(DEFAULT_QUEUE, "MSG_TYPE: A\n").unwrap();

        let handle = app.shutdown_handle();
        handle.trigger();
        // 重复触发无副作用
        handle.clone().trigger();

        tokio::time::timeout(Duration::from_secs(1), app.run())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(app.stats().received(), 0);
    }

    #[tokio::test]
    async fn test_application_stops_on_bad_message() {
        let mut app = Application::new(&in_memory_config(None)).unwrap();
        let broker = memory(&app).clone();
        broker.publish(DEFAULT_QUEUE, "MSG_TYPE: A\n").unwrap();
        broker.publish(DEFAULT_QUEUE, "MSG_TYPE: [oops").unwrap();
        broker.publish(DEFAULT_QUEUE, "MSG_TYPE: C\n").unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), app.run())
            .await
            .unwrap();

        assert!(matches!(result, Err(ConsumerError::Serialization(_))));
        assert_eq!(app.stats().received(), 1);
    }

    #[tokio::test]
    async fn test_send_rejects_in_memory_broker() {
        let err = send_message(&in_memory_config(None), "f_consume", "MSG_TYPE: A\n")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("rabbitmq"));
    }
}

//! 消息代理实现：RabbitMQ 与内存代理

pub mod broker_factory;
pub mod in_memory_broker;
pub mod rabbitmq;

pub use broker_factory::{AnyBroker, AnyConnection, BrokerFactory};
pub use in_memory_broker::{InMemoryBroker, InMemoryConnection};
pub use rabbitmq::{generate_consumer_tag, RabbitMQBroker, RabbitMQConnection, RabbitMQPublisher};

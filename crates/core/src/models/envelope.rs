use std::fmt;

use tracing::warn;

use super::Message;

/// 消息代理返回的订阅标签
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionTag(String);

impl SubscriptionTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SubscriptionTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for SubscriptionTag {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

impl From<&str> for SubscriptionTag {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}

/// 一次消息投递
#[derive(Debug, Clone)]
pub struct Envelope {
    pub delivery_tag: u64,
    pub consumer_tag: SubscriptionTag,
    pub exchange: String,
    pub routing_key: String,
    pub redelivered: bool,
    pub body: Vec<u8>,
}

impl Envelope {
    pub fn new(consumer_tag: SubscriptionTag, delivery_tag: u64, body: impl Into<Vec<u8>>) -> Self {
        Self {
            delivery_tag,
            consumer_tag,
            exchange: String::new(),
            routing_key: String::new(),
            redelivered: false,
            body: body.into(),
        }
    }

    pub fn with_route(mut self, exchange: impl Into<String>, routing_key: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self.routing_key = routing_key.into();
        self
    }

    pub fn with_redelivered(mut self, redelivered: bool) -> Self {
        self.redelivered = redelivered;
        self
    }

    /// 提取文本负载。非 UTF-8 字节以替换字符代替，不会失败。
    pub fn message(&self) -> Message {
        match std::str::from_utf8(&self.body) {
            Ok(text) => Message::new(text),
            Err(e) => {
                warn!(
                    "投递 {} 的消息体不是合法的UTF-8 ({}), 已按替换字符处理",
                    self.delivery_tag, e
                );
                Message::new(String::from_utf8_lossy(&self.body).into_owned())
            }
        }
    }
}

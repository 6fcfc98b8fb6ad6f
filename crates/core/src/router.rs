//! 按 `MSG_TYPE` 分派消息
//!
//! 每种消息类型注册一个处理函数。消息体先按 YAML 解码，解码失败视为处理失败；
//! 未注册的类型或缺少 `MSG_TYPE` 的消息记录错误日志后继续消费，
//! 若设置了兜底处理函数则交给它处理。

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::{models::Message, traits::MessageHandler, ConsumerResult, MSG_TYPE_KEY};

type BoxedHandler<C> = Box<dyn MessageHandler<C>>;

pub struct MessageRouter<C: Send> {
    routes: HashMap<String, BoxedHandler<C>>,
    fallback: Option<BoxedHandler<C>>,
}

impl<C: Send> MessageRouter<C> {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            fallback: None,
        }
    }

    /// 注册消息类型；同一类型重复注册时后者覆盖前者
    pub fn route<H>(mut self, msg_type: impl Into<String>, handler: H) -> Self
    where
        H: MessageHandler<C> + 'static,
    {
        self.register(msg_type, handler);
        self
    }

    pub fn register<H>(&mut self, msg_type: impl Into<String>, handler: H)
    where
        H: MessageHandler<C> + 'static,
    {
        self.routes.insert(msg_type.into(), Box::new(handler));
    }

    /// 处理未注册类型与缺少 `MSG_TYPE` 的消息
    pub fn fallback<H>(mut self, handler: H) -> Self
    where
        H: MessageHandler<C> + 'static,
    {
        self.fallback = Some(Box::new(handler));
        self
    }

    pub fn handles(&self, msg_type: &str) -> bool {
        self.routes.contains_key(msg_type)
    }

    pub fn msg_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    async fn unrouted(&mut self, context: &mut C, message: Message) -> ConsumerResult<()> {
        match self.fallback.as_mut() {
            Some(fallback) => fallback.handle(context, message).await,
            None => Ok(()),
        }
    }
}

impl<C: Send> Default for MessageRouter<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<C: Send> MessageHandler<C> for MessageRouter<C> {
    async fn handle(&mut self, context: &mut C, message: Message) -> ConsumerResult<()> {
        let body: serde_yaml::Value = message.decode()?;
        let msg_type = body
            .get(MSG_TYPE_KEY)
            .and_then(serde_yaml::Value::as_str)
            .map(str::to_string);

        let Some(msg_type) = msg_type else {
            error!("消息缺少{}字段，已忽略", MSG_TYPE_KEY);
            return self.unrouted(context, message).await;
        };

        match self.routes.get_mut(&msg_type) {
            Some(handler) => {
                debug!("分派 {} 消息", msg_type);
                handler.handle(context, message).await
            }
            None => {
                error!("未知的MSG_TYPE: {}", msg_type);
                self.unrouted(context, message).await
            }
        }
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("连接消息代理失败: {0}")]
    Connection(String),
    #[error("订阅队列失败: {queue} - {message}")]
    Subscription { queue: String, message: String },
    #[error("接收消息失败: {0}")]
    Receive(String),
    #[error("消息代理连接已关闭")]
    ConnectionClosed,
    #[error("未找到订阅: {tag}")]
    SubscriptionNotFound { tag: String },
    #[error("消息处理失败: {0}")]
    Handler(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("凭据错误: {0}")]
    Credentials(String),
    #[error("发布消息失败: {0}")]
    Publish(String),
    #[error("操作超时: {0}")]
    Timeout(String),
    #[error("时间解析错误: {0}")]
    TimeParse(String),
    #[error("内部错误: {0}")]
    Internal(String),
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConsumerResult<T> = Result<T, ConsumerError>;

impl ConsumerError {
    pub fn connection_error<S: Into<String>>(msg: S) -> Self {
        Self::Connection(msg.into())
    }
    pub fn subscription_error<Q: Into<String>, S: Into<String>>(queue: Q, msg: S) -> Self {
        Self::Subscription {
            queue: queue.into(),
            message: msg.into(),
        }
    }
    pub fn receive_error<S: Into<String>>(msg: S) -> Self {
        Self::Receive(msg.into())
    }
    pub fn handler_error<S: Into<String>>(msg: S) -> Self {
        Self::Handler(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn credentials_error<S: Into<String>>(msg: S) -> Self {
        Self::Credentials(msg.into())
    }
    /// 代理侧的失败：连接、订阅、接收或连接中断
    pub fn is_broker_failure(&self) -> bool {
        matches!(
            self,
            ConsumerError::Connection(_)
                | ConsumerError::Subscription { .. }
                | ConsumerError::Receive(_)
                | ConsumerError::ConnectionClosed
                | ConsumerError::SubscriptionNotFound { .. }
                | ConsumerError::Timeout(_)
        )
    }
    /// 启动阶段即无法继续的错误，需要外部修正配置或环境
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ConsumerError::Internal(_)
                | ConsumerError::Configuration(_)
                | ConsumerError::Credentials(_)
        )
    }
    pub fn user_message(&self) -> &str {
        match self {
            ConsumerError::Connection(_) => "无法连接到消息代理，请检查地址与凭据",
            ConsumerError::Subscription { .. } => "无法订阅消息队列",
            ConsumerError::Receive(_) | ConsumerError::ConnectionClosed => {
                "与消息代理的连接已中断"
            }
            ConsumerError::Handler(_) => "消息处理失败，消费已停止",
            ConsumerError::Configuration(_) => "配置有误",
            ConsumerError::Credentials(_) => "凭据文件不可用或权限不安全",
            _ => "系统内部错误",
        }
    }
}

impl From<serde_json::Error> for ConsumerError {
    fn from(err: serde_json::Error) -> Self {
        ConsumerError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConsumerError {
    fn from(err: serde_yaml::Error) -> Self {
        ConsumerError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for ConsumerError {
    fn from(err: anyhow::Error) -> Self {
        ConsumerError::Internal(err.to_string())
    }
}

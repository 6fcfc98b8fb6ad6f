use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};
use crate::ConfigResult;

/// Dispatch loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// 消费的队列；未设置时使用分发循环内置的默认队列
    pub queue: Option<String>,
    /// 消费者标签前缀，实际标签为 `{prefix}-{hostname}-{uuid}`
    pub consumer_tag_prefix: String,
    /// 按 `MSG_TYPE` 分派的消息类型，其余类型记为未知
    pub msg_types: Vec<String>,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            queue: None,
            consumer_tag_prefix: "consumer".to_string(),
            msg_types: Vec::new(),
        }
    }
}

impl ConfigValidator for ConsumerConfig {
    fn validate(&self) -> ConfigResult<()> {
        if let Some(queue) = &self.queue {
            ValidationUtils::validate_not_empty(queue, "队列名称")?;
            ValidationUtils::validate_short_string(queue, "队列名称")?;
        }
        ValidationUtils::validate_not_empty(&self.consumer_tag_prefix, "消费者标签前缀")?;
        for msg_type in &self.msg_types {
            ValidationUtils::validate_not_empty(msg_type, "消息类型")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_consumer_config() {
        let config = ConsumerConfig::default();
        assert!(config.queue.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_queue_rejected() {
        let config = ConsumerConfig {
            queue: Some(String::new()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_long_queue_rejected() {
        let config = ConsumerConfig {
            queue: Some("q".repeat(256)),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blank_msg_type_rejected() {
        let config = ConsumerConfig {
            msg_types: vec!["NEW_JOB".to_string(), " ".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}

use std::fmt;

use serde::de::DeserializeOwned;

use crate::codec::YamlCodec;
use crate::ConsumerResult;

/// 消息中标识消息类型的键
pub const MSG_TYPE_KEY: &str = "MSG_TYPE";

/// 从信封中提取的不可变文本负载
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    body: String,
}

impl Message {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.body
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn into_string(self) -> String {
        self.body
    }

    /// 按 YAML 解码消息体
    pub fn decode<T: DeserializeOwned>(&self) -> ConsumerResult<T> {
        YamlCodec::decode(&self.body)
    }

    /// 读取顶层 `MSG_TYPE` 字段；消息体不是 YAML 映射或没有该字段时返回 `None`
    pub fn msg_type(&self) -> Option<String> {
        let value: serde_yaml::Value = self.decode().ok()?;
        value
            .get(MSG_TYPE_KEY)
            .and_then(serde_yaml::Value::as_str)
            .map(str::to_string)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.body)
    }
}

impl AsRef<str> for Message {
    fn as_ref(&self) -> &str {
        &self.body
    }
}

impl From<String> for Message {
    fn from(body: String) -> Self {
        Self { body }
    }
}

impl From<&str> for Message {
    fn from(body: &str) -> Self {
        Self::new(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct StartIntegration {
        #[serde(rename = "MSG_TYPE")]
        msg_type: String,
        #[serde(rename = "IMAGE_ID")]
        image_id: String,
        #[serde(rename = "CCD_LIST")]
        ccd_list: Vec<String>,
    }

    #[test]
    fn test_message_accessors() {
        let message = Message::new("hello");
        assert_eq!(message.as_str(), "hello");
        assert_eq!(message.len(), 5);
        assert!(!message.is_empty());
        assert_eq!(message.to_string(), "hello");
        assert_eq!(message.clone().into_string(), "hello");
        assert!(Message::from("").is_empty());
    }

    #[test]
    fn test_decode_typed_message() {
        let message = Message::new(
            "MSG_TYPE: AT_START_INTEGRATION\nIMAGE_ID: AT_O_20190312_000007\nCCD_LIST: ['00', '01']\n",
        );
        let decoded: StartIntegration = message.decode().unwrap();
        assert_eq!(decoded.msg_type, "AT_START_INTEGRATION");
        assert_eq!(decoded.image_id, "AT_O_20190312_000007");
        assert_eq!(decoded.ccd_list, vec!["00", "01"]);
    }

    #[test]
    fn test_decode_failure_is_serialization_error() {
        let message = Message::new("MSG_TYPE: [unterminated");
        let result: ConsumerResult<StartIntegration> = message.decode();
        assert!(matches!(
            result,
            Err(consumer_errors::ConsumerError::Serialization(_))
        ));
    }

    #[test]
    fn test_msg_type() {
        assert_eq!(
            Message::new("MSG_TYPE: HEALTH_CHECK\nACK_ID: 12\n").msg_type().as_deref(),
            Some("HEALTH_CHECK")
        );
        assert_eq!(Message::new("ACK_ID: 12\n").msg_type(), None);
        assert_eq!(Message::new("plain text").msg_type(), None);
        assert_eq!(Message::new("MSG_TYPE: [").msg_type(), None);
    }
}

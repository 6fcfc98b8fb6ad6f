use serde::{de::DeserializeOwned, Serialize};

use crate::{ConsumerError, ConsumerResult};

/// 消息体的 YAML 编解码
pub struct YamlCodec;

impl YamlCodec {
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> ConsumerResult<String> {
        serde_yaml::to_string(value)
            .map_err(|e| ConsumerError::Serialization(format!("编码YAML消息失败: {e}")))
    }

    pub fn decode<T: DeserializeOwned>(body: &str) -> ConsumerResult<T> {
        serde_yaml::from_str(body)
            .map_err(|e| ConsumerError::Serialization(format!("解码YAML消息失败: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_encode_mapping() {
        let mut msg = BTreeMap::new();
        msg.insert("ACK_ID", "ack_100");
        msg.insert("MSG_TYPE", "HEALTH_CHECK");

        let body = YamlCodec::encode(&msg).unwrap();
        assert_eq!(body, "ACK_ID: ack_100\nMSG_TYPE: HEALTH_CHECK\n");

        let decoded: BTreeMap<String, String> = YamlCodec::decode(&body).unwrap();
        assert_eq!(decoded.get("MSG_TYPE").map(String::as_str), Some("HEALTH_CHECK"));
    }

    #[test]
    fn test_decode_empty_body_as_null() {
        let value: serde_yaml::Value = YamlCodec::decode("").unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn test_decode_error() {
        let result: ConsumerResult<BTreeMap<String, String>> = YamlCodec::decode("- a\n- b\n");
        assert!(matches!(result, Err(ConsumerError::Serialization(_))));
    }
}

use crate::{ConfigError, ConfigResult};

/// 配置校验接口
pub trait ConfigValidator {
    fn validate(&self) -> ConfigResult<()>;
}

/// AMQP 短字符串（队列名、交换机名）的最大字节数
pub const MAX_SHORT_STRING_LEN: usize = 255;

pub struct ValidationUtils;

impl ValidationUtils {
    pub fn validate_not_empty(value: &str, field_name: &str) -> ConfigResult<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{field_name}不能为空")));
        }
        Ok(())
    }

    pub fn validate_port(port: u16) -> ConfigResult<()> {
        if port == 0 {
            return Err(ConfigError::Validation("端口必须大于0".to_string()));
        }
        Ok(())
    }

    pub fn validate_timeout_seconds(timeout_seconds: u64, field_name: &str) -> ConfigResult<()> {
        if timeout_seconds == 0 {
            return Err(ConfigError::Validation(format!("{field_name}必须大于0")));
        }
        if timeout_seconds > 3600 {
            return Err(ConfigError::Validation(format!(
                "{field_name}不能超过3600秒"
            )));
        }
        Ok(())
    }

    /// 队列名与交换机名都是 AMQP shortstr
    pub fn validate_short_string(value: &str, field_name: &str) -> ConfigResult<()> {
        if value.len() > MAX_SHORT_STRING_LEN {
            return Err(ConfigError::Validation(format!(
                "{field_name}长度不能超过{MAX_SHORT_STRING_LEN}字节"
            )));
        }
        Ok(())
    }

    pub fn validate_amqp_url(value: &str, field_name: &str) -> ConfigResult<()> {
        Self::validate_not_empty(value, field_name)?;

        let parsed = url::Url::parse(value)
            .map_err(|e| ConfigError::Validation(format!("{field_name}格式无效: {e}")))?;

        match parsed.scheme() {
            "amqp" | "amqps" => Ok(()),
            other => Err(ConfigError::Validation(format!(
                "{field_name}必须是AMQP格式，实际协议: {other}"
            ))),
        }
    }
}

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credentials::Credentials;
use crate::validation::{ConfigValidator, ValidationUtils};
use crate::{ConfigError, ConfigResult};

/// Message broker type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BrokerKind {
    #[default]
    Rabbitmq,
    InMemory,
}

/// Message broker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    #[serde(rename = "type")]
    pub kind: BrokerKind,
    /// 完整的 AMQP URL，设置后忽略 host/port/vhost/username/password
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub vhost: String,
    pub username: String,
    pub password: Option<String>,
    /// 凭据文件名，相对于凭据目录解析
    pub credentials_file: Option<String>,
    pub user_alias: Option<String>,
    pub passwd_alias: Option<String>,
    /// 队列绑定的 direct 交换机，为空时使用默认交换机且不做绑定
    pub exchange: String,
    pub connection_timeout_seconds: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            kind: BrokerKind::default(),
            url: None,
            host: "localhost".to_string(),
            port: 5672,
            vhost: "/".to_string(),
            username: "guest".to_string(),
            password: Some("guest".to_string()),
            credentials_file: None,
            user_alias: None,
            passwd_alias: None,
            exchange: "message".to_string(),
            connection_timeout_seconds: 30,
        }
    }
}

impl BrokerConfig {
    pub fn is_rabbitmq(&self) -> bool {
        self.kind == BrokerKind::Rabbitmq
    }

    fn explicit_url(&self) -> Option<&str> {
        self.url.as_deref().filter(|url| !url.trim().is_empty())
    }

    /// Build AMQP connection URL
    pub fn build_url(&self) -> String {
        if let Some(url) = self.explicit_url() {
            return url.to_string();
        }
        self.compose_url(self.password.as_deref().map(encode_component))
    }

    /// 用于日志输出的 URL，密码被替换为 `***`
    pub fn redacted_url(&self) -> String {
        if let Some(url) = self.explicit_url() {
            return match url::Url::parse(url) {
                Ok(mut parsed) if parsed.password().is_some() => {
                    let _ = parsed.set_password(Some("***"));
                    parsed.to_string()
                }
                _ => url.to_string(),
            };
        }
        self.compose_url(self.password.as_ref().map(|_| "***".to_string()))
    }

    fn compose_url(&self, password: Option<String>) -> String {
        let auth = match (self.username.is_empty(), password) {
            (true, _) => String::new(),
            (false, Some(password)) => format!("{}:{password}@", encode_component(&self.username)),
            (false, None) => format!("{}@", encode_component(&self.username)),
        };
        format!(
            "amqp://{}{}:{}/{}",
            auth,
            self.host,
            self.port,
            encode_component(&self.vhost)
        )
    }

    /// 若配置了凭据文件，返回填入用户名与密码后的副本
    pub fn resolve_credentials(&self) -> ConfigResult<BrokerConfig> {
        let Some(file) = self.credentials_file.as_deref() else {
            return Ok(self.clone());
        };

        let user_alias = self.user_alias.as_deref().ok_or_else(|| {
            ConfigError::Validation("使用凭据文件时必须设置user_alias".to_string())
        })?;

        let credentials = Credentials::load(file)?;
        let mut resolved = self.clone();
        resolved.username = credentials.user(user_alias)?.to_string();
        resolved.password = match self.passwd_alias.as_deref() {
            Some(alias) => Some(credentials.password(alias)?.to_string()),
            None => None,
        };

        debug!("已从凭据文件 {} 解析用户 {}", file, user_alias);
        Ok(resolved)
    }
}

fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

impl ConfigValidator for BrokerConfig {
    fn validate(&self) -> ConfigResult<()> {
        ValidationUtils::validate_short_string(&self.exchange, "交换机名称")?;

        if !self.is_rabbitmq() {
            return Ok(());
        }

        match self.explicit_url() {
            Some(url) => ValidationUtils::validate_amqp_url(url, "RabbitMQ URL")?,
            None => {
                ValidationUtils::validate_not_empty(&self.host, "RabbitMQ主机地址")?;
                ValidationUtils::validate_port(self.port)?;
            }
        }

        ValidationUtils::validate_timeout_seconds(self.connection_timeout_seconds, "连接超时时间")?;

        if self.credentials_file.is_some() && self.user_alias.is_none() {
            return Err(ConfigError::Validation(
                "使用凭据文件时必须设置user_alias".to_string(),
            ));
        }

        Ok(())
    }
}

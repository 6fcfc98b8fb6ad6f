//! RabbitMQ 凭据文件
//!
//! 凭据保存在一个只有当前用户可访问的目录中的 YAML 文件里：
//!
//! ```yaml
//! rabbitmq_users:
//!   service_user: BASE
//!   service_passwd: secret
//! ```
//!
//! 目录与文件对同组或其他用户可读写时拒绝加载。

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::{ConfigError, ConfigResult};

/// 覆盖凭据目录的环境变量
pub const CREDENTIAL_DIR_ENV: &str = "CONSUMER_CREDENTIAL_DIR";

/// 默认凭据目录（相对于 `$HOME`）
const DEFAULT_CREDENTIAL_DIR: &str = ".consumer";

/// 同组或其他用户的读写位
#[cfg(unix)]
const INSECURE_MODE_BITS: u32 = 0o066;

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    rabbitmq_users: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    rabbitmq_users: HashMap<String, String>,
}

impl Credentials {
    /// 从默认凭据目录加载
    pub fn load(file_name: &str) -> ConfigResult<Self> {
        let path = Path::new(file_name);
        if path.is_absolute() {
            let dir = path.parent().ok_or_else(|| {
                ConfigError::Security(format!("无法确定凭据文件所在目录: {file_name}"))
            })?;
            let name = path.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
                ConfigError::Security(format!("凭据文件名无效: {file_name}"))
            })?;
            return Self::load_from_dir(dir, name);
        }

        Self::load_from_dir(&credential_dir()?, file_name)
    }

    pub fn load_from_dir(dir: &Path, file_name: &str) -> ConfigResult<Self> {
        if !dir.is_dir() {
            return Err(ConfigError::Security(format!(
                "无法读取凭据文件 '{}'",
                dir.join(file_name).display()
            )));
        }
        ensure_private(dir, "700")?;

        let path = dir.join(file_name);
        if !path.is_file() {
            return Err(ConfigError::File(format!(
                "找不到凭据文件 '{}'",
                path.display()
            )));
        }
        ensure_private(&path, "600")?;

        let content = fs::read_to_string(&path)
            .map_err(|e| ConfigError::File(format!("无法打开 {}: {e}", path.display())))?;
        let parsed: CredentialsFile = serde_yaml::from_str(&content)?;

        debug!("已加载凭据文件 {}", path.display());
        Ok(Self {
            rabbitmq_users: parsed.rabbitmq_users,
        })
    }

    pub fn user(&self, user_alias: &str) -> ConfigResult<&str> {
        self.lookup(user_alias)
    }

    pub fn password(&self, passwd_alias: &str) -> ConfigResult<&str> {
        self.lookup(passwd_alias)
    }

    fn lookup(&self, alias: &str) -> ConfigResult<&str> {
        self.rabbitmq_users
            .get(alias)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::Security(format!("凭据文件中不存在别名: {alias}")))
    }
}

fn credential_dir() -> ConfigResult<PathBuf> {
    if let Ok(dir) = std::env::var(CREDENTIAL_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").map_err(|_| {
        ConfigError::Security(format!("未设置HOME，且未设置{CREDENTIAL_DIR_ENV}"))
    })?;
    Ok(Path::new(&home).join(DEFAULT_CREDENTIAL_DIR))
}

#[cfg(unix)]
fn ensure_private(path: &Path, expected_mode: &str) -> ConfigResult<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = fs::metadata(path)
        .map_err(|e| ConfigError::File(format!("无法读取 {} 的权限: {e}", path.display())))?
        .permissions()
        .mode();

    if mode & INSECURE_MODE_BITS != 0 {
        let msg = format!(
            "'{}' 权限不安全，请执行 'chmod {expected_mode} {}'",
            path.display(),
            path.display()
        );
        warn!("{}", msg);
        return Err(ConfigError::Security(msg));
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_private(_path: &Path, _expected_mode: &str) -> ConfigResult<()> {
    Ok(())
}

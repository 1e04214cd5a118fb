//! # 配置管理器
//!
//! 加载 TOML 配置文件，应用环境变量覆盖并校验

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{AppConfig, RedisConfig};
use crate::error::{AuthError, Result};
use crate::{
    ldebug, linfo,
    logging::{LogComponent, LogStage},
};

/// 指定配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "SESSION_AUTHORITY_CONFIG";

/// 支持的环境变量覆盖
const ENV_OVERRIDES: [&str; 5] = [
    "DATABASE_URL",
    "REDIS_URL",
    "AUTH_JWT_SECRET",
    "OIDC_CLIENT_ID",
    "SERVER_PORT",
];

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    /// 配置文件路径
    path: PathBuf,
    /// 当前配置
    config: Arc<AppConfig>,
}

impl ConfigManager {
    /// 解析配置文件路径：命令行参数 > 环境变量 > `config/config.{RUST_ENV}.toml`
    #[must_use]
    pub fn resolve_path(cli_path: Option<&Path>) -> PathBuf {
        if let Some(path) = cli_path {
            return path.to_path_buf();
        }
        if let Ok(path) = env::var(CONFIG_PATH_ENV) {
            return PathBuf::from(path);
        }
        let env = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        PathBuf::from(format!("config/config.{env}.toml"))
    }

    /// 从指定文件创建配置管理器，使用进程环境变量作为覆盖来源
    pub fn from_file(config_path: impl AsRef<Path>) -> Result<Self> {
        Self::from_file_with_env(config_path, |key| env::var(key).ok())
    }

    /// 从指定文件创建配置管理器，覆盖来源由调用方提供
    pub fn from_file_with_env<F>(config_path: impl AsRef<Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = config_path.as_ref();
        if !path.exists() {
            return Err(AuthError::config(format!(
                "配置文件不存在: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AuthError::config_with_source(format!("读取配置文件失败: {}", path.display()), e)
        })?;

        let config = Self::from_toml_str(&content, lookup)?;

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Config,
            "config_loaded",
            &format!("配置加载完成: {}", path.display()),
            cache_type = ?config.cache.cache_type,
            oidc_enabled = config.oidc.enabled,
            session_policy = ?config.auth.session_policy
        );

        Ok(Self {
            path: path.to_path_buf(),
            config: Arc::new(config),
        })
    }

    /// 解析 TOML 文本、应用覆盖并校验
    pub fn from_toml_str<F>(content: &str, lookup: F) -> Result<AppConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: AppConfig = toml::from_str(content)?;
        Self::apply_env_overrides(&mut config, lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// 获取当前配置
    #[must_use]
    pub fn config(&self) -> Arc<AppConfig> {
        Arc::clone(&self.config)
    }

    /// 配置文件路径
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 应用环境变量覆盖
    fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        for key in ENV_OVERRIDES {
            let Some(value) = lookup(key) else {
                continue;
            };

            ldebug!(
                "system",
                LogStage::Startup,
                LogComponent::Config,
                "env_override",
                &format!(
                    "应用环境变量覆盖: {} = {}",
                    key,
                    if key.contains("SECRET") { "***" } else { value.as_str() }
                )
            );

            match key {
                "DATABASE_URL" => config.database.url = value,
                "REDIS_URL" => {
                    config
                        .cache
                        .redis
                        .get_or_insert_with(RedisConfig::default)
                        .url = value;
                }
                "AUTH_JWT_SECRET" => config.auth.jwt_secret = value,
                "OIDC_CLIENT_ID" => config.oidc.client_id = value,
                "SERVER_PORT" => {
                    config.server.port = value.parse().map_err(|e| {
                        AuthError::config_with_source(format!("无效的端口号: {value}"), e)
                    })?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

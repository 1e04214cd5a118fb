//! # 数据库配置

use crate::error::{AuthError, Result};
use crate::{
    linfo,
    logging::{LogComponent, LogStage},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 数据库URL
    pub url: String,
    /// 最大连接数
    pub max_connections: u32,
    /// 连接超时时间（秒）
    pub connect_timeout: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/session-authority.db".to_string(),
            max_connections: 10,
            connect_timeout: 30,
        }
    }
}

impl DatabaseConfig {
    /// 确保数据库路径存在（仅对SQLite文件数据库）
    pub fn ensure_database_path(&self) -> Result<()> {
        if self.is_sqlite() && !self.is_memory_database() {
            let path_str = self.sqlite_file_path();
            let db_path = Path::new(path_str);

            let missing_parent = db_path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty() && !parent.exists());
            if let Some(parent) = missing_parent {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AuthError::config_with_source(
                        format!("无法创建数据库目录: {}", parent.display()),
                        e,
                    )
                })?;

                linfo!(
                    "system",
                    LogStage::Startup,
                    LogComponent::Database,
                    "create_db_dir",
                    &format!("创建数据库目录: {}", parent.display())
                );
            }

            if !db_path.exists() {
                linfo!(
                    "system",
                    LogStage::Startup,
                    LogComponent::Database,
                    "create_db_file_info",
                    &format!("数据库文件将在首次连接时创建: {}", db_path.display())
                );
            }
        }

        Ok(())
    }

    /// 获取准备好的数据库连接字符串
    ///
    /// SQLite 文件库追加 `mode=rwc`，首次连接时自动建库。
    pub fn get_connection_url(&self) -> Result<String> {
        self.ensure_database_path()?;
        if self.is_sqlite() && !self.is_memory_database() && !self.url.contains('?') {
            return Ok(format!("{}?mode=rwc", self.url));
        }
        Ok(self.url.clone())
    }

    /// 检查是否为内存数据库
    #[must_use]
    pub fn is_memory_database(&self) -> bool {
        self.url.contains(":memory:")
    }

    /// 检查是否为SQLite数据库
    #[must_use]
    pub fn is_sqlite(&self) -> bool {
        self.url.starts_with("sqlite:")
    }

    fn sqlite_file_path(&self) -> &str {
        let without_scheme = self
            .url
            .strip_prefix("sqlite://")
            .or_else(|| self.url.strip_prefix("sqlite:"))
            .unwrap_or(&self.url);
        without_scheme
            .split_once('?')
            .map_or(without_scheme, |(path, _)| path)
    }
}

//! # 密码哈希
//!
//! bcrypt 是 CPU 密集型操作，全部放到阻塞线程池执行。

use std::sync::Arc;

use crate::error::{AuthError, Result};
use crate::{
    lwarn,
    logging::{LogComponent, LogStage},
};

/// 凭证哈希器
#[derive(Clone)]
pub struct PasswordHasher {
    cost: u32,
    /// 用户不存在时用于比较的哈希，使两条路径耗时一致
    dummy_hash: Arc<str>,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("cost", &self.cost)
            .finish_non_exhaustive()
    }
}

impl PasswordHasher {
    /// 创建哈希器，同时以相同成本预先计算一次占位哈希
    pub fn new(cost: u32) -> Result<Self> {
        let dummy_hash = bcrypt::hash(uuid::Uuid::new_v4().to_string(), cost)?;
        Ok(Self {
            cost,
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    /// 计算密码哈希
    pub async fn hash(&self, plaintext: &str) -> Result<String> {
        let plaintext = plaintext.to_string();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(plaintext, cost))
            .await
            .map_err(|e| AuthError::internal_with_source("密码哈希任务失败", e))?
            .map_err(AuthError::from)
    }

    /// 比较明文与哈希；哈希格式无效时视为不匹配
    pub async fn compare(&self, plaintext: &str, hash: &str) -> Result<bool> {
        let plaintext = plaintext.to_string();
        let hash = hash.to_string();
        let outcome = tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &hash))
            .await
            .map_err(|e| AuthError::internal_with_source("密码校验任务失败", e))?;

        match outcome {
            Ok(matched) => Ok(matched),
            Err(e) => {
                lwarn!(
                    "system",
                    LogStage::Authentication,
                    LogComponent::Auth,
                    "password_hash_invalid",
                    "存储的密码哈希无法解析，按不匹配处理",
                    error = %e
                );
                Ok(false)
            }
        }
    }

    /// 对占位哈希做一次完整比较，结果丢弃
    pub async fn compare_dummy(&self, plaintext: &str) -> Result<()> {
        let dummy = self.dummy_hash.to_string();
        self.compare(plaintext, &dummy).await.map(|_| ())
    }

    /// 不可用的随机密码哈希，供联合身份创建的账户使用
    pub async fn unusable_hash(&self) -> Result<String> {
        self.hash(&uuid::Uuid::new_v4().to_string()).await
    }
}

//! # 测试数据 Fixtures
//!
//! 提供测试用的数据结构和预设数据

use crate::auth::types::{AuthConfig, FederatedProfile, OidcConfig, SessionPolicy};
use crate::store::NewAccount;

/// 测试用签名密钥
pub const TEST_JWT_SECRET: &str = "test-secret-key-for-jwt-testing-0123456789";

/// 测试用密码
pub const TEST_PASSWORD: &str = "password123";

/// 测试用联合身份客户端ID
pub const TEST_CLIENT_ID: &str = "test-client.apps.googleusercontent.com";

/// 用户测试数据构建器
#[derive(Debug, Clone)]
pub struct UserFixture {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub oidc_subject: Option<String>,
}

impl Default for UserFixture {
    fn default() -> Self {
        Self {
            username: "test_user".to_string(),
            email: "test@example.com".to_string(),
            password: TEST_PASSWORD.to_string(),
            first_name: "Test".to_string(),
            oidc_subject: None,
        }
    }
}

impl UserFixture {
    /// 创建新的用户 fixture
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置用户名，邮箱随之变化
    #[must_use]
    pub fn username(mut self, username: &str) -> Self {
        self.username = username.to_string();
        self.email = format!("{username}@example.com");
        self
    }

    /// 设置邮箱
    #[must_use]
    pub fn email(mut self, email: &str) -> Self {
        self.email = email.to_string();
        self
    }

    /// 设置密码
    #[must_use]
    pub fn password(mut self, password: &str) -> Self {
        self.password = password.to_string();
        self
    }

    /// 关联 Google 身份
    #[must_use]
    pub fn google_subject(mut self, subject: &str) -> Self {
        self.oidc_subject = Some(subject.to_string());
        self
    }

    /// 转换为新账户（使用最低 bcrypt 成本）
    #[must_use]
    pub fn to_new_account(&self) -> NewAccount {
        NewAccount {
            first_name: self.first_name.clone(),
            last_name: "User".to_string(),
            email: Some(self.email.clone()),
            username: self.username.clone(),
            password_hash: bcrypt::hash(&self.password, 4).unwrap_or_default(),
            oidc_provider: self.oidc_subject.as_ref().map(|_| "google".to_string()),
            oidc_subject: self.oidc_subject.clone(),
        }
    }
}

/// 测试用认证配置：最低 bcrypt 成本，多设备会话
#[must_use]
pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        bcrypt_cost: 4,
        ..AuthConfig::default()
    }
}

/// 单会话策略的测试配置
#[must_use]
pub fn single_session_auth_config() -> AuthConfig {
    AuthConfig {
        session_policy: SessionPolicy::SingleSession,
        ..test_auth_config()
    }
}

/// 测试用联合身份配置
#[must_use]
pub fn test_oidc_config(endpoint: &str) -> OidcConfig {
    OidcConfig {
        enabled: true,
        client_id: TEST_CLIENT_ID.to_string(),
        tokeninfo_endpoint: endpoint.to_string(),
        timeout: 2,
        ..OidcConfig::default()
    }
}

/// 已验证邮箱的 Google 资料
#[must_use]
pub fn verified_google_profile(subject: &str, email: &str) -> FederatedProfile {
    FederatedProfile {
        subject: subject.to_string(),
        email: Some(email.to_string()),
        email_verified: true,
        audience: TEST_CLIENT_ID.to_string(),
        given_name: Some("Grace".to_string()),
        family_name: Some("Hopper".to_string()),
        name: Some("Grace Hopper".to_string()),
    }
}

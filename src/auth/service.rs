//! # 会话与令牌编排
//!
//! 密码登录、联合登录、刷新轮换、校验与登出，以及建立在会话表之上的
//! 注册、设备列表、全部登出、修改密码和账户停用。
//!
//! 编排器本身不持有可变状态，所有依赖由 [`SessionAuthorityBuilder`] 注入，
//! 克隆后可在任意任务间共享。每一次存储或外部调用都经过 [`CallContext::run`]。

use entity::{user_sessions, users};
use regex::Regex;
use std::sync::Arc;

use crate::auth::context::CallContext;
use crate::auth::jwt::JwtManager;
use crate::auth::oidc::IdentityVerifier;
use crate::auth::password::PasswordHasher;
use crate::auth::types::{
    AuthConfig, ClientInfo, FederatedProfile, JwtClaims, LoginResponse, OidcConfig,
    RefreshResponse, RegisterRequest, SessionPolicy, SessionSummary, TokenKind, UserProfile,
    VerifiedToken,
};
use crate::auth::utils::AuthUtils;
use crate::error::{AuthError, Result, StoreError};
use crate::logging::{LogComponent, LogStage, token_fingerprint};
use crate::store::{AccountStore, NewAccount, NewSession, SessionStore, StoreResult};
use crate::{ensure_request, ldebug, linfo, lwarn};

const TOKEN_TYPE: &str = "Bearer";
const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";
const FEDERATED_FIRST_NAME: &str = "Google";
const DEFAULT_LAST_NAME: &str = "User";

/// 存储未找到时替换为给定的业务错误，其余错误按默认规则转换
fn or_missing<T>(result: StoreResult<T>, missing: impl FnOnce() -> AuthError) -> Result<T> {
    result.map_err(|e| if e.is_not_found() { missing() } else { e.into() })
}

/// 未找到视为 `None`
fn optional<T>(result: StoreResult<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

struct Federation {
    verifier: Arc<dyn IdentityVerifier>,
    config: OidcConfig,
}

/// 会话权威服务
#[derive(Clone)]
pub struct SessionAuthority {
    config: Arc<AuthConfig>,
    accounts: Arc<dyn AccountStore>,
    sessions: Arc<dyn SessionStore>,
    tokens: Arc<JwtManager>,
    hasher: PasswordHasher,
    federation: Option<Arc<Federation>>,
    email_pattern: Regex,
}

impl std::fmt::Debug for SessionAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAuthority")
            .field("session_policy", &self.config.session_policy)
            .field("federation", &self.federation.is_some())
            .finish_non_exhaustive()
    }
}

/// [`SessionAuthority`] 构建器
pub struct SessionAuthorityBuilder {
    config: AuthConfig,
    accounts: Option<Arc<dyn AccountStore>>,
    sessions: Option<Arc<dyn SessionStore>>,
    federation: Option<Federation>,
}

impl SessionAuthorityBuilder {
    #[must_use]
    pub fn accounts(mut self, accounts: Arc<dyn AccountStore>) -> Self {
        self.accounts = Some(accounts);
        self
    }

    #[must_use]
    pub fn sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// 启用联合登录
    #[must_use]
    pub fn identity_verifier(mut self, verifier: Arc<dyn IdentityVerifier>, config: OidcConfig) -> Self {
        self.federation = Some(Federation { verifier, config });
        self
    }

    pub fn build(self) -> Result<SessionAuthority> {
        let accounts = self
            .accounts
            .ok_or_else(|| AuthError::config("未配置账户存储"))?;
        let sessions = self
            .sessions
            .ok_or_else(|| AuthError::config("未配置会话存储"))?;
        if let Some(federation) = &self.federation {
            crate::ensure_config!(
                !federation.config.client_id.is_empty(),
                "联合登录需要配置 client_id"
            );
        }

        let tokens = JwtManager::new(&self.config)?;
        let hasher = PasswordHasher::new(self.config.bcrypt_cost)?;
        let email_pattern = Regex::new(EMAIL_PATTERN)
            .map_err(|e| AuthError::internal_with_source("邮箱校验规则无效", e))?;

        Ok(SessionAuthority {
            config: Arc::new(self.config),
            accounts,
            sessions,
            tokens: Arc::new(tokens),
            hasher,
            federation: self.federation.map(Arc::new),
            email_pattern,
        })
    }
}

impl SessionAuthority {
    #[must_use]
    pub const fn builder(config: AuthConfig) -> SessionAuthorityBuilder {
        SessionAuthorityBuilder {
            config,
            accounts: None,
            sessions: None,
            federation: None,
        }
    }

    /// 令牌编解码器
    #[must_use]
    pub fn tokens(&self) -> &JwtManager {
        &self.tokens
    }

    /// 是否启用了联合登录
    #[must_use]
    pub fn federation_enabled(&self) -> bool {
        self.federation.is_some()
    }

    /// 用户名密码登录
    ///
    /// 用户不存在时仍会做一次占位哈希比较，使两条失败路径的耗时一致。
    pub async fn login_with_password(
        &self,
        ctx: &CallContext,
        username: &str,
        password: &str,
        client: ClientInfo,
    ) -> Result<LoginResponse> {
        let username = username.trim();
        ensure_request!(!username.is_empty(), "username", "用户名不能为空");
        ensure_request!(!password.is_empty(), "password", "密码不能为空");

        let lookup = ctx.run(self.accounts.find_by_username(username)).await?;
        let Some(user) = optional(lookup)? else {
            self.hasher.compare_dummy(password).await?;
            linfo!(
                ctx.request_id(),
                LogStage::Authentication,
                LogComponent::Auth,
                "login_failed",
                "用户不存在",
                username = %username
            );
            return Err(AuthError::user_not_found(username));
        };

        let matched = self.hasher.compare(password, &user.password_hash).await?;
        if !matched || !user.is_active {
            linfo!(
                ctx.request_id(),
                LogStage::Authentication,
                LogComponent::Auth,
                "login_failed",
                "密码错误或账户已停用",
                user_id = user.id,
                active = user.is_active
            );
            return Err(AuthError::invalid_credentials(format!(
                "login rejected for user {}",
                user.id
            )));
        }

        self.open_session(ctx, user, client, LogStage::Authentication)
            .await
    }

    /// 联合身份登录
    pub async fn login_with_federated_identity(
        &self,
        ctx: &CallContext,
        raw_assertion: &str,
        client: ClientInfo,
    ) -> Result<LoginResponse> {
        let federation = self
            .federation
            .as_ref()
            .ok_or_else(|| AuthError::invalid_token("未启用联合登录"))?;
        if raw_assertion.trim().is_empty() {
            return Err(AuthError::invalid_token("身份断言为空"));
        }

        let profile = match ctx
            .run(federation.verifier.verify_assertion(ctx, raw_assertion))
            .await
        {
            Ok(Ok(profile)) => profile,
            Ok(Err(e)) => {
                lwarn!(
                    ctx.request_id(),
                    LogStage::Federation,
                    LogComponent::Oidc,
                    "assertion_rejected",
                    "身份断言校验失败",
                    assertion = %token_fingerprint(raw_assertion),
                    error = %e
                );
                return Err(e.into());
            }
            Err(interrupted) => {
                return Err(AuthError::invalid_token_with_source(
                    "身份断言校验被中断",
                    interrupted,
                ));
            }
        };

        let Some(email) = non_empty(profile.email.as_deref()).map(str::to_string) else {
            return Err(AuthError::invalid_token("断言缺少邮箱"));
        };
        if !profile.email_verified {
            return Err(AuthError::invalid_token("邮箱未验证"));
        }
        if profile.audience != federation.config.client_id {
            return Err(AuthError::invalid_token("断言受众不匹配"));
        }

        let user = self
            .resolve_federated_account(ctx, &federation.config.provider, &profile, &email)
            .await?;
        if !user.is_active {
            return Err(AuthError::invalid_credentials(format!(
                "federated login rejected for inactive user {}",
                user.id
            )));
        }

        self.open_session(ctx, user, client, LogStage::Federation)
            .await
    }

    /// 按外部身份、再按邮箱解析账户，都不存在时创建；
    /// 创建时遇到唯一约束竞争会重新解析一次
    async fn resolve_federated_account(
        &self,
        ctx: &CallContext,
        provider: &str,
        profile: &FederatedProfile,
        email: &str,
    ) -> Result<users::Model> {
        let mut retried = false;
        loop {
            let by_identity = ctx
                .run(self.accounts.find_by_external_identity(provider, &profile.subject))
                .await?;
            if let Some(user) = optional(by_identity)? {
                return Ok(user);
            }

            let by_email = ctx.run(self.accounts.find_by_email(email)).await?;
            if let Some(user) = optional(by_email)? {
                return self.attach_identity(ctx, user, provider, profile).await;
            }

            let account = NewAccount {
                first_name: non_empty(profile.given_name.as_deref())
                    .or_else(|| non_empty(profile.name.as_deref()))
                    .unwrap_or(FEDERATED_FIRST_NAME)
                    .to_string(),
                last_name: non_empty(profile.family_name.as_deref())
                    .unwrap_or(DEFAULT_LAST_NAME)
                    .to_string(),
                email: Some(email.to_string()),
                username: email.to_string(),
                password_hash: self.hasher.unusable_hash().await?,
                oidc_provider: Some(provider.to_string()),
                oidc_subject: Some(profile.subject.clone()),
            };

            match ctx.run(self.accounts.create(account)).await? {
                Ok(user) => {
                    linfo!(
                        ctx.request_id(),
                        LogStage::Federation,
                        LogComponent::Account,
                        "federated_account_created",
                        "已为外部身份创建账户",
                        user_id = user.id,
                        provider = %provider
                    );
                    return Ok(user);
                }
                Err(e) if e.is_conflict() && !retried => {
                    ldebug!(
                        ctx.request_id(),
                        LogStage::Federation,
                        LogComponent::Account,
                        "federated_create_race",
                        "创建账户时发生唯一约束竞争，重新解析",
                        error = %e
                    );
                    retried = true;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn attach_identity(
        &self,
        ctx: &CallContext,
        user: users::Model,
        provider: &str,
        profile: &FederatedProfile,
    ) -> Result<users::Model> {
        if user.has_external_identity() {
            // 同一邮箱已绑定了另一个外部身份
            return Err(AuthError::conflict(format!(
                "user {} is linked to a different external identity",
                user.id
            )));
        }

        let user = ctx
            .run(
                self.accounts
                    .attach_external_identity(user.id, provider, &profile.subject),
            )
            .await??;

        linfo!(
            ctx.request_id(),
            LogStage::Federation,
            LogComponent::Account,
            "identity_attached",
            "已将外部身份绑定到现有账户",
            user_id = user.id,
            provider = %provider
        );
        Ok(user)
    }

    /// 注册新账户并直接登录
    pub async fn register(
        &self,
        ctx: &CallContext,
        request: RegisterRequest,
        client: ClientInfo,
    ) -> Result<LoginResponse> {
        let username = request.username.trim().to_string();
        let first_name = request.first_name.trim().to_string();
        ensure_request!(!username.is_empty(), "username", "用户名不能为空");
        ensure_request!(!first_name.is_empty(), "first_name", "名字不能为空");
        ensure_request!(
            request.password.chars().count() >= self.config.min_password_length,
            "password",
            format!("密码长度不能少于 {} 个字符", self.config.min_password_length)
        );

        // 未提供邮箱时仅在用户名本身是邮箱地址时沿用
        let email = match non_empty(request.email.as_deref()) {
            Some(email) => {
                ensure_request!(self.email_pattern.is_match(email), "email", "邮箱格式无效");
                Some(email.to_string())
            }
            None => self
                .email_pattern
                .is_match(&username)
                .then(|| username.clone()),
        };
        let last_name = non_empty(request.last_name.as_deref())
            .unwrap_or(DEFAULT_LAST_NAME)
            .to_string();

        let existing = ctx.run(self.accounts.find_by_username(&username)).await?;
        if optional(existing)?.is_some() {
            return Err(AuthError::user_already_exists(username));
        }
        if let Some(email) = email.as_deref() {
            let existing = ctx.run(self.accounts.find_by_email(email)).await?;
            if optional(existing)?.is_some() {
                return Err(AuthError::conflict("邮箱已被使用"));
            }
        }

        let account = NewAccount {
            first_name,
            last_name,
            email,
            username: username.clone(),
            password_hash: self.hasher.hash(&request.password).await?,
            oidc_provider: None,
            oidc_subject: None,
        };

        let user = match ctx.run(self.accounts.create(account)).await? {
            Ok(user) => user,
            Err(e) if e.is_conflict() => {
                let winner = ctx.run(self.accounts.find_by_username(&username)).await?;
                return Err(if optional(winner)?.is_some() {
                    AuthError::user_already_exists(username)
                } else {
                    AuthError::conflict_with_source("注册时发生唯一约束冲突", e)
                });
            }
            Err(e) => return Err(e.into()),
        };

        linfo!(
            ctx.request_id(),
            LogStage::Authentication,
            LogComponent::Account,
            "register",
            "新账户已注册",
            user_id = user.id,
            username = %user.username
        );

        self.open_session(ctx, user, client, LogStage::Authentication)
            .await
    }

    /// 为账户建立新会话并签发令牌对
    async fn open_session(
        &self,
        ctx: &CallContext,
        user: users::Model,
        client: ClientInfo,
        stage: LogStage,
    ) -> Result<LoginResponse> {
        if self.config.session_policy == SessionPolicy::SingleSession {
            self.retire_user_sessions(ctx, user.id, None).await?;
        }

        let session_id = AuthUtils::generate_session_id(self.config.session_id_length);
        let refresh_jti = AuthUtils::generate_token_id();
        // 先签发再落库，签名失败不会留下无主会话
        let pair = self
            .tokens
            .generate_token_pair(user.id, &session_id, &refresh_jti)?;

        let session = NewSession {
            id: session_id,
            user_id: user.id,
            refresh_jti,
            user_agent: client.user_agent,
            ip_address: client.ip_address,
        };
        let session = ctx.run(self.sessions.create(session)).await??;

        linfo!(
            ctx.request_id(),
            stage,
            LogComponent::Session,
            "session_opened",
            "登录成功，会话已创建",
            user_id = user.id,
            session_id = %session.id,
            policy = ?self.config.session_policy
        );

        self.record_login(ctx, user.id).await;

        Ok(LoginResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: TOKEN_TYPE.to_string(),
            expires_in: self.tokens.access_ttl_seconds(),
            user: UserProfile::from(&user),
        })
    }

    /// 记录最近登录时间，失败只记日志
    async fn record_login(&self, ctx: &CallContext, user_id: i32) {
        match ctx.run(self.accounts.touch_last_login(user_id)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                lwarn!(
                    ctx.request_id(),
                    LogStage::Authentication,
                    LogComponent::Account,
                    "record_login_failed",
                    "更新最近登录时间失败",
                    user_id = user_id,
                    error = %e
                );
            }
            Err(e) => {
                lwarn!(
                    ctx.request_id(),
                    LogStage::Authentication,
                    LogComponent::Account,
                    "record_login_failed",
                    "更新最近登录时间被中断",
                    user_id = user_id,
                    error = %e
                );
            }
        }
    }

    /// 轮换刷新令牌
    ///
    /// 轮换以存储上的条件更新为准：两个并发请求持同一令牌时只有一个成功。
    pub async fn refresh(&self, ctx: &CallContext, refresh_token: &str) -> Result<RefreshResponse> {
        let claims = self.decode(refresh_token, TokenKind::Refresh)?;
        let user_id = Self::subject(&claims)?;

        let mut session = self.load_session(ctx, &claims.sid).await?;
        if session.is_active && session.refresh_jti != claims.jti {
            // 缓存可能落后于存储，以存储为准再确认一次
            let fresh = ctx.run(self.sessions.find_by_id(&claims.sid)).await?;
            session = or_missing(fresh, || AuthError::invalid_token("会话不存在"))?;
        }

        if session.user_id != user_id || !session.is_active || session.refresh_jti != claims.jti {
            linfo!(
                ctx.request_id(),
                LogStage::TokenRefresh,
                LogComponent::Session,
                "refresh_rejected",
                "刷新令牌已失效",
                session_id = %claims.sid,
                token = %token_fingerprint(refresh_token),
                active = session.is_active
            );
            return Err(AuthError::invalid_token("刷新令牌已失效"));
        }

        let new_jti = AuthUtils::generate_token_id();
        let pair = self
            .tokens
            .generate_token_pair(user_id, &session.id, &new_jti)?;

        // 条件更新一旦开始就不再中断，否则提交后的超时会让客户端丢失会话
        let rotated = ctx
            .run_to_completion(
                self.sessions
                    .rotate_refresh_identifier(&session.id, &claims.jti, &new_jti),
            )
            .await?;
        or_missing(rotated, || {
            AuthError::invalid_token("刷新令牌已被并发请求轮换")
        })?;

        ldebug!(
            ctx.request_id(),
            LogStage::TokenRefresh,
            LogComponent::Session,
            "refresh",
            "刷新令牌已轮换",
            user_id = user_id,
            session_id = %session.id
        );

        Ok(RefreshResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: TOKEN_TYPE.to_string(),
            expires_in: self.tokens.access_ttl_seconds(),
        })
    }

    /// 校验访问令牌，不修改任何状态
    pub async fn verify(&self, ctx: &CallContext, access_token: &str) -> Result<VerifiedToken> {
        let claims = self.decode(access_token, TokenKind::Access)?;
        let subject = Self::subject(&claims)?;

        let session = self.load_session(ctx, &claims.sid).await?;
        if !session.is_active || session.user_id != subject {
            return Err(AuthError::invalid_token("会话已退役"));
        }

        Ok(VerifiedToken {
            subject,
            session_id: claims.sid.clone(),
            token_id: claims.jti.clone(),
            expires_at: claims.expires_at(),
        })
    }

    /// 退役访问令牌所属的会话
    pub async fn logout(&self, ctx: &CallContext, access_token: &str) -> Result<()> {
        let verified = self.verify(ctx, access_token).await?;

        let retired = ctx
            .run_to_completion(self.sessions.deactivate(&verified.session_id))
            .await?;
        or_missing(retired, || AuthError::invalid_token("会话已退役"))?;

        linfo!(
            ctx.request_id(),
            LogStage::Session,
            LogComponent::Session,
            "logout",
            "会话已退役",
            user_id = verified.subject,
            session_id = %verified.session_id
        );
        Ok(())
    }

    /// 调用者账户下的活跃会话
    pub async fn list_sessions(
        &self,
        ctx: &CallContext,
        access_token: &str,
    ) -> Result<Vec<SessionSummary>> {
        let verified = self.verify(ctx, access_token).await?;
        let sessions = ctx
            .run(self.sessions.list_active_by_user(verified.subject))
            .await??;

        Ok(sessions
            .into_iter()
            .map(|session| SessionSummary {
                current: session.id == verified.session_id,
                session_id: session.id,
                user_agent: session.user_agent,
                ip_address: session.ip_address,
                last_used_at: session.last_used_at.map(|t| t.and_utc()),
                created_at: session.created_at.and_utc(),
            })
            .collect())
    }

    /// 退役调用者账户下的全部会话，返回退役数量
    pub async fn logout_all(&self, ctx: &CallContext, access_token: &str) -> Result<u64> {
        let verified = self.verify(ctx, access_token).await?;
        let retired = self
            .retire_user_sessions(ctx, verified.subject, None)
            .await?;

        linfo!(
            ctx.request_id(),
            LogStage::Session,
            LogComponent::Session,
            "logout_all",
            "已退役账户下全部会话",
            user_id = verified.subject,
            retired = retired
        );
        Ok(retired)
    }

    /// 修改密码；成功后除当前会话外的其他会话全部退役
    pub async fn change_password(
        &self,
        ctx: &CallContext,
        access_token: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let verified = self.verify(ctx, access_token).await?;
        ensure_request!(
            new_password.chars().count() >= self.config.min_password_length,
            "new_password",
            format!("密码长度不能少于 {} 个字符", self.config.min_password_length)
        );
        ensure_request!(
            new_password != current_password,
            "new_password",
            "新密码不能与当前密码相同"
        );

        let user = ctx.run(self.accounts.find_by_id(verified.subject)).await?;
        let user = or_missing(user, || AuthError::invalid_token("令牌主体不存在"))?;

        if !self.hasher.compare(current_password, &user.password_hash).await? {
            return Err(AuthError::invalid_credentials(format!(
                "current password mismatch for user {}",
                user.id
            )));
        }

        let password_hash = self.hasher.hash(new_password).await?;
        ctx.run(self.accounts.set_password(user.id, &password_hash))
            .await??;

        let retired = self
            .retire_user_sessions(ctx, user.id, Some(&verified.session_id))
            .await?;

        linfo!(
            ctx.request_id(),
            LogStage::Authentication,
            LogComponent::Account,
            "password_changed",
            "密码已修改，其他会话已退役",
            user_id = user.id,
            retired = retired
        );
        Ok(())
    }

    /// 停用账户并退役其全部会话，返回退役数量
    pub async fn deactivate_account(&self, ctx: &CallContext, user_id: i32) -> Result<u64> {
        let deactivated = ctx.run(self.accounts.deactivate(user_id)).await?;
        or_missing(deactivated, || {
            AuthError::user_not_found(format!("user id={user_id}"))
        })?;

        let retired = self.retire_user_sessions(ctx, user_id, None).await?;
        linfo!(
            ctx.request_id(),
            LogStage::Session,
            LogComponent::Account,
            "deactivate_account",
            "账户已停用",
            user_id = user_id,
            retired = retired
        );
        Ok(retired)
    }

    /// 退役账户下的活跃会话，`keep` 指定的会话除外；并发已退役的会话忽略
    async fn retire_user_sessions(
        &self,
        ctx: &CallContext,
        user_id: i32,
        keep: Option<&str>,
    ) -> Result<u64> {
        let sessions = ctx
            .run(self.sessions.list_active_by_user(user_id))
            .await??;

        let mut retired = 0;
        for session in sessions
            .iter()
            .filter(|s| keep.is_none_or(|keep| s.id != keep))
        {
            match ctx.run(self.sessions.deactivate(&session.id)).await? {
                Ok(_) => retired += 1,
                Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(retired)
    }

    /// 按会话ID读取会话（经过缓存），不存在视为令牌无效
    async fn load_session(&self, ctx: &CallContext, session_id: &str) -> Result<user_sessions::Model> {
        let session = ctx.run(self.sessions.find_by_session_id(session_id)).await?;
        or_missing(session, || AuthError::invalid_token("会话不存在"))
    }

    fn decode(&self, token: &str, expected: TokenKind) -> Result<JwtClaims> {
        let claims = self.tokens.verify(token)?;
        if claims.typ != expected {
            return Err(AuthError::invalid_token(format!(
                "expected {expected:?} token"
            )));
        }
        Ok(claims)
    }

    fn subject(claims: &JwtClaims) -> Result<i32> {
        if claims.sub.is_empty() || claims.sid.is_empty() {
            return Err(AuthError::invalid_token("令牌缺少主体或会话"));
        }
        claims
            .user_id()
            .map_err(|e| AuthError::invalid_token_with_source("令牌主体无效", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, IdentityError};
    use chrono::Utc;
    use crate::testing::fixtures::{
        TEST_PASSWORD, test_auth_config, test_oidc_config, verified_google_profile,
    };
    use crate::testing::mocks::{MockAccountStore, MockIdentityVerifier, MockSessionStore};
    use sea_orm::DbErr;
    use std::time::Duration;

    fn account(id: i32, hash: &str) -> users::Model {
        let now = Utc::now().naive_utc();
        users::Model {
            id,
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            email: Some(format!("user{id}@example.com")),
            username: format!("user{id}"),
            password_hash: hash.to_string(),
            oidc_provider: None,
            oidc_subject: None,
            is_active: true,
            password_changed_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn session(id: &str, user_id: i32, jti: &str) -> user_sessions::Model {
        let now = Utc::now().naive_utc();
        user_sessions::Model {
            id: id.to_string(),
            user_id,
            refresh_jti: jti.to_string(),
            user_agent: None,
            ip_address: None,
            is_active: true,
            last_used_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    fn authority(accounts: MockAccountStore, sessions: MockSessionStore) -> SessionAuthority {
        SessionAuthority::builder(test_auth_config())
            .accounts(Arc::new(accounts))
            .sessions(Arc::new(sessions))
            .build()
            .unwrap()
    }

    fn federated_authority(
        accounts: MockAccountStore,
        sessions: MockSessionStore,
        verifier: MockIdentityVerifier,
    ) -> SessionAuthority {
        SessionAuthority::builder(test_auth_config())
            .accounts(Arc::new(accounts))
            .sessions(Arc::new(sessions))
            .identity_verifier(Arc::new(verifier), test_oidc_config("http://127.0.0.1:1/tokeninfo"))
            .build()
            .unwrap()
    }

    fn accept_session_create(sessions: &mut MockSessionStore) {
        sessions
            .expect_create()
            .returning(|s| Ok(session(&s.id, s.user_id, &s.refresh_jti)));
    }

    fn accept_login_bookkeeping(accounts: &mut MockAccountStore) {
        accounts.expect_touch_last_login().returning(|_| Ok(()));
    }

    #[test]
    fn test_builder_requires_stores() {
        let err = SessionAuthority::builder(test_auth_config())
            .build()
            .unwrap_err();
        assert!(matches!(err, AuthError::Config { .. }));
    }

    #[tokio::test]
    async fn test_unknown_user_and_wrong_password_share_public_code() {
        let hash = bcrypt::hash(TEST_PASSWORD, 4).unwrap();
        let mut accounts = MockAccountStore::new();
        accounts
            .expect_find_by_username()
            .returning(move |name| {
                if name == "known" {
                    Ok(account(1, &hash))
                } else {
                    Err(StoreError::not_found("user"))
                }
            });
        let authority = authority(accounts, MockSessionStore::new());
        let ctx = CallContext::new();

        let missing = authority
            .login_with_password(&ctx, "ghost", TEST_PASSWORD, ClientInfo::default())
            .await
            .unwrap_err();
        let wrong = authority
            .login_with_password(&ctx, "known", "wrong-password", ClientInfo::default())
            .await
            .unwrap_err();

        assert_eq!(missing.kind(), ErrorKind::UserNotFound);
        assert_eq!(wrong.kind(), ErrorKind::InvalidCredentials);
        assert_eq!(missing.code(), wrong.code());
        assert_eq!(missing.public_message(), wrong.public_message());
    }

    #[tokio::test]
    async fn test_inactive_account_cannot_login() {
        let hash = bcrypt::hash(TEST_PASSWORD, 4).unwrap();
        let mut accounts = MockAccountStore::new();
        accounts.expect_find_by_username().returning(move |_| {
            let mut user = account(1, &hash);
            user.is_active = false;
            Ok(user)
        });
        let authority = authority(accounts, MockSessionStore::new());

        let err = authority
            .login_with_password(&CallContext::new(), "user1", TEST_PASSWORD, ClientInfo::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_store_outage_is_unavailable() {
        let mut accounts = MockAccountStore::new();
        accounts
            .expect_find_by_username()
            .returning(|_| Err(StoreError::Query(DbErr::Custom("connection reset".into()))));
        let authority = authority(accounts, MockSessionStore::new());

        let err = authority
            .login_with_password(&CallContext::new(), "user1", TEST_PASSWORD, ClientInfo::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(err.kind().is_retryable());
    }

    #[tokio::test]
    async fn test_empty_username_rejected_before_store_access() {
        let authority = authority(MockAccountStore::new(), MockSessionStore::new());
        let err = authority
            .login_with_password(&CallContext::new(), "  ", TEST_PASSWORD, ClientInfo::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn test_cancelled_context_is_unavailable() {
        let authority = authority(MockAccountStore::new(), MockSessionStore::new());
        let ctx = CallContext::new();
        ctx.cancel();

        let err = authority
            .login_with_password(&ctx, "user1", TEST_PASSWORD, ClientInfo::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_last_login_failure_is_not_fatal() {
        let hash = bcrypt::hash(TEST_PASSWORD, 4).unwrap();
        let mut accounts = MockAccountStore::new();
        accounts
            .expect_find_by_username()
            .returning(move |_| Ok(account(1, &hash)));
        accounts
            .expect_touch_last_login()
            .returning(|_| Err(StoreError::Query(DbErr::Custom("disk full".into()))));
        let mut sessions = MockSessionStore::new();
        accept_session_create(&mut sessions);
        let authority = authority(accounts, sessions);

        let response = authority
            .login_with_password(&CallContext::new(), "user1", TEST_PASSWORD, ClientInfo::default())
            .await
            .unwrap();
        assert_eq!(response.user.id, 1);
        assert_eq!(response.token_type, "Bearer");
    }

    #[tokio::test]
    async fn test_lost_rotation_race_is_invalid_token() {
        let mut sessions = MockSessionStore::new();
        sessions
            .expect_find_by_session_id()
            .returning(|id| Ok(session(id, 5, "current-jti")));
        sessions
            .expect_rotate_refresh_identifier()
            .returning(|_, _, _| Err(StoreError::not_found("rotated elsewhere")));
        let authority = authority(MockAccountStore::new(), sessions);

        let pair = authority
            .tokens()
            .generate_token_pair(5, "SID", "current-jti")
            .unwrap();
        let err = authority
            .refresh(&CallContext::new(), &pair.refresh_token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[tokio::test]
    async fn test_stale_cache_is_confirmed_against_store() {
        let mut sessions = MockSessionStore::new();
        sessions
            .expect_find_by_session_id()
            .returning(|id| Ok(session(id, 5, "stale-jti")));
        sessions
            .expect_find_by_id()
            .times(1)
            .returning(|id| Ok(session(id, 5, "current-jti")));
        sessions
            .expect_rotate_refresh_identifier()
            .withf(|_, old, _| old == "current-jti")
            .returning(|id, _, new| Ok(session(id, 5, new)));
        let authority = authority(MockAccountStore::new(), sessions);

        let pair = authority
            .tokens()
            .generate_token_pair(5, "SID", "current-jti")
            .unwrap();
        let refreshed = authority
            .refresh(&CallContext::new(), &pair.refresh_token)
            .await
            .unwrap();
        assert_ne!(refreshed.refresh_token, pair.refresh_token);
    }

    #[tokio::test]
    async fn test_access_token_cannot_refresh() {
        let authority = authority(MockAccountStore::new(), MockSessionStore::new());
        let pair = authority
            .tokens()
            .generate_token_pair(5, "SID", "jti")
            .unwrap();

        let err = authority
            .refresh(&CallContext::new(), &pair.access_token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[tokio::test]
    async fn test_verify_rejects_session_of_other_user() {
        let mut sessions = MockSessionStore::new();
        sessions
            .expect_find_by_session_id()
            .returning(|id| Ok(session(id, 99, "jti")));
        let authority = authority(MockAccountStore::new(), sessions);
        let pair = authority
            .tokens()
            .generate_token_pair(5, "SID", "jti")
            .unwrap();

        let err = authority
            .verify(&CallContext::new(), &pair.access_token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[tokio::test]
    async fn test_federated_login_disabled() {
        let authority = authority(MockAccountStore::new(), MockSessionStore::new());
        let err = authority
            .login_with_federated_identity(&CallContext::new(), "assertion", ClientInfo::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[tokio::test]
    async fn test_federated_unverified_email_rejected() {
        let mut verifier = MockIdentityVerifier::new();
        verifier.expect_verify_assertion().returning(|_, _| {
            let mut profile = verified_google_profile("sub-1", "grace@example.com");
            profile.email_verified = false;
            Ok(profile)
        });
        let authority =
            federated_authority(MockAccountStore::new(), MockSessionStore::new(), verifier);

        let err = authority
            .login_with_federated_identity(&CallContext::new(), "assertion", ClientInfo::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[tokio::test]
    async fn test_federated_audience_mismatch_rejected() {
        let mut verifier = MockIdentityVerifier::new();
        verifier.expect_verify_assertion().returning(|_, _| {
            let mut profile = verified_google_profile("sub-1", "grace@example.com");
            profile.audience = "someone-else".to_string();
            Ok(profile)
        });
        let authority =
            federated_authority(MockAccountStore::new(), MockSessionStore::new(), verifier);

        let err = authority
            .login_with_federated_identity(&CallContext::new(), "assertion", ClientInfo::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[tokio::test]
    async fn test_federated_verifier_failure_is_invalid_token() {
        let mut verifier = MockIdentityVerifier::new();
        verifier
            .expect_verify_assertion()
            .returning(|_, _| Err(IdentityError::Status(503)));
        let authority =
            federated_authority(MockAccountStore::new(), MockSessionStore::new(), verifier);

        let err = authority
            .login_with_federated_identity(&CallContext::new(), "assertion", ClientInfo::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[tokio::test]
    async fn test_federated_timeout_is_invalid_token() {
        struct Slow;

        #[async_trait::async_trait]
        impl IdentityVerifier for Slow {
            async fn verify_assertion(
                &self,
                _ctx: &CallContext,
                _raw: &str,
            ) -> std::result::Result<FederatedProfile, IdentityError> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Err(IdentityError::Interrupted)
            }
        }

        let authority = SessionAuthority::builder(test_auth_config())
            .accounts(Arc::new(MockAccountStore::new()))
            .sessions(Arc::new(MockSessionStore::new()))
            .identity_verifier(Arc::new(Slow), test_oidc_config("http://127.0.0.1:1/tokeninfo"))
            .build()
            .unwrap();
        let ctx = CallContext::new().with_timeout(Duration::from_millis(20));

        let err = authority
            .login_with_federated_identity(&ctx, "assertion", ClientInfo::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[tokio::test]
    async fn test_federated_creation_race_retries_resolution() {
        let mut verifier = MockIdentityVerifier::new();
        verifier
            .expect_verify_assertion()
            .returning(|_, _| Ok(verified_google_profile("sub-1", "grace@example.com")));

        let mut accounts = MockAccountStore::new();
        let mut seq = mockall::Sequence::new();
        accounts
            .expect_find_by_external_identity()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(StoreError::not_found("identity")));
        accounts
            .expect_find_by_email()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(StoreError::not_found("email")));
        accounts
            .expect_create()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(StoreError::conflict("users.email")));
        accounts
            .expect_find_by_external_identity()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|provider, subject| {
                let mut user = account(7, "$2b$04$unusable");
                user.oidc_provider = Some(provider.to_string());
                user.oidc_subject = Some(subject.to_string());
                Ok(user)
            });
        accept_login_bookkeeping(&mut accounts);

        let mut sessions = MockSessionStore::new();
        accept_session_create(&mut sessions);
        let authority = federated_authority(accounts, sessions, verifier);

        let response = authority
            .login_with_federated_identity(&CallContext::new(), "assertion", ClientInfo::default())
            .await
            .unwrap();
        assert_eq!(response.user.id, 7);
    }

    #[tokio::test]
    async fn test_federated_email_linked_elsewhere_is_conflict() {
        let mut verifier = MockIdentityVerifier::new();
        verifier
            .expect_verify_assertion()
            .returning(|_, _| Ok(verified_google_profile("sub-new", "grace@example.com")));

        let mut accounts = MockAccountStore::new();
        accounts
            .expect_find_by_external_identity()
            .returning(|_, _| Err(StoreError::not_found("identity")));
        accounts.expect_find_by_email().returning(|_| {
            let mut user = account(3, "$2b$04$unusable");
            user.oidc_provider = Some("google".to_string());
            user.oidc_subject = Some("sub-old".to_string());
            Ok(user)
        });
        let authority = federated_authority(accounts, MockSessionStore::new(), verifier);

        let err = authority
            .login_with_federated_identity(&CallContext::new(), "assertion", ClientInfo::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let authority = authority(MockAccountStore::new(), MockSessionStore::new());
        let ctx = CallContext::new();

        let short = RegisterRequest {
            username: "bob".to_string(),
            password: "short".to_string(),
            first_name: "Bob".to_string(),
            ..RegisterRequest::default()
        };
        let err = authority
            .register(&ctx, short, ClientInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::InvalidRequest { ref field, .. } if field.as_deref() == Some("password")
        ));

        let bad_email = RegisterRequest {
            username: "bob".to_string(),
            password: "long-enough".to_string(),
            first_name: "Bob".to_string(),
            email: Some("not-an-email".to_string()),
            ..RegisterRequest::default()
        };
        let err = authority
            .register(&ctx, bad_email, ClientInfo::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn test_register_insert_race_is_classified() {
        let mut accounts = MockAccountStore::new();
        let mut seq = mockall::Sequence::new();
        accounts
            .expect_find_by_username()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(StoreError::not_found("user")));
        accounts
            .expect_find_by_email()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(StoreError::not_found("email")));
        accounts
            .expect_create()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(StoreError::conflict("users.email")));
        accounts
            .expect_find_by_username()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(StoreError::not_found("user")));
        let authority = authority(accounts, MockSessionStore::new());

        let request = RegisterRequest {
            username: "bob".to_string(),
            password: "long-enough".to_string(),
            first_name: "Bob".to_string(),
            email: Some("bob@example.com".to_string()),
            ..RegisterRequest::default()
        };
        let err = authority
            .register(&CallContext::new(), request, ClientInfo::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_single_session_policy_with_real_stores() {
        use crate::cache::{CacheKey, CacheProvider};
        use crate::testing::fixtures::single_session_auth_config;
        use crate::testing::helpers::{TestAuthority, create_test_user};

        let harness = TestAuthority::build(single_session_auth_config(), None).await;
        let user = create_test_user(&harness.db, "solo").await;
        let ctx = CallContext::new();

        let first = harness
            .authority
            .login_with_password(&ctx, "solo", TEST_PASSWORD, ClientInfo::default())
            .await
            .unwrap();
        let second = harness
            .authority
            .login_with_password(&ctx, "solo", TEST_PASSWORD, ClientInfo::default())
            .await
            .unwrap();
        assert_eq!(second.user.id, user.id);

        let err = harness
            .authority
            .verify(&ctx, &first.access_token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);

        let verified = harness
            .authority
            .verify(&ctx, &second.access_token)
            .await
            .unwrap();
        let cached = harness
            .cache
            .get_raw(&CacheKey::session(&verified.session_id).build())
            .await
            .unwrap();
        assert!(cached.is_some());
    }

    #[tokio::test]
    async fn test_federated_login_resolves_linked_fixture_user() {
        use crate::testing::fixtures::UserFixture;
        use crate::testing::helpers::{TestAuthority, insert_user};

        let mut verifier = MockIdentityVerifier::new();
        verifier
            .expect_verify_assertion()
            .returning(|_, _| Ok(verified_google_profile("google-77", "other@example.com")));
        let harness = TestAuthority::build(
            test_auth_config(),
            Some((Arc::new(verifier), test_oidc_config("http://127.0.0.1:1/tokeninfo"))),
        )
        .await;
        let linked = insert_user(
            &harness.db,
            UserFixture::new().username("linked").google_subject("google-77"),
        )
        .await;

        let login = harness
            .authority
            .login_with_federated_identity(&CallContext::new(), "raw-id-token", ClientInfo::default())
            .await
            .unwrap();
        assert_eq!(login.user.id, linked.id);
        assert_eq!(login.user.email.as_deref(), Some("linked@example.com"));
    }

    /// 读取账户后、登录写回前，另一个请求停用账户并改掉密码
    struct ConcurrentAccountChange {
        inner: crate::store::DbAccountStore,
    }

    #[async_trait::async_trait]
    impl AccountStore for ConcurrentAccountChange {
        async fn find_by_id(&self, id: i32) -> StoreResult<users::Model> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_username(&self, username: &str) -> StoreResult<users::Model> {
            let snapshot = self.inner.find_by_username(username).await?;
            self.inner.deactivate(snapshot.id).await?;
            self.inner
                .set_password(snapshot.id, "$2b$04$rotated-elsewhere")
                .await?;
            Ok(snapshot)
        }

        async fn find_by_email(&self, email: &str) -> StoreResult<users::Model> {
            self.inner.find_by_email(email).await
        }

        async fn find_by_external_identity(
            &self,
            provider: &str,
            subject: &str,
        ) -> StoreResult<users::Model> {
            self.inner.find_by_external_identity(provider, subject).await
        }

        async fn create(&self, account: NewAccount) -> StoreResult<users::Model> {
            self.inner.create(account).await
        }

        async fn update(&self, account: users::Model) -> StoreResult<users::Model> {
            self.inner.update(account).await
        }

        async fn touch_last_login(&self, id: i32) -> StoreResult<()> {
            self.inner.touch_last_login(id).await
        }

        async fn set_password(&self, id: i32, password_hash: &str) -> StoreResult<()> {
            self.inner.set_password(id, password_hash).await
        }

        async fn attach_external_identity(
            &self,
            id: i32,
            provider: &str,
            subject: &str,
        ) -> StoreResult<users::Model> {
            self.inner.attach_external_identity(id, provider, subject).await
        }

        async fn deactivate(&self, id: i32) -> StoreResult<()> {
            self.inner.deactivate(id).await
        }
    }

    #[tokio::test]
    async fn test_login_bookkeeping_keeps_concurrent_account_changes() {
        use crate::cache::MemoryCache;
        use crate::store::{DbAccountStore, DbSessionStore};
        use crate::testing::helpers::{create_test_user, setup_test_db};

        let db = setup_test_db().await;
        let user = create_test_user(&db, "victim").await;
        let authority = SessionAuthority::builder(test_auth_config())
            .accounts(Arc::new(ConcurrentAccountChange {
                inner: DbAccountStore::new(db.clone()),
            }))
            .sessions(Arc::new(DbSessionStore::new(
                db.clone(),
                Arc::new(MemoryCache::new(100)),
                Duration::from_secs(60),
            )))
            .build()
            .unwrap();

        authority
            .login_with_password(&CallContext::new(), "victim", TEST_PASSWORD, ClientInfo::default())
            .await
            .unwrap();

        let stored = DbAccountStore::new(db).find_by_id(user.id).await.unwrap();
        assert!(!stored.is_active);
        assert_eq!(stored.password_hash, "$2b$04$rotated-elsewhere");
        assert!(stored.last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_refresh_past_deadline_returns_committed_tokens() {
        use crate::store::{DbAccountStore, DbSessionStore};
        use crate::testing::helpers::{create_test_user, setup_test_db};
        use crate::testing::mocks::StallingCache;
        use entity::UserSessions;
        use sea_orm::EntityTrait;

        let db = setup_test_db().await;
        create_test_user(&db, "slowcache").await;
        let cache = Arc::new(StallingCache::new());
        let sessions = DbSessionStore::new(db.clone(), cache.clone(), Duration::from_secs(60))
            .with_cache_write_timeout(Duration::from_millis(300));
        let authority = SessionAuthority::builder(test_auth_config())
            .accounts(Arc::new(DbAccountStore::new(db.clone())))
            .sessions(Arc::new(sessions))
            .build()
            .unwrap();

        let login = authority
            .login_with_password(&CallContext::new(), "slowcache", TEST_PASSWORD, ClientInfo::default())
            .await
            .unwrap();

        // 轮换提交后缓存写入卡住，直到请求截止时间过去
        cache.stall_writes(true);
        let ctx = CallContext::new().with_timeout(Duration::from_millis(50));
        let refreshed = authority.refresh(&ctx, &login.refresh_token).await.unwrap();
        assert!(ctx.is_done());
        cache.stall_writes(false);

        let claims = authority.tokens().verify(&refreshed.refresh_token).unwrap();
        let stored = UserSessions::find_by_id(claims.sid.clone())
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.refresh_jti, claims.jti);

        authority
            .refresh(&CallContext::new(), &refreshed.refresh_token)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_refresh_is_unavailable() {
        let authority = authority(MockAccountStore::new(), MockSessionStore::new());
        let pair = authority
            .tokens()
            .generate_token_pair(5, "SID", "jti")
            .unwrap();
        let ctx = CallContext::new();
        ctx.cancel();

        let err = authority
            .refresh(&ctx, &pair.refresh_token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_register_without_address_stores_no_email() {
        let mut accounts = MockAccountStore::new();
        accounts
            .expect_find_by_username()
            .returning(|_| Err(StoreError::not_found("user")));
        accounts.expect_find_by_email().never();
        accounts
            .expect_create()
            .withf(|account| account.email.is_none())
            .returning(|new_account| {
                let mut user = account(11, &new_account.password_hash);
                user.username = new_account.username;
                user.email = new_account.email;
                Ok(user)
            });
        accept_login_bookkeeping(&mut accounts);
        let mut sessions = MockSessionStore::new();
        accept_session_create(&mut sessions);
        let authority = authority(accounts, sessions);

        let request = RegisterRequest {
            username: "bob".to_string(),
            password: "long-enough".to_string(),
            first_name: "Bob".to_string(),
            ..RegisterRequest::default()
        };
        let response = authority
            .register(&CallContext::new(), request, ClientInfo::default())
            .await
            .unwrap();
        assert_eq!(response.user.email, None);
    }

    #[tokio::test]
    async fn test_register_address_username_doubles_as_email() {
        let mut accounts = MockAccountStore::new();
        accounts
            .expect_find_by_username()
            .returning(|_| Err(StoreError::not_found("user")));
        accounts
            .expect_find_by_email()
            .withf(|email| email == "dana@example.com")
            .returning(|_| Err(StoreError::not_found("email")));
        accounts
            .expect_create()
            .withf(|account| account.email.as_deref() == Some("dana@example.com"))
            .returning(|new_account| {
                let mut user = account(12, &new_account.password_hash);
                user.username = new_account.username;
                user.email = new_account.email;
                Ok(user)
            });
        accept_login_bookkeeping(&mut accounts);
        let mut sessions = MockSessionStore::new();
        accept_session_create(&mut sessions);
        let authority = authority(accounts, sessions);

        let request = RegisterRequest {
            username: "dana@example.com".to_string(),
            password: "long-enough".to_string(),
            first_name: "Dana".to_string(),
            ..RegisterRequest::default()
        };
        let response = authority
            .register(&CallContext::new(), request, ClientInfo::default())
            .await
            .unwrap();
        assert_eq!(response.user.email.as_deref(), Some("dana@example.com"));
    }
}

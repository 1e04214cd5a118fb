//! # 认证接口处理器

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use super::extract::{BearerToken, ClientMeta, RequestCall, json_body};
use super::response::{ApiResponse, ApiResult};
use super::server::AppState;
use crate::auth::{LoginResponse, RefreshResponse, RegisterRequest, SessionSummary, VerifiedToken};
use crate::{
    lwarn,
    logging::{LogComponent, LogStage},
};

/// 密码登录请求
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// 联合登录请求
#[derive(Debug, Deserialize)]
pub struct FederatedLoginRequest {
    /// 签发方给出的身份断言（Google ID token）
    pub id_token: String,
}

/// 修改密码请求
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// 全部登出结果
#[derive(Debug, Serialize)]
pub struct LogoutAllResponse {
    pub retired_sessions: u64,
}

/// 健康检查结果
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub database: &'static str,
    pub pending_migrations: usize,
    pub cache: &'static str,
}

/// `POST /v1/auth/login`
pub async fn login(
    State(state): State<AppState>,
    RequestCall(ctx): RequestCall,
    ClientMeta(client): ClientMeta,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let request = json_body(payload)?;
    let response = state
        .authority
        .login_with_password(&ctx, &request.username, &request.password, client)
        .await?;
    Ok(ApiResponse::Success(response))
}

/// `POST /v1/auth/via-google`
pub async fn login_via_google(
    State(state): State<AppState>,
    RequestCall(ctx): RequestCall,
    ClientMeta(client): ClientMeta,
    payload: Result<Json<FederatedLoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let request = json_body(payload)?;
    let response = state
        .authority
        .login_with_federated_identity(&ctx, &request.id_token, client)
        .await?;
    Ok(ApiResponse::Success(response))
}

/// `POST /v1/auth/register`
pub async fn register(
    State(state): State<AppState>,
    RequestCall(ctx): RequestCall,
    ClientMeta(client): ClientMeta,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let request = json_body(payload)?;
    let response = state.authority.register(&ctx, request, client).await?;
    Ok(ApiResponse::Success(response))
}

/// `POST /v1/auth/refresh`，Bearer 为刷新令牌
pub async fn refresh(
    State(state): State<AppState>,
    RequestCall(ctx): RequestCall,
    BearerToken(token): BearerToken,
) -> ApiResult<RefreshResponse> {
    let response = state.authority.refresh(&ctx, &token).await?;
    Ok(ApiResponse::Success(response))
}

/// `GET /v1/auth/verify`
pub async fn verify(
    State(state): State<AppState>,
    RequestCall(ctx): RequestCall,
    BearerToken(token): BearerToken,
) -> ApiResult<VerifiedToken> {
    let verified = state.authority.verify(&ctx, &token).await?;
    Ok(ApiResponse::Success(verified))
}

/// `POST /v1/auth/logout`
pub async fn logout(
    State(state): State<AppState>,
    RequestCall(ctx): RequestCall,
    BearerToken(token): BearerToken,
) -> ApiResult<()> {
    state.authority.logout(&ctx, &token).await?;
    Ok(ApiResponse::SuccessWithoutData("已登出".to_string()))
}

/// `GET /v1/auth/sessions`
pub async fn list_sessions(
    State(state): State<AppState>,
    RequestCall(ctx): RequestCall,
    BearerToken(token): BearerToken,
) -> ApiResult<Vec<SessionSummary>> {
    let sessions = state.authority.list_sessions(&ctx, &token).await?;
    Ok(ApiResponse::Success(sessions))
}

/// `POST /v1/auth/logout-all`
pub async fn logout_all(
    State(state): State<AppState>,
    RequestCall(ctx): RequestCall,
    BearerToken(token): BearerToken,
) -> ApiResult<LogoutAllResponse> {
    let retired_sessions = state.authority.logout_all(&ctx, &token).await?;
    Ok(ApiResponse::Success(LogoutAllResponse { retired_sessions }))
}

/// `POST /v1/auth/password`
pub async fn change_password(
    State(state): State<AppState>,
    RequestCall(ctx): RequestCall,
    BearerToken(token): BearerToken,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> ApiResult<()> {
    let request = json_body(payload)?;
    state
        .authority
        .change_password(&ctx, &token, &request.current_password, &request.new_password)
        .await?;
    Ok(ApiResponse::SuccessWithoutData("密码已修改".to_string()))
}

/// `GET /health`
pub async fn health_check(
    State(state): State<AppState>,
    RequestCall(ctx): RequestCall,
) -> Response {
    match ctx
        .run(crate::database::check_database_status(&state.db))
        .await
    {
        Ok(Ok(pending_migrations)) => ApiResponse::Success(HealthStatus {
            status: "healthy",
            database: "connected",
            pending_migrations,
            cache: state.cache.cache_type(),
        })
        .into_response(),
        Ok(Err(e)) => {
            lwarn!(
                ctx.request_id(),
                LogStage::Request,
                LogComponent::Database,
                "health_check_failed",
                "数据库健康检查失败",
                error = %e
            );
            ApiResponse::<()>::Error(
                StatusCode::SERVICE_UNAVAILABLE,
                "SVC-001".to_string(),
                "database unavailable".to_string(),
            )
            .into_response()
        }
        Err(interrupted) => ApiResponse::<()>::Error(
            StatusCode::SERVICE_UNAVAILABLE,
            "SVC-001".to_string(),
            interrupted.to_string(),
        )
        .into_response(),
    }
}

//! 请求提取器：调用上下文、客户端信息和 Bearer 令牌

use axum::{
    Json,
    extract::{ConnectInfo, FromRequestParts, rejection::JsonRejection},
    http::{HeaderMap, header, request::Parts},
};
use std::convert::Infallible;
use std::net::SocketAddr;

use super::middleware::RequestId;
use super::server::AppState;
use crate::auth::{AuthUtils, CallContext, ClientInfo};
use crate::error::AuthError;

/// 带请求ID和请求超时的调用上下文
#[derive(Debug, Clone)]
pub struct RequestCall(pub CallContext);

impl FromRequestParts<AppState> for RequestCall {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .cloned()
            .unwrap_or_default();
        let ctx = CallContext::new()
            .with_request_id(request_id.as_str())
            .with_timeout(state.request_timeout());
        Ok(Self(ctx))
    }
}

/// 客户端 User-Agent 与来源地址
#[derive(Debug, Clone)]
pub struct ClientMeta(pub ClientInfo);

impl<S: Send + Sync> FromRequestParts<S> for ClientMeta {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        let ip_address = forwarded_ip(&parts.headers).or(peer);

        Ok(Self(ClientInfo::new(user_agent, ip_address)))
    }
}

/// `X-Forwarded-For` 的第一个地址，其次 `X-Real-IP`
fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let first_forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    first_forwarded.or_else(real_ip).map(ToString::to_string)
}

/// `Authorization: Bearer <token>`
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(AuthUtils::extract_bearer_token)
            .map(|token| Self(token.to_string()))
            .ok_or_else(|| AuthError::invalid_token("缺少 Bearer 令牌"))
    }
}

/// 把 JSON 解析失败转换为请求校验错误
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AuthError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AuthError::invalid_request(rejection.body_text(), None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_ip_prefers_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(forwarded_ip(&headers).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_forwarded_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(forwarded_ip(&headers).as_deref(), Some("10.0.0.9"));
        assert_eq!(forwarded_ip(&HeaderMap::new()), None);
    }
}

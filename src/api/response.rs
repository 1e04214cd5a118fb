//! # API 响应结构
//!
//! 统一的 JSON 响应信封：`{success, data | error{code, message}, timestamp}`。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::{
    ldebug, lerror,
    logging::{LogComponent, LogStage},
};

/// # 标准成功响应
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// # 标准错误信息
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// # 标准错误响应
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorInfo,
    pub timestamp: DateTime<Utc>,
}

/// # API响应枚举
#[derive(Debug)]
pub enum ApiResponse<T: Serialize> {
    Success(T),
    SuccessWithoutData(String),
    Error(StatusCode, String, String),
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match self {
            Self::Success(data) => (
                StatusCode::OK,
                Json(SuccessResponse {
                    success: true,
                    data: Some(data),
                    message: None,
                    timestamp: Utc::now(),
                }),
            )
                .into_response(),
            Self::SuccessWithoutData(message) => (
                StatusCode::OK,
                Json(SuccessResponse::<()> {
                    success: true,
                    data: None,
                    message: Some(message),
                    timestamp: Utc::now(),
                }),
            )
                .into_response(),
            Self::Error(status, code, message) => (
                status,
                Json(ErrorResponse {
                    success: false,
                    error: ErrorInfo {
                        code,
                        message,
                        field: None,
                    },
                    timestamp: Utc::now(),
                }),
            )
                .into_response(),
        }
    }
}

/// 处理器结果
pub type ApiResult<T> = Result<ApiResponse<T>, AuthError>;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = self.to_http_response_parts();

        // 内部原因只进日志
        if status.is_server_error() {
            lerror!(
                "system",
                LogStage::Request,
                LogComponent::Server,
                "request_failed",
                "请求处理失败",
                code = code,
                error = ?self
            );
        } else {
            ldebug!(
                "system",
                LogStage::Request,
                LogComponent::Server,
                "request_rejected",
                "请求被拒绝",
                code = code,
                error = %self
            );
        }

        let field = match &self {
            Self::InvalidRequest { field, .. } => field.clone(),
            _ => None,
        };

        (
            status,
            Json(ErrorResponse {
                success: false,
                error: ErrorInfo {
                    code: code.to_string(),
                    message: self.public_message().to_string(),
                    field,
                },
                timestamp: Utc::now(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_success_envelope() {
        let response = ApiResponse::Success(serde_json::json!({"ok": 1})).into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["ok"], 1);
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_error_hides_internal_message() {
        let err = AuthError::internal("database file /var/secret is corrupt");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "SVC-002");
        assert_eq!(body["error"]["message"], "internal server error");
        assert!(!body.to_string().contains("/var/secret"));
    }

    #[tokio::test]
    async fn test_user_not_found_looks_like_bad_password() {
        let missing = body_json(AuthError::user_not_found("ghost").into_response()).await;
        let wrong = body_json(AuthError::invalid_credentials("bad").into_response()).await;
        assert_eq!(missing["error"], wrong["error"]);
    }

    #[tokio::test]
    async fn test_invalid_request_carries_field() {
        let err = AuthError::invalid_request("too short", Some("password".to_string()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"]["field"], "password");
    }
}

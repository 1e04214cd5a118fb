//! # 联合身份校验
//!
//! 把客户端提交的身份断言交给签发方校验，换取已验证的用户资料。
//! 默认实现调用 Google `tokeninfo` 端点。

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use url::Url;

use crate::auth::context::CallContext;
use crate::auth::types::{FederatedProfile, OidcConfig};
use crate::error::{AuthError, IdentityError, Result};
use crate::logging::token_fingerprint;
use crate::{
    ldebug,
    logging::{LogComponent, LogStage},
};

/// Google 断言可接受的签发方
const GOOGLE_ISSUERS: &[&str] = &["accounts.google.com", "https://accounts.google.com"];

/// 身份断言校验器
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// 校验原始断言并返回签发方确认的资料
    async fn verify_assertion(
        &self,
        ctx: &CallContext,
        raw: &str,
    ) -> std::result::Result<FederatedProfile, IdentityError>;
}

/// `tokeninfo` 响应
#[derive(Debug, Deserialize)]
struct TokenInfo {
    sub: Option<String>,
    email: Option<String>,
    /// Google 以字符串 `"true"` 返回
    #[serde(default, deserialize_with = "lenient_bool")]
    email_verified: bool,
    aud: Option<String>,
    iss: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    exp: Option<i64>,
    given_name: Option<String>,
    family_name: Option<String>,
    name: Option<String>,
}

fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Bool(value) => value,
        serde_json::Value::String(value) => value.eq_ignore_ascii_case("true"),
        _ => false,
    })
}

fn lenient_i64<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(value) => value.as_i64(),
        serde_json::Value::String(value) => value.parse().ok(),
        _ => None,
    })
}

/// 基于 Google `tokeninfo` 的校验器
#[derive(Debug, Clone)]
pub struct GoogleIdentityVerifier {
    http_client: reqwest::Client,
    endpoint: Url,
}

impl GoogleIdentityVerifier {
    /// 按配置创建，出站请求带超时
    pub fn new(config: &OidcConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.tokeninfo_endpoint).map_err(|e| {
            AuthError::config_with_source(
                format!("无效的 tokeninfo 端点: {}", config.tokeninfo_endpoint),
                e,
            )
        })?;
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| AuthError::config_with_source("创建 HTTP 客户端失败", e))?;

        Ok(Self {
            http_client,
            endpoint,
        })
    }

    async fn fetch_token_info(&self, raw: &str) -> std::result::Result<TokenInfo, IdentityError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("id_token", raw);

        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IdentityError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        serde_json::from_str::<TokenInfo>(&body).map_err(|e| IdentityError::Parse(e.to_string()))
    }
}

#[async_trait]
impl IdentityVerifier for GoogleIdentityVerifier {
    async fn verify_assertion(
        &self,
        ctx: &CallContext,
        raw: &str,
    ) -> std::result::Result<FederatedProfile, IdentityError> {
        ldebug!(
            ctx.request_id(),
            LogStage::Federation,
            LogComponent::Oidc,
            "verify_assertion",
            "向签发方校验身份断言",
            assertion = %token_fingerprint(raw)
        );

        let info = ctx
            .run(self.fetch_token_info(raw))
            .await
            .map_err(|_| IdentityError::Interrupted)??;

        let subject = info
            .sub
            .filter(|s| !s.is_empty())
            .ok_or_else(|| IdentityError::Parse("missing sub".to_string()))?;

        if let Some(iss) = info.iss.as_deref() {
            if !GOOGLE_ISSUERS.contains(&iss) {
                return Err(IdentityError::rejected(format!("unexpected issuer {iss}")));
            }
        }
        if let Some(exp) = info.exp {
            if exp <= chrono::Utc::now().timestamp() {
                return Err(IdentityError::rejected("assertion expired"));
            }
        }

        Ok(FederatedProfile {
            subject,
            email: info.email,
            email_verified: info.email_verified,
            audience: info.aud.unwrap_or_default(),
            given_name: info.given_name,
            family_name: info.family_name,
            name: info.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{TEST_CLIENT_ID, test_oidc_config};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn verifier_for(server: &MockServer) -> GoogleIdentityVerifier {
        let config = test_oidc_config(&format!("{}/tokeninfo", server.uri()));
        GoogleIdentityVerifier::new(&config).unwrap()
    }

    fn future_exp() -> String {
        (chrono::Utc::now().timestamp() + 3600).to_string()
    }

    #[tokio::test]
    async fn test_verified_profile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokeninfo"))
            .and(query_param("id_token", "good-assertion"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "iss": "https://accounts.google.com",
                "sub": "1098",
                "aud": TEST_CLIENT_ID,
                "email": "grace@example.com",
                "email_verified": "true",
                "given_name": "Grace",
                "family_name": "Hopper",
                "name": "Grace Hopper",
                "exp": future_exp(),
            })))
            .expect(1)
            .mount(&server)
            .await;

        let profile = verifier_for(&server)
            .await
            .verify_assertion(&CallContext::new(), "good-assertion")
            .await
            .unwrap();

        assert_eq!(
            profile,
            FederatedProfile {
                subject: "1098".to_string(),
                email: Some("grace@example.com".to_string()),
                email_verified: true,
                audience: TEST_CLIENT_ID.to_string(),
                given_name: Some("Grace".to_string()),
                family_name: Some("Hopper".to_string()),
                name: Some("Grace Hopper".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_unverified_email_flag_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokeninfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sub": "1",
                "aud": TEST_CLIENT_ID,
                "email": "x@example.com",
                "email_verified": "false",
            })))
            .mount(&server)
            .await;

        let profile = verifier_for(&server)
            .await
            .verify_assertion(&CallContext::new(), "a")
            .await
            .unwrap();
        assert!(!profile.email_verified);
    }

    #[tokio::test]
    async fn test_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokeninfo"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_token"
            })))
            .mount(&server)
            .await;

        let err = verifier_for(&server)
            .await
            .verify_assertion(&CallContext::new(), "bad")
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Status(400)));
    }

    #[tokio::test]
    async fn test_unparseable_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokeninfo"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = verifier_for(&server)
            .await
            .verify_assertion(&CallContext::new(), "a")
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Parse(_)));
    }

    #[tokio::test]
    async fn test_foreign_issuer_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokeninfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "iss": "https://evil.example.com",
                "sub": "1",
                "email_verified": true,
            })))
            .mount(&server)
            .await;

        let err = verifier_for(&server)
            .await
            .verify_assertion(&CallContext::new(), "a")
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_expired_assertion_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokeninfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sub": "1",
                "exp": "1000",
            })))
            .mount(&server)
            .await;

        let err = verifier_for(&server)
            .await
            .verify_assertion(&CallContext::new(), "a")
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_deadline_interrupts_slow_issuer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokeninfo"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"sub": "1"}))
                    .set_delay(Duration::from_secs(1)),
            )
            .mount(&server)
            .await;

        let ctx = CallContext::new().with_timeout(Duration::from_millis(50));
        let err = verifier_for(&server)
            .await
            .verify_assertion(&ctx, "a")
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Interrupted));
    }

    #[test]
    fn test_invalid_endpoint() {
        let config = test_oidc_config("not a url");
        assert!(GoogleIdentityVerifier::new(&config).is_err());
    }
}

//! 认证工具函数

use rand::Rng;

/// 会话ID字母表：去掉了易混淆的 `0`
const SESSION_ID_ALPHABET: &[u8] = b"123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// 认证工具集
pub struct AuthUtils;

impl AuthUtils {
    /// 生成指定长度的随机会话ID
    #[must_use]
    pub fn generate_session_id(length: usize) -> String {
        let mut rng = rand::thread_rng();
        (0..length)
            .map(|_| {
                let idx = rng.gen_range(0..SESSION_ID_ALPHABET.len());
                char::from(SESSION_ID_ALPHABET[idx])
            })
            .collect()
    }

    /// 生成令牌ID（刷新标识）
    #[must_use]
    pub fn generate_token_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// 从 `Authorization` 头中提取 Bearer 令牌
    #[must_use]
    pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
        let (scheme, token) = auth_header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let token = token.trim();
        (!token.is_empty()).then_some(token)
    }
}

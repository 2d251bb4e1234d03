use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// JWT 负载
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub iss: String, // 签发者
    pub sub: String, // 用户邮箱
    pub aud: String, // token 用途
    pub exp: usize,  // 过期时间戳
    pub name: String,
    pub role: String,
}

/// token 用途，access 与 refresh 共用同一个签发器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAudience {
    Access,
    Refresh,
}

impl TokenAudience {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenAudience::Access => "access",
            TokenAudience::Refresh => "refresh",
        }
    }
}

/// 认证核心消费的用户记录，内容实体由外部模块维护
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
}

impl AuthUser {
    /// 锁定窗口是否仍然生效
    pub fn is_locked(&self) -> bool {
        self.locked_until.map_or(false, |until| Utc::now() < until)
    }
}

/// 已签发凭证的持久化记录
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredToken {
    pub id: String,
    pub token: String,
    pub token_type: String,
    pub user_id: String,
    pub revoked: bool,
    pub expired: bool,
    pub created_at: DateTime<Utc>,
}

impl StoredToken {
    pub fn bearer(value: &str, user_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            token: value.to_string(),
            token_type: "bearer".to_string(),
            user_id: user_id.to_string(),
            revoked: false,
            expired: false,
            created_at: Utc::now(),
        }
    }
}

/// 一次登录签发的 token 对
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// 按 IP 统计的失败记录，同一 IP 允许存在多条，以时间戳最新者为准
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BlockedIp {
    pub id: String,
    pub ip: String,
    pub failed_attempts: i32,
    pub user_agent: String,
    pub last_failed_at: DateTime<Utc>,
}

/// 认证核心的错误分类，在系统边界统一翻译成 HTTP 响应
#[derive(Debug, Error)]
pub enum AuthError {
    /// 签名、签发者或过期校验失败，原始凭证仅用于日志，不返回给客户端
    #[error("无效的认证凭证")]
    CredentialInvalid { token: String },

    #[error("账号已锁定，请稍后再试")]
    AccountLocked,

    #[error("用户名或密码错误")]
    AuthenticationFailed,

    #[error("请求过于频繁，请稍后再试")]
    TooManyRequests,

    #[error("持久化失败: {0}")]
    Persistence(String),
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::CredentialInvalid { .. } => StatusCode::UNAUTHORIZED,
            AuthError::AccountLocked => StatusCode::FORBIDDEN,
            AuthError::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            AuthError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            // 内部细节不外泄
            AuthError::Persistence(_) => "服务器内部错误".to_string(),
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(crate::command::CommandResponse {
            success: false,
            message,
            data: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn lock_window_expires_with_time() {
        let mut user = AuthUser {
            id: "u1".to_string(),
            email: "a@b.c".to_string(),
            display_name: "测试用户".to_string(),
            password_hash: String::new(),
            role: "user".to_string(),
            is_active: true,
            failed_login_attempts: 0,
            locked_until: Some(Utc::now() + Duration::hours(1)),
        };
        assert!(user.is_locked());

        // 到期时刻视为已解锁
        user.locked_until = Some(Utc::now() - Duration::seconds(1));
        assert!(!user.is_locked());

        user.locked_until = None;
        assert!(!user.is_locked());
    }

    #[test]
    fn error_status_mapping() {
        assert_eq!(
            AuthError::TooManyRequests.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AuthError::CredentialInvalid {
                token: "x".to_string()
            }
            .status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::AccountLocked.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthError::AuthenticationFailed.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::Persistence("boom".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn persistence_detail_is_not_exposed() {
        let err = AuthError::Persistence("connection refused".to_string());
        let response = err.error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

use crate::auth::types::{AuthError, AuthUser, Claims, TokenAudience};
use crate::config::AuthConfig;
use chrono::{Duration, FixedOffset, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, error, info, warn};

/// 为用户签发指定用途的凭证
pub fn generate_token(
    user: &AuthUser,
    audience: TokenAudience,
    ttl_hours: i64,
    config: &AuthConfig,
) -> Result<String, AuthError> {
    debug!("为用户 {} 生成 {} token", user.email, audience.as_str());

    // 过期时间 = 签发时刻 + N 小时，按配置的固定时区偏移计算
    let offset = FixedOffset::east_opt(config.timezone_offset_hours * 3600)
        .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
    let exp = (Utc::now().with_timezone(&offset) + Duration::hours(ttl_hours)).timestamp() as usize;

    let claims = Claims {
        iss: config.jwt_issuer.clone(),
        sub: user.email.clone(),
        aud: audience.as_str().to_string(),
        exp,
        name: user.display_name.clone(),
        role: user.role.clone(),
    };

    match encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    ) {
        Ok(token) => {
            info!("成功为用户 {} 生成 {} token", user.email, audience.as_str());
            Ok(token)
        }
        Err(e) => {
            // 签发失败等同于凭证落库失败，调用方不得视为登录成功
            error!("为用户 {} 生成 token 失败: {}", user.email, e);
            Err(AuthError::Persistence(format!("生成 token 失败: {}", e)))
        }
    }
}

/// 短期的 access token
pub fn generate_access_token(user: &AuthUser, config: &AuthConfig) -> Result<String, AuthError> {
    generate_token(user, TokenAudience::Access, config.access_ttl_hours, config)
}

/// 长期的 refresh token
pub fn generate_refresh_token(user: &AuthUser, config: &AuthConfig) -> Result<String, AuthError> {
    generate_token(
        user,
        TokenAudience::Refresh,
        config.refresh_ttl_hours,
        config,
    )
}

/// 校验凭证：签名、签发者、过期时间，任一失败都统一返回 CredentialInvalid
pub fn validate_token(token: &str, config: &AuthConfig) -> Result<Claims, AuthError> {
    debug!("验证 JWT token");
    let mut validation = Validation::default();
    validation.set_issuer(&[config.jwt_issuer.as_str()]);
    // 同一个校验器同时服务 access 和 refresh 两种用途
    validation.validate_aud = false;
    validation.leeway = 0;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        // 原始凭证只进日志，不进响应
        warn!("token 验证失败: {} (token: {})", e, token);
        AuthError::CredentialInvalid {
            token: token.to_string(),
        }
    })
}

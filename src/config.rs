use log::info;
use std::env;

/// 认证核心的全部可调参数，启动时从环境变量读取一次
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub access_ttl_hours: i64,
    pub refresh_ttl_hours: i64,
    pub lock_duration_hours: i64,
    pub max_login_failures: i32,
    pub ip_block_threshold: i32,
    /// IP 封禁的有效期（小时），不设置则永久封禁
    pub ip_block_expiry_hours: Option<i64>,
    pub max_registrations_per_ip: u32,
    /// token 过期时间按该固定时区偏移计算，默认 UTC-3
    pub timezone_offset_hours: i32,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let config = Self {
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "blog-auth".to_string()),
            access_ttl_hours: env_i64("ACCESS_TOKEN_TTL_HOURS", 1),
            refresh_ttl_hours: env_i64("REFRESH_TOKEN_TTL_HOURS", 24),
            lock_duration_hours: env_i64("LOCK_DURATION_HOURS", 1),
            max_login_failures: env_i64("MAX_LOGIN_FAILURES", 4) as i32,
            ip_block_threshold: env_i64("IP_BLOCK_THRESHOLD", 3) as i32,
            ip_block_expiry_hours: env::var("IP_BLOCK_EXPIRY_HOURS")
                .ok()
                .and_then(|v| v.parse().ok()),
            max_registrations_per_ip: env_i64("MAX_REGISTRATIONS_PER_IP", 3) as u32,
            timezone_offset_hours: env_i64("TOKEN_TZ_OFFSET_HOURS", -3) as i32,
        };

        info!(
            "认证配置加载完成: access ttl {}h, refresh ttl {}h, 锁定时长 {}h, 登录失败阈值 {}, IP 封禁阈值 {}",
            config.access_ttl_hours,
            config.refresh_ttl_hours,
            config.lock_duration_hours,
            config.max_login_failures,
            config.ip_block_threshold
        );
        config
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
impl AuthConfig {
    /// 测试用的固定配置，不依赖环境变量
    pub fn for_tests() -> Self {
        Self {
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "blog-auth".to_string(),
            access_ttl_hours: 1,
            refresh_ttl_hours: 24,
            lock_duration_hours: 1,
            max_login_failures: 4,
            ip_block_threshold: 3,
            ip_block_expiry_hours: None,
            max_registrations_per_ip: 3,
            timezone_offset_hours: -3,
        }
    }
}

use log::{info, warn};
use std::collections::HashMap;
use std::sync::Mutex;

/// 账号创建限流器
///
/// 计数只在进程生命周期内有效，不落库、不按时间窗滑动，
/// 重启即清零。与持久化的 IP 防护相比有意保持粗粒度。
pub struct RegistrationRateLimiter {
    counters: Mutex<HashMap<String, u32>>,
    max_attempts: u32,
}

impl RegistrationRateLimiter {
    pub fn new(max_attempts: u32) -> Self {
        info!("初始化注册限流器，每 IP 上限 {}", max_attempts);
        Self {
            counters: Mutex::new(HashMap::new()),
            max_attempts,
        }
    }

    /// 计一次创建尝试并判断是否放行
    ///
    /// 计数在锁内完成，并发调用不会丢更新。
    pub fn allow_user_creation(&self, ip: &str) -> bool {
        let mut counters = self.counters.lock().unwrap();
        let count = counters.entry(ip.to_string()).or_insert(0);
        *count += 1;

        let allowed = *count <= self.max_attempts;
        if !allowed {
            warn!("IP {} 注册次数超限: {}", ip, *count);
        }
        allowed
    }
}

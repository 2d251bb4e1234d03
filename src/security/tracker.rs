use async_trait::async_trait;
use chrono::{Duration, Utc};
use log::{info, warn};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{AuthError, BlockedIp};
use crate::config::AuthConfig;

#[cfg(test)]
use mockall::automock;

/// 失败记录的存取接口
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BlockedIpStore: Send + Sync {
    /// 同一 IP 可能有多条记录，全部返回
    async fn find_by_ip(&self, ip: &str) -> Result<Vec<BlockedIp>, AuthError>;

    async fn insert(&self, record: &BlockedIp) -> Result<(), AuthError>;

    async fn update(&self, record: &BlockedIp) -> Result<(), AuthError>;
}

/// 按 IP 统计登录失败并决定封禁
///
/// 查找、修改、保存三步之间没有事务保护，同一 IP 的并发失败可能
/// 少计，靠时间戳最新者为准的归并保证最终会到达阈值。
pub struct IpAbuseTracker {
    store: Arc<dyn BlockedIpStore>,
    config: AuthConfig,
}

impl IpAbuseTracker {
    pub fn new(store: Arc<dyn BlockedIpStore>, config: AuthConfig) -> Self {
        info!("初始化 IP 防护");
        Self { store, config }
    }

    /// 记录一次来自该 IP 的登录失败
    pub async fn register_failed_attempt(
        &self,
        ip: &str,
        user_agent: &str,
    ) -> Result<(), AuthError> {
        let mut records = self.store.find_by_ip(ip).await?;
        // 并发插入可能留下多条记录，取时间戳最新的一条作为有效记录
        records.sort_by_key(|r| r.last_failed_at);

        match records.pop() {
            Some(mut record) => {
                record.failed_attempts += 1;
                record.user_agent = user_agent.to_string();
                record.last_failed_at = Utc::now();
                self.store.update(&record).await?;
                warn!("IP {} 失败次数累计 {}", ip, record.failed_attempts);
            }
            None => {
                let record = BlockedIp {
                    id: Uuid::new_v4().to_string(),
                    ip: ip.to_string(),
                    failed_attempts: 1,
                    user_agent: user_agent.to_string(),
                    last_failed_at: Utc::now(),
                };
                self.store.insert(&record).await?;
                warn!("IP {} 首次失败，建立记录", ip);
            }
        }
        Ok(())
    }

    /// 任一记录的失败次数达到阈值即视为封禁
    ///
    /// 默认永久封禁，仅当配置了有效期时才忽略过旧的记录。
    pub async fn is_blocked(&self, ip: &str) -> Result<bool, AuthError> {
        let records = self.store.find_by_ip(ip).await?;
        let now = Utc::now();

        let blocked = records.iter().any(|record| {
            if let Some(hours) = self.config.ip_block_expiry_hours {
                if now - record.last_failed_at > Duration::hours(hours) {
                    return false;
                }
            }
            record.failed_attempts >= self.config.ip_block_threshold
        });

        if blocked {
            warn!("IP {} 已被封禁", ip);
        }
        Ok(blocked)
    }
}

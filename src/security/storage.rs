use async_trait::async_trait;
use sqlx::PgPool;

use crate::auth::{AuthError, BlockedIp};
use crate::security::tracker::BlockedIpStore;

pub struct PostgresBlockedIpStore {
    pool: PgPool,
}

impl PostgresBlockedIpStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BlockedIpStore for PostgresBlockedIpStore {
    async fn find_by_ip(&self, ip: &str) -> Result<Vec<BlockedIp>, AuthError> {
        sqlx::query_as::<_, BlockedIp>(
            r#"
            SELECT id, ip, failed_attempts, user_agent, last_failed_at
            FROM blocked_ips
            WHERE ip = $1
            "#,
        )
        .bind(ip)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AuthError::Persistence(format!("查询 IP 记录失败: {}", e)))
    }

    async fn insert(&self, record: &BlockedIp) -> Result<(), AuthError> {
        sqlx::query(
            r#"
            INSERT INTO blocked_ips (id, ip, failed_attempts, user_agent, last_failed_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&record.id)
        .bind(&record.ip)
        .bind(record.failed_attempts)
        .bind(&record.user_agent)
        .bind(record.last_failed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Persistence(format!("写入 IP 记录失败: {}", e)))?;
        Ok(())
    }

    async fn update(&self, record: &BlockedIp) -> Result<(), AuthError> {
        sqlx::query(
            r#"
            UPDATE blocked_ips
            SET failed_attempts = $2, user_agent = $3, last_failed_at = $4
            WHERE id = $1
            "#,
        )
        .bind(&record.id)
        .bind(record.failed_attempts)
        .bind(&record.user_agent)
        .bind(record.last_failed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Persistence(format!("更新 IP 记录失败: {}", e)))?;
        Ok(())
    }
}

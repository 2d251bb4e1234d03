use crate::auth::storage::{TokenStore, UserStore};
use crate::auth::types::{AuthError, AuthUser, StoredToken};
use async_trait::async_trait;
use log::debug;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<AuthUser>, AuthError> {
        sqlx::query_as::<_, AuthUser>(
            r#"
            SELECT id, email, display_name, password_hash, role, is_active,
                   failed_login_attempts, locked_until
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Persistence(format!("查询用户失败: {}", e)))
    }

    async fn create_user(&self, user: &AuthUser) -> Result<(), AuthError> {
        sqlx::query(
            r#"
            INSERT INTO users
                (id, email, display_name, password_hash, role, is_active,
                 failed_login_attempts, locked_until, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(user.is_active)
        .bind(user.failed_login_attempts)
        .bind(user.locked_until)
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Persistence(format!("创建用户失败: {}", e)))?;

        debug!("用户 {} 已写入", user.email);
        Ok(())
    }

    async fn update_lock_state(&self, user: &AuthUser) -> Result<(), AuthError> {
        sqlx::query(
            "UPDATE users SET failed_login_attempts = $2, locked_until = $3 WHERE id = $1",
        )
        .bind(&user.id)
        .bind(user.failed_login_attempts)
        .bind(user.locked_until)
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Persistence(format!("更新锁定状态失败: {}", e)))?;
        Ok(())
    }
}

pub struct PostgresTokenStore {
    pool: PgPool,
}

impl PostgresTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PostgresTokenStore {
    async fn save_token(&self, token: &StoredToken) -> Result<(), AuthError> {
        sqlx::query(
            r#"
            INSERT INTO tokens (id, token, token_type, user_id, revoked, expired, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&token.id)
        .bind(&token.token)
        .bind(&token.token_type)
        .bind(&token.user_id)
        .bind(token.revoked)
        .bind(token.expired)
        .bind(token.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Persistence(format!("保存凭证失败: {}", e)))?;
        Ok(())
    }

    async fn delete_user_tokens(&self, user_id: &str) -> Result<(), AuthError> {
        let result = sqlx::query("DELETE FROM tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Persistence(format!("清除旧凭证失败: {}", e)))?;

        debug!("已删除用户 {} 的 {} 条旧凭证", user_id, result.rows_affected());
        Ok(())
    }

    async fn find_valid_user_tokens(&self, user_id: &str) -> Result<Vec<StoredToken>, AuthError> {
        sqlx::query_as::<_, StoredToken>(
            r#"
            SELECT id, token, token_type, user_id, revoked, expired, created_at
            FROM tokens
            WHERE user_id = $1 AND (revoked = false OR expired = false)
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AuthError::Persistence(format!("查询有效凭证失败: {}", e)))
    }

    async fn save_tokens(&self, tokens: &[StoredToken]) -> Result<(), AuthError> {
        for token in tokens {
            sqlx::query("UPDATE tokens SET revoked = $2, expired = $3 WHERE id = $1")
                .bind(&token.id)
                .bind(token.revoked)
                .bind(token.expired)
                .execute(&self.pool)
                .await
                .map_err(|e| AuthError::Persistence(format!("回写凭证状态失败: {}", e)))?;
        }
        Ok(())
    }

    async fn insert_invalidated(&self, token_hash: &str) -> Result<(), AuthError> {
        sqlx::query(
            r#"
            INSERT INTO invalidated_tokens (id, token_hash, invalidated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (token_hash) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(token_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Persistence(format!("写入失效名单失败: {}", e)))?;
        Ok(())
    }

    async fn is_invalidated(&self, token_hash: &str) -> Result<bool, AuthError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM invalidated_tokens WHERE token_hash = $1)",
        )
        .bind(token_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AuthError::Persistence(format!("查询失效名单失败: {}", e)))
    }
}

use crate::auth::AuthError;
use log::{error, info};
use sqlx::PgPool;

pub struct DbInitializer {
    pool: PgPool,
}

impl DbInitializer {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 初始化用户表
    pub async fn init_user_tables(&self) -> Result<(), AuthError> {
        // 创建用户表
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id VARCHAR PRIMARY KEY,
                email VARCHAR UNIQUE NOT NULL,
                display_name VARCHAR NOT NULL,
                password_hash VARCHAR NOT NULL,
                role VARCHAR NOT NULL DEFAULT 'user' CHECK (role IN ('admin', 'user')),
                is_active BOOLEAN NOT NULL DEFAULT true,
                failed_login_attempts INTEGER NOT NULL DEFAULT 0,
                locked_until TIMESTAMP WITH TIME ZONE,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Persistence(format!("创建用户表失败: {}", e)))?;

        // 老库的用户表可能缺少锁定相关的列，检查后补齐
        let existing_columns: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT column_name::text
            FROM information_schema.columns
            WHERE table_name = 'users'
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AuthError::Persistence(format!("检查用户表列失败: {}", e)))?;

        if !existing_columns.contains(&"is_active".to_string()) {
            sqlx::query("ALTER TABLE users ADD COLUMN is_active BOOLEAN NOT NULL DEFAULT true")
                .execute(&self.pool)
                .await
                .map_err(|e| AuthError::Persistence(format!("添加is_active列失败: {}", e)))?;
        }

        if !existing_columns.contains(&"failed_login_attempts".to_string()) {
            sqlx::query(
                "ALTER TABLE users ADD COLUMN failed_login_attempts INTEGER NOT NULL DEFAULT 0",
            )
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Persistence(format!("添加failed_login_attempts列失败: {}", e)))?;
        }

        if !existing_columns.contains(&"locked_until".to_string()) {
            sqlx::query("ALTER TABLE users ADD COLUMN locked_until TIMESTAMP WITH TIME ZONE")
                .execute(&self.pool)
                .await
                .map_err(|e| AuthError::Persistence(format!("添加locked_until列失败: {}", e)))?;
        }

        Ok(())
    }

    /// 初始化凭证相关表
    pub async fn init_token_tables(&self) -> Result<(), AuthError> {
        // 已签发凭证表
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tokens (
                id VARCHAR PRIMARY KEY,
                token TEXT NOT NULL,
                token_type VARCHAR NOT NULL DEFAULT 'bearer',
                user_id VARCHAR NOT NULL,
                revoked BOOLEAN NOT NULL DEFAULT false,
                expired BOOLEAN NOT NULL DEFAULT false,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Persistence(format!("创建凭证表失败: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tokens_user ON tokens(user_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Persistence(format!("创建凭证索引失败: {}", e)))?;

        // 失效名单，只增不删
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS invalidated_tokens (
                id VARCHAR PRIMARY KEY,
                token_hash VARCHAR UNIQUE NOT NULL,
                invalidated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Persistence(format!("创建失效名单表失败: {}", e)))?;

        Ok(())
    }

    /// 初始化 IP 防护表
    pub async fn init_security_tables(&self) -> Result<(), AuthError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS blocked_ips (
                id VARCHAR PRIMARY KEY,
                ip VARCHAR NOT NULL,
                failed_attempts INTEGER NOT NULL DEFAULT 0,
                user_agent VARCHAR NOT NULL DEFAULT 'unknown',
                last_failed_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Persistence(format!("创建IP记录表失败: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_blocked_ips_ip ON blocked_ips(ip)")
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Persistence(format!("创建IP索引失败: {}", e)))?;

        Ok(())
    }
}

/// 初始化所有数据库表
pub async fn initialize_db(pool: PgPool) -> Result<(), AuthError> {
    info!("开始初始化数据库...");
    let initializer = DbInitializer::new(pool);

    initializer.init_user_tables().await.map_err(|e| {
        error!("用户表初始化失败: {:?}", e);
        e
    })?;

    initializer.init_token_tables().await.map_err(|e| {
        error!("凭证表初始化失败: {:?}", e);
        e
    })?;

    initializer.init_security_tables().await.map_err(|e| {
        error!("IP记录表初始化失败: {:?}", e);
        e
    })?;

    info!("数据库初始化完成");
    Ok(())
}

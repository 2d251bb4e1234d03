use crate::auth::types::{AuthError, AuthUser, StoredToken};
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

/// 用户记录的存取接口，测试时可替换为内存实现
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 按邮箱查找用户
    async fn find_by_email(&self, email: &str) -> Result<Option<AuthUser>, AuthError>;

    /// 创建用户
    async fn create_user(&self, user: &AuthUser) -> Result<(), AuthError>;

    /// 持久化失败计数与锁定时间
    async fn update_lock_state(&self, user: &AuthUser) -> Result<(), AuthError>;
}

/// 凭证记录与失效名单的存取接口
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// 写入一条新凭证记录
    async fn save_token(&self, token: &StoredToken) -> Result<(), AuthError>;

    /// 硬删除用户的全部凭证记录，仅在重新登录时使用
    async fn delete_user_tokens(&self, user_id: &str) -> Result<(), AuthError>;

    /// 查出用户当前仍有效的凭证记录
    async fn find_valid_user_tokens(&self, user_id: &str) -> Result<Vec<StoredToken>, AuthError>;

    /// 回写吊销标记
    async fn save_tokens(&self, tokens: &[StoredToken]) -> Result<(), AuthError>;

    /// 将凭证哈希写入失效名单，名单只增不删
    async fn insert_invalidated(&self, token_hash: &str) -> Result<(), AuthError>;

    /// 凭证哈希是否已在失效名单中
    async fn is_invalidated(&self, token_hash: &str) -> Result<bool, AuthError>;
}

pub mod postgres;

pub use postgres::{PostgresTokenStore, PostgresUserStore};
